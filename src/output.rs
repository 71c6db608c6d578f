//! CLI output formatting.
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions take already collected data and do no I/O.
//!
//! # Output Format
//!
//! ## Info
//!
//! ```text
//! ORF 245: Fundamentals of Statistics
//!     Source: courses/orf-245
//!
//! Contents
//!     Pages: 8
//!     Files: 3
//!     Announcements: 1
//!
//! Modules
//! 001 Week 1 (2 items)
//!     001 Welcome
//!         Source: wiki_content/welcome.html
//!
//! Files
//! 001 Distribution chart
//!     Source: web_resources/Uploaded Media/chart.png
//!     Date: 2020-09-01T04:00:00Z (files_meta)
//!
//! External tools
//!     zoom
//! ```
//!
//! ## Export
//!
//! ```text
//! 001 ORF 245: Fundamentals of Statistics → orf-245/index.html
//!     8 pages, 3 files, 2 modules, 5 rewritten
//!
//! Exported 1 course → public
//! ```

use crate::export::SiteSummary;
use crate::links::ExternalLink;
use crate::manifest::CanvasExport;
use crate::query::{Categories, DateSource, FileEntry, Module, PageEntry};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

// ============================================================================
// Info
// ============================================================================

/// Everything `info` prints, collected from one export.
pub struct Inventory<'a> {
    pub title: String,
    pub root: &'a Path,
    pub pages: Vec<PageEntry>,
    pub files: Vec<FileEntry>,
    pub modules: Vec<Module>,
    pub categories: Categories<'a>,
    pub tools: Vec<String>,
}

impl<'a> Inventory<'a> {
    pub fn collect(export: &'a CanvasExport) -> Self {
        Self {
            title: export.display_title(),
            root: export.root(),
            pages: export.list_pages(),
            files: export.files(),
            modules: export.modules(),
            categories: export.categorize(),
            tools: export.external_tools(),
        }
    }
}

pub fn format_inventory(inv: &Inventory) -> Vec<String> {
    let mut lines = vec![
        inv.title.clone(),
        format!("{}Source: {}", indent(1), inv.root.display()),
        String::new(),
        "Contents".to_string(),
    ];

    let cats = &inv.categories;
    let counts = [
        ("Pages", inv.pages.len()),
        ("Files", inv.files.len()),
        ("Modules", inv.modules.len()),
        ("Announcements", cats.announcements.len()),
        ("Quizzes", cats.quizzes.len()),
        ("Discussions", cats.discussions.len()),
        ("People", cats.people.len()),
    ];
    for (label, n) in counts {
        if n > 0 {
            lines.push(format!("{}{}: {}", indent(1), label, n));
        }
    }

    if !inv.modules.is_empty() {
        lines.push(String::new());
        lines.push("Modules".to_string());
        for (i, module) in inv.modules.iter().enumerate() {
            lines.push(format!(
                "{} {} ({})",
                format_index(i + 1),
                module.title,
                plural(module.items.len(), "item", "items")
            ));
            for (j, item) in module.items.iter().enumerate() {
                let title = item.title.as_deref().unwrap_or("Untitled");
                match &item.href {
                    Some(href) => {
                        lines.push(format!("{}{} {}", indent(1), format_index(j + 1), title));
                        lines.push(format!("{}Source: {}", indent(2), href));
                    }
                    None => {
                        lines.push(format!("{}{} {} (missing)", indent(1), format_index(j + 1), title));
                    }
                }
            }
        }
    }

    if !inv.files.is_empty() {
        lines.push(String::new());
        lines.push("Files".to_string());
        for (i, file) in inv.files.iter().enumerate() {
            lines.push(format!("{} {}", format_index(i + 1), file.title));
            lines.push(format!("{}Source: {}", indent(1), file.href));
            if let Some(date) = &file.date {
                let source = match file.date_source {
                    Some(DateSource::Meta) => " (files_meta)",
                    Some(DateSource::File) => " (modified)",
                    None => "",
                };
                lines.push(format!("{}Date: {}{}", indent(1), date, source));
            }
        }
    }

    lines.push(String::new());
    lines.push("External tools".to_string());
    if inv.tools.is_empty() {
        lines.push(format!("{}none detected", indent(1)));
    }
    for tool in &inv.tools {
        lines.push(format!("{}{}", indent(1), tool));
    }

    lines
}

pub fn print_inventory(inv: &Inventory) {
    for line in format_inventory(inv) {
        println!("{}", line);
    }
}

// ============================================================================
// Links
// ============================================================================

/// ```text
/// 001 https://www.khanacademy.org/math/statistics
///     Found in: page:wiki_content/welcome.html (a)
///
/// 1 external link
/// ```
pub fn format_links(links: &[ExternalLink]) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, link) in links.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), link.href));
        lines.push(format!("{}Found in: {} ({})", indent(1), link.source, link.context));
    }
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(plural(links.len(), "external link", "external links"));
    lines
}

pub fn print_links(links: &[ExternalLink]) {
    for line in format_links(links) {
        println!("{}", line);
    }
}

// ============================================================================
// Export
// ============================================================================

pub fn format_site_summary(summary: &SiteSummary, out_dir: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    for dir in &summary.unpacked {
        lines.push(format!("Unpacked {}", dir.display()));
    }
    if !summary.unpacked.is_empty() {
        lines.push(String::new());
    }
    for (i, course) in summary.courses.iter().enumerate() {
        lines.push(format!(
            "{} {} → {}/index.html",
            format_index(i + 1),
            course.title,
            course.name
        ));
        lines.push(format!(
            "{}{}, {}, {}, {} rewritten",
            indent(1),
            plural(course.pages, "page", "pages"),
            plural(course.files, "file", "files"),
            plural(course.modules, "module", "modules"),
            course.rewritten
        ));
    }
    if !summary.courses.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "Exported {} → {}",
        plural(summary.courses.len(), "course", "courses"),
        out_dir.display()
    ));
    lines
}

pub fn print_site_summary(summary: &SiteSummary, out_dir: &Path) {
    for line in format_site_summary(summary, out_dir) {
        println!("{}", line);
    }
}

// ============================================================================
// Serve
// ============================================================================

pub fn format_serving(title: &str, host: &str, requested: u16, chosen: u16) -> Vec<String> {
    let mut lines = Vec::new();
    if requested != chosen {
        lines.push(format!("Port {requested} is unavailable, using {chosen}"));
    }
    lines.push(format!("Serving {title} at http://{host}:{chosen}/"));
    lines
}

pub fn print_serving(title: &str, host: &str, requested: u16, chosen: u16) {
    for line in format_serving(title, host, requested, chosen) {
        println!("{}", line);
    }
}
