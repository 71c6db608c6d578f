//! Derived views over a parsed export: pages, files, modules and categories.
//!
//! Every method here is a pure function of the resource snapshot held by
//! [`CanvasExport`] (plus, for [`CanvasExport::files`], file modification
//! times). Nothing is cached between calls.
//!
//! ## Category heuristics
//!
//! [`CanvasExport::categorize`] tests each resource against substring rules
//! on its lowercased href and type, in this fixed order; the first match wins:
//!
//! | Bucket | Rule |
//! |--------|------|
//! | announcements | `announcement` or `news` |
//! | modules | `module` (also checked in the file list) |
//! | quizzes | `quiz` |
//! | discussions | `discussion` or `forum` |
//! | files | href starts with `web_resources` or `course_settings` |
//!
//! Independently of that, `people`, `roster` or `profile` in the href also
//! puts the resource in the people bucket.

use crate::manifest::{CanvasExport, OrganizationItem, Resource};
use crate::paths;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

pub const SYLLABUS_FALLBACK: &str = "course_settings/syllabus.html";

/// A resource listed as a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageEntry {
    pub id: String,
    pub href: String,
    pub title: String,
}

/// Where a file's date came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DateSource {
    /// `unlock_at` from `files_meta.xml`.
    Meta,
    /// Filesystem modification time.
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub id: String,
    pub href: String,
    pub title: String,
    pub date: Option<String>,
    pub date_source: Option<DateSource>,
}

/// A module derived from the organization tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Module {
    pub title: String,
    pub items: Vec<ModuleItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleItem {
    pub title: Option<String>,
    /// Href of the referenced resource; `None` when the reference is dangling.
    pub href: Option<String>,
}

/// Resources grouped by [`CanvasExport::categorize`].
#[derive(Debug, Default, Serialize)]
pub struct Categories<'a> {
    pub announcements: Vec<&'a Resource>,
    pub modules: Vec<&'a Resource>,
    pub quizzes: Vec<&'a Resource>,
    pub discussions: Vec<&'a Resource>,
    pub people: Vec<&'a Resource>,
    pub files: Vec<&'a Resource>,
}

/// The exclusive buckets, in match order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Announcements,
    Modules,
    Quizzes,
    Discussions,
    Files,
}

/// First exclusive bucket a resource falls into, if any.
pub fn primary_category(resource: &Resource) -> Option<Category> {
    let href = resource.href.to_lowercase();
    let hay = format!("{} {}", href, resource.kind.to_lowercase());
    let files = resource.files.join("/").to_lowercase();

    if hay.contains("announcement") || hay.contains("news") {
        Some(Category::Announcements)
    } else if hay.contains("module") || files.contains("module") {
        Some(Category::Modules)
    } else if hay.contains("quiz") {
        Some(Category::Quizzes)
    } else if hay.contains("discussion") || hay.contains("forum") {
        Some(Category::Discussions)
    } else if href.starts_with("web_resources") || href.starts_with("course_settings") {
        Some(Category::Files)
    } else {
        None
    }
}

/// The overlay check, independent of [`primary_category`].
pub fn is_people(resource: &Resource) -> bool {
    let href = resource.href.to_lowercase();
    href.contains("people") || href.contains("roster") || href.contains("profile")
}

fn page_entry(resource: &Resource) -> PageEntry {
    PageEntry {
        id: resource.identifier.clone(),
        href: resource.href.clone(),
        title: paths::basename(&resource.href).to_string(),
    }
}

impl CanvasExport {
    /// Resources that look like pages: `.html` hrefs, anything under
    /// `wiki_content`, and anything mentioning `web_resources`. Manifest order.
    pub fn list_pages(&self) -> Vec<PageEntry> {
        self.resources()
            .iter()
            .filter(|r| {
                let h = &r.href;
                !h.is_empty()
                    && (h.ends_with(".html")
                        || h.starts_with("wiki_content")
                        || h.contains("web_resources"))
            })
            .map(page_entry)
            .collect()
    }

    /// HTML resources under `prefix`, sorted by href.
    pub fn pages_by_folder(&self, prefix: &str) -> Vec<PageEntry> {
        let mut pages: Vec<PageEntry> = self
            .resources()
            .iter()
            .filter(|r| {
                !r.href.is_empty()
                    && r.href.starts_with(prefix)
                    && r.href.to_lowercase().ends_with(".html")
            })
            .map(page_entry)
            .collect();
        pages.sort_by(|a, b| a.href.cmp(&b.href));
        pages
    }

    /// Uploaded files (`web_resources/...`), sorted by href.
    ///
    /// Title: sidecar display name, else basename. Date: sidecar `unlock_at`,
    /// else the file's mtime as local `YYYY-MM-DD`, else none.
    pub fn files(&self) -> Vec<FileEntry> {
        let mut files: Vec<FileEntry> = self
            .resources()
            .iter()
            .filter(|r| r.href.starts_with("web_resources"))
            .map(|r| {
                let meta = self.file_meta(&r.identifier);
                let title = meta
                    .and_then(|m| m.display_name.clone())
                    .unwrap_or_else(|| paths::basename(&r.href).to_string());

                let (date, date_source) = match meta.and_then(|m| m.unlock_at.clone()) {
                    Some(unlock) => (Some(unlock), Some(DateSource::Meta)),
                    None => match self.resolve_path(&r.href).and_then(|p| modified_date(&p)) {
                        Some(d) => (Some(d), Some(DateSource::File)),
                        None => (None, None),
                    },
                };

                FileEntry {
                    id: r.identifier.clone(),
                    href: r.href.clone(),
                    title,
                    date,
                    date_source,
                }
            })
            .collect();
        files.sort_by(|a, b| a.href.cmp(&b.href));
        files
    }

    /// First resource whose href mentions `syllabus`, else the well-known
    /// `course_settings/syllabus.html` if it exists on disk.
    pub fn syllabus(&self) -> Option<Resource> {
        if let Some(r) = self.resources().iter().find(|r| r.href.contains("syllabus")) {
            return Some(r.clone());
        }
        self.root().join(SYLLABUS_FALLBACK).is_file().then(|| Resource {
            identifier: "syllabus".to_string(),
            href: SYLLABUS_FALLBACK.to_string(),
            kind: String::new(),
            files: vec![SYLLABUS_FALLBACK.to_string()],
        })
    }

    /// Resources whose href or files mention `homework`, `midterm` or `final`.
    pub fn assignments(&self) -> Vec<PageEntry> {
        const MARKERS: &[&str] = &["homework", "midterm", "final"];
        let mentions = |s: &str| {
            let s = s.to_lowercase();
            MARKERS.iter().any(|m| s.contains(m))
        };
        let mut assigns: Vec<PageEntry> = self
            .resources()
            .iter()
            .filter(|r| mentions(&r.href) || r.files.iter().any(|f| mentions(f)))
            .map(page_entry)
            .collect();
        assigns.sort_by(|a, b| a.href.cmp(&b.href));
        assigns
    }

    /// Group resources by the heuristics in the module docs.
    pub fn categorize(&self) -> Categories<'_> {
        let mut cats = Categories::default();
        for r in self.resources() {
            match primary_category(r) {
                Some(Category::Announcements) => cats.announcements.push(r),
                Some(Category::Modules) => cats.modules.push(r),
                Some(Category::Quizzes) => cats.quizzes.push(r),
                Some(Category::Discussions) => cats.discussions.push(r),
                Some(Category::Files) => cats.files.push(r),
                None => {}
            }
            if is_people(r) {
                cats.people.push(r);
            }
        }
        cats
    }

    /// Modules from the organization tree.
    ///
    /// An item is a module when at least one immediate child references a
    /// resource; otherwise its children are searched the same way.
    pub fn modules(&self) -> Vec<Module> {
        let mut modules = Vec::new();
        for top in self.organizations() {
            self.collect_modules(top, &mut modules);
        }
        modules
    }

    fn collect_modules(&self, item: &OrganizationItem, out: &mut Vec<Module>) {
        if !item.children.iter().any(|c| c.identifierref.is_some()) {
            for child in &item.children {
                self.collect_modules(child, out);
            }
            return;
        }

        let items = item
            .children
            .iter()
            .map(|child| {
                let href = child
                    .identifierref
                    .as_deref()
                    .and_then(|id| self.resource(id))
                    .map(|r| r.href.clone())
                    .filter(|h| !h.is_empty());
                let title = child
                    .title
                    .clone()
                    .or_else(|| href.as_deref().map(|h| paths::basename(h).to_string()));
                ModuleItem { title, href }
            })
            .collect();

        out.push(Module {
            title: item.title.clone().unwrap_or_else(|| "Module".to_string()),
            items,
        });
    }

    /// Resource whose href, or one of whose files, equals `href` exactly.
    pub fn href_to_resource(&self, href: &str) -> Option<&Resource> {
        self.resources()
            .iter()
            .find(|r| r.href == href || r.files.iter().any(|f| f == href))
    }

    /// Filesystem path for an export-relative href. Tries the href as given,
    /// then trimmed of stray whitespace. `None` if neither exists or the
    /// href escapes the export root.
    pub fn resolve_path(&self, href: &str) -> Option<PathBuf> {
        if href.is_empty() {
            return None;
        }
        [href, href.trim()]
            .into_iter()
            .filter_map(|h| paths::safe_join(self.root(), h))
            .find(|p| p.exists())
    }
}

fn modified_date(path: &std::path::Path) -> Option<String> {
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    let local: DateTime<Local> = modified.into();
    Some(local.format("%Y-%m-%d").to_string())
}
