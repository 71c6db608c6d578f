//! Static site export.
//!
//! Flattens a directory of course exports into plain HTML that can be hosted
//! anywhere (GitHub Pages, a shared drive). Links use paths relative to each
//! output file, so the result also works straight from disk.
//!
//! ## Output Structure
//!
//! ```text
//! public/
//! ├── index.html                 # One link per course
//! ├── _static/canvas_viewer.css
//! └── orf-245/
//!     ├── index.html             # Pages, files with dates, modules
//!     ├── pages.html
//!     ├── files.html
//!     ├── modules.html
//!     ├── _static/canvas_viewer.css
//!     ├── wiki_content/          # Copied, HTML rewritten into the layout
//!     ├── web_resources/         # Copied as-is
//!     └── course_settings/       # Copied as-is
//! ```
//!
//! `.zip` and `.imscc` archives in the courses directory are unpacked next
//! to themselves (`orf-245.imscc` → `orf-245/`) before building. An archive
//! whose folder already exists is not unpacked again.

use crate::format;
use crate::manifest::{CanvasExport, MANIFEST_FILE};
use crate::paths;
use crate::render::{self, Layout, ListItem, ModuleView, NavLink};
use crate::rewrite::{self, RelativeRoutes};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Folders copied from each export.
pub const COPIED_DIRS: &[&str] = &["wiki_content", "web_resources", "course_settings"];

/// Stylesheet location, relative to the site root and to each course root.
pub const STYLESHEET_PATH: &str = "_static/canvas_viewer.css";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("courses directory not found: {0}")]
    CoursesDirNotFound(PathBuf),
}

/// What was written for one course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseSummary {
    /// Output folder name (the export's directory name).
    pub name: String,
    pub title: String,
    pub pages: usize,
    pub files: usize,
    pub modules: usize,
    /// HTML resources rewritten into the layout.
    pub rewritten: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteSummary {
    /// Archives unpacked on this run.
    pub unpacked: Vec<PathBuf>,
    /// Built courses, sorted by name.
    pub courses: Vec<CourseSummary>,
}

// ============================================================================
// Site
// ============================================================================

/// Build the whole site. `out_dir` is deleted and recreated.
pub fn build_site(courses_dir: &Path, out_dir: &Path) -> Result<SiteSummary, ExportError> {
    if !courses_dir.is_dir() {
        return Err(ExportError::CoursesDirNotFound(courses_dir.to_path_buf()));
    }
    if out_dir.exists() {
        fs::remove_dir_all(out_dir)?;
    }
    fs::create_dir_all(out_dir)?;

    let unpacked = unpack_archives(courses_dir)?;

    let mut course_dirs: Vec<PathBuf> = fs::read_dir(courses_dir)?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir() && p.join(MANIFEST_FILE).is_file())
        .collect();
    course_dirs.sort();

    let courses: Vec<CourseSummary> = course_dirs
        .par_iter()
        .map(|dir| build_course(dir, out_dir))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .flatten()
        .collect();

    write_stylesheet(out_dir)?;
    let links: Vec<ListItem> = courses
        .iter()
        .map(|c| ListItem::link(c.name.clone(), format!("./{}/index.html", c.name)))
        .collect();
    let index = render::render_course_list(&links, STYLESHEET_PATH);
    fs::write(out_dir.join("index.html"), index.into_string())?;

    info!(courses = courses.len(), out = %out_dir.display(), "site built");
    Ok(SiteSummary { unpacked, courses })
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .is_some_and(|e| e == "zip" || e == "imscc")
}

/// Unpack every archive in `courses_dir` whose target folder is missing.
/// Invalid archives are skipped with a warning.
pub fn unpack_archives(courses_dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
    let mut archives: Vec<PathBuf> = fs::read_dir(courses_dir)?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_archive(p))
        .collect();
    archives.sort();

    let mut unpacked = Vec::new();
    for archive in archives {
        let Some(stem) = archive.file_stem() else {
            continue;
        };
        let dest = courses_dir.join(stem);
        if dest.exists() {
            debug!(dest = %dest.display(), "already unpacked");
            continue;
        }
        match unpack_archive(&archive, &dest) {
            Ok(()) => {
                info!(archive = %archive.display(), "unpacked");
                unpacked.push(dest);
            }
            Err(e) => {
                warn!(archive = %archive.display(), error = %e, "skipping invalid archive");
                if dest.exists() {
                    fs::remove_dir_all(&dest)?;
                }
            }
        }
    }
    Ok(unpacked)
}

fn unpack_archive(archive: &Path, dest: &Path) -> Result<(), ExportError> {
    let file = fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;
    fs::create_dir_all(dest)?;
    zip.extract(dest)?;
    Ok(())
}

fn write_stylesheet(root: &Path) -> Result<(), ExportError> {
    let path = root.join(STYLESHEET_PATH);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, render::CSS)?;
    Ok(())
}

// ============================================================================
// Course
// ============================================================================

/// Sidebar for an output file in `from_dir` (course-relative).
fn export_nav(from_dir: &str) -> Vec<NavLink> {
    [
        ("index", "Home", "index.html"),
        ("pages", "Pages", "pages.html"),
        ("files", "Files", "files.html"),
        ("modules", "Modules", "modules.html"),
    ]
    .into_iter()
    .map(|(key, label, file)| NavLink {
        key,
        label,
        href: paths::relative_to(from_dir, file),
    })
    .collect()
}

/// Links and stylesheet paths for an output file in `from_dir`.
struct CourseChrome {
    home: String,
    stylesheet: String,
    nav: Vec<NavLink>,
}

impl CourseChrome {
    fn new(from_dir: &str) -> Self {
        Self {
            home: paths::relative_to(from_dir, "index.html"),
            stylesheet: paths::relative_to(from_dir, STYLESHEET_PATH),
            nav: export_nav(from_dir),
        }
    }

    fn layout<'a>(&'a self, title: &'a str) -> Layout<'a> {
        Layout {
            course_title: title,
            home_href: &self.home,
            stylesheet_href: &self.stylesheet,
            nav: &self.nav,
        }
    }
}

/// Build one course into `<out_root>/<export dir name>/`.
///
/// `Ok(None)` when the manifest cannot be read; the course is skipped.
pub fn build_course(export_dir: &Path, out_root: &Path) -> Result<Option<CourseSummary>, ExportError> {
    let export = match CanvasExport::open(export_dir) {
        Ok(export) => export,
        Err(e) => {
            warn!(path = %export_dir.display(), error = %e, "skipping course");
            return Ok(None);
        }
    };
    let name = export_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "course".to_string());
    let title = export.display_title();
    let course_out = out_root.join(&name);
    info!(course = %name, title = %title, "building course");
    fs::create_dir_all(&course_out)?;

    for sub in COPIED_DIRS {
        let src = export_dir.join(sub);
        if src.is_dir() {
            let dst = course_out.join(sub);
            if dst.exists() {
                fs::remove_dir_all(&dst)?;
            }
            fs::create_dir_all(&dst)?;
            copy_dir_recursive(&src, &dst)?;
        }
    }
    write_stylesheet(&course_out)?;

    let rewritten = rewrite_pages(&export, &title, &course_out)?;

    let chrome = CourseChrome::new("");
    let layout = chrome.layout(&title);

    let pages = export.list_pages();
    let files = export.files();
    let modules = module_views(&export);

    let page_items: Vec<ListItem> = pages.iter().map(|p| ListItem::link(p.title.clone(), p.href.clone())).collect();
    let file_items: Vec<ListItem> = files
        .iter()
        .map(|f| {
            ListItem::link(f.title.clone(), f.href.clone())
                .with_note(Some(f.date.clone().unwrap_or_else(|| format::MISSING.to_string())))
        })
        .collect();
    let wiki_items: Vec<ListItem> = export
        .pages_by_folder("wiki_content")
        .into_iter()
        .map(|p| ListItem::link(p.title, p.href))
        .collect();

    let index = render::render_course_index(&layout, &page_items, &file_items, &modules, "../index.html");
    fs::write(course_out.join("index.html"), index.into_string())?;
    let pages_html = render::render_section(&layout, "Pages", "pages", &wiki_items, None);
    fs::write(course_out.join("pages.html"), pages_html.into_string())?;
    let files_html = render::render_section(&layout, "Files", "files", &file_items, None);
    fs::write(course_out.join("files.html"), files_html.into_string())?;
    let modules_html = render::render_modules(&layout, &modules);
    fs::write(course_out.join("modules.html"), modules_html.into_string())?;

    Ok(Some(CourseSummary {
        name,
        title,
        pages: pages.len(),
        files: files.len(),
        modules: modules.len(),
        rewritten,
    }))
}

fn module_views(export: &CanvasExport) -> Vec<ModuleView> {
    export
        .modules()
        .into_iter()
        .map(|m| ModuleView {
            title: m.title,
            items: m
                .items
                .into_iter()
                .map(|it| ListItem {
                    title: it.title.unwrap_or_else(|| "Untitled".to_string()),
                    href: it.href,
                    note: None,
                })
                .collect(),
        })
        .collect()
}

/// Rewrite every HTML resource into `course_out`. Pages that cannot be
/// parsed are left as copied. Returns the number rewritten.
fn rewrite_pages(export: &CanvasExport, title: &str, course_out: &Path) -> Result<usize, ExportError> {
    let mut count = 0;
    for r in export.resources() {
        if !r.href.to_lowercase().ends_with(".html") {
            continue;
        }
        let Some(src) = export.resolve_path(&r.href).filter(|p| p.is_file()) else {
            continue;
        };
        let Some(dst) = paths::safe_join(course_out, &r.href) else {
            continue;
        };
        let raw = fs::read(&src)?;
        let Some(body) = rewrite::rewrite_page(&raw, &r.href, &RelativeRoutes) else {
            debug!(href = %r.href, "leaving unparsable page as-is");
            continue;
        };
        let chrome = CourseChrome::new(paths::dirname(&r.href));
        let html = render::render_page(&chrome.layout(title), paths::basename(&r.href), "pages", &body);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&dst, html.into_string())?;
        count += 1;
    }
    Ok(count)
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}
