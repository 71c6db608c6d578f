//! Interactive viewer.
//!
//! Serves one course export over HTTP. Pages are rewritten on every request
//! with [`ViewerRoutes`], so links between pages stay inside the viewer:
//!
//! | Route | Content |
//! |-------|---------|
//! | `/` | course overview: pages, files, organization tree, metadata |
//! | `/page/{*href}` | an export file; HTML is rewritten and wrapped in the layout |
//! | `/static/{*path}` | bundled stylesheet or an export file, with fallbacks |
//! | `/file/{*ref}` | the file behind a resource identifier or href |
//! | `/home`, `/syllabus` | the course front page and syllabus |
//! | `/pages`, `/files`, `/modules`, `/assignments` | listings |
//! | `/announcements`, `/quizzes`, `/discussions`, `/people` | category listings |
//! | `/canvas-data` | metadata dashboard and external link report |
//!
//! Sections with nothing in them are left out of the sidebar.

use crate::format;
use crate::manifest::{CanvasExport, ManifestError, Resource};
use crate::paths;
use crate::render::{self, Dashboard, IndexView, Layout, ListItem, ModuleView, NavLink};
use crate::rewrite::{self, COURSE_REFERENCE, FILE_BASE, ViewerRoutes};
use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const STYLESHEET: &str = "viewer.css";
const STYLESHEET_ROUTE: &str = "/static/viewer.css";

/// Front page candidates, tried in order before falling back to the first
/// wiki page.
const HOME_CANDIDATES: &[&str] = &[
    "wiki_content/homepage.html",
    "wiki_content/home.html",
    "wiki_content/welcome.html",
];

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("export directory not found: {0}")]
    ExportNotFound(PathBuf),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("no free port on {host} in {start}..={end}")]
    NoFreePort { host: String, start: u16, end: u16 },
}

/// Open the export to serve, failing early on a missing directory.
pub fn open_export(dir: &std::path::Path) -> Result<CanvasExport, ServerError> {
    if !dir.is_dir() {
        return Err(ServerError::ExportNotFound(dir.to_path_buf()));
    }
    Ok(CanvasExport::open(dir)?)
}

/// First bindable port in `start..start + search`, skipping `skip`.
pub fn find_free_port(host: &str, start: u16, search: u16, skip: &[u16]) -> Result<u16, ServerError> {
    (0..search)
        .filter_map(|i| start.checked_add(i))
        .filter(|p| !skip.contains(p))
        .find(|&p| std::net::TcpListener::bind((host, p)).is_ok())
        .ok_or_else(|| ServerError::NoFreePort {
            host: host.to_string(),
            start,
            end: start.saturating_add(search.saturating_sub(1)),
        })
}

// ============================================================================
// State and navigation
// ============================================================================

/// Which sidebar sections have content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavAvailability {
    pub home: bool,
    pub syllabus: bool,
    pub announcements: bool,
    pub modules: bool,
    pub pages: bool,
    pub files: bool,
    pub assignments: bool,
    pub quizzes: bool,
    pub discussions: bool,
    pub people: bool,
}

impl NavAvailability {
    pub fn of(export: &CanvasExport) -> Self {
        let cats = export.categorize();
        let pages = !export.pages_by_folder("wiki_content").is_empty();
        let syllabus = export.syllabus().is_some();
        Self {
            home: pages || syllabus,
            syllabus,
            announcements: !cats.announcements.is_empty(),
            modules: !export.modules().is_empty(),
            pages,
            files: !export.files().is_empty(),
            assignments: !export.assignments().is_empty(),
            quizzes: !cats.quizzes.is_empty(),
            discussions: !cats.discussions.is_empty(),
            people: !cats.people.is_empty(),
        }
    }

    pub fn links(&self) -> Vec<NavLink> {
        let sections: [(bool, &'static str, &'static str); 11] = [
            (self.home, "home", "Home"),
            (self.syllabus, "syllabus", "Syllabus"),
            (self.announcements, "announcements", "Announcements"),
            (self.modules, "modules", "Modules"),
            (self.pages, "pages", "Pages"),
            (self.files, "files", "Files"),
            (self.assignments, "assignments", "Assignments"),
            (self.quizzes, "quizzes", "Quizzes"),
            (self.discussions, "discussions", "Discussions"),
            (self.people, "people", "People"),
            (true, "canvas-data", "Canvas data"),
        ];
        sections
            .into_iter()
            .filter(|(shown, _, _)| *shown)
            .map(|(_, key, label)| NavLink {
                key,
                label,
                href: format!("/{key}"),
            })
            .collect()
    }
}

pub struct AppState {
    export: CanvasExport,
    internal_domains: Vec<String>,
    title: String,
    nav: Vec<NavLink>,
}

type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(export: CanvasExport, internal_domains: Vec<String>) -> Self {
        let title = export.display_title();
        let nav = NavAvailability::of(&export).links();
        Self {
            export,
            internal_domains,
            title,
            nav,
        }
    }

    fn layout(&self) -> Layout<'_> {
        Layout {
            course_title: &self.title,
            home_href: "/",
            stylesheet_href: STYLESHEET_ROUTE,
            nav: &self.nav,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/page/{*href}", get(page))
        .route("/static/{*path}", get(static_file))
        .route("/file/{*reference}", get(file_proxy))
        .route("/syllabus", get(syllabus))
        .route("/home", get(home))
        .route("/files", get(files))
        .route("/assignments", get(assignments))
        .route("/pages", get(pages))
        .route("/modules", get(modules))
        .route("/announcements", get(announcements))
        .route("/quizzes", get(quizzes))
        .route("/discussions", get(discussions))
        .route("/people", get(people))
        .route("/canvas-data", get(canvas_data))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Serve `app` on an already chosen port until the process is stopped.
pub async fn serve(app: Router, host: &str, port: u16) -> Result<(), ServerError> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!(addr = %listener.local_addr()?, "viewer listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ============================================================================
// Responses
// ============================================================================

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}

/// Content type by file extension.
pub fn content_type(path: &std::path::Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain; charset=utf-8",
        "csv" => "text/csv",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "zip" => "application/zip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

/// Run `f` on the blocking pool. File reads, HTML parsing and directory
/// walks go through here so they never stall the async workers.
async fn blocking<F>(state: SharedState, f: F) -> Response
where
    F: FnOnce(&AppState) -> Response + Send + 'static,
{
    match tokio::task::spawn_blocking(move || f(state.as_ref())).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "request task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
        }
    }
}

fn send_file(path: &std::path::Path) -> Response {
    match std::fs::read(path) {
        Ok(bytes) => ([(header::CONTENT_TYPE, content_type(path))], bytes).into_response(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read file");
            not_found()
        }
    }
}

fn is_html(href: &str) -> bool {
    let lower = href.to_lowercase();
    lower.ends_with(".html") || lower.ends_with(".htm")
}

/// An export file: HTML is rewritten into the layout, anything else (and
/// HTML that cannot be parsed) is sent as-is.
fn export_page(state: &AppState, href: &str, current: &str) -> Response {
    let Some(path) = state.export.resolve_path(href).filter(|p| p.is_file()) else {
        debug!(href = %href, "page not found");
        return not_found();
    };
    if !is_html(href) {
        return send_file(&path);
    }
    let raw = match std::fs::read(&path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read page");
            return not_found();
        }
    };
    match rewrite::rewrite_page(&raw, href, &ViewerRoutes) {
        Some(body) => {
            Html(render::render_page(&state.layout(), paths::basename(href), current, &body).into_string())
                .into_response()
        }
        // No charset: the browser reads it from the page or sniffs it.
        None => ([(header::CONTENT_TYPE, "text/html")], raw).into_response(),
    }
}

fn section(state: &AppState, title: &str, current: &str, items: &[ListItem], message: Option<&str>) -> Response {
    Html(render::render_section(&state.layout(), title, current, items, message).into_string()).into_response()
}

fn page_link(href: &str) -> String {
    format!("/page/{href}")
}

fn resource_item(r: &Resource) -> ListItem {
    let title = if r.href.is_empty() {
        r.identifier.clone()
    } else {
        paths::basename(&r.href).to_string()
    };
    ListItem {
        title,
        href: (!r.href.is_empty()).then(|| page_link(&r.href)),
        note: None,
    }
}

// ============================================================================
// File lookup
// ============================================================================

fn find_by_basename(root: &std::path::Path, name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    let web_root = root.join("web_resources");
    if !web_root.is_dir() {
        return None;
    }
    WalkDir::new(web_root)
        .into_iter()
        .filter_map(Result::ok)
        .find(|e| e.file_type().is_file() && e.file_name() == OsStr::new(name))
        .map(|e| e.into_path())
}

/// Locate `path` inside the export, tolerating the ways Canvas pages spell
/// file references: verbatim, with a placeholder prefix left in, rooted at
/// the wrong folder, or only matching by file name under `web_resources`.
pub fn lookup_export_file(export: &CanvasExport, path: &str) -> Option<PathBuf> {
    let root = export.root();
    let filebase_slash = format!("{FILE_BASE}/");
    let course_slash = format!("{COURSE_REFERENCE}/");
    let candidates = [
        path.to_string(),
        path.replace(&filebase_slash, ""),
        path.replace(FILE_BASE, ""),
        path.replace(&course_slash, ""),
        path.replace(COURSE_REFERENCE, ""),
    ];
    if let Some(found) = candidates
        .iter()
        .filter_map(|c| paths::safe_join(root, c))
        .find(|p| p.is_file())
    {
        return Some(found);
    }

    let rest = path.split_once('/').map_or(path, |(_, rest)| rest);
    if let Some(found) = paths::safe_join(root, &format!("web_resources/{rest}")).filter(|p| p.is_file()) {
        return Some(found);
    }

    find_by_basename(root, paths::basename(path))
}

fn lookup_resource_file(export: &CanvasExport, r: &Resource) -> Option<PathBuf> {
    let root = export.root();
    for f in &r.files {
        if let Some(p) = export.resolve_path(f).filter(|p| p.is_file()) {
            return Some(p);
        }
        let stripped = f.replace(&format!("{FILE_BASE}/"), "").replace(FILE_BASE, "");
        if let Some(p) = paths::safe_join(root, &stripped).filter(|p| p.is_file()) {
            return Some(p);
        }
    }
    export.resolve_path(&r.href).filter(|p| p.is_file())
}

// ============================================================================
// Handlers
// ============================================================================

async fn index(State(state): State<SharedState>) -> Response {
    let export = &state.export;
    let all_pages = export.list_pages();
    let pages: Vec<ListItem> = all_pages
        .iter()
        .map(|p| ListItem::link(p.title.clone(), page_link(&p.href)))
        .collect();
    let assets: Vec<ListItem> = all_pages
        .iter()
        .filter(|p| p.href.starts_with("web_resources") || p.href.starts_with("course_settings"))
        .map(|p| ListItem::link(p.title.clone(), page_link(&p.href)))
        .collect();

    let meta = export.course_metadata();
    let mut summary: Vec<(&'static str, String)> = Vec::new();
    if let Some(code) = meta.get("course_code") {
        summary.push(("Course code", code.to_string()));
    }
    if meta.get("start_at").is_some() {
        summary.push(("Starts", format::human_date(meta.get("start_at"))));
    }
    if meta.get("conclude_at").is_some() {
        summary.push(("Ends", format::human_date(meta.get("conclude_at"))));
    }
    let tools = export.external_tools();
    let link = |id: &str| {
        export
            .resource(id)
            .filter(|r| !r.href.is_empty())
            .map(|r| page_link(&r.href))
    };

    let view = IndexView {
        pages: &pages,
        assets: &assets,
        organizations: export.organizations(),
        resource_link: &link,
        summary: &summary,
        tools: &tools,
    };
    Html(render::render_index(&state.layout(), &view).into_string()).into_response()
}

async fn page(State(state): State<SharedState>, Path(href): Path<String>) -> Response {
    blocking(state, move |state| export_page(state, &href, "pages")).await
}

async fn static_file(State(state): State<SharedState>, Path(path): Path<String>) -> Response {
    if path == STYLESHEET {
        return ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], render::CSS).into_response();
    }
    blocking(state, move |state| match lookup_export_file(&state.export, &path) {
        Some(found) => send_file(&found),
        None => {
            debug!(path = %path, "static file not found");
            not_found()
        }
    })
    .await
}

async fn file_proxy(State(state): State<SharedState>, Path(reference): Path<String>) -> Response {
    blocking(state, move |state| {
        let export = &state.export;
        let resource = export
            .resource(&reference)
            .or_else(|| export.href_to_resource(&reference));
        if let Some(found) = resource.and_then(|r| lookup_resource_file(export, r)) {
            return send_file(&found);
        }
        match lookup_export_file(export, &reference) {
            Some(found) => send_file(&found),
            None => not_found(),
        }
    })
    .await
}

async fn syllabus(State(state): State<SharedState>) -> Response {
    blocking(state, |state| match state.export.syllabus() {
        Some(r) => export_page(state, &r.href, "syllabus"),
        None => section(state, "Syllabus", "syllabus", &[], Some("No syllabus found")),
    })
    .await
}

async fn home(State(state): State<SharedState>) -> Response {
    blocking(state, |state| {
        let export = &state.export;
        let href = HOME_CANDIDATES
            .iter()
            .find_map(|c| export.href_to_resource(c).map(|r| r.href.clone()))
            .or_else(|| export.pages_by_folder("wiki_content").into_iter().next().map(|p| p.href));
        match href {
            Some(href) => export_page(state, &href, "home"),
            None => section(state, "Home", "home", &[], Some("Welcome!")),
        }
    })
    .await
}

async fn files(State(state): State<SharedState>) -> Response {
    blocking(state, |state| {
        let items: Vec<ListItem> = state
            .export
            .files()
            .into_iter()
            .map(|f| ListItem::link(f.title, format!("/file/{}", f.id)).with_note(f.date))
            .collect();
        section(state, "Files", "files", &items, None)
    })
    .await
}

async fn assignments(State(state): State<SharedState>) -> Response {
    let items: Vec<ListItem> = state
        .export
        .assignments()
        .into_iter()
        .map(|a| ListItem::link(a.title, page_link(&a.href)))
        .collect();
    section(&state, "Assignments", "assignments", &items, None)
}

async fn pages(State(state): State<SharedState>) -> Response {
    let items: Vec<ListItem> = state
        .export
        .pages_by_folder("wiki_content")
        .into_iter()
        .map(|p| ListItem::link(p.title, page_link(&p.href)))
        .collect();
    section(&state, "Pages", "pages", &items, None)
}

async fn modules(State(state): State<SharedState>) -> Response {
    let modules: Vec<ModuleView> = state
        .export
        .modules()
        .into_iter()
        .map(|m| ModuleView {
            title: m.title,
            items: m
                .items
                .into_iter()
                .map(|it| ListItem {
                    title: it.title.unwrap_or_else(|| "Untitled".to_string()),
                    href: it.href.as_deref().map(page_link),
                    note: None,
                })
                .collect(),
        })
        .collect();
    Html(render::render_modules(&state.layout(), &modules).into_string()).into_response()
}

async fn announcements(State(state): State<SharedState>) -> Response {
    let items: Vec<ListItem> = state.export.categorize().announcements.into_iter().map(resource_item).collect();
    section(&state, "Announcements", "announcements", &items, None)
}

async fn quizzes(State(state): State<SharedState>) -> Response {
    let items: Vec<ListItem> = state.export.categorize().quizzes.into_iter().map(resource_item).collect();
    section(&state, "Quizzes", "quizzes", &items, None)
}

async fn discussions(State(state): State<SharedState>) -> Response {
    let items: Vec<ListItem> = state.export.categorize().discussions.into_iter().map(resource_item).collect();
    section(&state, "Discussions", "discussions", &items, None)
}

async fn people(State(state): State<SharedState>) -> Response {
    let items: Vec<ListItem> = state.export.categorize().people.into_iter().map(resource_item).collect();
    section(&state, "People", "people", &items, None)
}

async fn canvas_data(State(state): State<SharedState>) -> Response {
    blocking(state, dashboard).await
}

/// Counts, humanized settings, tools and the external link report.
fn dashboard(state: &AppState) -> Response {
    let export = &state.export;
    let cats = export.categorize();
    let counts = [
        ("Pages", export.pages_by_folder("wiki_content").len()),
        ("Files", export.files().len()),
        ("Modules", export.modules().len()),
        ("Quizzes", cats.quizzes.len()),
        ("Discussions", cats.discussions.len()),
        ("Announcements", cats.announcements.len()),
    ];

    let meta = export.course_metadata();
    let fields: Vec<(String, String)> = if meta.is_empty() {
        Vec::new()
    } else {
        vec![
            ("Title".to_string(), meta.get("title").map_or_else(|| state.title.clone(), String::from)),
            ("Course code".to_string(), meta.get("course_code").unwrap_or(format::MISSING).to_string()),
            ("Starts".to_string(), format::human_date(meta.get("start_at"))),
            ("Ends".to_string(), format::human_date(meta.get("conclude_at"))),
            ("Public".to_string(), format::yes_no(meta.get("is_public"))),
            ("Public syllabus".to_string(), format::yes_no(meta.get("public_syllabus"))),
            ("Storage quota".to_string(), format::human_size(meta.get("storage_quota"))),
            (
                "Grading standard".to_string(),
                meta.get("grading_standard_id").unwrap_or(format::MISSING).to_string(),
            ),
        ]
    };
    let tabs = meta.get("tab_configuration").map(format::pretty_json);
    let tools = export.external_tools();
    let links = export.external_links(&state.internal_domains);

    let view = Dashboard {
        counts: &counts,
        fields: &fields,
        tab_configuration: tabs.as_deref(),
        tools: &tools,
        links: &links,
    };
    Html(render::render_dashboard(&state.layout(), &view).into_string()).into_response()
}
