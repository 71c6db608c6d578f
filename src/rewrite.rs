//! Link rewriting for exported HTML pages.
//!
//! Canvas pages link to each other with paths relative to their own
//! location, or through placeholders that only mean something inside
//! Canvas:
//!
//! | Value | Target |
//! |-------|--------|
//! | `$CANVAS_COURSE_REFERENCE$/modules` | modules section |
//! | `$CANVAS_COURSE_REFERENCE$/pages/…` | pages section |
//! | `$CANVAS_COURSE_REFERENCE$/<tail>` | `<tail>` at the site root |
//! | `$IMS-CC-FILEBASE$/<tail>` | asset `web_resources/<tail>` |
//! | `$WIKI_REFERENCE$/pages/<slug>` | page `wiki_content/<slug>.html` |
//! | `../c.html` (from `wiki_content/a/`) | page `wiki_content/c.html` |
//! | `/web_resources/x.png` | asset `web_resources/x.png` |
//!
//! Absolute URLs (`http:`, `https:`, `mailto:`, `data:`, `tel:`,
//! `javascript:`), protocol-relative `//host/…` and `#anchors` are left
//! alone.
//!
//! How a resolved target is written back depends on who serves the result,
//! which is what [`Routes`] abstracts: the interactive viewer uses
//! site-relative routes ([`ViewerRoutes`]), the static export uses paths
//! relative to the page's directory ([`RelativeRoutes`]).
//!
//! Host styling is removed before rewriting: every `style` attribute,
//! every `<style>` element, and every `<link>` that is a stylesheet.

use crate::paths;
use html5ever::serialize::{SerializeOpts, serialize};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{ParseOpts, parse_document};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use tracing::debug;

pub const COURSE_REFERENCE: &str = "$CANVAS_COURSE_REFERENCE$";
pub const FILE_BASE: &str = "$IMS-CC-FILEBASE$";
pub const WIKI_REFERENCE: &str = "$WIKI_REFERENCE$";

const PASSTHROUGH_SCHEMES: &[&str] = &["http:", "https:", "mailto:", "data:", "tel:", "javascript:"];

/// Where a rewritten link should point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// An export-relative HTML page.
    Page(String),
    /// Any other export-relative file.
    Asset(String),
    /// A top-level listing: `modules` or `pages`.
    Section(&'static str),
    /// A path at the site root.
    Root(String),
}

/// Output convention for rewritten links.
pub trait Routes {
    /// Render `target` as a link written into a page that lives in
    /// `from_dir` (export-relative).
    fn route(&self, from_dir: &str, target: &Target) -> String;
}

/// Site-relative routes of the interactive viewer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewerRoutes;

impl Routes for ViewerRoutes {
    fn route(&self, _from_dir: &str, target: &Target) -> String {
        match target {
            Target::Page(p) => format!("/page/{p}"),
            Target::Asset(p) => format!("/static/{p}"),
            Target::Section(name) => format!("/{name}"),
            Target::Root(tail) => format!("/{tail}"),
        }
    }
}

/// Paths relative to the page's own directory, for a static copy of the
/// export. Sections resolve to `<name>.html` at the course root.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelativeRoutes;

impl Routes for RelativeRoutes {
    fn route(&self, from_dir: &str, target: &Target) -> String {
        match target {
            Target::Page(p) | Target::Asset(p) | Target::Root(p) => paths::relative_to(from_dir, p),
            Target::Section(name) => paths::relative_to(from_dir, &format!("{name}.html")),
        }
    }
}

fn passes_through(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    value.starts_with('#')
        || value.starts_with("//")
        || PASSTHROUGH_SCHEMES.iter().any(|s| lower.starts_with(s))
}

/// Classify an attribute value found in a page under `base_dir`.
/// `None` means leave the value untouched.
pub fn resolve_target(value: &str, base_dir: &str) -> Option<(Target, String)> {
    let value = value.trim();
    if value.is_empty() || passes_through(value) {
        return None;
    }

    if let Some(rest) = value.strip_prefix(COURSE_REFERENCE) {
        let tail = rest.trim_start_matches('/');
        let target = if tail.starts_with("modules") {
            Target::Section("modules")
        } else if tail.starts_with("pages") {
            Target::Section("pages")
        } else {
            Target::Root(tail.to_string())
        };
        return Some((target, String::new()));
    }

    if let Some(rest) = value.strip_prefix(FILE_BASE) {
        let (path, suffix) = paths::split_suffix(rest.trim_start_matches('/'));
        let target = Target::Asset(format!("web_resources/{path}"));
        return Some((target, suffix.to_string()));
    }

    if let Some(rest) = value.strip_prefix(WIKI_REFERENCE) {
        let (path, suffix) = paths::split_suffix(rest.trim_start_matches('/'));
        let target = match path.strip_prefix("pages/") {
            Some(slug) if !slug.is_empty() => Target::Page(format!("wiki_content/{slug}.html")),
            _ => Target::Section("pages"),
        };
        return Some((target, suffix.to_string()));
    }

    let (path, suffix) = paths::split_suffix(value);
    if path.is_empty() {
        return None;
    }
    let resolved = match path.strip_prefix('/') {
        Some(_) => path.trim_start_matches('/').to_string(),
        None => paths::normalize(&paths::join(base_dir, path)),
    };
    let target = if resolved.to_lowercase().ends_with(".html") {
        Target::Page(resolved)
    } else {
        Target::Asset(resolved)
    };
    Some((target, suffix.to_string()))
}

/// Rewrite a single attribute value found in a page under `base_dir`.
pub fn rewrite_url(value: &str, base_dir: &str, routes: &dyn Routes) -> String {
    match resolve_target(value, base_dir) {
        Some((target, suffix)) => format!("{}{suffix}", routes.route(base_dir, &target)),
        None => value.to_string(),
    }
}

/// Blank and non-UTF-8 input is not parsed, so legacy-encoded pages reach
/// the browser byte for byte.
fn parse(raw: &[u8]) -> Option<RcDom> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    if let Err(e) = std::str::from_utf8(raw) {
        debug!(error = %e, "page is not UTF-8");
        return None;
    }
    match parse_document(RcDom::default(), ParseOpts::default())
        .from_utf8()
        .read_from(&mut &raw[..])
    {
        Ok(dom) => Some(dom),
        Err(e) => {
            debug!(error = %e, "unparsable page");
            None
        }
    }
}

fn local_name(handle: &Handle) -> Option<&str> {
    match handle.data {
        NodeData::Element { ref name, .. } => Some(&*name.local),
        _ => None,
    }
}

fn attr(handle: &Handle, key: &str) -> Option<String> {
    match handle.data {
        NodeData::Element { ref attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| &*a.name.local == key)
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

fn is_host_styling(handle: &Handle) -> bool {
    match local_name(handle) {
        Some("style") => true,
        Some("link") => {
            let rel = attr(handle, "rel").unwrap_or_default().to_lowercase();
            let kind = attr(handle, "type").unwrap_or_default().to_lowercase();
            rel.contains("stylesheet") || kind == "text/css"
        }
        _ => false,
    }
}

fn strip_styling(handle: &Handle) {
    handle.children.borrow_mut().retain(|c| !is_host_styling(c));
    if let NodeData::Element { ref attrs, .. } = handle.data {
        attrs.borrow_mut().retain(|a| &*a.name.local != "style");
    }
    let children: Vec<Handle> = handle.children.borrow().clone();
    for child in &children {
        strip_styling(child);
    }
}

fn rewrite_links(handle: &Handle, base_dir: &str, routes: &dyn Routes) {
    if let NodeData::Element { ref name, ref attrs, .. } = handle.data {
        let key = match &*name.local {
            "a" | "link" => Some("href"),
            "img" | "script" => Some("src"),
            _ => None,
        };
        if let Some(key) = key {
            for a in attrs.borrow_mut().iter_mut() {
                if &*a.name.local == key && !a.value.is_empty() {
                    let rewritten = rewrite_url(&a.value, base_dir, routes);
                    a.value = StrTendril::from(rewritten);
                }
            }
        }
    }
    for child in handle.children.borrow().iter() {
        rewrite_links(child, base_dir, routes);
    }
}

fn find_element(handle: &Handle, tag: &str) -> Option<Handle> {
    if local_name(handle) == Some(tag) {
        return Some(handle.clone());
    }
    handle
        .children
        .borrow()
        .iter()
        .find_map(|c| find_element(c, tag))
}

fn serialize_children(handle: &Handle) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let node = SerializableHandle::from(handle.clone());
    match serialize(&mut out, &node, SerializeOpts::default()) {
        Ok(()) => Some(out),
        Err(e) => {
            debug!(error = %e, "serialization failed");
            None
        }
    }
}

fn transform(raw: &[u8], page_href: &str, routes: &dyn Routes) -> Option<RcDom> {
    let dom = parse(raw)?;
    let base_dir = paths::dirname(page_href);
    strip_styling(&dom.document);
    rewrite_links(&dom.document, base_dir, routes);
    Some(dom)
}

/// Rewrite a whole document. Unparsable input comes back unchanged.
pub fn rewrite_html(raw: &[u8], page_href: &str, routes: &dyn Routes) -> Vec<u8> {
    transform(raw, page_href, routes)
        .and_then(|dom| serialize_children(&dom.document))
        .unwrap_or_else(|| raw.to_vec())
}

/// Rewrite a page and return the serialized children of its `<body>`, for
/// embedding in a layout. `None` when the input cannot be parsed; callers
/// then send it raw.
pub fn rewrite_page(raw: &[u8], page_href: &str, routes: &dyn Routes) -> Option<String> {
    let dom = transform(raw, page_href, routes)?;
    let body = match find_element(&dom.document, "body") {
        Some(body) => serialize_children(&body)?,
        None => serialize_children(&dom.document)?,
    };
    String::from_utf8(body).ok()
}
