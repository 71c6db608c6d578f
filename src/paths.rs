//! Posix-style path helpers for export-relative hrefs.
//!
//! Every path inside a course export is a forward-slash string relative to the
//! export root (`wiki_content/week-1/intro.html`), regardless of the host OS.
//! These helpers operate on those strings directly instead of going through
//! `std::path`, so dot-segment handling matches what a browser would do with
//! the same relative link.
//!
//! ## Normalization
//!
//! [`normalize`] collapses `//`, drops `.` segments and resolves `..` against
//! the preceding segment:
//!
//! - `wiki_content/a/../c.html` → `wiki_content/c.html`
//! - `./images//x.png` → `images/x.png`
//! - `../outside.html` → `../outside.html` (leading `..` is kept)
//! - `` → `.`

use std::path::{Path, PathBuf};

/// Last path segment, or the whole string when there is no slash.
///
/// - `wiki_content/welcome.html` → `welcome.html`
/// - `web_resources/dir/` → `` (trailing slash means no file name)
pub fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

/// Everything before the last slash, or `` for a bare file name.
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(pos) => &path[..pos],
        None => "",
    }
}

/// Join a relative `path` onto `base`. An absolute `path` replaces `base`.
pub fn join(base: &str, path: &str) -> String {
    if path.starts_with('/') || base.is_empty() {
        path.to_string()
    } else if base.ends_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Resolve `.`, `..` and empty segments. See the module docs for examples.
pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Relative path from directory `from_dir` to `target`, both export-relative.
///
/// ```text
/// relative_to("wiki_content/a", "wiki_content/c.html") == "../c.html"
/// relative_to("", "web_resources/x.png")              == "web_resources/x.png"
/// relative_to("wiki_content", "wiki_content")          == "."
/// ```
pub fn relative_to(from_dir: &str, target: &str) -> String {
    let from = normalize(from_dir);
    let to = normalize(target);
    let from_parts: Vec<&str> = from.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    let to_parts: Vec<&str> = to.split('/').filter(|s| !s.is_empty() && *s != ".").collect();

    let common = from_parts
        .iter()
        .zip(&to_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut out: Vec<&str> = vec![".."; from_parts.len() - common];
    out.extend(&to_parts[common..]);
    if out.is_empty() {
        ".".to_string()
    } else {
        out.join("/")
    }
}

/// Split `page.html?x=1#top` into (`page.html`, `?x=1#top`).
pub fn split_suffix(value: &str) -> (&str, &str) {
    match value.find(['?', '#']) {
        Some(pos) => value.split_at(pos),
        None => (value, ""),
    }
}

/// Join an export-relative href onto `root`, refusing anything that climbs
/// out of it after normalization.
pub fn safe_join(root: &Path, href: &str) -> Option<PathBuf> {
    let normalized = normalize(href.trim_start_matches('/'));
    if normalized == "." {
        return Some(root.to_path_buf());
    }
    if normalized.starts_with("..") || normalized.starts_with('/') {
        return None;
    }
    Some(root.join(normalized))
}
