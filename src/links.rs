//! External link scanner.
//!
//! Collects absolute http(s) URLs referenced by the export and keeps the ones
//! pointing outside the institution's own domains. Internal domains are
//! given as patterns:
//!
//! - `https://canvas.example.edu` → exact host `canvas.example.edu`, plus
//!   `www.canvas.example.edu`
//! - `*.instructure.com` → `instructure.com` and any subdomain of it
//!
//! Sources are scanned in a fixed order and the result keeps discovery
//! order, deduplicated by exact URL string:
//!
//! 1. resource hrefs
//! 2. resource file lists
//! 3. `href`/`src` attributes of every element in HTML-ish resources
//! 4. raw text of `course_settings.xml`

use crate::manifest::CanvasExport;
use html5ever::tendril::TendrilSink;
use html5ever::{ParseOpts, parse_document};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s"'>)]+"#).expect("valid url regex")
});

/// A single internal-domain rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainRule {
    Exact(String),
    /// Host equals the suffix or ends with `.suffix`.
    Suffix(String),
}

impl DomainRule {
    pub fn matches(&self, host: &str) -> bool {
        match self {
            DomainRule::Exact(h) => host == h,
            DomainRule::Suffix(s) => {
                host == s
                    || host
                        .strip_suffix(s.as_str())
                        .is_some_and(|rest| rest.ends_with('.'))
            }
        }
    }
}

/// Reduce a domain pattern to a bare lowercase host: drop the scheme,
/// userinfo, port, path, query and fragment.
pub fn normalize_domain(entry: &str) -> String {
    let mut s = entry.trim().to_lowercase();
    if let Some(pos) = s.find("://") {
        s.drain(..pos + 3);
    }
    if let Some(end) = s.find(['/', '?', '#']) {
        s.truncate(end);
    }
    if let Some(at) = s.rfind('@') {
        s.drain(..=at);
    }
    if let Some(colon) = s.find(':') {
        s.truncate(colon);
    }
    s
}

/// Build rules from domain patterns. Blank entries are ignored.
pub fn domain_rules<S: AsRef<str>>(domains: &[S]) -> Vec<DomainRule> {
    let mut rules = Vec::new();
    for entry in domains {
        let host = normalize_domain(entry.as_ref());
        if host.is_empty() {
            continue;
        }
        if let Some(suffix) = host.strip_prefix("*.") {
            if !suffix.is_empty() {
                rules.push(DomainRule::Suffix(suffix.to_string()));
            }
        } else {
            if !host.starts_with("www.") {
                rules.push(DomainRule::Exact(format!("www.{host}")));
            }
            rules.push(DomainRule::Exact(host));
        }
    }
    rules
}

/// Host of a URL that `Url::parse` rejects, e.g. for an out-of-range port:
/// the authority between `//` and the next `/`, `?` or `#`, without
/// userinfo or port.
fn authority_host(href: &str) -> Option<String> {
    let (_, rest) = href.split_once("//")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = authority.split(':').next()?;
    (!host.is_empty()).then(|| host.to_lowercase())
}

/// True for an absolute http(s) URL whose host matches none of `rules`.
/// URLs without a host are not external.
pub fn is_external(href: &str, rules: &[DomainRule]) -> bool {
    let href = href.trim();
    let lower = href.to_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return false;
    }
    let host = match Url::parse(href) {
        Ok(url) => url.host_str().map(str::to_lowercase),
        Err(_) => authority_host(href),
    };
    match host {
        Some(host) if !host.is_empty() => !rules.iter().any(|r| r.matches(&host)),
        _ => false,
    }
}

/// One external URL and where it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalLink {
    pub href: String,
    /// `resource:<id>`, `resource-file:<id>`, `page:<href>` or `course_settings`.
    pub source: String,
    /// The URL itself, the element name, or the settings field.
    pub context: String,
}

struct Collector<'r> {
    rules: &'r [DomainRule],
    seen: HashSet<String>,
    links: Vec<ExternalLink>,
}

impl Collector<'_> {
    fn offer(&mut self, href: &str, source: &str, context: &str) {
        if is_external(href, self.rules) && self.seen.insert(href.to_string()) {
            self.links.push(ExternalLink {
                href: href.to_string(),
                source: source.to_string(),
                context: context.to_string(),
            });
        }
    }

    fn offer_text(&mut self, text: &str, source: &str, context: &str) {
        for m in URL_RE.find_iter(text) {
            self.offer(m.as_str(), source, context);
        }
    }
}

fn is_html_like(href: &str) -> bool {
    href.to_lowercase().ends_with(".html")
        || href.starts_with("wiki_content")
        || href.starts_with("course_settings")
}

/// `(tag, value)` for every `href` then `src` attribute in document order.
fn attribute_urls(handle: &Handle, out: &mut Vec<(String, String)>) {
    if let NodeData::Element { ref name, ref attrs, .. } = handle.data {
        let attrs = attrs.borrow();
        for wanted in ["href", "src"] {
            if let Some(attr) = attrs.iter().find(|a| &*a.name.local == wanted) {
                out.push((name.local.to_string(), attr.value.to_string()));
            }
        }
    }
    for child in handle.children.borrow().iter() {
        attribute_urls(child, out);
    }
}

impl CanvasExport {
    /// External links, excluding hosts covered by `internal_domains`.
    pub fn external_links<S: AsRef<str>>(&self, internal_domains: &[S]) -> Vec<ExternalLink> {
        let rules = domain_rules(internal_domains);
        let mut c = Collector {
            rules: &rules,
            seen: HashSet::new(),
            links: Vec::new(),
        };

        for r in self.resources() {
            if !r.href.is_empty() {
                c.offer(&r.href, &format!("resource:{}", r.identifier), &r.href);
            }
        }

        for r in self.resources() {
            let source = format!("resource-file:{}", r.identifier);
            for f in &r.files {
                c.offer(f, &source, f);
            }
        }

        for r in self.resources() {
            if r.href.is_empty() || !is_html_like(&r.href) {
                continue;
            }
            let Some(path) = self.resolve_path(&r.href) else {
                continue;
            };
            let bytes = match fs::read(&path) {
                Ok(b) => b,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping unreadable page");
                    continue;
                }
            };
            let source = format!("page:{}", r.href);
            match parse_document(RcDom::default(), ParseOpts::default())
                .from_utf8()
                .read_from(&mut &bytes[..])
            {
                Ok(dom) => {
                    let mut found = Vec::new();
                    attribute_urls(&dom.document, &mut found);
                    for (tag, value) in found {
                        c.offer(&value, &source, &tag);
                    }
                }
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "falling back to text scan");
                    c.offer_text(&String::from_utf8_lossy(&bytes), &source, "text");
                }
            }
        }

        if let Some(text) = self.settings_text() {
            c.offer_text(text, "course_settings", "tab_configuration");
        }

        c.links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use tempfile::TempDir;

    const CANVAS: &[&str] = &["https://*.instructure.com"];

    // =========================================================================
    // Domain rules
    // =========================================================================

    #[test]
    fn normalize_strips_scheme_path_and_port() {
        assert_eq!(normalize_domain(" HTTPS://Canvas.Example.edu:443/courses "), "canvas.example.edu");
        assert_eq!(normalize_domain("user@host.edu"), "host.edu");
        assert_eq!(normalize_domain("*.instructure.com"), "*.instructure.com");
    }

    #[test]
    fn wildcard_becomes_suffix_rule() {
        assert_eq!(
            domain_rules(CANVAS),
            vec![DomainRule::Suffix("instructure.com".to_string())]
        );
    }

    #[test]
    fn exact_entry_adds_www_variant() {
        assert_eq!(
            domain_rules(&["canvas.example.edu"]),
            vec![
                DomainRule::Exact("www.canvas.example.edu".to_string()),
                DomainRule::Exact("canvas.example.edu".to_string()),
            ]
        );
    }

    #[test]
    fn blank_entries_ignored() {
        assert!(domain_rules(&["", "  ", "https://"]).is_empty());
    }

    #[test]
    fn subdomain_excluded_by_wildcard() {
        let rules = domain_rules(CANVAS);
        assert!(!is_external("https://princeton.instructure.com/courses/1", &rules));
        assert!(!is_external("https://a.b.instructure.com/", &rules));
    }

    #[test]
    fn bare_domain_excluded_by_wildcard() {
        let rules = domain_rules(CANVAS);
        assert!(!is_external("https://instructure.com/", &rules));
    }

    #[test]
    fn lookalike_domain_is_external() {
        let rules = domain_rules(CANVAS);
        assert!(is_external("https://notinstructure.com/", &rules));
        assert!(is_external("https://instructure.com.evil.io/", &rules));
    }

    #[test]
    fn www_variant_only_for_exact_rules() {
        let exact = domain_rules(&["example.edu"]);
        assert!(!is_external("https://www.example.edu/a", &exact));
        assert!(is_external("https://cs.example.edu/a", &exact));

        let wildcard = domain_rules(&["*.example.edu"]);
        assert!(!is_external("https://www.example.edu/a", &wildcard));
    }

    #[test]
    fn non_http_and_unparsable_not_external() {
        let rules = domain_rules(CANVAS);
        assert!(!is_external("mailto:a@b.edu", &rules));
        assert!(!is_external("wiki_content/a.html", &rules));
        assert!(!is_external("//cdn.example.com/x.js", &rules));
        assert!(!is_external("http://", &rules));
        assert!(is_external("HTTPS://Example.COM/x", &rules));
    }

    #[test]
    fn host_read_when_url_rejects_port() {
        let rules = domain_rules(CANVAS);
        assert!(is_external("https://example.com:99999/x", &rules));
        assert!(!is_external("https://princeton.instructure.com:99999/x", &rules));
        assert!(is_external("http://user@Example.com:70000?q=1", &rules));
    }

    #[test]
    fn authority_host_parts() {
        assert_eq!(authority_host("https://a.edu:99999/x").as_deref(), Some("a.edu"));
        assert_eq!(authority_host("https://u:p@B.edu#f").as_deref(), Some("b.edu"));
        assert_eq!(authority_host("https:///x"), None);
        assert_eq!(authority_host("no-authority"), None);
    }

    // =========================================================================
    // Scanner
    // =========================================================================

    #[test]
    fn fixture_links_in_discovery_order() {
        let tmp = setup_fixtures();
        let export = CanvasExport::open(tmp.path()).unwrap();
        let links = export.external_links(CANVAS);
        let hrefs: Vec<&str> = links.iter().map(|l| l.href.as_str()).collect();
        assert_eq!(
            hrefs,
            vec![
                "https://princeton.hosted.panopto.com/Panopto/Pages/Viewer.aspx?id=42",
                "https://cdn.example.com/canvas.css",
                "https://www.khanacademy.org/math/statistics",
                "https://zoom.us/lti",
            ]
        );
    }

    #[test]
    fn fixture_link_sources() {
        let tmp = setup_fixtures();
        let export = CanvasExport::open(tmp.path()).unwrap();
        let links = export.external_links(CANVAS);

        assert_eq!(links[0].source, "resource-file:R_REC");
        assert_eq!(links[1].source, "page:wiki_content/welcome.html");
        assert_eq!(links[1].context, "link");
        assert_eq!(links[2].context, "a");
        assert_eq!(links[3].source, "course_settings");
        assert_eq!(links[3].context, "tab_configuration");
    }

    #[test]
    fn no_internal_domains_reports_canvas_links() {
        let tmp = setup_fixtures();
        let export = CanvasExport::open(tmp.path()).unwrap();
        let none: &[&str] = &[];
        let links = export.external_links(none);
        assert!(links
            .iter()
            .any(|l| l.href == "https://princeton.instructure.com/courses/1234"));
    }

    #[test]
    fn duplicates_reported_once_at_first_sighting() {
        let tmp = TempDir::new().unwrap();
        write_manifest(
            tmp.path(),
            r#"<resource identifier="A" href="https://ext.example.org/x">
                 <file href="https://ext.example.org/x"/>
               </resource>
               <resource identifier="B" href="https://ext.example.org/x"/>"#,
            "",
        );
        let export = CanvasExport::open(tmp.path()).unwrap();
        let links = export.external_links(CANVAS);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].source, "resource:A");
        assert_eq!(links[0].context, "https://ext.example.org/x");
    }

    #[test]
    fn missing_pages_are_skipped() {
        let tmp = TempDir::new().unwrap();
        write_manifest(tmp.path(), r#"<resource identifier="A" href="wiki_content/gone.html"/>"#, "");
        let export = CanvasExport::open(tmp.path()).unwrap();
        assert!(export.external_links(CANVAS).is_empty());
    }
}
