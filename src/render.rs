//! HTML templates shared by the viewer and the static export.
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating.
//! Templates only lay out data they are given: link targets are computed by
//! the caller, because the viewer links with site-relative routes and the
//! static export with paths relative to each output file.
//!
//! Exported page bodies are inserted as pre-escaped HTML after going through
//! [`crate::rewrite`]; everything else is escaped by maud.

use crate::links::ExternalLink;
use crate::manifest::OrganizationItem;
use maud::{DOCTYPE, Markup, PreEscaped, html};

/// The bundled stylesheet.
pub const CSS: &str = include_str!("../static/viewer.css");

/// One entry of the sidebar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavLink {
    /// Stable key used to mark the current section.
    pub key: &'static str,
    pub label: &'static str,
    pub href: String,
}

/// Chrome around every page.
#[derive(Debug, Clone, Copy)]
pub struct Layout<'a> {
    pub course_title: &'a str,
    pub home_href: &'a str,
    pub stylesheet_href: &'a str,
    pub nav: &'a [NavLink],
}

/// A row in a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub title: String,
    pub href: Option<String>,
    /// Secondary text shown after the title, e.g. a date.
    pub note: Option<String>,
}

impl ListItem {
    pub fn link(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            href: Some(href.into()),
            note: None,
        }
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }
}

/// A module with its items already resolved to links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleView {
    pub title: String,
    pub items: Vec<ListItem>,
}

// ============================================================================
// HTML Components
// ============================================================================

/// Renders the base HTML document structure
pub fn base_document(title: &str, stylesheet_href: &str, body_class: Option<&str>, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                link rel="stylesheet" href=(stylesheet_href);
            }
            body class=[body_class] {
                (content)
            }
        }
    }
}

pub fn render_nav(items: &[NavLink], current: &str) -> Markup {
    html! {
        nav.site-nav {
            ul {
                @for item in items {
                    li class=[(item.key == current).then_some("current")] {
                        a href=(item.href) { (item.label) }
                    }
                }
            }
        }
    }
}

/// Header, sidebar and main column around `content`.
fn shell(layout: &Layout, page_title: &str, current: &str, body_class: &str, content: Markup) -> Markup {
    let doc_title = if page_title == layout.course_title {
        page_title.to_string()
    } else {
        format!("{page_title} · {}", layout.course_title)
    };
    let body = html! {
        header.site-header {
            a.course-title href=(layout.home_href) { (layout.course_title) }
        }
        div.layout {
            (render_nav(layout.nav, current))
            main {
                (content)
            }
        }
    };
    base_document(&doc_title, layout.stylesheet_href, Some(body_class), body)
}

fn item_list(items: &[ListItem]) -> Markup {
    html! {
        ul.item-list {
            @for item in items {
                li {
                    @match &item.href {
                        Some(href) => { a href=(href) { (item.title) } }
                        None => { span { (item.title) } }
                    }
                    @if let Some(note) = &item.note {
                        span.note { "(" (note) ")" }
                    }
                }
            }
        }
    }
}

fn modules_list(modules: &[ModuleView]) -> Markup {
    html! {
        @for module in modules {
            section.module {
                h3 { (module.title) }
                (item_list(&module.items))
            }
        }
    }
}

/// Organization tree; items referencing a resource link through `link`.
fn org_tree(items: &[OrganizationItem], link: &dyn Fn(&str) -> Option<String>) -> Markup {
    html! {
        ul {
            @for item in items {
                @let title = item.title.as_deref().or(item.identifierref.as_deref()).unwrap_or("Untitled");
                li {
                    @match item.identifierref.as_deref().and_then(link) {
                        Some(href) => { a href=(href) { (title) } }
                        None => { span { (title) } }
                    }
                    @if !item.children.is_empty() {
                        (org_tree(&item.children, link))
                    }
                }
            }
        }
    }
}

// ============================================================================
// Page Renderers
// ============================================================================

/// An exported page, already rewritten, inside the layout.
pub fn render_page(layout: &Layout, title: &str, current: &str, body_html: &str) -> Markup {
    let content = html! {
        h1 { (title) }
        article.page-content {
            (PreEscaped(body_html))
        }
    };
    shell(layout, title, current, "page-view", content)
}

/// A titled listing, or `message` when there is nothing to list.
pub fn render_section(
    layout: &Layout,
    title: &str,
    current: &str,
    items: &[ListItem],
    message: Option<&str>,
) -> Markup {
    let content = html! {
        h1 { (title) }
        @if let Some(message) = message {
            p.message { (message) }
        }
        @if !items.is_empty() {
            (item_list(items))
        } @else if message.is_none() {
            p.message { "Nothing here." }
        }
    };
    shell(layout, title, current, "section-view", content)
}

pub fn render_modules(layout: &Layout, modules: &[ModuleView]) -> Markup {
    let content = html! {
        h1 { "Modules" }
        @if modules.is_empty() {
            p.message { "No modules found" }
        } @else {
            (modules_list(modules))
        }
    };
    shell(layout, "Modules", "modules", "modules-view", content)
}

/// Viewer landing page.
pub struct IndexView<'a> {
    pub pages: &'a [ListItem],
    pub assets: &'a [ListItem],
    pub organizations: &'a [OrganizationItem],
    pub resource_link: &'a dyn Fn(&str) -> Option<String>,
    pub summary: &'a [(&'static str, String)],
    pub tools: &'a [String],
}

pub fn render_index(layout: &Layout, view: &IndexView) -> Markup {
    let content = html! {
        h1 { (layout.course_title) }
        @if !view.summary.is_empty() {
            table.metadata {
                @for (label, value) in view.summary {
                    tr { th { (label) } td { (value) } }
                }
            }
        }
        @if !view.tools.is_empty() {
            h2 { "External tools" }
            ul { @for tool in view.tools { li { (tool) } } }
        }
        @if !view.organizations.is_empty() {
            h2 { "Organization" }
            div.org-tree { (org_tree(view.organizations, view.resource_link)) }
        }
        h2 { "Pages" }
        (item_list(view.pages))
        @if !view.assets.is_empty() {
            h2 { "Files and settings" }
            (item_list(view.assets))
        }
    };
    shell(layout, layout.course_title, "index", "index-view", content)
}

/// Metadata dashboard.
pub struct Dashboard<'a> {
    pub counts: &'a [(&'static str, usize)],
    pub fields: &'a [(String, String)],
    pub tab_configuration: Option<&'a str>,
    pub tools: &'a [String],
    pub links: &'a [ExternalLink],
}

pub fn render_dashboard(layout: &Layout, view: &Dashboard) -> Markup {
    let content = html! {
        h1 { "Canvas data" }
        h2 { "Contents" }
        table.metadata {
            @for (label, count) in view.counts {
                tr { th { (label) } td { (count) } }
            }
        }
        h2 { "Course settings" }
        @if view.fields.is_empty() {
            p.message { "No course settings found" }
        } @else {
            table.metadata {
                @for (key, value) in view.fields {
                    tr { th { (key) } td { (value) } }
                }
            }
        }
        @if let Some(tabs) = view.tab_configuration {
            h2 { "Tab configuration" }
            pre.json { (tabs) }
        }
        h2 { "External tools" }
        @if view.tools.is_empty() {
            p.message { "None detected" }
        } @else {
            ul { @for tool in view.tools { li { (tool) } } }
        }
        h2 { "External links" }
        @if view.links.is_empty() {
            p.message { "None found" }
        } @else {
            table.metadata {
                tr { th { "URL" } th { "Found in" } th { "Context" } }
                @for link in view.links {
                    tr {
                        td { a href=(link.href) rel="noopener" { (link.href) } }
                        td { (link.source) }
                        td { (link.context) }
                    }
                }
            }
        }
    };
    shell(layout, "Canvas data", "canvas-data", "dashboard-view", content)
}

/// Static export course landing page.
pub fn render_course_index(
    layout: &Layout,
    pages: &[ListItem],
    files: &[ListItem],
    modules: &[ModuleView],
    back_href: &str,
) -> Markup {
    let content = html! {
        h1 { (layout.course_title) }
        h2 { "Pages" }
        (item_list(pages))
        h2 { "Files" }
        (item_list(files))
        @if !modules.is_empty() {
            h2 { "Modules" }
            (modules_list(modules))
        }
        p { a href=(back_href) { "Back to courses index" } }
    };
    shell(layout, layout.course_title, "index", "index-view", content)
}

/// Static export root: one link per course.
pub fn render_course_list(courses: &[ListItem], stylesheet_href: &str) -> Markup {
    let content = html! {
        main {
            h1 { "Courses" }
            (item_list(courses))
        }
    };
    base_document("Courses", stylesheet_href, Some("course-list"), content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nav() -> Vec<NavLink> {
        vec![
            NavLink {
                key: "pages",
                label: "Pages",
                href: "/pages".to_string(),
            },
            NavLink {
                key: "modules",
                label: "Modules",
                href: "/modules".to_string(),
            },
        ]
    }

    fn layout(nav: &[NavLink]) -> Layout<'_> {
        Layout {
            course_title: "ORF 245",
            home_href: "/",
            stylesheet_href: "/static/viewer.css",
            nav,
        }
    }

    // =========================================================================
    // Components
    // =========================================================================

    #[test]
    fn base_document_includes_doctype_and_stylesheet() {
        let doc = base_document("Test", "/static/viewer.css", None, html! { p { "test" } }).into_string();
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains(r#"<link rel="stylesheet" href="/static/viewer.css">"#));
    }

    #[test]
    fn base_document_applies_body_class() {
        let doc = base_document("Test", "x.css", Some("page-view"), html! {}).into_string();
        assert!(doc.contains(r#"<body class="page-view">"#));
    }

    #[test]
    fn nav_marks_current_item() {
        let html = render_nav(&nav(), "modules").into_string();
        assert!(html.contains(r#"<li class="current"><a href="/modules">Modules</a></li>"#));
        assert!(html.contains(r#"<li><a href="/pages">Pages</a></li>"#));
    }

    #[test]
    fn stylesheet_is_bundled() {
        assert!(CSS.contains("--color-bg"));
    }

    // =========================================================================
    // Page renderers
    // =========================================================================

    #[test]
    fn page_body_is_not_escaped() {
        let nav = nav();
        let html = render_page(&layout(&nav), "welcome.html", "pages", "<p>Hi <b>there</b></p>").into_string();
        assert!(html.contains("<p>Hi <b>there</b></p>"));
        assert!(html.contains("<title>welcome.html · ORF 245</title>"));
    }

    #[test]
    fn titles_are_escaped() {
        let nav = nav();
        let items = vec![ListItem::link("<script>", "/x")];
        let html = render_section(&layout(&nav), "Files", "files", &items, None).into_string();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn section_with_message() {
        let nav = nav();
        let html = render_section(&layout(&nav), "Syllabus", "syllabus", &[], Some("No syllabus found")).into_string();
        assert!(html.contains("No syllabus found"));
        assert!(!html.contains("Nothing here."));
    }

    #[test]
    fn list_item_note_and_unlinked() {
        let nav = nav();
        let items = vec![
            ListItem::link("chart.png", "/file/R_IMG").with_note(Some("2020-09-01".to_string())),
            ListItem {
                title: "Gone".to_string(),
                href: None,
                note: None,
            },
        ];
        let html = render_section(&layout(&nav), "Files", "files", &items, None).into_string();
        assert!(html.contains(r#"<a href="/file/R_IMG">chart.png</a><span class="note">(2020-09-01)</span>"#));
        assert!(html.contains("<span>Gone</span>"));
    }

    #[test]
    fn modules_render_each_module() {
        let nav = nav();
        let modules = vec![ModuleView {
            title: "Week 1".to_string(),
            items: vec![ListItem::link("Welcome", "/page/wiki_content/welcome.html")],
        }];
        let html = render_modules(&layout(&nav), &modules).into_string();
        assert!(html.contains("<h3>Week 1</h3>"));
        assert!(html.contains(r#"href="/page/wiki_content/welcome.html""#));

        let empty = render_modules(&layout(&nav), &[]).into_string();
        assert!(empty.contains("No modules found"));
    }

    #[test]
    fn index_renders_org_tree_links() {
        let nav = nav();
        let orgs = vec![OrganizationItem {
            title: Some("Week 1".to_string()),
            identifierref: None,
            children: vec![OrganizationItem {
                title: Some("Welcome".to_string()),
                identifierref: Some("R1".to_string()),
                children: vec![],
            }],
        }];
        let link = |id: &str| (id == "R1").then(|| "/page/wiki_content/welcome.html".to_string());
        let view = IndexView {
            pages: &[],
            assets: &[],
            organizations: &orgs,
            resource_link: &link,
            summary: &[("Course code", "ORF 245".to_string())],
            tools: &["zoom".to_string()],
        };
        let html = render_index(&layout(&nav), &view).into_string();
        assert!(html.contains(r#"<a href="/page/wiki_content/welcome.html">Welcome</a>"#));
        assert!(html.contains("<span>Week 1</span>"));
        assert!(html.contains("<th>Course code</th><td>ORF 245</td>"));
        assert!(html.contains("<li>zoom</li>"));
    }

    #[test]
    fn dashboard_lists_links() {
        let nav = nav();
        let links = vec![ExternalLink {
            href: "https://www.khanacademy.org/".to_string(),
            source: "page:wiki_content/welcome.html".to_string(),
            context: "a".to_string(),
        }];
        let view = Dashboard {
            counts: &[("Pages", 3)],
            fields: &[],
            tab_configuration: Some("[\n  1\n]"),
            tools: &[],
            links: &links,
        };
        let html = render_dashboard(&layout(&nav), &view).into_string();
        assert!(html.contains("https://www.khanacademy.org/"));
        assert!(html.contains("page:wiki_content/welcome.html"));
        assert!(html.contains("No course settings found"));
        assert!(html.contains(r#"<pre class="json">"#));
    }

    #[test]
    fn course_list_links_each_course() {
        let courses = vec![ListItem::link("stats", "./stats/index.html")];
        let html = render_course_list(&courses, "stats/_static/canvas_viewer.css").into_string();
        assert!(html.contains(r#"<a href="./stats/index.html">stats</a>"#));
    }
}
