//! `imsmanifest.xml` parsing.
//!
//! The manifest is the root descriptor of an IMS Common Cartridge export:
//!
//! ```text
//! export/
//! ├── imsmanifest.xml        # resources + organization tree (required)
//! ├── wiki_content/          # pages
//! ├── web_resources/         # uploaded files
//! └── course_settings/       # course_settings.xml, files_meta.xml (optional)
//! ```
//!
//! [`CanvasExport::open`] reads the manifest and the optional sidecars once
//! and keeps an immutable snapshot. Only a missing or unparsable manifest is
//! an error; everything else degrades to empty data (see [`crate::metadata`]).
//!
//! ## What is extracted
//!
//! - **Title**: the LOM `title/string` in the manifest metadata, replaced by
//!   the course settings `title` when that is present.
//! - **Resources**: every `resource` element, in document order, keyed by
//!   `identifier`. `href` and `type` default to the empty string.
//! - **Organization**: the item tree of the first `organization` element.

use crate::metadata::{self, CourseMetadata, FileMeta};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const MANIFEST_FILE: &str = "imsmanifest.xml";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("imsmanifest.xml not found in {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML error in {path}: {source}")]
    Xml {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },
}

/// One manifest `resource` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    pub identifier: String,
    /// Primary content path, export-relative. May be empty.
    pub href: String,
    /// Content-type hint from the `type` attribute (e.g. `imsbasiclti_xmlv1p0`).
    #[serde(rename = "type")]
    pub kind: String,
    /// `file` hrefs in document order.
    pub files: Vec<String>,
}

/// One node of the organization (navigation) tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrganizationItem {
    pub title: Option<String>,
    /// Identifier of the referenced [`Resource`], if any. Never empty.
    pub identifierref: Option<String>,
    pub children: Vec<OrganizationItem>,
}

/// A parsed course export directory.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasExport {
    root: PathBuf,
    title: Option<String>,
    resources: Vec<Resource>,
    index: HashMap<String, usize>,
    organizations: Vec<OrganizationItem>,
    metadata: CourseMetadata,
    settings_text: Option<String>,
    file_meta: HashMap<String, FileMeta>,
}

impl CanvasExport {
    /// Parse the export rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let root = root.as_ref().to_path_buf();
        let manifest_path = root.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(ManifestError::NotFound(root));
        }

        let bytes = fs::read(&manifest_path)?;
        let text = String::from_utf8_lossy(&bytes);
        let parsed = parse_manifest(&text).map_err(|source| ManifestError::Xml {
            path: manifest_path.clone(),
            source,
        })?;

        let mut export = Self {
            root,
            title: parsed.title,
            resources: Vec::new(),
            index: HashMap::new(),
            organizations: parsed.organizations,
            metadata: CourseMetadata::default(),
            settings_text: None,
            file_meta: HashMap::new(),
        };
        for resource in parsed.resources {
            export.insert_resource(resource);
        }

        let settings = metadata::load_course_settings(&export.root, |id| {
            export.resource(id).map(|r| r.href.clone())
        });
        if let Some(title) = settings.metadata.get("title") {
            export.title = Some(title.to_string());
        }
        export.metadata = settings.metadata;
        export.settings_text = settings.text;
        export.file_meta = metadata::load_file_meta(&export.root);

        debug!(
            root = %export.root.display(),
            resources = export.resources.len(),
            items = export.organizations.len(),
            "parsed manifest"
        );
        Ok(export)
    }

    /// A later duplicate identifier replaces the earlier entry in place.
    fn insert_resource(&mut self, resource: Resource) {
        if let Some(&pos) = self.index.get(&resource.identifier) {
            warn!(identifier = %resource.identifier, "duplicate resource identifier");
            self.resources[pos] = resource;
        } else {
            self.index
                .insert(resource.identifier.clone(), self.resources.len());
            self.resources.push(resource);
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Course title, falling back to the export directory name. Roots such
    /// as `.` or `..` are resolved first.
    pub fn display_title(&self) -> String {
        fn dir_name(path: &Path) -> Option<String> {
            path.file_name().map(|n| n.to_string_lossy().into_owned())
        }
        self.title.clone().unwrap_or_else(|| {
            dir_name(&self.root)
                .or_else(|| self.root.canonicalize().ok().as_deref().and_then(dir_name))
                .unwrap_or_default()
        })
    }

    /// All resources in manifest order.
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Look up a resource by identifier. Unknown identifiers yield `None`.
    pub fn resource(&self, identifier: &str) -> Option<&Resource> {
        self.index.get(identifier).map(|&i| &self.resources[i])
    }

    pub fn organizations(&self) -> &[OrganizationItem] {
        &self.organizations
    }

    pub fn course_metadata(&self) -> &CourseMetadata {
        &self.metadata
    }

    /// Raw `course_settings.xml` text, if the file was readable.
    pub fn settings_text(&self) -> Option<&str> {
        self.settings_text.as_deref()
    }

    pub fn file_meta(&self, identifier: &str) -> Option<&FileMeta> {
        self.file_meta.get(identifier)
    }
}

struct ParsedManifest {
    title: Option<String>,
    resources: Vec<Resource>,
    organizations: Vec<OrganizationItem>,
}

/// Content-packaging element: any `imscp_v1p1` namespace, or none at all.
fn is_cp(node: &roxmltree::Node<'_, '_>, name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == name
        && node
            .tag_name()
            .namespace()
            .is_none_or(|ns| ns.ends_with("/imscp_v1p1"))
}

fn is_lom(node: &roxmltree::Node<'_, '_>, name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == name
        && node
            .tag_name()
            .namespace()
            .is_some_and(|ns| ns.ends_with("/LOM/manifest"))
}

fn parse_manifest(text: &str) -> Result<ParsedManifest, roxmltree::Error> {
    let mut options = roxmltree::ParsingOptions::default();
    options.allow_dtd = true;
    let doc = roxmltree::Document::parse_with_options(text, options)?;

    let title = doc
        .descendants()
        .find(|n| is_lom(n, "title"))
        .and_then(|t| t.children().find(|c| is_lom(c, "string")))
        .and_then(|s| s.text())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let mut resources = Vec::new();
    for res in doc.descendants().filter(|n| is_cp(n, "resource")) {
        let Some(identifier) = res.attribute("identifier") else {
            debug!("skipping resource without identifier");
            continue;
        };
        let files = res
            .children()
            .filter(|c| is_cp(c, "file"))
            .filter_map(|f| f.attribute("href"))
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .collect();
        resources.push(Resource {
            identifier: identifier.to_string(),
            href: res.attribute("href").unwrap_or_default().to_string(),
            kind: res.attribute("type").unwrap_or_default().to_string(),
            files,
        });
    }

    let organizations = doc
        .descendants()
        .find(|n| is_cp(n, "organization"))
        .map(parse_items)
        .unwrap_or_default();

    Ok(ParsedManifest {
        title,
        resources,
        organizations,
    })
}

fn parse_items(parent: roxmltree::Node<'_, '_>) -> Vec<OrganizationItem> {
    parent
        .children()
        .filter(|c| is_cp(c, "item"))
        .map(|item| OrganizationItem {
            title: item
                .children()
                .find(|c| is_cp(c, "title"))
                .and_then(|t| t.text())
                .map(str::to_string),
            identifierref: item
                .attribute("identifierref")
                .filter(|r| !r.is_empty())
                .map(str::to_string),
            children: parse_items(item),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use tempfile::TempDir;

    #[test]
    fn missing_manifest_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = CanvasExport::open(tmp.path()).unwrap_err();
        assert!(matches!(err, ManifestError::NotFound(_)));
        assert!(err.to_string().contains("imsmanifest.xml not found"));
    }

    #[test]
    fn malformed_manifest_is_xml_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(MANIFEST_FILE), "<manifest><resources>").unwrap();
        let err = CanvasExport::open(tmp.path()).unwrap_err();
        assert!(matches!(err, ManifestError::Xml { .. }));
    }

    #[test]
    fn fixture_resources_in_document_order() {
        let tmp = setup_fixtures();
        let export = CanvasExport::open(tmp.path()).unwrap();

        let ids: Vec<&str> = export
            .resources()
            .iter()
            .map(|r| r.identifier.as_str())
            .collect();
        assert_eq!(ids.first(), Some(&"R_WELCOME"));
        assert_eq!(ids.last(), Some(&"R_SETTINGS"));
        assert_eq!(ids.len(), 14);
    }

    #[test]
    fn fixture_resource_fields() {
        let tmp = setup_fixtures();
        let export = CanvasExport::open(tmp.path()).unwrap();

        let lti = find_resource(&export, "R_LTI");
        assert_eq!(lti.kind, "imsbasiclti_xmlv1p0");
        assert_eq!(lti.href, "lti/gradescope_launch.xml");
        assert_eq!(lti.files, vec!["lti/gradescope_launch.xml"]);
    }

    #[test]
    fn unknown_identifier_is_none() {
        let tmp = setup_fixtures();
        let export = CanvasExport::open(tmp.path()).unwrap();
        assert!(export.resource("R_MISSING").is_none());
    }

    #[test]
    fn course_settings_title_wins() {
        let tmp = setup_fixtures();
        let export = CanvasExport::open(tmp.path()).unwrap();
        assert_eq!(export.title(), Some("ORF 245: Fundamentals of Statistics"));
    }

    #[test]
    fn lom_title_without_course_settings() {
        let tmp = setup_fixtures();
        fs::remove_file(tmp.path().join(metadata::COURSE_SETTINGS)).unwrap();
        let export = CanvasExport::open(tmp.path()).unwrap();
        assert_eq!(export.title(), Some("Fundamentals of Statistics"));
        assert!(export.course_metadata().is_empty());
    }

    #[test]
    fn display_title_falls_back_to_directory_name() {
        let tmp = TempDir::new().unwrap();
        let course = tmp.path().join("stats-export");
        fs::create_dir_all(&course).unwrap();
        write_manifest(&course, "", "");
        let export = CanvasExport::open(&course).unwrap();
        assert_eq!(export.title(), None);
        assert_eq!(export.display_title(), "stats-export");
    }

    #[test]
    fn display_title_resolves_parent_segment() {
        let tmp = TempDir::new().unwrap();
        let course = tmp.path().join("stats-export");
        fs::create_dir_all(course.join("wiki_content")).unwrap();
        write_manifest(&course, "", "");
        let export = CanvasExport::open(course.join("wiki_content/..")).unwrap();
        assert_eq!(export.display_title(), "stats-export");
    }

    #[test]
    fn display_title_for_current_directory() {
        let tmp = TempDir::new().unwrap();
        let course = tmp.path().join("stats-export");
        fs::create_dir_all(&course).unwrap();
        write_manifest(&course, "", "");

        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(&course).unwrap();
        let title = CanvasExport::open(".").map(|e| e.display_title());
        std::env::set_current_dir(previous).unwrap();

        assert_eq!(title.unwrap(), "stats-export");
    }

    #[test]
    fn organization_tree_preserves_order_and_nesting() {
        let tmp = setup_fixtures();
        let export = CanvasExport::open(tmp.path()).unwrap();

        let orgs = export.organizations();
        assert_eq!(orgs.len(), 1);
        let weeks: Vec<Option<&str>> = orgs[0].children.iter().map(|c| c.title.as_deref()).collect();
        assert_eq!(weeks, vec![Some("Week 1"), Some("Week 2")]);

        let week2 = &orgs[0].children[1];
        assert_eq!(week2.children[0].identifierref.as_deref(), Some("R_LECTURE"));
        assert_eq!(week2.children[0].title, None);
    }

    #[test]
    fn empty_identifierref_is_none() {
        let tmp = TempDir::new().unwrap();
        write_manifest(
            tmp.path(),
            "",
            r#"<item identifier="a" identifierref=""><title>Empty</title></item>"#,
        );
        let export = CanvasExport::open(tmp.path()).unwrap();
        assert_eq!(export.organizations()[0].identifierref, None);
    }

    #[test]
    fn only_first_organization_is_used() {
        let tmp = TempDir::new().unwrap();
        let xml = format!(
            r#"<manifest identifier="m" xmlns="{CP}">
  <organizations>
    <organization identifier="o1"><item identifier="a"><title>First</title></item></organization>
    <organization identifier="o2"><item identifier="b"><title>Second</title></item></organization>
  </organizations>
  <resources/>
</manifest>"#
        );
        fs::write(tmp.path().join(MANIFEST_FILE), xml).unwrap();
        let export = CanvasExport::open(tmp.path()).unwrap();
        assert_eq!(export.organizations().len(), 1);
        assert_eq!(export.organizations()[0].title.as_deref(), Some("First"));
    }

    #[test]
    fn duplicate_identifier_replaces_in_place() {
        let tmp = TempDir::new().unwrap();
        write_manifest(
            tmp.path(),
            r#"<resource identifier="A" href="first.html"/>
               <resource identifier="B" href="b.html"/>
               <resource identifier="A" href="second.html"/>"#,
            "",
        );
        let export = CanvasExport::open(tmp.path()).unwrap();
        assert_eq!(export.resources().len(), 2);
        assert_eq!(export.resources()[0].href, "second.html");
        assert_eq!(export.resource("A").unwrap().href, "second.html");
    }

    #[test]
    fn missing_href_and_type_default_empty() {
        let tmp = TempDir::new().unwrap();
        write_manifest(tmp.path(), r#"<resource identifier="A"><file href=""/></resource>"#, "");
        let export = CanvasExport::open(tmp.path()).unwrap();
        let r = export.resource("A").unwrap();
        assert_eq!(r.href, "");
        assert_eq!(r.kind, "");
        assert!(r.files.is_empty());
    }

    #[test]
    fn comments_are_ignored() {
        let tmp = TempDir::new().unwrap();
        write_manifest(
            tmp.path(),
            r#"<!-- <resource identifier="X" href="x.html"/> -->
               <resource identifier="A" href="a.html"/>"#,
            "",
        );
        let export = CanvasExport::open(tmp.path()).unwrap();
        assert_eq!(export.resources().len(), 1);
    }

    #[test]
    fn parsing_is_idempotent() {
        let tmp = setup_fixtures();
        let first = CanvasExport::open(tmp.path()).unwrap();
        let second = CanvasExport::open(tmp.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn file_meta_loaded_from_sidecar() {
        let tmp = setup_fixtures();
        let export = CanvasExport::open(tmp.path()).unwrap();
        let meta = export.file_meta("R_IMG").unwrap();
        assert_eq!(meta.display_name.as_deref(), Some("Distribution chart"));
    }

    #[test]
    fn course_image_resolved_to_href() {
        let tmp = setup_fixtures();
        let export = CanvasExport::open(tmp.path()).unwrap();
        assert_eq!(
            export.course_metadata().get("image_href"),
            Some("web_resources/Uploaded Media/chart.png")
        );
    }
}
