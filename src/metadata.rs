//! Course settings and file metadata sidecars.
//!
//! A Canvas export carries two optional XML files next to the manifest:
//!
//! ```text
//! course_settings/
//! ├── course_settings.xml   # course title, code, dates, visibility flags, tab config
//! └── files_meta.xml        # per-file display names and unlock dates
//! ```
//!
//! Both are secondary data. A missing or malformed file never fails the load:
//! the corresponding view is simply empty and a `warn!` is logged. Values are
//! kept as the raw text found in the file (`"true"`, `"524288000"`); coercion
//! is left to the display layer in [`crate::format`].
//!
//! Both files are read once when the export is opened. Changes made to the
//! export directory afterwards are not observed.

use serde::Serialize;
use serde::ser::SerializeMap;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

pub const COURSE_SETTINGS: &str = "course_settings/course_settings.xml";
pub const FILES_META: &str = "course_settings/files_meta.xml";

const CANVAS_NS: &str = "http://canvas.instructure.com/xsd/cccv1p0";

/// Course settings fields read by name, in display order.
pub const COURSE_FIELDS: &[&str] = &[
    "title",
    "course_code",
    "start_at",
    "conclude_at",
    "image_identifier_ref",
    "is_public",
    "is_public_to_auth_users",
    "public_syllabus",
    "public_syllabus_to_auth",
    "allow_student_wiki_edits",
    "syllabus_course_summary",
    "allow_student_forum_attachments",
    "lock_all_announcements",
    "default_wiki_editing_roles",
    "allow_student_organized_groups",
    "default_view",
    "show_total_grade_as_points",
    "filter_speed_grader_by_student_group",
    "license",
    "indexed",
    "hide_final_grade",
    "hide_distribution_graphs",
    "allow_student_discussion_topics",
    "allow_student_discussion_editing",
    "allow_student_discussion_reporting",
    "show_announcements_on_home_page",
    "home_page_announcement_limit",
    "usage_rights_required",
    "restrict_student_future_view",
    "restrict_student_past_view",
    "restrict_enrollments_to_course_dates",
    "homeroom_course",
    "horizon_course",
    "conditional_release",
    "content_library",
    "grading_standard_enabled",
    "storage_quota",
    "overridden_course_visibility",
    "grading_standard_id",
    "root_account_uuid",
    "enable_course_paces",
    "hide_sections_on_course_users_page",
    "tab_configuration",
];

/// Display name and unlock date for one file resource, from `files_meta.xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileMeta {
    pub display_name: Option<String>,
    pub unlock_at: Option<String>,
}

/// Flat snapshot of `course_settings.xml`.
///
/// Only fields present with non-empty text are stored. Besides the
/// [`COURSE_FIELDS`], two derived keys may appear: `post_manually` (from the
/// nested `default_post_policy`) and `image_href` (the course image
/// identifier resolved against the manifest's resources).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseMetadata {
    entries: Vec<(String, String)>,
}

impl CourseMetadata {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse settings XML. `resolve_image` maps a resource identifier to its href.
    pub fn parse(
        text: &str,
        resolve_image: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, roxmltree::Error> {
        let doc = roxmltree::Document::parse(text)?;
        let root = doc.root_element();
        let ns = root.tag_name().namespace();

        let mut entries = Vec::new();
        for field in COURSE_FIELDS {
            if let Some(value) = text_of(find(root, field, ns)) {
                entries.push((field.to_string(), value));
            }
        }

        if let Some(policy) = find(root, "default_post_policy", ns)
            && let Some(value) = text_of(find(policy, "post_manually", ns))
        {
            entries.push(("post_manually".to_string(), value));
        }

        let mut meta = Self { entries };
        if let Some(href) = meta.get("image_identifier_ref").and_then(&resolve_image) {
            meta.entries.push(("image_href".to_string(), href));
        }
        Ok(meta)
    }
}

/// First descendant element of `parent` named `tag` in namespace `ns`.
fn find<'a, 'input>(
    parent: roxmltree::Node<'a, 'input>,
    tag: &str,
    ns: Option<&str>,
) -> Option<roxmltree::Node<'a, 'input>> {
    parent
        .descendants()
        .skip(1)
        .find(|n| n.is_element() && n.tag_name().name() == tag && n.tag_name().namespace() == ns)
}

fn text_of(node: Option<roxmltree::Node<'_, '_>>) -> Option<String> {
    node.and_then(|n| n.text())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

impl Serialize for CourseMetadata {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Raw text and parsed snapshot of `course_settings.xml`.
#[derive(Debug, Default)]
pub(crate) struct CourseSettings {
    /// File contents, kept for raw URL scanning even if the XML is malformed.
    pub text: Option<String>,
    pub metadata: CourseMetadata,
}

pub(crate) fn load_course_settings(
    root: &Path,
    resolve_image: impl Fn(&str) -> Option<String>,
) -> CourseSettings {
    let path = root.join(COURSE_SETTINGS);
    let text = match fs::read(&path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no course settings");
            return CourseSettings::default();
        }
    };
    let metadata = match CourseMetadata::parse(&text, resolve_image) {
        Ok(m) => m,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed course settings");
            CourseMetadata::default()
        }
    };
    CourseSettings {
        text: Some(text),
        metadata,
    }
}

/// Parse `files_meta.xml` text into identifier → [`FileMeta`].
pub fn parse_file_meta(text: &str) -> Result<HashMap<String, FileMeta>, roxmltree::Error> {
    let doc = roxmltree::Document::parse(text)?;
    let is_canvas = |n: &roxmltree::Node<'_, '_>, tag: &str| {
        n.is_element() && n.tag_name().name() == tag && n.tag_name().namespace() == Some(CANVAS_NS)
    };

    let mut files = HashMap::new();
    for file in doc.descendants().filter(|n| is_canvas(n, "file")) {
        let Some(identifier) = file.attribute("identifier") else {
            continue;
        };
        let child_text = |tag: &str| {
            file.children()
                .find(|c| is_canvas(c, tag))
                .and_then(|c| c.text())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        };
        files.insert(
            identifier.to_string(),
            FileMeta {
                display_name: child_text("display_name"),
                unlock_at: child_text("unlock_at"),
            },
        );
    }
    Ok(files)
}

pub(crate) fn load_file_meta(root: &Path) -> HashMap<String, FileMeta> {
    let path = root.join(FILES_META);
    let text = match fs::read(&path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => return HashMap::new(),
    };
    parse_file_meta(&text).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "ignoring malformed files metadata");
        HashMap::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SETTINGS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<course identifier="g1" xmlns="http://canvas.instructure.com/xsd/cccv1p0">
  <title>Statistics</title>
  <course_code>ORF 245</course_code>
  <is_public>false</is_public>
  <storage_quota>524288000</storage_quota>
  <license></license>
  <image_identifier_ref>R_IMG</image_identifier_ref>
  <default_post_policy>
    <post_manually>true</post_manually>
  </default_post_policy>
</course>"#;

    fn no_images(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn settings_fields_kept_as_raw_text() {
        let meta = CourseMetadata::parse(SETTINGS, no_images).unwrap();
        assert_eq!(meta.get("title"), Some("Statistics"));
        assert_eq!(meta.get("course_code"), Some("ORF 245"));
        assert_eq!(meta.get("is_public"), Some("false"));
        assert_eq!(meta.get("storage_quota"), Some("524288000"));
    }

    #[test]
    fn settings_empty_elements_are_absent() {
        let meta = CourseMetadata::parse(SETTINGS, no_images).unwrap();
        assert_eq!(meta.get("license"), None);
        assert_eq!(meta.get("start_at"), None);
    }

    #[test]
    fn settings_nested_post_policy() {
        let meta = CourseMetadata::parse(SETTINGS, no_images).unwrap();
        assert_eq!(meta.get("post_manually"), Some("true"));
    }

    #[test]
    fn settings_image_resolved_through_callback() {
        let meta = CourseMetadata::parse(SETTINGS, |id| {
            (id == "R_IMG").then(|| "web_resources/banner.png".to_string())
        })
        .unwrap();
        assert_eq!(meta.get("image_href"), Some("web_resources/banner.png"));

        let unresolved = CourseMetadata::parse(SETTINGS, no_images).unwrap();
        assert_eq!(unresolved.get("image_href"), None);
    }

    #[test]
    fn settings_without_namespace() {
        let meta = CourseMetadata::parse(
            "<course><title>Plain</title><course_code>X1</course_code></course>",
            no_images,
        )
        .unwrap();
        assert_eq!(meta.get("title"), Some("Plain"));
        assert_eq!(meta.get("course_code"), Some("X1"));
    }

    #[test]
    fn settings_other_namespace_ignored() {
        let meta = CourseMetadata::parse(
            r#"<course xmlns="urn:a" xmlns:b="urn:b"><b:title>Wrong</b:title></course>"#,
            no_images,
        )
        .unwrap();
        assert_eq!(meta.get("title"), None);
    }

    #[test]
    fn settings_iterate_in_field_order() {
        let meta = CourseMetadata::parse(SETTINGS, no_images).unwrap();
        let keys: Vec<&str> = meta.iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                "title",
                "course_code",
                "image_identifier_ref",
                "is_public",
                "storage_quota",
                "post_manually"
            ]
        );
    }

    #[test]
    fn settings_serialize_as_object() {
        let meta = CourseMetadata::parse(SETTINGS, no_images).unwrap();
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["course_code"], "ORF 245");
    }

    #[test]
    fn malformed_settings_degrade_but_keep_text() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("course_settings")).unwrap();
        fs::write(
            tmp.path().join(COURSE_SETTINGS),
            "<course><title>broken https://zoom.us/j/1",
        )
        .unwrap();

        let settings = load_course_settings(tmp.path(), no_images);
        assert!(settings.metadata.is_empty());
        assert!(settings.text.unwrap().contains("zoom.us"));
    }

    #[test]
    fn missing_settings_are_empty() {
        let tmp = TempDir::new().unwrap();
        let settings = load_course_settings(tmp.path(), no_images);
        assert!(settings.text.is_none());
        assert!(settings.metadata.is_empty());
    }

    // =========================================================================
    // files_meta.xml
    // =========================================================================

    const FILES: &str = r#"<fileMeta xmlns="http://canvas.instructure.com/xsd/cccv1p0">
  <files>
    <file identifier="F1">
      <display_name>Week 1 Slides</display_name>
      <unlock_at>2020-09-01T04:00:00</unlock_at>
    </file>
    <file identifier="F2">
      <display_name></display_name>
    </file>
    <file>
      <display_name>No identifier</display_name>
    </file>
  </files>
</fileMeta>"#;

    #[test]
    fn file_meta_by_identifier() {
        let files = parse_file_meta(FILES).unwrap();
        assert_eq!(files.len(), 2);
        let f1 = &files["F1"];
        assert_eq!(f1.display_name.as_deref(), Some("Week 1 Slides"));
        assert_eq!(f1.unlock_at.as_deref(), Some("2020-09-01T04:00:00"));
    }

    #[test]
    fn file_meta_empty_values_are_none() {
        let files = parse_file_meta(FILES).unwrap();
        assert_eq!(files["F2"], FileMeta::default());
    }

    #[test]
    fn file_meta_requires_canvas_namespace() {
        let files =
            parse_file_meta("<fileMeta><files><file identifier=\"F1\"/></files></fileMeta>")
                .unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn malformed_file_meta_is_empty() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("course_settings")).unwrap();
        fs::write(tmp.path().join(FILES_META), "<fileMeta><file").unwrap();
        assert!(load_file_meta(tmp.path()).is_empty());
    }
}
