//! External tool detection.
//!
//! Canvas exports reference third-party integrations (lecture capture,
//! grading, video conferencing) without bundling them. They show up as
//! vendor names in resource hrefs and file lists, as LTI resource types, or
//! in the course navigation (`tab_configuration`).

use crate::manifest::CanvasExport;
use std::collections::BTreeSet;

/// Tag added when any resource type mentions LTI.
pub const LTI_TAG: &str = "LTI/External Tools";

/// Vendor tag and the substrings that identify it, checked against
/// lowercased text.
const VENDORS: &[(&str, &[&str])] = &[
    ("panopto", &["panopto"]),
    ("gradescope", &["gradescope"]),
    ("echo360", &["echo360"]),
    ("kaltura", &["kaltura"]),
    ("zoom", &["zoom.us", "zoom"]),
    ("turnitin", &["turnitin"]),
    ("panopto-lti", &["panopto.com"]),
    ("microsoft-stream", &["stream.microsoft.com"]),
];

fn match_vendors(text: &str, found: &mut BTreeSet<String>) {
    for (tag, needles) in VENDORS {
        if needles.iter().any(|n| text.contains(n)) {
            found.insert((*tag).to_string());
        }
    }
}

impl CanvasExport {
    /// Sorted vendor tags referenced anywhere in the export.
    pub fn external_tools(&self) -> Vec<String> {
        let mut found = BTreeSet::new();
        for r in self.resources() {
            let hay = format!("{} {} {}", r.href, r.files.join(" "), r.kind).to_lowercase();
            match_vendors(&hay, &mut found);
            if r.kind.to_lowercase().contains("lti") {
                found.insert(LTI_TAG.to_string());
            }
        }
        if let Some(tabs) = self.course_metadata().get("tab_configuration") {
            match_vendors(&tabs.to_lowercase(), &mut found);
        }
        found.into_iter().collect()
    }
}
