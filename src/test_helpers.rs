//! Shared test utilities.
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let export = CanvasExport::open(tmp.path()).unwrap();
//! let welcome = find_resource(&export, "R_WELCOME");
//! ```

use std::path::Path;
use tempfile::TempDir;

use crate::manifest::{CanvasExport, MANIFEST_FILE, Resource};
use crate::query::{FileEntry, Module};

/// Default namespace of a Common Cartridge 1.1 manifest.
pub const CP: &str = "http://www.imsglobal.org/xsd/imsccv1p1/imscp_v1p1";

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/course/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/course");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Write a minimal manifest into `dir`. `resources` goes inside
/// `<resources>`, `items` inside the single `<organization>`.
pub fn write_manifest(dir: &Path, resources: &str, items: &str) {
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest identifier="test" xmlns="{CP}">
  <organizations>
    <organization identifier="org">{items}</organization>
  </organizations>
  <resources>{resources}</resources>
</manifest>
"#
    );
    std::fs::write(dir.join(MANIFEST_FILE), xml).unwrap();
}

// =========================================================================
// Lookups: panic with the available values on a miss
// =========================================================================

/// Find a resource by identifier. Panics if not found.
pub fn find_resource<'a>(export: &'a CanvasExport, id: &str) -> &'a Resource {
    export.resource(id).unwrap_or_else(|| {
        let ids: Vec<&str> = export
            .resources()
            .iter()
            .map(|r| r.identifier.as_str())
            .collect();
        panic!("resource '{id}' not found. Available: {ids:?}")
    })
}

/// Find a file entry by resource identifier. Panics if not found.
pub fn find_file<'a>(files: &'a [FileEntry], id: &str) -> &'a FileEntry {
    files.iter().find(|f| f.id == id).unwrap_or_else(|| {
        let ids: Vec<&str> = files.iter().map(|f| f.id.as_str()).collect();
        panic!("file '{id}' not found. Available: {ids:?}")
    })
}

// =========================================================================
// Bulk extractors
// =========================================================================

pub fn module_titles(modules: &[Module]) -> Vec<&str> {
    modules.iter().map(|m| m.title.as_str()).collect()
}
