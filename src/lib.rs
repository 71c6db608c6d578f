//! # Canvas Viewer
//!
//! Browse an IMS Common Cartridge course export (the `.imscc` archive Canvas
//! produces) as a website, or flatten a directory of exports into plain HTML.
//!
//! # Architecture: One Snapshot, Two Surfaces
//!
//! ```text
//! imsmanifest.xml ─┐
//! course_settings/ ├─→ CanvasExport ─→ queries ─┬─→ server  (axum, live)
//! files_meta.xml  ─┘   (parsed once)            └─→ export  (static HTML)
//! ```
//!
//! [`manifest::CanvasExport::open`] reads the manifest and both settings
//! sidecars once. Everything after that is a pure query over the snapshot:
//! listings, categories, modules, tool and link detection. The two surfaces
//! differ only in how they spell links, which is why the page rewriter takes
//! a [`rewrite::Routes`] implementation instead of hard-coding URLs.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`manifest`] | Manifest parser: resources, organization tree, course title |
//! | [`metadata`] | `course_settings.xml` snapshot and `files_meta.xml` sidecar |
//! | [`query`] | Pages, files, syllabus, assignments, categories, modules, href lookup |
//! | [`tools`] | External tool (LTI vendor) detection |
//! | [`links`] | External link scanner and internal-domain rules |
//! | [`paths`] | Posix path helpers for export-relative hrefs |
//! | [`rewrite`] | HTML link rewriter, parameterized by output convention |
//! | [`format`] | Display formatting for dates, sizes and settings values |
//! | [`render`] | Maud templates shared by the viewer and the static export |
//! | [`server`] | Interactive viewer: routes, file lookup, port probing |
//! | [`export`] | Static site builder: archive unpacking, per-course output |
//! | [`config`] | `canvas-viewer.toml` loading, validation, overrides |
//! | [`output`] | CLI report formatting |
//!
//! # Design Decisions
//!
//! ## Heuristics Over Schemas
//!
//! Canvas exports are inconsistent across versions. Classification works on
//! substrings of hrefs and type strings rather than on the cartridge schema,
//! and optional inputs that fail to parse degrade to empty data with a logged
//! warning. Only a missing or malformed `imsmanifest.xml` is an error.
//!
//! ## Rewrite At Serve Time
//!
//! The viewer never writes to the export. Pages are parsed with `html5ever`,
//! stripped of Canvas styling, relinked and serialized on every request, so
//! the export directory can be read-only.

pub mod config;
pub mod export;
pub mod format;
pub mod links;
pub mod manifest;
pub mod metadata;
pub mod output;
pub mod paths;
pub mod query;
pub mod render;
pub mod rewrite;
pub mod server;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_helpers;
