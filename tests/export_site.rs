//! Builds a static site from the fixture course and checks the output tree.
//!
//! Run with: cargo test --test export_site

use canvas_viewer::export::{self, STYLESHEET_PATH};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn copy_dir_recursive(src: &Path, dst: &Path) {
    fs::create_dir_all(dst).unwrap();
    for entry in fs::read_dir(src).unwrap() {
        let entry = entry.unwrap();
        let dst_path = dst.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir_recursive(&entry.path(), &dst_path);
        } else {
            fs::copy(entry.path(), &dst_path).unwrap();
        }
    }
}

/// `<tmp>/courses/stats/` holding the fixture course.
fn courses_dir() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/course");
    copy_dir_recursive(&fixtures, &tmp.path().join("courses/stats"));
    tmp
}

#[test]
fn builds_fixture_course() {
    let tmp = courses_dir();
    let out = tmp.path().join("public");
    let summary = export::build_site(&tmp.path().join("courses"), &out).unwrap();

    assert_eq!(summary.courses.len(), 1);
    assert_eq!(summary.courses[0].name, "stats");
    assert_eq!(summary.courses[0].title, "ORF 245: Fundamentals of Statistics");

    for file in [
        "index.html",
        STYLESHEET_PATH,
        "stats/index.html",
        "stats/pages.html",
        "stats/files.html",
        "stats/modules.html",
        "stats/_static/canvas_viewer.css",
        "stats/wiki_content/welcome.html",
        "stats/web_resources/syllabus.pdf",
        "stats/course_settings/course_settings.xml",
    ] {
        assert!(out.join(file).is_file(), "missing {file}");
    }

    let root = fs::read_to_string(out.join("index.html")).unwrap();
    assert!(root.contains(r#"href="./stats/index.html""#));
}

#[test]
fn course_placeholders_resolve_to_written_files() {
    let tmp = courses_dir();
    let out = tmp.path().join("public");
    export::build_site(&tmp.path().join("courses"), &out).unwrap();

    let page_dir = out.join("stats/wiki_content");
    let html = fs::read_to_string(page_dir.join("welcome.html")).unwrap();
    for target in ["homework-1.html", "../modules.html", "../web_resources/syllabus.pdf"] {
        assert!(html.contains(&format!(r#"href="{target}""#)), "no link to {target}");
        assert!(page_dir.join(target).is_file(), "{target} not written");
    }
    assert!(!html.contains("$WIKI_REFERENCE$"));
    assert!(!html.contains("$IMS-CC-FILEBASE$"));
    assert!(!html.contains("$CANVAS_COURSE_REFERENCE$"));
}

#[test]
fn archives_are_unpacked_and_built() {
    use std::io::Write;

    let tmp = courses_dir();
    let courses = tmp.path().join("courses");
    let manifest = fs::read_to_string(courses.join("stats/imsmanifest.xml")).unwrap();
    let mut zip = zip::ZipWriter::new(fs::File::create(courses.join("archived.imscc")).unwrap());
    zip.start_file("imsmanifest.xml", zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.write_all(manifest.as_bytes()).unwrap();
    zip.finish().unwrap();

    let out = tmp.path().join("public");
    let summary = export::build_site(&courses, &out).unwrap();
    let names: Vec<&str> = summary.courses.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["archived", "stats"]);
    assert_eq!(summary.unpacked, vec![courses.join("archived")]);
    assert!(out.join("archived/index.html").is_file());
}

#[test]
fn output_dir_is_recreated() {
    let tmp = courses_dir();
    let out = tmp.path().join("public");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("stale.html"), "old").unwrap();

    export::build_site(&tmp.path().join("courses"), &out).unwrap();
    assert!(!out.join("stale.html").exists());
    assert!(out.join("index.html").is_file());
}

#[test]
fn folders_without_manifest_are_ignored() {
    let tmp = courses_dir();
    fs::create_dir_all(tmp.path().join("courses/notes")).unwrap();
    let summary = export::build_site(&tmp.path().join("courses"), &tmp.path().join("public")).unwrap();
    assert_eq!(summary.courses.len(), 1);
}

#[test]
fn legacy_encoded_page_copied_verbatim() {
    let tmp = courses_dir();
    let latin1 = b"<p>caf\xe9</p>".to_vec();
    fs::write(tmp.path().join("courses/stats/wiki_content/welcome.html"), &latin1).unwrap();
    let out = tmp.path().join("public");
    export::build_site(&tmp.path().join("courses"), &out).unwrap();
    assert_eq!(fs::read(out.join("stats/wiki_content/welcome.html")).unwrap(), latin1);
}
