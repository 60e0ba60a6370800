//! Integration tests for multi-format extraction.
//!
//! Every supported suffix yields non-empty text for a well-formed sample,
//! unsupported suffixes yield nothing, and the `rh extract` command prints
//! what the registry extracts.

mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use report_harness::extract::legacy::LegacyExtractor;
use report_harness::extract::{ExtractError, ExtractorRegistry};
use tempfile::TempDir;

fn rh_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.push("rh");
    path
}

/// Default table, with legacy handlers limited to the built-in scan so the
/// result does not depend on converters installed on the test machine.
fn registry() -> ExtractorRegistry {
    let mut registry = ExtractorRegistry::with_defaults();
    registry.register("doc", LegacyExtractor::with_converters("doc", Vec::<String>::new()));
    registry.register("ppt", LegacyExtractor::with_converters("ppt", Vec::<String>::new()));
    registry
}

fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn every_supported_suffix_yields_text() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let samples: Vec<(PathBuf, &str)> = vec![
        (write(dir, "a.txt", b"plain text phrase"), "plain text phrase"),
        (write(dir, "b.md", b"# Heading\n\nmarkdown phrase"), "markdown phrase"),
        (write(dir, "c.pdf", &common::minimal_pdf("pdf test phrase")), "pdf test phrase"),
        (
            write(dir, "d.docx", &common::minimal_docx(&["office test phrase"])),
            "office test phrase",
        ),
        (
            write(dir, "e.pptx", &common::minimal_pptx(&["slide test phrase"])),
            "slide test phrase",
        ),
        (
            write(
                dir,
                "f.xlsx",
                &common::minimal_xlsx(&[&["Name", "Status"], &["Alpha", "green"]]),
            ),
            "green",
        ),
        (write(dir, "g.csv", b"name,status\nBravo,amber\n"), "amber"),
        (
            write(dir, "h.doc", &common::legacy_binary("legacy word phrase")),
            "legacy word phrase",
        ),
        (
            write(dir, "i.ppt", &common::legacy_binary("legacy slide phrase")),
            "legacy slide phrase",
        ),
    ];

    let registry = registry();
    for (path, phrase) in samples {
        let text = registry
            .extract(&path)
            .unwrap_or_else(|| panic!("no text from {}", path.display()));
        assert!(
            text.contains(phrase),
            "{}: expected '{}' in {:?}",
            path.display(),
            phrase,
            text
        );
    }
}

#[test]
fn suffix_match_is_case_insensitive() {
    let tmp = TempDir::new().unwrap();
    let path = write(tmp.path(), "NOTES.TXT", b"upper case suffix");
    assert_eq!(registry().extract(&path).as_deref(), Some("upper case suffix"));
}

#[test]
fn unsupported_suffix_yields_none() {
    let tmp = TempDir::new().unwrap();
    let registry = registry();
    for name in ["image.png", "archive.zip", "Makefile"] {
        let path = write(tmp.path(), name, b"whatever");
        assert!(!registry.supports(&path), "{} should be unsupported", name);
        assert!(registry.extract(&path).is_none());
        assert!(matches!(registry.extract_file(&path), Ok(None)));
    }
}

#[test]
fn corrupt_office_file_is_an_error_not_a_panic() {
    let tmp = TempDir::new().unwrap();
    let registry = registry();
    for name in ["broken.docx", "broken.pptx", "broken.xlsx"] {
        let path = write(tmp.path(), name, b"this is not a zip archive");
        assert!(matches!(registry.extract_file(&path), Err(ExtractError::Ooxml(_))));
        assert!(registry.extract(&path).is_none());
    }
}

#[test]
fn corrupt_pdf_is_an_error_not_a_panic() {
    let tmp = TempDir::new().unwrap();
    let path = write(tmp.path(), "broken.pdf", b"%PDF-1.4\ngarbage without xref");
    assert!(registry().extract_file(&path).is_err());
}

#[test]
fn files_over_the_size_limit_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = write(tmp.path(), "big.txt", &vec![b'x'; 2048]);
    let registry = registry().with_max_file_bytes(Some(1024));
    assert!(matches!(
        registry.extract_file(&path),
        Err(ExtractError::TooLarge { size: 2048, limit: 1024 })
    ));
}

#[test]
fn blank_files_extract_to_none() {
    let tmp = TempDir::new().unwrap();
    let path = write(tmp.path(), "blank.md", b"  \n\t\n");
    assert!(registry().extract(&path).is_none());
}

#[test]
fn extract_command_prints_text() {
    let tmp = TempDir::new().unwrap();
    let path = write(tmp.path(), "deck.pptx", &common::minimal_pptx(&["First", "Second"]));

    let output = Command::new(rh_binary())
        .arg("extract")
        .arg(&path)
        .env("RUST_LOG", "off")
        .current_dir(tmp.path())
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim_end(), "First\nSecond");
}

#[test]
fn extract_command_rejects_unsupported_files() {
    let tmp = TempDir::new().unwrap();
    let path = write(tmp.path(), "photo.png", b"\x89PNG");

    let output = Command::new(rh_binary())
        .arg("extract")
        .arg(&path)
        .env("RUST_LOG", "off")
        .current_dir(tmp.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unsupported file type"));
}
