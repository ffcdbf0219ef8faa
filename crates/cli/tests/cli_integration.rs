//! CLI integration tests for the `blankfill` subcommands.
//!
//! Uses `assert_cmd` to spawn the binary and verify exit codes, stdout and
//! stderr. Every test runs in its own temporary directory with template
//! fixtures generated in code, and with the config and API key variables
//! cleared so the host environment cannot leak in.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use blankfill_core::{Document, DocxBuilder};
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Helper: create a Command for the `blankfill` binary, rooted at `dir`.
fn blankfill(dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("blankfill");
    cmd.current_dir(dir)
        .env_remove("BLANKFILL_CONFIG")
        .env_remove("BLANKFILL_LOG")
        .env_remove("OPENAI_API_KEY")
        .env_remove("ANTHROPIC_API_KEY");
    cmd
}

/// Write the sample template into `dir` and return its path.
fn write_template(dir: &Path) -> PathBuf {
    let bytes = DocxBuilder::new()
        .paragraph("This SAFE is issued by [COMPANY NAME] to the Investor.")
        .paragraph("Purchase Amount: $[__________]")
        .table(&[&["Company", "[COMPANY NAME]"]])
        .footer("Date: {{DATE OF SAFE}}")
        .build()
        .unwrap();
    let path = dir.join("safe.docx");
    fs::write(&path, bytes).unwrap();
    path
}

fn texts(path: &Path) -> Vec<String> {
    let bytes = fs::read(path).unwrap();
    Document::from_bytes(&bytes).unwrap().paragraph_texts()
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    let tmp = TempDir::new().unwrap();
    blankfill(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("placeholders of .docx templates"));
}

#[test]
fn version_exits_0() {
    let tmp = TempDir::new().unwrap();
    blankfill(tmp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("blankfill"));
}

// ──────────────────────────────────────────────
// 2. Scan
// ──────────────────────────────────────────────

#[test]
fn scan_lists_placeholders_in_order() {
    let tmp = TempDir::new().unwrap();
    let template = write_template(tmp.path());
    blankfill(tmp.path())
        .args(["scan", template.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("COMPANY NAME"))
        .stdout(predicate::str::contains("$[__________]"))
        .stdout(predicate::str::contains("DATE OF SAFE"))
        .stdout(predicate::str::contains("4 placeholders, 3 distinct labels"));
}

#[test]
fn scan_json_has_occurrences_and_context() {
    let tmp = TempDir::new().unwrap();
    let template = write_template(tmp.path());
    let output = blankfill(tmp.path())
        .args(["--output", "json", "scan", template.to_str().unwrap(), "--radius", "2"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let occurrences = report["occurrences"].as_array().unwrap();
    assert_eq!(occurrences.len(), 4);
    assert_eq!(occurrences[0]["id"], 0);
    assert_eq!(occurrences[0]["label"], "COMPANY NAME");
    assert_eq!(occurrences[1]["kind"], "money");
    assert_eq!(report["context_map"]["0"], "issued by [COMPANY NAME] to the");
    assert!(report["text_preview"].as_str().unwrap().starts_with("This SAFE"));
}

#[test]
fn scan_missing_file_exits_1() {
    let tmp = TempDir::new().unwrap();
    blankfill(tmp.path())
        .args(["scan", "nope.docx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error reading 'nope.docx'"));
}

#[test]
fn scan_non_docx_exits_1_with_json_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("notes.docx");
    fs::write(&path, "just text").unwrap();
    let output = blankfill(tmp.path())
        .args(["--output", "json", "scan", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let err: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert!(err["error"]
        .as_str()
        .unwrap()
        .contains("not a readable document package"));
}

// ──────────────────────────────────────────────
// 3. Rewrite
// ──────────────────────────────────────────────

#[test]
fn rewrite_labeled_fills_every_matching_label() {
    let tmp = TempDir::new().unwrap();
    let template = write_template(tmp.path());
    let responses = tmp.path().join("responses.json");
    fs::write(
        &responses,
        r#"{"responses": {"company name": "Acme Inc", "$[__________]": "50,000"}}"#,
    )
    .unwrap();
    let out = tmp.path().join("filled.docx");

    blankfill(tmp.path())
        .args([
            "rewrite",
            template.to_str().unwrap(),
            "--responses",
            responses.to_str().unwrap(),
            "--mode",
            "labeled",
            "--out",
            out.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 of 4 placeholders filled"));

    assert_eq!(
        texts(&out),
        vec![
            "This SAFE is issued by Acme Inc to the Investor.",
            "Purchase Amount: $50,000",
            "Company",
            "Acme Inc",
            "Date: {{DATE OF SAFE}}",
        ]
    );
}

#[test]
fn rewrite_ordered_reads_responses_from_stdin() {
    let tmp = TempDir::new().unwrap();
    let template = write_template(tmp.path());
    let out = tmp.path().join("filled.docx");

    blankfill(tmp.path())
        .args([
            "rewrite",
            template.to_str().unwrap(),
            "--responses",
            "-",
            "--out",
            out.to_str().unwrap(),
            "--strict",
        ])
        .write_stdin(r#"["Acme Inc", "$50,000", "Acme Holdings", "June 1, 2026"]"#)
        .assert()
        .success();

    assert_eq!(
        texts(&out),
        vec![
            "This SAFE is issued by Acme Inc to the Investor.",
            "Purchase Amount: $50,000",
            "Company",
            "Acme Holdings",
            "Date: June 1, 2026",
        ]
    );
}

#[test]
fn rewrite_strict_rejects_short_payload() {
    let tmp = TempDir::new().unwrap();
    let template = write_template(tmp.path());
    let out = tmp.path().join("filled.docx");

    blankfill(tmp.path())
        .args([
            "rewrite",
            template.to_str().unwrap(),
            "--responses",
            "-",
            "--out",
            out.to_str().unwrap(),
            "--strict",
        ])
        .write_stdin(r#"["Acme Inc"]"#)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "1 values supplied but the document has 4 placeholders",
        ));
    assert!(!out.exists());
}

#[test]
fn rewrite_malformed_payload_exits_1() {
    let tmp = TempDir::new().unwrap();
    let template = write_template(tmp.path());
    let out = tmp.path().join("filled.docx");

    blankfill(tmp.path())
        .args([
            "rewrite",
            template.to_str().unwrap(),
            "--responses",
            "-",
            "--mode",
            "labeled",
            "--out",
            out.to_str().unwrap(),
        ])
        .write_stdin("{{ not json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not be parsed"));
    assert!(!out.exists());
}

// ──────────────────────────────────────────────
// 4. Fill
// ──────────────────────────────────────────────

#[test]
fn fill_with_heuristic_oracle_and_piped_answers() {
    let tmp = TempDir::new().unwrap();
    let template = write_template(tmp.path());
    let out = tmp.path().join("filled.docx");
    let saved = tmp.path().join("responses.json");

    blankfill(tmp.path())
        .args([
            "fill",
            template.to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
            "--oracle",
            "heuristic",
            "--save-responses",
            saved.to_str().unwrap(),
        ])
        .write_stdin("Acme Inc\n50,000\nJune 1, 2026\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("COMPANY NAME = Acme Inc (reused)"))
        .stdout(predicate::str::contains("4 of 4 placeholders filled"));

    assert_eq!(
        texts(&out),
        vec![
            "This SAFE is issued by Acme Inc to the Investor.",
            "Purchase Amount: 50,000",
            "Company",
            "Acme Inc",
            "Date: June 1, 2026",
        ]
    );

    // the saved responses feed straight back into `rewrite`
    let again = tmp.path().join("again.docx");
    blankfill(tmp.path())
        .args([
            "rewrite",
            template.to_str().unwrap(),
            "--responses",
            saved.to_str().unwrap(),
            "--out",
            again.to_str().unwrap(),
            "--strict",
        ])
        .assert()
        .success();
    assert_eq!(texts(&again), texts(&out));
}

#[test]
fn fill_without_api_key_falls_back_to_heuristic() {
    let tmp = TempDir::new().unwrap();
    let template = write_template(tmp.path());
    let out = tmp.path().join("filled.docx");

    blankfill(tmp.path())
        .args([
            "fill",
            template.to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
            "--oracle",
            "openai",
        ])
        .write_stdin("Acme Inc\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("No OPENAI_API_KEY set"))
        .stderr(predicate::str::contains("input ended with 1 of 4 placeholders resolved"));

    // resolved values are written, the rest stay in place
    let filled = texts(&out);
    assert_eq!(filled[0], "This SAFE is issued by Acme Inc to the Investor.");
    assert_eq!(filled[1], "Purchase Amount: $[__________]");
    assert_eq!(filled[3], "[COMPANY NAME]");
}

// ──────────────────────────────────────────────
// 5. Config
// ──────────────────────────────────────────────

#[test]
fn config_file_in_working_directory_is_used() {
    let tmp = TempDir::new().unwrap();
    let template = write_template(tmp.path());
    fs::write(tmp.path().join("blankfill.toml"), "[scan]\ncontext_radius = 0\n").unwrap();

    let output = blankfill(tmp.path())
        .args(["--output", "json", "scan", template.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["context_map"]["0"], "[COMPANY NAME]");
}

#[test]
fn invalid_config_exits_1() {
    let tmp = TempDir::new().unwrap();
    let template = write_template(tmp.path());
    let config = tmp.path().join("custom.toml");
    fs::write(&config, "[oracle]\nprovider = \"telepathy\"\n").unwrap();

    blankfill(tmp.path())
        .args(["scan", template.to_str().unwrap()])
        .env("BLANKFILL_CONFIG", &config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error loading config"));
}
