//! End-to-end tests for the `docwave` binary: check, plan, and run against
//! fixture files in a temporary directory.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const CATALOG: &str = r#"
[catalog]
name = "base"

[[documents]]
id = "project-overview"
title = "Project Overview"
wave = 1
requires = ["core-vision"]

[[documents]]
id = "architecture"
title = "Architecture"
wave = 1
requires = ["tech-stack"]

[[documents]]
id = "api-reference"
title = "API Reference"
wave = 2
requires = ["backend"]

[[documents]]
id = "migration-strategy"
title = "Migration Strategy"
wave = 4
trigger = { contains = ["migration"] }
"#;

const DECISIONS: &str = r#"
[[topics]]
topic_slug = "core-vision"
status = "complete"

[[topics]]
topic_slug = "tech-stack"
status = "complete"

[[topics]]
topic_slug = "backend"
status = "needs_verification"
"#;

struct Fixture {
    dir: TempDir,
    catalog: PathBuf,
    decisions: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let catalog = dir.path().join("catalog.toml");
        let decisions = dir.path().join("decisions.toml");
        std::fs::write(&catalog, CATALOG).expect("failed to write catalog");
        std::fs::write(&decisions, DECISIONS).expect("failed to write decisions");
        Self {
            dir,
            catalog,
            decisions,
        }
    }

    fn out_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    fn write_pack(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).expect("failed to write pack");
        path
    }
}

fn docwave(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_docwave"))
        .args(args)
        .output()
        .expect("failed to run docwave binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("fixture paths are valid UTF-8")
}

#[test]
fn check_accepts_a_valid_catalog() {
    let fixture = Fixture::new();
    let output = docwave(&["check", path_str(&fixture.catalog)]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    assert!(text.contains("Catalog OK"), "got: {text}");
    assert!(text.contains("migration-strategy"), "got: {text}");
}

#[test]
fn check_rejects_colliding_pack_ids() {
    let fixture = Fixture::new();
    let pack_a = fixture.write_pack(
        "solana.toml",
        r#"
[catalog]
name = "solana"

[[documents]]
id = "program-specification"
title = "Program Specification"
wave = 2
"#,
    );
    let pack_b = fixture.write_pack(
        "anchor.toml",
        r#"
[catalog]
name = "anchor"

[[documents]]
id = "program-specification"
title = "Program Specification (Anchor)"
wave = 3
"#,
    );

    let output = docwave(&[
        "check",
        path_str(&fixture.catalog),
        "--pack",
        path_str(&pack_a),
        "--pack",
        path_str(&pack_b),
    ]);
    assert!(!output.status.success());
    assert!(
        stderr(&output).contains("duplicate document id"),
        "stderr: {}",
        stderr(&output)
    );
}

#[test]
fn plan_emits_json_with_trigger_selection() {
    let fixture = Fixture::new();

    let with_signal = docwave(&[
        "plan",
        path_str(&fixture.catalog),
        "--decisions",
        path_str(&fixture.decisions),
        "--signal",
        "migration",
        "--json",
    ]);
    assert!(with_signal.status.success(), "stderr: {}", stderr(&with_signal));
    let plan: serde_json::Value =
        serde_json::from_str(&stdout(&with_signal)).expect("plan output should be JSON");
    let text = plan.to_string();
    assert!(text.contains("migration-strategy"), "got: {text}");
    assert!(text.contains("project-overview"), "got: {text}");

    let without_signal = docwave(&[
        "plan",
        path_str(&fixture.catalog),
        "--decisions",
        path_str(&fixture.decisions),
        "--json",
    ]);
    assert!(without_signal.status.success());
    assert!(
        !stdout(&without_signal).contains("migration-strategy"),
        "untriggered wave-4 doc must not be selected"
    );
}

#[test]
fn run_generates_artifacts_and_report() {
    let fixture = Fixture::new();
    let out = fixture.out_dir();

    let output = docwave(&[
        "run",
        path_str(&fixture.catalog),
        "--decisions",
        path_str(&fixture.decisions),
        "--writer-cmd",
        "sh -c 'cat >/dev/null; echo generated'",
        "--out",
        path_str(&out),
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    // Wave-1 artifacts exist; the blocked wave-2 doc produced none.
    assert!(out.join("project-overview.md").exists());
    assert!(out.join("architecture.md").exists());
    assert!(!out.join("api-reference.md").exists());

    let report: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(out.join("run-report.json")).expect("report should exist"),
    )
    .expect("report should be JSON");
    assert_eq!(report["outcome"], "completed");

    let api = report["entries"]
        .as_array()
        .expect("entries is an array")
        .iter()
        .find(|e| e["doc_id"] == "api-reference")
        .expect("api-reference is reported");
    assert_eq!(api["status"]["blocked"]["incomplete_topic"], "backend");
}

#[test]
fn run_reports_failed_documents_with_nonzero_exit() {
    let fixture = Fixture::new();
    let out = fixture.out_dir();

    let output = docwave(&[
        "run",
        path_str(&fixture.catalog),
        "--decisions",
        path_str(&fixture.decisions),
        "--writer-cmd",
        "sh -c 'cat >/dev/null; exit 1'",
        "--out",
        path_str(&out),
    ]);
    assert!(!output.status.success());
    assert!(
        stderr(&output).contains("failed document"),
        "stderr: {}",
        stderr(&output)
    );

    // The report is still written, with per-entry reasons.
    let report: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(out.join("run-report.json")).expect("report should exist"),
    )
    .expect("report should be JSON");
    assert!(report["outcome"]["failed"]["failed_docs"]
        .as_array()
        .is_some_and(|docs| !docs.is_empty()));
}
