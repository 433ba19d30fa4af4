//! End-to-end tests driving the `st` binary.
//!
//! Tests the full pipeline: import/run → report → export → clear.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

fn st_binary() -> String {
    env!("CARGO_BIN_EXE_st").to_string()
}

/// Builds a command isolated from the user's config and data directories.
fn st(temp: &Path) -> Command {
    let mut cmd = Command::new(st_binary());
    cmd.env("HOME", temp)
        .env("XDG_CONFIG_HOME", temp.join("config"))
        .env("XDG_DATA_HOME", temp.join("data"))
        .env("ST_DATABASE_PATH", temp.join("st.db"))
        .env_remove("RUST_LOG");
    cmd
}

fn run_ok(cmd: &mut Command) -> String {
    let output = cmd.output().expect("failed to run st");
    assert_success(&output);
    String::from_utf8(output.stdout).unwrap()
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "st should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn report_json(temp: &Path) -> serde_json::Value {
    let stdout = run_ok(st(temp).args(["report", "--json"]));
    serde_json::from_str(&stdout).expect("report should be valid JSON")
}

#[test]
fn test_import_report_export_clear() {
    let temp = TempDir::new().unwrap();
    let dump = temp.path().join("storage.json");
    std::fs::write(
        &dump,
        r#"{
            "github.com": {"time": 2400000, "sessions": 40, "lastVisited": 1735689600000},
            "youtube.com": 2100000,
            "example.com": {"time": 300000, "sessions": 5, "lastVisited": null}
        }"#,
    )
    .unwrap();

    let stdout = run_ok(st(temp.path()).arg("import").arg(&dump));
    assert_eq!(stdout.trim(), "Imported 3 site(s), skipped 0.");

    let report = report_json(temp.path());
    assert_eq!(report["total_time_ms"], 4_800_000);
    assert_eq!(report["productivity_score"], 50);
    assert_eq!(report["most_used"]["site"], "github.com");
    assert_eq!(report["over_limit"].as_array().unwrap().len(), 1);
    assert_eq!(report["over_limit"][0]["site"], "youtube.com");

    // Legacy values survive an export untouched
    let export: serde_json::Value =
        serde_json::from_str(&run_ok(st(temp.path()).arg("export"))).unwrap();
    assert_eq!(export["youtube.com"], 2_100_000);
    assert_eq!(export["github.com"]["sessions"], 40);

    let stdout = run_ok(st(temp.path()).arg("clear"));
    assert_eq!(stdout.trim(), "Cleared 3 site(s).");

    let report = report_json(temp.path());
    assert_eq!(report["total_time_ms"], 0);
    assert!(report["most_used"].is_null());
    assert!(report["over_limit"].as_array().unwrap().is_empty());

    let text = run_ok(st(temp.path()).arg("report"));
    assert!(text.contains("Most used: no data yet"));
    assert!(text.contains("Start browsing to see data."));
}

#[test]
fn test_run_records_active_site_from_stdin() {
    let temp = TempDir::new().unwrap();

    let mut child = st(temp.path())
        .arg("run")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn st run");
    {
        let mut stdin = child.stdin.take().unwrap();
        writeln!(stdin, r#"{{"type":"installed"}}"#).unwrap();
        writeln!(stdin, r#"{{"type":"tab_activated","url":"about:blank"}}"#).unwrap();
        writeln!(
            stdin,
            r#"{{"type":"tab_updated","status":"complete","url":"https://docs.rs/tokio"}}"#
        )
        .unwrap();
        // Dropping stdin signals end of input.
    }
    let output = child.wait_with_output().unwrap();
    assert_success(&output);

    let export: serde_json::Value =
        serde_json::from_str(&run_ok(st(temp.path()).arg("export"))).unwrap();
    let sites = export.as_object().unwrap();
    assert_eq!(sites.len(), 1);
    assert!(sites["docs.rs"]["sessions"].as_u64().unwrap() >= 1);
    assert!(sites["docs.rs"]["lastVisited"].is_i64());
}

#[test]
fn test_config_file_classification_and_limits() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("st.toml");
    std::fs::write(
        &config,
        r#"
productive = ["docs.rs"]
distracting = ["news.ycombinator.com"]

[limits]
"news.ycombinator.com" = 60000
"#,
    )
    .unwrap();
    let dump = temp.path().join("storage.json");
    std::fs::write(
        &dump,
        r#"{"docs.rs": 30000, "news.ycombinator.com": 60000}"#,
    )
    .unwrap();
    run_ok(st(temp.path()).arg("import").arg(&dump));

    let stdout = run_ok(
        st(temp.path())
            .arg("--config")
            .arg(&config)
            .args(["report", "--json"]),
    );
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();

    assert_eq!(report["focus_time_ms"], 30_000);
    assert_eq!(report["distract_time_ms"], 60_000);
    assert_eq!(report["productivity_score"], 33);
    // Equal to the limit is not over it
    assert!(report["over_limit"].as_array().unwrap().is_empty());
    assert_eq!(report["most_used"]["site"], "news.ycombinator.com");
}

#[test]
fn test_overlapping_classification_fails() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("st.toml");
    std::fs::write(
        &config,
        "productive = [\"a.com\"]\ndistracting = [\"a.com\"]\n",
    )
    .unwrap();

    let output = st(temp.path())
        .arg("--config")
        .arg(&config)
        .arg("report")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid site classification"), "{stderr}");
}
