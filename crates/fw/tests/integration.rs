//! End-to-end CLI integration tests for the `fw` binary.
//!
//! Each test runs the `fw` binary as a subprocess via `assert_cmd`, inside
//! its own temporary directory so no stray `formwire.yaml` is picked up.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a `Command` targeting the cargo-built `fw` binary in `dir`.
fn fw(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("fw").unwrap();
    cmd.current_dir(dir.path())
        .env("NO_COLOR", "1")
        .env_remove("FW_CONFIG")
        .env_remove("FW_LOG");
    cmd
}

/// Run `fw` with `args` and parse its stdout as JSON.
fn json(dir: &TempDir, args: &[&str]) -> serde_json::Value {
    let output = fw(dir).args(args).arg("--json").output().unwrap();
    assert!(
        output.status.success(),
        "fw {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

// ---------------------------------------------------------------------------
// eval
// ---------------------------------------------------------------------------

#[test]
fn eval_constant_expression() {
    let tmp = TempDir::new().unwrap();
    fw(&tmp)
        .args(["eval", "1 + 2 * 3"])
        .assert()
        .success()
        .stdout("7\n");
}

#[test]
fn eval_reads_fields_and_fixed_arguments() {
    let tmp = TempDir::new().unwrap();
    fw(&tmp)
        .args(["eval", "amount * rate > 5", "--field", "amount=4", "--fixed", "rate=2"])
        .assert()
        .success()
        .stdout("true\n");

    fw(&tmp)
        .args(["eval", "'Hello ' + name", "-f", "name=Ada"])
        .assert()
        .success()
        .stdout("Hello Ada\n");
}

#[test]
fn eval_json_shows_rewritten_form() {
    let tmp = TempDir::new().unwrap();
    let out = json(&tmp, &["eval", "amount > 5", "--field", "amount=7"]);
    assert_eq!(out["value"], serde_json::json!(true));
    assert_eq!(out["rewritten"], "fieldValues[0] > 5");
    assert_eq!(out["constant"], serde_json::json!(false));
}

#[test]
fn eval_scoped_this() {
    let tmp = TempDir::new().unwrap();
    fw(&tmp)
        .args([
            "eval",
            "this.amount + 1",
            "--scope",
            "claims[1]",
            "--field",
            "claims[1].amount=41",
        ])
        .assert()
        .success()
        .stdout("42\n");
}

#[test]
fn eval_unknown_function_fails() {
    let tmp = TempDir::new().unwrap();
    fw(&tmp)
        .args(["eval", "frobnicate(1)"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown method 'frobnicate'"));
}

#[test]
fn eval_errors_are_json_under_json_flag() {
    let tmp = TempDir::new().unwrap();
    let output = fw(&tmp)
        .args(["eval", "1 +", "--json"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let err: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert!(err["error"].as_str().unwrap().contains("syntax error"));
}

#[test]
fn eval_member_of_null_fails() {
    let tmp = TempDir::new().unwrap();
    fw(&tmp)
        .args(["eval", "address.street.name", "--field", "address=null"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("of null"));
}

// ---------------------------------------------------------------------------
// deps
// ---------------------------------------------------------------------------

#[test]
fn deps_lists_every_reference_kind() {
    let tmp = TempDir::new().unwrap();
    let out = json(
        &tmp,
        &[
            "deps",
            "sum(getFieldValuesForFieldPathPattern('claims[*].amount')) > limit && fieldIsValid('iban') && today() > 0",
            "--external",
            "limit",
        ],
    );
    let refs = &out["references"];
    assert_eq!(refs["validities"], serde_json::json!(["iban"]));
    assert_eq!(
        refs["aggregates"],
        serde_json::json!([{ "kind": "pattern", "key": "claims[*].amount" }])
    );
    assert_eq!(refs["functions"], serde_json::json!(["today"]));
    assert_eq!(refs["arguments"], serde_json::json!([["limit", "external"]]));
}

#[test]
fn deps_text_output() {
    let tmp = TempDir::new().unwrap();
    fw(&tmp)
        .args(["deps", "amount > 5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("FIELD VALUES"))
        .stdout(predicate::str::contains("  amount"));

    fw(&tmp)
        .args(["deps", "1 + 1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("constant"));
}

// ---------------------------------------------------------------------------
// functions
// ---------------------------------------------------------------------------

#[test]
fn functions_report_invalidation_groups() {
    let tmp = TempDir::new().unwrap();
    let out = json(&tmp, &["functions", "--all"]);
    let builtins = out["builtins"].as_array().unwrap();
    let today = builtins.iter().find(|f| f["name"] == "today").unwrap();
    assert_eq!(today["group"], "clock");
    let round = builtins.iter().find(|f| f["name"] == "round").unwrap();
    assert!(round["group"].is_null());
    assert!(out["legacy"].as_array().unwrap().iter().any(|f| f["name"] == "getValue"));
}

#[test]
fn functions_unknown_category_fails() {
    let tmp = TempDir::new().unwrap();
    fw(&tmp)
        .args(["functions", "--category", "astrology"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("astrology"));
}

// ---------------------------------------------------------------------------
// replay
// ---------------------------------------------------------------------------

#[test]
fn replay_prints_publications_per_step() {
    let tmp = TempDir::new().unwrap();
    let script = tmp.path().join("session.yaml");
    std::fs::write(
        &script,
        r#"
fields:
  - { path: amount, value: 3 }
expressions:
  - { name: big, source: "amount > 5" }
events:
  - set: { path: amount, value: 4 }
  - set: { path: amount, value: 9 }
"#,
    )
    .unwrap();

    fw(&tmp)
        .args(["replay", "session.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[0] load"))
        .stdout(predicate::str::contains("big = false"))
        .stdout(predicate::str::contains("[2] set amount"))
        .stdout(predicate::str::contains("big = true"))
        .stdout(predicate::str::contains("[1] set amount").not());

    let out = json(&tmp, &["replay", "session.yaml"]);
    assert_eq!(out["records"].as_array().unwrap().len(), 2);
    assert_eq!(out["live"][0]["label"], "big");
}

#[test]
fn piped_output_is_not_colored() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("session.yaml"),
        "expressions:\n  - { name: two, source: \"1 + 1\" }\n",
    )
    .unwrap();

    Command::cargo_bin("fw")
        .unwrap()
        .current_dir(tmp.path())
        .env_remove("NO_COLOR")
        .env_remove("CLICOLOR")
        .env_remove("CLICOLOR_FORCE")
        .env("TERM", "xterm-256color")
        .args(["replay", "session.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("two = 2"))
        .stdout(predicate::str::contains("\u{1b}[").not());
}

#[test]
fn replay_missing_script_fails() {
    let tmp = TempDir::new().unwrap();
    fw(&tmp)
        .args(["replay", "missing.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read script"));
}

// ---------------------------------------------------------------------------
// config, version, completion
// ---------------------------------------------------------------------------

#[test]
fn config_file_sets_default_currency() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("formwire.yaml"),
        "currency:\n  code: USD\n  symbol-first: true\n",
    )
    .unwrap();
    fw(&tmp)
        .args(["eval", "currencyCode()"])
        .assert()
        .success()
        .stdout("USD\n");
}

#[test]
fn invalid_config_is_reported() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("custom.yaml"), "timer-interval-ms: 0\n").unwrap();
    fw(&tmp)
        .args(["--config", "custom.yaml", "version"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}

#[test]
fn version_text_and_json() {
    let tmp = TempDir::new().unwrap();
    fw(&tmp)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("fw version "))
        .stdout(predicate::str::contains("engine: timer 1000ms, locale en, currency EUR"));

    let out = json(&tmp, &["version"]);
    assert_eq!(out["currency"], "EUR");
    assert_eq!(out["timer-interval-ms"], 1000);
    assert!(out["builtins"].as_u64().unwrap() > 0);
}

#[test]
fn completion_generates_script() {
    let tmp = TempDir::new().unwrap();
    fw(&tmp)
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("_fw"));
}
