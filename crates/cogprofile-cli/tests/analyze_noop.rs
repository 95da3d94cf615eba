use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;

fn cogprofile() -> Command {
    let mut cmd = Command::cargo_bin("cogprofile").unwrap();
    cmd.env_remove("COGPROFILE_PROVIDER")
        .env_remove("COGPROFILE_MODEL")
        .env("RUST_LOG", "error");
    cmd
}

#[test]
fn analyze_with_noop_provider_uses_fallback() {
    cogprofile()
        .args(["--provider", "noop", "analyze"])
        .write_stdin("The committee met and agreed on a budget.")
        .assert()
        .success()
        .stdout(predicate::str::contains("Provider: noop"))
        .stdout(predicate::str::contains("Score: 75/100"))
        .stdout(predicate::str::contains("fallback"));
}

#[test]
fn analyze_json_output_parses() {
    let output = cogprofile()
        .args(["--provider", "noop", "--format", "json", "analyze"])
        .write_stdin("Some text.")
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["score"], serde_json::json!(75));
    assert_eq!(value["score_source"]["kind"], serde_json::json!("fallback"));
}

#[test]
fn inflated_text_is_overridden_even_offline() {
    cogprofile()
        .args(["--provider", "noop", "analyze"])
        .write_stdin("We interrogate the hegemonic, epistemic and liminal.")
        .assert()
        .success()
        .stdout(predicate::str::contains("Score: 35/100"))
        .stdout(predicate::str::contains("red-flag phrases"));
}

#[test]
fn raw_flag_prints_provider_text() {
    cogprofile()
        .args(["--provider", "noop", "detect", "--raw"])
        .write_stdin("Some text.")
        .assert()
        .success()
        .stdout(predicate::str::contains("LLM provider not configured"))
        .stdout(predicate::str::contains("AI Probability").not());
}

#[test]
fn empty_input_fails() {
    cogprofile()
        .args(["--provider", "noop", "analyze"])
        .write_stdin("   \n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("input text is empty"));
}

#[test]
fn compare_reads_both_files() {
    let left = tempfile::NamedTempFile::new().unwrap();
    let right = tempfile::NamedTempFile::new().unwrap();
    write(left.path(), "First document.").unwrap();
    write(right.path(), "Second document.").unwrap();
    cogprofile()
        .args([
            "--provider",
            "noop",
            "compare",
            "--left",
            left.path().to_str().unwrap(),
            "--right",
            right.path().to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Winner: tie"));
}

#[test]
fn rewrite_requires_instructions() {
    cogprofile()
        .args(["--provider", "noop", "rewrite", "--instructions", " "])
        .write_stdin("text")
        .assert()
        .failure()
        .stderr(predicate::str::contains("rewrite instructions are empty"));
}

#[test]
fn config_file_sets_provider_and_fallback() {
    let file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write(
        file.path(),
        "[llm]\nprovider = \"noop\"\n\n[profile]\nanalysis_fallback = 60\n",
    )
    .unwrap();
    cogprofile()
        .args(["--config", file.path().to_str().unwrap(), "analyze"])
        .write_stdin("test input")
        .assert()
        .success()
        .stdout(predicate::str::contains("Score: 60/100"));
}

#[test]
fn phrase_file_replaces_builtin_list() {
    let phrases = tempfile::NamedTempFile::new().unwrap();
    write(phrases.path(), "synergy\nleverage\nalignment\n").unwrap();
    cogprofile()
        .args([
            "--provider",
            "noop",
            "--phrases",
            phrases.path().to_str().unwrap(),
            "analyze",
        ])
        .write_stdin("Synergy and leverage drive alignment.")
        .assert()
        .success()
        .stdout(predicate::str::contains("Score: 35/100"));
}

#[test]
fn missing_api_key_is_reported() {
    cogprofile()
        .env_remove("ANTHROPIC_API_KEY")
        .args(["--provider", "anthropic", "analyze"])
        .write_stdin("text")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ANTHROPIC_API_KEY"));
}
