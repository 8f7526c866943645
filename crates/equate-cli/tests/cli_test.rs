//! End-to-end tests running the `equate` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const CODEBOOK: &str = r#"{
  "version": "cli-test",
  "lexicons": {
    "nsch_2016": {
      "k2q01": {"raw_min": 1, "raw_max": 5, "orientation": "reverse", "equate_name": "gen_health"},
      "k6q70": {"raw_min": 1, "raw_max": 4, "orientation": "forward", "equate_name": "calm"}
    }
  }
}"#;

struct Fixture {
    tmp: TempDir,
    codebook: PathBuf,
    raw: PathBuf,
    store: PathBuf,
}

fn fixture() -> Fixture {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let codebook = tmp.path().join("codebook.json");
    fs::write(&codebook, CODEBOOK).unwrap();

    let raw = tmp.path().join("raw");
    fs::create_dir_all(&raw).unwrap();
    fs::write(
        raw.join("2016.csv"),
        "hhid,year,age,k2q01,k6q70\n\
         H1,2016,3,1,1\n\
         H2,2016,7,2,2\n\
         H3,2016,9,3,99\n\
         H4,2016,12,4,4\n\
         H5,2016,16,5,3\n",
    )
    .unwrap();

    let store = tmp.path().join("store");
    Fixture {
        tmp,
        codebook,
        raw,
        store,
    }
}

fn equate(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_equate"))
        .args(args)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run equate")
}

fn source_args(fx: &Fixture) -> Vec<String> {
    let path = |p: &Path| p.to_string_lossy().into_owned();
    vec![
        "--codebook".into(),
        path(&fx.codebook),
        "--raw".into(),
        path(&fx.raw),
        "--store".into(),
        path(&fx.store),
        "--lexicon".into(),
        "nsch_2016".into(),
    ]
}

fn run(command: &str, fx: &Fixture, extra: &[&str]) -> Output {
    let mut args: Vec<String> = vec![command.to_string()];
    args.extend(source_args(fx));
    args.extend(extra.iter().map(|s| s.to_string()));
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    equate(&args)
}

#[test]
fn test_codebook_json_summary() {
    let fx = fixture();
    let output = equate(&["codebook", fx.codebook.to_str().unwrap(), "--json"]);
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["codebook"]["version"], "cli-test");
    assert_eq!(summary["lexicons"][0]["lexicon"], "nsch_2016");
    assert_eq!(summary["lexicons"][0]["reverse"], 1);
    assert_eq!(summary["lexicons"][0]["forward"], 1);
}

#[test]
fn test_harmonize_resolve_validate() {
    let fx = fixture();
    let audit = fx.tmp.path().join("audit.json");

    let output = run("harmonize", &fx, &["2016", "--audit", audit.to_str().unwrap()]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(audit.exists());
    assert!(fx.store.join("2016.harmonized.json").exists());

    let output = run("resolve", &fx, &["2016", "--format", "csv"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut lines = stdout.lines();
    assert_eq!(lines.next(), Some("hhid,gen_health,calm"));
    assert_eq!(lines.next(), Some("H1,4,0"));
    assert_eq!(lines.nth(1), Some("H3,2,"));

    let report = fx.tmp.path().join("report.json");
    let output = run("validate", &fx, &["2016", "--report", report.to_str().unwrap()]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stdout));
    assert!(report.exists());
}

#[test]
fn test_validate_failure_exits_two() {
    let fx = fixture();
    assert!(run("harmonize", &fx, &["2016"]).status.success());

    // Flip a reverse column in the store so it runs forward
    let path = fx.store.join("2016.harmonized.json");
    let mut stored: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    stored["columns"]["gen_health"] = serde_json::json!([0, 1, 2, 3, 4]);
    fs::write(&path, serde_json::to_string(&stored).unwrap()).unwrap();

    let output = run("validate", &fx, &["2016", "--json"]);
    assert_eq!(output.status.code(), Some(2));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["cycles"][0]["cycle"], "2016");
}

#[test]
fn test_unknown_lexicon_is_an_error() {
    let fx = fixture();
    let mut args = vec!["harmonize".to_string()];
    args.extend(source_args(&fx));
    let last = args.len() - 1;
    args[last] = "nsch_2030".to_string();
    args.push("2016".to_string());
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let output = equate(&args);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("nsch_2030"));
}
