use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn launch_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("weibo-launch");
    path
}

fn run_launch(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = launch_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run weibo-launch binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn compile_json(config_path: &Path, args: &[&str]) -> Value {
    let mut full = vec!["compile"];
    full.extend_from_slice(args);
    let (stdout, stderr, success) = run_launch(config_path, &full);
    assert!(success, "compile failed: stdout={}, stderr={}", stdout, stderr);
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("not JSON ({}): {}", e, stdout))
}

#[test]
fn test_compile_without_config_file_uses_defaults() {
    let tmp = TempDir::new().unwrap();
    let report = compile_json(&tmp.path().join("absent.toml"), &[]);

    assert_eq!(report["directive"]["keywords"], serde_json::json!([]));
    assert_eq!(report["directive"]["dates"]["start"], "2025-10-01");
    assert_eq!(report["directive"]["dates"]["end"], "2025-10-28");
    assert!(report["settings"].get("KEYWORD_LIST").is_none());
    assert!(report["settings"].get("REGION").is_none());
    assert_eq!(report["settings"]["WEIBO_TYPE"], "0");
}

#[test]
fn test_compile_conjunction_and_hashtag() {
    let tmp = TempDir::new().unwrap();
    let report = compile_json(
        &tmp.path().join("absent.toml"),
        &["--keywords", "东南大学 南京大学", "--keywords", "#活动#"],
    );

    assert_eq!(
        report["directive"]["keywords"],
        serde_json::json!([["东南大学", "南京大学"], "%23活动%23"])
    );
    assert_eq!(
        report["settings"]["KEYWORD_LIST"],
        r#"["东南大学 南京大学","%23活动%23"]"#
    );
}

#[test]
fn test_compile_all_regions_sentinel() {
    let tmp = TempDir::new().unwrap();
    let report = compile_json(
        &tmp.path().join("absent.toml"),
        &["--keywords", "东南大学", "--weibo-type", "1", "--region", "全部"],
    );

    assert_eq!(report["directive"]["filters"]["regions"], serde_json::json!([]));
    assert_eq!(report["directive"]["filters"]["weibo_type"], 1);
}

#[test]
fn test_compile_resolves_regions() {
    let tmp = TempDir::new().unwrap();
    let report = compile_json(
        &tmp.path().join("absent.toml"),
        &["--region", "江苏省, 上海"],
    );

    assert_eq!(
        report["directive"]["filters"]["regions"],
        serde_json::json!([
            {"name": "江苏", "code": 32},
            {"name": "上海", "code": 31}
        ])
    );
    assert_eq!(report["settings"]["REGION"], r#"["江苏","上海"]"#);
}

#[test]
fn test_compile_rejects_non_integer_code() {
    let tmp = TempDir::new().unwrap();
    let (stdout, stderr, success) = run_launch(
        &tmp.path().join("absent.toml"),
        &["compile", "--weibo-type", "original"],
    );
    assert!(!success, "expected failure: stdout={}", stdout);
    assert!(stderr.contains("weibo_type"), "stderr={}", stderr);
}

#[test]
fn test_config_file_date_defaults() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("launch.toml");
    fs::write(
        &config_path,
        r#"[defaults]
start_date = "2024-05-01"
end_date = "2024-05-31"
"#,
    )
    .unwrap();

    let report = compile_json(&config_path, &["--end-date", "2024-06-15"]);
    assert_eq!(report["directive"]["dates"]["start"], "2024-05-01");
    assert_eq!(report["directive"]["dates"]["end"], "2024-06-15");
}

#[test]
fn test_invalid_config_file_fails() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("launch.toml");
    fs::write(&config_path, "[server\nport = 1").unwrap();

    let (_, stderr, success) = run_launch(&config_path, &["compile"]);
    assert!(!success);
    assert!(stderr.contains("parse config"), "stderr={}", stderr);
}
