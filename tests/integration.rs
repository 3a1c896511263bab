use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

use csv_uploader::backend::sqlite::SqliteConnection;
use csv_uploader::models::BackendConfig;

fn csvup_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_csvup"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("words.csv"),
        "word,english,kanji\nneko,cat,猫\ninu,dog,犬\n\ntori,bird,鳥\n",
    )
    .unwrap();
    fs::write(files_dir.join("missing.csv"), "word,kanji\nneko,猫\n").unwrap();
    fs::write(
        files_dir.join("ragged.csv"),
        "word,english\nneko,cat\ninu\n",
    )
    .unwrap();
    fs::write(files_dir.join("blank.csv"), "").unwrap();

    // Port 9 on loopback is closed on any sane test machine.
    let config_content = format!(
        r#"[[backends]]
id = "local"
name = "Local Store"
[backends.params]
driver = "sqlite"
path = "{root}/data/docs.sqlite"

[[backends]]
id = "scratch"
name = "Scratch"
[backends.params]
driver = "memory"

[[backends]]
id = "remote"
name = "Remote"
[backends.params]
driver = "http"
base_url = "http://127.0.0.1:9"

[collection]
name = "vocabulary"
required_fields = ["word", "english"]

[upload]
chunk_size = 2
"#,
        root = root.display()
    );

    let config_path = config_dir.join("csvup.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_csvup(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    run_csvup_stdin(config_path, args, "")
}

fn run_csvup_stdin(config_path: &Path, args: &[&str], stdin: &str) -> (String, String, bool) {
    let binary = csvup_binary();
    let mut child = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap_or_else(|e| panic!("Failed to run csvup binary at {:?}: {}", binary, e));

    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn file(config_path: &Path, name: &str) -> String {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("files")
        .join(name)
        .display()
        .to_string()
}

async fn stored_documents(config_path: &Path) -> Vec<csv_uploader::models::Row> {
    let root = config_path.parent().unwrap().parent().unwrap();
    let cfg = BackendConfig::new("local", "Local Store")
        .with_param("driver", "sqlite")
        .with_param("path", root.join("data/docs.sqlite").display().to_string());
    let conn = SqliteConnection::open(&cfg).await.unwrap();
    conn.documents("vocabulary").await.unwrap()
}

#[test]
fn test_backends_lists_all_with_first_active() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_csvup(&config_path, &["backends"]);
    assert!(success, "backends failed: stdout={}, stderr={}", stdout, stderr);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with("local") && lines[1].ends_with("true"));
    assert!(lines[2].starts_with("scratch") && lines[2].ends_with("false"));
    assert!(lines[3].contains("http"));
}

#[test]
fn test_check_connected() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_csvup(&config_path, &["check"]);
    assert!(success, "check failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("connected: true"));
    assert!(stdout.contains("Connected to Local Store"));

    let (stdout, _, success) = run_csvup(&config_path, &["check", "--backend", "scratch"]);
    assert!(success);
    assert!(stdout.contains("Connected to Scratch"));
}

#[test]
fn test_check_unreachable_backend_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_csvup(&config_path, &["check", "--backend", "remote"]);
    assert!(!success);
    assert!(stdout.contains("connected: false"));
    assert!(stdout.contains("Unable to connect"));
}

#[test]
fn test_validate_ok() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) =
        run_csvup(&config_path, &["validate", &file(&config_path, "words.csv")]);
    assert!(success, "validate failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("rows: 3"));
    assert!(stdout.contains("columns: word, english, kanji"));
}

#[test]
fn test_validate_missing_field() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) =
        run_csvup(&config_path, &["validate", &file(&config_path, "missing.csv")]);
    assert!(!success);
    assert!(stderr.contains("Missing required field: english"), "{}", stderr);
}

#[test]
fn test_validate_ragged_csv() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) =
        run_csvup(&config_path, &["validate", &file(&config_path, "ragged.csv")]);
    assert!(!success);
    assert!(stderr.contains("Error parsing CSV data"), "{}", stderr);
}

#[test]
fn test_validate_empty_file() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) =
        run_csvup(&config_path, &["validate", &file(&config_path, "blank.csv")]);
    assert!(!success);
    assert!(stderr.contains("CSV data is empty"), "{}", stderr);
}

#[test]
fn test_upload_dry_run_writes_nothing() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_csvup(
        &config_path,
        &["upload", &file(&config_path, "words.csv"), "--dry-run"],
    );
    assert!(success, "upload failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Showing 1 to 3 of 3 entries"));
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("rows: 3"));
    assert!(stdout.contains("chunks: 2"));
}

#[tokio::test]
async fn test_upload_to_sqlite() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_csvup(
        &config_path,
        &[
            "upload",
            &file(&config_path, "words.csv"),
            "--progress",
            "json",
        ],
    );
    assert!(success, "upload failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("rows written: 3"));
    assert!(stdout.contains("chunks: 2"));
    assert!(stderr.contains("\"phase\":\"writing\""));

    let docs = stored_documents(&config_path).await;
    assert_eq!(docs.len(), 3);
    let keys: Vec<&String> = docs[0].keys().collect();
    assert_eq!(keys, vec!["id", "timestamp", "word", "english", "kanji"]);
    assert_eq!(docs[2]["word"], "tori");
}

#[tokio::test]
async fn test_upload_with_deletions() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_csvup(
        &config_path,
        &[
            "upload",
            &file(&config_path, "words.csv"),
            "--delete",
            "1",
            "--delete",
            "3",
        ],
    );
    assert!(success, "upload failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("rows written: 1"));

    let docs = stored_documents(&config_path).await;
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["word"], "inu");
}

#[test]
fn test_upload_from_stdin_to_memory_backend() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_csvup_stdin(
        &config_path,
        &["upload", "-", "--backend", "scratch", "--collection", "kana"],
        "english,word\nyes,hai\n",
    );
    assert!(success, "upload failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("upload kana"));
    assert!(stdout.contains("backend: Scratch"));
    assert!(stdout.contains("rows written: 1"));
}

#[test]
fn test_upload_blank_stdin_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_csvup_stdin(&config_path, &["upload", "-"], "  \n\n");
    assert!(!success);
    assert!(stderr.contains("input is empty"));
}

#[test]
fn test_upload_unknown_backend_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_csvup(
        &config_path,
        &["upload", &file(&config_path, "words.csv"), "--backend", "nope"],
    );
    assert!(!success);
    assert!(stderr.contains("not found: nope"), "{}", stderr);
}

#[test]
fn test_paste_config() {
    let (_tmp, config_path) = setup_test_env();

    let snippet = r#"const firebaseConfig = {
  apiKey: "AIzaExample",
  projectId: "kanji-study-app",
  appId: "1:892347123456:web:abc123def456",
};"#;
    let (stdout, stderr, success) = run_csvup_stdin(&config_path, &["paste-config"], snippet);
    assert!(success, "paste-config failed: stderr={}", stderr);
    assert!(stdout.contains("[[backends]]"));
    assert!(stdout.contains("id = \"kanji-study-app\""));
    assert!(stdout.contains("name = \"Kanji\""));
    assert!(stdout.contains("appId = \"1:892347123456:web:abc123def456\""));
}

#[test]
fn test_watch_prints_requested_count() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_csvup(&config_path, &["watch", "--count", "1"]);
    assert!(success, "watch failed: stderr={}", stderr);
    assert!(stdout.contains("connected=true"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_csvup(&tmp.path().join("nope.toml"), &["backends"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
