use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn mrag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("mrag");
    path
}

const PUMP_MANUAL: &str = "Pump Manual\n\n\
Priming: open the vent valve on top of the casing and fill the casing with water until it \
flows steadily from the vent. Close the vent before starting the motor.\n\n\
Maintenance: lubricate the bearings every 500 operating hours and inspect the mechanical \
seal for leaks. Replace the seal if water drips from the shaft.\n\n\
Troubleshooting: if the pump runs but delivers no water, check for air in the suction line \
and confirm the foot valve is not stuck closed.";

const SAFETY_GUIDE: &str = "Safety Guide\n\n\
Always wear eye protection in the workshop. Keep the fire exits clear and know where the \
nearest extinguisher is mounted before starting hot work of any kind.";

fn setup_test_env(backend: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    // Create config
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Create test files
    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(files_dir.join("pump.txt"), PUMP_MANUAL).unwrap();
    fs::write(files_dir.join("safety.md"), SAFETY_GUIDE).unwrap();
    fs::write(files_dir.join("stub.txt"), "Too short.").unwrap();

    let config_content = format!(
        r#"[store]
backend = "{}"
path = "{}/data/vector_index"

[extraction]
ocr_enabled = false

[chunking]
chunk_size = 300
overlap = 60

[embedding]
provider = "hash"
dims = 256

[retrieval]
top_k = 4
max_context_chunks = 2
"#,
        backend,
        root.display()
    );

    let config_path = config_dir.join("mrag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_mrag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = mrag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run mrag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
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

fn index(config_path: &Path, id: &str, name: &str) {
    let (stdout, stderr, success) = run_mrag(config_path, &["index", id, &file(config_path, name)]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("status: indexed"));
}

#[test]
fn test_index_and_search_both_backends() {
    for backend in ["sqlite", "memory"] {
        let (_tmp, config_path) = setup_test_env(backend);
        index(&config_path, "7", "pump.txt");
        index(&config_path, "8", "safety.md");

        let (stdout, stderr, success) = run_mrag(
            &config_path,
            &["search", "bearings seal maintenance", "--document", "7", "--top-k", "3"],
        );
        assert!(success, "search failed: {}", stderr);
        assert!(stdout.contains("document=7"), "{}: {}", backend, stdout);
        assert!(!stdout.contains("document=8"));
    }
}

#[test]
fn test_context_prints_joined_chunks() {
    let (_tmp, config_path) = setup_test_env("sqlite");
    index(&config_path, "7", "pump.txt");

    let (stdout, _, success) = run_mrag(
        &config_path,
        &["context", "priming the vent valve", "--document", "7"],
    );
    assert!(success);
    assert!(stdout.contains("vent"));
}

#[test]
fn test_delete_then_context_is_empty() {
    let (_tmp, config_path) = setup_test_env("memory");
    index(&config_path, "7", "pump.txt");

    let (stdout, _, success) = run_mrag(&config_path, &["delete", "7"]);
    assert!(success);
    assert!(stdout.contains("deleted 7"));

    let (stdout, _, success) = run_mrag(&config_path, &["context", "priming", "--document", "7"]);
    assert!(success);
    assert!(stdout.trim().is_empty(), "expected no context, got {:?}", stdout);
}

#[test]
fn test_short_document_is_rejected() {
    let (_tmp, config_path) = setup_test_env("sqlite");

    let (stdout, stderr, success) = run_mrag(
        &config_path,
        &["index", "9", &file(&config_path, "stub.txt")],
    );
    assert!(!success, "short document should not index");
    assert!(stdout.contains("status: failed"));
    assert!(stderr.contains("insufficient content"));

    let (stdout, _, _) = run_mrag(&config_path, &["stats"]);
    assert!(stdout.contains("\"total_entries\": 0"));
}

#[test]
fn test_reindex_and_stats() {
    let (_tmp, config_path) = setup_test_env("sqlite");
    index(&config_path, "7", "pump.txt");

    let (stdout, _, _) = run_mrag(&config_path, &["stats"]);
    let stats: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let first = stats["total_entries"].as_u64().unwrap();
    assert!(first > 0);
    assert_eq!(stats["backend"], "sqlite");
    assert_eq!(stats["embedding_model"], "hash");

    let (_, stderr, success) = run_mrag(
        &config_path,
        &["index", "7", &file(&config_path, "pump.txt"), "--reindex"],
    );
    assert!(success, "reindex failed: {}", stderr);

    let (stdout, _, _) = run_mrag(&config_path, &["stats"]);
    let stats: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(stats["total_entries"].as_u64().unwrap(), first);
}

#[test]
fn test_list_and_reset() {
    let (_tmp, config_path) = setup_test_env("memory");
    index(&config_path, "7", "pump.txt");

    let (stdout, _, success) = run_mrag(&config_path, &["list", "--limit", "1"]);
    assert!(success);
    assert_eq!(stdout.lines().count(), 1);
    assert!(stdout.starts_with("doc_7_chunk_0\t"));

    let (_, _, success) = run_mrag(&config_path, &["reset"]);
    assert!(success);
    let (stdout, _, _) = run_mrag(&config_path, &["search", "pump"]);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_extract_prints_text() {
    let (_tmp, config_path) = setup_test_env("sqlite");
    let (stdout, stderr, success) =
        run_mrag(&config_path, &["extract", &file(&config_path, "pump.txt")]);
    assert!(success);
    assert!(stdout.contains("Troubleshooting"));
    assert!(stderr.contains("method: plain_text"));
}

#[test]
fn test_invalid_config_fails() {
    let (_tmp, config_path) = setup_test_env("sqlite");
    fs::write(&config_path, "[chunking]\nchunk_size = 100\noverlap = 150\n").unwrap();
    let (_, stderr, success) = run_mrag(&config_path, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("overlap"));
}
