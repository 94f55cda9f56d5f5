use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn tarix_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("tarix");
    path
}

const RECORDS_JSON: &str = r#"[
  {
    "htsnumber": "0101.21.00",
    "indent": 2,
    "description": "Purebred breeding horses",
    "unitofquantity": "No.",
    "generalrateofduty": "Free",
    "specialrateofduty": null,
    "extrarateofduty": null,
    "quotaquantity": null,
    "additionalduties": null
  },
  {
    "htsnumber": "8471.30.01",
    "indent": 1,
    "description": "Portable automatic data processing machines, weighing not more than 10 kg",
    "unitofquantity": "No.",
    "generalrateofduty": "Free",
    "specialrateofduty": null,
    "extrarateofduty": null,
    "quotaquantity": null,
    "additionalduties": null
  },
  {
    "htsnumber": null,
    "indent": 0,
    "description": "Heading text without a number",
    "unitofquantity": null,
    "generalrateofduty": null,
    "specialrateofduty": null,
    "extrarateofduty": null,
    "quotaquantity": null,
    "additionalduties": null
  }
]"#;

/// Config with everything disabled — exercises the paths that need no
/// credentials.
fn setup_test_env() -> (TempDir, PathBuf, PathBuf) {
    setup_with_config(
        r#"[db]
path = "{ROOT}/data/tarix.sqlite"

[server]
bind = "127.0.0.1:7411"
"#,
    )
}

/// Config with an embedding provider configured but no token in the
/// environment — exercises validation before any network call.
fn setup_embedding_env() -> (TempDir, PathBuf, PathBuf) {
    setup_with_config(
        r#"[db]
path = "{ROOT}/data/tarix.sqlite"

[embedding]
provider = "huggingface"
model = "sentence-transformers/all-MiniLM-L6-v2"
dims = 384

[server]
bind = "127.0.0.1:7411"
"#,
    )
}

fn setup_with_config(template: &str) -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let records_path = root.join("records.json");
    fs::write(&records_path, RECORDS_JSON).unwrap();

    let config_path = config_dir.join("tarix.toml");
    fs::write(&config_path, template.replace("{ROOT}", &root.display().to_string())).unwrap();

    (tmp, config_path, records_path)
}

fn run_tarix(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = tarix_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("HF_TOKEN")
        .env_remove("OPENAI_API_KEY")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run tarix binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path, _) = setup_test_env();

    let (stdout, stderr, success) = run_tarix(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data").join("tarix.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path, _) = setup_test_env();

    let (_, _, success1) = run_tarix(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_tarix(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_load_records() {
    let (_tmp, config_path, records_path) = setup_test_env();

    run_tarix(&config_path, &["init"]);
    let (stdout, stderr, success) =
        run_tarix(&config_path, &["load", records_path.to_str().unwrap()]);
    assert!(success, "load failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("inserted records: 3"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_load_replace_no_duplicates() {
    let (_tmp, config_path, records_path) = setup_test_env();
    let records = records_path.to_str().unwrap();

    run_tarix(&config_path, &["init"]);
    run_tarix(&config_path, &["load", records]);
    let (stdout, _, success) = run_tarix(&config_path, &["load", records, "--replace"]);
    assert!(success);
    assert!(stdout.contains("replaced existing rows: 3"));

    let (stdout, _, _) = run_tarix(&config_path, &["stats"]);
    assert!(
        stdout.contains("records: 3"),
        "Expected 3 records after replace, got: {}",
        stdout
    );
}

#[test]
fn test_load_missing_file_fails() {
    let (_tmp, config_path, _) = setup_test_env();

    run_tarix(&config_path, &["init"]);
    let (_, stderr, success) = run_tarix(&config_path, &["load", "/nonexistent/records.json"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read records file"));
}

#[test]
fn test_stats_counts_unembedded_rows() {
    let (_tmp, config_path, records_path) = setup_test_env();

    run_tarix(&config_path, &["init"]);
    run_tarix(&config_path, &["load", records_path.to_str().unwrap()]);

    let (stdout, _, success) = run_tarix(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("records: 3"));
    assert!(stdout.contains("embedded: 0"));
    assert!(stdout.contains("unembedded: 3"));
}

#[test]
fn test_lookup_substring_match() {
    let (_tmp, config_path, records_path) = setup_test_env();

    run_tarix(&config_path, &["init"]);
    run_tarix(&config_path, &["load", records_path.to_str().unwrap()]);

    let (stdout, _, success) = run_tarix(&config_path, &["lookup", "8471"]);
    assert!(success);
    assert!(
        stdout.contains("8471.30.01"),
        "Expected 8471.30.01 in results, got: {}",
        stdout
    );
    assert!(stdout.contains("Portable automatic data processing machines"));
}

#[test]
fn test_lookup_no_results() {
    let (_tmp, config_path, records_path) = setup_test_env();

    run_tarix(&config_path, &["init"]);
    run_tarix(&config_path, &["load", records_path.to_str().unwrap()]);

    let (stdout, _, success) = run_tarix(&config_path, &["lookup", "9999"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_lookup_empty_query_fails() {
    let (_tmp, config_path, _) = setup_test_env();

    run_tarix(&config_path, &["init"]);
    let (_, stderr, success) = run_tarix(&config_path, &["lookup", "   "]);
    assert!(!success, "Empty lookup should fail");
    assert!(
        stderr.contains("query must not be empty"),
        "Should report the empty query, got: {}",
        stderr
    );
}

#[test]
fn test_search_errors_when_embeddings_disabled() {
    let (_tmp, config_path, _) = setup_test_env();

    run_tarix(&config_path, &["init"]);
    let (_, stderr, success) = run_tarix(&config_path, &["search", "horses"]);
    assert!(!success, "Search should fail when embeddings disabled");
    assert!(
        stderr.contains("embeddings"),
        "Should mention embeddings, got: {}",
        stderr
    );
}

#[test]
fn test_search_empty_query_rejected() {
    let (_tmp, config_path, _) = setup_embedding_env();

    run_tarix(&config_path, &["init"]);
    for query in ["", "   "] {
        let (_, stderr, success) = run_tarix(&config_path, &["search", query]);
        assert!(!success, "Empty query should fail");
        assert!(
            stderr.contains("query must not be empty"),
            "Should report the empty query, got: {}",
            stderr
        );
    }
}

#[test]
fn test_search_fails_without_token() {
    let (_tmp, config_path, records_path) = setup_embedding_env();

    run_tarix(&config_path, &["init"]);
    run_tarix(&config_path, &["load", records_path.to_str().unwrap()]);

    let (_, stderr, success) = run_tarix(&config_path, &["search", "horses"]);
    assert!(!success, "Search without HF_TOKEN should fail");
    assert!(
        stderr.contains("HF_TOKEN"),
        "Should mention the missing token, got: {}",
        stderr
    );
}

#[test]
fn test_embed_errors_when_disabled() {
    let (_tmp, config_path, _) = setup_test_env();

    run_tarix(&config_path, &["init"]);
    for args in [
        &["embed", "all"] as &[&str],
        &["embed", "pending"],
        &["embed", "all", "--dry-run"],
    ] {
        let (_, stderr, success) = run_tarix(&config_path, args);
        assert!(!success, "embed should fail when provider disabled");
        assert!(
            stderr.contains("disabled"),
            "Should mention disabled, got: {}",
            stderr
        );
    }
}

#[test]
fn test_embed_fails_without_token() {
    let (_tmp, config_path, records_path) = setup_embedding_env();

    run_tarix(&config_path, &["init"]);
    run_tarix(&config_path, &["load", records_path.to_str().unwrap()]);

    let (_, stderr, success) = run_tarix(&config_path, &["embed", "all"]);
    assert!(!success, "embed without HF_TOKEN should fail");
    assert!(stderr.contains("HF_TOKEN"));
}

#[test]
fn test_ask_errors_when_disabled() {
    let (_tmp, config_path, _) = setup_test_env();

    run_tarix(&config_path, &["init"]);
    let (_, stderr, success) = run_tarix(&config_path, &["ask", "What is the duty on horses?"]);
    assert!(!success, "ask should fail when providers disabled");
    assert!(
        stderr.contains("embeddings") || stderr.contains("answer provider"),
        "Should mention the missing provider, got: {}",
        stderr
    );
}

#[test]
fn test_unknown_embedding_provider_rejected() {
    let (_tmp, config_path, _) = setup_with_config(
        r#"[db]
path = "{ROOT}/data/tarix.sqlite"

[embedding]
provider = "word2vec"
model = "x"
dims = 100

[server]
bind = "127.0.0.1:7411"
"#,
    );

    let (_, stderr, success) = run_tarix(&config_path, &["stats"]);
    assert!(!success, "Unknown provider should fail config validation");
    assert!(stderr.contains("Unknown embedding provider"));
}
