mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use pdf_rag::store::{SqliteStore, VectorStore};

fn rag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("rag");
    path
}

struct TestEnv {
    _tmp: TempDir,
    root: PathBuf,
    data_dir: PathBuf,
    store_dir: PathBuf,
    config_path: PathBuf,
}

fn setup_test_env() -> TestEnv {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();
    let data_dir = root.join("Data");
    let store_dir = root.join("chroma");
    fs::create_dir_all(&data_dir).unwrap();

    let config_path = root.join("rag.toml");
    fs::write(&config_path, common::offline_config(&data_dir, &store_dir)).unwrap();

    TestEnv {
        _tmp: tmp,
        root,
        data_dir,
        store_dir,
        config_path,
    }
}

fn run_rag(env: &TestEnv, args: &[&str]) -> (String, String, bool) {
    run_rag_with_config(&env.root, &env.config_path, args)
}

fn run_rag_with_config(cwd: &Path, config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = rag_binary();
    let output = Command::new(&binary)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run rag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_ingest_single_pdf() {
    let env = setup_test_env();
    common::write_pdf(
        &env.data_dir.join("france.pdf"),
        &["The capital of Francia is Paris."],
    );

    let (stdout, stderr, success) = run_rag(&env, &["ingest"]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Split 1 documents into 1 chunks."));
    assert!(stdout.contains("Paris"));
    assert!(stdout.contains(&format!(
        "Saved 1 chunks to {}.",
        env.store_dir.display()
    )));
    assert!(env.store_dir.join("index.sqlite").is_file());
}

#[test]
fn test_ingest_counts_pages_as_documents() {
    let env = setup_test_env();
    common::write_pdf(
        &env.data_dir.join("a.pdf"),
        &["First page about lattices.", "Second page about sieves."],
    );
    common::write_pdf(
        &env.data_dir.join("nested/b.pdf"),
        &["Third page about vulnerability scoring."],
    );

    let (stdout, stderr, success) = run_rag(&env, &["ingest"]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Split 3 documents into 3 chunks."));
    assert!(stdout.contains("Saved 3 chunks"));
}

#[test]
fn test_ingest_missing_data_dir_fails() {
    let env = setup_test_env();
    fs::remove_dir_all(&env.data_dir).unwrap();

    let (_stdout, stderr, success) = run_rag(&env, &["ingest"]);
    assert!(!success, "ingest should fail without a data directory");
    assert!(stderr.contains("ingestion error"), "stderr={}", stderr);
    assert!(!env.store_dir.exists());
}

#[test]
fn test_ingest_without_pdfs_fails() {
    let env = setup_test_env();
    fs::write(env.data_dir.join("notes.txt"), "not a pdf").unwrap();

    let (_stdout, stderr, success) = run_rag(&env, &["ingest"]);
    assert!(!success);
    assert!(stderr.contains("no PDF files found"), "stderr={}", stderr);
}

#[test]
fn test_ingest_broken_pdf_fails_and_names_file() {
    let env = setup_test_env();
    fs::write(env.data_dir.join("broken.pdf"), b"this is not a pdf").unwrap();

    let (_stdout, stderr, success) = run_rag(&env, &["ingest"]);
    assert!(!success);
    assert!(stderr.contains("broken.pdf"), "stderr={}", stderr);
}

#[tokio::test]
async fn test_failed_reingest_keeps_previous_store() {
    let env = setup_test_env();
    common::write_pdf(&env.data_dir.join("good.pdf"), &["Good content page."]);

    let (stdout, stderr, success) = run_rag(&env, &["ingest"]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);

    fs::write(env.data_dir.join("zz-broken.pdf"), b"garbage").unwrap();
    let (_stdout, _stderr, success) = run_rag(&env, &["ingest"]);
    assert!(!success);

    let store = SqliteStore::new(&env.store_dir);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_reingest_replaces_store() {
    let env = setup_test_env();
    common::write_pdf(&env.data_dir.join("old.pdf"), &["Old material about sieves."]);
    let (_, stderr, success) = run_rag(&env, &["ingest"]);
    assert!(success, "first ingest failed: {}", stderr);

    fs::remove_file(env.data_dir.join("old.pdf")).unwrap();
    common::write_pdf(&env.data_dir.join("new.pdf"), &["New material about lattices."]);
    let (stdout, stderr, success) = run_rag(&env, &["ingest"]);
    assert!(success, "second ingest failed: {}", stderr);
    assert!(stdout.contains("Saved 1 chunks"));

    let store = SqliteStore::new(&env.store_dir);
    let results = store.similarity_search(&[0.0; 128], 20).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].source.ends_with("new.pdf"));
}

#[test]
fn test_query_without_store_reports_no_results() {
    let env = setup_test_env();

    let (stdout, stderr, success) = run_rag(&env, &["query", "What is the capital of Francia?"]);
    assert!(success, "query failed: stdout={}, stderr={}", stdout, stderr);
    assert_eq!(stdout.trim(), "Unable to find matching results.");
}

#[test]
fn test_query_debug_on_empty_store() {
    let env = setup_test_env();

    let (stdout, _stderr, success) = run_rag(&env, &["query", "anything", "--debug"]);
    assert!(success);
    assert!(stdout.contains("Unable to find matching results."));
}

#[test]
fn test_query_answers_with_sources() {
    let env = setup_test_env();
    let pdf = env.data_dir.join("france.pdf");
    common::write_pdf(&pdf, &["The capital of Francia is Paris."]);
    let (_, stderr, success) = run_rag(&env, &["ingest"]);
    assert!(success, "ingest failed: {}", stderr);

    let (llm_url, served) = common::ollama_chat_once("Paris.");
    fs::write(
        &env.config_path,
        common::config_with_llm(&env.data_dir, &env.store_dir, &llm_url),
    )
    .unwrap();

    let (stdout, stderr, success) = run_rag(&env, &["query", "What is the capital of Francia?"]);
    assert!(success, "query failed: stdout={}, stderr={}", stdout, stderr);
    assert_eq!(
        stdout,
        format!("\nResponse:\nParis.\n\nSources:\n{}\n", pdf.display())
    );

    let request = served.join().unwrap();
    assert!(request.starts_with("POST /api/chat"), "request={}", request);
    assert!(request.contains("The capital of Francia is Paris."));
    assert!(request.contains("What is the capital of Francia?"));
}

#[test]
fn test_query_with_unreachable_model_fails() {
    let env = setup_test_env();
    common::write_pdf(
        &env.data_dir.join("france.pdf"),
        &["The capital of Francia is Paris."],
    );
    let (_, stderr, success) = run_rag(&env, &["ingest"]);
    assert!(success, "ingest failed: {}", stderr);

    let (stdout, stderr, success) = run_rag(&env, &["query", "What is the capital of Francia?"]);
    assert!(!success, "query should fail: stdout={}", stdout);
    assert!(stderr.contains("inference"), "stderr={}", stderr);
    assert!(!stdout.contains("Response:"));
}

#[test]
fn test_invalid_config_rejected() {
    let env = setup_test_env();
    fs::write(
        &env.config_path,
        "[chunking]\nchunk_size = 100\nchunk_overlap = 100\n",
    )
    .unwrap();

    let (_stdout, stderr, success) = run_rag(&env, &["ingest"]);
    assert!(!success);
    assert!(stderr.contains("config error"), "stderr={}", stderr);
}

#[test]
fn test_missing_config_file_rejected() {
    let env = setup_test_env();
    let missing = env.root.join("nope.toml");

    let (_stdout, stderr, success) = run_rag_with_config(&env.root, &missing, &["query", "q"]);
    assert!(!success);
    assert!(stderr.contains("config error"), "stderr={}", stderr);
}

#[test]
fn test_query_requires_question() {
    let env = setup_test_env();
    let (_stdout, _stderr, success) = run_rag(&env, &["query"]);
    assert!(!success);
}
