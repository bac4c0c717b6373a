#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

//! End-to-end tests for conversation memory against a mock Ollama server
//!
//! These tests cover the full pipeline:
//! - discovering and parsing session logs on disk
//! - embedding turns through the HTTP embedding endpoint
//! - persisting and reloading the index snapshot
//! - retrieval with session exclusion and context rendering

use std::fs;
use std::path::Path;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use conversation_memory::config::{Config, MemoryConfig, OllamaConfig};
use conversation_memory::{ConversationMemory, initialize};

const VOCABULARY: [&str; 6] = ["gensol", "solar", "dlf", "apartments", "rust", "language"];

/// Bag-of-words embedding over a tiny vocabulary, so related texts land close together
fn keyword_embedding(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    VOCABULARY
        .iter()
        .map(|word| lower.matches(word).count() as f32)
        .collect()
}

async fn start_embedding_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(|request: &Request| {
            let body: serde_json::Value = match serde_json::from_slice(&request.body) {
                Ok(body) => body,
                Err(_) => return ResponseTemplate::new(400),
            };
            let prompt = body["prompt"].as_str().unwrap_or_default();
            ResponseTemplate::new(200)
                .set_body_json(json!({ "embedding": keyword_embedding(prompt) }))
        })
        .mount(&server)
        .await;
    server
}

fn config_for(server: &MockServer, temp_dir: &TempDir) -> Config {
    let address = server.address();
    Config {
        ollama: OllamaConfig {
            host: address.ip().to_string(),
            port: address.port(),
            timeout_seconds: 5,
            ..OllamaConfig::default()
        },
        memory: MemoryConfig {
            memory_dir: temp_dir.path().join("memory"),
            index_dir: temp_dir.path().join("conversation_index"),
            ..MemoryConfig::default()
        },
        base_dir: temp_dir.path().to_path_buf(),
    }
}

fn write_session(dir: &Path, session_id: &str, turns: &[(&str, &str, i64)]) {
    let mut records = vec![json!({ "type": "run_metadata", "text": "Agent booted", "timestamp": 0 })];
    for (query, answer, timestamp) in turns {
        records.push(json!({
            "type": "run_metadata",
            "text": format!("Started new session with input: {}", query),
            "timestamp": timestamp - 5,
        }));
        records.push(json!({
            "type": "tool_output",
            "tool_result": { "result": format!("FINAL_ANSWER: {}", answer) },
            "timestamp": timestamp,
        }));
    }

    fs::create_dir_all(dir).expect("should create session dir");
    fs::write(
        dir.join(format!("{}.json", session_id)),
        serde_json::to_string_pretty(&records).expect("encode session"),
    )
    .expect("should write session");
}

fn seed_sessions(config: &Config) {
    let memory_dir = &config.memory.memory_dir;
    write_session(
        &memory_dir.join("2025/01/15"),
        "session-1736950000-solar",
        &[
            (
                "What is the relationship between Gensol and Go-Auto?",
                "Gensol is a solar EPC firm; Go-Auto is a related party.",
                1_736_950_000,
            ),
            (
                "Is Rust a good language for CLIs?",
                "Rust is a fine language for command line tools.",
                1_736_950_600,
            ),
        ],
    );
    write_session(
        &memory_dir.join("2025/01/16"),
        "session-1737036400-realty",
        &[(
            "Tell me about DLF apartments",
            "DLF builds apartments across India.",
            1_737_036_400,
        )],
    );
}

#[tokio::test]
async fn index_and_search_end_to_end() {
    let server = start_embedding_server().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&server, &temp_dir);
    seed_sessions(&config);

    let (results, context, stats) = tokio::task::spawn_blocking(move || {
        let memory = initialize(config, true).expect("should initialize");
        let (results, context) = memory.search_context(
            "Anything new about Gensol solar?",
            Some("session-current"),
        );
        (results, context, memory.stats())
    })
    .await
    .expect("blocking task should not panic");

    assert_eq!(stats.total_conversations, 3);
    assert_eq!(stats.index_size, 3);
    assert_eq!(stats.cached_files, 2);
    assert_eq!(stats.dimension, Some(VOCABULARY.len()));

    assert_eq!(
        results[0].turn.query,
        "What is the relationship between Gensol and Go-Auto?"
    );
    assert_eq!(results[0].turn.session_id, "session-1736950000-solar");
    assert_eq!(results[0].turn.date, "2025-01-15 14:06:40");
    assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
    assert!(context.contains("1. [2025-01-15 14:06:40]"));
}

#[tokio::test]
async fn current_session_is_excluded() {
    let server = start_embedding_server().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&server, &temp_dir);
    seed_sessions(&config);

    let results = tokio::task::spawn_blocking(move || {
        let memory = initialize(config, true).expect("should initialize");
        memory
            .search("Gensol solar", Some("session-1736950000-solar"))
            .expect("should search")
    })
    .await
    .expect("blocking task should not panic");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].turn.session_id, "session-1737036400-realty");
}

#[tokio::test]
async fn restart_reuses_snapshot() {
    let server = start_embedding_server().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&server, &temp_dir);
    seed_sessions(&config);

    let (first, second, report) = tokio::task::spawn_blocking(move || {
        let memory = initialize(config.clone(), true).expect("should initialize");
        let first = memory.search("DLF apartments", None).expect("should search");
        drop(memory);

        let mut memory = ConversationMemory::open(config).expect("should reopen");
        let second = memory.search("DLF apartments", None).expect("should search");
        let report = memory.index_all(false).expect("should index");
        (first, second, report)
    })
    .await
    .expect("blocking task should not panic");

    assert_eq!(first, second);
    assert_eq!(first[0].turn.query, "Tell me about DLF apartments");
    assert_eq!(report.files_unchanged, 2);
    assert_eq!(report.turns_added, 0);
}

#[tokio::test]
async fn embedding_outage_degrades_gracefully() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&server, &temp_dir);
    seed_sessions(&config);

    let (report, results, context) = tokio::task::spawn_blocking(move || {
        let mut memory = ConversationMemory::open(config).expect("should open");
        let report = memory.index_all(false).expect("indexing completes");
        let (results, context) = memory.search_context("Gensol", None);
        (report, results, context)
    })
    .await
    .expect("blocking task should not panic");

    assert_eq!(report.turns_added, 3);
    assert_eq!(report.degraded_turns, 3);
    assert_eq!(results.len(), 3);
    assert!(!context.is_empty());
}
