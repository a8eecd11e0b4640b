use contextiq::config::{
    ErrorPolicy, GroqConfig, ModelConfig, OrchestratorConfig, StorageBackend, StorageConfig,
};
use contextiq::orchestrator::Orchestrator;
use contextiq::providers::{GroqProviderFactory, RetryPolicy};
use contextiq::secrets::{MapSecretSource, GROQ_API_KEY};
use contextiq::storage::{open_store, ConversationStore};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Both store backends, each in its own temporary directory
#[allow(dead_code)]
pub fn all_stores() -> Vec<(Box<dyn ConversationStore>, TempDir)> {
    [StorageBackend::Sqlite, StorageBackend::Json]
        .into_iter()
        .map(create_temp_store)
        .collect()
}

#[allow(dead_code)]
pub fn create_temp_store(backend: StorageBackend) -> (Box<dyn ConversationStore>, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let config = StorageConfig {
        backend,
        ..StorageConfig::in_dir(tmp.path())
    };
    let store = open_store(&config).expect("failed to open store");
    (store, tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Orchestrator pointed at a mock Groq server, retrying without delay
#[allow(dead_code)]
pub async fn groq_orchestrator(api_base: &str, policy: ErrorPolicy) -> Orchestrator {
    let groq = GroqConfig {
        api_base: api_base.to_string(),
    };
    let factory = GroqProviderFactory::new(groq).with_retry_policy(RetryPolicy {
        max_retries: 2,
        backoff: Duration::from_millis(10),
    });
    let orchestrator = Orchestrator::new(
        Arc::new(MapSecretSource::new().with(GROQ_API_KEY, "gsk_test")),
        Arc::new(factory),
        OrchestratorConfig {
            error_policy: policy,
            max_history_messages: None,
        },
    );
    orchestrator
        .initialize(ModelConfig::default())
        .await
        .expect("initialize should succeed");
    orchestrator
}
