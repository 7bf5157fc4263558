use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // Input dataset
    pub dataset_id: String,
    pub dataset_config: String,
    pub dataset_split: String,
    pub row_limit: usize,
    pub input_jsonl: Option<PathBuf>,
    pub datasets_server_url: String,

    // Translation
    pub source_lang: String,
    pub target_lang: String,
    pub column_suffix: String,
    pub translate_api_url: String,

    // Dispatch
    pub batch_size: usize,
    pub max_concurrency: usize,
    pub unit_timeout: Duration,

    // Output
    pub output_dir: PathBuf,

    // Hugging Face Hub
    pub hub_repo_id: String,
    pub hub_split: String,
    pub hub_api_url: String,
    pub hf_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            // Input dataset
            dataset_id: env_or("DATASET_ID", "derek-thomas/ScienceQA"),
            dataset_config: env_or("DATASET_CONFIG", "default"),
            dataset_split: env_or("DATASET_SPLIT", "train"),
            row_limit: env_parse("ROW_LIMIT", 10_000)?,
            input_jsonl: std::env::var("INPUT_JSONL").ok().map(PathBuf::from),
            datasets_server_url: env_or(
                "DATASETS_SERVER_URL",
                "https://datasets-server.huggingface.co",
            ),

            // Translation
            source_lang: env_or("SOURCE_LANG", "en"),
            target_lang: env_or("TARGET_LANG", "kn"),
            column_suffix: env_or("COLUMN_SUFFIX", "_kannada"),
            translate_api_url: env_or("TRANSLATE_API_URL", "https://translate.googleapis.com"),

            // Dispatch
            batch_size: env_parse("BATCH_SIZE", 100)?,
            max_concurrency: env_parse("MAX_CONCURRENCY", 100)?,
            unit_timeout: Duration::from_secs(env_parse("UNIT_TIMEOUT_SECS", 600)?),

            // Output
            output_dir: PathBuf::from(env_or("OUTPUT_DIR", "translated_dataset")),

            // Hugging Face Hub
            hub_repo_id: env_or("HUB_REPO_ID", "Kiran189/CognitiveLabs"),
            hub_split: env_or("HUB_SPLIT", "train"),
            hub_api_url: env_or("HUB_API_URL", "https://huggingface.co"),
            hf_token: std::env::var("HF_TOKEN").ok().filter(|t| !t.is_empty()),
        })
    }

    /// Token for publishing; only the publish step needs it
    pub fn require_hf_token(&self) -> Result<&str> {
        self.hf_token.as_deref().context("HF_TOKEN not set")
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional variable, failing on a present but malformed value
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", key, value)),
        Err(_) => Ok(default),
    }
}
