//! Publish binary - pushes the saved translated dataset to the Hugging Face Hub
//!
//! Usage:
//!   cargo run --bin publish
//!
//! Required environment variables:
//! - HF_TOKEN
//!
//! Optional:
//! - OUTPUT_DIR (defaults to translated_dataset)
//! - HUB_REPO_ID (defaults to Kiran189/CognitiveLabs)
//! - HUB_SPLIT (defaults to train)

use anyhow::Result;
use dataset_translator::{config::Config, hub::HubClient, pipeline, storage};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dataset_translator=info".parse()?)
                .add_directive("publish=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    let hub = HubClient::new(pipeline::http_client()?, &config.hub_api_url);

    // Credential lives for this run only and is handed to each Hub call
    let credential = hub.login(config.require_hf_token()?).await?;

    let dataset = storage::load_from_disk(&config.output_dir)?;
    info!(
        "Publishing {} rows from {} to {} (split '{}')",
        dataset.num_rows(),
        config.output_dir.display(),
        config.hub_repo_id,
        config.hub_split
    );

    let commit_url = hub
        .push_dataset(&credential, &config.hub_repo_id, &config.hub_split, &dataset)
        .await?;

    info!("✓ Dataset published: {}", commit_url);
    Ok(())
}
