use anyhow::Result;
use dataset_translator::{config::Config, pipeline};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when not present)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dataset_translator=info".parse()?),
        )
        .init();

    info!("Starting dataset translation job");

    let config = Config::from_env()?;
    info!(
        "Dataset {} ({} rows max), {} -> {}, batch size {}, max {} concurrent units",
        config.dataset_id,
        config.row_limit,
        config.source_lang,
        config.target_lang,
        config.batch_size,
        config.max_concurrency
    );

    let dataset = pipeline::run(&config).await?;

    info!(
        "✓ Translated dataset ready: {} rows, columns {:?}",
        dataset.num_rows(),
        dataset.column_names()
    );
    info!("Run the `publish` binary to push it to the Hub");
    Ok(())
}
