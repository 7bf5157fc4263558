use crate::aggregate::aggregate;
use crate::batch::{partition, BatchRange};
use crate::columns::ColumnSet;
use crate::config::Config;
use crate::dataset::Dataset;
use crate::dispatch::{LocalDispatcher, ParallelMap};
use crate::rewrite::{rewrite, RewritePolicy};
use crate::source::{DatasetSource, HubRowsSource, JsonLinesSource};
use crate::storage::save_to_disk;
use crate::translation::{GoogleTranslator, ItemTranslator, TranslatedColumn};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Partition, translate in parallel, aggregate and rewrite `dataset`.
///
/// Item failures end up as error markers in the output; any dispatch or
/// shape failure aborts the whole run.
pub async fn translate_dataset<D: ParallelMap>(
    dataset: Dataset,
    columns: &ColumnSet,
    batch_size: usize,
    dispatcher: &D,
    translator: &ItemTranslator,
    policy: &RewritePolicy,
) -> Result<Dataset> {
    // An empty input with no schema has nothing to partition
    if dataset.num_rows() == 0 && dataset.num_columns() == 0 {
        warn!("Dataset is empty, nothing to translate");
        return Ok(dataset);
    }

    info!(
        "Dividing {} rows into batches of size {}...",
        dataset.num_rows(),
        batch_size
    );
    let batches = partition(&dataset, columns, batch_size)?;
    let ranges: Vec<BatchRange> = batches.iter().map(|b| b.range).collect();

    info!(
        "Translating {} batches ({} -> {})",
        batches.len(),
        translator.source_lang(),
        translator.target_lang()
    );
    let started = Instant::now();

    let unit_translator = translator.clone();
    let unit_columns = Arc::new(columns.clone());
    let results = dispatcher
        .map(batches, move |batch| {
            let translator = unit_translator.clone();
            let columns = Arc::clone(&unit_columns);
            async move { translator.translate_batch(&batch, &columns).await }
        })
        .await
        .context("Batch translation failed")?;

    let failed: usize = results
        .iter()
        .flat_map(|r| r.columns.iter())
        .map(|(_, column)| count_failures(column))
        .sum();
    info!(
        "✓ Translation done in {:.1?} ({} items failed)",
        started.elapsed(),
        failed
    );

    let translated = aggregate(results, columns, &ranges)?;
    let rewritten = rewrite(dataset, translated, policy)?;
    Ok(rewritten)
}

fn count_failures(column: &TranslatedColumn) -> usize {
    match column {
        TranslatedColumn::Text(cells) => cells.iter().filter(|t| t.is_failed()).count(),
        TranslatedColumn::TextList(cells) => cells
            .iter()
            .flatten()
            .filter(|t| t.is_failed())
            .count(),
    }
}

/// HTTP client shared by the source and the translator
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .connect_timeout(Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")
}

/// Input configured by `INPUT_JSONL`, falling back to the Hub rows API
pub fn dataset_source(config: &Config, client: reqwest::Client) -> Box<dyn DatasetSource> {
    match &config.input_jsonl {
        Some(path) => Box::new(JsonLinesSource::new(path, Some(config.row_limit))),
        None => Box::new(HubRowsSource::new(
            client,
            &config.datasets_server_url,
            &config.dataset_id,
            &config.dataset_config,
            &config.dataset_split,
            config.row_limit,
        )),
    }
}

/// Load the configured dataset, translate it and save it to `config.output_dir`
pub async fn run(config: &Config) -> Result<Dataset> {
    let client = http_client()?;

    info!("Loading dataset...");
    let dataset = dataset_source(config, client.clone()).load().await?;

    let translator = ItemTranslator::new(
        Arc::new(GoogleTranslator::new(client, &config.translate_api_url)),
        &config.source_lang,
        &config.target_lang,
    );
    let dispatcher = LocalDispatcher::new(config.max_concurrency, config.unit_timeout)?;
    let policy = RewritePolicy::new(&config.column_suffix).with_excluded("lecture");

    let translated = translate_dataset(
        dataset,
        &ColumnSet::science_qa(),
        config.batch_size,
        &dispatcher,
        &translator,
        &policy,
    )
    .await?;

    save_to_disk(&translated, &config.output_dir)?;
    info!(
        "Saved translated dataset to {} folder",
        config.output_dir.display()
    );

    Ok(translated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::ColumnSpec;
    use crate::translation::TextTranslator;
    use async_trait::async_trait;
    use serde_json::json;

    struct PrefixTranslator;

    #[async_trait]
    impl TextTranslator for PrefixTranslator {
        async fn translate(&self, text: &str, _source: &str, target: &str) -> Result<String> {
            if text == "boom" {
                anyhow::bail!("unsupported input");
            }
            Ok(format!("{}:{}", target, text))
        }
    }

    fn columns() -> ColumnSet {
        ColumnSet::new(vec![
            ColumnSpec::text("question"),
            ColumnSpec::text_list("choices"),
        ])
        .unwrap()
    }

    fn dataset() -> Dataset {
        Dataset::from_columns(vec![
            ("question", vec![json!("one"), json!("boom"), json!("three")]),
            ("choices", vec![json!(["a"]), json!(["b", "c"]), json!([])]),
            ("lecture", vec![json!("l"), json!("l"), json!("l")]),
            ("answer", vec![json!(0), json!(1), json!(0)]),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_translate_dataset_end_to_end() {
        let translator = ItemTranslator::new(Arc::new(PrefixTranslator), "en", "kn");
        let dispatcher = LocalDispatcher::new(2, Duration::from_secs(5)).unwrap();

        let output = translate_dataset(
            dataset(),
            &columns(),
            2,
            &dispatcher,
            &translator,
            &RewritePolicy::default(),
        )
        .await
        .expect("Should translate");

        assert_eq!(output.num_rows(), 3);
        assert_eq!(
            output.column_names(),
            vec!["answer", "question_kannada", "choices_kannada"]
        );
        assert_eq!(
            output.column("question_kannada").unwrap(),
            &[json!("kn:one"), json!("[ERROR: unsupported input]"), json!("kn:three")]
        );
        assert_eq!(
            output.column("choices_kannada").unwrap(),
            &[json!(["kn:a"]), json!(["kn:b", "kn:c"]), json!([])]
        );
    }

    #[tokio::test]
    async fn test_translate_dataset_rejects_zero_batch_size() {
        let translator = ItemTranslator::new(Arc::new(PrefixTranslator), "en", "kn");
        let dispatcher = LocalDispatcher::new(2, Duration::from_secs(5)).unwrap();

        let result = translate_dataset(
            dataset(),
            &columns(),
            0,
            &dispatcher,
            &translator,
            &RewritePolicy::default(),
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_translate_dataset_empty_input() {
        let translator = ItemTranslator::new(Arc::new(PrefixTranslator), "en", "kn");
        let dispatcher = LocalDispatcher::new(2, Duration::from_secs(5)).unwrap();

        let output = translate_dataset(
            Dataset::new(0),
            &columns(),
            2,
            &dispatcher,
            &translator,
            &RewritePolicy::default(),
        )
        .await
        .expect("Empty input should translate to an empty dataset");

        assert_eq!(output.num_rows(), 0);
        assert_eq!(output.num_columns(), 0);
    }

    #[tokio::test]
    async fn test_translate_dataset_zero_rows_with_schema() {
        let translator = ItemTranslator::new(Arc::new(PrefixTranslator), "en", "kn");
        let dispatcher = LocalDispatcher::new(2, Duration::from_secs(5)).unwrap();
        let empty = Dataset::from_columns(vec![
            ("question", Vec::new()),
            ("choices", Vec::new()),
            ("lecture", Vec::new()),
        ])
        .unwrap();

        let output = translate_dataset(
            empty,
            &columns(),
            2,
            &dispatcher,
            &translator,
            &RewritePolicy::default(),
        )
        .await
        .unwrap();

        assert_eq!(output.num_rows(), 0);
        assert_eq!(output.column_names(), vec!["question_kannada", "choices_kannada"]);
    }

    #[test]
    fn test_count_failures() {
        use crate::translation::Translation;
        let column = TranslatedColumn::TextList(vec![
            vec![Translation::Failed("x".into()), Translation::Translated("y".into())],
            vec![Translation::Failed("z".into())],
        ]);
        assert_eq!(count_failures(&column), 2);
    }
}
