use crate::dataset::Dataset;
use crate::storage::read_json_lines;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::io::BufReader;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Largest page the datasets-server `/rows` endpoint returns
pub const MAX_PAGE_ROWS: usize = 100;

/// Feature types the rows API serves as expiring asset URLs instead of data
const MEDIA_FEATURE_TYPES: &[&str] = &["Image", "Audio", "Video", "Pdf"];

/// Where the input dataset comes from
#[async_trait]
pub trait DatasetSource: Send + Sync {
    async fn load(&self) -> Result<Dataset>;
}

#[derive(Debug, Deserialize)]
struct RowsResponse {
    features: Vec<Feature>,
    rows: Vec<RowEntry>,
    num_rows_total: usize,
}

#[derive(Debug, Deserialize)]
struct Feature {
    name: String,
    #[serde(rename = "type", default)]
    dtype: Value,
}

impl Feature {
    fn is_media(&self) -> bool {
        self.dtype
            .get("_type")
            .and_then(Value::as_str)
            .is_some_and(|kind| MEDIA_FEATURE_TYPES.contains(&kind))
    }
}

#[derive(Debug, Deserialize)]
struct RowEntry {
    row_idx: usize,
    row: Map<String, Value>,
    #[serde(default)]
    truncated_cells: Vec<String>,
}

/// Reads the first `row_limit` rows of a Hub dataset split through the
/// datasets-server rows API.
///
/// Media features (images, audio) are dropped: the API only serves them as
/// expiring URLs. A row with truncated cells fails the load.
pub struct HubRowsSource {
    client: reqwest::Client,
    base_url: String,
    dataset: String,
    config: String,
    split: String,
    row_limit: usize,
}

impl HubRowsSource {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        dataset: impl Into<String>,
        config: impl Into<String>,
        split: impl Into<String>,
        row_limit: usize,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            dataset: dataset.into(),
            config: config.into(),
            split: split.into(),
            row_limit,
        }
    }

    async fn fetch_page(&self, offset: usize, length: usize) -> Result<RowsResponse> {
        let url = format!("{}/rows", self.base_url);
        let offset = offset.to_string();
        let length = length.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("dataset", self.dataset.as_str()),
                ("config", self.config.as_str()),
                ("split", self.split.as_str()),
                ("offset", offset.as_str()),
                ("length", length.as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to fetch rows of {}", self.dataset))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Datasets server error ({}): {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse datasets server response")
    }
}

#[async_trait]
impl DatasetSource for HubRowsSource {
    async fn load(&self) -> Result<Dataset> {
        info!(
            "Loading {} rows of {} ({}/{})",
            self.row_limit, self.dataset, self.config, self.split
        );

        let mut column_names: Option<Vec<String>> = None;
        let mut rows = Vec::new();

        // At least one page is fetched so the features are known even for an empty load
        loop {
            let remaining = self.row_limit - rows.len();
            let page = self
                .fetch_page(rows.len(), remaining.clamp(1, MAX_PAGE_ROWS))
                .await?;

            if column_names.is_none() {
                let (media, kept): (Vec<Feature>, Vec<Feature>) =
                    page.features.into_iter().partition(Feature::is_media);
                if !media.is_empty() {
                    let names: Vec<&str> = media.iter().map(|f| f.name.as_str()).collect();
                    warn!("Dropping media columns not served by the rows API: {:?}", names);
                }
                column_names = Some(kept.into_iter().map(|f| f.name).collect());
            }

            let fetched = page.rows.len();
            for entry in page.rows.into_iter().take(remaining) {
                if !entry.truncated_cells.is_empty() {
                    anyhow::bail!(
                        "Row {} of {} has truncated cells: {:?}",
                        entry.row_idx,
                        self.dataset,
                        entry.truncated_cells
                    );
                }
                rows.push(entry.row);
            }
            debug!("Fetched {} rows ({} total)", fetched, rows.len());

            if fetched == 0 || rows.len() >= self.row_limit || rows.len() >= page.num_rows_total
            {
                break;
            }
        }

        info!("✓ Loaded {} rows", rows.len());
        Ok(Dataset::from_rows(column_names.unwrap_or_default(), rows))
    }
}

/// Reads a local JSON Lines file, one object per row
pub struct JsonLinesSource {
    path: PathBuf,
    row_limit: Option<usize>,
}

impl JsonLinesSource {
    pub fn new(path: impl Into<PathBuf>, row_limit: Option<usize>) -> Self {
        Self {
            path: path.into(),
            row_limit,
        }
    }
}

#[async_trait]
impl DatasetSource for JsonLinesSource {
    async fn load(&self) -> Result<Dataset> {
        let file = std::fs::File::open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        let mut rows = read_json_lines(BufReader::new(file))?;

        // Columns in order of first appearance, over the whole file
        let mut column_names: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !column_names.contains(key) {
                    column_names.push(key.clone());
                }
            }
        }

        if let Some(limit) = self.row_limit {
            rows.truncate(limit);
        }

        info!("Loaded {} rows from {}", rows.len(), self.path.display());
        Ok(Dataset::from_rows(column_names, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::{
        matchers::{method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn create_rows_response(offset: usize, length: usize, total: usize) -> Value {
        let rows: Vec<Value> = (offset..(offset + length).min(total))
            .map(|i| {
                json!({
                    "row_idx": i,
                    "row": {
                        "question": format!("Question {}", i),
                        "choices": ["yes", "no"],
                        "answer": i % 2
                    },
                    "truncated_cells": []
                })
            })
            .collect();
        json!({
            "features": [
                {"feature_idx": 0, "name": "question", "type": {"dtype": "string", "_type": "Value"}},
                {"feature_idx": 1, "name": "choices", "type": {"feature": {"dtype": "string"}, "_type": "Sequence"}},
                {"feature_idx": 2, "name": "answer", "type": {"dtype": "int8", "_type": "Value"}}
            ],
            "rows": rows,
            "num_rows_total": total,
            "num_rows_per_page": 100,
            "partial": false
        })
    }

    async fn mount_page(server: &MockServer, offset: usize, length: usize, total: usize) {
        Mock::given(method("GET"))
            .and(path("/rows"))
            .and(query_param("dataset", "derek-thomas/ScienceQA"))
            .and(query_param("offset", offset.to_string()))
            .and(query_param("length", length.to_string()))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(create_rows_response(offset, length, total)),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    fn source(server: &MockServer, row_limit: usize) -> HubRowsSource {
        HubRowsSource::new(
            reqwest::Client::new(),
            server.uri(),
            "derek-thomas/ScienceQA",
            "default",
            "train",
            row_limit,
        )
    }

    #[tokio::test]
    async fn test_hub_rows_source_pages_until_limit() {
        let mock_server = MockServer::start().await;
        mount_page(&mock_server, 0, 100, 1000).await;
        mount_page(&mock_server, 100, 100, 1000).await;
        mount_page(&mock_server, 200, 50, 1000).await;

        let dataset = source(&mock_server, 250).load().await.expect("Should load");

        assert_eq!(dataset.num_rows(), 250);
        assert_eq!(dataset.column_names(), vec!["question", "choices", "answer"]);
        assert_eq!(dataset.column("question").unwrap()[249], json!("Question 249"));
    }

    #[tokio::test]
    async fn test_hub_rows_source_stops_at_end_of_split() {
        let mock_server = MockServer::start().await;
        mount_page(&mock_server, 0, 100, 120).await;
        mount_page(&mock_server, 100, 100, 120).await;

        let dataset = source(&mock_server, 10_000).load().await.expect("Should load");

        assert_eq!(dataset.num_rows(), 120);
    }

    #[tokio::test]
    async fn test_hub_rows_source_error_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rows"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
            .mount(&mock_server)
            .await;

        let err = source(&mock_server, 10).load().await.unwrap_err();

        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_json_lines_source_column_order_and_limit() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("input.jsonl");
        std::fs::write(
            &file,
            "{\"question\": \"a\", \"answer\": 1}\n{\"question\": \"b\", \"hint\": \"h\"}\n{\"question\": \"c\"}\n",
        )
        .unwrap();

        let dataset = JsonLinesSource::new(&file, Some(2)).load().await.unwrap();

        assert_eq!(dataset.num_rows(), 2);
        assert_eq!(dataset.column_names(), vec!["question", "answer", "hint"]);
        assert_eq!(dataset.column("answer").unwrap()[1], Value::Null);
    }
    #[tokio::test]
    async fn test_hub_rows_source_rejects_truncated_cells() {
        let mock_server = MockServer::start().await;
        let mut page = create_rows_response(0, 3, 3);
        page["rows"][1]["truncated_cells"] = json!(["question"]);
        Mock::given(method("GET"))
            .and(path("/rows"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page))
            .mount(&mock_server)
            .await;

        let err = source(&mock_server, 3).load().await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("Row 1"), "unexpected error: {}", message);
        assert!(message.contains("question"));
    }

    #[tokio::test]
    async fn test_hub_rows_source_drops_media_columns() {
        let mock_server = MockServer::start().await;
        let mut page = create_rows_response(0, 2, 2);
        page["features"]
            .as_array_mut()
            .unwrap()
            .insert(0, json!({"feature_idx": 0, "name": "image", "type": {"_type": "Image"}}));
        for row in page["rows"].as_array_mut().unwrap() {
            row["row"]["image"] = json!({
                "src": "https://datasets-server.huggingface.co/assets/image.jpg?Expires=1",
                "height": 100,
                "width": 100
            });
        }
        Mock::given(method("GET"))
            .and(path("/rows"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page))
            .mount(&mock_server)
            .await;

        let dataset = source(&mock_server, 2).load().await.unwrap();

        assert_eq!(dataset.column_names(), vec!["question", "choices", "answer"]);
        assert!(!dataset.contains("image"));
        assert_eq!(dataset.num_rows(), 2);
    }

    #[tokio::test]
    async fn test_hub_rows_source_zero_limit_keeps_columns() {
        let mock_server = MockServer::start().await;
        mount_page(&mock_server, 0, 1, 1000).await;

        let dataset = source(&mock_server, 0).load().await.unwrap();

        assert_eq!(dataset.num_rows(), 0);
        assert_eq!(dataset.column_names(), vec!["question", "choices", "answer"]);
    }

    #[tokio::test]
    async fn test_json_lines_source_zero_limit_keeps_columns() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("input.jsonl");
        std::fs::write(&file, "{\"question\": \"a\", \"answer\": 1}\n").unwrap();

        let dataset = JsonLinesSource::new(&file, Some(0)).load().await.unwrap();

        assert_eq!(dataset.num_rows(), 0);
        assert_eq!(dataset.column_names(), vec!["question", "answer"]);
    }
}
