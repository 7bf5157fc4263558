use crate::batch::Batch;
use crate::columns::{ColumnKind, ColumnSet};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Text must be strictly shorter than this, counted before trimming
pub const MAX_TEXT_CHARS: usize = 5000;

/// Prefix of the in-band marker written in place of a failed translation
pub const ERROR_MARKER: &str = "[ERROR:";

/// Outcome of translating one text value.
///
/// Failures stay tagged until the dataset is written, where they become the
/// literal `[ERROR: <reason>]` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    Translated(String),
    Failed(String),
}

impl Translation {
    pub fn is_failed(&self) -> bool {
        matches!(self, Translation::Failed(_))
    }

    /// Render as the text stored in the output dataset
    pub fn into_text(self) -> String {
        match self {
            Translation::Translated(text) => text,
            Translation::Failed(reason) => format!("{} {}]", ERROR_MARKER, reason),
        }
    }

    pub fn into_value(self) -> Value {
        Value::String(self.into_text())
    }
}

/// Boundary to an external translation service. May fail for any reason.
#[async_trait]
pub trait TextTranslator: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;
}

/// Client for the public Google Translate web endpoint
pub struct GoogleTranslator {
    client: reqwest::Client,
    base_url: String,
}

impl GoogleTranslator {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TextTranslator for GoogleTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let url = format!("{}/translate_a/single", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("client", "gtx"),
                ("sl", source),
                ("tl", target),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .context("Failed to send request to translation API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            anyhow::bail!("Translation API error ({}): {}", status, body);
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to parse translation response")?;

        parse_segments(&body)
    }
}

/// Join the translated segments of a `translate_a/single` response.
///
/// The response is a nested array whose first element lists
/// `[translated, original, ...]` pairs, one per sentence.
fn parse_segments(body: &Value) -> Result<String> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .context("Translation response contained no segments")?;

    let translated: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect();

    if translated.is_empty() {
        anyhow::bail!("Translation response contained no translated text");
    }

    Ok(translated)
}

/// A translated column of one batch, row-aligned with the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslatedColumn {
    Text(Vec<Translation>),
    TextList(Vec<Vec<Translation>>),
}

impl TranslatedColumn {
    pub fn empty(kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::Text => TranslatedColumn::Text(Vec::new()),
            ColumnKind::TextList => TranslatedColumn::TextList(Vec::new()),
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            TranslatedColumn::Text(_) => ColumnKind::Text,
            TranslatedColumn::TextList(_) => ColumnKind::TextList,
        }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        match self {
            TranslatedColumn::Text(cells) => cells.len(),
            TranslatedColumn::TextList(cells) => cells.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert into dataset cells, rendering failures as error markers
    pub fn into_values(self) -> Vec<Value> {
        match self {
            TranslatedColumn::Text(cells) => cells.into_iter().map(Translation::into_value).collect(),
            TranslatedColumn::TextList(cells) => cells
                .into_iter()
                .map(|items| Value::Array(items.into_iter().map(Translation::into_value).collect()))
                .collect(),
        }
    }
}

/// Translated columns of one batch, in Column Set order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationResult {
    pub batch_index: usize,
    pub columns: Vec<(String, TranslatedColumn)>,
}

impl TranslationResult {
    pub fn column(&self, name: &str) -> Option<&TranslatedColumn> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, translated)| translated)
    }
}

/// Total adapter around a [`TextTranslator`] for a fixed language pair.
///
/// Every call returns a [`Translation`]; errors from the backend are captured
/// per item and never abort the surrounding batch.
#[derive(Clone)]
pub struct ItemTranslator {
    backend: Arc<dyn TextTranslator>,
    source_lang: String,
    target_lang: String,
}

impl ItemTranslator {
    pub fn new(
        backend: Arc<dyn TextTranslator>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
        }
    }

    pub fn source_lang(&self) -> &str {
        &self.source_lang
    }

    pub fn target_lang(&self) -> &str {
        &self.target_lang
    }

    /// Translate one text value.
    ///
    /// The length limit applies to the raw text. Blank text and same-language
    /// pairs are then returned trimmed, without a remote call.
    pub async fn translate_text(&self, text: &str) -> Translation {
        let chars = text.chars().count();
        if chars >= MAX_TEXT_CHARS {
            let reason = format!(
                "text length must be below {} characters, got {}",
                MAX_TEXT_CHARS, chars
            );
            warn!("Skipping translation: {}", reason);
            return Translation::Failed(reason);
        }

        let trimmed = text.trim();
        if trimmed.is_empty() || self.source_lang == self.target_lang {
            return Translation::Translated(trimmed.to_string());
        }

        match self
            .backend
            .translate(trimmed, &self.source_lang, &self.target_lang)
            .await
        {
            Ok(translated) => Translation::Translated(translated),
            Err(e) => {
                warn!(
                    "Translation {} -> {} failed: {:#}",
                    self.source_lang, self.target_lang, e
                );
                Translation::Failed(format!("{:#}", e))
            }
        }
    }

    /// Translate a dataset cell. Anything but a JSON string is a failed item.
    pub async fn translate_value(&self, value: &Value) -> Translation {
        match value {
            Value::String(text) => self.translate_text(text).await,
            other => {
                warn!("Skipping translation of non-text value: {}", other);
                Translation::Failed(format!("{} is not a valid text payload", other))
            }
        }
    }

    /// Translate every cell of every Column Set column in `batch`.
    ///
    /// Always returns one translated column per Column Set entry, each with
    /// exactly `batch.len()` rows. List cells keep their length and order.
    pub async fn translate_batch(&self, batch: &Batch, columns: &ColumnSet) -> TranslationResult {
        let started = Instant::now();
        let mut translated_columns = Vec::with_capacity(columns.len());
        let mut failures = 0;

        for spec in columns.iter() {
            let cells = batch.column(&spec.name).unwrap_or_default();
            if cells.len() != batch.len() {
                warn!(
                    "Batch {} column '{}' has {} cells, expected {}",
                    batch.index(),
                    spec.name,
                    cells.len(),
                    batch.len()
                );
            }

            let translated = match spec.kind {
                ColumnKind::Text => {
                    let mut out = Vec::with_capacity(cells.len());
                    for cell in cells {
                        let t = self.translate_value(cell).await;
                        failures += t.is_failed() as usize;
                        out.push(t);
                    }
                    TranslatedColumn::Text(out)
                }
                ColumnKind::TextList => {
                    let mut out = Vec::with_capacity(cells.len());
                    for cell in cells {
                        let items = match cell {
                            Value::Array(items) => {
                                let mut row = Vec::with_capacity(items.len());
                                for item in items {
                                    row.push(self.translate_value(item).await);
                                }
                                row
                            }
                            // Keeps the row; the marker shows the cell was not a list
                            other => vec![Translation::Failed(format!(
                                "{} is not a list of text values",
                                other
                            ))],
                        };
                        failures += items.iter().filter(|t| t.is_failed()).count();
                        out.push(items);
                    }
                    TranslatedColumn::TextList(out)
                }
            };

            translated_columns.push((spec.name.clone(), translated));
        }

        debug!(
            "Batch {} (rows {}..{}) translated in {:.1?} with {} failed items",
            batch.index(),
            batch.offset(),
            batch.range.end(),
            started.elapsed(),
            failures
        );

        TranslationResult {
            batch_index: batch.index(),
            columns: translated_columns,
        }
    }
}
