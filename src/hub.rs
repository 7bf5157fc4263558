//! Publishing to the Hugging Face Hub.
//!
//! Authentication is an explicit [`HubCredential`] obtained once per run via
//! [`HubClient::login`] and passed to every call that needs it.

use crate::dataset::Dataset;
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::sync::OnceLock;
use tracing::info;

static REPO_ID_REGEX: OnceLock<Regex> = OnceLock::new();

/// Largest data file pushed inline. The Hub rejects regular (non-LFS) files over 10 MiB.
pub const MAX_SHARD_BYTES: usize = 8 * 1024 * 1024;

/// An authenticated Hub session token
pub struct HubCredential {
    token: String,
    user: String,
}

impl HubCredential {
    /// Account name the token belongs to
    pub fn user(&self) -> &str {
        &self.user
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl fmt::Debug for HubCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubCredential")
            .field("user", &self.user)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct WhoAmI {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitResponse {
    commit_url: String,
}

/// Split `owner/name` into its parts
pub fn parse_repo_id(repo_id: &str) -> Result<(&str, &str)> {
    let regex = REPO_ID_REGEX.get_or_init(|| {
        Regex::new(r"^([A-Za-z0-9][A-Za-z0-9_.-]*)/([A-Za-z0-9][A-Za-z0-9_.-]*)$")
            .expect("repo id pattern is valid")
    });

    let captures = regex
        .captures(repo_id)
        .with_context(|| format!("Invalid repository id '{}', expected owner/name", repo_id))?;

    match (captures.get(1), captures.get(2)) {
        (Some(owner), Some(name)) => Ok((owner.as_str(), name.as_str())),
        _ => anyhow::bail!("Invalid repository id '{}', expected owner/name", repo_id),
    }
}

pub struct HubClient {
    client: reqwest::Client,
    base_url: String,
    max_shard_bytes: usize,
}

impl HubClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_shard_bytes: MAX_SHARD_BYTES,
        }
    }

    pub fn with_max_shard_bytes(mut self, max_shard_bytes: usize) -> Self {
        self.max_shard_bytes = max_shard_bytes;
        self
    }

    /// Verify `token` with the Hub and return a credential for this run
    pub async fn login(&self, token: &str) -> Result<HubCredential> {
        let response = self
            .client
            .get(format!("{}/api/whoami-v2", self.base_url))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .context("Failed to send login request to Hugging Face Hub")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Hub authentication failed ({}): {}", status, body);
        }

        let whoami: WhoAmI = response
            .json()
            .await
            .context("Failed to parse Hub whoami response")?;

        info!("✓ Logged in to Hugging Face Hub as {}", whoami.name);
        Ok(HubCredential {
            token: token.to_string(),
            user: whoami.name,
        })
    }

    /// Create a dataset repository. An existing repository is reused.
    pub async fn create_dataset_repo(&self, credential: &HubCredential, repo_id: &str) -> Result<()> {
        let (owner, name) = parse_repo_id(repo_id)?;

        let mut body = serde_json::json!({
            "type": "dataset",
            "name": name,
            "private": false,
        });
        if owner != credential.user() {
            body["organization"] = serde_json::Value::String(owner.to_string());
        }

        let response = self
            .client
            .post(format!("{}/api/repos/create", self.base_url))
            .header("Authorization", credential.bearer())
            .json(&body)
            .send()
            .await
            .context("Failed to send create repository request")?;

        let status = response.status();
        if status == reqwest::StatusCode::CONFLICT {
            info!("Dataset repository {} already exists", repo_id);
            return Ok(());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Hub error creating {} ({}): {}", repo_id, status, body);
        }

        info!("✓ Created dataset repository {}", repo_id);
        Ok(())
    }

    /// Upload `dataset` as split `split` of `repo_id` in a single commit.
    ///
    /// The rows are written as `data/<split>-NNNNN-of-MMMMM.jsonl` shards, each
    /// at most `max_shard_bytes`. Returns the URL of the resulting commit.
    pub async fn push_dataset(
        &self,
        credential: &HubCredential,
        repo_id: &str,
        split: &str,
        dataset: &Dataset,
    ) -> Result<String> {
        let shards = shard_json_lines(dataset, self.max_shard_bytes)?;
        self.create_dataset_repo(credential, repo_id).await?;

        let total = shards.len();
        let files: Vec<(String, Vec<u8>)> = shards
            .into_iter()
            .enumerate()
            .map(|(i, data)| (shard_path(split, i, total), data))
            .collect();
        let bytes: usize = files.iter().map(|(_, data)| data.len()).sum();

        let summary = format!(
            "Upload {} rows to split '{}' ({})",
            dataset.num_rows(),
            split,
            chrono::Utc::now().format("%Y-%m-%d %H:%M UTC")
        );
        let payload = commit_payload(&summary, &files)?;

        info!(
            "Pushing {} rows ({} bytes in {} shards) to {}",
            dataset.num_rows(),
            bytes,
            total,
            repo_id
        );

        let response = self
            .client
            .post(format!(
                "{}/api/datasets/{}/commit/main",
                self.base_url, repo_id
            ))
            .header("Authorization", credential.bearer())
            .header("Content-Type", "application/x-ndjson")
            .body(payload)
            .send()
            .await
            .context("Failed to send commit to Hugging Face Hub")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Hub commit to {} failed ({}): {}", repo_id, status, body);
        }

        let commit: CommitResponse = response
            .json()
            .await
            .context("Failed to parse Hub commit response")?;

        info!("✓ Published {} rows: {}", dataset.num_rows(), commit.commit_url);
        Ok(commit.commit_url)
    }
}

/// Split the rows of `dataset` into JSON Lines chunks of at most `max_bytes`.
///
/// Always yields at least one (possibly empty) shard. A single row larger
/// than `max_bytes` is an error.
pub fn shard_json_lines(dataset: &Dataset, max_bytes: usize) -> Result<Vec<Vec<u8>>> {
    let mut shards = Vec::new();
    let mut current: Vec<u8> = Vec::new();

    for (i, row) in dataset.rows().enumerate() {
        let mut line = serde_json::to_vec(&row).context("Failed to serialize row")?;
        line.push(b'\n');

        if line.len() > max_bytes {
            anyhow::bail!(
                "Row {} is {} bytes, larger than the {} byte shard limit",
                i,
                line.len(),
                max_bytes
            );
        }
        if current.len() + line.len() > max_bytes {
            shards.push(std::mem::take(&mut current));
        }
        current.extend_from_slice(&line);
    }
    shards.push(current);

    Ok(shards)
}

fn shard_path(split: &str, index: usize, total: usize) -> String {
    format!("data/{}-{:05}-of-{:05}.jsonl", split, index, total)
}

/// NDJSON commit body: a header line followed by one base64 line per file
fn commit_payload(summary: &str, files: &[(String, Vec<u8>)]) -> Result<String> {
    let header = serde_json::json!({
        "key": "header",
        "value": { "summary": summary, "description": "" }
    });

    let mut payload = serde_json::to_string(&header)?;
    payload.push('\n');
    for (path_in_repo, content) in files {
        let file = serde_json::json!({
            "key": "file",
            "value": {
                "content": STANDARD.encode(content),
                "path": path_in_repo,
                "encoding": "base64"
            }
        });
        payload.push_str(&serde_json::to_string(&file)?);
        payload.push('\n');
    }
    Ok(payload)
}
