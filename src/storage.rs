//! On-disk representation of a dataset: a JSON Lines file plus a small info file.

use crate::dataset::Dataset;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

pub const DATA_FILE: &str = "data.jsonl";
pub const INFO_FILE: &str = "dataset_info.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub column_names: Vec<String>,
    pub num_rows: usize,
    pub created_at: DateTime<Utc>,
}

/// Serialize rows as JSON Lines, keys in column order
pub fn write_json_lines<W: Write>(dataset: &Dataset, writer: W) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    for row in dataset.rows() {
        serde_json::to_writer(&mut writer, &row).context("Failed to serialize row")?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Parse JSON Lines into row objects. Blank lines are skipped.
pub fn read_json_lines<R: BufRead>(reader: R) -> Result<Vec<Map<String, Value>>> {
    let mut rows = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read line")?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(&line)
            .with_context(|| format!("Invalid JSON on line {}", line_no + 1))?
        {
            Value::Object(row) => rows.push(row),
            other => anyhow::bail!(
                "Line {} is not a JSON object: {}",
                line_no + 1,
                other
            ),
        }
    }
    Ok(rows)
}

/// Save `dataset` under `dir`, creating the directory if needed
pub fn save_to_disk(dataset: &Dataset, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let data_path = dir.join(DATA_FILE);
    let file = fs::File::create(&data_path)
        .with_context(|| format!("Failed to create {}", data_path.display()))?;
    write_json_lines(dataset, file)?;

    let info = DatasetInfo {
        column_names: dataset.column_names().iter().map(|s| s.to_string()).collect(),
        num_rows: dataset.num_rows(),
        created_at: Utc::now(),
    };
    let info_json = serde_json::to_string_pretty(&info)?;
    fs::write(dir.join(INFO_FILE), info_json).context("Failed to write dataset info")?;

    info!(
        "✓ Saved {} rows x {} columns to {}",
        dataset.num_rows(),
        dataset.num_columns(),
        dir.display()
    );
    Ok(())
}

/// Load a dataset previously written by [`save_to_disk`]
pub fn load_from_disk(dir: &Path) -> Result<Dataset> {
    let info_path = dir.join(INFO_FILE);
    let info_json = fs::read_to_string(&info_path)
        .with_context(|| format!("Failed to read {}", info_path.display()))?;
    let info: DatasetInfo =
        serde_json::from_str(&info_json).context("Failed to parse dataset info")?;

    let data_path = dir.join(DATA_FILE);
    let file = fs::File::open(&data_path)
        .with_context(|| format!("Failed to open {}", data_path.display()))?;
    let rows = read_json_lines(BufReader::new(file))?;

    if rows.len() != info.num_rows {
        anyhow::bail!(
            "{} holds {} rows but dataset info records {}",
            data_path.display(),
            rows.len(),
            info.num_rows
        );
    }

    info!("Loaded {} rows from {}", rows.len(), dir.display());
    Ok(Dataset::from_rows(info.column_names, rows))
}
