use crate::columns::ColumnSet;
use crate::dataset::{Column, Dataset};
use crate::error::DatasetError;
use serde_json::Value;

/// Row range `[offset, offset + len)` covered by batch `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchRange {
    pub index: usize,
    pub offset: usize,
    pub len: usize,
}

impl BatchRange {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// A contiguous slice of the dataset, restricted to the translatable columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub range: BatchRange,
    columns: Vec<Column>,
}

impl Batch {
    pub fn index(&self) -> usize {
        self.range.index
    }

    pub fn offset(&self) -> usize {
        self.range.offset
    }

    /// Number of rows in this batch
    pub fn len(&self) -> usize {
        self.range.len
    }

    pub fn is_empty(&self) -> bool {
        self.range.len == 0
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Compute the row ranges for `total_rows` rows split into groups of `batch_size`.
///
/// The last range holds the remainder when `total_rows` is not a multiple of `batch_size`.
pub fn batch_ranges(total_rows: usize, batch_size: usize) -> Result<Vec<BatchRange>, DatasetError> {
    if batch_size == 0 {
        return Err(DatasetError::InvalidBatchSize);
    }

    let mut ranges = Vec::with_capacity(total_rows.div_ceil(batch_size));
    let mut offset = 0;

    while offset < total_rows {
        let end = (offset + batch_size).min(total_rows);
        ranges.push(BatchRange {
            index: ranges.len(),
            offset,
            len: end - offset,
        });
        offset = end;
    }

    Ok(ranges)
}

/// Split the Column Set columns of `dataset` into batches of `batch_size` rows.
pub fn partition(
    dataset: &Dataset,
    columns: &ColumnSet,
    batch_size: usize,
) -> Result<Vec<Batch>, DatasetError> {
    let sources = columns
        .iter()
        .map(|spec| {
            dataset
                .column(&spec.name)
                .map(|values| (spec.name.as_str(), values))
                .ok_or_else(|| DatasetError::MissingColumn(spec.name.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let batches = batch_ranges(dataset.num_rows(), batch_size)?
        .into_iter()
        .map(|range| Batch {
            range,
            columns: sources
                .iter()
                .map(|(name, values)| Column {
                    name: name.to_string(),
                    values: values[range.offset..range.end()].to_vec(),
                })
                .collect(),
        })
        .collect();

    Ok(batches)
}
