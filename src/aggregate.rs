use crate::batch::BatchRange;
use crate::columns::ColumnSet;
use crate::error::DatasetError;
use crate::translation::{TranslatedColumn, TranslationResult};

/// Whole-dataset translated columns, in Column Set order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedColumns {
    columns: Vec<(String, TranslatedColumn)>,
    num_rows: usize,
}

impl TranslatedColumns {
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn column(&self, name: &str) -> Option<&TranslatedColumn> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, translated)| translated)
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn into_columns(self) -> Vec<(String, TranslatedColumn)> {
        self.columns
    }
}

/// Concatenate per-batch results into whole-dataset columns.
///
/// `results[i]` must belong to `batches[i]`: same batch index, the Column Set
/// columns in order, and exactly `batches[i].len` rows per column. Any
/// deviation is rejected before anything is concatenated.
pub fn aggregate(
    results: Vec<TranslationResult>,
    columns: &ColumnSet,
    batches: &[BatchRange],
) -> Result<TranslatedColumns, DatasetError> {
    if results.len() != batches.len() {
        return Err(DatasetError::ResultCountMismatch {
            expected: batches.len(),
            got: results.len(),
        });
    }

    for (result, range) in results.iter().zip(batches) {
        check_shape(result, columns, range)?;
    }

    let num_rows: usize = batches.iter().map(|b| b.len).sum();
    let mut merged: Vec<(String, TranslatedColumn)> = columns
        .iter()
        .map(|spec| (spec.name.clone(), TranslatedColumn::empty(spec.kind)))
        .collect();

    for result in results {
        for ((_, target), (_, part)) in merged.iter_mut().zip(result.columns) {
            match (target, part) {
                (TranslatedColumn::Text(all), TranslatedColumn::Text(rows)) => all.extend(rows),
                (TranslatedColumn::TextList(all), TranslatedColumn::TextList(rows)) => {
                    all.extend(rows)
                }
                // Kinds were verified by check_shape
                _ => unreachable!("column kind mismatch after shape check"),
            }
        }
    }

    Ok(TranslatedColumns {
        columns: merged,
        num_rows,
    })
}

fn check_shape(
    result: &TranslationResult,
    columns: &ColumnSet,
    range: &BatchRange,
) -> Result<(), DatasetError> {
    let mismatch = |reason: String| DatasetError::ShapeMismatch {
        batch: range.index,
        reason,
    };

    if result.batch_index != range.index {
        return Err(mismatch(format!(
            "result belongs to batch {}",
            result.batch_index
        )));
    }

    let names: Vec<&str> = result.columns.iter().map(|(n, _)| n.as_str()).collect();
    if names != columns.names() {
        return Err(mismatch(format!(
            "columns {:?}, expected {:?}",
            names,
            columns.names()
        )));
    }

    for ((name, column), spec) in result.columns.iter().zip(columns.iter()) {
        if column.kind() != spec.kind {
            return Err(mismatch(format!(
                "column '{}' is {:?}, expected {:?}",
                name,
                column.kind(),
                spec.kind
            )));
        }
        if column.len() != range.len {
            return Err(mismatch(format!(
                "column '{}' has {} rows, expected {}",
                name,
                column.len(),
                range.len
            )));
        }
    }

    Ok(())
}
