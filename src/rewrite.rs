use crate::aggregate::TranslatedColumns;
use crate::dataset::Dataset;
use crate::error::DatasetError;
use tracing::info;

/// How translated columns replace their sources in the output dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewritePolicy {
    /// Appended to a source column name to form the translated column name
    pub suffix: String,
    /// Untranslated columns dropped from the output in addition to the sources
    pub excluded_columns: Vec<String>,
}

impl RewritePolicy {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            excluded_columns: Vec::new(),
        }
    }

    pub fn with_excluded(mut self, column: impl Into<String>) -> Self {
        self.excluded_columns.push(column.into());
        self
    }

    pub fn target_name(&self, column: &str) -> String {
        format!("{}{}", column, self.suffix)
    }
}

impl Default for RewritePolicy {
    /// Kannada suffix; `lecture` is dropped untranslated because of API call limits
    fn default() -> Self {
        Self::new("_kannada").with_excluded("lecture")
    }
}

/// Add the translated columns under their target names and drop the sources.
///
/// Fails without partial changes if a target name already exists, a source or
/// excluded column is missing, or the row counts differ.
pub fn rewrite(
    mut dataset: Dataset,
    translated: TranslatedColumns,
    policy: &RewritePolicy,
) -> Result<Dataset, DatasetError> {
    if translated.num_rows() != dataset.num_rows() {
        return Err(DatasetError::RowCountMismatch {
            column: translated.names().join(","),
            expected: dataset.num_rows(),
            got: translated.num_rows(),
        });
    }

    let mut removed: Vec<String> = translated.names().iter().map(|n| n.to_string()).collect();
    for column in &policy.excluded_columns {
        if !removed.contains(column) {
            removed.push(column.clone());
        }
    }

    if let Some(missing) = removed.iter().find(|name| !dataset.contains(name)) {
        return Err(DatasetError::MissingColumn(missing.clone()));
    }
    for name in translated.names() {
        let target = policy.target_name(name);
        if dataset.contains(&target) {
            return Err(DatasetError::ColumnCollision(target));
        }
    }

    for (name, column) in translated.into_columns() {
        dataset.add_column(policy.target_name(&name), column.into_values())?;
    }
    dataset.remove_columns(&removed)?;

    info!(
        "Rewrote dataset: {} rows, removed {:?}, columns now {:?}",
        dataset.num_rows(),
        removed,
        dataset.column_names()
    );

    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::batch::batch_ranges;
    use crate::columns::{ColumnSet, ColumnSpec};
    use crate::translation::{TranslatedColumn, TranslationResult, Translation};
    use serde_json::{json, Value};

    fn columns() -> ColumnSet {
        ColumnSet::new(vec![
            ColumnSpec::text("question"),
            ColumnSpec::text_list("choices"),
        ])
        .unwrap()
    }

    fn dataset(rows: usize) -> Dataset {
        Dataset::from_columns(vec![
            ("question", (0..rows).map(|i| json!(format!("q{}", i))).collect()),
            ("choices", (0..rows).map(|_| json!(["a", "b"])).collect()),
            ("lecture", (0..rows).map(|_| json!("long text")).collect::<Vec<Value>>()),
            ("answer", (0..rows).map(|i| json!(i)).collect()),
        ])
        .unwrap()
    }

    fn translated(rows: usize) -> TranslatedColumns {
        let ranges = batch_ranges(rows, rows.max(1)).unwrap();
        let results = ranges
            .iter()
            .map(|range| TranslationResult {
                batch_index: range.index,
                columns: vec![
                    (
                        "question".to_string(),
                        TranslatedColumn::Text(
                            (0..range.len)
                                .map(|i| {
                                    if i == 1 {
                                        Translation::Failed("boom".to_string())
                                    } else {
                                        Translation::Translated(format!("kq{}", i))
                                    }
                                })
                                .collect(),
                        ),
                    ),
                    (
                        "choices".to_string(),
                        TranslatedColumn::TextList(
                            (0..range.len)
                                .map(|_| vec![Translation::Translated("ka".to_string())])
                                .collect(),
                        ),
                    ),
                ],
            })
            .collect();
        aggregate(results, &columns(), &ranges).unwrap()
    }

    #[test]
    fn test_default_policy() {
        let policy = RewritePolicy::default();
        assert_eq!(policy.target_name("hint"), "hint_kannada");
        assert_eq!(policy.excluded_columns, vec!["lecture".to_string()]);
    }

    #[test]
    fn test_rewrite_swaps_columns() {
        let input = dataset(3);
        let output = rewrite(input.clone(), translated(3), &RewritePolicy::default()).unwrap();

        assert_eq!(output.num_rows(), input.num_rows());
        assert_eq!(
            output.column_names(),
            vec!["answer", "question_kannada", "choices_kannada"]
        );
        for removed in ["question", "choices", "lecture"] {
            assert!(!output.contains(removed), "{} should be removed", removed);
        }
        for added in ["question_kannada", "choices_kannada"] {
            assert!(!input.contains(added));
        }
        assert_eq!(output.column("answer"), input.column("answer"));
    }

    #[test]
    fn test_rewrite_renders_failures_as_markers() {
        let output = rewrite(dataset(3), translated(3), &RewritePolicy::default()).unwrap();

        let questions = output.column("question_kannada").unwrap();
        assert_eq!(questions[0], json!("kq0"));
        assert_eq!(questions[1], json!("[ERROR: boom]"));
        assert_eq!(output.column("choices_kannada").unwrap()[2], json!(["ka"]));
    }

    #[test]
    fn test_rewrite_rejects_collision() {
        let mut input = dataset(2);
        input
            .add_column("question_kannada", vec![json!("x"), json!("y")])
            .unwrap();

        let err = rewrite(input, translated(2), &RewritePolicy::default()).unwrap_err();

        assert_eq!(
            err,
            DatasetError::ColumnCollision("question_kannada".to_string())
        );
    }

    #[test]
    fn test_rewrite_rejects_missing_excluded_column() {
        let policy = RewritePolicy::new("_kn").with_excluded("image");

        let err = rewrite(dataset(2), translated(2), &policy).unwrap_err();

        assert_eq!(err, DatasetError::MissingColumn("image".to_string()));
    }

    #[test]
    fn test_rewrite_rejects_row_count_mismatch() {
        let err = rewrite(dataset(3), translated(2), &RewritePolicy::default()).unwrap_err();
        assert!(matches!(err, DatasetError::RowCountMismatch { expected: 3, got: 2, .. }));
    }

    #[test]
    fn test_rewrite_without_exclusions_keeps_lecture() {
        let output = rewrite(dataset(2), translated(2), &RewritePolicy::new("_kn")).unwrap();
        assert!(output.contains("lecture"));
        assert!(output.contains("question_kn"));
    }
}
