//! The fixed set of columns that take part in translation.

use crate::error::DatasetError;

/// Shape of the cells in a translatable column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Each cell is a single text value
    Text,
    /// Each cell is a sequence of text values (e.g. multiple-choice options)
    TextList,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Text,
        }
    }

    pub fn text_list(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::TextList,
        }
    }
}

/// Ordered list of translatable columns, shared by partitioning, translation and aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSet {
    columns: Vec<ColumnSpec>,
}

impl ColumnSet {
    /// Create a column set. Column names must be unique.
    pub fn new(columns: Vec<ColumnSpec>) -> Result<Self, DatasetError> {
        for (i, spec) in columns.iter().enumerate() {
            if columns[..i].iter().any(|other| other.name == spec.name) {
                return Err(DatasetError::ColumnCollision(spec.name.clone()));
            }
        }
        Ok(Self { columns })
    }

    /// Translatable columns of the ScienceQA dataset
    pub fn science_qa() -> Self {
        let mut columns = vec![ColumnSpec::text("question"), ColumnSpec::text_list("choices")];
        columns.extend(
            [
                "hint", "task", "grade", "subject", "topic", "category", "skill", "solution",
            ]
            .into_iter()
            .map(|name| ColumnSpec::text(name)),
        );
        Self { columns }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
