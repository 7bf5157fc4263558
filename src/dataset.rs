use crate::error::DatasetError;
use serde_json::{Map, Value};

/// A named, row-aligned column of cell values.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

/// Column-oriented table where every column holds exactly `num_rows` cells.
///
/// Column order is insertion order and is kept through persistence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    num_rows: usize,
}

impl Dataset {
    /// Create an empty dataset with a fixed row count and no columns
    pub fn new(num_rows: usize) -> Self {
        Self {
            columns: Vec::new(),
            num_rows,
        }
    }

    /// Build a dataset from `(name, values)` pairs.
    ///
    /// The row count is taken from the first column; every other column must match it.
    pub fn from_columns<I, S>(columns: I) -> Result<Self, DatasetError>
    where
        I: IntoIterator<Item = (S, Vec<Value>)>,
        S: Into<String>,
    {
        let mut columns = columns.into_iter().peekable();
        let num_rows = columns.peek().map(|(_, values)| values.len()).unwrap_or(0);

        let mut dataset = Self::new(num_rows);
        for (name, values) in columns {
            dataset.add_column(name, values)?;
        }
        Ok(dataset)
    }

    /// Build a dataset from row objects. Keys missing from a row become `null`.
    pub fn from_rows(column_names: Vec<String>, rows: Vec<Map<String, Value>>) -> Self {
        let num_rows = rows.len();
        let mut columns: Vec<Column> = column_names
            .into_iter()
            .map(|name| Column {
                name,
                values: Vec::with_capacity(num_rows),
            })
            .collect();

        for mut row in rows {
            for column in columns.iter_mut() {
                column
                    .values
                    .push(row.remove(&column.name).unwrap_or(Value::Null));
            }
        }

        Self { columns, num_rows }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Append a column. Fails on a duplicate name or a wrong row count.
    pub fn add_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<Value>,
    ) -> Result<(), DatasetError> {
        let name = name.into();
        if self.contains(&name) {
            return Err(DatasetError::ColumnCollision(name));
        }
        if values.len() != self.num_rows {
            return Err(DatasetError::RowCountMismatch {
                column: name,
                expected: self.num_rows,
                got: values.len(),
            });
        }
        self.columns.push(Column { name, values });
        Ok(())
    }

    /// Remove the named columns. Nothing is removed unless every name exists.
    pub fn remove_columns<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), DatasetError> {
        if let Some(missing) = names.iter().find(|n| !self.contains(n.as_ref())) {
            return Err(DatasetError::MissingColumn(missing.as_ref().to_string()));
        }
        self.columns
            .retain(|c| !names.iter().any(|n| n.as_ref() == c.name));
        Ok(())
    }

    /// Iterate rows as JSON objects, keys in column order
    pub fn rows(&self) -> impl Iterator<Item = Map<String, Value>> + '_ {
        (0..self.num_rows).map(move |i| {
            self.columns
                .iter()
                .map(|c| (c.name.clone(), c.values[i].clone()))
                .collect()
        })
    }
}
