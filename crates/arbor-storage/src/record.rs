//! Record (row) representation and schema validation.

use arbor_common::{ArborError, Column, ColumnType, Result, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row: column name to value.
///
/// Fields are kept in column-name order so the text rendering is stable.
/// A record is replaced wholesale on update, never patched field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, returning the previous value.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(column.into(), value.into())
    }

    /// Builder form of [`Record::set`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates fields in column-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (column, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", column, value)?;
        }
        write!(f, "}}")
    }
}

/// Ordered column list of a table. The first column is the primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Creates a schema.
    ///
    /// The column list must be non-empty, names must be unique and the
    /// primary key column must be `INT`.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let Some(primary) = columns.first() else {
            return Err(ArborError::InvalidSchema(
                "a table needs at least one column".to_string(),
            ));
        };
        if primary.column_type != ColumnType::Int {
            return Err(ArborError::InvalidSchema(format!(
                "primary key {} must be INT, not {}",
                primary.name, primary.column_type
            )));
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(ArborError::InvalidSchema(format!(
                    "duplicate column {}",
                    column.name
                )));
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the primary key column.
    pub fn primary_key(&self) -> &Column {
        // Schema::new guarantees at least one column.
        &self.columns[0]
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Checks `record` against this schema and returns its primary key.
    ///
    /// Columns absent from the record are allowed, except the primary key.
    pub fn validate(&self, table: &str, record: &Record) -> Result<i64> {
        for (name, value) in record.iter() {
            let Some(column) = self.column(name) else {
                return Err(ArborError::UnknownColumn {
                    table: table.to_string(),
                    column: name.to_string(),
                });
            };
            if !column.column_type.accepts(value) {
                return Err(ArborError::TypeMismatch {
                    column: name.to_string(),
                    expected: column.column_type.to_string(),
                    actual: value.column_type().to_string(),
                });
            }
        }

        let primary = self.primary_key();
        record
            .get(&primary.name)
            .and_then(Value::as_integer)
            .ok_or_else(|| ArborError::MissingPrimaryKey {
                table: table.to_string(),
                column: primary.name.clone(),
            })
    }
}

impl std::fmt::Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", column)?;
        }
        write!(f, ")")
    }
}
