//! Column types and scalar values for ArborDB.

use serde::{Deserialize, Serialize};

/// Declared type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ColumnType {
    /// 64-bit signed integer.
    Int = 1,
    /// UTF-8 text.
    String = 2,
}

impl ColumnType {
    /// Parses a type keyword (`INT`, `STRING`), case-insensitively.
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_uppercase().as_str() {
            "INT" | "INTEGER" => Some(ColumnType::Int),
            "STRING" | "TEXT" => Some(ColumnType::String),
            _ => None,
        }
    }

    /// Returns true if `value` is a legal value for a column of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        self == &value.column_type()
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ColumnType::Int => "INT",
            ColumnType::String => "STRING",
        };
        write!(f, "{}", name)
    }
}

/// A single scalar stored in a record field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    Text(String),
}

impl Value {
    /// Returns the column type this value belongs to.
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Integer(_) => ColumnType::Int,
            Value::Text(_) => ColumnType::String,
        }
    }

    /// Returns the integer payload, if any.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Text(_) => None,
        }
    }

    /// Returns the text payload, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Integer(_) => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "'{}'", s),
        }
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.column_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_type_from_keyword() {
        assert_eq!(ColumnType::from_keyword("INT"), Some(ColumnType::Int));
        assert_eq!(ColumnType::from_keyword("int"), Some(ColumnType::Int));
        assert_eq!(ColumnType::from_keyword("String"), Some(ColumnType::String));
        assert_eq!(ColumnType::from_keyword("TEXT"), Some(ColumnType::String));
        assert_eq!(ColumnType::from_keyword("FLOAT"), None);
    }

    #[test]
    fn test_column_type_accepts() {
        assert!(ColumnType::Int.accepts(&Value::Integer(7)));
        assert!(!ColumnType::Int.accepts(&Value::Text("7".into())));
        assert!(ColumnType::String.accepts(&Value::Text("a".into())));
        assert!(!ColumnType::String.accepts(&Value::Integer(1)));
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Integer(3).as_integer(), Some(3));
        assert_eq!(Value::Integer(3).as_text(), None);
        assert_eq!(Value::from("abc").as_text(), Some("abc"));
        assert_eq!(Value::from("abc").as_integer(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Integer(-12).to_string(), "-12");
        assert_eq!(Value::from("bob").to_string(), "'bob'");
        assert_eq!(ColumnType::Int.to_string(), "INT");
        assert_eq!(Column::new("NAME", ColumnType::String).to_string(), "NAME STRING");
    }

    #[test]
    fn test_value_serde_roundtrip() {
        for value in [Value::Integer(42), Value::Text("x,y".to_string())] {
            let json = serde_json::to_string(&value).unwrap();
            let back: Value = serde_json::from_str(&json).unwrap();
            assert_eq!(value, back);
        }
    }
}
