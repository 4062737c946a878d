//! Column values, and the small ordered maps of them which make up statements and rows.
//!
//! Values are one of: NULL, a 64-bit signed integer, a string, or a timestamp.  Timestamps are kept as
//! [time::OffsetDateTime] all the way to the driver so that they bind as timestamps rather than as whatever text we
//! might have formatted them to.
use rusqlite::types::{ToSql, ToSqlOutput};
use smallvec::SmallVec;
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq)]
pub enum ColumnValue {
    Null,
    Integer(i64),
    String(String),
    Timestamp(OffsetDateTime),
}

impl ColumnValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ColumnValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ColumnValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl std::fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnValue::Null => write!(f, "NULL"),
            ColumnValue::Integer(i) => write!(f, "{}", i),
            ColumnValue::String(s) => write!(f, "{:?}", s),
            ColumnValue::Timestamp(t) => write!(f, "{}", t),
        }
    }
}

impl ToSql for ColumnValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            ColumnValue::Null => rusqlite::types::Null.to_sql(),
            ColumnValue::Integer(i) => i.to_sql(),
            ColumnValue::String(s) => s.to_sql(),
            ColumnValue::Timestamp(t) => t.to_sql(),
        }
    }
}

impl From<i64> for ColumnValue {
    fn from(value: i64) -> Self {
        ColumnValue::Integer(value)
    }
}

impl From<bool> for ColumnValue {
    fn from(value: bool) -> Self {
        ColumnValue::Integer(value as i64)
    }
}

impl From<&str> for ColumnValue {
    fn from(value: &str) -> Self {
        ColumnValue::String(value.to_string())
    }
}

impl From<String> for ColumnValue {
    fn from(value: String) -> Self {
        ColumnValue::String(value)
    }
}

impl From<OffsetDateTime> for ColumnValue {
    fn from(value: OffsetDateTime) -> Self {
        ColumnValue::Timestamp(value)
    }
}

impl<T: Into<ColumnValue>> From<Option<T>> for ColumnValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ColumnValue::Null)
    }
}

/// Statements and rows are built and thrown away constantly and rarely have more than a handful of columns, so instead
/// of a hashmap we use a `SmallVec` of entries.  Insertion order is kept, which is what makes generated SQL stable.
#[derive(Clone, Debug, PartialEq)]
struct ColumnMapEntry {
    name: String,
    value: ColumnValue,
}

/// An insertion-ordered map from column name to value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColumnMap {
    entries: SmallVec<[ColumnMapEntry; 8]>,
}

impl ColumnMap {
    pub fn new() -> Self {
        Default::default()
    }

    /// Set a column, replacing any previous value for it in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ColumnValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(e) => e.value = value,
            None => self.entries.push(ColumnMapEntry { name, value }),
        }
    }

    /// Builder form of [ColumnMap::insert].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ColumnValue> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnValue)> {
        self.entries.iter().map(|e| (e.name.as_str(), &e.value))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &ColumnValue> {
        self.entries.iter().map(|e| &e.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One row read back from a table or view.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    table: String,
    map: ColumnMap,
}

impl Row {
    pub fn new(table: impl Into<String>, map: ColumnMap) -> Self {
        Row {
            table: table.into(),
            map,
        }
    }

    pub fn get_table(&self) -> &str {
        &self.table
    }

    /// The value of a column, or `None` if the row has no such column.  A SQL NULL is `Some(ColumnValue::Null)`.
    pub fn value_of(&self, column: &str) -> Option<&ColumnValue> {
        self.map.get(column)
    }

    /// An integer column which must be present and non-null.
    pub fn get_i64(&self, column: &str) -> crate::Result<i64> {
        self.value_of(column)
            .and_then(ColumnValue::as_i64)
            .ok_or_else(|| self.malformed(format!("{} should be a non-null integer", column)))
    }

    /// A string column which may be NULL.
    pub fn get_optional_string(&self, column: &str) -> crate::Result<Option<String>> {
        match self.value_of(column) {
            Some(ColumnValue::Null) => Ok(None),
            Some(ColumnValue::String(s)) => Ok(Some(s.clone())),
            _ => Err(self.malformed(format!("{} should be a string or NULL", column))),
        }
    }

    pub fn get_string(&self, column: &str) -> crate::Result<String> {
        self.get_optional_string(column)?
            .ok_or_else(|| self.malformed(format!("{} should not be NULL", column)))
    }

    fn malformed(&self, reason: String) -> crate::Error {
        crate::Error::MalformedRow {
            table: self.table.clone(),
            reason,
        }
    }
}
