//! Declarative statements: what should change in the database, without saying how the SQL looks.
//!
//! Reconcilers produce these; the [crate::StatementExecutor] turns them into SQL.  A statement is immutable once built,
//! and the constructors are the only way to build one, so the shape invariants below always hold:
//!
//! - inserts have values and no conditions;
//! - updates have values and conditions;
//! - deletes have conditions and no values.
//!
//! An update or delete without conditions would touch every row of the table, so the constructors refuse to build
//! one.
use crate::{ColumnMap, ColumnValue};

#[derive(Copy, Clone, Debug, PartialEq, Eq, derive_more::Display)]
pub enum Operation {
    #[display(fmt = "insert")]
    Insert,
    #[display(fmt = "update")]
    Update,
    #[display(fmt = "delete")]
    Delete,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StatementModel {
    operation: Operation,
    table: String,
    values: ColumnMap,
    conditions: ColumnMap,
}

impl StatementModel {
    pub fn insert(table: impl Into<String>, values: ColumnMap) -> Self {
        assert!(!values.is_empty(), "Inserts must have values");
        StatementModel {
            operation: Operation::Insert,
            table: table.into(),
            values,
            conditions: ColumnMap::new(),
        }
    }

    pub fn update(table: impl Into<String>, values: ColumnMap, conditions: ColumnMap) -> Self {
        assert!(!values.is_empty(), "Updates must have values");
        assert!(!conditions.is_empty(), "Updates must have conditions");
        StatementModel {
            operation: Operation::Update,
            table: table.into(),
            values,
            conditions,
        }
    }

    pub fn delete(table: impl Into<String>, conditions: ColumnMap) -> Self {
        assert!(!conditions.is_empty(), "Deletes must have conditions");
        StatementModel {
            operation: Operation::Delete,
            table: table.into(),
            values: ColumnMap::new(),
            conditions,
        }
    }

    /// Shorthand for the common case of a statement addressed by one key column.
    pub fn delete_by(table: impl Into<String>, column: &str, key: impl Into<ColumnValue>) -> Self {
        Self::delete(table, ColumnMap::new().with(column, key))
    }

    pub fn get_operation(&self) -> Operation {
        self.operation
    }

    pub fn get_table(&self) -> &str {
        &self.table
    }

    pub fn get_values(&self) -> &ColumnMap {
        &self.values
    }

    pub fn get_conditions(&self) -> &ColumnMap {
        &self.conditions
    }
}

impl std::fmt::Display for StatementModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.operation, self.table)?;
        for (c, v) in self.values.iter() {
            write!(f, " {}={}", c, v)?;
        }
        if !self.conditions.is_empty() {
            write!(f, " where")?;
            for (c, v) in self.conditions.iter() {
                write!(f, " {}={}", c, v)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes() {
        let ins = StatementModel::insert("t", ColumnMap::new().with("a", 1));
        assert_eq!(ins.get_operation(), Operation::Insert);
        assert!(ins.get_conditions().is_empty());

        let del = StatementModel::delete_by("t", "id", 3);
        assert_eq!(del.get_operation(), Operation::Delete);
        assert!(del.get_values().is_empty());
        assert_eq!(del.get_conditions().get("id"), Some(&ColumnValue::Integer(3)));

        let upd = StatementModel::update(
            "t",
            ColumnMap::new().with("a", "x"),
            ColumnMap::new().with("id", 3),
        );
        assert_eq!(upd.to_string(), r#"update t a="x" where id=3"#);
    }

    #[test]
    #[should_panic]
    fn unconditional_update_is_refused() {
        StatementModel::update("t", ColumnMap::new().with("a", 1), ColumnMap::new());
    }

    #[test]
    #[should_panic]
    fn unconditional_delete_is_refused() {
        StatementModel::delete("t", ColumnMap::new());
    }
}
