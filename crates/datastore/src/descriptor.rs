//! Descriptions of the tables (and views) the engine reads and writes.
//!
//! A column has one of 3 types: a 64-bit signed integer, a string, or a timestamp.  Descriptors serve two purposes:
//! decoding rows read back from SQLite, and refusing statements which name tables or columns we don't know about before
//! any SQL text is built from those names.
use std::collections::HashMap;

use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Identifiers end up in SQL text verbatim, so keep them boring.
    static ref IDENTIFIER: Regex = Regex::new("^[a-z_][a-z0-9_]*$").expect("Identifier regex should compile");
}

fn check_identifier(name: &str) -> Result<()> {
    if !IDENTIFIER.is_match(name) {
        anyhow::bail!("{:?} is not a valid identifier", name);
    }
    Ok(())
}

/// Types of a table's columns.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ColumnType {
    /// This column is a 64-bit signed integer.
    Integer,
    /// This column is a string.
    String,
    /// This column is a timestamp.
    Timestamp,
}

/// A column in a table.
#[derive(Debug)]
pub struct ColumnDescriptor {
    name: String,
    column_type: ColumnType,
    primary_key: bool,
    nullable: bool,
}

/// Description of a table or view.
#[derive(Debug)]
pub struct TableDescriptor {
    name: String,
    columns: Vec<ColumnDescriptor>,
}

impl ColumnDescriptor {
    pub fn new(
        name: String,
        column_type: ColumnType,
        primary_key: bool,
        nullable: bool,
    ) -> Result<Self> {
        check_identifier(&name)?;

        if primary_key && nullable {
            anyhow::bail!("Primary key columns may not be nullable");
        }

        Ok(Self {
            name,
            column_type,
            primary_key,
            nullable,
        })
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
}

impl TableDescriptor {
    fn new(name: String, columns: Vec<ColumnDescriptor>) -> Self {
        Self { name, columns }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn iter_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter()
    }

    pub fn get_column(&self, name: &str) -> crate::Result<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| c.get_name() == name)
            .ok_or_else(|| crate::Error::UnknownColumn {
                table: self.name.clone(),
                column: name.to_string(),
            })
    }
}

/// A helper to build tables.
pub struct TableBuilder {
    name: String,
    columns: Vec<ColumnDescriptor>,
}

impl TableBuilder {
    pub fn new(name: String) -> Self {
        Self {
            name,
            columns: vec![],
        }
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if self.columns.iter().map(|x| x.get_name()).any(|x| x == name) {
            anyhow::bail!("Duplicate column names not allowed");
        }
        Ok(())
    }

    fn add_column(
        &mut self,
        name: String,
        column_type: ColumnType,
        primary_key: bool,
        nullable: bool,
    ) -> Result<()> {
        self.check_name(&name)?;
        self.columns.push(ColumnDescriptor::new(
            name,
            column_type,
            primary_key,
            nullable,
        )?);
        Ok(())
    }

    pub fn add_integer_column(
        &mut self,
        name: String,
        primary_key: bool,
        nullable: bool,
    ) -> Result<()> {
        self.add_column(name, ColumnType::Integer, primary_key, nullable)
    }

    pub fn add_string_column(&mut self, name: String, nullable: bool) -> Result<()> {
        self.add_column(name, ColumnType::String, false, nullable)
    }

    pub fn add_timestamp_column(&mut self, name: String, nullable: bool) -> Result<()> {
        self.add_column(name, ColumnType::Timestamp, false, nullable)
    }

    pub fn build(self) -> Result<TableDescriptor> {
        check_identifier(&self.name)?;
        if self.columns.is_empty() {
            anyhow::bail!("Table {} has no columns", self.name);
        }
        Ok(TableDescriptor::new(self.name, self.columns))
    }
}

/// A named piece of SQL which is run exactly once per database.
#[derive(Debug)]
pub struct MigrationDescriptor {
    name: String,
    sql: String,
}

impl MigrationDescriptor {
    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_sql(&self) -> &str {
        &self.sql
    }
}

/// Everything we know about the database: its tables and the migrations which create them.
#[derive(Debug)]
pub struct DatabaseDescriptor {
    tables: HashMap<String, TableDescriptor>,
    migrations: Vec<MigrationDescriptor>,
}

impl DatabaseDescriptor {
    pub fn get_table(&self, name: &str) -> crate::Result<&TableDescriptor> {
        self.tables
            .get(name)
            .ok_or_else(|| crate::Error::UnknownTable(name.to_string()))
    }

    pub fn iter_migrations(&self) -> impl Iterator<Item = &MigrationDescriptor> {
        self.migrations.iter()
    }
}

#[derive(Default)]
pub struct DatabaseDescriptorBuilder {
    tables: HashMap<String, TableDescriptor>,
    migrations: Vec<MigrationDescriptor>,
}

impl DatabaseDescriptorBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Add a table, whose columns are declared by the callback.
    pub fn add_table(
        &mut self,
        name: String,
        callback: impl FnOnce(&mut TableBuilder) -> Result<()>,
    ) -> Result<()> {
        if self.tables.contains_key(&name) {
            anyhow::bail!("Duplicate table {}", name);
        }
        let mut builder = TableBuilder::new(name.clone());
        callback(&mut builder)?;
        self.tables.insert(name, builder.build()?);
        Ok(())
    }

    /// Migrations run in the order they are added.
    pub fn add_sql_migration(&mut self, name: String, sql: String) -> Result<()> {
        if self.migrations.iter().any(|m| m.name == name) {
            anyhow::bail!("Duplicate migration {}", name);
        }
        self.migrations.push(MigrationDescriptor { name, sql });
        Ok(())
    }

    pub fn build(self) -> Result<DatabaseDescriptor> {
        Ok(DatabaseDescriptor {
            tables: self.tables,
            migrations: self.migrations,
        })
    }
}
