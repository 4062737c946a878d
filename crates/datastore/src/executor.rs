//! Turns [StatementModel]s into parameterized SQL and runs them.
//!
//! The executor doesn't own transaction boundaries: it runs a batch, in order, on whatever connection or transaction
//! it is given, and stops at the first failure.  Rolling back is the caller's job, see [crate::OrganisationUpdater].
use log::*;

use crate::{ColumnValue, DatabaseDescriptor, Error, Operation, Result, StatementModel};

const INSERT_TEMPLATE: &str = r#"INSERT INTO {{ table }}({{ columns | join(sep=", ") }}) VALUES({% for c in columns %}?{% if not loop.last %}, {% endif %}{% endfor %})"#;

// Updates and deletes always have conditions; their constructors refuse to build one without.
const UPDATE_TEMPLATE: &str = r#"UPDATE {{ table }} SET {% for c in columns %}{{ c }} = ?{% if not loop.last %}, {% endif %}{% endfor %} WHERE {% for c in conditions %}{{ c }} = ?{% if not loop.last %} AND {% endif %}{% endfor %}"#;

const DELETE_TEMPLATE: &str = r#"DELETE FROM {{ table }} WHERE {% for c in conditions %}{{ c }} = ?{% if not loop.last %} AND {% endif %}{% endfor %}"#;

/// SQL text plus the parameters to bind, in placeholder order.
#[derive(Debug)]
pub struct BoundSql<'a> {
    pub sql: String,
    pub params: Vec<&'a ColumnValue>,
}

impl<'a> BoundSql<'a> {
    fn describe_params(&self) -> Vec<String> {
        self.params.iter().map(|p| p.to_string()).collect()
    }
}

pub struct StatementExecutor<'a> {
    descriptor: &'a DatabaseDescriptor,
}

impl<'a> StatementExecutor<'a> {
    pub fn new(descriptor: &'a DatabaseDescriptor) -> Self {
        StatementExecutor { descriptor }
    }

    /// Refuse statements against tables or columns the descriptor doesn't know, since their names go into the SQL
    /// verbatim, and NULLs headed for non-nullable columns.
    fn check(&self, statement: &StatementModel) -> Result<()> {
        let table = self.descriptor.get_table(statement.get_table())?;

        for (name, value) in statement.get_values().iter() {
            let column = table.get_column(name)?;
            if value.is_null() && !column.is_nullable() {
                return Err(Error::NullInNonNullableColumn {
                    table: table.get_name().to_string(),
                    column: name.to_string(),
                });
            }
        }

        for name in statement.get_conditions().columns() {
            table.get_column(name)?;
        }

        Ok(())
    }

    /// Build the SQL for one statement.
    pub fn build<'s>(&self, statement: &'s StatementModel) -> Result<BoundSql<'s>> {
        self.check(statement)?;

        let mut context = tera::Context::new();
        context.insert("table", statement.get_table());
        context.insert(
            "columns",
            &statement.get_values().columns().collect::<Vec<_>>(),
        );
        context.insert(
            "conditions",
            &statement.get_conditions().columns().collect::<Vec<_>>(),
        );

        let template = match statement.get_operation() {
            Operation::Insert => INSERT_TEMPLATE,
            Operation::Update => UPDATE_TEMPLATE,
            Operation::Delete => DELETE_TEMPLATE,
        };
        let sql = tera::Tera::one_off(template, &context, false)?;

        // Values first, then conditions: the same order the templates lay out their placeholders.
        let params = statement
            .get_values()
            .values()
            .chain(statement.get_conditions().values())
            .collect();

        Ok(BoundSql { sql, params })
    }

    /// Run a batch of statements in order, returning how many rows they changed in total.
    ///
    /// Stops at the first failure.  Statements before it have still been applied to `conn`, so callers must run this
    /// inside a transaction they can roll back.
    pub fn execute(&self, batch: &[StatementModel], conn: &rusqlite::Connection) -> Result<usize> {
        let mut changed = 0;

        for statement in batch.iter() {
            let bound = self.build(statement)?;
            debug!("{} params=[{}]", bound.sql, bound.describe_params().join(", "));

            changed += run_bound(conn, &bound).map_err(|source| {
                Error::StatementExecutionFailed {
                    sql: bound.sql.clone(),
                    params: bound.describe_params(),
                    source,
                }
            })?;
        }

        Ok(changed)
    }
}

/// The prepared statement is scoped to this function, so it goes back to the cache however we leave.
fn run_bound(conn: &rusqlite::Connection, bound: &BoundSql) -> rusqlite::Result<usize> {
    let mut statement = conn.prepare_cached(&bound.sql)?;
    for (i, p) in bound.params.iter().enumerate() {
        // SQLite parameters are 1-based.
        statement.raw_bind_parameter(i + 1, *p)?;
    }
    statement.raw_execute()
}
