//! The database wraps a rusqlite connection and provides the ability to work with the organisation schema.
use anyhow::Result;
use log::*;
use time::OffsetDateTime;

use crate::{
    ColumnMap, ColumnType, ColumnValue, DatabaseConfig, DatabaseDescriptor, Row,
    SequenceAllocator, StatementExecutor, StatementModel, TableReader,
};

struct DatabaseState {
    descriptor: DatabaseDescriptor,
}

pub struct Database {
    conn: rusqlite::Connection,
    state: DatabaseState,
}

/// A transaction like that from rusqlite: drop rolls back, calling commit commits.
pub struct Transaction<'a> {
    state: &'a DatabaseState,
    transaction: rusqlite::Transaction<'a>,
}

/// SQL that we run as part of opening a connection.
///
/// - Sets up WAL, and makes sure the WAL file is truncated because it can grow quite large under some obscure
///   conditions.
/// - Enables the busy timeout.
/// - Enables foreign key enforcement.  The statement orderings the reconcilers promise are exactly what keeps foreign
///   keys valid, so we want SQLite checking them.
/// - Raises the cache size.
const INITIAL_SQL_TEMPLATE: &str = r#"
PRAGMA busy_timeout = {{ busy_timeout_ms }};
PRAGMA cache_size = -{{ cache_size_kib }};
PRAGMA foreign_keys = 1;
pragma journal_mode = WAL;
PRAGMA wal_autocheckpoint = 10000;
PRAGMA wal_checkpoint(full);
"#;

const LOAD_TEMPLATE: &str = r#"
SELECT {{ columns | join(sep=", ") }}
FROM {{ table }}
{%- if conditions %}
WHERE {% for c in conditions %}{{ c }} = ?{% if not loop.last %} AND {% endif %}{% endfor %}
{%- endif %}
{%- if order_by %}
ORDER BY {{ order_by }}
{%- endif %}
"#;

const NEXT_SEQUENCE_VALUE: &str = r#"
INSERT INTO sequences(name, value) VALUES(?, 1)
ON CONFLICT(name) DO UPDATE SET value = value + 1
"#;

fn build_initial_sql(config: &DatabaseConfig) -> Result<String> {
    let mut context = tera::Context::new();
    context.insert("busy_timeout_ms", &config.busy_timeout_ms);
    context.insert("cache_size_kib", &config.cache_size_kib);
    Ok(tera::Tera::one_off(INITIAL_SQL_TEMPLATE, &context, false)?)
}

/// Run the migrations for a given database, creating the initial migrations infrastructure if necessary.
///
/// Note that the initial migrations table is, in effect, the only thing we can't migrate without a lot of work.
fn run_migrations(conn: &mut rusqlite::Connection, descriptor: &DatabaseDescriptor) -> Result<()> {
    let transaction = conn.transaction()?;

    // First, we create our migrations table.
    transaction.execute(r#"CREATE TABLE IF NOT EXISTS migrations (
        -- Incrementing, unique id for the migration.
        id INTEGER,
        -- Name of the migration.
        name TEXT NOT NULL,
        -- The specific sql run for this migration, which can be useful for debugging.
        sql TEXT NOT NULL,
        -- Unix timestamp as real seconds
        ran_at REAL,
        -- Duration taken as real seconds.
        duration REAL NOT NULL
    )"#, [])?;

    for mig in descriptor.iter_migrations() {
        // First we need to know if we already ran it.
        let had_migration = transaction
            .prepare("SELECT * FROM migrations where name = ?")?
            .exists(rusqlite::params![mig.get_name()])?;
        if had_migration {
            continue;
        }

        let ran_at = (std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)?)
        .as_secs_f64();

        let start_time = std::time::Instant::now();
        transaction.execute_batch(mig.get_sql())?;
        let duration = start_time.elapsed().as_secs_f64();
        info!("Ran migration {} in {:.3}s", mig.get_name(), duration);

        // Now record that we ran it.
        transaction.execute(
            "INSERT INTO migrations(name, sql, ran_at, duration) VALUES(?, ?, ?, ?)",
            rusqlite::params![mig.get_name(), mig.get_sql(), ran_at, duration],
        )?;
    }

    // Let's make sure that no one has played around with foreign keys.
    transaction.execute("PRAGMA foreign_key_check", [])?;

    transaction.commit()?;
    Ok(())
}

impl Database {
    /// Open the organisation database described by `config`, running any migrations it hasn't seen yet.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let descriptor = crate::schema::organisation_descriptor()?;
        let conn = match config.path.as_ref() {
            Some(dir) => {
                let path = dir.join("database.sqlite");
                info!("Opening database at {}", path.display());
                rusqlite::Connection::open(&path)?
            }
            None => {
                info!("Opening in-memory database");
                rusqlite::Connection::open_in_memory()?
            }
        };
        Database::with_connection(conn, config, descriptor)
    }

    /// Build a database from an already-existing connection and descriptor.
    ///
    /// This should be used for testing only.
    pub fn with_connection(
        mut conn: rusqlite::Connection,
        config: &DatabaseConfig,
        descriptor: DatabaseDescriptor,
    ) -> Result<Self> {
        conn.execute_batch(&build_initial_sql(config)?)?;
        run_migrations(&mut conn, &descriptor)?;
        Ok(Database {
            state: DatabaseState { descriptor },
            conn,
        })
    }

    pub fn transaction(&mut self) -> crate::Result<Transaction> {
        Ok(Transaction {
            state: &self.state,
            transaction: self.conn.transaction()?,
        })
    }

    /// The raw connection, for seeding and inspecting data in tests and benches.
    pub fn connection(&self) -> &rusqlite::Connection {
        &self.conn
    }
}

/// Decode one column of a result row according to its descriptor.
fn read_column(
    row: &rusqlite::Row,
    index: usize,
    column_type: ColumnType,
) -> rusqlite::Result<ColumnValue> {
    Ok(match column_type {
        ColumnType::Integer => row.get::<_, Option<i64>>(index)?.into(),
        ColumnType::String => row.get::<_, Option<String>>(index)?.into(),
        ColumnType::Timestamp => row.get::<_, Option<OffsetDateTime>>(index)?.into(),
    })
}

impl<'a> Transaction<'a> {
    /// Run a batch of statements, in order, inside this transaction.
    pub fn execute_statements(&self, batch: &[StatementModel]) -> crate::Result<usize> {
        StatementExecutor::new(&self.state.descriptor).execute(batch, &self.transaction)
    }

    pub fn commit(self) -> crate::Result<()> {
        Ok(self.transaction.commit()?)
    }

    /// Roll back explicitly.  Dropping the transaction does the same, but swallows any error.
    pub fn rollback(self) -> crate::Result<()> {
        Ok(self.transaction.rollback()?)
    }
}

impl<'a> TableReader for Transaction<'a> {
    fn read_rows(&self, table: &str, conditions: &ColumnMap) -> crate::Result<Vec<Row>> {
        let table_desc = self.state.descriptor.get_table(table)?;
        for c in conditions.columns() {
            table_desc.get_column(c)?;
        }

        let columns = table_desc.iter_columns().collect::<Vec<_>>();
        let mut context = tera::Context::new();
        context.insert("table", table_desc.get_name());
        context.insert(
            "columns",
            &columns.iter().map(|c| c.get_name()).collect::<Vec<_>>(),
        );
        context.insert("conditions", &conditions.columns().collect::<Vec<_>>());
        // Primary key order, so current rows come back the same way every time.
        let order_by = columns
            .iter()
            .find(|c| c.is_primary_key())
            .or_else(|| columns.first())
            .map(|c| c.get_name());
        context.insert("order_by", &order_by);
        let query_text = tera::Tera::one_off(LOAD_TEMPLATE, &context, false)?;

        let mut statement = self.transaction.prepare_cached(&query_text)?;
        for (i, v) in conditions.values().enumerate() {
            statement.raw_bind_parameter(i + 1, v)?;
        }

        let mut ret = vec![];
        let mut rows = statement.raw_query();
        while let Some(r) = rows.next()? {
            let mut map = ColumnMap::new();
            for (i, c) in columns.iter().enumerate() {
                map.insert(c.get_name(), read_column(r, i, c.get_column_type())?);
            }
            ret.push(Row::new(table, map));
        }

        trace!("Read {} rows from {}", ret.len(), table);
        Ok(ret)
    }
}

impl<'a> SequenceAllocator for Transaction<'a> {
    fn next(&self, sequence: &str) -> crate::Result<i64> {
        self.transaction
            .prepare_cached(NEXT_SEQUENCE_VALUE)?
            .execute(rusqlite::params![sequence])?;
        let value = self.transaction.query_row(
            "SELECT value FROM sequences WHERE name = ?",
            rusqlite::params![sequence],
            |r| r.get(0),
        )?;
        Ok(value)
    }
}
