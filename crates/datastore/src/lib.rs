//! The organisation datastore.
//!
//! This crate keeps the relational representation of one organisation in sync with a hierarchical record describing
//! it.  An update reads what is stored for the organisation, works out per relation what has to change, and applies
//! the resulting statements in a single transaction:
//!
//! - [desired] turns a [Record] into the state we want stored, validating it before anything touches the database.
//! - [reconcile] compares that with the current rows of each [Relation] and emits [StatementModel]s.  Statements are
//!   plain data; nothing in this layer talks to SQLite.
//! - [StatementExecutor] renders statements to SQL and runs them, in order, on a connection.
//! - [OrganisationUpdater] ties these together over a [Database], committing or rolling back as a whole.
//!
//! The schema itself lives in [schema], as tables and two read views (address joined through the organisation's
//! pointer, and predecessors left-joined with their descriptions).  Synthetic row ids come from a sequences table in
//! the same database, so allocating one is part of the update's transaction.
mod clock;
mod collaborators;
mod config;
mod database;
mod descriptor;
pub mod desired;
mod errors;
mod executor;
pub mod reconcile;
mod record;
pub mod schema;
mod statement;
mod updater;
mod value;

pub use clock::{Clock, FixedClock, SystemClock};
pub use collaborators::{SequenceAllocator, TableReader};
pub use config::DatabaseConfig;
pub use database::{Database, Transaction};
pub use descriptor::{
    ColumnDescriptor, ColumnType, DatabaseDescriptor, DatabaseDescriptorBuilder,
    MigrationDescriptor, TableBuilder, TableDescriptor,
};
pub use errors::{Error, Result};
pub use executor::{BoundSql, StatementExecutor};
pub use reconcile::{ReconcileContext, Relation};
pub use record::{DataGroup, Record};
pub use statement::{Operation, StatementModel};
pub use updater::{plan_update, OrganisationUpdater};
pub use value::{ColumnMap, ColumnValue, Row};
