use crate::reconcile::Relation;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Organisation id {0:?} is not a positive integer")]
    InvalidEntityId(String),

    #[error("Record field {field} is invalid: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Organisation {entity_id} has no {relation}, which every organisation must have")]
    MissingRequiredRelation { entity_id: i64, relation: Relation },

    #[error("Organisation {entity_id} has {count} rows in {table}, but at most one is allowed")]
    DataIntegrityViolation {
        entity_id: i64,
        table: String,
        count: usize,
    },

    #[error("No organisation with id {0} exists")]
    UnknownEntity(i64),

    #[error("Unknown table {0}")]
    UnknownTable(String),

    #[error("Table {table} has no column {column}")]
    UnknownColumn { table: String, column: String },

    #[error("Column {column} of {table} may not be NULL")]
    NullInNonNullableColumn { table: String, column: String },

    #[error("Row from {table} is malformed: {reason}")]
    MalformedRow { table: String, reason: String },

    #[error("Statement `{sql}` with parameters [{}] failed: {source}", params.join(", "))]
    StatementExecutionFailed {
        sql: String,
        params: Vec<String>,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Updating organisation {entity_id} failed: {source}")]
    EntityUpdateFailed {
        entity_id: String,
        #[source]
        source: Box<Error>,
    },

    #[error("SQLite error: {}", _0)]
    Sqlite(#[from] rusqlite::Error),

    #[error("Unable to render SQL: {}", _0)]
    Template(#[from] tera::Error),
}

impl Error {
    /// Wrap this error as the failure of an update of `entity_id`.
    pub(crate) fn into_update_failure(self, entity_id: &str) -> Error {
        Error::EntityUpdateFailed {
            entity_id: entity_id.to_string(),
            source: Box::new(self),
        }
    }

    /// For [Error::EntityUpdateFailed], the error that caused it; otherwise `self`.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::EntityUpdateFailed { source, .. } => source.root_cause(),
            e => e,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
