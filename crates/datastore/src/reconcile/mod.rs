//! Per-relation reconciliation: compare the desired state of one relation with the rows currently stored for it, and
//! emit the statements which make the database match.
//!
//! Two algorithms cover the four relations:
//!
//! - Single-valued relations (alternative name, address) hold at most one row per organisation, and reconcile into
//!   nothing, an insert, an update, or a delete.  More than one current row is a data integrity error.
//! - Set-valued relations (parents, predecessors) are keyed by the linked organisation's id and reconcile by set
//!   difference, see [links].
//!
//! Every reconciler is idempotent: run against a database which already matches, it emits nothing.
use time::OffsetDateTime;

use crate::desired::DesiredState;
use crate::schema;
use crate::{ColumnMap, Error, Result, Row, SequenceAllocator, StatementModel};

pub mod address;
pub mod alternative_name;
pub mod links;
pub mod parent;
pub mod predecessor;

/// What every reconciler needs to know besides its desired and current state.
///
/// Built once per update and passed down explicitly; reconcilers keep no state of their own.
#[derive(Copy, Clone)]
pub struct ReconcileContext<'a> {
    pub entity_id: i64,
    /// Stamped on every row written during this update.
    pub now: OffsetDateTime,
    pub sequences: &'a dyn SequenceAllocator,
}

impl<'a> ReconcileContext<'a> {
    pub fn new(entity_id: i64, now: OffsetDateTime, sequences: &'a dyn SequenceAllocator) -> Self {
        ReconcileContext {
            entity_id,
            now,
            sequences,
        }
    }

    /// Of the current rows of a single-valued relation, the only one, if any.
    pub(crate) fn single_current<'r, T>(&self, table: &str, current: &'r [T]) -> Result<Option<&'r T>> {
        match current {
            [] => Ok(None),
            [only] => Ok(Some(only)),
            _ => Err(Error::DataIntegrityViolation {
                entity_id: self.entity_id,
                table: table.to_string(),
                count: current.len(),
            }),
        }
    }
}

/// The relations of an organisation which the engine keeps in sync.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, derive_more::Display)]
pub enum Relation {
    #[display(fmt = "alternative name")]
    AlternativeName,
    #[display(fmt = "address")]
    Address,
    #[display(fmt = "parent organisations")]
    Parent,
    #[display(fmt = "predecessor organisations")]
    Predecessor,
}

impl Relation {
    /// The order in which an update reconciles relations.
    pub const ALL: [Relation; 4] = [
        Relation::AlternativeName,
        Relation::Address,
        Relation::Parent,
        Relation::Predecessor,
    ];

    /// The table or view current rows are read from.
    pub fn source_table(self) -> &'static str {
        match self {
            Relation::AlternativeName => schema::alternative_name::TABLE,
            Relation::Address => schema::address::VIEW,
            Relation::Parent => schema::parent::TABLE,
            Relation::Predecessor => schema::predecessor::VIEW,
        }
    }

    /// Conditions selecting the current rows of `entity_id` from [Relation::source_table].
    pub fn current_conditions(self, entity_id: i64) -> ColumnMap {
        let column = match self {
            Relation::AlternativeName => schema::alternative_name::ORGANISATION_ID,
            Relation::Address => schema::address::ORGANISATION_ID,
            Relation::Parent => schema::parent::ORGANISATION_ID,
            Relation::Predecessor => schema::predecessor::ORGANISATION_ID,
        };
        ColumnMap::new().with(column, entity_id)
    }

    /// Decode `current` and reconcile it against this relation's part of `desired`.
    pub fn reconcile(
        self,
        ctx: &ReconcileContext,
        desired: &DesiredState,
        current: &[Row],
    ) -> Result<Vec<StatementModel>> {
        match self {
            Relation::AlternativeName => {
                let current = current
                    .iter()
                    .map(alternative_name::CurrentAlternativeName::from_row)
                    .collect::<Result<Vec<_>>>()?;
                alternative_name::reconcile(ctx, desired.alternative_name.as_ref(), &current)
            }
            Relation::Address => {
                let current = current
                    .iter()
                    .map(address::CurrentAddress::from_row)
                    .collect::<Result<Vec<_>>>()?;
                address::reconcile(ctx, desired.address.as_ref(), &current)
            }
            Relation::Parent => {
                let current = current
                    .iter()
                    .map(parent::current_link)
                    .collect::<Result<Vec<_>>>()?;
                parent::reconcile(ctx, &desired.parents, &current)
            }
            Relation::Predecessor => {
                let current = current
                    .iter()
                    .map(predecessor::current_link)
                    .collect::<Result<Vec<_>>>()?;
                predecessor::reconcile(ctx, &desired.predecessors, &current)
            }
        }
    }
}
