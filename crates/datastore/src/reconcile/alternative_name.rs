//! The alternative name: exactly one per organisation.
use log::*;

use super::{ReconcileContext, Relation};
use crate::desired::AlternativeName;
use crate::schema::alternative_name::*;
use crate::{ColumnMap, Error, Result, Row, StatementModel};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrentAlternativeName {
    pub row_id: i64,
    pub name: String,
    pub locale: String,
}

impl CurrentAlternativeName {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(CurrentAlternativeName {
            row_id: row.get_i64(ID)?,
            name: row.get_string(NAME)?,
            locale: row.get_string(LOCALE)?,
        })
    }

    fn matches(&self, desired: &AlternativeName) -> bool {
        self.name == desired.name && self.locale == desired.locale
    }
}

/// The relation is mandatory: an organisation without an alternative name is an error, not a delete.
pub fn reconcile(
    ctx: &ReconcileContext,
    desired: Option<&AlternativeName>,
    current: &[CurrentAlternativeName],
) -> Result<Vec<StatementModel>> {
    let desired = desired.ok_or(Error::MissingRequiredRelation {
        entity_id: ctx.entity_id,
        relation: Relation::AlternativeName,
    })?;

    let statement = match ctx.single_current(TABLE, current)? {
        Some(c) if c.matches(desired) => return Ok(vec![]),
        Some(c) => {
            trace!("Alternative name {} changed", c.row_id);
            StatementModel::update(
                TABLE,
                ColumnMap::new()
                    .with(NAME, desired.name.as_str())
                    .with(LOCALE, desired.locale.as_str())
                    .with(LAST_UPDATED, ctx.now),
                ColumnMap::new().with(ID, c.row_id),
            )
        }
        None => StatementModel::insert(
            TABLE,
            ColumnMap::new()
                .with(ID, ctx.sequences.next(SEQUENCE)?)
                .with(ORGANISATION_ID, ctx.entity_id)
                .with(NAME, desired.name.as_str())
                .with(LOCALE, desired.locale.as_str())
                .with(LAST_UPDATED, ctx.now),
        ),
    };

    Ok(vec![statement])
}
