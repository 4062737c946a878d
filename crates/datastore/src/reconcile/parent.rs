//! Parent organisations.
use super::links::{self, CurrentLink};
use super::ReconcileContext;
use crate::desired::DesiredLink;
use crate::schema::parent::*;
use crate::{ColumnMap, Result, Row, StatementModel};

pub fn current_link(row: &Row) -> Result<CurrentLink> {
    CurrentLink::from_row(row, ID, LINKED_ID, None)
}

/// Inserts for new parents come before deletes of old ones.
pub fn reconcile(
    ctx: &ReconcileContext,
    desired: &[DesiredLink],
    current: &[CurrentLink],
) -> Result<Vec<StatementModel>> {
    let diff = links::diff(desired, current);
    let mut statements = Vec::with_capacity(diff.to_add.len() + diff.to_remove.len());

    for d in diff.to_add.iter() {
        statements.push(StatementModel::insert(
            TABLE,
            ColumnMap::new()
                .with(ID, ctx.sequences.next(SEQUENCE)?)
                .with(ORGANISATION_ID, ctx.entity_id)
                .with(LINKED_ID, d.linked_id),
        ));
    }

    for c in diff.to_remove.iter() {
        statements.push(StatementModel::delete_by(TABLE, ID, c.row_id));
    }

    Ok(statements)
}
