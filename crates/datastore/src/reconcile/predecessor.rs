//! Predecessor organisations, each with an optional free-text description.
//!
//! The description lives in its own table with a foreign key to the predecessor link, so statements come out in this
//! order:
//!
//! 1. for each new predecessor, the link, then its description if it has one;
//! 2. for each kept predecessor whose note changed, a description delete and/or insert;
//! 3. for each removed predecessor, its description if it has one, then the link.
//!
//! A changed note is a delete followed by an insert with a freshly allocated id, never an update in place.
use super::links::{self, CurrentLink};
use super::ReconcileContext;
use crate::desired::DesiredLink;
use crate::schema::{predecessor, predecessor_description as description};
use crate::{ColumnMap, Result, Row, StatementModel};

/// Rows come from the predecessor view, which carries the stored description alongside the link.
pub fn current_link(row: &Row) -> Result<CurrentLink> {
    CurrentLink::from_row(
        row,
        predecessor::ID,
        predecessor::LINKED_ID,
        Some(predecessor::DESCRIPTION),
    )
}

fn insert_description(
    ctx: &ReconcileContext,
    predecessor_row_id: i64,
    note: &str,
) -> Result<StatementModel> {
    Ok(StatementModel::insert(
        description::TABLE,
        ColumnMap::new()
            .with(description::ID, ctx.sequences.next(description::SEQUENCE)?)
            .with(description::PREDECESSOR_ID, predecessor_row_id)
            .with(description::DESCRIPTION, note)
            .with(description::LAST_UPDATED, ctx.now),
    ))
}

fn delete_description(predecessor_row_id: i64) -> StatementModel {
    StatementModel::delete_by(
        description::TABLE,
        description::PREDECESSOR_ID,
        predecessor_row_id,
    )
}

pub fn reconcile(
    ctx: &ReconcileContext,
    desired: &[DesiredLink],
    current: &[CurrentLink],
) -> Result<Vec<StatementModel>> {
    let diff = links::diff(desired, current);
    let mut statements = vec![];

    for d in diff.to_add.iter() {
        let row_id = ctx.sequences.next(predecessor::SEQUENCE)?;
        statements.push(StatementModel::insert(
            predecessor::TABLE,
            ColumnMap::new()
                .with(predecessor::ID, row_id)
                .with(predecessor::ORGANISATION_ID, ctx.entity_id)
                .with(predecessor::LINKED_ID, d.linked_id),
        ));
        if let Some(note) = d.note.as_deref().filter(|n| !n.is_empty()) {
            statements.push(insert_description(ctx, row_id, note)?);
        }
    }

    for (d, c) in diff.to_keep.iter() {
        let wanted = d.note.as_deref().filter(|n| !n.is_empty());
        match (wanted, c.note.as_deref()) {
            (None, None) => {}
            (None, Some(_)) => statements.push(delete_description(c.row_id)),
            (Some(w), None) => statements.push(insert_description(ctx, c.row_id, w)?),
            (Some(w), Some(stored)) if w == stored => {}
            (Some(w), Some(_)) => {
                statements.push(delete_description(c.row_id));
                statements.push(insert_description(ctx, c.row_id, w)?);
            }
        }
    }

    for c in diff.to_remove.iter() {
        if c.note.is_some() {
            statements.push(delete_description(c.row_id));
        }
        statements.push(StatementModel::delete_by(
            predecessor::TABLE,
            predecessor::ID,
            c.row_id,
        ));
    }

    Ok(statements)
}
