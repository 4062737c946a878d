//! The postal address: at most one per organisation.
//!
//! The address row doesn't point at its organisation; the organisation points at it through
//! [schema::organisation::ADDRESS_ID].  Writes keep that pointer valid at every step: it is cleared before the row it
//! points at is deleted, and only set after the row it will point at has been inserted.
use super::ReconcileContext;
use crate::desired::AddressFields;
use crate::schema::{self, address::*};
use crate::{ColumnMap, ColumnValue, Result, Row, StatementModel};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrentAddress {
    pub row_id: i64,
    pub fields: AddressFields,
}

impl CurrentAddress {
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(CurrentAddress {
            row_id: row.get_i64(ID)?,
            fields: AddressFields {
                city: row.get_optional_string(CITY)?,
                street: row.get_optional_string(STREET)?,
                postbox: row.get_optional_string(POSTBOX)?,
                postcode: row.get_optional_string(POSTCODE)?,
                country: row.get_optional_string(COUNTRY)?,
            },
        })
    }
}

/// All address columns, absent fields as NULL, plus the modification time.
fn address_values(ctx: &ReconcileContext, fields: &AddressFields) -> ColumnMap {
    ColumnMap::new()
        .with(CITY, fields.city.clone())
        .with(STREET, fields.street.clone())
        .with(POSTBOX, fields.postbox.clone())
        .with(POSTCODE, fields.postcode.clone())
        .with(COUNTRY, fields.country.clone())
        .with(LAST_UPDATED, ctx.now)
}

fn set_address_pointer(ctx: &ReconcileContext, address_id: ColumnValue) -> StatementModel {
    StatementModel::update(
        schema::organisation::TABLE,
        ColumnMap::new().with(schema::organisation::ADDRESS_ID, address_id),
        ColumnMap::new().with(schema::organisation::ID, ctx.entity_id),
    )
}

pub fn reconcile(
    ctx: &ReconcileContext,
    desired: Option<&AddressFields>,
    current: &[CurrentAddress],
) -> Result<Vec<StatementModel>> {
    let current = ctx.single_current(TABLE, current)?;

    let statements = match (desired, current) {
        (None, None) => vec![],
        (None, Some(c)) => vec![
            set_address_pointer(ctx, ColumnValue::Null),
            StatementModel::delete_by(TABLE, ID, c.row_id),
        ],
        (Some(d), Some(c)) if *d == c.fields => vec![],
        (Some(d), Some(c)) => vec![StatementModel::update(
            TABLE,
            address_values(ctx, d),
            ColumnMap::new().with(ID, c.row_id),
        )],
        (Some(d), None) => {
            let row_id = ctx.sequences.next(SEQUENCE)?;
            let mut values = ColumnMap::new().with(ID, row_id);
            for (column, value) in address_values(ctx, d).iter() {
                values.insert(column, value.clone());
            }
            vec![
                StatementModel::insert(TABLE, values),
                set_address_pointer(ctx, row_id.into()),
            ]
        }
    };

    Ok(statements)
}
