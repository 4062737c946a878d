//! The organisation schema: table and column names, sequences, and the migration which creates it all.
use anyhow::Result;

use crate::{DatabaseDescriptor, DatabaseDescriptorBuilder};

pub mod organisation {
    pub const TABLE: &str = "organisation";
    pub const ID: &str = "organisation_id";
    pub const NAME: &str = "organisation_name";
    pub const CODE: &str = "organisation_code";
    pub const NUMBER: &str = "orgnumber";
    pub const TYPE: &str = "organisation_type";
    pub const URL: &str = "url";
    pub const CLOSED_DATE: &str = "closed_date";
    pub const NOT_ELIGIBLE: &str = "not_eligible";
    /// Pointer to the organisation's row in [super::address::TABLE], if any.
    pub const ADDRESS_ID: &str = "address_id";
    pub const LAST_UPDATED: &str = "last_updated";
}

pub mod alternative_name {
    pub const TABLE: &str = "organisation_alternative_name";
    pub const SEQUENCE: &str = "organisation_alternative_name_sequence";
    pub const ID: &str = "organisation_alternative_name_id";
    pub const ORGANISATION_ID: &str = "organisation_id";
    pub const NAME: &str = "organisation_name";
    pub const LOCALE: &str = "locale";
    pub const LAST_UPDATED: &str = "last_updated";
}

pub mod address {
    pub const TABLE: &str = "organisation_address";
    /// The address joined through the organisation's address pointer, keyed by organisation id.
    pub const VIEW: &str = "organisation_address_view";
    pub const SEQUENCE: &str = "organisation_address_sequence";
    pub const ID: &str = "organisation_address_id";
    pub const ORGANISATION_ID: &str = "organisation_id";
    pub const CITY: &str = "city";
    pub const STREET: &str = "street";
    pub const POSTBOX: &str = "box";
    pub const POSTCODE: &str = "postcode";
    pub const COUNTRY: &str = "country_code";
    pub const LAST_UPDATED: &str = "last_updated";
}

pub mod parent {
    pub const TABLE: &str = "organisation_parent";
    pub const SEQUENCE: &str = "organisation_parent_sequence";
    pub const ID: &str = "organisation_parent_id";
    pub const ORGANISATION_ID: &str = "organisation_id";
    pub const LINKED_ID: &str = "parent_organisation_id";
}

pub mod predecessor {
    pub const TABLE: &str = "organisation_predecessor";
    /// Predecessor links left-joined with their description.
    pub const VIEW: &str = "organisation_predecessor_view";
    pub const SEQUENCE: &str = "organisation_predecessor_sequence";
    pub const ID: &str = "organisation_predecessor_id";
    pub const ORGANISATION_ID: &str = "organisation_id";
    pub const LINKED_ID: &str = "predecessor_id";
    pub const DESCRIPTION: &str = "description";
}

pub mod predecessor_description {
    pub const TABLE: &str = "organisation_predecessor_description";
    pub const SEQUENCE: &str = "organisation_predecessor_description_sequence";
    pub const ID: &str = "organisation_predecessor_description_id";
    pub const PREDECESSOR_ID: &str = "organisation_predecessor_id";
    pub const DESCRIPTION: &str = "description";
    pub const LAST_UPDATED: &str = "last_updated";
}

const CREATE_TABLES: &str = r#"
CREATE TABLE sequences (
    name TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);

CREATE TABLE organisation_address (
    organisation_address_id INTEGER PRIMARY KEY,
    city TEXT,
    street TEXT,
    box TEXT,
    postcode TEXT,
    country_code TEXT,
    last_updated TEXT NOT NULL
);

CREATE TABLE organisation (
    organisation_id INTEGER PRIMARY KEY,
    organisation_name TEXT NOT NULL,
    organisation_code TEXT,
    orgnumber TEXT,
    organisation_type TEXT,
    url TEXT,
    closed_date TEXT,
    not_eligible INTEGER NOT NULL DEFAULT 0,
    address_id INTEGER REFERENCES organisation_address(organisation_address_id),
    last_updated TEXT
);

CREATE TABLE organisation_alternative_name (
    organisation_alternative_name_id INTEGER PRIMARY KEY,
    organisation_id INTEGER NOT NULL REFERENCES organisation(organisation_id),
    organisation_name TEXT NOT NULL,
    locale TEXT NOT NULL,
    last_updated TEXT NOT NULL
);

CREATE TABLE organisation_parent (
    organisation_parent_id INTEGER PRIMARY KEY,
    organisation_id INTEGER NOT NULL REFERENCES organisation(organisation_id),
    parent_organisation_id INTEGER NOT NULL REFERENCES organisation(organisation_id)
);

CREATE TABLE organisation_predecessor (
    organisation_predecessor_id INTEGER PRIMARY KEY,
    organisation_id INTEGER NOT NULL REFERENCES organisation(organisation_id),
    predecessor_id INTEGER NOT NULL REFERENCES organisation(organisation_id)
);

CREATE TABLE organisation_predecessor_description (
    organisation_predecessor_description_id INTEGER PRIMARY KEY,
    organisation_predecessor_id INTEGER NOT NULL
        REFERENCES organisation_predecessor(organisation_predecessor_id),
    description TEXT NOT NULL,
    last_updated TEXT NOT NULL
);
"#;

const CREATE_VIEWS: &str = r#"
CREATE VIEW organisation_address_view AS
SELECT
    a.organisation_address_id AS organisation_address_id,
    o.organisation_id AS organisation_id,
    a.city AS city,
    a.street AS street,
    a.box AS box,
    a.postcode AS postcode,
    a.country_code AS country_code,
    a.last_updated AS last_updated
FROM organisation o
JOIN organisation_address a ON a.organisation_address_id = o.address_id;

CREATE VIEW organisation_predecessor_view AS
SELECT
    p.organisation_predecessor_id AS organisation_predecessor_id,
    p.organisation_id AS organisation_id,
    p.predecessor_id AS predecessor_id,
    d.description AS description
FROM organisation_predecessor p
LEFT JOIN organisation_predecessor_description d
    ON d.organisation_predecessor_id = p.organisation_predecessor_id;
"#;

/// Build the descriptor of the organisation schema.
pub fn organisation_descriptor() -> Result<DatabaseDescriptor> {
    let mut b = DatabaseDescriptorBuilder::new();

    b.add_table(organisation::TABLE.into(), |tb| {
        tb.add_integer_column(organisation::ID.into(), true, false)?;
        tb.add_string_column(organisation::NAME.into(), false)?;
        tb.add_string_column(organisation::CODE.into(), true)?;
        tb.add_string_column(organisation::NUMBER.into(), true)?;
        tb.add_string_column(organisation::TYPE.into(), true)?;
        tb.add_string_column(organisation::URL.into(), true)?;
        tb.add_timestamp_column(organisation::CLOSED_DATE.into(), true)?;
        tb.add_integer_column(organisation::NOT_ELIGIBLE.into(), false, false)?;
        tb.add_integer_column(organisation::ADDRESS_ID.into(), false, true)?;
        tb.add_timestamp_column(organisation::LAST_UPDATED.into(), true)?;
        Ok(())
    })?;

    b.add_table(alternative_name::TABLE.into(), |tb| {
        tb.add_integer_column(alternative_name::ID.into(), true, false)?;
        tb.add_integer_column(alternative_name::ORGANISATION_ID.into(), false, false)?;
        tb.add_string_column(alternative_name::NAME.into(), false)?;
        tb.add_string_column(alternative_name::LOCALE.into(), false)?;
        tb.add_timestamp_column(alternative_name::LAST_UPDATED.into(), false)?;
        Ok(())
    })?;

    let address_columns = |tb: &mut crate::TableBuilder| -> Result<()> {
        tb.add_string_column(address::CITY.into(), true)?;
        tb.add_string_column(address::STREET.into(), true)?;
        tb.add_string_column(address::POSTBOX.into(), true)?;
        tb.add_string_column(address::POSTCODE.into(), true)?;
        tb.add_string_column(address::COUNTRY.into(), true)?;
        tb.add_timestamp_column(address::LAST_UPDATED.into(), false)?;
        Ok(())
    };
    b.add_table(address::TABLE.into(), |tb| {
        tb.add_integer_column(address::ID.into(), true, false)?;
        address_columns(tb)
    })?;
    b.add_table(address::VIEW.into(), |tb| {
        tb.add_integer_column(address::ID.into(), true, false)?;
        tb.add_integer_column(address::ORGANISATION_ID.into(), false, false)?;
        address_columns(tb)
    })?;

    b.add_table(parent::TABLE.into(), |tb| {
        tb.add_integer_column(parent::ID.into(), true, false)?;
        tb.add_integer_column(parent::ORGANISATION_ID.into(), false, false)?;
        tb.add_integer_column(parent::LINKED_ID.into(), false, false)?;
        Ok(())
    })?;

    b.add_table(predecessor::TABLE.into(), |tb| {
        tb.add_integer_column(predecessor::ID.into(), true, false)?;
        tb.add_integer_column(predecessor::ORGANISATION_ID.into(), false, false)?;
        tb.add_integer_column(predecessor::LINKED_ID.into(), false, false)?;
        Ok(())
    })?;
    b.add_table(predecessor::VIEW.into(), |tb| {
        tb.add_integer_column(predecessor::ID.into(), true, false)?;
        tb.add_integer_column(predecessor::ORGANISATION_ID.into(), false, false)?;
        tb.add_integer_column(predecessor::LINKED_ID.into(), false, false)?;
        tb.add_string_column(predecessor::DESCRIPTION.into(), true)?;
        Ok(())
    })?;

    b.add_table(predecessor_description::TABLE.into(), |tb| {
        tb.add_integer_column(predecessor_description::ID.into(), true, false)?;
        tb.add_integer_column(predecessor_description::PREDECESSOR_ID.into(), false, false)?;
        tb.add_string_column(predecessor_description::DESCRIPTION.into(), false)?;
        tb.add_timestamp_column(predecessor_description::LAST_UPDATED.into(), false)?;
        Ok(())
    })?;

    b.add_sql_migration("m1.tables".into(), CREATE_TABLES.into())?;
    b.add_sql_migration("m2.views".into(), CREATE_VIEWS.into())?;

    b.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds() {
        let desc = organisation_descriptor().expect("Schema should build");
        assert_eq!(desc.iter_migrations().count(), 2);
        for table in [
            organisation::TABLE,
            alternative_name::TABLE,
            address::TABLE,
            address::VIEW,
            parent::TABLE,
            predecessor::TABLE,
            predecessor::VIEW,
            predecessor_description::TABLE,
        ] {
            desc.get_table(table).expect("Table should be described");
        }
    }
}
