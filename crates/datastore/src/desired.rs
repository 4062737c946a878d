//! Extraction of the desired state of an organisation from its record.
//!
//! Everything here is validated before the database is touched: a record that can't be turned into a [DesiredState]
//! never opens a transaction.
use itertools::Itertools;
use lazy_static::lazy_static;
use time::format_description::FormatItem;
use time::{Date, OffsetDateTime};

use crate::schema::organisation;
use crate::{ColumnMap, Error, Record, Result, StatementModel};

/// Locale of an alternative name whose record doesn't say.
pub const DEFAULT_ALTERNATIVE_NAME_LOCALE: &str = "en";

lazy_static! {
    static ref DATE_FORMAT: Vec<FormatItem<'static>> =
        time::format_description::parse("[year]-[month]-[day]").expect("Date format should parse");
}

/// Parse an organisation id, which must be a positive integer.
pub fn parse_entity_id(id: &str) -> Result<i64> {
    match id.parse::<i64>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(Error::InvalidEntityId(id.to_string())),
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> Error {
    Error::InvalidField {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// The value of an atomic, with empty strings treated as absent.
fn non_empty_value<'a, R: Record>(record: &'a R, name: &str) -> Option<&'a str> {
    record.first_value(name).filter(|v| !v.is_empty())
}

/// Columns of the organisation row itself.
#[derive(Clone, Debug, PartialEq)]
pub struct OrganisationFields {
    pub name: String,
    pub code: Option<String>,
    pub number: Option<String>,
    pub organisation_type: Option<String>,
    pub url: Option<String>,
    pub closed_date: Option<OffsetDateTime>,
    pub eligible: bool,
}

impl OrganisationFields {
    fn from_record<R: Record>(record: &R) -> Result<Self> {
        let name = non_empty_value(record, "organisationName")
            .ok_or_else(|| invalid("organisationName", "every organisation needs a name"))?
            .to_string();

        let closed_date = non_empty_value(record, "closedDate")
            .map(|d| {
                Date::parse(d, DATE_FORMAT.as_slice())
                    .map(|d| d.midnight().assume_utc())
                    .map_err(|e| invalid("closedDate", e.to_string()))
            })
            .transpose()?;

        let eligible = match non_empty_value(record, "eligible") {
            None | Some("yes") | Some("true") => true,
            Some("no") | Some("false") => false,
            Some(other) => return Err(invalid("eligible", format!("{:?} is not yes or no", other))),
        };

        let owned = |n: &str| non_empty_value(record, n).map(str::to_string);
        Ok(OrganisationFields {
            name,
            code: owned("organisationCode"),
            number: owned("organisationNumber"),
            organisation_type: owned("organisationType"),
            url: owned("URL"),
            closed_date,
            eligible,
        })
    }

    /// The update of the organisation row, which always leads a batch.
    ///
    /// The address pointer is deliberately absent: it belongs to the address reconciler.
    pub fn to_statement(&self, entity_id: i64, now: OffsetDateTime) -> StatementModel {
        let values = ColumnMap::new()
            .with(organisation::NAME, self.name.as_str())
            .with(organisation::CODE, self.code.clone())
            .with(organisation::NUMBER, self.number.clone())
            .with(organisation::TYPE, self.organisation_type.clone())
            .with(organisation::URL, self.url.clone())
            .with(organisation::CLOSED_DATE, self.closed_date)
            .with(organisation::NOT_ELIGIBLE, !self.eligible)
            .with(organisation::LAST_UPDATED, now);
        StatementModel::update(
            organisation::TABLE,
            values,
            ColumnMap::new().with(organisation::ID, entity_id),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlternativeName {
    pub name: String,
    pub locale: String,
}

impl AlternativeName {
    fn from_record<R: Record>(record: &R) -> Option<Self> {
        let group = record.first_group("alternativeName")?;
        let name = non_empty_value(group, "name")?;
        let locale = non_empty_value(group, "language").unwrap_or(DEFAULT_ALTERNATIVE_NAME_LOCALE);
        Some(AlternativeName {
            name: name.to_string(),
            locale: locale.to_string(),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddressFields {
    pub city: Option<String>,
    pub street: Option<String>,
    pub postbox: Option<String>,
    pub postcode: Option<String>,
    pub country: Option<String>,
}

impl AddressFields {
    pub fn is_empty(&self) -> bool {
        *self == Default::default()
    }

    /// `None` unless at least one address field is present.
    fn from_record<R: Record>(record: &R) -> Option<Self> {
        let owned = |n: &str| non_empty_value(record, n).map(str::to_string);
        let fields = AddressFields {
            city: owned("city"),
            street: owned("street"),
            postbox: owned("box"),
            postcode: owned("postcode"),
            country: owned("country"),
        };
        (!fields.is_empty()).then(|| fields)
    }
}

/// A link to another organisation, as a parent or a predecessor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DesiredLink {
    pub linked_id: i64,
    /// Only predecessors carry notes.
    pub note: Option<String>,
}

impl DesiredLink {
    pub fn new(linked_id: i64) -> Self {
        DesiredLink {
            linked_id,
            note: None,
        }
    }

    pub fn with_note(linked_id: i64, note: impl Into<String>) -> Self {
        DesiredLink {
            linked_id,
            note: Some(note.into()),
        }
    }
}

/// Read the links under every `group_name` group.  A linked id appearing more than once is one link; the first
/// occurrence wins.
fn links_from_record<R: Record>(
    record: &R,
    group_name: &str,
    note_name: Option<&str>,
) -> Result<Vec<DesiredLink>> {
    let links = record
        .all_groups(group_name)
        .into_iter()
        .map(|group| -> Result<DesiredLink> {
            let raw = group
                .first_group("organisationLink")
                .and_then(|l| l.first_value("linkedRecordId"))
                .ok_or_else(|| invalid(group_name, "link without a linkedRecordId"))?;
            let linked_id = parse_entity_id(raw)
                .map_err(|_| invalid(group_name, format!("{:?} is not an organisation id", raw)))?;
            let note = note_name
                .and_then(|n| non_empty_value(group, n))
                .map(str::to_string);
            Ok(DesiredLink { linked_id, note })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(links.into_iter().unique_by(|l| l.linked_id).collect())
}

/// Everything the engine wants the database to say about one organisation.
#[derive(Clone, Debug, PartialEq)]
pub struct DesiredState {
    pub organisation: OrganisationFields,
    pub alternative_name: Option<AlternativeName>,
    pub address: Option<AddressFields>,
    pub parents: Vec<DesiredLink>,
    pub predecessors: Vec<DesiredLink>,
}

impl DesiredState {
    pub fn from_record<R: Record>(record: &R) -> Result<Self> {
        Ok(DesiredState {
            organisation: OrganisationFields::from_record(record)?,
            alternative_name: AlternativeName::from_record(record),
            address: AddressFields::from_record(record),
            parents: links_from_record(record, "parentOrganisation", None)?,
            predecessors: links_from_record(record, "earlierOrganisation", Some("internalNote"))?,
        })
    }
}
