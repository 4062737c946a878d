//! Updating one organisation: read current state, reconcile every relation, run the batch, all in one transaction.
//!
//! An update goes idle -> reading current state -> reconciling -> executing -> committed or rolled back.  None of the
//! intermediate states are visible to callers, who see either success or one [Error::EntityUpdateFailed] after the
//! rollback.
//!
//! Two updates of the same organisation running concurrently on different connections are not coordinated here; that
//! is left to SQLite's locking.  Nothing is retried either: a retry has to re-read current state, so it belongs to the
//! caller.
use log::*;
use time::OffsetDateTime;

use crate::desired::{parse_entity_id, DesiredState};
use crate::reconcile::{ReconcileContext, Relation};
use crate::schema::organisation;
use crate::{
    Clock, ColumnMap, Database, Error, Record, Result, SequenceAllocator, StatementModel,
    SystemClock, TableReader,
};

/// Build the full batch for one organisation, without running it.
///
/// The organisation row's own update always comes first, followed by each relation's statements in [Relation::ALL]
/// order.
pub fn plan_update(
    reader: &dyn TableReader,
    sequences: &dyn SequenceAllocator,
    entity_id: i64,
    desired: &DesiredState,
    now: OffsetDateTime,
) -> Result<Vec<StatementModel>> {
    // The root row has to exist already; we never create it.
    let root = reader.read_rows(
        organisation::TABLE,
        &ColumnMap::new().with(organisation::ID, entity_id),
    )?;
    if root.is_empty() {
        return Err(Error::UnknownEntity(entity_id));
    }

    let ctx = ReconcileContext::new(entity_id, now, sequences);
    let mut batch = vec![desired.organisation.to_statement(entity_id, now)];

    for relation in Relation::ALL {
        let current = reader.read_rows(
            relation.source_table(),
            &relation.current_conditions(entity_id),
        )?;
        let statements = relation.reconcile(&ctx, desired, &current)?;
        debug!(
            "Organisation {}: {} current rows and {} statements for {}",
            entity_id,
            current.len(),
            statements.len(),
            relation
        );
        batch.extend(statements);
    }

    Ok(batch)
}

/// Applies organisation records to the database.
pub struct OrganisationUpdater<'db, C = SystemClock> {
    db: &'db mut Database,
    clock: C,
}

impl<'db> OrganisationUpdater<'db, SystemClock> {
    pub fn new(db: &'db mut Database) -> Self {
        OrganisationUpdater {
            db,
            clock: SystemClock,
        }
    }
}

impl<'db, C: Clock> OrganisationUpdater<'db, C> {
    pub fn with_clock(db: &'db mut Database, clock: C) -> Self {
        OrganisationUpdater { db, clock }
    }

    /// Make the database match `record` for organisation `entity_id`, or change nothing at all.
    ///
    /// Every failure, including ones found before the database is touched, comes back as
    /// [Error::EntityUpdateFailed] wrapping the cause.
    pub fn update<R: Record>(&mut self, entity_id: &str, record: &R) -> Result<()> {
        self.update_inner(entity_id, record)
            .map_err(|e| e.into_update_failure(entity_id))
    }

    fn update_inner<R: Record>(&mut self, entity_id: &str, record: &R) -> Result<()> {
        // Validation happens before any transaction exists.
        let id = parse_entity_id(entity_id)?;
        let desired = DesiredState::from_record(record)?;
        let now = self.clock.now();

        let tx = self.db.transaction()?;
        let res = plan_update(&tx, &tx, id, &desired, now)
            .and_then(|batch| tx.execute_statements(&batch).map(|changed| (batch.len(), changed)));

        match res {
            Ok((statements, changed)) => {
                tx.commit()?;
                info!(
                    "Updated organisation {}: {} statements changed {} rows",
                    id, statements, changed
                );
                Ok(())
            }
            Err(e) => {
                warn!("Rolling back update of organisation {}: {}", id, e);
                if let Err(rollback_error) = tx.rollback() {
                    error!(
                        "Rollback of organisation {} failed too: {}",
                        id, rollback_error
                    );
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    use crate::schema::{address, alternative_name, parent, predecessor, predecessor_description};
    use crate::{ColumnValue, DataGroup, DatabaseConfig, FixedClock, Operation};

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_600_000_000).unwrap()
    }

    /// A database with organisations 1 (the one we update), and 10, 20, 30, 234, 235 to link to.
    fn seeded_db() -> Database {
        orgsync_logging::log_to_stderr();
        let mut db = Database::open(&DatabaseConfig::in_memory()).unwrap();
        let tx = db.transaction().unwrap();
        let batch = [1i64, 10, 20, 30, 234, 235]
            .iter()
            .map(|id| {
                StatementModel::insert(
                    organisation::TABLE,
                    ColumnMap::new()
                        .with(organisation::ID, *id)
                        .with(organisation::NAME, format!("Organisation {}", id))
                        .with(organisation::NOT_ELIGIBLE, false),
                )
            })
            .collect::<Vec<_>>();
        tx.execute_statements(&batch).unwrap();
        tx.commit().unwrap();
        db
    }

    fn link(group: &str, id: &str) -> DataGroup {
        DataGroup::group(group).with_child(
            DataGroup::group("organisationLink").with_atomic("linkedRecordId", id),
        )
    }

    fn base_record() -> DataGroup {
        DataGroup::group("organisation")
            .with_atomic("organisationName", "Institutionen för fysik")
            .with_child(
                DataGroup::group("alternativeName")
                    .with_atomic("name", "Department of Physics")
                    .with_atomic("language", "en"),
            )
    }

    fn full_record() -> DataGroup {
        base_record()
            .with_atomic("city", "Uppsala")
            .with_atomic("postcode", "751 20")
            .with_child(link("parentOrganisation", "10"))
            .with_child(link("parentOrganisation", "20"))
            .with_child(link("earlierOrganisation", "234").with_atomic("internalNote", "merged 1998"))
    }

    fn update(db: &mut Database, id: &str, record: &DataGroup) -> Result<()> {
        OrganisationUpdater::with_clock(db, FixedClock(now())).update(id, record)
    }

    /// Everything a second update would do, minus the organisation row's own update which is always there.
    fn replan(db: &mut Database, record: &DataGroup) -> Vec<StatementModel> {
        let desired = DesiredState::from_record(record).unwrap();
        let tx = db.transaction().unwrap();
        let mut batch = plan_update(&tx, &tx, 1, &desired, now()).unwrap();
        assert_eq!(batch[0].get_table(), organisation::TABLE);
        batch.remove(0);
        batch
    }

    fn count(db: &Database, table: &str) -> i64 {
        db.connection()
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
            .unwrap()
    }

    fn linked_ids(db: &mut Database, relation: Relation) -> Vec<i64> {
        let tx = db.transaction().unwrap();
        let column = match relation {
            Relation::Parent => parent::LINKED_ID,
            Relation::Predecessor => predecessor::LINKED_ID,
            _ => unreachable!(),
        };
        let mut ids = tx
            .read_rows(relation.source_table(), &relation.current_conditions(1))
            .unwrap()
            .iter()
            .map(|r| r.get_i64(column).unwrap())
            .collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn round_trip() {
        let mut db = seeded_db();
        let record = full_record();

        update(&mut db, "1", &record).unwrap();

        assert_eq!(count(&db, alternative_name::TABLE), 1);
        assert_eq!(count(&db, address::TABLE), 1);
        assert_eq!(linked_ids(&mut db, Relation::Parent), vec![10, 20]);
        assert_eq!(linked_ids(&mut db, Relation::Predecessor), vec![234]);
        assert_eq!(count(&db, predecessor_description::TABLE), 1);

        // Reconciling again against what we just wrote emits nothing for any relation.
        assert_eq!(replan(&mut db, &record), Vec::<StatementModel>::new());

        // And running the whole update again changes no relation rows.
        update(&mut db, "1", &record).unwrap();
        assert_eq!(replan(&mut db, &record), Vec::<StatementModel>::new());
        assert_eq!(count(&db, parent::TABLE), 2);
    }

    #[test]
    fn organisation_row_is_updated() {
        let mut db = seeded_db();
        update(&mut db, "1", &full_record().with_atomic("organisationCode", "FYS")).unwrap();

        let tx = db.transaction().unwrap();
        let rows = tx
            .read_rows(
                organisation::TABLE,
                &ColumnMap::new().with(organisation::ID, 1),
            )
            .unwrap();
        assert_eq!(
            rows[0].value_of(organisation::NAME),
            Some(&ColumnValue::String("Institutionen för fysik".into()))
        );
        assert_eq!(
            rows[0].value_of(organisation::CODE),
            Some(&ColumnValue::String("FYS".into()))
        );
        assert_eq!(
            rows[0].value_of(organisation::LAST_UPDATED),
            Some(&ColumnValue::Timestamp(now()))
        );
        assert!(!rows[0].value_of(organisation::ADDRESS_ID).unwrap().is_null());
    }

    #[test]
    fn later_update_changes_relations() {
        let mut db = seeded_db();
        update(&mut db, "1", &full_record()).unwrap();

        // Parents {10, 20} -> {20, 30}, the predecessor note changes, and the address goes away.
        let second = base_record()
            .with_child(link("parentOrganisation", "20"))
            .with_child(link("parentOrganisation", "30"))
            .with_child(link("earlierOrganisation", "234").with_atomic("internalNote", "merged 1999"))
            .with_child(link("earlierOrganisation", "235"));

        let planned = replan(&mut db, &second);
        let ops = planned
            .iter()
            .map(|s| (s.get_operation(), s.get_table().to_string()))
            .collect::<Vec<_>>();
        assert_eq!(
            ops,
            vec![
                (Operation::Update, organisation::TABLE.to_string()),
                (Operation::Delete, address::TABLE.to_string()),
                (Operation::Insert, parent::TABLE.to_string()),
                (Operation::Delete, parent::TABLE.to_string()),
                (Operation::Insert, predecessor::TABLE.to_string()),
                (Operation::Delete, predecessor_description::TABLE.to_string()),
                (Operation::Insert, predecessor_description::TABLE.to_string()),
            ]
        );

        update(&mut db, "1", &second).unwrap();
        assert_eq!(count(&db, address::TABLE), 0);
        assert_eq!(linked_ids(&mut db, Relation::Parent), vec![20, 30]);
        assert_eq!(linked_ids(&mut db, Relation::Predecessor), vec![234, 235]);
        assert_eq!(count(&db, predecessor_description::TABLE), 1);
        assert_eq!(replan(&mut db, &second), Vec::<StatementModel>::new());

        // Dropping every link deletes the description before its link, which the foreign key would catch otherwise.
        update(&mut db, "1", &base_record()).unwrap();
        assert_eq!(count(&db, parent::TABLE), 0);
        assert_eq!(count(&db, predecessor::TABLE), 0);
        assert_eq!(count(&db, predecessor_description::TABLE), 0);
    }

    #[test]
    fn invalid_id_fails_before_io() {
        let mut db = seeded_db();
        let err = update(&mut db, "abc", &full_record()).unwrap_err();
        assert!(matches!(err, Error::EntityUpdateFailed { .. }));
        assert!(matches!(err.root_cause(), Error::InvalidEntityId(_)));
    }

    #[test]
    fn missing_alternative_name() {
        let mut db = seeded_db();
        let record = DataGroup::group("organisation").with_atomic("organisationName", "X");
        let err = update(&mut db, "1", &record).unwrap_err();
        assert!(matches!(
            err.root_cause(),
            Error::MissingRequiredRelation {
                entity_id: 1,
                relation: Relation::AlternativeName
            }
        ));
    }

    #[test]
    fn unknown_organisation() {
        let mut db = seeded_db();
        let err = update(&mut db, "999", &full_record()).unwrap_err();
        assert!(matches!(err.root_cause(), Error::UnknownEntity(999)));
    }

    /// A batch which fails part way through leaves nothing behind: the alternative name, address and first parent
    /// statements all run before the link to a missing organisation trips the foreign key.
    #[test]
    fn failure_rolls_back_everything() {
        let mut db = seeded_db();
        let record = full_record().with_child(link("parentOrganisation", "999"));

        let err = update(&mut db, "1", &record).unwrap_err();
        match err.root_cause() {
            Error::StatementExecutionFailed { sql, .. } => {
                assert!(sql.starts_with("INSERT INTO organisation_parent"), "{}", sql)
            }
            x => panic!("Expected a statement failure, got {:?}", x),
        }

        for table in [
            alternative_name::TABLE,
            address::TABLE,
            parent::TABLE,
            predecessor::TABLE,
            predecessor_description::TABLE,
        ] {
            assert_eq!(count(&db, table), 0, "{} should be empty", table);
        }
        let tx = db.transaction().unwrap();
        let rows = tx
            .read_rows(
                organisation::TABLE,
                &ColumnMap::new().with(organisation::ID, 1),
            )
            .unwrap();
        assert_eq!(rows[0].value_of(organisation::LAST_UPDATED), Some(&ColumnValue::Null));
    }

    #[test]
    fn duplicate_alternative_names_are_refused() {
        let mut db = seeded_db();
        update(&mut db, "1", &full_record()).unwrap();
        let tx = db.transaction().unwrap();
        tx.execute_statements(&[StatementModel::insert(
            alternative_name::TABLE,
            ColumnMap::new()
                .with(alternative_name::ID, 77)
                .with(alternative_name::ORGANISATION_ID, 1)
                .with(alternative_name::NAME, "Extra")
                .with(alternative_name::LOCALE, "en")
                .with(alternative_name::LAST_UPDATED, now()),
        )])
        .unwrap();
        tx.commit().unwrap();

        let err = update(&mut db, "1", &full_record()).unwrap_err();
        assert!(matches!(
            err.root_cause(),
            Error::DataIntegrityViolation { count: 2, .. }
        ));
    }
}
