//! Set reconciliation of links to other organisations, keyed by the linked organisation's id.
//!
//! Given desired links `S` and current rows `C`:
//!
//! - `to_add` is `S - C`, in desired order;
//! - `to_remove` is every current row whose linked id is not in `S`, plus every row after the first linking to the
//!   same id, in current order;
//! - `to_keep` pairs each id in both with its current row, for reconcilers which compare more than the id.
//!
//! Duplicate ids in `S` collapse to their first occurrence, so no id is ever added twice.
use std::collections::{HashMap, HashSet};

use itertools::Itertools;

use crate::desired::DesiredLink;
use crate::{Result, Row};

/// One stored link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrentLink {
    /// Synthetic id of the link row itself.
    pub row_id: i64,
    pub linked_id: i64,
    pub note: Option<String>,
}

impl CurrentLink {
    pub fn new(row_id: i64, linked_id: i64) -> Self {
        CurrentLink {
            row_id,
            linked_id,
            note: None,
        }
    }

    pub fn with_note(row_id: i64, linked_id: i64, note: impl Into<String>) -> Self {
        CurrentLink {
            row_id,
            linked_id,
            note: Some(note.into()),
        }
    }

    pub(crate) fn from_row(
        row: &Row,
        id_column: &str,
        linked_column: &str,
        note_column: Option<&str>,
    ) -> Result<Self> {
        Ok(CurrentLink {
            row_id: row.get_i64(id_column)?,
            linked_id: row.get_i64(linked_column)?,
            note: note_column
                .map(|c| row.get_optional_string(c))
                .transpose()?
                .flatten(),
        })
    }
}

#[derive(Debug, Default)]
pub struct LinkDiff<'a> {
    pub to_add: Vec<&'a DesiredLink>,
    pub to_remove: Vec<&'a CurrentLink>,
    pub to_keep: Vec<(&'a DesiredLink, &'a CurrentLink)>,
}

pub fn diff<'a>(desired: &'a [DesiredLink], current: &'a [CurrentLink]) -> LinkDiff<'a> {
    let desired = desired.iter().unique_by(|d| d.linked_id);

    if current.is_empty() {
        return LinkDiff {
            to_add: desired.collect(),
            ..Default::default()
        };
    }

    let desired = desired.collect::<Vec<_>>();
    if desired.is_empty() {
        return LinkDiff {
            to_remove: current.iter().collect(),
            ..Default::default()
        };
    }

    // If the same organisation is linked more than once, the first row is the link and the rest are removed.
    let mut current_by_linked_id: HashMap<i64, &CurrentLink> = HashMap::new();
    for c in current.iter() {
        current_by_linked_id.entry(c.linked_id).or_insert(c);
    }
    let desired_ids = desired.iter().map(|d| d.linked_id).collect::<HashSet<_>>();

    let mut ret = LinkDiff::default();
    for d in desired.into_iter() {
        match current_by_linked_id.get(&d.linked_id) {
            Some(c) => ret.to_keep.push((d, *c)),
            None => ret.to_add.push(d),
        }
    }
    // A row id seen twice is one link read through a join, not a second link.
    ret.to_remove = current
        .iter()
        .filter(|c| {
            !desired_ids.contains(&c.linked_id)
                || current_by_linked_id[&c.linked_id].row_id != c.row_id
        })
        .collect();

    ret
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeSet;

    use proptest::prelude::*;

    fn ids<'a>(links: impl IntoIterator<Item = &'a DesiredLink>) -> Vec<i64> {
        links.into_iter().map(|l| l.linked_id).collect()
    }

    #[test]
    fn empty_current_adds_everything() {
        let desired = vec![DesiredLink::new(3), DesiredLink::new(1), DesiredLink::new(3)];
        let d = diff(&desired, &[]);
        assert_eq!(ids(d.to_add), vec![3, 1]);
        assert!(d.to_remove.is_empty());
        assert!(d.to_keep.is_empty());
    }

    #[test]
    fn empty_desired_removes_everything() {
        let current = vec![CurrentLink::new(100, 3), CurrentLink::new(101, 1)];
        let d = diff(&[], &current);
        assert!(d.to_add.is_empty());
        assert_eq!(d.to_remove, vec![&current[0], &current[1]]);
    }

    #[test]
    fn mixed() {
        let desired = vec![DesiredLink::new(20), DesiredLink::new(30)];
        let current = vec![CurrentLink::new(100, 10), CurrentLink::new(101, 20)];
        let d = diff(&desired, &current);
        assert_eq!(ids(d.to_add), vec![30]);
        assert_eq!(d.to_remove, vec![&current[0]]);
        assert_eq!(d.to_keep, vec![(&desired[0], &current[1])]);
    }

    #[test]
    fn extra_rows_for_a_kept_id_are_removed() {
        let desired = vec![DesiredLink::new(20)];
        let current = vec![
            CurrentLink::new(100, 20),
            CurrentLink::new(101, 20),
            CurrentLink::new(102, 10),
        ];
        let d = diff(&desired, &current);
        assert!(d.to_add.is_empty());
        assert_eq!(d.to_keep, vec![(&desired[0], &current[0])]);
        assert_eq!(d.to_remove, vec![&current[1], &current[2]]);
    }

    #[test]
    fn same_row_twice_is_one_link() {
        let desired = vec![DesiredLink::new(20)];
        let current = vec![
            CurrentLink::with_note(100, 20, "a"),
            CurrentLink::with_note(100, 20, "b"),
        ];
        let d = diff(&desired, &current);
        assert_eq!(d.to_keep, vec![(&desired[0], &current[0])]);
        assert!(d.to_remove.is_empty());
    }

    fn check_diff(desired_ids: Vec<i64>, current_ids: Vec<i64>) -> proptest::test_runner::TestCaseResult {
        let desired = desired_ids.iter().map(|i| DesiredLink::new(*i)).collect::<Vec<_>>();
        let current = current_ids
            .iter()
            .enumerate()
            .map(|(row, i)| CurrentLink::new(1000 + row as i64, *i))
            .collect::<Vec<_>>();
        let d = diff(&desired, &current);

        let s = desired_ids.iter().copied().collect::<BTreeSet<_>>();
        let c = current_ids.iter().copied().collect::<BTreeSet<_>>();

        // No duplicate adds, and exactly S - C.
        let added = ids(d.to_add.iter().copied());
        prop_assert_eq!(added.len(), added.iter().collect::<BTreeSet<_>>().len());
        prop_assert_eq!(
            added.into_iter().collect::<BTreeSet<_>>(),
            s.difference(&c).copied().collect::<BTreeSet<_>>()
        );

        // Every current row linking outside S is removed, as is every row after the first for an id in S.
        let removed = d.to_remove.iter().map(|r| r.linked_id).collect::<BTreeSet<_>>();
        prop_assert!(removed.is_superset(&c.difference(&s).copied().collect::<BTreeSet<_>>()));
        prop_assert_eq!(d.to_remove.len(), current_ids.len() - s.intersection(&c).count());

        // Kept and removed rows partition the current rows.
        let mut touched = d
            .to_keep
            .iter()
            .map(|(_, have)| have.row_id)
            .chain(d.to_remove.iter().map(|r| r.row_id))
            .collect::<Vec<_>>();
        touched.sort_unstable();
        prop_assert_eq!(touched, current.iter().map(|r| r.row_id).collect::<Vec<_>>());

        let kept = d.to_keep.iter().map(|(d, _)| d.linked_id).collect::<BTreeSet<_>>();
        prop_assert_eq!(kept, s.intersection(&c).copied().collect::<BTreeSet<_>>());
        for (want, have) in d.to_keep.iter() {
            prop_assert_eq!(want.linked_id, have.linked_id);
        }

        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 2000,
            ..Default::default()
        })]
        #[test]
        #[allow(unreachable_code)]
        fn fuzz_diff(
            desired in proptest::collection::vec(1..30i64, 0..20usize),
            current in proptest::collection::vec(1..30i64, 0..20usize),
        ) {
            return check_diff(desired, current);
        }
    }
}
