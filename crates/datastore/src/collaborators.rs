//! The capabilities the engine needs from storage.
//!
//! [crate::Transaction] implements both on top of SQLite.  Reconcilers only ever see a [SequenceAllocator], which is
//! what lets them be tested without a database.
use crate::{ColumnMap, Result, Row};

pub trait TableReader {
    /// Every row of `table` whose columns equal `conditions`, in a stable order.
    fn read_rows(&self, table: &str, conditions: &ColumnMap) -> Result<Vec<Row>>;
}

/// Hands out synthetic row ids.
///
/// Values are never reused while the process lives, but one allocated in a transaction which later rolls back may be
/// gone for good.  A gap in the ids is not an error.
pub trait SequenceAllocator {
    fn next(&self, sequence: &str) -> Result<i64>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;

    /// Per-sequence counters starting from a fixed base, so tests can predict every id.
    pub(crate) struct CountingSequences {
        base: i64,
        counters: RefCell<HashMap<String, i64>>,
    }

    impl CountingSequences {
        pub(crate) fn starting_at(base: i64) -> Self {
            CountingSequences {
                base,
                counters: Default::default(),
            }
        }
    }

    impl SequenceAllocator for CountingSequences {
        fn next(&self, sequence: &str) -> Result<i64> {
            let mut counters = self.counters.borrow_mut();
            let counter = counters.entry(sequence.to_string()).or_insert(self.base);
            let ret = *counter;
            *counter += 1;
            Ok(ret)
        }
    }
}
