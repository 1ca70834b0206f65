//! # Drain Ordering
//!
//! Pure ordering over pending records. The sort key is
//! `(priority rank, enqueued_at)`, ascending, with ties kept in store order.
//!
//! ```text
//!   rank 0          rank 1                 rank 2
//!  ┌────────┐   ┌──────────────────┐   ┌────────┐
//!  │critical│ → │ high ⇄ medium    │ → │  low   │
//!  │  FIFO  │   │ FIFO across both │   │  FIFO  │
//!  └────────┘   └──────────────────┘   └────────┘
//! ```

use crate::types::ActionRecord;

/// Orders records for draining.
///
/// The sort is stable, so records with identical `(rank, enqueued_at)` keep
/// the order they had in the store.
pub fn order(mut records: Vec<ActionRecord>) -> Vec<ActionRecord> {
    records.sort_by(|a, b| {
        a.priority
            .rank()
            .cmp(&b.priority.rank())
            .then_with(|| a.enqueued_at.cmp(&b.enqueued_at))
    });
    records
}

/// Returns the first record in drain order that `skip` does not reject.
pub fn next_pending<'a, F>(records: &'a [ActionRecord], mut skip: F) -> Option<&'a ActionRecord>
where
    F: FnMut(&ActionRecord) -> bool,
{
    records
        .iter()
        .filter(|record| !skip(record))
        .min_by(|a, b| {
            a.priority
                .rank()
                .cmp(&b.priority.rank())
                .then_with(|| a.enqueued_at.cmp(&b.enqueued_at))
        })
}
