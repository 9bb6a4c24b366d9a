//! Maintenance of the per-student point totals.
//!
//! Totals only move through `LedgerStore::increment_totals` (or as part of
//! `record_point_event`). Nothing here ever writes an absolute value, so a
//! concurrent submission can never be overwritten by a stale total.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::models::{PointKind, PointTotals};
use crate::store::LedgerStore;

/// What a reconciliation pass found and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub student_id: String,
    /// Totals stored on the student row when the snapshot was taken.
    pub stored: PointTotals,
    /// Totals derived from the event log in the same snapshot.
    pub derived: PointTotals,
    /// Totals after any correction was applied.
    pub totals: PointTotals,
}

impl Reconciliation {
    pub fn was_consistent(&self) -> bool {
        self.stored == self.derived
    }
}

pub struct AggregateMaintainer {
    store: Arc<dyn LedgerStore>,
}

impl AggregateMaintainer {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Atomically add a signed `delta` to one of a student's totals.
    pub async fn apply_delta(&self, student_id: &str, kind: PointKind, delta: i64) -> LedgerResult<PointTotals> {
        Ok(self.store.increment_totals(student_id, kind, delta).await?)
    }

    /// Bring stored totals back in line with the event log.
    ///
    /// The difference is computed from one consistent snapshot and applied
    /// as an increment. A submission landing between the snapshot and the
    /// correction moves both the log and the total by the same amount, so
    /// the correction stays valid.
    pub async fn reconcile(&self, student_id: &str) -> LedgerResult<Reconciliation> {
        let snapshot = self.store.student_ledger_snapshot(student_id).await?;
        let stored = snapshot.student.totals();
        let derived = PointTotals::from_events(&snapshot.events);

        let mut totals = stored;
        for kind in PointKind::ALL {
            let drift = total_as_i64(derived.get(kind))? - total_as_i64(stored.get(kind))?;
            if drift != 0 {
                warn!(
                    student_id = %student_id,
                    kind = %kind,
                    stored = stored.get(kind),
                    derived = derived.get(kind),
                    "Point total drifted from event log, correcting"
                );
                totals = self.apply_delta(student_id, kind, drift).await?;
            }
        }

        if stored == derived {
            info!(student_id = %student_id, "Point totals already consistent");
        }

        Ok(Reconciliation {
            student_id: student_id.to_string(),
            stored,
            derived,
            totals,
        })
    }
}

fn total_as_i64(total: u64) -> LedgerResult<i64> {
    i64::try_from(total).map_err(|_| LedgerError::Validation(format!("point total {} is out of range", total)))
}
