use crate::actor::SessionHandle;
use crate::persistence::{AttendanceStore, FinalizedAttendance};
use crate::session::{FinalizeSnapshot, Marks};
use chrono::Utc;
use rollcall_core::{AttendanceStatus, ClassId, RollcallError, RollcallResult, StudentId, Summary};
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Outcome of a successful finalize.
#[derive(Debug, Clone)]
pub struct FinalizeReport {
    /// Class that was finalized.
    pub class_id: ClassId,
    /// Counts over the persisted marks.
    pub summary: Summary,
    /// The batch that was written.
    pub record: FinalizedAttendance,
}

/// Merge roster and marks: every enrolled student without a mark becomes
/// absent. Marked students missing from the roster are kept.
pub fn reconcile(mut marks: Marks, roster: &BTreeSet<StudentId>) -> Marks {
    for student in roster {
        marks
            .entry(student.clone())
            .or_insert(AttendanceStatus::Absent);
    }
    marks
}

/// Close the active session: snapshot it, reconcile against the roster,
/// persist one batch, then clear it.
///
/// If the roster read or the write fails, the session goes back to
/// `ACTIVE` with its marks intact and a [`RollcallError::Persistence`] is
/// returned.
pub async fn finalize(
    session: &SessionHandle,
    store: &dyn AttendanceStore,
) -> RollcallResult<FinalizeReport> {
    let snapshot = session.begin_finalize().await?;
    let class_id = snapshot.class_id.clone();

    match persist(&snapshot, store).await {
        Ok(record) => {
            session.complete_finalize().await?;
            let summary = Summary::from_statuses(record.marks.values());
            info!(
                class_id = %class_id,
                present = summary.present,
                absent = summary.absent,
                total = summary.total,
                "Attendance finalized"
            );
            Ok(FinalizeReport {
                class_id,
                summary,
                record,
            })
        }
        Err(e) => {
            warn!(class_id = %class_id, error = %e, "Finalize failed, session restored");
            session.abort_finalize().await?;
            Err(match e {
                RollcallError::Persistence(_) => e,
                other => RollcallError::Persistence(other.to_string()),
            })
        }
    }
}

async fn persist(
    snapshot: &FinalizeSnapshot,
    store: &dyn AttendanceStore,
) -> RollcallResult<FinalizedAttendance> {
    let roster = store.roster(&snapshot.class_id).await?;
    let record = FinalizedAttendance {
        class_id: snapshot.class_id.clone(),
        started_at: snapshot.started_at,
        finalized_at: Utc::now(),
        marks: reconcile(snapshot.marks.clone(), &roster),
    };
    store.persist_final(&record).await?;
    Ok(record)
}
