use chrono::{DateTime, Utc};
use rollcall_core::{AttendanceStatus, ClassId, StudentId, Summary};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attendance marks keyed by student. Order is irrelevant.
pub type Marks = HashMap<StudentId, AttendanceStatus>;

/// The single live attendance-taking record for one class meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    class_id: ClassId,
    /// When the session was started.
    pub started_at: DateTime<Utc>,
    /// Marks so far, last write wins.
    pub marks: Marks,
}

impl Session {
    /// A new session for `class_id` with no marks, started now.
    pub fn new(class_id: impl Into<ClassId>) -> Self {
        Self {
            class_id: class_id.into(),
            started_at: Utc::now(),
            marks: HashMap::new(),
        }
    }

    /// Class this session belongs to. Fixed at creation.
    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    /// Records `status` for `student_id`, replacing any earlier mark.
    pub fn mark(&mut self, student_id: impl Into<StudentId>, status: AttendanceStatus) {
        self.marks.insert(student_id.into(), status);
    }

    /// The student's mark, if any.
    pub fn status_of(&self, student_id: &str) -> Option<AttendanceStatus> {
        self.marks.get(student_id).copied()
    }

    /// Counts over the current marks.
    pub fn summary(&self) -> Summary {
        Summary::from_statuses(self.marks.values())
    }
}

/// Immutable copy of a session handed to reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeSnapshot {
    /// Class being finalized.
    pub class_id: ClassId,
    /// Start time of the session.
    pub started_at: DateTime<Utc>,
    /// Marks as they were when finalize began.
    pub marks: Marks,
}

/// Lifecycle phase of the session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// No session.
    None,
    /// Accepting marks and queries.
    Active,
    /// Finalize in flight. Nothing else is accepted.
    Finalizing,
}

/// Read-only view of the store for status endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    /// Current phase.
    pub state: SessionPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Class of the current session.
    pub class_id: Option<ClassId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Start time of the current session.
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Number of students marked so far.
    pub marked: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_marks_keep_the_last_status() {
        let mut session = Session::new("C1");
        session.mark("S1", AttendanceStatus::Present);
        session.mark("S1", AttendanceStatus::Absent);
        session.mark("S1", AttendanceStatus::Present);
        assert_eq!(session.status_of("S1"), Some(AttendanceStatus::Present));
        assert_eq!(session.marks.len(), 1);
    }

    #[test]
    fn unmarked_student_has_no_status() {
        let session = Session::new("C1");
        assert_eq!(session.class_id(), "C1");
        assert_eq!(session.status_of("S9"), None);
        assert_eq!(session.summary().total, 0);
    }
}
