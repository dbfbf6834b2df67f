use crate::session::{FinalizeSnapshot, Session, SessionPhase, SessionStatus};
use chrono::{DateTime, Utc};
use rollcall_core::{AttendanceStatus, ClassId, SessionStateError, StudentId, Summary};

#[derive(Debug, Default)]
enum State {
    #[default]
    None,
    Active(Session),
    /// Persistence is in flight. The session is kept so an abort can
    /// restore it untouched.
    Finalizing(Session),
}

/// Holds zero or one session and enforces its lifecycle:
///
/// ```text
/// NONE --start--> ACTIVE --begin_finalize--> FINALIZING --complete--> NONE
///                   ^                             |
///                   +-----------abort-------------+
/// ```
///
/// Every operation other than `start` requires `ACTIVE`; while
/// `FINALIZING` they fail with [`SessionStateError::NoActiveSession`].
#[derive(Debug, Default)]
pub struct SessionStore {
    state: State,
}

impl SessionStore {
    /// A store with no session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SessionPhase {
        match self.state {
            State::None => SessionPhase::None,
            State::Active(_) => SessionPhase::Active,
            State::Finalizing(_) => SessionPhase::Finalizing,
        }
    }

    /// `NONE -> ACTIVE`. Returns the class and start time of the new session.
    pub fn start(
        &mut self,
        class_id: ClassId,
    ) -> Result<(ClassId, DateTime<Utc>), SessionStateError> {
        if !matches!(self.state, State::None) {
            return Err(SessionStateError::SessionAlreadyActive);
        }
        let session = Session::new(class_id);
        let ack = (session.class_id().to_string(), session.started_at);
        self.state = State::Active(session);
        Ok(ack)
    }

    /// Record a mark. Requires `ACTIVE`.
    pub fn mark(
        &mut self,
        student_id: StudentId,
        status: AttendanceStatus,
    ) -> Result<(), SessionStateError> {
        self.active_mut()?.mark(student_id, status);
        Ok(())
    }

    /// Counts over the current marks. Requires `ACTIVE`.
    pub fn snapshot_summary(&self) -> Result<Summary, SessionStateError> {
        Ok(self.active()?.summary())
    }

    /// Mark for one student; `Ok(None)` if the student has not been marked.
    pub fn status_of(
        &self,
        student_id: &str,
    ) -> Result<Option<AttendanceStatus>, SessionStateError> {
        Ok(self.active()?.status_of(student_id))
    }

    /// `ACTIVE -> FINALIZING`, returning a copy of the session to reconcile.
    pub fn begin_finalize(&mut self) -> Result<FinalizeSnapshot, SessionStateError> {
        match std::mem::take(&mut self.state) {
            State::Active(session) => {
                let snapshot = FinalizeSnapshot {
                    class_id: session.class_id().to_string(),
                    started_at: session.started_at,
                    marks: session.marks.clone(),
                };
                self.state = State::Finalizing(session);
                Ok(snapshot)
            }
            other => {
                self.state = other;
                Err(SessionStateError::NoActiveSession)
            }
        }
    }

    /// `FINALIZING -> NONE`. Call only after persistence succeeded.
    pub fn complete_finalize(&mut self) -> Result<(), SessionStateError> {
        match self.state {
            State::Finalizing(_) => {
                self.state = State::None;
                Ok(())
            }
            _ => Err(SessionStateError::NoActiveSession),
        }
    }

    /// `FINALIZING -> ACTIVE` with marks unchanged, so finalize can be retried.
    pub fn abort_finalize(&mut self) -> Result<(), SessionStateError> {
        match std::mem::take(&mut self.state) {
            State::Finalizing(session) => {
                self.state = State::Active(session);
                Ok(())
            }
            other => {
                self.state = other;
                Err(SessionStateError::NoActiveSession)
            }
        }
    }

    /// Read-only view for status endpoints. Never fails.
    pub fn status(&self) -> SessionStatus {
        let session = match &self.state {
            State::None => None,
            State::Active(s) | State::Finalizing(s) => Some(s),
        };
        SessionStatus {
            state: self.phase(),
            class_id: session.map(|s| s.class_id().to_string()),
            started_at: session.map(|s| s.started_at),
            marked: session.map(|s| s.marks.len()),
        }
    }

    fn active(&self) -> Result<&Session, SessionStateError> {
        match &self.state {
            State::Active(session) => Ok(session),
            _ => Err(SessionStateError::NoActiveSession),
        }
    }

    fn active_mut(&mut self) -> Result<&mut Session, SessionStateError> {
        match &mut self.state {
            State::Active(session) => Ok(session),
            _ => Err(SessionStateError::NoActiveSession),
        }
    }
}
