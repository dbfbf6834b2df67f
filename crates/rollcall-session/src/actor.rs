//! Task that owns the [`SessionStore`].
//!
//! Every read and mutation is a message on one channel, so requests from
//! different connections are applied strictly one at a time.

use crate::session::{FinalizeSnapshot, SessionStatus};
use crate::store::SessionStore;
use chrono::{DateTime, Utc};
use rollcall_core::{
    AttendanceStatus, ClassId, RollcallError, RollcallResult, SessionStateError, StudentId,
    Summary,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

type Reply<T> = oneshot::Sender<Result<T, SessionStateError>>;

enum Command {
    Start {
        class_id: ClassId,
        reply: Reply<(ClassId, DateTime<Utc>)>,
    },
    Mark {
        student_id: StudentId,
        status: AttendanceStatus,
        reply: Reply<()>,
    },
    Summary {
        reply: Reply<Summary>,
    },
    StatusOf {
        student_id: StudentId,
        reply: Reply<Option<AttendanceStatus>>,
    },
    BeginFinalize {
        reply: Reply<FinalizeSnapshot>,
    },
    CompleteFinalize {
        reply: Reply<()>,
    },
    AbortFinalize {
        reply: Reply<()>,
    },
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
}

/// Cloneable handle to the session actor.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
}

impl SessionHandle {
    /// Spawn the actor on the current tokio runtime with an empty store.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::channel::<Command>(64);
        tokio::spawn(async move {
            let mut store = SessionStore::new();
            while let Some(cmd) = rx.recv().await {
                apply(&mut store, cmd);
            }
            debug!("Session actor stopped");
        });
        Self { tx }
    }

    /// Start a session for `class_id`. Ownership must already be checked.
    pub async fn start(&self, class_id: ClassId) -> RollcallResult<(ClassId, DateTime<Utc>)> {
        self.request(|reply| Command::Start { class_id, reply }).await
    }

    /// Record a mark on the active session.
    pub async fn mark(&self, student_id: StudentId, status: AttendanceStatus) -> RollcallResult<()> {
        self.request(|reply| Command::Mark {
            student_id,
            status,
            reply,
        })
        .await
    }

    /// Counts over the current marks.
    pub async fn snapshot_summary(&self) -> RollcallResult<Summary> {
        self.request(|reply| Command::Summary { reply }).await
    }

    /// One student's mark, or `None` if unmarked.
    pub async fn status_of(&self, student_id: StudentId) -> RollcallResult<Option<AttendanceStatus>> {
        self.request(|reply| Command::StatusOf { student_id, reply })
            .await
    }

    /// `ACTIVE -> FINALIZING`, returning the marks to reconcile.
    pub async fn begin_finalize(&self) -> RollcallResult<FinalizeSnapshot> {
        self.request(|reply| Command::BeginFinalize { reply }).await
    }

    /// `FINALIZING -> NONE` after a successful write.
    pub async fn complete_finalize(&self) -> RollcallResult<()> {
        self.request(|reply| Command::CompleteFinalize { reply })
            .await
    }

    /// `FINALIZING -> ACTIVE` after a failed write.
    pub async fn abort_finalize(&self) -> RollcallResult<()> {
        self.request(|reply| Command::AbortFinalize { reply }).await
    }

    /// Current phase plus session details, if any.
    pub async fn status(&self) -> RollcallResult<SessionStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Status { reply }).await?;
        rx.await
            .map_err(|_| RollcallError::Session("session actor dropped reply".into()))
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> RollcallResult<T> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply)).await?;
        let result = rx
            .await
            .map_err(|_| RollcallError::Session("session actor dropped reply".into()))?;
        Ok(result?)
    }

    async fn send(&self, cmd: Command) -> RollcallResult<()> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| RollcallError::Session("session actor is not running".into()))
    }
}

fn apply(store: &mut SessionStore, cmd: Command) {
    // A dropped receiver only means the requester went away.
    match cmd {
        Command::Start { class_id, reply } => {
            let result = store.start(class_id);
            if let Ok((class_id, started_at)) = &result {
                info!(class_id = %class_id, started_at = %started_at, "Session started");
            }
            let _ = reply.send(result);
        }
        Command::Mark {
            student_id,
            status,
            reply,
        } => {
            let _ = reply.send(store.mark(student_id, status));
        }
        Command::Summary { reply } => {
            let _ = reply.send(store.snapshot_summary());
        }
        Command::StatusOf { student_id, reply } => {
            let _ = reply.send(store.status_of(&student_id));
        }
        Command::BeginFinalize { reply } => {
            let _ = reply.send(store.begin_finalize());
        }
        Command::CompleteFinalize { reply } => {
            let result = store.complete_finalize();
            if result.is_ok() {
                info!("Session closed");
            }
            let _ = reply.send(result);
        }
        Command::AbortFinalize { reply } => {
            let _ = reply.send(store.abort_finalize());
        }
        Command::Status { reply } => {
            let _ = reply.send(store.status());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::session::SessionPhase;

    #[tokio::test]
    async fn handle_round_trips_through_the_actor() {
        let handle = SessionHandle::spawn();
        let (class_id, _) = handle.start("C1".into()).await.unwrap();
        assert_eq!(class_id, "C1");

        handle
            .mark("S1".into(), AttendanceStatus::Present)
            .await
            .unwrap();
        assert_eq!(
            handle.status_of("S1".into()).await.unwrap(),
            Some(AttendanceStatus::Present)
        );
        assert_eq!(handle.snapshot_summary().await.unwrap().present, 1);
        assert_eq!(handle.status().await.unwrap().state, SessionPhase::Active);
    }

    #[tokio::test]
    async fn state_errors_surface_as_session_state() {
        let handle = SessionHandle::spawn();
        let err = handle
            .mark("S1".into(), AttendanceStatus::Absent)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RollcallError::SessionState(SessionStateError::NoActiveSession)
        ));
    }

    #[tokio::test]
    async fn concurrent_begin_finalize_admits_exactly_one() {
        let handle = SessionHandle::spawn();
        handle.start("C1".into()).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let h = handle.clone();
            tasks.push(tokio::spawn(async move { h.begin_finalize().await }));
        }
        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(
            handle.status().await.unwrap().state,
            SessionPhase::Finalizing
        );
    }
}
