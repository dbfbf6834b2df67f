#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for rollcall-session: finalize against real and failing stores.

use async_trait::async_trait;
use rollcall_core::{AttendanceStatus, RollcallError, RollcallResult, SessionStateError, StudentId};
use rollcall_session::{
    finalize, AttendanceStore, FileAttendanceStore, FinalizedAttendance, InMemoryAttendanceStore,
    SessionHandle, SessionPhase,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

/// Store whose writes fail until `heal` is called.
struct FlakyStore {
    inner: InMemoryAttendanceStore,
    failing: AtomicBool,
}

impl FlakyStore {
    async fn new() -> Self {
        let inner = InMemoryAttendanceStore::new();
        inner.put_class("C", "T1", ["S1", "S2", "S3"]).await;
        Self {
            inner,
            failing: AtomicBool::new(true),
        }
    }

    fn heal(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl AttendanceStore for FlakyStore {
    async fn class_owner(&self, class_id: &str) -> RollcallResult<Option<String>> {
        self.inner.class_owner(class_id).await
    }

    async fn roster(&self, class_id: &str) -> RollcallResult<BTreeSet<StudentId>> {
        self.inner.roster(class_id).await
    }

    async fn persist_final(&self, record: &FinalizedAttendance) -> RollcallResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RollcallError::Persistence("disk full".into()));
        }
        self.inner.persist_final(record).await
    }
}

/// Store whose roster lookups fail with an I/O error.
struct UnreadableRosterStore {
    inner: InMemoryAttendanceStore,
}

#[async_trait]
impl AttendanceStore for UnreadableRosterStore {
    async fn class_owner(&self, class_id: &str) -> RollcallResult<Option<String>> {
        self.inner.class_owner(class_id).await
    }

    async fn roster(&self, _class_id: &str) -> RollcallResult<BTreeSet<StudentId>> {
        Err(RollcallError::Io(std::io::Error::other("eio")))
    }

    async fn persist_final(&self, record: &FinalizedAttendance) -> RollcallResult<()> {
        self.inner.persist_final(record).await
    }
}

#[tokio::test]
async fn test_finalize_fills_roster_and_closes_session() {
    let store = InMemoryAttendanceStore::new();
    store.put_class("C", "T1", ["S1", "S2", "S3"]).await;
    let session = SessionHandle::spawn();

    session.start("C".into()).await.unwrap();
    session
        .mark("S1".into(), AttendanceStatus::Present)
        .await
        .unwrap();

    let report = finalize(&session, &store).await.unwrap();
    assert_eq!(report.summary.present, 1);
    assert_eq!(report.summary.absent, 2);
    assert_eq!(report.summary.total, 3);
    assert_eq!(
        report.summary.present + report.summary.absent,
        report.record.marks.len()
    );

    let persisted = store.finalized().await;
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].class_id, "C");
    assert_eq!(persisted[0].marks["S1"], AttendanceStatus::Present);
    assert_eq!(persisted[0].marks["S2"], AttendanceStatus::Absent);
    assert_eq!(persisted[0].marks["S3"], AttendanceStatus::Absent);

    assert_eq!(session.status().await.unwrap().state, SessionPhase::None);
    let err = session
        .mark("S1".into(), AttendanceStatus::Present)
        .await
        .unwrap_err();
    assert!(err.is_session_state());
}

#[tokio::test]
async fn test_persistence_failure_restores_session_and_retry_succeeds() {
    let store = FlakyStore::new().await;
    let session = SessionHandle::spawn();
    session.start("C".into()).await.unwrap();
    session
        .mark("S2".into(), AttendanceStatus::Present)
        .await
        .unwrap();

    let err = finalize(&session, &store).await.unwrap_err();
    assert!(matches!(err, RollcallError::Persistence(_)));

    let status = session.status().await.unwrap();
    assert_eq!(status.state, SessionPhase::Active);
    assert_eq!(status.marked, Some(1));
    assert_eq!(
        session.status_of("S2".into()).await.unwrap(),
        Some(AttendanceStatus::Present)
    );

    store.heal();
    let report = finalize(&session, &store).await.unwrap();
    assert_eq!(report.summary.total, 3);
    assert_eq!(store.inner.finalized().await.len(), 1);
}

#[tokio::test]
async fn test_roster_failure_restores_session_like_a_write_failure() {
    let store = UnreadableRosterStore {
        inner: InMemoryAttendanceStore::new(),
    };
    store.inner.put_class("C", "T1", ["S1", "S2"]).await;
    let session = SessionHandle::spawn();
    session.start("C".into()).await.unwrap();
    session
        .mark("S1".into(), AttendanceStatus::Present)
        .await
        .unwrap();
    session
        .mark("S9".into(), AttendanceStatus::Absent)
        .await
        .unwrap();

    let err = finalize(&session, &store).await.unwrap_err();
    assert!(matches!(err, RollcallError::Persistence(_)), "{err}");
    assert!(err.to_string().contains("eio"), "{err}");

    let status = session.status().await.unwrap();
    assert_eq!(status.state, SessionPhase::Active);
    assert_eq!(status.class_id.as_deref(), Some("C"));
    assert_eq!(status.marked, Some(2));
    assert_eq!(
        session.status_of("S1".into()).await.unwrap(),
        Some(AttendanceStatus::Present)
    );
    assert_eq!(
        session.status_of("S9".into()).await.unwrap(),
        Some(AttendanceStatus::Absent)
    );
    assert!(store.inner.finalized().await.is_empty());

    // Still active, so marking keeps working.
    session
        .mark("S2".into(), AttendanceStatus::Present)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_finalize_without_session_is_state_error() {
    let store = InMemoryAttendanceStore::new();
    let session = SessionHandle::spawn();
    let err = finalize(&session, &store).await.unwrap_err();
    assert!(matches!(
        err,
        RollcallError::SessionState(SessionStateError::NoActiveSession)
    ));
    assert!(store.finalized().await.is_empty());
}

#[tokio::test]
async fn test_finalize_to_file_store() {
    let tmp = tempfile::tempdir().unwrap();
    let store = FileAttendanceStore::new(tmp.path().to_path_buf())
        .await
        .unwrap();
    tokio::fs::write(
        tmp.path().join("classes").join("C.json"),
        r#"{"owner":"T1","students":["S1","S2"]}"#,
    )
    .await
    .unwrap();

    let session = SessionHandle::spawn();
    session.start("C".into()).await.unwrap();
    session
        .mark("S1".into(), AttendanceStatus::Absent)
        .await
        .unwrap();
    let report = finalize(&session, &store).await.unwrap();

    assert_eq!(report.summary.absent, 2);
    let mut entries = tokio::fs::read_dir(tmp.path().join("attendance").join("C"))
        .await
        .unwrap();
    assert!(entries.next_entry().await.unwrap().is_some());
}
