//! Session lifecycle for Rollcall: the single live attendance session,
//! the actor that owns it, the durable store interface, and finalize.

/// Task that owns the session and serializes access to it.
pub mod actor;
/// Durable store interface and implementations.
pub mod persistence;
/// Roster reconciliation and the finalize sequence.
pub mod reconcile;
/// Session record and status types.
pub mod session;
/// Session lifecycle state machine.
pub mod store;

pub use actor::SessionHandle;
pub use persistence::{
    AttendanceStore, ClassRecord, FileAttendanceStore, FinalizedAttendance,
    InMemoryAttendanceStore,
};
pub use reconcile::{finalize, reconcile, FinalizeReport};
pub use session::{FinalizeSnapshot, Marks, Session, SessionPhase, SessionStatus};
pub use store::SessionStore;
