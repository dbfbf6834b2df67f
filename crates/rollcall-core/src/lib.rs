//! Core types and error definitions for Rollcall.
//!
//! This crate provides the foundational types shared across all Rollcall
//! crates: verified principals, attendance statuses, summary counts, the
//! unified error enum, and the identity verification seam.
//!
//! # Main types
//!
//! - [`RollcallError`]: Unified error enum for all Rollcall subsystems.
//! - [`RollcallResult`]: Convenience alias for `Result<T, RollcallError>`.
//! - [`Principal`]: A verified identity attached to a connection.
//! - [`AttendanceStatus`]: `present` or `absent`.
//! - [`Summary`]: Present/absent/total counts over a mark set.
//! - [`IdentityVerifier`]: Turns a bearer credential into a [`Principal`].

/// Error types.
pub mod error;

pub use error::{RollcallError, RollcallResult, SessionStateError};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque class identifier.
pub type ClassId = String;

/// Opaque student identifier.
pub type StudentId = String;

// --- Identity ---

/// The role a principal holds for the lifetime of its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The instructor running the session.
    Teacher,
    /// A participant whose attendance is recorded.
    Student,
}

impl Role {
    /// Lowercase wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verified identity: who is connected and in what capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Teacher or student identifier.
    pub id: String,
    /// Role granted by the verifier.
    pub role: Role,
}

impl Principal {
    /// Creates a teacher principal.
    pub fn teacher(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Teacher,
        }
    }

    /// Creates a student principal.
    pub fn student(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Student,
        }
    }

    /// Returns `true` if the principal holds the teacher role.
    pub fn is_teacher(&self) -> bool {
        self.role == Role::Teacher
    }
}

/// Verifies a bearer credential presented at connection time.
///
/// Implementations are consulted exactly once per connection (or HTTP
/// request); the returned principal is never re-derived afterwards.
pub trait IdentityVerifier: Send + Sync {
    /// Returns the principal for `credential`, or
    /// [`RollcallError::Authentication`] if it is unknown or malformed.
    fn verify(&self, credential: &str) -> RollcallResult<Principal>;
}

// --- Attendance ---

/// Attendance status recorded for a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    /// The student attended.
    Present,
    /// The student did not attend.
    Absent,
}

impl AttendanceStatus {
    /// Lowercase wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Present/absent/total counts over a set of marks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of students marked present.
    pub present: usize,
    /// Number of students marked absent.
    pub absent: usize,
    /// Number of marks counted.
    pub total: usize,
}

impl Summary {
    /// Counts the given statuses.
    pub fn from_statuses<'a>(statuses: impl IntoIterator<Item = &'a AttendanceStatus>) -> Self {
        statuses
            .into_iter()
            .fold(Summary::default(), |mut acc, status| {
                match status {
                    AttendanceStatus::Present => acc.present += 1,
                    AttendanceStatus::Absent => acc.absent += 1,
                }
                acc.total += 1;
                acc
            })
    }
}
