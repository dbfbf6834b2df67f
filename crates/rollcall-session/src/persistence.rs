use crate::session::Marks;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rollcall_core::{ClassId, RollcallError, RollcallResult, StudentId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use tokio::sync::RwLock;

/// A class as the durable store knows it: who owns it and who is enrolled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassRecord {
    /// Teacher id allowed to start sessions for the class.
    pub owner: String,
    /// Enrolled students.
    #[serde(default)]
    pub students: BTreeSet<StudentId>,
}

/// One finalized session, written as a single batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedAttendance {
    /// Class the session was opened for.
    pub class_id: ClassId,
    /// When the session started. Keys the record.
    pub started_at: DateTime<Utc>,
    /// When finalize built the batch.
    pub finalized_at: DateTime<Utc>,
    /// Reconciled marks: every roster student plus any off-roster marks.
    pub marks: Marks,
}

/// The durable store as seen from the session core.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Owner (teacher id) of a class, or `None` if the class is unknown.
    async fn class_owner(&self, class_id: &str) -> RollcallResult<Option<String>>;

    /// Students enrolled in a class. Unknown classes have an empty roster.
    async fn roster(&self, class_id: &str) -> RollcallResult<BTreeSet<StudentId>>;

    /// Write the finalized mark set. All-or-nothing.
    async fn persist_final(&self, record: &FinalizedAttendance) -> RollcallResult<()>;
}

/// In-memory store for tests and demos.
#[derive(Default)]
pub struct InMemoryAttendanceStore {
    classes: RwLock<HashMap<ClassId, ClassRecord>>,
    finalized: RwLock<Vec<FinalizedAttendance>>,
}

impl InMemoryAttendanceStore {
    /// Empty store with no classes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a class.
    pub async fn put_class(
        &self,
        class_id: impl Into<ClassId>,
        owner: impl Into<String>,
        students: impl IntoIterator<Item = impl Into<StudentId>>,
    ) {
        let record = ClassRecord {
            owner: owner.into(),
            students: students.into_iter().map(Into::into).collect(),
        };
        self.classes.write().await.insert(class_id.into(), record);
    }

    /// Every batch persisted so far, oldest first.
    pub async fn finalized(&self) -> Vec<FinalizedAttendance> {
        self.finalized.read().await.clone()
    }
}

#[async_trait]
impl AttendanceStore for InMemoryAttendanceStore {
    async fn class_owner(&self, class_id: &str) -> RollcallResult<Option<String>> {
        Ok(self
            .classes
            .read()
            .await
            .get(class_id)
            .map(|c| c.owner.clone()))
    }

    async fn roster(&self, class_id: &str) -> RollcallResult<BTreeSet<StudentId>> {
        Ok(self
            .classes
            .read()
            .await
            .get(class_id)
            .map(|c| c.students.clone())
            .unwrap_or_default())
    }

    async fn persist_final(&self, record: &FinalizedAttendance) -> RollcallResult<()> {
        self.finalized.write().await.push(record.clone());
        Ok(())
    }
}

/// JSON-file store.
///
/// Layout under the root directory:
/// - `classes/<classId>.json` holds a [`ClassRecord`]
/// - `attendance/<classId>/<startedAt>.json` holds a [`FinalizedAttendance`]
///
/// Records are keyed by the session start time, so writing the same session
/// twice overwrites rather than duplicates.
pub struct FileAttendanceStore {
    dir: PathBuf,
}

impl FileAttendanceStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub async fn new(dir: PathBuf) -> RollcallResult<Self> {
        tokio::fs::create_dir_all(dir.join("classes")).await?;
        tokio::fs::create_dir_all(dir.join("attendance")).await?;
        Ok(Self { dir })
    }

    async fn load_class(&self, class_id: &str) -> RollcallResult<Option<ClassRecord>> {
        // An id that cannot name a file cannot name a stored class either.
        if check_path_segment(class_id).is_err() {
            return Ok(None);
        }
        let path = self.dir.join("classes").join(format!("{class_id}.json"));
        if !path.exists() {
            return Ok(None);
        }
        let data = tokio::fs::read_to_string(path).await?;
        let record = serde_json::from_str(&data).map_err(|e| {
            RollcallError::Persistence(format!("Failed to parse class '{class_id}': {e}"))
        })?;
        Ok(Some(record))
    }
}

#[async_trait]
impl AttendanceStore for FileAttendanceStore {
    async fn class_owner(&self, class_id: &str) -> RollcallResult<Option<String>> {
        Ok(self.load_class(class_id).await?.map(|c| c.owner))
    }

    async fn roster(&self, class_id: &str) -> RollcallResult<BTreeSet<StudentId>> {
        Ok(self
            .load_class(class_id)
            .await?
            .map(|c| c.students)
            .unwrap_or_default())
    }

    async fn persist_final(&self, record: &FinalizedAttendance) -> RollcallResult<()> {
        check_path_segment(&record.class_id)?;
        let dir = self.dir.join("attendance").join(&record.class_id);
        tokio::fs::create_dir_all(&dir).await.map_err(persist_err)?;

        let name = record_file_stem(&record.started_at);
        let path = dir.join(format!("{name}.json"));
        let tmp = dir.join(format!("{name}.json.tmp"));
        let json = serde_json::to_string_pretty(record)?;
        // Write-then-rename so readers never see a partial batch.
        tokio::fs::write(&tmp, json).await.map_err(persist_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(persist_err)?;
        Ok(())
    }
}

/// Session start as RFC 3339 UTC, e.g. `2026-01-05T09:00:00.000000Z`.
fn record_file_stem(started_at: &DateTime<Utc>) -> String {
    started_at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn persist_err(e: std::io::Error) -> RollcallError {
    RollcallError::Persistence(e.to_string())
}

fn check_path_segment(id: &str) -> RollcallResult<()> {
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']) {
        return Err(RollcallError::Persistence(format!(
            "Invalid class id '{id}'"
        )));
    }
    Ok(())
}
