use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::CurrentTask;

/// A logged, reasoned interruption of a focus session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExceptionEntry {
    pub time: DateTime<Utc>,
    pub reason: String,
}

/// An append-only record of one completed focus session.
///
/// History entries are created only by a successful completion; failed
/// sessions leave no entry. Apart from `notes`, an entry never changes once
/// written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Focused time in milliseconds: wall time minus accumulated pauses.
    pub duration: i64,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub task: Option<CurrentTask>,
    /// Pauses taken during the session, oldest first.
    #[serde(default)]
    pub exceptions: Vec<ExceptionEntry>,
}

impl HistoryEntry {
    pub fn duration_minutes(&self) -> i64 {
        self.duration / 60_000
    }
}
