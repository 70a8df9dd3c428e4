//! Error types for the engines and their persistence port.

use thiserror::Error;

use crate::models::SessionStatus;

/// Persistence port failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored value for '{key}' is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize value: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Could not determine data directory")]
    NoDataDir,
}

/// Focus-session state machine errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Cannot {action} while {from}")]
    InvalidTransition {
        action: &'static str,
        from: SessionStatus,
    },

    #[error("Session already active")]
    AlreadyActive,

    #[error("Reservation expired")]
    ReservationExpired,

    #[error("A reason is required to pause")]
    ReasonRequired,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Commitment tree engine errors.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Daily quota exceeded: only one node may be unlocked or added per day")]
    DailyQuotaExceeded,

    #[error("Parent of '{0}' must be unlocked first")]
    ParentNotUnlocked(String),

    #[error("Cannot move '{node}' under its own descendant '{new_parent}'")]
    CycleRejected { node: String, new_parent: String },

    #[error("Invalid share code: {0}")]
    InvalidImportFormat(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Imported tree not found: {0}")]
    SnapshotNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Task group errors.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("Task group not found: {0}")]
    GroupNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("A group name is required")]
    NameRequired,

    #[error("A task title is required")]
    TitleRequired,

    #[error("No preset at index {0}")]
    UnknownPreset(usize),

    #[error(transparent)]
    Store(#[from] StoreError),
}
