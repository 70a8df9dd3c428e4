use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::history::{ExceptionEntry, HistoryEntry};
use super::task::CurrentTask;

/// Default grace window between reserving a seat and sitting down.
pub const DEFAULT_RESERVATION_MS: i64 = 15 * 60 * 1000;

/// Default planned length of a focus session.
pub const DEFAULT_SESSION_MS: i64 = 60 * 60 * 1000;

/// The persisted state of the focus-session protocol.
///
/// There is exactly one record per user. It carries both the ephemeral state
/// of the session in progress (timestamps, pauses, task) and the long-lived
/// counters and history that survive across sessions.
///
/// # Field invariants
/// - `reservation_time` is set iff `status == Reserved`.
/// - `pause_start_time` is set iff `status == Paused`.
/// - `start_time` is set iff `status` is `Active` or `Paused`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionRecord {
    pub status: SessionStatus,
    /// Main chain: consecutive completed sessions.
    pub chain_count: u32,
    /// Reservation chain: consecutive reservations honored within the window.
    pub aux_chain_count: u32,
    pub start_time: Option<DateTime<Utc>>,
    pub reservation_time: Option<DateTime<Utc>>,
    pub pause_start_time: Option<DateTime<Utc>>,
    /// Grace window in milliseconds.
    pub reservation_duration: i64,
    /// Planned session length in milliseconds. Informational only.
    pub duration: i64,
    /// Milliseconds spent paused during the current session.
    pub total_paused_time: i64,
    pub current_task: Option<CurrentTask>,
    /// Every pause ever taken, across all sessions.
    pub exceptions: Vec<ExceptionEntry>,
    /// Pauses taken during the current session.
    pub session_exceptions: Vec<ExceptionEntry>,
    /// Distinct pause reasons in first-seen order.
    pub saved_reasons: Vec<String>,
    /// Completed sessions, newest first.
    pub history: Vec<HistoryEntry>,
}

impl Default for SessionRecord {
    fn default() -> Self {
        Self {
            status: SessionStatus::Idle,
            chain_count: 0,
            aux_chain_count: 0,
            start_time: None,
            reservation_time: None,
            pause_start_time: None,
            reservation_duration: DEFAULT_RESERVATION_MS,
            duration: DEFAULT_SESSION_MS,
            total_paused_time: 0,
            current_task: None,
            exceptions: Vec::new(),
            session_exceptions: Vec::new(),
            saved_reasons: Vec::new(),
            history: Vec::new(),
        }
    }
}

impl SessionRecord {
    /// Clear every field that belongs to the session in progress.
    ///
    /// Counters, the global exception log, saved reasons and history are kept.
    pub(crate) fn clear_active(&mut self) {
        self.status = SessionStatus::Idle;
        self.start_time = None;
        self.reservation_time = None;
        self.pause_start_time = None;
        self.total_paused_time = 0;
        self.current_task = None;
        self.session_exceptions.clear();
    }

    /// Check the per-status field invariants.
    pub fn is_consistent(&self) -> bool {
        let reserved = self.status == SessionStatus::Reserved;
        let paused = self.status == SessionStatus::Paused;
        let running = matches!(self.status, SessionStatus::Active | SessionStatus::Paused);

        self.reservation_time.is_some() == reserved
            && self.pause_start_time.is_some() == paused
            && self.start_time.is_some() == running
            && self.total_paused_time >= 0
    }
}

/// The status of the focus-session state machine.
///
/// - `Idle`: No session; the initial and terminal state
/// - `Reserved`: A seat is reserved and the grace window is running
/// - `Active`: The user is in the seat
/// - `Paused`: The session is interrupted by a logged exception
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Reserved,
    Active,
    Paused,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Reserved => "reserved",
            Self::Active => "active",
            Self::Paused => "paused",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_record_is_idle_and_consistent() {
        let record = SessionRecord::default();
        assert_eq!(record.status, SessionStatus::Idle);
        assert_eq!(record.reservation_duration, DEFAULT_RESERVATION_MS);
        assert!(record.is_consistent());
    }

    #[test]
    fn record_uses_camel_case_keys() {
        let json = serde_json::to_value(SessionRecord::default()).unwrap();
        assert!(json.get("chainCount").is_some());
        assert!(json.get("auxChainCount").is_some());
        assert!(json.get("totalPausedTime").is_some());
        assert_eq!(json["status"], "idle");
    }

    #[test]
    fn partial_blob_fills_in_defaults() {
        let record: SessionRecord =
            serde_json::from_str(r#"{"chainCount":4,"status":"idle"}"#).unwrap();
        assert_eq!(record.chain_count, 4);
        assert_eq!(record.reservation_duration, DEFAULT_RESERVATION_MS);
        assert!(record.history.is_empty());
    }

    #[test]
    fn status_serializes_as_display_name() {
        for status in [
            SessionStatus::Idle,
            SessionStatus::Reserved,
            SessionStatus::Active,
            SessionStatus::Paused,
        ] {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, status.to_string());
        }
    }
}
