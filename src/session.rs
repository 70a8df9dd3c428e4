//! Focus-session state machine (CTDP).
//!
//! ```text
//!           reserve            start (within window)
//!   Idle ───────────▶ Reserved ─────────────────────▶ Active ◀──┐
//!    ▲ ▲                 │                             │  │     │ resume
//!    │ │  start (expired)│           pause(reason)     │  ▼     │
//!    │ └─────────────────┘                             │ Paused─┘
//!    │                                                 │  │
//!    └─────────── complete / fail ◀────────────────────┴──┘
//! ```
//!
//! `fail` is accepted from every state and resets both chains. An expired
//! reservation fails the session as a side effect of `start_session`.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::DisciplineConfig;
use crate::error::SessionError;
use crate::models::*;
use crate::store::{load_json, save_json, KeyValueStore, SESSION_KEY};

pub struct SessionEngine {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    state: SessionRecord,
}

impl SessionEngine {
    /// Load the persisted record, or start from an idle default.
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Result<Self, SessionError> {
        let state = load_json(store.as_ref(), SESSION_KEY)?.unwrap_or_default();
        Ok(Self {
            store,
            clock,
            state,
        })
    }

    /// Like [`SessionEngine::new`], with the window lengths taken from `config`.
    ///
    /// The lengths are only applied, and persisted right away, while idle. A
    /// reservation or session already under way keeps the lengths it started
    /// with.
    pub fn with_config(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: &DisciplineConfig,
    ) -> Result<Self, SessionError> {
        let mut engine = Self::new(store, clock)?;
        let (reservation, session) = (config.reservation_ms(), config.session_ms());
        if engine.state.status != SessionStatus::Idle {
            debug!(status = %engine.state.status, "session under way, keeping stored lengths");
            return Ok(engine);
        }
        if engine.state.reservation_duration != reservation || engine.state.duration != session {
            let mut next = engine.state.clone();
            next.reservation_duration = reservation;
            next.duration = session;
            engine.commit(next)?;
        }
        Ok(engine)
    }

    // ============================================================
    // Queries
    // ============================================================

    pub fn state(&self) -> &SessionRecord {
        &self.state
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.state.history
    }

    /// When the current reservation lapses.
    pub fn reservation_deadline(&self) -> Option<DateTime<Utc>> {
        self.state
            .reservation_time
            .map(|t| t + Duration::milliseconds(self.state.reservation_duration))
    }

    /// Time left in the grace window, floored at zero.
    pub fn reservation_remaining(&self) -> Option<Duration> {
        let deadline = self.reservation_deadline()?;
        let left = deadline - self.clock.now();
        Some(left.max(Duration::zero()))
    }

    /// True once a reservation has outlived its window.
    ///
    /// A polling front end should call [`SessionEngine::fail`] when this
    /// turns true.
    pub fn is_reservation_expired(&self) -> bool {
        match self.state.reservation_time {
            Some(reserved_at) if self.state.status == SessionStatus::Reserved => {
                elapsed_ms(reserved_at, self.clock.now()) > self.state.reservation_duration
            }
            _ => false,
        }
    }

    /// Focused time so far in the running session, excluding pauses.
    pub fn focused_elapsed(&self) -> Option<Duration> {
        let start = self.state.start_time?;
        let now = self.clock.now();
        let open_pause = self
            .state
            .pause_start_time
            .map(|p| elapsed_ms(p, now))
            .unwrap_or(0);
        let ms = elapsed_ms(start, now) - self.state.total_paused_time - open_pause;
        Some(Duration::milliseconds(ms.max(0)))
    }

    // ============================================================
    // Transitions
    // ============================================================

    pub fn reserve(&mut self) -> Result<&SessionRecord, SessionError> {
        if self.state.status != SessionStatus::Idle {
            return Err(self.invalid("reserve"));
        }

        let mut next = self.state.clone();
        next.status = SessionStatus::Reserved;
        next.reservation_time = Some(self.clock.now());
        self.commit(next)?;

        debug!(deadline = ?self.reservation_deadline(), "seat reserved");
        Ok(&self.state)
    }

    /// Sit down and start a session, honoring a reservation if one is open.
    pub fn start_session(
        &mut self,
        task: Option<CurrentTask>,
    ) -> Result<&SessionRecord, SessionError> {
        let now = self.clock.now();
        let mut next = self.state.clone();

        match self.state.status {
            SessionStatus::Active | SessionStatus::Paused => {
                return Err(SessionError::AlreadyActive);
            }
            SessionStatus::Reserved => {
                if self.is_reservation_expired() {
                    self.fail("Reservation expired")?;
                    return Err(SessionError::ReservationExpired);
                }
                next.aux_chain_count += 1;
            }
            SessionStatus::Idle => {}
        }

        next.status = SessionStatus::Active;
        next.start_time = Some(now);
        next.reservation_time = None;
        next.pause_start_time = None;
        next.total_paused_time = 0;
        next.session_exceptions.clear();
        next.current_task = task;
        self.commit(next)?;

        info!(
            aux_chain = self.state.aux_chain_count,
            task = ?self.state.current_task.as_ref().map(|t| &t.title),
            "session started"
        );
        Ok(&self.state)
    }

    /// Log an exception and pause the running session.
    pub fn pause(&mut self, reason: &str) -> Result<&SessionRecord, SessionError> {
        if self.state.status != SessionStatus::Active {
            return Err(self.invalid("pause"));
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(SessionError::ReasonRequired);
        }

        let now = self.clock.now();
        let entry = ExceptionEntry {
            time: now,
            reason: reason.to_string(),
        };

        let mut next = self.state.clone();
        next.exceptions.push(entry.clone());
        next.session_exceptions.push(entry);
        if !next.saved_reasons.iter().any(|r| r == reason) {
            next.saved_reasons.push(reason.to_string());
        }
        next.status = SessionStatus::Paused;
        next.pause_start_time = Some(now);
        self.commit(next)?;

        debug!(reason, "session paused");
        Ok(&self.state)
    }

    pub fn resume(&mut self) -> Result<&SessionRecord, SessionError> {
        if self.state.status != SessionStatus::Paused {
            return Err(self.invalid("resume"));
        }

        let mut next = self.state.clone();
        close_pause(&mut next, self.clock.now());
        next.status = SessionStatus::Active;
        self.commit(next)?;

        debug!(total_paused_ms = self.state.total_paused_time, "session resumed");
        Ok(&self.state)
    }

    /// Finish the session, record it in history and extend the main chain.
    pub fn complete_session(&mut self, notes: &str) -> Result<HistoryEntry, SessionError> {
        let Some(start_time) = self.state.start_time else {
            return Err(self.invalid("complete"));
        };
        if !matches!(
            self.state.status,
            SessionStatus::Active | SessionStatus::Paused
        ) {
            return Err(self.invalid("complete"));
        }

        let now = self.clock.now();
        let mut next = self.state.clone();
        close_pause(&mut next, now);

        let duration = (elapsed_ms(start_time, now) - next.total_paused_time).max(0);
        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            start_time,
            end_time: now,
            duration,
            notes: notes.to_string(),
            task: next.current_task.take(),
            exceptions: std::mem::take(&mut next.session_exceptions),
        };
        next.history.insert(0, entry.clone());
        next.chain_count += 1;
        next.clear_active();
        self.commit(next)?;

        info!(
            chain = self.state.chain_count,
            duration_min = entry.duration_minutes(),
            "session completed"
        );
        Ok(entry)
    }

    /// Break the chain from any state. Returns `reason` for reporting.
    pub fn fail(&mut self, reason: &str) -> Result<String, SessionError> {
        let mut next = self.state.clone();
        next.chain_count = 0;
        next.aux_chain_count = 0;
        next.clear_active();
        let prior = self.state.status;
        self.commit(next)?;

        warn!(reason, from = %prior, "session failed, chains reset");
        Ok(reason.to_string())
    }

    pub fn reset(&mut self) -> Result<String, SessionError> {
        self.fail("Manual reset")
    }

    // ============================================================
    // Reasons and history
    // ============================================================

    /// Returns true if the reason was new.
    pub fn add_reason(&mut self, reason: &str) -> Result<bool, SessionError> {
        let reason = reason.trim();
        if reason.is_empty() || self.state.saved_reasons.iter().any(|r| r == reason) {
            return Ok(false);
        }
        let mut next = self.state.clone();
        next.saved_reasons.push(reason.to_string());
        self.commit(next)?;
        Ok(true)
    }

    /// Returns true if the reason was present.
    pub fn remove_reason(&mut self, reason: &str) -> Result<bool, SessionError> {
        if !self.state.saved_reasons.iter().any(|r| r == reason) {
            return Ok(false);
        }
        let mut next = self.state.clone();
        next.saved_reasons.retain(|r| r != reason);
        self.commit(next)?;
        Ok(true)
    }

    /// Replace the notes of one history entry. Unknown ids are ignored.
    pub fn update_history_note(&mut self, id: Uuid, note: &str) -> Result<bool, SessionError> {
        let Some(index) = self.state.history.iter().position(|h| h.id == id) else {
            debug!(%id, "history entry not found, note not updated");
            return Ok(false);
        };
        let mut next = self.state.clone();
        next.history[index].notes = note.to_string();
        self.commit(next)?;
        Ok(true)
    }

    // ============================================================
    // Internals
    // ============================================================

    /// Persist `next`, then adopt it. On a store error nothing changes.
    fn commit(&mut self, next: SessionRecord) -> Result<(), SessionError> {
        debug_assert!(next.is_consistent(), "inconsistent session record");
        save_json(self.store.as_ref(), SESSION_KEY, &next)?;
        self.state = next;
        Ok(())
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            action,
            from: self.state.status,
        }
    }
}

/// Fold an open pause interval into `total_paused_time`.
fn close_pause(record: &mut SessionRecord, now: DateTime<Utc>) {
    if let Some(paused_at) = record.pause_start_time.take() {
        record.total_paused_time += elapsed_ms(paused_at, now).max(0);
    }
}

fn elapsed_ms(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_milliseconds()
}
