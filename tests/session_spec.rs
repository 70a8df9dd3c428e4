use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use discipline::clock::{Clock, ManualClock};
use discipline::error::SessionError;
use discipline::models::*;
use discipline::session::SessionEngine;
use discipline::store::{KeyValueStore, MemoryStore, SqliteStore, SESSION_KEY};
use speculate2::speculate;
use uuid::Uuid;

fn fixed_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 30, 0).unwrap(),
    ))
}

fn complete_one(engine: &mut SessionEngine, clock: &ManualClock) -> HistoryEntry {
    engine.start_session(None).expect("Failed to start");
    clock.advance(Duration::minutes(25));
    engine.complete_session("").expect("Failed to complete")
}

speculate! {
    before {
        let store = MemoryStore::new();
        let clock = fixed_clock();
        let mut engine = SessionEngine::new(Arc::new(store.clone()), clock.clone())
            .expect("Failed to create session engine");
    }

    describe "initial state" {
        it "starts idle with empty chains" {
            assert_eq!(engine.status(), SessionStatus::Idle);
            assert_eq!(engine.state().chain_count, 0);
            assert_eq!(engine.state().aux_chain_count, 0);
            assert_eq!(engine.state().reservation_duration, DEFAULT_RESERVATION_MS);
            assert_eq!(engine.state().duration, DEFAULT_SESSION_MS);
            assert!(engine.history().is_empty());
            assert!(engine.state().is_consistent());
        }
    }

    describe "reserve" {
        it "moves idle to reserved and records the time" {
            engine.reserve().expect("Failed to reserve");

            assert_eq!(engine.status(), SessionStatus::Reserved);
            assert_eq!(engine.state().reservation_time, Some(clock.now()));
            assert!(engine.state().is_consistent());
        }

        it "rejects a second reservation" {
            engine.reserve().expect("Failed to reserve");
            let result = engine.reserve();
            assert!(matches!(
                result,
                Err(SessionError::InvalidTransition { action: "reserve", from: SessionStatus::Reserved })
            ));
        }

        it "persists the record" {
            engine.reserve().expect("Failed to reserve");
            let raw = store.get(SESSION_KEY).expect("Read failed").expect("Nothing saved");
            assert!(raw.contains("\"status\":\"reserved\""));
        }
    }

    describe "start_session" {
        it "honors a reservation within the window" {
            engine.reserve().expect("Failed to reserve");
            clock.advance(Duration::minutes(10));
            engine.start_session(None).expect("Failed to start");

            assert_eq!(engine.status(), SessionStatus::Active);
            assert_eq!(engine.state().aux_chain_count, 1);
            assert_eq!(engine.state().chain_count, 0);
            assert!(engine.state().reservation_time.is_none());
        }

        it "fails the session when the reservation expired" {
            complete_one(&mut engine, &clock);
            engine.reserve().expect("Failed to reserve");
            clock.advance(Duration::minutes(20));

            let result = engine.start_session(None);

            assert!(matches!(result, Err(SessionError::ReservationExpired)));
            assert_eq!(engine.status(), SessionStatus::Idle);
            assert_eq!(engine.state().chain_count, 0);
            assert_eq!(engine.state().aux_chain_count, 0);

            let reloaded = SessionEngine::new(Arc::new(store.clone()), clock.clone())
                .expect("Failed to reload");
            assert_eq!(reloaded.status(), SessionStatus::Idle);
            assert_eq!(reloaded.state().chain_count, 0);
        }

        it "starts directly from idle without touching the aux chain" {
            engine.start_session(Some(CurrentTask::new("Write report", Some(45))))
                .expect("Failed to start");

            assert_eq!(engine.state().aux_chain_count, 0);
            assert_eq!(engine.state().start_time, Some(clock.now()));
            let task = engine.state().current_task.as_ref().expect("No task");
            assert_eq!(task.title, "Write report");
            assert_eq!(task.minutes, Some(45));
        }

        it "rejects starting while a session runs" {
            engine.start_session(None).expect("Failed to start");
            assert!(matches!(engine.start_session(None), Err(SessionError::AlreadyActive)));

            engine.pause("knock").expect("Failed to pause");
            assert!(matches!(engine.start_session(None), Err(SessionError::AlreadyActive)));
            assert_eq!(engine.status(), SessionStatus::Paused);
        }
    }

    describe "pause and resume" {
        it "logs the exception and remembers the reason once" {
            engine.start_session(None).expect("Failed to start");
            engine.pause(" phone ").expect("Failed to pause");
            clock.advance(Duration::minutes(1));
            engine.resume().expect("Failed to resume");
            engine.pause("phone").expect("Failed to pause");

            let state = engine.state();
            assert_eq!(state.exceptions.len(), 2);
            assert_eq!(state.session_exceptions.len(), 2);
            assert_eq!(state.exceptions[0].reason, "phone");
            assert_eq!(state.saved_reasons, vec!["phone".to_string()]);
        }

        it "accumulates paused wall time" {
            engine.start_session(None).expect("Failed to start");
            engine.pause("tea").expect("Failed to pause");
            clock.advance(Duration::minutes(4));
            engine.resume().expect("Failed to resume");
            engine.pause("tea").expect("Failed to pause");
            clock.advance(Duration::minutes(3));
            engine.resume().expect("Failed to resume");

            assert_eq!(engine.state().total_paused_time, Duration::minutes(7).num_milliseconds());
            assert!(engine.state().pause_start_time.is_none());
        }

        it "rejects pause outside an active session" {
            let result = engine.pause("bored");
            assert!(matches!(
                result,
                Err(SessionError::InvalidTransition { action: "pause", from: SessionStatus::Idle })
            ));
            assert!(engine.state().exceptions.is_empty());
        }

        it "rejects resume unless paused" {
            engine.start_session(None).expect("Failed to start");
            assert!(matches!(
                engine.resume(),
                Err(SessionError::InvalidTransition { action: "resume", from: SessionStatus::Active })
            ));
        }
    }

    describe "complete_session" {
        it "records a history entry and extends the chain" {
            engine.start_session(Some(CurrentTask::new("Deep work", None)))
                .expect("Failed to start");
            clock.advance(Duration::minutes(10));
            engine.pause("phone").expect("Failed to pause");
            clock.advance(Duration::minutes(5));
            engine.resume().expect("Failed to resume");
            clock.advance(Duration::minutes(30));

            let entry = engine.complete_session("done").expect("Failed to complete");

            assert_eq!(entry.duration, Duration::minutes(40).num_milliseconds());
            assert_eq!(entry.duration_minutes(), 40);
            assert_eq!(entry.notes, "done");
            assert_eq!(entry.task.as_ref().map(|t| t.title.as_str()), Some("Deep work"));
            assert_eq!(entry.exceptions.len(), 1);
            assert_eq!(entry.end_time - entry.start_time, Duration::minutes(45));

            assert_eq!(engine.history().len(), 1);
            assert_eq!(engine.state().chain_count, 1);
            assert_eq!(engine.status(), SessionStatus::Idle);
            assert!(engine.state().current_task.is_none());
            assert!(engine.state().session_exceptions.is_empty());
            assert!(engine.state().is_consistent());
        }

        it "prepends newer entries" {
            let first = complete_one(&mut engine, &clock);
            let second = complete_one(&mut engine, &clock);

            assert_eq!(engine.history()[0].id, second.id);
            assert_eq!(engine.history()[1].id, first.id);
            assert_eq!(engine.state().chain_count, 2);
        }

        it "clamps a backwards clock to zero duration" {
            engine.start_session(None).expect("Failed to start");
            clock.advance(Duration::minutes(-5));
            let entry = engine.complete_session("").expect("Failed to complete");
            assert_eq!(entry.duration, 0);
        }

        it "rejects completing from idle or reserved" {
            assert!(matches!(
                engine.complete_session(""),
                Err(SessionError::InvalidTransition { action: "complete", from: SessionStatus::Idle })
            ));
            engine.reserve().expect("Failed to reserve");
            assert!(matches!(
                engine.complete_session(""),
                Err(SessionError::InvalidTransition { action: "complete", from: SessionStatus::Reserved })
            ));
            assert_eq!(engine.state().chain_count, 0);
        }
    }

    describe "fail" {
        it "zeroes both chains from any state" {
            engine.reserve().expect("Failed to reserve");
            engine.start_session(None).expect("Failed to start");
            engine.complete_session("").expect("Failed to complete");
            engine.start_session(None).expect("Failed to start");
            engine.pause("ugh").expect("Failed to pause");

            let reason = engine.fail("Gave up").expect("Failed to fail");

            assert_eq!(reason, "Gave up");
            assert_eq!(engine.status(), SessionStatus::Idle);
            assert_eq!(engine.state().chain_count, 0);
            assert_eq!(engine.state().aux_chain_count, 0);
            assert!(engine.state().pause_start_time.is_none());
            assert!(engine.state().start_time.is_none());
            assert_eq!(engine.history().len(), 1);
        }

        it "is accepted from idle" {
            engine.fail("nothing").expect("Failed to fail");
            assert_eq!(engine.status(), SessionStatus::Idle);
        }

        it "reset behaves like fail" {
            complete_one(&mut engine, &clock);
            engine.reset().expect("Failed to reset");
            assert_eq!(engine.state().chain_count, 0);
            assert_eq!(engine.history().len(), 1);
        }
    }

    describe "saved reasons" {
        it "adds and removes idempotently" {
            assert!(engine.add_reason("door").expect("Add failed"));
            assert!(!engine.add_reason("door").expect("Add failed"));
            assert!(!engine.add_reason("   ").expect("Add failed"));
            assert_eq!(engine.state().saved_reasons, vec!["door".to_string()]);

            assert!(engine.remove_reason("door").expect("Remove failed"));
            assert!(!engine.remove_reason("door").expect("Remove failed"));
            assert!(engine.state().saved_reasons.is_empty());
        }
    }

    describe "history notes" {
        it "updates notes by id" {
            let entry = complete_one(&mut engine, &clock);
            assert!(engine.update_history_note(entry.id, "revised").expect("Update failed"));
            assert_eq!(engine.history()[0].notes, "revised");
        }

        it "ignores unknown ids" {
            complete_one(&mut engine, &clock);
            assert!(!engine.update_history_note(Uuid::new_v4(), "x").expect("Update failed"));
            assert_eq!(engine.history()[0].notes, "");
        }
    }

    describe "sqlite persistence" {
        it "survives reopening the engine over the same database" {
            let db = SqliteStore::open_memory().expect("Failed to open database");
            db.migrate().expect("Failed to run migrations");

            let mut first = SessionEngine::new(Arc::new(db.clone()), clock.clone())
                .expect("Failed to create engine");
            complete_one(&mut first, &clock);

            let second = SessionEngine::new(Arc::new(db), clock.clone())
                .expect("Failed to reload engine");
            assert_eq!(second.state().chain_count, 1);
            assert_eq!(second.history().len(), 1);
        }

        it "reports a corrupt record instead of resetting it" {
            store.set(SESSION_KEY, "{not json").expect("Write failed");
            let result = SessionEngine::new(Arc::new(store.clone()), clock.clone());
            assert!(matches!(result, Err(SessionError::Store(_))));
        }
    }
}
