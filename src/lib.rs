//! Two self-discipline engines sharing one key-value store.
//!
//! - [`session::SessionEngine`]: a focus-session state machine that keeps a
//!   main chain of completed sessions and an auxiliary chain of honored
//!   reservations. Any failure resets both.
//! - [`tree::TreeEngine`]: a commitment tree where a node unlocks only once
//!   its parent has, rate limited by a daily quota, with base64 share codes
//!   for export and import.
//! - [`planner::TaskPlanner`]: reusable task groups a session can be started
//!   from.
//!
//! Both engines take their store and clock as trait objects so they can run
//! against SQLite in the CLI and against memory in tests.

pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod planner;
pub mod session;
pub mod store;
pub mod tree;
