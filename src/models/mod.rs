//! Domain models for discipline.
//!
//! # Core Concepts
//!
//! ## Focus sessions (CTDP)
//!
//! - [`SessionRecord`]: The single persisted record of the user's current focus
//!   session, streak counters, pause reasons and completed-session history.
//! - [`HistoryEntry`]: Append-only log entry written when a session completes.
//! - [`CurrentTask`]: Optional label attached to a session when it starts.
//! - [`TaskGroup`]: A named list of [`TaskTemplate`]s a session can be
//!   started from, seeded by hand or from [`TASK_PRESETS`].
//!
//! ## Commitment tree (RSIP)
//!
//! - [`CommitmentNode`]: A gated node in the commitment tree rooted at `"root"`.
//!   A node may only be unlocked once its parent is active or completed.
//! - [`DailyQuota`]: Rate limit on quota-consuming tree mutations.
//! - [`ImportedTreeSnapshot`]: A frozen copy of someone else's tree, kept for
//!   reference and never merged into the live tree.

mod history;
mod node;
mod session;
mod task;

pub use history::*;
pub use node::*;
pub use session::*;
pub use task::*;
