//! Single-leader coordination for cooperating gauge processes.
//!
//! # Purpose
//!
//! - Elect at most one process (per shared store) to run periodic background
//!   work such as provider balance refreshes.
//! - Tolerate a store with no atomic compare-and-swap and processes that die
//!   without cleanup.
//!
//! # Mental model
//!
//! - Processes never talk to each other. The only shared state is one
//!   [`LeaseRecord`] under [`LEASE_KEY`].
//! - A lease is valid until `expires_at`. The holder renews it every round;
//!   a dead holder's lease simply runs out, bounding the takeover gap to one
//!   lease duration plus one round.
//! - Claims are confirmed by reading them back after a randomized delay. The
//!   store is last-write-wins, so every racer reads back the same record and
//!   agrees on the winner.
//! - Followers keep serving user-triggered work; only periodic tasks are gated.
//!
//! # Invariants
//!
//! 1. Periodic tasks MUST only run after a round that ended in [`LeaderState::Leader`].
//!    - Enforced in: `LeaderElection::tick`
//!    - Tested by: `election::tests::follower_never_runs_tasks`
//! 2. A store error MUST never yield leadership for that round.
//!    - Enforced in: `LeaderElection::elect`, `LeaderElection::claim`, `LeaderElection::renew`
//!    - Tested by: `election::tests::store_outage_demotes_to_unknown`
//! 3. A failing or panicking task MUST NOT stop other tasks or deregister itself.
//!    - Enforced in: `LeaderElection::run_tasks`
//!    - Tested by: `election::tests::task_failure_is_contained`

mod election;
mod error;
mod record;
mod task;

pub use election::{LeaderElection, LeaderState, LeaseConfig};
pub use error::LeaseError;
pub use record::{LEASE_KEY, LeaseRecord};
pub use task::{PeriodicTask, TaskId, task_fn};
