//! # tollgate-approval
//!
//! The approval ledger: one record per gated invocation, decided exactly once
//! by a human or policy, optionally persisted to SQLite so decisions survive
//! restarts and can be made from another process.

pub mod expiry;
pub mod ledger;
pub mod record;
pub mod store;

pub use expiry::{SweepPolicy, TIMEOUT_DECIDER, expire_pending, spawn_sweeper};
pub use ledger::ApprovalLedger;
pub use record::{ApprovalRecord, Decision, DecisionRequest, NewApproval, Verdict};
pub use store::{ApprovalStore, SqliteApprovalStore};
