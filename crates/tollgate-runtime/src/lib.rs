//! # tollgate-runtime
//!
//! Capability dispatch: a frozen registry of tool descriptors, and the
//! dispatcher that validates calls and either runs them or parks them behind
//! an approval.
//!
//! ```text
//!   ToolCall ──► Registry::lookup ──► validate ──┬─ not sensitive ──► ToolExecutor
//!                                                │
//!                                                └─ sensitive ──► ApprovalLedger::create
//!                                                                   │ (watch)
//!                                                      approved ◄───┴───► denied
//!                                                         │                 │
//!                                                   ToolExecutor      Resolution::Denied
//! ```

pub mod dispatcher;
pub mod registry;

pub use dispatcher::{Dispatcher, Invocation, PendingInvocation, Resolution};
pub use registry::CapabilityRegistry;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use tollgate_approval::{ApprovalLedger, SqliteApprovalStore, SweepPolicy, spawn_sweeper};
use tollgate_config::GateConfig;
use tollgate_core::{EventBus, Result, ToolExecutor};
use tollgate_skills::{FsSkillStore, SkillResolver};

/// The wired-up engine: one registry, ledger, resolver and dispatcher, shared
/// by `Arc`.
pub struct Runtime {
    pub registry: Arc<CapabilityRegistry>,
    pub ledger: Arc<ApprovalLedger>,
    pub skills: Arc<SkillResolver>,
    pub dispatcher: Arc<Dispatcher>,
    pub events: EventBus,
    sweep: Option<SweepPolicy>,
}

impl Runtime {
    pub fn from_config(config: &GateConfig, executor: Arc<dyn ToolExecutor>) -> Result<Self> {
        let events = EventBus::default();

        let registry = Arc::new(build_registry(config)?);
        let ledger = Arc::new(open_ledger(config)?.with_events(events.clone()));
        let skills = Arc::new(build_resolver(config).with_events(events.clone()));
        let dispatcher = Arc::new(
            Dispatcher::new(Arc::clone(&registry), Arc::clone(&ledger), executor)
                .with_events(events.clone()),
        );

        let sweep = sweep_policy(config, ledger.is_persistent());
        info!(
            tools = registry.len(),
            persistent = ledger.is_persistent(),
            skill_dirs = config.skills.dirs.len(),
            sweeper = sweep.is_some(),
            "runtime ready"
        );

        Ok(Self {
            registry,
            ledger,
            skills,
            dispatcher,
            events,
            sweep,
        })
    }

    /// Start the background approval sweeper if the configuration calls for
    /// one. Must be called inside a tokio runtime.
    pub fn spawn_sweeper(&self) -> Option<JoinHandle<()>> {
        self.sweep
            .map(|policy| spawn_sweeper(Arc::clone(&self.ledger), policy))
    }
}

pub fn build_registry(config: &GateConfig) -> Result<CapabilityRegistry> {
    CapabilityRegistry::from_config(&config.tools, config.dispatch.strict_arguments)
}

/// SQLite-backed when `ledger.db_path` is set, in-memory otherwise.
pub fn open_ledger(config: &GateConfig) -> Result<ApprovalLedger> {
    match &config.ledger.db_path {
        Some(path) => ApprovalLedger::open(Box::new(SqliteApprovalStore::open(path)?)),
        None => Ok(ApprovalLedger::in_memory()),
    }
}

pub fn build_resolver(config: &GateConfig) -> SkillResolver {
    SkillResolver::new(Arc::new(FsSkillStore::from_dirs(config.skills.dirs.clone())))
}

/// A sweeper is needed to expire approvals, or to pick up decisions other
/// processes write to a shared database.
fn sweep_policy(config: &GateConfig, persistent: bool) -> Option<SweepPolicy> {
    let max_age = (config.ledger.timeout_secs > 0)
        .then(|| Duration::from_secs(config.ledger.timeout_secs));
    if max_age.is_none() && !persistent {
        return None;
    }
    Some(SweepPolicy {
        interval: Duration::from_secs(config.ledger.sweep_interval_secs.max(1)),
        max_age,
    })
}
