use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use tollgate_approval::{ApprovalLedger, ApprovalRecord, Decision, NewApproval};
use tollgate_core::{
    ApprovalId, Authorization, Capability, Event, EventBus, ExecutionContext, GateError,
    InvocationContext, Result, ToolCall, ToolExecutor, ToolResult,
};

use crate::registry::CapabilityRegistry;

/// How a gated call finally ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The tool ran and returned this result.
    Executed(ToolResult),
    /// The approval was denied; the tool never ran.
    Denied {
        approval_id: ApprovalId,
        decided_by: String,
        note: Option<String>,
    },
    /// The tool ran and the executor failed.
    Failed {
        tool: String,
        call_id: String,
        reason: String,
    },
}

impl Resolution {
    fn into_completed(self) -> Result<Invocation> {
        match self {
            Self::Executed(result) => Ok(Invocation::Completed(result)),
            Self::Failed {
                tool,
                call_id,
                reason,
            } => Err(GateError::ExecutionFailed {
                tool,
                call_id,
                reason,
            }),
            Self::Denied { approval_id, .. } => Err(GateError::Other(anyhow::anyhow!(
                "ungated call resolved through approval {approval_id}"
            ))),
        }
    }
}

/// What `invoke` returns right away.
#[derive(Debug)]
pub enum Invocation {
    Completed(ToolResult),
    AwaitingApproval(PendingInvocation),
}

/// A call parked on an approval. Cheap to clone; every clone observes the
/// same resolution.
#[derive(Debug, Clone)]
pub struct PendingInvocation {
    call_id: String,
    approval: ApprovalRecord,
    outcome: watch::Receiver<Option<Resolution>>,
}

impl PendingInvocation {
    /// The approval as it was when the call was parked.
    pub fn approval(&self) -> &ApprovalRecord {
        &self.approval
    }

    pub fn approval_id(&self) -> ApprovalId {
        self.approval.approval_id
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// The resolution, if the call has already been resumed.
    pub fn try_resolution(&self) -> Option<Resolution> {
        self.outcome.borrow().clone()
    }

    /// Wait until the approval is decided and the call has been resumed.
    pub async fn wait(mut self) -> Resolution {
        let resolved = self.outcome.wait_for(Option::is_some).await.map(|r| r.clone());
        match resolved {
            Ok(Some(resolution)) => resolution,
            _ => Resolution::Failed {
                tool: self.approval.tool_name.clone(),
                call_id: self.call_id,
                reason: "resume task ended without a resolution".into(),
            },
        }
    }
}

/// One logical invocation, keyed by call id. A slot lives exactly as long
/// as the task driving its call.
struct CallSlot {
    /// Tells this slot apart from a later one reusing the call id.
    generation: u64,
    /// Gated calls only; carries the approval id once it has been opened.
    approval: Option<watch::Receiver<Option<ApprovalId>>>,
    outcome: watch::Receiver<Option<Resolution>>,
}

type CallTable = Arc<Mutex<HashMap<String, CallSlot>>>;

/// Removes its slot when dropped, however the owning task ends.
struct SlotRelease {
    calls: CallTable,
    call_id: String,
    generation: u64,
}

impl Drop for SlotRelease {
    fn drop(&mut self) {
        let mut calls = self.calls.lock();
        if calls
            .get(&self.call_id)
            .is_some_and(|slot| slot.generation == self.generation)
        {
            calls.remove(&self.call_id);
        }
    }
}

/// Held by whoever created a slot; settling it releases the slot and wakes
/// every attached caller.
struct SlotOwner {
    release: SlotRelease,
    outcome: watch::Sender<Option<Resolution>>,
    approval: Option<watch::Sender<Option<ApprovalId>>>,
}

impl SlotOwner {
    fn settle(self, resolution: Resolution) {
        let Self {
            release, outcome, ..
        } = self;
        // Release first so a caller woken by the outcome can reuse the id.
        drop(release);
        outcome.send_replace(Some(resolution));
    }
}

/// Routes tool calls: validate, then either execute or park behind an approval.
pub struct Dispatcher {
    registry: Arc<CapabilityRegistry>,
    ledger: Arc<ApprovalLedger>,
    executor: Arc<dyn ToolExecutor>,
    events: Option<EventBus>,
    calls: CallTable,
    generations: AtomicU64,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        ledger: Arc<ApprovalLedger>,
        executor: Arc<dyn ToolExecutor>,
    ) -> Self {
        Self {
            registry,
            ledger,
            executor,
            events: None,
            calls: Arc::new(Mutex::new(HashMap::new())),
            generations: AtomicU64::new(0),
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn ledger(&self) -> &Arc<ApprovalLedger> {
        &self.ledger
    }

    /// Handle one tool call.
    ///
    /// Sensitive capabilities return [`Invocation::AwaitingApproval`] without
    /// blocking; the call resumes in the background once the approval is
    /// decided. A call id that is still in flight attaches to the existing
    /// invocation instead of starting a new one.
    ///
    /// Execution runs on its own task, so dropping the returned future does
    /// not abandon the call: it still completes and releases its id.
    pub async fn invoke(&self, call: ToolCall, ctx: InvocationContext) -> Result<Invocation> {
        let capability = self.registry.lookup(&call.tool_name)?.clone();
        self.registry.validate(&call.tool_name, &call.arguments)?;

        if capability.sensitive {
            return self
                .invoke_gated(call, ctx, &capability)
                .await
                .map(Invocation::AwaitingApproval);
        }

        let owner = match self.claim(&call.id, false) {
            Claim::Owner(owner) => owner,
            Claim::Attached(Attached::Gated { approval, outcome }) => {
                return self
                    .attach_gated(&call, approval, outcome)
                    .await
                    .map(Invocation::AwaitingApproval);
            }
            Claim::Attached(Attached::Running(outcome)) => {
                return wait_outcome(outcome, &call).await?.into_completed();
            }
        };

        self.publish(Event::ToolInvoked {
            call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            sensitive: false,
        });
        let outcome = owner.outcome.subscribe();
        let exec_ctx = ExecutionContext {
            call_id: call.id.clone(),
            invocation: ctx,
            authorization: None,
        };
        let executor = Arc::clone(&self.executor);
        let events = self.events.clone();
        let task_call = call.clone();
        tokio::spawn(async move {
            let resolution = execute(&*executor, &task_call, &exec_ctx, events.as_ref()).await;
            owner.settle(resolution);
        });

        wait_outcome(outcome, &call).await?.into_completed()
    }

    async fn invoke_gated(
        &self,
        call: ToolCall,
        ctx: InvocationContext,
        capability: &Capability,
    ) -> Result<PendingInvocation> {
        let owner = match self.claim(&call.id, true) {
            Claim::Owner(owner) => owner,
            Claim::Attached(Attached::Gated { approval, outcome }) => {
                return self.attach_gated(&call, approval, outcome).await;
            }
            Claim::Attached(Attached::Running(_)) => {
                return Err(GateError::Other(anyhow::anyhow!(
                    "call {} is already running without approval",
                    call.id
                )));
            }
        };

        self.publish(Event::ToolInvoked {
            call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            sensitive: true,
        });

        // The slot is claimed, so the ledger write happens outside the table
        // lock; callers attaching meanwhile wait on `owner.approval`.
        let new = NewApproval {
            agent_id: ctx.agent_id.clone(),
            session_id: ctx.session_id.clone(),
            tool_name: call.tool_name.clone(),
            arguments: call.arguments.clone(),
            user_id: ctx.user_id.clone(),
            is_sensitive: true,
            operation_type: capability.operation_type,
            call_id: Some(call.id.clone()),
        };
        let approval = match self.ledger.create(new) {
            Ok(record) => record,
            Err(GateError::DuplicateCallId { approval_id, .. }) => {
                info!(call_id = %call.id, %approval_id, "resuming existing approval");
                self.ledger.get(approval_id)?
            }
            Err(e) => return Err(e),
        };
        let watcher = self.ledger.subscribe(approval.approval_id)?;
        if let Some(opened) = &owner.approval {
            opened.send_replace(Some(approval.approval_id));
        }
        info!(
            call_id = %call.id,
            tool = %call.tool_name,
            approval_id = %approval.approval_id,
            "call awaiting approval"
        );

        // Run what was approved, which may predate this call.
        let approved_call = ToolCall::new(
            call.id.clone(),
            approval.tool_name.clone(),
            approval.arguments.clone(),
        );
        let outcome = owner.outcome.subscribe();
        tokio::spawn(resume(
            approved_call,
            ctx,
            watcher,
            owner,
            Arc::clone(&self.executor),
            self.events.clone(),
        ));

        Ok(PendingInvocation {
            call_id: call.id,
            approval,
            outcome,
        })
    }

    /// Attach to the call's live slot, or create one and become its owner.
    fn claim(&self, call_id: &str, gated: bool) -> Claim {
        let mut calls = self.calls.lock();
        if let Some(slot) = calls.get(call_id) {
            debug!(call_id, "attaching to in-flight call");
            return Claim::Attached(match &slot.approval {
                Some(approval) => Attached::Gated {
                    approval: approval.clone(),
                    outcome: slot.outcome.clone(),
                },
                None => Attached::Running(slot.outcome.clone()),
            });
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let (outcome_tx, outcome_rx) = watch::channel(None);
        let (approval_tx, approval_rx) = if gated {
            let (tx, rx) = watch::channel(None);
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };
        calls.insert(
            call_id.to_string(),
            CallSlot {
                generation,
                approval: approval_rx,
                outcome: outcome_rx,
            },
        );
        Claim::Owner(SlotOwner {
            release: SlotRelease {
                calls: Arc::clone(&self.calls),
                call_id: call_id.to_string(),
                generation,
            },
            outcome: outcome_tx,
            approval: approval_tx,
        })
    }

    async fn attach_gated(
        &self,
        call: &ToolCall,
        mut approval: watch::Receiver<Option<ApprovalId>>,
        outcome: watch::Receiver<Option<Resolution>>,
    ) -> Result<PendingInvocation> {
        let opened = approval.wait_for(Option::is_some).await.map(|id| *id);
        let Ok(Some(approval_id)) = opened else {
            return Err(GateError::Other(anyhow::anyhow!(
                "call {} failed to open its approval",
                call.id
            )));
        };
        Ok(PendingInvocation {
            call_id: call.id.clone(),
            approval: self.ledger.get(approval_id)?,
            outcome,
        })
    }

    /// Calls currently holding a slot: running, or parked on an approval.
    /// Resolved calls release their slot, so a later invoke with the same
    /// id starts afresh.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }

    fn publish(&self, event: Event) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

enum Attached {
    Gated {
        approval: watch::Receiver<Option<ApprovalId>>,
        outcome: watch::Receiver<Option<Resolution>>,
    },
    Running(watch::Receiver<Option<Resolution>>),
}

enum Claim {
    Attached(Attached),
    /// This caller created the slot and drives the call.
    Owner(SlotOwner),
}

async fn wait_outcome(
    mut rx: watch::Receiver<Option<Resolution>>,
    call: &ToolCall,
) -> Result<Resolution> {
    let resolved = rx.wait_for(Option::is_some).await.map(|r| r.clone());
    match resolved {
        Ok(Some(resolution)) => Ok(resolution),
        _ => Err(GateError::ExecutionFailed {
            tool: call.tool_name.clone(),
            call_id: call.id.clone(),
            reason: "call ended without a resolution".into(),
        }),
    }
}

async fn execute(
    executor: &dyn ToolExecutor,
    call: &ToolCall,
    ctx: &ExecutionContext,
    events: Option<&EventBus>,
) -> Resolution {
    let resolution = match executor.execute(call, ctx).await {
        Ok(result) => {
            debug!(call_id = %call.id, tool = %call.tool_name, is_error = result.is_error, "tool executed");
            Resolution::Executed(result)
        }
        Err(e) => {
            warn!(call_id = %call.id, tool = %call.tool_name, error = %e, "tool execution failed");
            Resolution::Failed {
                tool: call.tool_name.clone(),
                call_id: call.id.clone(),
                reason: e.to_string(),
            }
        }
    };

    if let Some(events) = events {
        events.publish(Event::ToolCompleted {
            call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            is_error: !matches!(&resolution, Resolution::Executed(r) if !r.is_error),
        });
    }
    resolution
}

/// Park until the approval is decided, then run or drop the call.
async fn resume(
    call: ToolCall,
    ctx: InvocationContext,
    mut watcher: watch::Receiver<ApprovalRecord>,
    owner: SlotOwner,
    executor: Arc<dyn ToolExecutor>,
    events: Option<EventBus>,
) {
    let decided = watcher.wait_for(|r| !r.is_pending()).await.map(|r| r.clone());
    let record = match decided {
        Ok(record) => record,
        Err(_) => {
            warn!(call_id = %call.id, "approval ledger closed while call was pending");
            owner.settle(Resolution::Failed {
                tool: call.tool_name.clone(),
                call_id: call.id.clone(),
                reason: "approval ledger closed before a decision".into(),
            });
            return;
        }
    };

    let decided_by = record.decided_by.clone().unwrap_or_default();
    let resolution = if record.decision == Decision::Approved {
        let ctx = ExecutionContext {
            call_id: call.id.clone(),
            invocation: ctx,
            authorization: Some(Authorization {
                approval_id: record.approval_id,
                decided_by,
                note: record.note.clone(),
            }),
        };
        execute(&*executor, &call, &ctx, events.as_ref()).await
    } else {
        info!(call_id = %call.id, approval_id = %record.approval_id, "call dropped after denial");
        Resolution::Denied {
            approval_id: record.approval_id,
            decided_by,
            note: record.note.clone(),
        }
    };
    owner.settle(resolution);
}
