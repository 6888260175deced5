use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tollgate_core::{ApprovalId, Event, EventBus, GateError, Result};

use crate::record::{ApprovalRecord, DecisionRequest, NewApproval, Verdict};
use crate::store::ApprovalStore;

/// Single source of truth for approval records.
///
/// Each record lives in a `watch` channel: the sender holds the current
/// state and anyone awaiting a decision holds a receiver. All transitions go
/// through the write lock, so `decide` is linearizable per approval id and the
/// winning record is published before the lock is released.
pub struct ApprovalLedger {
    state: RwLock<LedgerState>,
    store: Option<Box<dyn ApprovalStore>>,
    events: Option<EventBus>,
}

#[derive(Default)]
struct LedgerState {
    records: HashMap<ApprovalId, watch::Sender<ApprovalRecord>>,
    /// Creation order.
    order: Vec<ApprovalId>,
    /// Most recent approval per call id.
    by_call: HashMap<String, ApprovalId>,
}

impl LedgerState {
    fn insert(&mut self, record: ApprovalRecord) {
        let id = record.approval_id;
        if let Some(call_id) = &record.call_id {
            self.by_call.insert(call_id.clone(), id);
        }
        self.order.push(id);
        self.records.insert(id, watch::Sender::new(record));
    }

    fn current(&self, id: &ApprovalId) -> Option<ApprovalRecord> {
        self.records.get(id).map(|tx| tx.borrow().clone())
    }

    fn collect(&self, mut keep: impl FnMut(&ApprovalRecord) -> bool) -> Vec<ApprovalRecord> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .map(|tx| tx.borrow().clone())
            .filter(|r| keep(r))
            .collect()
    }
}

impl ApprovalLedger {
    /// A ledger that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            store: None,
            events: None,
        }
    }

    /// A ledger backed by `store`, preloaded with every persisted record.
    pub fn open(store: Box<dyn ApprovalStore>) -> Result<Self> {
        let mut state = LedgerState::default();
        let records = store.load_all()?;
        let pending = records.iter().filter(|r| r.is_pending()).count();
        for record in records {
            state.insert(record);
        }
        info!(records = state.order.len(), pending, "approval ledger loaded");

        Ok(Self {
            state: RwLock::new(state),
            store: Some(store),
            events: None,
        })
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    /// Open a pending approval.
    ///
    /// Fails with [`GateError::DuplicateCallId`] if the call id already has an
    /// approval that is still pending.
    pub fn create(&self, new: NewApproval) -> Result<ApprovalRecord> {
        let mut state = self.state.write();

        if let Some(call_id) = &new.call_id {
            if let Some(existing) = state.by_call.get(call_id).copied() {
                if state.current(&existing).is_some_and(|r| r.is_pending()) {
                    debug!(call_id = %call_id, approval_id = %existing, "call already awaiting approval");
                    return Err(GateError::DuplicateCallId {
                        call_id: call_id.clone(),
                        approval_id: existing,
                    });
                }
            }
        }

        let record = new.into_record(Uuid::new_v4(), Utc::now());
        if let Some(store) = &self.store {
            store.insert(&record)?;
        }
        state.insert(record.clone());
        drop(state);

        info!(
            approval_id = %record.approval_id,
            tool = %record.tool_name,
            agent = %record.agent_id,
            call_id = ?record.call_id,
            "approval requested"
        );
        if let Some(events) = &self.events {
            events.publish(Event::ApprovalRequested {
                approval_id: record.approval_id,
                call_id: record.call_id.clone(),
                tool_name: record.tool_name.clone(),
            });
        }

        Ok(record)
    }

    /// Record the decision for a pending approval. Exactly one decision per
    /// approval ever succeeds; later ones fail with
    /// [`GateError::ApprovalAlreadyDecided`] and leave the record untouched.
    pub fn decide(
        &self,
        id: ApprovalId,
        verdict: Verdict,
        decided_by: &str,
        note: Option<String>,
    ) -> Result<ApprovalRecord> {
        let state = self.state.write();
        let tx = state
            .records
            .get(&id)
            .ok_or_else(|| GateError::ApprovalNotFound(id.to_string()))?;

        let current = tx.borrow().clone();
        if !current.is_pending() {
            return Err(already_decided(&current));
        }

        let updated = current.decided(verdict, decided_by.to_string(), note, Utc::now());

        if let Some(store) = &self.store {
            if !store.record_decision(&updated)? {
                // Another process won on the shared database.
                return match store.get(id)? {
                    Some(stored) if !stored.is_pending() => {
                        tx.send_replace(stored.clone());
                        drop(state);
                        // First time this process sees the decision.
                        self.announce(&stored);
                        Err(already_decided(&stored))
                    }
                    _ => Err(GateError::Storage(format!(
                        "approval {id} could not be updated but is not decided in the store"
                    ))),
                };
            }
        }

        tx.send_replace(updated.clone());
        drop(state);

        self.announce(&updated);
        Ok(updated)
    }

    /// The decision submission interface.
    pub fn submit(&self, request: DecisionRequest) -> Result<ApprovalRecord> {
        let id = Self::parse_id(&request.approval_id)?;
        self.decide(id, request.decision, &request.decided_by, request.note)
    }

    /// Parse an externally supplied approval id. A malformed id can never
    /// name an approval, so it is reported as not found.
    pub fn parse_id(raw: &str) -> Result<ApprovalId> {
        Uuid::parse_str(raw.trim()).map_err(|_| GateError::ApprovalNotFound(raw.to_string()))
    }

    pub fn get(&self, id: ApprovalId) -> Result<ApprovalRecord> {
        self.state
            .read()
            .current(&id)
            .ok_or_else(|| GateError::ApprovalNotFound(id.to_string()))
    }

    /// The most recent approval opened for `call_id`.
    pub fn find_by_call_id(&self, call_id: &str) -> Option<ApprovalRecord> {
        let state = self.state.read();
        state.by_call.get(call_id).and_then(|id| state.current(id))
    }

    /// Every record, oldest first.
    pub fn list(&self) -> Vec<ApprovalRecord> {
        self.state.read().collect(|_| true)
    }

    pub fn list_by_agent(&self, agent_id: &str) -> Vec<ApprovalRecord> {
        self.state.read().collect(|r| r.agent_id == agent_id)
    }

    pub fn list_by_session(&self, session_id: &str) -> Vec<ApprovalRecord> {
        self.state
            .read()
            .collect(|r| r.session_id.as_deref() == Some(session_id))
    }

    pub fn list_pending(&self) -> Vec<ApprovalRecord> {
        self.state.read().collect(|r| r.is_pending())
    }

    /// Watch an approval. The receiver always holds the latest state of the
    /// record, so a decision made before subscribing is not missed.
    pub fn subscribe(&self, id: ApprovalId) -> Result<watch::Receiver<ApprovalRecord>> {
        self.state
            .read()
            .records
            .get(&id)
            .map(|tx| tx.subscribe())
            .ok_or_else(|| GateError::ApprovalNotFound(id.to_string()))
    }

    /// Pull in decisions written to the store by other processes. Returns the
    /// records that changed.
    pub fn refresh(&self) -> Result<Vec<ApprovalRecord>> {
        let Some(store) = &self.store else {
            return Ok(Vec::new());
        };

        let mut changed = Vec::new();
        {
            let state = self.state.write();
            for id in &state.order {
                let Some(tx) = state.records.get(id) else {
                    continue;
                };
                if !tx.borrow().is_pending() {
                    continue;
                }
                match store.get(*id)? {
                    Some(stored) if !stored.is_pending() => {
                        tx.send_replace(stored.clone());
                        changed.push(stored);
                    }
                    Some(_) => {}
                    None => warn!(approval_id = %id, "approval missing from store"),
                }
            }
        }

        for record in &changed {
            self.announce(record);
        }
        Ok(changed)
    }

    fn announce(&self, record: &ApprovalRecord) {
        let decided_by = record.decided_by.clone().unwrap_or_default();
        if record.decision == crate::record::Decision::Approved {
            info!(approval_id = %record.approval_id, tool = %record.tool_name, decided_by = %decided_by, "approval granted");
        } else {
            warn!(approval_id = %record.approval_id, tool = %record.tool_name, decided_by = %decided_by, note = ?record.note, "approval denied");
        }
        if let Some(events) = &self.events {
            events.publish(Event::ApprovalDecided {
                approval_id: record.approval_id,
                decision: record.decision.to_string(),
                decided_by,
                decided_at: record.decided_at.unwrap_or_else(Utc::now),
            });
        }
    }
}

fn already_decided(record: &ApprovalRecord) -> GateError {
    GateError::ApprovalAlreadyDecided {
        id: record.approval_id,
        decision: record.decision.to_string(),
    }
}
