use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::sync::Arc;
use tokio::sync::broadcast;

/// Events emitted as calls move through the dispatcher and ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    // ── Invocation lifecycle ───────────────────────────────────
    ToolInvoked {
        call_id: String,
        tool_name: String,
        sensitive: bool,
    },
    ToolCompleted {
        call_id: String,
        tool_name: String,
        is_error: bool,
    },

    // ── Approval lifecycle ─────────────────────────────────────
    ApprovalRequested {
        approval_id: Uuid,
        call_id: Option<String>,
        tool_name: String,
    },
    ApprovalDecided {
        approval_id: Uuid,
        decision: String,
        decided_by: String,
        decided_at: DateTime<Utc>,
    },

    // ── Skills ─────────────────────────────────────────────────
    SkillActivated {
        name: String,
        resources: usize,
    },
}

/// A broadcast-based event bus for system-wide pub/sub.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<Event>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn publish(&self, event: Event) {
        // Ignore send errors (no subscribers).
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
