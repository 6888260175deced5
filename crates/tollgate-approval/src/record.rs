use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use tollgate_core::{ApprovalId, OperationType};

/// Where an approval stands. `Approved` and `Denied` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Pending,
    Approved,
    Denied,
}

impl Decision {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "denied" => Ok(Self::Denied),
            other => Err(format!("unknown decision '{other}'")),
        }
    }
}

/// The outcome a decision event can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Approved,
    Denied,
}

impl From<Verdict> for Decision {
    fn from(v: Verdict) -> Self {
        match v {
            Verdict::Approved => Decision::Approved,
            Verdict::Denied => Decision::Denied,
        }
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" | "approve" => Ok(Self::Approved),
            "denied" | "deny" => Ok(Self::Denied),
            other => Err(format!("unknown verdict '{other}' (expected approve or deny)")),
        }
    }
}

/// Audit and state record for one gated invocation.
///
/// `decided_at` and `decided_by` are set exactly when `decision` leaves
/// `Pending`; after that the record never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRecord {
    pub approval_id: ApprovalId,
    pub agent_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub decided_at: Option<DateTime<Utc>>,
    pub decision: Decision,
    #[serde(default)]
    pub decided_by: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    pub is_sensitive: bool,
    pub operation_type: OperationType,
    #[serde(default)]
    pub call_id: Option<String>,
}

impl ApprovalRecord {
    pub fn is_pending(&self) -> bool {
        self.decision.is_pending()
    }

    /// `decision == Pending ⇔ decided_at == None ⇔ decided_by == None`.
    pub fn is_consistent(&self) -> bool {
        let pending = self.is_pending();
        pending == self.decided_at.is_none() && pending == self.decided_by.is_none()
    }

    /// The record after a decision. Callers check `is_pending` first.
    pub(crate) fn decided(
        &self,
        verdict: Verdict,
        decided_by: String,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            decision: verdict.into(),
            decided_at: Some(at),
            decided_by: Some(decided_by),
            note,
            ..self.clone()
        }
    }
}

/// Everything needed to open an approval.
#[derive(Debug, Clone)]
pub struct NewApproval {
    pub agent_id: String,
    pub session_id: Option<String>,
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub user_id: String,
    pub is_sensitive: bool,
    pub operation_type: OperationType,
    /// Deduplication key; at most one pending approval exists per call id.
    pub call_id: Option<String>,
}

impl NewApproval {
    pub(crate) fn into_record(self, approval_id: Uuid, created_at: DateTime<Utc>) -> ApprovalRecord {
        ApprovalRecord {
            approval_id,
            agent_id: self.agent_id,
            session_id: self.session_id,
            tool_name: self.tool_name,
            arguments: self.arguments,
            user_id: self.user_id,
            created_at,
            decided_at: None,
            decision: Decision::Pending,
            decided_by: None,
            note: None,
            is_sensitive: self.is_sensitive,
            operation_type: self.operation_type,
            call_id: self.call_id,
        }
    }
}

/// A decision submitted from outside (UI, API, policy process).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub approval_id: String,
    pub decision: Verdict,
    pub decided_by: String,
    #[serde(default)]
    pub note: Option<String>,
}
