use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Unique identifier for an approval record.
pub type ApprovalId = Uuid;

/// Identifier of the agent issuing tool calls.
pub type AgentId = String;

/// Identifier of a conversation/session.
pub type SessionId = String;

/// Identifier of the human (or policy) a call is made on behalf of.
pub type UserId = String;

/// A workspace the agent operates in. Passed through to executors untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceRef {
    pub workspace_id: String,
    pub owner_id: String,
    pub name: String,
    pub work_dir: PathBuf,
}

/// Who is calling, on whose behalf, and where.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvocationContext {
    pub agent_id: AgentId,
    #[serde(default)]
    pub session_id: Option<SessionId>,
    pub user_id: UserId,
    #[serde(default)]
    pub workspace: Option<WorkspaceRef>,
}

impl InvocationContext {
    pub fn new(agent_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            session_id: None,
            user_id: user_id.into(),
            workspace: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_workspace(mut self, workspace: WorkspaceRef) -> Self {
        self.workspace = Some(workspace);
        self
    }
}

/// Who authorized a gated call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub approval_id: ApprovalId,
    pub decided_by: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// Everything an executor receives besides the call itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub call_id: String,
    pub invocation: InvocationContext,
    /// Present only when the call ran after an approval.
    #[serde(default)]
    pub authorization: Option<Authorization>,
}
