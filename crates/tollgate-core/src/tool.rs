use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::types::ExecutionContext;

/// Description of a capability that can be invoked by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// Unique name, e.g. "shell.run", "fs.read".
    pub name: String,
    /// Human-readable description for the LLM.
    #[serde(default)]
    pub description: String,
    /// JSON Schema of the arguments object.
    #[serde(default = "empty_object_schema")]
    pub parameters: Value,
    /// Whether invocations require human approval before execution.
    #[serde(default)]
    pub sensitive: bool,
    /// What kind of operation the tool performs. Descriptive only.
    #[serde(default)]
    pub operation_type: OperationType,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object" })
}

impl Capability {
    /// A capability that runs without approval.
    pub fn new(name: impl Into<String>, parameters: Value, operation_type: OperationType) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            parameters,
            sensitive: false,
            operation_type,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mark the capability as gated behind human approval.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// Coarse classification of what a tool does to the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Read,
    Write,
    Delete,
    Execute,
    Network,
    #[default]
    Other,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
            Self::Execute => "execute",
            Self::Network => "network",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "delete" => Ok(Self::Delete),
            "execute" => Ok(Self::Execute),
            "network" => Ok(Self::Network),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown operation type '{other}'")),
        }
    }
}

/// A request from the agent to call a tool. `id` is the call id that
/// correlates retries of the same logical invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub tool_name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// The result of executing a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub content: String,
    pub is_error: bool,
    /// Optional structured data returned alongside the text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolResult {
    pub fn text(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: false,
            data: None,
        }
    }
}

/// Trait implemented by whatever actually performs tool side effects.
///
/// The dispatcher never interprets what a tool does; it only decides whether
/// and when `execute` is called. Once called, execution is not cancellable.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute a single tool call and return the result.
    async fn execute(&self, call: &ToolCall, ctx: &ExecutionContext) -> crate::Result<ToolResult>;
}
