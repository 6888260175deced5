use thiserror::Error;
use uuid::Uuid;

/// Unified error type for the entire Tollgate runtime.
#[derive(Error, Debug)]
pub enum GateError {
    // ── Registry errors ────────────────────────────────────────
    #[error("capability not found: {0}")]
    CapabilityNotFound(String),

    #[error("capability already registered: {0}")]
    DuplicateCapability(String),

    #[error("invalid parameter schema for {tool}: {reason}")]
    InvalidSchema { tool: String, reason: String },

    // ── Invocation errors ──────────────────────────────────────
    #[error("arguments for {tool} failed validation: {}", details.join("; "))]
    SchemaValidationFailed { tool: String, details: Vec<String> },

    #[error("tool execution failed: {tool} (call {call_id}): {reason}")]
    ExecutionFailed {
        tool: String,
        call_id: String,
        reason: String,
    },

    // ── Approval errors ────────────────────────────────────────
    #[error("approval not found: {0}")]
    ApprovalNotFound(String),

    #[error("approval already decided: {id} is {decision}")]
    ApprovalAlreadyDecided { id: Uuid, decision: String },

    #[error("call {call_id} already has pending approval {approval_id}")]
    DuplicateCallId { call_id: String, approval_id: Uuid },

    // ── Skill errors ───────────────────────────────────────────
    #[error("skill not found: {0}")]
    SkillNotFound(String),

    #[error("invalid skill manifest: {skill}: {reason}")]
    SkillManifest { skill: String, reason: String },

    #[error("resource path escapes skill root: {skill}: {path}")]
    ResourcePathEscape { skill: String, path: String },

    // ── Storage errors ─────────────────────────────────────────
    #[error("storage error: {0}")]
    Storage(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl GateError {
    /// Whether the error indicates a caller programming error (unknown tool,
    /// bad arguments) rather than a runtime condition. These are never retried.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::CapabilityNotFound(_)
                | Self::DuplicateCapability(_)
                | Self::InvalidSchema { .. }
                | Self::SchemaValidationFailed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GateError>;
