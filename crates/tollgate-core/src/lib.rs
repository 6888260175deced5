//! # tollgate-core
//!
//! Core types, traits, and primitives for the Tollgate capability dispatch runtime.
//! This crate defines the shared vocabulary used by every other crate in the workspace:
//! capability descriptors, tool calls and results, the executor seam, and the
//! unified error type.

pub mod error;
pub mod event;
pub mod tool;
pub mod types;

pub use error::{GateError, Result};
pub use event::{Event, EventBus};
pub use tool::{Capability, OperationType, ToolCall, ToolExecutor, ToolResult};
pub use types::*;
