//! # tollgate-cli
//!
//! Command-line interface for Tollgate.
//!
//! ## Commands
//!
//! - `tollgate tools`: List capabilities, check arguments against a schema
//! - `tollgate approvals`: List, show, decide, and expire approval requests
//! - `tollgate skills`: List skills, show a manifest, print a resource
//! - `tollgate config`: Show the effective configuration

pub mod commands;

pub use commands::Cli;
