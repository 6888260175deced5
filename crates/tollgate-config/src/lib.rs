//! # tollgate-config
//!
//! Configuration system for the Tollgate runtime. Reads from `tollgate.toml` and
//! environment variables, in that precedence order. Relative paths are resolved
//! against the directory holding the config file.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::GateConfig;
pub use schema::{
    ConfigWarning, DispatchConfig, LedgerConfig, LoggingConfig, SkillsConfig, WarningSeverity,
};
