use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tollgate_core::Capability;

/// Root configuration: maps to `tollgate.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub ledger: LedgerConfig,
    pub skills: SkillsConfig,
    pub dispatch: DispatchConfig,
    pub logging: LoggingConfig,
    /// Capabilities registered at start-up.
    pub tools: Vec<Capability>,
}

// ── Ledger ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// SQLite database holding approval records. None = in-memory only.
    pub db_path: Option<PathBuf>,
    /// Pending approvals older than this are denied by the expiry sweeper.
    /// 0 = approvals never expire.
    pub timeout_secs: u64,
    /// How often the expiry sweeper runs when `timeout_secs` is set.
    pub sweep_interval_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            timeout_secs: 0,
            sweep_interval_secs: 60,
        }
    }
}

// ── Skills ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillsConfig {
    /// Skill directories in precedence order (first wins on name clashes).
    /// Empty = `<config dir>/skills`.
    pub dirs: Vec<PathBuf>,
}

// ── Dispatch ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Reject argument fields not declared by an object schema, unless the
    /// schema sets `additionalProperties` itself.
    pub strict_arguments: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            strict_arguments: true,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl GateConfig {
    /// Make relative paths absolute against `base` (the config file's directory)
    /// and fill in the default skills directory.
    pub fn resolve_paths(&mut self, base: &Path) {
        if let Some(db) = &self.ledger.db_path {
            if db.is_relative() {
                self.ledger.db_path = Some(base.join(db));
            }
        }
        if self.skills.dirs.is_empty() {
            self.skills.dirs.push(base.join("skills"));
        } else {
            for dir in &mut self.skills.dirs {
                if dir.is_relative() {
                    *dir = base.join(&*dir);
                }
            }
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            WarningSeverity::Error => "error",
            WarningSeverity::Warning => "warning",
            WarningSeverity::Info => "info",
        };
        write!(f, "{}: {}: {}", label, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

impl GateConfig {
    /// Validate the config and return a list of warnings/errors.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Logging ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }
        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Error,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Ledger ───
        if self.ledger.timeout_secs > 0 && self.ledger.sweep_interval_secs == 0 {
            warnings.push(ConfigWarning {
                field: "ledger.sweep_interval_secs".into(),
                message: "sweep interval is 0 while approval timeout is enabled".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 60, or set ledger.timeout_secs = 0".into()),
            });
        }
        if self.ledger.db_path.is_none() {
            warnings.push(ConfigWarning {
                field: "ledger.db_path".into(),
                message: "approvals are kept in memory and lost on restart".into(),
                severity: WarningSeverity::Info,
                hint: Some("Set to e.g. 'approvals.db' to keep an audit trail".into()),
            });
        }

        // ── Tools ───
        let mut seen = HashSet::new();
        for (i, tool) in self.tools.iter().enumerate() {
            if tool.name.trim().is_empty() {
                warnings.push(ConfigWarning {
                    field: format!("tools[{i}].name"),
                    message: "tool name is empty".into(),
                    severity: WarningSeverity::Error,
                    hint: None,
                });
                continue;
            }
            if !seen.insert(tool.name.as_str()) {
                warnings.push(ConfigWarning {
                    field: format!("tools[{i}].name"),
                    message: format!("tool '{}' is declared more than once", tool.name),
                    severity: WarningSeverity::Error,
                    hint: None,
                });
            }
            if !tool.parameters.is_object() {
                warnings.push(ConfigWarning {
                    field: format!("tools[{i}].parameters"),
                    message: format!("parameters of '{}' must be a JSON schema object", tool.name),
                    severity: WarningSeverity::Error,
                    hint: Some("e.g. parameters = { type = \"object\" }".into()),
                });
            }
            if tool.description.is_empty() {
                warnings.push(ConfigWarning {
                    field: format!("tools[{i}].description"),
                    message: format!("tool '{}' has no description", tool.name),
                    severity: WarningSeverity::Warning,
                    hint: None,
                });
            }
        }

        // Check for hard errors
        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
