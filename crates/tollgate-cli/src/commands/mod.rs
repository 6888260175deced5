use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use std::path::{Path, PathBuf};

use tollgate_approval::{ApprovalLedger, SqliteApprovalStore, Verdict};
use tollgate_config::{ConfigLoader, GateConfig};
use tollgate_core::GateError;

mod approvals;
mod skills;
mod tools;

/// Tollgate: capability dispatch and human approval for agent tool calls
#[derive(Parser)]
#[command(name = "tollgate", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to tollgate.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect registered capabilities
    Tools {
        #[command(subcommand)]
        action: ToolAction,
    },
    /// Review and decide approval requests
    Approvals {
        #[command(subcommand)]
        action: ApprovalAction,
    },
    /// Browse skills and their resources
    Skills {
        #[command(subcommand)]
        action: SkillAction,
    },
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ToolAction {
    /// List registered capabilities
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate arguments for a tool and report whether the call would need approval
    Check {
        /// Tool name
        name: String,
        /// Arguments as a JSON object
        #[arg(default_value = "{}")]
        args: String,
    },
}

#[derive(Subcommand)]
enum ApprovalAction {
    /// List approval records
    List {
        /// Only show pending approvals
        #[arg(long)]
        pending: bool,
        /// Filter by agent id
        #[arg(long)]
        agent: Option<String>,
        /// Filter by session id
        #[arg(long)]
        session: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one approval record as JSON
    Show { id: String },
    /// Approve or deny a pending request
    Decide {
        id: String,
        /// approve or deny
        verdict: Verdict,
        /// Who is deciding (recorded as decidedBy)
        #[arg(long = "by")]
        decided_by: String,
        /// Optional note stored with the decision
        #[arg(long)]
        note: Option<String>,
    },
    /// Deny pending approvals older than a threshold
    Expire {
        /// Age in seconds (default: ledger.timeout_secs)
        #[arg(long)]
        older_than: Option<u64>,
    },
}

#[derive(Subcommand)]
enum SkillAction {
    /// List available skills
    List,
    /// Show a skill's manifest and instructions
    Show { name: String },
    /// Print a resource file of a skill
    Resource {
        name: String,
        /// Path relative to the skill directory
        path: String,
    },
}

impl Cli {
    pub async fn run(self) -> tollgate_core::Result<()> {
        // Load config first so we can use it for log format
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        // Resolve log level: --verbose > --quiet > --log-level > config
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level.as_deref().unwrap_or(&config.logging.level)
        };
        init_tracing(log_level, &config.logging.format);

        match self.command {
            Commands::Tools { action } => tools::cmd_tools(&config, action),
            Commands::Approvals { action } => {
                approvals::cmd_approvals(&config, config_loader.config_dir(), action)
            }
            Commands::Skills { action } => skills::cmd_skills(&config, action).await,
            Commands::Config { json } => Self::cmd_config(&config, json),
            Commands::Completions { shell } => Self::cmd_completions(shell),
        }
    }

    fn cmd_config(config: &GateConfig, json: bool) -> tollgate_core::Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(config).map_err(|e| GateError::Config(e.to_string()))?
            );
        }
        Ok(())
    }

    fn cmd_completions(shell: Shell) -> tollgate_core::Result<()> {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "tollgate", &mut std::io::stdout());
        Ok(())
    }
}

fn init_tracing(level: &str, format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    if format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// The approvals database: `ledger.db_path`, or `approvals.db` next to the
/// config file so the CLI and a host sharing a config see the same records.
fn ledger_path(config: &GateConfig, config_dir: &Path) -> PathBuf {
    config
        .ledger
        .db_path
        .clone()
        .unwrap_or_else(|| config_dir.join("approvals.db"))
}

fn open_ledger(config: &GateConfig, config_dir: &Path) -> tollgate_core::Result<ApprovalLedger> {
    let store = SqliteApprovalStore::open(&ledger_path(config, config_dir))?;
    ApprovalLedger::open(Box::new(store))
}

/// Truncate a string to `max` characters, appending "..." if truncated.
fn truncate_output(s: &str, max: usize) -> String {
    let flat = s.replace('\n', " ");
    if flat.chars().count() <= max {
        flat
    } else {
        format!("{}...", flat.chars().take(max).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn decide_parses_verdict_and_decider() {
        let cli = Cli::try_parse_from([
            "tollgate", "approvals", "decide", "abc", "deny", "--by", "ops", "--note", "no",
        ])
        .unwrap();
        match cli.command {
            Commands::Approvals {
                action:
                    ApprovalAction::Decide {
                        id,
                        verdict,
                        decided_by,
                        note,
                    },
            } => {
                assert_eq!(id, "abc");
                assert_eq!(verdict, Verdict::Denied);
                assert_eq!(decided_by, "ops");
                assert_eq!(note.as_deref(), Some("no"));
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn decide_requires_decider() {
        assert!(Cli::try_parse_from(["tollgate", "approvals", "decide", "abc", "approve"]).is_err());
        assert!(Cli::try_parse_from(["tollgate", "approvals", "decide", "abc", "maybe", "--by", "x"]).is_err());
    }

    #[test]
    fn ledger_path_defaults_next_to_config() {
        let config = GateConfig::default();
        assert_eq!(
            ledger_path(&config, Path::new("/etc/tollgate")),
            PathBuf::from("/etc/tollgate/approvals.db")
        );
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate_output("héllo\nworld", 5), "héllo...");
        assert_eq!(truncate_output("short", 10), "short");
    }
}
