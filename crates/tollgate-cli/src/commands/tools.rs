use console::style;

use tollgate_config::GateConfig;
use tollgate_core::GateError;

use super::{ToolAction, truncate_output};

pub(super) fn cmd_tools(config: &GateConfig, action: ToolAction) -> tollgate_core::Result<()> {
    let registry = tollgate_runtime::build_registry(config)?;

    match action {
        ToolAction::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(registry.list())?);
                return Ok(());
            }
            if registry.is_empty() {
                println!("No tools registered. Add [[tools]] entries to tollgate.toml.");
                return Ok(());
            }
            println!("{}\n", style(format!("Registered tools ({}):", registry.len())).bold());
            for tool in registry.list() {
                let gate = if tool.sensitive {
                    style("approval").yellow()
                } else {
                    style("direct").green()
                };
                println!("  {} [{}] {}", style(&tool.name).cyan(), tool.operation_type, gate);
                if !tool.description.is_empty() {
                    println!("    {}", truncate_output(&tool.description, 100));
                }
            }
        }
        ToolAction::Check { name, args } => {
            let arguments: serde_json::Value = serde_json::from_str(&args)
                .map_err(|e| GateError::Config(format!("arguments are not valid JSON: {e}")))?;
            let tool = registry.lookup(&name)?;
            registry.validate(&name, &arguments)?;

            if tool.sensitive {
                println!(
                    "{} {name}: arguments valid, call needs approval ({} operation)",
                    style("✓").green(),
                    tool.operation_type
                );
            } else {
                println!("{} {name}: arguments valid, call runs directly", style("✓").green());
            }
        }
    }
    Ok(())
}
