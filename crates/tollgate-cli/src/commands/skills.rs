use console::style;

use tollgate_config::GateConfig;

use super::SkillAction;

pub(super) async fn cmd_skills(config: &GateConfig, action: SkillAction) -> tollgate_core::Result<()> {
    let resolver = tollgate_runtime::build_resolver(config);

    match action {
        SkillAction::List => {
            let skills = resolver.list().await?;
            if skills.is_empty() {
                println!("No skills found in:");
                for dir in &config.skills.dirs {
                    println!("  {}", dir.display());
                }
            } else {
                println!("{}\n", style(format!("Available Skills ({}):", skills.len())).bold());
                for s in skills {
                    println!("  {} v{}", style(&s.name).cyan(), s.version);
                    println!("    {}", s.description);
                }
            }
        }
        SkillAction::Show { name } => {
            let skill = resolver.activate(&name).await?;
            let def = &skill.definition;
            println!("{} v{}", style(&def.name).bold(), def.version);
            println!("  {}", def.description);
            if let Some(ref author) = def.author {
                println!("  Author: {author}");
            }
            if !def.tags.is_empty() {
                println!("  Tags: {}", def.tags.join(", "));
            }
            println!("  File: {}", def.file_path.display());

            let mut resources: Vec<&str> = skill.resource_paths().collect();
            if !resources.is_empty() {
                resources.sort_unstable();
                println!("  Resources: {}", resources.join(", "));
            }

            println!("\n  {}", style("Instructions:").bold());
            for line in skill.instructions().lines() {
                println!("    {line}");
            }
        }
        SkillAction::Resource { name, path } => {
            print!("{}", resolver.fetch_resource(&name, &path).await?);
        }
    }
    Ok(())
}
