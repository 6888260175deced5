use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use tollgate_core::{GateError, Result};

/// A skill definition parsed from a SKILL.md file.
///
/// Skills are Markdown documents with YAML frontmatter. Besides the
/// instructions in the body, a skill may list resource files (references,
/// templates, scripts) relative to its own directory; those are loaded
/// together with the manifest on first activation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDefinition {
    /// Skill name (unique key).
    pub name: String,
    /// When the skill applies. Shown to the agent to decide activation.
    pub description: String,
    /// Semantic version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Tags for categorization.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Author.
    #[serde(default)]
    pub author: Option<String>,
    /// Resource paths relative to `base_dir`.
    #[serde(default)]
    pub resources: Vec<String>,
    /// The full Markdown body (instructions for the agent).
    #[serde(skip)]
    pub body: String,
    /// Absolute path to the SKILL.md file.
    #[serde(skip)]
    pub file_path: PathBuf,
    /// Base directory of the skill (parent of SKILL.md). Resources may not
    /// resolve outside of it.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Name and trigger description, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillSummary {
    pub name: String,
    pub description: String,
    pub version: String,
}

fn default_version() -> String {
    "1.0.0".into()
}

impl SkillDefinition {
    /// Parse a SKILL.md file. The file format is:
    ///
    /// ```text
    /// ---
    /// name: my-skill
    /// description: What this skill does
    /// tags: [tag1, tag2]
    /// resources: [references/api.md, templates/report.md]
    /// ---
    ///
    /// # Skill Title
    ///
    /// Instructions for the agent...
    /// ```
    pub fn parse(content: &str, file_path: PathBuf, base_dir: PathBuf) -> Result<Self> {
        let (frontmatter, body) = split_frontmatter(content, &file_path)?;

        let mut def = parse_frontmatter(&frontmatter, &base_dir);
        def.body = body;
        def.file_path = file_path;
        def.base_dir = base_dir;

        // Resolve {baseDir} in body
        let base_dir_str = def.base_dir.to_string_lossy().to_string();
        def.body = def.body.replace("{baseDir}", &base_dir_str);

        if def.name.is_empty() {
            return Err(manifest_error(&def.file_path, "skill name is empty"));
        }
        if def.description.is_empty() {
            return Err(GateError::SkillManifest {
                skill: def.name.clone(),
                reason: "missing description".into(),
            });
        }

        Ok(def)
    }

    /// Get the full instructions (body) for injection into conversation context.
    pub fn instructions(&self) -> &str {
        &self.body
    }

    pub fn summary(&self) -> SkillSummary {
        SkillSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            version: self.version.clone(),
        }
    }
}

/// Read a SKILL.md from disk. The base directory is the file's parent.
pub(crate) async fn read_manifest(path: &Path) -> Result<SkillDefinition> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| manifest_error(path, &format!("failed to read: {e}")))?;
    let base_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
    SkillDefinition::parse(&content, path.to_path_buf(), base_dir)
}

fn manifest_error(path: &Path, reason: &str) -> GateError {
    GateError::SkillManifest {
        skill: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Split a SKILL.md file into YAML frontmatter and Markdown body.
fn split_frontmatter(content: &str, path: &Path) -> Result<(String, String)> {
    let trimmed = content.trim();

    if !trimmed.starts_with("---") {
        return Err(manifest_error(path, "must start with YAML frontmatter (---)"));
    }

    let after_first = &trimmed[3..];
    let end_pos = after_first
        .find("\n---")
        .ok_or_else(|| manifest_error(path, "missing closing --- for frontmatter"))?;

    let frontmatter = after_first[..end_pos].trim().to_string();
    let body = after_first[end_pos + 4..].trim().to_string();

    Ok((frontmatter, body))
}

/// Parse simple YAML frontmatter into a SkillDefinition.
/// Supports: name, description, version, tags, author, resources
fn parse_frontmatter(yaml: &str, base_dir: &Path) -> SkillDefinition {
    let mut name = String::new();
    let mut description = String::new();
    let mut version = default_version();
    let mut tags: Vec<String> = Vec::new();
    let mut author: Option<String> = None;
    let mut resources: Vec<String> = Vec::new();

    for line in yaml.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            let value = value.trim();

            match key {
                "name" => name = unquote(value),
                "description" => description = unquote(value),
                "version" => version = unquote(value),
                "author" => author = Some(unquote(value)),
                "tags" => tags = parse_list(value),
                "resources" => resources = parse_list(value),
                _ => {} // ignore unknown keys
            }
        }
    }

    SkillDefinition {
        name,
        description,
        version,
        tags,
        author,
        resources,
        body: String::new(),
        file_path: PathBuf::new(),
        base_dir: base_dir.to_path_buf(),
    }
}

/// Parse `[a, b]` or `a, b`.
fn parse_list(value: &str) -> Vec<String> {
    let inner = value.trim_start_matches('[').trim_end_matches(']');
    inner
        .split(',')
        .map(|t| unquote(t.trim()))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Remove surrounding quotes from a YAML value.
fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}
