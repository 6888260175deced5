use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use tollgate_core::{GateError, Result};

use crate::definition::{SkillDefinition, SkillSummary, read_manifest};

/// Where skill manifests and resources come from.
///
/// This is the only way the resolver touches content. `relative` paths handed
/// to [`SkillStore::read_resource`] have already been normalized and checked
/// against the skill root lexically.
#[async_trait]
pub trait SkillStore: Send + Sync {
    /// Load the manifest of `name`. `Ok(None)` if there is no such skill.
    async fn manifest(&self, name: &str) -> Result<Option<SkillDefinition>>;

    /// Read one resource of a loaded skill.
    async fn read_resource(&self, skill: &SkillDefinition, relative: &Path) -> Result<String>;

    /// Every available skill, sorted by name.
    async fn list(&self) -> Result<Vec<SkillSummary>>;
}

/// Filesystem skill store.
///
/// Skills are directories containing a SKILL.md file. Directories are given
/// in precedence order: when two hold a skill with the same name, the first
/// one wins.
pub struct FsSkillStore {
    dirs: Vec<PathBuf>,
}

impl FsSkillStore {
    pub fn new(dirs: &[&Path]) -> Self {
        Self {
            dirs: dirs.iter().map(|d| d.to_path_buf()).collect(),
        }
    }

    pub fn from_dirs(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Skill names arrive from model output; only a single plain path
    /// segment may be used to build a directory path.
    fn is_plain_name(name: &str) -> bool {
        !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && !name.contains('\0')
    }

    /// Every SKILL.md in one skills directory (one level deep).
    async fn manifests_in(dir: &Path) -> Result<Vec<PathBuf>> {
        if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
            debug!(?dir, "skills directory does not exist, skipping");
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
            GateError::Storage(format!("failed to read skills dir {}: {}", dir.display(), e))
        })?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let skill_md = path.join("SKILL.md");
            if path.is_dir() && skill_md.is_file() {
                found.push(skill_md);
            }
        }
        found.sort();
        Ok(found)
    }
}

#[async_trait]
impl SkillStore for FsSkillStore {
    async fn manifest(&self, name: &str) -> Result<Option<SkillDefinition>> {
        if !Self::is_plain_name(name) {
            return Ok(None);
        }

        for dir in &self.dirs {
            // Fast path: directory named after the skill.
            let direct = dir.join(name).join("SKILL.md");
            if direct.is_file() {
                let def = read_manifest(&direct).await?;
                if def.name == name {
                    return Ok(Some(def));
                }
            }

            // Slow path: a directory whose frontmatter declares the name.
            for path in Self::manifests_in(dir).await? {
                if path == direct {
                    continue;
                }
                match read_manifest(&path).await {
                    Ok(def) if def.name == name => return Ok(Some(def)),
                    Ok(_) => {}
                    Err(e) => warn!(path = ?path, error = %e, "failed to load skill"),
                }
            }
        }

        Ok(None)
    }

    async fn read_resource(&self, skill: &SkillDefinition, relative: &Path) -> Result<String> {
        let escape = || GateError::ResourcePathEscape {
            skill: skill.name.clone(),
            path: relative.display().to_string(),
        };

        // The lexical check cannot see symlinks; compare canonical paths too.
        let root = tokio::fs::canonicalize(&skill.base_dir).await?;
        let full = tokio::fs::canonicalize(skill.base_dir.join(relative)).await?;
        if !full.starts_with(&root) {
            warn!(skill = %skill.name, path = %relative.display(), "resource symlink escapes skill root");
            return Err(escape());
        }

        Ok(tokio::fs::read_to_string(&full).await?)
    }

    async fn list(&self) -> Result<Vec<SkillSummary>> {
        let mut seen = HashSet::new();
        let mut skills = Vec::new();

        for dir in &self.dirs {
            for path in Self::manifests_in(dir).await? {
                match read_manifest(&path).await {
                    Ok(def) => {
                        if seen.insert(def.name.clone()) {
                            skills.push(def.summary());
                        } else {
                            debug!(
                                skill = %def.name,
                                path = ?path,
                                "skill already listed from higher-priority directory, skipping"
                            );
                        }
                    }
                    Err(e) => warn!(path = ?path, error = %e, "failed to load skill"),
                }
            }
        }

        skills.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(skills)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_skill(root: &Path, dir: &str, name: &str, description: &str) -> PathBuf {
        let skill_dir = root.join(dir);
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(
            skill_dir.join("SKILL.md"),
            format!("---\nname: {name}\ndescription: {description}\n---\n\nBody of {name}."),
        )
        .unwrap();
        skill_dir
    }

    #[tokio::test]
    async fn manifest_by_directory_name() {
        let dir = tempfile::tempdir().unwrap();
        write_skill(dir.path(), "memory", "memory", "Remember things");

        let store = FsSkillStore::new(&[dir.path()]);
        let def = store.manifest("memory").await.unwrap().unwrap();
        assert_eq!(def.description, "Remember things");
        assert!(store.manifest("absent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn manifest_by_frontmatter_name() {
        let dir = tempfile::tempdir().unwrap();
        write_skill(dir.path(), "some-folder", "renamed", "Declared elsewhere");

        let store = FsSkillStore::new(&[dir.path()]);
        let def = store.manifest("renamed").await.unwrap().unwrap();
        assert_eq!(def.base_dir, dir.path().join("some-folder"));
    }

    #[tokio::test]
    async fn traversal_names_are_unknown() {
        let dir = tempfile::tempdir().unwrap();
        write_skill(dir.path(), "memory", "memory", "Remember things");

        let store = FsSkillStore::new(&[&dir.path().join("memory")]);
        assert!(store.manifest("..").await.unwrap().is_none());
        assert!(store.manifest("../memory").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn precedence_higher_dir_wins() {
        let high = tempfile::tempdir().unwrap();
        let low = tempfile::tempdir().unwrap();
        write_skill(high.path(), "dup", "dup", "High priority version");
        write_skill(low.path(), "dup", "dup", "Low priority version");
        write_skill(low.path(), "only-low", "only-low", "Only in low");

        let store = FsSkillStore::new(&[high.path(), low.path()]);
        let def = store.manifest("dup").await.unwrap().unwrap();
        assert_eq!(def.description, "High priority version");

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "dup");
        assert_eq!(listed[0].description, "High priority version");
        assert_eq!(listed[1].name, "only-low");
    }

    #[tokio::test]
    async fn list_skips_noise_and_missing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        write_skill(dir.path(), "a", "a", "First");
        let noise = dir.path().join("not-a-skill");
        std::fs::create_dir_all(&noise).unwrap();
        std::fs::write(noise.join("README.md"), "Just a readme.").unwrap();

        let store = FsSkillStore::new(&[dir.path(), Path::new("/nonexistent/skills")]);
        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "a");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinked_resource_outside_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "secret").unwrap();

        let skill_dir = write_skill(dir.path(), "memory", "memory", "Remember things");
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), skill_dir.join("link.txt"))
            .unwrap();

        let store = FsSkillStore::new(&[dir.path()]);
        let def = store.manifest("memory").await.unwrap().unwrap();
        let err = store
            .read_resource(&def, Path::new("link.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::ResourcePathEscape { .. }));
    }
}
