use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use tollgate_core::{Event, EventBus, GateError, Result};

use crate::definition::{SkillDefinition, SkillSummary};
use crate::store::SkillStore;

/// A skill whose manifest and listed resources have been loaded.
#[derive(Debug)]
pub struct ActiveSkill {
    pub definition: SkillDefinition,
    /// Listed resources keyed by their normalized relative path.
    resources: HashMap<String, String>,
}

impl ActiveSkill {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn instructions(&self) -> &str {
        self.definition.instructions()
    }

    /// A listed resource, by normalized relative path.
    pub fn resource(&self, path: &str) -> Option<&str> {
        self.resources.get(path).map(String::as_str)
    }

    pub fn resource_paths(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }
}

type Slot = Arc<OnceCell<Arc<ActiveSkill>>>;

/// Resolves skills by name on demand and caches them for the process lifetime.
///
/// Concurrent first activations of the same name share one load; once
/// loaded, lookups do not touch the store again until [`SkillResolver::reload`].
pub struct SkillResolver {
    store: Arc<dyn SkillStore>,
    cache: DashMap<String, Slot>,
    events: Option<EventBus>,
}

impl SkillResolver {
    pub fn new(store: Arc<dyn SkillStore>) -> Self {
        Self {
            store,
            cache: DashMap::new(),
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Load (or return the cached) skill `name`.
    pub async fn activate(&self, name: &str) -> Result<Arc<ActiveSkill>> {
        let slot: Slot = Arc::clone(&self.cache.entry(name.to_string()).or_default());

        if let Some(skill) = slot.get() {
            debug!(skill = name, "skill cache hit");
            return Ok(Arc::clone(skill));
        }

        match slot.get_or_try_init(|| self.load(name)).await {
            Ok(skill) => Ok(Arc::clone(skill)),
            Err(e) => {
                // Unknown names come from model output; don't keep empty slots around.
                self.cache.remove_if(name, |_, s| Arc::ptr_eq(s, &slot) && s.get().is_none());
                Err(e)
            }
        }
    }

    /// Read a resource of skill `name`. `path` must stay inside the skill's
    /// directory after normalization, otherwise this fails with
    /// [`GateError::ResourcePathEscape`].
    pub async fn fetch_resource(&self, name: &str, path: &str) -> Result<String> {
        let skill = self.activate(name).await?;
        let relative = normalize_resource_path(name, path)?;

        if let Some(content) = skill.resource(&resource_key(&relative)) {
            return Ok(content.to_string());
        }
        self.store.read_resource(&skill.definition, &relative).await
    }

    /// Drop the cached entry for `name`. Returns whether one existed.
    pub fn reload(&self, name: &str) -> bool {
        let removed = self.cache.remove(name).is_some();
        if removed {
            info!(skill = name, "skill cache invalidated");
        }
        removed
    }

    /// Whether `name` is currently loaded.
    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.get(name).is_some_and(|slot| slot.initialized())
    }

    /// All skills the store knows about. Not cached.
    pub async fn list(&self) -> Result<Vec<SkillSummary>> {
        self.store.list().await
    }

    async fn load(&self, name: &str) -> Result<Arc<ActiveSkill>> {
        let definition = self
            .store
            .manifest(name)
            .await?
            .ok_or_else(|| GateError::SkillNotFound(name.to_string()))?;

        let mut resources = HashMap::with_capacity(definition.resources.len());
        for listed in &definition.resources {
            let relative = normalize_listed(name, listed)?;
            let content = self.store.read_resource(&definition, &relative).await?;
            resources.insert(resource_key(&relative), content);
        }

        info!(skill = name, resources = resources.len(), "skill activated");
        if let Some(events) = &self.events {
            events.publish(Event::SkillActivated {
                name: name.to_string(),
                resources: resources.len(),
            });
        }

        Ok(Arc::new(ActiveSkill {
            definition,
            resources,
        }))
    }
}

/// Lexically normalize `path` relative to a skill root.
///
/// Absolute paths, drive prefixes and any `..` that climbs above the root are
/// rejected, never clamped. A path that collapses to the root itself names no
/// file inside it and is rejected the same way.
pub fn normalize_resource_path(skill: &str, path: &str) -> Result<PathBuf> {
    normalize(path).map_err(|_| GateError::ResourcePathEscape {
        skill: skill.to_string(),
        path: path.to_string(),
    })
}

enum PathFault {
    Escape,
    Root,
}

fn normalize(path: &str) -> std::result::Result<PathBuf, PathFault> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(PathFault::Escape);
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(PathFault::Escape),
        }
    }

    if parts.is_empty() {
        return Err(PathFault::Root);
    }
    Ok(parts.iter().collect())
}

/// Like [`normalize_resource_path`], but a manifest entry naming the root is
/// a broken manifest rather than an escape.
fn normalize_listed(skill: &str, listed: &str) -> Result<PathBuf> {
    match normalize(listed) {
        Err(PathFault::Root) => Err(GateError::SkillManifest {
            skill: skill.to_string(),
            reason: format!("resource path '{listed}' names the skill root"),
        }),
        _ => normalize_resource_path(skill, listed),
    }
}

fn resource_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
