#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tollgate_core::{Event, EventBus, GateError};
    use tollgate_skills::{FsSkillStore, SkillDefinition, SkillResolver, SkillStore, SkillSummary};

    /// Wraps a store and counts how often it is read.
    struct CountingStore {
        inner: FsSkillStore,
        manifests: AtomicUsize,
        resources: AtomicUsize,
    }

    #[async_trait]
    impl SkillStore for CountingStore {
        async fn manifest(&self, name: &str) -> tollgate_core::Result<Option<SkillDefinition>> {
            self.manifests.fetch_add(1, Ordering::SeqCst);
            // Widen the window for concurrent first activations.
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.inner.manifest(name).await
        }

        async fn read_resource(
            &self,
            skill: &SkillDefinition,
            relative: &Path,
        ) -> tollgate_core::Result<String> {
            self.resources.fetch_add(1, Ordering::SeqCst);
            self.inner.read_resource(skill, relative).await
        }

        async fn list(&self) -> tollgate_core::Result<Vec<SkillSummary>> {
            self.inner.list().await
        }
    }

    fn memory_skill(root: &Path) {
        let skill_dir = root.join("memory");
        std::fs::create_dir_all(skill_dir.join("references")).unwrap();
        std::fs::write(
            skill_dir.join("SKILL.md"),
            "---\nname: memory\ndescription: Remember and recall facts\nresources: [references/format.md]\n---\n\n# Memory\n\nFollow references/format.md.",
        )
        .unwrap();
        std::fs::write(skill_dir.join("references/format.md"), "- key: value").unwrap();
        std::fs::write(skill_dir.join("notes.txt"), "unlisted but inside").unwrap();
    }

    fn counting(root: &Path) -> Arc<CountingStore> {
        Arc::new(CountingStore {
            inner: FsSkillStore::new(&[root]),
            manifests: AtomicUsize::new(0),
            resources: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn activate_loads_once_then_serves_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        memory_skill(dir.path());
        let store = counting(dir.path());
        let resolver = SkillResolver::new(store.clone());

        let first = resolver.activate("memory").await.unwrap();
        let second = resolver.activate("memory").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name(), "memory");
        assert!(first.instructions().contains("# Memory"));
        assert_eq!(first.resource("references/format.md"), Some("- key: value"));
        assert_eq!(store.manifests.load(Ordering::SeqCst), 1);
        assert_eq!(store.resources.load(Ordering::SeqCst), 1);
        assert!(resolver.is_cached("memory"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_activations_share_one_load() {
        let dir = tempfile::tempdir().unwrap();
        memory_skill(dir.path());
        let store = counting(dir.path());
        let resolver = Arc::new(SkillResolver::new(store.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let resolver = Arc::clone(&resolver);
            handles.push(tokio::spawn(async move { resolver.activate("memory").await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.manifests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_skill_is_not_found_and_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let store = counting(dir.path());
        let resolver = SkillResolver::new(store.clone());

        let err = resolver.activate("ghost").await.unwrap_err();
        assert!(matches!(err, GateError::SkillNotFound(ref n) if n == "ghost"));
        assert!(!resolver.is_cached("ghost"));

        // A later install is picked up without reload.
        let skill_dir = dir.path().join("ghost");
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(
            skill_dir.join("SKILL.md"),
            "---\nname: ghost\ndescription: Appears later\n---\n\nBoo.",
        )
        .unwrap();
        assert!(resolver.activate("ghost").await.is_ok());
        assert_eq!(store.manifests.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fetch_resource_escape_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        memory_skill(dir.path());
        let resolver = SkillResolver::new(Arc::new(FsSkillStore::new(&[dir.path()])));

        resolver.activate("memory").await.unwrap();
        let err = resolver
            .fetch_resource("memory", "../../etc/passwd")
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::ResourcePathEscape { ref skill, .. } if skill == "memory"));

        let err = resolver.fetch_resource("memory", "/etc/passwd").await.unwrap_err();
        assert!(matches!(err, GateError::ResourcePathEscape { .. }));
    }

    #[tokio::test]
    async fn fetch_resource_naming_the_skill_root_is_an_escape() {
        let dir = tempfile::tempdir().unwrap();
        memory_skill(dir.path());
        let resolver = SkillResolver::new(Arc::new(FsSkillStore::new(&[dir.path()])));

        for root in ["a/..", "./references/.."] {
            let err = resolver.fetch_resource("memory", root).await.unwrap_err();
            assert!(
                matches!(err, GateError::ResourcePathEscape { ref path, .. } if path == root),
                "{root} should be rejected as an escape, got {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn manifest_listing_the_skill_root_is_a_manifest_error() {
        let dir = tempfile::tempdir().unwrap();
        let skill_dir = dir.path().join("rooted");
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(
            skill_dir.join("SKILL.md"),
            "---\nname: rooted\ndescription: Lists its own directory\nresources: [docs/..]\n---\n\nBody.",
        )
        .unwrap();

        let resolver = SkillResolver::new(Arc::new(FsSkillStore::new(&[dir.path()])));
        let err = resolver.activate("rooted").await.unwrap_err();
        assert!(matches!(err, GateError::SkillManifest { ref skill, .. } if skill == "rooted"));
    }

    #[tokio::test]
    async fn fetch_resource_serves_listed_from_cache_and_reads_unlisted() {
        let dir = tempfile::tempdir().unwrap();
        memory_skill(dir.path());
        let store = counting(dir.path());
        let resolver = SkillResolver::new(store.clone());

        let listed = resolver
            .fetch_resource("memory", "./references/../references/format.md")
            .await
            .unwrap();
        assert_eq!(listed, "- key: value");
        assert_eq!(store.resources.load(Ordering::SeqCst), 1);

        let unlisted = resolver.fetch_resource("memory", "notes.txt").await.unwrap();
        assert_eq!(unlisted, "unlisted but inside");
        assert_eq!(store.resources.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn manifest_listing_an_escaping_resource_fails_activation() {
        let dir = tempfile::tempdir().unwrap();
        let skill_dir = dir.path().join("sneaky");
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(
            skill_dir.join("SKILL.md"),
            "---\nname: sneaky\ndescription: Lists a file outside\nresources: [../other/SKILL.md]\n---\n\nBody.",
        )
        .unwrap();

        let resolver = SkillResolver::new(Arc::new(FsSkillStore::new(&[dir.path()])));
        let err = resolver.activate("sneaky").await.unwrap_err();
        assert!(matches!(err, GateError::ResourcePathEscape { .. }));
        assert!(!resolver.is_cached("sneaky"));
    }

    #[tokio::test]
    async fn reload_rereads_the_store() {
        let dir = tempfile::tempdir().unwrap();
        memory_skill(dir.path());
        let store = counting(dir.path());
        let resolver = SkillResolver::new(store.clone());

        resolver.activate("memory").await.unwrap();
        std::fs::write(
            dir.path().join("memory/SKILL.md"),
            "---\nname: memory\ndescription: Updated\n---\n\nNew body.",
        )
        .unwrap();

        // Still cached.
        assert_eq!(
            resolver.activate("memory").await.unwrap().definition.description,
            "Remember and recall facts"
        );

        assert!(resolver.reload("memory"));
        assert!(!resolver.reload("memory"));
        let fresh = resolver.activate("memory").await.unwrap();
        assert_eq!(fresh.definition.description, "Updated");
        assert_eq!(store.manifests.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn activation_publishes_event_once() {
        let dir = tempfile::tempdir().unwrap();
        memory_skill(dir.path());
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let resolver =
            SkillResolver::new(Arc::new(FsSkillStore::new(&[dir.path()]))).with_events(bus);

        resolver.activate("memory").await.unwrap();
        resolver.activate("memory").await.unwrap();

        match rx.try_recv().unwrap() {
            Event::SkillActivated { name, resources } => {
                assert_eq!(name, "memory");
                assert_eq!(resources, 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn list_returns_summaries() {
        let dir = tempfile::tempdir().unwrap();
        memory_skill(dir.path());
        let resolver = SkillResolver::new(Arc::new(FsSkillStore::new(&[dir.path()])));

        let skills = resolver.list().await.unwrap();
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].name, "memory");
        assert_eq!(skills[0].version, "1.0.0");
    }
}
