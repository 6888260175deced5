#[cfg(test)]
mod tests {
    use std::io::Write;
    use tollgate_config::ConfigLoader;
    use tollgate_config::schema::*;
    use tollgate_core::OperationType;

    // ── Default tests ──────────────────────────────────────────

    #[test]
    fn test_gate_config_defaults() {
        let config = GateConfig::default();
        assert!(config.ledger.db_path.is_none());
        assert_eq!(config.ledger.timeout_secs, 0);
        assert_eq!(config.ledger.sweep_interval_secs, 60);
        assert!(config.dispatch.strict_arguments);
        assert!(config.skills.dirs.is_empty());
        assert!(config.tools.is_empty());
    }

    #[test]
    fn test_logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, "pretty");
    }

    #[test]
    fn test_defaults_validate_cleanly() {
        let warnings = GateConfig::default().validate().unwrap();
        assert!(warnings.iter().all(|w| w.severity != WarningSeverity::Error));
    }

    // ── TOML parsing ───────────────────────────────────────────

    #[test]
    fn test_config_toml_roundtrip() {
        let config = GateConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let restored: GateConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(restored.ledger.timeout_secs, config.ledger.timeout_secs);
        assert_eq!(restored.logging.level, config.logging.level);
        assert_eq!(
            restored.dispatch.strict_arguments,
            config.dispatch.strict_arguments
        );
    }

    #[test]
    fn test_partial_toml_applies_defaults() {
        let toml_str = r#"
[ledger]
timeout_secs = 3600
"#;
        let config: GateConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.ledger.timeout_secs, 3600);
        // Defaults should fill in
        assert_eq!(config.ledger.sweep_interval_secs, 60);
        assert_eq!(config.logging.format, "pretty");
        assert!(config.dispatch.strict_arguments);
    }

    #[test]
    fn test_tools_deserialize() {
        let toml_str = r#"
[[tools]]
name = "shell.run"
description = "Run a shell command in the workspace"
sensitive = true
operation_type = "execute"

[tools.parameters]
type = "object"
required = ["cmd"]

[tools.parameters.properties.cmd]
type = "string"

[[tools]]
name = "fs.read"
description = "Read a file"
operation_type = "read"
"#;
        let config: GateConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.tools.len(), 2);

        let shell = &config.tools[0];
        assert_eq!(shell.name, "shell.run");
        assert!(shell.sensitive);
        assert_eq!(shell.operation_type, OperationType::Execute);
        assert_eq!(shell.parameters["required"][0], "cmd");
        assert_eq!(shell.parameters["properties"]["cmd"]["type"], "string");

        let read = &config.tools[1];
        assert!(!read.sensitive);
        assert_eq!(read.operation_type, OperationType::Read);
        // Omitted parameters default to an open object schema
        assert_eq!(read.parameters["type"], "object");
    }

    // ── Validation ─────────────────────────────────────────────

    #[test]
    fn test_duplicate_tool_names_rejected() {
        let toml_str = r#"
[[tools]]
name = "fs.read"
description = "a"

[[tools]]
name = "fs.read"
description = "b"
"#;
        let config: GateConfig = toml::from_str(toml_str).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("declared more than once"));
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let mut config = GateConfig::default();
        config.logging.format = "xml".into();
        let err = config.validate().unwrap_err();
        assert!(err.contains("logging.format"));
    }

    #[test]
    fn test_timeout_without_sweep_interval_rejected() {
        let mut config = GateConfig::default();
        config.ledger.timeout_secs = 30;
        config.ledger.sweep_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_description_is_only_a_warning() {
        let toml_str = r#"
[[tools]]
name = "fs.list"
"#;
        let config: GateConfig = toml::from_str(toml_str).unwrap();
        let warnings = config.validate().unwrap();
        assert!(
            warnings
                .iter()
                .any(|w| w.field == "tools[0].description" && w.severity == WarningSeverity::Warning)
        );
    }

    #[test]
    fn test_resolve_paths_against_config_dir() {
        let mut config = GateConfig::default();
        config.ledger.db_path = Some("approvals.db".into());
        config.resolve_paths(std::path::Path::new("/etc/tollgate"));
        assert_eq!(
            config.ledger.db_path.as_deref(),
            Some(std::path::Path::new("/etc/tollgate/approvals.db"))
        );
        assert_eq!(
            config.skills.dirs,
            vec![std::path::PathBuf::from("/etc/tollgate/skills")]
        );
    }

    #[test]
    fn test_absolute_skill_dirs_untouched() {
        let mut config = GateConfig::default();
        config.skills.dirs = vec!["/opt/skills".into(), "local".into()];
        config.resolve_paths(std::path::Path::new("/home/me/.tollgate"));
        assert_eq!(config.skills.dirs[0], std::path::PathBuf::from("/opt/skills"));
        assert_eq!(
            config.skills.dirs[1],
            std::path::PathBuf::from("/home/me/.tollgate/local")
        );
    }

    // ── ConfigLoader tests ─────────────────────────────────────

    #[test]
    fn test_config_loader_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("tollgate.toml");
        let mut f = std::fs::File::create(&config_path).unwrap();
        writeln!(
            f,
            r#"
[ledger]
db_path = "ledger.db"
timeout_secs = 600

[logging]
format = "json"

[[tools]]
name = "fs.read"
description = "Read a file"
"#
        )
        .unwrap();

        let loader = ConfigLoader::load(Some(config_path.as_path())).unwrap();
        let config = loader.get();
        assert_eq!(config.ledger.timeout_secs, 600);
        assert_eq!(config.ledger.db_path, Some(dir.path().join("ledger.db")));
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.tools.len(), 1);
        assert_eq!(loader.config_dir(), dir.path());
    }

    #[test]
    fn test_config_loader_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("absent.toml");
        let loader = ConfigLoader::load(Some(config_path.as_path())).unwrap();
        let config = loader.get();
        assert!(config.tools.is_empty());
        assert_eq!(config.skills.dirs, vec![dir.path().join("skills")]);
    }

    #[test]
    fn test_config_loader_invalid_toml_errors() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("tollgate.toml");
        std::fs::write(&config_path, "[ledger\ntimeout_secs = ").unwrap();
        assert!(ConfigLoader::load(Some(config_path.as_path())).is_err());
    }

    #[test]
    fn test_config_loader_reload() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("tollgate.toml");

        std::fs::write(&config_path, "[ledger]\ntimeout_secs = 10\n").unwrap();
        let loader = ConfigLoader::load(Some(config_path.as_path())).unwrap();
        assert_eq!(loader.get().ledger.timeout_secs, 10);

        std::fs::write(&config_path, "[ledger]\ntimeout_secs = 20\n").unwrap();
        loader.reload().unwrap();
        assert_eq!(loader.get().ledger.timeout_secs, 20);
    }

    #[test]
    fn test_reload_keeps_previous_config_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("tollgate.toml");

        std::fs::write(&config_path, "[ledger]\ntimeout_secs = 10\n").unwrap();
        let loader = ConfigLoader::load(Some(config_path.as_path())).unwrap();

        std::fs::write(&config_path, "[logging]\nformat = \"xml\"\n").unwrap();
        assert!(loader.reload().is_err());
        assert_eq!(loader.get().ledger.timeout_secs, 10);
    }
}
