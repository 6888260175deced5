#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    use tollgate_approval::Verdict;
    use tollgate_config::GateConfig;
    use tollgate_core::{
        ExecutionContext, GateError, InvocationContext, ToolCall, ToolExecutor, ToolResult,
    };
    use tollgate_runtime::{Invocation, Resolution, Runtime};

    struct Echo;

    #[async_trait]
    impl ToolExecutor for Echo {
        async fn execute(
            &self,
            call: &ToolCall,
            _ctx: &ExecutionContext,
        ) -> tollgate_core::Result<ToolResult> {
            Ok(ToolResult::text(call.id.clone(), call.arguments.to_string()))
        }
    }

    fn config(dir: &std::path::Path) -> GateConfig {
        let raw = r#"
            [ledger]
            db_path = "approvals.db"

            [[tools]]
            name = "email.send"
            description = "Send an email"
            sensitive = true
            operation_type = "network"

            [tools.parameters]
            type = "object"
            required = ["to"]

            [tools.parameters.properties.to]
            type = "string"

            [[tools]]
            name = "fs.read"
            operation_type = "read"
        "#;
        let mut config: GateConfig = toml::from_str(raw).unwrap();
        config.resolve_paths(dir);
        config
    }

    #[tokio::test]
    async fn runtime_wires_config_to_dispatcher() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("skills/memory")).unwrap();
        std::fs::write(
            dir.path().join("skills/memory/SKILL.md"),
            "---\nname: memory\ndescription: Remember things\n---\n\nUse it.",
        )
        .unwrap();

        let runtime = Runtime::from_config(&config(dir.path()), Arc::new(Echo)).unwrap();
        assert_eq!(runtime.registry.len(), 2);
        assert!(runtime.ledger.is_persistent());

        let ctx = InvocationContext::new("agent-1", "user-1");
        let Invocation::AwaitingApproval(pending) = runtime
            .dispatcher
            .invoke(ToolCall::new("c1", "email.send", json!({ "to": "a@example.com" })), ctx.clone())
            .await
            .unwrap()
        else {
            panic!("expected approval");
        };
        runtime
            .ledger
            .decide(pending.approval_id(), Verdict::Approved, "user1", None)
            .unwrap();
        assert!(matches!(pending.wait().await, Resolution::Executed(_)));

        // Strict arguments are on by default.
        let err = runtime
            .dispatcher
            .invoke(
                ToolCall::new("c2", "email.send", json!({ "to": "a@example.com", "bcc": "x" })),
                ctx,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::SchemaValidationFailed { .. }));

        let skill = runtime.skills.activate("memory").await.unwrap();
        assert_eq!(skill.instructions().trim(), "Use it.");

        assert!(dir.path().join("approvals.db").exists());
    }

    #[test]
    fn duplicate_configured_tools_fail_start_up() {
        let mut config = GateConfig::default();
        let tool: tollgate_core::Capability =
            serde_json::from_value(json!({ "name": "fs.read" })).unwrap();
        config.tools = vec![tool.clone(), tool];
        let err = Runtime::from_config(&config, Arc::new(Echo)).err().unwrap();
        assert!(matches!(err, GateError::DuplicateCapability(_)));
    }
}
