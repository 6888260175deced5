use jsonschema::JSONSchema;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

use tollgate_core::{Capability, GateError, Result};

/// Every capability the dispatcher can route to, with its compiled argument
/// schema.
///
/// Built with `&mut self` at start-up, then shared behind an `Arc` and only
/// read.
pub struct CapabilityRegistry {
    tools: Vec<Capability>,
    index: HashMap<String, usize>,
    validators: Vec<JSONSchema>,
    strict: bool,
}

impl CapabilityRegistry {
    /// `strict` makes object schemas that say nothing about
    /// `additionalProperties` reject unknown fields.
    pub fn new(strict: bool) -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
            validators: Vec::new(),
            strict,
        }
    }

    /// Register every configured tool, stopping at the first failure.
    pub fn from_config(tools: &[Capability], strict: bool) -> Result<Self> {
        let mut registry = Self::new(strict);
        for tool in tools {
            registry.register(tool.clone())?;
        }
        info!(tools = registry.len(), strict, "capability registry built");
        Ok(registry)
    }

    pub fn register(&mut self, capability: Capability) -> Result<()> {
        if self.index.contains_key(&capability.name) {
            return Err(GateError::DuplicateCapability(capability.name));
        }

        let mut schema = capability.parameters.clone();
        if self.strict {
            close_object_schema(&mut schema);
        }
        let validator = JSONSchema::compile(&schema).map_err(|e| GateError::InvalidSchema {
            tool: capability.name.clone(),
            reason: e.to_string(),
        })?;

        debug!(
            tool = %capability.name,
            sensitive = capability.sensitive,
            operation = %capability.operation_type,
            "capability registered"
        );
        self.index.insert(capability.name.clone(), self.tools.len());
        self.tools.push(capability);
        self.validators.push(validator);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&Capability> {
        self.index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| GateError::CapabilityNotFound(name.to_string()))
    }

    /// Registration order.
    pub fn list(&self) -> &[Capability] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Check `arguments` against the tool's schema, reporting every violation.
    pub fn validate(&self, name: &str, arguments: &Value) -> Result<()> {
        let i = *self
            .index
            .get(name)
            .ok_or_else(|| GateError::CapabilityNotFound(name.to_string()))?;

        if let Err(errors) = self.validators[i].validate(arguments) {
            let details: Vec<String> = errors
                .map(|e| {
                    let pointer = e.instance_path.to_string();
                    if pointer.is_empty() {
                        format!("/: {e}")
                    } else {
                        format!("{pointer}: {e}")
                    }
                })
                .collect();
            return Err(GateError::SchemaValidationFailed {
                tool: name.to_string(),
                details,
            });
        }
        Ok(())
    }
}

/// Add `additionalProperties: false` to an object schema that leaves it open.
fn close_object_schema(schema: &mut Value) {
    let Some(obj) = schema.as_object_mut() else {
        return;
    };
    let is_object = obj.get("type").and_then(Value::as_str) == Some("object")
        || obj.contains_key("properties");
    if is_object && !obj.contains_key("additionalProperties") {
        obj.insert("additionalProperties".into(), Value::Bool(false));
    }
}
