//! Tool Registry
//!
//! Static mapping from tool name to descriptor, filled once at startup and
//! then shared read-only (usually behind an `Arc`). Registration order is
//! kept so capability listings are stable. Each input schema is compiled
//! when its tool is registered.

use crate::error::{Result, ToolError};
use crate::schema::Schema;
use crate::validator::SchemaValidator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Backend operation a tool is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    VectorQuery,
    VectorUpsert,
    FetchDocument,
}

/// Immutable description of a callable tool
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Schema,
    pub capability: Capability,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: impl Into<Schema>,
        capability: Capability,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: input_schema.into(),
            capability,
        }
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.to_json_schema(),
        }
    }
}

/// Wire form of a descriptor for capability discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<ToolDescriptor>>,
    validators: HashMap<String, SchemaValidator>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; names must be unique
    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<()> {
        if self.tools.contains_key(&descriptor.name) {
            return Err(ToolError::DuplicateTool(descriptor.name));
        }

        let validator = SchemaValidator::compile(&descriptor.input_schema).map_err(|message| {
            ToolError::InvalidSchema {
                tool: descriptor.name.clone(),
                message,
            }
        })?;

        let name = descriptor.name.clone();
        self.validators.insert(name.clone(), validator);
        self.tools.insert(name.clone(), Arc::new(descriptor));
        self.order.push(name.clone());

        debug!("Registered tool: {}", name);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<ToolDescriptor>> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// Check `arguments` against the compiled schema of tool `name`
    pub fn validate<'a>(&self, name: &str, arguments: &'a Value) -> Result<&'a Value> {
        let validator = self
            .validators
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        Ok(validator.validate(arguments)?)
    }

    /// All descriptors in registration order
    pub fn list(&self) -> Vec<Arc<ToolDescriptor>> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name).cloned())
            .collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.list().iter().map(|d| d.definition()).collect()
    }

    pub fn count(&self) -> usize {
        self.tools.len()
    }
}
