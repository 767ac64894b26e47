use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Unknown plugin: {0}")]
    UnknownPlugin(String),
}

pub type Result<T> = std::result::Result<T, PluginError>;

/// Permissions required by a plugin.
///
/// `read` covers inspecting sessions and querying them; `write` covers
/// creating, filling and deleting them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permission {
    pub read: bool,
    pub write: bool,
}

impl Permission {
    pub const READ_ONLY: Self = Self {
        read: true,
        write: false,
    };

    pub const READ_WRITE: Self = Self {
        read: true,
        write: true,
    };

    pub const NONE: Self = Self {
        read: false,
        write: false,
    };

    /// Check if this permission allows the required permission.
    pub fn allows(&self, required: &Permission) -> bool {
        (!required.read || self.read) && (!required.write || self.write)
    }
}

/// Output from plugin execution.
///
/// `content` is what a human or a model reads; `metadata` carries the same
/// result in structured form when there is one.
#[derive(Debug, Clone)]
pub struct PluginOutput {
    pub content: String,
    pub metadata: Option<Value>,
}

impl PluginOutput {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: None,
        }
    }

    /// Renders `value` as pretty JSON and keeps it as metadata too.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        let metadata = serde_json::to_value(value)
            .map_err(|e| PluginError::ExecutionFailed(format!("Failed to serialize output: {}", e)))?;
        let content = serde_json::to_string_pretty(&metadata)
            .map_err(|e| PluginError::ExecutionFailed(format!("Failed to serialize output: {}", e)))?;

        Ok(Self {
            content,
            metadata: Some(metadata),
        })
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

impl fmt::Display for PluginOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.content)
    }
}

/// Core trait that all plugins must implement.
///
/// Each plugin is one operation of the tool surface. Clients discover it
/// through its name, description and parameter schema.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique identifier for this plugin.
    fn name(&self) -> &str;

    /// Human-readable description of what this plugin does.
    fn description(&self) -> &str;

    /// JSON schema defining the plugin's parameters.
    fn parameter_schema(&self) -> Value;

    /// Permissions required to execute this plugin.
    fn required_permission(&self) -> Permission;

    /// Execute the plugin with given input parameters.
    /// The input should match the parameter schema.
    async fn execute(&self, input: Value) -> Result<PluginOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_permission_allows() {
        assert!(Permission::READ_WRITE.allows(&Permission::READ_ONLY));
        assert!(!Permission::READ_ONLY.allows(&Permission::READ_WRITE));
        assert!(Permission::NONE.allows(&Permission::NONE));
        assert!(!Permission::NONE.allows(&Permission::READ_ONLY));
    }

    #[test]
    fn test_json_output() {
        let output = PluginOutput::json(&vec!["a", "b"]).unwrap();

        assert_eq!(output.metadata, Some(json!(["a", "b"])));
        assert_eq!(serde_json::from_str::<Value>(&output.content).unwrap(), json!(["a", "b"]));
    }
}
