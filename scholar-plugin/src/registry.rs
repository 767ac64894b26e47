use crate::{Permission, Plugin, PluginError, PluginOutput};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry for managing plugins.
///
/// The registry is responsible for:
/// - Registering plugins with permission checking
/// - Looking up plugins by name
/// - Executing plugins
/// - Providing plugin specifications to clients
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<dyn Plugin>>,
    granted_permissions: Permission,
}

impl PluginRegistry {
    /// Create a new plugin registry with the given permissions.
    pub fn new(granted_permissions: Permission) -> Self {
        Self {
            plugins: HashMap::new(),
            granted_permissions,
        }
    }

    /// Register a plugin if permissions allow.
    /// Returns true if the plugin was registered, false if denied by permissions.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> bool {
        let required = plugin.required_permission();

        if !self.granted_permissions.allows(&required) {
            return false;
        }

        self.plugins.insert(plugin.name().to_string(), plugin);
        true
    }

    /// Get a plugin by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
        self.plugins.get(name)
    }

    /// Get all registered plugins.
    pub fn all(&self) -> Vec<&Arc<dyn Plugin>> {
        self.plugins.values().collect()
    }

    /// Names of the registered plugins, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.plugins.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Execute a plugin by name.
    pub async fn execute(&self, name: &str, input: Value) -> Result<PluginOutput, PluginError> {
        let plugin = self
            .get(name)
            .ok_or_else(|| PluginError::UnknownPlugin(name.to_string()))?;

        plugin.execute(input).await
    }

    /// Get plugin specifications, sorted by name.
    pub fn plugin_specs(&self) -> Vec<Value> {
        self.names()
            .into_iter()
            .filter_map(|name| self.plugins.get(name))
            .map(|plugin| {
                serde_json::json!({
                    "name": plugin.name(),
                    "description": plugin.description(),
                    "parameters": plugin.parameter_schema(),
                })
            })
            .collect()
    }
}
