//! Tool-surface contract for the retrieval engine.
//!
//! A [`Plugin`] is one named operation with a JSON parameter schema. Hosts
//! collect plugins in a [`PluginRegistry`] and dispatch calls to them by name.

mod plugin;
mod registry;

pub use plugin::{Permission, Plugin, PluginError, PluginOutput, Result};
pub use registry::PluginRegistry;
