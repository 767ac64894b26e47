//! scholar - Session-scoped semantic retrieval over scientific papers
//!
//! This is the convenience wrapper crate that re-exports scholar components
//! with optional feature flags for easy usage.
//!
//! # Quick Start
//!
//! ```toml
//! [dependencies]
//! scholar = "0.1"  # Includes core + the RAG tool plugins by default
//! ```
//!
//! # Features
//!
//! - `std` (default): Include the RAG tool plugins
//! - `cuda` / `metal`: Place similarity indexes on the accelerator when one is found

// Re-export core
pub use scholar_core::*;
pub use scholar_plugin;

// Re-export std plugins if feature is enabled
#[cfg(feature = "std")]
pub use scholar_std;

/// Prelude module for convenient imports
pub mod prelude {
    pub use scholar_core::*;
    pub use scholar_plugin::{Permission, Plugin, PluginRegistry};

    #[cfg(feature = "std")]
    pub use scholar_std::register_rag_plugins;
}
