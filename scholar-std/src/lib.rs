//! Standard plugins for scholar
//!
//! The retrieval tools a host exposes to clients, each backed by one shared
//! [`RagManager`](scholar_core::RagManager):
//! - Session lifecycle (create, list, inspect, delete)
//! - Paper ingestion
//! - Semantic queries

mod rag;

pub use rag::{
    register_rag_plugins, AddPaperPlugin, CreateSessionPlugin, DeleteSessionPlugin,
    ListSessionsPlugin, QueryPlugin, SessionInfoPlugin,
};
