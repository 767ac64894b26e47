use async_trait::async_trait;
use scholar_core::{RagError, RagManager};
use scholar_plugin::{Permission, Plugin, PluginError, PluginOutput, PluginRegistry, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

fn parse<T: serde::de::DeserializeOwned>(input: Value) -> Result<T> {
    serde_json::from_value(input)
        .map_err(|e| PluginError::InvalidInput(format!("Invalid parameters: {}", e)))
}

fn plugin_error(err: RagError) -> PluginError {
    match err {
        RagError::SessionNotFound { .. } => PluginError::NotFound(err.to_string()),
        other => PluginError::ExecutionFailed(other.to_string()),
    }
}

fn session_id_schema() -> Value {
    serde_json::json!({
        "type": "string",
        "description": "Session id returned by rag_create_session"
    })
}

#[derive(Debug, Deserialize)]
struct SessionParams {
    session_id: String,
}

/// Creates an empty retrieval session.
pub struct CreateSessionPlugin {
    manager: Arc<RagManager>,
}

impl CreateSessionPlugin {
    pub fn new(manager: Arc<RagManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Plugin for CreateSessionPlugin {
    fn name(&self) -> &str {
        "rag_create_session"
    }

    fn description(&self) -> &str {
        "Create a new session for collecting papers and asking questions about them"
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    fn required_permission(&self) -> Permission {
        Permission::READ_WRITE
    }

    async fn execute(&self, _input: Value) -> Result<PluginOutput> {
        let session_id = self.manager.create_session().await;
        Ok(PluginOutput::new(session_id.clone())
            .with_metadata(serde_json::json!({ "session_id": session_id })))
    }
}

/// Ingests a PDF already on disk into a session.
pub struct AddPaperPlugin {
    manager: Arc<RagManager>,
}

#[derive(Debug, Deserialize)]
struct AddPaperParams {
    session_id: String,
    paper_id: String,
    path: PathBuf,
}

impl AddPaperPlugin {
    pub fn new(manager: Arc<RagManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Plugin for AddPaperPlugin {
    fn name(&self) -> &str {
        "rag_add_paper"
    }

    fn description(&self) -> &str {
        "Add a downloaded PDF paper to a session so it can be queried"
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "required": ["session_id", "paper_id", "path"],
            "properties": {
                "session_id": session_id_schema(),
                "paper_id": {
                    "type": "string",
                    "description": "Identifier of the paper, unique within the session (e.g. an arXiv id or DOI)"
                },
                "path": {
                    "type": "string",
                    "description": "Local path to the PDF file"
                }
            }
        })
    }

    fn required_permission(&self) -> Permission {
        Permission::READ_WRITE
    }

    async fn execute(&self, input: Value) -> Result<PluginOutput> {
        let params: AddPaperParams = parse(input)?;
        if params.paper_id.trim().is_empty() {
            return Err(PluginError::InvalidInput("paper_id must not be empty".to_string()));
        }

        let status = self
            .manager
            .add_paper(&params.session_id, &params.paper_id, &params.path)
            .await
            .map_err(plugin_error)?;

        let metadata = serde_json::to_value(&status)
            .map_err(|e| PluginError::ExecutionFailed(e.to_string()))?;
        Ok(PluginOutput::new(status.to_string()).with_metadata(metadata))
    }
}

/// Semantic search over the papers in a session.
pub struct QueryPlugin {
    manager: Arc<RagManager>,
}

#[derive(Debug, Deserialize)]
struct QueryParams {
    session_id: String,
    query: String,
    k: Option<usize>,
}

impl QueryPlugin {
    pub fn new(manager: Arc<RagManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Plugin for QueryPlugin {
    fn name(&self) -> &str {
        "rag_query"
    }

    fn description(&self) -> &str {
        "Find the passages in a session's papers most relevant to a question. \
         Results are ordered best first; a lower score means more relevant."
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "required": ["session_id", "query"],
            "properties": {
                "session_id": session_id_schema(),
                "query": {
                    "type": "string",
                    "description": "Natural-language question or search text"
                },
                "k": {
                    "type": "integer",
                    "minimum": 0,
                    "description": format!("Maximum number of passages (default: {})", self.manager.default_top_k())
                }
            }
        })
    }

    fn required_permission(&self) -> Permission {
        Permission::READ_ONLY
    }

    async fn execute(&self, input: Value) -> Result<PluginOutput> {
        let params: QueryParams = parse(input)?;
        if params.query.trim().is_empty() {
            return Err(PluginError::InvalidInput("query must not be empty".to_string()));
        }

        let records = self
            .manager
            .query(&params.session_id, &params.query, params.k)
            .await
            .map_err(plugin_error)?;

        debug!(session_id = %params.session_id, results = records.len(), "rag_query");
        PluginOutput::json(&records)
    }
}

/// Lists live session ids.
pub struct ListSessionsPlugin {
    manager: Arc<RagManager>,
}

impl ListSessionsPlugin {
    pub fn new(manager: Arc<RagManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Plugin for ListSessionsPlugin {
    fn name(&self) -> &str {
        "rag_list_sessions"
    }

    fn description(&self) -> &str {
        "List the ids of all active sessions"
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    fn required_permission(&self) -> Permission {
        Permission::READ_ONLY
    }

    async fn execute(&self, _input: Value) -> Result<PluginOutput> {
        PluginOutput::json(&self.manager.list_sessions().await)
    }
}

/// Reports which papers a session holds.
///
/// An unknown session yields an empty object rather than an error.
pub struct SessionInfoPlugin {
    manager: Arc<RagManager>,
}

impl SessionInfoPlugin {
    pub fn new(manager: Arc<RagManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Plugin for SessionInfoPlugin {
    fn name(&self) -> &str {
        "rag_session_info"
    }

    fn description(&self) -> &str {
        "Show how many and which papers a session contains"
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "required": ["session_id"],
            "properties": {
                "session_id": session_id_schema()
            }
        })
    }

    fn required_permission(&self) -> Permission {
        Permission::READ_ONLY
    }

    async fn execute(&self, input: Value) -> Result<PluginOutput> {
        let params: SessionParams = parse(input)?;

        match self.manager.get_session_info(&params.session_id).await {
            Some(info) => PluginOutput::json(&info),
            None => PluginOutput::json(&serde_json::Map::new()),
        }
    }
}

/// Drops a session and everything ingested into it.
pub struct DeleteSessionPlugin {
    manager: Arc<RagManager>,
}

impl DeleteSessionPlugin {
    pub fn new(manager: Arc<RagManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Plugin for DeleteSessionPlugin {
    fn name(&self) -> &str {
        "rag_delete_session"
    }

    fn description(&self) -> &str {
        "Delete a session and all papers added to it"
    }

    fn parameter_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "required": ["session_id"],
            "properties": {
                "session_id": session_id_schema()
            }
        })
    }

    fn required_permission(&self) -> Permission {
        Permission::READ_WRITE
    }

    async fn execute(&self, input: Value) -> Result<PluginOutput> {
        let params: SessionParams = parse(input)?;
        let deleted = self.manager.delete_session(&params.session_id).await;

        let content = if deleted {
            format!("Session {} deleted.", params.session_id)
        } else {
            format!("Session {} not found.", params.session_id)
        };
        Ok(PluginOutput::new(content).with_metadata(serde_json::json!({ "deleted": deleted })))
    }
}

/// Registers every RAG plugin the registry's permissions allow.
///
/// Returns how many were registered.
pub fn register_rag_plugins(registry: &mut PluginRegistry, manager: Arc<RagManager>) -> usize {
    let plugins: Vec<Arc<dyn Plugin>> = vec![
        Arc::new(CreateSessionPlugin::new(manager.clone())),
        Arc::new(AddPaperPlugin::new(manager.clone())),
        Arc::new(QueryPlugin::new(manager.clone())),
        Arc::new(ListSessionsPlugin::new(manager.clone())),
        Arc::new(SessionInfoPlugin::new(manager.clone())),
        Arc::new(DeleteSessionPlugin::new(manager)),
    ];

    plugins
        .into_iter()
        .filter(|plugin| registry.register(plugin.clone()))
        .count()
}
