use super::store::VectorStore;
use super::types::SessionInfo;
use std::collections::BTreeSet;
use tokio::sync::RwLock;

/// Mutable state of one session, guarded as a unit.
///
/// The paper set and the store change under the same write guard so a paper
/// id is only recorded once its chunks are in the index.
pub(crate) struct SessionState {
    pub(crate) store: VectorStore,
    pub(crate) papers: BTreeSet<String>,
}

/// An isolated retrieval context.
///
/// Queries take the read side of the lock and may overlap; ingestion takes the
/// write side, so an add never interleaves with another add or with a search
/// on the same session. Sessions never share a lock.
pub(crate) struct Session {
    pub(crate) id: String,
    pub(crate) state: RwLock<SessionState>,
}

impl Session {
    pub(crate) fn new(id: String, store: VectorStore) -> Self {
        Self {
            id,
            state: RwLock::new(SessionState {
                store,
                papers: BTreeSet::new(),
            }),
        }
    }

    pub(crate) async fn contains_paper(&self, paper_id: &str) -> bool {
        self.state.read().await.papers.contains(paper_id)
    }

    pub(crate) async fn info(&self) -> SessionInfo {
        let state = self.state.read().await;
        SessionInfo {
            id: self.id.clone(),
            paper_count: state.papers.len(),
            active_papers: state.papers.iter().cloned().collect(),
        }
    }
}
