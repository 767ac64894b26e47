use serde::{Deserialize, Serialize};

/// An embedding model the engine knows how to size an index for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingModel {
    /// Name the model is served under (Ollama tag without the version suffix).
    pub id: String,
    pub name: String,
    pub hf_repo: Option<String>,
    pub context_length: usize,
    pub embedding_dim: usize,
    pub description: String,
}

pub struct ModelRegistry {
    models: Vec<EmbeddingModel>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            models: default_models(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&EmbeddingModel> {
        self.models.iter().find(|m| m.id == id)
    }

    /// Looks a model up by the name a server would use for it.
    ///
    /// Accepts `name:tag` forms (`nomic-embed-text:latest`) and HuggingFace
    /// repository ids (`google/embeddinggemma-300m`).
    pub fn find(&self, name: &str) -> Option<&EmbeddingModel> {
        let base = name.split(':').next().unwrap_or(name);

        self.get(base).or_else(|| {
            self.models.iter().find(|m| {
                m.hf_repo
                    .as_deref()
                    .is_some_and(|repo| repo.eq_ignore_ascii_case(base))
            })
        })
    }

    pub fn all(&self) -> &[EmbeddingModel] {
        &self.models
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn default_models() -> Vec<EmbeddingModel> {
    vec![
        EmbeddingModel {
            id: "embeddinggemma".to_string(),
            name: "EmbeddingGemma 300M".to_string(),
            hf_repo: Some("google/embeddinggemma-300m".to_string()),
            context_length: 2048,
            embedding_dim: 768,
            description: "Compact multilingual embedding model, good default for papers".to_string(),
        },
        EmbeddingModel {
            id: "nomic-embed-text".to_string(),
            name: "Nomic Embed Text v1.5".to_string(),
            hf_repo: Some("nomic-ai/nomic-embed-text-v1.5".to_string()),
            context_length: 8192,
            embedding_dim: 768,
            description: "Long-context general purpose embeddings".to_string(),
        },
        EmbeddingModel {
            id: "mxbai-embed-large".to_string(),
            name: "mxbai Embed Large v1".to_string(),
            hf_repo: Some("mixedbread-ai/mxbai-embed-large-v1".to_string()),
            context_length: 512,
            embedding_dim: 1024,
            description: "Higher quality, larger vectors".to_string(),
        },
        EmbeddingModel {
            id: "all-minilm".to_string(),
            name: "all-MiniLM-L6-v2".to_string(),
            hf_repo: Some("sentence-transformers/all-MiniLM-L6-v2".to_string()),
            context_length: 256,
            embedding_dim: 384,
            description: "Small and fast, lower recall on technical text".to_string(),
        },
    ]
}
