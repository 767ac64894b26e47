use crate::models::ModelRegistry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Unknown embedding model '{0}': set `embedding.dimension` explicitly")]
    UnknownEmbeddingDimension(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration for the retrieval engine.
///
/// Every section has defaults, so a partial `config.yaml` only needs the keys
/// it wants to override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub rag: RagConfig,
    pub index: IndexConfig,
    /// Where embedding and index work should run. Resolved once per manager.
    pub device: DevicePreference,
}

/// Configuration for the embedding model served by Ollama.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model name as known to the embedding server (e.g. `embeddinggemma`).
    pub model: String,
    pub base_url: String,
    /// Output dimensionality. When unset it is looked up in the model registry.
    pub dimension: Option<usize>,
    /// Maximum number of texts sent in a single HTTP request.
    pub batch_size: usize,
    /// Let the server truncate inputs longer than the model context.
    pub truncate: bool,
}

impl EmbeddingConfig {
    /// Returns the configured dimension, or the registry's value for the model.
    pub fn resolve_dimension(&self) -> Result<usize> {
        let dimension = match self.dimension {
            Some(dimension) => dimension,
            None => ModelRegistry::new()
                .find(&self.model)
                .map(|model| model.embedding_dim)
                .ok_or_else(|| ConfigError::UnknownEmbeddingDimension(self.model.clone()))?,
        };

        if dimension == 0 {
            return Err(ConfigError::Invalid(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        Ok(dimension)
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "embeddinggemma".to_string(),
            base_url: "http://localhost:11434".to_string(),
            dimension: None,
            batch_size: 32,
            truncate: true,
        }
    }
}

/// Configuration for chunking and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Size of text chunks in bytes
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in bytes
    pub chunk_overlap: usize,
    /// Number of results returned when the caller gives no bound
    pub top_k: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1200,
            chunk_overlap: 150,
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

/// Similarity index backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    /// Accelerated flat index when the device supports it, CPU flat index otherwise (default)
    #[default]
    Auto,
    /// CPU flat index only
    Flat,
    /// No index at all: ingests are accepted, queries return nothing
    Disabled,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub backend: IndexBackend,
}

/// Requested hardware placement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// Probe for an accelerator and fall back to the CPU (default)
    #[default]
    Auto,
    Cpu,
    Cuda,
    Metal,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from `config.yaml` if it exists, otherwise use defaults.
    pub fn load_or_default() -> Self {
        Self::load("config.yaml").unwrap_or_default()
    }

    /// Write the configuration as YAML.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = serde_yaml::to_string(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.rag.chunk_size == 0 {
            return Err(ConfigError::Invalid("rag.chunk_size must be greater than zero".to_string()));
        }
        if self.rag.chunk_overlap >= self.rag.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                self.rag.chunk_overlap, self.rag.chunk_size
            )));
        }
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::Invalid("embedding.batch_size must be greater than zero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_rag_config_defaults() {
        let config = RagConfig::default();
        assert_eq!(config.chunk_size, 1200);
        assert_eq!(config.chunk_overlap, 150);
        assert_eq!(config.top_k, 5);
    }

    #[test]
    fn test_embedding_dimension_from_registry() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.resolve_dimension().unwrap(), 768);
    }

    #[test]
    fn test_embedding_dimension_override() {
        let config = EmbeddingConfig {
            model: "some-custom-model".to_string(),
            dimension: Some(64),
            ..EmbeddingConfig::default()
        };
        assert_eq!(config.resolve_dimension().unwrap(), 64);
    }

    #[test]
    fn test_unknown_model_without_dimension() {
        let config = EmbeddingConfig {
            model: "some-custom-model".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            config.resolve_dimension(),
            Err(ConfigError::UnknownEmbeddingDimension(_))
        ));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "index:\n  backend: disabled\ndevice: cpu\nrag:\n  top_k: 3").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.index.backend, IndexBackend::Disabled);
        assert_eq!(config.device, DevicePreference::Cpu);
        assert_eq!(config.rag.top_k, 3);
        assert_eq!(config.rag.chunk_size, 1200);
        assert_eq!(config.embedding.model, "embeddinggemma");
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rag:\n  chunk_size: 100\n  chunk_overlap: 100").unwrap();

        assert!(matches!(Config::load(file.path()), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_save_round_trip() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.embedding.model = "nomic-embed-text".to_string();
        config.save(file.path()).unwrap();

        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded.embedding.model, "nomic-embed-text");
    }
}
