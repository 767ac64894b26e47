//! Known embedding models and their output dimensionality.

mod registry;

pub use registry::{default_models, EmbeddingModel, ModelRegistry};
