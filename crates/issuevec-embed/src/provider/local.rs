//! Local provider backed by a resident sentence model.
//!
//! The model is loaded once and reused. Batching is plain fixed-size
//! chunking; the tokenizer truncates long inputs at the configured
//! sequence length, so no token accounting happens here.

use std::path::Path;
use tracing::debug;

use issuevec_core::config::LocalConfig;
use issuevec_core::traits::EmbedProvider;
use issuevec_core::{Error, Result};

use crate::model::SentenceModel;
use crate::tokenize::sanitize;

pub struct LocalProvider {
    model: SentenceModel,
    batch_size: usize,
    dim: usize,
    id: String,
}

impl LocalProvider {
    pub fn load(config: &LocalConfig, model_dir: &Path) -> Result<Self> {
        let model = SentenceModel::load(model_dir, config.max_seq_length)
            .map_err(|e| Error::Configuration(format!("cannot load local model from {}: {e:#}", model_dir.display())))?;
        if model.hidden_size() != config.dimensions {
            return Err(Error::Configuration(format!(
                "local model produces {}-d vectors, config expects {}",
                model.hidden_size(),
                config.dimensions
            )));
        }
        Ok(Self {
            model,
            batch_size: config.batch_size.max(1),
            dim: config.dimensions,
            id: format!("local:{}:d{}", config.model_name, config.dimensions),
        })
    }
}

impl EmbedProvider for LocalProvider {
    fn embedder_id(&self) -> &str { &self.id }

    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let inputs: Vec<&str> = texts.iter().map(|t| sanitize(t)).collect();
        let mut vectors = Vec::with_capacity(inputs.len());
        for chunk in inputs.chunks(self.batch_size) {
            let embs = self
                .model
                .embed(chunk)
                .map_err(|e| Error::Provider(format!("local model failed: {e:#}")))?;
            vectors.extend(embs);
        }
        debug!(inputs = texts.len(), "embedded locally");
        Ok(vectors)
    }
}
