//! OpenAI embeddings over a blocking HTTP client.
//!
//! Inputs are sanitized and packed under the API's per-request limits, one
//! request is issued per sub-batch, and the vectors are concatenated in
//! sub-batch order. Failures are reported, never retried.

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use issuevec_core::config::RemoteConfig;
use issuevec_core::traits::EmbedProvider;
use issuevec_core::{Error, Result};

use crate::batch::{pack, BatchLimits};
use crate::tokenize::TokenEstimator;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
    encoding_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

pub struct OpenAiProvider {
    client: Client,
    endpoint: String,
    model: String,
    dim: usize,
    limits: BatchLimits,
    estimator: Box<dyn TokenEstimator>,
    id: String,
}

impl OpenAiProvider {
    pub fn new(config: &RemoteConfig, api_key: Option<&str>, estimator: Box<dyn TokenEstimator>) -> Result<Self> {
        let api_key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Configuration(format!("{} env var is not set", issuevec_core::config::API_KEY_ENV)))?;

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| Error::Configuration("API key is not a valid header value".to_string()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;

        let limits = BatchLimits::new(config.max_items, config.effective_max_tokens)?;
        let id = format!("openai:{}:d{}", config.model, config.dimensions);
        info!(model = %config.model, max_items = limits.max_items(), max_tokens = limits.max_tokens(), "remote embedding provider ready");

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            dim: config.dimensions,
            limits,
            estimator,
            id,
        })
    }

    fn request(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest { model: &self.model, input: batch, dimensions: self.dim, encoding_format: "float" };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|e| Error::Provider(format!("embeddings request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Error::Provider(format!("embeddings request failed ({status}): {text}")));
        }

        let mut parsed: EmbeddingResponse = resp
            .json()
            .map_err(|e| Error::Provider(format!("malformed embeddings response: {e}")))?;
        if parsed.data.len() != batch.len() {
            return Err(Error::Provider(format!(
                "malformed embeddings response: {} embeddings for {} inputs",
                parsed.data.len(),
                batch.len()
            )));
        }
        parsed.data.sort_by_key(|d| d.index);
        if parsed.data.iter().enumerate().any(|(i, d)| d.index != i) {
            return Err(Error::Provider("malformed embeddings response: indices are not 0..n".to_string()));
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

impl EmbedProvider for OpenAiProvider {
    fn embedder_id(&self) -> &str { &self.id }

    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batches = pack(texts, &self.limits, self.estimator.as_ref());
        debug!(inputs = texts.len(), requests = batches.len(), "embedding via remote API");

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in &batches {
            vectors.extend(self.request(batch)?);
        }
        Ok(vectors)
    }
}
