use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use issuevec_core::traits::EmbedProvider;
use issuevec_core::Result;

use crate::tokenize::sanitize;

/// Deterministic hashing embedder for tests and offline dry runs.
/// Same text, same unit-length vector.
pub struct FakeProvider {
    dim: usize,
    id: String,
}

impl FakeProvider {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1), id: format!("fake:xxhash:d{}", dim.max(1)) }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in sanitize(text).split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl EmbedProvider for FakeProvider {
    fn embedder_id(&self) -> &str { &self.id }

    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
