//! Token cost estimation in the provider's billing units.
//!
//! An estimator is picked once at startup and handed to the packer. Both
//! variants guarantee that truncating a string never raises its estimate.

use tiktoken_rs::CoreBPE;
use tracing::warn;

/// Stands in for empty or whitespace-only text, which the API rejects.
pub const PLACEHOLDER: &str = ".";

pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;
    /// Shorten `text` to roughly `max_tokens`, keeping it valid text.
    /// Callers re-check the estimate; this may undershoot but never grows.
    fn truncate(&self, text: &str, max_tokens: usize) -> String;

    /// `text`, or its truncation when it exceeds `max_tokens`, together with
    /// the estimate of the returned string.
    fn fit(&self, text: &str, max_tokens: usize) -> (String, usize) {
        let cut = self.truncate(text, max_tokens);
        let tokens = self.estimate(&cut);
        (cut, tokens)
    }
}

/// Empty or whitespace-only input becomes [`PLACEHOLDER`]; positions are kept.
pub fn sanitize(text: &str) -> &str {
    if text.trim().is_empty() { PLACEHOLDER } else { text }
}

/// `ceil(chars / 3)`; used when no exact tokenizer is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEstimator;

const CHARS_PER_TOKEN: usize = 3;

impl TokenEstimator for HeuristicEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.chars().count().div_ceil(CHARS_PER_TOKEN)
    }

    fn truncate(&self, text: &str, max_tokens: usize) -> String {
        text.chars().take(max_tokens * CHARS_PER_TOKEN).collect()
    }
}

/// Exact BPE counts for OpenAI embedding models.
pub struct TiktokenEstimator {
    bpe: CoreBPE,
}

/// BPE never runs on more than this many chars per token of budget; input
/// past that point is cut before encoding.
const MAX_CHARS_PER_TOKEN: usize = 8;

fn char_prefix(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

impl TiktokenEstimator {
    pub fn for_encoding(encoding: &str) -> anyhow::Result<Self> {
        let bpe = match encoding {
            "cl100k_base" => tiktoken_rs::cl100k_base()?,
            "o200k_base" => tiktoken_rs::o200k_base()?,
            "p50k_base" => tiktoken_rs::p50k_base()?,
            "r50k_base" => tiktoken_rs::r50k_base()?,
            other => anyhow::bail!("unknown tiktoken encoding: {other}"),
        };
        Ok(Self { bpe })
    }
}

impl TokenEstimator for TiktokenEstimator {
    fn estimate(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    fn truncate(&self, text: &str, max_tokens: usize) -> String {
        self.fit(text, max_tokens).0
    }

    fn fit(&self, text: &str, max_tokens: usize) -> (String, usize) {
        let head = char_prefix(text, max_tokens.saturating_mul(MAX_CHARS_PER_TOKEN));
        let tokens = self.bpe.encode_ordinary(head);
        if tokens.len() <= max_tokens {
            return (head.to_string(), tokens.len());
        }
        // A cut inside a multi-byte character does not decode; back off at
        // most a character's worth of tokens.
        let floor = max_tokens.saturating_sub(3).max(1);
        for end in (floor..=max_tokens).rev() {
            if let Ok(cut) = self.bpe.decode(tokens[..end].to_vec()) {
                let n = self.estimate(&cut);
                return (cut, n);
            }
        }
        let cut = HeuristicEstimator.truncate(head, max_tokens);
        let n = self.estimate(&cut);
        (cut, n)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EstimatorKind {
    Tiktoken(String),
    Heuristic,
}

impl EstimatorKind {
    /// Builds the estimator, degrading to the heuristic if the BPE tables
    /// cannot be loaded.
    pub fn build(&self) -> Box<dyn TokenEstimator> {
        match self {
            EstimatorKind::Tiktoken(encoding) => match TiktokenEstimator::for_encoding(encoding) {
                Ok(est) => Box::new(est),
                Err(e) => {
                    warn!(encoding = %encoding, error = %e, "tiktoken unavailable, using character heuristic");
                    Box::new(HeuristicEstimator)
                }
            },
            EstimatorKind::Heuristic => Box::new(HeuristicEstimator),
        }
    }
}
