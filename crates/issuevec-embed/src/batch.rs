//! Greedy packing of texts into provider-sized sub-batches.
//!
//! Single pass, first fit, no rebalancing: every sub-batch stays within
//! `max_items` and `max_tokens`, and concatenating the sub-batches yields the
//! (sanitized, possibly truncated) input sequence in order.

use issuevec_core::{Error, Result};
use tracing::debug;

use crate::tokenize::{sanitize, TokenEstimator, PLACEHOLDER};

pub type SubBatch = Vec<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    max_items: usize,
    max_tokens: usize,
}

impl BatchLimits {
    pub fn new(max_items: usize, max_tokens: usize) -> Result<Self> {
        if max_items == 0 || max_tokens == 0 {
            return Err(Error::Configuration(format!(
                "batch limits must be positive (max_items={max_items}, max_tokens={max_tokens})"
            )));
        }
        Ok(Self { max_items, max_tokens })
    }

    pub fn max_items(&self) -> usize { self.max_items }

    pub fn max_tokens(&self) -> usize { self.max_tokens }
}

fn fits(text: &str, tokens: usize, max_tokens: usize) -> bool {
    tokens <= max_tokens && !text.trim().is_empty()
}

/// Sanitizes one item and truncates it until it fits `max_tokens` on its own.
/// Returns the text with its estimate.
///
/// At most two cuts are tried before falling back to [`PLACEHOLDER`].
pub fn fit_item(text: &str, max_tokens: usize, estimator: &dyn TokenEstimator) -> (String, usize) {
    let text = sanitize(text);
    let (cut, tokens) = estimator.fit(text, max_tokens);
    if fits(&cut, tokens, max_tokens) {
        if cut.len() < text.len() {
            debug!(chars = text.chars().count(), truncated_tokens = tokens, "truncated oversized item");
        }
        return (cut, tokens);
    }

    let (retry, retry_tokens) = if cut.trim().is_empty() {
        // leading whitespace used up the whole budget
        estimator.fit(text.trim_start(), max_tokens)
    } else {
        // re-encoding a decoded prefix can overshoot; cut by the excess
        estimator.fit(&cut, max_tokens.saturating_sub(tokens - max_tokens))
    };
    if fits(&retry, retry_tokens, max_tokens) {
        debug!(chars = text.chars().count(), truncated_tokens = retry_tokens, "truncated oversized item");
        return (retry, retry_tokens);
    }
    (PLACEHOLDER.to_string(), estimator.estimate(PLACEHOLDER))
}

pub fn pack<S: AsRef<str>>(items: &[S], limits: &BatchLimits, estimator: &dyn TokenEstimator) -> Vec<SubBatch> {
    let mut batches = Vec::new();
    let mut current: SubBatch = Vec::new();
    let mut current_tokens = 0usize;

    for item in items {
        let (text, tokens) = fit_item(item.as_ref(), limits.max_tokens, estimator);

        if !current.is_empty()
            && (current.len() >= limits.max_items || current_tokens + tokens > limits.max_tokens)
        {
            batches.push(std::mem::take(&mut current));
            current_tokens = 0;
        }

        current.push(text);
        current_tokens += tokens;
    }

    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
