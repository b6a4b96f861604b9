//! Embedding provider variants and the factory that picks one per run.
//!
//! The row pipeline only sees `dyn EmbedProvider`; which backend sits behind
//! it is decided once, from the user's choice and [`Settings`].

use std::fmt;
use std::str::FromStr;

use issuevec_core::config::{expand_path, Settings};
pub use issuevec_core::traits::EmbedProvider;
use issuevec_core::Result;

use crate::tokenize::EstimatorKind;

pub mod fake;
pub mod local;
pub mod remote;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Local,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" | "remote" => Ok(ProviderKind::OpenAi),
            "local" => Ok(ProviderKind::Local),
            other => Err(format!("unknown model '{other}' (expected 'openai' or 'local')")),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenAi => f.write_str("openai"),
            ProviderKind::Local => f.write_str("local"),
        }
    }
}

/// Builds the selected provider. Fails with a configuration error (missing
/// key, missing model files) before any data is touched.
pub fn create_provider(kind: ProviderKind, settings: &Settings) -> Result<Box<dyn EmbedProvider>> {
    match kind {
        ProviderKind::OpenAi => {
            let remote = &settings.app.remote;
            let estimator = EstimatorKind::Tiktoken(remote.encoding.clone()).build();
            let provider = remote::OpenAiProvider::new(remote, settings.openai_api_key.as_deref(), estimator)?;
            Ok(Box::new(provider))
        }
        ProviderKind::Local => {
            let local = &settings.app.local;
            let provider = local::LocalProvider::load(local, &expand_path(&local.model_dir))?;
            Ok(Box::new(provider))
        }
    }
}
