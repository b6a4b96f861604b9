use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use issuevec_core::config::{expand_path, Settings};
use issuevec_core::profile::ConnectionProfile;
use issuevec_core::traits::{EmbedProvider, RowSink};
use issuevec_core::types::OutputRow;
use issuevec_core::Error;
use issuevec_embed::provider::fake::FakeProvider;
use issuevec_embed::{create_provider, ProviderKind};
use issuevec_sync::{ClickHouseClient, RowPipeline};

/// Embed GitHub issues stored in ClickHouse and write the vectors back.
#[derive(Debug, Parser)]
#[command(name = "issuevec", version)]
struct Args {
    /// Embedding backend: `openai` (remote API) or `local` (in-process model).
    #[arg(long, default_value_t = ProviderKind::OpenAi)]
    model: ProviderKind,

    /// Embed with a deterministic hashing model and skip the insert.
    #[arg(long)]
    dry_run: bool,

    /// Hide the progress bar.
    #[arg(long, env = "ISSUEVEC_QUIET")]
    quiet: bool,
}

/// Discards rows; used by `--dry-run`.
struct DiscardSink;

impl RowSink for DiscardSink {
    fn insert(&self, rows: &[OutputRow]) -> issuevec_core::Result<()> {
        info!(rows = rows.len(), "dry run, skipping insert");
        Ok(())
    }
}

/// Why a run stopped, phrased for the operator.
fn abort_reason(err: &Error) -> &'static str {
    if err.is_data_shape() {
        return "provider returned vectors that do not line up with the chunk; the chunk was not inserted";
    }
    match err {
        Error::Configuration(_) => "configuration is invalid",
        Error::Provider(_) => "embedding provider failed",
        Error::Store(_) => "ClickHouse request failed",
        Error::VectorCount { .. } | Error::VectorDim { .. } => "provider output has the wrong shape",
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();
    let settings = Settings::load().context("loading configuration")?;
    let ch = &settings.app.clickhouse;

    // Everything that can fail on configuration happens before any I/O.
    let profile_path = expand_path(&ch.config_file);
    let profile = ConnectionProfile::load(&profile_path, &ch.connection)
        .with_context(|| format!("reading connection '{}' from {}", ch.connection, profile_path.display()))?;
    info!(?profile, "using ClickHouse connection");

    let provider: Box<dyn EmbedProvider> = if args.dry_run {
        let dim = match args.model {
            ProviderKind::OpenAi => settings.app.remote.dimensions,
            ProviderKind::Local => settings.app.local.dimensions,
        };
        warn!(dim, "dry run: fake embeddings, nothing is written");
        Box::new(FakeProvider::new(dim))
    } else {
        create_provider(args.model, &settings).context("initialising embedding provider")?
    };
    info!(provider = provider.embedder_id(), dim = provider.dim(), "embedding provider ready");

    let client = ClickHouseClient::new(&profile, ch)?;
    let rows = client.fetch_source_rows(&ch.repo).context("fetching source rows")?;
    println!("Fetched {} rows.", rows.len());

    let sink: &dyn RowSink = if args.dry_run { &DiscardSink } else { &client };
    let pipeline = RowPipeline::new(provider.as_ref(), sink, settings.app.pipeline.chunk_size).with_progress(!args.quiet);
    let written = match pipeline.run(rows) {
        Ok(n) => n,
        Err(e) => {
            error!(error = %e, "{}", abort_reason(&e));
            return Err(anyhow::Error::new(e).context("embedding run aborted"));
        }
    };

    println!("Done. {written} rows written.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_errors_get_their_own_reason() {
        let count = Error::VectorCount { expected: 64, actual: 63 };
        let dim = Error::VectorDim { index: 3, expected: 1536, actual: 384 };
        assert!(abort_reason(&count).contains("not inserted"));
        assert_eq!(abort_reason(&count), abort_reason(&dim));
        assert_ne!(abort_reason(&count), abort_reason(&Error::Provider("timeout".into())));
        assert_eq!(abort_reason(&Error::Store("500".into())), "ClickHouse request failed");
    }
}
