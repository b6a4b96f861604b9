//! Fixed-size chunk loop: embed each chunk's texts, check the shape, insert.
//!
//! Chunks run strictly one after another. A failure aborts the run; rows
//! inserted by earlier chunks stay in the target table.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::{debug, info};

use issuevec_core::traits::{EmbedProvider, RowSink};
use issuevec_core::types::{EmbeddingVector, OutputRow, SourceRow};
use issuevec_core::{Error, Result};

/// Pairs each row with its vector after checking count and dimensionality.
/// Nothing is returned unless every vector checks out.
pub fn zip_rows(rows: Vec<SourceRow>, vectors: Vec<EmbeddingVector>, dim: usize) -> Result<Vec<OutputRow>> {
    if vectors.len() != rows.len() {
        return Err(Error::VectorCount { expected: rows.len(), actual: vectors.len() });
    }
    if let Some((index, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dim) {
        return Err(Error::VectorDim { index, expected: dim, actual: v.len() });
    }
    Ok(rows.into_iter().zip(vectors).map(|(row, vec)| OutputRow::from_source(row, vec)).collect())
}

pub struct RowPipeline<'a> {
    provider: &'a dyn EmbedProvider,
    sink: &'a dyn RowSink,
    chunk_size: usize,
    show_progress: bool,
}

impl<'a> RowPipeline<'a> {
    pub fn new(provider: &'a dyn EmbedProvider, sink: &'a dyn RowSink, chunk_size: usize) -> Self {
        Self { provider, sink, chunk_size: chunk_size.max(1), show_progress: true }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        let pb = ProgressBar::new(total as u64);
        if !self.show_progress {
            pb.set_draw_target(ProgressDrawTarget::hidden());
            return pb;
        }
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rows ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }

    /// Embeds and inserts `rows` chunk by chunk. Returns the number of rows
    /// written.
    pub fn run(&self, rows: Vec<SourceRow>) -> Result<usize> {
        let total_rows = rows.len();
        info!(rows = total_rows, chunk_size = self.chunk_size, provider = self.provider.embedder_id(), "starting embedding run");
        let pb = self.progress_bar(total_rows);

        let mut written = 0usize;
        let mut rows = rows.into_iter().peekable();
        while rows.peek().is_some() {
            let chunk: Vec<SourceRow> = rows.by_ref().take(self.chunk_size).collect();
            let texts: Vec<String> = chunk.iter().map(|r| r.text.clone()).collect();

            let vectors = self.provider.embed_batch(&texts)?;
            let output = zip_rows(chunk, vectors, self.provider.dim())?;
            self.sink.insert(&output)?;

            written += output.len();
            pb.set_position(written as u64);
            pb.set_message(format!("inserted {written}"));
            debug!(chunk_rows = output.len(), written, "chunk inserted");
        }

        pb.finish_with_message(format!("{written} rows written"));
        info!(written, "embedding run complete");
        Ok(written)
    }
}
