use std::sync::Mutex;

use chrono::NaiveDate;
use issuevec_core::traits::{EmbedProvider, RowSink};
use issuevec_core::types::{OutputRow, SourceRow};
use issuevec_core::{Error, Result};
use issuevec_embed::provider::fake::FakeProvider;
use issuevec_sync::RowPipeline;

fn rows(n: u32) -> Vec<SourceRow> {
    let ts = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(12, 0, 0).unwrap();
    (0..n)
        .map(|i| SourceRow {
            id: i,
            title: format!("title {i}"),
            state: if i % 2 == 0 { "open".into() } else { "closed".into() },
            labels: vec!["bug".into()],
            created_at: ts,
            updated_at: ts,
            text: format!("title {i} title {i}\nbody {i}"),
        })
        .collect()
}

#[derive(Default)]
struct RecordingSink {
    batches: Mutex<Vec<Vec<OutputRow>>>,
}

impl RecordingSink {
    fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }
    fn all(&self) -> Vec<OutputRow> {
        self.batches.lock().unwrap().concat()
    }
}

impl RowSink for RecordingSink {
    fn insert(&self, rows: &[OutputRow]) -> Result<()> {
        self.batches.lock().unwrap().push(rows.to_vec());
        Ok(())
    }
}

/// Vector for the i-th text of a call is `[i; dim]`; can be told to drop
/// one vector, shrink one, or fail on a given call.
struct StubProvider {
    dim: usize,
    short_by_one: bool,
    bad_dim: bool,
    fail_on_call: Option<usize>,
    calls: Mutex<usize>,
}

impl StubProvider {
    fn new(dim: usize) -> Self {
        Self { dim, short_by_one: false, bad_dim: false, fail_on_call: None, calls: Mutex::new(0) }
    }
}

impl EmbedProvider for StubProvider {
    fn embedder_id(&self) -> &str { "stub" }

    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let call = {
            let mut c = self.calls.lock().unwrap();
            *c += 1;
            *c
        };
        if self.fail_on_call == Some(call) {
            return Err(Error::Provider("upstream unavailable".into()));
        }
        let mut out: Vec<Vec<f32>> = (0..texts.len()).map(|i| vec![i as f32; self.dim]).collect();
        if self.short_by_one {
            out.pop();
        }
        if self.bad_dim {
            if let Some(v) = out.last_mut() {
                v.pop();
            }
        }
        Ok(out)
    }
}

#[test]
fn full_chunk_is_zipped_in_order() {
    let provider = StubProvider::new(3);
    let sink = RecordingSink::default();
    let written = RowPipeline::new(&provider, &sink, 64).with_progress(false).run(rows(64)).unwrap();

    assert_eq!(written, 64);
    assert_eq!(sink.batch_sizes(), vec![64]);
    for (i, out) in sink.all().iter().enumerate() {
        assert_eq!(out.id, i as u32);
        assert_eq!(out.title, format!("title {i}"));
        assert_eq!(out.composite_vec, vec![i as f32; 3]);
    }
}

#[test]
fn rows_split_into_fixed_chunks() {
    let provider = FakeProvider::new(8);
    let sink = RecordingSink::default();
    let written = RowPipeline::new(&provider, &sink, 64).with_progress(false).run(rows(150)).unwrap();

    assert_eq!(written, 150);
    assert_eq!(sink.batch_sizes(), vec![64, 64, 22]);
    assert!(sink.all().iter().all(|r| r.composite_vec.len() == 8));
}

#[test]
fn empty_input_writes_nothing() {
    let provider = StubProvider::new(3);
    let sink = RecordingSink::default();
    let written = RowPipeline::new(&provider, &sink, 64).with_progress(false).run(Vec::new()).unwrap();
    assert_eq!(written, 0);
    assert!(sink.batch_sizes().is_empty());
}

#[test]
fn missing_vector_aborts_before_insert() {
    let provider = StubProvider { short_by_one: true, ..StubProvider::new(3) };
    let sink = RecordingSink::default();
    let err = RowPipeline::new(&provider, &sink, 64).with_progress(false).run(rows(10)).unwrap_err();

    assert!(matches!(err, Error::VectorCount { expected: 10, actual: 9 }), "{err:?}");
    assert!(err.is_data_shape());
    assert!(sink.batch_sizes().is_empty());
}

#[test]
fn wrong_dimension_aborts_before_insert() {
    let provider = StubProvider { bad_dim: true, ..StubProvider::new(3) };
    let sink = RecordingSink::default();
    let err = RowPipeline::new(&provider, &sink, 64).with_progress(false).run(rows(5)).unwrap_err();

    assert!(matches!(err, Error::VectorDim { index: 4, expected: 3, actual: 2 }), "{err:?}");
    assert!(sink.batch_sizes().is_empty());
}

#[test]
fn failure_keeps_earlier_chunks() {
    let provider = StubProvider { fail_on_call: Some(3), ..StubProvider::new(2) };
    let sink = RecordingSink::default();
    let err = RowPipeline::new(&provider, &sink, 4).with_progress(false).run(rows(20)).unwrap_err();

    assert!(matches!(err, Error::Provider(_)));
    assert_eq!(sink.batch_sizes(), vec![4, 4]);
}
