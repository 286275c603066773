//! Move traces between a dataset and SEG-Y files.
//!
//! Bulk transfers split the trace range into fixed chunks of [ImportConfig::buffer_traces]
//! before anything runs. Each chunk reads (or encodes) independently on the worker pool and owns
//! an exclusive destination range, so output never depends on the thread count.

use super::{
    matrix::{expand, write_rows, write_samples},
    Dataset, EMPTY_LIMITS,
};
use crate::Error;
use geoseis_codec::{
    fields::{self, TRACE_FIELDS, TRACE_FIELD_COUNT},
    BinaryHeader, Endian, Layout, Overrides, Progress, Reader, SampleFormat, TextEncoding,
    TextHeader, Tracker, Writer,
};
use geoseis_runtime::{create_pool, resolve_concurrency, Storage};
use geoseis_utils::{units, Selector};
use rayon::prelude::*;
use std::{ops::Range, path::Path};
use tracing::{debug, info, warn};

/// Traces per chunk when none is configured.
const DEFAULT_BUFFER_TRACES: usize = 4096;

/// Convert a header field while importing or exporting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conversion {
    /// Trace header (by its position in the import mapping) or binary header field name.
    pub field: String,
    pub from: String,
    pub to: String,
}

/// Configuration for [Dataset::import_segy].
#[derive(Clone, Debug)]
pub struct ImportConfig {
    /// Place the new traces after the existing ones (file headers are left untouched).
    pub append: bool,
    /// Layout values to use instead of detecting them.
    pub overrides: Overrides,
    /// Dataset header receiving each of the 78 standard trace fields, in field order. An empty
    /// name drops the field. `None` maps every field to the header of the same name (if any).
    pub header_names: Option<Vec<String>>,
    pub conversions: Vec<Conversion>,
    /// Traces per chunk.
    pub buffer_traces: usize,
    /// Worker threads (zero or negative for one per core).
    pub threads: i32,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            append: false,
            overrides: Overrides::default(),
            header_names: None,
            conversions: Vec::new(),
            buffer_traces: DEFAULT_BUFFER_TRACES,
            threads: 0,
        }
    }
}

/// Configuration for [Dataset::export_segy].
#[derive(Clone, Debug)]
pub struct ExportConfig {
    pub format: SampleFormat,
    pub endian: Endian,
    pub encoding: TextEncoding,
    /// Traces per chunk.
    pub buffer_traces: usize,
    /// Worker threads (zero or negative for one per core).
    pub threads: i32,
    /// Traces to export, in output order.
    pub traces: Selector,
    /// Conversions applied to the written headers. Trace fields are named by their standard
    /// SEG-Y name. `SAMP_RATE` is written as stored unless converted here (for example from `ms`
    /// back to `us`).
    pub conversions: Vec<Conversion>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: SampleFormat::Ieee,
            endian: Endian::Big,
            encoding: TextEncoding::Ebcdic,
            buffer_traces: DEFAULT_BUFFER_TRACES,
            threads: 0,
            traces: Selector::All,
            conversions: Vec::new(),
        }
    }
}

/// Result of one chunk of a bulk transfer.
enum Outcome {
    /// Written; carries the limits of every header column seen in the chunk.
    Done(Vec<(f64, f64)>),
    /// Not started because the caller cancelled.
    Skipped,
}

fn chunks(total: usize, size: usize) -> Vec<Range<usize>> {
    let size = size.max(1);
    (0..total)
        .step_by(size)
        .map(|start| start..(start + size).min(total))
        .collect()
}

/// Walk chunk outcomes in order and return the length of the committed prefix, the merged limits
/// of that prefix and the first failure (if any).
///
/// A chunk error takes precedence over chunks skipped because of it.
fn committed_prefix(
    ranges: &[Range<usize>],
    outcomes: Vec<Result<Outcome, Error>>,
    limits: &mut [(f64, f64)],
) -> (usize, Option<Error>) {
    let mut committed = 0;
    let mut contiguous = true;
    let mut skipped = false;
    let mut failure = None;
    for (range, outcome) in ranges.iter().zip(outcomes) {
        match outcome {
            Ok(Outcome::Done(chunk)) if contiguous => {
                for (total, (min, max)) in limits.iter_mut().zip(chunk) {
                    total.0 = total.0.min(min);
                    total.1 = total.1.max(max);
                }
                committed = range.end;
            }
            Ok(Outcome::Done(_)) => {}
            Ok(Outcome::Skipped) => {
                contiguous = false;
                skipped = true;
            }
            Err(err) => {
                contiguous = false;
                failure.get_or_insert(err);
            }
        }
    }
    if failure.is_none() && skipped {
        failure = Some(Error::Cancelled { committed });
    }
    (committed, failure)
}

impl<S: Storage> Dataset<S> {
    /// Resolve the storage column receiving each standard trace field.
    fn import_mapping(&self, names: Option<&[String]>) -> Result<Vec<Option<usize>>, Error> {
        match names {
            Some(names) => {
                if names.len() != TRACE_FIELD_COUNT {
                    return Err(Error::ShapeMismatch {
                        what: "header names",
                        expected: TRACE_FIELD_COUNT,
                        found: names.len(),
                    });
                }
                names
                    .iter()
                    .map(|name| match name.is_empty() {
                        true => Ok(None),
                        false => self.state.schema.index(name).map(Some),
                    })
                    .collect()
            }
            None => Ok(TRACE_FIELDS
                .iter()
                .map(|field| self.state.schema.index(field.name).ok())
                .collect()),
        }
    }

    /// Split conversions into per-field trace factors and binary header factors.
    ///
    /// Trace fields are found by their position in `names`, or by standard field name when no
    /// mapping is given.
    fn conversion_factors(
        &self,
        names: Option<&[String]>,
        conversions: &[Conversion],
    ) -> Result<(Vec<f64>, Vec<(usize, f64)>), Error> {
        let mut trace = vec![1.0; TRACE_FIELD_COUNT];
        let mut binary = Vec::new();
        for conversion in conversions {
            let factor = units::factor(&conversion.from, &conversion.to)?;
            let position = match names {
                Some(names) => names.iter().position(|name| *name == conversion.field),
                None => fields::trace_index(&conversion.field),
            };
            if let Some(position) = position {
                trace[position] *= factor;
            } else if let Some(index) = fields::binary_index(&conversion.field) {
                binary.push((index, factor));
            } else {
                return Err(Error::InvalidHeaderName(conversion.field.clone()));
            }
        }
        Ok((trace, binary))
    }

    /// Import the traces of the SEG-Y file at `path`.
    ///
    /// Unless appending, existing traces are replaced and the file's text and binary headers are
    /// imported too. Appending requires the file to hold as many samples per trace as the
    /// dataset.
    ///
    /// If a chunk fails or `progress` cancels, the traces of the longest run of completed chunks
    /// are kept and the error ([Error::Cancelled] on cancellation) is returned.
    pub fn import_segy(
        &mut self,
        path: impl AsRef<Path>,
        cfg: &ImportConfig,
        progress: Option<&Progress<'_>>,
    ) -> Result<(), Error> {
        let path = path.as_ref();
        let mut reader = Reader::open_with(path, &cfg.overrides)?;
        let layout = *reader.layout();
        let names = cfg.header_names.as_deref();
        let mapping = self.import_mapping(names)?;
        let (trace_factors, bin_factors) = self.conversion_factors(names, &cfg.conversions)?;

        let first = if cfg.append {
            if layout.samples != self.state.samples {
                return Err(Error::ShapeMismatch {
                    what: "samples per trace",
                    expected: self.state.samples,
                    found: layout.samples,
                });
            }
            self.state.traces
        } else {
            let text = reader.text_header()?;
            let mut bin = reader.bin_header()?;
            for (index, factor) in &bin_factors {
                bin.values[*index] *= factor;
            }
            bin.values[fields::BIN_SAMP_NUM] = layout.samples as f64;
            self.set_trace_count(0)?;
            self.set_sample_count(layout.samples)?;
            self.state.limits = vec![EMPTY_LIMITS; self.header_width()];
            self.state.text_header = text.as_bytes().to_vec();
            self.state.bin_header = bin.values;
            0
        };

        let total = first + layout.traces;
        let samples = layout.samples;
        let width = self.header_width();
        let null = self.state.null_value;
        self.resize_blobs(total, samples)?;
        self.invalidate_all();

        let ranges = chunks(layout.traces, cfg.buffer_traces);
        let threads = resolve_concurrency(cfg.threads);
        let pool = create_pool(threads)?;
        let tracker = Tracker::new(progress, layout.traces);
        let headers = self.headers.clone();
        let traces = self.traces.clone();
        debug!(
            path = %path.display(),
            first,
            traces = layout.traces,
            chunks = ranges.len(),
            threads,
            "importing SEG-Y"
        );
        let import_chunk = |range: &Range<usize>| -> Result<Outcome, Error> {
            let chunk = reader.fork()?.read_chunk(range.clone())?;
            let mut limits = vec![EMPTY_LIMITS; width];
            let mut rows = vec![0.0; range.len() * width];
            for (i, row) in rows.chunks_exact_mut(width).enumerate() {
                for ((&value, column), factor) in
                    chunk.header(i).iter().zip(&mapping).zip(&trace_factors)
                {
                    let Some(column) = *column else {
                        continue;
                    };
                    let value = if value == null { value } else { value * factor };
                    row[column] = value;
                    expand(&mut limits[column], value, null);
                }
            }
            write_rows(&headers, width, first + range.start, &rows)?;
            write_samples(&traces, samples, first + range.start, &chunk.samples)?;
            Ok(Outcome::Done(limits))
        };
        let outcomes: Vec<Result<Outcome, Error>> = pool.install(|| {
            ranges
                .par_iter()
                .map(|range| {
                    if tracker.is_cancelled() {
                        return Ok(Outcome::Skipped);
                    }
                    let outcome = import_chunk(range);
                    match &outcome {
                        Ok(_) => {
                            let _ = tracker.advance(range.len());
                        }
                        // Chunks not yet started are skipped
                        Err(_) => tracker.cancel(),
                    }
                    outcome
                })
                .collect()
        });

        let (committed, failure) = committed_prefix(&ranges, outcomes, &mut self.state.limits);
        self.state.traces = first + committed;
        if committed < layout.traces {
            self.resize_blobs(self.state.traces, samples)?;
        }
        self.sync()?;
        if let Some(err) = failure {
            warn!(path = %path.display(), committed, ?err, "import stopped");
            return Err(err);
        }
        tracker.finish();
        info!(
            path = %path.display(),
            traces = layout.traces,
            total = self.state.traces,
            "imported SEG-Y"
        );
        Ok(())
    }

    /// Replace the text header with the one of the SEG-Y file at `path`.
    pub fn import_text_header(
        &mut self,
        path: impl AsRef<Path>,
        overrides: &Overrides,
    ) -> Result<(), Error> {
        let text = Reader::open_with(path, overrides)?.text_header()?;
        self.set_text_header(&text)
    }

    /// Replace the binary header with the one of the SEG-Y file at `path`.
    pub fn import_bin_header(
        &mut self,
        path: impl AsRef<Path>,
        overrides: &Overrides,
    ) -> Result<(), Error> {
        let bin = Reader::open_with(path, overrides)?.bin_header()?;
        self.write_bin_header(&bin.values)
    }

    /// Write the selected traces to a new SEG-Y file at `path`.
    ///
    /// Headers missing from the schema are written as zero. `SAMP_NUM` and `FORMAT` follow the
    /// dataset and `cfg`. Header values are written as stored unless [ExportConfig::conversions]
    /// names them.
    pub fn export_segy(
        &self,
        path: impl AsRef<Path>,
        cfg: &ExportConfig,
        progress: Option<&Progress<'_>>,
    ) -> Result<(), Error> {
        let path = path.as_ref();
        let len = self.state.traces;
        cfg.traces
            .validate(len)
            .map_err(|e| Error::selection("trace", e))?;
        let selected = cfg.traces.indices(len);
        let samples = self.state.samples;
        let layout = Layout {
            endian: cfg.endian,
            format: cfg.format,
            encoding: cfg.encoding,
            samples,
            traces: selected.len(),
        };
        let (trace_factors, bin_factors) = self.conversion_factors(None, &cfg.conversions)?;
        let mut bin = BinaryHeader::from_values(&self.state.bin_header)?;
        for (index, factor) in &bin_factors {
            bin.values[*index] *= factor;
        }
        let writer = Writer::create(path, layout)?;
        writer.write_text_header(&TextHeader::from_bytes(&self.state.text_header)?)?;
        writer.write_bin_header(&bin)?;

        let columns: Vec<Option<usize>> = TRACE_FIELDS
            .iter()
            .map(|field| self.state.schema.index(field.name).ok())
            .collect();
        let width = self.header_width();
        let null = self.state.null_value;
        let ranges = chunks(selected.len(), cfg.buffer_traces);
        let threads = resolve_concurrency(cfg.threads);
        let pool = create_pool(threads)?;
        let tracker = Tracker::new(progress, selected.len());
        let export_chunk = |range: &Range<usize>| -> Result<Outcome, Error> {
            let selector = Selector::List(selected[range.clone()].to_vec());
            let rows = self.read_header_rows(&selector)?;
            let mut headers = vec![0.0; range.len() * TRACE_FIELD_COUNT];
            for (out, row) in headers
                .chunks_exact_mut(TRACE_FIELD_COUNT)
                .zip(rows.chunks_exact(width))
            {
                for ((value, column), factor) in out.iter_mut().zip(&columns).zip(&trace_factors)
                {
                    if let Some(column) = *column {
                        let stored = row[column];
                        *value = if stored == null { stored } else { stored * factor };
                    }
                }
            }
            let data = self.read_traces(&selector, 0..samples)?;
            let records = writer.encode_traces(&headers, &data)?;
            writer.write_encoded(range.start, &records)?;
            Ok(Outcome::Done(Vec::new()))
        };
        let outcomes: Vec<Result<Outcome, Error>> = pool.install(|| {
            ranges
                .par_iter()
                .map(|range| {
                    if tracker.is_cancelled() {
                        return Ok(Outcome::Skipped);
                    }
                    let outcome = export_chunk(range);
                    match &outcome {
                        Ok(_) => {
                            let _ = tracker.advance(range.len());
                        }
                        Err(_) => tracker.cancel(),
                    }
                    outcome
                })
                .collect()
        });

        let (committed, failure) = committed_prefix(&ranges, outcomes, &mut []);
        writer.sync()?;
        if let Some(err) = failure {
            warn!(path = %path.display(), committed, ?err, "export stopped");
            return Err(err);
        }
        tracker.finish();
        info!(path = %path.display(), traces = selected.len(), "exported SEG-Y");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Dataset, Param};
    use geoseis_codec::fields::trace_index;
    use geoseis_macros::test_traced;
    use geoseis_runtime::{storage::memory, Blob, Error as RuntimeError};
    use std::{
        ops::ControlFlow,
        path::PathBuf,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };
    use tempfile::TempDir;
    use test_case::test_case;

    const SAMPLES: usize = 8;

    /// Write a synthetic file and return its trace headers and samples.
    fn write_segy(
        path: &Path,
        traces: usize,
        format: SampleFormat,
        endian: Endian,
        encoding: TextEncoding,
        seed: usize,
    ) -> (Vec<f64>, Vec<f32>) {
        let layout = Layout {
            endian,
            format,
            encoding,
            samples: SAMPLES,
            traces,
        };
        let writer = Writer::create(path, layout).unwrap();
        let rows: Vec<String> = (0..40).map(|i| format!("C{:02} SURVEY {seed}", i + 1)).collect();
        writer
            .write_text_header(&TextHeader::from_rows(&rows).unwrap())
            .unwrap();
        let mut bin = BinaryHeader::default();
        bin.values[fields::BIN_SAMP_RATE] = 2000.0;
        writer.write_bin_header(&bin).unwrap();

        let field = |name: &str| trace_index(name).unwrap();
        let mut headers = vec![0.0; traces * TRACE_FIELD_COUNT];
        for (t, row) in headers.chunks_exact_mut(TRACE_FIELD_COUNT).enumerate() {
            let t = (t + seed) as f64;
            row[field("SEQWL")] = t + 1.0;
            row[field("CDP")] = (t / 3.0).floor() + 1.0;
            row[field("INLINE")] = t % 5.0 + 1.0;
            row[field("XLINE")] = t;
            row[field("CDP_X")] = 100.0 * t;
            row[field("CDP_Y")] = 50.0 * (t % 7.0);
        }
        let samples: Vec<f32> = (0..traces * SAMPLES)
            .map(|i| (i + seed * SAMPLES) as f32 * 0.5 - 10.0)
            .collect();
        writer.write_traces(0, &headers, &samples).unwrap();
        writer.sync().unwrap();
        (headers, samples)
    }

    fn default_segy(
        dir: &TempDir,
        name: &str,
        traces: usize,
        seed: usize,
    ) -> (PathBuf, Vec<f64>, Vec<f32>) {
        let path = dir.path().join(name);
        let (headers, samples) = write_segy(
            &path,
            traces,
            SampleFormat::Ieee,
            Endian::Big,
            TextEncoding::Ebcdic,
            seed,
        );
        (path, headers, samples)
    }

    fn dataset(storage: &memory::Storage) -> Dataset<memory::Storage> {
        Dataset::create(storage, "seismic", "survey", Param::default()).unwrap()
    }

    fn column(headers: &[f64], name: &str) -> Vec<f64> {
        let index = trace_index(name).unwrap();
        headers
            .chunks_exact(TRACE_FIELD_COUNT)
            .map(|row| row[index])
            .collect()
    }

    fn read_blob(storage: &memory::Storage, name: &[u8]) -> Vec<u8> {
        let (blob, len) = storage.open("seismic", name).unwrap();
        let mut buf = vec![0u8; len as usize];
        blob.read_at(&mut buf, 0).unwrap();
        buf
    }

    /// Memory storage whose `traces` blobs fail the write with the given (zero-based) number.
    #[derive(Clone)]
    struct FailingStorage {
        inner: memory::Storage,
        fail_at: usize,
        writes: Arc<AtomicUsize>,
    }

    #[derive(Clone)]
    struct FailingBlob {
        inner: memory::Blob,
        fail_at: Option<usize>,
        writes: Arc<AtomicUsize>,
    }

    impl Storage for FailingStorage {
        type Blob = FailingBlob;

        fn open(&self, partition: &str, name: &[u8]) -> Result<(Self::Blob, u64), RuntimeError> {
            let (inner, len) = self.inner.open(partition, name)?;
            let fail_at = (name == b"traces").then_some(self.fail_at);
            let blob = FailingBlob {
                inner,
                fail_at,
                writes: self.writes.clone(),
            };
            Ok((blob, len))
        }

        fn remove(&self, partition: &str, name: Option<&[u8]>) -> Result<(), RuntimeError> {
            self.inner.remove(partition, name)
        }

        fn scan(&self, partition: &str) -> Result<Vec<Vec<u8>>, RuntimeError> {
            self.inner.scan(partition)
        }
    }

    impl Blob for FailingBlob {
        fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<(), RuntimeError> {
            self.inner.read_at(buf, offset)
        }

        fn write_at(&self, buf: &[u8], offset: u64) -> Result<(), RuntimeError> {
            if let Some(fail_at) = self.fail_at {
                if self.writes.fetch_add(1, Ordering::SeqCst) == fail_at {
                    return Err(RuntimeError::WriteFailed);
                }
            }
            self.inner.write_at(buf, offset)
        }

        fn resize(&self, len: u64) -> Result<(), RuntimeError> {
            self.inner.resize(len)
        }

        fn sync(&self) -> Result<(), RuntimeError> {
            self.inner.sync()
        }
    }

    #[test_traced]
    fn test_import_contents() {
        let dir = TempDir::new().unwrap();
        let (path, headers, samples) = default_segy(&dir, "a.sgy", 23, 0);
        let storage = memory::Storage::default();
        let mut dataset = dataset(&storage);
        let cfg = ImportConfig {
            buffer_traces: 5,
            threads: 2,
            ..Default::default()
        };
        dataset.import_segy(&path, &cfg, None).unwrap();

        assert_eq!(dataset.trace_count(), 23);
        assert_eq!(dataset.sample_count(), SAMPLES);
        assert_eq!(dataset.read_traces(&Selector::All, 0..SAMPLES).unwrap(), samples);
        for name in ["SEQWL", "CDP", "INLINE", "XLINE", "CDP_X", "CDP_Y"] {
            assert_eq!(
                dataset.read_headers(&Selector::All, &[name]).unwrap()[0],
                column(&headers, name),
                "{name}"
            );
        }
        assert_eq!(dataset.bin_header_value("SAMP_RATE").unwrap(), 2000.0);
        assert_eq!(dataset.bin_header_value("SAMP_NUM").unwrap(), SAMPLES as f64);
        assert_eq!(dataset.text_header().unwrap().rows()[1], "C02 SURVEY 0");
        assert_eq!(dataset.limits("CDP_X", "").unwrap(), Some((0.0, 2200.0)));
        assert_eq!(dataset.limits("CDP", "").unwrap(), Some((1.0, 8.0)));
    }

    #[test_case(1; "one thread")]
    #[test_case(2; "two threads")]
    #[test_case(8; "eight threads")]
    fn test_import_independent_of_threads(threads: i32) {
        let dir = TempDir::new().unwrap();
        let (path, _, _) = default_segy(&dir, "a.sgy", 50, 0);
        let import = |threads: i32| {
            let storage = memory::Storage::default();
            let mut dataset = dataset(&storage);
            let cfg = ImportConfig {
                buffer_traces: 7,
                threads,
                ..Default::default()
            };
            dataset.import_segy(&path, &cfg, None).unwrap();
            drop(dataset);
            (
                read_blob(&storage, b"headers"),
                read_blob(&storage, b"traces"),
            )
        };
        let reference = import(1);
        assert!(!reference.1.is_empty());
        assert_eq!(import(threads), reference);
    }

    #[test_traced]
    fn test_append() {
        let dir = TempDir::new().unwrap();
        let (first, _, first_samples) = default_segy(&dir, "a.sgy", 10, 0);
        let (second, second_headers, second_samples) = default_segy(&dir, "b.sgy", 6, 100);
        let storage = memory::Storage::default();
        let mut dataset = dataset(&storage);
        dataset
            .import_segy(&first, &ImportConfig::default(), None)
            .unwrap();
        let cfg = ImportConfig {
            append: true,
            buffer_traces: 4,
            ..Default::default()
        };
        dataset.import_segy(&second, &cfg, None).unwrap();

        assert_eq!(dataset.trace_count(), 16);
        assert_eq!(
            dataset.read_traces(&Selector::Range(0..10), 0..SAMPLES).unwrap(),
            first_samples
        );
        assert_eq!(
            dataset.read_traces(&Selector::Range(10..16), 0..SAMPLES).unwrap(),
            second_samples
        );
        assert_eq!(
            dataset.read_headers(&Selector::Range(10..16), &["CDP_X"]).unwrap()[0],
            column(&second_headers, "CDP_X")
        );
        // File headers are kept when appending
        assert_eq!(dataset.text_header().unwrap().rows()[0], "C01 SURVEY 0");
        assert_eq!(dataset.limits("CDP_X", "").unwrap(), Some((0.0, 10500.0)));
    }

    #[test_traced]
    fn test_append_sample_mismatch() {
        let dir = TempDir::new().unwrap();
        let (path, _, _) = default_segy(&dir, "a.sgy", 4, 0);
        let storage = memory::Storage::default();
        let mut dataset = Dataset::create(
            &storage,
            "seismic",
            "survey",
            Param {
                samples: 3,
                traces: 2,
                ..Default::default()
            },
        )
        .unwrap();
        let cfg = ImportConfig {
            append: true,
            ..Default::default()
        };
        assert!(matches!(
            dataset.import_segy(&path, &cfg, None),
            Err(Error::ShapeMismatch {
                what: "samples per trace",
                expected: 3,
                found: 8
            })
        ));
        assert_eq!(dataset.trace_count(), 2);
        assert_eq!(dataset.sample_count(), 3);
    }

    #[test_traced]
    fn test_cancel_keeps_committed_prefix() {
        let dir = TempDir::new().unwrap();
        let (path, _, samples) = default_segy(&dir, "a.sgy", 20, 0);
        let storage = memory::Storage::default();
        let mut dataset = dataset(&storage);
        let cancel = |fraction: f64| {
            if fraction >= 0.3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };
        let cfg = ImportConfig {
            buffer_traces: 2,
            threads: 1,
            ..Default::default()
        };
        let result = dataset.import_segy(&path, &cfg, Some(&cancel));
        let Err(Error::Cancelled { committed }) = result else {
            panic!("expected cancellation, got {result:?}");
        };
        assert!(committed < 20);
        assert_eq!(committed % 2, 0);
        assert_eq!(dataset.trace_count(), committed);
        assert_eq!(
            dataset.read_traces(&Selector::All, 0..SAMPLES).unwrap(),
            samples[..committed * SAMPLES]
        );

        // The committed traces survive a restart
        drop(dataset);
        let dataset = Dataset::open(&storage, "seismic").unwrap();
        assert_eq!(dataset.trace_count(), committed);
    }

    #[test_traced]
    fn test_failed_chunk_aborts_remaining_chunks() {
        let dir = TempDir::new().unwrap();
        let (path, _, samples) = default_segy(&dir, "a.sgy", 50, 0);
        let storage = FailingStorage {
            inner: memory::Storage::default(),
            fail_at: 2,
            writes: Arc::new(AtomicUsize::new(0)),
        };
        let mut dataset =
            Dataset::create(&storage, "seismic", "survey", Param::default()).unwrap();
        let cfg = ImportConfig {
            buffer_traces: 5,
            threads: 1,
            ..Default::default()
        };
        let result = dataset.import_segy(&path, &cfg, None);
        assert!(
            matches!(result, Err(Error::Runtime(RuntimeError::WriteFailed))),
            "{result:?}"
        );

        // Chunks 0 and 1 are kept, nothing after the failing chunk 2 is written
        assert_eq!(storage.writes.load(Ordering::SeqCst), 3);
        assert_eq!(dataset.trace_count(), 10);
        assert_eq!(
            dataset.read_traces(&Selector::All, 0..SAMPLES).unwrap(),
            samples[..10 * SAMPLES]
        );
        assert_eq!(dataset.limits("SEQWL", "").unwrap(), Some((1.0, 10.0)));

        drop(dataset);
        let dataset = Dataset::open(&storage, "seismic").unwrap();
        assert_eq!(dataset.trace_count(), 10);
    }

    #[test_traced]
    fn test_failure_reported_before_cancellation() {
        let ranges = chunks(12, 4);
        let outcomes = vec![
            Ok(Outcome::Done(vec![(1.0, 2.0)])),
            Ok(Outcome::Skipped),
            Err(Error::Runtime(RuntimeError::WriteFailed)),
        ];
        let mut limits = vec![EMPTY_LIMITS];
        let (committed, failure) = committed_prefix(&ranges, outcomes, &mut limits);
        assert_eq!(committed, 4);
        assert!(matches!(failure, Some(Error::Runtime(_))));
        assert_eq!(limits, vec![(1.0, 2.0)]);

        let outcomes = vec![
            Ok(Outcome::Done(vec![(1.0, 2.0)])),
            Ok(Outcome::Skipped),
            Ok(Outcome::Done(vec![(0.0, 9.0)])),
        ];
        let mut limits = vec![EMPTY_LIMITS];
        let (committed, failure) = committed_prefix(&ranges, outcomes, &mut limits);
        assert_eq!(committed, 4);
        assert!(matches!(failure, Some(Error::Cancelled { committed: 4 })));
        assert_eq!(limits, vec![(1.0, 2.0)]);
    }

    #[test_traced]
    fn test_progress_ends_at_one() {
        let dir = TempDir::new().unwrap();
        let (path, _, _) = default_segy(&dir, "a.sgy", 30, 0);
        let storage = memory::Storage::default();
        let mut dataset = dataset(&storage);
        let seen = std::sync::Mutex::new(Vec::new());
        let record = |fraction: f64| {
            seen.lock().unwrap().push(fraction);
            ControlFlow::Continue(())
        };
        let cfg = ImportConfig {
            buffer_traces: 3,
            threads: 4,
            ..Default::default()
        };
        dataset.import_segy(&path, &cfg, Some(&record)).unwrap();
        let seen = seen.into_inner().unwrap();
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.last(), Some(&1.0));
    }

    #[test_traced]
    fn test_conversions_and_mapping() {
        let dir = TempDir::new().unwrap();
        let (path, headers, _) = default_segy(&dir, "a.sgy", 5, 0);
        let storage = memory::Storage::default();
        let mut dataset = dataset(&storage);

        // Swap INLINE and XLINE, convert CDP_X from feet and the sample rate to milliseconds
        let mut names: Vec<String> = TRACE_FIELDS.iter().map(|f| f.name.to_string()).collect();
        names.swap(trace_index("INLINE").unwrap(), trace_index("XLINE").unwrap());
        let cfg = ImportConfig {
            header_names: Some(names),
            conversions: vec![
                Conversion {
                    field: "CDP_X".into(),
                    from: "ft".into(),
                    to: "m".into(),
                },
                Conversion {
                    field: "SAMP_RATE".into(),
                    from: "us".into(),
                    to: "ms".into(),
                },
            ],
            ..Default::default()
        };
        dataset.import_segy(&path, &cfg, None).unwrap();

        let read = dataset
            .read_headers(&Selector::All, &["INLINE", "XLINE", "CDP_X"])
            .unwrap();
        assert_eq!(read[0], column(&headers, "XLINE"));
        assert_eq!(read[1], column(&headers, "INLINE"));
        let expected: Vec<f64> = column(&headers, "CDP_X").iter().map(|x| x * 0.3048).collect();
        for (got, want) in read[2].iter().zip(&expected) {
            assert!((got - want).abs() < 1e-9);
        }
        assert!((dataset.sample_rate("ms").unwrap() - 2.0).abs() < 1e-12);

        let bad = ImportConfig {
            conversions: vec![Conversion {
                field: "NOPE".into(),
                from: "m".into(),
                to: "ft".into(),
            }],
            ..Default::default()
        };
        assert!(matches!(
            dataset.import_segy(&path, &bad, None),
            Err(Error::InvalidHeaderName(_))
        ));
        let short = ImportConfig {
            header_names: Some(vec!["CDP".into()]),
            ..Default::default()
        };
        assert!(matches!(
            dataset.import_segy(&path, &short, None),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test_traced]
    fn test_export_round_trip() {
        let dir = TempDir::new().unwrap();
        let (path, headers, samples) = default_segy(&dir, "a.sgy", 12, 0);
        let storage = memory::Storage::default();
        let mut dataset = dataset(&storage);
        dataset
            .import_segy(&path, &ImportConfig::default(), None)
            .unwrap();

        let out = dir.path().join("out.sgy");
        let cfg = ExportConfig {
            format: SampleFormat::Ibm,
            endian: Endian::Little,
            encoding: TextEncoding::Ascii,
            buffer_traces: 5,
            threads: 3,
            ..Default::default()
        };
        dataset.export_segy(&out, &cfg, None).unwrap();

        let mut reader = Reader::open(&out).unwrap();
        let layout = *reader.layout();
        assert_eq!(layout.format, SampleFormat::Ibm);
        assert_eq!(layout.endian, Endian::Little);
        assert_eq!(layout.traces, 12);
        assert_eq!(reader.text_header().unwrap().rows()[5], "C06 SURVEY 0");
        assert_eq!(reader.bin_header().unwrap().sample_interval(), 2000.0);
        let chunk = reader.read_chunk(0..12).unwrap();
        assert_eq!(chunk.samples, samples);
        assert_eq!(chunk.headers, headers);

        // A reordered subset
        let subset = dir.path().join("subset.sgy");
        let cfg = ExportConfig {
            traces: Selector::List(vec![11, 0, 5]),
            ..Default::default()
        };
        dataset.export_segy(&subset, &cfg, None).unwrap();
        let mut reader = Reader::open(&subset).unwrap();
        let chunk = reader.read_chunk(0..3).unwrap();
        assert_eq!(chunk.trace(0), &samples[11 * SAMPLES..12 * SAMPLES]);
        assert_eq!(chunk.trace(1), &samples[..SAMPLES]);
        assert_eq!(chunk.header(2), &headers[5 * TRACE_FIELD_COUNT..6 * TRACE_FIELD_COUNT]);

        let bad = ExportConfig {
            traces: Selector::one(12),
            ..Default::default()
        };
        assert!(matches!(
            dataset.export_segy(dir.path().join("bad.sgy"), &bad, None),
            Err(Error::IndexRange { what: "trace", .. })
        ));
    }

    #[test_traced]
    fn test_export_converts_sample_rate_back() {
        let dir = TempDir::new().unwrap();
        let (path, headers, _) = default_segy(&dir, "a.sgy", 4, 0);
        let storage = memory::Storage::default();
        let mut dataset = dataset(&storage);
        let cfg = ImportConfig {
            conversions: vec![Conversion {
                field: "SAMP_RATE".into(),
                from: "us".into(),
                to: "ms".into(),
            }],
            ..Default::default()
        };
        dataset.import_segy(&path, &cfg, None).unwrap();
        assert!((dataset.sample_rate("ms").unwrap() - 2.0).abs() < 1e-12);

        // Without conversions the stored value is written as is
        let raw = dir.path().join("raw.sgy");
        dataset
            .export_segy(&raw, &ExportConfig::default(), None)
            .unwrap();
        let mut reader = Reader::open(&raw).unwrap();
        assert_eq!(reader.bin_header().unwrap().sample_interval(), 2.0);

        let out = dir.path().join("out.sgy");
        let cfg = ExportConfig {
            conversions: vec![
                Conversion {
                    field: "SAMP_RATE".into(),
                    from: "ms".into(),
                    to: "us".into(),
                },
                Conversion {
                    field: "CDP_X".into(),
                    from: "km".into(),
                    to: "m".into(),
                },
            ],
            ..Default::default()
        };
        dataset.export_segy(&out, &cfg, None).unwrap();
        let mut reader = Reader::open(&out).unwrap();
        assert_eq!(reader.bin_header().unwrap().sample_interval(), 2000.0);
        let chunk = reader.read_chunk(0..4).unwrap();
        let x = trace_index("CDP_X").unwrap();
        for (t, expected) in column(&headers, "CDP_X").iter().enumerate() {
            assert_eq!(chunk.header(t)[x], expected * 1000.0);
        }

        let bad = ExportConfig {
            conversions: vec![Conversion {
                field: "NOPE".into(),
                from: "m".into(),
                to: "ft".into(),
            }],
            ..Default::default()
        };
        assert!(matches!(
            dataset.export_segy(dir.path().join("bad.sgy"), &bad, None),
            Err(Error::InvalidHeaderName(_))
        ));
    }

    #[test_traced]
    fn test_import_file_headers_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ascii.sgy");
        write_segy(&path, 2, SampleFormat::Int2, Endian::Little, TextEncoding::Ascii, 7);
        let storage = memory::Storage::default();
        let mut dataset = dataset(&storage);
        dataset
            .import_text_header(&path, &Overrides::default())
            .unwrap();
        dataset
            .import_bin_header(&path, &Overrides::default())
            .unwrap();
        assert_eq!(dataset.text_header().unwrap().rows()[39], "C40 SURVEY 7");
        assert_eq!(dataset.bin_header_value("SAMP_RATE").unwrap(), 2000.0);
        assert_eq!(
            dataset.bin_header_value("FORMAT").unwrap(),
            SampleFormat::Int2.code() as f64
        );
        assert_eq!(dataset.trace_count(), 0);
    }

    #[test_traced]
    fn test_import_persists() {
        let dir = TempDir::new().unwrap();
        let (path, _, samples) = default_segy(&dir, "a.sgy", 9, 0);
        let storage = memory::Storage::default();
        let mut dataset = dataset(&storage);
        dataset
            .import_segy(&path, &ImportConfig::default(), None)
            .unwrap();
        dataset.finalize().unwrap();
        drop(dataset);

        let dataset = Dataset::open(&storage, "seismic").unwrap();
        assert_eq!(dataset.trace_count(), 9);
        assert_eq!(dataset.read_traces(&Selector::All, 0..SAMPLES).unwrap(), samples);
        assert!(dataset.has_pkey("CDP_X"));
        assert!(!dataset.stored_boundary().is_empty());
        assert_eq!(dataset.pkey_indexes("CDP", 2.0, 2.0).unwrap(), vec![3, 4, 5]);
    }
}
