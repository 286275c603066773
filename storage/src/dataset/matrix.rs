//! Positional access to the header and sample matrices.
//!
//! Every accessor takes a [Selector] over traces. Selections are split into runs of consecutive
//! traces so each run costs one blob read (or write) per block of rows.

use super::{Dataset, EMPTY_LIMITS};
use crate::Error;
use bytes::{Buf, BufMut};
use geoseis_codec::{
    fields::{self, BINARY_FIELD_COUNT, BIN_SAMP_NUM},
    TextHeader, TEXT_COLUMNS, TEXT_ROWS,
};
use geoseis_runtime::{Blob, Storage};
use geoseis_utils::{units, units::UnitKind, Selector};
use std::ops::Range;
use tracing::debug;

/// Header rows read per blob access.
const ROW_BLOCK: usize = 4096;

/// Upper bound on the bytes of samples read per blob access.
const TRACE_BLOCK_BYTES: usize = 16 << 20;

pub(crate) fn decode_f64(bytes: &[u8]) -> Vec<f64> {
    let mut buf = bytes;
    let mut out = Vec::with_capacity(bytes.len() / 8);
    while buf.remaining() >= 8 {
        out.push(buf.get_f64_le());
    }
    out
}

pub(crate) fn encode_f64(values: &[f64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 8);
    for value in values {
        out.put_f64_le(*value);
    }
    out
}

pub(crate) fn decode_f32(bytes: &[u8]) -> Vec<f32> {
    let mut buf = bytes;
    let mut out = Vec::with_capacity(bytes.len() / 4);
    while buf.remaining() >= 4 {
        out.push(buf.get_f32_le());
    }
    out
}

pub(crate) fn encode_f32(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for value in values {
        out.put_f32_le(*value);
    }
    out
}

/// Write whole header rows (`width` values each) starting at row `first`.
pub(crate) fn write_rows<B: Blob>(
    blob: &B,
    width: usize,
    first: usize,
    rows: &[f64],
) -> Result<(), Error> {
    blob.write_at(&encode_f64(rows), (first * width * 8) as u64)?;
    Ok(())
}

/// Write whole traces (`samples` values each) starting at trace `first`.
pub(crate) fn write_samples<B: Blob>(
    blob: &B,
    samples: usize,
    first: usize,
    data: &[f32],
) -> Result<(), Error> {
    blob.write_at(&encode_f32(data), (first * samples * 4) as u64)?;
    Ok(())
}

/// Widen `limits` to cover `value` unless it is NaN, infinite or the null value.
pub(crate) fn expand(limits: &mut (f64, f64), value: f64, null: f64) {
    if !value.is_finite() || value == null {
        return;
    }
    limits.0 = limits.0.min(value);
    limits.1 = limits.1.max(value);
}

fn check_samples(samples: &Range<usize>, len: usize) -> Result<(), Error> {
    if samples.start > samples.end {
        return Err(Error::InvalidRange {
            what: "sample",
            start: samples.start,
            end: samples.end,
        });
    }
    if samples.end > len {
        return Err(Error::IndexRange {
            what: "sample",
            index: samples.end - 1,
            len,
        });
    }
    Ok(())
}

impl<S: Storage> Dataset<S> {
    /// Width of a header row.
    pub(crate) fn header_width(&self) -> usize {
        self.state.schema.len()
    }

    /// Size both blobs for `traces x samples`.
    pub(crate) fn resize_blobs(&self, traces: usize, samples: usize) -> Result<(), Error> {
        self.headers
            .resize((traces * self.header_width() * 8) as u64)?;
        self.traces.resize((traces * samples * 4) as u64)?;
        Ok(())
    }

    /// Zero-filled rows are part of the data, so the limits must cover zero.
    pub(crate) fn expand_limits_with_zero(&mut self) {
        let null = self.state.null_value;
        for limits in &mut self.state.limits {
            expand(limits, 0.0, null);
        }
    }

    /// Drop cached indexes and views that depend on any of `columns`.
    pub(crate) fn invalidate(&self, columns: &[usize]) {
        let mut caches = self.caches();
        caches.indexes.retain(|column, _| !columns.contains(column));
        caches
            .views
            .retain(|keys, _| !keys.iter().any(|column| columns.contains(column)));
    }

    /// Drop every cached index and view.
    pub(crate) fn invalidate_all(&self) {
        let mut caches = self.caches();
        caches.indexes.clear();
        caches.views.clear();
    }

    /// Read whole header rows `rows`, in storage column order.
    pub(crate) fn read_rows(&self, rows: Range<usize>) -> Result<Vec<f64>, Error> {
        let width = self.header_width();
        let mut buf = vec![0u8; rows.len() * width * 8];
        self.headers.read_at(&mut buf, (rows.start * width * 8) as u64)?;
        Ok(decode_f64(&buf))
    }

    /// Read the storage `columns` of the selected traces, one vector per column.
    pub(crate) fn read_columns(
        &self,
        traces: &Selector,
        columns: &[usize],
    ) -> Result<Vec<Vec<f64>>, Error> {
        let len = self.state.traces;
        traces
            .validate(len)
            .map_err(|e| Error::selection("trace", e))?;
        let width = self.header_width();
        let count = traces.count(len);
        let mut out = vec![Vec::with_capacity(count); columns.len()];
        for run in traces.runs(len) {
            let mut start = run.start;
            while start < run.end {
                let end = (start + ROW_BLOCK).min(run.end);
                let rows = self.read_rows(start..end)?;
                for row in rows.chunks_exact(width) {
                    for (values, &column) in out.iter_mut().zip(columns) {
                        values.push(row[column]);
                    }
                }
                start = end;
            }
        }
        Ok(out)
    }

    /// Overwrite the storage `columns` of the selected traces.
    pub(crate) fn write_columns(
        &mut self,
        traces: &Selector,
        columns: &[usize],
        values: &[Vec<f64>],
    ) -> Result<(), Error> {
        let len = self.state.traces;
        traces
            .validate(len)
            .map_err(|e| Error::selection("trace", e))?;
        if values.len() != columns.len() {
            return Err(Error::ShapeMismatch {
                what: "header columns",
                expected: columns.len(),
                found: values.len(),
            });
        }
        let count = traces.count(len);
        for column in values {
            if column.len() != count {
                return Err(Error::ShapeMismatch {
                    what: "header values",
                    expected: count,
                    found: column.len(),
                });
            }
        }

        let width = self.header_width();
        let mut cursor = 0;
        for run in traces.runs(len) {
            let mut start = run.start;
            while start < run.end {
                let end = (start + ROW_BLOCK).min(run.end);
                let mut rows = self.read_rows(start..end)?;
                for (i, row) in rows.chunks_exact_mut(width).enumerate() {
                    for (source, &column) in values.iter().zip(columns) {
                        row[column] = source[cursor + i];
                    }
                }
                write_rows(&self.headers, width, start, &rows)?;
                cursor += end - start;
                start = end;
            }
        }

        let null = self.state.null_value;
        for (source, &column) in values.iter().zip(columns) {
            let limits = &mut self.state.limits[column];
            for &value in source {
                expand(limits, value, null);
            }
        }
        self.invalidate(columns);
        debug!(traces = count, columns = columns.len(), "wrote headers");
        Ok(())
    }

    /// Dataset units of a field of `kind`.
    fn units_of(&self, kind: UnitKind) -> &str {
        match kind {
            UnitKind::Dimensionless => "",
            UnitKind::Length => &self.state.length_units,
            UnitKind::Temporal => &self.state.temporal_units,
            UnitKind::Angular => &self.state.angular_units,
        }
    }

    /// Multiplier from the stored units of `name` to `units` (dimensionless fields are never
    /// converted).
    pub(crate) fn header_factor(&self, name: &str, units: &str) -> Result<f64, Error> {
        let field = self.state.schema.field(name)?;
        Ok(units::factor(self.units_of(field.kind), units)?)
    }

    /// Scale every non-null value by `factor`.
    pub(crate) fn scale(&self, values: &mut [f64], factor: f64) {
        if factor == 1.0 {
            return;
        }
        let null = self.state.null_value;
        for value in values.iter_mut().filter(|v| **v != null) {
            *value *= factor;
        }
    }

    /// Read the headers `names` of the selected traces, one vector per name.
    pub fn read_headers<N: AsRef<str>>(
        &self,
        traces: &Selector,
        names: &[N],
    ) -> Result<Vec<Vec<f64>>, Error> {
        let columns = self.state.schema.indices(names)?;
        self.read_columns(traces, &columns)
    }

    /// Read one header of the selected traces, converted to `units` (empty for stored units).
    pub fn read_header(&self, name: &str, traces: &Selector, units: &str) -> Result<Vec<f64>, Error> {
        let factor = self.header_factor(name, units)?;
        let column = self.state.schema.index(name)?;
        let mut values = self
            .read_columns(traces, &[column])?
            .pop()
            .unwrap_or_default();
        self.scale(&mut values, factor);
        Ok(values)
    }

    /// Overwrite the headers `names` of the selected traces.
    pub fn write_headers<N: AsRef<str>>(
        &mut self,
        traces: &Selector,
        names: &[N],
        values: &[Vec<f64>],
    ) -> Result<(), Error> {
        let columns = self.state.schema.indices(names)?;
        self.write_columns(traces, &columns, values)
    }

    /// Overwrite one header of the selected traces, converting from `units`.
    pub fn write_header(
        &mut self,
        name: &str,
        traces: &Selector,
        values: &[f64],
        units: &str,
    ) -> Result<(), Error> {
        let field = self.state.schema.field(name)?;
        let factor = units::factor(units, self.units_of(field.kind))?;
        let column = field.index;
        let mut values = values.to_vec();
        self.scale(&mut values, factor);
        self.write_columns(traces, &[column], &[values])
    }

    /// Read whole header rows of the selected traces, in storage column order.
    pub fn read_header_rows(&self, traces: &Selector) -> Result<Vec<f64>, Error> {
        let len = self.state.traces;
        traces
            .validate(len)
            .map_err(|e| Error::selection("trace", e))?;
        let mut out = Vec::with_capacity(traces.count(len) * self.header_width());
        for run in traces.runs(len) {
            let mut start = run.start;
            while start < run.end {
                let end = (start + ROW_BLOCK).min(run.end);
                out.extend(self.read_rows(start..end)?);
                start = end;
            }
        }
        Ok(out)
    }

    /// Overwrite whole header rows starting at trace `first`.
    pub fn write_header_rows(&mut self, first: usize, rows: &[f64]) -> Result<(), Error> {
        let width = self.header_width();
        if rows.len() % width != 0 {
            return Err(Error::ShapeMismatch {
                what: "header rows",
                expected: width,
                found: rows.len() % width,
            });
        }
        let count = rows.len() / width;
        Selector::span(first, count)
            .validate(self.state.traces)
            .map_err(|e| Error::selection("trace", e))?;
        write_rows(&self.headers, width, first, rows)?;

        let null = self.state.null_value;
        for row in rows.chunks_exact(width) {
            for (limits, &value) in self.state.limits.iter_mut().zip(row) {
                expand(limits, value, null);
            }
        }
        self.invalidate_all();
        Ok(())
    }

    /// Read the `samples` window of the selected traces (row-major, one row per trace).
    pub fn read_traces(&self, traces: &Selector, samples: Range<usize>) -> Result<Vec<f32>, Error> {
        let len = self.state.traces;
        let n = self.state.samples;
        traces
            .validate(len)
            .map_err(|e| Error::selection("trace", e))?;
        check_samples(&samples, n)?;
        let width = samples.len();
        let mut out = Vec::with_capacity(traces.count(len) * width);
        if width == 0 {
            return Ok(out);
        }
        let block = (TRACE_BLOCK_BYTES / (n * 4)).max(1);
        for run in traces.runs(len) {
            if width == n {
                let mut start = run.start;
                while start < run.end {
                    let end = (start + block).min(run.end);
                    let mut buf = vec![0u8; (end - start) * n * 4];
                    self.traces.read_at(&mut buf, (start * n * 4) as u64)?;
                    out.extend(decode_f32(&buf));
                    start = end;
                }
            } else {
                let mut buf = vec![0u8; width * 4];
                for trace in run {
                    let offset = (trace * n + samples.start) * 4;
                    self.traces.read_at(&mut buf, offset as u64)?;
                    out.extend(decode_f32(&buf));
                }
            }
        }
        Ok(out)
    }

    /// All samples of one trace.
    pub fn read_trace(&self, trace: usize) -> Result<Vec<f32>, Error> {
        self.read_traces(&Selector::one(trace), 0..self.state.samples)
    }

    /// Overwrite the `samples` window of the selected traces.
    pub fn write_traces(
        &mut self,
        traces: &Selector,
        samples: Range<usize>,
        data: &[f32],
    ) -> Result<(), Error> {
        let len = self.state.traces;
        let n = self.state.samples;
        traces
            .validate(len)
            .map_err(|e| Error::selection("trace", e))?;
        check_samples(&samples, n)?;
        let width = samples.len();
        let count = traces.count(len);
        if data.len() != count * width {
            return Err(Error::ShapeMismatch {
                what: "trace samples",
                expected: count * width,
                found: data.len(),
            });
        }
        if width == 0 {
            return Ok(());
        }

        let mut cursor = 0;
        for run in traces.runs(len) {
            if width == n {
                let values = &data[cursor..cursor + run.len() * n];
                write_samples(&self.traces, n, run.start, values)?;
                cursor += values.len();
            } else {
                for trace in run {
                    let offset = (trace * n + samples.start) * 4;
                    let values = &data[cursor..cursor + width];
                    self.traces.write_at(&encode_f32(values), offset as u64)?;
                    cursor += width;
                }
            }
        }
        debug!(traces = count, samples = width, "wrote traces");
        Ok(())
    }

    /// Change the number of traces. New traces are zero filled.
    pub fn set_trace_count(&mut self, traces: usize) -> Result<(), Error> {
        let old = self.state.traces;
        if traces == old {
            return Ok(());
        }
        self.resize_blobs(traces, self.state.samples)?;
        if traces > old {
            self.expand_limits_with_zero();
        }
        self.state.traces = traces;
        self.invalidate_all();
        self.sync()?;
        debug!(old, traces, "resized trace count");
        Ok(())
    }

    /// Change the number of samples per trace, truncating or zero padding every trace.
    pub fn set_sample_count(&mut self, samples: usize) -> Result<(), Error> {
        let old = self.state.samples;
        if samples == old {
            return Ok(());
        }
        let traces = self.state.traces;
        if samples > old {
            self.traces.resize((traces * samples * 4) as u64)?;
            let mut buf = vec![0u8; old * 4];
            let zeros = vec![0u8; (samples - old) * 4];
            // Back to front so no trace is overwritten before it moves
            for trace in (0..traces).rev() {
                self.traces.read_at(&mut buf, (trace * old * 4) as u64)?;
                self.traces.write_at(&buf, (trace * samples * 4) as u64)?;
                self.traces
                    .write_at(&zeros, ((trace * samples + old) * 4) as u64)?;
            }
        } else {
            let mut buf = vec![0u8; samples * 4];
            for trace in 0..traces {
                self.traces.read_at(&mut buf, (trace * old * 4) as u64)?;
                self.traces.write_at(&buf, (trace * samples * 4) as u64)?;
            }
            self.traces.resize((traces * samples * 4) as u64)?;
        }
        self.state.samples = samples;
        self.state.bin_header[BIN_SAMP_NUM] = samples as f64;
        self.sync()?;
        debug!(old, samples, "resized sample count");
        Ok(())
    }

    /// The binary file header.
    pub fn bin_header(&self) -> [f64; BINARY_FIELD_COUNT] {
        self.state.bin_header
    }

    /// One binary header field by name.
    pub fn bin_header_value(&self, name: &str) -> Result<f64, Error> {
        let index =
            fields::binary_index(name).ok_or_else(|| Error::InvalidHeaderName(name.to_string()))?;
        Ok(self.state.bin_header[index])
    }

    /// Replace the binary header. Exactly 30 values are required.
    pub fn write_bin_header(&mut self, values: &[f64]) -> Result<(), Error> {
        if values.len() != BINARY_FIELD_COUNT {
            return Err(Error::ShapeMismatch {
                what: "binary header",
                expected: BINARY_FIELD_COUNT,
                found: values.len(),
            });
        }
        self.state.bin_header.copy_from_slice(values);
        self.persist()
    }

    /// Replace one binary header field by name.
    pub fn write_bin_header_value(&mut self, name: &str, value: f64) -> Result<(), Error> {
        let index =
            fields::binary_index(name).ok_or_else(|| Error::InvalidHeaderName(name.to_string()))?;
        self.state.bin_header[index] = value;
        self.persist()
    }

    /// The textual file header.
    pub fn text_header(&self) -> Result<TextHeader, Error> {
        Ok(TextHeader::from_bytes(&self.state.text_header)?)
    }

    /// Replace the textual header. Exactly 40 rows of at most 80 bytes are required.
    pub fn write_text_header<R: AsRef<str>>(&mut self, rows: &[R]) -> Result<(), Error> {
        if rows.len() != TEXT_ROWS {
            return Err(Error::ShapeMismatch {
                what: "text header rows",
                expected: TEXT_ROWS,
                found: rows.len(),
            });
        }
        if let Some(row) = rows.iter().find(|row| row.as_ref().len() > TEXT_COLUMNS) {
            return Err(Error::ShapeMismatch {
                what: "text header columns",
                expected: TEXT_COLUMNS,
                found: row.as_ref().len(),
            });
        }
        self.set_text_header(&TextHeader::from_rows(rows)?)
    }

    pub(crate) fn set_text_header(&mut self, header: &TextHeader) -> Result<(), Error> {
        self.state.text_header = header.as_bytes().to_vec();
        self.persist()
    }

    /// Smallest and largest finite, non-null value of header `name`, converted to `units`.
    ///
    /// Limits widen as headers are written and are exact after [Dataset::update_limits].
    pub fn limits(&self, name: &str, units: &str) -> Result<Option<(f64, f64)>, Error> {
        let column = self.state.schema.index(name)?;
        let (min, max) = self.state.limits[column];
        if min > max {
            return Ok(None);
        }
        let factor = self.header_factor(name, units)?;
        let (a, b) = (min * factor, max * factor);
        Ok(Some((a.min(b), a.max(b))))
    }

    /// Recompute the limits of every header from the stored values.
    pub fn update_limits(&mut self) -> Result<(), Error> {
        let width = self.header_width();
        let null = self.state.null_value;
        let mut limits = vec![EMPTY_LIMITS; width];
        let mut start = 0;
        while start < self.state.traces {
            let end = (start + ROW_BLOCK).min(self.state.traces);
            for row in self.read_rows(start..end)?.chunks_exact(width) {
                for (limits, &value) in limits.iter_mut().zip(row) {
                    expand(limits, value, null);
                }
            }
            start = end;
        }
        self.state.limits = limits;
        self.persist()
    }
}
