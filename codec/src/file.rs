use crate::{
    ebcdic,
    fields::{self, Field, BINARY_BASE, BINARY_FIELDS, BIN_FORMAT, BIN_SAMP_NUM, BIN_SAMP_RATE},
    progress::{Progress, Tracker},
    sample, BinaryHeader, Block, Endian, Error, SampleFormat, TextEncoding, TextHeader,
    TraceHeader, FILE_HEADER_SIZE, TEXT_HEADER_SIZE, TRACE_HEADER_SIZE,
};
use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    ops::{ControlFlow, Range},
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing::debug;

/// Smallest file that can hold the file headers and one trace header.
const MIN_FILE_SIZE: u64 = (FILE_HEADER_SIZE + TRACE_HEADER_SIZE) as u64;

/// Byte position of the `FORMAT` code word (0-based).
const FORMAT_OFFSET: usize = 3224;

/// Resolved layout of a SEG-Y file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    pub endian: Endian,
    pub format: SampleFormat,
    pub encoding: TextEncoding,
    /// Samples per trace.
    pub samples: usize,
    /// Number of traces.
    pub traces: usize,
}

impl Layout {
    /// Size of one trace record (header and samples).
    pub fn trace_size(&self) -> usize {
        TRACE_HEADER_SIZE + self.samples * self.format.size()
    }

    /// Byte offset of trace `index`.
    pub fn trace_offset(&self, index: usize) -> u64 {
        FILE_HEADER_SIZE as u64 + index as u64 * self.trace_size() as u64
    }

    /// Total file size.
    pub fn file_size(&self) -> u64 {
        self.trace_offset(self.traces)
    }

    fn check_traces(&self, traces: &Range<usize>) -> Result<(), Error> {
        if traces.start > traces.end || traces.end > self.traces {
            return Err(Error::OutOfRange {
                what: "trace",
                start: traces.start,
                end: traces.end,
                len: self.traces,
            });
        }
        Ok(())
    }
}

/// Caller-supplied layout values; anything left `None` is detected from the file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Overrides {
    pub endian: Option<Endian>,
    pub format: Option<SampleFormat>,
    pub encoding: Option<TextEncoding>,
    pub samples: Option<usize>,
    pub traces: Option<usize>,
}

/// The file headers of a SEG-Y file, used to detect its layout.
#[derive(Clone, Debug)]
pub struct Probe {
    header: Vec<u8>,
    len: u64,
}

impl Probe {
    /// Read the file headers of `path`.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();
        if len < MIN_FILE_SIZE {
            return Err(Error::NotSegy(format!(
                "{}: {len} bytes is too small",
                path.display()
            )));
        }
        let mut header = vec![0u8; FILE_HEADER_SIZE];
        file.read_exact(&mut header)?;
        Ok(Self { header, len })
    }

    /// Build a probe from in-memory file headers and the total file length.
    pub fn from_bytes(header: &[u8], len: u64) -> Result<Self, Error> {
        if header.len() < FILE_HEADER_SIZE || len < MIN_FILE_SIZE {
            return Err(Error::NotSegy(format!("{len} bytes is too small")));
        }
        Ok(Self {
            header: header[..FILE_HEADER_SIZE].to_vec(),
            len,
        })
    }

    fn bin_field(&self, index: usize, endian: Endian) -> f64 {
        let field: &Field = &BINARY_FIELDS[index];
        field.get(&self.header[TEXT_HEADER_SIZE..], BINARY_BASE, endian)
    }

    /// Guess the encoding of the textual header.
    pub fn encoding(&self) -> TextEncoding {
        ebcdic::detect(&self.header[..TEXT_HEADER_SIZE])
    }

    /// Detect the byte order from the `FORMAT` code word: the order in which it reads as a code
    /// in `1..=8` wins, big endian first.
    pub fn endian(&self) -> Result<Endian, Error> {
        let word = [self.header[FORMAT_OFFSET], self.header[FORMAT_OFFSET + 1]];
        if (1..=8).contains(&i16::from_be_bytes(word)) {
            return Ok(Endian::Big);
        }
        if (1..=8).contains(&i16::from_le_bytes(word)) {
            return Ok(Endian::Little);
        }
        Err(Error::InvalidData(
            "binary header",
            format!("cannot detect byte order from format word {word:?}"),
        ))
    }

    /// Sample format declared in the binary header.
    pub fn format(&self, endian: Endian) -> Result<SampleFormat, Error> {
        SampleFormat::from_code(self.bin_field(BIN_FORMAT, endian) as i64)
    }

    /// Samples per trace declared in the binary header (negative values read as zero).
    pub fn samples(&self, endian: Endian) -> usize {
        self.bin_field(BIN_SAMP_NUM, endian).max(0.0) as usize
    }

    /// Sample interval declared in the binary header.
    pub fn interval(&self, endian: Endian) -> f64 {
        self.bin_field(BIN_SAMP_RATE, endian)
    }

    /// Number of complete traces the file can hold.
    pub fn traces(&self, samples: usize, format: SampleFormat) -> usize {
        if samples == 0 {
            return 0;
        }
        let trace_size = (TRACE_HEADER_SIZE + samples * format.size()) as u64;
        ((self.len - FILE_HEADER_SIZE as u64) / trace_size) as usize
    }

    /// Resolve the full layout, detecting whatever `overrides` leaves out.
    pub fn layout(&self, overrides: &Overrides) -> Result<Layout, Error> {
        let endian = match overrides.endian {
            Some(endian) => endian,
            None => self.endian()?,
        };
        let format = match overrides.format {
            Some(format) => format,
            None => self.format(endian)?,
        };
        let encoding = overrides.encoding.unwrap_or_else(|| self.encoding());
        let samples = overrides.samples.unwrap_or_else(|| self.samples(endian));
        if samples == 0 {
            return Err(Error::InvalidData(
                "binary header",
                "sample count is zero".into(),
            ));
        }
        let available = self.traces(samples, format);
        let traces = overrides.traces.unwrap_or(available);
        if traces > available {
            return Err(Error::ShapeMismatch {
                what: "trace count",
                expected: available,
                found: traces,
            });
        }
        Ok(Layout {
            endian,
            format,
            encoding,
            samples,
            traces,
        })
    }
}

/// Returns true if `path` is large enough to hold a SEG-Y file with at least one trace.
pub fn is_segy(path: impl AsRef<Path>) -> bool {
    Probe::read(path).is_ok()
}

/// Detect the textual header encoding of `path`.
pub fn detect_text_encoding(path: impl AsRef<Path>) -> Result<TextEncoding, Error> {
    Ok(Probe::read(path)?.encoding())
}

/// Detect the byte order of `path`.
pub fn detect_endian(path: impl AsRef<Path>) -> Result<Endian, Error> {
    Probe::read(path)?.endian()
}

/// Detect the sample format of `path` (detecting the byte order too if not given).
pub fn detect_format(path: impl AsRef<Path>, endian: Option<Endian>) -> Result<SampleFormat, Error> {
    let probe = Probe::read(path)?;
    let endian = match endian {
        Some(endian) => endian,
        None => probe.endian()?,
    };
    probe.format(endian)
}

/// Samples per trace declared by `path`.
pub fn sample_count(path: impl AsRef<Path>, endian: Option<Endian>) -> Result<usize, Error> {
    let probe = Probe::read(path)?;
    let endian = match endian {
        Some(endian) => endian,
        None => probe.endian()?,
    };
    Ok(probe.samples(endian))
}

/// Sample interval declared by `path`.
pub fn sample_interval(path: impl AsRef<Path>, endian: Option<Endian>) -> Result<f64, Error> {
    let probe = Probe::read(path)?;
    let endian = match endian {
        Some(endian) => endian,
        None => probe.endian()?,
    };
    Ok(probe.interval(endian))
}

/// Number of traces in `path`: `(file size - 3600) / (240 + samples * sample size)`.
pub fn trace_count(
    path: impl AsRef<Path>,
    samples: Option<usize>,
    format: Option<SampleFormat>,
    endian: Option<Endian>,
) -> Result<usize, Error> {
    let probe = Probe::read(path)?;
    let endian = match endian {
        Some(endian) => endian,
        None => probe.endian()?,
    };
    let format = match format {
        Some(format) => format,
        None => probe.format(endian)?,
    };
    let samples = samples.unwrap_or_else(|| probe.samples(endian));
    Ok(probe.traces(samples, format))
}

/// A block of consecutive decoded traces.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Chunk {
    /// Index of the first trace in the file.
    pub start: usize,
    /// Samples stored per trace.
    pub samples_per_trace: usize,
    /// Trace headers, row-major (`traces x 78`).
    pub headers: Vec<f64>,
    /// Samples, row-major (`traces x samples_per_trace`).
    pub samples: Vec<f32>,
}

impl Chunk {
    /// Number of traces in the chunk.
    pub fn traces(&self) -> usize {
        self.headers.len() / fields::TRACE_FIELD_COUNT
    }

    /// Header values of trace `i` (relative to the chunk).
    pub fn header(&self, i: usize) -> &[f64] {
        &self.headers[i * fields::TRACE_FIELD_COUNT..(i + 1) * fields::TRACE_FIELD_COUNT]
    }

    /// Samples of trace `i` (relative to the chunk).
    pub fn trace(&self, i: usize) -> &[f32] {
        &self.samples[i * self.samples_per_trace..(i + 1) * self.samples_per_trace]
    }
}

/// Reads blocks of a SEG-Y file.
pub struct Reader {
    path: PathBuf,
    file: File,
    layout: Layout,
}

impl Reader {
    /// Open `path`, detecting its layout.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::open_with(path, &Overrides::default())
    }

    /// Open `path`, detecting whatever `overrides` leaves out.
    pub fn open_with(path: impl AsRef<Path>, overrides: &Overrides) -> Result<Self, Error> {
        let path = path.as_ref();
        let layout = Probe::read(path)?.layout(overrides)?;
        let file = File::open(path)?;
        debug!(
            path = %path.display(),
            traces = layout.traces,
            samples = layout.samples,
            format = ?layout.format,
            endian = ?layout.endian,
            "opened SEG-Y file"
        );
        Ok(Self {
            path: path.to_path_buf(),
            file,
            layout,
        })
    }

    /// Open another handle on the same file with the same layout.
    ///
    /// Each worker of a parallel import reads through its own handle.
    pub fn fork(&self) -> Result<Self, Error> {
        Ok(Self {
            path: self.path.clone(),
            file: File::open(&self.path)?,
            layout: self.layout,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_exact_at(&mut self, buf: &mut [u8], offset: u64) -> Result<(), Error> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::EndOfBuffer("file"),
            _ => Error::Io(e),
        })
    }

    /// Read and decode the textual header.
    pub fn text_header(&mut self) -> Result<TextHeader, Error> {
        let mut buf = vec![0u8; TextHeader::SIZE];
        self.read_exact_at(&mut buf, 0)?;
        TextHeader::decode(&buf, self.layout.encoding)
    }

    /// Read and decode the binary header.
    pub fn bin_header(&mut self) -> Result<BinaryHeader, Error> {
        let mut buf = vec![0u8; BinaryHeader::SIZE];
        self.read_exact_at(&mut buf, TEXT_HEADER_SIZE as u64)?;
        BinaryHeader::decode(&buf, self.layout.endian)
    }

    /// Read and decode the header of trace `index`.
    pub fn trace_header(&mut self, index: usize) -> Result<TraceHeader, Error> {
        self.layout.check_traces(&(index..index + 1))?;
        let mut buf = vec![0u8; TraceHeader::SIZE];
        self.read_exact_at(&mut buf, self.layout.trace_offset(index))?;
        TraceHeader::decode(&buf, self.layout.endian)
    }

    /// Read one trace header field for a range of traces.
    pub fn read_trace_header(&mut self, field: &str, traces: Range<usize>) -> Result<Vec<f64>, Error> {
        let index = fields::trace_index(field).ok_or_else(|| {
            Error::InvalidData("trace header", format!("unknown field {field}"))
        })?;
        let field = fields::TRACE_FIELDS[index];
        self.layout.check_traces(&traces)?;
        let mut values = Vec::with_capacity(traces.len());
        let mut buf = vec![0u8; field.width];
        for trace in traces {
            let offset = self.layout.trace_offset(trace) + field.offset(fields::TRACE_BASE) as u64;
            self.read_exact_at(&mut buf, offset)?;
            values.push(field.get(&buf, field.byte, self.layout.endian));
        }
        Ok(values)
    }

    /// Read and decode a range of whole traces with a single read.
    pub fn read_chunk(&mut self, traces: Range<usize>) -> Result<Chunk, Error> {
        self.read_traces_window(0..self.layout.samples, traces)
    }

    fn read_traces_window(
        &mut self,
        samples: Range<usize>,
        traces: Range<usize>,
    ) -> Result<Chunk, Error> {
        self.layout.check_traces(&traces)?;
        let layout = self.layout;
        let trace_size = layout.trace_size();
        let mut buf = vec![0u8; traces.len() * trace_size];
        self.read_exact_at(&mut buf, layout.trace_offset(traces.start))?;

        let width = samples.len();
        let mut chunk = Chunk {
            start: traces.start,
            samples_per_trace: width,
            headers: Vec::with_capacity(traces.len() * fields::TRACE_FIELD_COUNT),
            samples: vec![0f32; traces.len() * width],
        };
        let size = layout.format.size();
        for (i, record) in buf.chunks_exact(trace_size).enumerate() {
            let header = TraceHeader::decode(&record[..TRACE_HEADER_SIZE], layout.endian)?;
            chunk.headers.extend_from_slice(&header.values);
            let data = &record[TRACE_HEADER_SIZE + samples.start * size..];
            let out = &mut chunk.samples[i * width..(i + 1) * width];
            sample::decode(data, layout.format, layout.endian, out)?;
        }
        Ok(chunk)
    }

    /// Read a window of samples for a range of traces, `buffer` traces at a time.
    ///
    /// Progress is reported after every buffer and ends with exactly `1.0`. If the callback
    /// returns [ControlFlow::Break] the read stops with [Error::Cancelled].
    pub fn read_traces(
        &mut self,
        samples: Range<usize>,
        traces: Range<usize>,
        buffer: usize,
        progress: Option<&Progress<'_>>,
    ) -> Result<Chunk, Error> {
        if samples.start > samples.end || samples.end > self.layout.samples {
            return Err(Error::OutOfRange {
                what: "sample",
                start: samples.start,
                end: samples.end,
                len: self.layout.samples,
            });
        }
        self.layout.check_traces(&traces)?;
        let buffer = buffer.max(1);
        let tracker = Tracker::new(progress, traces.len());
        let mut out = Chunk {
            start: traces.start,
            samples_per_trace: samples.len(),
            ..Default::default()
        };
        let mut start = traces.start;
        while start < traces.end {
            let end = (start + buffer).min(traces.end);
            let chunk = self.read_traces_window(samples.clone(), start..end)?;
            out.headers.extend_from_slice(&chunk.headers);
            out.samples.extend_from_slice(&chunk.samples);
            if let ControlFlow::Break(()) = tracker.advance(end - start) {
                return Err(Error::Cancelled {
                    completed: end - traces.start,
                });
            }
            start = end;
        }
        tracker.finish();
        Ok(out)
    }
}

/// Writes a SEG-Y file with a fixed layout.
///
/// Trace records may be encoded on any thread; writes are serialized through an internal lock.
pub struct Writer {
    file: Mutex<File>,
    layout: Layout,
}

impl Writer {
    /// Create (or truncate) `path` and size it for `layout.traces` traces.
    pub fn create(path: impl AsRef<Path>, layout: Layout) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(layout.file_size())?;
        debug!(
            path = %path.display(),
            traces = layout.traces,
            samples = layout.samples,
            format = ?layout.format,
            endian = ?layout.endian,
            "created SEG-Y file"
        );
        Ok(Self {
            file: Mutex::new(file),
            layout,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    fn write_all_at(&self, buf: &[u8], offset: u64) -> Result<(), Error> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| Error::InvalidData("file", "writer lock poisoned".into()))?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        Ok(())
    }

    /// Write the textual header in the layout's encoding.
    pub fn write_text_header(&self, header: &TextHeader) -> Result<(), Error> {
        let buf = header.encode(self.layout.encoding)?;
        self.write_all_at(&buf, 0)
    }

    /// Write the binary header; `SAMP_NUM` and `FORMAT` are forced to match the layout.
    pub fn write_bin_header(&self, header: &BinaryHeader) -> Result<(), Error> {
        let mut header = *header;
        header.values[BIN_SAMP_NUM] = self.layout.samples as f64;
        header.values[BIN_FORMAT] = self.layout.format.code() as f64;
        let buf = header.encode(self.layout.endian)?;
        self.write_all_at(&buf, TEXT_HEADER_SIZE as u64)
    }

    /// Encode trace records without writing them.
    ///
    /// `headers` holds `n x 78` values and `samples` holds `n x samples` values.
    pub fn encode_traces(&self, headers: &[f64], samples: &[f32]) -> Result<Vec<u8>, Error> {
        let width = fields::TRACE_FIELD_COUNT;
        if headers.len() % width != 0 {
            return Err(Error::ShapeMismatch {
                what: "trace headers",
                expected: width,
                found: headers.len() % width,
            });
        }
        let traces = headers.len() / width;
        if samples.len() != traces * self.layout.samples {
            return Err(Error::ShapeMismatch {
                what: "trace samples",
                expected: traces * self.layout.samples,
                found: samples.len(),
            });
        }
        let mut buf = Vec::with_capacity(traces * self.layout.trace_size());
        for i in 0..traces {
            let header = TraceHeader::from_values(&headers[i * width..(i + 1) * width])?;
            header.write(&mut buf, self.layout.endian)?;
            let trace = &samples[i * self.layout.samples..(i + 1) * self.layout.samples];
            sample::encode(trace, self.layout.format, self.layout.endian, &mut buf)?;
        }
        Ok(buf)
    }

    /// Write already encoded trace records starting at trace `first`.
    pub fn write_encoded(&self, first: usize, records: &[u8]) -> Result<(), Error> {
        let trace_size = self.layout.trace_size();
        let count = records.len() / trace_size;
        if records.len() % trace_size != 0 {
            return Err(Error::ShapeMismatch {
                what: "trace records",
                expected: trace_size,
                found: records.len() % trace_size,
            });
        }
        self.layout.check_traces(&(first..first + count))?;
        self.write_all_at(records, self.layout.trace_offset(first))
    }

    /// Encode and write traces starting at trace `first`.
    pub fn write_traces(&self, first: usize, headers: &[f64], samples: &[f32]) -> Result<(), Error> {
        let records = self.encode_traces(headers, samples)?;
        self.write_encoded(first, &records)
    }

    /// Flush the file to disk.
    pub fn sync(&self) -> Result<(), Error> {
        let file = self
            .file
            .lock()
            .map_err(|_| Error::InvalidData("file", "writer lock poisoned".into()))?;
        file.sync_all()?;
        Ok(())
    }
}
