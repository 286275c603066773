//! Read and write SEG-Y seismic files.
//!
//! # Overview
//!
//! A SEG-Y file is a fixed-size file header followed by fixed-size trace records. This crate
//! decodes and encodes every block of that layout in either byte order, converts samples between
//! the supported on-disk formats and `f32`, and provides helpers to detect the layout of an
//! unknown file.
//!
//! # Format
//!
//! ```text
//! +------------------+-------------------+----------------------------------------+-----+
//! | Text header      | Binary header     | Trace 0                                | ... |
//! | 40 x 80 bytes    | 400 bytes         | 240-byte header | n_samp * size(format) |     |
//! | ASCII or EBCDIC  | 30 integer fields | 78 integer fields | samples             |     |
//! +------------------+-------------------+----------------------------------------+-----+
//! 0                  3200                3600
//! ```
//!
//! Integer header fields are 2 or 4 bytes wide (see [fields]). All values are exposed as `f64`
//! so they can be stored in a single header matrix.
//!
//! # Sample formats
//!
//! | Code | Format                       |
//! |------|------------------------------|
//! | 1    | 4-byte IBM hexadecimal float |
//! | 2    | 4-byte two's complement int  |
//! | 3    | 2-byte two's complement int  |
//! | 5    | 4-byte IEEE float            |
//! | 8    | 1-byte two's complement int  |
//!
//! # Example
//!
//! ```no_run
//! use geoseis_codec::Reader;
//!
//! let mut reader = Reader::open("survey.sgy").unwrap();
//! let layout = *reader.layout();
//! let text = reader.text_header().unwrap();
//! let chunk = reader.read_chunk(0..layout.traces.min(10)).unwrap();
//! println!("{} traces of {} samples", layout.traces, layout.samples);
//! println!("{}", text.rows()[0]);
//! assert_eq!(chunk.samples.len(), chunk.traces() * layout.samples);
//! ```

use bytes::{Buf, BufMut};

pub mod ebcdic;
pub mod error;
pub mod fields;
mod file;
mod header;
pub mod progress;
pub mod sample;

pub use error::Error;
pub use file::{
    detect_endian, detect_format, detect_text_encoding, is_segy, sample_count, sample_interval,
    trace_count, Chunk, Layout, Overrides, Probe, Reader, Writer,
};
pub use header::{BinaryHeader, TextHeader, TraceHeader};
pub use progress::{Progress, Tracker};

/// Size of the textual file header.
pub const TEXT_HEADER_SIZE: usize = 3200;
/// Rows in the textual file header.
pub const TEXT_ROWS: usize = 40;
/// Bytes per row of the textual file header.
pub const TEXT_COLUMNS: usize = 80;
/// Size of the binary file header.
pub const BINARY_HEADER_SIZE: usize = 400;
/// Size of both file headers.
pub const FILE_HEADER_SIZE: usize = TEXT_HEADER_SIZE + BINARY_HEADER_SIZE;
/// Size of each trace header.
pub const TRACE_HEADER_SIZE: usize = 240;

/// Byte order of binary values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Endian {
    #[default]
    Big,
    Little,
}

/// Character encoding of the textual file header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    Ascii,
    #[default]
    Ebcdic,
}

/// On-disk encoding of trace samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// 4-byte IBM hexadecimal float.
    Ibm,
    /// 4-byte two's complement integer.
    Int4,
    /// 2-byte two's complement integer.
    Int2,
    /// 4-byte IEEE float.
    #[default]
    Ieee,
    /// 1-byte two's complement integer.
    Int1,
}

impl SampleFormat {
    /// The binary header `FORMAT` code.
    pub const fn code(self) -> i16 {
        match self {
            Self::Ibm => 1,
            Self::Int4 => 2,
            Self::Int2 => 3,
            Self::Ieee => 5,
            Self::Int1 => 8,
        }
    }

    /// Bytes per sample.
    pub const fn size(self) -> usize {
        match self {
            Self::Ibm | Self::Int4 | Self::Ieee => 4,
            Self::Int2 => 2,
            Self::Int1 => 1,
        }
    }

    /// Resolve a `FORMAT` code.
    pub fn from_code(code: i64) -> Result<Self, Error> {
        match code {
            1 => Ok(Self::Ibm),
            2 => Ok(Self::Int4),
            3 => Ok(Self::Int2),
            5 => Ok(Self::Ieee),
            8 => Ok(Self::Int1),
            other => Err(Error::UnsupportedFormat(other)),
        }
    }
}

/// A fixed-size block of a SEG-Y file.
///
/// `Cfg` carries whatever the block needs to interpret its bytes (byte order for binary blocks,
/// character encoding for the textual header).
pub trait Block: Sized {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Name used in error messages.
    const NAME: &'static str;

    /// Configuration required to read or write the block.
    type Cfg: Copy;

    /// Encodes this block by writing exactly [Block::SIZE] bytes to a buffer.
    fn write(&self, buf: &mut impl BufMut, cfg: Self::Cfg) -> Result<(), Error>;

    /// Reads a block from the buffer, consuming exactly [Block::SIZE] bytes.
    ///
    /// Callers must ensure at least [Block::SIZE] bytes remain.
    fn read_cfg(buf: &mut impl Buf, cfg: Self::Cfg) -> Result<Self, Error>;

    /// Encodes the block into a new buffer.
    fn encode(&self, cfg: Self::Cfg) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        self.write(&mut buf, cfg)?;
        assert_eq!(buf.len(), Self::SIZE, "write() did not write expected bytes");
        Ok(buf)
    }

    /// Decodes a block from a buffer holding exactly [Block::SIZE] bytes.
    fn decode(mut bytes: &[u8], cfg: Self::Cfg) -> Result<Self, Error> {
        if bytes.len() < Self::SIZE {
            return Err(Error::EndOfBuffer(Self::NAME));
        }
        let block = Self::read_cfg(&mut bytes, cfg)?;
        if !bytes.is_empty() {
            return Err(Error::ExtraData(Self::NAME, bytes.len()));
        }
        Ok(block)
    }
}
