//! Error types for codec operations

use crate::SampleFormat;
use thiserror::Error;

/// Error type for codec operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("unexpected end of buffer in {0}")]
    EndOfBuffer(&'static str),
    #[error("extra data found in {0}: {1} bytes")]
    ExtraData(&'static str, usize), // block, bytes left
    #[error("invalid data in {0}: {1}")]
    InvalidData(&'static str, String), // block, reason
    #[error("unsupported sample format code: {0}")]
    UnsupportedFormat(i64),
    #[error("value {value} does not fit field {field} ({width} bytes)")]
    FieldOverflow {
        field: &'static str,
        value: f64,
        width: usize,
    },
    #[error("sample {value} cannot be encoded as {format:?}")]
    SampleOverflow { value: f32, format: SampleFormat },
    #[error("shape mismatch in {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("{what} range {start}..{end} exceeds {len}")]
    OutOfRange {
        what: &'static str,
        start: usize,
        end: usize,
        len: usize,
    },
    #[error("not a SEG-Y file: {0}")]
    NotSegy(String),
    #[error("cancelled after {completed} traces")]
    Cancelled { completed: usize },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
