//! Leverage common functionality across seismic primitives.

use std::ops::Range;
use thiserror::Error;

pub mod srs;
pub mod units;

/// Errors that can occur when using utilities.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("unsupported conversion: {from} -> {to}")]
    UnsupportedConversion { from: String, to: String },
    #[error("index {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },
    #[error("invalid range: {start}..{end}")]
    InvalidRange { start: usize, end: usize },
}

/// Converts bytes to a hexadecimal string.
pub fn hex(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes.iter() {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

/// Converts a hexadecimal string to bytes.
pub fn from_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }

    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

/// Selection of rows (traces) or columns (samples) of a matrix.
///
/// Every matrix accessor in the workspace takes a [Selector] so there is one canonical
/// read and write path per matrix; convenience wrappers build the selector for the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    /// Every index in `0..len`.
    All,
    /// A half-open range of indices.
    Range(Range<usize>),
    /// An explicit list of indices (order is preserved, duplicates are allowed).
    List(Vec<usize>),
}

impl Selector {
    /// Select `count` indices starting at `start`.
    pub fn span(start: usize, count: usize) -> Self {
        Self::Range(start..start.saturating_add(count))
    }

    /// Select a single index.
    pub fn one(index: usize) -> Self {
        Self::Range(index..index.saturating_add(1))
    }

    /// Check that every selected index is below `len`.
    pub fn validate(&self, len: usize) -> Result<(), Error> {
        match self {
            Self::All => Ok(()),
            Self::Range(range) => {
                if range.start > range.end {
                    return Err(Error::InvalidRange {
                        start: range.start,
                        end: range.end,
                    });
                }
                if range.end > len {
                    return Err(Error::OutOfRange {
                        index: range.end - 1,
                        len,
                    });
                }
                Ok(())
            }
            Self::List(list) => match list.iter().find(|i| **i >= len) {
                Some(index) => Err(Error::OutOfRange { index: *index, len }),
                None => Ok(()),
            },
        }
    }

    /// Number of selected indices, given a matrix dimension of `len`.
    pub fn count(&self, len: usize) -> usize {
        match self {
            Self::All => len,
            Self::Range(range) => range.end.saturating_sub(range.start),
            Self::List(list) => list.len(),
        }
    }

    /// Materialize the selected indices.
    pub fn indices(&self, len: usize) -> Vec<usize> {
        match self {
            Self::All => (0..len).collect(),
            Self::Range(range) => range.clone().collect(),
            Self::List(list) => list.clone(),
        }
    }

    /// Group the selected indices into maximal runs of consecutive indices, preserving
    /// selection order.
    ///
    /// Runs let callers issue one blob read per contiguous block instead of one per index.
    pub fn runs(&self, len: usize) -> Vec<Range<usize>> {
        match self {
            Self::All if len == 0 => Vec::new(),
            Self::All => vec![0..len],
            Self::Range(range) if range.is_empty() => Vec::new(),
            Self::Range(range) => vec![range.clone()],
            Self::List(list) => {
                let mut runs: Vec<Range<usize>> = Vec::new();
                for &index in list {
                    match runs.last_mut() {
                        Some(run) if run.end == index => run.end += 1,
                        _ => runs.push(index..index + 1),
                    }
                }
                runs
            }
        }
    }
}

impl From<Range<usize>> for Selector {
    fn from(range: Range<usize>) -> Self {
        Self::Range(range)
    }
}

impl From<Vec<usize>> for Selector {
    fn from(list: Vec<usize>) -> Self {
        Self::List(list)
    }
}
