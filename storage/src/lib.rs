//! Persist, index and interchange seismic trace datasets.
//!
//! # Overview
//!
//! A [Dataset] stores a matrix of trace samples (`traces x samples`, `f32`) next to a matrix of
//! trace headers (`traces x fields`, `f64`), together with the SEG-Y binary and textual headers,
//! descriptive attributes (domain, units, spatial reference, ...), per-header limits and a
//! boundary polygon. Datasets live inside a [Container] and persist across restarts through any
//! [geoseis_runtime::Storage].
//!
//! Traces are located by header value through derived, rebuildable caches:
//!
//! * [PrimaryKeyIndex]: distinct values of one header column, each mapped to the ascending set
//!   of traces holding it.
//! * [SortedView]: every trace ordered by a tuple of header columns.
//!
//! Both are built lazily on first use, dropped whenever a participating column (or the trace
//! count) changes and rebuilt before the next read, so a stale answer is never returned.
//!
//! # Interchange
//!
//! [Dataset::import_segy] and [Dataset::export_segy] move traces between a dataset and a SEG-Y
//! file. The trace range is split into fixed chunks before any work is dispatched onto a bounded
//! worker pool, and each chunk owns an exclusive destination range, so the result does not depend
//! on the number of threads or on scheduling.
//!
//! # Durability
//!
//! Attribute changes are committed immediately to a pair of checksummed metadata blobs (see
//! [metadata]). Matrix writes become durable on [Dataset::sync].

use thiserror::Error;

pub mod container;
mod dataset;
pub mod index;
pub mod metadata;
pub mod schema;
pub mod view;

pub use container::{Container, CreationPolicy, Object, ObjectKind};
pub use dataset::{
    Conversion, DataType, Dataset, Domain, ExportConfig, ImportConfig, KeyRange, Param,
    PrestackGeometry, SortedData, StackGeometry, SurveyType,
};
pub use index::PrimaryKeyIndex;
pub use schema::{HeaderField, HeaderSchema};
pub use view::SortedView;

/// Errors that can occur when interacting with a [Dataset] or [Container].
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid header name: {0}")]
    InvalidHeaderName(String),
    #[error("shape mismatch in {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("{what} index {index} out of range (len {len})")]
    IndexRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
    #[error("invalid {what} range: {start}..{end}")]
    InvalidRange {
        what: &'static str,
        start: usize,
        end: usize,
    },
    #[error("codec error: {0}")]
    Codec(#[from] geoseis_codec::Error),
    #[error("runtime error: {0}")]
    Runtime(#[from] geoseis_runtime::Error),
    #[error("geometry error: {0}")]
    Geometry(#[from] geoseis_geometry::Error),
    #[error("unsupported conversion: {from} -> {to}")]
    UnsupportedConversion { from: String, to: String },
    #[error("invalid {name}: {reason}")]
    InvalidArgument { name: &'static str, reason: String },
    #[error("thread pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("cancelled after committing {committed} traces")]
    Cancelled { committed: usize },
    #[error("corrupt {0}")]
    Corrupt(String),
    #[error("object already exists: {0}")]
    ObjectExists(String),
    #[error("object missing: {0}")]
    ObjectMissing(String),
}

impl Error {
    /// Attach `what` (trace, sample, ...) to a selection error.
    pub(crate) fn selection(what: &'static str, err: geoseis_utils::Error) -> Self {
        match err {
            geoseis_utils::Error::OutOfRange { index, len } => Self::IndexRange { what, index, len },
            geoseis_utils::Error::InvalidRange { start, end } => {
                Self::InvalidRange { what, start, end }
            }
            other => other.into(),
        }
    }
}

impl From<geoseis_utils::Error> for Error {
    fn from(err: geoseis_utils::Error) -> Self {
        match err {
            geoseis_utils::Error::UnsupportedConversion { from, to } => {
                Self::UnsupportedConversion { from, to }
            }
            geoseis_utils::Error::OutOfRange { index, len } => Self::IndexRange {
                what: "selection",
                index,
                len,
            },
            geoseis_utils::Error::InvalidRange { start, end } => Self::InvalidRange {
                what: "selection",
                start,
                end,
            },
        }
    }
}
