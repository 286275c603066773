//! A seismic dataset persisted in a single storage partition.
//!
//! # Format
//!
//! ```text
//! <partition>/
//!     left, right   versioned State (see [crate::metadata])
//!     headers       traces x fields, f64 little endian, row-major in storage column order
//!     traces        traces x samples, f32 little endian, row-major
//! ```
//!
//! Attribute changes are committed to the metadata blobs as they happen. Matrix writes are
//! durable once [Dataset::sync] returns.

use crate::{
    index::PrimaryKeyIndex, metadata::Metadata, view::SortedView, Error, HeaderSchema,
};
use geoseis_codec::{
    fields::{
        BINARY_FIELD_COUNT, BIN_FORMAT, BIN_SAMP_NUM, BIN_SAMP_RATE, TRACE_FIELDS, TRC_DELRECT,
    },
    SampleFormat, TextHeader,
};
use geoseis_geometry::Point;
use geoseis_runtime::{Blob, Storage};
use geoseis_utils::{units, Selector};
use std::{
    collections::HashMap,
    fmt,
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, info};

mod geometry;
mod keys;
mod matrix;
mod segy;
mod state;

pub use geometry::{PrestackGeometry, StackGeometry};
pub use keys::{KeyRange, SortedData};
pub use segy::{Conversion, ExportConfig, ImportConfig};
use state::State;

const HEADERS_BLOB: &[u8] = b"headers";
const TRACES_BLOB: &[u8] = b"traces";

macro_rules! named_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = ($code:literal, $text:literal)),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub(crate) fn code(self) -> u8 {
                match self {
                    $($name::$variant => $code),+
                }
            }

            pub(crate) fn from_code(code: u8) -> Result<Self, Error> {
                match code {
                    $($code => Ok($name::$variant),)+
                    other => Err(Error::Corrupt(format!(
                        "dataset metadata: {} code {other}",
                        stringify!($name)
                    ))),
                }
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s))
                    .copied()
                    .ok_or_else(|| Error::InvalidArgument {
                        name: stringify!($name),
                        reason: format!("unknown value {s}"),
                    })
            }
        }
    };
}

named_enum!(
    /// Vertical axis of the samples.
    Domain {
        Twt = (0, "TWT"),
        Owt = (1, "OWT"),
        Tvd = (2, "TVD"),
        Tvdss = (3, "TVDSS"),
        Tvdsd = (4, "TVDSD"),
        Md = (5, "MD"),
    }
);

named_enum!(
    /// Processing stage of the traces.
    DataType {
        Stack = (0, "STACK"),
        Prestack = (1, "PRESTACK"),
    }
);

named_enum!(
    SurveyType {
        TwoD = (0, "2D"),
        ThreeD = (1, "3D"),
    }
);

impl Domain {
    /// Whether samples are measured in time (otherwise in depth).
    pub fn is_temporal(self) -> bool {
        matches!(self, Self::Twt | Self::Owt)
    }
}

/// Parameters of a new dataset.
#[derive(Clone, Debug)]
pub struct Param {
    /// Samples per trace.
    pub samples: usize,
    /// Initial number of traces (headers and samples are zero filled).
    pub traces: usize,
    /// Sample interval, in the temporal units for time domains and the length units otherwise.
    pub sample_rate: f64,
    pub domain: Domain,
    pub data_type: DataType,
    pub survey_type: SurveyType,
    /// Seismic reference datum, in the length units.
    pub srd: f64,
    pub spatial_reference: String,
    pub length_units: String,
    pub temporal_units: String,
    pub angular_units: String,
    pub data_units: String,
    /// Header value meaning "no value" (ignored by indexes, limits and boundaries).
    pub null_value: f64,
    pub schema: HeaderSchema,
}

impl Default for Param {
    fn default() -> Self {
        Self {
            samples: 0,
            traces: 0,
            sample_rate: 0.0,
            domain: Domain::Twt,
            data_type: DataType::Stack,
            survey_type: SurveyType::ThreeD,
            srd: 0.0,
            spatial_reference: String::new(),
            length_units: "m".into(),
            temporal_units: "ms".into(),
            angular_units: "deg".into(),
            data_units: String::new(),
            null_value: f64::NAN,
            schema: HeaderSchema::standard(),
        }
    }
}

/// Derived lookup structures, keyed by storage column(s).
#[derive(Default)]
pub(crate) struct Caches {
    pub indexes: HashMap<usize, Arc<PrimaryKeyIndex>>,
    pub views: HashMap<Vec<usize>, Arc<SortedView>>,
}

/// Traces, trace headers and file headers of one seismic survey.
pub struct Dataset<S: Storage> {
    partition: String,
    metadata: Metadata<S::Blob>,
    headers: S::Blob,
    traces: S::Blob,
    state: State,
    caches: Mutex<Caches>,
}

fn check_param(param: &Param) -> Result<(), Error> {
    if param.schema.is_empty() {
        return Err(Error::InvalidArgument {
            name: "schema",
            reason: "no header fields".into(),
        });
    }
    check_kind("length units", &param.length_units, units::UnitKind::Length)?;
    check_kind("temporal units", &param.temporal_units, units::UnitKind::Temporal)?;
    check_kind("angular units", &param.angular_units, units::UnitKind::Angular)?;
    Ok(())
}

impl<S: Storage> Dataset<S> {
    /// Create a new dataset named `name` in `partition`.
    ///
    /// Fails with [Error::ObjectExists] if the partition already holds a dataset.
    pub fn create(storage: &S, partition: &str, name: &str, param: Param) -> Result<Self, Error> {
        check_param(&param)?;
        let metadata = Metadata::init(storage, partition)?;
        if metadata.get().is_some() {
            return Err(Error::ObjectExists(partition.to_string()));
        }

        let mut bin_header = [0.0; BINARY_FIELD_COUNT];
        bin_header[BIN_SAMP_RATE] = param.sample_rate;
        bin_header[BIN_SAMP_NUM] = param.samples as f64;
        bin_header[BIN_FORMAT] = SampleFormat::Ieee.code() as f64;
        let width = param.schema.len();
        let state = State {
            name: name.to_string(),
            samples: param.samples,
            traces: param.traces,
            domain: param.domain,
            data_type: param.data_type,
            survey_type: param.survey_type,
            srd: param.srd,
            spatial_reference: param.spatial_reference,
            length_units: param.length_units,
            temporal_units: param.temporal_units,
            angular_units: param.angular_units,
            data_units: param.data_units,
            null_value: param.null_value,
            schema: param.schema,
            bin_header,
            text_header: TextHeader::default().as_bytes().to_vec(),
            limits: vec![EMPTY_LIMITS; width],
            pkeys: Vec::new(),
            boundary: Vec::new(),
        };

        let (headers, _) = storage.open(partition, HEADERS_BLOB)?;
        let (traces, _) = storage.open(partition, TRACES_BLOB)?;
        let mut dataset = Self {
            partition: partition.to_string(),
            metadata,
            headers,
            traces,
            state,
            caches: Mutex::new(Caches::default()),
        };
        dataset.resize_blobs(param.traces, param.samples)?;
        if param.traces > 0 {
            dataset.expand_limits_with_zero();
        }
        dataset.sync()?;
        info!(partition, name, traces = param.traces, samples = param.samples, "created dataset");
        Ok(dataset)
    }

    /// Open the dataset stored in `partition`.
    pub fn open(storage: &S, partition: &str) -> Result<Self, Error> {
        let metadata = Metadata::init(storage, partition)?;
        let Some(payload) = metadata.get() else {
            return Err(Error::ObjectMissing(partition.to_string()));
        };
        let state = State::decode(payload)?;

        let (headers, headers_len) = storage.open(partition, HEADERS_BLOB)?;
        let (traces, traces_len) = storage.open(partition, TRACES_BLOB)?;
        let expected_headers = (state.traces * state.schema.len() * 8) as u64;
        let expected_traces = (state.traces * state.samples * 4) as u64;
        if headers_len != expected_headers || traces_len != expected_traces {
            return Err(Error::Corrupt(format!(
                "{partition}: matrices hold {headers_len}/{traces_len} bytes, expected \
                 {expected_headers}/{expected_traces}"
            )));
        }
        debug!(partition, name = state.name, traces = state.traces, "opened dataset");
        Ok(Self {
            partition: partition.to_string(),
            metadata,
            headers,
            traces,
            state,
            caches: Mutex::new(Caches::default()),
        })
    }

    /// Commit the current attributes.
    pub(crate) fn persist(&mut self) -> Result<(), Error> {
        self.metadata.put(self.state.encode())
    }

    /// Durably persist matrices and attributes.
    pub fn sync(&mut self) -> Result<(), Error> {
        self.headers.sync()?;
        self.traces.sync()?;
        self.persist()
    }

    pub(crate) fn caches(&self) -> MutexGuard<'_, Caches> {
        self.caches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Storage partition holding the dataset.
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Samples per trace.
    pub fn sample_count(&self) -> usize {
        self.state.samples
    }

    pub fn trace_count(&self) -> usize {
        self.state.traces
    }

    pub fn schema(&self) -> &HeaderSchema {
        &self.state.schema
    }

    /// Header names in display order.
    pub fn header_names(&self) -> Vec<String> {
        self.state.schema.names().map(String::from).collect()
    }

    /// Change the display order of the header fields (storage is untouched).
    pub fn set_header_order<N: AsRef<str>>(&mut self, names: &[N]) -> Result<(), Error> {
        self.state.schema = self.state.schema.reorder(names)?;
        self.persist()
    }

    pub fn domain(&self) -> Domain {
        self.state.domain
    }

    pub fn set_domain(&mut self, domain: Domain) -> Result<(), Error> {
        self.state.domain = domain;
        self.persist()
    }

    pub fn data_type(&self) -> DataType {
        self.state.data_type
    }

    pub fn set_data_type(&mut self, data_type: DataType) -> Result<(), Error> {
        self.state.data_type = data_type;
        self.persist()
    }

    pub fn survey_type(&self) -> SurveyType {
        self.state.survey_type
    }

    pub fn set_survey_type(&mut self, survey_type: SurveyType) -> Result<(), Error> {
        self.state.survey_type = survey_type;
        self.persist()
    }

    pub fn spatial_reference(&self) -> &str {
        &self.state.spatial_reference
    }

    pub fn set_spatial_reference(&mut self, srs: &str) -> Result<(), Error> {
        self.state.spatial_reference = srs.to_string();
        self.persist()
    }

    pub fn length_units(&self) -> &str {
        &self.state.length_units
    }

    /// Relabel the length units (stored values are not converted).
    pub fn set_length_units(&mut self, units: &str) -> Result<(), Error> {
        check_kind("length units", units, units::UnitKind::Length)?;
        self.state.length_units = units.to_string();
        self.persist()
    }

    pub fn temporal_units(&self) -> &str {
        &self.state.temporal_units
    }

    /// Relabel the temporal units (stored values are not converted).
    pub fn set_temporal_units(&mut self, units: &str) -> Result<(), Error> {
        check_kind("temporal units", units, units::UnitKind::Temporal)?;
        self.state.temporal_units = units.to_string();
        self.persist()
    }

    pub fn angular_units(&self) -> &str {
        &self.state.angular_units
    }

    /// Relabel the angular units (stored values are not converted).
    pub fn set_angular_units(&mut self, units: &str) -> Result<(), Error> {
        check_kind("angular units", units, units::UnitKind::Angular)?;
        self.state.angular_units = units.to_string();
        self.persist()
    }

    pub fn data_units(&self) -> &str {
        &self.state.data_units
    }

    pub fn set_data_units(&mut self, units: &str) -> Result<(), Error> {
        self.state.data_units = units.to_string();
        self.persist()
    }

    pub fn null_value(&self) -> f64 {
        self.state.null_value
    }

    /// Change the null value. Every cached index and view is dropped.
    pub fn set_null_value(&mut self, null: f64) -> Result<(), Error> {
        self.state.null_value = null;
        self.invalidate_all();
        self.persist()
    }

    /// Seismic reference datum, converted to `units` (empty for the dataset's length units).
    pub fn srd(&self, units: &str) -> Result<f64, Error> {
        Ok(self.state.srd * units::factor(&self.state.length_units, units)?)
    }

    /// Set the seismic reference datum, given in `units`.
    pub fn set_srd(&mut self, srd: f64, units: &str) -> Result<(), Error> {
        self.state.srd = srd * units::factor(units, &self.state.length_units)?;
        self.persist()
    }

    /// Units of the vertical axis: temporal for time domains, length otherwise.
    pub fn sample_units(&self) -> &str {
        if self.state.domain.is_temporal() {
            &self.state.temporal_units
        } else {
            &self.state.length_units
        }
    }

    /// Sample interval (binary header `SAMP_RATE`), converted to `units`.
    pub fn sample_rate(&self, units: &str) -> Result<f64, Error> {
        let factor = units::factor(self.sample_units(), units)?;
        Ok(self.state.bin_header[BIN_SAMP_RATE] * factor)
    }

    /// Set the sample interval, given in `units`.
    pub fn set_sample_rate(&mut self, rate: f64, units: &str) -> Result<(), Error> {
        let factor = units::factor(units, self.sample_units())?;
        self.state.bin_header[BIN_SAMP_RATE] = rate * factor;
        self.persist()
    }

    /// First sample of `trace` (trace header `DELRECT`), converted to `units`.
    pub fn first_sample(&self, trace: usize, units: &str) -> Result<f64, Error> {
        let factor = units::factor(self.sample_units(), units)?;
        let values = self.read_columns(&Selector::one(trace), &[self.delrect_column()?])?;
        Ok(values[0][0] * factor)
    }

    /// Set the first sample of every trace, given in `units`.
    pub fn set_first_sample(&mut self, value: f64, units: &str) -> Result<(), Error> {
        let factor = units::factor(units, self.sample_units())?;
        let column = self.delrect_column()?;
        let values = vec![value * factor; self.state.traces];
        self.write_columns(&Selector::All, &[column], &[values])
    }

    /// Last sample of `trace`, converted to `units`.
    pub fn last_sample(&self, trace: usize, units: &str) -> Result<f64, Error> {
        let first = self.first_sample(trace, units)?;
        let rate = self.sample_rate(units)?;
        Ok(first + rate * self.state.samples.saturating_sub(1) as f64)
    }

    /// Vertical position of every sample of `trace`, converted to `units`.
    pub fn samples_axis(&self, trace: usize, units: &str) -> Result<Vec<f64>, Error> {
        let first = self.first_sample(trace, units)?;
        let rate = self.sample_rate(units)?;
        Ok((0..self.state.samples)
            .map(|i| first + rate * i as f64)
            .collect())
    }

    /// The stored boundary polygon, in the dataset's length units.
    pub fn stored_boundary(&self) -> &[Point] {
        &self.state.boundary
    }

    fn delrect_column(&self) -> Result<usize, Error> {
        self.state.schema.index(TRACE_FIELDS[TRC_DELRECT].name)
    }
}

/// Limits of a column that holds no finite value yet.
pub(crate) const EMPTY_LIMITS: (f64, f64) = (f64::INFINITY, f64::NEG_INFINITY);

fn check_kind(name: &'static str, unit: &str, kind: units::UnitKind) -> Result<(), Error> {
    match units::kind(unit) {
        Some(k) if k == kind || k == units::UnitKind::Dimensionless => Ok(()),
        _ => Err(Error::InvalidArgument {
            name,
            reason: format!("{unit} is not a {kind:?} unit"),
        }),
    }
}
