//! Locate traces by header value.

use super::Dataset;
use crate::{
    index::{normalize, PrimaryKeyIndex},
    view::{compare_keys, SortedView},
    Error,
};
use geoseis_runtime::Storage;
use geoseis_utils::Selector;
use std::{ops::Range, sync::Arc};
use tracing::{debug, info};

/// Headers registered by [Dataset::finalize].
const DEFAULT_KEYS: [&str; 4] = ["CDP_X", "CDP_Y", "INLINE", "XLINE"];

/// Inclusive range of one header.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyRange {
    pub name: String,
    pub min: f64,
    pub max: f64,
}

impl KeyRange {
    pub fn new(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            min,
            max,
        }
    }

    fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Traces matching a set of [KeyRange]s, ordered by their key tuple.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SortedData {
    /// Matching trace indices.
    pub traces: Vec<usize>,
    /// Key headers of the matching traces, one vector per range.
    pub headers: Vec<Vec<f64>>,
    /// Requested samples of the matching traces (row-major), if any were requested.
    pub samples: Option<Vec<f32>>,
}

impl<S: Storage> Dataset<S> {
    /// Index header `name`, reusing the cached index while the column is unchanged.
    pub fn build_index(&self, name: &str) -> Result<Arc<PrimaryKeyIndex>, Error> {
        let column = self.state.schema.index(name)?;
        if let Some(index) = self.caches().indexes.get(&column) {
            return Ok(index.clone());
        }
        let values = self
            .read_columns(&Selector::All, &[column])?
            .pop()
            .unwrap_or_default();
        let index = Arc::new(PrimaryKeyIndex::build(name, &values, self.state.null_value));
        self.caches().indexes.insert(column, index.clone());
        Ok(index)
    }

    /// Register `name` as a primary key.
    pub fn add_pkey(&mut self, name: &str) -> Result<(), Error> {
        self.state.schema.index(name)?;
        if self.has_pkey(name) {
            return Ok(());
        }
        self.state.pkeys.push(name.to_string());
        self.persist()
    }

    /// Unregister `name`. Returns whether it was registered.
    pub fn remove_pkey(&mut self, name: &str) -> Result<bool, Error> {
        let before = self.state.pkeys.len();
        self.state.pkeys.retain(|key| key != name);
        if self.state.pkeys.len() == before {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    pub fn has_pkey(&self, name: &str) -> bool {
        self.state.pkeys.iter().any(|key| key == name)
    }

    /// Registered primary keys, in registration order.
    pub fn pkey_names(&self) -> &[String] {
        &self.state.pkeys
    }

    /// Traces whose `name` lies in `[min, max]`, in ascending key order (ties by trace index).
    pub fn pkey_indexes(&self, name: &str, min: f64, max: f64) -> Result<Vec<usize>, Error> {
        Ok(self.build_index(name)?.query_range(min, max))
    }

    /// Number of distinct non-null values of `name`.
    pub fn pkey_size(&self, name: &str) -> Result<usize, Error> {
        let index = self.build_index(name)?;
        Ok(index.values().iter().filter(|v| !v.is_nan()).count())
    }

    /// Number of regular bins `min + k * step` covering `[min, max]`.
    ///
    /// See [PrimaryKeyIndex::size_regular]: sparse or noisy keys yield the nominal grid size,
    /// which is an estimate.
    pub fn pkey_size_regular(
        &self,
        name: &str,
        min: f64,
        max: f64,
        step: f64,
    ) -> Result<usize, Error> {
        self.build_index(name)?.size_regular(min, max, step)
    }

    /// Number of traces whose `name` lies in `[min, max]`.
    pub fn pkey_trace_size(&self, name: &str, min: f64, max: f64) -> Result<usize, Error> {
        Ok(self.build_index(name)?.trace_size(min, max))
    }

    /// Distinct non-null values of `name` in ascending order, converted to `units`.
    pub fn pkey_values(&self, name: &str, units: &str) -> Result<Vec<f64>, Error> {
        let factor = self.header_factor(name, units)?;
        let index = self.build_index(name)?;
        Ok(index
            .values()
            .iter()
            .filter(|v| !v.is_nan())
            .map(|v| v * factor)
            .collect())
    }

    /// Every trace ordered by the tuple of headers `keys`.
    pub fn sorted_view<N: AsRef<str>>(&self, keys: &[N]) -> Result<Arc<SortedView>, Error> {
        if keys.is_empty() {
            return Err(Error::InvalidArgument {
                name: "sort keys",
                reason: "at least one key is required".into(),
            });
        }
        let columns = self.state.schema.indices(keys)?;
        if let Some(view) = self.caches().views.get(&columns) {
            return Ok(view.clone());
        }
        let values = self.read_columns(&Selector::All, &columns)?;
        let names = keys.iter().map(|k| k.as_ref().to_string()).collect();
        let view = Arc::new(SortedView::build(names, &values, self.state.null_value));
        self.caches().views.insert(columns, view.clone());
        Ok(view)
    }

    /// Traces whose headers lie inside every range of `keys`, sorted by the key tuple
    /// (ascending, ties by trace index).
    ///
    /// Candidates come from the index of the first key and are filtered by the others. If
    /// `samples` is given, that window of every matching trace is read too.
    pub fn sorted_data(
        &self,
        keys: &[KeyRange],
        samples: Option<Range<usize>>,
    ) -> Result<SortedData, Error> {
        let Some(first) = keys.first() else {
            return Err(Error::InvalidArgument {
                name: "key ranges",
                reason: "at least one key is required".into(),
            });
        };
        let columns = keys
            .iter()
            .map(|key| self.state.schema.index(&key.name))
            .collect::<Result<Vec<_>, _>>()?;

        let mut candidates = self.pkey_indexes(&first.name, first.min, first.max)?;
        candidates.sort_unstable();
        let values = self.read_columns(&Selector::List(candidates.clone()), &columns)?;

        let null = self.state.null_value;
        let mut rows: Vec<(usize, Vec<f64>)> = candidates
            .iter()
            .enumerate()
            .map(|(i, &trace)| (trace, values.iter().map(|column| column[i]).collect()))
            .filter(|(_, row): &(usize, Vec<f64>)| {
                row.iter()
                    .zip(keys)
                    .all(|(&value, key)| key.contains(normalize(value, null)))
            })
            .collect();
        // Stable over ascending trace indices, so equal tuples stay in trace order
        rows.sort_by(|a, b| compare_keys(&a.1, &b.1));

        let traces: Vec<usize> = rows.iter().map(|(trace, _)| *trace).collect();
        let mut headers = vec![Vec::with_capacity(rows.len()); keys.len()];
        for (_, row) in &rows {
            for (column, &value) in headers.iter_mut().zip(row) {
                column.push(value);
            }
        }
        let samples = match samples {
            Some(window) => Some(self.read_traces(&Selector::List(traces.clone()), window)?),
            None => None,
        };
        debug!(keys = keys.len(), traces = traces.len(), "selected sorted data");
        Ok(SortedData {
            traces,
            headers,
            samples,
        })
    }

    /// Recompute derived attributes once traces and headers are in place: exact limits, the
    /// default primary keys and the boundary. Everything is synced.
    pub fn finalize(&mut self) -> Result<(), Error> {
        self.update_limits()?;
        for key in DEFAULT_KEYS {
            if self.state.schema.contains(key) && !self.has_pkey(key) {
                self.state.pkeys.push(key.to_string());
            }
        }
        self.update_boundary()?;
        self.sync()?;
        info!(
            name = self.state.name,
            traces = self.state.traces,
            pkeys = ?self.state.pkeys,
            "finalized dataset"
        );
        Ok(())
    }
}
