//! Map distinct header values to the traces that hold them.
//!
//! # Layout
//!
//! [PrimaryKeyIndex] stores its groups in compressed-row form: `values` holds the distinct keys in
//! ascending order, `traces` holds every trace index grouped by key (ascending within a group)
//! and `offsets[k]..offsets[k + 1]` delimits the traces of key `k`.
//!
//! ```text
//! values:  [ 1.0 | 2.0 | 5.0 | NaN ]
//! offsets: [ 0   | 2   | 3   | 5   | 6 ]
//! traces:  [ 0 3 | 1   | 2 4 | 5 ]
//! ```
//!
//! Negative zero is stored as zero. NaN (and the dataset's null value) are grouped into a single
//! trailing key that never matches a range query.

use crate::Error;
use std::ops::Range;
use tracing::debug;

/// Map a raw header value onto its index key.
pub(crate) fn normalize(value: f64, null: f64) -> f64 {
    if value.is_nan() || value == null {
        f64::NAN
    } else if value == 0.0 {
        0.0
    } else {
        value
    }
}

/// Relative tolerance used to decide whether a value sits on a regular grid node.
const GRID_TOLERANCE: f64 = 1e-9;

/// Distinct values of one header column and the traces sharing each of them.
#[derive(Clone, Debug, PartialEq)]
pub struct PrimaryKeyIndex {
    name: String,
    values: Vec<f64>,
    offsets: Vec<usize>,
    traces: Vec<usize>,
}

impl PrimaryKeyIndex {
    /// Build an index over `column` (one value per trace).
    ///
    /// Values equal to `null` are treated like NaN.
    pub fn build(name: impl Into<String>, column: &[f64], null: f64) -> Self {
        let mut pairs: Vec<(f64, usize)> = column
            .iter()
            .enumerate()
            .map(|(trace, &value)| (normalize(value, null), trace))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut values = Vec::new();
        let mut offsets = vec![0];
        let mut traces = Vec::with_capacity(pairs.len());
        for (i, &(value, trace)) in pairs.iter().enumerate() {
            let same = i > 0 && {
                let prev = pairs[i - 1].0;
                prev == value || (prev.is_nan() && value.is_nan())
            };
            if !same {
                if i > 0 {
                    offsets.push(i);
                }
                values.push(value);
            }
            traces.push(trace);
        }
        if !traces.is_empty() {
            offsets.push(traces.len());
        }

        let name = name.into();
        debug!(name, traces = traces.len(), keys = values.len(), "built primary key index");
        Self {
            name,
            values,
            offsets,
            traces,
        }
    }

    /// Header name the index was built over.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Distinct keys in ascending order (a NaN key, if any, comes last).
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of indexed traces.
    pub fn trace_count(&self) -> usize {
        self.traces.len()
    }

    /// Traces holding the `k`-th key.
    pub fn group(&self, k: usize) -> &[usize] {
        &self.traces[self.offsets[k]..self.offsets[k + 1]]
    }

    /// Iterate over `(key, traces)` pairs in key order.
    pub fn groups(&self) -> impl Iterator<Item = (f64, &[usize])> {
        self.values
            .iter()
            .enumerate()
            .map(|(k, &value)| (value, self.group(k)))
    }

    /// Positions (in [Self::values]) of the keys inside `[min, max]`.
    fn keys_in(&self, min: f64, max: f64) -> Range<usize> {
        if min.is_nan() || max.is_nan() {
            return 0..0;
        }
        // The trailing NaN key fails both predicates
        let start = self.values.partition_point(|v| *v < min);
        let end = self.values.partition_point(|v| *v <= max);
        start..end.max(start)
    }

    /// Traces whose key lies in `[min, max]`, in ascending key order (ties by trace index).
    pub fn query_range(&self, min: f64, max: f64) -> Vec<usize> {
        let keys = self.keys_in(min, max);
        if keys.is_empty() {
            return Vec::new();
        }
        self.traces[self.offsets[keys.start]..self.offsets[keys.end]].to_vec()
    }

    /// Number of traces whose key lies in `[min, max]`.
    pub fn trace_size(&self, min: f64, max: f64) -> usize {
        let keys = self.keys_in(min, max);
        if keys.is_empty() {
            return 0;
        }
        self.offsets[keys.end] - self.offsets[keys.start]
    }

    /// Estimate the number of regular bins `min + k * step` covering `[min, max]`.
    ///
    /// If the distinct keys inside the range fill every grid node exactly, the measured distinct
    /// count is returned. Otherwise (sparse or noisy keys) the nominal grid size
    /// `ceil((max - min) / step) + 1` is returned. The nominal value is an estimate, not a
    /// measurement.
    pub fn size_regular(&self, min: f64, max: f64, step: f64) -> Result<usize, Error> {
        if !step.is_finite() || step <= 0.0 {
            return Err(Error::InvalidArgument {
                name: "step",
                reason: format!("{step} is not a positive number"),
            });
        }
        if !min.is_finite() || !max.is_finite() || max < min {
            return Err(Error::InvalidArgument {
                name: "key range",
                reason: format!("[{min}, {max}] is not a valid range"),
            });
        }
        let span = (max - min) / step;
        let nominal = (span - span.abs().max(1.0) * GRID_TOLERANCE).ceil().max(0.0) as usize + 1;

        let keys = self.keys_in(min, max);
        let on_grid = self.values[keys.clone()].iter().all(|&value| {
            let k = (value - min) / step;
            (k - k.round()).abs() <= k.abs().max(1.0) * GRID_TOLERANCE
        });
        if on_grid && keys.len() == nominal {
            return Ok(keys.len());
        }
        Ok(nominal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoseis_macros::test_traced;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test_traced]
    fn test_build_layout() {
        let column = [1.0, 2.0, 5.0, 1.0, 5.0, f64::NAN];
        let index = PrimaryKeyIndex::build("CDP", &column, f64::NAN);
        assert_eq!(index.name(), "CDP");
        assert_eq!(&index.values()[..3], &[1.0, 2.0, 5.0]);
        assert!(index.values()[3].is_nan());
        assert_eq!(index.group(0), &[0, 3]);
        assert_eq!(index.group(1), &[1]);
        assert_eq!(index.group(2), &[2, 4]);
        assert_eq!(index.group(3), &[5]);
        assert_eq!(index.trace_count(), 6);
    }

    #[test_traced]
    fn test_groups_partition_traces() {
        let mut rng = StdRng::seed_from_u64(7);
        let column: Vec<f64> = (0..1_000)
            .map(|_| match rng.gen_range(0..20) {
                0 => f64::NAN,
                1 => -0.0,
                n => n as f64,
            })
            .collect();
        let index = PrimaryKeyIndex::build("INLINE", &column, -999.0);

        let mut seen = vec![false; column.len()];
        let mut previous = f64::NEG_INFINITY;
        for (value, traces) in index.groups() {
            assert!(!traces.is_empty());
            assert!(traces.windows(2).all(|w| w[0] < w[1]));
            if !value.is_nan() {
                assert!(value > previous);
                previous = value;
            }
            for &trace in traces {
                assert!(!seen[trace]);
                seen[trace] = true;
            }
        }
        assert!(seen.iter().all(|s| *s));
        assert_eq!(index.values().iter().filter(|v| v.is_nan()).count(), 1);
        assert!(index.values().last().unwrap().is_nan());
        // Negative zero shares the zero key
        assert_eq!(index.values().iter().filter(|v| **v == 0.0).count(), 1);
    }

    #[test_traced]
    fn test_query_range_matches_scan() {
        let mut rng = StdRng::seed_from_u64(11);
        let column: Vec<f64> = (0..500).map(|_| rng.gen_range(0..50) as f64).collect();
        let index = PrimaryKeyIndex::build("XLINE", &column, f64::NAN);
        for _ in 0..50 {
            let a = rng.gen_range(-5.0..55.0);
            let b = rng.gen_range(-5.0..55.0);
            let (min, max) = if a <= b { (a, b) } else { (b, a) };

            let result = index.query_range(min, max);
            let mut expected: Vec<usize> = (0..column.len())
                .filter(|&t| column[t] >= min && column[t] <= max)
                .collect();
            expected.sort_by(|&x, &y| column[x].total_cmp(&column[y]).then(x.cmp(&y)));
            assert_eq!(result, expected);
            assert_eq!(index.trace_size(min, max), expected.len());
        }
        assert!(index.query_range(10.0, 5.0).is_empty());
        assert!(index.query_range(f64::NAN, 5.0).is_empty());
    }

    #[test_traced]
    fn test_null_value_grouped_with_nan() {
        let column = [3.0, -999.0, f64::NAN, 3.0];
        let index = PrimaryKeyIndex::build("CDP", &column, -999.0);
        assert_eq!(index.len(), 2);
        assert_eq!(index.group(1), &[1, 2]);
        assert_eq!(index.query_range(-1000.0, 1000.0), vec![0, 3]);
    }

    #[test_traced]
    fn test_size_regular_exact_grid() {
        let column = [0.0, 2.0, 4.0, 6.0, 8.0, 10.0, 4.0];
        let index = PrimaryKeyIndex::build("CDP", &column, f64::NAN);
        assert_eq!(index.size_regular(0.0, 10.0, 2.0).unwrap(), 6);
    }

    #[test_traced]
    fn test_size_regular_estimates() {
        // Sparse on-grid keys do not fill the grid: the nominal size is an estimate, not the
        // three keys actually present
        let sparse = PrimaryKeyIndex::build("CDP", &[0.0, 4.0, 10.0], f64::NAN);
        assert_eq!(sparse.size_regular(0.0, 10.0, 2.0).unwrap(), 6);
        assert_eq!(sparse.len(), 3);

        // Noisy keys report the nominal grid size (an estimate, not a measurement)
        let noisy = PrimaryKeyIndex::build("CDP", &[0.1, 2.05, 3.9, 6.0, 8.2, 9.95, 1.0], f64::NAN);
        assert_eq!(noisy.size_regular(0.0, 10.0, 2.0).unwrap(), 6);
        assert_eq!(noisy.size_regular(0.0, 9.0, 2.0).unwrap(), 6);

        assert!(matches!(
            noisy.size_regular(0.0, 10.0, 0.0),
            Err(Error::InvalidArgument { name: "step", .. })
        ));
        assert!(noisy.size_regular(10.0, 0.0, 1.0).is_err());
    }

    #[test_traced]
    fn test_empty() {
        let index = PrimaryKeyIndex::build("CDP", &[], f64::NAN);
        assert!(index.is_empty());
        assert_eq!(index.trace_count(), 0);
        assert!(index.query_range(0.0, 1.0).is_empty());
        assert_eq!(index.groups().count(), 0);
    }
}
