//! Order traces by a tuple of header keys.

use crate::index::normalize;
use std::cmp::Ordering;
use tracing::debug;

/// Compare two key tuples: ascending, NaN last, element by element.
pub(crate) fn compare_keys(a: &[f64], b: &[f64]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        let ordering = match (x.is_nan(), y.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Every trace of a dataset, ordered by ascending key tuple (ties by trace index).
#[derive(Clone, Debug, PartialEq)]
pub struct SortedView {
    keys: Vec<String>,
    order: Vec<usize>,
}

impl SortedView {
    /// Build a view over `columns` (one column per key, one value per trace).
    ///
    /// Values equal to `null` sort with NaN, after every other value.
    pub fn build(keys: Vec<String>, columns: &[Vec<f64>], null: f64) -> Self {
        let traces = columns.first().map_or(0, Vec::len);
        let rows: Vec<Vec<f64>> = (0..traces)
            .map(|trace| {
                columns
                    .iter()
                    .map(|column| normalize(column[trace], null))
                    .collect()
            })
            .collect();
        let mut order: Vec<usize> = (0..traces).collect();

        // Stable, so equal tuples keep ascending trace order
        order.sort_by(|&a, &b| compare_keys(&rows[a], &rows[b]));
        debug!(?keys, traces, "built sorted view");
        Self { keys, order }
    }

    /// Header names the view is ordered by.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Trace indices in view order.
    pub fn traces(&self) -> &[usize] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoseis_macros::test_traced;

    #[test_traced]
    fn test_compare_keys() {
        assert_eq!(compare_keys(&[1.0, 2.0], &[1.0, 3.0]), Ordering::Less);
        assert_eq!(compare_keys(&[f64::NAN], &[1e300]), Ordering::Greater);
        assert_eq!(compare_keys(&[f64::NAN, 1.0], &[f64::NAN, 0.0]), Ordering::Greater);
        assert_eq!(compare_keys(&[-0.0], &[0.0]), Ordering::Equal);
    }

    #[test_traced]
    fn test_multi_key_order() {
        let inline = vec![2.0, 1.0, 2.0, 1.0, f64::NAN, 1.0];
        let xline = vec![1.0, 5.0, 0.0, 5.0, 0.0, -999.0];
        let view = SortedView::build(
            vec!["INLINE".into(), "XLINE".into()],
            &[inline, xline],
            -999.0,
        );
        assert_eq!(view.keys(), &["INLINE".to_string(), "XLINE".to_string()]);
        // (1,5) x2 in trace order, then (1,null), then (2,0), (2,1), then the NaN inline
        assert_eq!(view.traces(), &[1, 3, 5, 2, 0, 4]);
    }

    #[test_traced]
    fn test_deterministic() {
        let column = vec![3.0, 1.0, 3.0, 2.0, 1.0];
        let a = SortedView::build(vec!["CDP".into()], &[column.clone()], f64::NAN);
        let b = SortedView::build(vec!["CDP".into()], &[column], f64::NAN);
        assert_eq!(a, b);
        assert_eq!(a.traces(), &[1, 4, 3, 0, 2]);
        assert_eq!(a.len(), 5);
    }
}
