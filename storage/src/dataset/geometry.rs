//! Synthetic acquisition layouts and survey boundaries.

use super::{DataType, Dataset, SurveyType};
use crate::{index::normalize, Error};
use geoseis_geometry::{convex_hull, line_boundary, prestack, stack, Geometry, Grid, HullMethod, Point};
use geoseis_runtime::Storage;
use geoseis_utils::{srs::Transform, units, Selector};
use tracing::{debug, info};

/// A post-stack layout: one trace per grid node.
#[derive(Clone, Copy)]
pub struct StackGeometry<'a> {
    pub grid: Grid,
    /// Units of the grid origin, steps and elevation (empty for the dataset's length units).
    pub length_units: &'a str,
    /// Maps the grid origin into the dataset's spatial reference.
    pub transform: Option<&'a dyn Transform>,
}

/// A pre-stack layout: one trace per source and receiver pair.
#[derive(Clone, Copy)]
pub struct PrestackGeometry<'a> {
    pub sources: Grid,
    pub receivers: Grid,
    /// Shift the receiver spread along with each source.
    pub move_receivers: bool,
    /// Units of both grids (empty for the dataset's length units).
    pub length_units: &'a str,
    /// Maps both grid origins into the dataset's spatial reference.
    pub transform: Option<&'a dyn Transform>,
}

impl<S: Storage> Dataset<S> {
    /// Express `grid` in the dataset's length units and spatial reference.
    fn place(
        &self,
        grid: &Grid,
        length_units: &str,
        transform: Option<&dyn Transform>,
    ) -> Result<Grid, Error> {
        let factor = units::factor(length_units, &self.state.length_units)?;
        let mut placed = grid.scaled(factor);
        if let Some(transform) = transform {
            let mut origin = [(placed.x0, placed.y0)];
            transform.transform(&mut origin);
            (placed.x0, placed.y0) = origin[0];
        }
        Ok(placed)
    }

    /// Resize the dataset to the layout and write its header columns.
    fn apply_geometry(&mut self, geometry: Geometry, data_type: DataType) -> Result<(), Error> {
        self.set_trace_count(geometry.traces)?;
        let mut columns = Vec::with_capacity(geometry.columns.len());
        let mut values = Vec::with_capacity(geometry.columns.len());
        for (name, column) in geometry.columns {
            match self.state.schema.index(name) {
                Ok(index) => {
                    columns.push(index);
                    values.push(column);
                }
                Err(_) => debug!(name, "header not in schema: skipping"),
            }
        }
        self.write_columns(&Selector::All, &columns, &values)?;
        self.state.data_type = data_type;
        self.update_limits()?;
        info!(traces = geometry.traces, ?data_type, "applied geometry");
        Ok(())
    }

    /// Replace traces and headers with a post-stack layout over `cfg.grid`.
    pub fn generate_stack_geometry(&mut self, cfg: &StackGeometry<'_>) -> Result<(), Error> {
        let grid = self.place(&cfg.grid, cfg.length_units, cfg.transform)?;
        let geometry = stack(&grid)?;
        self.apply_geometry(geometry, DataType::Stack)
    }

    /// Replace traces and headers with a pre-stack layout of `cfg.sources` x `cfg.receivers`.
    pub fn generate_prestack_geometry(&mut self, cfg: &PrestackGeometry<'_>) -> Result<(), Error> {
        let sources = self.place(&cfg.sources, cfg.length_units, cfg.transform)?;
        let receivers = self.place(&cfg.receivers, cfg.length_units, cfg.transform)?;
        let geometry = prestack(&sources, &receivers, cfg.move_receivers)?;
        self.apply_geometry(geometry, DataType::Prestack)
    }

    /// `CDP_X`/`CDP_Y` pairs (and `CDP` keys) of every trace with non-null coordinates.
    fn cdp_points(&self) -> Result<(Vec<f64>, Vec<Point>), Error> {
        let columns = self
            .state
            .schema
            .indices(&["CDP", "CDP_X", "CDP_Y"])?;
        let values = self.read_columns(&Selector::All, &columns)?;
        let null = self.state.null_value;
        let mut keys = Vec::with_capacity(self.state.traces);
        let mut points = Vec::with_capacity(self.state.traces);
        for ((&key, &x), &y) in values[0].iter().zip(&values[1]).zip(&values[2]) {
            if normalize(x, null).is_nan() || normalize(y, null).is_nan() {
                continue;
            }
            keys.push(normalize(key, null));
            points.push(Point::new(x, y));
        }
        Ok((keys, points))
    }

    /// Convex hull of the `CDP_X`/`CDP_Y` coordinates, in the dataset's length units.
    pub fn calc_boundary(&self, method: HullMethod) -> Result<Vec<Point>, Error> {
        let (_, points) = self.cdp_points()?;
        Ok(convex_hull(&points, method))
    }

    /// Recompute and store the boundary.
    ///
    /// 2-D post-stack surveys store the trace line ordered by `CDP`; everything else stores the
    /// convex hull.
    pub fn update_boundary(&mut self) -> Result<(), Error> {
        let boundary =
            if self.state.survey_type == SurveyType::TwoD && self.state.data_type == DataType::Stack {
                let (keys, points) = self.cdp_points()?;
                let xs: Vec<f64> = points.iter().map(|p| p.x).collect();
                let ys: Vec<f64> = points.iter().map(|p| p.y).collect();
                line_boundary(&keys, &xs, &ys)
            } else {
                self.calc_boundary(HullMethod::Graham)?
            };
        debug!(vertices = boundary.len(), "updated boundary");
        self.state.boundary = boundary;
        self.persist()
    }

    /// The stored boundary, mapped by `transform` and converted to `length_units`.
    pub fn boundary(
        &self,
        length_units: &str,
        transform: Option<&dyn Transform>,
    ) -> Result<Vec<Point>, Error> {
        let mut xy: Vec<(f64, f64)> = self.state.boundary.iter().map(|p| (*p).into()).collect();
        if let Some(transform) = transform {
            transform.transform(&mut xy);
        }
        let factor = units::factor(&self.state.length_units, length_units)?;
        Ok(xy
            .into_iter()
            .map(|(x, y)| Point::new(x * factor, y * factor))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Dataset, Param};
    use geoseis_macros::test_traced;
    use geoseis_runtime::storage::memory;
    use geoseis_utils::srs::Affine;
    use test_case::test_case;

    fn dataset(param: Param) -> Dataset<memory::Storage> {
        let storage = memory::Storage::default();
        Dataset::create(&storage, "seismic", "survey", param).unwrap()
    }

    fn grid(x0: f64, dx: f64, nx: usize, y0: f64, dy: f64, ny: usize) -> Grid {
        Grid {
            x0,
            dx,
            nx,
            y0,
            dy,
            ny,
            z: 0.0,
        }
    }

    #[test_traced]
    fn test_stack_geometry() {
        let mut dataset = dataset(Param {
            samples: 4,
            ..Default::default()
        });
        let cfg = StackGeometry {
            grid: grid(0.0, 1.0, 3, 0.0, 2.0, 2),
            length_units: "km",
            transform: None,
        };
        dataset.generate_stack_geometry(&cfg).unwrap();
        assert_eq!(dataset.trace_count(), 6);
        assert_eq!(dataset.data_type(), DataType::Stack);

        let headers = dataset
            .read_headers(&Selector::All, &["CDP", "CDP_X", "CDP_Y", "INLINE", "XLINE"])
            .unwrap();
        assert_eq!(headers[0], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(headers[1], vec![0.0, 1000.0, 2000.0, 0.0, 1000.0, 2000.0]);
        assert_eq!(headers[2], vec![0.0, 0.0, 0.0, 2000.0, 2000.0, 2000.0]);
        assert_eq!(headers[3], vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        assert_eq!(headers[4], vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
        assert_eq!(dataset.limits("CDP", "").unwrap(), Some((1.0, 6.0)));

        dataset.update_boundary().unwrap();
        assert_eq!(
            dataset.boundary("km", None).unwrap(),
            vec![
                Point::new(0.0, 0.0),
                Point::new(2.0, 0.0),
                Point::new(2.0, 2.0),
                Point::new(0.0, 2.0),
            ]
        );
    }

    #[test_traced]
    fn test_stack_geometry_transformed_origin() {
        let mut dataset = dataset(Param::default());
        let shift = Affine::translation(500.0, 100.0);
        let cfg = StackGeometry {
            grid: grid(0.0, 10.0, 2, 0.0, 10.0, 1),
            length_units: "",
            transform: Some(&shift),
        };
        dataset.generate_stack_geometry(&cfg).unwrap();
        let headers = dataset
            .read_headers(&Selector::All, &["CDP_X", "CDP_Y"])
            .unwrap();
        assert_eq!(headers[0], vec![500.0, 510.0]);
        assert_eq!(headers[1], vec![100.0, 100.0]);
    }

    #[test_case(false; "fixed receivers")]
    #[test_case(true; "moving receivers")]
    fn test_prestack_geometry(move_receivers: bool) {
        let mut dataset = dataset(Param {
            samples: 2,
            ..Default::default()
        });
        let cfg = PrestackGeometry {
            sources: grid(0.0, 10.0, 2, 0.0, 0.0, 1),
            receivers: grid(0.0, 5.0, 3, 0.0, 0.0, 1),
            move_receivers,
            length_units: "",
            transform: None,
        };
        dataset.generate_prestack_geometry(&cfg).unwrap();
        assert_eq!(dataset.trace_count(), 6);
        assert_eq!(dataset.data_type(), DataType::Prestack);

        let headers = dataset
            .read_headers(&Selector::All, &["SRCX", "GRPX", "DSREG", "FFID"])
            .unwrap();
        assert_eq!(headers[0], vec![0.0, 0.0, 0.0, 10.0, 10.0, 10.0]);
        assert_eq!(headers[3], vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        let expected_grpx = if move_receivers {
            vec![0.0, 5.0, 10.0, 10.0, 15.0, 20.0]
        } else {
            vec![0.0, 5.0, 10.0, 0.0, 5.0, 10.0]
        };
        assert_eq!(headers[1], expected_grpx);
        for ((offset, src), grp) in headers[2].iter().zip(&headers[0]).zip(&headers[1]) {
            assert_eq!(*offset, (grp - src).abs());
        }
    }

    #[test_traced]
    fn test_calc_boundary_methods_agree() {
        let mut dataset = dataset(Param {
            traces: 5,
            ..Default::default()
        });
        dataset
            .write_headers(
                &Selector::All,
                &["CDP_X", "CDP_Y"],
                &[vec![0.0, 4.0, 4.0, 0.0, 2.0], vec![0.0, 0.0, 4.0, 4.0, 2.0]],
            )
            .unwrap();
        let square = vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 4.0),
            Point::new(0.0, 4.0),
        ];
        assert_eq!(dataset.calc_boundary(HullMethod::GiftWrap).unwrap(), square);
        assert_eq!(dataset.calc_boundary(HullMethod::Graham).unwrap(), square);
    }

    #[test_traced]
    fn test_2d_stack_boundary_is_line() {
        let mut dataset = dataset(Param {
            traces: 3,
            survey_type: SurveyType::TwoD,
            ..Default::default()
        });
        dataset
            .write_headers(
                &Selector::All,
                &["CDP", "CDP_X", "CDP_Y"],
                &[vec![3.0, 1.0, 2.0], vec![30.0, 10.0, 20.0], vec![3.0, 1.0, 2.0]],
            )
            .unwrap();
        dataset.update_boundary().unwrap();
        assert_eq!(
            dataset.stored_boundary(),
            &[
                Point::new(10.0, 1.0),
                Point::new(20.0, 2.0),
                Point::new(30.0, 3.0)
            ]
        );
    }
}
