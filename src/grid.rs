use crate::axis::{Axis, AxisKind};
use crate::error::{Error, Result};
use crate::grid_source::{classify_axis, GridSource, ScaleMissing};
use log::debug;

/// A cached cell: the last interpolation cell found, so repeated queries
/// near one another skip the binary search. The empty-cache state uses
/// `f64::INFINITY` for `x0` as an unreachable sentinel for `contains`
/// (the original uses `DBL_MAX` for the same purpose).
#[derive(Clone, Copy, Debug)]
pub struct CellProperties {
    x0: f64,
    x1: f64,
    y0: f64,
    y1: f64,
    ix0: usize,
    ix1: usize,
    iy0: usize,
    iy1: usize,
}

impl Default for CellProperties {
    fn default() -> Self {
        Self { x0: f64::INFINITY, x1: f64::INFINITY, y0: 0.0, y1: 0.0, ix0: 0, ix1: 0, iy0: 0, iy1: 0 }
    }
}

impl CellProperties {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    #[allow(clippy::too_many_arguments)]
    fn update(&mut self, x0: f64, x1: f64, y0: f64, y1: f64, ix0: usize, ix1: usize, iy0: usize, iy1: usize) {
        *self = Self { x0, x1, y0, y1, ix0, ix1, iy0, iy1 };
    }

    fn invalidate(&mut self) {
        *self = Self::default();
    }
}

/// Exact bilinear interpolation formula used throughout the original
/// reader, written in the factored form that avoids computing `(x1-x0)`
/// and `(y1-y0)` more than once.
#[allow(clippy::too_many_arguments)]
pub fn bilinear_interpolation(
    x0: f64, x1: f64, y0: f64, y1: f64,
    z00: f64, z10: f64, z01: f64, z11: f64,
    x: f64, y: f64,
) -> f64 {
    let dx0 = x - x0;
    let dx1 = x1 - x;
    let dy0 = y - y0;
    let dy1 = y1 - y;
    (dy1 * (dx1 * z00 + dx0 * z10) + dy0 * (dx1 * z01 + dx0 * z11)) / ((x1 - x0) * (y1 - y0))
}

enum Layout {
    YThenX,
    XThenY,
}

/// Reads gridded variable data out of a `GridSource`, exposing the pair of
/// spatial axes plus a cell-cache-accelerated bilinear interpolator.
pub struct GridReader {
    axis_x: Axis,
    axis_y: Axis,
    data: Option<(Vec<f64>, ScaleMissing, Layout)>,
}

impl GridReader {
    /// Opens a source, discovering its x/y axes in CF precedence order:
    /// `standard_name`, then the `axis` attribute, then unit families.
    /// Both axes are force-converted to degrees, matching the original
    /// (`Netcdf::Open` converts any discovered spatial axis to "degrees").
    pub fn open<S: GridSource>(source: &S) -> Result<Self> {
        let (a, b) = source.axes()?;
        let classify = |d: &crate::grid_source::AxisDescriptor, hint: AxisKind| -> AxisKind {
            if matches!(hint, AxisKind::Unknown) {
                classify_axis(None, None, &d.unit)
            } else {
                hint
            }
        };
        let kind_a = classify(&a, a.kind);
        let kind_b = classify(&b, b.kind);

        let (mut x_descriptor, mut y_descriptor) = match (kind_a, kind_b) {
            (AxisKind::Longitude, _) | (AxisKind::X, _) => (a, b),
            (_, AxisKind::Longitude) | (_, AxisKind::X) => (b, a),
            _ => return Err(Error::NoSpatialAxes),
        };
        if !matches!(
            classify(&x_descriptor, x_descriptor.kind),
            AxisKind::Longitude | AxisKind::X
        ) || !matches!(classify(&y_descriptor, y_descriptor.kind), AxisKind::Latitude | AxisKind::Y)
        {
            return Err(Error::NoSpatialAxes);
        }
        x_descriptor.kind = classify(&x_descriptor, x_descriptor.kind);
        y_descriptor.kind = classify(&y_descriptor, y_descriptor.kind);

        let mut axis_x = Axis::new(x_descriptor.points, x_descriptor.kind, x_descriptor.unit)?;
        let mut axis_y = Axis::new(y_descriptor.points, y_descriptor.kind, y_descriptor.unit)?;
        axis_x.convert("degrees")?;
        axis_y.convert("degrees")?;

        Ok(Self { axis_x, axis_y, data: None })
    }

    pub fn axis_x(&self) -> &Axis {
        &self.axis_x
    }

    pub fn axis_y(&self) -> &Axis {
        &self.axis_y
    }

    /// Loads a named variable's values into memory, selecting the index
    /// order (y-major vs x-major) for *this* variable by comparing its own
    /// shape against the axis lengths, as the original's `Load` does by
    /// comparing `variable.get_shape(0)` against the latitude axis length
    /// (a variable-by-variable choice, not a whole-file one).
    pub fn load<S: GridSource>(&mut self, source: &S, name: &str, scale_missing: ScaleMissing) -> Result<()> {
        let values = source.read_variable(name)?;
        let (d0, _d1) = source.shape(name)?;
        let layout = if d0 == self.axis_y.len() { Layout::YThenX } else { Layout::XThenY };
        debug!("loading variable '{name}' ({} values)", values.len());
        self.data = Some((values, scale_missing, layout));
        Ok(())
    }

    fn value(&self, ix: usize, iy: usize, fill_value: f64) -> f64 {
        let (values, scale_missing, layout) = self.data.as_ref().expect("load() not called");
        let index = match layout {
            Layout::YThenX => iy * self.axis_x.len() + ix,
            Layout::XThenY => ix * self.axis_y.len() + iy,
        };
        let decoded = scale_missing.decode(values[index]);
        if decoded.is_nan() {
            fill_value
        } else {
            decoded
        }
    }

    /// Bilinearly interpolates the loaded variable at `(longitude,
    /// latitude)`, using and updating `cell` as a hint for the next call.
    /// Returns `fill_value` (not an error) when the query falls outside
    /// the grid, per spec.md §7's "the only silent recovery path".
    pub fn interpolate(&self, longitude: f64, latitude: f64, fill_value: f64, cell: &mut CellProperties) -> Result<f64> {
        if self.data.is_none() {
            return Err(Error::NoDataLoaded);
        }
        let x = self.axis_x.normalize(longitude, 360.0);
        let y = latitude;

        if cell.contains(x, y) {
            return Ok(bilinear_interpolation(
                cell.x0, cell.x1, cell.y0, cell.y1,
                self.value(cell.ix0, cell.iy0, fill_value),
                self.value(cell.ix1, cell.iy0, fill_value),
                self.value(cell.ix0, cell.iy1, fill_value),
                self.value(cell.ix1, cell.iy1, fill_value),
                x, y,
            ));
        }

        let found = self
            .axis_x
            .find_indexes(x)
            .zip(self.axis_y.find_indexes(y));
        let Some(((ix0, ix1), (iy0, iy1))) = found else {
            cell.invalidate();
            return Ok(fill_value);
        };

        let (x0, x1) = (self.axis_x.value(ix0), self.axis_x.value(ix1));
        let (y0, y1) = (self.axis_y.value(iy0), self.axis_y.value(iy1));
        cell.update(x0, x1, y0, y1, ix0, ix1, iy0, iy1);

        Ok(bilinear_interpolation(
            x0, x1, y0, y1,
            self.value(ix0, iy0, fill_value),
            self.value(ix1, iy0, fill_value),
            self.value(ix0, iy1, fill_value),
            self.value(ix1, iy1, fill_value),
            x, y,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid_source::{AxisDescriptor, InMemoryGridSource};

    fn source() -> InMemoryGridSource {
        let x = AxisDescriptor { points: vec![0.0, 1.0, 2.0, 3.0], kind: AxisKind::Longitude, unit: "degrees_east".into() };
        let y = AxisDescriptor { points: vec![0.0, 1.0, 2.0], kind: AxisKind::Latitude, unit: "degrees_north".into() };
        // row-major (y, x): 3 rows of 4
        let values = vec![
            0.0, 1.0, 2.0, 3.0,
            1.0, 2.0, 3.0, 4.0,
            2.0, 3.0, 4.0, 5.0,
        ];
        InMemoryGridSource::new(x, y, 0.0).with_variable("u", values)
    }

    #[test]
    fn opens_and_loads() {
        let src = source();
        let mut reader = GridReader::open(&src).unwrap();
        reader.load(&src, "u", ScaleMissing::default()).unwrap();
        let mut cell = CellProperties::default();
        let v = reader.interpolate(0.5, 0.5, -999.0, &mut cell).unwrap();
        assert!((v - 1.0).abs() < 1e-9);
    }

    #[test]
    fn out_of_grid_returns_fill_value() {
        let src = source();
        let mut reader = GridReader::open(&src).unwrap();
        reader.load(&src, "u", ScaleMissing::default()).unwrap();
        let mut cell = CellProperties::default();
        let v = reader.interpolate(100.0, 100.0, -999.0, &mut cell).unwrap();
        assert_eq!(v, -999.0);
    }

    #[test]
    fn cache_hit_reuses_cell() {
        let src = source();
        let mut reader = GridReader::open(&src).unwrap();
        reader.load(&src, "u", ScaleMissing::default()).unwrap();
        let mut cell = CellProperties::default();
        reader.interpolate(0.5, 0.5, -999.0, &mut cell).unwrap();
        assert!(cell.contains(0.5, 0.5));
        let v = reader.interpolate(0.7, 0.6, -999.0, &mut cell).unwrap();
        assert!(v.is_finite());
    }

    #[test]
    fn interpolate_without_load_errors() {
        let src = source();
        let reader = GridReader::open(&src).unwrap();
        let mut cell = CellProperties::default();
        assert!(reader.interpolate(0.5, 0.5, -999.0, &mut cell).is_err());
    }
}
