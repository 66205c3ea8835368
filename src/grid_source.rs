use crate::axis::AxisKind;
use crate::error::{Error, Result};

/// Per-variable CF decoration: packed-data scaling and the sentinel values
/// that mark a grid point as missing. Ported from the original
/// `ScaleMissing` class, which reads these off a NetCDF variable's
/// attributes; here they are supplied directly by a `GridSource`.
#[derive(Clone, Copy, Debug)]
pub struct ScaleMissing {
    pub scale: f64,
    pub offset: f64,
    pub valid_min: f64,
    pub valid_max: f64,
    pub fill_value: Option<f64>,
    pub missing_value: Option<f64>,
}

impl Default for ScaleMissing {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: 0.0,
            valid_min: f64::MIN,
            valid_max: f64::MAX,
            fill_value: None,
            missing_value: None,
        }
    }
}

impl ScaleMissing {
    pub fn has_scale_offset(&self) -> bool {
        self.scale != 1.0 || self.offset != 0.0
    }

    /// Applies packed-value unscaling, then maps any sentinel or
    /// out-of-valid-range value to `NAN`.
    pub fn decode(&self, raw: f64) -> f64 {
        if self.fill_value == Some(raw) || self.missing_value == Some(raw) {
            return f64::NAN;
        }
        let value = if self.has_scale_offset() { raw * self.scale + self.offset } else { raw };
        if value < self.valid_min || value > self.valid_max {
            f64::NAN
        } else {
            value
        }
    }
}

/// One coordinate variable as discovered from a data source, before it is
/// turned into an `Axis`.
#[derive(Clone, Debug)]
pub struct AxisDescriptor {
    pub points: Vec<f64>,
    pub kind: AxisKind,
    pub unit: String,
}

/// The seam a `GridReader` depends on in place of a concrete NetCDF/CF
/// reader, which is out of scope for this crate. Implementations supply the
/// spatial axes, the array shape they're stored in, and decoded variable
/// data; `GridReader` does the interpolation.
pub trait GridSource {
    /// Returns the two spatial axis descriptors, in whatever order the
    /// source discovered them (`GridReader` sorts them into x/y).
    fn axes(&self) -> Result<(AxisDescriptor, AxisDescriptor)>;

    /// Shape of the named variable's backing array, outermost dimension
    /// first, as stored (row-major Y-by-X or X-by-Y).
    fn shape(&self, name: &str) -> Result<(usize, usize)>;

    /// Reads and decodes a named variable's values in row-major order
    /// matching `shape`.
    fn read_variable(&self, name: &str) -> Result<Vec<f64>>;

    /// The source's reference date, as a Julian day number, used to order a
    /// time series of files.
    fn date(&self) -> Result<f64>;
}

/// Classifies a coordinate variable the way `GridReader::Open` does:
/// `standard_name` first, then the CF `axis` attribute, then the unit
/// family tables. Precedence is drawn from `original_source/src/lib/reader/netcdf.cpp`.
pub fn classify_axis(standard_name: Option<&str>, axis_attr: Option<&str>, unit: &str) -> AxisKind {
    match standard_name {
        Some("longitude") => return AxisKind::Longitude,
        Some("latitude") => return AxisKind::Latitude,
        Some("time") => return AxisKind::Time,
        _ => {}
    }
    match axis_attr {
        Some("X") => return AxisKind::X,
        Some("Y") => return AxisKind::Y,
        _ => {}
    }
    if crate::units::is_longitude_unit(unit) {
        AxisKind::Longitude
    } else if crate::units::is_latitude_unit(unit) {
        AxisKind::Latitude
    } else {
        AxisKind::Unknown
    }
}

/// A minimal in-memory `GridSource`, standing in for the analytic/test
/// fields the original expresses directly in code (e.g.
/// `vonkarman_field.cpp`, which never touches a file) and for unit tests.
pub struct InMemoryGridSource {
    pub x: AxisDescriptor,
    pub y: AxisDescriptor,
    pub variables: std::collections::HashMap<String, Vec<f64>>,
    pub date: f64,
}

impl InMemoryGridSource {
    pub fn new(x: AxisDescriptor, y: AxisDescriptor, date: f64) -> Self {
        Self { x, y, variables: std::collections::HashMap::new(), date }
    }

    /// Inserts `values` in row-major (y, x) order under `name`.
    pub fn with_variable(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.variables.insert(name.into(), values);
        self
    }
}

impl GridSource for InMemoryGridSource {
    fn axes(&self) -> Result<(AxisDescriptor, AxisDescriptor)> {
        Ok((self.x.clone(), self.y.clone()))
    }

    fn shape(&self, _name: &str) -> Result<(usize, usize)> {
        Ok((self.y.points.len(), self.x.points.len()))
    }

    fn read_variable(&self, name: &str) -> Result<Vec<f64>> {
        self.variables
            .get(name)
            .cloned()
            .ok_or_else(|| Error::InvalidArgument(format!("no such variable '{name}'")))
    }

    fn date(&self) -> Result<f64> {
        Ok(self.date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_missing_defaults_to_identity() {
        let sm = ScaleMissing::default();
        assert_eq!(sm.decode(3.5), 3.5);
    }

    #[test]
    fn scale_missing_maps_fill_value_to_nan() {
        let sm = ScaleMissing { fill_value: Some(-999.0), ..ScaleMissing::default() };
        assert!(sm.decode(-999.0).is_nan());
    }

    #[test]
    fn classify_axis_prefers_standard_name() {
        assert_eq!(classify_axis(Some("longitude"), Some("Y"), "m"), AxisKind::Longitude);
    }

    #[test]
    fn classify_axis_falls_back_to_units() {
        assert_eq!(classify_axis(None, None, "degrees_north"), AxisKind::Latitude);
    }
}
