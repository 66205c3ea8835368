use crate::error::Result;
use crate::grid::CellProperties;
use crate::grid_source::GridSource;
use crate::timeseries::TimeSeries;

/// Whether a field's velocity components are metric (m/s) or angular
/// (deg/s, i.e. already expressed as a rate of change of longitude/latitude).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitKind {
    Metric,
    Angular,
}

/// Whether a field's spatial coordinates are Cartesian or a spherical
/// equatorial (longitude, latitude) system.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordinateKind {
    SphericalEquatorial,
    Cartesian,
}

/// A velocity field a particle can be advected through. Implementations
/// fetch whatever time window they need before a batch of `compute` calls;
/// `compute` itself never performs I/O, so it is safe to call from a
/// worker thread (spec.md §5).
pub trait Field {
    fn unit_kind(&self) -> UnitKind;
    fn coordinate_kind(&self) -> CoordinateKind;

    /// Returns the velocity unit string, per `unit_kind`: `"m/s"` for
    /// metric fields, `"deg/s"` for angular ones.
    fn unit(&self) -> &'static str {
        match self.unit_kind() {
            UnitKind::Metric => "m/s",
            UnitKind::Angular => "deg/s",
        }
    }

    /// Ensures data for the time window `[t0, t1]` is resident. Called
    /// serially on the main thread before any worker advances a point
    /// through that window (spec.md §5); the default is a no-op, matching
    /// the original `Field::Fetch`'s empty base implementation.
    fn fetch(&mut self, _t0: f64, _t1: f64) -> Result<()> {
        Ok(())
    }

    /// Evaluates the field at `(t, x, y)`, writing the velocity components
    /// into `u`/`v`. Returns `false` (leaving `u`/`v` as `NaN`) when the
    /// query point is outside the field's domain.
    fn compute(&self, t: f64, x: f64, y: f64, u: &mut f64, v: &mut f64, cell: &mut FieldCell) -> bool;
}

/// Per-point interpolation cache state a `Field` implementation may need;
/// a `TimeSeriesField` uses two spatial cell caches (one per bracketing
/// time slice), an analytic field needs none.
#[derive(Clone, Debug, Default)]
pub struct FieldCell {
    pub u_cell0: CellProperties,
    pub u_cell1: CellProperties,
    pub v_cell0: CellProperties,
    pub v_cell1: CellProperties,
}

/// A field backed by two gridded, time-varying `TimeSeries` (zonal and
/// meridional velocity components), mirroring
/// `original_source/src/lib/time_serie_field.cpp`.
pub struct TimeSeriesField<S: GridSource> {
    u: TimeSeries<S>,
    v: TimeSeries<S>,
    unit_kind: UnitKind,
    coordinate_kind: CoordinateKind,
    fill_value: f64,
}

impl<S: GridSource> TimeSeriesField<S> {
    pub fn new(u: TimeSeries<S>, v: TimeSeries<S>, unit_kind: UnitKind, coordinate_kind: CoordinateKind) -> Self {
        Self { u, v, unit_kind, coordinate_kind, fill_value: f64::NAN }
    }

    /// The time span both component series cover: the later of the two
    /// start dates to the earlier of the two end dates, per the original's
    /// `StartTime`/`EndTime` (max of starts, min of ends).
    pub fn start_time(&self) -> f64 {
        self.u.start_date().max(self.v.start_date())
    }

    pub fn end_time(&self) -> f64 {
        self.u.end_date().min(self.v.end_date())
    }
}

impl<S: GridSource> Field for TimeSeriesField<S> {
    fn unit_kind(&self) -> UnitKind {
        self.unit_kind
    }

    fn coordinate_kind(&self) -> CoordinateKind {
        self.coordinate_kind
    }

    fn fetch(&mut self, t0: f64, t1: f64) -> Result<()> {
        self.u.load(t0, t1)?;
        self.v.load(t0, t1)?;
        Ok(())
    }

    fn compute(&self, t: f64, x: f64, y: f64, u: &mut f64, v: &mut f64, cell: &mut FieldCell) -> bool {
        let ux = self.u.interpolate(t, x, y, self.fill_value, &mut cell.u_cell0, &mut cell.u_cell1);
        let vy = self.v.interpolate(t, x, y, self.fill_value, &mut cell.v_cell0, &mut cell.v_cell1);
        match (ux, vy) {
            (Ok(ux), Ok(vy)) if !ux.is_nan() && !vy.is_nan() => {
                *u = ux;
                *v = vy;
                true
            }
            _ => {
                *u = f64::NAN;
                *v = f64::NAN;
                false
            }
        }
    }
}

/// The analytic von Karman vortex street field used as a reference test
/// case in the original library, ported verbatim from
/// `original_source/src/lib/vonkarman_field.cpp`.
pub struct VonKarmanField {
    a: f64,
    w: f64,
    r0: f64,
    tc: f64,
    alpha2: f64,
    y0: f64,
    l: f64,
    u0: f64,
}

impl Default for VonKarmanField {
    fn default() -> Self {
        Self::new(1.0, 35.06, 0.35, 1.0, 2.0, 0.3, 2.0, 14.0)
    }
}

impl VonKarmanField {
    #[allow(clippy::too_many_arguments)]
    pub fn new(a: f64, w: f64, r0: f64, tc: f64, alpha: f64, y0: f64, l: f64, u0: f64) -> Self {
        Self { a, w, r0, tc, alpha2: alpha * alpha, y0, l, u0 }
    }
}

impl Field for VonKarmanField {
    fn unit_kind(&self) -> UnitKind {
        UnitKind::Metric
    }

    fn coordinate_kind(&self) -> CoordinateKind {
        CoordinateKind::Cartesian
    }

    fn compute(&self, t: f64, x: f64, y: f64, u: &mut f64, v: &mut f64, _cell: &mut FieldCell) -> bool {
        let f = 1.0 - (-(t / self.tc).powi(2)).exp();
        let xp = x - self.w * t;
        let yp = y - self.y0;

        let r1sq = xp * xp + (yp - 0.5 * self.l).powi(2) + self.alpha2;
        let r2sq = xp * xp + (yp + 0.5 * self.l).powi(2) + self.alpha2;

        let g1 = 1.0 - (-r1sq / (self.r0 * self.r0)).exp();
        let g2 = 1.0 - (-r2sq / (self.r0 * self.r0)).exp();

        let uu = self.a * f * (-(yp - 0.5 * self.l) / r1sq * g1 + (yp + 0.5 * self.l) / r2sq * g2);
        let vv = self.a * f * (xp / r1sq * g1 - xp / r2sq * g2);

        *u = self.u0 + uu;
        *v = vv;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_field_reports_meters_per_second() {
        let field = VonKarmanField::default();
        assert_eq!(field.unit(), "m/s");
    }

    #[test]
    fn vonkarman_is_defined_everywhere() {
        let field = VonKarmanField::default();
        let mut u = 0.0;
        let mut v = 0.0;
        let mut cell = FieldCell::default();
        assert!(field.compute(0.0, 0.1, 0.2, &mut u, &mut v, &mut cell));
        assert!(u.is_finite() && v.is_finite());
    }
}
