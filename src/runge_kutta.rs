use crate::field::{CoordinateKind, Field, FieldCell, UnitKind};

/// Mean Earth radius in meters, used to project metric velocities onto the
/// sphere for spherical-equatorial transport.
pub(crate) const EARTH_RADIUS: f64 = 6_371_000.0;

/// How a point's coordinates are advanced given a velocity sample. Chosen
/// once per `RungeKutta` at construction from the field's unit/coordinate
/// kinds, replacing the original's per-instance function pointer
/// (`pMove_`) with a tagged-enum dispatch (spec.md §9).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Transport {
    Cartesian,
    SphericalEquatorial,
}

impl Transport {
    fn for_field(unit_kind: UnitKind, coordinate_kind: CoordinateKind) -> Self {
        match (unit_kind, coordinate_kind) {
            (UnitKind::Angular, _) => Transport::Cartesian,
            (UnitKind::Metric, CoordinateKind::SphericalEquatorial) => Transport::SphericalEquatorial,
            (UnitKind::Metric, CoordinateKind::Cartesian) => Transport::Cartesian,
        }
    }

    fn mov(&self, dt: f64, x0: f64, y0: f64, u: f64, v: f64) -> (f64, f64) {
        match self {
            Transport::Cartesian => move_cartesian(dt, x0, y0, u, v),
            Transport::SphericalEquatorial => move_spherical_equatorial(dt, x0, y0, u, v),
        }
    }
}

fn move_cartesian(dt: f64, x0: f64, y0: f64, u: f64, v: f64) -> (f64, f64) {
    (x0 + u * dt, y0 + v * dt)
}

/// Advances a (longitude, latitude) point on the sphere given an (east,
/// north) velocity, by projecting onto a 3D point on a sphere of radius
/// `EARTH_RADIUS`, stepping linearly in that embedding, and projecting
/// back. Ported from `original_source/src/include/lagrangian/runge_kutta.hpp`.
fn move_spherical_equatorial(dt: f64, lon0: f64, lat0: f64, u: f64, v: f64) -> (f64, f64) {
    let sx = lon0.to_radians();
    let sy = lat0.to_radians();
    let (sin_x, cos_x) = sx.sin_cos();
    let (sin_y, cos_y) = sy.sin_cos();

    let mut x = EARTH_RADIUS * cos_y * cos_x;
    let mut y = EARTH_RADIUS * cos_y * sin_x;
    let mut z = EARTH_RADIUS * sin_y;

    x += (-u * sin_x - v * cos_x * sin_y) * dt;
    y += (u * cos_x - v * sin_y * sin_x) * dt;
    z += (v * cos_y) * dt;

    let lon = y.atan2(x);
    let lat = (z / (x * x + y * y + z * z).sqrt()).asin();
    (lon.to_degrees(), lat.to_degrees())
}

/// Fixed-step, classical 4th-order Runge-Kutta integrator advancing one
/// point through a `Field`. The step size and its halves/sixths are
/// precomputed once at construction, matching the original's `h_`,
/// `h_2_`, `h_6_` members.
pub struct RungeKutta {
    h: f64,
    h_2: f64,
    h_6: f64,
    transport: Transport,
}

impl RungeKutta {
    pub fn new<F: Field>(field: &F, step: f64) -> Self {
        Self {
            h: step,
            h_2: step / 2.0,
            h_6: step / 6.0,
            transport: Transport::for_field(field.unit_kind(), field.coordinate_kind()),
        }
    }

    /// Advances `(x, y)` at time `t` by one step, writing the result into
    /// `x1`/`y1`. Each of the four RK sub-steps calls `field.compute`; if
    /// any of them returns `false` (the query left the field's domain),
    /// this returns `false` immediately without touching `x1`/`y1`,
    /// mirroring the original's short-circuit in `RungeKutta::Compute`.
    #[allow(clippy::too_many_arguments)]
    pub fn compute<F: Field>(
        &self,
        field: &F,
        t: f64,
        x0: f64,
        y0: f64,
        x1: &mut f64,
        y1: &mut f64,
        cell: &mut FieldCell,
    ) -> bool {
        let (mut u1, mut v1) = (0.0, 0.0);
        if !field.compute(t, x0, y0, &mut u1, &mut v1, cell) {
            return false;
        }
        let (xa, ya) = self.transport.mov(self.h_2, x0, y0, u1, v1);

        let (mut u2, mut v2) = (0.0, 0.0);
        if !field.compute(t + self.h_2, xa, ya, &mut u2, &mut v2, cell) {
            return false;
        }
        let (xb, yb) = self.transport.mov(self.h_2, x0, y0, u2, v2);

        let (mut u3, mut v3) = (0.0, 0.0);
        if !field.compute(t + self.h_2, xb, yb, &mut u3, &mut v3, cell) {
            return false;
        }
        let (xc, yc) = self.transport.mov(self.h, x0, y0, u3, v3);

        let (mut u4, mut v4) = (0.0, 0.0);
        if !field.compute(t + self.h, xc, yc, &mut u4, &mut v4, cell) {
            return false;
        }

        let u = u1 + 2.0 * u2 + 2.0 * u3 + u4;
        let v = v1 + 2.0 * v2 + 2.0 * v3 + v4;
        let (x, y) = self.transport.mov(self.h_6, x0, y0, u, v);
        *x1 = x;
        *y1 = y;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::VonKarmanField;

    #[test]
    fn uniform_flow_advances_linearly() {
        struct Uniform;
        impl Field for Uniform {
            fn unit_kind(&self) -> UnitKind {
                UnitKind::Metric
            }
            fn coordinate_kind(&self) -> CoordinateKind {
                CoordinateKind::Cartesian
            }
            fn compute(&self, _t: f64, _x: f64, _y: f64, u: &mut f64, v: &mut f64, _cell: &mut FieldCell) -> bool {
                *u = 2.0;
                *v = 0.0;
                true
            }
        }
        let field = Uniform;
        let rk = RungeKutta::new(&field, 1.0);
        let mut cell = FieldCell::default();
        let (mut x1, mut y1) = (0.0, 0.0);
        assert!(rk.compute(&field, 0.0, 0.0, 0.0, &mut x1, &mut y1, &mut cell));
        assert!((x1 - 2.0).abs() < 1e-9);
        assert!((y1 - 0.0).abs() < 1e-9);
    }

    #[test]
    fn vonkarman_step_stays_finite() {
        let field = VonKarmanField::default();
        let rk = RungeKutta::new(&field, 0.01);
        let mut cell = FieldCell::default();
        let (mut x1, mut y1) = (0.0, 0.0);
        assert!(rk.compute(&field, 0.0, 0.1, 0.1, &mut x1, &mut y1, &mut cell));
        assert!(x1.is_finite() && y1.is_finite());
    }
}
