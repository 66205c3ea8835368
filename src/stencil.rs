use crate::field::{Field, FieldCell};
use crate::runge_kutta::{RungeKutta, EARTH_RADIUS};

/// The number of points advected together to estimate the local
/// deformation gradient, and their fixed layout relative to the center
/// point. Mirrors the original's `Triplet`/`Quintuplet` subclasses of
/// `Position`, re-expressed as a single generic struct parameterized by
/// which constructor built it (spec.md §9) rather than a class hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StencilKind {
    Triplet,
    Quintuplet,
}

impl StencilKind {
    fn point_count(&self) -> usize {
        match self {
            StencilKind::Triplet => 3,
            StencilKind::Quintuplet => 5,
        }
    }
}

fn cartesian_distance(x0: f64, y0: f64, x1: f64, y1: f64) -> f64 {
    ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt()
}

/// Great-circle distance between two (longitude, latitude) points in
/// degrees, via the haversine formula on a sphere of `EARTH_RADIUS`.
fn geodetic_distance(lon0: f64, lat0: f64, lon1: f64, lat1: f64) -> f64 {
    let (lon0, lat0, lon1, lat1) =
        (lon0.to_radians(), lat0.to_radians(), lon1.to_radians(), lat1.to_radians());
    let dlat = lat1 - lat0;
    let dlon = lon1 - lon0;
    let a = (dlat / 2.0).sin().powi(2) + lat0.cos() * lat1.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS * a.sqrt().asin()
}

/// The four stencil positions advected as one group: a center point plus
/// its satellites offset by a small separation `delta`, advanced together
/// each time step to estimate the local Cauchy-Green strain tensor.
///
/// Mirrors `original_source/src/include/lagrangian/stencil.hpp`'s
/// `Position` base class plus its `Triplet`/`Quintuplet` layouts.
#[derive(Clone, Debug)]
pub struct Stencil {
    kind: StencilKind,
    x: Vec<f64>,
    y: Vec<f64>,
    time: f64,
    completed: bool,
    spherical_equatorial: bool,
}

impl Stencil {
    /// Builds a stencil centered at `(x0, y0)` at `time`, with satellites
    /// offset by `delta` in the layout `kind` specifies:
    ///
    /// - Triplet: `[(x,y), (x+d,y), (x,y+d)]`
    /// - Quintuplet: `[(x,y), (x+d,y), (x,y+d), (x-d,y), (x,y-d)]`
    pub fn new(kind: StencilKind, x0: f64, y0: f64, delta: f64, time: f64, spherical_equatorial: bool) -> Self {
        let (x, y) = match kind {
            StencilKind::Triplet => (vec![x0, x0 + delta, x0], vec![y0, y0, y0 + delta]),
            StencilKind::Quintuplet => (
                vec![x0, x0 + delta, x0, x0 - delta, x0],
                vec![y0, y0, y0 + delta, y0, y0 - delta],
            ),
        };
        Self { kind, x, y, time, completed: false, spherical_equatorial }
    }

    pub fn kind(&self) -> StencilKind {
        self.kind
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn set_completed(&mut self) {
        self.completed = true;
    }

    /// Clears both coordinate vectors, marking the stencil as having left
    /// the field's domain. Mirrors the original's `Position::Missing`.
    pub fn missing(&mut self) {
        self.x.clear();
        self.y.clear();
    }

    pub fn is_missing(&self) -> bool {
        self.x.is_empty()
    }

    fn distance(&self, x0: f64, y0: f64, x1: f64, y1: f64) -> f64 {
        if self.spherical_equatorial {
            geodetic_distance(x0, y0, x1, y1)
        } else {
            cartesian_distance(x0, y0, x1, y1)
        }
    }

    /// The maximum distance from the center point to any satellite,
    /// used as the FSLE separation trigger.
    pub fn max_distance(&self) -> f64 {
        let (x0, y0) = (self.x[0], self.y[0]);
        (1..self.x.len())
            .map(|i| self.distance(x0, y0, self.x[i], self.y[i]))
            .fold(0.0, f64::max)
    }

    /// Advances every point one RK4 step through `field` at time `it`. If
    /// any point's step fails (left the domain), the stencil is left
    /// untouched and this returns `false`; otherwise all points and the
    /// time are updated atomically.
    pub fn compute<F: Field>(&mut self, rk: &RungeKutta, field: &F, next_time: f64, cells: &mut [FieldCell]) -> bool {
        let n = self.x.len();
        let mut new_x = vec![0.0; n];
        let mut new_y = vec![0.0; n];
        for i in 0..n {
            if !rk.compute(field, self.time, self.x[i], self.y[i], &mut new_x[i], &mut new_y[i], &mut cells[i]) {
                return false;
            }
        }
        self.x = new_x;
        self.y = new_y;
        self.time = next_time;
        true
    }

    /// The Cauchy-Green strain tensor components `(a00, a01, a10, a11)`
    /// estimated from the stencil's current deformation, using the finite
    /// difference pattern appropriate to its layout. These are the raw
    /// point differences, undivided by `delta`: the original
    /// (`lagrangian/stencil.hpp`'s `Triplet`/`Quintuplet::StrainTensor`)
    /// returns the same raw differences, and all `delta` scaling happens
    /// exactly once, via `f2`, in `Integrator::compute_exponents`.
    pub fn strain_tensor(&self) -> (f64, f64, f64, f64) {
        match self.kind {
            StencilKind::Triplet => (
                self.x[1] - self.x[0],
                self.x[2] - self.x[0],
                self.y[1] - self.y[0],
                self.y[2] - self.y[0],
            ),
            StencilKind::Quintuplet => (
                self.x[1] - self.x[3],
                self.x[2] - self.x[4],
                self.y[1] - self.y[3],
                self.y[2] - self.y[4],
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triplet_layout_places_three_points() {
        let s = Stencil::new(StencilKind::Triplet, 1.0, 2.0, 0.1, 0.0, false);
        assert_eq!(s.kind().point_count(), 3);
        assert_eq!(s.x, vec![1.0, 1.1, 1.0]);
        assert_eq!(s.y, vec![2.0, 2.0, 2.1]);
    }

    #[test]
    fn quintuplet_layout_places_five_points() {
        let s = Stencil::new(StencilKind::Quintuplet, 0.0, 0.0, 0.5, 0.0, false);
        assert_eq!(s.x, vec![0.0, 0.5, 0.0, -0.5, 0.0]);
        assert_eq!(s.y, vec![0.0, 0.0, 0.5, 0.0, -0.5]);
    }

    #[test]
    fn max_distance_from_center() {
        let s = Stencil::new(StencilKind::Triplet, 0.0, 0.0, 1.0, 0.0, false);
        assert!((s.max_distance() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn missing_clears_points() {
        let mut s = Stencil::new(StencilKind::Triplet, 0.0, 0.0, 1.0, 0.0, false);
        s.missing();
        assert!(s.is_missing());
    }

    #[test]
    fn strain_tensor_is_raw_and_translation_invariant() {
        let delta = 0.25;
        let a = Stencil::new(StencilKind::Triplet, 0.0, 0.0, delta, 0.0, false);
        let b = Stencil::new(StencilKind::Triplet, 7.0, -3.0, delta, 0.0, false);
        assert_eq!(a.strain_tensor(), (delta, 0.0, 0.0, delta));
        assert_eq!(a.strain_tensor(), b.strain_tensor());
    }
}
