use crate::field::{Field, FieldCell, UnitKind};
use crate::runge_kutta::RungeKutta;
use crate::stencil::{Stencil, StencilKind};

/// Time-stepping loop bounds: walks from `start` to `end` (which may be
/// before `start`, for backward integration) in steps of `increment`.
/// Mirrors `original_source/src/include/lagrangian/stencil.hpp`'s `Iterator`.
#[derive(Clone, Copy, Debug)]
pub struct TimeIterator {
    current: f64,
    end: f64,
    increment: f64,
}

impl TimeIterator {
    pub fn new(start: f64, end: f64, increment: f64) -> Self {
        let increment = if (end >= start) == (increment >= 0.0) { increment } else { -increment };
        Self { current: start, end, increment }
    }

    pub fn now(&self) -> f64 {
        self.current
    }

    /// Whether there is at least one more step to take.
    pub fn go_after(&self) -> bool {
        if self.increment >= 0.0 {
            self.current < self.end
        } else {
            self.current > self.end
        }
    }

    pub fn advance(&mut self) {
        self.current += self.increment;
    }
}

/// Finite-Time vs Finite-Size Lyapunov exponent computation: FTLE always
/// integrates the full requested window, while FSLE stops each stencil
/// early once its points separate past a threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Fsle,
    Ftle,
}

/// The result of integrating one stencil: the two Lyapunov exponents and
/// their associated orientation angles, plus the bookkeeping the original
/// keeps alongside them (elapsed time, final separation distance).
///
/// `final_separation` retains whatever `max_distance` the stencil reached
/// even when the exponents themselves are undefined (`delta_t` too small
/// to take a logarithm of), matching the original's
/// `GetUndefinedFinalSeparation` — spec.md §9 preserves this rather than
/// resetting it to a sentinel.
#[derive(Clone, Copy, Debug)]
pub struct FiniteLyapunovExponents {
    pub delta_t: f64,
    pub final_separation: f64,
    pub lambda1: f64,
    pub lambda2: f64,
    pub theta1: f64,
    pub theta2: f64,
}

impl FiniteLyapunovExponents {
    fn undefined(final_separation: f64) -> Self {
        Self { delta_t: 0.0, final_separation, lambda1: f64::NAN, lambda2: f64::NAN, theta1: f64::NAN, theta2: f64::NAN }
    }

    /// The FSLE "never separated" sentinel: zero exponents and
    /// orientations, but a real `delta_t`/`final_separation` reporting how
    /// long the stencil ran and how far it got. Per spec.md §4.7/§9, this
    /// is a distinct state from `undefined` (which is an epsilon-gated
    /// failure) and must not be "fixed" into NaN.
    fn unseparated(delta_t: f64, final_separation: f64) -> Self {
        Self { delta_t, final_separation, lambda1: 0.0, lambda2: 0.0, theta1: 0.0, theta2: 0.0 }
    }

    fn nan() -> Self {
        Self { delta_t: f64::NAN, final_separation: f64::NAN, lambda1: f64::NAN, lambda2: f64::NAN, theta1: f64::NAN, theta2: f64::NAN }
    }
}

const EXPONENT_EPSILON: f64 = 1e-12;

/// Normalizes a longitude-derived strain component into `[-180, 180)`,
/// matching `NormalizeLongitude(value, 360, 180)` in the original's
/// `ComputeExponents`.
fn normalize_longitude_component(value: f64) -> f64 {
    let mut v = value;
    while v >= 180.0 {
        v -= 360.0;
    }
    while v < -180.0 {
        v += 360.0;
    }
    v
}

/// Drives one stencil through a field over `[start, end]` and computes its
/// Lyapunov exponents. Owns the `RungeKutta` stepper and the separation
/// parameters (`delta`, used for the strain-tensor finite difference, and
/// `min_separation`, the FSLE trigger distance).
pub struct Integrator<'f, F: Field> {
    field: &'f F,
    rk: RungeKutta,
    mode: Mode,
    stencil_kind: StencilKind,
    delta: f64,
    min_separation: f64,
}

impl<'f, F: Field> Integrator<'f, F> {
    pub fn new(field: &'f F, step: f64, mode: Mode, stencil_kind: StencilKind, delta: f64, min_separation: f64) -> Self {
        Self { field, rk: RungeKutta::new(field, step), mode, stencil_kind, delta, min_separation }
    }

    pub fn new_stencil(&self, x0: f64, y0: f64, start_time: f64) -> Stencil {
        let spherical = matches!(
            self.field.coordinate_kind(),
            crate::field::CoordinateKind::SphericalEquatorial
        );
        Stencil::new(self.stencil_kind, x0, y0, self.delta, start_time, spherical)
    }

    /// Advances `stencil` by one time step ending at `next_time`. Returns
    /// `false` (marking the stencil missing) if any point left the field's
    /// domain, matching `map.cpp::ComputeHt`'s `fle.Compute(...) ->
    /// position->Missing()` branch.
    pub fn step(&self, stencil: &mut Stencil, next_time: f64, cells: &mut [FieldCell]) -> bool {
        stencil.compute(&self.rk, self.field, next_time, cells)
    }

    /// Whether `stencil` should stop being integrated further: for FSLE,
    /// once its maximum point separation exceeds `min_separation`; for
    /// FTLE, never (the full window is always taken).
    pub fn should_separate(&self, stencil: &Stencil) -> bool {
        match self.mode {
            Mode::Fsle => stencil.max_distance() > self.min_separation,
            Mode::Ftle => false,
        }
    }

    /// Computes the Lyapunov exponents for `stencil`, whose integration
    /// began at `start_time`. Ported exactly from
    /// `original_source/src/lib/integration.cpp::ComputeExponents`.
    pub fn compute_exponents(&self, stencil: &Stencil, start_time: f64) -> FiniteLyapunovExponents {
        let delta_t = stencil.time() - start_time;
        let final_separation = stencil.max_distance();
        if delta_t.abs() < EXPONENT_EPSILON {
            return FiniteLyapunovExponents::undefined(final_separation);
        }

        let (mut a00, mut a01, a10, a11) = stencil.strain_tensor();
        if self.field.unit_kind() == UnitKind::Angular {
            a00 = normalize_longitude_component(a00);
            a01 = normalize_longitude_component(a01);
        }

        let s1 = a00 * a00 + a01 * a01 + a10 * a10 + a11 * a11;
        let s2 = (((a01 + a10).powi(2) + (a00 - a11).powi(2)) * ((a01 - a10).powi(2) + (a00 + a11).powi(2))).sqrt();

        let f2 = 0.5 / (self.delta * self.delta);
        let f1 = 1.0 / (2.0 * delta_t);

        let lambda1 = f1 * (f2 * (s1 + s2)).ln();
        let lambda2 = f1 * (f2 * (s1 - s2)).ln();

        let (theta1, theta2) = if a01 == 0.0 && a10 == 0.0 {
            if a00 > a11 {
                (0.0, 90.0)
            } else {
                (90.0, 0.0)
            }
        } else {
            let at1 = 2.0 * (a00 * a01 + a10 * a11);
            let at2 = a00 * a00 - a01 * a01 + a10 * a10 - a11 * a11;
            ((at1 / (at2 + s2)).atan().to_degrees(), -(at1 / (-at2 + s2)).atan().to_degrees())
        };

        FiniteLyapunovExponents { delta_t, final_separation, lambda1, lambda2, theta1, theta2 }
    }

    /// Resolves the result record for a stencil that is no longer in the
    /// active work list, whatever the reason: genuine FSLE separation, a
    /// completed FTLE window, an RK failure mid-flight, or an FSLE window
    /// that ended without separating. Ported from the policy spread across
    /// spec.md §4.7, §4.8 and §7's "undefined integration steps are not
    /// errors" paragraph:
    ///
    /// - missing (RK failure): NaN in FTLE mode, the zero/unseparated
    ///   sentinel in FSLE mode (delta_t/final_separation are themselves
    ///   NaN, since the stencil's points were cleared and its last
    ///   separation can't be recovered).
    /// - FTLE, not missing: always the real formula (FTLE's separation
    ///   predicate never fires, so reaching here means the full window
    ///   completed).
    /// - FSLE, completed via separation: the real formula.
    /// - FSLE, ran out of time without separating: the zero/unseparated
    ///   sentinel, with a real `delta_t`/`final_separation`.
    pub fn finalize(&self, stencil: &Stencil, start_time: f64) -> FiniteLyapunovExponents {
        if stencil.is_missing() {
            return match self.mode {
                Mode::Ftle => FiniteLyapunovExponents::nan(),
                Mode::Fsle => FiniteLyapunovExponents::unseparated(f64::NAN, f64::NAN),
            };
        }
        match self.mode {
            Mode::Ftle => self.compute_exponents(stencil, start_time),
            Mode::Fsle if stencil.is_completed() => self.compute_exponents(stencil, start_time),
            Mode::Fsle => FiniteLyapunovExponents::unseparated(stencil.time() - start_time, stencil.max_distance()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{CoordinateKind, FieldCell, UnitKind};

    struct SolidRotation;
    impl Field for SolidRotation {
        fn unit_kind(&self) -> UnitKind {
            UnitKind::Metric
        }
        fn coordinate_kind(&self) -> CoordinateKind {
            CoordinateKind::Cartesian
        }
        fn compute(&self, _t: f64, x: f64, y: f64, u: &mut f64, v: &mut f64, _cell: &mut FieldCell) -> bool {
            *u = -y;
            *v = x;
            true
        }
    }

    #[test]
    fn time_iterator_stops_at_end() {
        let mut it = TimeIterator::new(0.0, 1.0, 0.25);
        let mut steps = 0;
        while it.go_after() {
            it.advance();
            steps += 1;
        }
        assert_eq!(steps, 4);
    }

    #[test]
    fn backward_time_iterator_decrements() {
        let mut it = TimeIterator::new(1.0, 0.0, 0.25);
        assert!(it.go_after());
        it.advance();
        assert!(it.now() < 1.0);
    }

    #[test]
    fn undefined_exponents_when_delta_t_is_tiny() {
        let field = SolidRotation;
        let integrator = Integrator::new(&field, 0.01, Mode::Ftle, StencilKind::Triplet, 1e-3, 0.0);
        let stencil = integrator.new_stencil(0.0, 0.0, 0.0);
        let result = integrator.compute_exponents(&stencil, 0.0);
        assert!(result.lambda1.is_nan());
        assert!(result.final_separation.is_finite());
    }

    #[test]
    fn exponents_are_finite_after_integration() {
        let field = SolidRotation;
        let integrator = Integrator::new(&field, 0.1, Mode::Ftle, StencilKind::Triplet, 1e-3, 0.0);
        let mut stencil = integrator.new_stencil(0.0, 0.0, 0.0);
        let mut cells = vec![FieldCell::default(); 3];
        let mut it = TimeIterator::new(0.0, 1.0, 0.1);
        while it.go_after() {
            it.advance();
            assert!(integrator.step(&mut stencil, it.now(), &mut cells));
        }
        let result = integrator.compute_exponents(&stencil, 0.0);
        assert!(result.lambda1.is_finite());
        assert!(result.lambda2.is_finite());
    }

    #[test]
    fn fsle_separation_trigger_is_false_for_ftle_mode() {
        let field = SolidRotation;
        let integrator = Integrator::new(&field, 0.1, Mode::Ftle, StencilKind::Triplet, 1e-3, 1e-9);
        let stencil = integrator.new_stencil(0.0, 0.0, 0.0);
        assert!(!integrator.should_separate(&stencil));
    }
}
