/// Committed and trial mechanical/thermal state of one phase
///
/// A snapshot carries both the trial fields being evaluated for the current
/// increment and the committed (`*_start`) fields from the last converged
/// increment. `commit()` promotes trial to committed; `rollback()` discards
/// the trial fields. This is the only state the solver mutates between
/// increments, so cutback amounts to calling `rollback()` on every phase.

use nalgebra::{DVector, Matrix3, SMatrix, SVector};

use crate::math::rotation::{
    rotate_matrix, rotate_stiffness, rotate_strain, rotate_stress, Axis, ANGLE_EPS,
};

/// Voigt 6-vector.
pub type Vector6 = SVector<f64, 6>;
/// Voigt 6×6 operator.
pub type Matrix6 = SMatrix<f64, 6, 6>;

/// State of one phase in a given coordinate frame.
///
/// Strains use Voigt ordering [xx, yy, zz, xy, yz, zx] with engineering
/// shear. `f0`/`f1` are the deformation gradients at the start and end of
/// the current increment.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    /// Total strain at the start of the increment.
    pub etot: Vector6,
    /// Trial strain increment.
    pub detot: Vector6,
    /// Trial stress.
    pub sigma: Vector6,
    /// Committed stress.
    pub sigma_start: Vector6,
    /// Deformation gradient at increment start (committed).
    pub f0: Matrix3<f64>,
    /// Deformation gradient at increment end (trial).
    pub f1: Matrix3<f64>,
    /// Temperature at the start of the increment.
    pub t: f64,
    /// Trial temperature increment.
    pub dt: f64,
    /// Trial tangent stiffness.
    pub lt: Matrix6,
    /// Committed tangent stiffness.
    pub lt_start: Matrix6,
    /// Stress-temperature tangent (∂σ/∂T), zero for mechanical-only laws.
    pub lt_theta: Vector6,
    /// Trial internal variables.
    pub statev: DVector<f64>,
    /// Committed internal variables.
    pub statev_start: DVector<f64>,
}

impl StateSnapshot {
    /// Zero-initialized snapshot with `nstatev` internal variables.
    pub fn new(nstatev: usize) -> Self {
        Self {
            etot: Vector6::zeros(),
            detot: Vector6::zeros(),
            sigma: Vector6::zeros(),
            sigma_start: Vector6::zeros(),
            f0: Matrix3::zeros(),
            f1: Matrix3::zeros(),
            t: 0.0,
            dt: 0.0,
            lt: Matrix6::zeros(),
            lt_start: Matrix6::zeros(),
            lt_theta: Vector6::zeros(),
            statev: DVector::zeros(nstatev),
            statev_start: DVector::zeros(nstatev),
        }
    }

    /// Snapshot with both internal-variable vectors filled with `value`.
    pub fn with_init_value(nstatev: usize, value: f64) -> Self {
        let mut sv = Self::new(nstatev);
        sv.statev.fill(value);
        sv.statev_start.fill(value);
        sv
    }

    /// Number of internal variables.
    pub fn nstatev(&self) -> usize {
        self.statev.len()
    }

    /// Bulk field replacement.
    ///
    /// # Panics
    /// Panics if the internal-variable vectors disagree in length; the
    /// declared count is fixed at construction.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        etot: Vector6,
        detot: Vector6,
        sigma: Vector6,
        sigma_start: Vector6,
        f0: Matrix3<f64>,
        f1: Matrix3<f64>,
        t: f64,
        dt: f64,
        statev: DVector<f64>,
        statev_start: DVector<f64>,
    ) {
        assert_eq!(
            statev.len(),
            statev_start.len(),
            "internal-variable vectors must have equal length"
        );
        self.etot = etot;
        self.detot = detot;
        self.sigma = sigma;
        self.sigma_start = sigma_start;
        self.f0 = f0;
        self.f1 = f1;
        self.t = t;
        self.dt = dt;
        self.statev = statev;
        self.statev_start = statev_start;
    }

    /// Discard the trial state: stress, internal variables, and tangent
    /// return to their committed values, and the trial deformation gradient
    /// resets to the committed one.
    pub fn rollback(&mut self) {
        self.sigma = self.sigma_start;
        self.statev.copy_from(&self.statev_start);
        self.lt = self.lt_start;
        self.f1 = self.f0;
    }

    /// Promote the trial state to committed and integrate the totals.
    ///
    /// The only place where total strain and temperature accumulate; the
    /// increments themselves are left untouched so a subsequent rollback of
    /// a later trial sees consistent committed fields.
    pub fn commit(&mut self) {
        self.sigma_start = self.sigma;
        self.statev_start.copy_from(&self.statev);
        self.lt_start = self.lt;
        self.etot += self.detot;
        self.t += self.dt;
        self.f0 = self.f1;
    }

    /// Rotate this snapshot from the local (material) frame to the global
    /// frame for Euler angles ψ, θ, φ (z-x-z convention).
    ///
    /// Applies the negated angles in the order φ, θ, ψ; the exact inverse of
    /// [`rotate_g2l`](Self::rotate_g2l).
    pub fn rotate_l2g(&self, psi: f64, theta: f64, phi: f64) -> Self {
        let mut out = self.clone();
        if phi.abs() > ANGLE_EPS {
            out.apply_rotation(-phi, Axis::Z);
        }
        if theta.abs() > ANGLE_EPS {
            out.apply_rotation(-theta, Axis::X);
        }
        if psi.abs() > ANGLE_EPS {
            out.apply_rotation(-psi, Axis::Z);
        }
        out
    }

    /// Rotate this snapshot from the global frame into the local (material)
    /// frame for Euler angles ψ, θ, φ (z-x-z convention).
    ///
    /// Applies the angles in the order ψ, θ, φ.
    pub fn rotate_g2l(&self, psi: f64, theta: f64, phi: f64) -> Self {
        let mut out = self.clone();
        if psi.abs() > ANGLE_EPS {
            out.apply_rotation(psi, Axis::Z);
        }
        if theta.abs() > ANGLE_EPS {
            out.apply_rotation(theta, Axis::X);
        }
        if phi.abs() > ANGLE_EPS {
            out.apply_rotation(phi, Axis::Z);
        }
        out
    }

    /// One axis rotation applied to every frame-dependent field. The
    /// committed/trial distinction is untouched.
    fn apply_rotation(&mut self, angle: f64, axis: Axis) {
        self.etot = rotate_strain(&self.etot, angle, axis);
        self.detot = rotate_strain(&self.detot, angle, axis);
        self.sigma = rotate_stress(&self.sigma, angle, axis);
        self.sigma_start = rotate_stress(&self.sigma_start, angle, axis);
        self.f0 = rotate_matrix(&self.f0, angle, axis);
        self.f1 = rotate_matrix(&self.f1, angle, axis);
        self.lt = rotate_stiffness(&self.lt, angle, axis);
        self.lt_start = rotate_stiffness(&self.lt_start, angle, axis);
        // The stress-temperature tangent transforms like a stress.
        self.lt_theta = rotate_stress(&self.lt_theta, angle, axis);
    }
}
