//! Constitutive update contract and the built-in law registry
//!
//! A constitutive law maps a phase's trial strain/temperature increment to
//! stress, tangent operators, and updated internal variables, all written
//! into the phase's local-frame [`StateSnapshot`]. The law additionally
//! returns per-increment energy contributions and a step-size signal
//! `tnew_dt` (1 accepts the increment, < 1 requests a smaller one).
//!
//! Laws must be idempotent: re-invoking with the same trial inputs and the
//! same committed state produces the same outputs, which is what makes
//! rollback-and-retry safe.

pub mod elastic;

use crate::error::Result;
use crate::phase::material::MaterialLaw;
use crate::phase::state::StateSnapshot;

pub use elastic::{l_iso, l_isotrans, l_ortho};

/// Shared inputs of a constitutive call that do not live in the snapshot.
#[derive(Debug, Clone, Copy)]
pub struct UmatContext {
    /// Elapsed time at the start of the increment.
    pub time: f64,
    /// Time delta of the increment.
    pub dtime: f64,
    /// True on the very first call of the analysis; laws initialize their
    /// internal variables and zero their stress here.
    pub start: bool,
    /// Number of direct stress components (3 for full 3-D).
    pub ndi: usize,
    /// Number of shear stress components (3 for full 3-D).
    pub nshr: usize,
}

impl UmatContext {
    pub fn new(time: f64, dtime: f64, start: bool) -> Self {
        Self {
            time,
            dtime,
            start,
            ndi: 3,
            nshr: 3,
        }
    }
}

/// Energy contributions of one increment, split into mechanical/thermal and
/// reversible/irreversible/dissipated parts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnergyBalance {
    /// Total mechanical work increment.
    pub wm: f64,
    /// Recoverable (elastic) part of the mechanical work.
    pub wm_r: f64,
    /// Irreversibly stored part (e.g. hardening).
    pub wm_ir: f64,
    /// Dissipated part.
    pub wm_d: f64,
    /// Total thermal energy increment.
    pub wt: f64,
    /// Reversible thermal part.
    pub wt_r: f64,
    /// Irreversible thermal part.
    pub wt_ir: f64,
}

impl EnergyBalance {
    /// Accumulate another balance, weighted by a volume fraction.
    pub fn add_scaled(&mut self, other: &EnergyBalance, weight: f64) {
        self.wm += weight * other.wm;
        self.wm_r += weight * other.wm_r;
        self.wm_ir += weight * other.wm_ir;
        self.wm_d += weight * other.wm_d;
        self.wt += weight * other.wt;
        self.wt_r += weight * other.wt_r;
        self.wt_ir += weight * other.wt_ir;
    }
}

/// Outcome of one constitutive update.
#[derive(Debug, Clone, Copy)]
pub struct UmatResult {
    /// Step-size signal: 1 accepts, < 1 requests a retry at a smaller
    /// increment.
    pub tnew_dt: f64,
    /// Energy increments of this trial; the controller accumulates them
    /// only when the increment commits.
    pub energy: EnergyBalance,
}

impl UmatResult {
    pub fn accepted(energy: EnergyBalance) -> Self {
        Self {
            tnew_dt: 1.0,
            energy,
        }
    }
}

/// The constitutive update contract for leaf phases.
pub trait ConstitutiveUpdate {
    /// Run the law on the trial state in `sv` (local frame), writing stress,
    /// `lt`, `lt_theta`, and internal variables in place.
    fn update(&self, sv: &mut StateSnapshot, props: &[f64], ctx: &UmatContext)
        -> Result<UmatResult>;
}

/// Look up the built-in law implementation for a leaf material.
///
/// # Panics
/// Panics when called with a composite (homogenization) law; the phase tree
/// validates leaf/composite placement at construction, so reaching here
/// with a composite law is a programming error.
pub fn leaf_law(law: MaterialLaw) -> &'static dyn ConstitutiveUpdate {
    match law {
        MaterialLaw::ElasticIso => &elastic::IsotropicThermoelastic,
        MaterialLaw::ElasticTransIso => &elastic::TransverselyIsotropicThermoelastic,
        MaterialLaw::ElasticOrtho => &elastic::OrthotropicThermoelastic,
        _ => panic!("leaf_law called with composite law `{}`", law.name()),
    }
}
