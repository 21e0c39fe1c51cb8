/// Thermoelastic constitutive laws and stiffness builders
///
/// Implements the built-in leaf laws: isotropic, transversely isotropic,
/// and orthotropic thermoelasticity. Each law stores the reference
/// temperature in `statev[0]` on the start call and computes
///
/// σ = L · (Etot + ΔE − α·(T + ΔT − T_ref))
///
/// with the stress-temperature tangent ∂σ/∂T = −L·α.
///
/// # References
/// - Lemaitre & Chaboche, "Mechanics of Solid Materials"
/// - Zienkiewicz & Taylor, "The Finite Element Method", Vol. 1

use nalgebra::SMatrix;

use crate::error::{MicromechError, Result};
use crate::phase::state::{Matrix6, StateSnapshot, Vector6};

use super::{ConstitutiveUpdate, EnergyBalance, UmatContext, UmatResult};

/// Isotropic elastic stiffness from Young's modulus and Poisson's ratio.
///
/// # Panics
/// Panics if E ≤ 0 or ν is outside (-1, 0.5).
#[allow(non_snake_case)]
pub fn l_iso(E: f64, nu: f64) -> Matrix6 {
    assert!(E > 0.0, "Young's modulus must be positive, got {}", E);
    assert!(
        nu > -1.0 && nu < 0.5,
        "Poisson's ratio must be in (-1, 0.5), got {}",
        nu
    );

    let factor = E / ((1.0 + nu) * (1.0 - 2.0 * nu));
    let diag = factor * (1.0 - nu);
    let off = factor * nu;
    let shear = factor * (1.0 - 2.0 * nu) / 2.0;

    let mut l = Matrix6::zeros();
    for i in 0..3 {
        for j in 0..3 {
            l[(i, j)] = off;
        }
        l[(i, i)] = diag;
        l[(i + 3, i + 3)] = shear;
    }
    l
}

/// Orthotropic elastic stiffness from engineering constants.
///
/// Builds the compliance matrix and inverts it.
#[allow(non_snake_case, clippy::too_many_arguments)]
pub fn l_ortho(
    Ex: f64,
    Ey: f64,
    Ez: f64,
    nuxy: f64,
    nuxz: f64,
    nuyz: f64,
    Gxy: f64,
    Gxz: f64,
    Gyz: f64,
) -> Result<Matrix6> {
    assert!(Ex > 0.0 && Ey > 0.0 && Ez > 0.0, "moduli must be positive");
    assert!(Gxy > 0.0 && Gxz > 0.0 && Gyz > 0.0, "shear moduli must be positive");

    let mut s = Matrix6::zeros();
    s[(0, 0)] = 1.0 / Ex;
    s[(1, 1)] = 1.0 / Ey;
    s[(2, 2)] = 1.0 / Ez;
    s[(0, 1)] = -nuxy / Ex;
    s[(1, 0)] = -nuxy / Ex;
    s[(0, 2)] = -nuxz / Ex;
    s[(2, 0)] = -nuxz / Ex;
    s[(1, 2)] = -nuyz / Ey;
    s[(2, 1)] = -nuyz / Ey;
    s[(3, 3)] = 1.0 / Gxy;
    s[(4, 4)] = 1.0 / Gyz;
    s[(5, 5)] = 1.0 / Gxz;

    s.try_inverse().ok_or(MicromechError::SingularMatrix {
        context: "orthotropic compliance inversion",
    })
}

/// Transversely isotropic elastic stiffness.
///
/// `axis` (1, 2, or 3) is the longitudinal direction; `EL`/`ET` the
/// longitudinal/transverse moduli, `nuTL` the transverse-longitudinal
/// Poisson's ratio, `nuTT` the in-plane transverse ratio, and `GLT` the
/// longitudinal shear modulus.
#[allow(non_snake_case)]
pub fn l_isotrans(
    axis: usize,
    EL: f64,
    ET: f64,
    nuTL: f64,
    nuTT: f64,
    GLT: f64,
) -> Result<Matrix6> {
    assert!(
        (1..=3).contains(&axis),
        "longitudinal axis must be 1, 2, or 3, got {}",
        axis
    );
    assert!(EL > 0.0 && ET > 0.0 && GLT > 0.0, "moduli must be positive");

    let long = axis - 1;
    let (t1, t2) = match long {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    };
    let GTT = ET / (2.0 * (1.0 + nuTT));

    let mut s = Matrix6::zeros();
    s[(long, long)] = 1.0 / EL;
    s[(t1, t1)] = 1.0 / ET;
    s[(t2, t2)] = 1.0 / ET;
    s[(long, t1)] = -nuTL / ET;
    s[(t1, long)] = -nuTL / ET;
    s[(long, t2)] = -nuTL / ET;
    s[(t2, long)] = -nuTL / ET;
    s[(t1, t2)] = -nuTT / ET;
    s[(t2, t1)] = -nuTT / ET;

    // Voigt shear slots: 3 ↔ (x,y), 4 ↔ (y,z), 5 ↔ (z,x). Shears that
    // involve the longitudinal axis use GLT, the in-plane shear uses GTT.
    let pairs = [(0usize, 1usize), (1, 2), (0, 2)];
    for (slot, (a, b)) in pairs.iter().enumerate() {
        let g = if *a == long || *b == long { GLT } else { GTT };
        s[(slot + 3, slot + 3)] = 1.0 / g;
    }

    s.try_inverse().ok_or(MicromechError::SingularMatrix {
        context: "transversely isotropic compliance inversion",
    })
}

/// Shared thermoelastic update used by the three built-in laws.
fn thermoelastic_update(
    sv: &mut StateSnapshot,
    lt: Matrix6,
    alpha: Vector6,
    ctx: &UmatContext,
) -> UmatResult {
    sv.lt = lt;
    sv.lt_theta = -lt * alpha;

    if ctx.start {
        sv.statev[0] = sv.t;
        sv.sigma = Vector6::zeros();
    }
    let t_ref = sv.statev[0];

    let e_el = sv.etot + sv.detot - alpha * (sv.t + sv.dt - t_ref);
    let sigma_old = sv.sigma_start;
    sv.sigma = lt * e_el;

    // Trapezoidal work increment; fully recoverable for elasticity.
    let wm = 0.5 * (sigma_old + sv.sigma).dot(&sv.detot);
    let energy = EnergyBalance {
        wm,
        wm_r: wm,
        ..Default::default()
    };
    UmatResult::accepted(energy)
}

/// Isotropic thermoelastic law.
///
/// Property layout: `props[0]` = E, `props[1]` = ν, `props[2]` = α (CTE).
/// One internal variable: the reference temperature.
pub struct IsotropicThermoelastic;

impl ConstitutiveUpdate for IsotropicThermoelastic {
    fn update(
        &self,
        sv: &mut StateSnapshot,
        props: &[f64],
        ctx: &UmatContext,
    ) -> Result<UmatResult> {
        assert!(props.len() >= 3, "elastic_iso requires 3 properties (E, nu, alpha)");
        let lt = l_iso(props[0], props[1]);
        let alpha = Vector6::from_column_slice(&[props[2], props[2], props[2], 0.0, 0.0, 0.0]);
        Ok(thermoelastic_update(sv, lt, alpha, ctx))
    }
}

/// Transversely isotropic thermoelastic law.
///
/// Property layout: `props[0]` = axis (1, 2, 3), `props[1]` = EL,
/// `props[2]` = ET, `props[3]` = νTL, `props[4]` = νTT, `props[5]` = GLT,
/// `props[6]` = αL, `props[7]` = αT.
pub struct TransverselyIsotropicThermoelastic;

impl ConstitutiveUpdate for TransverselyIsotropicThermoelastic {
    fn update(
        &self,
        sv: &mut StateSnapshot,
        props: &[f64],
        ctx: &UmatContext,
    ) -> Result<UmatResult> {
        assert!(
            props.len() >= 8,
            "elastic_transiso requires 8 properties (axis, EL, ET, nuTL, nuTT, GLT, alphaL, alphaT)"
        );
        let axis = props[0] as usize;
        let lt = l_isotrans(axis, props[1], props[2], props[3], props[4], props[5])?;

        let (alpha_l, alpha_t) = (props[6], props[7]);
        let mut alpha = Vector6::zeros();
        for k in 0..3 {
            alpha[k] = if k == axis - 1 { alpha_l } else { alpha_t };
        }
        Ok(thermoelastic_update(sv, lt, alpha, ctx))
    }
}

/// Orthotropic thermoelastic law.
///
/// Property layout: `props[0..3]` = Ex, Ey, Ez; `props[3..6]` = νxy, νxz,
/// νyz; `props[6..9]` = Gxy, Gxz, Gyz; `props[9..12]` = αx, αy, αz.
pub struct OrthotropicThermoelastic;

impl ConstitutiveUpdate for OrthotropicThermoelastic {
    fn update(
        &self,
        sv: &mut StateSnapshot,
        props: &[f64],
        ctx: &UmatContext,
    ) -> Result<UmatResult> {
        assert!(
            props.len() >= 12,
            "elastic_ortho requires 12 properties (3 E, 3 nu, 3 G, 3 alpha)"
        );
        let lt = l_ortho(
            props[0], props[1], props[2], props[3], props[4], props[5], props[6], props[7],
            props[8],
        )?;
        let alpha =
            Vector6::from_column_slice(&[props[9], props[10], props[11], 0.0, 0.0, 0.0]);
        Ok(thermoelastic_update(sv, lt, alpha, ctx))
    }
}
