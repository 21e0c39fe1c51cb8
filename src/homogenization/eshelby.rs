/// Eshelby tensor provider contract and closed-form implementations
///
/// The interaction-aware schemes (Mori-Tanaka, Self-Consistent) need the
/// Eshelby tensor S of each inclusion evaluated against a reference
/// stiffness. General ellipsoids against anisotropic references require
/// numerical quadrature, which lives behind the [`EshelbyProvider`] trait so
/// an external generator can be plugged in. The built-in provider covers
/// the closed-form cases: spherical inclusions and flat layers in an
/// (approximately) isotropic reference medium.
///
/// Voigt convention: engineering shear, so tensor components S_ijij appear
/// doubled on the shear diagonal.
///
/// # References
/// - Eshelby (1957), "The determination of the elastic field of an
///   ellipsoidal inclusion"
/// - Mura, "Micromechanics of Defects in Solids"

use crate::error::{MicromechError, Result};
use crate::phase::geometry::Morphology;
use crate::phase::state::Matrix6;

/// Source of Eshelby tensors for a given reference stiffness and inclusion
/// morphology.
pub trait EshelbyProvider {
    fn eshelby(&self, l_ref: &Matrix6, morphology: &Morphology) -> Result<Matrix6>;
}

/// Isotropized moduli (κ, μ) of a stiffness matrix.
///
/// Exact for isotropic input; for mildly anisotropic references this is the
/// orientation average over the volumetric and deviatoric projectors (two
/// normal-difference modes, three shear modes).
pub fn isotropic_moduli(l: &Matrix6) -> (f64, f64) {
    let mut trace_upper = 0.0;
    let mut sum_upper = 0.0;
    for i in 0..3 {
        trace_upper += l[(i, i)];
        for j in 0..3 {
            sum_upper += l[(i, j)];
        }
    }
    let kappa = sum_upper / 9.0;
    let mu_normal = (trace_upper - 3.0 * kappa) / 4.0;
    let mu_shear = (l[(3, 3)] + l[(4, 4)] + l[(5, 5)]) / 3.0;
    let mu = (2.0 * mu_normal + 3.0 * mu_shear) / 5.0;
    (kappa, mu)
}

/// Effective Poisson's ratio from (κ, μ).
pub fn poisson_from_moduli(kappa: f64, mu: f64) -> f64 {
    (3.0 * kappa - 2.0 * mu) / (2.0 * (3.0 * kappa + mu))
}

/// Eshelby tensor of a sphere in an isotropic medium with Poisson's ratio ν.
pub fn sphere_eshelby(nu: f64) -> Matrix6 {
    let denom = 15.0 * (1.0 - nu);
    let s_diag = (7.0 - 5.0 * nu) / denom;
    let s_off = (5.0 * nu - 1.0) / denom;
    let s_shear = 2.0 * (4.0 - 5.0 * nu) / denom;

    let mut s = Matrix6::zeros();
    for i in 0..3 {
        for j in 0..3 {
            s[(i, j)] = s_off;
        }
        s[(i, i)] = s_diag;
        s[(i + 3, i + 3)] = s_shear;
    }
    s
}

/// Eshelby tensor of a flat layer (normal along x) in an isotropic medium.
///
/// The slab limit of an oblate spheroid: the normal strain and the shears
/// containing the normal are fully accommodated, in-plane components are
/// unconstrained.
pub fn layer_eshelby(nu: f64) -> Matrix6 {
    let mut s = Matrix6::zeros();
    s[(0, 0)] = 1.0;
    s[(0, 1)] = nu / (1.0 - nu);
    s[(0, 2)] = nu / (1.0 - nu);
    // Voigt slots 3 (xy) and 5 (zx) contain the layer normal.
    s[(3, 3)] = 1.0;
    s[(5, 5)] = 1.0;
    s
}

/// Built-in provider: spheres and layers in an isotropized reference.
///
/// Ellipsoids with unequal aspect ratios are rejected; supply an external
/// quadrature-based provider for those.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClosedFormEshelby;

impl EshelbyProvider for ClosedFormEshelby {
    fn eshelby(&self, l_ref: &Matrix6, morphology: &Morphology) -> Result<Matrix6> {
        let (kappa, mu) = isotropic_moduli(l_ref);
        let nu = poisson_from_moduli(kappa, mu);
        match morphology {
            Morphology::Ellipsoid { a1, a2, a3 } => {
                if morphology.is_sphere() {
                    Ok(sphere_eshelby(nu))
                } else {
                    Err(MicromechError::EshelbyUnsupported {
                        a1: *a1,
                        a2: *a2,
                        a3: *a3,
                    })
                }
            }
            Morphology::Layer => Ok(layer_eshelby(nu)),
        }
    }
}
