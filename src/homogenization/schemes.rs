/// Homogenization schemes: localization tensors and effective stiffness
///
/// Given the already-resolved tangent stiffnesses of a phase's children,
/// each scheme computes the strain-concentration (localization) tensors A_i
/// and assembles the effective tangent
///
/// Lt_eff = Σ_i c_i · Lt_i · A_i
///
/// The scheme set is closed; configuration selects a variant by name and an
/// unknown identifier is rejected while parsing the material law.
///
/// # References
/// - Mori & Tanaka (1973), "Average stress in matrix and average elastic
///   energy of materials with misfitting inclusions"
/// - Hill (1965), "A self-consistent mechanics of composite materials"

use crate::error::{MicromechError, Result};
use crate::phase::geometry::Morphology;
use crate::phase::state::Matrix6;

use super::eshelby::EshelbyProvider;

/// Convergence controls of the self-consistent fixed point.
#[derive(Debug, Clone, Copy)]
pub struct SelfConsistentSettings {
    /// Relative Frobenius-norm change below which the iteration stops.
    pub tolerance: f64,
    /// Iteration cap; exceeding it is a reported error, never silent.
    pub max_iterations: usize,
}

impl Default for SelfConsistentSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 50,
        }
    }
}

/// Homogenization scheme variants.
#[derive(Debug, Clone, Copy)]
pub enum Scheme {
    /// Rule of mixtures: A_i = I, no shape effect.
    Voigt,
    /// Dilute interaction against the matrix phase (first child).
    MoriTanaka,
    /// Mori-Tanaka localization with the effective medium itself as
    /// reference, solved by fixed-point iteration.
    SelfConsistent(SelfConsistentSettings),
    /// Closed-form 1-D periodic laminate, layer normal along x.
    PeriodicLayer,
}

/// What the scheme needs to know about one child phase.
#[derive(Debug, Clone, Copy)]
pub struct ChildPhase {
    /// Child tangent stiffness, expressed in the parent's local frame.
    pub lt: Matrix6,
    /// Volume fraction within the parent.
    pub concentration: f64,
    /// Inclusion morphology (shape of the child within the parent).
    pub morphology: Morphology,
}

/// Localization tensors and effective stiffness produced by a scheme.
#[derive(Debug, Clone)]
pub struct SchemeResult {
    /// One strain-concentration tensor per child, in input order.
    pub a: Vec<Matrix6>,
    /// Effective tangent stiffness of the parent.
    pub lt_eff: Matrix6,
    /// Fixed-point iterations spent (self-consistent only, else 0).
    pub iterations: usize,
}

impl Scheme {
    /// Compute localization tensors and the effective tangent for a set of
    /// resolved children.
    ///
    /// `seed` is the reference-stiffness estimate carried over from the
    /// previous increment for the self-consistent scheme; `None` (or a
    /// reset) seeds from the Voigt average.
    pub fn localize(
        &self,
        children: &[ChildPhase],
        seed: Option<&Matrix6>,
        eshelby: &dyn EshelbyProvider,
    ) -> Result<SchemeResult> {
        assert!(!children.is_empty(), "homogenization requires at least one child");
        match self {
            Scheme::Voigt => Ok(voigt(children)),
            Scheme::MoriTanaka => mori_tanaka(children, eshelby),
            Scheme::SelfConsistent(settings) => {
                self_consistent(children, seed, eshelby, settings)
            }
            Scheme::PeriodicLayer => periodic_layer(children),
        }
    }
}

/// Effective tangent for known localization tensors.
fn effective_tangent(children: &[ChildPhase], a: &[Matrix6]) -> Matrix6 {
    let mut lt = Matrix6::zeros();
    for (child, a_i) in children.iter().zip(a) {
        lt += child.concentration * child.lt * a_i;
    }
    lt
}

fn voigt(children: &[ChildPhase]) -> SchemeResult {
    let a = vec![Matrix6::identity(); children.len()];
    let lt_eff = effective_tangent(children, &a);
    SchemeResult {
        a,
        lt_eff,
        iterations: 0,
    }
}

/// Dilute interaction tensor of one child against a reference medium:
/// T = [I + S·L_ref⁻¹·(L − L_ref)]⁻¹.
fn interaction_tensor(
    child: &ChildPhase,
    l_ref: &Matrix6,
    eshelby: &dyn EshelbyProvider,
) -> Result<Matrix6> {
    let s = eshelby.eshelby(l_ref, &child.morphology)?;
    let l_ref_inv = l_ref
        .try_inverse()
        .ok_or(MicromechError::SingularMatrix {
            context: "reference stiffness inversion",
        })?;
    (Matrix6::identity() + s * l_ref_inv * (child.lt - l_ref))
        .try_inverse()
        .ok_or(MicromechError::SingularMatrix {
            context: "dilute interaction tensor inversion",
        })
}

/// Localization tensors for a given reference medium:
/// A_i = T_i · [Σ_j c_j T_j]⁻¹.
///
/// When the concentrations do not sum to 1 the remainder is unmodeled; the
/// tensors are normalized over the modeled fractions only.
fn localization_for_reference(
    children: &[ChildPhase],
    l_ref: &Matrix6,
    matrix_index: Option<usize>,
    eshelby: &dyn EshelbyProvider,
) -> Result<Vec<Matrix6>> {
    let total_c: f64 = children.iter().map(|c| c.concentration).sum();
    let mut t = Vec::with_capacity(children.len());
    let mut sum_t = Matrix6::zeros();
    for (i, child) in children.iter().enumerate() {
        // The matrix phase interacts with itself trivially.
        let t_i = if matrix_index == Some(i) {
            Matrix6::identity()
        } else {
            interaction_tensor(child, l_ref, eshelby)?
        };
        sum_t += (child.concentration / total_c) * t_i;
        t.push(t_i);
    }
    let sum_t_inv = sum_t.try_inverse().ok_or(MicromechError::SingularMatrix {
        context: "localization normalization inversion",
    })?;
    Ok(t.into_iter().map(|t_i| t_i * sum_t_inv).collect())
}

fn mori_tanaka(children: &[ChildPhase], eshelby: &dyn EshelbyProvider) -> Result<SchemeResult> {
    // Matrix phase is the first child by convention.
    let l_matrix = children[0].lt;
    let a = localization_for_reference(children, &l_matrix, Some(0), eshelby)?;
    let lt_eff = effective_tangent(children, &a);
    Ok(SchemeResult {
        a,
        lt_eff,
        iterations: 0,
    })
}

fn self_consistent(
    children: &[ChildPhase],
    seed: Option<&Matrix6>,
    eshelby: &dyn EshelbyProvider,
    settings: &SelfConsistentSettings,
) -> Result<SchemeResult> {
    // Seed from the previous effective estimate when available, otherwise
    // from the Voigt average.
    let mut l_ref = match seed {
        Some(l) => *l,
        None => voigt(children).lt_eff,
    };

    let mut last_residual = f64::INFINITY;
    for iteration in 1..=settings.max_iterations {
        let a = localization_for_reference(children, &l_ref, None, eshelby)?;
        let lt_new = effective_tangent(children, &a);

        let change = (lt_new - l_ref).norm();
        let scale = lt_new.norm().max(f64::MIN_POSITIVE);
        last_residual = change / scale;
        l_ref = lt_new;

        if last_residual < settings.tolerance {
            return Ok(SchemeResult {
                a,
                lt_eff: lt_new,
                iterations: iteration,
            });
        }
    }

    Err(MicromechError::SelfConsistentDiverged {
        iterations: settings.max_iterations,
        residual: last_residual,
        tolerance: settings.tolerance,
    })
}

/// Voigt slots whose stress components carry traction across a layer
/// interface with normal x: σ_xx, σ_xy, σ_zx.
const NORMAL_SET: [usize; 3] = [0, 3, 5];
/// Voigt slots whose strain components are continuous across the interface:
/// ε_yy, ε_zz, γ_yz.
const PLANE_SET: [usize; 3] = [1, 2, 4];

fn gather(m: &Matrix6, rows: &[usize; 3], cols: &[usize; 3]) -> nalgebra::Matrix3<f64> {
    let mut out = nalgebra::Matrix3::zeros();
    for (i, &r) in rows.iter().enumerate() {
        for (j, &c) in cols.iter().enumerate() {
            out[(i, j)] = m[(r, c)];
        }
    }
    out
}

fn scatter(
    out: &mut Matrix6,
    block: &nalgebra::Matrix3<f64>,
    rows: &[usize; 3],
    cols: &[usize; 3],
) {
    for (i, &r) in rows.iter().enumerate() {
        for (j, &c) in cols.iter().enumerate() {
            out[(r, c)] = block[(i, j)];
        }
    }
}

/// Closed-form laminate localization.
///
/// Traction continuity across the layer normal and in-plane strain
/// compatibility give, per phase i with stiffness blocks K_i = L_NN and
/// G_i = L_NP:
///
///   ε_N^i = K_i⁻¹·M⁻¹·E_N + (K_i⁻¹·M⁻¹·H − K_i⁻¹·G_i)·E_P,   ε_P^i = E_P
///
/// with M = Σ c_i K_i⁻¹ and H = Σ c_i K_i⁻¹ G_i. The tensors satisfy
/// Σ c_i A_i = I by construction.
fn periodic_layer(children: &[ChildPhase]) -> Result<SchemeResult> {
    let total_c: f64 = children.iter().map(|c| c.concentration).sum();

    let mut k_inv = Vec::with_capacity(children.len());
    let mut g = Vec::with_capacity(children.len());
    let mut m = nalgebra::Matrix3::<f64>::zeros();
    let mut h = nalgebra::Matrix3::<f64>::zeros();

    for child in children {
        let k_i = gather(&child.lt, &NORMAL_SET, &NORMAL_SET);
        let g_i = gather(&child.lt, &NORMAL_SET, &PLANE_SET);
        let k_i_inv = k_i.try_inverse().ok_or(MicromechError::SingularMatrix {
            context: "laminate normal stiffness block inversion",
        })?;
        let c = child.concentration / total_c;
        m += c * k_i_inv;
        h += c * k_i_inv * g_i;
        k_inv.push(k_i_inv);
        g.push(g_i);
    }

    let m_inv = m.try_inverse().ok_or(MicromechError::SingularMatrix {
        context: "laminate compliance average inversion",
    })?;

    let mut a = Vec::with_capacity(children.len());
    for (k_i_inv, g_i) in k_inv.iter().zip(&g) {
        let a_nn = k_i_inv * m_inv;
        let a_np = k_i_inv * m_inv * h - k_i_inv * g_i;
        let mut a_i = Matrix6::zeros();
        scatter(&mut a_i, &a_nn, &NORMAL_SET, &NORMAL_SET);
        scatter(&mut a_i, &a_np, &NORMAL_SET, &PLANE_SET);
        for &p in &PLANE_SET {
            a_i[(p, p)] = 1.0;
        }
        a.push(a_i);
    }

    let lt_eff = effective_tangent(children, &a);
    Ok(SchemeResult {
        a,
        lt_eff,
        iterations: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constitutive::l_iso;
    use crate::homogenization::eshelby::ClosedFormEshelby;
    use approx::assert_relative_eq;

    fn child(e: f64, nu: f64, c: f64) -> ChildPhase {
        ChildPhase {
            lt: l_iso(e, nu),
            concentration: c,
            morphology: Morphology::sphere(),
        }
    }

    #[test]
    fn test_voigt_equal_mixture_is_exact_average() {
        let c1 = child(70e9, 0.3, 0.5);
        let c2 = child(210e9, 0.25, 0.5);
        let result = Scheme::Voigt
            .localize(&[c1, c2], None, &ClosedFormEshelby)
            .unwrap();
        let expected = 0.5 * c1.lt + 0.5 * c2.lt;
        assert_eq!(result.lt_eff, expected);
        assert_eq!(result.a[0], Matrix6::identity());
    }

    #[test]
    fn test_mori_tanaka_single_phase_identity() {
        // One child at full concentration: the composite is that child.
        let c = child(70e9, 0.3, 1.0);
        let result = Scheme::MoriTanaka
            .localize(&[c], None, &ClosedFormEshelby)
            .unwrap();
        for i in 0..6 {
            for j in 0..6 {
                assert_relative_eq!(result.lt_eff[(i, j)], c.lt[(i, j)], epsilon = 1.0);
            }
        }
    }

    #[test]
    fn test_mori_tanaka_partition_of_unity() {
        let matrix = child(3e9, 0.35, 0.7);
        let inclusion = child(70e9, 0.2, 0.3);
        let result = Scheme::MoriTanaka
            .localize(&[matrix, inclusion], None, &ClosedFormEshelby)
            .unwrap();
        let sum = 0.7 * result.a[0] + 0.3 * result.a[1];
        for i in 0..6 {
            for j in 0..6 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(sum[(i, j)], expected, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_mori_tanaka_between_bounds() {
        // Effective axial stiffness sits between Reuss and Voigt bounds
        let matrix = child(3e9, 0.35, 0.6);
        let inclusion = child(70e9, 0.2, 0.4);
        let result = Scheme::MoriTanaka
            .localize(&[matrix, inclusion], None, &ClosedFormEshelby)
            .unwrap();

        let voigt_bound = 0.6 * matrix.lt[(0, 0)] + 0.4 * inclusion.lt[(0, 0)];
        let reuss_bound =
            1.0 / (0.6 / matrix.lt[(0, 0)] + 0.4 / inclusion.lt[(0, 0)]);
        assert!(result.lt_eff[(0, 0)] < voigt_bound);
        assert!(result.lt_eff[(0, 0)] > reuss_bound);
    }

    #[test]
    fn test_self_consistent_single_phase_one_iteration() {
        let c = child(70e9, 0.3, 1.0);
        let result = Scheme::SelfConsistent(SelfConsistentSettings::default())
            .localize(&[c], None, &ClosedFormEshelby)
            .unwrap();
        assert_eq!(result.iterations, 1);
        for i in 0..6 {
            for j in 0..6 {
                assert_relative_eq!(result.lt_eff[(i, j)], c.lt[(i, j)], epsilon = 1.0);
            }
        }
    }

    #[test]
    fn test_self_consistent_converges_two_phase() {
        let c1 = child(3e9, 0.35, 0.5);
        let c2 = child(70e9, 0.2, 0.5);
        let result = Scheme::SelfConsistent(SelfConsistentSettings::default())
            .localize(&[c1, c2], None, &ClosedFormEshelby)
            .unwrap();
        assert!(result.iterations < 50);
        // Self-consistent sits between the Voigt and Reuss bounds too
        let voigt_bound = 0.5 * c1.lt[(0, 0)] + 0.5 * c2.lt[(0, 0)];
        assert!(result.lt_eff[(0, 0)] < voigt_bound);
        assert!(result.lt_eff[(0, 0)] > 0.0);
    }

    #[test]
    fn test_self_consistent_cap_reported() {
        let c1 = child(3e9, 0.35, 0.5);
        let c2 = child(70e9, 0.2, 0.5);
        let settings = SelfConsistentSettings {
            tolerance: 1e-30,
            max_iterations: 2,
        };
        let err = Scheme::SelfConsistent(settings)
            .localize(&[c1, c2], None, &ClosedFormEshelby)
            .unwrap_err();
        assert!(matches!(
            err,
            MicromechError::SelfConsistentDiverged { iterations: 2, .. }
        ));
    }

    #[test]
    fn test_periodic_layer_partition_of_unity() {
        let mut c1 = child(3e9, 0.35, 0.4);
        let mut c2 = child(70e9, 0.2, 0.6);
        c1.morphology = Morphology::Layer;
        c2.morphology = Morphology::Layer;
        let result = Scheme::PeriodicLayer
            .localize(&[c1, c2], None, &ClosedFormEshelby)
            .unwrap();
        let sum = 0.4 * result.a[0] + 0.6 * result.a[1];
        for i in 0..6 {
            for j in 0..6 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(sum[(i, j)], expected, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_periodic_layer_series_modulus_along_normal() {
        // For equal Poisson ratios the laminate's normal response follows
        // the series (Reuss-like) combination of the L_NN blocks: softer
        // than Voigt in the xx direction, equal to Voigt in-plane trend.
        let mut c1 = child(10e9, 0.0, 0.5);
        let mut c2 = child(40e9, 0.0, 0.5);
        c1.morphology = Morphology::Layer;
        c2.morphology = Morphology::Layer;
        let result = Scheme::PeriodicLayer
            .localize(&[c1, c2], None, &ClosedFormEshelby)
            .unwrap();
        // ν = 0 decouples the normal block: L_xx is the harmonic mean
        let harmonic = 2.0 / (1.0 / 10e9 + 1.0 / 40e9);
        assert_relative_eq!(result.lt_eff[(0, 0)], harmonic, epsilon = 1.0);
        // In-plane stiffness is the arithmetic mean
        assert_relative_eq!(result.lt_eff[(1, 1)], 25e9, epsilon = 1.0);
    }
}
