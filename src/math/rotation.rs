/// Frame rotations for Voigt-notation strain and stress
///
/// Rotates 6-component strain/stress vectors and 3×3 deformation gradients
/// about a coordinate axis. Strains use engineering shear (γ = 2ε), so
/// strain and stress transform differently and get separate entry points.
///
/// Voigt ordering throughout the crate: [xx, yy, zz, xy, yz, zx].

use nalgebra::{Matrix3, SMatrix, SVector};

/// Angles with magnitude below this are treated as zero and skipped.
pub const ANGLE_EPS: f64 = 1e-12;

/// Coordinate axis for a single rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Rotation matrix for a right-handed rotation of `angle` radians about `axis`.
pub fn rotation_matrix(angle: f64, axis: Axis) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    match axis {
        Axis::X => Matrix3::new(
            1.0, 0.0, 0.0, //
            0.0, c, -s, //
            0.0, s, c,
        ),
        Axis::Y => Matrix3::new(
            c, 0.0, s, //
            0.0, 1.0, 0.0, //
            -s, 0.0, c,
        ),
        Axis::Z => Matrix3::new(
            c, -s, 0.0, //
            s, c, 0.0, //
            0.0, 0.0, 1.0,
        ),
    }
}

/// Rotate a 3×3 matrix (deformation gradient): M' = R M Rᵀ.
pub fn rotate_matrix(m: &Matrix3<f64>, angle: f64, axis: Axis) -> Matrix3<f64> {
    if angle.abs() < ANGLE_EPS {
        return *m;
    }
    let r = rotation_matrix(angle, axis);
    r * m * r.transpose()
}

/// Rotate a stress vector in Voigt notation.
///
/// The vector is unpacked to its symmetric tensor, rotated as σ' = R σ Rᵀ,
/// and repacked.
pub fn rotate_stress(v: &SVector<f64, 6>, angle: f64, axis: Axis) -> SVector<f64, 6> {
    if angle.abs() < ANGLE_EPS {
        return *v;
    }
    let t = Matrix3::new(
        v[0], v[3], v[5], //
        v[3], v[1], v[4], //
        v[5], v[4], v[2],
    );
    let r = rotation_matrix(angle, axis);
    let t = r * t * r.transpose();
    SVector::<f64, 6>::from_column_slice(&[
        t[(0, 0)],
        t[(1, 1)],
        t[(2, 2)],
        t[(0, 1)],
        t[(1, 2)],
        t[(0, 2)],
    ])
}

/// Rotate a strain vector in Voigt notation with engineering shear.
///
/// Shear components are halved to tensor form before rotation and doubled
/// back afterwards.
pub fn rotate_strain(v: &SVector<f64, 6>, angle: f64, axis: Axis) -> SVector<f64, 6> {
    if angle.abs() < ANGLE_EPS {
        return *v;
    }
    let t = Matrix3::new(
        v[0],
        0.5 * v[3],
        0.5 * v[5],
        0.5 * v[3],
        v[1],
        0.5 * v[4],
        0.5 * v[5],
        0.5 * v[4],
        v[2],
    );
    let r = rotation_matrix(angle, axis);
    let t = r * t * r.transpose();
    SVector::<f64, 6>::from_column_slice(&[
        t[(0, 0)],
        t[(1, 1)],
        t[(2, 2)],
        2.0 * t[(0, 1)],
        2.0 * t[(1, 2)],
        2.0 * t[(0, 2)],
    ])
}

/// 6×6 rotation operator for a stress vector about one axis.
///
/// Used by the homogenization schemes to rotate tangent stiffness matrices:
/// L' = Q_σ L Q_εᵀ where Q_ε is the strain operator. Column k is the rotated
/// image of the k-th Voigt basis stress.
pub fn stress_rotation_operator(angle: f64, axis: Axis) -> SMatrix<f64, 6, 6> {
    let mut q = SMatrix::<f64, 6, 6>::zeros();
    for k in 0..6 {
        let mut e = SVector::<f64, 6>::zeros();
        e[k] = 1.0;
        q.set_column(k, &rotate_stress(&e, angle, axis));
    }
    q
}

/// 6×6 rotation operator for a strain vector about one axis.
pub fn strain_rotation_operator(angle: f64, axis: Axis) -> SMatrix<f64, 6, 6> {
    let mut q = SMatrix::<f64, 6, 6>::zeros();
    for k in 0..6 {
        let mut e = SVector::<f64, 6>::zeros();
        e[k] = 1.0;
        q.set_column(k, &rotate_strain(&e, angle, axis));
    }
    q
}

/// Rotate a tangent stiffness L (strain → stress map) about one axis.
///
/// σ' = Q_σ σ and ε' = Q_ε ε give L' = Q_σ L Q_ε⁻¹ = Q_σ L Q_σᵀ, since the
/// strain operator is the inverse transpose of the stress operator.
pub fn rotate_stiffness(l: &SMatrix<f64, 6, 6>, angle: f64, axis: Axis) -> SMatrix<f64, 6, 6> {
    if angle.abs() < ANGLE_EPS {
        return *l;
    }
    let q = stress_rotation_operator(angle, axis);
    q * l * q.transpose()
}
