/// Shape and orientation descriptor of a phase
///
/// The morphology selects between an ellipsoidal inclusion (aspect ratios
/// a1:a2:a3) and a periodic layer. The concentration is the phase's volume
/// fraction within its parent; orientation is the Euler angle triple
/// (z-x-z) of the phase's material frame relative to the parent frame.

/// Inclusion morphology.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Morphology {
    /// General ellipsoid with semi-axis aspect ratios a1 : a2 : a3.
    Ellipsoid { a1: f64, a2: f64, a3: f64 },
    /// Flat periodic layer, normal along the local x-axis.
    Layer,
}

impl Morphology {
    /// Sphere (a1 = a2 = a3 = 1), the default inclusion shape.
    pub fn sphere() -> Self {
        Self::Ellipsoid {
            a1: 1.0,
            a2: 1.0,
            a3: 1.0,
        }
    }

    pub fn is_sphere(&self) -> bool {
        match self {
            Self::Ellipsoid { a1, a2, a3 } => {
                (a1 - a2).abs() < 1e-9 && (a2 - a3).abs() < 1e-9
            }
            Self::Layer => false,
        }
    }
}

/// Shape, volume fraction, and orientation of a phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shape {
    pub morphology: Morphology,
    /// Volume fraction within the parent phase, in [0, 1].
    pub concentration: f64,
    /// Euler angle ψ (first rotation, about z), radians.
    pub psi: f64,
    /// Euler angle θ (second rotation, about x), radians.
    pub theta: f64,
    /// Euler angle φ (third rotation, about z), radians.
    pub phi: f64,
}

impl Shape {
    /// Sphere at full concentration in the parent frame.
    ///
    /// # Panics
    /// Panics if `concentration` is outside [0, 1].
    pub fn new(morphology: Morphology, concentration: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&concentration),
            "concentration must be in [0, 1], got {}",
            concentration
        );
        Self {
            morphology,
            concentration,
            psi: 0.0,
            theta: 0.0,
            phi: 0.0,
        }
    }

    pub fn with_orientation(mut self, psi: f64, theta: f64, phi: f64) -> Self {
        self.psi = psi;
        self.theta = theta;
        self.phi = phi;
        self
    }

    /// True when the material frame coincides with the parent frame.
    pub fn is_aligned(&self) -> bool {
        self.psi == 0.0 && self.theta == 0.0 && self.phi == 0.0
    }
}

impl Default for Shape {
    fn default() -> Self {
        Self::new(Morphology::sphere(), 1.0)
    }
}
