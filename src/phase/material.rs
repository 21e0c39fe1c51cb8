/// Material descriptor: a law identifier plus its numeric property vector
///
/// The law space is a closed set dispatched by name from the configuration
/// file. Leaf laws run a constitutive update; composite laws select the
/// homogenization scheme applied to the phase's children.

use crate::error::{MicromechError, Result};

/// Closed registry of material laws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialLaw {
    /// Thermoelastic isotropic leaf law.
    ElasticIso,
    /// Thermoelastic transversely isotropic leaf law.
    ElasticTransIso,
    /// Thermoelastic orthotropic leaf law.
    ElasticOrtho,
    /// Voigt / rule-of-mixtures homogenization.
    Voigt,
    /// Mori-Tanaka homogenization.
    MoriTanaka,
    /// Self-consistent homogenization (fixed-point on the reference medium).
    SelfConsistent,
    /// Periodic 1-D laminate homogenization.
    PeriodicLayer,
}

impl MaterialLaw {
    /// Parse a law identifier from the configuration file.
    pub fn parse(name: &str, phase: usize) -> Result<Self> {
        match name {
            "elastic_iso" => Ok(Self::ElasticIso),
            "elastic_transiso" => Ok(Self::ElasticTransIso),
            "elastic_ortho" => Ok(Self::ElasticOrtho),
            "voigt" => Ok(Self::Voigt),
            "mori_tanaka" => Ok(Self::MoriTanaka),
            "self_consistent" => Ok(Self::SelfConsistent),
            "periodic_layer" => Ok(Self::PeriodicLayer),
            _ => Err(MicromechError::UnknownMaterialLaw {
                name: name.to_string(),
                phase,
            }),
        }
    }

    /// True for laws that run a constitutive update at a leaf phase.
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            Self::ElasticIso | Self::ElasticTransIso | Self::ElasticOrtho
        )
    }

    /// Canonical identifier, as accepted by [`parse`](Self::parse).
    pub fn name(&self) -> &'static str {
        match self {
            Self::ElasticIso => "elastic_iso",
            Self::ElasticTransIso => "elastic_transiso",
            Self::ElasticOrtho => "elastic_ortho",
            Self::Voigt => "voigt",
            Self::MoriTanaka => "mori_tanaka",
            Self::SelfConsistent => "self_consistent",
            Self::PeriodicLayer => "periodic_layer",
        }
    }

    /// Internal-variable count required by the built-in leaf laws.
    ///
    /// The thermoelastic laws store the reference temperature in
    /// `statev[0]`. Composite laws carry no internal variables of their own.
    pub fn default_nstatev(&self) -> usize {
        if self.is_leaf() {
            1
        } else {
            0
        }
    }
}

/// A phase's material: law plus property vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub law: MaterialLaw,
    /// Law-specific numeric properties; the layout is documented on each
    /// constitutive routine.
    pub props: Vec<f64>,
    /// Internal-variable count for the phase's snapshots.
    pub nstatev: usize,
}

impl Material {
    pub fn new(law: MaterialLaw, props: Vec<f64>) -> Self {
        let nstatev = law.default_nstatev();
        Self {
            law,
            props,
            nstatev,
        }
    }

    pub fn with_nstatev(mut self, nstatev: usize) -> Self {
        assert!(
            nstatev >= self.law.default_nstatev(),
            "nstatev below the law's required minimum"
        );
        self.nstatev = nstatev;
        self
    }
}
