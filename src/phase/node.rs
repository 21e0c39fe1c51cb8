/// A node in the composite's phase tree and the homogenization recursion
///
/// Each node owns a material descriptor, a shape descriptor, state
/// snapshots in both its parent's frame (`sv_global`) and its own material
/// frame (`sv_local`), a localization tensor relating its strain increment
/// to its parent's, and its children. The tree is a strict tree: children
/// are owned exclusively, no sharing, no cycles.
///
/// `homogenize()` is a post-order walk: leaves run their constitutive law,
/// internal nodes push localized increments into their children, recurse,
/// then combine the children's tangents through the node's scheme.

use crate::constitutive::{self, EnergyBalance, UmatContext, UmatResult};
use crate::error::{MicromechError, Result};
use crate::homogenization::{ChildPhase, EshelbyProvider, Scheme, SelfConsistentSettings};
use crate::phase::geometry::Shape;
use crate::phase::material::{Material, MaterialLaw};
use crate::phase::state::{Matrix6, StateSnapshot, Vector6};

/// Tolerance on the child-concentration sum check.
const CONCENTRATION_EPS: f64 = 1e-9;

/// Inputs of one homogenization pass that are not part of the tree state.
pub struct HomogenizeContext<'a> {
    /// Elapsed time at the start of the increment.
    pub time: f64,
    /// Time delta of the increment.
    pub dtime: f64,
    /// First call of the analysis; laws initialize here.
    pub start: bool,
    /// Re-seed the self-consistent reference from the Voigt average instead
    /// of the previous effective estimate.
    pub reset_reference: bool,
    /// Self-consistent convergence controls.
    pub sc: SelfConsistentSettings,
    /// Eshelby tensor source for the interaction-aware schemes.
    pub eshelby: &'a dyn EshelbyProvider,
}

#[derive(Debug)]
pub struct PhaseNode {
    pub material: Material,
    pub shape: Shape,
    /// State in the node's own material frame.
    pub sv_local: StateSnapshot,
    /// State in the parent's frame (the simulation frame for the root).
    pub sv_global: StateSnapshot,
    /// Localization tensor: maps the parent's local strain increment to
    /// this node's strain increment. Identity until first homogenization.
    pub a: Matrix6,
    pub children: Vec<PhaseNode>,
}

impl PhaseNode {
    pub fn new(material: Material, shape: Shape) -> Self {
        let nstatev = material.nstatev;
        Self {
            material,
            shape,
            sv_local: StateSnapshot::new(nstatev),
            sv_global: StateSnapshot::new(nstatev),
            a: Matrix6::identity(),
            children: Vec::new(),
        }
    }

    /// Attach a child phase, enforcing the concentration-sum invariant.
    ///
    /// `phase` is the index used in diagnostics when the invariant fails.
    pub fn add_child(&mut self, child: PhaseNode, phase: usize) -> Result<()> {
        assert!(
            !self.material.law.is_leaf(),
            "children can only be attached under a composite law"
        );
        let sum: f64 = self
            .children
            .iter()
            .map(|c| c.shape.concentration)
            .sum::<f64>()
            + child.shape.concentration;
        if sum > 1.0 + CONCENTRATION_EPS {
            return Err(MicromechError::ConcentrationSum { phase, sum });
        }
        self.children.push(child);
        Ok(())
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Total number of phases in this subtree, this node included.
    pub fn phase_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.phase_count()).sum::<usize>()
    }

    /// Commit every snapshot in the subtree. All-or-nothing: the controller
    /// calls this only once the whole tree converged.
    pub fn commit_all(&mut self) {
        self.sv_local.commit();
        self.sv_global.commit();
        for child in &mut self.children {
            child.commit_all();
        }
    }

    /// Roll every snapshot in the subtree back to its committed state.
    pub fn rollback_all(&mut self) {
        self.sv_local.rollback();
        self.sv_global.rollback();
        for child in &mut self.children {
            child.rollback_all();
        }
    }

    /// The scheme selected by this node's material law, if it is composite.
    fn scheme(&self, sc: SelfConsistentSettings) -> Option<Scheme> {
        match self.material.law {
            MaterialLaw::Voigt => Some(Scheme::Voigt),
            MaterialLaw::MoriTanaka => Some(Scheme::MoriTanaka),
            MaterialLaw::SelfConsistent => Some(Scheme::SelfConsistent(sc)),
            MaterialLaw::PeriodicLayer => Some(Scheme::PeriodicLayer),
            _ => None,
        }
    }

    /// Resolve this node's trial stress and tangent from its global trial
    /// strain/temperature increment.
    ///
    /// Returns the worst (minimum) `tnew_dt` over the subtree together with
    /// the volume-weighted energy increments. A `tnew_dt < 1` result leaves
    /// the trial fields inconsistent; the controller must roll back before
    /// retrying.
    pub fn homogenize(&mut self, ctx: &HomogenizeContext) -> Result<UmatResult> {
        let (psi, theta, phi) = (self.shape.psi, self.shape.theta, self.shape.phi);

        // Into the material frame.
        self.sv_local = self.sv_global.rotate_g2l(psi, theta, phi);

        let result = if self.is_leaf() {
            let law = constitutive::leaf_law(self.material.law);
            let uctx = UmatContext::new(ctx.time, ctx.dtime, ctx.start);
            law.update(&mut self.sv_local, &self.material.props, &uctx)?
        } else {
            self.homogenize_children(ctx)?
        };

        // Back to the parent's frame.
        self.sv_global = self.sv_local.rotate_l2g(psi, theta, phi);
        Ok(result)
    }

    fn homogenize_children(&mut self, ctx: &HomogenizeContext) -> Result<UmatResult> {
        let scheme = self
            .scheme(ctx.sc)
            .expect("internal phase carries a composite law; checked at construction");

        // Push the localized increments down: each child sees its share of
        // this node's local strain/temperature increment through its
        // current localization tensor.
        let detot_local = self.sv_local.detot;
        let dt_local = self.sv_local.dt;
        let f1_local = self.sv_local.f1;
        for child in &mut self.children {
            child.sv_global.detot = child.a * detot_local;
            child.sv_global.dt = dt_local;
            child.sv_global.f1 = f1_local;
        }

        let mut tnew_dt = f64::INFINITY;
        let mut energy = EnergyBalance::default();
        for child in &mut self.children {
            let res = child.homogenize(ctx)?;
            tnew_dt = tnew_dt.min(res.tnew_dt);
            energy.add_scaled(&res.energy, child.shape.concentration);
        }

        // Combine the children's freshly resolved tangents.
        let child_phases: Vec<ChildPhase> = self
            .children
            .iter()
            .map(|c| ChildPhase {
                lt: c.sv_global.lt,
                concentration: c.shape.concentration,
                morphology: c.shape.morphology,
            })
            .collect();

        // A zero committed tangent means nothing has converged yet; seeding
        // the self-consistent iteration from it would be singular.
        let seed = if ctx.reset_reference || ctx.start || self.sv_local.lt_start.norm() == 0.0 {
            None
        } else {
            Some(&self.sv_local.lt_start)
        };
        let scheme_result = scheme.localize(&child_phases, seed, ctx.eshelby)?;

        for (child, a_i) in self.children.iter_mut().zip(&scheme_result.a) {
            child.a = *a_i;
        }
        self.sv_local.lt = scheme_result.lt_eff;

        // Effective stress and thermal tangent are volume averages of the
        // children, already expressed in this node's local frame.
        let mut sigma = Vector6::zeros();
        let mut lt_theta = Vector6::zeros();
        for child in &self.children {
            sigma += child.shape.concentration * child.sv_global.sigma;
            lt_theta += child.shape.concentration * child.sv_global.lt_theta;
        }
        self.sv_local.sigma = sigma;
        self.sv_local.lt_theta = lt_theta;

        Ok(UmatResult { tnew_dt, energy })
    }
}
