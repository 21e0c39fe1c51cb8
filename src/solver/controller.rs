//! Incremental loading controller with adaptive cutback
//!
//! The controller walks the loading schedule block by block, generates each
//! step against the committed state, and consumes its sub-increments. Every
//! sub-increment is attempted as a fraction `dtinc` of its deltas: on a
//! `tnew_dt < 1` signal the whole tree is rolled back and the fraction is
//! reduced, otherwise the tree commits atomically and the fraction grows
//! again. Repeated failure at the minimum fraction is a fatal error.

use std::io::Write;

use crate::constitutive::EnergyBalance;
use crate::error::{MicromechError, Result};
use crate::homogenization::{EshelbyProvider, SelfConsistentSettings};
use crate::phase::node::{HomogenizeContext, PhaseNode};
use crate::phase::state::{Matrix6, Vector6};

use super::output::OutputRequest;
use super::schedule::LoadingSchedule;
use super::step::{ControlType, Step};

/// Growth factor applied to the increment fraction after a commit.
const ACCELERATION: f64 = 2.0;
/// Tolerance on "the fraction is already at its minimum".
const FRACTION_EPS: f64 = 1e-12;

/// Run statistics, reported once the schedule completes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolveSummary {
    /// Sub-increments committed (cutback attempts counted separately).
    pub committed: usize,
    /// Rollbacks triggered by `tnew_dt < 1`.
    pub rollbacks: usize,
    /// Elapsed simulation time at the end of the schedule.
    pub elapsed_time: f64,
    /// Accumulated energy balance over every committed increment.
    pub energy: EnergyBalance,
}

/// Drives the schedule against a phase tree.
pub struct IncrementController<'a> {
    eshelby: &'a dyn EshelbyProvider,
    sc: SelfConsistentSettings,
    /// Elapsed simulation time.
    pub time: f64,
    /// Accumulated energy of committed increments.
    pub energy: EnergyBalance,
    rollbacks: usize,
    committed: usize,
}

impl<'a> IncrementController<'a> {
    pub fn new(eshelby: &'a dyn EshelbyProvider, sc: SelfConsistentSettings) -> Self {
        Self {
            eshelby,
            sc,
            time: 0.0,
            energy: EnergyBalance::default(),
            rollbacks: 0,
            committed: 0,
        }
    }

    /// Run the whole schedule, writing one result line per committed
    /// sub-increment.
    pub fn run<W: Write>(
        &mut self,
        tree: &mut PhaseNode,
        schedule: &mut LoadingSchedule,
        request: &OutputRequest,
        out: &mut W,
    ) -> Result<SolveSummary> {
        self.initialize(tree)?;

        for block in &mut schedule.blocks {
            let number = block.number;
            let ncycle = block.ncycle;
            for cycle in 0..ncycle {
                for step in block.steps.iter_mut() {
                    step.generate(
                        self.time,
                        &tree.sv_global.sigma,
                        &tree.sv_global.etot,
                        tree.sv_global.t,
                    )?;
                    for inc in 0..step.ninc {
                        self.run_increment(tree, step, number, inc)?;
                        request.write_line(
                            out,
                            number,
                            cycle,
                            step.number,
                            inc,
                            self.time,
                            &tree.sv_global,
                        )?;
                    }
                }
            }
        }

        Ok(SolveSummary {
            committed: self.committed,
            rollbacks: self.rollbacks,
            elapsed_time: self.time,
            energy: self.energy,
        })
    }

    /// Zero-increment pass that initializes every phase's tangent and
    /// internal variables before the first real increment.
    fn initialize(&mut self, tree: &mut PhaseNode) -> Result<()> {
        let ctx = HomogenizeContext {
            time: self.time,
            dtime: 0.0,
            start: true,
            reset_reference: true,
            sc: self.sc,
            eshelby: self.eshelby,
        };
        tree.sv_global.detot = Vector6::zeros();
        tree.sv_global.dt = 0.0;
        tree.homogenize(&ctx)?;
        tree.commit_all();
        Ok(())
    }

    /// Consume one sub-increment of a generated step, cutting back on
    /// non-convergence.
    fn run_increment(
        &mut self,
        tree: &mut PhaseNode,
        step: &Step,
        block: usize,
        inc: usize,
    ) -> Result<()> {
        let mut tinc = 0.0;
        let mut dtinc = step.dn_init.min(step.dn_maxi);

        while tinc < 1.0 - FRACTION_EPS {
            // The attempt is clamped to the remaining fraction, the nominal
            // `dtinc` is what cutback and escalation reason about.
            let applied = dtinc.min(1.0 - tinc);
            let dtime = applied * step.times[inc];

            let target = applied * step.mecas[inc];
            let dtemp = applied * step.ts[inc];
            tree.sv_global.detot = control_solve(
                &tree.sv_global.lt_start,
                &tree.sv_global.lt_theta,
                &step.control,
                &target,
                dtemp,
            )?;
            tree.sv_global.dt = dtemp;

            let ctx = HomogenizeContext {
                time: self.time,
                dtime,
                start: false,
                reset_reference: false,
                sc: self.sc,
                eshelby: self.eshelby,
            };
            let result = tree.homogenize(&ctx)?;

            if self.assess(tree, result.tnew_dt, dtime, &result.energy) {
                tinc += applied;
                dtinc = (dtinc * ACCELERATION).min(step.dn_maxi);
            } else {
                dtinc = next_fraction(dtinc, result.tnew_dt, step.dn_mini).ok_or(
                    MicromechError::IncrementTooSmall {
                        block,
                        step: step.number,
                        inc,
                        dn_mini: step.dn_mini,
                    },
                )?;
            }
        }
        Ok(())
    }

    /// Commit-or-rollback bookkeeping for one trial.
    ///
    /// Returns true on commit. On rollback every committed field in the
    /// tree, the elapsed time, and the accumulated energy are untouched.
    pub fn assess(
        &mut self,
        tree: &mut PhaseNode,
        tnew_dt: f64,
        dtime: f64,
        energy: &EnergyBalance,
    ) -> bool {
        if tnew_dt < 1.0 {
            tree.rollback_all();
            self.rollbacks += 1;
            false
        } else {
            tree.commit_all();
            self.time += dtime;
            self.energy.add_scaled(energy, 1.0);
            self.committed += 1;
            true
        }
    }
}

/// Next trial fraction after a rejected attempt, `None` once the nominal
/// fraction is already at its minimum. The nominal fraction is tested here
/// even when the attempt itself was clamped to a smaller remainder of the
/// sub-increment.
fn next_fraction(dtinc: f64, tnew_dt: f64, dn_mini: f64) -> Option<f64> {
    if dtinc <= dn_mini + FRACTION_EPS {
        None
    } else {
        Some((dtinc * tnew_dt).max(dn_mini))
    }
}

/// Solve the mixed strain/stress control for the root strain increment.
///
/// Strain-controlled components are prescribed directly; stress-controlled
/// components are resolved through the committed tangent: row k of the
/// system is the unit row for a strain control and row k of `lt` for a
/// stress control, so the solution satisfies `detot[k] = target[k]` on the
/// strain set and `(lt · detot)[k] = target[k] − lt_theta[k]·dtemp` on the
/// stress set. The thermal term keeps stress-controlled components on
/// target through temperature increments.
pub(crate) fn control_solve(
    lt: &Matrix6,
    lt_theta: &Vector6,
    control: &[ControlType; 6],
    target: &Vector6,
    dtemp: f64,
) -> Result<Vector6> {
    if control.iter().all(|c| *c == ControlType::Strain) {
        return Ok(*target);
    }

    let mut system = Matrix6::zeros();
    let mut rhs = *target;
    for k in 0..6 {
        match control[k] {
            ControlType::Strain => system[(k, k)] = 1.0,
            // Free components were rewritten to Stress at generation time.
            ControlType::Stress | ControlType::Free => {
                for j in 0..6 {
                    system[(k, j)] = lt[(k, j)];
                }
                rhs[k] -= lt_theta[k] * dtemp;
            }
        }
    }
    let inv = system.try_inverse().ok_or(MicromechError::SingularMatrix {
        context: "mixed control solve",
    })?;
    Ok(inv * rhs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constitutive::l_iso;
    use crate::homogenization::ClosedFormEshelby;
    use crate::phase::geometry::Shape;
    use crate::phase::material::{Material, MaterialLaw};
    use crate::solver::output::StatevSelection;
    use crate::solver::schedule::{Block, BlockKind};
    use crate::solver::step::{LoadMode, StepKind};
    use approx::assert_relative_eq;

    fn elastic_tree(e: f64, nu: f64) -> PhaseNode {
        PhaseNode::new(
            Material::new(MaterialLaw::ElasticIso, vec![e, nu, 0.0]),
            Shape::default(),
        )
    }

    fn strain_x_schedule(ninc: usize, target: f64) -> LoadingSchedule {
        let mut control = [ControlType::Stress; 6];
        control[0] = ControlType::Strain;
        let mut bc = Vector6::zeros();
        bc[0] = target;
        let step = Step::new(
            0,
            StepKind::Mechanical,
            ninc,
            LoadMode::Linear,
            control,
            bc,
            1.0,
            0.0,
        );
        LoadingSchedule::new(vec![Block::new(0, 1, BlockKind::Mechanical, vec![step])])
    }

    #[test]
    fn test_control_solve_pure_strain() {
        let mut target = Vector6::zeros();
        target[0] = 0.01;
        let detot = control_solve(
            &l_iso(100.0, 0.3),
            &Vector6::zeros(),
            &[ControlType::Strain; 6],
            &target,
            0.0,
        )
        .unwrap();
        assert_eq!(detot, target);
    }

    #[test]
    fn test_control_solve_uniaxial_stress_gives_poisson_contraction() {
        let mut control = [ControlType::Stress; 6];
        control[0] = ControlType::Strain;
        let mut target = Vector6::zeros();
        target[0] = 0.01;
        let detot =
            control_solve(&l_iso(100.0, 0.3), &Vector6::zeros(), &control, &target, 0.0).unwrap();
        assert_relative_eq!(detot[0], 0.01, epsilon = 1e-14);
        assert_relative_eq!(detot[1], -0.003, epsilon = 1e-12);
        assert_relative_eq!(detot[2], -0.003, epsilon = 1e-12);
    }

    #[test]
    fn test_uniaxial_strain_controlled_run() {
        let provider = ClosedFormEshelby;
        let mut controller =
            IncrementController::new(&provider, SelfConsistentSettings::default());
        let mut tree = elastic_tree(100.0, 0.0);
        let mut schedule = strain_x_schedule(4, 0.01);
        let request = OutputRequest {
            temperature: false,
            mech_components: vec![0],
            statev: StatevSelection::None,
        };
        let mut out = Vec::new();
        let summary = controller
            .run(&mut tree, &mut schedule, &request, &mut out)
            .unwrap();

        assert_relative_eq!(tree.sv_global.etot[0], 0.01, epsilon = 1e-12);
        // nu = 0: sigma_xx = E * eps_xx
        assert_relative_eq!(tree.sv_global.sigma[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(summary.elapsed_time, 1.0, epsilon = 1e-12);
        assert_eq!(summary.rollbacks, 0);
        assert_eq!(summary.committed, 4);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 4);
    }

    #[test]
    fn test_stress_controlled_run_reaches_target_strain() {
        let provider = ClosedFormEshelby;
        let mut controller =
            IncrementController::new(&provider, SelfConsistentSettings::default());
        let mut tree = elastic_tree(100.0, 0.3);

        let mut control = [ControlType::Stress; 6];
        control[0] = ControlType::Stress;
        let mut bc = Vector6::zeros();
        bc[0] = 1.0;
        let step = Step::new(
            0,
            StepKind::Mechanical,
            5,
            LoadMode::Linear,
            control,
            bc,
            2.0,
            0.0,
        );
        let mut schedule =
            LoadingSchedule::new(vec![Block::new(0, 1, BlockKind::Mechanical, vec![step])]);
        let mut out = Vec::new();
        controller
            .run(&mut tree, &mut schedule, &OutputRequest::default(), &mut out)
            .unwrap();

        assert_relative_eq!(tree.sv_global.sigma[0], 1.0, epsilon = 1e-9);
        // Uniaxial stress: eps_xx = sigma / E, lateral contraction -nu/E
        assert_relative_eq!(tree.sv_global.etot[0], 0.01, epsilon = 1e-10);
        assert_relative_eq!(tree.sv_global.etot[1], -0.003, epsilon = 1e-10);
    }

    #[test]
    fn test_half_tnew_dt_triggers_exactly_one_rollback() {
        let provider = ClosedFormEshelby;
        let mut controller =
            IncrementController::new(&provider, SelfConsistentSettings::default());
        let mut tree = elastic_tree(100.0, 0.0);
        controller.initialize(&mut tree).unwrap();

        let committed_before = tree.sv_global.clone();
        let time_before = controller.time;

        // Apply a trial increment, then reject it
        tree.sv_global.detot[0] = 0.01;
        let ctx = HomogenizeContext {
            time: 0.0,
            dtime: 0.1,
            start: false,
            reset_reference: false,
            sc: SelfConsistentSettings::default(),
            eshelby: &provider,
        };
        tree.homogenize(&ctx).unwrap();

        let accepted = controller.assess(&mut tree, 0.5, 0.1, &EnergyBalance::default());
        assert!(!accepted);
        assert_eq!(controller.rollbacks, 1);
        assert_eq!(controller.time, time_before);
        assert_eq!(tree.sv_global.sigma, committed_before.sigma_start);
        assert_eq!(tree.sv_global.etot, committed_before.etot);
    }

    #[test]
    fn test_cutback_escalates_on_nominal_fraction_only() {
        // A rejected attempt clamped to a small remainder must not escalate
        // while the nominal fraction is still above its minimum
        assert_eq!(next_fraction(1.0, 0.5, 0.1), Some(0.5));
        assert_eq!(next_fraction(0.4, 0.1, 0.1), Some(0.1));
        assert_eq!(next_fraction(0.1, 0.5, 0.1), None);
    }

    #[test]
    fn test_partial_fraction_splits_sub_increment() {
        let provider = ClosedFormEshelby;
        let mut controller =
            IncrementController::new(&provider, SelfConsistentSettings::default());
        let mut tree = elastic_tree(100.0, 0.0);

        let mut schedule = strain_x_schedule(1, 0.01);
        schedule.blocks[0].steps[0] = schedule.blocks[0].steps[0]
            .clone()
            .with_fractions(0.6, 0.1, 0.6);
        let mut out = Vec::new();
        let summary = controller
            .run(&mut tree, &mut schedule, &OutputRequest::default(), &mut out)
            .unwrap();

        // 0.6 then the clamped 0.4 remainder, landing exactly on target
        assert_eq!(summary.committed, 2);
        assert_eq!(summary.rollbacks, 0);
        assert_relative_eq!(tree.sv_global.etot[0], 0.01, epsilon = 1e-14);
        assert_relative_eq!(summary.elapsed_time, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cyclic_file_driven_block() {
        use std::io::Write as IoWrite;
        use std::path::PathBuf;

        let path = std::env::temp_dir().join("micromech_ctrl_cycle.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"a 1.0 0.001\nb 2.0 0.002\n").unwrap();

        let mut control = [ControlType::Free; 6];
        control[0] = ControlType::Strain;
        let step = Step::new(
            0,
            StepKind::Mechanical,
            0,
            LoadMode::FileDriven(PathBuf::from(&path)),
            control,
            Vector6::zeros(),
            0.0,
            0.0,
        );
        let mut schedule =
            LoadingSchedule::new(vec![Block::new(0, 2, BlockKind::Mechanical, vec![step])]);

        let provider = ClosedFormEshelby;
        let mut controller =
            IncrementController::new(&provider, SelfConsistentSettings::default());
        let mut tree = elastic_tree(100.0, 0.0);
        let mut out = Vec::new();
        let summary = controller
            .run(&mut tree, &mut schedule, &OutputRequest::default(), &mut out)
            .unwrap();

        // Both cycles consume the file; the second restarts from the state
        // the first one reached
        assert_eq!(summary.committed, 4);
        assert_relative_eq!(tree.sv_global.etot[0], 0.002, epsilon = 1e-12);
    }

    #[test]
    fn test_cyclic_block_repeats_steps() {
        let provider = ClosedFormEshelby;
        let mut controller =
            IncrementController::new(&provider, SelfConsistentSettings::default());
        let mut tree = elastic_tree(100.0, 0.0);

        // One cycle loads to 0.01, the next re-generates from the reached
        // state and holds it (zero remaining delta)
        let mut control = [ControlType::Stress; 6];
        control[0] = ControlType::Strain;
        let mut bc = Vector6::zeros();
        bc[0] = 0.01;
        let step = Step::new(
            0,
            StepKind::Mechanical,
            2,
            LoadMode::Linear,
            control,
            bc,
            1.0,
            0.0,
        );
        let mut schedule =
            LoadingSchedule::new(vec![Block::new(0, 2, BlockKind::Mechanical, vec![step])]);
        let mut out = Vec::new();
        let summary = controller
            .run(&mut tree, &mut schedule, &OutputRequest::default(), &mut out)
            .unwrap();

        assert_eq!(summary.committed, 4);
        assert_relative_eq!(tree.sv_global.etot[0], 0.01, epsilon = 1e-12);
        assert_relative_eq!(summary.elapsed_time, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_voigt_composite_run_matches_mixture_modulus() {
        let provider = ClosedFormEshelby;
        let mut controller =
            IncrementController::new(&provider, SelfConsistentSettings::default());

        let mut tree = PhaseNode::new(
            Material::new(MaterialLaw::Voigt, vec![]),
            Shape::default(),
        );
        tree.add_child(elastic_tree_child(70e9, 0.0, 0.5), 1).unwrap();
        tree.add_child(elastic_tree_child(210e9, 0.0, 0.5), 2).unwrap();

        let mut schedule = strain_x_schedule(2, 1e-3);
        let mut out = Vec::new();
        controller
            .run(&mut tree, &mut schedule, &OutputRequest::default(), &mut out)
            .unwrap();

        // nu = 0 on both phases: effective modulus is the volume average
        assert_relative_eq!(tree.sv_global.sigma[0], 140e9 * 1e-3, epsilon = 1.0);
    }

    fn elastic_tree_child(e: f64, nu: f64, c: f64) -> PhaseNode {
        PhaseNode::new(
            Material::new(MaterialLaw::ElasticIso, vec![e, nu, 0.0]),
            Shape::new(crate::phase::geometry::Morphology::sphere(), c),
        )
    }
}
