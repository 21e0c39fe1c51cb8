//! Configuration management for homogenization simulations
//!
//! Reads TOML configuration files describing the solver controls, the
//! loading schedule (blocks of steps), the result-stream layout, and the
//! phase tree, and builds the runtime objects from them.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{MicromechError, Result};
use crate::homogenization::SelfConsistentSettings;
use crate::phase::geometry::{Morphology, Shape};
use crate::phase::material::{Material, MaterialLaw};
use crate::phase::node::PhaseNode;
use crate::phase::state::Vector6;
use crate::solver::output::{OutputRequest, StatevSelection};
use crate::solver::schedule::{Block, BlockKind, LoadingSchedule};
use crate::solver::step::{ControlType, LoadMode, Step, ThermalControl};

/// Main simulation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub blocks: Vec<BlockConfig>,
    pub phase: PhaseConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SolverConfig {
    /// Initial fraction of a sub-increment.
    pub dn_init: f64,
    /// Minimum fraction before non-convergence is fatal.
    pub dn_mini: f64,
    /// Maximum fraction after acceleration.
    pub dn_maxi: f64,
    /// Self-consistent fixed-point tolerance (relative Frobenius change).
    pub sc_tolerance: f64,
    /// Self-consistent iteration cap.
    pub sc_max_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        let sc = SelfConsistentSettings::default();
        Self {
            dn_init: 1.0,
            dn_mini: 0.1,
            dn_maxi: 1.0,
            sc_tolerance: sc.tolerance,
            sc_max_iterations: sc.max_iterations,
        }
    }
}

impl SolverConfig {
    pub fn self_consistent(&self) -> SelfConsistentSettings {
        SelfConsistentSettings {
            tolerance: self.sc_tolerance,
            max_iterations: self.sc_max_iterations,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Write temperature and the flux placeholder.
    #[serde(default)]
    pub temperature: bool,
    /// Voigt component indices to report (strain then stress).
    #[serde(default = "default_mech_components")]
    pub mech_components: Vec<usize>,
    /// Report every internal variable.
    #[serde(default)]
    pub statev_all: bool,
    /// Inclusive internal-variable index ranges (ignored if `statev_all`).
    #[serde(default)]
    pub statev_ranges: Vec<[usize; 2]>,
}

fn default_mech_components() -> Vec<usize> {
    (0..6).collect()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            temperature: false,
            mech_components: default_mech_components(),
            statev_all: false,
            statev_ranges: Vec::new(),
        }
    }
}

impl OutputConfig {
    /// Build the output request, validating every index against the Voigt
    /// range and the root phase's internal-variable count.
    pub fn to_request(&self, nstatev: usize) -> Result<OutputRequest> {
        for &k in &self.mech_components {
            if k > 5 {
                return Err(MicromechError::Config(format!(
                    "output: mechanical component {} out of range (0..=5)",
                    k
                )));
            }
        }
        let statev = if self.statev_all {
            StatevSelection::All
        } else if self.statev_ranges.is_empty() {
            StatevSelection::None
        } else {
            for &[lo, hi] in &self.statev_ranges {
                if lo > hi || hi >= nstatev {
                    return Err(MicromechError::Config(format!(
                        "output: statev range [{}, {}] invalid for {} internal variable(s)",
                        lo, hi, nstatev
                    )));
                }
            }
            StatevSelection::Ranges(
                self.statev_ranges.iter().map(|r| (r[0], r[1])).collect(),
            )
        };
        Ok(OutputRequest {
            temperature: self.temperature,
            mech_components: self.mech_components.clone(),
            statev,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlockConfig {
    /// Loading kind: `mechanical` or `thermomechanical`.
    pub kind: String,
    #[serde(default = "default_one")]
    pub ncycle: usize,
    pub steps: Vec<StepConfig>,
}

fn default_one() -> usize {
    1
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StepConfig {
    /// Generation mode: `linear`, `sinusoidal`, or `file`.
    pub mode: String,
    #[serde(default)]
    pub ninc: usize,
    /// Six control tags in Voigt order, e.g. `"ESSSSS"`.
    pub control: String,
    /// Mechanical targets (stress or strain per the control tag).
    #[serde(default)]
    pub targets: [f64; 6],
    /// Step duration.
    #[serde(default)]
    pub time: f64,
    /// Temperature target at the end of the step.
    #[serde(default)]
    pub temperature: f64,
    /// Exclude temperature from the path-file column layout.
    #[serde(default)]
    pub temperature_free: bool,
    /// Driving file for `file` mode.
    pub path: Option<PathBuf>,
    pub dn_init: Option<f64>,
    pub dn_mini: Option<f64>,
    pub dn_maxi: Option<f64>,
}

/// One node of the phase tree. Recursive: composite laws carry children.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PhaseConfig {
    /// Material law identifier (see [`MaterialLaw::parse`]).
    pub law: String,
    #[serde(default)]
    pub props: Vec<f64>,
    pub nstatev: Option<usize>,
    #[serde(default = "default_concentration")]
    pub concentration: f64,
    /// `sphere`, `layer`, or `ellipsoid` (with `aspect_ratios`).
    pub geometry: Option<String>,
    pub aspect_ratios: Option<[f64; 3]>,
    /// Euler angles ψ, θ, φ (radians, z-x-z).
    #[serde(default)]
    pub orientation: [f64; 3],
    #[serde(default)]
    pub children: Vec<PhaseConfig>,
}

fn default_concentration() -> f64 {
    1.0
}

impl SimulationConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            MicromechError::Config(format!(
                "failed to read config file `{}`: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| MicromechError::Config(format!("failed to parse config: {}", e)))
    }

    /// Build the loading schedule from the block descriptions.
    pub fn build_schedule(&self) -> Result<LoadingSchedule> {
        let mut blocks = Vec::with_capacity(self.blocks.len());
        for (b, bc) in self.blocks.iter().enumerate() {
            let kind = BlockKind::parse(&bc.kind, b)?;
            let mut steps = Vec::with_capacity(bc.steps.len());
            for (s, sc) in bc.steps.iter().enumerate() {
                steps.push(self.build_step(b, s, kind, sc)?);
            }
            blocks.push(Block::new(b, bc.ncycle, kind, steps));
        }
        Ok(LoadingSchedule::new(blocks))
    }

    fn build_step(
        &self,
        block: usize,
        number: usize,
        kind: BlockKind,
        sc: &StepConfig,
    ) -> Result<Step> {
        let mode = match sc.mode.as_str() {
            "linear" => LoadMode::Linear,
            "sinusoidal" => LoadMode::Sinusoidal,
            "file" => {
                let path = sc.path.clone().ok_or_else(|| {
                    MicromechError::Config(format!(
                        "block {}, step {}: file mode needs a `path`",
                        block, number
                    ))
                })?;
                LoadMode::FileDriven(path)
            }
            other => {
                return Err(MicromechError::UnsupportedLoadMode {
                    block,
                    step: number,
                    mode: other.to_string(),
                })
            }
        };

        if sc.control.chars().count() != 6 {
            return Err(MicromechError::InvalidControlTag {
                block,
                step: number,
                tag: sc.control.clone(),
            });
        }
        let mut control = [ControlType::Strain; 6];
        for (k, tag) in sc.control.chars().enumerate() {
            control[k] = ControlType::parse(tag, block, number)?;
        }

        let defaults = &self.solver;
        let mut step = Step::new(
            number,
            kind.step_kind(),
            sc.ninc,
            mode,
            control,
            Vector6::from_column_slice(&sc.targets),
            sc.time,
            sc.temperature,
        )
        .with_fractions(
            sc.dn_init.unwrap_or(defaults.dn_init),
            sc.dn_mini.unwrap_or(defaults.dn_mini),
            sc.dn_maxi.unwrap_or(defaults.dn_maxi),
        );
        // The step kind already selects the default thermal control;
        // `temperature_free` only opts a thermomechanical step out.
        if sc.temperature_free {
            step = step.with_thermal_control(ThermalControl::Free);
        }
        Ok(step)
    }

    /// Build the phase tree, validating leaf/composite placement and the
    /// concentration sums.
    pub fn build_phase_tree(&self) -> Result<PhaseNode> {
        let mut next_phase = 0;
        build_phase(&self.phase, &mut next_phase)
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("═══════════════════════════════════════════════════════════════");
        println!("  Homogenization Simulation Configuration");
        println!("═══════════════════════════════════════════════════════════════");
        println!("Loading schedule:");
        for (b, block) in self.blocks.iter().enumerate() {
            println!(
                "  Block {}: {} ({} step(s), {} cycle(s))",
                b + 1,
                block.kind,
                block.steps.len(),
                block.ncycle
            );
            for (s, step) in block.steps.iter().enumerate() {
                println!(
                    "    Step {}: mode={}, control={}, ninc={}, time={}, T_end={}",
                    s + 1,
                    step.mode,
                    step.control,
                    step.ninc,
                    step.time,
                    step.temperature
                );
            }
        }

        println!("\nPhase tree:");
        print_phase(&self.phase, 1);

        println!("\nSolver:");
        println!(
            "  Increment fractions: init={}, mini={}, maxi={}",
            self.solver.dn_init, self.solver.dn_mini, self.solver.dn_maxi
        );
        println!(
            "  Self-consistent: tol={:.1e}, max_iter={}",
            self.solver.sc_tolerance, self.solver.sc_max_iterations
        );
        println!("═══════════════════════════════════════════════════════════════\n");
    }
}

fn build_phase(pc: &PhaseConfig, next_phase: &mut usize) -> Result<PhaseNode> {
    let phase = *next_phase;
    *next_phase += 1;

    let law = MaterialLaw::parse(&pc.law, phase)?;
    if law.is_leaf() && !pc.children.is_empty() {
        return Err(MicromechError::LawKindMismatch {
            name: pc.law.clone(),
            expected: "a homogenization node (it has children)",
            phase,
        });
    }
    if !law.is_leaf() && pc.children.is_empty() {
        return Err(MicromechError::LawKindMismatch {
            name: pc.law.clone(),
            expected: "a leaf phase (it has no children)",
            phase,
        });
    }

    let morphology = match pc.geometry.as_deref() {
        None | Some("sphere") => Morphology::sphere(),
        Some("layer") => Morphology::Layer,
        Some("ellipsoid") => {
            let [a1, a2, a3] = pc.aspect_ratios.ok_or_else(|| {
                MicromechError::Config(format!(
                    "phase {}: ellipsoid geometry needs `aspect_ratios`",
                    phase
                ))
            })?;
            Morphology::Ellipsoid { a1, a2, a3 }
        }
        Some(other) => {
            return Err(MicromechError::Config(format!(
                "phase {}: unknown geometry `{}`",
                phase, other
            )))
        }
    };
    let [psi, theta, phi] = pc.orientation;
    let shape = Shape::new(morphology, pc.concentration).with_orientation(psi, theta, phi);

    let mut material = Material::new(law, pc.props.clone());
    if let Some(nstatev) = pc.nstatev {
        material = material.with_nstatev(nstatev);
    }

    let mut node = PhaseNode::new(material, shape);
    for child in &pc.children {
        let child_phase = *next_phase;
        let child_node = build_phase(child, next_phase)?;
        node.add_child(child_node, child_phase)?;
    }
    Ok(node)
}

fn print_phase(pc: &PhaseConfig, depth: usize) {
    println!(
        "{}{} (c={}, geometry={})",
        "  ".repeat(depth),
        pc.law,
        pc.concentration,
        pc.geometry.as_deref().unwrap_or("sphere")
    );
    for child in &pc.children {
        print_phase(child, depth + 1);
    }
}
