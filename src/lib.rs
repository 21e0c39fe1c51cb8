pub mod config;
pub mod constitutive;
pub mod error;
pub mod homogenization;
pub mod math;
pub mod phase;
pub mod solver;

pub use config::SimulationConfig;
pub use constitutive::{ConstitutiveUpdate, EnergyBalance, UmatContext, UmatResult};
pub use error::{MicromechError, Result};
pub use homogenization::{ChildPhase, ClosedFormEshelby, EshelbyProvider, Scheme, SchemeResult, SelfConsistentSettings};
pub use phase::{HomogenizeContext, Material, MaterialLaw, Matrix6, Morphology, PhaseNode, Shape, StateSnapshot, Vector6};
pub use solver::{Block, BlockKind, ControlType, IncrementController, LoadMode, LoadingSchedule, OutputRequest, SolveSummary, StatevSelection, Step, StepKind, ThermalControl};
