//! Incremental loading: schedule, step generation, adaptive controller, and
//! the result stream.

pub mod controller;
pub mod output;
pub mod schedule;
pub mod step;

pub use controller::{IncrementController, SolveSummary};
pub use output::{OutputRequest, StatevSelection};
pub use schedule::{Block, BlockKind, LoadingSchedule};
pub use step::{ControlType, LoadMode, Step, StepKind, ThermalControl};
