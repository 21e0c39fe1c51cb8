//! Loading schedule: ordered blocks of repeated steps
//!
//! A block groups steps that share a loading kind and repeats them for a
//! cycle count. The schedule is the ordered block list the controller walks.

use crate::error::{MicromechError, Result};

use super::step::{Step, StepKind};

/// Loading kind shared by every step of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Mechanical,
    ThermoMechanical,
}

impl BlockKind {
    /// Parse the block-kind tag from configuration.
    pub fn parse(name: &str, block: usize) -> Result<Self> {
        match name {
            "mechanical" => Ok(Self::Mechanical),
            "thermomechanical" => Ok(Self::ThermoMechanical),
            _ => Err(MicromechError::UnsupportedBlockKind {
                block,
                kind: name.to_string(),
            }),
        }
    }

    /// The step flavor this block kind produces.
    pub fn step_kind(&self) -> StepKind {
        match self {
            Self::Mechanical => StepKind::Mechanical,
            Self::ThermoMechanical => StepKind::ThermoMechanical,
        }
    }
}

/// One block of the loading history.
#[derive(Debug, Clone)]
pub struct Block {
    pub number: usize,
    pub ncycle: usize,
    pub kind: BlockKind,
    pub steps: Vec<Step>,
}

impl Block {
    /// # Panics
    /// Panics on an empty step list or a zero cycle count.
    pub fn new(number: usize, ncycle: usize, kind: BlockKind, steps: Vec<Step>) -> Self {
        assert!(!steps.is_empty(), "a block needs at least one step");
        assert!(ncycle > 0, "a block needs at least one cycle");
        Self {
            number,
            ncycle,
            kind,
            steps,
        }
    }

    pub fn nstep(&self) -> usize {
        self.steps.len()
    }
}

/// The full loading history.
#[derive(Debug, Clone, Default)]
pub struct LoadingSchedule {
    pub blocks: Vec<Block>,
}

impl LoadingSchedule {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    /// Total number of steps over all blocks and cycles.
    pub fn total_steps(&self) -> usize {
        self.blocks.iter().map(|b| b.ncycle * b.nstep()).sum()
    }
}
