//! Phase tree: state snapshots, material descriptors, geometry, and the
//! homogenization recursion over the tree.

pub mod geometry;
pub mod material;
pub mod node;
pub mod state;

pub use geometry::{Morphology, Shape};
pub use material::{Material, MaterialLaw};
pub use node::{HomogenizeContext, PhaseNode};
pub use state::{Matrix6, StateSnapshot, Vector6};
