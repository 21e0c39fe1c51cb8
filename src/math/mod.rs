pub mod rotation;

pub use rotation::{
    rotate_matrix, rotate_strain, rotate_stress, rotation_matrix, Axis, ANGLE_EPS,
};
