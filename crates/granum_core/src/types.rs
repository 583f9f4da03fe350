//! Numeric aliases shared across the crate.

use nalgebra::{Matrix3, UnitQuaternion, Vector3};

pub type Vec3 = Vector3<f64>;
pub type Vec3i = Vector3<i32>;
pub type Mat3 = Matrix3<f64>;
pub type Quat = UnitQuaternion<f64>;

/// Stable body identifier; also the body's index in the container.
pub type BodyId = usize;

/// Magnitudes at or below this are treated as zero.
pub const ZERO_TOLERANCE: f64 = 1e-20;
