//! Stress and fabric tensors accumulated over real contacts.
//!
//! Branch vectors follow the contact orientation `pos1 - pos2`, corrected
//! by the periodic image shift when the scene has a cell. Symmetric
//! tensors are accumulated on the upper triangle and mirrored once at the
//! end.

mod decomposition;
mod fabric;
mod stress;

pub use decomposition::{normal_shear_stress_tensors, StressDecomposition, StressSplitOptions};
pub use fabric::{fabric_tensor, fabric_tensor_split, Fabric, FabricOptions, FabricSplit};
pub use stress::{
    body_normal_shear_stresses, body_stresses_lw, capillary_stress_tensor, stress_tensor,
    BodyStress,
};

use crate::error::{Error, Result};
use crate::scene::{Cell, Contact, Scene};
use crate::types::{Mat3, Vec3};

/// `acc(i, j) += weight * a[i] * b[j]` for `j >= i`.
fn accumulate_upper(acc: &mut Mat3, a: &Vec3, b: &Vec3, weight: f64) {
    for i in 0..3 {
        for j in i..3 {
            acc[(i, j)] += weight * a[i] * b[j];
        }
    }
}

/// Copies the upper triangle onto the lower one.
fn mirror_upper(m: &mut Mat3) {
    m[(1, 0)] = m[(0, 1)];
    m[(2, 0)] = m[(0, 2)];
    m[(2, 1)] = m[(1, 2)];
}

fn require_cell<'a>(scene: &'a Scene, operation: &'static str) -> Result<&'a Cell> {
    scene.cell.as_ref().ok_or(Error::NotPeriodic(operation))
}

/// Volume to normalise by: the caller's, else the cell's, else 1.
fn normalising_volume(scene: &Scene, volume: Option<f64>) -> Result<f64> {
    match volume {
        Some(v) if !v.is_finite() || v <= 0.0 => Err(Error::InvalidArgument(format!(
            "volume must be finite and positive, got {v}"
        ))),
        Some(v) => Ok(v),
        None => Ok(scene.cell.as_ref().map_or(1.0, Cell::volume)),
    }
}

/// `pos1 - pos2`, minus the image shift of body 2 in a periodic scene.
fn branch_vector(scene: &Scene, contact: &Contact) -> Result<Vec3> {
    let pos1 = scene.bodies.require(contact.id1())?.state.pos;
    let pos2 = scene.bodies.require(contact.id2())?.state.pos;
    let mut branch = pos1 - pos2;
    if let Some(cell) = &scene.cell {
        branch -= cell.shift(&contact.cell_dist);
    }
    Ok(branch)
}
