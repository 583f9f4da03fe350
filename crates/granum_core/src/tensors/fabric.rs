use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{accumulate_upper, mirror_upper, require_cell};
use crate::error::{Error, Result};
use crate::scene::Scene;
use crate::types::{Mat3, Vec3};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FabricOptions {
    /// Count compressive normal forces as positive.
    pub revert_sign: bool,
    /// Force separating the strong and weak networks; the mean force if unset.
    pub threshold: Option<f64>,
}

/// Satake fabric tensor together with the mean signed normal force.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fabric {
    pub tensor: Mat3,
    pub mean_force: f64,
    pub contacts: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FabricSplit {
    /// Fabric of contacts carrying more than `split_force`.
    pub strong: Mat3,
    pub weak: Mat3,
    /// `q * strong + (1 - q) * weak`, equal to the unsplit fabric.
    pub combined: Mat3,
    /// Fraction `q` of contacts in the strong network.
    pub strong_fraction: f64,
    pub split_force: f64,
}

/// Unit normal and signed normal force of every real contact.
pub(super) fn contact_normals(
    scene: &Scene,
    revert_sign: bool,
    operation: &'static str,
) -> Result<Vec<(Vec3, f64)>> {
    require_cell(scene, operation)?;
    let sign = if revert_sign { -1.0 } else { 1.0 };
    Ok(scene
        .contacts
        .iter_real()
        .filter_map(|c| c.parts())
        .map(|(geom, phys)| {
            let n = geom.normal();
            (n, sign * phys.norm_shear().normal_force.dot(&n))
        })
        .collect())
}

/// Whether a signed force belongs to the strong network.
///
/// Forces are compared with their sign, so the comparison flips with the
/// sign convention.
pub(super) fn is_strong(force: f64, split_force: f64, revert_sign: bool) -> bool {
    if revert_sign {
        force < split_force
    } else {
        force > split_force
    }
}

fn fabric_from(normals: &[(Vec3, f64)], operation: &str) -> Result<Fabric> {
    if normals.is_empty() {
        return Err(Error::Domain(format!("{operation} needs at least one real contact")));
    }
    let mut tensor = Mat3::zeros();
    let mut force_sum = 0.0;
    for (n, f) in normals {
        accumulate_upper(&mut tensor, n, n, 1.0);
        force_sum += f;
    }
    mirror_upper(&mut tensor);
    let count = normals.len() as f64;
    Ok(Fabric {
        tensor: tensor / count,
        mean_force: force_sum / count,
        contacts: normals.len(),
    })
}

/// Fabric tensor of the real contacts in a periodic scene.
pub fn fabric_tensor(scene: &Scene, options: FabricOptions) -> Result<Fabric> {
    if let Some(threshold) = options.threshold {
        warn!(
            threshold,
            "force threshold given without splitting the fabric tensor; it is ignored"
        );
    }
    let normals = contact_normals(scene, options.revert_sign, "fabric tensor")?;
    fabric_from(&normals, "fabric tensor")
}

/// Fabric tensors of the strong and weak force networks.
///
/// An empty network yields a zero tensor.
pub fn fabric_tensor_split(scene: &Scene, options: FabricOptions) -> Result<FabricSplit> {
    let normals = contact_normals(scene, options.revert_sign, "fabric tensor")?;
    let fabric = fabric_from(&normals, "fabric tensor")?;
    let split_force = options.threshold.unwrap_or(fabric.mean_force);

    let mut strong = Mat3::zeros();
    let mut weak = Mat3::zeros();
    let mut n_strong = 0usize;
    for (n, f) in &normals {
        if is_strong(*f, split_force, options.revert_sign) {
            accumulate_upper(&mut strong, n, n, 1.0);
            n_strong += 1;
        } else {
            accumulate_upper(&mut weak, n, n, 1.0);
        }
    }
    mirror_upper(&mut strong);
    mirror_upper(&mut weak);
    let n_weak = normals.len() - n_strong;
    if n_strong > 0 {
        strong /= n_strong as f64;
    }
    if n_weak > 0 {
        weak /= n_weak as f64;
    }

    let q = n_strong as f64 / normals.len() as f64;
    Ok(FabricSplit {
        strong,
        weak,
        combined: strong * q + weak * (1.0 - q),
        strong_fraction: q,
        split_force,
    })
}
