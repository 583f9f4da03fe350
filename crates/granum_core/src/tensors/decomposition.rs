//! Thornton split of the stress tensor into normal and shear parts.

use serde::{Deserialize, Serialize};

use super::fabric::{fabric_tensor, is_strong, FabricOptions};
use super::{accumulate_upper, mirror_upper, require_cell};
use crate::error::Result;
use crate::scene::Scene;
use crate::types::Mat3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StressSplitOptions {
    /// Count compression as positive stress.
    pub compression_positive: bool,
    /// Return the strong/weak parts of the normal tensor instead of (normal, shear).
    pub split_normal: bool,
    /// Force separating strong and weak contacts; the mean force if unset.
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StressDecomposition {
    NormalShear { normal: Mat3, shear: Mat3 },
    StrongWeak { strong: Mat3, weak: Mat3 },
}

/// Normal and shear contributions to the stress of a periodic packing.
///
/// Each real contact adds `R N n⊗n` to the normal part and `R T n⊗t` to the
/// shear part, with `R` the mean reference radius, `N` the signed normal
/// force, `T` and `t` the magnitude and direction of the shear force. Both
/// are scaled by `2 / V` and symmetrised from the upper triangle.
pub fn normal_shear_stress_tensors(
    scene: &Scene,
    options: StressSplitOptions,
) -> Result<StressDecomposition> {
    let volume = require_cell(scene, "normal/shear stress decomposition")?.volume();
    let sign = if options.compression_positive {
        -1.0
    } else {
        1.0
    };

    let mut normal = Mat3::zeros();
    let mut shear = Mat3::zeros();
    let mut terms = Vec::new();
    for (geom, phys) in scene.contacts.iter_real().filter_map(|c| c.parts()) {
        let n = geom.normal();
        let forces = phys.norm_shear();
        let fs = forces.shear_force * sign;
        let fn_signed = sign * forces.normal_force.dot(&n);
        let (r1, r2) = geom.ref_radii();
        let radius = 0.5 * (r1 + r2);

        accumulate_upper(&mut normal, &n, &n, radius * fn_signed);
        let magnitude = fs.norm();
        if magnitude > 0.0 {
            accumulate_upper(&mut shear, &n, &(fs / magnitude), radius * magnitude);
        }
        terms.push((n, fn_signed, radius));
    }

    if !options.split_normal {
        mirror_upper(&mut normal);
        mirror_upper(&mut shear);
        let scale = 2.0 / volume;
        return Ok(StressDecomposition::NormalShear {
            normal: normal * scale,
            shear: shear * scale,
        });
    }

    let split_force = match options.threshold {
        Some(threshold) => threshold,
        None => {
            let fabric_options = FabricOptions {
                revert_sign: options.compression_positive,
                threshold: None,
            };
            fabric_tensor(scene, fabric_options)?.mean_force
        }
    };

    let mut strong = Mat3::zeros();
    let mut weak = Mat3::zeros();
    for (n, fn_signed, radius) in &terms {
        let target = if is_strong(*fn_signed, split_force, options.compression_positive) {
            &mut strong
        } else {
            &mut weak
        };
        accumulate_upper(target, n, n, radius * fn_signed);
    }
    mirror_upper(&mut strong);
    mirror_upper(&mut weak);
    let scale = 2.0 / volume;
    Ok(StressDecomposition::StrongWeak {
        strong: strong * scale,
        weak: weak * scale,
    })
}
