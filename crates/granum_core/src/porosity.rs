//! Solid volume and porosity of sphere packings.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::scene::{Body, Scene};
use crate::types::Vec3;

/// Voxel grids coarser than this are rejected.
pub const MIN_VOXEL_RESOLUTION: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoxelSettings {
    /// Voxels per box edge.
    pub resolution: usize,
    /// Lower corner of the sampling box.
    pub start: Vec3,
    /// Upper corner of the sampling box.
    pub end: Vec3,
}

impl Default for VoxelSettings {
    fn default() -> Self {
        Self {
            resolution: 200,
            start: Vec3::zeros(),
            end: Vec3::repeat(1.0),
        }
    }
}

fn dynamic_spheres(scene: &Scene, mask: i64) -> impl Iterator<Item = (&Body, f64)> {
    scene.bodies.iter().filter_map(move |b| {
        if !b.is_dynamic() || !b.matches_mask(mask) {
            return None;
        }
        b.sphere_radius().map(|r| (b, r))
    })
}

/// Volume of dynamic spheres in the groups of `mask` (all if `mask <= 0`).
pub fn spheres_volume(scene: &Scene, mask: i64) -> f64 {
    dynamic_spheres(scene, mask)
        .map(|(_, r)| 4.0 / 3.0 * PI * r.powi(3))
        .sum()
}

/// Mass of dynamic spheres in the groups of `mask` (all if `mask <= 0`).
pub fn spheres_mass(scene: &Scene, mask: i64) -> f64 {
    dynamic_spheres(scene, mask)
        .map(|(b, _)| b.state.mass)
        .sum()
}

/// Void fraction `(V - Vs) / V` from the analytic sphere volume.
///
/// A periodic scene uses its cell volume and ignores `volume`; otherwise
/// `volume` must be given and positive.
pub fn porosity(scene: &Scene, volume: Option<f64>) -> Result<f64> {
    let total = match (&scene.cell, volume) {
        (Some(cell), _) => cell.volume(),
        (None, Some(v)) if v > 0.0 => v,
        (None, _) => {
            return Err(Error::InvalidArgument(
                "porosity of an aperiodic scene needs a positive volume".to_string(),
            ))
        }
    };
    Ok((total - spheres_volume(scene, 0)) / total)
}

/// Void fraction of the sampling box estimated on a voxel grid.
///
/// A voxel is solid when its center lies strictly inside a dynamic or
/// clumped sphere. Clumps themselves carry no shape and are skipped.
pub fn voxel_porosity(scene: &Scene, settings: VoxelSettings) -> Result<f64> {
    let VoxelSettings {
        resolution,
        start,
        end,
    } = settings;
    if start == end {
        return Err(Error::InvalidArgument(
            "cannot sample porosity when start == end of the volume box".to_string(),
        ));
    }
    let size = end - start;
    if size.iter().any(|s| !s.is_finite() || *s <= 0.0) {
        return Err(Error::InvalidArgument(format!(
            "volume box must extend in every direction from start to end, got size {size:?}"
        )));
    }
    if resolution < MIN_VOXEL_RESOLUTION {
        return Err(Error::InvalidArgument(format!(
            "voxel resolution {resolution} is below the minimum of {MIN_VOXEL_RESOLUTION}"
        )));
    }

    let s = resolution;
    let cells = s
        .checked_mul(s)
        .and_then(|n| n.checked_mul(s))
        .ok_or_else(|| {
            Error::InvalidArgument(format!("voxel resolution {resolution} is too large"))
        })?;
    let mut grid = vec![false; cells];
    let voxel = size / s as f64;

    for body in scene
        .bodies
        .iter()
        .filter(|b| !b.is_clump() && (b.is_dynamic() || b.is_clump_member()))
    {
        let Some(radius) = body.sphere_radius() else {
            continue;
        };
        let pos = body.state.pos;
        let rr = radius * radius;
        let ranges: Vec<(usize, usize)> = (0..3)
            .map(|axis| voxel_range(pos[axis] - start[axis], radius, size[axis], s))
            .collect();
        let ((i0, i1), (j0, j1), (k0, k1)) = (ranges[0], ranges[1], ranges[2]);
        for i in i0..i1 {
            for j in j0..j1 {
                for k in k0..k1 {
                    let center = start
                        + Vec3::new(
                            (i as f64 + 0.5) * voxel.x,
                            (j as f64 + 0.5) * voxel.y,
                            (k as f64 + 0.5) * voxel.z,
                        );
                    if (pos - center).norm_squared() < rr {
                        grid[(i * s + j) * s + k] = true;
                    }
                }
            }
        }
    }

    let total = grid.len();
    let solid = grid.iter().filter(|v| **v).count();
    debug!(resolution, solid, total, "voxel porosity sampled");
    Ok((total - solid) as f64 / total as f64)
}

/// Voxel index range covering `[offset - radius, offset + radius]` along one
/// axis, padded by one voxel on each side.
fn voxel_range(offset: f64, radius: f64, size: f64, s: usize) -> (usize, usize) {
    let scale = s as f64 / size;
    let lo = (((offset - radius) * scale).floor() as i64 - 1).max(0);
    let hi = (lo + (2.0 * radius * scale).floor() as i64 + 3).min(s as i64);
    (lo as usize, hi.max(lo) as usize)
}
