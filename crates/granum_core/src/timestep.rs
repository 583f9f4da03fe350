//! Critical time steps from elastic wave speeds.
//!
//! Only spheres with an elastic material take part; everything else is
//! skipped silently.

use std::f64::consts::PI;

use tracing::warn;

use crate::scene::{FrictMat, Scene};

/// Returned by [`p_wave_time_step`] when no body qualifies.
pub const P_WAVE_FALLBACK_DT: f64 = 1.0;

/// Elastic spheres as `(radius, density, material)`, density taken from the
/// stored mass and the sphere volume.
fn elastic_spheres(scene: &Scene) -> impl Iterator<Item = (f64, f64, &FrictMat)> {
    scene.bodies.iter().filter_map(|b| {
        let radius = b.sphere_radius()?;
        let mat = b.material.as_ref()?.elastic()?;
        let density = b.state.mass / (4.0 / 3.0 * PI * radius.powi(3));
        Some((radius, density, mat))
    })
}

/// Smallest `r / sqrt(E / ρ)` over elastic spheres.
///
/// Falls back to [`P_WAVE_FALLBACK_DT`] with a warning when the scene has
/// no elastic sphere.
pub fn p_wave_time_step(scene: &Scene) -> f64 {
    let dt = elastic_spheres(scene)
        .map(|(radius, density, mat)| radius / (mat.young / density).sqrt())
        .fold(f64::INFINITY, f64::min);
    if dt.is_infinite() {
        warn!(
            fallback = P_WAVE_FALLBACK_DT,
            "no elastic spherical body found; p-wave time step falls back to a fixed value"
        );
        return P_WAVE_FALLBACK_DT;
    }
    dt
}

/// Smallest Rayleigh-wave step `π r / λ * sqrt(ρ / G)` over elastic spheres.
///
/// Returns `f64::INFINITY` when the scene has no elastic sphere; callers
/// should test for it.
pub fn rayleigh_wave_time_step(scene: &Scene) -> f64 {
    elastic_spheres(scene)
        .map(|(radius, density, mat)| {
            let shear_modulus = mat.young / (2.0 * (1.0 + mat.poisson));
            let lambda = 0.1631 * mat.poisson + 0.876605;
            PI * radius / lambda * (density / shear_modulus).sqrt()
        })
        .fold(f64::INFINITY, f64::min)
}
