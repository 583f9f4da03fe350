//! Default materials and body constructors.

use std::f64::consts::PI;

use crate::error::{Error, Result};
use crate::scene::{Body, FrictMat, Material, Shape, State, ViscElMat};
use crate::types::{Vec3, ZERO_TOLERANCE};

/// Frictional material with granite-like constants and a 30° friction angle.
pub fn default_granular_mat() -> FrictMat {
    FrictMat {
        density: 2e3,
        young: 30e9,
        poisson: 0.3,
        friction_angle: 0.5236,
    }
}

/// Solid sphere; mass and isotropic inertia follow from the material density.
pub fn sphere(center: Vec3, radius: f64, material: Option<Material>) -> Body {
    let material = material.unwrap_or(Material::Frictional(default_granular_mat()));
    let mass = 4.0 / 3.0 * PI * radius.powi(3) * material.density();
    let mut body = Body::new(
        Shape::Sphere { radius },
        State {
            pos: center,
            mass,
            inertia: Vec3::repeat(2.0 / 5.0 * mass * radius * radius),
            ..State::default()
        },
    );
    body.material = Some(material);
    body
}

/// Solid box of half-sizes `extents`.
pub fn box_body(center: Vec3, extents: Vec3, material: Option<Material>) -> Body {
    let material = material.unwrap_or(Material::Frictional(default_granular_mat()));
    let mass = 8.0 * extents.x * extents.y * extents.z * material.density();
    let sq = extents.component_mul(&extents) * 4.0;
    let mut body = Body::new(
        Shape::Box { extents },
        State {
            pos: center,
            mass,
            inertia: Vec3::new(sq.y + sq.z, sq.x + sq.z, sq.x + sq.y) * (mass / 12.0),
            ..State::default()
        },
    );
    body.material = Some(material);
    body
}

/// Viscoelastic material whose sphere-sphere collisions last `tc` with
/// normal and tangential restitution coefficients `en` and `es`.
///
/// Stiffnesses and damping are per unit mass. Damping below
/// [`ZERO_TOLERANCE`] is set to exactly zero.
pub fn viscoelastic_from_spheres_interaction(
    tc: f64,
    en: f64,
    es: f64,
    frict: FrictMat,
) -> Result<ViscElMat> {
    if !tc.is_finite() || tc <= 0.0 {
        return Err(Error::InvalidArgument(format!(
            "collision time must be positive, got {tc}"
        )));
    }
    for (name, value) in [("en", en), ("es", es)] {
        if value.is_nan() || value <= 0.0 || value > 1.0 {
            return Err(Error::InvalidArgument(format!(
                "restitution coefficient {name} must lie in (0, 1], got {value}"
            )));
        }
    }
    let (ln_en, ln_es) = (en.ln(), es.ln());
    let zero_small = |x: f64| if x.abs() <= ZERO_TOLERANCE { 0.0 } else { x };
    Ok(ViscElMat {
        frict,
        kn: (PI * PI + ln_en * ln_en) / (tc * tc),
        cn: zero_small(-2.0 * ln_en / tc),
        ks: 2.0 / 7.0 * (PI * PI + ln_es * ln_es) / (tc * tc),
        cs: zero_small(-2.0 / 7.0 * ln_es / tc),
    })
}
