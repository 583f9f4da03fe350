//! In-place adjustments of a running scene.

use std::collections::HashMap;

use tracing::debug;

use crate::scene::{aggregate_mass_properties, Scene, Shape};
use crate::types::{BodyId, Vec3};

/// Stops every dynamic sphere and clump in the groups of `mask`.
pub fn calm(scene: &mut Scene, mask: i64) {
    for body in scene
        .bodies
        .iter_mut()
        .filter(|b| b.is_dynamic() && b.matches_mask(mask))
    {
        if body.sphere_radius().is_some() || body.is_clump() {
            body.state.vel = Vec3::zeros();
            body.state.ang_vel = Vec3::zeros();
            body.state.ang_mom = Vec3::zeros();
        }
    }
}

/// Scales sphere radii by `multiplier`.
///
/// With `update_mass`, mass grows as `multiplier³` and inertia as
/// `multiplier⁵`. Clump members move away from their clump's center so the
/// clump grows homothetically, and clump mass properties are rebuilt from
/// the members. Real contacts get the new reference radii and stiffnesses
/// scaled by `multiplier`. With `dynamic_only`, static bodies keep their size.
pub fn grow_particles(scene: &mut Scene, multiplier: f64, update_mass: bool, dynamic_only: bool) {
    let clump_centers: HashMap<BodyId, Vec3> = scene
        .bodies
        .iter()
        .filter(|b| b.is_clump())
        .map(|b| (b.id, b.state.pos))
        .collect();

    let mut grown = 0usize;
    for body in scene.bodies.iter_mut() {
        if dynamic_only && !body.is_dynamic() {
            continue;
        }
        let Shape::Sphere { radius } = &mut body.shape else {
            continue;
        };
        *radius *= multiplier;
        if update_mass {
            body.state.mass *= multiplier.powi(3);
            body.state.inertia *= multiplier.powi(5);
        }
        if let Some(center) = body.clump_id.and_then(|id| clump_centers.get(&id)) {
            body.state.pos += (body.state.pos - center) * (multiplier - 1.0);
        }
        grown += 1;
    }

    refresh_clumps(scene);

    for contact in scene.contacts.iter_mut() {
        let (id1, id2) = (contact.id1(), contact.id2());
        let (Some(b1), Some(b2)) = (scene.bodies.get(id1), scene.bodies.get(id2)) else {
            continue;
        };
        if b1.shape.is_grid_element() || !contact.is_real() {
            continue;
        }
        let r1 = b1
            .sphere_radius()
            .filter(|_| !dynamic_only || b1.is_dynamic());
        let r2 = b2
            .sphere_radius()
            .filter(|_| !dynamic_only || b2.is_dynamic());
        if let Some(geom) = contact.geom.as_mut() {
            geom.set_ref_radii(r1, r2);
        }
        if let Some(phys) = contact.phys.as_mut() {
            let p = phys.norm_shear_mut();
            p.kn *= multiplier;
            p.ks *= multiplier;
        }
    }
    debug!(multiplier, grown, "particles grown");
}

/// Recomputes mass, centroid and principal inertia of every clump.
fn refresh_clumps(scene: &mut Scene) {
    let updates: Vec<_> = scene
        .bodies
        .iter()
        .filter_map(|b| match &b.shape {
            Shape::Clump { members } => {
                let props = aggregate_mass_properties(
                    members.iter().filter_map(|&id| scene.bodies.get(id)),
                )?;
                Some((b.id, props))
            }
            _ => None,
        })
        .collect();
    for (id, props) in updates {
        if let Some(clump) = scene.bodies.get_mut(id) {
            clump.state.mass = props.mass;
            clump.state.pos = props.centroid;
            clump.state.inertia = props.inertia;
            clump.state.ori = props.ori;
        }
    }
}

/// Sets the friction angle of dynamic bodies and of real contacts.
///
/// Materials of dynamic non-clump bodies get `angle`. Each real frictional
/// contact then takes `tan` of the smaller friction angle of its two
/// materials; contacts with a body lacking an elastic material are left as
/// they are.
pub fn set_contact_friction(scene: &mut Scene, angle: f64) {
    for body in scene
        .bodies
        .iter_mut()
        .filter(|b| !b.is_clump() && b.is_dynamic())
    {
        if let Some(mat) = body.material.as_mut().and_then(|m| m.elastic_mut()) {
            mat.friction_angle = angle;
        }
    }

    let friction_of = |id: BodyId| {
        scene
            .bodies
            .get(id)
            .and_then(|b| b.material.as_ref())
            .and_then(|m| m.elastic())
            .map(|m| m.friction_angle)
    };
    let updates: Vec<_> = scene
        .contacts
        .iter_real()
        .filter_map(|c| {
            let fa = friction_of(c.id1())?;
            let fb = friction_of(c.id2())?;
            Some((c.id1(), c.id2(), fa.min(fb).tan()))
        })
        .collect();
    for (id1, id2, tan) in updates {
        let phys = scene
            .contacts
            .find_mut(id1, id2)
            .and_then(|c| c.phys.as_mut())
            .and_then(|p| p.frictional_mut());
        if let Some(phys) = phys {
            phys.tan_friction_angle = tan;
        }
    }
}
