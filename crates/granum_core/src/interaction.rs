//! Helpers around individual contacts and the forces they transmit.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::scene::{Contact, ForceContainer, Scene};
use crate::types::{BodyId, Vec3};

/// Applies `force` at `contact_point` to body `id1` and its reaction to `id2`.
pub fn apply_force_at_contact_point(
    forces: &mut ForceContainer,
    force: Vec3,
    contact_point: Vec3,
    (id1, pos1): (BodyId, Vec3),
    (id2, pos2): (BodyId, Vec3),
) {
    forces.add_force(id1, force);
    forces.add_force(id2, -force);
    forces.add_torque(id1, (contact_point - pos1).cross(&force));
    forces.add_torque(id2, -(contact_point - pos2).cross(&force));
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForceSummary {
    /// Component-wise sum of `|Fn + Fs|` over real contacts.
    pub total: Vec3,
    /// Mean of `kn / 3 + 2 ks / 3`; `None` without real contacts.
    pub avg_iso_stiffness: Option<f64>,
}

/// Sum of contact force magnitudes per axis and mean isotropic stiffness.
///
/// In a periodic cell, dividing `total` by the cell face areas gives the
/// average stress along each axis.
pub fn total_force_in_volume(scene: &Scene) -> ForceSummary {
    let mut total = Vec3::zeros();
    let mut stiffness = 0.0;
    let mut count = 0usize;
    for phys in scene.contacts.iter_real().filter_map(|c| c.phys.as_ref()) {
        total += phys.total_force().abs();
        let p = phys.norm_shear();
        stiffness += p.kn / 3.0 + 2.0 * p.ks / 3.0;
        count += 1;
    }
    ForceSummary {
        total,
        avg_iso_stiffness: (count > 0).then(|| stiffness / count as f64),
    }
}

/// Ids of the bodies sharing a contact with `id`, real or potential.
pub fn body_contact_ids(scene: &Scene, id: BodyId) -> Result<Vec<BodyId>> {
    scene.bodies.require(id)?;
    Ok(scene
        .contacts
        .involving(id)
        .map(|c| if c.id1() == id { c.id2() } else { c.id1() })
        .collect())
}

/// Creates a real contact between two named bodies outside detection.
///
/// Geometry and physics come from the first drivers exposing a deriver.
/// With `force` unset, returns `Ok(None)` when the geometry deriver finds
/// the bodies apart.
pub fn create_explicit_contact(
    scene: &mut Scene,
    id1: BodyId,
    id2: BodyId,
    force: bool,
) -> Result<Option<&Contact>> {
    if scene.contacts.find(id1, id2).is_some() {
        return Err(Error::InvalidArgument(format!(
            "contact #{id1}+#{id2} already exists"
        )));
    }
    let geometry = scene
        .drivers
        .iter()
        .find_map(|d| d.geometry_deriver())
        .ok_or_else(|| Error::MissingCapability("no geometry deriver registered".to_string()))?;
    let physics = scene
        .drivers
        .iter()
        .find_map(|d| d.physics_deriver())
        .ok_or_else(|| Error::MissingCapability("no physics deriver registered".to_string()))?;
    let b1 = scene.bodies.require(id1)?;
    let b2 = scene.bodies.require(id2)?;

    let Some(geom) = geometry.derive_geometry(b1, b2, scene.cell.as_ref(), force)? else {
        debug!(id1, id2, "bodies apart; no explicit contact created");
        return Ok(None);
    };
    let phys = physics.derive_physics(b1.material.as_ref(), b2.material.as_ref(), &geom)?;

    let mut contact = Contact::real(id1, id2, geom, phys);
    contact.iter_made_real = Some(scene.iter);
    scene.contacts.insert(contact)?;
    Ok(scene.contacts.find(id1, id2))
}
