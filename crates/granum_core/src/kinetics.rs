//! Global kinetic aggregates over the body collection.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::scene::{Body, Cell, Scene};
use crate::types::{BodyId, Mat3, Vec3};

/// Total linear momentum. Every body counts, static and clumped ones included.
pub fn momentum(scene: &Scene) -> Vec3 {
    scene
        .bodies
        .iter()
        .fold(Vec3::zeros(), |acc, b| acc + b.state.vel * b.state.mass)
}

/// Angular momentum about `about`, including each body's own spin.
pub fn angular_momentum(scene: &Scene, about: &Vec3) -> Vec3 {
    scene.bodies.iter().fold(Vec3::zeros(), |acc, b| {
        acc + (b.state.pos - about).cross(&(b.state.vel * b.state.mass)) + b.state.ang_mom
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KineticEnergy {
    pub total: f64,
    /// Body carrying the largest single-body energy; `None` when no dynamic
    /// body moves.
    pub max_body: Option<BodyId>,
}

/// Kinetic energy of dynamic bodies.
///
/// In a periodic scene only the fluctuation velocity counts, i.e. the
/// velocity left after removing the homogeneous field of the cell.
pub fn kinetic_energy(scene: &Scene) -> f64 {
    kinetic_energy_with_max(scene).total
}

pub fn kinetic_energy_with_max(scene: &Scene) -> KineticEnergy {
    let cell = scene.cell.as_ref();
    let mut total = 0.0;
    let mut max_energy = 0.0;
    let mut max_body = None;
    for body in scene.bodies.iter().filter(|b| b.is_dynamic()) {
        let e = body_kinetic_energy(body, cell);
        total += e;
        if e > max_energy {
            max_energy = e;
            max_body = Some(body.id);
        }
    }
    KineticEnergy { total, max_body }
}

fn body_kinetic_energy(body: &Body, cell: Option<&Cell>) -> f64 {
    let state = &body.state;
    let vel = match cell {
        Some(cell) => cell.fluctuation_vel(&state.pos, &state.vel),
        None => state.vel,
    };
    let translational = 0.5 * state.mass * vel.norm_squared();
    let rotational = if body.aspherical {
        let rot = state.ori.to_rotation_matrix();
        let world = rot.matrix() * Mat3::from_diagonal(&state.inertia) * rot.matrix().transpose();
        0.5 * state.ang_vel.dot(&(world * state.ang_vel))
    } else {
        0.5 * state.ang_vel.dot(&state.inertia.component_mul(&state.ang_vel))
    };
    translational + rotational
}

/// Ratio of the residual body force to the mean contact force.
///
/// Staged forces are synced first. The residual of a body is
/// `|F + m * g|`, gravity taken from the first driver that has one. With
/// `use_max` the largest residual is used, otherwise the mean. Fails when
/// there is no real contact to normalise by, or when real contacts carry
/// no force at all.
pub fn unbalanced_force(scene: &mut Scene, use_max: bool) -> Result<f64> {
    scene.forces.sync();
    let scene = &*scene;
    let gravity = scene.gravity().unwrap_or_else(Vec3::zeros);

    let mut max_force = 0.0f64;
    let mut sum_force = 0.0;
    let mut counted = 0usize;
    for body in scene
        .bodies
        .iter()
        .filter(|b| b.is_dynamic() && !b.is_clump_member())
    {
        let mut force = scene.forces.force(body.id);
        if body.is_clump() && force.norm_squared() == 0.0 {
            // Clump totals may not be aggregated yet; rebuild from members.
            let mut torque = Vec3::zeros();
            scene.add_force_torque_from_members(body, &mut force, &mut torque);
        }
        let residual = (force + gravity * body.state.mass).norm();
        max_force = max_force.max(residual);
        sum_force += residual;
        counted += 1;
    }
    let mean_force = if counted > 0 {
        sum_force / counted as f64
    } else {
        0.0
    };

    let (sum_contact, contacts) = scene
        .contacts
        .iter_real()
        .filter_map(|c| c.phys.as_ref())
        .fold((0.0, 0usize), |(sum, n), phys| {
            (sum + phys.total_force().norm(), n + 1)
        });
    if contacts == 0 {
        return Err(Error::Domain(
            "unbalanced force needs at least one real contact".to_string(),
        ));
    }
    let mean_contact = sum_contact / contacts as f64;
    if !mean_contact.is_finite() || mean_contact <= 0.0 {
        return Err(Error::Domain(format!(
            "unbalanced force is undefined for a mean contact force of {mean_contact}"
        )));
    }
    debug!(max_force, mean_force, mean_contact, contacts, "unbalanced force");

    let body_force = if use_max { max_force } else { mean_force };
    Ok(body_force / mean_contact)
}
