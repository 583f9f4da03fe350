use std::fmt::Debug;

use crate::scene::{Body, Cell, ContactGeom, ContactPhys, Material};
use crate::types::Vec3;

/// An engine registered with the scene (integrator, collider, dispatcher...).
///
/// Analysis routines never downcast drivers. They ask for a capability and
/// take the first driver that provides it.
pub trait Driver: Debug {
    /// Human-readable name, used in log messages.
    fn name(&self) -> &str;

    /// Gravitational acceleration applied by this driver, if any.
    fn gravity(&self) -> Option<Vec3> {
        None
    }

    /// Access to the contact-detection state owned by this driver.
    fn as_collider_mut(&mut self) -> Option<&mut dyn Collider> {
        None
    }

    /// Geometry deriver usable outside normal detection.
    fn geometry_deriver(&self) -> Option<&dyn GeometryDeriver> {
        None
    }

    /// Physics deriver usable outside normal detection.
    fn physics_deriver(&self) -> Option<&dyn PhysicsDeriver> {
        None
    }
}

/// Contact detection with persistent acceleration structures.
pub trait Collider {
    /// Drops cached state so the next detection pass rebuilds from scratch.
    fn invalidate_persistent_data(&mut self);
}

/// Builds contact geometry for an explicitly named pair of bodies.
pub trait GeometryDeriver {
    /// Returns `Ok(None)` when the bodies do not touch and `force` is false.
    /// With `force` set, geometry must be produced even without overlap.
    fn derive_geometry(
        &self,
        b1: &Body,
        b2: &Body,
        cell: Option<&Cell>,
        force: bool,
    ) -> anyhow::Result<Option<ContactGeom>>;
}

/// Builds contact physics from the two materials and the derived geometry.
pub trait PhysicsDeriver {
    fn derive_physics(
        &self,
        m1: Option<&Material>,
        m2: Option<&Material>,
        geom: &ContactGeom,
    ) -> anyhow::Result<ContactPhys>;
}
