//! Simulation state consumed by the analysis routines.
//!
//! The scene is owned by the caller and passed explicitly into every
//! operation. Analysis reads it; only the cell flip and the maintenance
//! helpers write to it.

mod body;
mod cell;
mod contact;
mod forces;

pub use body::{
    aggregate_mass_properties, Body, FrictMat, MassProperties, Material, Shape, State, ViscElMat,
};
pub use cell::{Cell, CellFrame};
pub use contact::{
    CapillaryPhys, Contact, ContactContainer, ContactGeom, ContactPhys, Dem3DofGeom, FrictPhys,
    NormShearPhys, ScGeom,
};
pub use forces::ForceContainer;

use crate::error::{Error, Result};
use crate::traits::Driver;
use crate::types::{BodyId, Vec3};

/// Bodies indexed by id. Erased bodies leave a hole so ids stay stable.
#[derive(Debug, Clone, Default)]
pub struct BodyContainer {
    slots: Vec<Option<Body>>,
}

impl BodyContainer {
    /// Stores `body` under the next free id, which is written back into it.
    pub fn insert(&mut self, mut body: Body) -> BodyId {
        let id = self.slots.len();
        body.id = id;
        self.slots.push(Some(body));
        id
    }

    pub fn erase(&mut self, id: BodyId) -> Option<Body> {
        self.slots.get_mut(id).and_then(Option::take)
    }

    pub fn get(&self, id: BodyId) -> Option<&Body> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.slots.get_mut(id).and_then(Option::as_mut)
    }

    /// Like [`BodyContainer::get`], but a missing body is an error.
    pub fn require(&self, id: BodyId) -> Result<&Body> {
        self.get(id)
            .ok_or_else(|| Error::InvalidArgument(format!("no body #{id}")))
    }

    /// Number of id slots, including erased ones.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Body> {
        self.slots.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Body> {
        self.slots.iter_mut().flatten()
    }
}

#[derive(Debug, Default)]
pub struct Scene {
    pub bodies: BodyContainer,
    pub contacts: ContactContainer,
    /// Present when boundary conditions are periodic.
    pub cell: Option<Cell>,
    pub forces: ForceContainer,
    pub drivers: Vec<Box<dyn Driver>>,
    pub iter: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn periodic(cell: Cell) -> Self {
        Self {
            cell: Some(cell),
            ..Self::default()
        }
    }

    pub fn is_periodic(&self) -> bool {
        self.cell.is_some()
    }

    pub fn add_body(&mut self, body: Body) -> BodyId {
        self.bodies.insert(body)
    }

    pub fn add_driver(&mut self, driver: impl Driver + 'static) {
        self.drivers.push(Box::new(driver));
    }

    /// Gravity of the first driver that applies one.
    pub fn gravity(&self) -> Option<Vec3> {
        self.drivers.iter().find_map(|d| d.gravity())
    }

    /// Asks every collider to rebuild from scratch; returns how many were found.
    pub fn invalidate_colliders(&mut self) -> usize {
        let mut found = 0;
        for driver in &mut self.drivers {
            if let Some(collider) = driver.as_collider_mut() {
                collider.invalidate_persistent_data();
                found += 1;
            }
        }
        found
    }

    /// Force and torque on a clump, summed from its members' accumulators.
    ///
    /// `force`/`torque` are added to, so callers can seed them with the
    /// clump's own recorded values. Members missing from the scene are skipped.
    pub fn add_force_torque_from_members(
        &self,
        clump: &Body,
        force: &mut Vec3,
        torque: &mut Vec3,
    ) {
        let Shape::Clump { members } = &clump.shape else {
            return;
        };
        for member in members.iter().filter_map(|&id| self.bodies.get(id)) {
            let f = self.forces.force(member.id);
            *force += f;
            *torque +=
                self.forces.torque(member.id) + (member.state.pos - clump.state.pos).cross(&f);
        }
    }
}

/// Time integrator applying uniform gravity.
#[derive(Debug, Clone)]
pub struct Integrator {
    pub gravity: Vec3,
}

impl Driver for Integrator {
    fn name(&self) -> &str {
        "integrator"
    }

    fn gravity(&self) -> Option<Vec3> {
        Some(self.gravity)
    }
}
