use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{BodyId, Vec3, Vec3i};

/// Sphere-sphere contact geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScGeom {
    pub normal: Vec3,
    pub contact_point: Vec3,
    pub radius1: f64,
    pub radius2: f64,
    pub penetration_depth: f64,
}

/// Three-degree-of-freedom contact geometry with reference configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dem3DofGeom {
    pub normal: Vec3,
    pub contact_point: Vec3,
    pub ref_r1: f64,
    pub ref_r2: f64,
    pub ref_length: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "geom", rename_all = "snake_case")]
pub enum ContactGeom {
    Sphere(ScGeom),
    Dem3Dof(Dem3DofGeom),
}

impl ContactGeom {
    pub fn normal(&self) -> Vec3 {
        match self {
            ContactGeom::Sphere(g) => g.normal,
            ContactGeom::Dem3Dof(g) => g.normal,
        }
    }

    pub fn contact_point(&self) -> Vec3 {
        match self {
            ContactGeom::Sphere(g) => g.contact_point,
            ContactGeom::Dem3Dof(g) => g.contact_point,
        }
    }

    /// Reference radii of the first and second side.
    pub fn ref_radii(&self) -> (f64, f64) {
        match self {
            ContactGeom::Sphere(g) => (g.radius1, g.radius2),
            ContactGeom::Dem3Dof(g) => (g.ref_r1, g.ref_r2),
        }
    }

    pub fn set_ref_radii(&mut self, r1: Option<f64>, r2: Option<f64>) {
        let (a, b) = match self {
            ContactGeom::Sphere(g) => (&mut g.radius1, &mut g.radius2),
            ContactGeom::Dem3Dof(g) => (&mut g.ref_r1, &mut g.ref_r2),
        };
        if let Some(r) = r1 {
            *a = r;
        }
        if let Some(r) = r2 {
            *b = r;
        }
    }
}

/// Normal/shear force decomposition with linear stiffnesses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormShearPhys {
    pub kn: f64,
    pub ks: f64,
    pub normal_force: Vec3,
    pub shear_force: Vec3,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrictPhys {
    pub base: NormShearPhys,
    pub tan_friction_angle: f64,
}

/// Frictional contact carrying a capillary bridge force.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapillaryPhys {
    pub frict: FrictPhys,
    pub capillary_force: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phys", rename_all = "snake_case")]
pub enum ContactPhys {
    NormShear(NormShearPhys),
    Frict(FrictPhys),
    Capillary(CapillaryPhys),
}

impl ContactPhys {
    pub fn norm_shear(&self) -> &NormShearPhys {
        match self {
            ContactPhys::NormShear(p) => p,
            ContactPhys::Frict(p) => &p.base,
            ContactPhys::Capillary(p) => &p.frict.base,
        }
    }

    pub fn norm_shear_mut(&mut self) -> &mut NormShearPhys {
        match self {
            ContactPhys::NormShear(p) => p,
            ContactPhys::Frict(p) => &mut p.base,
            ContactPhys::Capillary(p) => &mut p.frict.base,
        }
    }

    pub fn frictional_mut(&mut self) -> Option<&mut FrictPhys> {
        match self {
            ContactPhys::NormShear(_) => None,
            ContactPhys::Frict(p) => Some(p),
            ContactPhys::Capillary(p) => Some(&mut p.frict),
        }
    }

    pub fn is_frictional(&self) -> bool {
        !matches!(self, ContactPhys::NormShear(_))
    }

    pub fn capillary_force(&self) -> Option<Vec3> {
        match self {
            ContactPhys::Capillary(p) => Some(p.capillary_force),
            _ => None,
        }
    }

    /// Sum of normal and shear force.
    pub fn total_force(&self) -> Vec3 {
        let p = self.norm_shear();
        p.normal_force + p.shear_force
    }
}

/// Pairwise relation between two bodies.
///
/// A contact is *potential* until detection attaches geometry and physics;
/// only then is it *real*. `cell_dist` counts the periodic repeats separating
/// the two bodies: their true separation is `pos2 - pos1 + hsize * cell_dist`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    id1: BodyId,
    id2: BodyId,
    pub geom: Option<ContactGeom>,
    pub phys: Option<ContactPhys>,
    pub cell_dist: Vec3i,
    pub iter_made_real: Option<u64>,
}

impl Contact {
    /// A potential contact, as produced by the broad phase.
    pub fn potential(id1: BodyId, id2: BodyId) -> Self {
        Self {
            id1,
            id2,
            geom: None,
            phys: None,
            cell_dist: Vec3i::zeros(),
            iter_made_real: None,
        }
    }

    pub fn real(id1: BodyId, id2: BodyId, geom: ContactGeom, phys: ContactPhys) -> Self {
        Self {
            geom: Some(geom),
            phys: Some(phys),
            iter_made_real: Some(0),
            ..Self::potential(id1, id2)
        }
    }

    pub fn with_cell_dist(mut self, cell_dist: Vec3i) -> Self {
        self.cell_dist = cell_dist;
        self
    }

    pub fn id1(&self) -> BodyId {
        self.id1
    }

    pub fn id2(&self) -> BodyId {
        self.id2
    }

    pub fn is_real(&self) -> bool {
        self.geom.is_some() && self.phys.is_some()
    }

    /// Geometry and physics of a real contact.
    pub fn parts(&self) -> Option<(&ContactGeom, &ContactPhys)> {
        match (&self.geom, &self.phys) {
            (Some(g), Some(p)) => Some((g, p)),
            _ => None,
        }
    }

    fn key(&self) -> (BodyId, BodyId) {
        pair_key(self.id1, self.id2)
    }
}

fn pair_key(a: BodyId, b: BodyId) -> (BodyId, BodyId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Contacts keyed by their unordered body pair.
#[derive(Debug, Clone, Default)]
pub struct ContactContainer {
    items: Vec<Contact>,
    index: HashMap<(BodyId, BodyId), usize>,
}

impl ContactContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn insert(&mut self, contact: Contact) -> Result<()> {
        let key = contact.key();
        if self.index.contains_key(&key) {
            return Err(Error::InvalidArgument(format!(
                "contact #{}+#{} already exists",
                contact.id1, contact.id2
            )));
        }
        self.index.insert(key, self.items.len());
        self.items.push(contact);
        Ok(())
    }

    pub fn find(&self, a: BodyId, b: BodyId) -> Option<&Contact> {
        self.index.get(&pair_key(a, b)).map(|&i| &self.items[i])
    }

    pub fn find_mut(&mut self, a: BodyId, b: BodyId) -> Option<&mut Contact> {
        match self.index.get(&pair_key(a, b)) {
            Some(&i) => Some(&mut self.items[i]),
            None => None,
        }
    }

    pub fn erase(&mut self, a: BodyId, b: BodyId) -> Option<Contact> {
        let slot = self.index.remove(&pair_key(a, b))?;
        let removed = self.items.swap_remove(slot);
        if let Some(moved) = self.items.get(slot) {
            self.index.insert(moved.key(), slot);
        }
        Some(removed)
    }

    /// Drops every potential contact; returns how many were removed.
    pub fn erase_non_real(&mut self) -> usize {
        let before = self.items.len();
        self.items.retain(Contact::is_real);
        self.rebuild_index();
        before - self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contact> {
        self.items.iter()
    }

    /// Body ids are not reachable through this iterator, so the index stays valid.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Contact> {
        self.items.iter_mut()
    }

    pub fn iter_real(&self) -> impl Iterator<Item = &Contact> {
        self.items.iter().filter(|c| c.is_real())
    }

    pub fn count_real(&self) -> usize {
        self.iter_real().count()
    }

    /// Contacts in which `id` participates, on either side.
    pub fn involving(&self, id: BodyId) -> impl Iterator<Item = &Contact> {
        self.items
            .iter()
            .filter(move |c| c.id1 == id || c.id2 == id)
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .items
            .iter()
            .enumerate()
            .map(|(i, c)| (c.key(), i))
            .collect();
    }
}
