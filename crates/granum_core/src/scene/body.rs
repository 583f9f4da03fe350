use nalgebra::SymmetricEigen;
use serde::{Deserialize, Serialize};

use crate::types::{BodyId, Mat3, Quat, Vec3};

/// Kinematic and inertial state of a body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub pos: Vec3,
    pub vel: Vec3,
    pub ang_vel: Vec3,
    pub ang_mom: Vec3,
    pub mass: f64,
    /// Principal moments of inertia in the body frame.
    pub inertia: Vec3,
    pub ori: Quat,
}

impl Default for State {
    fn default() -> Self {
        Self {
            pos: Vec3::zeros(),
            vel: Vec3::zeros(),
            ang_vel: Vec3::zeros(),
            ang_mom: Vec3::zeros(),
            mass: 0.0,
            inertia: Vec3::zeros(),
            ori: Quat::identity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Shape {
    Sphere { radius: f64 },
    Box { extents: Vec3 },
    Clump { members: Vec<BodyId> },
    /// Node of a rod/grid structure; not a physical grain.
    GridNode { radius: f64 },
    GridConnection { radius: f64 },
}

impl Shape {
    pub fn sphere_radius(&self) -> Option<f64> {
        match self {
            Shape::Sphere { radius } => Some(*radius),
            _ => None,
        }
    }

    pub fn is_grid_element(&self) -> bool {
        matches!(self, Shape::GridNode { .. } | Shape::GridConnection { .. })
    }
}

/// Elastic-frictional material.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrictMat {
    pub density: f64,
    pub young: f64,
    pub poisson: f64,
    /// Friction angle in radians.
    pub friction_angle: f64,
}

/// Frictional material carrying linear viscoelastic contact parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViscElMat {
    pub frict: FrictMat,
    pub kn: f64,
    pub cn: f64,
    pub ks: f64,
    pub cs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "material", rename_all = "snake_case")]
pub enum Material {
    Frictional(FrictMat),
    Viscoelastic(ViscElMat),
    Rigid { density: f64 },
}

impl Material {
    pub fn density(&self) -> f64 {
        match self {
            Material::Frictional(m) => m.density,
            Material::Viscoelastic(m) => m.frict.density,
            Material::Rigid { density } => *density,
        }
    }

    /// Elastic constants, for materials that define them.
    pub fn elastic(&self) -> Option<&FrictMat> {
        match self {
            Material::Frictional(m) => Some(m),
            Material::Viscoelastic(m) => Some(&m.frict),
            Material::Rigid { .. } => None,
        }
    }

    pub fn elastic_mut(&mut self) -> Option<&mut FrictMat> {
        match self {
            Material::Frictional(m) => Some(m),
            Material::Viscoelastic(m) => Some(&mut m.frict),
            Material::Rigid { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Body {
    pub id: BodyId,
    pub state: State,
    pub shape: Shape,
    pub material: Option<Material>,
    pub dynamic: bool,
    /// Set on members of a clump.
    pub clump_id: Option<BodyId>,
    /// Inertia is not isotropic; rotational energy needs the orientation.
    pub aspherical: bool,
    pub group_mask: u32,
}

impl Body {
    pub fn new(shape: Shape, state: State) -> Self {
        Self {
            id: 0,
            state,
            shape,
            material: None,
            dynamic: true,
            clump_id: None,
            aspherical: false,
            group_mask: 1,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub fn is_clump(&self) -> bool {
        matches!(self.shape, Shape::Clump { .. })
    }

    pub fn is_clump_member(&self) -> bool {
        self.clump_id.is_some()
    }

    pub fn sphere_radius(&self) -> Option<f64> {
        self.shape.sphere_radius()
    }

    /// A non-positive mask selects every body.
    pub fn matches_mask(&self, mask: i64) -> bool {
        mask <= 0 || (i64::from(self.group_mask) & mask) != 0
    }
}

/// Mass, centroid and principal inertia of a rigid aggregate.
#[derive(Debug, Clone)]
pub struct MassProperties {
    pub mass: f64,
    pub centroid: Vec3,
    pub inertia: Vec3,
    pub ori: Quat,
}

/// Combines member bodies into one rigid body via the parallel-axis theorem.
///
/// Returns `None` for an empty or massless member set.
pub fn aggregate_mass_properties<'a>(
    members: impl IntoIterator<Item = &'a Body>,
) -> Option<MassProperties> {
    let members: Vec<&Body> = members.into_iter().collect();
    let mass: f64 = members.iter().map(|b| b.state.mass).sum();
    if members.is_empty() || mass <= 0.0 {
        return None;
    }
    let centroid = members
        .iter()
        .fold(Vec3::zeros(), |acc, b| acc + b.state.pos * b.state.mass)
        / mass;

    let mut tensor = Mat3::zeros();
    for b in &members {
        let rot = b.state.ori.to_rotation_matrix();
        let local = Mat3::from_diagonal(&b.state.inertia);
        let d = b.state.pos - centroid;
        let shift = Mat3::identity() * d.norm_squared() - d * d.transpose();
        tensor += rot.matrix() * local * rot.matrix().transpose() + shift * b.state.mass;
    }

    let eig = SymmetricEigen::new(tensor);
    let mut axes = eig.eigenvectors;
    if axes.determinant() < 0.0 {
        let flipped = -axes.column(2).into_owned();
        axes.set_column(2, &flipped);
    }
    let rotation = nalgebra::Rotation3::from_matrix_unchecked(axes);
    Some(MassProperties {
        mass,
        centroid,
        inertia: eig.eigenvalues,
        ori: Quat::from_rotation_matrix(&rotation),
    })
}
