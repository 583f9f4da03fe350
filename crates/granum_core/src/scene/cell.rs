use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Mat3, Vec3, Vec3i};

/// Periodic parallelepiped cell.
///
/// Edge `i` of the cell is `ref_size[i] * trsf.row(i)`. With an identity
/// transform the cell is the axis-aligned box of `ref_size`; off-diagonal
/// entries of `trsf` are the shear terms reduced by a flip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    ref_size: Vec3,
    trsf: Mat3,
    pub vel_grad: Mat3,
}

impl Cell {
    pub fn new(ref_size: Vec3) -> Result<Self> {
        Self::with_trsf(ref_size, Mat3::identity())
    }

    pub fn cubic(edge: f64) -> Result<Self> {
        Self::new(Vec3::repeat(edge))
    }

    pub fn with_trsf(ref_size: Vec3, trsf: Mat3) -> Result<Self> {
        if ref_size.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(Error::InvalidArgument(format!(
                "cell reference size must be finite and positive, got {ref_size:?}"
            )));
        }
        let cell = Self {
            ref_size,
            trsf,
            vel_grad: Mat3::zeros(),
        };
        cell.frame()?;
        Ok(cell)
    }

    /// Reference length of each cell edge.
    pub fn size(&self) -> Vec3 {
        self.ref_size
    }

    pub fn trsf(&self) -> &Mat3 {
        &self.trsf
    }

    pub(crate) fn set_trsf(&mut self, trsf: Mat3) {
        self.trsf = trsf;
    }

    /// Cell edges as columns.
    pub fn hsize(&self) -> Mat3 {
        self.trsf.transpose() * Mat3::from_diagonal(&self.ref_size)
    }

    pub fn volume(&self) -> f64 {
        self.hsize().determinant().abs()
    }

    /// Translation corresponding to an integer number of cell repeats.
    pub fn shift(&self, cell_dist: &Vec3i) -> Vec3 {
        self.hsize() * cell_dist.cast::<f64>()
    }

    /// Velocity left after removing the homogeneous deformation of the cell.
    pub fn fluctuation_vel(&self, pos: &Vec3, vel: &Vec3) -> Vec3 {
        vel - self.vel_grad * pos
    }

    /// Precomputed basis and inverse, for wrapping many points.
    pub fn frame(&self) -> Result<CellFrame> {
        let hsize = self.hsize();
        let inverse = hsize.try_inverse().ok_or_else(|| {
            Error::Domain(format!("cell basis is singular (det = {})", hsize.determinant()))
        })?;
        Ok(CellFrame { hsize, inverse })
    }

    /// Wraps `pt` into the cell; also returns how many repeats were removed.
    pub fn wrap_sheared_pt(&self, pt: &Vec3) -> Result<(Vec3, Vec3i)> {
        Ok(self.frame()?.wrap(pt))
    }
}

/// Cell basis together with its inverse.
#[derive(Debug, Clone)]
pub struct CellFrame {
    hsize: Mat3,
    inverse: Mat3,
}

impl CellFrame {
    pub fn hsize(&self) -> &Mat3 {
        &self.hsize
    }

    /// Coordinates of `pt` in units of the cell edges.
    pub fn lattice_coords(&self, pt: &Vec3) -> Vec3 {
        self.inverse * pt
    }

    /// Edges of `other` expressed in units of this frame's edges.
    pub fn basis_change_to(&self, other: &CellFrame) -> Mat3 {
        self.inverse * other.hsize
    }

    pub fn wrap(&self, pt: &Vec3) -> (Vec3, Vec3i) {
        let period = self.lattice_coords(pt).map(|x| x.floor() as i32);
        (pt - self.hsize * period.cast::<f64>(), period)
    }
}
