//! Lattice reduction of the periodic cell.
//!
//! A flip is an integer matrix `N` replacing every cell edge by
//! `edge_i + Σ_j N(i, j) edge_j`, which shortens sheared edges while leaving
//! the lattice of periodic images unchanged. Each real contact's `cell_dist`
//! is then re-expressed in the new basis to keep the true separation
//! `pos2 - pos1 + hsize * cell_dist` identical.
//!
//! The flip is all-or-nothing: the candidate cell and every new offset are
//! prepared first, and the scene is only written once nothing can fail.

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::scene::{Cell, CellFrame, Scene};
use crate::types::{Mat3, Vec3, Vec3i};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FlipSettings {
    /// Allowed deviation of the basis change from an integer matrix.
    pub lattice_tolerance: f64,
}

impl Default for FlipSettings {
    fn default() -> Self {
        Self {
            lattice_tolerance: 1e-6,
        }
    }
}

/// Edge pairs `(i, j)` reduced by a derived flip, in application order.
/// Each edge is reduced only by edges already reduced themselves.
const UPPER_REDUCTION: [(usize, usize); 3] = [(1, 2), (0, 1), (0, 2)];
const LOWER_REDUCTION: [(usize, usize); 3] = [(1, 0), (2, 1), (2, 0)];

/// Flip that reduces the shear terms of `cell`.
///
/// Edges are reduced one pair at a time: entry `(i, j)` is the integer `n`
/// bringing `trsf(i, j) + n * size[j] / size[i]` closest to zero, taken on
/// the transform left by the previous steps. The upper triangle is reduced
/// first; the lower one only when the upper one needs nothing, so the
/// result stays unit triangular and its diagonal is always zero.
pub fn derive_flip(cell: &Cell) -> Mat3 {
    let size = cell.size();
    let mut trsf = *cell.trsf();
    let mut total = reduce_rows(&size, &mut trsf, &UPPER_REDUCTION);
    if total == Matrix3::identity() {
        total = reduce_rows(&size, &mut trsf, &LOWER_REDUCTION);
    }
    (total - Matrix3::identity()).cast::<f64>()
}

/// Applies `edge_i += n * edge_j` for each pair in `order` to `trsf` and
/// returns the accumulated integer edge transform.
fn reduce_rows(size: &Vec3, trsf: &mut Mat3, order: &[(usize, usize)]) -> Matrix3<i32> {
    let mut total = Matrix3::<i32>::identity();
    for &(i, j) in order {
        let ratio = size[j] / size[i];
        let n = -(0.5 + trsf[(i, j)] / ratio).floor();
        if n == 0.0 {
            continue;
        }
        let row = trsf.row(i) + trsf.row(j) * (n * ratio);
        trsf.set_row(i, &row);
        let steps = total.row(i) + total.row(j) * (n as i32);
        total.set_row(i, &steps);
    }
    total
}

/// Flip undoing `flip`, i.e. `(I + flip)⁻¹ - I`.
///
/// When `flip * flip` vanishes (a single sheared plane, for instance) this
/// is just `-flip`. Returns `None` when `I + flip` is singular.
pub fn inverse_flip(flip: &Mat3) -> Option<Mat3> {
    let inverse = (Mat3::identity() + flip).try_inverse()?;
    Some((inverse - Mat3::identity()).map(f64::round))
}

/// Flips the periodic cell of `scene` with default settings.
///
/// With `flip = None` the flip is derived from the current shear; if no
/// reduction is possible a zero matrix is returned and nothing changes.
/// Returns the flip that was applied.
pub fn flip_cell(scene: &mut Scene, flip: Option<Mat3>) -> Result<Mat3> {
    flip_cell_with(scene, flip, FlipSettings::default())
}

pub fn flip_cell_with(
    scene: &mut Scene,
    flip: Option<Mat3>,
    settings: FlipSettings,
) -> Result<Mat3> {
    let cell = scene.cell.as_ref().ok_or(Error::NotPeriodic("cell flip"))?;

    let flip = match flip {
        Some(explicit) => explicit,
        None => {
            let derived = derive_flip(cell);
            if derived.iter().all(|v| *v == 0.0) {
                trace!("no flip necessary");
                return Ok(Mat3::zeros());
            }
            debug!(
                upper = ?[derived[(0, 1)], derived[(0, 2)], derived[(1, 2)]],
                lower = ?[derived[(1, 0)], derived[(2, 0)], derived[(2, 1)]],
                "computed flip matrix"
            );
            derived
        }
    };

    let steps = integer_steps(&flip);
    let old_frame = cell.frame()?;
    let candidate = flipped_cell(cell, &steps);
    let new_frame = candidate.frame()?;
    ensure_lattice_change(&old_frame, &new_frame, settings.lattice_tolerance)?;

    let old_images = image_table(scene, &old_frame);
    let new_images = image_table(scene, &new_frame);

    let mut offsets = Vec::with_capacity(scene.contacts.len());
    for contact in scene.contacts.iter_real() {
        let (id1, id2) = (contact.id1(), contact.id2());
        let (Some(old1), Some(old2), Some(new1), Some(new2)) = (
            old_images.get(id1).copied().flatten(),
            old_images.get(id2).copied().flatten(),
            new_images.get(id1).copied().flatten(),
            new_images.get(id2).copied().flatten(),
        ) else {
            return Err(Error::InvalidArgument(format!(
                "contact #{id1}+#{id2} references a body that does not exist"
            )));
        };

        // Lattice displacement between the wrapped images: c2 - c1 + cell_dist.
        let k_old = old2.1 - old1.1 + contact.cell_dist;
        let separation = old2.0 - old1.0 + old_frame.hsize() * k_old.cast::<f64>();
        let k_new = new_frame
            .lattice_coords(&(separation - (new2.0 - new1.0)))
            .map(|x| x.round() as i32);
        offsets.push(k_new - (new2.1 - new1.1));
    }

    // Commit.
    if let Some(cell) = scene.cell.as_mut() {
        cell.set_trsf(*candidate.trsf());
    }
    let dropped = scene.contacts.erase_non_real();
    for (contact, offset) in scene.contacts.iter_mut().zip(offsets) {
        contact.cell_dist = offset;
    }
    debug!(dropped, real = scene.contacts.len(), "cell flipped");

    if scene.invalidate_colliders() == 0 {
        warn!(
            "no collider found while flipping cell; \
             continuing simulation might give garbage results"
        );
    }
    Ok(flip)
}

fn integer_steps(flip: &Mat3) -> Matrix3<i32> {
    Matrix3::from_fn(|i, j| {
        let entry = flip[(i, j)];
        if i == j {
            if entry != 0.0 {
                warn!(i, j, entry, "diagonal flip term is meaningless and will be ignored");
            }
            return 0;
        }
        if entry.fract() != 0.0 {
            warn!(i, j, entry, "flip matrix entry is not an integer and will be rounded");
        }
        entry.round() as i32
    })
}

/// Cell whose edges are `edge_i + Σ_j steps(i, j) edge_j`.
fn flipped_cell(cell: &Cell, steps: &Matrix3<i32>) -> Cell {
    let size = cell.size();
    let scaled = Mat3::from_fn(|i, j| f64::from(steps[(i, j)]) * size[j] / size[i]);
    let mut candidate = cell.clone();
    candidate.set_trsf(cell.trsf() + scaled * cell.trsf());
    candidate
}

/// The new basis must generate the same lattice as the old one.
fn ensure_lattice_change(old: &CellFrame, new: &CellFrame, tolerance: f64) -> Result<()> {
    let change = old.basis_change_to(new);
    let rounded = change.map(f64::round);
    let off_lattice = (change - rounded).amax();
    if off_lattice > tolerance || (rounded.determinant().abs() - 1.0).abs() > tolerance {
        return Err(Error::Domain(format!(
            "flipped cell does not span the same lattice (deviation {off_lattice:.3e}); \
             shear terms of the target edges must be reduced first"
        )));
    }
    Ok(())
}

/// Wrapped position and image count of every body, indexed by id.
fn image_table(scene: &Scene, frame: &CellFrame) -> Vec<Option<(Vec3, Vec3i)>> {
    let mut table = vec![None; scene.bodies.len()];
    for body in scene.bodies.iter() {
        table[body.id] = Some(frame.wrap(&body.state.pos));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{
        Body, Contact, ContactGeom, ContactPhys, NormShearPhys, ScGeom, Shape, State,
    };
    use crate::traits::{Collider, Driver};
    use proptest::prelude::*;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    struct FlagCollider {
        invalidated: Rc<std::cell::Cell<bool>>,
    }

    impl Collider for FlagCollider {
        fn invalidate_persistent_data(&mut self) {
            self.invalidated.set(true);
        }
    }

    impl Driver for FlagCollider {
        fn name(&self) -> &str {
            "collider"
        }

        fn as_collider_mut(&mut self) -> Option<&mut dyn Collider> {
            Some(self)
        }
    }

    fn sheared_cell(edge: f64, shear: f64) -> Cell {
        let mut trsf = Mat3::identity();
        trsf[(0, 1)] = shear;
        Cell::with_trsf(Vec3::repeat(edge), trsf).expect("valid cell")
    }

    fn sphere(pos: Vec3) -> Body {
        Body::new(
            Shape::Sphere { radius: 0.5 },
            State {
                pos,
                mass: 1.0,
                ..State::default()
            },
        )
    }

    fn real_contact(id1: usize, id2: usize, cell_dist: Vec3i) -> Contact {
        Contact::real(
            id1,
            id2,
            ContactGeom::Sphere(ScGeom {
                normal: Vec3::x(),
                contact_point: Vec3::zeros(),
                radius1: 0.5,
                radius2: 0.5,
                penetration_depth: 0.0,
            }),
            ContactPhys::NormShear(NormShearPhys::default()),
        )
        .with_cell_dist(cell_dist)
    }

    fn separations(scene: &Scene) -> Vec<Vec3> {
        let cell = scene.cell.as_ref().expect("periodic");
        scene
            .contacts
            .iter_real()
            .map(|c| {
                let p1 = scene.bodies.get(c.id1()).expect("body").state.pos;
                let p2 = scene.bodies.get(c.id2()).expect("body").state.pos;
                p2 - p1 + cell.shift(&c.cell_dist)
            })
            .collect()
    }

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn derive_flip_rounds_to_nearest_repeat() {
        let cell = sheared_cell(1.0, 1.7);
        let flip = derive_flip(&cell);
        assert_eq!(flip[(0, 1)], -2.0);
        assert!(flip.iter().enumerate().all(|(k, v)| k == 3 || *v == 0.0));
    }

    #[test]
    fn derive_flip_scales_by_size_ratio() {
        let mut trsf = Mat3::identity();
        trsf[(0, 1)] = 2.1;
        let cell = Cell::with_trsf(Vec3::new(1.0, 2.0, 1.0), trsf).expect("cell");
        // size[1] / size[0] = 2, so one repeat removes 2.0 of shear.
        assert_eq!(derive_flip(&cell)[(0, 1)], -1.0);
    }

    #[test]
    fn small_shear_is_a_no_op() {
        let mut scene = Scene::periodic(sheared_cell(2.0, 0.2));
        scene.contacts.insert(Contact::potential(0, 1)).expect("insert");
        let flip = flip_cell(&mut scene, None).expect("flip");
        assert_eq!(flip, Mat3::zeros());
        assert_eq!(scene.contacts.len(), 1);
        assert_eq!(scene.cell.as_ref().map(|c| c.trsf()[(0, 1)]), Some(0.2));
    }

    #[test]
    fn aperiodic_scene_is_rejected() {
        let mut scene = Scene::new();
        assert_err_contains(flip_cell(&mut scene, None), "periodic");
    }

    #[test]
    fn flip_reduces_shear_and_keeps_separations() {
        let mut scene = Scene::periodic(sheared_cell(10.0, 1.3));
        let a = scene.add_body(sphere(Vec3::new(1.0, 9.5, 2.0)));
        let b = scene.add_body(sphere(Vec3::new(9.0, 0.5, 2.0)));
        let c = scene.add_body(sphere(Vec3::new(4.0, 5.0, 8.0)));
        scene
            .contacts
            .insert(real_contact(a, b, Vec3i::new(0, 1, 0)))
            .expect("insert");
        scene
            .contacts
            .insert(real_contact(b, c, Vec3i::new(-1, 0, 1)))
            .expect("insert");
        scene.contacts.insert(Contact::potential(a, c)).expect("insert");
        let collider = FlagCollider::default();
        let invalidated = Rc::clone(&collider.invalidated);
        scene.add_driver(collider);

        let before = separations(&scene);
        let flip = flip_cell(&mut scene, None).expect("flip");
        assert_eq!(flip[(0, 1)], -1.0);
        assert!(invalidated.get());

        let cell = scene.cell.as_ref().expect("periodic");
        assert!((cell.trsf()[(0, 1)] - 0.3).abs() < 1e-12);
        assert_eq!(scene.contacts.len(), 2);
        assert!(scene.contacts.find(a, c).is_none());
        for (old, new) in before.iter().zip(separations(&scene)) {
            assert!((old - new).norm() < 1e-9, "separation changed: {old:?} -> {new:?}");
        }
    }

    #[test]
    fn flip_then_inverse_restores_cell_and_offsets() {
        let mut scene = Scene::periodic(sheared_cell(4.0, 0.25));
        let a = scene.add_body(sphere(Vec3::new(0.5, 3.5, 1.0)));
        let b = scene.add_body(sphere(Vec3::new(3.5, 0.5, 1.0)));
        scene
            .contacts
            .insert(real_contact(a, b, Vec3i::new(1, -1, 0)))
            .expect("insert");
        let trsf = *scene.cell.as_ref().expect("cell").trsf();

        let mut flip = Mat3::zeros();
        flip[(0, 1)] = 2.0;
        flip_cell(&mut scene, Some(flip)).expect("forward flip");
        assert_ne!(
            scene.contacts.find(a, b).expect("contact").cell_dist,
            Vec3i::new(1, -1, 0)
        );
        flip_cell(&mut scene, Some(-flip)).expect("inverse flip");

        assert_eq!(*scene.cell.as_ref().expect("cell").trsf(), trsf);
        assert_eq!(
            scene.contacts.find(a, b).expect("contact").cell_dist,
            Vec3i::new(1, -1, 0)
        );
    }

    #[test]
    fn diagonal_and_fractional_entries_are_sanitised() {
        let mut scene = Scene::periodic(sheared_cell(1.0, 0.0));
        let mut flip = Mat3::zeros();
        flip[(0, 0)] = 3.0;
        flip[(0, 1)] = 0.9;
        flip_cell(&mut scene, Some(flip)).expect("flip");
        let trsf = *scene.cell.as_ref().expect("cell").trsf();
        assert_eq!(trsf[(0, 0)], 1.0);
        assert_eq!(trsf[(0, 1)], 1.0);
    }

    #[test]
    fn non_lattice_flip_leaves_scene_untouched() {
        let mut trsf = Mat3::identity();
        trsf[(0, 1)] = 0.3;
        trsf[(1, 0)] = 0.4;
        let mut scene = Scene::periodic(Cell::with_trsf(Vec3::repeat(1.0), trsf).expect("cell"));
        scene.contacts.insert(Contact::potential(0, 1)).expect("insert");
        // I + flip has determinant 2: a sublattice, not the same one.
        let mut flip = Mat3::zeros();
        flip[(0, 1)] = 1.0;
        flip[(1, 0)] = -1.0;
        assert_err_contains(flip_cell(&mut scene, Some(flip)), "same lattice");
        assert_eq!(*scene.cell.as_ref().expect("cell").trsf(), trsf);
        assert_eq!(scene.contacts.len(), 1);
    }

    #[test]
    fn derived_flip_handles_shear_in_coupled_planes() {
        let mut trsf = Mat3::identity();
        trsf[(0, 1)] = 1.3;
        trsf[(1, 2)] = 0.7;
        let cell = Cell::with_trsf(Vec3::repeat(10.0), trsf).expect("cell");
        let mut scene = Scene::periodic(cell);
        let a = scene.add_body(sphere(Vec3::new(1.0, 9.5, 2.0)));
        let b = scene.add_body(sphere(Vec3::new(9.0, 0.5, 8.0)));
        let c = scene.add_body(sphere(Vec3::new(4.0, 5.0, 6.0)));
        scene
            .contacts
            .insert(real_contact(a, b, Vec3i::new(0, 1, -1)))
            .expect("insert");
        scene
            .contacts
            .insert(real_contact(b, c, Vec3i::new(1, 0, 1)))
            .expect("insert");
        let original: Vec<Vec3i> = scene.contacts.iter().map(|c| c.cell_dist).collect();
        let before = separations(&scene);

        let flip = flip_cell(&mut scene, None).expect("flip");
        assert_eq!(flip[(0, 1)], -1.0);
        assert_eq!(flip[(1, 2)], -1.0);
        assert_eq!(flip[(0, 2)], 1.0);

        let reduced = *scene.cell.as_ref().expect("cell").trsf();
        for (i, j) in [(0, 1), (0, 2), (1, 2)] {
            assert!(reduced[(i, j)].abs() <= 0.5, "shear ({i}, {j}) = {}", reduced[(i, j)]);
        }
        for (old, new) in before.iter().zip(separations(&scene)) {
            assert!((old - new).norm() < 1e-9, "separation changed: {old:?} -> {new:?}");
        }

        let inverse = inverse_flip(&flip).expect("invertible");
        assert_ne!(inverse, -flip);
        flip_cell(&mut scene, Some(inverse)).expect("inverse flip");
        let restored = *scene.cell.as_ref().expect("cell").trsf();
        assert!((restored - trsf).amax() < 1e-12);
        let offsets: Vec<Vec3i> = scene.contacts.iter().map(|c| c.cell_dist).collect();
        assert_eq!(offsets, original);
    }

    #[test]
    fn single_plane_flip_is_its_own_negative_inverse() {
        let mut flip = Mat3::zeros();
        flip[(2, 0)] = 3.0;
        assert_eq!(inverse_flip(&flip), Some(-flip));
        let mut singular = Mat3::zeros();
        singular[(0, 1)] = 1.0;
        singular[(1, 0)] = 1.0;
        assert_eq!(inverse_flip(&singular), None);
    }

    #[test]
    fn dangling_contact_aborts_before_commit() {
        let mut scene = Scene::periodic(sheared_cell(1.0, 0.9));
        scene.add_body(sphere(Vec3::zeros()));
        scene
            .contacts
            .insert(real_contact(0, 5, Vec3i::zeros()))
            .expect("insert");
        assert_err_contains(flip_cell(&mut scene, None), "does not exist");
        assert_eq!(scene.cell.as_ref().expect("cell").trsf()[(0, 1)], 0.9);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn flips_preserve_separations_and_invert(
            shear in -3.0f64..3.0,
            steps in -3i32..=3,
            positions in prop::collection::vec(
                (-15.0f64..15.0, -15.0f64..15.0, -15.0f64..15.0),
                2..8,
            ),
            offsets in prop::collection::vec((-2i32..=2, -2i32..=2, -2i32..=2), 1..8),
        ) {
            let mut scene = Scene::periodic(sheared_cell(5.0, shear));
            for (x, y, z) in &positions {
                scene.add_body(sphere(Vec3::new(*x, *y, *z)));
            }
            let n = positions.len();
            for (k, (i, j, l)) in offsets.iter().enumerate() {
                let (id1, id2) = (k % n, (k + 1) % n);
                if id1 == id2 || scene.contacts.find(id1, id2).is_some() {
                    continue;
                }
                let contact = real_contact(id1, id2, Vec3i::new(*i, *j, *l));
                scene.contacts.insert(contact).expect("insert");
            }
            let before = separations(&scene);
            let original: Vec<Vec3i> = scene.contacts.iter().map(|c| c.cell_dist).collect();

            let mut flip = Mat3::zeros();
            flip[(0, 1)] = f64::from(steps);
            flip_cell(&mut scene, Some(flip)).expect("forward flip");
            for (old, new) in before.iter().zip(separations(&scene)) {
                prop_assert!((old - new).norm() < 1e-8);
            }

            flip_cell(&mut scene, Some(-flip)).expect("inverse flip");
            let restored: Vec<Vec3i> = scene.contacts.iter().map(|c| c.cell_dist).collect();
            prop_assert_eq!(restored, original);
        }
    }
}
