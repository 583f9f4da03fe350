use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::{branch_vector, normalising_volume, require_cell};
use crate::error::{Error, Result};
use crate::scene::{ContactGeom, ContactPhys, Scene, Shape};
use crate::types::{Mat3, Vec3};

/// Average stress `Σ (Fn + Fs) ⊗ branch / V` over real contacts.
///
/// `volume` defaults to the cell volume, or 1 in an aperiodic scene.
/// Contacts whose first body is a grid node are left out.
pub fn stress_tensor(scene: &Scene, volume: Option<f64>) -> Result<Mat3> {
    let volume = normalising_volume(scene, volume)?;
    let mut stress = Mat3::zeros();
    for contact in scene.contacts.iter_real() {
        let Some((_, phys)) = contact.parts() else {
            continue;
        };
        let b1 = scene.bodies.require(contact.id1())?;
        if matches!(b1.shape, Shape::GridNode { .. }) {
            continue;
        }
        stress += phys.total_force() * branch_vector(scene, contact)?.transpose();
    }
    Ok(stress / volume)
}

/// Stress carried by capillary bridges, `Σ Fcap ⊗ branch / V`.
///
/// Needs a periodic cell. Contacts without capillary physics do not contribute.
pub fn capillary_stress_tensor(scene: &Scene, volume: Option<f64>) -> Result<Mat3> {
    require_cell(scene, "capillary stress")?;
    let volume = normalising_volume(scene, volume)?;
    let mut stress = Mat3::zeros();
    for contact in scene.contacts.iter_real() {
        let Some(force) = contact.phys.as_ref().and_then(ContactPhys::capillary_force) else {
            continue;
        };
        stress += force * branch_vector(scene, contact)?.transpose();
    }
    Ok(stress / volume)
}

/// Love-Weber stress of every body, indexed by body id.
///
/// Each contact adds `f ⊗ (cp - center)` scaled by the inverse sphere volume
/// of the side; the first body takes it with a negative sign. In a periodic
/// scene the second center is the image of body 2 seen by the contact.
pub fn body_stresses_lw(scene: &Scene) -> Result<Vec<Mat3>> {
    let mut stresses = vec![Mat3::zeros(); scene.bodies.len()];
    for contact in scene.contacts.iter_real() {
        let Some((geom, phys)) = contact.parts() else {
            continue;
        };
        let (id1, id2) = (contact.id1(), contact.id2());
        let pos1 = scene.bodies.require(id1)?.state.pos;
        let mut pos2 = scene.bodies.require(id2)?.state.pos;
        if let Some(cell) = &scene.cell {
            pos2 += cell.shift(&contact.cell_dist);
        }
        let force = phys.total_force();
        let cp = geom.contact_point();
        let (r1, r2) = geom.ref_radii();
        if r1 > 0.0 {
            stresses[id1] -= force * (cp - pos1).transpose() * inverse_sphere_volume(r1);
        }
        if r2 > 0.0 {
            stresses[id2] += force * (cp - pos2).transpose() * inverse_sphere_volume(r2);
        }
    }
    Ok(stresses)
}

fn inverse_sphere_volume(radius: f64) -> f64 {
    3.0 / (4.0 * PI * radius.powi(3))
}

/// Normal and shear stress vectors summed on a body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyStress {
    pub normal: Vec3,
    pub shear: Vec3,
}

/// Raw sums of contact stress vectors on each body, indexed by body id.
///
/// Only 3-dof geometry, or sphere geometry with frictional physics, is
/// considered. Forces are divided by `π r²` of the smaller positive
/// reference radius and added to both bodies without averaging.
pub fn body_normal_shear_stresses(scene: &Scene) -> Result<Vec<BodyStress>> {
    let mut stresses = vec![BodyStress::default(); scene.bodies.len()];
    for contact in scene.contacts.iter_real() {
        let supported = match contact.parts() {
            Some((geom @ ContactGeom::Dem3Dof(_), phys)) => Some((geom, phys)),
            Some((geom @ ContactGeom::Sphere(_), phys)) if phys.is_frictional() => {
                Some((geom, phys))
            }
            _ => None,
        };
        let Some((geom, phys)) = supported else {
            continue;
        };

        let (r1, r2) = geom.ref_radii();
        let min_rad = if r1 <= 0.0 {
            r2
        } else if r2 <= 0.0 {
            r1
        } else {
            r1.min(r2)
        };
        let cross_section = PI * min_rad * min_rad;
        let n = geom.normal();
        let forces = phys.norm_shear();

        let normal = n * (n.dot(&forces.normal_force) / cross_section);
        let shear = Vec3::from_fn(|i, _| {
            let (ix1, ix2) = ((i + 1) % 3, (i + 2) % 3);
            (n[ix1] * forces.shear_force[ix1] + n[ix2] * forces.shear_force[ix2]) / cross_section
        });

        for id in [contact.id1(), contact.id2()] {
            let slot = stresses
                .get_mut(id)
                .ok_or_else(|| Error::InvalidArgument(format!("no body #{id}")))?;
            slot.normal += normal;
            slot.shear += shear;
        }
    }
    Ok(stresses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{
        Body, CapillaryPhys, Cell, Contact, Dem3DofGeom, FrictPhys, NormShearPhys, ScGeom, State,
    };
    use crate::types::Vec3i;
    use std::f64::consts::FRAC_1_SQRT_2;

    fn sphere(pos: Vec3, radius: f64) -> Body {
        Body::new(
            Shape::Sphere { radius },
            State {
                pos,
                mass: 1.0,
                ..State::default()
            },
        )
    }

    fn sc_geom(normal: Vec3, contact_point: Vec3, r1: f64, r2: f64) -> ContactGeom {
        ContactGeom::Sphere(ScGeom {
            normal,
            contact_point,
            radius1: r1,
            radius2: r2,
            penetration_depth: 0.0,
        })
    }

    fn frict(normal_force: Vec3, shear_force: Vec3) -> ContactPhys {
        ContactPhys::Frict(FrictPhys {
            base: NormShearPhys {
                kn: 1.0,
                ks: 1.0,
                normal_force,
                shear_force,
            },
            tan_friction_angle: 0.5,
        })
    }

    #[test]
    fn periodic_branch_uses_image_shift() {
        let mut scene = Scene::periodic(Cell::cubic(10.0).expect("cell"));
        let a = scene.add_body(sphere(Vec3::new(9.0, 0.0, 0.0), 1.0));
        let b = scene.add_body(sphere(Vec3::new(1.0, 0.0, 0.0), 1.0));
        // Body b's image at x = 11 touches a.
        scene
            .contacts
            .insert(
                Contact::real(
                    a,
                    b,
                    sc_geom(Vec3::x(), Vec3::new(10.0, 0.0, 0.0), 1.0, 1.0),
                    frict(Vec3::new(-4.0, 0.0, 0.0), Vec3::zeros()),
                )
                .with_cell_dist(Vec3i::new(1, 0, 0)),
            )
            .expect("insert");
        let stress = stress_tensor(&scene, None).expect("stress");
        // branch = 9 - 1 - 10 = -2
        assert!((stress[(0, 0)] - 8.0 / 1000.0).abs() < 1e-15);
        let custom = stress_tensor(&scene, Some(8.0)).expect("stress");
        assert!((custom[(0, 0)] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn grid_node_contacts_are_excluded() {
        let mut scene = Scene::new();
        let a = scene.add_body(Body::new(Shape::GridNode { radius: 0.1 }, State::default()));
        let b = scene.add_body(Body::new(
            Shape::GridNode { radius: 0.1 },
            State {
                pos: Vec3::x(),
                ..State::default()
            },
        ));
        scene
            .contacts
            .insert(Contact::real(
                a,
                b,
                sc_geom(Vec3::x(), Vec3::zeros(), 0.1, 0.1),
                frict(Vec3::x(), Vec3::zeros()),
            ))
            .expect("insert");
        assert_eq!(stress_tensor(&scene, None).expect("stress"), Mat3::zeros());
    }

    #[test]
    fn capillary_stress_needs_periodic_cell() {
        let scene = Scene::new();
        let err = capillary_stress_tensor(&scene, None).expect_err("aperiodic");
        assert!(format!("{err}").contains("capillary stress"));
    }

    #[test]
    fn capillary_stress_reads_bridge_force_only() {
        let mut scene = Scene::periodic(Cell::cubic(2.0).expect("cell"));
        let a = scene.add_body(sphere(Vec3::new(1.0, 0.0, 0.0), 0.5));
        let b = scene.add_body(sphere(Vec3::zeros(), 0.5));
        let c = scene.add_body(sphere(Vec3::new(0.0, 1.0, 0.0), 0.5));
        let wet = ContactPhys::Capillary(CapillaryPhys {
            frict: FrictPhys {
                base: NormShearPhys {
                    normal_force: Vec3::new(100.0, 0.0, 0.0),
                    ..NormShearPhys::default()
                },
                tan_friction_angle: 0.3,
            },
            capillary_force: Vec3::new(2.0, 0.0, 0.0),
        });
        let geom = sc_geom(Vec3::x(), Vec3::zeros(), 0.5, 0.5);
        scene
            .contacts
            .insert(Contact::real(a, b, geom.clone(), wet))
            .expect("insert");
        scene
            .contacts
            .insert(Contact::real(b, c, geom, frict(Vec3::x(), Vec3::zeros())))
            .expect("insert");
        let stress = capillary_stress_tensor(&scene, None).expect("stress");
        assert!((stress[(0, 0)] - 2.0 / 8.0).abs() < 1e-12);
        assert!((stress.sum() - stress[(0, 0)]).abs() < 1e-12);
    }

    #[test]
    fn love_weber_stress_has_opposite_signs() {
        let mut scene = Scene::new();
        let a = scene.add_body(sphere(Vec3::zeros(), 1.0));
        let b = scene.add_body(sphere(Vec3::new(2.0, 0.0, 0.0), 1.0));
        scene
            .contacts
            .insert(Contact::real(
                a,
                b,
                sc_geom(Vec3::x(), Vec3::new(1.0, 0.0, 0.0), 1.0, 1.0),
                frict(Vec3::new(3.0, 0.0, 0.0), Vec3::zeros()),
            ))
            .expect("insert");
        let stresses = body_stresses_lw(&scene).expect("stresses");
        let scale = 3.0 / (4.0 * PI);
        assert!((stresses[a][(0, 0)] + 3.0 * scale).abs() < 1e-12);
        assert!((stresses[b][(0, 0)] + 3.0 * scale).abs() < 1e-12);
    }

    #[test]
    fn normal_shear_stresses_skip_unsupported_pairings() {
        let mut scene = Scene::new();
        let a = scene.add_body(sphere(Vec3::zeros(), 1.0));
        let b = scene.add_body(sphere(Vec3::new(1.5, 0.0, 0.0), 0.5));
        let c = scene.add_body(sphere(Vec3::new(0.0, 2.0, 0.0), 1.0));
        scene
            .contacts
            .insert(Contact::real(
                a,
                b,
                sc_geom(Vec3::x(), Vec3::new(1.0, 0.0, 0.0), 1.0, 0.5),
                frict(Vec3::new(PI, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)),
            ))
            .expect("insert");
        // Sphere geometry with plain normal/shear physics is not a supported pairing.
        scene
            .contacts
            .insert(Contact::real(
                a,
                c,
                sc_geom(Vec3::y(), Vec3::new(0.0, 1.0, 0.0), 1.0, 1.0),
                ContactPhys::NormShear(NormShearPhys {
                    normal_force: Vec3::new(0.0, 50.0, 0.0),
                    ..NormShearPhys::default()
                }),
            ))
            .expect("insert");

        let stresses = body_normal_shear_stresses(&scene).expect("stresses");
        let area = PI * 0.25;
        for id in [a, b] {
            assert!((stresses[id].normal - Vec3::new(PI / area, 0.0, 0.0)).norm() < 1e-12);
            assert!(stresses[id].shear.norm() < 1e-12);
        }
        assert_eq!(stresses[c], BodyStress::default());
    }

    #[test]
    fn dem3dof_geometry_works_with_any_physics() {
        let mut scene = Scene::new();
        let a = scene.add_body(sphere(Vec3::zeros(), 1.0));
        let b = scene.add_body(sphere(Vec3::new(2.0, 0.0, 0.0), 1.0));
        let n = Vec3::new(1.0, 1.0, 0.0).normalize();
        scene
            .contacts
            .insert(Contact::real(
                a,
                b,
                ContactGeom::Dem3Dof(Dem3DofGeom {
                    normal: n,
                    contact_point: Vec3::new(1.0, 0.0, 0.0),
                    ref_r1: 0.0,
                    ref_r2: 1.0,
                    ref_length: 2.0,
                }),
                ContactPhys::NormShear(NormShearPhys {
                    shear_force: Vec3::new(1.0, 0.0, 2.0),
                    ..NormShearPhys::default()
                }),
            ))
            .expect("insert");
        let stresses = body_normal_shear_stresses(&scene).expect("stresses");
        // Non-positive ref_r1 falls back to ref_r2.
        let expected_shear = Vec3::new(0.0, FRAC_1_SQRT_2, FRAC_1_SQRT_2) / PI;
        assert!((stresses[b].shear - expected_shear).norm() < 1e-12);
        assert_eq!(stresses[a], stresses[b]);
    }
}
