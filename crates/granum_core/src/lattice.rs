//! Scalar wrapping into periodic intervals and helical projections.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::types::{Vec3, ZERO_TOLERANCE};

/// Wraps `x` into `[x0, x1)` by an integral number of interval lengths.
///
/// Returns the wrapped value and the number of periods removed
/// (`x = wrapped + period * (x1 - x0)`).
pub fn periodic_wrap(x: f64, x0: f64, x1: f64) -> (f64, i64) {
    let norm = (x - x0) / (x1 - x0);
    let floor = norm.floor();
    (x0 + (norm - floor) * (x1 - x0), floor as i64)
}

/// Point expressed relative to a helix wound around a coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpiralProjection {
    /// Distance from the axis.
    pub radius: f64,
    /// Height relative to the spiral.
    pub height: f64,
    /// Polar angle in `[0, 2π)` unless a period start was given.
    pub theta: f64,
}

/// Projects `pt` onto a spiral along `axis` (0, 1 or 2).
///
/// `dh_dtheta` is the rise of the spiral per radian and `theta0` the angle
/// of zero height. Without `period_start` the height is wrapped into one
/// turn around the reference height; with it, the angle is wrapped into
/// `[period_start, period_start + 2π)` and the height unwrapped accordingly.
pub fn spiral_project(
    pt: &Vec3,
    dh_dtheta: f64,
    axis: usize,
    period_start: Option<f64>,
    theta0: f64,
) -> SpiralProjection {
    let ax1 = (axis + 1) % 3;
    let ax2 = (axis + 2) % 3;
    let radius = pt[ax1].hypot(pt[ax2]);
    let mut theta = if radius > ZERO_TOLERANCE {
        let t = (pt[ax1] / radius).acos();
        if pt[ax2] < 0.0 {
            2.0 * PI - t
        } else {
            t
        }
    } else {
        0.0
    };
    let h_ref = dh_dtheta * (theta - theta0);
    let height = match period_start {
        None => {
            let (h, _) = periodic_wrap(
                pt[axis] - h_ref,
                h_ref - PI * dh_dtheta,
                h_ref + PI * dh_dtheta,
            );
            h
        }
        Some(start) => {
            let (wrapped, period) = periodic_wrap(theta, start, start + 2.0 * PI);
            theta = wrapped;
            pt[axis] - h_ref + period as f64 * 2.0 * PI * dh_dtheta
        }
    };
    SpiralProjection {
        radius,
        height,
        theta,
    }
}

/// Incenter of the triangle `v0 v1 v2`.
pub fn inscribed_circle_center(v0: &Vec3, v1: &Vec3, v2: &Vec3) -> Vec3 {
    let a = (v1 - v0).norm();
    let b = (v2 - v0).norm();
    let perimeter = a + (v2 - v1).norm() + b;
    v0 + ((v2 - v0) * a + (v1 - v0) * b) / perimeter
}
