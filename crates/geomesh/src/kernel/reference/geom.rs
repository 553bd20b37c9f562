//! Curve evaluation and rigid/affine maps

use glam::{DAffine3, DMat3, DVec3};

use super::model::{CurveShape, Model};
use crate::entity::Tag;
use crate::kernel::{KernelError, KernelResult, Sweep, Transform, rotate_about};

const EPS: f64 = 1e-12;

/// Point at parameter `t` in `[0, 1]` along a curve shape
pub(super) fn curve_point(model: &Model, shape: &CurveShape, t: f64) -> KernelResult<DVec3> {
    match shape {
        CurveShape::Line { start, end } => {
            Ok(model.position(*start)?.lerp(model.position(*end)?, t))
        }
        CurveShape::CircleArc { start, center, end } => {
            let c = model.position(*center)?;
            let a = model.position(*start)? - c;
            let b = model.position(*end)? - c;
            let axis = a.cross(b);
            if axis.length() <= EPS * a.length().max(1.0) * b.length().max(1.0) {
                return Err(KernelError::InvalidInput(
                    "circle arc must span less than half a turn".into(),
                ));
            }
            let angle = a.angle_between(b);
            let radius = a.length() + (b.length() - a.length()) * t;
            let dir = rotate_about(a, DVec3::ZERO, axis, angle * t).normalize_or_zero();
            Ok(c + dir * radius)
        }
        CurveShape::EllipseArc {
            start,
            center,
            major,
            end,
        } => {
            let c = model.position(*center)?;
            ellipse_point(
                model.position(*start)? - c,
                model.position(*major)? - c,
                model.position(*end)? - c,
                t,
            )
            .map(|p| c + p)
        }
        CurveShape::Spline(points) => {
            let xs = positions(model, points)?;
            Ok(catmull_rom(&xs, t))
        }
        CurveShape::BSpline(points) => {
            let xs = positions(model, points)?;
            Ok(bspline(&xs, t))
        }
        CurveShape::Bezier(points) => {
            let xs = positions(model, points)?;
            Ok(bezier(&xs, t))
        }
        CurveShape::Swept { from, sweep, .. } => Ok(sweep.apply(model.position(*from)?, t)),
    }
}

fn positions(model: &Model, points: &[Tag]) -> KernelResult<Vec<DVec3>> {
    points.iter().map(|p| model.position(*p)).collect()
}

/// Ellipse arc relative to its center; the major axis runs through `major`
fn ellipse_point(s: DVec3, major: DVec3, e: DVec3, t: f64) -> KernelResult<DVec3> {
    let u = major.normalize_or_zero();
    if u == DVec3::ZERO {
        return Err(KernelError::InvalidInput(
            "ellipse major axis point coincides with the center".into(),
        ));
    }
    let mut normal = s.cross(e);
    if normal.length_squared() <= EPS {
        normal = if u.cross(s).length_squared() > EPS {
            u.cross(s)
        } else {
            u.cross(e)
        };
    }
    if normal.length_squared() <= EPS {
        return Err(KernelError::InvalidInput(
            "ellipse arc points are collinear".into(),
        ));
    }
    let v = normal.cross(u).normalize();

    let (sx, sy) = (s.dot(u), s.dot(v));
    let (ex, ey) = (e.dot(u), e.dot(v));

    // x^2 p + y^2 q = 1 for both end points, p = 1/a^2, q = 1/b^2
    let (p, q) = if sy.abs() <= EPS.sqrt() * s.length() {
        let p = 1.0 / (sx * sx);
        (p, (1.0 - ex * ex * p) / (ey * ey))
    } else if ey.abs() <= EPS.sqrt() * e.length() {
        let p = 1.0 / (ex * ex);
        (p, (1.0 - sx * sx * p) / (sy * sy))
    } else {
        let det = sx * sx * ey * ey - ex * ex * sy * sy;
        if det.abs() <= EPS {
            // Same radius at both ends: treat as a circle through them
            let r2 = s.length_squared();
            (1.0 / r2, 1.0 / r2)
        } else {
            ((ey * ey - sy * sy) / det, (sx * sx - ex * ex) / det)
        }
    };
    if !(p > 0.0 && q > 0.0 && p.is_finite() && q.is_finite()) {
        return Err(KernelError::InvalidInput(
            "ellipse arc end points do not lie on a common ellipse".into(),
        ));
    }
    let (a, b) = (p.sqrt().recip(), q.sqrt().recip());

    let phi_s = (sy / b).atan2(sx / a);
    let phi_e = (ey / b).atan2(ex / a);
    let mut delta = phi_e - phi_s;
    if delta > std::f64::consts::PI {
        delta -= std::f64::consts::TAU;
    } else if delta <= -std::f64::consts::PI {
        delta += std::f64::consts::TAU;
    }
    let phi = phi_s + delta * t;
    Ok(u * a * phi.cos() + v * b * phi.sin())
}

/// Interpolating spline through all points
fn catmull_rom(xs: &[DVec3], t: f64) -> DVec3 {
    match xs.len() {
        0 => DVec3::ZERO,
        1 => xs[0],
        n => {
            let segments = (n - 1) as f64;
            let s = (t.clamp(0.0, 1.0) * segments).min(segments - 1e-12);
            let k = s.floor() as usize;
            let u = s - k as f64;
            let p0 = xs[k.saturating_sub(1)];
            let p1 = xs[k];
            let p2 = xs[(k + 1).min(n - 1)];
            let p3 = xs[(k + 2).min(n - 1)];
            let (u2, u3) = (u * u, u * u * u);
            0.5 * (2.0 * p1
                + (p2 - p0) * u
                + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * u2
                + (3.0 * p1 - p0 - 3.0 * p2 + p3) * u3)
        }
    }
}

/// Clamped uniform B-spline of degree up to three
fn bspline(xs: &[DVec3], t: f64) -> DVec3 {
    let n = xs.len();
    if n < 2 {
        return xs.first().copied().unwrap_or_default();
    }
    let degree = (n - 1).min(3);
    let spans = n - degree;
    let mut knots = vec![0.0; degree + 1];
    knots.extend((1..spans).map(|k| k as f64 / spans as f64));
    knots.extend(std::iter::repeat_n(1.0, degree + 1));

    let t = t.clamp(0.0, 1.0);
    let mut span = degree;
    while span < n - 1 && knots[span + 1] <= t {
        span += 1;
    }

    // de Boor
    let mut d: Vec<DVec3> = (0..=degree).map(|j| xs[j + span - degree]).collect();
    for r in 1..=degree {
        for j in (r..=degree).rev() {
            let i = j + span - degree;
            let denom = knots[i + degree + 1 - r] - knots[i];
            let alpha = if denom > 0.0 { (t - knots[i]) / denom } else { 0.0 };
            d[j] = d[j - 1].lerp(d[j], alpha);
        }
    }
    d[degree]
}

fn bezier(xs: &[DVec3], t: f64) -> DVec3 {
    let mut work = xs.to_vec();
    for level in (1..work.len()).rev() {
        for k in 0..level {
            work[k] = work[k].lerp(work[k + 1], t);
        }
    }
    work.first().copied().unwrap_or_default()
}

/// Affine map of an in-place transform
pub(super) fn affine(transform: &Transform) -> KernelResult<DAffine3> {
    match *transform {
        Transform::Translate { vector } => Ok(DAffine3::from_translation(vector)),
        Transform::Rotate { point, axis, angle } => {
            let axis = axis.try_normalize().ok_or_else(|| {
                KernelError::InvalidInput("rotation axis must be non-zero".into())
            })?;
            Ok(DAffine3::from_translation(point)
                * DAffine3::from_axis_angle(axis, angle)
                * DAffine3::from_translation(-point))
        }
        Transform::Dilate { center, factors } => Ok(DAffine3::from_translation(center)
            * DAffine3::from_scale(factors)
            * DAffine3::from_translation(-center)),
        Transform::Mirror { plane } | Transform::Symmetrize { plane } => {
            let n = DVec3::new(plane[0], plane[1], plane[2]);
            let len = n.length();
            if len <= EPS {
                return Err(KernelError::InvalidInput(
                    "mirror plane normal must be non-zero".into(),
                ));
            }
            let n = n / len;
            let d = plane[3] / len;
            let linear = DMat3::from_cols(
                DVec3::X - 2.0 * n.x * n,
                DVec3::Y - 2.0 * n.y * n,
                DVec3::Z - 2.0 * n.z * n,
            );
            Ok(DAffine3::from_mat3_translation(linear, -2.0 * d * n))
        }
    }
}

/// Rigid map taking every point to its position at the end of a sweep
pub(super) fn sweep_affine(sweep: &Sweep) -> DAffine3 {
    let rotation = |point: DVec3, axis: DVec3, angle: f64| match axis.try_normalize() {
        Some(axis) => {
            DAffine3::from_translation(point)
                * DAffine3::from_axis_angle(axis, angle)
                * DAffine3::from_translation(-point)
        }
        None => DAffine3::IDENTITY,
    };
    match *sweep {
        Sweep::Translate { vector } => DAffine3::from_translation(vector),
        Sweep::Rotate { point, axis, angle } => rotation(point, axis, angle),
        Sweep::Twist {
            point,
            translation,
            axis,
            angle,
        } => DAffine3::from_translation(translation) * rotation(point, axis, angle),
    }
}

/// Carry a sweep along with the entities it was applied to
pub(super) fn transform_sweep(sweep: &Sweep, map: &DAffine3) -> Sweep {
    let handedness = map.matrix3.determinant().signum();
    match *sweep {
        Sweep::Translate { vector } => Sweep::Translate {
            vector: map.transform_vector3(vector),
        },
        Sweep::Rotate { point, axis, angle } => Sweep::Rotate {
            point: map.transform_point3(point),
            axis: map.transform_vector3(axis),
            angle: angle * handedness,
        },
        Sweep::Twist {
            point,
            translation,
            axis,
            angle,
        } => Sweep::Twist {
            point: map.transform_point3(point),
            translation: map.transform_vector3(translation),
            axis: map.transform_vector3(axis),
            angle: angle * handedness,
        },
    }
}
