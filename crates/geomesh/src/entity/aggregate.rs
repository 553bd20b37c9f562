//! Closed aggregates: curve loops and surface loops

use super::{Curve, Dim, Entity, HasDimTags, HasLoop, Oriented, Tag};
use crate::geometry::{GeometryError, GeometryResult};

/// An ordered, closed chain of curves
#[derive(Debug, Clone, PartialEq)]
pub struct CurveLoop {
    id: Tag,
    curves: Vec<Oriented<Curve>>,
}

impl CurveLoop {
    pub(crate) fn new(id: Tag, curves: Vec<Oriented<Curve>>) -> Self {
        Self { id, curves }
    }

    /// Kernel tag of the loop
    pub fn id(&self) -> Tag {
        self.id
    }

    /// Member curves with their orientation
    pub fn curves(&self) -> &[Oriented<Curve>] {
        &self.curves
    }

    /// Signed curve tags as handed to the kernel
    pub fn signed_ids(&self) -> Vec<Tag> {
        self.curves.iter().map(Oriented::signed_id).collect()
    }
}

impl HasLoop for CurveLoop {
    fn curve_loop(&self) -> &CurveLoop {
        self
    }
}

impl HasDimTags for CurveLoop {
    fn dim_tags(&self) -> Vec<Entity> {
        self.curves.dim_tags()
    }
}

/// A closed shell of surfaces
///
/// Closure is left to the kernel; only the orientation of each member is
/// tracked here.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceLoop {
    id: Tag,
    surfaces: Vec<Oriented<Entity>>,
}

impl SurfaceLoop {
    pub(crate) fn new(id: Tag, surfaces: Vec<Oriented<Entity>>) -> Self {
        Self { id, surfaces }
    }

    /// Kernel tag of the loop
    pub fn id(&self) -> Tag {
        self.id
    }

    /// Member surfaces with their orientation
    pub fn surfaces(&self) -> &[Oriented<Entity>] {
        &self.surfaces
    }

    /// Signed surface tags as handed to the kernel
    pub fn signed_ids(&self) -> Vec<Tag> {
        self.surfaces.iter().map(Oriented::signed_id).collect()
    }
}

impl HasDimTags for SurfaceLoop {
    fn dim_tags(&self) -> Vec<Entity> {
        self.surfaces.iter().map(|s| *s.item()).collect()
    }
}

/// Verify that consecutive curves share end points and the chain closes.
///
/// Two end points match when they are the same kernel point, or when their
/// creation coordinates lie within `tolerance` of each other.
pub(crate) fn check_closure(curves: &[Oriented<Curve>], tolerance: f64) -> GeometryResult<()> {
    if curves.is_empty() {
        return Err(GeometryError::EmptyInput("curve loop needs at least one curve"));
    }

    for (index, curve) in curves.iter().enumerate() {
        let next = (index + 1) % curves.len();
        let (Some(end), Some(start)) = (curve.end(), curves[next].start()) else {
            return Err(GeometryError::InvalidArgument(format!(
                "curve {} has no end points",
                curve.item().id()
            )));
        };

        let coincident = end.id() == start.id()
            || end.coordinates().distance(start.coordinates()) <= tolerance;
        if !coincident {
            return Err(GeometryError::OpenCurveLoop {
                index,
                next,
                end: end.id(),
                start: start.id(),
            });
        }
    }

    Ok(())
}

/// Check that every entity shares the dimension of the first one.
pub(crate) fn common_dim(entities: &[Entity]) -> GeometryResult<Dim> {
    let first = entities
        .first()
        .ok_or(GeometryError::EmptyInput("at least one entity is required"))?;
    if let Some(other) = entities.iter().find(|e| e.dim != first.dim) {
        return Err(GeometryError::DimensionMismatch {
            expected: first.dim,
            found: other.dim,
            id: other.id,
        });
    }
    Ok(first.dim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{CurveKind, Point};
    use glam::DVec3;

    fn point(id: Tag, x: f64, y: f64) -> Point {
        Point::new(id, DVec3::new(x, y, 0.0), None)
    }

    fn line(id: Tag, a: Point, b: Point) -> Curve {
        Curve::new(id, CurveKind::Line, vec![a, b])
    }

    fn square() -> Vec<Curve> {
        let p = [
            point(1, 0.0, 0.0),
            point(2, 1.0, 0.0),
            point(3, 1.0, 1.0),
            point(4, 0.0, 1.0),
        ];
        (0..4)
            .map(|k| line(k as Tag + 1, p[k], p[(k + 1) % 4]))
            .collect()
    }

    #[test]
    fn test_closed_chain_passes() {
        let curves: Vec<Oriented<Curve>> = square().into_iter().map(Oriented::from).collect();
        assert!(check_closure(&curves, 0.0).is_ok());
    }

    #[test]
    fn test_reversed_members_close() {
        let lines = square();
        // Walk the square backwards: every member reversed, order reversed.
        let curves: Vec<Oriented<Curve>> = lines.iter().rev().map(|c| -c).collect();
        assert!(check_closure(&curves, 0.0).is_ok());
    }

    #[test]
    fn test_open_chain_fails() {
        let lines = square();
        let curves: Vec<Oriented<Curve>> = lines[..3].iter().map(Oriented::from).collect();
        let err = check_closure(&curves, 1e-12).unwrap_err();
        match err {
            GeometryError::OpenCurveLoop { index, next, .. } => {
                assert_eq!(index, 2);
                assert_eq!(next, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_wrong_orientation_fails() {
        let lines = square();
        let mut curves: Vec<Oriented<Curve>> = lines.iter().map(Oriented::from).collect();
        curves[1] = -curves[1].clone();
        assert!(check_closure(&curves, 1e-12).is_err());
    }

    #[test]
    fn test_coincident_coordinates_close() {
        let a = point(1, 0.0, 0.0);
        let b = point(2, 1.0, 0.0);
        let b_twin = point(5, 1.0, 0.0);
        let c = point(3, 0.0, 1.0);
        let curves: Vec<Oriented<Curve>> = vec![
            Oriented::from(line(1, a, b)),
            Oriented::from(line(2, b_twin, c)),
            Oriented::from(line(3, c, a)),
        ];
        assert!(check_closure(&curves, 1e-9).is_ok());
    }

    #[test]
    fn test_common_dim() {
        let a = Entity::new(Dim::Curve, 1);
        let b = Entity::new(Dim::Surface, 2);
        assert_eq!(common_dim(&[a, a]).unwrap(), Dim::Curve);
        assert!(matches!(
            common_dim(&[a, b]),
            Err(GeometryError::DimensionMismatch { id: 2, .. })
        ));
        assert!(common_dim(&[]).is_err());
    }
}
