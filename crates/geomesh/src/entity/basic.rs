//! Elementary entities: points, curves, surfaces, volumes

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::{CurveLoop, Dim, Entity, HasDimTags, HasEntity, SurfaceLoop, Tag};

/// A kernel point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    id: Tag,
    x: DVec3,
    mesh_size: Option<f64>,
}

impl Point {
    pub(crate) fn new(id: Tag, x: DVec3, mesh_size: Option<f64>) -> Self {
        Self { id, x, mesh_size }
    }

    /// Kernel tag
    pub fn id(&self) -> Tag {
        self.id
    }

    /// Coordinates at creation time
    ///
    /// Transforms applied later are only visible through
    /// [`Geometry::point_coordinates`](crate::Geometry::point_coordinates).
    pub fn coordinates(&self) -> DVec3 {
        self.x
    }

    /// Characteristic mesh size requested at creation
    pub fn mesh_size(&self) -> Option<f64> {
        self.mesh_size
    }
}

/// How a curve was constructed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveKind {
    /// Straight segment
    Line,
    /// Circle arc through start, center and end
    CircleArc,
    /// Ellipse arc through start, center, major-axis point and end
    EllipseArc,
    /// Interpolating spline
    Spline,
    /// B-spline over control points
    BSpline,
    /// Bezier curve over control points
    Bezier,
    /// Produced by the kernel (extrusion, copy, boolean)
    Derived,
}

/// A kernel curve
///
/// `points` holds the defining points in construction order; the first and
/// last are always the curve's end points.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    id: Tag,
    kind: CurveKind,
    points: Vec<Point>,
}

impl Curve {
    pub(crate) fn new(id: Tag, kind: CurveKind, points: Vec<Point>) -> Self {
        Self { id, kind, points }
    }

    /// Kernel tag
    pub fn id(&self) -> Tag {
        self.id
    }

    /// Construction kind
    pub fn kind(&self) -> CurveKind {
        self.kind
    }

    /// Defining points
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Start point
    pub fn start(&self) -> Option<&Point> {
        self.points.first()
    }

    /// End point
    pub fn end(&self) -> Option<&Point> {
        self.points.last()
    }
}

/// How a surface was constructed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceKind {
    /// Plane surface bounded by a curve loop and optional holes
    Plane,
    /// Filling surface spanning a curve loop
    Filling,
}

/// A kernel surface
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    id: Tag,
    kind: SurfaceKind,
    curve_loop: CurveLoop,
    holes: Vec<CurveLoop>,
}

impl Surface {
    pub(crate) fn new(id: Tag, kind: SurfaceKind, curve_loop: CurveLoop, holes: Vec<CurveLoop>) -> Self {
        Self {
            id,
            kind,
            curve_loop,
            holes,
        }
    }

    /// Kernel tag
    pub fn id(&self) -> Tag {
        self.id
    }

    /// Construction kind
    pub fn kind(&self) -> SurfaceKind {
        self.kind
    }

    /// Outer boundary
    pub fn curve_loop(&self) -> &CurveLoop {
        &self.curve_loop
    }

    /// Inner boundaries
    pub fn holes(&self) -> &[CurveLoop] {
        &self.holes
    }
}

/// A kernel volume
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    id: Tag,
    surface_loop: SurfaceLoop,
    holes: Vec<SurfaceLoop>,
}

impl Volume {
    pub(crate) fn new(id: Tag, surface_loop: SurfaceLoop, holes: Vec<SurfaceLoop>) -> Self {
        Self {
            id,
            surface_loop,
            holes,
        }
    }

    /// Kernel tag
    pub fn id(&self) -> Tag {
        self.id
    }

    /// Outer shell
    pub fn surface_loop(&self) -> &SurfaceLoop {
        &self.surface_loop
    }

    /// Inner shells
    pub fn holes(&self) -> &[SurfaceLoop] {
        &self.holes
    }
}

macro_rules! impl_entity {
    ($ty:ty, $dim:expr) => {
        impl HasEntity for $ty {
            fn entity(&self) -> Entity {
                Entity::new($dim, self.id)
            }
        }

        impl HasDimTags for $ty {
            fn dim_tags(&self) -> Vec<Entity> {
                vec![self.entity()]
            }
        }
    };
}

impl_entity!(Point, Dim::Point);
impl_entity!(Curve, Dim::Curve);
impl_entity!(Surface, Dim::Surface);
impl_entity!(Volume, Dim::Volume);
