//! Composite shapes
//!
//! Value objects that keep the points, curves and surfaces they were built
//! from. They add no invariants of their own; they are what callers pass to
//! extrusion, physical groups and boolean operations.

use glam::DVec3;

use super::{
    Curve, CurveLoop, Entity, HasDimTags, HasEntity, HasLoop, Point, Surface, SurfaceLoop, Volume,
};
use crate::kernel::OccPrimitive;

/// A closed polygon, optionally filled with a plane surface
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    /// Corner points
    pub points: Vec<Point>,
    /// Edges, the last one closing back to the first point
    pub curves: Vec<Curve>,
    /// Boundary loop
    pub curve_loop: CurveLoop,
    /// Plane surface, when one was requested
    pub surface: Option<Surface>,
}

impl HasLoop for Polygon {
    fn curve_loop(&self) -> &CurveLoop {
        &self.curve_loop
    }
}

impl HasDimTags for Polygon {
    fn dim_tags(&self) -> Vec<Entity> {
        match &self.surface {
            Some(surface) => vec![surface.entity()],
            None => self.curve_loop.dim_tags(),
        }
    }
}

/// A circle built as a loop of arcs
#[derive(Debug, Clone, PartialEq)]
pub struct Circle {
    /// Center point
    pub center: Point,
    /// Radius
    pub radius: f64,
    /// Points on the circle, one per section
    pub boundary_points: Vec<Point>,
    /// Arcs between consecutive boundary points
    pub arcs: Vec<Curve>,
    /// Boundary loop
    pub curve_loop: CurveLoop,
    /// Plane surface, when one was requested
    pub surface: Option<Surface>,
}

impl HasLoop for Circle {
    fn curve_loop(&self) -> &CurveLoop {
        &self.curve_loop
    }
}

impl HasDimTags for Circle {
    fn dim_tags(&self) -> Vec<Entity> {
        match &self.surface {
            Some(surface) => vec![surface.entity()],
            None => self.curve_loop.dim_tags(),
        }
    }
}

/// An axis-aligned box assembled from native entities
#[derive(Debug, Clone, PartialEq)]
pub struct BoxShape {
    pub points: Vec<Point>,
    pub curves: Vec<Curve>,
    pub curve_loops: Vec<CurveLoop>,
    pub surfaces: Vec<Surface>,
    pub surface_loop: SurfaceLoop,
    pub volume: Option<Volume>,
}

impl HasDimTags for BoxShape {
    fn dim_tags(&self) -> Vec<Entity> {
        match &self.volume {
            Some(volume) => vec![volume.entity()],
            None => self.surfaces.dim_tags(),
        }
    }
}

/// An ellipsoid assembled from eight octant surfaces
#[derive(Debug, Clone, PartialEq)]
pub struct Ellipsoid {
    pub center: DVec3,
    pub radii: DVec3,
    pub points: Vec<Point>,
    pub arcs: Vec<Curve>,
    pub curve_loops: Vec<CurveLoop>,
    pub surfaces: Vec<Surface>,
    pub surface_loop: SurfaceLoop,
    pub volume: Option<Volume>,
}

impl HasDimTags for Ellipsoid {
    fn dim_tags(&self) -> Vec<Entity> {
        match &self.volume {
            Some(volume) => vec![volume.entity()],
            None => self.surfaces.dim_tags(),
        }
    }
}

/// A constructive-solid primitive
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    entity: Entity,
    shape: OccPrimitive,
}

impl Primitive {
    pub(crate) fn new(entity: Entity, shape: OccPrimitive) -> Self {
        Self { entity, shape }
    }

    /// Parameters the primitive was created with
    pub fn shape(&self) -> &OccPrimitive {
        &self.shape
    }
}

impl HasEntity for Primitive {
    fn entity(&self) -> Entity {
        self.entity
    }
}

impl HasDimTags for Primitive {
    fn dim_tags(&self) -> Vec<Entity> {
        vec![self.entity]
    }
}
