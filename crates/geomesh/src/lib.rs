//! Geometry Entities and Mesh Orchestration
//!
//! This crate provides:
//! - Typed handles for points, curves, loops, surfaces and volumes
//! - A kernel trait abstracting the geometry-and-meshing engine
//! - Geometry sessions for the native and constructive-solid modelers
//! - Deferred mesh controls flushed in a fixed order before meshing
//! - Mesh extraction into dense point and cell arrays

pub mod config;
pub mod entity;
pub mod geometry;
pub mod kernel;
pub mod mesh;

// Re-exports for convenience
pub use config::{ConfigError, MeshOptions, SessionOptions};
pub use entity::{
    BoxShape, Circle, Curve, CurveKind, CurveLoop, Dim, Ellipsoid, Entity, HasDimTags, HasEntity,
    HasLoop, Oriented, Point, Polygon, Primitive, Surface, SurfaceKind, SurfaceLoop, Tag, Volume,
};
pub use geometry::{
    BooleanOptions, BoundaryLayer, CircleOptions, Extrusion, FieldAggregate, FieldHandle, Geo,
    Geometry, GeometryError, GeometryResult, MeshSize, Occ, PhysicalHandle, Variant,
};
pub use kernel::{
    Arrangement, Distribution, Kernel, KernelError, KernelResult, Layers, Modeler, NullKernel,
    default_kernel,
};
#[cfg(feature = "reference")]
pub use kernel::ReferenceKernel;
pub use mesh::{CellBlock, CellType, Mesh, MeshError};
