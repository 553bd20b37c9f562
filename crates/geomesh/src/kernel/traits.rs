//! Geometry kernel trait definitions
//!
//! These traits define the interface every geometry-and-meshing kernel must
//! implement. The orchestrator only issues these calls and reads back tags;
//! all geometric and meshing math lives behind this boundary.

use std::fmt;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::{Dim, Entity, Oriented, Tag};

/// Which modeling engine of the kernel receives a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modeler {
    /// Native curve/surface based modeler
    Geo,
    /// Constructive-solid modeler
    Occ,
}

impl fmt::Display for Modeler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modeler::Geo => f.write_str("geo"),
            Modeler::Occ => f.write_str("occ"),
        }
    }
}

/// Error type for kernel operations
#[derive(Debug, Clone, Error)]
pub enum KernelError {
    #[error("Kernel not available: {0}")]
    NotAvailable(String),

    #[error("Unsupported by kernel: {0}")]
    Unsupported(String),

    #[error("Unknown entity: {0}")]
    UnknownEntity(Entity),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

/// Result type for kernel operations
pub type KernelResult<T> = Result<T, KernelError>;

/// How an extrusion moves its source entities
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Sweep {
    /// Straight translation
    Translate {
        /// Translation vector
        vector: DVec3,
    },
    /// Rotation about an axis
    Rotate {
        /// Point on the rotation axis
        point: DVec3,
        /// Axis direction
        axis: DVec3,
        /// Rotation angle in radians
        angle: f64,
    },
    /// Simultaneous translation and rotation
    Twist {
        /// Point on the rotation axis
        point: DVec3,
        /// Translation vector
        translation: DVec3,
        /// Axis direction
        axis: DVec3,
        /// Rotation angle in radians
        angle: f64,
    },
}

impl Sweep {
    /// Position of `x` after sweeping a fraction `t` in `[0, 1]` of the way
    pub fn apply(&self, x: DVec3, t: f64) -> DVec3 {
        match *self {
            Sweep::Translate { vector } => x + vector * t,
            Sweep::Rotate { point, axis, angle } => rotate_about(x, point, axis, angle * t),
            Sweep::Twist {
                point,
                translation,
                axis,
                angle,
            } => rotate_about(x, point, axis, angle * t) + translation * t,
        }
    }
}

/// Rotate `x` about the axis through `point` along `axis` (Rodrigues).
pub fn rotate_about(x: DVec3, point: DVec3, axis: DVec3, angle: f64) -> DVec3 {
    let k = axis.normalize_or_zero();
    let v = x - point;
    let (sin, cos) = angle.sin_cos();
    point + v * cos + k.cross(v) * sin + k * k.dot(v) * (1.0 - cos)
}

/// Structured layering of an extrusion
///
/// An empty layer list leaves the extruded entities unstructured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layers {
    /// Number of element layers per band
    pub counts: Vec<usize>,
    /// Cumulative relative height at the top of each band
    pub heights: Vec<f64>,
}

impl Layers {
    /// No structured layering
    pub fn none() -> Self {
        Self::default()
    }

    /// `count` equal layers across the full extrusion
    pub fn uniform(count: usize) -> Self {
        Self {
            counts: vec![count],
            heights: Vec::new(),
        }
    }

    /// Bands of layers ending at the given cumulative heights
    pub fn graded(counts: Vec<usize>, heights: Vec<f64>) -> Self {
        Self { counts, heights }
    }

    /// Whether any layering was requested
    pub fn is_structured(&self) -> bool {
        !self.counts.is_empty()
    }

    /// Total number of element layers
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// In-place transforms that keep entity tags
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Transform {
    Translate {
        vector: DVec3,
    },
    Rotate {
        point: DVec3,
        axis: DVec3,
        angle: f64,
    },
    /// Scale about a center, per axis
    Dilate {
        center: DVec3,
        factors: DVec3,
    },
    /// Reflect through the plane `a*x + b*y + c*z + d = 0`
    Mirror {
        plane: [f64; 4],
    },
    /// Same as [`Transform::Mirror`] under the native modeler's name
    Symmetrize {
        plane: [f64; 4],
    },
}

/// Boolean operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BooleanOp {
    /// Fuse operands together
    Union,
    /// Keep the common part
    Intersection,
    /// Remove tools from objects
    Difference,
    /// Split all operands against each other, keeping every piece
    Fragments,
}

impl fmt::Display for BooleanOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BooleanOp::Union => "union",
            BooleanOp::Intersection => "intersection",
            BooleanOp::Difference => "difference",
            BooleanOp::Fragments => "fragments",
        };
        f.write_str(name)
    }
}

/// Constructive-solid primitives
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OccPrimitive {
    Rectangle {
        corner: DVec3,
        dx: f64,
        dy: f64,
        corner_radius: f64,
    },
    Disk {
        center: DVec3,
        rx: f64,
        ry: f64,
    },
    Box {
        corner: DVec3,
        extents: DVec3,
    },
    Sphere {
        center: DVec3,
        radius: f64,
        angle1: f64,
        angle2: f64,
        angle3: f64,
    },
    Cylinder {
        base: DVec3,
        axis: DVec3,
        radius: f64,
        angle: f64,
    },
    Cone {
        base: DVec3,
        axis: DVec3,
        r0: f64,
        r1: f64,
        angle: f64,
    },
    Torus {
        center: DVec3,
        r0: f64,
        r1: f64,
        angle: f64,
    },
    Wedge {
        corner: DVec3,
        extents: DVec3,
        top_x: f64,
    },
}

impl OccPrimitive {
    /// Dimension of the entity the primitive creates
    pub fn dim(&self) -> Dim {
        match self {
            OccPrimitive::Rectangle { .. } | OccPrimitive::Disk { .. } => Dim::Surface,
            _ => Dim::Volume,
        }
    }
}

/// Node distribution along a transfinite curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Distribution {
    /// Geometric progression of spacings
    #[default]
    Progression,
    /// Refined towards both ends
    Bump,
    /// Beta-law refinement
    Beta,
}

/// Triangle arrangement on a transfinite surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Arrangement {
    #[default]
    Left,
    Right,
    AlternateLeft,
    AlternateRight,
    Alternate,
}

/// Mesh nodes as read back from the kernel
#[derive(Debug, Clone, Default)]
pub struct NodeSet {
    /// Kernel node tags, not necessarily dense or sorted
    pub tags: Vec<usize>,
    /// Coordinates, one entry per tag
    pub coordinates: Vec<[f64; 3]>,
}

/// Elements of one type on one entity
#[derive(Debug, Clone, Default)]
pub struct ElementBlock {
    /// Kernel element type code
    pub element_type: i32,
    /// Kernel element tags
    pub element_tags: Vec<usize>,
    /// Node tags, `num_nodes` per element
    pub node_tags: Vec<usize>,
}

/// Static description of an element type
#[derive(Debug, Clone, PartialEq)]
pub struct ElementProperties {
    pub name: String,
    pub dim: usize,
    pub order: usize,
    pub num_nodes: usize,
}

/// Mesh size callback: `(dim, tag, position, current size) -> size`
pub type SizeCallback = Box<dyn Fn(Dim, Tag, DVec3, f64) -> f64>;

/// The geometry-and-meshing kernel
///
/// Entity-creating and transform calls take the [`Modeler`] that should
/// receive them. Capabilities that not every kernel offers have default
/// bodies that fail with [`KernelError::Unsupported`].
pub trait Kernel {
    /// Get the name of this kernel
    fn name(&self) -> &str;

    /// Check if the kernel is available
    fn is_available(&self) -> bool;

    // ========== Session ==========

    /// Start a kernel session
    fn initialize(&mut self) -> KernelResult<()>;

    /// End the kernel session, releasing all model state
    fn finalize(&mut self) -> KernelResult<()>;

    /// Create a new, current model
    fn add_model(&mut self, name: &str) -> KernelResult<()>;

    /// Set a global numeric option
    fn set_option_number(&mut self, name: &str, value: f64) -> KernelResult<()>;

    /// Commit pending geometry edits of a modeler; tags are stable afterwards
    fn synchronize(&mut self, modeler: Modeler) -> KernelResult<()>;

    // ========== Entity factories ==========

    /// Add a point; a `mesh_size` of zero leaves the size unset
    fn add_point(&mut self, modeler: Modeler, x: DVec3, mesh_size: f64) -> KernelResult<Tag>;

    fn add_line(&mut self, modeler: Modeler, start: Tag, end: Tag) -> KernelResult<Tag>;

    fn add_circle_arc(
        &mut self,
        modeler: Modeler,
        start: Tag,
        center: Tag,
        end: Tag,
    ) -> KernelResult<Tag>;

    fn add_ellipse_arc(
        &mut self,
        modeler: Modeler,
        start: Tag,
        center: Tag,
        major: Tag,
        end: Tag,
    ) -> KernelResult<Tag>;

    fn add_spline(&mut self, modeler: Modeler, points: &[Tag]) -> KernelResult<Tag>;

    fn add_bspline(&mut self, modeler: Modeler, points: &[Tag]) -> KernelResult<Tag>;

    fn add_bezier(&mut self, modeler: Modeler, points: &[Tag]) -> KernelResult<Tag>;

    /// Add a curve loop from signed curve tags
    fn add_curve_loop(&mut self, modeler: Modeler, curves: &[Tag]) -> KernelResult<Tag>;

    /// Add a plane surface; the first loop is the outer boundary, the rest are holes
    fn add_plane_surface(&mut self, modeler: Modeler, loops: &[Tag]) -> KernelResult<Tag>;

    fn add_surface_filling(&mut self, modeler: Modeler, curve_loop: Tag) -> KernelResult<Tag>;

    /// Add a surface loop from signed surface tags
    fn add_surface_loop(&mut self, modeler: Modeler, surfaces: &[Tag]) -> KernelResult<Tag>;

    /// Add a volume; the first shell is the outer boundary, the rest are holes
    fn add_volume(&mut self, modeler: Modeler, shells: &[Tag]) -> KernelResult<Tag>;

    /// Add a constructive-solid primitive
    fn add_primitive(&mut self, primitive: &OccPrimitive) -> KernelResult<Tag> {
        let _ = primitive;
        Err(KernelError::Unsupported(format!(
            "{}: solid primitives",
            self.name()
        )))
    }

    // ========== Derivation and transforms ==========

    /// Extrude entities along a sweep
    ///
    /// For every input the output holds the top entity, then the extruded
    /// body, then the lateral entities.
    ///
    /// # Arguments
    /// * `modeler` - Receiving modeler
    /// * `entities` - Source entities
    /// * `sweep` - Translation, rotation or twist
    /// * `layers` - Structured layering (empty for none)
    /// * `recombine` - Whether layered elements are recombined into quads
    fn extrude(
        &mut self,
        modeler: Modeler,
        entities: &[Entity],
        sweep: &Sweep,
        layers: &Layers,
        recombine: bool,
    ) -> KernelResult<Vec<Entity>>;

    /// Apply an in-place transform
    fn transform(
        &mut self,
        modeler: Modeler,
        entities: &[Entity],
        transform: &Transform,
    ) -> KernelResult<()>;

    /// Duplicate entities, returning the copies
    fn copy(&mut self, modeler: Modeler, entities: &[Entity]) -> KernelResult<Vec<Entity>>;

    /// Delete entities, and their unused boundaries when `recursive`
    fn remove(&mut self, modeler: Modeler, entities: &[Entity], recursive: bool)
    -> KernelResult<()>;

    /// Boolean operation between object and tool entities
    ///
    /// # Arguments
    /// * `op` - Operation type
    /// * `objects` - Object entities
    /// * `tools` - Tool entities
    /// * `remove_object` - Delete the objects afterwards
    /// * `remove_tool` - Delete the tools afterwards
    fn boolean(
        &mut self,
        op: BooleanOp,
        objects: &[Entity],
        tools: &[Entity],
        remove_object: bool,
        remove_tool: bool,
    ) -> KernelResult<Vec<Entity>> {
        let _ = (objects, tools, remove_object, remove_tool);
        Err(KernelError::Unsupported(format!(
            "{}: boolean {op}",
            self.name()
        )))
    }

    // ========== Queries ==========

    /// Boundary of the given entities
    ///
    /// # Arguments
    /// * `entities` - Entities to query
    /// * `combined` - Return the boundary of the union instead of each entity
    /// * `oriented` - Keep boundary orientation
    /// * `recursive` - Descend to points
    fn get_boundary(
        &self,
        entities: &[Entity],
        combined: bool,
        oriented: bool,
        recursive: bool,
    ) -> KernelResult<Vec<Oriented<Entity>>>;

    /// All entities, or those of one dimension
    fn get_entities(&self, dim: Option<Dim>) -> Vec<Entity>;

    /// Current coordinates of a point
    fn point_coordinates(&self, tag: Tag) -> KernelResult<DVec3>;

    // ========== Mesh controls ==========

    /// Set the mesh size at points
    fn set_size(&mut self, points: &[Entity], size: f64) -> KernelResult<()>;

    fn field_add(&mut self, kind: &str) -> KernelResult<Tag> {
        Err(KernelError::Unsupported(format!(
            "{}: size field {kind}",
            self.name()
        )))
    }

    fn field_set_number(&mut self, field: Tag, option: &str, value: f64) -> KernelResult<()> {
        let _ = (field, value);
        Err(KernelError::Unsupported(format!(
            "{}: field option {option}",
            self.name()
        )))
    }

    fn field_set_numbers(&mut self, field: Tag, option: &str, values: &[f64]) -> KernelResult<()> {
        let _ = (field, values);
        Err(KernelError::Unsupported(format!(
            "{}: field option {option}",
            self.name()
        )))
    }

    fn field_set_as_background_mesh(&mut self, field: Tag) -> KernelResult<()> {
        let _ = field;
        Err(KernelError::Unsupported(format!(
            "{}: background mesh",
            self.name()
        )))
    }

    fn set_size_callback(&mut self, callback: SizeCallback) -> KernelResult<()> {
        let _ = callback;
        Err(KernelError::Unsupported(format!(
            "{}: size callback",
            self.name()
        )))
    }

    /// Drop any installed size callback; a no-op when none is installed
    fn remove_size_callback(&mut self) -> KernelResult<()> {
        Ok(())
    }

    fn set_transfinite_curve(
        &mut self,
        tag: Tag,
        num_nodes: usize,
        distribution: Distribution,
        coefficient: f64,
    ) -> KernelResult<()> {
        let _ = (tag, num_nodes, distribution, coefficient);
        Err(KernelError::Unsupported(format!(
            "{}: transfinite curves",
            self.name()
        )))
    }

    fn set_transfinite_surface(
        &mut self,
        tag: Tag,
        arrangement: Arrangement,
        corners: &[Tag],
    ) -> KernelResult<()> {
        let _ = (tag, arrangement, corners);
        Err(KernelError::Unsupported(format!(
            "{}: transfinite surfaces",
            self.name()
        )))
    }

    fn set_transfinite_volume(&mut self, tag: Tag, corners: &[Tag]) -> KernelResult<()> {
        let _ = (tag, corners);
        Err(KernelError::Unsupported(format!(
            "{}: transfinite volumes",
            self.name()
        )))
    }

    fn set_recombine(&mut self, dim: Dim, tag: Tag) -> KernelResult<()> {
        let _ = (dim, tag);
        Err(KernelError::Unsupported(format!(
            "{}: recombination",
            self.name()
        )))
    }

    fn set_compound(&mut self, dim: Dim, tags: &[Tag]) -> KernelResult<()> {
        let _ = (dim, tags);
        Err(KernelError::Unsupported(format!(
            "{}: compound entities",
            self.name()
        )))
    }

    /// Embed lower-dimensional entities in a host so the mesh conforms to them
    fn embed(&mut self, dim: Dim, tags: &[Tag], host_dim: Dim, host: Tag) -> KernelResult<()> {
        let _ = (dim, tags, host_dim, host);
        Err(KernelError::Unsupported(format!(
            "{}: embedding",
            self.name()
        )))
    }

    fn set_outward_orientation(&mut self, volume: Tag) -> KernelResult<()> {
        let _ = volume;
        Err(KernelError::Unsupported(format!(
            "{}: outward orientation",
            self.name()
        )))
    }

    fn set_order(&mut self, order: usize) -> KernelResult<()> {
        Err(KernelError::Unsupported(format!(
            "{}: element order {order}",
            self.name()
        )))
    }

    // ========== Physical groups ==========

    fn add_physical_group(&mut self, dim: Dim, tags: &[Tag]) -> KernelResult<Tag>;

    fn set_physical_name(&mut self, dim: Dim, tag: Tag, name: &str) -> KernelResult<()>;

    fn get_physical_groups(&self) -> Vec<Entity>;

    fn get_physical_name(&self, dim: Dim, tag: Tag) -> KernelResult<String>;

    fn get_entities_for_physical_group(&self, dim: Dim, tag: Tag) -> KernelResult<Vec<Tag>>;

    // ========== Mesh generation and readback ==========

    /// Generate the mesh up to the given dimension
    fn generate(&mut self, dim: Dim) -> KernelResult<()>;

    /// All mesh nodes
    fn get_nodes(&self) -> KernelResult<NodeSet>;

    /// Element blocks classified on one entity
    fn get_elements(&self, dim: Dim, tag: Tag) -> KernelResult<Vec<ElementBlock>>;

    /// Properties of an element type code
    fn get_element_properties(&self, element_type: i32) -> KernelResult<ElementProperties>;
}

/// A null kernel that always returns errors (used when no kernel is available)
#[derive(Debug, Default)]
pub struct NullKernel;

impl NullKernel {
    fn unavailable<T>() -> KernelResult<T> {
        Err(KernelError::NotAvailable("No geometry kernel available".into()))
    }
}

impl Kernel for NullKernel {
    fn name(&self) -> &str {
        "null"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn initialize(&mut self) -> KernelResult<()> {
        Self::unavailable()
    }

    fn finalize(&mut self) -> KernelResult<()> {
        Self::unavailable()
    }

    fn add_model(&mut self, _name: &str) -> KernelResult<()> {
        Self::unavailable()
    }

    fn set_option_number(&mut self, _name: &str, _value: f64) -> KernelResult<()> {
        Self::unavailable()
    }

    fn synchronize(&mut self, _modeler: Modeler) -> KernelResult<()> {
        Self::unavailable()
    }

    fn add_point(&mut self, _modeler: Modeler, _x: DVec3, _mesh_size: f64) -> KernelResult<Tag> {
        Self::unavailable()
    }

    fn add_line(&mut self, _modeler: Modeler, _start: Tag, _end: Tag) -> KernelResult<Tag> {
        Self::unavailable()
    }

    fn add_circle_arc(
        &mut self,
        _modeler: Modeler,
        _start: Tag,
        _center: Tag,
        _end: Tag,
    ) -> KernelResult<Tag> {
        Self::unavailable()
    }

    fn add_ellipse_arc(
        &mut self,
        _modeler: Modeler,
        _start: Tag,
        _center: Tag,
        _major: Tag,
        _end: Tag,
    ) -> KernelResult<Tag> {
        Self::unavailable()
    }

    fn add_spline(&mut self, _modeler: Modeler, _points: &[Tag]) -> KernelResult<Tag> {
        Self::unavailable()
    }

    fn add_bspline(&mut self, _modeler: Modeler, _points: &[Tag]) -> KernelResult<Tag> {
        Self::unavailable()
    }

    fn add_bezier(&mut self, _modeler: Modeler, _points: &[Tag]) -> KernelResult<Tag> {
        Self::unavailable()
    }

    fn add_curve_loop(&mut self, _modeler: Modeler, _curves: &[Tag]) -> KernelResult<Tag> {
        Self::unavailable()
    }

    fn add_plane_surface(&mut self, _modeler: Modeler, _loops: &[Tag]) -> KernelResult<Tag> {
        Self::unavailable()
    }

    fn add_surface_filling(&mut self, _modeler: Modeler, _curve_loop: Tag) -> KernelResult<Tag> {
        Self::unavailable()
    }

    fn add_surface_loop(&mut self, _modeler: Modeler, _surfaces: &[Tag]) -> KernelResult<Tag> {
        Self::unavailable()
    }

    fn add_volume(&mut self, _modeler: Modeler, _shells: &[Tag]) -> KernelResult<Tag> {
        Self::unavailable()
    }

    fn extrude(
        &mut self,
        _modeler: Modeler,
        _entities: &[Entity],
        _sweep: &Sweep,
        _layers: &Layers,
        _recombine: bool,
    ) -> KernelResult<Vec<Entity>> {
        Self::unavailable()
    }

    fn transform(
        &mut self,
        _modeler: Modeler,
        _entities: &[Entity],
        _transform: &Transform,
    ) -> KernelResult<()> {
        Self::unavailable()
    }

    fn copy(&mut self, _modeler: Modeler, _entities: &[Entity]) -> KernelResult<Vec<Entity>> {
        Self::unavailable()
    }

    fn remove(
        &mut self,
        _modeler: Modeler,
        _entities: &[Entity],
        _recursive: bool,
    ) -> KernelResult<()> {
        Self::unavailable()
    }

    fn get_boundary(
        &self,
        _entities: &[Entity],
        _combined: bool,
        _oriented: bool,
        _recursive: bool,
    ) -> KernelResult<Vec<Oriented<Entity>>> {
        Self::unavailable()
    }

    fn get_entities(&self, _dim: Option<Dim>) -> Vec<Entity> {
        Vec::new()
    }

    fn point_coordinates(&self, _tag: Tag) -> KernelResult<DVec3> {
        Self::unavailable()
    }

    fn set_size(&mut self, _points: &[Entity], _size: f64) -> KernelResult<()> {
        Self::unavailable()
    }

    fn add_physical_group(&mut self, _dim: Dim, _tags: &[Tag]) -> KernelResult<Tag> {
        Self::unavailable()
    }

    fn set_physical_name(&mut self, _dim: Dim, _tag: Tag, _name: &str) -> KernelResult<()> {
        Self::unavailable()
    }

    fn get_physical_groups(&self) -> Vec<Entity> {
        Vec::new()
    }

    fn get_physical_name(&self, _dim: Dim, _tag: Tag) -> KernelResult<String> {
        Self::unavailable()
    }

    fn get_entities_for_physical_group(&self, _dim: Dim, _tag: Tag) -> KernelResult<Vec<Tag>> {
        Self::unavailable()
    }

    fn generate(&mut self, _dim: Dim) -> KernelResult<()> {
        Self::unavailable()
    }

    fn get_nodes(&self) -> KernelResult<NodeSet> {
        Self::unavailable()
    }

    fn get_elements(&self, _dim: Dim, _tag: Tag) -> KernelResult<Vec<ElementBlock>> {
        Self::unavailable()
    }

    fn get_element_properties(&self, _element_type: i32) -> KernelResult<ElementProperties> {
        Self::unavailable()
    }
}

/// Get the default kernel based on available features
pub fn default_kernel() -> Box<dyn Kernel> {
    #[cfg(feature = "reference")]
    {
        Box::new(super::ReferenceKernel::new())
    }

    #[cfg(not(feature = "reference"))]
    {
        Box::new(NullKernel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_kernel_unavailable() {
        let mut kernel = NullKernel;
        assert!(!kernel.is_available());
        assert!(matches!(
            kernel.initialize(),
            Err(KernelError::NotAvailable(_))
        ));
        assert!(matches!(
            kernel.boolean(BooleanOp::Union, &[], &[], true, true),
            Err(KernelError::Unsupported(_))
        ));
        assert!(kernel.remove_size_callback().is_ok());
    }

    #[test]
    fn test_sweep_endpoints() {
        let x = DVec3::new(1.0, 0.0, 0.0);
        let translate = Sweep::Translate {
            vector: DVec3::new(0.0, 2.0, 0.0),
        };
        assert_eq!(translate.apply(x, 0.0), x);
        assert_eq!(translate.apply(x, 1.0), DVec3::new(1.0, 2.0, 0.0));

        let rotate = Sweep::Rotate {
            point: DVec3::ZERO,
            axis: DVec3::Z,
            angle: std::f64::consts::FRAC_PI_2,
        };
        let top = rotate.apply(x, 1.0);
        assert_relative_eq!(top.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(top.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_layers() {
        assert!(!Layers::none().is_structured());
        let layers = Layers::graded(vec![2, 3], vec![0.5, 1.0]);
        assert!(layers.is_structured());
        assert_eq!(layers.total(), 5);
    }

    #[test]
    fn test_primitive_dim() {
        let disk = OccPrimitive::Disk {
            center: DVec3::ZERO,
            rx: 1.0,
            ry: 1.0,
        };
        assert_eq!(disk.dim(), Dim::Surface);
        let cube = OccPrimitive::Box {
            corner: DVec3::ZERO,
            extents: DVec3::ONE,
        };
        assert_eq!(cube.dim(), Dim::Volume);
    }
}
