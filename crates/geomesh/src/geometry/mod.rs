//! Geometry Sessions
//!
//! A [`Geometry`] owns the kernel for the lifetime of one modeling session. It
//! creates every entity through its factory methods, checks the invariants
//! that must hold before the kernel sees an aggregate, and queues mesh
//! controls until [`Geometry::generate_mesh`] flushes them in a fixed order.
//!
//! The two kernel variants share this orchestrator and differ only in the
//! [`Variant`] marker: [`Geo`] sessions route calls to the native modeler and
//! offer its composites, [`Occ`] sessions route to the constructive-solid
//! modeler and offer solid primitives and booleans.

mod boolean;
mod build;
mod derive;
mod fields;
mod geo;
mod occ;
mod queue;

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};

use glam::DVec3;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{MeshOptions, SessionOptions};
use crate::entity::{Dim, Entity, HasDimTags, HasEntity, Point, Tag, common_dim};
use crate::kernel::{
    Arrangement, Distribution, Kernel, KernelError, Modeler, SizeCallback,
};
use crate::mesh::{self, Mesh, MeshError};

pub use boolean::BooleanOptions;
pub use build::MeshSize;
pub use derive::Extrusion;
pub use fields::{BoundaryLayer, FieldAggregate, FieldHandle};
pub use geo::CircleOptions;
pub use queue::PhysicalHandle;

use self::queue::{Deferred, Queue};

/// Orchestrator errors
#[derive(Debug, Clone, Error)]
pub enum GeometryError {
    #[error("Curve loop is open: curve {index} ends at point {end}, curve {next} starts at point {start}")]
    OpenCurveLoop {
        index: usize,
        next: usize,
        end: Tag,
        start: Tag,
    },

    #[error("Dimension mismatch: expected {expected}, found {found} (tag {id})")]
    DimensionMismatch { expected: Dim, found: Dim, id: Tag },

    #[error("Physical label already registered: {0}")]
    DuplicateLabel(String),

    #[error("Angle {angle} out of range, magnitude must stay below {limit}")]
    AngleOutOfRange { angle: f64, limit: f64 },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Empty input: {0}")]
    EmptyInput(&'static str),

    #[error("Physical group '{label}' refers to {entity}, which is no longer in the model")]
    StaleEntity { label: String, entity: Entity },

    #[error("Unknown size field: {0}")]
    UnknownField(usize),

    #[error("A geometry session is already active")]
    SessionActive,

    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error("Mesh error: {0}")]
    Mesh(#[from] MeshError),
}

impl GeometryError {
    /// Whether the error is a caller-side invariant violation
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            GeometryError::OpenCurveLoop { .. }
                | GeometryError::DimensionMismatch { .. }
                | GeometryError::DuplicateLabel(_)
                | GeometryError::AngleOutOfRange { .. }
                | GeometryError::InvalidArgument(_)
                | GeometryError::EmptyInput(_)
                | GeometryError::StaleEntity { .. }
        )
    }
}

/// Result type for session operations
pub type GeometryResult<T> = Result<T, GeometryError>;

/// Kernel variant a session talks to
pub trait Variant {
    /// Modeler receiving entity and transform calls
    const MODELER: Modeler;
}

/// Native curve/surface modeler
#[derive(Debug, Clone, Copy, Default)]
pub struct Geo;

/// Constructive-solid modeler
#[derive(Debug, Clone, Copy, Default)]
pub struct Occ;

impl Variant for Geo {
    const MODELER: Modeler = Modeler::Geo;
}

impl Variant for Occ {
    const MODELER: Modeler = Modeler::Occ;
}

/// Set while a session holds the kernel
static SESSION_ACTIVE: AtomicBool = AtomicBool::new(false);

const LENGTH_MIN: &str = "Mesh.CharacteristicLengthMin";
const LENGTH_MAX: &str = "Mesh.CharacteristicLengthMax";
const LENGTH_MAX_DEFAULT: f64 = 1e22;

/// One modeling session over a kernel
///
/// Only one session may be open per process. The kernel is finalized by
/// [`Geometry::close`], or on drop if the session was not closed explicitly.
pub struct Geometry<V: Variant> {
    kernel: Box<dyn Kernel>,
    options: SessionOptions,
    queue: Queue,
    /// Holds the process-wide session flag
    active: bool,
    initialized: bool,
    variant: PhantomData<V>,
}

impl<V: Variant> Geometry<V> {
    /// Open a session: initialize the kernel, add a model and apply the
    /// length bounds from `options`
    pub fn open(kernel: Box<dyn Kernel>, options: SessionOptions) -> GeometryResult<Self> {
        if SESSION_ACTIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GeometryError::SessionActive);
        }

        let mut session = Self {
            kernel,
            options,
            queue: Queue::default(),
            active: true,
            initialized: false,
            variant: PhantomData,
        };
        // On failure the drop below releases the session flag.
        session.start()?;
        Ok(session)
    }

    fn start(&mut self) -> GeometryResult<()> {
        self.kernel.initialize()?;
        self.initialized = true;
        self.kernel.add_model(&self.options.model_name)?;
        self.kernel
            .set_option_number("General.Terminal", if self.options.verbose { 1.0 } else { 0.0 })?;
        self.kernel
            .set_option_number("Geometry.Tolerance", self.options.loop_tolerance)?;
        if let Some(min) = self.options.characteristic_length_min {
            self.kernel.set_option_number(LENGTH_MIN, min)?;
        }
        if let Some(max) = self.options.characteristic_length_max {
            self.kernel.set_option_number(LENGTH_MAX, max)?;
        }
        debug!(
            kernel = self.kernel.name(),
            modeler = %V::MODELER,
            model = %self.options.model_name,
            "Geometry session opened"
        );
        Ok(())
    }

    /// Close the session and finalize the kernel
    pub fn close(mut self) -> GeometryResult<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> GeometryResult<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        let mut result = Ok(());
        if self.initialized {
            self.initialized = false;
            let steps = [
                self.kernel.remove_size_callback(),
                self.kernel.set_option_number(LENGTH_MIN, 0.0),
                self.kernel.set_option_number(LENGTH_MAX, LENGTH_MAX_DEFAULT),
                self.kernel.finalize(),
            ];
            if let Some(Err(e)) = steps.into_iter().find(Result::is_err) {
                result = Err(e.into());
            }
        }
        SESSION_ACTIVE.store(false, Ordering::SeqCst);
        debug!("Geometry session closed");
        result
    }

    /// Session options
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// The kernel behind the session
    pub fn kernel(&self) -> &dyn Kernel {
        self.kernel.as_ref()
    }

    /// Commit pending geometry so entity tags become final
    pub fn synchronize(&mut self) -> GeometryResult<()> {
        self.kernel.synchronize(V::MODELER)?;
        Ok(())
    }

    /// Set a numeric kernel option
    pub fn set_option(&mut self, name: &str, value: f64) -> GeometryResult<()> {
        self.kernel.set_option_number(name, value)?;
        Ok(())
    }

    /// Current coordinates of a point, read from the kernel
    pub fn point_coordinates(&mut self, point: &impl HasEntity) -> GeometryResult<DVec3> {
        expect_dim(point.entity(), Dim::Point)?;
        self.synchronize()?;
        Ok(self.kernel.point_coordinates(point.id())?)
    }

    // ========== Deferred mesh controls ==========

    /// Register a physical group; `label` must be unique within the session
    pub fn add_physical(
        &mut self,
        entities: &impl HasDimTags,
        label: Option<&str>,
    ) -> GeometryResult<PhysicalHandle> {
        let entities = entities.dim_tags();
        common_dim(&entities)?;
        self.queue.add_physical(entities, label.map(str::to_string))
    }

    /// Kernel tag a physical group received, once the queue has been flushed
    pub fn physical_tag(&self, handle: PhysicalHandle) -> Option<Tag> {
        self.queue.physical_tag(handle)
    }

    /// Declare entities to be meshed as one compound
    pub fn add_compound(&mut self, entities: &impl HasDimTags) -> GeometryResult<()> {
        let entities = entities.dim_tags();
        let dim = common_dim(&entities)?;
        let tags = entities.iter().map(|e| e.id).collect();
        self.queue.push(Deferred::Compound { dim, tags });
        Ok(())
    }

    /// Recombine the triangles of these surfaces into quadrangles
    pub fn set_recombined_surfaces(&mut self, surfaces: &impl HasDimTags) -> GeometryResult<()> {
        let surfaces = surfaces.dim_tags();
        if surfaces.is_empty() {
            return Err(GeometryError::EmptyInput("no surfaces to recombine"));
        }
        for surface in &surfaces {
            expect_dim(*surface, Dim::Surface)?;
        }
        for surface in surfaces {
            self.queue.push(Deferred::Recombine(surface));
        }
        Ok(())
    }

    /// Structured node distribution along a curve
    pub fn set_transfinite_curve(
        &mut self,
        curve: &impl HasEntity,
        num_nodes: usize,
        distribution: Distribution,
        coefficient: f64,
    ) -> GeometryResult<()> {
        expect_dim(curve.entity(), Dim::Curve)?;
        if num_nodes < 2 {
            return Err(GeometryError::InvalidArgument(format!(
                "transfinite curve needs at least 2 nodes, got {num_nodes}"
            )));
        }
        self.queue.push(Deferred::TransfiniteCurve {
            tag: curve.id(),
            num_nodes,
            distribution,
            coefficient,
        });
        Ok(())
    }

    /// Structured grid on a surface with 0, 3 or 4 explicit corners
    pub fn set_transfinite_surface(
        &mut self,
        surface: &impl HasEntity,
        arrangement: Arrangement,
        corners: &[Point],
    ) -> GeometryResult<()> {
        expect_dim(surface.entity(), Dim::Surface)?;
        if ![0, 3, 4].contains(&corners.len()) {
            return Err(GeometryError::InvalidArgument(format!(
                "transfinite surface takes 0, 3 or 4 corners, got {}",
                corners.len()
            )));
        }
        self.queue.push(Deferred::TransfiniteSurface {
            tag: surface.id(),
            arrangement,
            corners: corners.iter().map(Point::id).collect(),
        });
        Ok(())
    }

    /// Structured grid in a volume with 0, 6 or 8 explicit corners
    pub fn set_transfinite_volume(
        &mut self,
        volume: &impl HasEntity,
        corners: &[Point],
    ) -> GeometryResult<()> {
        expect_dim(volume.entity(), Dim::Volume)?;
        if ![0, 6, 8].contains(&corners.len()) {
            return Err(GeometryError::InvalidArgument(format!(
                "transfinite volume takes 0, 6 or 8 corners, got {}",
                corners.len()
            )));
        }
        self.queue.push(Deferred::TransfiniteVolume {
            tag: volume.id(),
            corners: corners.iter().map(Point::id).collect(),
        });
        Ok(())
    }

    /// Embed a point or curve in a surface
    pub fn in_surface(&mut self, item: &impl HasEntity, surface: &impl HasEntity) -> GeometryResult<()> {
        self.embed(item, surface, Dim::Surface)
    }

    /// Embed a point, curve or surface in a volume
    pub fn in_volume(&mut self, item: &impl HasEntity, volume: &impl HasEntity) -> GeometryResult<()> {
        self.embed(item, volume, Dim::Volume)
    }

    fn embed(&mut self, item: &impl HasEntity, host: &impl HasEntity, host_dim: Dim) -> GeometryResult<()> {
        expect_dim(host.entity(), host_dim)?;
        let item = item.entity();
        if item.dim >= host_dim {
            return Err(GeometryError::InvalidArgument(format!(
                "cannot embed a {} in a {host_dim}",
                item.dim
            )));
        }
        self.queue.push(Deferred::Embed {
            item,
            host: host.entity(),
        });
        Ok(())
    }

    /// Element size on every point bounding `entity`
    pub fn set_mesh_size(&mut self, entity: &impl HasDimTags, size: f64) -> GeometryResult<()> {
        if size.is_nan() || size <= 0.0 {
            return Err(GeometryError::InvalidArgument(format!(
                "mesh size must be positive, got {size}"
            )));
        }
        for entity in entity.dim_tags() {
            self.queue.push(Deferred::Size { entity, size });
        }
        Ok(())
    }

    /// Queue a boundary layer field
    pub fn add_boundary_layer(&mut self, layer: BoundaryLayer) -> GeometryResult<FieldHandle> {
        layer.validate()?;
        Ok(self.queue.add_field(fields::FieldSpec::BoundaryLayer(layer)))
    }

    /// Use the minimum or maximum of earlier fields as the background size
    pub fn set_background_mesh(
        &mut self,
        fields: &[FieldHandle],
        aggregate: FieldAggregate,
    ) -> GeometryResult<FieldHandle> {
        if fields.is_empty() {
            return Err(GeometryError::EmptyInput("background mesh needs at least one field"));
        }
        for field in fields {
            self.queue.check_field(*field)?;
        }
        Ok(self.queue.add_field(fields::FieldSpec::Background {
            fields: fields.to_vec(),
            aggregate,
        }))
    }

    /// Orient the boundary of a volume outwards before meshing
    pub fn set_outward_normals(&mut self, volume: &impl HasEntity) -> GeometryResult<()> {
        expect_dim(volume.entity(), Dim::Volume)?;
        self.queue.push(Deferred::OutwardNormals(volume.id()));
        Ok(())
    }

    /// Install a size callback, applied immediately
    ///
    /// With `ignore_other_sizes`, sizes from points, boundaries and curvature
    /// are switched off so the callback alone decides.
    pub fn set_mesh_size_callback(
        &mut self,
        callback: impl Fn(Dim, Tag, DVec3, f64) -> f64 + 'static,
        ignore_other_sizes: bool,
    ) -> GeometryResult<()> {
        let callback: SizeCallback = Box::new(callback);
        self.kernel.set_size_callback(callback)?;
        if ignore_other_sizes {
            for option in [
                "Mesh.CharacteristicLengthExtendFromBoundary",
                "Mesh.CharacteristicLengthFromPoints",
                "Mesh.CharacteristicLengthFromCurvature",
            ] {
                self.kernel.set_option_number(option, 0.0)?;
            }
        }
        Ok(())
    }

    /// Remove the size callback
    pub fn remove_mesh_size_callback(&mut self) -> GeometryResult<()> {
        self.kernel.remove_size_callback()?;
        Ok(())
    }

    // ========== Mesh generation ==========

    /// Flush every queued control, mesh and read the result back
    pub fn generate_mesh(&mut self, options: &MeshOptions) -> GeometryResult<Mesh> {
        debug!(queued = self.queue.len(), "Synchronizing before flush");
        self.synchronize()?;
        self.queue.flush(self.kernel.as_mut())?;

        if let Some(order) = options.order {
            self.kernel.set_order(order)?;
        }
        if let Some(algorithm) = options.algorithm {
            self.kernel.set_option_number("Mesh.Algorithm", f64::from(algorithm))?;
        }
        self.kernel
            .set_option_number("General.Terminal", if options.verbose { 1.0 } else { 0.0 })?;

        debug!(dim = %options.dim, "Generating mesh");
        self.kernel.generate(options.dim)?;
        Ok(mesh::extract(self.kernel.as_ref())?)
    }
}

impl<V: Variant> Drop for Geometry<V> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "Failed to close geometry session");
        }
    }
}

/// Coordinates from a 2- or 3-vector; 2-vectors lie in the z = 0 plane
pub(crate) fn coordinates(x: &[f64]) -> GeometryResult<DVec3> {
    match *x {
        [x, y] => Ok(DVec3::new(x, y, 0.0)),
        [x, y, z] => Ok(DVec3::new(x, y, z)),
        _ => Err(GeometryError::InvalidArgument(format!(
            "coordinates need 2 or 3 components, got {}",
            x.len()
        ))),
    }
}

fn positive(value: f64, what: &str) -> GeometryResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(GeometryError::InvalidArgument(format!("{what} must be positive, got {value}")))
    }
}

fn nonzero_vector(v: DVec3, what: &str) -> GeometryResult<()> {
    if v.length_squared() > 0.0 && v.is_finite() {
        Ok(())
    } else {
        Err(GeometryError::InvalidArgument(format!("{what} must be a nonzero vector")))
    }
}

fn expect_dim(entity: Entity, expected: Dim) -> GeometryResult<()> {
    if entity.dim == expected {
        Ok(())
    } else {
        Err(GeometryError::DimensionMismatch {
            expected,
            found: entity.dim,
            id: entity.id,
        })
    }
}

#[cfg(all(test, feature = "reference"))]
mod tests;
