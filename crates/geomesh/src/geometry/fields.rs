//! Size fields built at flush time

use serde::{Deserialize, Serialize};

use super::{GeometryError, GeometryResult};
use crate::entity::{Dim, Entity, HasDimTags, Tag};
use crate::kernel::Kernel;

/// Handle to a queued size field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldHandle(pub(super) usize);

impl FieldHandle {
    /// Position of the field in registration order
    pub fn index(&self) -> usize {
        self.0
    }
}

/// How a background mesh combines its fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FieldAggregate {
    #[default]
    Min,
    Max,
}

impl FieldAggregate {
    fn kind(self) -> &'static str {
        match self {
            FieldAggregate::Min => "Min",
            FieldAggregate::Max => "Max",
        }
    }
}

/// Refinement near points, curves or surfaces
///
/// Below `dist_min` from the given entities the element size is `size_min`;
/// beyond `dist_max` it is `size_max`, with a linear ramp in between.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryLayer {
    pub points: Vec<Entity>,
    pub curves: Vec<Entity>,
    pub surfaces: Vec<Entity>,
    pub size_min: f64,
    pub size_max: f64,
    pub dist_min: f64,
    pub dist_max: f64,
    /// Distance samples per curve
    pub num_points_per_curve: Option<usize>,
}

impl BoundaryLayer {
    pub fn new(size_min: f64, size_max: f64, dist_min: f64, dist_max: f64) -> Self {
        Self {
            points: Vec::new(),
            curves: Vec::new(),
            surfaces: Vec::new(),
            size_min,
            size_max,
            dist_min,
            dist_max,
            num_points_per_curve: None,
        }
    }

    pub fn with_points(mut self, points: &impl HasDimTags) -> Self {
        self.points.extend(points.dim_tags());
        self
    }

    pub fn with_curves(mut self, curves: &impl HasDimTags) -> Self {
        self.curves.extend(curves.dim_tags());
        self
    }

    pub fn with_surfaces(mut self, surfaces: &impl HasDimTags) -> Self {
        self.surfaces.extend(surfaces.dim_tags());
        self
    }

    pub fn with_sampling(mut self, num_points_per_curve: usize) -> Self {
        self.num_points_per_curve = Some(num_points_per_curve);
        self
    }

    pub(super) fn validate(&self) -> GeometryResult<()> {
        if self.points.is_empty() && self.curves.is_empty() && self.surfaces.is_empty() {
            return Err(GeometryError::EmptyInput("boundary layer needs points, curves or surfaces"));
        }
        for (list, dim) in [
            (&self.points, Dim::Point),
            (&self.curves, Dim::Curve),
            (&self.surfaces, Dim::Surface),
        ] {
            if let Some(other) = list.iter().find(|e| e.dim != dim) {
                return Err(GeometryError::DimensionMismatch {
                    expected: dim,
                    found: other.dim,
                    id: other.id,
                });
            }
        }
        if !(self.size_min > 0.0 && self.size_max > 0.0) {
            return Err(GeometryError::InvalidArgument(format!(
                "boundary layer sizes must be positive, got {} and {}",
                self.size_min, self.size_max
            )));
        }
        if self.dist_min < 0.0 || self.dist_max <= self.dist_min {
            return Err(GeometryError::InvalidArgument(format!(
                "boundary layer needs 0 <= dist_min < dist_max, got {} and {}",
                self.dist_min, self.dist_max
            )));
        }
        Ok(())
    }

    fn apply(&self, kernel: &mut dyn Kernel) -> GeometryResult<Tag> {
        let ids = |list: &[Entity]| list.iter().map(|e| f64::from(e.id)).collect::<Vec<_>>();

        let distance = kernel.field_add("Distance")?;
        for (option, list) in [
            ("PointsList", &self.points),
            ("CurvesList", &self.curves),
            ("SurfacesList", &self.surfaces),
        ] {
            if !list.is_empty() {
                kernel.field_set_numbers(distance, option, &ids(list))?;
            }
        }
        if let Some(n) = self.num_points_per_curve {
            kernel.field_set_number(distance, "Sampling", n as f64)?;
        }

        let threshold = kernel.field_add("Threshold")?;
        kernel.field_set_number(threshold, "InField", f64::from(distance))?;
        kernel.field_set_number(threshold, "SizeMin", self.size_min)?;
        kernel.field_set_number(threshold, "SizeMax", self.size_max)?;
        kernel.field_set_number(threshold, "DistMin", self.dist_min)?;
        kernel.field_set_number(threshold, "DistMax", self.dist_max)?;
        Ok(threshold)
    }
}

/// A queued field
#[derive(Debug, Clone)]
pub(super) enum FieldSpec {
    BoundaryLayer(BoundaryLayer),
    Background {
        fields: Vec<FieldHandle>,
        aggregate: FieldAggregate,
    },
}

impl FieldSpec {
    /// Create the field in the kernel; `built` holds the kernel tags of
    /// fields already applied, by handle index
    pub fn apply(&self, kernel: &mut dyn Kernel, built: &[Option<Tag>]) -> GeometryResult<Tag> {
        match self {
            FieldSpec::BoundaryLayer(layer) => layer.apply(kernel),
            FieldSpec::Background { fields, aggregate } => {
                let inputs = fields
                    .iter()
                    .map(|h| {
                        built
                            .get(h.0)
                            .copied()
                            .flatten()
                            .map(f64::from)
                            .ok_or(GeometryError::UnknownField(h.0))
                    })
                    .collect::<GeometryResult<Vec<_>>>()?;
                let field = kernel.field_add(aggregate.kind())?;
                kernel.field_set_numbers(field, "FieldsList", &inputs)?;
                kernel.field_set_as_background_mesh(field)?;
                Ok(field)
            }
        }
    }
}
