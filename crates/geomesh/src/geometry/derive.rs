//! Extrusion and in-place transforms

use std::f64::consts::{PI, TAU};

use glam::DVec3;
use tracing::debug;

use super::{
    Geo, Geometry, GeometryError, GeometryResult, Variant, coordinates, nonzero_vector,
};
use crate::entity::{Entity, HasDimTags, common_dim};
use crate::kernel::{Layers, Modeler, Sweep, Transform};

/// Entities produced by sweeping one source entity
#[derive(Debug, Clone, PartialEq)]
pub struct Extrusion {
    /// The swept source
    pub source: Entity,
    /// Image of the source at the far end of the sweep
    pub top: Entity,
    /// Swept body, one dimension above the source
    pub body: Entity,
    /// Side entities swept from the source's boundary
    pub lateral: Vec<Entity>,
}

impl Extrusion {
    /// Split the kernel output of a sweep into one extrusion per source
    ///
    /// The kernel returns, for each source in order, its top and body
    /// followed by any lateral entities. A lateral entity has the source's
    /// dimension, so a new group starts where such an entity is directly
    /// followed by a body.
    fn split(sources: &[Entity], output: Vec<Entity>) -> GeometryResult<Vec<Self>> {
        let mut output = output.into_iter().peekable();
        let mut extrusions = Vec::with_capacity(sources.len());

        for (k, &source) in sources.iter().enumerate() {
            let (Some(top), Some(body)) = (output.next(), output.next()) else {
                return Err(GeometryError::InvalidArgument(format!(
                    "extrusion of {source} returned fewer than two entities"
                )));
            };
            if top.dim != source.dim || Some(body.dim) != source.dim.up() {
                return Err(GeometryError::InvalidArgument(format!(
                    "extrusion of {source} returned top {top} and body {body}"
                )));
            }

            let last = k + 1 == sources.len();
            let mut lateral = Vec::new();
            while let Some(&next) = output.peek() {
                if !last {
                    let mut ahead = output.clone();
                    ahead.next();
                    let starts_group = ahead.peek().map(|e| e.dim) == source.dim.up();
                    if next.dim != source.dim || starts_group {
                        break;
                    }
                }
                lateral.push(next);
                output.next();
            }

            extrusions.push(Self {
                source,
                top,
                body,
                lateral,
            });
        }

        if let Some(extra) = output.next() {
            return Err(GeometryError::InvalidArgument(format!(
                "extrusion returned unexpected entity {extra}"
            )));
        }
        Ok(extrusions)
    }
}

impl HasDimTags for Extrusion {
    fn dim_tags(&self) -> Vec<Entity> {
        vec![self.body]
    }
}

impl<V: Variant> Geometry<V> {
    /// Translate entities, sweeping out the next dimension
    ///
    /// All inputs must share one dimension; the result holds one
    /// [`Extrusion`] per input, in input order. With structured `layers`,
    /// `recombine` turns the layered triangles into quadrangles.
    pub fn extrude(
        &mut self,
        input: &impl HasDimTags,
        translation: impl AsRef<[f64]>,
        layers: Layers,
        recombine: bool,
    ) -> GeometryResult<Vec<Extrusion>> {
        let vector = coordinates(translation.as_ref())?;
        nonzero_vector(vector, "translation")?;
        self.sweep(input.dim_tags(), Sweep::Translate { vector }, layers, recombine)
    }

    /// Rotate entities about an axis, sweeping out the next dimension
    ///
    /// The native modeler cannot sweep a full turn in one call, so there the
    /// angle must stay strictly below 2π in magnitude.
    pub fn revolve(
        &mut self,
        input: &impl HasDimTags,
        rotation_axis: impl AsRef<[f64]>,
        point_on_axis: impl AsRef<[f64]>,
        angle: f64,
        layers: Layers,
        recombine: bool,
    ) -> GeometryResult<Vec<Extrusion>> {
        let axis = coordinates(rotation_axis.as_ref())?;
        let point = coordinates(point_on_axis.as_ref())?;
        nonzero_vector(axis, "rotation axis")?;
        if V::MODELER == Modeler::Geo {
            check_angle(angle, TAU)?;
        }
        self.sweep(input.dim_tags(), Sweep::Rotate { point, axis, angle }, layers, recombine)
    }

    fn sweep(
        &mut self,
        sources: Vec<Entity>,
        sweep: Sweep,
        layers: Layers,
        recombine: bool,
    ) -> GeometryResult<Vec<Extrusion>> {
        let dim = common_dim(&sources)?;
        if dim.up().is_none() {
            return Err(GeometryError::InvalidArgument(format!(
                "cannot extrude entities of dimension {dim}"
            )));
        }
        let output = self
            .kernel
            .extrude(V::MODELER, &sources, &sweep, &layers, recombine)?;
        let extrusions = Extrusion::split(&sources, output)?;
        for extrusion in &extrusions {
            debug!(
                source = %extrusion.source,
                top = %extrusion.top,
                body = %extrusion.body,
                lateral = extrusion.lateral.len(),
                "Extruded"
            );
        }
        Ok(extrusions)
    }

    // ========== In-place transforms ==========

    pub fn translate(&mut self, entities: &impl HasDimTags, vector: impl AsRef<[f64]>) -> GeometryResult<()> {
        let vector = coordinates(vector.as_ref())?;
        self.transform(entities, Transform::Translate { vector })
    }

    pub fn rotate(
        &mut self,
        entities: &impl HasDimTags,
        point: impl AsRef<[f64]>,
        angle: f64,
        axis: impl AsRef<[f64]>,
    ) -> GeometryResult<()> {
        let point = coordinates(point.as_ref())?;
        let axis = coordinates(axis.as_ref())?;
        nonzero_vector(axis, "rotation axis")?;
        self.transform(entities, Transform::Rotate { point, axis, angle })
    }

    /// Scale about `center` by a factor per axis
    pub fn dilate(
        &mut self,
        entities: &impl HasDimTags,
        center: impl AsRef<[f64]>,
        factors: impl AsRef<[f64]>,
    ) -> GeometryResult<()> {
        let center = coordinates(center.as_ref())?;
        let factors = match *factors.as_ref() {
            [f] => DVec3::splat(f),
            [fx, fy, fz] => DVec3::new(fx, fy, fz),
            _ => {
                return Err(GeometryError::InvalidArgument(format!(
                    "dilation takes 1 or 3 factors, got {}",
                    factors.as_ref().len()
                )));
            }
        };
        if factors.abs().min_element() == 0.0 || !factors.is_finite() {
            return Err(GeometryError::InvalidArgument(format!(
                "dilation factors must be finite and nonzero, got {factors}"
            )));
        }
        self.transform(entities, Transform::Dilate { center, factors })
    }

    /// Reflect through the plane `a*x + b*y + c*z + d = 0`
    pub fn mirror(&mut self, entities: &impl HasDimTags, plane: [f64; 4]) -> GeometryResult<()> {
        check_plane(plane)?;
        self.transform(entities, Transform::Mirror { plane })
    }

    /// Reflect through a plane, as the native modeler names it
    pub fn symmetrize(&mut self, entities: &impl HasDimTags, plane: [f64; 4]) -> GeometryResult<()> {
        check_plane(plane)?;
        self.transform(entities, Transform::Symmetrize { plane })
    }

    fn transform(&mut self, entities: &impl HasDimTags, transform: Transform) -> GeometryResult<()> {
        let entities = entities.dim_tags();
        if entities.is_empty() {
            return Err(GeometryError::EmptyInput("nothing to transform"));
        }
        self.kernel.transform(V::MODELER, &entities, &transform)?;
        Ok(())
    }

    /// Duplicate entities; the copies get fresh tags
    pub fn copy(&mut self, entities: &impl HasDimTags) -> GeometryResult<Vec<Entity>> {
        let entities = entities.dim_tags();
        if entities.is_empty() {
            return Err(GeometryError::EmptyInput("nothing to copy"));
        }
        Ok(self.kernel.copy(V::MODELER, &entities)?)
    }

    /// Delete entities, and with `recursive` their unused boundaries
    pub fn remove(&mut self, entities: &impl HasDimTags, recursive: bool) -> GeometryResult<()> {
        let entities = entities.dim_tags();
        if entities.is_empty() {
            return Err(GeometryError::EmptyInput("nothing to remove"));
        }
        self.kernel.remove(V::MODELER, &entities, recursive)?;
        Ok(())
    }
}

impl Geometry<Geo> {
    /// Translate and rotate at once, sweeping out the next dimension
    ///
    /// Both motions are required; use [`Geometry::extrude`] or
    /// [`Geometry::revolve`] for one of them alone. The angle must stay
    /// strictly below π in magnitude.
    #[allow(clippy::too_many_arguments)]
    pub fn twist(
        &mut self,
        input: &impl HasDimTags,
        translation: impl AsRef<[f64]>,
        rotation_axis: impl AsRef<[f64]>,
        point_on_axis: impl AsRef<[f64]>,
        angle: f64,
        layers: Layers,
        recombine: bool,
    ) -> GeometryResult<Vec<Extrusion>> {
        let translation = coordinates(translation.as_ref())?;
        let axis = coordinates(rotation_axis.as_ref())?;
        let point = coordinates(point_on_axis.as_ref())?;
        nonzero_vector(translation, "twist translation")?;
        nonzero_vector(axis, "twist rotation axis")?;
        check_angle(angle, PI)?;
        let sweep = Sweep::Twist {
            point,
            translation,
            axis,
            angle,
        };
        self.sweep(input.dim_tags(), sweep, layers, recombine)
    }
}

fn check_angle(angle: f64, limit: f64) -> GeometryResult<()> {
    if angle.abs() < limit {
        Ok(())
    } else {
        Err(GeometryError::AngleOutOfRange { angle, limit })
    }
}

fn check_plane(plane: [f64; 4]) -> GeometryResult<()> {
    nonzero_vector(DVec3::new(plane[0], plane[1], plane[2]), "plane normal")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Dim;

    #[test]
    fn test_angle_limits() {
        assert!(check_angle(3.0, PI).is_ok());
        assert!(check_angle(-3.0, PI).is_ok());
        assert!(matches!(
            check_angle(PI, PI),
            Err(GeometryError::AngleOutOfRange { .. })
        ));
        assert!(check_angle(f64::NAN, TAU).is_err());
    }

    #[test]
    fn test_extrusion_output_checked() {
        let source = Entity::new(Dim::Curve, 4);
        let output = vec![
            Entity::new(Dim::Curve, 7),
            Entity::new(Dim::Surface, 1),
            Entity::new(Dim::Curve, 5),
            Entity::new(Dim::Curve, 6),
        ];
        let extrusions = Extrusion::split(&[source], output).unwrap();
        assert_eq!(extrusions.len(), 1);
        assert_eq!(extrusions[0].top, Entity::new(Dim::Curve, 7));
        assert_eq!(extrusions[0].lateral.len(), 2);

        let swapped = vec![Entity::new(Dim::Surface, 1), Entity::new(Dim::Curve, 7)];
        assert!(Extrusion::split(&[source], swapped).is_err());
        assert!(Extrusion::split(&[source], vec![]).is_err());
    }

    #[test]
    fn test_extrusion_output_split_per_source() {
        let sources = [Entity::new(Dim::Curve, 1), Entity::new(Dim::Curve, 2)];
        let output = vec![
            Entity::new(Dim::Curve, 10),
            Entity::new(Dim::Surface, 1),
            Entity::new(Dim::Curve, 11),
            Entity::new(Dim::Curve, 12),
            Entity::new(Dim::Curve, 13),
            Entity::new(Dim::Surface, 2),
            Entity::new(Dim::Curve, 14),
        ];
        let extrusions = Extrusion::split(&sources, output).unwrap();
        assert_eq!(extrusions.len(), 2);
        assert_eq!(extrusions[0].source, sources[0]);
        assert_eq!(extrusions[0].lateral, vec![Entity::new(Dim::Curve, 11), Entity::new(Dim::Curve, 12)]);
        assert_eq!(extrusions[1].top, Entity::new(Dim::Curve, 13));
        assert_eq!(extrusions[1].body, Entity::new(Dim::Surface, 2));
        assert_eq!(extrusions[1].lateral, vec![Entity::new(Dim::Curve, 14)]);

        let short = vec![Entity::new(Dim::Curve, 10), Entity::new(Dim::Surface, 1)];
        assert!(Extrusion::split(&sources, short).is_err());
    }
}
