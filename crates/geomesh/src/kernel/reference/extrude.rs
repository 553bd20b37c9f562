//! Extrusion along a sweep: translations, revolutions and twists

use std::collections::HashMap;

use tracing::debug;

use super::ReferenceKernel;
use super::geom::{sweep_affine, transform_sweep};
use super::model::{CurveData, CurveShape, SurfaceData, SurfaceShape, VolumeShape};
use crate::entity::{Dim, Entity, Tag};
use crate::kernel::{KernelError, KernelResult, Layers, Modeler, Sweep};

/// Images created by one extrusion call, so shared boundaries are swept once
#[derive(Default)]
struct SweepCache {
    points: HashMap<Tag, Tag>,
    sides: HashMap<Tag, Tag>,
    curves: HashMap<Tag, Tag>,
    surfaces: HashMap<Tag, Tag>,
}

struct SweepJob<'a> {
    sweep: Sweep,
    layers: &'a Layers,
    recombine: bool,
    group: usize,
}

fn validate_layers(layers: &Layers) -> KernelResult<()> {
    if !layers.is_structured() {
        return Ok(());
    }
    if layers.counts.contains(&0) {
        return Err(KernelError::InvalidInput("layer counts must be positive".into()));
    }
    if layers.heights.is_empty() {
        return Ok(());
    }
    if layers.heights.len() != layers.counts.len() {
        return Err(KernelError::InvalidInput(format!(
            "{} layer bands with {} heights",
            layers.counts.len(),
            layers.heights.len()
        )));
    }
    let increasing = layers.heights.windows(2).all(|w| w[0] < w[1]);
    let last = layers.heights.last().copied().unwrap_or_default();
    if !increasing || layers.heights[0] <= 0.0 || (last - 1.0).abs() > 1e-9 {
        return Err(KernelError::InvalidInput(
            "layer heights must increase up to 1".into(),
        ));
    }
    Ok(())
}

impl ReferenceKernel {
    pub(super) fn extrude_entities(
        &mut self,
        modeler: Modeler,
        entities: &[Entity],
        sweep: &Sweep,
        layers: &Layers,
        recombine: bool,
    ) -> KernelResult<Vec<Entity>> {
        if matches!(sweep, Sweep::Twist { .. }) && modeler == Modeler::Occ {
            return Err(KernelError::Unsupported(
                "twisted extrusion in the constructive modeler".into(),
            ));
        }
        validate_layers(layers)?;
        for entity in entities {
            if !self.model.contains(*entity) {
                return Err(KernelError::UnknownEntity(*entity));
            }
        }

        self.next_group += 1;
        let job = SweepJob {
            sweep: *sweep,
            layers,
            recombine,
            group: self.next_group,
        };
        let mut cache = SweepCache::default();
        let mut out = Vec::new();

        for entity in entities {
            match entity.dim {
                Dim::Point => {
                    let top = self.sweep_point(&job, &mut cache, entity.id)?;
                    let side = self.sweep_side(&job, &mut cache, entity.id)?;
                    out.push(Entity::new(Dim::Point, top));
                    out.push(Entity::new(Dim::Curve, side));
                }
                Dim::Curve => {
                    let top = self.sweep_curve_image(&job, &mut cache, entity.id)?;
                    let side = self.sweep_curve_side(&job, &mut cache, entity.id)?;
                    out.push(Entity::new(Dim::Curve, top));
                    out.push(Entity::new(Dim::Surface, side));
                }
                Dim::Surface => out.extend(self.sweep_surface(&job, &mut cache, entity.id)?),
                Dim::Volume => {
                    return Err(KernelError::InvalidInput(format!(
                        "cannot extrude {entity}"
                    )));
                }
            }
        }

        debug!(%modeler, inputs = entities.len(), outputs = out.len(), "Extruded");
        Ok(out)
    }

    /// Image of a point at the end of the sweep
    fn sweep_point(&mut self, job: &SweepJob<'_>, cache: &mut SweepCache, tag: Tag) -> KernelResult<Tag> {
        if let Some(image) = cache.points.get(&tag) {
            return Ok(*image);
        }
        let point = *self.model.point(tag)?;
        let image = self.new_point(job.sweep.apply(point.x, 1.0), point.size);
        cache.points.insert(tag, image);
        Ok(image)
    }

    /// Curve traced by a point during the sweep
    fn sweep_side(&mut self, job: &SweepJob<'_>, cache: &mut SweepCache, tag: Tag) -> KernelResult<Tag> {
        if let Some(side) = cache.sides.get(&tag) {
            return Ok(*side);
        }
        let x = self.model.position(tag)?;
        if x.distance(job.sweep.apply(x, 1.0)) <= self.tolerance()
            || x.distance(job.sweep.apply(x, 0.5)) <= self.tolerance()
        {
            return Err(KernelError::InvalidInput(format!(
                "point {tag} does not move under the sweep"
            )));
        }
        let top = self.sweep_point(job, cache, tag)?;
        let mut data = CurveData::new(CurveShape::Swept {
            from: tag,
            to: top,
            sweep: job.sweep,
        });
        data.group = Some(job.group);
        data.layers = job.layers.clone();
        let side = self.new_curve(data)?;
        cache.sides.insert(tag, side);
        Ok(side)
    }

    /// Copy of a curve at the end of the sweep, meshed as its image
    fn sweep_curve_image(&mut self, job: &SweepJob<'_>, cache: &mut SweepCache, tag: Tag) -> KernelResult<Tag> {
        if let Some(image) = cache.curves.get(&tag) {
            return Ok(*image);
        }
        let shape = self.model.curve(tag)?.shape.clone();
        let mut images = HashMap::new();
        for point in shape.defining_points() {
            images.insert(point, self.sweep_point(job, cache, point)?);
        }
        let mut mapped = shape.map_points(|p| images.get(&p).copied().unwrap_or(p));
        if let CurveShape::Swept { sweep, .. } = &mut mapped {
            *sweep = transform_sweep(sweep, &sweep_affine(&job.sweep));
        }
        let mut data = CurveData::new(mapped);
        data.image_of = Some((tag, job.sweep));
        let image = self.new_curve(data)?;
        cache.curves.insert(tag, image);
        Ok(image)
    }

    /// Surface traced by a curve during the sweep
    fn sweep_curve_side(&mut self, job: &SweepJob<'_>, cache: &mut SweepCache, tag: Tag) -> KernelResult<Tag> {
        if let Some(side) = cache.surfaces.get(&tag) {
            return Ok(*side);
        }
        let (start, end) = self.model.curve(tag)?.shape.endpoints();
        let top = self.sweep_curve_image(job, cache, tag)?;
        let start_side = self.sweep_side(job, cache, start)?;
        let end_side = self.sweep_side(job, cache, end)?;
        let mut data = SurfaceData::new(SurfaceShape::Swept {
            base: tag,
            top,
            start_side,
            end_side,
            sweep: job.sweep,
        });
        data.recombine = job.recombine;
        let side = self.new_surface(data);
        cache.surfaces.insert(tag, side);
        Ok(side)
    }

    /// Top surface, volume and lateral surfaces swept by a surface
    fn sweep_surface(&mut self, job: &SweepJob<'_>, cache: &mut SweepCache, tag: Tag) -> KernelResult<Vec<Entity>> {
        let surface = self.model.surface(tag)?.clone();
        let SurfaceShape::Planar { loops, filling } = &surface.shape else {
            return Err(KernelError::Unsupported(format!(
                "reference: extruding swept surface {tag}"
            )));
        };

        let mut top_loops = Vec::with_capacity(loops.len());
        let mut laterals = Vec::new();
        for curve_loop in loops {
            let curves = self.model.curve_loop(*curve_loop)?.to_vec();
            let mut top_curves = Vec::with_capacity(curves.len());
            for signed in curves {
                let image = self.sweep_curve_image(job, cache, signed.abs())?;
                top_curves.push(if signed < 0 { -image } else { image });
                laterals.push(self.sweep_curve_side(job, cache, signed.abs())?);
            }
            top_loops.push(self.new_curve_loop(top_curves)?);
        }

        let mut top = SurfaceData::new(SurfaceShape::Planar {
            loops: top_loops,
            filling: *filling,
        });
        top.recombine = surface.recombine || job.recombine;
        top.embedded = surface
            .embedded
            .iter()
            .map(|p| self.sweep_point(job, cache, *p))
            .collect::<KernelResult<_>>()?;
        let top = self.new_surface(top);
        let volume = self.new_volume(VolumeShape::Swept {
            base: tag,
            top,
            laterals: laterals.clone(),
            sweep: job.sweep,
        });

        let mut out = vec![Entity::new(Dim::Surface, top), Entity::new(Dim::Volume, volume)];
        out.extend(laterals.into_iter().map(|t| Entity::new(Dim::Surface, t)));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_validation() {
        assert!(validate_layers(&Layers::none()).is_ok());
        assert!(validate_layers(&Layers::uniform(4)).is_ok());
        assert!(validate_layers(&Layers::graded(vec![2, 3], vec![0.4, 1.0])).is_ok());
        assert!(validate_layers(&Layers::uniform(0)).is_err());
        assert!(validate_layers(&Layers::graded(vec![2, 3], vec![0.4])).is_err());
        assert!(validate_layers(&Layers::graded(vec![2, 3], vec![0.6, 0.5])).is_err());
    }
}
