//! In-place transforms, copies and removal

use std::collections::{BTreeSet, HashMap};

use glam::DAffine3;
use tracing::debug;

use super::ReferenceKernel;
use super::geom::{affine, transform_sweep};
use super::model::{CurveData, CurveShape, SurfaceData, SurfaceShape, VolumeShape};
use crate::entity::{Dim, Entity, Tag};
use crate::kernel::{KernelError, KernelResult, Sweep, Transform};

/// Whether a linear map scales every direction by the same factor
fn is_similarity(map: &DAffine3) -> bool {
    let m = map.matrix3;
    let lengths = [m.x_axis.length(), m.y_axis.length(), m.z_axis.length()];
    let scale = lengths[0];
    let tolerance = 1e-9 * scale.max(1.0);
    lengths.iter().all(|l| (l - scale).abs() <= tolerance)
        && m.x_axis.dot(m.y_axis).abs() <= tolerance * scale
        && m.y_axis.dot(m.z_axis).abs() <= tolerance * scale
        && m.z_axis.dot(m.x_axis).abs() <= tolerance * scale
}

/// Shapes that only survive maps preserving angles
fn needs_similarity(shape: &CurveShape) -> bool {
    match shape {
        CurveShape::CircleArc { .. } | CurveShape::EllipseArc { .. } => true,
        CurveShape::Swept { sweep, .. } => !matches!(sweep, Sweep::Translate { .. }),
        _ => false,
    }
}

impl ReferenceKernel {
    fn closure_of(&self, entities: &[Entity]) -> KernelResult<BTreeSet<Entity>> {
        let mut closure = BTreeSet::new();
        for entity in entities {
            if !self.model.contains(*entity) {
                return Err(KernelError::UnknownEntity(*entity));
            }
            self.model.closure(*entity, &mut closure)?;
        }
        Ok(closure)
    }

    pub(super) fn transform_entities(
        &mut self,
        entities: &[Entity],
        transform: &Transform,
    ) -> KernelResult<()> {
        let map = affine(transform)?;
        let closure = self.closure_of(entities)?;

        if !is_similarity(&map) {
            for entity in closure.iter().filter(|e| e.dim == Dim::Curve) {
                if needs_similarity(&self.model.curve(entity.id)?.shape) {
                    return Err(KernelError::Unsupported(format!(
                        "reference: non-uniform scaling of curved {entity}"
                    )));
                }
            }
        }

        for entity in &closure {
            match entity.dim {
                Dim::Point => {
                    if let Some(point) = self.model.points.get_mut(&entity.id) {
                        point.x = map.transform_point3(point.x);
                    }
                }
                Dim::Curve => {
                    if let Some(curve) = self.model.curves.get_mut(&entity.id) {
                        if let CurveShape::Swept { sweep, .. } = &mut curve.shape {
                            *sweep = transform_sweep(sweep, &map);
                        }
                        curve.image_of = match curve.image_of {
                            Some((base, sweep)) if closure.contains(&Entity::new(Dim::Curve, base)) => {
                                Some((base, transform_sweep(&sweep, &map)))
                            }
                            _ => None,
                        };
                    }
                }
                Dim::Surface => {
                    if let Some(surface) = self.model.surfaces.get_mut(&entity.id)
                        && let SurfaceShape::Swept { sweep, .. } = &mut surface.shape
                    {
                        *sweep = transform_sweep(sweep, &map);
                    }
                }
                Dim::Volume => {
                    if let Some(volume) = self.model.volumes.get_mut(&entity.id)
                        && let VolumeShape::Swept { sweep, .. } = &mut volume.shape
                    {
                        *sweep = transform_sweep(sweep, &map);
                    }
                }
            }
        }

        debug!(?transform, entities = closure.len(), "Transformed");
        Ok(())
    }

    pub(super) fn copy_entities(&mut self, entities: &[Entity]) -> KernelResult<Vec<Entity>> {
        let mut copies = HashMap::new();
        let mut out = Vec::with_capacity(entities.len());
        for entity in entities {
            if !self.model.contains(*entity) {
                return Err(KernelError::UnknownEntity(*entity));
            }
            let tag = self.copy_entity(*entity, &mut copies)?;
            out.push(Entity::new(entity.dim, tag));
        }
        Ok(out)
    }

    fn copy_entity(&mut self, entity: Entity, copies: &mut HashMap<Entity, Tag>) -> KernelResult<Tag> {
        if let Some(tag) = copies.get(&entity) {
            return Ok(*tag);
        }
        let tag = match entity.dim {
            Dim::Point => {
                let point = *self.model.point(entity.id)?;
                self.new_point(point.x, point.size)
            }
            Dim::Curve => {
                let curve = self.model.curve(entity.id)?.clone();
                let mut points = HashMap::new();
                for point in curve.shape.defining_points() {
                    points.insert(point, self.copy_entity(Entity::new(Dim::Point, point), copies)?);
                }
                let data = CurveData {
                    shape: curve.shape.map_points(|p| points.get(&p).copied().unwrap_or(p)),
                    image_of: curve.image_of.and_then(|(base, sweep)| {
                        copies
                            .get(&Entity::new(Dim::Curve, base))
                            .map(|b| (*b, sweep))
                    }),
                    ..curve
                };
                self.new_curve(data)?
            }
            Dim::Surface => {
                let surface = self.model.surface(entity.id)?.clone();
                let shape = match &surface.shape {
                    SurfaceShape::Planar { loops, filling } => {
                        let mut new_loops = Vec::with_capacity(loops.len());
                        for l in loops {
                            let mut curves = Vec::new();
                            for c in self.model.curve_loop(*l)?.to_vec() {
                                curves.push(self.copy_signed(Dim::Curve, c, copies)?);
                            }
                            new_loops.push(self.new_curve_loop(curves)?);
                        }
                        SurfaceShape::Planar {
                            loops: new_loops,
                            filling: *filling,
                        }
                    }
                    SurfaceShape::Swept {
                        base,
                        top,
                        start_side,
                        end_side,
                        sweep,
                    } => SurfaceShape::Swept {
                        base: self.copy_signed(Dim::Curve, *base, copies)?,
                        top: self.copy_signed(Dim::Curve, *top, copies)?,
                        start_side: self.copy_signed(Dim::Curve, *start_side, copies)?,
                        end_side: self.copy_signed(Dim::Curve, *end_side, copies)?,
                        sweep: *sweep,
                    },
                };
                let embedded = self.copy_points(&surface.embedded, copies)?;
                let transfinite = match &surface.transfinite {
                    Some((arrangement, corners)) => {
                        Some((*arrangement, self.copy_points(corners, copies)?))
                    }
                    None => None,
                };
                self.new_surface(SurfaceData {
                    shape,
                    embedded,
                    recombine: surface.recombine,
                    transfinite,
                })
            }
            Dim::Volume => {
                let volume = self.model.volume(entity.id)?.clone();
                let shape = match &volume.shape {
                    VolumeShape::Shells(shells) => {
                        let mut new_shells = Vec::with_capacity(shells.len());
                        for shell in shells {
                            let mut faces = Vec::new();
                            for s in self.model.surface_loop(*shell)?.to_vec() {
                                faces.push(self.copy_signed(Dim::Surface, s, copies)?);
                            }
                            let tag = self.model.counters.surface_loop();
                            self.model.surface_loops.insert(tag, faces);
                            new_shells.push(tag);
                        }
                        VolumeShape::Shells(new_shells)
                    }
                    VolumeShape::Swept {
                        base,
                        top,
                        laterals,
                        sweep,
                    } => {
                        let mut new_laterals = Vec::with_capacity(laterals.len());
                        for l in laterals {
                            new_laterals.push(self.copy_signed(Dim::Surface, *l, copies)?);
                        }
                        VolumeShape::Swept {
                            base: self.copy_signed(Dim::Surface, *base, copies)?,
                            top: self.copy_signed(Dim::Surface, *top, copies)?,
                            laterals: new_laterals,
                            sweep: *sweep,
                        }
                    }
                };
                let transfinite = match &volume.transfinite {
                    Some(corners) => Some(self.copy_points(corners, copies)?),
                    None => None,
                };
                let tag = self.new_volume(shape);
                if let Some(data) = self.model.volumes.get_mut(&tag) {
                    data.transfinite = transfinite;
                }
                tag
            }
        };
        copies.insert(entity, tag);
        Ok(tag)
    }

    /// Copy of a boundary reference, keeping its sign
    fn copy_signed(&mut self, dim: Dim, tag: Tag, copies: &mut HashMap<Entity, Tag>) -> KernelResult<Tag> {
        let image = self.copy_entity(Entity::new(dim, tag.abs()), copies)?;
        Ok(if tag < 0 { -image } else { image })
    }

    fn copy_points(&mut self, points: &[Tag], copies: &mut HashMap<Entity, Tag>) -> KernelResult<Vec<Tag>> {
        points
            .iter()
            .map(|p| self.copy_entity(Entity::new(Dim::Point, *p), copies))
            .collect()
    }

    pub(super) fn remove_entities(&mut self, entities: &[Entity], recursive: bool) -> KernelResult<()> {
        let targets: BTreeSet<Entity> = if recursive {
            self.closure_of(entities)?
        } else {
            for entity in entities {
                if !self.model.contains(*entity) {
                    return Err(KernelError::UnknownEntity(*entity));
                }
            }
            entities.iter().copied().collect()
        };

        // Highest dimension first, so boundaries are freed before their parts.
        for entity in targets.into_iter().rev() {
            if self.model.is_referenced(entity) {
                debug!(%entity, "Kept entity still in use");
                continue;
            }
            match entity.dim {
                Dim::Point => {
                    self.model.points.remove(&entity.id);
                }
                Dim::Curve => {
                    self.model.curves.remove(&entity.id);
                }
                Dim::Surface => {
                    self.model.surfaces.remove(&entity.id);
                }
                Dim::Volume => {
                    self.model.volumes.remove(&entity.id);
                }
            }
            self.model.visible.remove(&entity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    #[test]
    fn test_similarity() {
        assert!(is_similarity(&DAffine3::from_scale(DVec3::splat(2.0))));
        assert!(is_similarity(&DAffine3::from_rotation_z(0.3)));
        assert!(!is_similarity(&DAffine3::from_scale(DVec3::new(1.0, 2.0, 1.0))));
    }
}
