//! Deferred mesh controls
//!
//! Controls that reference entity tags are recorded here and only applied to
//! the kernel after the final synchronize, when tags can no longer change.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::fields::{FieldHandle, FieldSpec};
use super::{GeometryError, GeometryResult};
use crate::entity::{Dim, Entity, Tag, common_dim};
use crate::kernel::{Arrangement, Distribution, Kernel};

/// Handle to a registered physical group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysicalHandle(usize);

impl PhysicalHandle {
    /// Position of the group in registration order
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One queued control
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Deferred {
    Field(FieldHandle),
    Embed {
        item: Entity,
        host: Entity,
    },
    Compound {
        dim: Dim,
        tags: Vec<Tag>,
    },
    Recombine(Entity),
    TransfiniteCurve {
        tag: Tag,
        num_nodes: usize,
        distribution: Distribution,
        coefficient: f64,
    },
    TransfiniteSurface {
        tag: Tag,
        arrangement: Arrangement,
        corners: Vec<Tag>,
    },
    TransfiniteVolume {
        tag: Tag,
        corners: Vec<Tag>,
    },
    Size {
        entity: Entity,
        size: f64,
    },
    Physical(PhysicalHandle),
    OutwardNormals(Tag),
}

impl Deferred {
    /// Flush stage; lower stages are applied first
    fn stage(&self) -> u8 {
        match self {
            Deferred::Field(_) => 0,
            Deferred::Embed { .. } => 1,
            Deferred::Compound { .. } => 2,
            Deferred::Recombine(_) => 3,
            Deferred::TransfiniteCurve { .. } => 4,
            Deferred::TransfiniteSurface { .. } => 5,
            Deferred::TransfiniteVolume { .. } => 6,
            Deferred::Size { .. } => 7,
            Deferred::Physical(_) => 8,
            Deferred::OutwardNormals(_) => 9,
        }
    }
}

#[derive(Debug, Clone)]
struct PhysicalRecord {
    entities: Vec<Entity>,
    label: Option<String>,
}

/// Queued controls plus the bookkeeping needed to resolve handles
#[derive(Debug, Default)]
pub(super) struct Queue {
    records: Vec<Deferred>,
    physical: Vec<PhysicalRecord>,
    physical_tags: Vec<Option<Tag>>,
    labels: HashSet<String>,
    fields: Vec<FieldSpec>,
    field_tags: Vec<Option<Tag>>,
}

impl Queue {
    pub fn push(&mut self, record: Deferred) {
        self.records.push(record);
    }

    pub fn add_physical(
        &mut self,
        entities: Vec<Entity>,
        label: Option<String>,
    ) -> GeometryResult<PhysicalHandle> {
        match &label {
            Some(label) => {
                if !self.labels.insert(label.clone()) {
                    return Err(GeometryError::DuplicateLabel(label.clone()));
                }
            }
            None => warn!(entities = entities.len(), "Physical group registered without a label"),
        }
        let handle = PhysicalHandle(self.physical.len());
        self.physical.push(PhysicalRecord { entities, label });
        self.physical_tags.push(None);
        self.records.push(Deferred::Physical(handle));
        Ok(handle)
    }

    pub fn physical_tag(&self, handle: PhysicalHandle) -> Option<Tag> {
        self.physical_tags.get(handle.0).copied().flatten()
    }

    pub fn add_field(&mut self, spec: FieldSpec) -> FieldHandle {
        let handle = FieldHandle(self.fields.len());
        self.fields.push(spec);
        self.field_tags.push(None);
        self.records.push(Deferred::Field(handle));
        handle
    }

    pub fn check_field(&self, handle: FieldHandle) -> GeometryResult<()> {
        if handle.0 < self.fields.len() {
            Ok(())
        } else {
            Err(GeometryError::UnknownField(handle.0))
        }
    }

    /// Drop size requests on entities a boolean operation consumed
    pub fn drop_stale_sizes(&mut self, consumed: &[Entity]) -> usize {
        let before = self.records.len();
        self.records.retain(|record| match record {
            Deferred::Size { entity, size } if consumed.contains(entity) => {
                warn!(%entity, size, "Dropped mesh size of an entity consumed by a boolean");
                false
            }
            _ => true,
        });
        before - self.records.len()
    }

    /// Number of controls waiting for the next flush
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Apply every queued control in stage order
    pub fn flush(&mut self, kernel: &mut dyn Kernel) -> GeometryResult<()> {
        let mut records = std::mem::take(&mut self.records);
        // Stable sort: registration order is kept within a stage.
        records.sort_by_key(Deferred::stage);
        debug!(records = records.len(), "Flushing deferred controls");
        for record in records {
            self.apply(kernel, record)?;
        }
        Ok(())
    }

    fn apply(&mut self, kernel: &mut dyn Kernel, record: Deferred) -> GeometryResult<()> {
        debug!(?record, "Applying");
        match record {
            Deferred::Field(handle) => {
                let tag = self.fields[handle.0].apply(kernel, &self.field_tags)?;
                self.field_tags[handle.0] = Some(tag);
            }
            Deferred::Embed { item, host } => {
                kernel.embed(item.dim, &[item.id], host.dim, host.id)?;
            }
            Deferred::Compound { dim, tags } => kernel.set_compound(dim, &tags)?,
            Deferred::Recombine(surface) => kernel.set_recombine(surface.dim, surface.id)?,
            Deferred::TransfiniteCurve {
                tag,
                num_nodes,
                distribution,
                coefficient,
            } => kernel.set_transfinite_curve(tag, num_nodes, distribution, coefficient)?,
            Deferred::TransfiniteSurface {
                tag,
                arrangement,
                corners,
            } => kernel.set_transfinite_surface(tag, arrangement, &corners)?,
            Deferred::TransfiniteVolume { tag, corners } => {
                kernel.set_transfinite_volume(tag, &corners)?
            }
            Deferred::Size { entity, size } => {
                let points = if entity.dim == Dim::Point {
                    vec![entity]
                } else {
                    kernel
                        .get_boundary(&[entity], false, false, true)?
                        .into_iter()
                        .map(|p| p.into_inner())
                        .collect()
                };
                kernel.set_size(&points, size)?;
            }
            Deferred::Physical(handle) => {
                let record = &self.physical[handle.0];
                let dim = common_dim(&record.entities)?;
                // Members consumed since registration are gone from the model.
                let present: HashSet<Entity> = kernel.get_entities(Some(dim)).into_iter().collect();
                if let Some(gone) = record.entities.iter().find(|e| !present.contains(e)) {
                    return Err(GeometryError::StaleEntity {
                        label: record.label.clone().unwrap_or_default(),
                        entity: *gone,
                    });
                }
                let tags: Vec<Tag> = record.entities.iter().map(|e| e.id).collect();
                let tag = kernel.add_physical_group(dim, &tags)?;
                if let Some(label) = &record.label {
                    kernel.set_physical_name(dim, tag, label)?;
                }
                self.physical_tags[handle.0] = Some(tag);
            }
            Deferred::OutwardNormals(volume) => kernel.set_outward_orientation(volume)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_label_rejected() {
        let mut queue = Queue::default();
        let surface = vec![Entity::new(Dim::Surface, 1)];
        queue.add_physical(surface.clone(), Some("wall".into())).unwrap();
        queue.add_physical(surface.clone(), Some("inlet".into())).unwrap();
        let err = queue.add_physical(surface, Some("wall".into())).unwrap_err();
        assert!(matches!(err, GeometryError::DuplicateLabel(ref l) if l == "wall"));
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn test_stage_order() {
        let mut records = vec![
            Deferred::Physical(PhysicalHandle(0)),
            Deferred::Size {
                entity: Entity::new(Dim::Point, 1),
                size: 0.1,
            },
            Deferred::Recombine(Entity::new(Dim::Surface, 1)),
            Deferred::Field(FieldHandle(0)),
            Deferred::Recombine(Entity::new(Dim::Surface, 2)),
        ];
        records.sort_by_key(Deferred::stage);
        assert_eq!(records[0], Deferred::Field(FieldHandle(0)));
        assert_eq!(records[1], Deferred::Recombine(Entity::new(Dim::Surface, 1)));
        assert_eq!(records[2], Deferred::Recombine(Entity::new(Dim::Surface, 2)));
        assert_eq!(records[4], Deferred::Physical(PhysicalHandle(0)));
    }

    #[test]
    fn test_stale_sizes_dropped() {
        let mut queue = Queue::default();
        let a = Entity::new(Dim::Surface, 1);
        let b = Entity::new(Dim::Surface, 2);
        queue.push(Deferred::Size { entity: a, size: 0.1 });
        queue.push(Deferred::Size { entity: b, size: 0.2 });
        queue.push(Deferred::Recombine(a));

        assert_eq!(queue.drop_stale_sizes(&[a]), 1);
        assert_eq!(queue.len(), 2);
    }
}
