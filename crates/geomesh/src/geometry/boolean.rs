//! Boolean operations of the constructive-solid variant
//!
//! Every operation hands back fresh entities. Operands the kernel deletes are
//! dead afterwards, so queued mesh sizes that still point at them are dropped.

use tracing::debug;

use super::{Geometry, GeometryError, GeometryResult, Occ};
use crate::entity::{Entity, HasDimTags, common_dim};
use crate::kernel::BooleanOp;

/// Which operands a boolean operation deletes
///
/// Both the first operand and the others are deleted unless kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BooleanOptions {
    pub delete_first: bool,
    pub delete_other: bool,
}

impl Default for BooleanOptions {
    fn default() -> Self {
        Self {
            delete_first: true,
            delete_other: true,
        }
    }
}

impl BooleanOptions {
    /// Keep the first operand in the model
    pub fn keep_first(mut self) -> Self {
        self.delete_first = false;
        self
    }

    /// Keep every operand after the first in the model
    pub fn keep_other(mut self) -> Self {
        self.delete_other = false;
        self
    }
}

impl Geometry<Occ> {
    /// Fuse all operands into one
    ///
    /// The first operand is the object, the rest are tools; all must share a
    /// dimension.
    pub fn boolean_union(
        &mut self,
        entities: &[&dyn HasDimTags],
        options: BooleanOptions,
    ) -> GeometryResult<Vec<Entity>> {
        let (objects, tools) = split_operands(entities)?;
        self.boolean(BooleanOp::Union, objects, tools, options)
    }

    /// Common part of all operands
    pub fn boolean_intersection(
        &mut self,
        entities: &[&dyn HasDimTags],
        options: BooleanOptions,
    ) -> GeometryResult<Vec<Entity>> {
        let (objects, tools) = split_operands(entities)?;
        self.boolean(BooleanOp::Intersection, objects, tools, options)
    }

    /// `input` minus `tool`
    pub fn boolean_difference(
        &mut self,
        input: &impl HasDimTags,
        tool: &impl HasDimTags,
        options: BooleanOptions,
    ) -> GeometryResult<Vec<Entity>> {
        let objects = input.dim_tags();
        let tools = tool.dim_tags();
        let all: Vec<Entity> = objects.iter().chain(&tools).copied().collect();
        common_dim(&all)?;
        self.boolean(BooleanOp::Difference, objects, tools, options)
    }

    /// Split `input` and `tool` against each other, keeping every piece
    ///
    /// Operands may have different dimensions.
    pub fn boolean_fragments(
        &mut self,
        input: &impl HasDimTags,
        tool: &impl HasDimTags,
        options: BooleanOptions,
    ) -> GeometryResult<Vec<Entity>> {
        let objects = input.dim_tags();
        let tools = tool.dim_tags();
        if objects.is_empty() || tools.is_empty() {
            return Err(GeometryError::EmptyInput("fragments need an input and a tool"));
        }
        self.boolean(BooleanOp::Fragments, objects, tools, options)
    }

    fn boolean(
        &mut self,
        op: BooleanOp,
        objects: Vec<Entity>,
        tools: Vec<Entity>,
        options: BooleanOptions,
    ) -> GeometryResult<Vec<Entity>> {
        let result = self.kernel.boolean(
            op,
            &objects,
            &tools,
            options.delete_first,
            options.delete_other,
        )?;

        let mut consumed = Vec::new();
        if options.delete_first {
            consumed.extend(&objects);
        }
        if options.delete_other {
            consumed.extend(&tools);
        }
        let dropped = self.queue.drop_stale_sizes(&consumed);
        debug!(
            %op,
            objects = objects.len(),
            tools = tools.len(),
            result = result.len(),
            dropped,
            "Boolean applied"
        );
        Ok(result)
    }
}

/// First operand as objects, the rest as tools, all of one dimension
fn split_operands(entities: &[&dyn HasDimTags]) -> GeometryResult<(Vec<Entity>, Vec<Entity>)> {
    let Some((first, rest)) = entities.split_first() else {
        return Err(GeometryError::EmptyInput("boolean needs at least two operands"));
    };
    let objects = first.dim_tags();
    let tools: Vec<Entity> = rest.iter().flat_map(|e| e.dim_tags()).collect();
    if objects.is_empty() || tools.is_empty() {
        return Err(GeometryError::EmptyInput("boolean needs at least two operands"));
    }
    let all: Vec<Entity> = objects.iter().chain(&tools).copied().collect();
    common_dim(&all)?;
    Ok((objects, tools))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Dim;

    #[test]
    fn test_operands_deleted_by_default() {
        let options = BooleanOptions::default();
        assert!(options.delete_first && options.delete_other);
        assert!(!options.keep_first().delete_first);
        assert!(options.keep_first().delete_other);
        assert!(!options.keep_other().delete_other);
    }

    #[test]
    fn test_split_operands() {
        let a = Entity::new(Dim::Volume, 1);
        let b = Entity::new(Dim::Volume, 2);
        let c = Entity::new(Dim::Volume, 3);
        let (objects, tools) = split_operands(&[&a, &vec![b, c]]).unwrap();
        assert_eq!(objects, vec![a]);
        assert_eq!(tools, vec![b, c]);

        assert!(matches!(
            split_operands(&[&a]),
            Err(GeometryError::EmptyInput(_))
        ));
        let surface = Entity::new(Dim::Surface, 1);
        assert!(matches!(
            split_operands(&[&a, &surface]),
            Err(GeometryError::DimensionMismatch { .. })
        ));
    }
}
