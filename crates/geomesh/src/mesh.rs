//! Mesh result and extraction from the kernel
//!
//! Kernel node tags are arbitrary positive integers; the extracted mesh uses
//! dense 0-based indices instead. Elements are merged into one block per
//! element type, each cell carrying the physical and geometrical tag of the
//! entity it was meshed on.

use std::collections::{BTreeMap, HashMap};

use glam::DVec3;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::entity::{Dim, Entity, Tag};
use crate::kernel::{Kernel, KernelError};

/// Element topology of a cell block
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellType {
    Vertex,
    Line,
    Triangle,
    Quad,
    Tetra,
    Hexahedron,
    Wedge,
    Pyramid,
    Line3,
    Triangle6,
    Quad9,
    Tetra10,
    /// Any other kernel element type, by kernel name
    Other { code: i32, name: String },
}

impl CellType {
    /// Cell type of a kernel element type code
    pub fn from_code(code: i32, name: &str) -> Self {
        match code {
            15 => CellType::Vertex,
            1 => CellType::Line,
            2 => CellType::Triangle,
            3 => CellType::Quad,
            4 => CellType::Tetra,
            5 => CellType::Hexahedron,
            6 => CellType::Wedge,
            7 => CellType::Pyramid,
            8 => CellType::Line3,
            9 => CellType::Triangle6,
            10 => CellType::Quad9,
            11 => CellType::Tetra10,
            _ => CellType::Other {
                code,
                name: name.to_string(),
            },
        }
    }
}

/// All elements of one type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellBlock {
    pub cell_type: CellType,
    /// Topological dimension of the cells
    pub dim: Dim,
    pub nodes_per_cell: usize,
    /// Flat point indices, `nodes_per_cell` per cell
    pub connectivity: Vec<usize>,
    /// Physical group tag per cell, 0 when the entity is in no group
    pub physical: Vec<Tag>,
    /// Kernel entity tag per cell
    pub geometrical: Vec<Tag>,
}

impl CellBlock {
    /// Number of cells in the block
    pub fn len(&self) -> usize {
        self.connectivity.len() / self.nodes_per_cell.max(1)
    }

    pub fn is_empty(&self) -> bool {
        self.connectivity.is_empty()
    }

    /// Point indices of each cell
    pub fn cells(&self) -> impl Iterator<Item = &[usize]> {
        self.connectivity.chunks(self.nodes_per_cell.max(1))
    }
}

/// A generated mesh
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub points: Vec<[f64; 3]>,
    pub cells: Vec<CellBlock>,
    /// Physical group name to element indices, one list per cell block
    pub cell_sets: BTreeMap<String, Vec<Vec<usize>>>,
}

impl Mesh {
    /// Total number of cells of the given dimension
    pub fn num_cells(&self, dim: Dim) -> usize {
        self.cells.iter().filter(|b| b.dim == dim).map(CellBlock::len).sum()
    }

    /// Total length, area or volume of the linear cells of one dimension
    ///
    /// Higher-order cells are measured through their corner nodes.
    pub fn measure(&self, dim: Dim) -> f64 {
        let x = |i: usize| DVec3::from_array(self.points[i]);
        let triangle = |a: usize, b: usize, c: usize| 0.5 * (x(b) - x(a)).cross(x(c) - x(a)).length();
        let tetra = |a: usize, b: usize, c: usize, d: usize| {
            (x(b) - x(a)).dot((x(c) - x(a)).cross(x(d) - x(a))).abs() / 6.0
        };

        let mut total = 0.0;
        for block in self.cells.iter().filter(|b| b.dim == dim) {
            for cell in block.cells() {
                total += match block.cell_type {
                    CellType::Line | CellType::Line3 => x(cell[0]).distance(x(cell[1])),
                    CellType::Triangle | CellType::Triangle6 => triangle(cell[0], cell[1], cell[2]),
                    CellType::Quad | CellType::Quad9 => {
                        triangle(cell[0], cell[1], cell[2]) + triangle(cell[0], cell[2], cell[3])
                    }
                    CellType::Tetra | CellType::Tetra10 => tetra(cell[0], cell[1], cell[2], cell[3]),
                    _ => 0.0,
                };
            }
        }
        total
    }

    /// Drop every cell block below the highest dimension present
    pub fn prune_lower_dimensions(&mut self) {
        let Some(top) = self.cells.iter().map(|b| b.dim).max() else {
            return;
        };
        let keep: Vec<bool> = self.cells.iter().map(|b| b.dim == top).collect();
        self.cells.retain(|b| b.dim == top);
        for blocks in self.cell_sets.values_mut() {
            let mut index = 0;
            blocks.retain(|_| {
                let kept = keep[index];
                index += 1;
                kept
            });
        }
    }
}

/// Errors from reading a mesh back from the kernel
#[derive(Debug, Clone, thiserror::Error)]
pub enum MeshError {
    #[error("Element refers to unknown node {0}")]
    UnknownNode(usize),
    #[error("Malformed {element_type} block on {entity}: {nodes} node tags for {per_element} nodes per element")]
    MalformedBlock {
        element_type: i32,
        entity: Entity,
        nodes: usize,
        per_element: usize,
    },
    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),
}

/// Read the generated mesh back from the kernel
pub(crate) fn extract(kernel: &dyn Kernel) -> Result<Mesh, MeshError> {
    let nodes = kernel.get_nodes()?;
    let index: HashMap<usize, usize> = nodes
        .tags
        .iter()
        .enumerate()
        .map(|(i, tag)| (*tag, i))
        .collect();

    // Entity to (physical tag, name), first group wins
    let mut membership: HashMap<Entity, (Tag, String)> = HashMap::new();
    for group in kernel.get_physical_groups() {
        let name = kernel.get_physical_name(group.dim, group.id)?;
        for tag in kernel.get_entities_for_physical_group(group.dim, group.id)? {
            membership
                .entry(Entity::new(group.dim, tag))
                .or_insert_with(|| (group.id, name.clone()));
        }
    }

    let mut mesh = Mesh {
        points: nodes.coordinates,
        ..Mesh::default()
    };
    let mut block_of_type: HashMap<i32, usize> = HashMap::new();
    let mut properties = HashMap::new();

    for entity in kernel.get_entities(None) {
        for block in kernel.get_elements(entity.dim, entity.id)? {
            if block.element_tags.is_empty() {
                continue;
            }
            if !properties.contains_key(&block.element_type) {
                let props = kernel.get_element_properties(block.element_type)?;
                properties.insert(block.element_type, props);
            }
            let props = &properties[&block.element_type];
            if block.node_tags.len() != block.element_tags.len() * props.num_nodes {
                return Err(MeshError::MalformedBlock {
                    element_type: block.element_type,
                    entity,
                    nodes: block.node_tags.len(),
                    per_element: props.num_nodes,
                });
            }

            let connectivity = block
                .node_tags
                .iter()
                .map(|tag| index.get(tag).copied().ok_or(MeshError::UnknownNode(*tag)))
                .collect::<Result<Vec<_>, _>>()?;
            let count = block.element_tags.len();
            let group = membership.get(&entity);

            let b = *block_of_type.entry(block.element_type).or_insert_with(|| {
                mesh.cells.push(CellBlock {
                    cell_type: CellType::from_code(block.element_type, &props.name),
                    dim: entity.dim,
                    nodes_per_cell: props.num_nodes,
                    connectivity: Vec::new(),
                    physical: Vec::new(),
                    geometrical: Vec::new(),
                });
                mesh.cells.len() - 1
            });
            let cells = &mut mesh.cells[b];
            let offset = cells.len();
            cells.connectivity.extend(connectivity);
            cells.physical.extend(std::iter::repeat_n(group.map(|(tag, _)| *tag).unwrap_or(0), count));
            cells.geometrical.extend(std::iter::repeat_n(entity.id, count));

            if let Some((_, name)) = group
                && !name.is_empty()
            {
                let sets = mesh.cell_sets.entry(name.clone()).or_default();
                if sets.len() <= b {
                    sets.resize(b + 1, Vec::new());
                }
                sets[b].extend(offset..offset + count);
            }
        }
    }

    let blocks = mesh.cells.len();
    for sets in mesh.cell_sets.values_mut() {
        sets.resize(blocks, Vec::new());
    }

    info!(
        points = mesh.points.len(),
        blocks = mesh.cells.len(),
        sets = mesh.cell_sets.len(),
        "Mesh extracted"
    );
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square() -> Mesh {
        Mesh {
            points: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            cells: vec![
                CellBlock {
                    cell_type: CellType::Line,
                    dim: Dim::Curve,
                    nodes_per_cell: 2,
                    connectivity: vec![0, 1],
                    physical: vec![0],
                    geometrical: vec![1],
                },
                CellBlock {
                    cell_type: CellType::Triangle,
                    dim: Dim::Surface,
                    nodes_per_cell: 3,
                    connectivity: vec![0, 1, 2, 0, 2, 3],
                    physical: vec![1, 1],
                    geometrical: vec![1, 1],
                },
            ],
            cell_sets: BTreeMap::from([("plate".to_string(), vec![vec![], vec![0, 1]])]),
        }
    }

    #[test]
    fn test_measure() {
        let mesh = square();
        assert_relative_eq!(mesh.measure(Dim::Surface), 1.0);
        assert_relative_eq!(mesh.measure(Dim::Curve), 1.0);
        assert_eq!(mesh.num_cells(Dim::Surface), 2);
    }

    #[test]
    fn test_prune_keeps_sets_aligned() {
        let mut mesh = square();
        mesh.prune_lower_dimensions();
        assert_eq!(mesh.cells.len(), 1);
        assert_eq!(mesh.cell_sets["plate"], vec![vec![0, 1]]);
    }

    #[test]
    fn test_cell_type_codes() {
        assert_eq!(CellType::from_code(2, "Triangle 3"), CellType::Triangle);
        assert_eq!(
            CellType::from_code(99, "Thing"),
            CellType::Other {
                code: 99,
                name: "Thing".into()
            }
        );
    }
}
