//! Mesh generation for the reference kernel
//!
//! Curves are discretized by integrating the inverse mesh size along them.
//! Swept and transfinite surfaces get structured grids, every other surface is
//! triangulated from its boundary nodes with earcut.

use std::collections::{BTreeMap, HashMap};

use glam::DVec3;
use tracing::debug;

use super::geom::curve_point;
use super::model::{CurveData, CurveShape, Model, SurfaceShape};
use super::size::SizeContext;
use crate::entity::{Dim, Entity, Tag};
use crate::kernel::{
    Arrangement, Distribution, ElementBlock, ElementProperties, KernelError, KernelResult, Layers,
};

/// Vertex element type code
pub(super) const POINT: i32 = 15;
/// Two-node line element type code
pub(super) const LINE: i32 = 1;
/// Three-node triangle element type code
pub(super) const TRIANGLE: i32 = 2;
/// Four-node quadrangle element type code
pub(super) const QUAD: i32 = 3;

/// Samples per curve when integrating the mesh size
const SAMPLES: usize = 100;
const MAX_IMAGE_DEPTH: usize = 64;

/// A generated mesh: nodes tagged `1..=n` plus element blocks per entity
#[derive(Debug, Clone, Default)]
pub(super) struct MeshData {
    pub nodes: Vec<DVec3>,
    pub elements: BTreeMap<Entity, Vec<ElementBlock>>,
}

#[derive(Debug, Clone)]
struct CurveMesh {
    nodes: Vec<usize>,
    params: Vec<f64>,
}

struct Mesher<'a> {
    model: &'a Model,
    sizes: &'a SizeContext<'a>,
    tolerance: f64,
    data: MeshData,
    next_element: usize,
    point_nodes: HashMap<Tag, usize>,
    curve_meshes: HashMap<Tag, CurveMesh>,
    group_params: HashMap<usize, Vec<f64>>,
}

/// Mesh every committed entity up to `dim`
///
/// Curve joints closer than `tolerance` count as connected.
pub(super) fn generate(
    model: &Model,
    sizes: &SizeContext<'_>,
    dim: Dim,
    tolerance: f64,
) -> KernelResult<MeshData> {
    let mut mesher = Mesher {
        model,
        sizes,
        tolerance,
        data: MeshData::default(),
        next_element: 0,
        point_nodes: HashMap::new(),
        curve_meshes: HashMap::new(),
        group_params: HashMap::new(),
    };

    let visible = |d: Dim| {
        model
            .visible
            .iter()
            .filter(move |e| e.dim == d)
            .map(|e| e.id)
            .collect::<Vec<_>>()
    };

    for tag in visible(Dim::Point) {
        let node = mesher.point_node(tag)?;
        mesher.add_block(Entity::new(Dim::Point, tag), POINT, vec![node]);
    }

    if dim >= Dim::Curve {
        mesher.prepare_groups()?;
        for tag in visible(Dim::Curve) {
            mesher.mesh_curve(tag, 0)?;
            let nodes = mesher.curve_mesh(tag)?.nodes.clone();
            let lines = nodes.windows(2).flat_map(|w| [w[0], w[1]]).collect();
            mesher.add_block(Entity::new(Dim::Curve, tag), LINE, lines);
        }
    }

    if dim >= Dim::Surface {
        for tag in visible(Dim::Surface) {
            mesher.mesh_surface(tag)?;
        }
    }

    if dim >= Dim::Volume && !visible(Dim::Volume).is_empty() {
        return Err(KernelError::Unsupported("reference: volume meshing".into()));
    }

    debug!(
        nodes = mesher.data.nodes.len(),
        elements = mesher.next_element,
        "Reference mesh generated"
    );
    Ok(mesher.data)
}

/// Properties of the element types the crate knows about
pub(super) fn element_properties(element_type: i32) -> KernelResult<ElementProperties> {
    let (name, dim, order, num_nodes) = match element_type {
        1 => ("Line 2", 1, 1, 2),
        2 => ("Triangle 3", 2, 1, 3),
        3 => ("Quadrilateral 4", 2, 1, 4),
        4 => ("Tetrahedron 4", 3, 1, 4),
        5 => ("Hexahedron 8", 3, 1, 8),
        6 => ("Prism 6", 3, 1, 6),
        7 => ("Pyramid 5", 3, 1, 5),
        8 => ("Line 3", 1, 2, 3),
        9 => ("Triangle 6", 2, 2, 6),
        10 => ("Quadrilateral 9", 2, 2, 9),
        11 => ("Tetrahedron 10", 3, 2, 10),
        15 => ("Point", 0, 1, 1),
        16 => ("Quadrilateral 8", 2, 2, 8),
        _ => {
            return Err(KernelError::InvalidInput(format!(
                "unknown element type {element_type}"
            )));
        }
    };
    Ok(ElementProperties {
        name: name.to_string(),
        dim,
        order,
        num_nodes,
    })
}

impl Mesher<'_> {
    fn add_node(&mut self, x: DVec3) -> usize {
        self.data.nodes.push(x);
        self.data.nodes.len()
    }

    fn node_position(&self, node: usize) -> DVec3 {
        self.data.nodes[node - 1]
    }

    fn joined(&self, a: usize, b: usize) -> bool {
        a == b || self.node_position(a).distance(self.node_position(b)) <= self.tolerance
    }

    fn point_node(&mut self, tag: Tag) -> KernelResult<usize> {
        if let Some(node) = self.point_nodes.get(&tag) {
            return Ok(*node);
        }
        let x = self.model.position(tag)?;
        let node = self.add_node(x);
        self.point_nodes.insert(tag, node);
        Ok(node)
    }

    fn add_block(&mut self, entity: Entity, element_type: i32, node_tags: Vec<usize>) {
        let per_element = match element_type {
            POINT => 1,
            LINE => 2,
            TRIANGLE => 3,
            _ => 4,
        };
        let count = node_tags.len() / per_element;
        if count == 0 {
            return;
        }
        let element_tags = (self.next_element + 1..=self.next_element + count).collect();
        self.next_element += count;
        self.data
            .elements
            .entry(entity)
            .or_default()
            .push(ElementBlock {
                element_type,
                element_tags,
                node_tags,
            });
    }

    // ========== Curves ==========

    /// Side curves of one extrusion share one parameter distribution
    fn prepare_groups(&mut self) -> KernelResult<()> {
        let model = self.model;
        let mut members: BTreeMap<usize, Vec<(Tag, &CurveData)>> = BTreeMap::new();
        for (tag, curve) in &model.curves {
            if let Some(group) = curve.group {
                members.entry(group).or_default().push((*tag, curve));
            }
        }

        for (group, curves) in members {
            let params = match curves.first() {
                Some((_, first)) if first.layers.is_structured() => layered_params(&first.layers)?,
                _ => {
                    let mut segments = 1;
                    for (tag, curve) in &curves {
                        segments = segments.max(self.size_driven_params(*tag, &curve.shape)?.len() - 1);
                    }
                    (0..=segments).map(|k| k as f64 / segments as f64).collect()
                }
            };
            self.group_params.insert(group, params);
        }
        Ok(())
    }

    fn curve_mesh(&self, tag: Tag) -> KernelResult<&CurveMesh> {
        self.curve_meshes.get(&tag).ok_or_else(|| {
            KernelError::OperationFailed(format!("curve {tag} has not been meshed"))
        })
    }

    fn mesh_curve(&mut self, tag: Tag, depth: usize) -> KernelResult<()> {
        if self.curve_meshes.contains_key(&tag) {
            return Ok(());
        }
        if depth > MAX_IMAGE_DEPTH {
            return Err(KernelError::OperationFailed(format!(
                "curve {tag} is its own extrusion source"
            )));
        }
        let model = self.model;
        let curve = model.curve(tag)?;
        let (start, end) = curve.shape.endpoints();

        let (params, positions) = match curve.image_of {
            Some((base, sweep)) => {
                self.mesh_curve(base, depth + 1)?;
                let base_mesh = self.curve_mesh(base)?;
                let positions = base_mesh
                    .nodes
                    .iter()
                    .map(|n| sweep.apply(self.node_position(*n), 1.0))
                    .collect::<Vec<_>>();
                (base_mesh.params.clone(), positions)
            }
            None => {
                let params = self.curve_params(tag, curve)?;
                let positions = params
                    .iter()
                    .map(|t| curve_point(model, &curve.shape, *t))
                    .collect::<KernelResult<Vec<_>>>()?;
                (params, positions)
            }
        };

        let last = positions.len().saturating_sub(1);
        let mut nodes = Vec::with_capacity(positions.len());
        nodes.push(self.point_node(start)?);
        for x in &positions[1..last] {
            nodes.push(self.add_node(*x));
        }
        nodes.push(self.point_node(end)?);

        self.curve_meshes.insert(tag, CurveMesh { nodes, params });
        Ok(())
    }

    fn curve_params(&self, tag: Tag, curve: &CurveData) -> KernelResult<Vec<f64>> {
        if let Some(params) = curve.group.and_then(|g| self.group_params.get(&g)) {
            return Ok(params.clone());
        }
        if let Some((num_nodes, distribution, coefficient)) = curve.transfinite {
            return transfinite_params(num_nodes, distribution, coefficient);
        }
        if curve.layers.is_structured() {
            return layered_params(&curve.layers);
        }
        self.size_driven_params(tag, &curve.shape)
    }

    /// Parameters equidistributing the integral of `1 / size` along the curve
    fn size_driven_params(&self, tag: Tag, shape: &CurveShape) -> KernelResult<Vec<f64>> {
        let (start, end) = shape.endpoints();
        let set = |size: f64| (size > 0.0).then_some(size);
        let s0 = set(self.model.point(start)?.size);
        let s1 = set(self.model.point(end)?.size);
        let default = self.sizes.default_size;
        let point_size = |t: f64| match (s0, s1) {
            (None, None) => None,
            (a, b) => {
                let (a, b) = (a.unwrap_or(default), b.unwrap_or(default));
                Some(a + (b - a) * t)
            }
        };

        let xs = (0..=SAMPLES)
            .map(|k| curve_point(self.model, shape, k as f64 / SAMPLES as f64))
            .collect::<KernelResult<Vec<_>>>()?;
        let mut cumulative = Vec::with_capacity(SAMPLES + 1);
        cumulative.push(0.0);
        let mut total = 0.0;
        for k in 0..SAMPLES {
            let length = xs[k].distance(xs[k + 1]);
            let t = (k as f64 + 0.5) / SAMPLES as f64;
            let mid = (xs[k] + xs[k + 1]) * 0.5;
            total += length / self.sizes.size_at(Dim::Curve, tag, mid, point_size(t))?;
            cumulative.push(total);
        }

        let mut segments = ((total - 1e-6).ceil().max(1.0)) as usize;
        if start == end {
            segments = segments.max(3);
        }
        if total <= 0.0 {
            return Ok((0..=segments).map(|k| k as f64 / segments as f64).collect());
        }

        let mut params = Vec::with_capacity(segments + 1);
        params.push(0.0);
        for k in 1..segments {
            let target = total * k as f64 / segments as f64;
            let j = cumulative
                .partition_point(|c| *c <= target)
                .saturating_sub(1)
                .min(SAMPLES - 1);
            let span = cumulative[j + 1] - cumulative[j];
            let local = if span > 0.0 {
                (target - cumulative[j]) / span
            } else {
                0.0
            };
            params.push((j as f64 + local) / SAMPLES as f64);
        }
        params.push(1.0);
        Ok(params)
    }

    // ========== Surfaces ==========

    fn mesh_surface(&mut self, tag: Tag) -> KernelResult<()> {
        let model = self.model;
        let surface = model.surface(tag)?;
        let entity = Entity::new(Dim::Surface, tag);
        let arrangement = surface
            .transfinite
            .as_ref()
            .map(|(a, _)| *a)
            .unwrap_or_default();

        match &surface.shape {
            SurfaceShape::Swept {
                base,
                top,
                start_side,
                end_side,
                sweep,
            } => {
                for curve in [*base, *top, *start_side, *end_side] {
                    self.mesh_curve(curve, 0)?;
                }
                let bottom = self.curve_mesh(*base)?.nodes.clone();
                let upper = self.curve_mesh(*top)?.nodes.clone();
                let left = self.curve_mesh(*start_side)?;
                let (left, params) = (left.nodes.clone(), left.params.clone());
                let right = self.curve_mesh(*end_side)?.nodes.clone();
                if bottom.len() != upper.len() || left.len() != right.len() {
                    return Err(KernelError::OperationFailed(format!(
                        "swept surface {tag} has mismatched boundary discretizations"
                    )));
                }

                let (n, m) = (bottom.len() - 1, left.len() - 1);
                let mut grid = vec![bottom.clone()];
                for j in 1..m {
                    let mut row = Vec::with_capacity(n + 1);
                    row.push(left[j]);
                    for node in &bottom[1..n] {
                        let x = sweep.apply(self.node_position(*node), params[j]);
                        row.push(self.add_node(x));
                    }
                    row.push(right[j]);
                    grid.push(row);
                }
                if m > 0 {
                    grid.push(upper);
                }
                self.emit_grid(entity, &grid, surface.recombine, arrangement);
                Ok(())
            }
            SurfaceShape::Planar { loops, filling } => {
                let Some(outer) = loops.first() else {
                    return Err(KernelError::InvalidInput(format!(
                        "surface {tag} has no boundary"
                    )));
                };

                if let Some((_, corners)) = &surface.transfinite {
                    if loops.len() > 1 {
                        return Err(KernelError::OperationFailed(format!(
                            "transfinite surface {tag} cannot have holes"
                        )));
                    }
                    let grid = self.coons_grid(*outer, corners)?.ok_or_else(|| {
                        KernelError::OperationFailed(format!(
                            "transfinite surface {tag} has mismatched opposite sides"
                        ))
                    })?;
                    self.emit_grid(entity, &grid, surface.recombine, arrangement);
                    return Ok(());
                }

                if *filling
                    && loops.len() == 1
                    && model.curve_loop(*outer)?.len() == 4
                    && let Some(grid) = self.coons_grid(*outer, &[])?
                {
                    self.emit_grid(entity, &grid, surface.recombine, arrangement);
                    return Ok(());
                }

                self.triangulate(entity, loops, &surface.embedded)
            }
        }
    }

    /// Node ring of a curve loop plus the ring index where each curve starts
    fn ring(&mut self, curve_loop: Tag) -> KernelResult<(Vec<usize>, Vec<usize>)> {
        let mut ring: Vec<usize> = Vec::new();
        let mut starts = Vec::new();
        for signed in self.model.curve_loop(curve_loop)?.to_vec() {
            self.mesh_curve(signed.abs(), 0)?;
            let mut nodes = self.curve_mesh(signed.abs())?.nodes.clone();
            if signed < 0 {
                nodes.reverse();
            }
            match ring.last() {
                None => {
                    starts.push(0);
                    ring.extend(nodes);
                }
                Some(last) if self.joined(*last, nodes[0]) => {
                    starts.push(ring.len() - 1);
                    ring.extend(&nodes[1..]);
                }
                Some(_) => {
                    return Err(KernelError::OperationFailed(format!(
                        "curve loop {curve_loop} is not closed at curve {signed}"
                    )));
                }
            }
        }
        if ring.len() > 1 && self.joined(ring[0], ring[ring.len() - 1]) {
            ring.pop();
        } else {
            return Err(KernelError::OperationFailed(format!(
                "curve loop {curve_loop} does not close"
            )));
        }
        Ok((ring, starts))
    }

    /// Transfinite interpolation over a four-sided loop
    ///
    /// Returns `None` when opposite sides carry different node counts.
    fn coons_grid(&mut self, curve_loop: Tag, corners: &[Tag]) -> KernelResult<Option<Vec<Vec<usize>>>> {
        let (ring, starts) = self.ring(curve_loop)?;
        let mut corner_index = match corners.len() {
            0 if starts.len() == 4 => starts,
            0 => {
                return Err(KernelError::OperationFailed(format!(
                    "curve loop {curve_loop} needs four curves or explicit corners"
                )));
            }
            3 => {
                return Err(KernelError::Unsupported(
                    "reference: three-corner transfinite surfaces".into(),
                ));
            }
            4 => {
                let mut indices = Vec::with_capacity(4);
                for corner in corners {
                    let node = self.point_node(*corner)?;
                    let index = ring.iter().position(|n| *n == node).ok_or_else(|| {
                        KernelError::InvalidInput(format!(
                            "corner point {corner} is not on curve loop {curve_loop}"
                        ))
                    })?;
                    indices.push(index);
                }
                indices
            }
            count => {
                return Err(KernelError::InvalidInput(format!(
                    "transfinite surface needs 0, 3 or 4 corners, got {count}"
                )));
            }
        };
        corner_index.sort_unstable();

        let len = ring.len();
        let sides: Vec<Vec<usize>> = (0..4)
            .map(|k| {
                let from = corner_index[k];
                let to = corner_index[(k + 1) % 4];
                let steps = (to + len - from) % len;
                (0..=steps).map(|s| ring[(from + s) % len]).collect()
            })
            .collect();
        if sides[0].len() != sides[2].len() || sides[1].len() != sides[3].len() {
            return Ok(None);
        }

        let (n, m) = (sides[0].len() - 1, sides[1].len() - 1);
        if n == 0 || m == 0 {
            return Ok(None);
        }
        let bottom = |i: usize| sides[0][i];
        let right = |j: usize| sides[1][j];
        let top = |i: usize| sides[2][n - i];
        let left = |j: usize| sides[3][m - j];

        let mut grid = vec![(0..=n).map(bottom).collect::<Vec<_>>()];
        for j in 1..m {
            let v = j as f64 / m as f64;
            let mut row = vec![left(j)];
            for i in 1..n {
                let u = i as f64 / n as f64;
                let p = |node: usize| self.node_position(node);
                let x = (1.0 - v) * p(bottom(i)) + v * p(top(i)) + (1.0 - u) * p(left(j))
                    + u * p(right(j))
                    - ((1.0 - u) * (1.0 - v) * p(bottom(0))
                        + u * (1.0 - v) * p(bottom(n))
                        + u * v * p(top(n))
                        + (1.0 - u) * v * p(top(0)));
                row.push(self.add_node(x));
            }
            row.push(right(j));
            grid.push(row);
        }
        grid.push((0..=n).map(top).collect());
        Ok(Some(grid))
    }

    fn emit_grid(&mut self, entity: Entity, grid: &[Vec<usize>], recombine: bool, arrangement: Arrangement) {
        let mut triangles = Vec::new();
        let mut quads = Vec::new();
        for j in 0..grid.len().saturating_sub(1) {
            for i in 0..grid[j].len().saturating_sub(1) {
                let (a, b) = (grid[j][i], grid[j][i + 1]);
                let (c, d) = (grid[j + 1][i + 1], grid[j + 1][i]);
                let mut unique = vec![a, b, c, d];
                unique.dedup();
                if unique.first() == unique.last() && unique.len() > 1 {
                    unique.pop();
                }
                match unique.len() {
                    4 if recombine => quads.extend([a, b, c, d]),
                    4 => {
                        let left = match arrangement {
                            Arrangement::Left => true,
                            Arrangement::Right => false,
                            Arrangement::Alternate | Arrangement::AlternateLeft => (i + j) % 2 == 0,
                            Arrangement::AlternateRight => (i + j) % 2 == 1,
                        };
                        if left {
                            triangles.extend([a, b, c, a, c, d]);
                        } else {
                            triangles.extend([a, b, d, b, c, d]);
                        }
                    }
                    3 => triangles.extend(unique),
                    _ => {}
                }
            }
        }
        self.add_block(entity, TRIANGLE, triangles);
        self.add_block(entity, QUAD, quads);
    }

    fn triangulate(&mut self, entity: Entity, loops: &[Tag], embedded: &[Tag]) -> KernelResult<()> {
        let mut rings = Vec::with_capacity(loops.len());
        for l in loops {
            rings.push(self.ring(*l)?.0);
        }
        for point in embedded {
            rings.push(vec![self.point_node(*point)?]);
        }

        let outer: Vec<DVec3> = rings[0].iter().map(|n| self.node_position(*n)).collect();
        let normal = newell_normal(&outer);
        let Some(normal) = normal.try_normalize() else {
            return Err(KernelError::OperationFailed(format!(
                "surface {} has a degenerate boundary",
                entity.id
            )));
        };
        let u = normal.any_orthonormal_vector();
        let v = normal.cross(u);

        let mut vertices = Vec::new();
        let mut coords = Vec::new();
        let mut holes = Vec::new();
        for (k, ring) in rings.iter().enumerate() {
            if k > 0 {
                holes.push(vertices.len());
            }
            for node in ring {
                let x = self.node_position(*node);
                coords.extend([x.dot(u), x.dot(v)]);
                vertices.push(*node);
            }
        }

        let indices = earcutr::earcut(&coords, &holes, 2).map_err(|e| {
            KernelError::OperationFailed(format!(
                "triangulation of surface {} failed: {e:?}",
                entity.id
            ))
        })?;

        let mut triangles = Vec::with_capacity(indices.len());
        for tri in indices.chunks_exact(3) {
            let (a, mut b, mut c) = (vertices[tri[0]], vertices[tri[1]], vertices[tri[2]]);
            let (pa, pb, pc) = (
                self.node_position(a),
                self.node_position(b),
                self.node_position(c),
            );
            if (pb - pa).cross(pc - pa).dot(normal) < 0.0 {
                std::mem::swap(&mut b, &mut c);
            }
            triangles.extend([a, b, c]);
        }
        self.add_block(entity, TRIANGLE, triangles);
        Ok(())
    }
}

fn newell_normal(points: &[DVec3]) -> DVec3 {
    let mut normal = DVec3::ZERO;
    for (k, a) in points.iter().enumerate() {
        let b = points[(k + 1) % points.len()];
        normal += DVec3::new(
            (a.y - b.y) * (a.z + b.z),
            (a.z - b.z) * (a.x + b.x),
            (a.x - b.x) * (a.y + b.y),
        );
    }
    normal
}

fn layered_params(layers: &Layers) -> KernelResult<Vec<f64>> {
    let bands = layers.counts.len();
    let heights: Vec<f64> = if layers.heights.is_empty() {
        (1..=bands).map(|b| b as f64 / bands as f64).collect()
    } else if layers.heights.len() == bands {
        layers.heights.clone()
    } else {
        return Err(KernelError::InvalidInput(format!(
            "{} layer counts but {} heights",
            bands,
            layers.heights.len()
        )));
    };

    let mut params = vec![0.0];
    let mut previous = 0.0;
    for (count, height) in layers.counts.iter().zip(heights) {
        let count = (*count).max(1);
        for k in 1..=count {
            params.push(previous + (height - previous) * k as f64 / count as f64);
        }
        previous = height;
    }
    Ok(params)
}

fn transfinite_params(num_nodes: usize, distribution: Distribution, coefficient: f64) -> KernelResult<Vec<f64>> {
    if num_nodes < 2 {
        return Err(KernelError::InvalidInput(format!(
            "transfinite curve needs at least 2 nodes, got {num_nodes}"
        )));
    }
    let segments = num_nodes - 1;
    let weights: Vec<f64> = match distribution {
        Distribution::Progression => {
            let ratio = if coefficient == 0.0 { 1.0 } else { coefficient.abs() };
            let mut w: Vec<f64> = (0..segments).map(|i| ratio.powi(i as i32)).collect();
            if coefficient < 0.0 {
                w.reverse();
            }
            w
        }
        Distribution::Bump => {
            if coefficient <= 0.0 {
                return Err(KernelError::InvalidInput(
                    "bump coefficient must be positive".into(),
                ));
            }
            (0..segments)
                .map(|i| {
                    let s = (2.0 * i as f64 + 1.0 - segments as f64) / segments as f64;
                    1.0 + (coefficient - 1.0) * s * s
                })
                .collect()
        }
        Distribution::Beta => {
            return Err(KernelError::Unsupported(
                "reference: beta law distribution".into(),
            ));
        }
    };

    let total: f64 = weights.iter().sum();
    let mut params = Vec::with_capacity(num_nodes);
    let mut acc = 0.0;
    params.push(0.0);
    for w in &weights[..segments - 1] {
        acc += w;
        params.push(acc / total);
    }
    params.push(1.0);
    Ok(params)
}
