//! Reference Kernel Backend
//!
//! Pure Rust, in-memory kernel covering the native modeler's entity factories,
//! extrusion, transforms, size fields and meshing up to dimension two.
//!
//! Note: booleans, curved solid primitives, higher-order elements and volume
//! meshing are not provided and fail with [`KernelError::Unsupported`].

mod edit;
mod extrude;
mod geom;
mod mesher;
mod model;
mod size;

use std::collections::{BTreeMap, HashMap};

use glam::DVec3;
use tracing::{debug, info};

use self::geom::curve_point;
use self::mesher::MeshData;
use self::model::{CurveData, CurveShape, Model, PointData, SurfaceData, SurfaceShape, VolumeData, VolumeShape};
use self::size::{Field, FieldKind, SizeContext};
use super::{
    Arrangement, Distribution, ElementBlock, ElementProperties, Kernel, KernelError, KernelResult,
    Layers, Modeler, NodeSet, OccPrimitive, SizeCallback, Sweep, Transform,
};
use crate::entity::{Dim, Entity, Oriented, Tag};

/// Default for the `Geometry.Tolerance` option
const DEFAULT_TOLERANCE: f64 = 1e-8;

/// Pure Rust reference kernel
pub struct ReferenceKernel {
    initialized: bool,
    model_name: String,
    model: Model,
    options: HashMap<String, f64>,
    fields: BTreeMap<Tag, Field>,
    background: Option<Tag>,
    callback: Option<SizeCallback>,
    mesh: Option<MeshData>,
    next_group: usize,
}

impl ReferenceKernel {
    /// Create a new reference kernel
    pub fn new() -> Self {
        Self {
            initialized: false,
            model_name: String::new(),
            model: Model::default(),
            options: HashMap::new(),
            fields: BTreeMap::new(),
            background: None,
            callback: None,
            mesh: None,
            next_group: 0,
        }
    }

    /// Name of the current model
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    fn ready(&self) -> KernelResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(KernelError::NotAvailable(
                "reference kernel is not initialized".into(),
            ))
        }
    }

    fn reset(&mut self) {
        self.model = Model::default();
        self.options.clear();
        self.fields.clear();
        self.background = None;
        self.callback = None;
        self.mesh = None;
        self.next_group = 0;
    }

    fn tolerance(&self) -> f64 {
        self.options
            .get("Geometry.Tolerance")
            .copied()
            .unwrap_or(DEFAULT_TOLERANCE)
    }

    fn new_point(&mut self, x: DVec3, size: f64) -> Tag {
        let tag = self.model.counters.entity(Dim::Point);
        self.model.points.insert(tag, PointData { x, size });
        tag
    }

    /// Validate a curve shape and store it
    fn new_curve(&mut self, data: CurveData) -> KernelResult<Tag> {
        for point in data.shape.defining_points() {
            self.model.point(point)?;
        }
        let (start, end) = data.shape.endpoints();
        if start == end && matches!(data.shape, CurveShape::Line { .. }) {
            return Err(KernelError::InvalidInput(format!(
                "line from point {start} to itself"
            )));
        }
        curve_point(&self.model, &data.shape, 0.5)?;

        let tag = self.model.counters.entity(Dim::Curve);
        self.model.curves.insert(tag, data);
        Ok(tag)
    }

    fn new_surface(&mut self, data: SurfaceData) -> Tag {
        let tag = self.model.counters.entity(Dim::Surface);
        self.model.surfaces.insert(tag, data);
        tag
    }

    fn new_volume(&mut self, shape: VolumeShape) -> Tag {
        let tag = self.model.counters.entity(Dim::Volume);
        self.model.volumes.insert(
            tag,
            VolumeData {
                shape,
                transfinite: None,
            },
        );
        tag
    }

    fn new_curve_loop(&mut self, curves: Vec<Tag>) -> KernelResult<Tag> {
        if curves.is_empty() {
            return Err(KernelError::InvalidInput("empty curve loop".into()));
        }
        let oriented = |tag: Tag| -> KernelResult<(Tag, Tag)> {
            let (start, end) = self.model.curve(tag.abs())?.shape.endpoints();
            Ok(if tag < 0 { (end, start) } else { (start, end) })
        };
        let tolerance = self.tolerance();
        for (k, tag) in curves.iter().enumerate() {
            let next = curves[(k + 1) % curves.len()];
            let (_, end) = oriented(*tag)?;
            let (start, _) = oriented(next)?;
            let joined = end == start
                || self.model.position(end)?.distance(self.model.position(start)?) <= tolerance;
            if !joined {
                return Err(KernelError::InvalidInput(format!(
                    "curve loop is open between curves {tag} and {next}"
                )));
            }
        }
        let tag = self.model.counters.curve_loop();
        self.model.curve_loops.insert(tag, curves);
        Ok(tag)
    }

    fn line_between(&mut self, a: Tag, b: Tag) -> KernelResult<Tag> {
        self.new_curve(CurveData::new(CurveShape::Line { start: a, end: b }))
    }

    fn plane_surface(&mut self, curves: Vec<Tag>) -> KernelResult<Tag> {
        let curve_loop = self.new_curve_loop(curves)?;
        Ok(self.new_surface(SurfaceData::new(SurfaceShape::Planar {
            loops: vec![curve_loop],
            filling: false,
        })))
    }

    /// Rectangle, disk and box primitives built from native entities
    fn build_primitive(&mut self, primitive: &OccPrimitive) -> KernelResult<Tag> {
        match *primitive {
            OccPrimitive::Rectangle {
                corner,
                dx,
                dy,
                corner_radius,
            } => {
                if corner_radius > 0.0 {
                    return Err(KernelError::Unsupported(
                        "reference: rounded rectangles".into(),
                    ));
                }
                let offsets = [DVec3::ZERO, DVec3::X * dx, DVec3::new(dx, dy, 0.0), DVec3::Y * dy];
                let points: Vec<Tag> = offsets.iter().map(|o| self.new_point(corner + *o, 0.0)).collect();
                let mut lines = Vec::with_capacity(4);
                for k in 0..4 {
                    lines.push(self.line_between(points[k], points[(k + 1) % 4])?);
                }
                self.plane_surface(lines)
            }
            OccPrimitive::Disk { center, rx, ry } => {
                if rx <= 0.0 || ry <= 0.0 {
                    return Err(KernelError::InvalidInput("disk radii must be positive".into()));
                }
                let c = self.new_point(center, 0.0);
                let offsets = [DVec3::X * rx, DVec3::Y * ry, DVec3::X * -rx, DVec3::Y * -ry];
                let points: Vec<Tag> = offsets.iter().map(|o| self.new_point(center + *o, 0.0)).collect();
                let mut arcs = Vec::with_capacity(4);
                for k in 0..4 {
                    let (start, end) = (points[k], points[(k + 1) % 4]);
                    let shape = if rx == ry {
                        CurveShape::CircleArc { start, center: c, end }
                    } else {
                        let major = if rx >= ry { points[0] } else { points[1] };
                        CurveShape::EllipseArc {
                            start,
                            center: c,
                            major,
                            end,
                        }
                    };
                    arcs.push(self.new_curve(CurveData::new(shape))?);
                }
                self.plane_surface(arcs)
            }
            OccPrimitive::Box { corner, extents } => {
                let points: Vec<Tag> = (0..8)
                    .map(|i| {
                        let bits = DVec3::new((i & 1) as f64, ((i >> 1) & 1) as f64, ((i >> 2) & 1) as f64);
                        self.new_point(corner + extents * bits, 0.0)
                    })
                    .collect();
                const EDGES: [(usize, usize); 12] = [
                    (0, 1), (2, 3), (4, 5), (6, 7),
                    (0, 2), (1, 3), (4, 6), (5, 7),
                    (0, 4), (1, 5), (2, 6), (3, 7),
                ];
                const FACES: [[usize; 4]; 6] = [
                    [0, 2, 3, 1],
                    [4, 5, 7, 6],
                    [0, 1, 5, 4],
                    [2, 6, 7, 3],
                    [0, 4, 6, 2],
                    [1, 3, 7, 5],
                ];
                let mut edges = Vec::with_capacity(12);
                for (a, b) in EDGES {
                    edges.push(self.line_between(points[a], points[b])?);
                }
                let signed_edge = |a: usize, b: usize| -> Tag {
                    EDGES
                        .iter()
                        .position(|e| *e == (a, b))
                        .map(|k| edges[k])
                        .or_else(|| EDGES.iter().position(|e| *e == (b, a)).map(|k| -edges[k]))
                        .unwrap_or_default()
                };
                let mut faces = Vec::with_capacity(6);
                for face in FACES {
                    let curves = (0..4).map(|k| signed_edge(face[k], face[(k + 1) % 4])).collect();
                    faces.push(self.plane_surface(curves)?);
                }
                let shell = self.model.counters.surface_loop();
                self.model.surface_loops.insert(shell, faces);
                Ok(self.new_volume(VolumeShape::Shells(vec![shell])))
            }
            _ => Err(KernelError::Unsupported(
                "reference: curved solid primitives".into(),
            )),
        }
    }

    /// Every committed entity of the given kind must exist
    fn require_all(&self, dim: Dim, tags: &[Tag]) -> KernelResult<()> {
        for tag in tags {
            self.model.require_visible(Entity::new(dim, tag.abs()))?;
        }
        Ok(())
    }

    fn mesh(&self) -> KernelResult<&MeshData> {
        self.mesh
            .as_ref()
            .ok_or_else(|| KernelError::OperationFailed("no mesh has been generated".into()))
    }
}

impl Default for ReferenceKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel for ReferenceKernel {
    fn name(&self) -> &str {
        "reference"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn initialize(&mut self) -> KernelResult<()> {
        self.reset();
        self.initialized = true;
        debug!("Reference kernel initialized");
        Ok(())
    }

    fn finalize(&mut self) -> KernelResult<()> {
        self.ready()?;
        self.reset();
        self.initialized = false;
        debug!("Reference kernel finalized");
        Ok(())
    }

    fn add_model(&mut self, name: &str) -> KernelResult<()> {
        self.ready()?;
        self.model = Model::default();
        self.mesh = None;
        self.model_name = name.to_string();
        Ok(())
    }

    fn set_option_number(&mut self, name: &str, value: f64) -> KernelResult<()> {
        self.ready()?;
        self.options.insert(name.to_string(), value);
        Ok(())
    }

    fn synchronize(&mut self, modeler: Modeler) -> KernelResult<()> {
        self.ready()?;
        self.model.visible = self.model.all_entities().into_iter().collect();
        debug!(%modeler, entities = self.model.visible.len(), "Synchronized");
        Ok(())
    }

    fn add_point(&mut self, _modeler: Modeler, x: DVec3, mesh_size: f64) -> KernelResult<Tag> {
        self.ready()?;
        if mesh_size < 0.0 || !x.is_finite() {
            return Err(KernelError::InvalidInput(format!(
                "point {x} with mesh size {mesh_size}"
            )));
        }
        Ok(self.new_point(x, mesh_size))
    }

    fn add_line(&mut self, _modeler: Modeler, start: Tag, end: Tag) -> KernelResult<Tag> {
        self.ready()?;
        self.line_between(start, end)
    }

    fn add_circle_arc(
        &mut self,
        _modeler: Modeler,
        start: Tag,
        center: Tag,
        end: Tag,
    ) -> KernelResult<Tag> {
        self.ready()?;
        self.new_curve(CurveData::new(CurveShape::CircleArc { start, center, end }))
    }

    fn add_ellipse_arc(
        &mut self,
        _modeler: Modeler,
        start: Tag,
        center: Tag,
        major: Tag,
        end: Tag,
    ) -> KernelResult<Tag> {
        self.ready()?;
        self.new_curve(CurveData::new(CurveShape::EllipseArc {
            start,
            center,
            major,
            end,
        }))
    }

    fn add_spline(&mut self, _modeler: Modeler, points: &[Tag]) -> KernelResult<Tag> {
        self.ready()?;
        if points.len() < 2 {
            return Err(KernelError::InvalidInput("spline needs two points".into()));
        }
        self.new_curve(CurveData::new(CurveShape::Spline(points.to_vec())))
    }

    fn add_bspline(&mut self, _modeler: Modeler, points: &[Tag]) -> KernelResult<Tag> {
        self.ready()?;
        if points.len() < 2 {
            return Err(KernelError::InvalidInput("B-spline needs two points".into()));
        }
        self.new_curve(CurveData::new(CurveShape::BSpline(points.to_vec())))
    }

    fn add_bezier(&mut self, _modeler: Modeler, points: &[Tag]) -> KernelResult<Tag> {
        self.ready()?;
        if points.len() < 2 {
            return Err(KernelError::InvalidInput("Bezier curve needs two points".into()));
        }
        self.new_curve(CurveData::new(CurveShape::Bezier(points.to_vec())))
    }

    fn add_curve_loop(&mut self, _modeler: Modeler, curves: &[Tag]) -> KernelResult<Tag> {
        self.ready()?;
        self.new_curve_loop(curves.to_vec())
    }

    fn add_plane_surface(&mut self, _modeler: Modeler, loops: &[Tag]) -> KernelResult<Tag> {
        self.ready()?;
        if loops.is_empty() {
            return Err(KernelError::InvalidInput("plane surface needs a curve loop".into()));
        }
        for l in loops {
            self.model.curve_loop(*l)?;
        }
        Ok(self.new_surface(SurfaceData::new(SurfaceShape::Planar {
            loops: loops.to_vec(),
            filling: false,
        })))
    }

    fn add_surface_filling(&mut self, _modeler: Modeler, curve_loop: Tag) -> KernelResult<Tag> {
        self.ready()?;
        self.model.curve_loop(curve_loop)?;
        Ok(self.new_surface(SurfaceData::new(SurfaceShape::Planar {
            loops: vec![curve_loop],
            filling: true,
        })))
    }

    fn add_surface_loop(&mut self, _modeler: Modeler, surfaces: &[Tag]) -> KernelResult<Tag> {
        self.ready()?;
        if surfaces.is_empty() {
            return Err(KernelError::InvalidInput("empty surface loop".into()));
        }
        for s in surfaces {
            self.model.surface(s.abs())?;
        }
        let tag = self.model.counters.surface_loop();
        self.model.surface_loops.insert(tag, surfaces.to_vec());
        Ok(tag)
    }

    fn add_volume(&mut self, _modeler: Modeler, shells: &[Tag]) -> KernelResult<Tag> {
        self.ready()?;
        if shells.is_empty() {
            return Err(KernelError::InvalidInput("volume needs a surface loop".into()));
        }
        for s in shells {
            self.model.surface_loop(*s)?;
        }
        Ok(self.new_volume(VolumeShape::Shells(shells.to_vec())))
    }

    fn add_primitive(&mut self, primitive: &OccPrimitive) -> KernelResult<Tag> {
        self.ready()?;
        self.build_primitive(primitive)
    }

    fn extrude(
        &mut self,
        modeler: Modeler,
        entities: &[Entity],
        sweep: &Sweep,
        layers: &Layers,
        recombine: bool,
    ) -> KernelResult<Vec<Entity>> {
        self.ready()?;
        self.extrude_entities(modeler, entities, sweep, layers, recombine)
    }

    fn transform(
        &mut self,
        _modeler: Modeler,
        entities: &[Entity],
        transform: &Transform,
    ) -> KernelResult<()> {
        self.ready()?;
        self.transform_entities(entities, transform)
    }

    fn copy(&mut self, _modeler: Modeler, entities: &[Entity]) -> KernelResult<Vec<Entity>> {
        self.ready()?;
        self.copy_entities(entities)
    }

    fn remove(
        &mut self,
        _modeler: Modeler,
        entities: &[Entity],
        recursive: bool,
    ) -> KernelResult<()> {
        self.ready()?;
        self.remove_entities(entities, recursive)
    }

    fn get_boundary(
        &self,
        entities: &[Entity],
        combined: bool,
        oriented: bool,
        recursive: bool,
    ) -> KernelResult<Vec<Oriented<Entity>>> {
        self.ready()?;
        for entity in entities {
            self.model.require_visible(*entity)?;
        }

        if recursive {
            let mut points = Vec::new();
            for entity in entities {
                let mut closure = std::collections::BTreeSet::new();
                self.model.closure(*entity, &mut closure)?;
                for e in closure.into_iter().filter(|e| e.dim == Dim::Point) {
                    if !points.contains(&e) {
                        points.push(e);
                    }
                }
            }
            return Ok(points.into_iter().map(Oriented::forward).collect());
        }

        let mut signed: Vec<(Entity, bool)> = Vec::new();
        for entity in entities {
            signed.extend(self.model.boundary(*entity)?);
        }
        if combined {
            let mut counts: HashMap<Entity, usize> = HashMap::new();
            for (e, _) in &signed {
                *counts.entry(*e).or_default() += 1;
            }
            let mut seen = Vec::new();
            signed.retain(|(e, _)| {
                let keep = counts[e] % 2 == 1 && !seen.contains(e);
                seen.push(*e);
                keep
            });
        }

        Ok(signed
            .into_iter()
            .map(|(e, reversed)| {
                if oriented && reversed {
                    Oriented::reversed(e)
                } else {
                    Oriented::forward(e)
                }
            })
            .collect())
    }

    fn get_entities(&self, dim: Option<Dim>) -> Vec<Entity> {
        self.model
            .visible
            .iter()
            .filter(|e| dim.is_none_or(|d| e.dim == d))
            .copied()
            .collect()
    }

    fn point_coordinates(&self, tag: Tag) -> KernelResult<DVec3> {
        self.ready()?;
        self.model.require_visible(Entity::new(Dim::Point, tag))?;
        self.model.position(tag)
    }

    fn set_size(&mut self, points: &[Entity], size: f64) -> KernelResult<()> {
        self.ready()?;
        if size.is_nan() || size <= 0.0 {
            return Err(KernelError::InvalidInput(format!("mesh size {size}")));
        }
        for point in points {
            if point.dim != Dim::Point {
                return Err(KernelError::InvalidInput(format!(
                    "sizes are set on points, got {point}"
                )));
            }
            self.model.require_visible(*point)?;
        }
        for point in points {
            if let Some(data) = self.model.points.get_mut(&point.id) {
                data.size = size;
            }
        }
        Ok(())
    }

    fn field_add(&mut self, kind: &str) -> KernelResult<Tag> {
        self.ready()?;
        let kind = FieldKind::parse(kind)
            .ok_or_else(|| KernelError::Unsupported(format!("reference: size field {kind}")))?;
        let tag = self.model.counters.field();
        self.fields.insert(tag, Field::new(kind));
        Ok(tag)
    }

    fn field_set_number(&mut self, field: Tag, option: &str, value: f64) -> KernelResult<()> {
        self.ready()?;
        let field = self
            .fields
            .get_mut(&field)
            .ok_or_else(|| KernelError::InvalidInput(format!("unknown size field {field}")))?;
        field.numbers.insert(option.to_string(), value);
        Ok(())
    }

    fn field_set_numbers(&mut self, field: Tag, option: &str, values: &[f64]) -> KernelResult<()> {
        self.ready()?;
        let field = self
            .fields
            .get_mut(&field)
            .ok_or_else(|| KernelError::InvalidInput(format!("unknown size field {field}")))?;
        field.lists.insert(option.to_string(), values.to_vec());
        Ok(())
    }

    fn field_set_as_background_mesh(&mut self, field: Tag) -> KernelResult<()> {
        self.ready()?;
        if !self.fields.contains_key(&field) {
            return Err(KernelError::InvalidInput(format!("unknown size field {field}")));
        }
        self.background = Some(field);
        Ok(())
    }

    fn set_size_callback(&mut self, callback: SizeCallback) -> KernelResult<()> {
        self.ready()?;
        self.callback = Some(callback);
        Ok(())
    }

    fn remove_size_callback(&mut self) -> KernelResult<()> {
        self.callback = None;
        Ok(())
    }

    fn set_transfinite_curve(
        &mut self,
        tag: Tag,
        num_nodes: usize,
        distribution: Distribution,
        coefficient: f64,
    ) -> KernelResult<()> {
        self.ready()?;
        self.model.require_visible(Entity::new(Dim::Curve, tag))?;
        if num_nodes < 2 {
            return Err(KernelError::InvalidInput(format!(
                "transfinite curve {tag} needs at least 2 nodes"
            )));
        }
        if distribution == Distribution::Beta {
            return Err(KernelError::Unsupported(
                "reference: beta law distribution".into(),
            ));
        }
        if let Some(curve) = self.model.curves.get_mut(&tag) {
            curve.transfinite = Some((num_nodes, distribution, coefficient));
        }
        Ok(())
    }

    fn set_transfinite_surface(
        &mut self,
        tag: Tag,
        arrangement: Arrangement,
        corners: &[Tag],
    ) -> KernelResult<()> {
        self.ready()?;
        self.model.require_visible(Entity::new(Dim::Surface, tag))?;
        self.require_all(Dim::Point, corners)?;
        match corners.len() {
            0 | 4 => {}
            3 => {
                return Err(KernelError::Unsupported(
                    "reference: three-corner transfinite surfaces".into(),
                ));
            }
            n => {
                return Err(KernelError::InvalidInput(format!(
                    "transfinite surface needs 0, 3 or 4 corners, got {n}"
                )));
            }
        }
        if let Some(surface) = self.model.surfaces.get_mut(&tag) {
            surface.transfinite = Some((arrangement, corners.to_vec()));
        }
        Ok(())
    }

    fn set_transfinite_volume(&mut self, tag: Tag, corners: &[Tag]) -> KernelResult<()> {
        self.ready()?;
        self.model.require_visible(Entity::new(Dim::Volume, tag))?;
        self.require_all(Dim::Point, corners)?;
        if ![0, 6, 8].contains(&corners.len()) {
            return Err(KernelError::InvalidInput(format!(
                "transfinite volume needs 0, 6 or 8 corners, got {}",
                corners.len()
            )));
        }
        if let Some(volume) = self.model.volumes.get_mut(&tag) {
            volume.transfinite = Some(corners.to_vec());
        }
        Ok(())
    }

    fn set_recombine(&mut self, dim: Dim, tag: Tag) -> KernelResult<()> {
        self.ready()?;
        match dim {
            Dim::Surface => {
                self.model.require_visible(Entity::new(dim, tag))?;
                if let Some(surface) = self.model.surfaces.get_mut(&tag) {
                    surface.recombine = true;
                }
                Ok(())
            }
            Dim::Volume => Err(KernelError::Unsupported(
                "reference: volume recombination".into(),
            )),
            _ => Err(KernelError::InvalidInput(format!(
                "cannot recombine a {dim}"
            ))),
        }
    }

    fn set_compound(&mut self, dim: Dim, tags: &[Tag]) -> KernelResult<()> {
        self.ready()?;
        self.require_all(dim, tags)?;
        // Members are still meshed one by one.
        self.model.compounds.push((dim, tags.to_vec()));
        Ok(())
    }

    fn embed(&mut self, dim: Dim, tags: &[Tag], host_dim: Dim, host: Tag) -> KernelResult<()> {
        self.ready()?;
        if dim >= host_dim {
            return Err(KernelError::InvalidInput(format!(
                "cannot embed a {dim} in a {host_dim}"
            )));
        }
        self.model.require_visible(Entity::new(host_dim, host))?;
        self.require_all(dim, tags)?;
        match (dim, host_dim) {
            (Dim::Point, Dim::Surface) => {
                if let Some(surface) = self.model.surfaces.get_mut(&host) {
                    for tag in tags {
                        if !surface.embedded.contains(tag) {
                            surface.embedded.push(*tag);
                        }
                    }
                }
                Ok(())
            }
            // Volumes are never meshed here, so nothing needs to be kept.
            (_, Dim::Volume) => Ok(()),
            _ => Err(KernelError::Unsupported(format!(
                "reference: embedding a {dim} in a {host_dim}"
            ))),
        }
    }

    fn set_outward_orientation(&mut self, volume: Tag) -> KernelResult<()> {
        self.ready()?;
        self.model.require_visible(Entity::new(Dim::Volume, volume))
    }

    fn set_order(&mut self, order: usize) -> KernelResult<()> {
        self.ready()?;
        match order {
            1 => Ok(()),
            _ => Err(KernelError::Unsupported(format!(
                "reference: element order {order}"
            ))),
        }
    }

    fn add_physical_group(&mut self, dim: Dim, tags: &[Tag]) -> KernelResult<Tag> {
        self.ready()?;
        self.require_all(dim, tags)?;
        let tag = self.model.counters.physical(dim);
        self.model.physical.insert(
            (dim, tag),
            model::PhysicalGroup {
                entities: tags.to_vec(),
                name: String::new(),
            },
        );
        Ok(tag)
    }

    fn set_physical_name(&mut self, dim: Dim, tag: Tag, name: &str) -> KernelResult<()> {
        self.ready()?;
        let group = self
            .model
            .physical
            .get_mut(&(dim, tag))
            .ok_or_else(|| KernelError::InvalidInput(format!("unknown physical group {dim} {tag}")))?;
        group.name = name.to_string();
        Ok(())
    }

    fn get_physical_groups(&self) -> Vec<Entity> {
        self.model
            .physical
            .keys()
            .map(|(dim, tag)| Entity::new(*dim, *tag))
            .collect()
    }

    fn get_physical_name(&self, dim: Dim, tag: Tag) -> KernelResult<String> {
        self.model
            .physical
            .get(&(dim, tag))
            .map(|g| g.name.clone())
            .ok_or_else(|| KernelError::InvalidInput(format!("unknown physical group {dim} {tag}")))
    }

    fn get_entities_for_physical_group(&self, dim: Dim, tag: Tag) -> KernelResult<Vec<Tag>> {
        self.model
            .physical
            .get(&(dim, tag))
            .map(|g| g.entities.clone())
            .ok_or_else(|| KernelError::InvalidInput(format!("unknown physical group {dim} {tag}")))
    }

    fn generate(&mut self, dim: Dim) -> KernelResult<()> {
        self.ready()?;
        let sizes = SizeContext::new(
            &self.model,
            &self.options,
            &self.fields,
            self.background,
            self.callback.as_ref(),
        )?;
        let mesh = mesher::generate(&self.model, &sizes, dim, self.tolerance())?;
        info!(
            model = %self.model_name,
            %dim,
            nodes = mesh.nodes.len(),
            "Mesh generated"
        );
        self.mesh = Some(mesh);
        Ok(())
    }

    fn get_nodes(&self) -> KernelResult<NodeSet> {
        let mesh = self.mesh()?;
        Ok(NodeSet {
            tags: (1..=mesh.nodes.len()).collect(),
            coordinates: mesh.nodes.iter().map(|x| x.to_array()).collect(),
        })
    }

    fn get_elements(&self, dim: Dim, tag: Tag) -> KernelResult<Vec<ElementBlock>> {
        let mesh = self.mesh()?;
        let entity = Entity::new(dim, tag);
        if !self.model.contains(entity) {
            return Err(KernelError::UnknownEntity(entity));
        }
        Ok(mesh.elements.get(&entity).cloned().unwrap_or_default())
    }

    fn get_element_properties(&self, element_type: i32) -> KernelResult<ElementProperties> {
        mesher::element_properties(element_type)
    }
}

#[cfg(test)]
mod tests;
