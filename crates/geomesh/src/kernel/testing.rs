//! Test kernel that records calls and scripts boolean results
//!
//! Wraps a [`ReferenceKernel`] and appends the name of every state-changing
//! call to a shared log, so tests can assert on call order after the kernel
//! has been moved into a session.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use glam::DVec3;

use super::{
    Arrangement, BooleanOp, Distribution, ElementBlock, ElementProperties, Kernel, KernelError,
    KernelResult, Layers, Modeler, NodeSet, OccPrimitive, ReferenceKernel, SizeCallback, Sweep,
    Transform,
};
use crate::entity::{Dim, Entity, Oriented, Tag};

/// Shared call log
pub(crate) type CallLog = Rc<RefCell<Vec<String>>>;

pub(crate) struct RecordingKernel {
    inner: ReferenceKernel,
    log: CallLog,
    booleans: VecDeque<Vec<Entity>>,
    /// Multiplier applied to node tags, to produce sparse numbering
    node_stride: usize,
}

impl RecordingKernel {
    pub fn new() -> (Self, CallLog) {
        let log = CallLog::default();
        let kernel = Self {
            inner: ReferenceKernel::new(),
            log: log.clone(),
            booleans: VecDeque::new(),
            node_stride: 1,
        };
        (kernel, log)
    }

    /// Queue the result of the next boolean call
    pub fn script_boolean(mut self, result: Vec<Entity>) -> Self {
        self.booleans.push_back(result);
        self
    }

    /// Report node tags multiplied by `stride`
    pub fn sparse_nodes(mut self, stride: usize) -> Self {
        self.node_stride = stride;
        self
    }

    fn record(&self, call: &str) {
        self.log.borrow_mut().push(call.to_string());
    }
}

/// Position of the first logged call with this name
pub(crate) fn position(log: &CallLog, call: &str) -> Option<usize> {
    log.borrow().iter().position(|c| c == call)
}

impl Kernel for RecordingKernel {
    fn name(&self) -> &str {
        "recording"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn initialize(&mut self) -> KernelResult<()> {
        self.record("initialize");
        self.inner.initialize()
    }

    fn finalize(&mut self) -> KernelResult<()> {
        self.record("finalize");
        self.inner.finalize()
    }

    fn add_model(&mut self, name: &str) -> KernelResult<()> {
        self.record("add_model");
        self.inner.add_model(name)
    }

    fn set_option_number(&mut self, name: &str, value: f64) -> KernelResult<()> {
        self.record(&format!("option {name}"));
        self.inner.set_option_number(name, value)
    }

    fn synchronize(&mut self, modeler: Modeler) -> KernelResult<()> {
        self.record("synchronize");
        self.inner.synchronize(modeler)
    }

    fn add_point(&mut self, modeler: Modeler, x: DVec3, mesh_size: f64) -> KernelResult<Tag> {
        self.inner.add_point(modeler, x, mesh_size)
    }

    fn add_line(&mut self, modeler: Modeler, start: Tag, end: Tag) -> KernelResult<Tag> {
        self.inner.add_line(modeler, start, end)
    }

    fn add_circle_arc(&mut self, modeler: Modeler, start: Tag, center: Tag, end: Tag) -> KernelResult<Tag> {
        self.inner.add_circle_arc(modeler, start, center, end)
    }

    fn add_ellipse_arc(
        &mut self,
        modeler: Modeler,
        start: Tag,
        center: Tag,
        major: Tag,
        end: Tag,
    ) -> KernelResult<Tag> {
        self.inner.add_ellipse_arc(modeler, start, center, major, end)
    }

    fn add_spline(&mut self, modeler: Modeler, points: &[Tag]) -> KernelResult<Tag> {
        self.inner.add_spline(modeler, points)
    }

    fn add_bspline(&mut self, modeler: Modeler, points: &[Tag]) -> KernelResult<Tag> {
        self.inner.add_bspline(modeler, points)
    }

    fn add_bezier(&mut self, modeler: Modeler, points: &[Tag]) -> KernelResult<Tag> {
        self.inner.add_bezier(modeler, points)
    }

    fn add_curve_loop(&mut self, modeler: Modeler, curves: &[Tag]) -> KernelResult<Tag> {
        self.inner.add_curve_loop(modeler, curves)
    }

    fn add_plane_surface(&mut self, modeler: Modeler, loops: &[Tag]) -> KernelResult<Tag> {
        self.inner.add_plane_surface(modeler, loops)
    }

    fn add_surface_filling(&mut self, modeler: Modeler, curve_loop: Tag) -> KernelResult<Tag> {
        self.inner.add_surface_filling(modeler, curve_loop)
    }

    fn add_surface_loop(&mut self, modeler: Modeler, surfaces: &[Tag]) -> KernelResult<Tag> {
        self.inner.add_surface_loop(modeler, surfaces)
    }

    fn add_volume(&mut self, modeler: Modeler, shells: &[Tag]) -> KernelResult<Tag> {
        self.inner.add_volume(modeler, shells)
    }

    fn add_primitive(&mut self, primitive: &OccPrimitive) -> KernelResult<Tag> {
        self.inner.add_primitive(primitive)
    }

    fn extrude(
        &mut self,
        modeler: Modeler,
        entities: &[Entity],
        sweep: &Sweep,
        layers: &Layers,
        recombine: bool,
    ) -> KernelResult<Vec<Entity>> {
        self.record("extrude");
        self.inner.extrude(modeler, entities, sweep, layers, recombine)
    }

    fn transform(&mut self, modeler: Modeler, entities: &[Entity], transform: &Transform) -> KernelResult<()> {
        self.record("transform");
        self.inner.transform(modeler, entities, transform)
    }

    fn copy(&mut self, modeler: Modeler, entities: &[Entity]) -> KernelResult<Vec<Entity>> {
        self.inner.copy(modeler, entities)
    }

    fn remove(&mut self, modeler: Modeler, entities: &[Entity], recursive: bool) -> KernelResult<()> {
        self.record("remove");
        self.inner.remove(modeler, entities, recursive)
    }

    fn boolean(
        &mut self,
        op: BooleanOp,
        _objects: &[Entity],
        _tools: &[Entity],
        _remove_object: bool,
        _remove_tool: bool,
    ) -> KernelResult<Vec<Entity>> {
        self.record(&format!("boolean {op}"));
        self.booleans
            .pop_front()
            .ok_or_else(|| KernelError::Unsupported(format!("recording: unscripted boolean {op}")))
    }

    fn get_boundary(
        &self,
        entities: &[Entity],
        combined: bool,
        oriented: bool,
        recursive: bool,
    ) -> KernelResult<Vec<Oriented<Entity>>> {
        self.inner.get_boundary(entities, combined, oriented, recursive)
    }

    fn get_entities(&self, dim: Option<Dim>) -> Vec<Entity> {
        self.inner.get_entities(dim)
    }

    fn point_coordinates(&self, tag: Tag) -> KernelResult<DVec3> {
        self.inner.point_coordinates(tag)
    }

    fn set_size(&mut self, points: &[Entity], size: f64) -> KernelResult<()> {
        self.record("set_size");
        self.inner.set_size(points, size)
    }

    fn field_add(&mut self, kind: &str) -> KernelResult<Tag> {
        self.record("field_add");
        self.inner.field_add(kind)
    }

    fn field_set_number(&mut self, field: Tag, option: &str, value: f64) -> KernelResult<()> {
        self.inner.field_set_number(field, option, value)
    }

    fn field_set_numbers(&mut self, field: Tag, option: &str, values: &[f64]) -> KernelResult<()> {
        self.inner.field_set_numbers(field, option, values)
    }

    fn field_set_as_background_mesh(&mut self, field: Tag) -> KernelResult<()> {
        self.record("background_mesh");
        self.inner.field_set_as_background_mesh(field)
    }

    fn set_size_callback(&mut self, callback: SizeCallback) -> KernelResult<()> {
        self.record("set_size_callback");
        self.inner.set_size_callback(callback)
    }

    fn remove_size_callback(&mut self) -> KernelResult<()> {
        self.record("remove_size_callback");
        self.inner.remove_size_callback()
    }

    fn set_transfinite_curve(
        &mut self,
        tag: Tag,
        num_nodes: usize,
        distribution: Distribution,
        coefficient: f64,
    ) -> KernelResult<()> {
        self.record("transfinite_curve");
        self.inner.set_transfinite_curve(tag, num_nodes, distribution, coefficient)
    }

    fn set_transfinite_surface(&mut self, tag: Tag, arrangement: Arrangement, corners: &[Tag]) -> KernelResult<()> {
        self.record("transfinite_surface");
        self.inner.set_transfinite_surface(tag, arrangement, corners)
    }

    fn set_transfinite_volume(&mut self, tag: Tag, corners: &[Tag]) -> KernelResult<()> {
        self.record("transfinite_volume");
        self.inner.set_transfinite_volume(tag, corners)
    }

    fn set_recombine(&mut self, dim: Dim, tag: Tag) -> KernelResult<()> {
        self.record("recombine");
        self.inner.set_recombine(dim, tag)
    }

    fn set_compound(&mut self, dim: Dim, tags: &[Tag]) -> KernelResult<()> {
        self.record("compound");
        self.inner.set_compound(dim, tags)
    }

    fn embed(&mut self, dim: Dim, tags: &[Tag], host_dim: Dim, host: Tag) -> KernelResult<()> {
        self.record("embed");
        self.inner.embed(dim, tags, host_dim, host)
    }

    fn set_outward_orientation(&mut self, volume: Tag) -> KernelResult<()> {
        self.record("outward_orientation");
        self.inner.set_outward_orientation(volume)
    }

    fn set_order(&mut self, order: usize) -> KernelResult<()> {
        self.record("set_order");
        self.inner.set_order(order)
    }

    fn add_physical_group(&mut self, dim: Dim, tags: &[Tag]) -> KernelResult<Tag> {
        self.record("physical_group");
        self.inner.add_physical_group(dim, tags)
    }

    fn set_physical_name(&mut self, dim: Dim, tag: Tag, name: &str) -> KernelResult<()> {
        self.inner.set_physical_name(dim, tag, name)
    }

    fn get_physical_groups(&self) -> Vec<Entity> {
        self.inner.get_physical_groups()
    }

    fn get_physical_name(&self, dim: Dim, tag: Tag) -> KernelResult<String> {
        self.inner.get_physical_name(dim, tag)
    }

    fn get_entities_for_physical_group(&self, dim: Dim, tag: Tag) -> KernelResult<Vec<Tag>> {
        self.inner.get_entities_for_physical_group(dim, tag)
    }

    fn generate(&mut self, dim: Dim) -> KernelResult<()> {
        self.record("generate");
        self.inner.generate(dim)
    }

    fn get_nodes(&self) -> KernelResult<NodeSet> {
        let mut nodes = self.inner.get_nodes()?;
        // Reverse the order as well, so tags are not sorted.
        nodes.tags = nodes.tags.iter().rev().map(|t| t * self.node_stride).collect();
        nodes.coordinates.reverse();
        Ok(nodes)
    }

    fn get_elements(&self, dim: Dim, tag: Tag) -> KernelResult<Vec<ElementBlock>> {
        let mut blocks = self.inner.get_elements(dim, tag)?;
        for block in &mut blocks {
            for node in &mut block.node_tags {
                *node *= self.node_stride;
            }
        }
        Ok(blocks)
    }

    fn get_element_properties(&self, element_type: i32) -> KernelResult<ElementProperties> {
        self.inner.get_element_properties(element_type)
    }
}
