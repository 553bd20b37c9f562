use std::f64::consts::{PI, TAU};

use approx::assert_relative_eq;
use glam::DVec3;
use serial_test::serial;

use super::*;
use crate::entity::{Curve, CurveKind, Entity, HasEntity, Oriented};
use crate::kernel::testing::{CallLog, RecordingKernel, position};
use crate::kernel::{Layers, ReferenceKernel};
use crate::mesh::CellType;

const UNIT_SQUARE: [[f64; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

fn geo() -> Geometry<Geo> {
    Geometry::open(Box::new(ReferenceKernel::new()), SessionOptions::default()).unwrap()
}

fn recording<V: Variant>(kernel: RecordingKernel, log: CallLog) -> (Geometry<V>, CallLog) {
    let geom = Geometry::open(Box::new(kernel), SessionOptions::default()).unwrap();
    (geom, log)
}

fn surfaces() -> MeshOptions {
    MeshOptions::with_dim(Dim::Surface)
}

#[test]
#[serial]
fn test_rectangle_area() {
    let mut geom = geo();
    geom.add_polygon(&UNIT_SQUARE, 0.25, &[], true).unwrap();
    let mesh = geom.generate_mesh(&surfaces()).unwrap();

    assert_relative_eq!(mesh.measure(Dim::Surface), 1.0, max_relative = 0.01);
    assert!(mesh.num_cells(Dim::Surface) > 2);
    geom.close().unwrap();
}

#[test]
#[serial]
fn test_blocks_grouped_by_element_type() {
    let mut geom = geo();
    let square = geom.add_polygon(&UNIT_SQUARE, 0.25, &[], true).unwrap();
    geom.add_physical(&square, Some("plate")).unwrap();
    geom.add_physical(&square.curves[..2].to_vec(), Some("bottom_right")).unwrap();
    let mesh = geom.generate_mesh(&surfaces()).unwrap();

    let count = |cell_type: CellType| mesh.cells.iter().filter(|b| b.cell_type == cell_type).count();
    assert_eq!(count(CellType::Line), 1);
    assert_eq!(count(CellType::Triangle), 1);

    let lines = mesh.cells.iter().position(|b| b.cell_type == CellType::Line).unwrap();
    let triangles = mesh.cells.iter().position(|b| b.cell_type == CellType::Triangle).unwrap();
    let line_block = &mesh.cells[lines];
    assert_eq!(line_block.physical.len(), line_block.len());
    assert_eq!(line_block.geometrical.len(), line_block.len());

    // Two of the four sides, each cell pointing into the merged line block.
    let sides = &mesh.cell_sets["bottom_right"];
    assert_eq!(sides.len(), mesh.cells.len());
    assert!(sides[lines].len() < line_block.len());
    for &cell in &sides[lines] {
        let curve = line_block.geometrical[cell];
        assert!(curve == square.curves[0].id() || curve == square.curves[1].id());
    }
    assert!(sides[triangles].is_empty());

    let plate = &mesh.cell_sets["plate"];
    assert_eq!(plate[triangles].len(), mesh.cells[triangles].len());
    assert!(plate[lines].is_empty());
}

#[test]
#[serial]
fn test_circle_area() {
    let mut geom = geo();
    let options = CircleOptions {
        num_sections: 4,
        ..CircleOptions::default()
    };
    let circle = geom.add_circle([0.0, 0.0, 0.0], 1.0, Some(0.1), options).unwrap();
    assert_eq!(circle.arcs.len(), 4);
    assert_eq!(circle.boundary_points[1].coordinates(), DVec3::new(0.0, 1.0, 0.0));

    let mesh = geom.generate_mesh(&surfaces()).unwrap();
    assert_relative_eq!(mesh.measure(Dim::Surface), PI, max_relative = 0.02);
}

#[test]
#[serial]
fn test_rectangle_with_circular_hole() {
    let mut geom = geo();
    let hole = geom
        .add_circle(
            [1.0, 1.0],
            0.5,
            Some(0.1),
            CircleOptions {
                num_sections: 4,
                make_surface: false,
                ..CircleOptions::default()
            },
        )
        .unwrap();
    assert!(hole.surface.is_none());
    let plate = geom
        .add_rectangle(0.0, 2.0, 0.0, 2.0, 0.0, 0.2, &[&hole], true)
        .unwrap();
    assert_eq!(plate.surface.as_ref().unwrap().holes().len(), 1);

    let mesh = geom.generate_mesh(&surfaces()).unwrap();
    assert_relative_eq!(mesh.measure(Dim::Surface), 4.0 - PI * 0.25, max_relative = 0.02);
}

#[test]
#[serial]
fn test_point_extrusion_top() {
    let mut geom = geo();
    let p = geom.add_point([0.0, 0.0, 0.0], None).unwrap();
    let extrusion = geom
        .extrude(&p, [1.0, 0.0, 0.0], Layers::none(), false)
        .unwrap()
        .remove(0);

    assert_eq!(extrusion.top.dim, Dim::Point);
    assert_eq!(extrusion.body.dim, Dim::Curve);
    assert_eq!(geom.point_coordinates(&extrusion.top).unwrap(), DVec3::X);

    let side = geom.curve(&extrusion.body).unwrap();
    assert_eq!(side.kind(), CurveKind::Derived);
    assert_eq!(side.start().unwrap().coordinates(), DVec3::ZERO);
    assert_eq!(side.end().unwrap().coordinates(), DVec3::X);
}

#[test]
#[serial]
fn test_extrude_several_points() {
    let mut geom = geo();
    let p = geom.add_point([0.0, 0.0, 0.0], None).unwrap();
    let q = geom.add_point([0.0, 1.0, 0.0], None).unwrap();
    let extrusions = geom
        .extrude(&[&p, &q], [2.0, 0.0, 0.0], Layers::none(), false)
        .unwrap();

    assert_eq!(extrusions.len(), 2);
    assert_eq!(extrusions[0].source, p.entity());
    assert_eq!(extrusions[1].source, q.entity());
    assert_eq!(geom.point_coordinates(&extrusions[0].top).unwrap(), DVec3::new(2.0, 0.0, 0.0));
    assert_eq!(geom.point_coordinates(&extrusions[1].top).unwrap(), DVec3::new(2.0, 1.0, 0.0));
    assert!(extrusions.iter().all(|e| e.body.dim == Dim::Curve));
    assert_ne!(extrusions[0].body, extrusions[1].body);

    let mixed = geom.extrude(&[p.entity(), extrusions[0].body], [1.0, 0.0, 0.0], Layers::none(), false);
    assert!(matches!(mixed, Err(GeometryError::DimensionMismatch { .. })));
}

#[test]
#[serial]
fn test_layered_line_extrusion_is_quads() {
    let mut geom = geo();
    let a = geom.add_point([0.0, 0.0], Some(0.25)).unwrap();
    let b = geom.add_point([1.0, 0.0], Some(0.25)).unwrap();
    let line = geom.add_line(&a, &b).unwrap();
    let extrusion = geom
        .extrude(&line, [0.0, 1.0, 0.0], Layers::uniform(4), true)
        .unwrap()
        .remove(0);
    assert_eq!(extrusion.body.dim, Dim::Surface);

    let mesh = geom.generate_mesh(&surfaces()).unwrap();
    assert!(
        mesh.cells
            .iter()
            .filter(|b| b.dim == Dim::Surface)
            .all(|b| b.cell_type == CellType::Quad)
    );
    assert_relative_eq!(mesh.measure(Dim::Surface), 1.0, epsilon = 1e-9);
}

#[test]
#[serial]
fn test_duplicate_label() {
    let mut geom = geo();
    let square = geom.add_polygon(&UNIT_SQUARE, None, &[], true).unwrap();

    geom.add_physical(&square, Some("plate")).unwrap();
    geom.add_physical(&square.curves, Some("boundary")).unwrap();
    let err = geom.add_physical(&square, Some("plate")).unwrap_err();
    assert!(matches!(err, GeometryError::DuplicateLabel(_)));
    assert!(err.is_invariant_violation());
}

#[test]
#[serial]
fn test_physical_dimension_mismatch() {
    let mut geom = geo();
    let square = geom.add_polygon(&UNIT_SQUARE, None, &[], true).unwrap();
    let mixed = vec![
        square.curves[0].entity(),
        square.surface.as_ref().unwrap().entity(),
    ];
    assert!(matches!(
        geom.add_physical(&mixed, Some("mixed")),
        Err(GeometryError::DimensionMismatch { .. })
    ));
}

#[test]
#[serial]
fn test_open_curve_loop_rejected() {
    let mut geom = geo();
    let p: Vec<_> = UNIT_SQUARE
        .iter()
        .map(|x| geom.add_point(x, None).unwrap())
        .collect();
    let lines: Vec<_> = (0..3).map(|k| geom.add_line(&p[k], &p[k + 1]).unwrap()).collect();

    let err = geom
        .add_curve_loop(lines.iter().map(Oriented::<Curve>::from))
        .unwrap_err();
    assert!(matches!(err, GeometryError::OpenCurveLoop { index: 2, next: 0, .. }));
    assert!(err.is_invariant_violation());

    // Closing the chain with a reversed member is fine.
    let closing = geom.add_line(&p[0], &p[3]).unwrap();
    let mut members: Vec<Oriented<Curve>> = lines.iter().map(Oriented::from).collect();
    members.push(-&closing);
    assert!(geom.add_curve_loop(members).is_ok());
}

#[test]
#[serial]
fn test_second_session_rejected() {
    let first = geo();
    let second = Geometry::<Occ>::open(Box::new(ReferenceKernel::new()), SessionOptions::default());
    assert!(matches!(second, Err(GeometryError::SessionActive)));

    drop(first);
    let third = Geometry::<Occ>::open(Box::new(ReferenceKernel::new()), SessionOptions::default());
    assert!(third.is_ok());
}

#[test]
#[serial]
fn test_revolve_and_twist_limits() {
    let mut geom = geo();
    let p = geom.add_point([1.0, 0.0, 0.0], None).unwrap();

    let full_turn = geom.revolve(&p, [0.0, 0.0, 1.0], [0.0, 0.0, 0.0], TAU, Layers::none(), false);
    assert!(matches!(full_turn, Err(GeometryError::AngleOutOfRange { .. })));

    let half_turn = geom.twist(
        &p,
        [0.0, 0.0, 1.0],
        [0.0, 0.0, 1.0],
        [0.0, 0.0, 0.0],
        PI,
        Layers::none(),
        false,
    );
    assert!(matches!(half_turn, Err(GeometryError::AngleOutOfRange { .. })));

    let no_translation = geom.twist(
        &p,
        [0.0, 0.0, 0.0],
        [0.0, 0.0, 1.0],
        [0.0, 0.0, 0.0],
        1.0,
        Layers::none(),
        false,
    );
    assert!(matches!(no_translation, Err(GeometryError::InvalidArgument(_))));

    let arc = geom
        .revolve(&p, [0.0, 0.0, 1.0], [0.0, 0.0, 0.0], PI / 2.0, Layers::none(), false)
        .unwrap()
        .remove(0);
    let top = geom.point_coordinates(&arc.top).unwrap();
    assert_relative_eq!(top.x, 0.0, epsilon = 1e-12);
    assert_relative_eq!(top.y, 1.0, epsilon = 1e-12);
}

#[test]
#[serial]
fn test_flush_order() {
    let (kernel, log) = RecordingKernel::new();
    let (mut geom, log) = recording::<Geo>(kernel, log);

    let square = geom.add_polygon(&UNIT_SQUARE, 0.5, &[], true).unwrap();
    let surface = square.surface.clone().unwrap();
    let inner = geom.add_point([0.5, 0.5], Some(0.1)).unwrap();

    // Registered in the reverse of the flush order on purpose.
    geom.add_physical(&surface, Some("plate")).unwrap();
    geom.set_mesh_size(&square.curves[0], 0.2).unwrap();
    geom.set_transfinite_curve(&square.curves[1], 5, Distribution::Progression, 1.0)
        .unwrap();
    geom.set_recombined_surfaces(&surface).unwrap();
    geom.add_compound(&square.curves).unwrap();
    geom.in_surface(&inner, &surface).unwrap();
    let layer = geom
        .add_boundary_layer(BoundaryLayer::new(0.05, 0.5, 0.1, 0.4).with_curves(&square.curves[2]))
        .unwrap();
    geom.set_background_mesh(&[layer], FieldAggregate::Min).unwrap();

    // A cube off to the side carries the volume controls.
    let cube = geom
        .add_box([2.0, 0.0, 0.0], [3.0, 1.0, 1.0], Some(0.5), true, &[])
        .unwrap();
    let volume = cube.volume.clone().unwrap();
    geom.set_outward_normals(&volume).unwrap();
    geom.set_transfinite_volume(&volume, &[]).unwrap();
    geom.set_transfinite_surface(&cube.surfaces[0], Arrangement::Left, &[])
        .unwrap();

    let options = MeshOptions {
        order: Some(1),
        ..surfaces()
    };
    let mesh = geom.generate_mesh(&options).unwrap();
    assert_relative_eq!(mesh.measure(Dim::Surface), 7.0, max_relative = 0.01);
    assert!(mesh.cell_sets.contains_key("plate"));

    let steps = [
        "synchronize",
        "field_add",
        "background_mesh",
        "embed",
        "compound",
        "recombine",
        "transfinite_curve",
        "transfinite_surface",
        "transfinite_volume",
        "set_size",
        "physical_group",
        "outward_orientation",
        "set_order",
        "generate",
    ]
    .map(|call| position(&log, call).unwrap_or_else(|| panic!("{call} never called")));
    assert!(steps.windows(2).all(|w| w[0] < w[1]), "{:?}", log.borrow());
}

#[test]
#[serial]
fn test_stale_sizes_dropped_after_boolean() {
    let (kernel, log) = RecordingKernel::new();
    let kernel = kernel
        .script_boolean(vec![Entity::new(Dim::Surface, 3)])
        .script_boolean(vec![Entity::new(Dim::Surface, 4)]);
    let (mut geom, log) = recording::<Occ>(kernel, log);

    let a = geom.add_rectangle([0.0, 0.0], 1.0, 1.0, None, Some(0.1)).unwrap();
    let b = geom.add_rectangle([0.5, 0.0], 1.0, 1.0, None, None).unwrap();
    assert_eq!(geom.queue.len(), 1);

    // The sized object survives this one.
    let fused = geom.boolean_union(&[&a, &b], BooleanOptions::default().keep_first()).unwrap();
    assert_eq!(fused, vec![Entity::new(Dim::Surface, 3)]);
    assert_eq!(geom.queue.len(), 1);

    geom.boolean_difference(&a, &b, BooleanOptions::default().keep_other()).unwrap();
    assert_eq!(geom.queue.len(), 0);
    assert!(position(&log, "boolean union").unwrap() < position(&log, "boolean difference").unwrap());
}

#[test]
#[serial]
fn test_boolean_operands_share_dimension() {
    let mut geom = Geometry::<Occ>::open(Box::new(ReferenceKernel::new()), SessionOptions::default()).unwrap();
    let plate = geom.add_rectangle([0.0, 0.0], 1.0, 1.0, None, None).unwrap();
    let block = geom.add_box([0.0, 0.0, 0.0], [1.0, 1.0, 1.0], None).unwrap();

    let err = geom.boolean_intersection(&[&plate, &block], BooleanOptions::default()).unwrap_err();
    assert!(matches!(err, GeometryError::DimensionMismatch { .. }));

    // Booleans are the external engine's job.
    let err = geom.boolean_union(&[&plate, &plate], BooleanOptions::default()).unwrap_err();
    assert!(matches!(err, GeometryError::Kernel(KernelError::Unsupported(_))));
}

#[test]
#[serial]
fn test_removed_physical_member_fails_flush() {
    let mut geom = geo();
    let a = geom.add_point([0.0, 0.0], Some(0.5)).unwrap();
    let b = geom.add_point([1.0, 0.0], Some(0.5)).unwrap();
    let line = geom.add_line(&a, &b).unwrap();
    geom.add_physical(&line, Some("edge")).unwrap();
    geom.remove(&line, false).unwrap();

    let err = geom.generate_mesh(&MeshOptions::with_dim(Dim::Curve)).unwrap_err();
    match err {
        GeometryError::StaleEntity { ref label, entity } => {
            assert_eq!(label, "edge");
            assert_eq!(entity, line.entity());
        }
        ref other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_invariant_violation());
}

fn labeled_model() -> Vec<(Tag, Vec<Tag>)> {
    let mut geom = geo();
    let square = geom.add_polygon(&UNIT_SQUARE, 0.5, &[], true).unwrap();
    let edges = geom
        .add_physical(&square.curves[..2].to_vec(), Some("edges"))
        .unwrap();
    let plate = geom
        .add_physical(square.surface.as_ref().unwrap(), Some("plate"))
        .unwrap();
    assert_eq!(geom.physical_tag(plate), None);
    geom.generate_mesh(&surfaces()).unwrap();

    [(edges, Dim::Curve), (plate, Dim::Surface)]
        .into_iter()
        .map(|(handle, dim)| {
            let tag = geom.physical_tag(handle).unwrap();
            let members = geom.kernel().get_entities_for_physical_group(dim, tag).unwrap();
            (tag, members)
        })
        .collect()
}

#[test]
#[serial]
fn test_physical_mapping_is_deterministic() {
    let first = labeled_model();
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].1.len(), 2);
    assert_eq!(first, labeled_model());
}

#[test]
#[serial]
fn test_sparse_node_tags_remapped() {
    let (kernel, log) = RecordingKernel::new();
    let (mut geom, _log) = recording::<Geo>(kernel.sparse_nodes(7), log);
    let square = geom.add_polygon(&UNIT_SQUARE, 0.5, &[], true).unwrap();
    geom.add_physical(&square, Some("plate")).unwrap();

    let mesh = geom.generate_mesh(&surfaces()).unwrap();
    let n = mesh.points.len();
    assert!(mesh.cells.iter().all(|b| b.connectivity.iter().all(|&i| i < n)));
    assert_relative_eq!(mesh.measure(Dim::Surface), 1.0, max_relative = 0.01);

    let plate = &mesh.cell_sets["plate"];
    assert_eq!(plate.len(), mesh.cells.len());
    let covered: usize = plate.iter().map(Vec::len).sum();
    assert_eq!(covered, mesh.num_cells(Dim::Surface));
}

#[test]
#[serial]
fn test_close_resets_kernel() {
    let (kernel, log) = RecordingKernel::new();
    let (mut geom, log) = recording::<Geo>(kernel, log);
    geom.set_mesh_size_callback(|_, _, _, size| size.min(0.1), true)
        .unwrap();
    geom.close().unwrap();

    let removed = position(&log, "remove_size_callback").unwrap();
    let finalized = position(&log, "finalize").unwrap();
    assert!(position(&log, "set_size_callback").unwrap() < removed);
    assert!(removed < finalized);
    assert!(position(&log, "option Mesh.CharacteristicLengthFromPoints").is_some());
}

#[test]
#[serial]
fn test_box_surfaces() {
    let mut geom = geo();
    let shape = geom
        .add_box([0.0, 0.0, 0.0], [1.0, 2.0, 3.0], Some(0.5), true, &[])
        .unwrap();
    assert_eq!(shape.points.len(), 8);
    assert_eq!(shape.curves.len(), 12);
    assert_eq!(shape.surfaces.len(), 6);
    assert!(shape.volume.is_some());

    let mesh = geom.generate_mesh(&surfaces()).unwrap();
    assert_relative_eq!(mesh.measure(Dim::Surface), 22.0, max_relative = 0.01);
}

#[test]
#[serial]
fn test_ellipsoid_construction() {
    let mut geom = geo();
    let ball = geom
        .add_ellipsoid([0.0, 0.0, 0.0], [2.0, 1.0, 0.5], None, true, &[])
        .unwrap();
    assert_eq!(ball.points.len(), 7);
    assert_eq!(ball.arcs.len(), 12);
    assert_eq!(ball.surfaces.len(), 8);
    assert_eq!(ball.dim_tags(), vec![ball.volume.as_ref().unwrap().entity()]);

    geom.synchronize().unwrap();
    let boundary = geom
        .kernel()
        .get_boundary(&ball.dim_tags(), false, false, true)
        .unwrap();
    assert_eq!(boundary.len(), 7);
}

#[test]
#[serial]
fn test_transforms_keep_tags() {
    let mut geom = geo();
    let p = geom.add_point([1.0, 0.0, 0.0], None).unwrap();
    geom.translate(&p, [0.0, 1.0]).unwrap();
    geom.dilate(&p, [0.0, 0.0, 0.0], [2.0]).unwrap();
    geom.mirror(&p, [1.0, 0.0, 0.0, 0.0]).unwrap();
    assert_eq!(geom.point_coordinates(&p).unwrap(), DVec3::new(-2.0, 2.0, 0.0));

    let copies = geom.copy(&p).unwrap();
    assert_eq!(copies.len(), 1);
    assert_ne!(copies[0].id, p.id());

    geom.remove(&copies, false).unwrap();
    geom.synchronize().unwrap();
    assert_eq!(geom.kernel().get_entities(Some(Dim::Point)).len(), 1);

    assert!(matches!(
        geom.mirror(&p, [0.0, 0.0, 0.0, 1.0]),
        Err(GeometryError::InvalidArgument(_))
    ));
}

#[test]
#[serial]
fn test_transfinite_argument_checks() {
    let mut geom = geo();
    let square = geom.add_polygon(&UNIT_SQUARE, None, &[], true).unwrap();
    let surface = square.surface.as_ref().unwrap();

    assert!(
        geom.set_transfinite_curve(&square.curves[0], 1, Distribution::Progression, 1.0)
            .is_err()
    );
    assert!(
        geom.set_transfinite_surface(surface, Arrangement::Left, &square.points[..2])
            .is_err()
    );
    assert!(matches!(
        geom.set_transfinite_volume(surface, &[]),
        Err(GeometryError::DimensionMismatch { .. })
    ));
    assert!(
        geom.set_transfinite_surface(surface, Arrangement::Left, &square.points)
            .is_ok()
    );
    assert!(matches!(
        geom.set_background_mesh(&[], FieldAggregate::Max),
        Err(GeometryError::EmptyInput(_))
    ));
}
