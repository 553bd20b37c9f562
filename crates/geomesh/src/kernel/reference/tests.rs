use approx::assert_relative_eq;
use glam::DVec3;

use super::ReferenceKernel;
use super::mesher::{QUAD, TRIANGLE};
use crate::entity::{Dim, Entity, Tag};
use crate::kernel::{Kernel, KernelError, Layers, Modeler, OccPrimitive, Sweep};

const GEO: Modeler = Modeler::Geo;

fn kernel() -> ReferenceKernel {
    let mut kernel = ReferenceKernel::new();
    kernel.initialize().unwrap();
    kernel.add_model("test").unwrap();
    kernel
}

fn line(kernel: &mut ReferenceKernel, a: DVec3, b: DVec3) -> Tag {
    let p = kernel.add_point(GEO, a, 0.0).unwrap();
    let q = kernel.add_point(GEO, b, 0.0).unwrap();
    kernel.add_line(GEO, p, q).unwrap()
}

fn surface_area(kernel: &ReferenceKernel, tag: Tag) -> f64 {
    let nodes = kernel.get_nodes().unwrap();
    let x = |n: usize| DVec3::from_array(nodes.coordinates[n - 1]);
    let mut area = 0.0;
    for block in kernel.get_elements(Dim::Surface, tag).unwrap() {
        assert_eq!(block.element_type, TRIANGLE);
        for tri in block.node_tags.chunks(3) {
            area += 0.5 * (x(tri[1]) - x(tri[0])).cross(x(tri[2]) - x(tri[0])).length();
        }
    }
    area
}

#[test]
fn test_requires_initialize() {
    let mut kernel = ReferenceKernel::new();
    let result = kernel.add_point(GEO, DVec3::ZERO, 0.0);
    assert!(matches!(result, Err(KernelError::NotAvailable(_))));

    kernel.initialize().unwrap();
    kernel.finalize().unwrap();
    assert!(kernel.finalize().is_err());
}

#[test]
fn test_entities_hidden_until_synchronize() {
    let mut kernel = kernel();
    let p = kernel.add_point(GEO, DVec3::new(1.0, 2.0, 3.0), 0.0).unwrap();

    assert!(kernel.get_entities(None).is_empty());
    assert!(matches!(
        kernel.point_coordinates(p),
        Err(KernelError::UnknownEntity(_))
    ));

    kernel.synchronize(GEO).unwrap();
    assert_eq!(kernel.get_entities(Some(Dim::Point)), vec![Entity::new(Dim::Point, p)]);
    assert_eq!(kernel.point_coordinates(p).unwrap(), DVec3::new(1.0, 2.0, 3.0));
}

#[test]
fn test_point_extrusion() {
    let mut kernel = kernel();
    let p = kernel.add_point(GEO, DVec3::ZERO, 0.0).unwrap();
    let sweep = Sweep::Translate { vector: DVec3::X };
    let out = kernel
        .extrude(GEO, &[Entity::new(Dim::Point, p)], &sweep, &Layers::none(), false)
        .unwrap();

    assert_eq!(out.len(), 2);
    assert_eq!(out[0].dim, Dim::Point);
    assert_eq!(out[1].dim, Dim::Curve);

    kernel.synchronize(GEO).unwrap();
    assert_eq!(kernel.point_coordinates(out[0].id).unwrap(), DVec3::X);
}

#[test]
fn test_revolving_axis_point_fails() {
    let mut kernel = kernel();
    let p = kernel.add_point(GEO, DVec3::new(0.0, 0.0, 2.0), 0.0).unwrap();
    let sweep = Sweep::Rotate {
        point: DVec3::ZERO,
        axis: DVec3::Z,
        angle: 1.0,
    };
    let result = kernel.extrude(GEO, &[Entity::new(Dim::Point, p)], &sweep, &Layers::none(), false);
    assert!(matches!(result, Err(KernelError::InvalidInput(_))));
}

#[test]
fn test_twist_needs_native_modeler() {
    let mut kernel = kernel();
    let p = kernel.add_point(Modeler::Occ, DVec3::X, 0.0).unwrap();
    let sweep = Sweep::Twist {
        point: DVec3::ZERO,
        translation: DVec3::Z,
        axis: DVec3::Z,
        angle: 0.5,
    };
    let result = kernel.extrude(
        Modeler::Occ,
        &[Entity::new(Dim::Point, p)],
        &sweep,
        &Layers::none(),
        false,
    );
    assert!(matches!(result, Err(KernelError::Unsupported(_))));
}

#[test]
fn test_open_curve_loop_rejected() {
    let mut kernel = kernel();
    let a = kernel.add_point(GEO, DVec3::ZERO, 0.0).unwrap();
    let b = kernel.add_point(GEO, DVec3::X, 0.0).unwrap();
    let c = kernel.add_point(GEO, DVec3::Y, 0.0).unwrap();
    let ab = kernel.add_line(GEO, a, b).unwrap();
    let bc = kernel.add_line(GEO, b, c).unwrap();
    assert!(kernel.add_curve_loop(GEO, &[ab, bc]).is_err());

    let ca = kernel.add_line(GEO, c, a).unwrap();
    assert!(kernel.add_curve_loop(GEO, &[ab, bc, ca]).is_ok());
}

#[test]
fn test_rectangle_mesh_area() {
    let mut kernel = kernel();
    let tag = kernel
        .add_primitive(&OccPrimitive::Rectangle {
            corner: DVec3::ZERO,
            dx: 1.0,
            dy: 1.0,
            corner_radius: 0.0,
        })
        .unwrap();
    kernel.set_option_number("Mesh.CharacteristicLengthMax", 0.25).unwrap();
    kernel.synchronize(Modeler::Occ).unwrap();
    kernel.generate(Dim::Surface).unwrap();

    assert_relative_eq!(surface_area(&kernel, tag), 1.0, epsilon = 1e-9);
    let curve_blocks = kernel.get_elements(Dim::Curve, 1).unwrap();
    assert_eq!(curve_blocks[0].element_tags.len(), 4);
}

#[test]
fn test_layered_extrusion_recombined() {
    let mut kernel = kernel();
    let base = line(&mut kernel, DVec3::ZERO, DVec3::X);
    let sweep = Sweep::Translate { vector: DVec3::Y };
    let out = kernel
        .extrude(GEO, &[Entity::new(Dim::Curve, base)], &sweep, &Layers::uniform(4), true)
        .unwrap();
    let side = out[1];
    assert_eq!(side.dim, Dim::Surface);

    kernel.synchronize(GEO).unwrap();
    kernel
        .set_transfinite_curve(base, 5, Default::default(), 1.0)
        .unwrap();
    kernel.generate(Dim::Surface).unwrap();

    let blocks = kernel.get_elements(Dim::Surface, side.id).unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].element_type, QUAD);
    assert_eq!(blocks[0].element_tags.len(), 16);
}

#[test]
fn test_box_boundaries() {
    let mut kernel = kernel();
    let volume = kernel
        .add_primitive(&OccPrimitive::Box {
            corner: DVec3::ZERO,
            extents: DVec3::ONE,
        })
        .unwrap();
    kernel.synchronize(Modeler::Occ).unwrap();
    let volume = Entity::new(Dim::Volume, volume);

    let faces = kernel.get_boundary(&[volume], false, false, false).unwrap();
    assert_eq!(faces.len(), 6);
    let points = kernel.get_boundary(&[volume], false, false, true).unwrap();
    assert_eq!(points.len(), 8);

    // The bottom and front faces share one edge.
    let pair = [Entity::new(Dim::Surface, 1), Entity::new(Dim::Surface, 3)];
    let combined = kernel.get_boundary(&pair, true, false, false).unwrap();
    assert_eq!(combined.len(), 6);
}

#[test]
fn test_remove_keeps_used_points() {
    let mut kernel = kernel();
    let l = line(&mut kernel, DVec3::ZERO, DVec3::X);
    kernel.synchronize(GEO).unwrap();

    kernel.remove(GEO, &[Entity::new(Dim::Point, 1)], false).unwrap();
    assert!(kernel.point_coordinates(1).is_ok());

    kernel.remove(GEO, &[Entity::new(Dim::Curve, l)], true).unwrap();
    kernel.synchronize(GEO).unwrap();
    assert!(kernel.get_entities(None).is_empty());
}

#[test]
fn test_copy_then_translate() {
    let mut kernel = kernel();
    let l = line(&mut kernel, DVec3::ZERO, DVec3::X);
    let copies = kernel.copy(GEO, &[Entity::new(Dim::Curve, l)]).unwrap();
    kernel
        .transform(GEO, &copies, &crate::kernel::Transform::Translate { vector: DVec3::Z })
        .unwrap();
    kernel.synchronize(GEO).unwrap();

    let original = kernel.get_boundary(&[Entity::new(Dim::Curve, l)], false, false, false).unwrap();
    let moved = kernel.get_boundary(&copies, false, false, false).unwrap();
    let start = |b: &[crate::entity::Oriented<Entity>]| kernel.point_coordinates(b[0].item().id).unwrap();
    assert_eq!(start(&original), DVec3::ZERO);
    assert_eq!(start(&moved), DVec3::Z);
}

#[test]
fn test_physical_groups() {
    let mut kernel = kernel();
    let l = line(&mut kernel, DVec3::ZERO, DVec3::X);
    assert!(kernel.add_physical_group(Dim::Curve, &[l]).is_err());

    kernel.synchronize(GEO).unwrap();
    let group = kernel.add_physical_group(Dim::Curve, &[l]).unwrap();
    kernel.set_physical_name(Dim::Curve, group, "edge").unwrap();

    assert_eq!(kernel.get_physical_groups(), vec![Entity::new(Dim::Curve, group)]);
    assert_eq!(kernel.get_physical_name(Dim::Curve, group).unwrap(), "edge");
    assert_eq!(kernel.get_entities_for_physical_group(Dim::Curve, group).unwrap(), vec![l]);
}

#[test]
fn test_volume_meshing_unsupported() {
    let mut kernel = kernel();
    kernel
        .add_primitive(&OccPrimitive::Box {
            corner: DVec3::ZERO,
            extents: DVec3::ONE,
        })
        .unwrap();
    kernel.synchronize(Modeler::Occ).unwrap();
    assert!(matches!(
        kernel.generate(Dim::Volume),
        Err(KernelError::Unsupported(_))
    ));
}
