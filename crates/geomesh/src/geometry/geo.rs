//! Composite shapes of the native variant
//!
//! These are assembled from elementary entities, so every point, curve and
//! surface stays addressable through the returned shape.

use std::f64::consts::TAU;

use glam::{DMat3, DVec3};
use tracing::debug;

use super::{Geo, Geometry, GeometryError, GeometryResult, MeshSize, coordinates, positive};
use crate::entity::{
    BoxShape, Circle, Curve, Ellipsoid, Entity, HasEntity, HasLoop, Oriented, Point, Polygon,
    SurfaceLoop,
};

/// Corner pairs of the 12 box edges; corner `i` sits at (i&1, i>>1&1, i>>2&1)
#[rustfmt::skip]
const BOX_EDGES: [(usize, usize); 12] = [
    (0, 1), (2, 3), (4, 5), (6, 7),
    (0, 2), (1, 3), (4, 6), (5, 7),
    (0, 4), (1, 5), (2, 6), (3, 7),
];

/// Corner cycles of the 6 box faces
const BOX_FACES: [[usize; 4]; 6] = [
    [0, 2, 3, 1],
    [4, 5, 7, 6],
    [0, 1, 5, 4],
    [2, 6, 7, 3],
    [0, 4, 6, 2],
    [1, 3, 7, 5],
];

/// Quarter arcs of an ellipsoid as (start, end) point indices
///
/// Point 0 is the center, 1..=3 the +x, +y, +z poles, 4..=6 the -x, -y, -z
/// poles. The end point also fixes the major axis of each arc.
#[rustfmt::skip]
const ELLIPSOID_ARCS: [(usize, usize); 12] = [
    (1, 6), (6, 4), (4, 3), (3, 1),
    (1, 2), (2, 4), (4, 5), (5, 1),
    (6, 2), (2, 3), (3, 5), (5, 6),
];

/// Octant loops over [`ELLIPSOID_ARCS`]; a negative entry reverses arc `!k`
const ELLIPSOID_OCTANTS: [[isize; 3]; 8] = [
    [4, 9, 3],
    [8, !4, 0],
    [!9, 5, 2],
    [!5, !8, 1],
    [7, !3, 10],
    [11, !0, !7],
    [6, !10, !2],
    [!6, !1, !11],
];

/// Options for [`Geometry::add_circle`]
pub struct CircleOptions<'a> {
    /// Number of arcs, at least 3
    pub num_sections: usize,
    /// Rotation applied to the circle, which otherwise lies in the xy plane
    pub rotation: Option<DMat3>,
    /// Declare the arcs as one compound curve
    pub compound: bool,
    /// Fill the circle with a plane surface
    pub make_surface: bool,
    /// Loops cut out of the surface
    pub holes: Vec<&'a dyn HasLoop>,
}

impl Default for CircleOptions<'_> {
    fn default() -> Self {
        Self {
            num_sections: 3,
            rotation: None,
            compound: false,
            make_surface: true,
            holes: Vec::new(),
        }
    }
}

impl Geometry<Geo> {
    /// Circle as a loop of arcs around `center`
    pub fn add_circle(
        &mut self,
        center: impl AsRef<[f64]>,
        radius: f64,
        mesh_size: Option<f64>,
        options: CircleOptions<'_>,
    ) -> GeometryResult<Circle> {
        let x0 = coordinates(center.as_ref())?;
        positive(radius, "circle radius")?;
        let n = options.num_sections;
        if n < 3 {
            return Err(GeometryError::InvalidArgument(format!(
                "circle needs at least 3 sections, got {n}"
            )));
        }

        let offsets: Vec<DVec3> = if n == 4 {
            // Exact cardinal points, free of rounding in sin/cos.
            vec![
                DVec3::new(radius, 0.0, 0.0),
                DVec3::new(0.0, radius, 0.0),
                DVec3::new(-radius, 0.0, 0.0),
                DVec3::new(0.0, -radius, 0.0),
            ]
        } else {
            (0..n)
                .map(|k| {
                    let t = TAU * k as f64 / n as f64;
                    DVec3::new(radius * t.cos(), radius * t.sin(), 0.0)
                })
                .collect()
        };
        let rotation = options.rotation.unwrap_or(DMat3::IDENTITY);

        let center = self.add_point(x0.to_array(), mesh_size)?;
        let mut boundary_points = Vec::with_capacity(n);
        for offset in offsets {
            boundary_points.push(self.add_point((x0 + rotation * offset).to_array(), mesh_size)?);
        }
        let mut arcs = Vec::with_capacity(n);
        for k in 0..n {
            let (start, end) = (&boundary_points[k], &boundary_points[(k + 1) % n]);
            arcs.push(self.add_circle_arc(start, &center, end)?);
        }
        if options.compound {
            self.add_compound(&arcs)?;
        }
        let curve_loop = self.add_curve_loop(arcs.iter().map(Oriented::<Curve>::from))?;
        let surface = if options.make_surface {
            Some(self.add_plane_surface(&curve_loop, &options.holes)?)
        } else {
            None
        };
        debug!(radius, sections = n, "Circle added");

        Ok(Circle {
            center,
            radius,
            boundary_points,
            arcs,
            curve_loop,
            surface,
        })
    }

    /// Axis-aligned rectangle at height `z`
    #[allow(clippy::too_many_arguments)]
    pub fn add_rectangle(
        &mut self,
        xmin: f64,
        xmax: f64,
        ymin: f64,
        ymax: f64,
        z: f64,
        mesh_size: impl Into<MeshSize>,
        holes: &[&dyn HasLoop],
        make_surface: bool,
    ) -> GeometryResult<Polygon> {
        ordered(xmin, xmax, "x")?;
        ordered(ymin, ymax, "y")?;
        let corners = [
            [xmin, ymin, z],
            [xmax, ymin, z],
            [xmax, ymax, z],
            [xmin, ymax, z],
        ];
        self.add_polygon(&corners, mesh_size, holes, make_surface)
    }

    /// Axis-aligned box between two opposite corners
    ///
    /// # Arguments
    /// * `min` - Corner with the smallest coordinates
    /// * `max` - Corner with the largest coordinates
    /// * `mesh_size` - Size on all 8 corners
    /// * `with_volume` - Whether to build the volume over the surface loop
    /// * `holes` - Shells cut out of the volume
    pub fn add_box(
        &mut self,
        min: impl AsRef<[f64]>,
        max: impl AsRef<[f64]>,
        mesh_size: Option<f64>,
        with_volume: bool,
        holes: &[&SurfaceLoop],
    ) -> GeometryResult<BoxShape> {
        let min = coordinates(min.as_ref())?;
        let max = coordinates(max.as_ref())?;
        ordered(min.x, max.x, "x")?;
        ordered(min.y, max.y, "y")?;
        ordered(min.z, max.z, "z")?;

        let mut points = Vec::with_capacity(8);
        for i in 0..8 {
            let pick = |bit: usize, lo: f64, hi: f64| if (i >> bit) & 1 == 1 { hi } else { lo };
            let x = [pick(0, min.x, max.x), pick(1, min.y, max.y), pick(2, min.z, max.z)];
            points.push(self.add_point(x, mesh_size)?);
        }
        let mut curves = Vec::with_capacity(BOX_EDGES.len());
        for (a, b) in BOX_EDGES {
            curves.push(self.add_line(&points[a], &points[b])?);
        }

        let mut curve_loops = Vec::with_capacity(BOX_FACES.len());
        let mut surfaces = Vec::with_capacity(BOX_FACES.len());
        for face in BOX_FACES {
            let mut members = Vec::with_capacity(4);
            for k in 0..4 {
                members.push(box_edge(&curves, face[k], face[(k + 1) % 4])?);
            }
            let curve_loop = self.add_curve_loop(members)?;
            surfaces.push(self.add_plane_surface(&curve_loop, &[])?);
            curve_loops.push(curve_loop);
        }

        let surface_loop = self.add_surface_loop(surfaces.iter().map(Oriented::<Entity>::from))?;
        let volume = if with_volume {
            Some(self.add_volume(&surface_loop, holes)?)
        } else {
            None
        };

        Ok(BoxShape {
            points,
            curves,
            curve_loops,
            surfaces,
            surface_loop,
            volume,
        })
    }

    /// Ellipsoid with semi-axes `radii` along x, y and z
    ///
    /// Built from 7 points, 12 quarter-ellipse arcs and 8 octant surfaces.
    pub fn add_ellipsoid(
        &mut self,
        center: impl AsRef<[f64]>,
        radii: [f64; 3],
        mesh_size: Option<f64>,
        with_volume: bool,
        holes: &[&SurfaceLoop],
    ) -> GeometryResult<Ellipsoid> {
        let x0 = coordinates(center.as_ref())?;
        let radii = DVec3::from_array(radii);
        for r in radii.to_array() {
            positive(r, "ellipsoid radius")?;
        }

        let offsets = [
            DVec3::ZERO,
            DVec3::X * radii.x,
            DVec3::Y * radii.y,
            DVec3::Z * radii.z,
            DVec3::NEG_X * radii.x,
            DVec3::NEG_Y * radii.y,
            DVec3::NEG_Z * radii.z,
        ];
        let mut points: Vec<Point> = Vec::with_capacity(offsets.len());
        for offset in offsets {
            points.push(self.add_point((x0 + offset).to_array(), mesh_size)?);
        }

        let mut arcs = Vec::with_capacity(ELLIPSOID_ARCS.len());
        for (start, end) in ELLIPSOID_ARCS {
            arcs.push(self.add_ellipse_arc(&points[start], &points[0], &points[end], &points[end])?);
        }

        let mut curve_loops = Vec::with_capacity(ELLIPSOID_OCTANTS.len());
        let mut surfaces = Vec::with_capacity(ELLIPSOID_OCTANTS.len());
        for octant in ELLIPSOID_OCTANTS {
            let members = octant.iter().map(|&k| {
                if k < 0 {
                    -&arcs[!k as usize]
                } else {
                    Oriented::from(&arcs[k as usize])
                }
            });
            let curve_loop = self.add_curve_loop(members)?;
            surfaces.push(self.add_surface(&curve_loop)?);
            curve_loops.push(curve_loop);
        }

        let surface_loop = self.add_surface_loop(surfaces.iter().map(Oriented::<Entity>::from))?;
        let volume = if with_volume {
            Some(self.add_volume(&surface_loop, holes)?)
        } else {
            None
        };
        debug!(%radii, volume = ?volume.as_ref().map(HasEntity::id), "Ellipsoid added");

        Ok(Ellipsoid {
            center: x0,
            radii,
            points,
            arcs,
            curve_loops,
            surfaces,
            surface_loop,
            volume,
        })
    }

    /// Sphere as an ellipsoid with equal radii
    pub fn add_ball(
        &mut self,
        center: impl AsRef<[f64]>,
        radius: f64,
        mesh_size: Option<f64>,
        with_volume: bool,
        holes: &[&SurfaceLoop],
    ) -> GeometryResult<Ellipsoid> {
        self.add_ellipsoid(center, [radius; 3], mesh_size, with_volume, holes)
    }
}

/// Box edge from corner `a` to corner `b`, reversed when stored the other way
fn box_edge(curves: &[Curve], a: usize, b: usize) -> GeometryResult<Oriented<Curve>> {
    if let Some(k) = BOX_EDGES.iter().position(|e| *e == (a, b)) {
        return Ok(Oriented::from(&curves[k]));
    }
    BOX_EDGES
        .iter()
        .position(|e| *e == (b, a))
        .map(|k| -&curves[k])
        .ok_or_else(|| GeometryError::InvalidArgument(format!("corners {a} and {b} share no edge")))
}

fn ordered(min: f64, max: f64, axis: &str) -> GeometryResult<()> {
    if min < max {
        Ok(())
    } else {
        Err(GeometryError::InvalidArgument(format!(
            "{axis} range is empty: {min} .. {max}"
        )))
    }
}
