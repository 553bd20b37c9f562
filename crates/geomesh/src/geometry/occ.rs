//! Solid primitives of the constructive-solid variant

use std::f64::consts::{FRAC_PI_2, TAU};

use tracing::debug;

use super::{
    Geometry, GeometryError, GeometryResult, Occ, coordinates, nonzero_vector, positive,
};
use crate::entity::{Entity, Primitive};
use crate::kernel::OccPrimitive;

impl Geometry<Occ> {
    /// Rectangle in the xy plane at `corner`, with optional rounded corners
    pub fn add_rectangle(
        &mut self,
        corner: impl AsRef<[f64]>,
        dx: f64,
        dy: f64,
        corner_radius: Option<f64>,
        mesh_size: Option<f64>,
    ) -> GeometryResult<Primitive> {
        let corner = coordinates(corner.as_ref())?;
        nonzero(dx, "rectangle width")?;
        nonzero(dy, "rectangle height")?;
        let corner_radius = corner_radius.unwrap_or(0.0);
        if corner_radius < 0.0 {
            return Err(GeometryError::InvalidArgument(format!(
                "corner radius must not be negative, got {corner_radius}"
            )));
        }
        self.primitive(
            OccPrimitive::Rectangle {
                corner,
                dx,
                dy,
                corner_radius,
            },
            mesh_size,
        )
    }

    /// Disk or ellipse in the xy plane; `ry` defaults to `rx`
    pub fn add_disk(
        &mut self,
        center: impl AsRef<[f64]>,
        rx: f64,
        ry: Option<f64>,
        mesh_size: Option<f64>,
    ) -> GeometryResult<Primitive> {
        let center = coordinates(center.as_ref())?;
        let ry = ry.unwrap_or(rx);
        positive(rx, "disk radius")?;
        positive(ry, "disk radius")?;
        self.primitive(OccPrimitive::Disk { center, rx, ry }, mesh_size)
    }

    /// Box spanning `extents` from `corner`
    pub fn add_box(
        &mut self,
        corner: impl AsRef<[f64]>,
        extents: impl AsRef<[f64]>,
        mesh_size: Option<f64>,
    ) -> GeometryResult<Primitive> {
        let corner = coordinates(corner.as_ref())?;
        let extents = coordinates(extents.as_ref())?;
        for (e, axis) in extents.to_array().into_iter().zip(["x", "y", "z"]) {
            nonzero(e, axis)?;
        }
        self.primitive(OccPrimitive::Box { corner, extents }, mesh_size)
    }

    /// Full sphere
    pub fn add_ball(
        &mut self,
        center: impl AsRef<[f64]>,
        radius: f64,
        mesh_size: Option<f64>,
    ) -> GeometryResult<Primitive> {
        self.add_sphere_sector(center, radius, [-FRAC_PI_2, FRAC_PI_2, TAU], mesh_size)
    }

    /// Sphere cut to latitudes `angles[0]..angles[1]` and longitude `angles[2]`
    pub fn add_sphere_sector(
        &mut self,
        center: impl AsRef<[f64]>,
        radius: f64,
        angles: [f64; 3],
        mesh_size: Option<f64>,
    ) -> GeometryResult<Primitive> {
        let center = coordinates(center.as_ref())?;
        positive(radius, "sphere radius")?;
        let [angle1, angle2, angle3] = angles;
        if !(-FRAC_PI_2..=FRAC_PI_2).contains(&angle1) || angle2 <= angle1 || angle2 > FRAC_PI_2 {
            return Err(GeometryError::InvalidArgument(format!(
                "sphere latitudes must satisfy -pi/2 <= {angle1} < {angle2} <= pi/2"
            )));
        }
        check_sweep(angle3)?;
        self.primitive(
            OccPrimitive::Sphere {
                center,
                radius,
                angle1,
                angle2,
                angle3,
            },
            mesh_size,
        )
    }

    /// Cylinder of `radius` from `base` along `axis`; `angle` opens a sector
    pub fn add_cylinder(
        &mut self,
        base: impl AsRef<[f64]>,
        axis: impl AsRef<[f64]>,
        radius: f64,
        angle: Option<f64>,
        mesh_size: Option<f64>,
    ) -> GeometryResult<Primitive> {
        let base = coordinates(base.as_ref())?;
        let axis = coordinates(axis.as_ref())?;
        nonzero_vector(axis, "cylinder axis")?;
        positive(radius, "cylinder radius")?;
        let angle = angle.unwrap_or(TAU);
        check_sweep(angle)?;
        self.primitive(
            OccPrimitive::Cylinder {
                base,
                axis,
                radius,
                angle,
            },
            mesh_size,
        )
    }

    /// Cone frustum with radius `r0` at `base` and `r1` at `base + axis`
    #[allow(clippy::too_many_arguments)]
    pub fn add_cone(
        &mut self,
        base: impl AsRef<[f64]>,
        axis: impl AsRef<[f64]>,
        r0: f64,
        r1: f64,
        angle: Option<f64>,
        mesh_size: Option<f64>,
    ) -> GeometryResult<Primitive> {
        let base = coordinates(base.as_ref())?;
        let axis = coordinates(axis.as_ref())?;
        nonzero_vector(axis, "cone axis")?;
        if r0 < 0.0 || r1 < 0.0 || r0 + r1 <= 0.0 {
            return Err(GeometryError::InvalidArgument(format!(
                "cone radii must be non-negative and not both zero, got {r0} and {r1}"
            )));
        }
        let angle = angle.unwrap_or(TAU);
        check_sweep(angle)?;
        self.primitive(
            OccPrimitive::Cone {
                base,
                axis,
                r0,
                r1,
                angle,
            },
            mesh_size,
        )
    }

    /// Torus around the z axis through `center`
    ///
    /// `r0` is the distance from the center to the tube axis, `r1` the tube
    /// radius.
    pub fn add_torus(
        &mut self,
        center: impl AsRef<[f64]>,
        r0: f64,
        r1: f64,
        angle: Option<f64>,
        mesh_size: Option<f64>,
    ) -> GeometryResult<Primitive> {
        let center = coordinates(center.as_ref())?;
        positive(r0, "torus radius")?;
        positive(r1, "torus tube radius")?;
        let angle = angle.unwrap_or(TAU);
        check_sweep(angle)?;
        self.primitive(
            OccPrimitive::Torus {
                center,
                r0,
                r1,
                angle,
            },
            mesh_size,
        )
    }

    /// Right-angle wedge; `top_x` is the top face's extent along x
    pub fn add_wedge(
        &mut self,
        corner: impl AsRef<[f64]>,
        extents: impl AsRef<[f64]>,
        top_x: Option<f64>,
        mesh_size: Option<f64>,
    ) -> GeometryResult<Primitive> {
        let corner = coordinates(corner.as_ref())?;
        let extents = coordinates(extents.as_ref())?;
        for (e, axis) in extents.to_array().into_iter().zip(["x", "y", "z"]) {
            nonzero(e, axis)?;
        }
        let top_x = top_x.unwrap_or(0.0);
        self.primitive(
            OccPrimitive::Wedge {
                corner,
                extents,
                top_x,
            },
            mesh_size,
        )
    }

    /// Ellipsoid as a unit ball dilated by `radii`
    pub fn add_ellipsoid(
        &mut self,
        center: impl AsRef<[f64]>,
        radii: [f64; 3],
        mesh_size: Option<f64>,
    ) -> GeometryResult<Primitive> {
        let center = coordinates(center.as_ref())?;
        for r in radii {
            positive(r, "ellipsoid radius")?;
        }
        let ball = self.add_ball(center.to_array(), 1.0, mesh_size)?;
        self.dilate(&ball, center.to_array(), radii)?;
        Ok(ball)
    }

    fn primitive(&mut self, shape: OccPrimitive, mesh_size: Option<f64>) -> GeometryResult<Primitive> {
        let tag = self.kernel.add_primitive(&shape)?;
        let entity = Entity::new(shape.dim(), tag);
        if let Some(size) = mesh_size {
            self.set_mesh_size(&entity, size)?;
        }
        debug!(%entity, ?shape, "Primitive added");
        Ok(Primitive::new(entity, shape))
    }
}

fn nonzero(value: f64, what: &str) -> GeometryResult<()> {
    if value != 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(GeometryError::InvalidArgument(format!("{what} must be nonzero, got {value}")))
    }
}

/// Sector angles run in (0, 2π]
fn check_sweep(angle: f64) -> GeometryResult<()> {
    if angle > 0.0 && angle <= TAU {
        Ok(())
    } else {
        Err(GeometryError::AngleOutOfRange { angle, limit: TAU })
    }
}
