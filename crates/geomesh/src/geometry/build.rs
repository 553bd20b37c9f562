//! Entity factories shared by both kernel variants

use tracing::debug;

use super::{Geometry, GeometryError, GeometryResult, Variant, coordinates, expect_dim};
use crate::entity::{
    Curve, CurveKind, CurveLoop, Dim, Entity, HasEntity, HasLoop, Oriented, Point, Polygon,
    Surface, SurfaceKind, SurfaceLoop, Volume, check_closure,
};

/// Mesh size for the corner points of a polygon
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MeshSize {
    /// Leave point sizes to the kernel
    #[default]
    Unset,
    /// Same size on every point
    Uniform(f64),
    /// One size per point, in point order
    PerPoint(Vec<f64>),
}

impl MeshSize {
    /// Size of each of `count` points
    fn resolve(&self, count: usize) -> GeometryResult<Vec<Option<f64>>> {
        match self {
            MeshSize::Unset => Ok(vec![None; count]),
            MeshSize::Uniform(size) => Ok(vec![Some(*size); count]),
            MeshSize::PerPoint(sizes) if sizes.len() == count => {
                Ok(sizes.iter().copied().map(Some).collect())
            }
            MeshSize::PerPoint(sizes) => Err(GeometryError::InvalidArgument(format!(
                "{} mesh sizes given for {count} points",
                sizes.len()
            ))),
        }
    }
}

impl From<f64> for MeshSize {
    fn from(size: f64) -> Self {
        MeshSize::Uniform(size)
    }
}

impl From<Option<f64>> for MeshSize {
    fn from(size: Option<f64>) -> Self {
        size.map_or(MeshSize::Unset, MeshSize::Uniform)
    }
}

impl From<Vec<f64>> for MeshSize {
    fn from(sizes: Vec<f64>) -> Self {
        MeshSize::PerPoint(sizes)
    }
}

impl From<&[f64]> for MeshSize {
    fn from(sizes: &[f64]) -> Self {
        MeshSize::PerPoint(sizes.to_vec())
    }
}

impl<V: Variant> Geometry<V> {
    // ========== Elementary entities ==========

    /// Add a point from 2 or 3 coordinates
    pub fn add_point(&mut self, x: impl AsRef<[f64]>, mesh_size: Option<f64>) -> GeometryResult<Point> {
        let x = coordinates(x.as_ref())?;
        if let Some(size) = mesh_size
            && (size.is_nan() || size <= 0.0)
        {
            return Err(GeometryError::InvalidArgument(format!(
                "point mesh size must be positive, got {size}"
            )));
        }
        let id = self.kernel.add_point(V::MODELER, x, mesh_size.unwrap_or(0.0))?;
        Ok(Point::new(id, x, mesh_size))
    }

    pub fn add_line(&mut self, start: &Point, end: &Point) -> GeometryResult<Curve> {
        let id = self.kernel.add_line(V::MODELER, start.id(), end.id())?;
        Ok(Curve::new(id, CurveKind::Line, vec![*start, *end]))
    }

    /// Circle arc of less than half a turn from `start` to `end`
    pub fn add_circle_arc(&mut self, start: &Point, center: &Point, end: &Point) -> GeometryResult<Curve> {
        let id = self
            .kernel
            .add_circle_arc(V::MODELER, start.id(), center.id(), end.id())?;
        Ok(Curve::new(id, CurveKind::CircleArc, vec![*start, *center, *end]))
    }

    /// Ellipse arc; `major` is any point on the major axis
    pub fn add_ellipse_arc(
        &mut self,
        start: &Point,
        center: &Point,
        major: &Point,
        end: &Point,
    ) -> GeometryResult<Curve> {
        let id = self
            .kernel
            .add_ellipse_arc(V::MODELER, start.id(), center.id(), major.id(), end.id())?;
        Ok(Curve::new(
            id,
            CurveKind::EllipseArc,
            vec![*start, *center, *major, *end],
        ))
    }

    /// Interpolating spline through the points
    pub fn add_spline(&mut self, points: &[Point]) -> GeometryResult<Curve> {
        self.control_curve(CurveKind::Spline, points)
    }

    pub fn add_bspline(&mut self, control_points: &[Point]) -> GeometryResult<Curve> {
        self.control_curve(CurveKind::BSpline, control_points)
    }

    pub fn add_bezier(&mut self, control_points: &[Point]) -> GeometryResult<Curve> {
        self.control_curve(CurveKind::Bezier, control_points)
    }

    fn control_curve(&mut self, kind: CurveKind, points: &[Point]) -> GeometryResult<Curve> {
        if points.len() < 2 {
            return Err(GeometryError::InvalidArgument(format!(
                "{kind:?} needs at least 2 points, got {}",
                points.len()
            )));
        }
        let tags: Vec<_> = points.iter().map(Point::id).collect();
        let id = match kind {
            CurveKind::BSpline => self.kernel.add_bspline(V::MODELER, &tags)?,
            CurveKind::Bezier => self.kernel.add_bezier(V::MODELER, &tags)?,
            _ => self.kernel.add_spline(V::MODELER, &tags)?,
        };
        Ok(Curve::new(id, kind, points.to_vec()))
    }

    /// Type a curve the kernel created, such as an extrusion side
    ///
    /// Synchronizes, then reads the curve's end points from the kernel.
    pub fn curve(&mut self, entity: &impl HasEntity) -> GeometryResult<Curve> {
        let entity = entity.entity();
        expect_dim(entity, Dim::Curve)?;
        self.synchronize()?;

        let boundary = self.kernel.get_boundary(&[entity], false, true, false)?;
        if boundary.is_empty() {
            return Err(GeometryError::InvalidArgument(format!(
                "{entity} has no end points"
            )));
        }
        let mut points = Vec::with_capacity(boundary.len());
        for point in boundary {
            let id = point.item().id;
            points.push(Point::new(id, self.kernel.point_coordinates(id)?, None));
        }
        Ok(Curve::new(entity.id, CurveKind::Derived, points))
    }

    // ========== Aggregates ==========

    /// Closed chain of curves
    ///
    /// Fails with [`GeometryError::OpenCurveLoop`] before the kernel is called
    /// when consecutive curves do not share end points.
    pub fn add_curve_loop(
        &mut self,
        curves: impl IntoIterator<Item = Oriented<Curve>>,
    ) -> GeometryResult<CurveLoop> {
        let curves: Vec<_> = curves.into_iter().collect();
        check_closure(&curves, self.options.loop_tolerance)?;
        let signed: Vec<_> = curves.iter().map(Oriented::signed_id).collect();
        let id = self.kernel.add_curve_loop(V::MODELER, &signed)?;
        Ok(CurveLoop::new(id, curves))
    }

    /// Plane surface bounded by `curve_loop`, minus the holes
    pub fn add_plane_surface(
        &mut self,
        curve_loop: &CurveLoop,
        holes: &[&dyn HasLoop],
    ) -> GeometryResult<Surface> {
        let holes: Vec<CurveLoop> = holes.iter().map(|h| h.curve_loop().clone()).collect();
        let loops: Vec<_> = std::iter::once(curve_loop.id())
            .chain(holes.iter().map(CurveLoop::id))
            .collect();
        let id = self.kernel.add_plane_surface(V::MODELER, &loops)?;
        Ok(Surface::new(id, SurfaceKind::Plane, curve_loop.clone(), holes))
    }

    /// Filling surface over a loop of 3 or 4 curves
    pub fn add_surface(&mut self, curve_loop: &CurveLoop) -> GeometryResult<Surface> {
        let count = curve_loop.curves().len();
        if !(3..=4).contains(&count) {
            return Err(GeometryError::InvalidArgument(format!(
                "filling surface needs 3 or 4 curves, got {count}"
            )));
        }
        let id = self.kernel.add_surface_filling(V::MODELER, curve_loop.id())?;
        Ok(Surface::new(id, SurfaceKind::Filling, curve_loop.clone(), Vec::new()))
    }

    /// Shell of surfaces; closure is left to the kernel
    pub fn add_surface_loop(
        &mut self,
        surfaces: impl IntoIterator<Item = Oriented<Entity>>,
    ) -> GeometryResult<SurfaceLoop> {
        let surfaces: Vec<_> = surfaces.into_iter().collect();
        if surfaces.is_empty() {
            return Err(GeometryError::EmptyInput("surface loop needs at least one surface"));
        }
        for surface in &surfaces {
            expect_dim(*surface.item(), Dim::Surface)?;
        }
        let signed: Vec<_> = surfaces.iter().map(Oriented::signed_id).collect();
        let id = self.kernel.add_surface_loop(V::MODELER, &signed)?;
        Ok(SurfaceLoop::new(id, surfaces))
    }

    pub fn add_volume(&mut self, surface_loop: &SurfaceLoop, holes: &[&SurfaceLoop]) -> GeometryResult<Volume> {
        let shells: Vec<_> = std::iter::once(surface_loop.id())
            .chain(holes.iter().map(|h| h.id()))
            .collect();
        let id = self.kernel.add_volume(V::MODELER, &shells)?;
        Ok(Volume::new(
            id,
            surface_loop.clone(),
            holes.iter().map(|h| (*h).clone()).collect(),
        ))
    }

    /// Closed polygon through `points`, optionally filled
    ///
    /// # Arguments
    /// * `points` - Corners as 2- or 3-vectors, at least three
    /// * `mesh_size` - One size for all corners, or one per corner
    /// * `holes` - Loops cut out of the surface
    /// * `make_surface` - Whether to build the plane surface
    pub fn add_polygon<P: AsRef<[f64]>>(
        &mut self,
        points: &[P],
        mesh_size: impl Into<MeshSize>,
        holes: &[&dyn HasLoop],
        make_surface: bool,
    ) -> GeometryResult<Polygon> {
        if points.len() < 3 {
            return Err(GeometryError::InvalidArgument(format!(
                "polygon needs at least 3 points, got {}",
                points.len()
            )));
        }
        let sizes = mesh_size.into().resolve(points.len())?;

        let mut corners = Vec::with_capacity(points.len());
        for (x, size) in points.iter().zip(sizes) {
            corners.push(self.add_point(x, size)?);
        }
        let mut curves = Vec::with_capacity(corners.len());
        for k in 0..corners.len() {
            let next = (k + 1) % corners.len();
            curves.push(self.add_line(&corners[k], &corners[next])?);
        }
        let curve_loop = self.add_curve_loop(curves.iter().map(Oriented::<Curve>::from))?;
        let surface = if make_surface {
            Some(self.add_plane_surface(&curve_loop, holes)?)
        } else {
            None
        };
        debug!(corners = corners.len(), holes = holes.len(), "Polygon added");

        Ok(Polygon {
            points: corners,
            curves,
            curve_loop,
            surface,
        })
    }
}
