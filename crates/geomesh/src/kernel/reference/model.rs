//! Model storage for the reference kernel
//!
//! Curves are defined by point tags rather than coordinates, so moving a
//! point moves every curve built on it.

use std::collections::{BTreeMap, BTreeSet};

use glam::DVec3;

use crate::entity::{Dim, Entity, Tag};
use crate::kernel::{Arrangement, Distribution, KernelError, KernelResult, Layers, Sweep};

#[derive(Debug, Clone, Copy)]
pub(super) struct PointData {
    pub x: DVec3,
    /// Zero when unset
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum CurveShape {
    Line { start: Tag, end: Tag },
    CircleArc { start: Tag, center: Tag, end: Tag },
    EllipseArc { start: Tag, center: Tag, major: Tag, end: Tag },
    Spline(Vec<Tag>),
    BSpline(Vec<Tag>),
    Bezier(Vec<Tag>),
    /// Path of point `from` under a sweep, ending at point `to`
    Swept { from: Tag, to: Tag, sweep: Sweep },
}

impl CurveShape {
    /// Start and end point tags
    pub fn endpoints(&self) -> (Tag, Tag) {
        match self {
            CurveShape::Line { start, end }
            | CurveShape::CircleArc { start, end, .. }
            | CurveShape::EllipseArc { start, end, .. } => (*start, *end),
            CurveShape::Spline(points) | CurveShape::BSpline(points) | CurveShape::Bezier(points) => {
                // Constructors reject empty point lists.
                let first = points.first().copied().unwrap_or_default();
                let last = points.last().copied().unwrap_or_default();
                (first, last)
            }
            CurveShape::Swept { from, to, .. } => (*from, *to),
        }
    }

    /// Every point the shape depends on, end points included
    pub fn defining_points(&self) -> Vec<Tag> {
        match self {
            CurveShape::Line { start, end } => vec![*start, *end],
            CurveShape::CircleArc { start, center, end } => vec![*start, *center, *end],
            CurveShape::EllipseArc {
                start,
                center,
                major,
                end,
            } => vec![*start, *center, *major, *end],
            CurveShape::Spline(points) | CurveShape::BSpline(points) | CurveShape::Bezier(points) => {
                points.clone()
            }
            CurveShape::Swept { from, to, .. } => vec![*from, *to],
        }
    }

    /// Same shape over renamed points
    pub fn map_points(&self, mut f: impl FnMut(Tag) -> Tag) -> CurveShape {
        match self {
            CurveShape::Line { start, end } => CurveShape::Line {
                start: f(*start),
                end: f(*end),
            },
            CurveShape::CircleArc { start, center, end } => CurveShape::CircleArc {
                start: f(*start),
                center: f(*center),
                end: f(*end),
            },
            CurveShape::EllipseArc {
                start,
                center,
                major,
                end,
            } => CurveShape::EllipseArc {
                start: f(*start),
                center: f(*center),
                major: f(*major),
                end: f(*end),
            },
            CurveShape::Spline(points) => CurveShape::Spline(points.iter().map(|p| f(*p)).collect()),
            CurveShape::BSpline(points) => CurveShape::BSpline(points.iter().map(|p| f(*p)).collect()),
            CurveShape::Bezier(points) => CurveShape::Bezier(points.iter().map(|p| f(*p)).collect()),
            CurveShape::Swept { from, to, sweep } => CurveShape::Swept {
                from: f(*from),
                to: f(*to),
                sweep: *sweep,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub(super) struct CurveData {
    pub shape: CurveShape,
    /// Meshed as the image of another curve under a sweep
    pub image_of: Option<(Tag, Sweep)>,
    /// Side curves of one extrusion share their discretization
    pub group: Option<usize>,
    pub layers: Layers,
    pub transfinite: Option<(usize, Distribution, f64)>,
}

impl CurveData {
    pub fn new(shape: CurveShape) -> Self {
        Self {
            shape,
            image_of: None,
            group: None,
            layers: Layers::none(),
            transfinite: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum SurfaceShape {
    /// Bounded by curve loops, the first one outer
    Planar { loops: Vec<Tag>, filling: bool },
    /// Swept by a curve; both sides are the same curve for a closed base
    Swept {
        base: Tag,
        top: Tag,
        start_side: Tag,
        end_side: Tag,
        sweep: Sweep,
    },
}

#[derive(Debug, Clone)]
pub(super) struct SurfaceData {
    pub shape: SurfaceShape,
    pub embedded: Vec<Tag>,
    pub recombine: bool,
    pub transfinite: Option<(Arrangement, Vec<Tag>)>,
}

impl SurfaceData {
    pub fn new(shape: SurfaceShape) -> Self {
        Self {
            shape,
            embedded: Vec::new(),
            recombine: false,
            transfinite: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum VolumeShape {
    /// Bounded by surface loops, the first one outer
    Shells(Vec<Tag>),
    Swept {
        base: Tag,
        top: Tag,
        laterals: Vec<Tag>,
        sweep: Sweep,
    },
}

#[derive(Debug, Clone)]
pub(super) struct VolumeData {
    pub shape: VolumeShape,
    pub transfinite: Option<Vec<Tag>>,
}

#[derive(Debug, Clone, Default)]
pub(super) struct PhysicalGroup {
    pub entities: Vec<Tag>,
    pub name: String,
}

/// Monotonic tag counters, starting at 1
#[derive(Debug, Clone, Default)]
pub(super) struct Counters {
    entities: [Tag; 4],
    curve_loops: Tag,
    surface_loops: Tag,
    physical: [Tag; 4],
    fields: Tag,
}

impl Counters {
    fn bump(counter: &mut Tag) -> Tag {
        *counter += 1;
        *counter
    }

    pub fn entity(&mut self, dim: Dim) -> Tag {
        Self::bump(&mut self.entities[dim.index()])
    }

    pub fn curve_loop(&mut self) -> Tag {
        Self::bump(&mut self.curve_loops)
    }

    pub fn surface_loop(&mut self) -> Tag {
        Self::bump(&mut self.surface_loops)
    }

    pub fn physical(&mut self, dim: Dim) -> Tag {
        Self::bump(&mut self.physical[dim.index()])
    }

    pub fn field(&mut self) -> Tag {
        Self::bump(&mut self.fields)
    }
}

/// Everything the reference kernel knows about one model
#[derive(Debug, Clone, Default)]
pub(super) struct Model {
    pub points: BTreeMap<Tag, PointData>,
    pub curves: BTreeMap<Tag, CurveData>,
    pub curve_loops: BTreeMap<Tag, Vec<Tag>>,
    pub surfaces: BTreeMap<Tag, SurfaceData>,
    pub surface_loops: BTreeMap<Tag, Vec<Tag>>,
    pub volumes: BTreeMap<Tag, VolumeData>,
    pub physical: BTreeMap<(Dim, Tag), PhysicalGroup>,
    pub compounds: Vec<(Dim, Vec<Tag>)>,
    /// Entities committed by the last synchronize
    pub visible: BTreeSet<Entity>,
    pub counters: Counters,
}

impl Model {
    pub fn contains(&self, entity: Entity) -> bool {
        match entity.dim {
            Dim::Point => self.points.contains_key(&entity.id),
            Dim::Curve => self.curves.contains_key(&entity.id),
            Dim::Surface => self.surfaces.contains_key(&entity.id),
            Dim::Volume => self.volumes.contains_key(&entity.id),
        }
    }

    /// Every stored entity, lowest dimension first
    pub fn all_entities(&self) -> Vec<Entity> {
        let points = self.points.keys().map(|t| Entity::new(Dim::Point, *t));
        let curves = self.curves.keys().map(|t| Entity::new(Dim::Curve, *t));
        let surfaces = self.surfaces.keys().map(|t| Entity::new(Dim::Surface, *t));
        let volumes = self.volumes.keys().map(|t| Entity::new(Dim::Volume, *t));
        points.chain(curves).chain(surfaces).chain(volumes).collect()
    }

    /// Check that an entity has been committed by a synchronize
    pub fn require_visible(&self, entity: Entity) -> KernelResult<()> {
        if self.visible.contains(&entity) {
            Ok(())
        } else {
            Err(KernelError::UnknownEntity(entity))
        }
    }

    pub fn point(&self, tag: Tag) -> KernelResult<&PointData> {
        self.points
            .get(&tag)
            .ok_or(KernelError::UnknownEntity(Entity::new(Dim::Point, tag)))
    }

    pub fn curve(&self, tag: Tag) -> KernelResult<&CurveData> {
        self.curves
            .get(&tag)
            .ok_or(KernelError::UnknownEntity(Entity::new(Dim::Curve, tag)))
    }

    pub fn surface(&self, tag: Tag) -> KernelResult<&SurfaceData> {
        self.surfaces
            .get(&tag)
            .ok_or(KernelError::UnknownEntity(Entity::new(Dim::Surface, tag)))
    }

    pub fn volume(&self, tag: Tag) -> KernelResult<&VolumeData> {
        self.volumes
            .get(&tag)
            .ok_or(KernelError::UnknownEntity(Entity::new(Dim::Volume, tag)))
    }

    pub fn curve_loop(&self, tag: Tag) -> KernelResult<&[Tag]> {
        self.curve_loops
            .get(&tag)
            .map(Vec::as_slice)
            .ok_or_else(|| KernelError::InvalidInput(format!("unknown curve loop {tag}")))
    }

    pub fn surface_loop(&self, tag: Tag) -> KernelResult<&[Tag]> {
        self.surface_loops
            .get(&tag)
            .map(Vec::as_slice)
            .ok_or_else(|| KernelError::InvalidInput(format!("unknown surface loop {tag}")))
    }

    pub fn position(&self, tag: Tag) -> KernelResult<DVec3> {
        Ok(self.point(tag)?.x)
    }

    /// Signed boundary of one entity, one level down
    pub fn boundary(&self, entity: Entity) -> KernelResult<Vec<(Entity, bool)>> {
        let signed = |dim: Dim, tag: Tag| (Entity::new(dim, tag.abs()), tag < 0);
        match entity.dim {
            Dim::Point => {
                self.point(entity.id)?;
                Ok(Vec::new())
            }
            Dim::Curve => {
                let (start, end) = self.curve(entity.id)?.shape.endpoints();
                Ok(vec![
                    (Entity::new(Dim::Point, start), false),
                    (Entity::new(Dim::Point, end), false),
                ])
            }
            Dim::Surface => match &self.surface(entity.id)?.shape {
                SurfaceShape::Planar { loops, .. } => {
                    let mut out = Vec::new();
                    for l in loops {
                        out.extend(self.curve_loop(*l)?.iter().map(|c| signed(Dim::Curve, *c)));
                    }
                    Ok(out)
                }
                SurfaceShape::Swept {
                    base,
                    top,
                    start_side,
                    end_side,
                    ..
                } => {
                    let mut out = vec![(Entity::new(Dim::Curve, *base), false)];
                    if start_side != end_side {
                        out.push((Entity::new(Dim::Curve, *end_side), false));
                    }
                    out.push((Entity::new(Dim::Curve, *top), true));
                    out.push((Entity::new(Dim::Curve, *start_side), true));
                    Ok(out)
                }
            },
            Dim::Volume => match &self.volume(entity.id)?.shape {
                VolumeShape::Shells(shells) => {
                    let mut out = Vec::new();
                    for s in shells {
                        out.extend(
                            self.surface_loop(*s)?
                                .iter()
                                .map(|t| signed(Dim::Surface, *t)),
                        );
                    }
                    Ok(out)
                }
                VolumeShape::Swept {
                    base, top, laterals, ..
                } => {
                    let mut out = vec![
                        (Entity::new(Dim::Surface, *base), true),
                        (Entity::new(Dim::Surface, *top), false),
                    ];
                    out.extend(laterals.iter().map(|t| (Entity::new(Dim::Surface, *t), false)));
                    Ok(out)
                }
            },
        }
    }

    /// All points an entity depends on, construction points included
    pub fn collect_points(&self, entity: Entity, out: &mut BTreeSet<Tag>) -> KernelResult<()> {
        match entity.dim {
            Dim::Point => {
                self.point(entity.id)?;
                out.insert(entity.id);
            }
            Dim::Curve => out.extend(self.curve(entity.id)?.shape.defining_points()),
            _ => {
                for (child, _) in self.boundary(entity)? {
                    self.collect_points(child, out)?;
                }
                if entity.dim == Dim::Surface {
                    out.extend(self.surface(entity.id)?.embedded.iter().copied());
                }
            }
        }
        Ok(())
    }

    /// Entities reachable through boundaries, the entity itself included
    pub fn closure(&self, entity: Entity, out: &mut BTreeSet<Entity>) -> KernelResult<()> {
        if !out.insert(entity) {
            return Ok(());
        }
        if entity.dim == Dim::Curve {
            for tag in self.curve(entity.id)?.shape.defining_points() {
                out.insert(Entity::new(Dim::Point, tag));
            }
        }
        for (child, _) in self.boundary(entity)? {
            self.closure(child, out)?;
        }
        Ok(())
    }

    /// Whether any remaining higher-dimensional entity depends on `entity`
    pub fn is_referenced(&self, entity: Entity) -> bool {
        let uses = |candidate: Entity| -> bool {
            if candidate == entity {
                return false;
            }
            let mut closure = BTreeSet::new();
            self.closure(candidate, &mut closure).is_ok() && closure.contains(&entity)
        };
        self.all_entities()
            .into_iter()
            .filter(|e| e.dim > entity.dim)
            .any(uses)
    }

    /// Bounding box diagonal of all points
    pub fn characteristic_length(&self) -> f64 {
        let mut iter = self.points.values().map(|p| p.x);
        let Some(first) = iter.next() else {
            return 1.0;
        };
        let (min, max) = iter.fold((first, first), |(lo, hi), x| (lo.min(x), hi.max(x)));
        let diagonal = (max - min).length();
        if diagonal > 0.0 { diagonal } else { 1.0 }
    }
}
