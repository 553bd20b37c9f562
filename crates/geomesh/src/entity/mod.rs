//! Entity handles
//!
//! Every kernel object is addressed by a dimension plus the integer tag the
//! kernel returned when it was created. The typed wrappers ([`Point`],
//! [`Curve`], [`Surface`], [`Volume`]) additionally keep the construction data
//! needed for local invariant checks, such as the end points of a curve.

mod aggregate;
mod basic;
mod shapes;

use std::fmt;
use std::ops::Neg;

use serde::{Deserialize, Serialize};

pub use aggregate::{CurveLoop, SurfaceLoop};
pub(crate) use aggregate::{check_closure, common_dim};
pub use basic::{Curve, CurveKind, Point, Surface, SurfaceKind, Volume};
pub use shapes::{BoxShape, Circle, Ellipsoid, Polygon, Primitive};

/// Integer identity assigned by the kernel
pub type Tag = i32;

/// Topological dimension of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dim {
    Point = 0,
    Curve = 1,
    Surface = 2,
    Volume = 3,
}

impl Dim {
    /// All dimensions, lowest first
    pub const ALL: [Dim; 4] = [Dim::Point, Dim::Curve, Dim::Surface, Dim::Volume];

    /// Numeric value of the dimension
    pub fn index(self) -> usize {
        self as usize
    }

    /// Convert a numeric dimension
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The next higher dimension, if any
    pub fn up(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dim::Point => "point",
            Dim::Curve => "curve",
            Dim::Surface => "surface",
            Dim::Volume => "volume",
        };
        f.write_str(name)
    }
}

/// A (dimension, tag) pair identifying one kernel entity
///
/// This is a plain value handle: the kernel owns the real object, so copying
/// an `Entity` never duplicates anything on the kernel side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity {
    /// Topological dimension
    pub dim: Dim,
    /// Kernel tag
    pub id: Tag,
}

impl Entity {
    /// Create a new entity handle
    pub fn new(dim: Dim, id: Tag) -> Self {
        Self { dim, id }
    }

    /// The raw `(dimension, tag)` pair
    pub fn dim_tag(&self) -> (usize, Tag) {
        (self.dim.index(), self.id)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.dim, self.id)
    }
}

/// Anything that resolves to exactly one kernel entity
pub trait HasEntity {
    /// The entity handle
    fn entity(&self) -> Entity;

    /// Kernel tag of the entity
    fn id(&self) -> Tag {
        self.entity().id
    }

    /// Dimension of the entity
    fn dim(&self) -> Dim {
        self.entity().dim
    }
}

/// Anything that resolves to a list of kernel entities
///
/// Composite shapes, slices and vectors of entities all implement this, so
/// they can be handed to physical groups, transforms and boolean operations.
pub trait HasDimTags {
    /// The entity handles, in construction order
    fn dim_tags(&self) -> Vec<Entity>;
}

/// Composites that expose a closed curve loop, usable as a hole
pub trait HasLoop {
    /// The curve loop bounding this shape
    fn curve_loop(&self) -> &CurveLoop;
}

impl HasEntity for Entity {
    fn entity(&self) -> Entity {
        *self
    }
}

impl HasDimTags for Entity {
    fn dim_tags(&self) -> Vec<Entity> {
        vec![*self]
    }
}

impl<T: HasDimTags + ?Sized> HasDimTags for &T {
    fn dim_tags(&self) -> Vec<Entity> {
        (**self).dim_tags()
    }
}

impl<T: HasDimTags> HasDimTags for [T] {
    fn dim_tags(&self) -> Vec<Entity> {
        self.iter().flat_map(HasDimTags::dim_tags).collect()
    }
}

impl<T: HasDimTags, const N: usize> HasDimTags for [T; N] {
    fn dim_tags(&self) -> Vec<Entity> {
        self.as_slice().dim_tags()
    }
}

impl<T: HasDimTags> HasDimTags for Vec<T> {
    fn dim_tags(&self) -> Vec<Entity> {
        self.as_slice().dim_tags()
    }
}

/// An entity reference together with its orientation
///
/// Reversing a reference never touches the kernel object or the original
/// value; it only flips the sign used when the reference is passed on.
#[derive(Debug, Clone, PartialEq)]
pub struct Oriented<T> {
    item: T,
    reversed: bool,
}

impl<T> Oriented<T> {
    /// Reference in the entity's own direction
    pub fn forward(item: T) -> Self {
        Self {
            item,
            reversed: false,
        }
    }

    /// Reference against the entity's own direction
    pub fn reversed(item: T) -> Self {
        Self {
            item,
            reversed: true,
        }
    }

    /// The referenced entity
    pub fn item(&self) -> &T {
        &self.item
    }

    /// Whether the reference runs against the entity's direction
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Unwrap the referenced entity
    pub fn into_inner(self) -> T {
        self.item
    }
}

impl<T: HasEntity> Oriented<T> {
    /// Tag with the orientation folded into its sign
    pub fn signed_id(&self) -> Tag {
        if self.reversed {
            -self.item.id()
        } else {
            self.item.id()
        }
    }

    /// Drop the typed payload, keeping the orientation
    pub fn to_entity(&self) -> Oriented<Entity> {
        Oriented {
            item: self.item.entity(),
            reversed: self.reversed,
        }
    }
}

impl<T> Neg for Oriented<T> {
    type Output = Oriented<T>;

    fn neg(self) -> Self::Output {
        Oriented {
            item: self.item,
            reversed: !self.reversed,
        }
    }
}

impl<T> From<T> for Oriented<T> {
    fn from(item: T) -> Self {
        Oriented::forward(item)
    }
}

impl<T: HasEntity> HasDimTags for Oriented<T> {
    fn dim_tags(&self) -> Vec<Entity> {
        vec![self.item.entity()]
    }
}

impl Oriented<Curve> {
    /// First point along the referenced direction
    pub fn start(&self) -> Option<&Point> {
        if self.reversed {
            self.item.end()
        } else {
            self.item.start()
        }
    }

    /// Last point along the referenced direction
    pub fn end(&self) -> Option<&Point> {
        if self.reversed {
            self.item.start()
        } else {
            self.item.end()
        }
    }
}

macro_rules! impl_orientation {
    ($($ty:ty),*) => {
        $(
            impl Neg for $ty {
                type Output = Oriented<$ty>;

                fn neg(self) -> Self::Output {
                    Oriented::reversed(self)
                }
            }

            impl Neg for &$ty {
                type Output = Oriented<$ty>;

                fn neg(self) -> Self::Output {
                    Oriented::reversed(self.clone())
                }
            }

            impl From<&$ty> for Oriented<$ty> {
                fn from(item: &$ty) -> Self {
                    Oriented::forward(item.clone())
                }
            }

            impl From<$ty> for Oriented<Entity> {
                fn from(item: $ty) -> Self {
                    Oriented::forward(item.entity())
                }
            }

            impl From<&$ty> for Oriented<Entity> {
                fn from(item: &$ty) -> Self {
                    Oriented::forward(item.entity())
                }
            }

            impl From<Oriented<$ty>> for Oriented<Entity> {
                fn from(item: Oriented<$ty>) -> Self {
                    item.to_entity()
                }
            }
        )*
    };
}

impl_orientation!(Curve, Surface);

impl Neg for Entity {
    type Output = Oriented<Entity>;

    fn neg(self) -> Self::Output {
        Oriented::reversed(self)
    }
}
