//! Geometry kernel abstraction
//!
//! The orchestrator drives an external geometry-and-meshing kernel through the
//! [`Kernel`] trait. A pure-Rust [`ReferenceKernel`] is available behind the
//! `reference` feature.

#[cfg(feature = "reference")]
mod reference;
#[cfg(all(test, feature = "reference"))]
pub(crate) mod testing;
mod traits;

#[cfg(feature = "reference")]
pub use reference::ReferenceKernel;
pub use traits::*;
