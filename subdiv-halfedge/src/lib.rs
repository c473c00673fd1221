//#![warn(missing_docs)]
//! # Half-Edge Subdivision Mesh Topology
//!
//! Incrementally maintained half-edge connectivity for polygonal
//! [subdivision surface](https://en.wikipedia.org/wiki/Subdivision_surface)
//! meshes, plus the bookkeeping a renderer needs to evaluate surface patches
//! from it without redundant recomputation.
//!
//! The code is optimized for meshes whose topology stays static while crease
//! weights, tessellation levels or vertex positions change from frame to
//! frame.
//!
//! A [`Mesh`] owns the raw data buffers. Every commit decides, per topology,
//! whether the half-edge array has to be rebuilt from scratch (connectivity
//! changed), can be refreshed in place (only creases or levels changed) or
//! can be left alone. Rebuild and refresh always produce identical arrays
//! for identical inputs.
//!
//! ## Modules
//!
//! * [`far`] – Topology: crease maps, hole sets, half-edges and their
//!   classification into patch types.
//! * [`osd`] – Runtime data: dirty-tracked buffers and the interpolation cache
//!   slot index consumed by an external [`PatchEvaluator`](osd::PatchEvaluator).
//!
//! ## Features
//!
#![doc = document_features::document_features!()]
//!
//! ## Parallelism
//!
//! All construction passes fan out over fixed-size blocks of faces or
//! half-edges (see [`MeshOptions::block_size`]). Every task writes only to the
//! range it owns. Results never depend on the block size or on whether the
//! `rayon` feature is enabled.
//!
//! ## API Conventions
//!
//! * Use unsigned integer types, specifically `usize` and `u32`, instead of
//!   signed ones (`i32`) for anything that can only contain positive values
//!   (indices, sizes/lengths/counts, valences, arities, etc.). The signed
//!   neighbor offsets stored on a [`HalfEdge`](far::HalfEdge) are the
//!   exception.
//! * Option structs use the [init struct
//!   pattern](https://xaeroxe.github.io/init-struct-pattern/).

pub mod change_set;
pub mod error;
pub mod far;
pub mod mesh;
pub mod osd;
pub mod parallel;

pub use change_set::{ChangeSet, CommitReport};
pub use error::{Error, Result};
pub use mesh::*;

/// A vertex, edge, or face index in the topology.
///
/// # Examples
///
/// ```
/// use subdiv_halfedge::Index;
///
/// // Create an index from a u32
/// let idx = Index::from(42u32);
/// assert_eq!(idx.0, 42);
///
/// // Convert back to u32
/// let value: u32 = idx.into();
/// assert_eq!(value, 42);
///
/// // Create from usize
/// let idx = Index::from(100usize);
/// let as_usize: usize = idx.into();
/// assert_eq!(as_usize, 100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Index(pub u32);

impl From<u32> for Index {
    fn from(value: u32) -> Self {
        Index(value)
    }
}

impl From<Index> for u32 {
    fn from(index: Index) -> Self {
        index.0
    }
}

impl From<usize> for Index {
    fn from(value: usize) -> Self {
        Index(value as u32)
    }
}

impl From<Index> for usize {
    fn from(index: Index) -> Self {
        index.0 as usize
    }
}
