//! # Topology
//! `far` holds the topology side of a subdivision mesh: the sparse crease
//! and hole tables, the half-edge arrays built from the index buffers and
//! the descriptor used to set up a mesh in one go.
pub mod crease_map;
pub use crease_map::*;

pub mod hole_set;
pub use hole_set::*;

pub mod half_edge;
pub use half_edge::*;

pub(crate) mod half_edges;
pub use half_edges::UpdateFlags;

pub mod topology;
pub use topology::*;

pub mod topology_descriptor;
pub use topology_descriptor::*;
