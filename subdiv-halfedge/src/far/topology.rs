//! One index buffer plus the half-edge array derived from it.
//!
//! Topology 0 holds the geometry indices. Additional topologies share the
//! face layout of topology 0 but index separate attribute buffers, so user
//! data can be interpolated with its own seams. Crease weights and holes are
//! always resolved through topology 0's indices.
use derive_more::Display;
use log::trace;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{
    far::{
        half_edges::{self, BuildInput, SortScratch, UpdateFlags},
        HalfEdge, HalfEdgeRef,
    },
    osd::Buffer,
    Index,
};

/// How the border of a surface is treated during subdivision.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum BoundaryMode {
    /// Borders are smoothed like the interior.
    #[display("smooth boundary")]
    SmoothBoundary = 0,
    /// Vertices where two border edges meet are pinned.
    #[display("pin corners")]
    PinCorners = 1,
    /// Every vertex touching a border is pinned.
    #[display("pin boundary")]
    PinBoundary = 2,
    /// Every edge and vertex is pinned, the surface stays the control cage.
    #[display("pin all")]
    PinAll = 3,
}

impl Default for BoundaryMode {
    fn default() -> Self {
        BoundaryMode::SmoothBoundary
    }
}

/// What a commit does with one topology.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TopologyAction {
    /// Relink the half-edges from scratch.
    Rebuild,
    /// Refresh weights and levels in place.
    Update(UpdateFlags),
    Skip,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Topology {
    pub indices: Option<Buffer>,
    pub mode: BoundaryMode,
    pub half_edges: Vec<HalfEdge>,
    scratch: SortScratch,
}

impl Topology {
    /// Runs `action` on this topology.
    ///
    /// `primary` is the index buffer of topology 0 and is ignored for
    /// topology 0 itself. A topology without an index buffer is left alone.
    /// The modified flag of the own index buffer is cleared afterwards.
    pub fn initialize_half_edge_structures(
        &mut self,
        id: usize,
        action: TopologyAction,
        input: &BuildInput<'_>,
        primary: Option<&Buffer>,
        static_mesh: bool,
    ) {
        let Some(indices) = self.indices.as_ref() else {
            trace!("topology {id}: no index buffer");
            return;
        };
        let empty = Buffer::default();
        let primary = if id == 0 {
            indices
        } else {
            primary.unwrap_or(&empty)
        };

        match action {
            TopologyAction::Rebuild => {
                trace!(
                    "topology {id}: rebuilding {} half-edges ({})",
                    input.layout.edge_count(),
                    self.mode
                );
                half_edges::calculate(
                    &mut self.half_edges,
                    &mut self.scratch,
                    input,
                    indices,
                    primary,
                    self.mode,
                );
            }
            TopologyAction::Update(flags) => {
                trace!("topology {id}: updating half-edges ({flags:?})");
                half_edges::update(&mut self.half_edges, input, primary, self.mode, flags);
            }
            TopologyAction::Skip => trace!("topology {id}: unchanged"),
        }

        if static_mesh {
            self.scratch.release();
        }
        if let Some(indices) = self.indices.as_mut() {
            indices.set_modified(false);
        }
    }

    #[inline]
    pub fn scratch_capacity(&self) -> usize {
        self.scratch.capacity()
    }

    pub fn view<'a>(&'a self, face_start_edge: &'a [u32], edge_count: usize) -> TopologyView<'a> {
        TopologyView {
            topology: self,
            face_start_edge,
            edge_count,
        }
    }
}

/// Read access to the committed state of one topology.
///
/// Only valid between commits; obtained through
/// [`Mesh::topology()`](crate::Mesh::topology).
#[derive(Clone, Copy, Debug)]
pub struct TopologyView<'a> {
    topology: &'a Topology,
    face_start_edge: &'a [u32],
    edge_count: usize,
}

impl<'a> TopologyView<'a> {
    /// Returns the number of faces.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.face_start_edge.len()
    }

    /// Returns the number of half-edges.
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Returns the first half-edge of `face`.
    ///
    /// Returns `None` if the face does not exist or has no corners.
    pub fn half_edge(&self, face: Index) -> Option<HalfEdgeRef<'a>> {
        let face = usize::from(face);
        let start = *self.face_start_edge.get(face)? as usize;
        let end = self
            .face_start_edge
            .get(face + 1)
            .map_or(self.topology.half_edges.len(), |&s| s as usize);
        if end <= start {
            return None;
        }
        HalfEdgeRef::new(&self.topology.half_edges, start)
    }

    /// Returns the whole half-edge array.
    #[inline]
    pub fn half_edges(&self) -> &'a [HalfEdge] {
        &self.topology.half_edges
    }

    #[inline]
    pub fn subdivision_mode(&self) -> BoundaryMode {
        self.topology.mode
    }

    /// Returns the index buffer, if one was set.
    #[inline]
    pub fn indices(&self) -> Option<&'a Buffer> {
        self.topology.indices.as_ref()
    }

    /// Tests if the index buffer covers every face corner and every index is
    /// smaller than `vertex_count`.
    pub fn verify(&self, vertex_count: usize) -> bool {
        let Some(indices) = self.indices() else {
            return self.edge_count == 0;
        };
        indices.len() >= self.edge_count
            && (0..self.edge_count).all(|e| {
                indices
                    .u32_at(e)
                    .is_some_and(|index| (index as usize) < vertex_count)
            })
    }
}
