//! Half-edge records and the pure predicates evaluated on them.
//!
//! Half-edges of one topology live in a single contiguous array. The corners
//! of a face occupy a contiguous run of that array and neighbors are found
//! through signed index deltas, so the array can be reallocated freely.
use derive_more::Display;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Crease weight of a permanently sharp (pinned) edge or vertex.
pub const INFINITE_CREASE: f32 = f32::INFINITY;

/// Evaluation path a downstream patch evaluator selects for a face.
///
/// Variants are ordered by cost: a face is classified as the most expensive
/// type any of its corners requires.
#[derive(
    Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, IntoPrimitive, TryFromPrimitive,
)]
#[repr(u8)]
pub enum PatchType {
    /// All corners and edges are pinned; the face is evaluated bilinearly.
    #[display("bilinear")]
    Bilinear = 0,
    /// Representable as a bicubic B-spline patch.
    #[display("regular quad")]
    RegularQuad = 1,
    /// A quad with an extraordinary vertex; representable as a Gregory patch.
    #[display("irregular quad")]
    IrregularQuad = 2,
    /// Needs subdivision before it can be evaluated.
    #[display("complex")]
    Complex = 3,
}

/// Manifoldness of the origin vertex of a half-edge.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum VertexType {
    #[display("regular")]
    Regular = 0,
    /// The vertex touches an edge shared by more than two faces. Such
    /// vertices are pinned and never smoothed again.
    #[display("non-manifold")]
    NonManifold = 1,
}

/// One face corner: the directed edge leaving `vertex_index` inside its face.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HalfEdge {
    /// Index into the vertex buffer interpolated through this topology.
    pub vertex_index: u32,
    /// Index delta to the next half-edge around the face.
    pub next_offset: i32,
    /// Index delta to the previous half-edge around the face.
    pub prev_offset: i32,
    /// Index delta to the matching half-edge of the adjacent face, `0` if
    /// there is none.
    pub opposite_offset: i32,
    pub edge_crease_weight: f32,
    pub vertex_crease_weight: f32,
    /// Tessellation density hint.
    pub edge_level: f32,
    pub patch_type: PatchType,
    pub vertex_type: VertexType,
}

impl Default for HalfEdge {
    fn default() -> Self {
        Self {
            vertex_index: 0,
            next_offset: 0,
            prev_offset: 0,
            opposite_offset: 0,
            edge_crease_weight: 0.0,
            vertex_crease_weight: 0.0,
            edge_level: 1.0,
            patch_type: PatchType::Complex,
            vertex_type: VertexType::Regular,
        }
    }
}

impl HalfEdge {
    #[inline]
    pub fn has_opposite(&self) -> bool {
        self.opposite_offset != 0
    }

    /// Pins the vertex and the edge permanently.
    #[inline]
    pub(crate) fn pin_non_manifold(&mut self) {
        self.vertex_type = VertexType::NonManifold;
        self.vertex_crease_weight = INFINITE_CREASE;
        self.edge_crease_weight = INFINITE_CREASE;
    }

    /// Tests if both the origin vertex and the edge are infinitely sharp.
    #[inline]
    pub fn is_bilinear_vertex(&self) -> bool {
        self.vertex_crease_weight == INFINITE_CREASE && self.edge_crease_weight == INFINITE_CREASE
    }
}

#[inline]
pub(crate) fn offset_index(index: usize, offset: i32) -> usize {
    (index as isize + offset as isize) as usize
}

/// A cursor on one half-edge of a half-edge array.
///
/// All navigation stays inside the borrowed array. Ring walks are bounded by
/// the array length so inconsistent connectivity cannot loop forever.
#[derive(Clone, Copy, Debug)]
pub struct HalfEdgeRef<'a> {
    edges: &'a [HalfEdge],
    index: usize,
}

impl PartialEq for HalfEdgeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && std::ptr::eq(self.edges, other.edges)
    }
}

impl std::ops::Deref for HalfEdgeRef<'_> {
    type Target = HalfEdge;

    #[inline]
    fn deref(&self) -> &HalfEdge {
        &self.edges[self.index]
    }
}

impl<'a> HalfEdgeRef<'a> {
    /// Returns `None` if `index` is outside of `edges`.
    #[inline]
    pub fn new(edges: &'a [HalfEdge], index: usize) -> Option<Self> {
        (index < edges.len()).then_some(Self { edges, index })
    }

    /// Position of this half-edge in its array.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn edge(&self) -> &'a HalfEdge {
        &self.edges[self.index]
    }

    #[inline]
    fn at(&self, offset: i32) -> Self {
        Self {
            edges: self.edges,
            index: offset_index(self.index, offset),
        }
    }

    #[inline]
    pub fn next(&self) -> Self {
        self.at(self.edge().next_offset)
    }

    #[inline]
    pub fn prev(&self) -> Self {
        self.at(self.edge().prev_offset)
    }

    #[inline]
    pub fn opposite(&self) -> Option<Self> {
        self.has_opposite().then(|| self.at(self.edge().opposite_offset))
    }

    /// Steps to the next half-edge leaving the same vertex.
    #[inline]
    pub fn rotate(&self) -> Option<Self> {
        self.opposite().map(|o| o.next())
    }

    /// Origin vertex of the next half-edge.
    #[inline]
    pub fn end_vertex_index(&self) -> u32 {
        self.next().vertex_index
    }

    /// Iterates the half-edges of this face, starting here.
    pub fn face_edges(&self) -> impl Iterator<Item = HalfEdgeRef<'a>> {
        let start = *self;
        let limit = self.edges.len();
        let mut current = Some(start);
        let mut steps = 0;
        std::iter::from_fn(move || {
            let edge = current?;
            steps += 1;
            let next = edge.next();
            current = (next != start && steps < limit).then_some(next);
            Some(edge)
        })
    }

    /// Returns the number of corners of this face.
    pub fn face_size(&self) -> usize {
        self.face_edges().count()
    }

    /// Tests if this half-edge and its predecessor are both borders, i.e.
    /// the origin vertex is a corner of the surface.
    #[inline]
    pub fn is_corner(&self) -> bool {
        !self.has_opposite() && !self.prev().has_opposite()
    }

    /// Tests if any half-edge leaving the origin vertex is a border.
    pub fn vertex_has_border(&self) -> bool {
        let mut p = *self;
        for _ in 0..self.edges.len() {
            match p.rotate() {
                None => return true,
                Some(r) if r == *self => return false,
                Some(r) => p = r,
            }
        }
        true
    }

    /// Classifies the origin vertex by walking its face ring.
    pub fn vertex_patch_type(&self) -> PatchType {
        if self.vertex_type == VertexType::NonManifold {
            return PatchType::Complex;
        }

        let limit = self.edges.len();
        let mut p = *self;
        let mut face_valence = 0usize;
        let mut has_border = false;

        loop {
            // Interior creases need subdivision.
            if p.has_opposite() && p.edge_crease_weight > 0.0 {
                return PatchType::Complex;
            }

            face_valence += 1;
            if face_valence > limit || p.face_size() != 4 {
                return PatchType::Complex;
            }

            let prev = p.prev();
            p = match prev.opposite() {
                Some(o) => o,
                None => {
                    // Continue on the other side of the border.
                    face_valence += 1;
                    has_border = true;
                    let mut q = *self;
                    let mut steps = 0;
                    while let Some(r) = q.rotate() {
                        steps += 1;
                        if steps > limit {
                            return PatchType::Complex;
                        }
                        q = r;
                    }
                    q
                }
            };

            if p == *self {
                break;
            }
        }

        let vertex_crease = self.vertex_crease_weight;
        if face_valence == 2 && has_border {
            if vertex_crease == 0.0 || vertex_crease == INFINITE_CREASE {
                PatchType::RegularQuad
            } else {
                PatchType::Complex
            }
        } else if vertex_crease != 0.0 {
            PatchType::Complex
        } else if (face_valence == 3 && has_border) || (face_valence == 4 && !has_border) {
            PatchType::RegularQuad
        } else {
            PatchType::IrregularQuad
        }
    }

    /// Classifies the face this half-edge belongs to.
    ///
    /// Only meaningful once every crease weight and vertex type of the
    /// surrounding faces is final.
    pub fn patch_type(&self) -> PatchType {
        let mut patch_type = PatchType::RegularQuad;
        let mut bilinear = true;
        let mut corners = 0;

        for corner in self.face_edges() {
            corners += 1;
            if corners > 4 {
                return PatchType::Complex;
            }
            patch_type = patch_type.max(corner.vertex_patch_type());
            bilinear &= corner.is_bilinear_vertex();
        }

        if corners != 4 {
            PatchType::Complex
        } else if bilinear {
            PatchType::Bilinear
        } else {
            patch_type
        }
    }
}
