//! Construction and incremental refresh of a topology's half-edge array.
//!
//! A full rebuild runs in five data-parallel passes separated by barriers:
//!
//! 1. emit one record and one sort key per face corner,
//! 2. radix sort the keys so half-edges sharing an undirected edge become
//!    adjacent,
//! 3. classify every run of equal keys (border, interior, winding crease or
//!    non-manifold),
//! 4. apply the run outcomes to the records,
//! 5. pin vertices and edges according to the boundary mode, then classify
//!    every face.
//!
//! Every pass writes only to the index range its task owns. Passes that need
//! to look at other faces read an immutable view and produce a side array
//! which a following pass applies.
use std::ops::Range;

use crate::{
    far::{
        crease_map::{edge_key, HOLE_KEY},
        half_edge::{offset_index, HalfEdgeRef, INFINITE_CREASE},
        BoundaryMode, CreaseMap, HalfEdge, HoleSet, PatchType, VertexType,
    },
    osd::Buffer,
    parallel::{
        blocks, for_each_task, map_tasks, parallel_map, radix_sort_u64, split_lengths_mut,
        RadixKey,
    },
};

/// Edge levels are clamped into this range.
pub(crate) const MIN_EDGE_LEVEL: f32 = 1.0;
pub(crate) const MAX_EDGE_LEVEL: f32 = 4096.0;

/// Read when an index buffer is shorter than the face layout requires.
const MISSING_INDEX: u32 = u32::MAX;

/// Source of per-half-edge tessellation levels.
#[derive(Clone, Copy, Debug)]
pub(crate) struct EdgeLevels<'a> {
    pub levels: Option<&'a Buffer>,
    pub rate: f32,
}

impl EdgeLevels<'_> {
    #[inline]
    pub fn level(&self, edge: usize) -> f32 {
        self.levels
            .and_then(|levels| levels.f32_at(edge))
            .unwrap_or(self.rate)
            .clamp(MIN_EDGE_LEVEL, MAX_EDGE_LEVEL)
    }
}

/// A run of consecutive faces together with the half-edges they own.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct FaceBlock {
    pub faces: Range<usize>,
    pub edges: Range<usize>,
}

/// Face sizes and the derived first half-edge of every face.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FaceLayout<'a> {
    sizes: &'a Buffer,
    starts: &'a [u32],
    edge_count: usize,
}

impl<'a> FaceLayout<'a> {
    pub fn new(sizes: &'a Buffer, starts: &'a [u32], edge_count: usize) -> Self {
        Self {
            sizes,
            starts,
            edge_count,
        }
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.starts.len()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    #[inline]
    pub fn size(&self, face: usize) -> usize {
        self.sizes.u32_at(face).unwrap_or(0) as usize
    }

    #[inline]
    pub fn start(&self, face: usize) -> usize {
        self.starts.get(face).map_or(self.edge_count, |&s| s as usize)
    }

    #[inline]
    pub fn edges(&self, face: usize) -> Range<usize> {
        let start = self.start(face);
        start..(start + self.size(face)).min(self.edge_count)
    }

    pub fn blocks(&self, block_size: usize) -> Vec<FaceBlock> {
        blocks(0..self.face_count(), block_size)
            .into_iter()
            .map(|faces| {
                let edges = self.start(faces.start)..self.start(faces.end);
                FaceBlock { faces, edges }
            })
            .collect()
    }
}

/// Mesh-wide inputs shared by every topology of one commit.
#[derive(Clone, Copy, Debug)]
pub(crate) struct BuildInput<'a> {
    pub layout: FaceLayout<'a>,
    pub edge_creases: &'a CreaseMap,
    pub vertex_creases: &'a CreaseMap,
    pub holes: &'a HoleSet,
    pub levels: EdgeLevels<'a>,
    pub block_size: usize,
}

/// Which half-edge fields an incremental update refreshes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateFlags {
    pub edge_creases: bool,
    pub vertex_creases: bool,
    pub levels: bool,
}

impl UpdateFlags {
    #[inline]
    pub fn any(&self) -> bool {
        self.edge_creases || self.vertex_creases || self.levels
    }

    #[inline]
    pub fn creases(&self) -> bool {
        self.edge_creases || self.vertex_creases
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct KeyedHalfEdge {
    key: u64,
    edge: u32,
}

impl RadixKey for KeyedHalfEdge {
    #[inline]
    fn radix_key(&self) -> u64 {
        self.key
    }
}

/// Key and ping-pong buffers of the adjacency sort.
#[derive(Clone, Debug, Default)]
pub(crate) struct SortScratch {
    keys: Vec<KeyedHalfEdge>,
    aux: Vec<KeyedHalfEdge>,
}

impl SortScratch {
    fn prepare(&mut self, len: usize) {
        self.keys.clear();
        self.keys.resize(len, KeyedHalfEdge::default());
        self.aux.clear();
        self.aux.resize(len, KeyedHalfEdge::default());
    }

    /// Frees the buffers. They are reallocated by the next rebuild.
    pub fn release(&mut self) {
        self.keys = Vec::new();
        self.aux = Vec::new();
    }

    pub fn capacity(&self) -> usize {
        self.keys.capacity() + self.aux.capacity()
    }
}

/// What the link pass decided for one half-edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Link {
    /// Hole face, never linked.
    Unlinked,
    Border,
    /// Shared by two faces with mismatching winding.
    Crease,
    Opposite(u32),
    NonManifold,
}

#[inline]
fn vertex_at(indices: &Buffer, edge: usize) -> u32 {
    indices.u32_at(edge).unwrap_or(MISSING_INDEX)
}

/// Rebuilds `edges` from scratch.
///
/// `indices` is the topology's own index buffer, `primary` the index buffer
/// of topology 0 which crease lookups are keyed against.
pub(crate) fn calculate(
    edges: &mut Vec<HalfEdge>,
    scratch: &mut SortScratch,
    input: &BuildInput<'_>,
    indices: &Buffer,
    primary: &Buffer,
    mode: BoundaryMode,
) {
    let layout = input.layout;
    let edge_count = layout.edge_count();
    let face_blocks = layout.blocks(input.block_size);
    let block_lengths = || face_blocks.iter().map(|b| b.edges.len());

    edges.clear();
    edges.resize(edge_count, HalfEdge::default());
    scratch.prepare(edge_count);

    // Emit.
    let tasks: Vec<_> = face_blocks
        .iter()
        .zip(split_lengths_mut(edges.as_mut_slice(), block_lengths()))
        .zip(split_lengths_mut(scratch.keys.as_mut_slice(), block_lengths()))
        .collect();
    for_each_task(tasks, |((block, edges), keys)| {
        for face in block.faces.clone() {
            let n = layout.size(face);
            let first = layout.start(face);
            let is_hole = input.holes.contains(face as u32);
            for de in 0..n {
                let next_offset = if de == n - 1 { -(n as i32 - 1) } else { 1 };
                let prev_offset = if de == 0 { n as i32 - 1 } else { -1 };
                let e = first + de;
                let next = offset_index(e, next_offset);

                let start = vertex_at(indices, e);
                let end = vertex_at(indices, next);
                let start0 = vertex_at(primary, e);
                let end0 = vertex_at(primary, next);

                let local = e - block.edges.start;
                edges[local] = HalfEdge {
                    vertex_index: start,
                    next_offset,
                    prev_offset,
                    opposite_offset: 0,
                    edge_crease_weight: input.edge_creases.lookup(edge_key(start0, end0), 0.0),
                    vertex_crease_weight: input.vertex_creases.lookup(start0 as u64, 0.0),
                    edge_level: input.levels.level(e),
                    patch_type: PatchType::Complex,
                    vertex_type: VertexType::Regular,
                };
                keys[local] = KeyedHalfEdge {
                    key: if is_hole { HOLE_KEY } else { edge_key(start, end) },
                    edge: e as u32,
                };
            }
        }
    });

    // Sort.
    radix_sort_u64(
        scratch.keys.as_mut_slice(),
        scratch.aux.as_mut_slice(),
        input.block_size,
    );

    // Link.
    let sorted_links = link_runs(&scratch.keys, edges, input.block_size);
    let mut links = vec![Link::Unlinked; edge_count];
    for (keyed, link) in scratch.keys.iter().zip(sorted_links) {
        links[keyed.edge as usize] = link;
    }

    // Apply.
    let links = &links;
    let tasks: Vec<_> = face_blocks
        .iter()
        .zip(split_lengths_mut(edges.as_mut_slice(), block_lengths()))
        .collect();
    for_each_task(tasks, |(block, edges)| {
        for (local, edge) in edges.iter_mut().enumerate() {
            let e = block.edges.start + local;
            match links[e] {
                Link::Unlinked => {}
                Link::Border | Link::Crease => edge.edge_crease_weight = INFINITE_CREASE,
                Link::Opposite(other) => edge.opposite_offset = (other as i64 - e as i64) as i32,
                Link::NonManifold => edge.pin_non_manifold(),
            }
            // The successor of a non-manifold half-edge shares its end vertex.
            if links.get(offset_index(e, edge.prev_offset)) == Some(&Link::NonManifold) {
                edge.pin_non_manifold();
            }
        }
    });

    apply_boundary_mode(edges, mode, input.block_size);
    classify(edges, &layout, input.block_size);
}

/// Refreshes crease weights and levels in place, without relinking.
///
/// Produces the same array a full rebuild would, provided the connectivity
/// inputs (index buffers, face sizes and holes) did not change since the last
/// rebuild.
pub(crate) fn update(
    edges: &mut [HalfEdge],
    input: &BuildInput<'_>,
    primary: &Buffer,
    mode: BoundaryMode,
    flags: UpdateFlags,
) {
    let layout = input.layout;
    if edges.len() != layout.edge_count() || !flags.any() {
        return;
    }
    let face_blocks = layout.blocks(input.block_size);

    let tasks: Vec<_> = face_blocks
        .iter()
        .zip(split_lengths_mut(edges, face_blocks.iter().map(|b| b.edges.len())))
        .collect();
    for_each_task(tasks, |(block, edges)| {
        for face in block.faces.clone() {
            let is_hole = input.holes.contains(face as u32);
            for e in layout.edges(face) {
                let edge = &mut edges[e - block.edges.start];

                if flags.levels {
                    edge.edge_level = input.levels.level(e);
                }

                // Non-manifold pins are permanent.
                if edge.vertex_type == VertexType::NonManifold {
                    continue;
                }

                let start0 = vertex_at(primary, e);
                // Borders and winding creases stay pinned.
                if flags.edge_creases && (edge.has_opposite() || is_hole) {
                    let end0 = vertex_at(primary, offset_index(e, edge.next_offset));
                    edge.edge_crease_weight =
                        input.edge_creases.lookup(edge_key(start0, end0), 0.0);
                }
                if flags.vertex_creases {
                    edge.vertex_crease_weight = input.vertex_creases.lookup(start0 as u64, 0.0);
                }
            }
        }
    });

    if flags.creases() {
        apply_boundary_mode(edges, mode, input.block_size);
        classify(edges, &layout, input.block_size);
    }
}

/// Decides the link outcome of every sorted position.
///
/// Each block first backs up to the start of the run its first position
/// belongs to and then walks whole runs, possibly past its own end, but only
/// records outcomes for positions inside its own range.
fn link_runs(keys: &[KeyedHalfEdge], edges: &[HalfEdge], block_size: usize) -> Vec<Link> {
    let parts = map_tasks(blocks(0..keys.len(), block_size), |range| {
        let mut out = vec![Link::Unlinked; range.len()];

        let mut e = range.start;
        while e > 0 && keys[e - 1].key == keys[range.start].key {
            e -= 1;
        }

        while e < range.end {
            let key = keys[e].key;
            // Hole keys sort last.
            if key == HOLE_KEY {
                break;
            }
            let mut n = 1;
            while e + n < keys.len() && keys[e + n].key == key {
                n += 1;
            }

            let run = &keys[e..e + n];
            for (i, pos) in (e..e + n).enumerate() {
                if range.contains(&pos) {
                    out[pos - range.start] = run_outcome(run, i, edges);
                }
            }
            e += n;
        }
        out
    });

    let mut links = Vec::with_capacity(keys.len());
    for part in parts {
        links.extend(part);
    }
    links
}

fn run_outcome(run: &[KeyedHalfEdge], i: usize, edges: &[HalfEdge]) -> Link {
    match run {
        [_] => Link::Border,
        [a, b] => {
            let a_index = a.edge as usize;
            let a_next = offset_index(a_index, edges[a_index].next_offset);
            if edges[a_next].vertex_index != edges[b.edge as usize].vertex_index {
                Link::Crease
            } else if i == 0 {
                Link::Opposite(b.edge)
            } else {
                Link::Opposite(a.edge)
            }
        }
        _ => Link::NonManifold,
    }
}

/// Pins vertices and edges as requested by `mode`.
fn apply_boundary_mode(edges: &mut [HalfEdge], mode: BoundaryMode, block_size: usize) {
    let pinned: Vec<bool> = match mode {
        BoundaryMode::SmoothBoundary => return,
        BoundaryMode::PinAll => {
            parallel_edges(edges, block_size, |_, edge| {
                edge.edge_crease_weight = INFINITE_CREASE;
                edge.vertex_crease_weight = INFINITE_CREASE;
            });
            return;
        }
        BoundaryMode::PinCorners => {
            let view = &*edges;
            parallel_map(view.len(), block_size, |e| {
                HalfEdgeRef::new(view, e).is_some_and(|edge| edge.is_corner())
            })
        }
        BoundaryMode::PinBoundary => {
            let view = &*edges;
            parallel_map(view.len(), block_size, |e| {
                HalfEdgeRef::new(view, e).is_some_and(|edge| edge.vertex_has_border())
            })
        }
    };

    let pinned = &pinned;
    parallel_edges(edges, block_size, |e, edge| {
        if pinned[e] {
            edge.vertex_crease_weight = INFINITE_CREASE;
        }
    });
}

/// Computes the patch type of every face and stores it on all its corners.
fn classify(edges: &mut [HalfEdge], layout: &FaceLayout<'_>, block_size: usize) {
    let face_types: Vec<PatchType> = {
        let view = &*edges;
        parallel_map(layout.face_count(), block_size, |face| {
            if layout.size(face) == 0 {
                return PatchType::Complex;
            }
            HalfEdgeRef::new(view, layout.start(face))
                .map_or(PatchType::Complex, |edge| edge.patch_type())
        })
    };

    let face_blocks = layout.blocks(block_size);
    let face_types = &face_types;
    let tasks: Vec<_> = face_blocks
        .iter()
        .zip(split_lengths_mut(edges, face_blocks.iter().map(|b| b.edges.len())))
        .collect();
    for_each_task(tasks, |(block, edges)| {
        for face in block.faces.clone() {
            for e in layout.edges(face) {
                edges[e - block.edges.start].patch_type = face_types[face];
            }
        }
    });
}

/// Calls `f` with the index and record of every half-edge.
fn parallel_edges<F>(edges: &mut [HalfEdge], block_size: usize, f: F)
where
    F: Fn(usize, &mut HalfEdge) + Send + Sync,
{
    let block_size = block_size.max(1);
    let tasks: Vec<_> = edges.chunks_mut(block_size).enumerate().collect();
    for_each_task(tasks, |(block, chunk)| {
        for (i, edge) in chunk.iter_mut().enumerate() {
            f(block * block_size + i, edge);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed(keys: &[u64]) -> Vec<KeyedHalfEdge> {
        keys.iter()
            .enumerate()
            .map(|(i, &key)| KeyedHalfEdge { key, edge: i as u32 })
            .collect()
    }

    /// One-corner faces: every half-edge is its own successor, so every
    /// two-element run has matching winding.
    fn loops(vertices: &[u32]) -> Vec<HalfEdge> {
        vertices
            .iter()
            .map(|&vertex_index| HalfEdge {
                vertex_index,
                ..HalfEdge::default()
            })
            .collect()
    }

    #[test]
    fn runs_split_across_blocks() {
        let keys = keyed(&[1, 1, 1, 2, 2, 3, 4, 4, HOLE_KEY, HOLE_KEY]);
        let edges = loops(&[0, 0, 0, 5, 5, 6, 7, 8, 9, 9]);

        let expected = vec![
            Link::NonManifold,
            Link::NonManifold,
            Link::NonManifold,
            Link::Opposite(4),
            Link::Opposite(3),
            Link::Border,
            Link::Crease,
            Link::Crease,
            Link::Unlinked,
            Link::Unlinked,
        ];
        for block_size in 1..=keys.len() + 1 {
            assert_eq!(link_runs(&keys, &edges, block_size), expected, "block size {block_size}");
        }
    }

    #[test]
    fn face_blocks_own_their_edges() {
        let sizes = Buffer::from_u32(&[4, 3, 0, 5]);
        let starts = [0, 4, 7, 7];
        let layout = FaceLayout::new(&sizes, &starts, 12);

        assert_eq!(
            layout.blocks(3),
            vec![
                FaceBlock {
                    faces: 0..3,
                    edges: 0..7
                },
                FaceBlock {
                    faces: 3..4,
                    edges: 7..12
                },
            ]
        );
        assert_eq!(layout.edges(2), 7..7);
    }

    #[test]
    fn edge_levels_are_clamped() {
        let levels = Buffer::from_f32(&[0.5, 8.0, 1e6], 1).unwrap();
        let with_buffer = EdgeLevels {
            levels: Some(&levels),
            rate: 2.0,
        };
        assert_eq!(with_buffer.level(0), 1.0);
        assert_eq!(with_buffer.level(1), 8.0);
        assert_eq!(with_buffer.level(2), 4096.0);

        let from_rate = EdgeLevels {
            levels: None,
            rate: 2.0,
        };
        assert_eq!(from_rate.level(7), 2.0);
    }
}
