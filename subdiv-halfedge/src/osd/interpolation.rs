//! Indexing of the per-face attribute cache.
//!
//! An attribute of `stride` bytes is interpolated in groups of four floats.
//! Every (face, group) pair owns one [`CacheEntry`]; the entries of one
//! buffer are laid out face-major so the slot of a pair is a single
//! multiply-add.
//!
//! What a cache entry holds and when it is stale is up to the
//! [`PatchEvaluator`]. The mesh only hands it the entry together with the
//! current commit counter.
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{far::HalfEdgeRef, osd::Buffer};

/// Number of floats covered by one slot.
pub const FLOATS_PER_SLOT: usize = 4;
const SLOT_BYTES: usize = FLOATS_PER_SLOT * 4;

/// Returns the number of slots each face needs for an attribute of `stride`
/// bytes.
#[inline]
pub fn slots_per_face(stride: usize) -> usize {
    stride.div_ceil(SLOT_BYTES)
}

/// Returns the slot of float group `group` of `face`.
#[inline]
pub fn interpolation_slot(face: usize, group: usize, stride: usize) -> usize {
    face * slots_per_face(stride) + group
}

/// Opaque per-slot state owned by the patch evaluator.
///
/// The tag is typically the commit counter the cached data was computed
/// for. Entries are shared between concurrent evaluations, hence atomic.
#[derive(Debug, Default)]
pub struct CacheEntry {
    tag: AtomicU64,
}

impl CacheEntry {
    #[inline]
    pub fn tag(&self) -> u64 {
        self.tag.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_tag(&self, tag: u64) {
        self.tag.store(tag, Ordering::Release);
    }
}

/// The cache entries of one attribute buffer.
#[derive(Debug, Default)]
pub struct InterpolationSlots {
    entries: Vec<CacheEntry>,
    slots_per_face: usize,
}

impl InterpolationSlots {
    /// Sizes the array for `face_count` faces of an attribute with `stride`
    /// bytes. Existing entries are reset if the layout changes.
    pub fn resize(&mut self, face_count: usize, stride: usize) {
        let slots_per_face = slots_per_face(stride);
        let len = face_count * slots_per_face;
        if slots_per_face != self.slots_per_face || len != self.entries.len() {
            self.entries.clear();
            self.entries.resize_with(len, CacheEntry::default);
            self.slots_per_face = slots_per_face;
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn slots_per_face(&self) -> usize {
        self.slots_per_face
    }

    /// Returns the entry of float group `group` of `face`.
    #[inline]
    pub fn get(&self, face: usize, group: usize) -> Option<&CacheEntry> {
        if group >= self.slots_per_face {
            return None;
        }
        self.entries.get(face * self.slots_per_face + group)
    }
}

/// One float group to evaluate.
#[derive(Clone, Copy, Debug)]
pub struct PatchRequest<'a> {
    /// The cache entry owned by this face and group.
    pub entry: &'a CacheEntry,
    pub commit_counter: u64,
    /// First half-edge of the face, in the topology the attribute uses.
    pub half_edge: HalfEdgeRef<'a>,
    /// The attribute data.
    pub source: &'a Buffer,
    /// Offset of the group's first float inside an element.
    pub first_float: usize,
    /// Number of valid floats in the group, at most [`FLOATS_PER_SLOT`].
    pub float_count: usize,
    pub u: f32,
    pub v: f32,
}

/// Value and first derivatives of one float group.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GroupEval {
    pub value: [f32; FLOATS_PER_SLOT],
    pub du: [f32; FLOATS_PER_SLOT],
    pub dv: [f32; FLOATS_PER_SLOT],
}

/// Evaluates the subdivision surface of an attribute on one face.
///
/// Implementations may be called concurrently, but never while the mesh is
/// being committed.
pub trait PatchEvaluator {
    fn evaluate(&self, request: PatchRequest<'_>) -> GroupEval;
}

impl<F> PatchEvaluator for F
where
    F: Fn(PatchRequest<'_>) -> GroupEval,
{
    #[inline]
    fn evaluate(&self, request: PatchRequest<'_>) -> GroupEval {
        self(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_counts() {
        assert_eq!(slots_per_face(4), 1);
        assert_eq!(slots_per_face(12), 1);
        assert_eq!(slots_per_face(16), 1);
        assert_eq!(slots_per_face(20), 2);
        assert_eq!(slots_per_face(64), 4);
        assert_eq!(interpolation_slot(3, 1, 20), 7);
    }

    #[test]
    fn resize_resets_on_layout_change() {
        let mut slots = InterpolationSlots::default();
        slots.resize(3, 20);
        assert_eq!(slots.len(), 6);
        slots.get(2, 1).unwrap().set_tag(7);

        slots.resize(3, 20);
        assert_eq!(slots.get(2, 1).unwrap().tag(), 7);

        slots.resize(4, 20);
        assert_eq!(slots.len(), 8);
        assert_eq!(slots.get(2, 1).unwrap().tag(), 0);
        assert!(slots.get(0, 2).is_none());
    }
}
