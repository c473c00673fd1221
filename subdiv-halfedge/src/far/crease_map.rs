//! Sparse crease weight lookup.
//!
//! Edge creases are keyed by an undirected edge key, vertex creases by the
//! vertex index. Both maps are rebuilt from their source buffers whenever
//! those are modified and are never edited in place. The buffers stay the
//! source of truth: a map may be dropped after a commit and rebuilt later.
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::osd::Buffer;

/// Key assigned to half-edges of hole faces. It never matches a real edge
/// during linking.
pub const HOLE_KEY: u64 = u64::MAX;

/// Packs an undirected edge into a canonical 64-bit key.
///
/// The smaller vertex index goes into the high 32 bits so `(a, b)` and
/// `(b, a)` map to the same key.
#[inline]
pub fn edge_key(v0: u32, v1: u32) -> u64 {
    let (lo, hi) = if v0 < v1 { (v0, v1) } else { (v1, v0) };
    ((lo as u64) << 32) | hi as u64
}

/// Unpacks an [`edge_key`] into `(smaller, larger)` vertex indices.
#[inline]
pub fn edge_key_vertices(key: u64) -> (u32, u32) {
    ((key >> 32) as u32, key as u32)
}

/// An immutable, sorted `key → weight` table.
///
/// Duplicate keys resolve to the entry that came last in the source buffer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CreaseMap {
    entries: Vec<(u64, f32)>,
}

impl CreaseMap {
    /// Builds a map from arbitrary `(key, weight)` pairs.
    pub fn from_entries(entries: impl IntoIterator<Item = (u64, f32)>) -> Self {
        let entries = entries
            .into_iter()
            // Stable, so equal keys keep buffer order and the last one wins.
            .sorted_by_key(|&(key, _)| key)
            .coalesce(|a, b| if a.0 == b.0 { Ok(b) } else { Err((a, b)) })
            .collect();
        Self { entries }
    }

    /// Builds an edge crease map from a buffer of vertex pairs and a matching
    /// weight buffer. Extra entries in the longer buffer are ignored.
    pub fn from_edge_buffers(pairs: &Buffer, weights: &Buffer) -> Self {
        let count = pairs.len().min(weights.len());
        Self::from_entries((0..count).filter_map(|i| {
            let (v0, v1) = pairs.u32_pair_at(i)?;
            Some((edge_key(v0, v1), weights.f32_at(i)?))
        }))
    }

    /// Builds a vertex crease map from a vertex index buffer and a matching
    /// weight buffer.
    pub fn from_vertex_buffers(vertices: &Buffer, weights: &Buffer) -> Self {
        let count = vertices.len().min(weights.len());
        Self::from_entries(
            (0..count).filter_map(|i| Some((vertices.u32_at(i)? as u64, weights.f32_at(i)?))),
        )
    }

    /// Returns the weight stored for `key` or `default` if there is none.
    #[inline]
    pub fn lookup(&self, key: u64, default: f32) -> f32 {
        match self.entries.binary_search_by_key(&key, |&(k, _)| k) {
            Ok(i) => self.entries[i].1,
            Err(_) => default,
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

    /// Iterates the entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, f32)> + '_ {
        self.entries.iter().copied()
    }

    /// Decodes an edge crease map back into flat vertex pairs and weights,
    /// the layout accepted by [`from_edge_buffers`](Self::from_edge_buffers).
    pub fn to_edge_arrays(&self) -> (Vec<u32>, Vec<f32>) {
        self.entries
            .iter()
            .map(|&(key, weight)| {
                let (v0, v1) = edge_key_vertices(key);
                ([v0, v1], weight)
            })
            .fold(
                (Vec::with_capacity(2 * self.len()), Vec::with_capacity(self.len())),
                |(mut pairs, mut weights), (pair, weight)| {
                    pairs.extend_from_slice(&pair);
                    weights.push(weight);
                    (pairs, weights)
                },
            )
    }

    /// Decodes a vertex crease map back into vertex indices and weights.
    pub fn to_vertex_arrays(&self) -> (Vec<u32>, Vec<f32>) {
        self.entries
            .iter()
            .map(|&(key, weight)| (key as u32, weight))
            .unzip()
    }
}
