use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::osd::Buffer;

/// The set of faces excluded from adjacency linking.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoleSet {
    faces: Vec<u32>,
}

impl HoleSet {
    /// Builds the set from a buffer of face indices.
    pub fn from_buffer(faces: &Buffer) -> Self {
        Self::from_faces((0..faces.len()).filter_map(|i| faces.u32_at(i)))
    }

    pub fn from_faces(faces: impl IntoIterator<Item = u32>) -> Self {
        Self {
            faces: faces.into_iter().sorted_unstable().dedup().collect(),
        }
    }

    #[inline]
    pub fn contains(&self, face: u32) -> bool {
        !self.faces.is_empty() && self.faces.binary_search(&face).is_ok()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Returns the hole faces in ascending order.
    pub fn faces(&self) -> &[u32] {
        &self.faces
    }
}
