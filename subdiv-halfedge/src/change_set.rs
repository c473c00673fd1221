//! What changed since the last commit.
//!
//! A [`ChangeSet`] is captured from the modified flags of every buffer
//! before any derived state is touched. All commit decisions are then pure
//! functions of that snapshot, so consuming a flag early (topology 0 clears
//! its index buffer flag before the other topologies run) cannot change the
//! outcome for anyone else.
use std::time::Duration;

use crate::far::{TopologyAction, UpdateFlags};

/// Modified flags of one mesh, taken at the start of a commit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// The face size buffer.
    pub faces: bool,
    pub holes: bool,
    pub levels: bool,
    /// Edge crease index or weight buffer.
    pub edge_creases: bool,
    /// Vertex crease index or weight buffer, or a subdivision mode.
    pub vertex_creases: bool,
    /// Any time step of the vertex buffer.
    pub vertices: bool,
    /// Any user vertex buffer or its topology binding.
    pub user_buffers: bool,
    /// The index buffer of every topology.
    pub topology_indices: Vec<bool>,
}

impl ChangeSet {
    /// Decides what a commit does with topology `topology`.
    pub fn plan(&self, topology: usize) -> TopologyAction {
        let own_indices = self.topology_indices.get(topology).copied().unwrap_or(false);
        if own_indices || self.faces || self.holes {
            return TopologyAction::Rebuild;
        }

        // Crease keys are taken from topology 0's indices.
        let primary_indices = self.primary_indices();
        let flags = UpdateFlags {
            edge_creases: primary_indices || self.edge_creases,
            vertex_creases: primary_indices || self.vertex_creases,
            levels: self.levels,
        };
        if flags.any() {
            TopologyAction::Update(flags)
        } else {
            TopologyAction::Skip
        }
    }

    #[inline]
    pub fn primary_indices(&self) -> bool {
        self.topology_indices.first().copied().unwrap_or(false)
    }

    /// Tests if anything the interpolation cache depends on changed. Edge
    /// levels alone do not count.
    pub fn invalidates_cache(&self) -> bool {
        self.faces
            || self.holes
            || self.edge_creases
            || self.vertex_creases
            || self.vertices
            || self.user_buffers
            || self.topology_indices.iter().any(|&modified| modified)
    }

    /// Tests if the per-face validity flags have to be recomputed.
    pub fn invalidates_faces(&self) -> bool {
        self.faces || self.holes || self.vertices || self.primary_indices()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.invalidates_cache() && !self.levels
    }
}

/// What one [`Mesh::commit()`](crate::Mesh::commit) did.
#[derive(Clone, Debug, PartialEq)]
pub struct CommitReport {
    pub changes: ChangeSet,
    /// One entry per topology, in topology order.
    pub actions: Vec<TopologyAction>,
    /// The commit counter after the commit.
    pub commit_counter: u64,
    pub face_count: usize,
    pub edge_count: usize,
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changes(topology_indices: &[bool]) -> ChangeSet {
        ChangeSet {
            topology_indices: topology_indices.to_vec(),
            ..ChangeSet::default()
        }
    }

    #[test]
    fn connectivity_changes_rebuild_everything() {
        let faces = ChangeSet {
            faces: true,
            ..changes(&[false, false])
        };
        assert_eq!(faces.plan(0), TopologyAction::Rebuild);
        assert_eq!(faces.plan(1), TopologyAction::Rebuild);

        let holes = ChangeSet {
            holes: true,
            ..changes(&[false])
        };
        assert_eq!(holes.plan(0), TopologyAction::Rebuild);
    }

    #[test]
    fn primary_indices_update_secondary_creases() {
        let set = changes(&[true, false]);
        assert_eq!(set.plan(0), TopologyAction::Rebuild);
        assert_eq!(
            set.plan(1),
            TopologyAction::Update(UpdateFlags {
                edge_creases: true,
                vertex_creases: true,
                levels: false,
            })
        );
    }

    #[test]
    fn levels_alone_keep_the_cache() {
        let set = ChangeSet {
            levels: true,
            ..changes(&[false])
        };
        assert_eq!(
            set.plan(0),
            TopologyAction::Update(UpdateFlags {
                levels: true,
                ..UpdateFlags::default()
            })
        );
        assert!(!set.invalidates_cache());
        assert!(!set.is_empty());
        assert_eq!(changes(&[false]).plan(0), TopologyAction::Skip);
    }
}
