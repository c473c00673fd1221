//! A container holding references to raw topology data.
//!
//! ## Example
//! ```
//! # use subdiv_halfedge::{far::TopologyDescriptor, Mesh, MeshOptions};
//! // The positions as a flat buffer.
//! let positions = [
//!     1.0, 1.0, 1.0, 1.0, -1.0, -1.0, -1.0, 1.0, -1.0, -1.0, -1.0, 1.0f32,
//! ];
//!
//! // Describe the basic topology of our tetrahedron.
//! let mut tetrahedron = TopologyDescriptor::new(
//!     positions.len() / 3,
//!     // Four triangles.
//!     &[3; 4],
//!     // Vertex indices for each triangle.
//!     &[2, 1, 0, 3, 2, 0, 1, 3, 0, 2, 3, 1],
//! )?;
//!
//! // Make all edges creased with sharpness 8.0.
//! tetrahedron.creases(&[0, 2, 0, 3, 1, 3, 0, 1, 2, 3, 1, 2], &[8.0; 6]);
//!
//! let mesh = Mesh::from_descriptor(&tetrahedron, &positions, MeshOptions::default())?;
//! assert!(mesh.verify());
//! # Ok::<(), subdiv_halfedge::Error>(())
//! ```
//!
//! ## Creases
//! Edge and vertex crease weights resist smoothing. A weight of `0` has no
//! effect, larger weights keep the surface closer to the control cage and
//! [`INFINITE_CREASE`](crate::far::INFINITE_CREASE) makes the feature
//! completely sharp.
//!
//! Infinitely sharp creases are tangent discontinuities in the surface, so
//! geometric normals are discontinuous there as well.
use crate::far::BoundaryMode;

/// A `TopologyDescriptor` holds references to raw topology data as flat index
/// buffers.
///
/// This is used to construct a [`Mesh`](crate::Mesh) through
/// [`Mesh::from_descriptor()`](crate::Mesh::from_descriptor).
///
/// See the [module level documentation](crate::far::topology_descriptor) for
/// an example.
#[derive(Clone, Copy, Debug)]
pub struct TopologyDescriptor<'a> {
    pub(crate) vertices_len: usize,
    pub(crate) vertices_per_face: &'a [u32],
    pub(crate) vertex_indices_per_face: &'a [u32],
    pub(crate) creases: Option<(&'a [u32], &'a [f32])>,
    pub(crate) corners: Option<(&'a [u32], &'a [f32])>,
    pub(crate) holes: Option<&'a [u32]>,
    pub(crate) boundary_mode: BoundaryMode,
}

impl<'a> TopologyDescriptor<'a> {
    /// Describes a mesh topology including creases, corners, holes and the
    /// boundary mode.
    ///
    /// # Arguments
    ///
    /// * `vertices_len` - The number of vertices in the mesh.
    /// * `vertices_per_face` - A slice containing the number of vertices for
    ///   each face in the mesh. The length of this is the number of faces in
    ///   the mesh.
    /// * `vertex_indices_per_face` - A flat list of the vertex indices for each
    ///   face in the mesh.
    #[inline]
    pub fn new(
        vertices_len: usize,
        vertices_per_face: &'a [u32],
        vertex_indices_per_face: &'a [u32],
    ) -> crate::Result<TopologyDescriptor<'a>> {
        #[cfg(feature = "topology_validation")]
        {
            if vertex_indices_per_face.len()
                != vertices_per_face.iter().map(|&n| n as usize).sum::<usize>()
            {
                return Err(crate::Error::InvalidTopology(
                    "The number of vertex indices is not equal to the sum of face arities."
                        .to_string(),
                ));
            }
            for (i, &vertex_index) in vertex_indices_per_face.iter().enumerate() {
                if vertices_len <= (vertex_index as usize) {
                    return Err(crate::Error::InvalidTopology(format!(
                        "Vertex index[{}] = {} is out of range (should be < {}).",
                        i, vertex_index, vertices_len
                    )));
                }
            }
        }

        Ok(TopologyDescriptor {
            vertices_len,
            vertices_per_face,
            vertex_indices_per_face,
            creases: None,
            corners: None,
            holes: None,
            boundary_mode: BoundaryMode::default(),
        })
    }

    /// Returns the number of vertices.
    #[inline]
    pub fn vertices_len(&self) -> usize {
        self.vertices_len
    }

    /// Returns the number of faces.
    #[inline]
    pub fn faces_len(&self) -> usize {
        self.vertices_per_face.len()
    }

    /// Add creases as vertex index pairs with corresponding sharpness.
    #[inline]
    pub fn creases(&mut self, creases: &'a [u32], sharpness: &'a [f32]) -> &mut Self {
        assert!(creases.len() % 2 == 0);
        assert!(creases.len() / 2 <= sharpness.len());

        #[cfg(feature = "topology_validation")]
        {
            for (i, &crease_vertex) in creases.iter().enumerate() {
                if self.vertices_len <= crease_vertex as usize {
                    // In builder pattern, we can't return Result, so we panic with a clear message
                    panic!(
                        "Crease index[{}] = {} is out of range (should be < {}).",
                        i, crease_vertex, self.vertices_len
                    );
                }
            }
        }

        self.creases = Some((creases, &sharpness[..creases.len() / 2]));
        self
    }

    /// Add corners as vertex indices with corresponding sharpness.
    #[inline]
    pub fn corners(&mut self, corners: &'a [u32], sharpness: &'a [f32]) -> &mut Self {
        assert!(corners.len() <= sharpness.len());

        #[cfg(feature = "topology_validation")]
        {
            for (i, &corner) in corners.iter().enumerate() {
                if self.vertices_len <= corner as usize {
                    panic!(
                        "Corner index[{}] = {} is out of range (should be < {}).",
                        i, corner, self.vertices_len
                    );
                }
            }
        }

        self.corners = Some((corners, &sharpness[..corners.len()]));
        self
    }

    /// Add holes as face indices.
    #[inline]
    pub fn holes(&mut self, holes: &'a [u32]) -> &mut Self {
        #[cfg(feature = "topology_validation")]
        {
            for (i, &hole) in holes.iter().enumerate() {
                if self.faces_len() <= hole as usize {
                    panic!(
                        "Hole index[{}] = {} is out of range (should be < {}).",
                        i,
                        hole,
                        self.faces_len()
                    );
                }
            }
        }

        self.holes = Some(holes);
        self
    }

    /// Set how the border of the surface is treated.
    #[inline]
    pub fn boundary_mode(&mut self, boundary_mode: BoundaryMode) -> &mut Self {
        self.boundary_mode = boundary_mode;
        self
    }
}
