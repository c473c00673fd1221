//! The subdivision mesh and its commit protocol.
//!
//! A [`Mesh`] owns every input buffer plus the state derived from them: the
//! face layout, crease maps, hole set, one half-edge array per topology,
//! per-face validity flags and the interpolation cache slots.
//!
//! Buffers are edited freely between commits. [`Mesh::commit()`] snapshots
//! their modified flags into a [`ChangeSet`], decides per topology whether
//! to rebuild, update or skip, brings all derived state up to date and
//! clears the flags. The commit counter is bumped whenever something other
//! than edge levels changed, so patch evaluators can tell stale cache
//! entries apart.
//!
//! ## Example
//! ```
//! use subdiv_halfedge::{far::PatchType, BufferType, Mesh, MeshOptions};
//!
//! // Two quads sharing the edge 1-4.
//! let mut mesh = Mesh::new(MeshOptions::default());
//! mesh.set_buffer_f32(
//!     BufferType::Vertex(0),
//!     &[
//!         0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 2.0, 0.0, 0.0, //
//!         0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 2.0, 1.0, 0.0,
//!     ],
//!     3,
//! )?;
//! mesh.set_buffer_u32(BufferType::Face, &[4, 4])?;
//! mesh.set_buffer_u32(BufferType::Index(0), &[0, 1, 4, 3, 1, 2, 5, 4])?;
//!
//! let report = mesh.commit();
//! assert_eq!(report.commit_counter, 1);
//! assert!(mesh.verify());
//!
//! let topology = mesh.topology(0).unwrap();
//! let shared = topology.half_edge(0u32.into()).unwrap().next();
//! assert!(shared.opposite().is_some());
//! assert_eq!(shared.patch_type, PatchType::RegularQuad);
//! # Ok::<(), subdiv_halfedge::Error>(())
//! ```
use std::{borrow::Cow, fmt, time::Instant};

use derive_more::Display;
use itertools::Itertools;
use log::{debug, log_enabled, Level};

use crate::{
    change_set::{ChangeSet, CommitReport},
    far::{
        half_edges::{BuildInput, EdgeLevels, FaceLayout},
        BoundaryMode, CreaseMap, HoleSet, PatchType, Topology, TopologyAction,
        TopologyDescriptor, TopologyView,
    },
    osd::{
        slots_per_face, Buffer, GroupEval, InterpolationSlots, PatchEvaluator, PatchRequest,
        FLOATS_PER_SLOT,
    },
    parallel::{exclusive_prefix_sum, parallel_map, DEFAULT_BLOCK_SIZE},
    Error, Index, Result,
};

/// Maximum number of vertex buffer time steps.
pub const MAX_TIME_STEPS: u32 = 129;
/// Maximum number of user vertex buffers.
pub const MAX_USER_VERTEX_BUFFERS: u32 = 16;
/// Maximum number of topologies (index buffers).
pub const MAX_TOPOLOGIES: u32 = 16;

/// Positions beyond this magnitude make a face invalid.
const MAX_COORDINATE: f32 = 1.844e18;

/// Identifies one buffer slot of a [`Mesh`].
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum BufferType {
    /// Vertex positions of one time step.
    #[display("vertex buffer {_0}")]
    Vertex(u32),
    /// An attribute interpolated through a bound topology.
    #[display("user vertex buffer {_0}")]
    UserVertex(u32),
    /// The number of corners of every face.
    #[display("face buffer")]
    Face,
    /// The corner vertex indices of topology `n`.
    #[display("index buffer {_0}")]
    Index(u32),
    /// Vertex index pairs, two words per element.
    #[display("edge crease index buffer")]
    EdgeCreaseIndex,
    #[display("edge crease weight buffer")]
    EdgeCreaseWeight,
    #[display("vertex crease index buffer")]
    VertexCreaseIndex,
    #[display("vertex crease weight buffer")]
    VertexCreaseWeight,
    /// Indices of faces to leave out.
    #[display("hole buffer")]
    Hole,
    /// One tessellation level per half-edge.
    #[display("level buffer")]
    Level,
}

impl BufferType {
    fn check(self) -> Result<()> {
        let in_range = match self {
            BufferType::Vertex(t) => t < MAX_TIME_STEPS,
            BufferType::UserVertex(i) => i < MAX_USER_VERTEX_BUFFERS,
            BufferType::Index(t) => t < MAX_TOPOLOGIES,
            _ => true,
        };
        if in_range {
            Ok(())
        } else {
            Err(Error::unknown_buffer(self))
        }
    }

    fn min_stride(self) -> usize {
        match self {
            BufferType::EdgeCreaseIndex => 8,
            _ => 4,
        }
    }
}

/// Mesh configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshOptions {
    /// Number of faces or half-edges handled by one parallel task.
    pub block_size: usize,
    /// The mesh is not expected to change after the next commit. Crease
    /// maps, the hole set and sort scratch are dropped after every commit
    /// and rebuilt from the buffers when needed.
    pub static_mesh: bool,
    /// Edge level used when no level buffer is set.
    pub tessellation_rate: f32,
}

impl Default for MeshOptions {
    /// Create options with the following defaults:
    ///
    /// | Property            | Value  |
    /// |---------------------|--------|
    /// | `block_size`        | `4096` |
    /// | `static_mesh`       | `false`|
    /// | `tessellation_rate` | `2.0`  |
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            static_mesh: false,
            tessellation_rate: 2.0,
        }
    }
}

/// Face counts of topology 0 per [`PatchType`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PatchStatistics {
    pub faces: usize,
    pub bilinear: usize,
    pub regular_quad: usize,
    pub irregular_quad: usize,
    pub complex: usize,
}

impl fmt::Display for PatchStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let percent = |count: usize| {
            if self.faces == 0 {
                0.0
            } else {
                100.0 * count as f64 / self.faces as f64
            }
        };
        write!(
            f,
            "faces = {}, bilinear = {} ({:.1}%), regular quad = {} ({:.1}%), \
             irregular quad = {} ({:.1}%), complex = {} ({:.1}%)",
            self.faces,
            self.bilinear,
            percent(self.bilinear),
            self.regular_quad,
            percent(self.regular_quad),
            self.irregular_quad,
            percent(self.irregular_quad),
            self.complex,
            percent(self.complex),
        )
    }
}

/// Result of [`Mesh::interpolate()`], one entry per float of an element.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Interpolated {
    pub value: Vec<f32>,
    pub du: Vec<f32>,
    pub dv: Vec<f32>,
}

/// A polygon mesh prepared for subdivision-surface evaluation.
#[derive(Debug)]
pub struct Mesh {
    options: MeshOptions,

    vertices: Vec<Option<Buffer>>,
    user_buffers: Vec<Option<Buffer>>,
    user_topologies: Vec<usize>,
    faces: Option<Buffer>,
    holes: Option<Buffer>,
    levels: Option<Buffer>,
    edge_crease_indices: Option<Buffer>,
    edge_crease_weights: Option<Buffer>,
    vertex_crease_indices: Option<Buffer>,
    vertex_crease_weights: Option<Buffer>,
    topologies: Vec<Topology>,

    face_start_edge: Vec<u32>,
    edge_count: usize,
    edge_crease_map: Option<CreaseMap>,
    vertex_crease_map: Option<CreaseMap>,
    hole_set: Option<HoleSet>,
    invalid_faces: Vec<bool>,
    invalid_time_steps: usize,
    vertex_slots: Vec<InterpolationSlots>,
    user_slots: Vec<InterpolationSlots>,

    commit_counter: u64,
    modes_modified: bool,
    bindings_modified: bool,
    rate_modified: bool,
}

impl Default for Mesh {
    fn default() -> Self {
        Mesh::new(MeshOptions::default())
    }
}

impl Mesh {
    /// Creates an empty mesh with one time step and one topology.
    pub fn new(options: MeshOptions) -> Self {
        Self {
            options,
            vertices: vec![None],
            user_buffers: Vec::new(),
            user_topologies: Vec::new(),
            faces: None,
            holes: None,
            levels: None,
            edge_crease_indices: None,
            edge_crease_weights: None,
            vertex_crease_indices: None,
            vertex_crease_weights: None,
            topologies: vec![Topology::default()],
            face_start_edge: Vec::new(),
            edge_count: 0,
            edge_crease_map: None,
            vertex_crease_map: None,
            hole_set: None,
            invalid_faces: Vec::new(),
            invalid_time_steps: 0,
            vertex_slots: Vec::new(),
            user_slots: Vec::new(),
            commit_counter: 0,
            modes_modified: false,
            bindings_modified: false,
            rate_modified: false,
        }
    }

    /// Creates a mesh from a descriptor and commits it.
    ///
    /// `positions` holds three floats per vertex.
    pub fn from_descriptor(
        descriptor: &TopologyDescriptor<'_>,
        positions: &[f32],
        options: MeshOptions,
    ) -> Result<Self> {
        let floats = 3 * descriptor.vertices_len;
        if positions.len() < floats {
            return Err(Error::InvalidBufferSize {
                expected: floats,
                actual: positions.len(),
            });
        }

        let mut mesh = Mesh::new(options);
        mesh.set_buffer_f32(BufferType::Vertex(0), &positions[..floats], 3)?;
        mesh.set_buffer_u32(BufferType::Face, descriptor.vertices_per_face)?;
        mesh.set_buffer_u32(BufferType::Index(0), descriptor.vertex_indices_per_face)?;

        if let Some((pairs, weights)) = descriptor.creases {
            mesh.set_buffer(
                BufferType::EdgeCreaseIndex,
                bytemuck::cast_slice(pairs),
                0,
                8,
                pairs.len() / 2,
            )?;
            mesh.set_buffer_f32(BufferType::EdgeCreaseWeight, weights, 1)?;
        }
        if let Some((corners, weights)) = descriptor.corners {
            mesh.set_buffer_u32(BufferType::VertexCreaseIndex, corners)?;
            mesh.set_buffer_f32(BufferType::VertexCreaseWeight, weights, 1)?;
        }
        if let Some(holes) = descriptor.holes {
            mesh.set_buffer_u32(BufferType::Hole, holes)?;
        }
        mesh.set_subdivision_mode(0, descriptor.boundary_mode)?;

        mesh.commit();
        Ok(mesh)
    }

    #[inline]
    pub fn options(&self) -> &MeshOptions {
        &self.options
    }

    /// Grows the slot arrays as needed and returns the slot for `ty`.
    fn slot_mut(&mut self, ty: BufferType) -> Result<&mut Option<Buffer>> {
        ty.check()?;
        Ok(match ty {
            BufferType::Vertex(t) => {
                let t = t as usize;
                if t >= self.vertices.len() {
                    self.vertices.resize_with(t + 1, || None);
                }
                &mut self.vertices[t]
            }
            BufferType::UserVertex(i) => {
                let i = i as usize;
                if i >= self.user_buffers.len() {
                    self.user_buffers.resize_with(i + 1, || None);
                    self.user_topologies.resize(i + 1, 0);
                }
                &mut self.user_buffers[i]
            }
            BufferType::Index(t) => {
                let t = t as usize;
                if t >= self.topologies.len() {
                    self.topologies.resize_with(t + 1, Topology::default);
                }
                &mut self.topologies[t].indices
            }
            BufferType::Face => &mut self.faces,
            BufferType::EdgeCreaseIndex => &mut self.edge_crease_indices,
            BufferType::EdgeCreaseWeight => &mut self.edge_crease_weights,
            BufferType::VertexCreaseIndex => &mut self.vertex_crease_indices,
            BufferType::VertexCreaseWeight => &mut self.vertex_crease_weights,
            BufferType::Hole => &mut self.holes,
            BufferType::Level => &mut self.levels,
        })
    }

    fn slot(&self, ty: BufferType) -> Result<Option<&Buffer>> {
        ty.check()?;
        Ok(match ty {
            BufferType::Vertex(t) => self.vertices.get(t as usize).and_then(Option::as_ref),
            BufferType::UserVertex(i) => {
                self.user_buffers.get(i as usize).and_then(Option::as_ref)
            }
            BufferType::Index(t) => self
                .topologies
                .get(t as usize)
                .and_then(|topology| topology.indices.as_ref()),
            BufferType::Face => self.faces.as_ref(),
            BufferType::EdgeCreaseIndex => self.edge_crease_indices.as_ref(),
            BufferType::EdgeCreaseWeight => self.edge_crease_weights.as_ref(),
            BufferType::VertexCreaseIndex => self.vertex_crease_indices.as_ref(),
            BufferType::VertexCreaseWeight => self.vertex_crease_weights.as_ref(),
            BufferType::Hole => self.holes.as_ref(),
            BufferType::Level => self.levels.as_ref(),
        })
    }

    fn store(&mut self, ty: BufferType, buffer: Buffer) -> Result<&mut Buffer> {
        ty.check()?;
        if buffer.stride() < ty.min_stride() {
            return Err(Error::InvalidOperation(format!(
                "{} needs a stride of at least {} bytes",
                ty,
                ty.min_stride()
            )));
        }
        let slot = self.slot_mut(ty)?;
        Ok(slot.insert(buffer))
    }

    /// Allocates a zero-filled buffer of `count` elements of `stride` bytes
    /// and returns it for filling in.
    pub fn new_buffer(&mut self, ty: BufferType, stride: usize, count: usize) -> Result<&mut Buffer> {
        ty.check()?;
        let buffer = Buffer::new(stride, count)?;
        self.store(ty, buffer)
    }

    /// Copies `count` elements of `stride` bytes, starting at byte `offset`
    /// of `bytes`, into the slot `ty`.
    pub fn set_buffer(
        &mut self,
        ty: BufferType,
        bytes: &[u8],
        offset: usize,
        stride: usize,
        count: usize,
    ) -> Result<()> {
        ty.check()?;
        let buffer = Buffer::from_bytes(bytes, offset, stride, count)?;
        self.store(ty, buffer).map(|_| ())
    }

    /// Sets a buffer with one [`u32`] per element.
    pub fn set_buffer_u32(&mut self, ty: BufferType, data: &[u32]) -> Result<()> {
        ty.check()?;
        self.store(ty, Buffer::from_u32(data)).map(|_| ())
    }

    /// Sets a buffer with `floats_per_element` [`f32`]s per element.
    pub fn set_buffer_f32(
        &mut self,
        ty: BufferType,
        data: &[f32],
        floats_per_element: usize,
    ) -> Result<()> {
        ty.check()?;
        let buffer = Buffer::from_f32(data, floats_per_element)?;
        self.store(ty, buffer).map(|_| ())
    }

    /// Returns the buffer in slot `ty`.
    pub fn buffer(&self, ty: BufferType) -> Result<&Buffer> {
        self.slot(ty)?
            .ok_or_else(|| Error::InvalidArgument(format!("{} is not set", ty)))
    }

    /// Returns the buffer in slot `ty` for editing.
    ///
    /// Every mutable data accessor of [`Buffer`] marks it modified.
    pub fn buffer_mut(&mut self, ty: BufferType) -> Result<&mut Buffer> {
        if self.slot(ty)?.is_none() {
            return Err(Error::InvalidArgument(format!("{} is not set", ty)));
        }
        self.slot_mut(ty)?
            .as_mut()
            .ok_or_else(|| Error::InvalidArgument(format!("{} is not set", ty)))
    }

    /// Marks the buffer in slot `ty` modified.
    pub fn update_buffer(&mut self, ty: BufferType) -> Result<()> {
        self.buffer_mut(ty)?.set_modified(true);
        Ok(())
    }

    /// Marks every geometry, topology, crease, hole and level buffer
    /// modified, forcing a full rebuild on the next commit.
    pub fn mark_all_modified(&mut self) {
        let buffers = self
            .vertices
            .iter_mut()
            .chain([
                &mut self.faces,
                &mut self.holes,
                &mut self.levels,
                &mut self.edge_crease_indices,
                &mut self.edge_crease_weights,
                &mut self.vertex_crease_indices,
                &mut self.vertex_crease_weights,
            ])
            .chain(self.topologies.iter_mut().map(|t| &mut t.indices));
        for buffer in buffers.flatten() {
            buffer.set_modified(true);
        }
    }

    /// Binds user vertex buffer `vertex_buffer` to the topology of index
    /// buffer `index_buffer`.
    pub fn set_index_buffer(
        &mut self,
        vertex_buffer: BufferType,
        index_buffer: BufferType,
    ) -> Result<()> {
        let user = match vertex_buffer {
            BufferType::UserVertex(i) if (i as usize) < self.user_buffers.len() => i as usize,
            _ => {
                return Err(Error::InvalidOperation(format!(
                    "invalid vertex buffer specified: {}",
                    vertex_buffer
                )))
            }
        };
        let topology = match index_buffer {
            BufferType::Index(t) if (t as usize) < self.topologies.len() => t as usize,
            _ => {
                return Err(Error::InvalidOperation(format!(
                    "invalid index buffer specified: {}",
                    index_buffer
                )))
            }
        };

        if self.user_topologies[user] != topology {
            self.user_topologies[user] = topology;
            self.bindings_modified = true;
        }
        Ok(())
    }

    /// Returns the topology user vertex buffer `user_buffer` is bound to.
    pub fn user_buffer_topology(&self, user_buffer: u32) -> Option<usize> {
        self.user_topologies.get(user_buffer as usize).copied()
    }

    /// Sets how the border of topology `id` is treated.
    pub fn set_subdivision_mode(&mut self, id: usize, mode: BoundaryMode) -> Result<()> {
        let Some(topology) = self.topologies.get_mut(id) else {
            return Err(Error::InvalidOperation(format!("invalid topology ID: {}", id)));
        };
        if topology.mode != mode {
            topology.mode = mode;
            self.modes_modified = true;
        }
        Ok(())
    }

    /// Sets the edge level used when no level buffer is present.
    pub fn set_tessellation_rate(&mut self, rate: f32) {
        self.options.tessellation_rate = rate;
        self.rate_modified = true;
    }

    #[inline]
    pub fn tessellation_rate(&self) -> f32 {
        self.options.tessellation_rate
    }

    /// Snapshots the modified flags of every buffer.
    pub fn change_set(&self) -> ChangeSet {
        let modified = |buffer: &Option<Buffer>| buffer.as_ref().is_some_and(Buffer::is_modified);
        ChangeSet {
            faces: modified(&self.faces),
            holes: modified(&self.holes),
            levels: modified(&self.levels) || self.rate_modified,
            edge_creases: modified(&self.edge_crease_indices)
                || modified(&self.edge_crease_weights)
                || self.modes_modified,
            vertex_creases: modified(&self.vertex_crease_indices)
                || modified(&self.vertex_crease_weights)
                || self.modes_modified,
            vertices: self.vertices.iter().any(modified),
            user_buffers: self.user_buffers.iter().any(modified) || self.bindings_modified,
            topology_indices: self
                .topologies
                .iter()
                .map(|topology| modified(&topology.indices))
                .collect(),
        }
    }

    /// Brings all derived state up to date with the buffers and clears
    /// their modified flags.
    pub fn commit(&mut self) -> CommitReport {
        let started = Instant::now();
        let changes = self.change_set();
        let block_size = self.options.block_size;
        let static_mesh = self.options.static_mesh;

        let empty = Buffer::default();
        let faces = self.faces.as_ref().unwrap_or(&empty);
        let face_count = faces.len();

        if changes.faces || self.face_start_edge.len() != face_count {
            let sizes: Cow<'_, [u32]> = if faces.stride() == 4 {
                Cow::Borrowed(faces.as_u32())
            } else {
                Cow::Owned((0..face_count).filter_map(|f| faces.u32_at(f)).collect())
            };
            self.edge_count = exclusive_prefix_sum(&sizes, &mut self.face_start_edge, block_size);
        }

        let edge_creases = match self.edge_crease_map.take() {
            Some(map) if !changes.edge_creases => map,
            _ => match (&self.edge_crease_indices, &self.edge_crease_weights) {
                (Some(pairs), Some(weights)) => CreaseMap::from_edge_buffers(pairs, weights),
                _ => CreaseMap::default(),
            },
        };
        let vertex_creases = match self.vertex_crease_map.take() {
            Some(map) if !changes.vertex_creases => map,
            _ => match (&self.vertex_crease_indices, &self.vertex_crease_weights) {
                (Some(vertices), Some(weights)) => CreaseMap::from_vertex_buffers(vertices, weights),
                _ => CreaseMap::default(),
            },
        };
        let holes = match self.hole_set.take() {
            Some(set) if !changes.holes => set,
            _ => self.holes.as_ref().map(HoleSet::from_buffer).unwrap_or_default(),
        };

        let layout = FaceLayout::new(faces, &self.face_start_edge, self.edge_count);
        let input = BuildInput {
            layout,
            edge_creases: &edge_creases,
            vertex_creases: &vertex_creases,
            holes: &holes,
            levels: EdgeLevels {
                levels: self.levels.as_ref(),
                rate: self.options.tessellation_rate,
            },
            block_size,
        };

        let actions: Vec<TopologyAction> =
            (0..self.topologies.len()).map(|t| changes.plan(t)).collect();
        if let Some((primary, rest)) = self.topologies.split_first_mut() {
            primary.initialize_half_edge_structures(0, actions[0], &input, None, static_mesh);
            let primary_indices = primary.indices.as_ref();
            for (i, topology) in rest.iter_mut().enumerate() {
                topology.initialize_half_edge_structures(
                    i + 1,
                    actions[i + 1],
                    &input,
                    primary_indices,
                    static_mesh,
                );
            }
        }

        let time_steps = self.vertices.len();
        if changes.invalidates_faces()
            || self.invalid_time_steps != time_steps
            || self.invalid_faces.len() != face_count * time_steps
        {
            let indices = self.topologies.first().and_then(|t| t.indices.as_ref());
            let vertices = &self.vertices;
            let holes = &holes;
            self.invalid_faces = parallel_map(face_count * time_steps, block_size, |i| {
                let (face, time_step) = (i / time_steps, i % time_steps);
                face_is_invalid(
                    &layout,
                    indices,
                    vertices[time_step].as_ref(),
                    holes,
                    face,
                )
            });
            self.invalid_time_steps = time_steps;
        }

        self.vertex_slots
            .resize_with(self.vertices.len(), InterpolationSlots::default);
        for (slots, buffer) in self.vertex_slots.iter_mut().zip(&self.vertices) {
            slots.resize(face_count, buffer.as_ref().map_or(0, Buffer::stride));
        }
        self.user_slots
            .resize_with(self.user_buffers.len(), InterpolationSlots::default);
        for (slots, buffer) in self.user_slots.iter_mut().zip(&self.user_buffers) {
            slots.resize(face_count, buffer.as_ref().map_or(0, Buffer::stride));
        }

        if !static_mesh {
            self.edge_crease_map = Some(edge_creases);
            self.vertex_crease_map = Some(vertex_creases);
            self.hole_set = Some(holes);
        }

        let consumed = self
            .vertices
            .iter_mut()
            .chain(self.user_buffers.iter_mut())
            .chain([
                &mut self.faces,
                &mut self.holes,
                &mut self.levels,
                &mut self.edge_crease_indices,
                &mut self.edge_crease_weights,
                &mut self.vertex_crease_indices,
                &mut self.vertex_crease_weights,
            ]);
        for buffer in consumed.flatten() {
            buffer.set_modified(false);
        }
        self.modes_modified = false;
        self.bindings_modified = false;
        self.rate_modified = false;

        if changes.invalidates_cache() {
            self.commit_counter += 1;
        }

        let elapsed = started.elapsed();
        if log_enabled!(Level::Debug) {
            let seconds = elapsed.as_secs_f64();
            debug!(
                "half edge generation = {:.3}ms, {:.3}M/s",
                1000.0 * seconds,
                if seconds > 0.0 {
                    1e-6 * self.edge_count as f64 / seconds
                } else {
                    0.0
                }
            );
            debug!("{}", self.patch_statistics());
        }

        CommitReport {
            changes,
            actions,
            commit_counter: self.commit_counter,
            face_count,
            edge_count: self.edge_count,
            elapsed,
        }
    }

    /// Checks the buffers for consistency.
    ///
    /// All time steps must be present and equally sized, every index of
    /// topology 0 must refer to an existing vertex, every user buffer must be
    /// large enough for the topology it is bound to and every vertex position
    /// must be finite and within range.
    pub fn verify(&self) -> bool {
        let Some(Some(first)) = self.vertices.first() else {
            return false;
        };
        let vertex_count = first.len();
        if !self
            .vertices
            .iter()
            .all(|buffer| buffer.as_ref().is_some_and(|b| b.len() == vertex_count))
        {
            return false;
        }

        let edge_count = self.faces.as_ref().map_or(0, |faces| {
            (0..faces.len())
                .filter_map(|f| faces.u32_at(f))
                .map(|n| n as usize)
                .sum()
        });
        let verify_topology = |topology: usize, vertex_count: usize| {
            self.topologies.get(topology).is_some_and(|t| {
                t.view(&self.face_start_edge, edge_count)
                    .verify(vertex_count)
            })
        };

        if !verify_topology(0, vertex_count) {
            return false;
        }
        for (buffer, &topology) in self.user_buffers.iter().zip(&self.user_topologies) {
            if let Some(buffer) = buffer {
                if !verify_topology(topology, buffer.len()) {
                    return false;
                }
            }
        }

        self.vertices.iter().flatten().all(|buffer| {
            (0..buffer.len()).all(|v| buffer.position(v).is_some_and(is_valid_position))
        })
    }

    /// Tests if `face` was flagged invalid for `time_step` by the last
    /// commit. Holes are always invalid.
    pub fn is_face_invalid(&self, face: Index, time_step: usize) -> bool {
        if time_step >= self.invalid_time_steps {
            return true;
        }
        self.invalid_faces
            .get(usize::from(face) * self.invalid_time_steps + time_step)
            .copied()
            .unwrap_or(true)
    }

    /// Returns the committed state of topology `id`.
    pub fn topology(&self, id: usize) -> Option<TopologyView<'_>> {
        self.topologies
            .get(id)
            .map(|topology| topology.view(&self.face_start_edge, self.edge_count))
    }

    #[inline]
    pub fn topology_count(&self) -> usize {
        self.topologies.len()
    }

    #[inline]
    pub fn time_step_count(&self) -> usize {
        self.vertices.len()
    }

    /// Returns the number of faces of the face buffer.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.as_ref().map_or(0, Buffer::len)
    }

    /// Returns the number of half-edges as of the last commit.
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Returns the first half-edge index of every face as of the last
    /// commit.
    #[inline]
    pub fn face_start_edges(&self) -> &[u32] {
        &self.face_start_edge
    }

    #[inline]
    pub fn commit_counter(&self) -> u64 {
        self.commit_counter
    }

    /// Returns the edge crease map, unless it was dropped after a commit of
    /// a static mesh.
    #[inline]
    pub fn edge_crease_map(&self) -> Option<&CreaseMap> {
        self.edge_crease_map.as_ref()
    }

    #[inline]
    pub fn vertex_crease_map(&self) -> Option<&CreaseMap> {
        self.vertex_crease_map.as_ref()
    }

    #[inline]
    pub fn hole_set(&self) -> Option<&HoleSet> {
        self.hole_set.as_ref()
    }

    /// Returns the capacity of the sort scratch of topology `id`, `0` once
    /// released.
    pub fn scratch_capacity(&self, id: usize) -> usize {
        self.topologies.get(id).map_or(0, Topology::scratch_capacity)
    }

    /// Returns the interpolation cache slots of a vertex or user vertex
    /// buffer.
    pub fn interpolation_slots(&self, ty: BufferType) -> Result<&InterpolationSlots> {
        ty.check()?;
        let slots = match ty {
            BufferType::Vertex(t) => self.vertex_slots.get(t as usize),
            BufferType::UserVertex(i) => self.user_slots.get(i as usize),
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "{} has no interpolation slots",
                    ty
                )))
            }
        };
        slots.ok_or_else(|| Error::InvalidOperation(format!("{} is not committed", ty)))
    }

    /// Counts the faces of topology 0 per patch type.
    pub fn patch_statistics(&self) -> PatchStatistics {
        let mut statistics = PatchStatistics::default();
        let Some(topology) = self.topology(0) else {
            return statistics;
        };
        for face in 0..topology.face_count() {
            let Some(edge) = topology.half_edge(face.into()) else {
                continue;
            };
            statistics.faces += 1;
            match edge.patch_type {
                PatchType::Bilinear => statistics.bilinear += 1,
                PatchType::RegularQuad => statistics.regular_quad += 1,
                PatchType::IrregularQuad => statistics.irregular_quad += 1,
                PatchType::Complex => statistics.complex += 1,
            }
        }
        statistics
    }

    /// Evaluates every float of buffer `ty` on `face` at `(u, v)`.
    ///
    /// The element is walked in groups of four floats. Each group is handed
    /// to `evaluator` together with its cache entry and the commit counter.
    pub fn interpolate(
        &self,
        evaluator: &dyn PatchEvaluator,
        face: Index,
        u: f32,
        v: f32,
        ty: BufferType,
    ) -> Result<Interpolated> {
        let topology = match ty {
            BufferType::Vertex(_) => 0,
            BufferType::UserVertex(i) => self.user_topologies.get(i as usize).copied().unwrap_or(0),
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "cannot interpolate {}",
                    ty
                )))
            }
        };
        let source = self.buffer(ty)?;
        let slots = self.interpolation_slots(ty)?;

        let face_index = usize::from(face);
        let half_edge = self
            .topology(topology)
            .and_then(|topology| topology.half_edge(face))
            .ok_or(Error::IndexOutOfBounds {
                index: face_index,
                max: self.face_start_edge.len(),
            })?;

        let floats = source.stride() / 4;
        let mut out = Interpolated {
            value: vec![0.0; floats],
            du: vec![0.0; floats],
            dv: vec![0.0; floats],
        };
        for group in 0..slots_per_face(source.stride()) {
            let entry = slots
                .get(face_index, group)
                .ok_or_else(|| Error::InvalidOperation(format!("{} is not committed", ty)))?;
            let first = group * FLOATS_PER_SLOT;
            let count = (floats - first).min(FLOATS_PER_SLOT);
            let GroupEval { value, du, dv } = evaluator.evaluate(PatchRequest {
                entry,
                commit_counter: self.commit_counter,
                half_edge,
                source,
                first_float: first,
                float_count: count,
                u,
                v,
            });
            out.value[first..first + count].copy_from_slice(&value[..count]);
            out.du[first..first + count].copy_from_slice(&du[..count]);
            out.dv[first..first + count].copy_from_slice(&dv[..count]);
        }
        Ok(out)
    }
}

#[inline]
fn is_valid_position(position: [f32; 3]) -> bool {
    position
        .iter()
        .all(|c| c.is_finite() && c.abs() < MAX_COORDINATE)
}

/// A face is invalid if it is a hole, refers to a missing or invalid vertex,
/// or repeats a vertex on consecutive corners.
fn face_is_invalid(
    layout: &FaceLayout<'_>,
    indices: Option<&Buffer>,
    vertices: Option<&Buffer>,
    holes: &HoleSet,
    face: usize,
) -> bool {
    if holes.contains(face as u32) {
        return true;
    }
    let (Some(indices), Some(vertices)) = (indices, vertices) else {
        return true;
    };
    let corners = layout.edges(face);
    if corners.is_empty() {
        return true;
    }

    let valid_corners = corners.clone().all(|e| {
        indices
            .u32_at(e)
            .and_then(|v| vertices.position(v as usize))
            .is_some_and(is_valid_position)
    });
    if !valid_corners {
        return true;
    }

    corners
        .map(|e| indices.u32_at(e))
        .circular_tuple_windows()
        .any(|(a, b)| a == b)
}
