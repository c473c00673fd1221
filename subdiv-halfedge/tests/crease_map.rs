//! Tests for crease maps and hole sets.

use subdiv_halfedge::{
    far::{edge_key, edge_key_vertices, CreaseMap, HoleSet},
    osd::Buffer,
    BufferType, MeshOptions,
};
use test_utils::*;

#[test]
fn test_edge_key_is_canonical() {
    assert_eq!(edge_key(3, 7), edge_key(7, 3));
    assert_eq!(edge_key(3, 7), (3u64 << 32) | 7);
    assert_eq!(edge_key_vertices(edge_key(9, 2)), (2, 9));
    assert_ne!(edge_key(0, 1), edge_key(1, 2));
    assert_eq!(edge_key(u32::MAX, 0), u32::MAX as u64);
}

#[test]
fn test_lookup_falls_back_to_default() {
    let map = CreaseMap::from_entries([(edge_key(0, 1), 2.5), (edge_key(4, 2), 1.0)]);

    assert_eq!(map.len(), 2);
    assert_eq!(map.lookup(edge_key(1, 0), 0.0), 2.5);
    assert_eq!(map.lookup(edge_key(2, 4), 0.0), 1.0);
    assert_eq!(map.lookup(edge_key(0, 2), 0.0), 0.0);
    assert_eq!(map.lookup(edge_key(0, 2), -1.0), -1.0);

    let empty = CreaseMap::default();
    assert!(empty.is_empty());
    assert_eq!(empty.lookup(0, 3.0), 3.0);
}

#[test]
fn test_last_duplicate_wins() {
    let pairs = Buffer::from_bytes(&pair_bytes(&[[0, 1], [5, 6], [1, 0]]), 0, 8, 3).unwrap();
    let weights = Buffer::from_f32(&[1.0, 2.0, 3.0], 1).unwrap();
    let map = CreaseMap::from_edge_buffers(&pairs, &weights);

    assert_eq!(map.len(), 2);
    assert_eq!(map.lookup(edge_key(0, 1), 0.0), 3.0);
    assert_eq!(map.lookup(edge_key(5, 6), 0.0), 2.0);

    let vertices = Buffer::from_u32(&[4, 4, 2]);
    let weights = Buffer::from_f32(&[1.0, 9.0, 0.5], 1).unwrap();
    let map = CreaseMap::from_vertex_buffers(&vertices, &weights);
    assert_eq!(map.to_vertex_arrays(), (vec![2, 4], vec![0.5, 9.0]));
}

#[test]
fn test_mismatched_buffer_lengths() {
    let pairs = Buffer::from_bytes(&pair_bytes(&[[0, 1], [1, 2], [2, 3]]), 0, 8, 3).unwrap();
    let weights = Buffer::from_f32(&[1.0, 2.0], 1).unwrap();
    let map = CreaseMap::from_edge_buffers(&pairs, &weights);

    assert_eq!(map.len(), 2);
    assert_eq!(map.lookup(edge_key(2, 3), 0.0), 0.0);
    assert_eq!(map.to_edge_arrays(), (vec![0, 1, 1, 2], vec![1.0, 2.0]));
}

#[test]
fn test_edge_crease_buffer_with_padding() {
    // Three words per element, the pair in the first two.
    let words: [u32; 6] = [3, 4, 0xdead, 1, 0, 0xbeef];
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_ne_bytes()).collect();
    let pairs = Buffer::from_bytes(&bytes, 0, 12, 2).unwrap();
    let weights = Buffer::from_f32(&[1.0, 2.0], 1).unwrap();
    let map = CreaseMap::from_edge_buffers(&pairs, &weights);

    assert_eq!(map.lookup(edge_key(4, 3), 0.0), 1.0);
    assert_eq!(map.lookup(edge_key(0, 1), 0.0), 2.0);
}

#[test]
fn test_hole_set() {
    let holes = HoleSet::from_buffer(&Buffer::from_u32(&[7, 2, 7, 0]));

    assert_eq!(holes.len(), 3);
    assert_eq!(holes.faces(), &[0, 2, 7]);
    assert!(holes.contains(2));
    assert!(!holes.contains(3));
    assert!(!HoleSet::default().contains(0));
}

#[test]
fn test_maps_follow_buffers() {
    let mut mesh = two_quads().mesh(MeshOptions::default());
    set_edge_creases(&mut mesh, &[[1, 4]], &[2.0]);
    set_vertex_creases(&mut mesh, &[0, 2], &[1.0, 4.0]);
    mesh.set_buffer_u32(BufferType::Hole, &[1]).unwrap();
    mesh.commit();

    assert_eq!(mesh.edge_crease_map().unwrap().lookup(edge_key(4, 1), 0.0), 2.0);
    assert_eq!(mesh.vertex_crease_map().unwrap().len(), 2);
    assert!(mesh.hole_set().unwrap().contains(1));

    // Editing a weight in place is picked up by the next commit.
    mesh.buffer_mut(BufferType::EdgeCreaseWeight)
        .unwrap()
        .as_f32_mut()[0] = 5.0;
    mesh.commit();
    assert_eq!(mesh.edge_crease_map().unwrap().lookup(edge_key(1, 4), 0.0), 5.0);
}

#[test]
fn test_serialized_maps_rebuild_the_same_mesh() -> anyhow::Result<()> {
    let fixture = grid(3, 2);
    let mut mesh = fixture.mesh(MeshOptions::default());
    set_edge_creases(&mut mesh, &[[1, 5], [5, 6], [6, 10]], &[1.0, 2.0, 3.0]);
    set_vertex_creases(&mut mesh, &[6], &[0.5]);
    mesh.set_buffer_u32(BufferType::Hole, &[5])?;
    mesh.commit();

    let edge_json = serde_json::to_string(mesh.edge_crease_map().unwrap())?;
    let vertex_json = serde_json::to_string(mesh.vertex_crease_map().unwrap())?;
    let hole_json = serde_json::to_string(mesh.hole_set().unwrap())?;

    let edges: CreaseMap = serde_json::from_str(&edge_json)?;
    let vertices: CreaseMap = serde_json::from_str(&vertex_json)?;
    let holes: HoleSet = serde_json::from_str(&hole_json)?;
    assert_eq!(&edges, mesh.edge_crease_map().unwrap());

    let mut rebuilt = fixture.mesh(MeshOptions::default());
    let (pairs, weights) = edges.to_edge_arrays();
    mesh_pairs(&pairs)
        .iter()
        .for_each(|pair| assert!(pair[0] < pair[1]));
    set_edge_creases(&mut rebuilt, &mesh_pairs(&pairs), &weights);
    let (corners, weights) = vertices.to_vertex_arrays();
    set_vertex_creases(&mut rebuilt, &corners, &weights);
    rebuilt.set_buffer_u32(BufferType::Hole, holes.faces())?;
    rebuilt.commit();

    assert_eq!(half_edges(&rebuilt, 0), half_edges(&mesh, 0));
    Ok(())
}

fn mesh_pairs(flat: &[u32]) -> Vec<[u32; 2]> {
    flat.chunks_exact(2).map(|c| [c[0], c[1]]).collect()
}
