//! Tests that in-place updates agree with full rebuilds.

use subdiv_halfedge::{
    far::{BoundaryMode, TopologyAction, UpdateFlags, VertexType, INFINITE_CREASE},
    BufferType, Mesh, MeshOptions,
};
use test_utils::*;

/// Forces a rebuild of every topology and checks that it reproduces the
/// half-edges of the previous commit.
fn assert_update_matches_rebuild(mesh: &mut Mesh) {
    let updated: Vec<_> = (0..mesh.topology_count())
        .map(|t| half_edges(mesh, t))
        .collect();

    mesh.mark_all_modified();
    let report = mesh.commit();
    assert!(report
        .actions
        .iter()
        .all(|action| *action == TopologyAction::Rebuild));

    for (t, expected) in updated.iter().enumerate() {
        assert_eq!(&half_edges(mesh, t), expected, "topology {t}");
    }
}

fn only(flags: UpdateFlags) -> Vec<TopologyAction> {
    vec![TopologyAction::Update(flags)]
}

#[test]
fn test_edge_crease_update() {
    let mut mesh = grid(4, 4).mesh(MeshOptions::default());
    set_edge_creases(&mut mesh, &[[6, 7]], &[1.0]);
    mesh.commit();

    // Border edge 0-1 stays infinitely sharp.
    set_edge_creases(&mut mesh, &[[6, 7], [7, 12], [0, 1]], &[0.0, 2.5, 1.0]);
    let report = mesh.commit();
    assert_eq!(
        report.actions,
        only(UpdateFlags {
            edge_creases: true,
            ..Default::default()
        })
    );

    let edges = half_edges(&mesh, 0);
    assert_eq!(edges[0].edge_crease_weight, INFINITE_CREASE);
    assert!(edges
        .iter()
        .any(|e| e.vertex_index == 7 && e.edge_crease_weight == 2.5));
    assert!(edges
        .iter()
        .all(|e| e.edge_crease_weight == 0.0
            || e.edge_crease_weight == 2.5
            || e.edge_crease_weight == INFINITE_CREASE));

    assert_update_matches_rebuild(&mut mesh);
}

#[test]
fn test_vertex_crease_update() {
    let mut mesh = grid(3, 3).mesh(MeshOptions::default());
    mesh.commit();

    set_vertex_creases(&mut mesh, &[5, 0, 6], &[1.0, 2.0, INFINITE_CREASE]);
    let report = mesh.commit();
    assert_eq!(
        report.actions,
        only(UpdateFlags {
            vertex_creases: true,
            ..Default::default()
        })
    );

    for edge in half_edges(&mesh, 0) {
        let expected = match edge.vertex_index {
            5 => 1.0,
            0 => 2.0,
            6 => INFINITE_CREASE,
            _ => 0.0,
        };
        assert_eq!(edge.vertex_crease_weight, expected);
    }
    assert_update_matches_rebuild(&mut mesh);

    // Clearing the weights reclassifies everything as regular again.
    mesh.buffer_mut(BufferType::VertexCreaseWeight)
        .unwrap()
        .as_f32_mut()
        .fill(0.0);
    mesh.commit();
    assert_eq!(mesh.patch_statistics().regular_quad, 9);
    assert_update_matches_rebuild(&mut mesh);
}

#[test]
fn test_mode_changes() {
    let mut mesh = grid(3, 3).mesh(MeshOptions::default());
    set_edge_creases(&mut mesh, &[[5, 6]], &[1.0]);
    set_vertex_creases(&mut mesh, &[10], &[0.5]);
    mesh.commit();

    for mode in [
        BoundaryMode::PinBoundary,
        BoundaryMode::PinAll,
        BoundaryMode::PinCorners,
        BoundaryMode::SmoothBoundary,
        BoundaryMode::PinAll,
    ] {
        mesh.set_subdivision_mode(0, mode).unwrap();
        let report = mesh.commit();
        assert_eq!(
            report.actions,
            only(UpdateFlags {
                edge_creases: true,
                vertex_creases: true,
                levels: false,
            }),
            "{mode}"
        );
        assert_eq!(mesh.topology(0).unwrap().subdivision_mode(), mode);
        assert_update_matches_rebuild(&mut mesh);
    }

    // Setting the same mode again changes nothing.
    mesh.set_subdivision_mode(0, BoundaryMode::PinAll).unwrap();
    let report = mesh.commit();
    assert_eq!(report.actions, vec![TopologyAction::Skip]);
}

#[test]
fn test_hole_change_rebuilds() {
    let mut mesh = grid(3, 3).mesh(MeshOptions::default());
    set_edge_creases(&mut mesh, &[[5, 6], [9, 10]], &[1.0, 2.0]);
    mesh.commit();
    let counter = mesh.commit_counter();

    mesh.set_buffer_u32(BufferType::Hole, &[4]).unwrap();
    let report = mesh.commit();
    assert_eq!(report.actions, vec![TopologyAction::Rebuild]);
    assert_eq!(mesh.commit_counter(), counter + 1);

    let topology = mesh.topology(0).unwrap();
    let hole = topology.half_edge(4u32.into()).unwrap();
    assert!(hole.face_edges().all(|e| !e.has_opposite()));
    assert!(mesh.is_face_invalid(4u32.into(), 0));

    // Holes keep the crease lookups of their own edges.
    set_edge_creases(&mut mesh, &[[5, 6], [9, 10]], &[3.0, 4.0]);
    mesh.commit();
    let topology = mesh.topology(0).unwrap();
    let hole = topology.half_edge(4u32.into()).unwrap();
    assert_eq!(hole.edge_crease_weight, 3.0);
    assert_update_matches_rebuild(&mut mesh);
}

#[test]
fn test_levels_only() {
    let mut mesh = two_quads().mesh(MeshOptions::default());
    set_edge_creases(&mut mesh, &[[1, 4]], &[1.0]);
    mesh.commit();
    let counter = mesh.commit_counter();
    let before = half_edges(&mesh, 0);

    mesh.set_buffer_f32(BufferType::Level, &[3.0; 8], 1).unwrap();
    let report = mesh.commit();
    assert_eq!(
        report.actions,
        only(UpdateFlags {
            levels: true,
            ..Default::default()
        })
    );
    assert_eq!(mesh.commit_counter(), counter);

    let after = half_edges(&mesh, 0);
    for (old, new) in before.iter().zip(&after) {
        assert_eq!(new.edge_level, 3.0);
        assert_eq!(new.edge_crease_weight, old.edge_crease_weight);
        assert_eq!(new.patch_type, old.patch_type);
    }
    assert_update_matches_rebuild(&mut mesh);
}

#[test]
fn test_tessellation_rate() {
    let mut mesh = two_quads().mesh(MeshOptions::default());
    mesh.commit();
    let counter = mesh.commit_counter();

    mesh.set_tessellation_rate(6.0);
    assert_eq!(mesh.tessellation_rate(), 6.0);
    let report = mesh.commit();
    assert_eq!(
        report.actions,
        only(UpdateFlags {
            levels: true,
            ..Default::default()
        })
    );
    assert_eq!(mesh.commit_counter(), counter);
    assert!(half_edges(&mesh, 0).iter().all(|e| e.edge_level == 6.0));

    mesh.set_tessellation_rate(0.0);
    mesh.commit();
    assert!(half_edges(&mesh, 0).iter().all(|e| e.edge_level == 1.0));
}

#[test]
fn test_non_manifold_pins_survive_updates() {
    let mut mesh = three_quads_sharing_edge().mesh(MeshOptions::default());
    mesh.commit();

    set_edge_creases(&mut mesh, &[[0, 1]], &[1.0]);
    set_vertex_creases(&mut mesh, &[0, 1, 2], &[0.5, 0.5, 0.5]);
    mesh.commit();

    for edge in half_edges(&mesh, 0) {
        if edge.vertex_type == VertexType::NonManifold {
            assert_eq!(edge.edge_crease_weight, INFINITE_CREASE);
            assert_eq!(edge.vertex_crease_weight, INFINITE_CREASE);
        } else if edge.vertex_index == 2 {
            assert_eq!(edge.vertex_crease_weight, 0.5);
        }
    }
    assert_update_matches_rebuild(&mut mesh);
}

#[test]
fn test_primary_indices_refresh_secondary_topologies() {
    let fixture = two_quads();
    let mut mesh = fixture.mesh(MeshOptions::default());
    mesh.set_buffer_u32(BufferType::Index(1), &fixture.indices)
        .unwrap();
    set_edge_creases(&mut mesh, &[[1, 4]], &[2.0]);
    let report = mesh.commit();
    assert_eq!(
        report.actions,
        vec![TopologyAction::Rebuild, TopologyAction::Rebuild]
    );

    // Touch topology 0's indices only.
    mesh.buffer_mut(BufferType::Index(0)).unwrap().as_u32_mut();
    let report = mesh.commit();
    assert_eq!(
        report.actions,
        vec![
            TopologyAction::Rebuild,
            TopologyAction::Update(UpdateFlags {
                edge_creases: true,
                vertex_creases: true,
                levels: false,
            }),
        ]
    );
    assert_eq!(half_edges(&mesh, 1), half_edges(&mesh, 0));

    // And topology 1's only.
    mesh.buffer_mut(BufferType::Index(1)).unwrap().as_u32_mut();
    let report = mesh.commit();
    assert_eq!(
        report.actions,
        vec![TopologyAction::Skip, TopologyAction::Rebuild]
    );
    assert_update_matches_rebuild(&mut mesh);
}

#[test]
fn test_nothing_changed() {
    let mut mesh = grid(2, 2).committed(4096);
    let counter = mesh.commit_counter();
    let before = half_edges(&mesh, 0);

    let report = mesh.commit();
    assert!(report.changes.is_empty());
    assert_eq!(report.actions, vec![TopologyAction::Skip]);
    assert_eq!(mesh.commit_counter(), counter);
    assert_eq!(half_edges(&mesh, 0), before);
}

#[test]
fn test_moving_vertices_keeps_topology() {
    let mut mesh = grid(2, 2).committed(4096);
    let counter = mesh.commit_counter();

    mesh.buffer_mut(BufferType::Vertex(0)).unwrap().as_f32_mut()[2] = 1.0;
    let report = mesh.commit();
    assert_eq!(report.actions, vec![TopologyAction::Skip]);
    assert_eq!(mesh.commit_counter(), counter + 1);
}
