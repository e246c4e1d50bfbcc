//! Allocation lifecycle: cluster growth and destruction, the free list,
//! and whole-context reset.

use rstest::rstest;
use kv3::{Context, ContextOptions, NodeHandle, CLUSTER_CAPACITY};

fn sorted(mut ids: Vec<u32>) -> Vec<u32> {
    ids.sort_unstable();
    ids
}

#[rstest]
fn test_base_cluster_only_until_capacity() {
    let mut ctx = Context::new();
    assert_eq!(ctx.node_cluster_count(), 1);
    assert_eq!(ctx.live_node_count(), 1); // the root

    // Fill the base cluster to the brim.
    for _ in 0..CLUSTER_CAPACITY - 1 {
        ctx.alloc_node();
    }
    assert_eq!(ctx.node_cluster_count(), 1);
    assert_eq!(ctx.node_free_list(), Vec::<u32>::new());

    // One more spills into a second cluster.
    ctx.alloc_node();
    assert_eq!(ctx.node_cluster_count(), 2);
    assert_eq!(ctx.node_free_list(), vec![1]);
}

#[rstest]
fn test_emptied_auxiliary_cluster_is_destroyed() {
    let mut ctx = Context::new();
    let mut spill: Vec<NodeHandle> = Vec::new();
    for _ in 0..CLUSTER_CAPACITY + 10 {
        spill.push(ctx.alloc_node());
    }
    assert_eq!(ctx.node_cluster_count(), 2);

    // Free everything that landed in the second cluster.
    for handle in spill.drain(..) {
        ctx.free_node(handle);
    }
    assert_eq!(ctx.node_cluster_count(), 1);
    assert_eq!(ctx.node_free_list(), vec![0]);
    assert_eq!(ctx.live_node_count(), 1);
}

#[rstest]
fn test_free_list_matches_occupancy_masks() {
    let mut ctx = Context::new();
    let mut handles = Vec::new();
    for _ in 0..CLUSTER_CAPACITY * 3 {
        handles.push(ctx.alloc_node());
    }
    // Punch holes across all clusters.
    for handle in handles.iter().step_by(7) {
        ctx.free_node(*handle);
    }

    assert_eq!(
        sorted(ctx.node_free_list()),
        sorted(ctx.node_non_full_clusters())
    );
}

#[rstest]
fn test_full_cluster_relinks_on_first_free() {
    let mut ctx = Context::new();
    let mut handles = Vec::new();
    for _ in 0..CLUSTER_CAPACITY - 1 {
        handles.push(ctx.alloc_node());
    }
    // Base cluster full, nothing on the free list.
    assert!(ctx.node_free_list().is_empty());

    ctx.free_node(handles[5]);
    assert_eq!(ctx.node_free_list(), vec![0]);

    // The reopened slot is handed out again.
    let reused = ctx.alloc_node();
    assert_eq!(reused, handles[5]);
}

#[rstest]
fn test_freed_slot_reads_as_dangling() {
    let mut ctx = Context::new();
    let node = ctx.alloc_node();
    ctx.node_mut(node).set_i32(9);
    ctx.free_node(node);
    assert!(ctx.try_node(node).is_none());
}

#[rstest]
fn test_clear_keeps_slabs_and_restores_root() {
    let mut ctx = Context::new();
    let root = ctx.root();
    for _ in 0..CLUSTER_CAPACITY * 2 {
        ctx.alloc_node();
    }
    ctx.find_or_create_member(root, "key");
    let clusters_before = ctx.node_cluster_count();

    ctx.clear();
    assert_eq!(ctx.node_cluster_count(), clusters_before);
    assert_eq!(ctx.live_node_count(), 1);
    assert!(ctx.node(ctx.root()).is_null());
    assert_eq!(
        sorted(ctx.node_free_list()),
        (0..clusters_before as u32).collect::<Vec<_>>()
    );

    // Clearing twice is the same as clearing once.
    ctx.clear();
    assert_eq!(ctx.live_node_count(), 1);

    // And the context is fully usable afterwards.
    let (member, _) = ctx.find_or_create_member(ctx.root(), "fresh");
    ctx.node_mut(member).set_bool(true);
    assert!(ctx.node(member).get_bool(false));
}

#[rstest]
fn test_purge_releases_auxiliary_clusters() {
    let mut ctx = Context::new();
    for _ in 0..CLUSTER_CAPACITY * 2 {
        ctx.alloc_node();
    }
    assert!(ctx.node_cluster_count() > 1);

    ctx.purge();
    assert_eq!(ctx.node_cluster_count(), 1);
    assert_eq!(ctx.live_node_count(), 1);

    // Growth starts over cleanly.
    for _ in 0..CLUSTER_CAPACITY {
        ctx.alloc_node();
    }
    assert_eq!(ctx.node_cluster_count(), 2);
}

#[rstest]
fn test_container_clusters_follow_their_payloads() {
    let mut ctx = Context::new();
    let root = ctx.root();
    assert_eq!(ctx.array_cluster_count(), 1);
    assert_eq!(ctx.table_cluster_count(), 1);

    for i in 0..CLUSTER_CAPACITY + 5 {
        let (member, _) = ctx.find_or_create_member(root, &format!("m{i}"));
        ctx.set_to_empty_table(member);
    }
    assert!(ctx.table_cluster_count() > 1);

    ctx.set_to_null(root);
    assert_eq!(ctx.table_cluster_count(), 1);
    assert_eq!(ctx.live_node_count(), 1);
}

#[rstest]
#[should_panic(expected = "root")]
fn test_pool_context_has_no_root() {
    let ctx = Context::with_options(ContextOptions::new().with_root(false));
    let _ = ctx.root();
}
