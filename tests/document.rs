//! Building and editing a document tree through the public surface:
//! scalars, strings, containers, aggregates, and metadata.

use rstest::rstest;
use kv3::{Color32, Context, ContextOptions, Kind, SubType, Vec3};

#[rstest]
fn test_nested_document_construction() {
    let mut ctx = Context::new();
    let root = ctx.root();

    let (name, _) = ctx.find_or_create_member(root, "name");
    ctx.node_mut(name).set_string("turret_base");

    let (origin, _) = ctx.find_or_create_member(root, "origin");
    ctx.set_vec3(origin, Vec3::new(16.0, -32.0, 0.0));

    let (children, _) = ctx.find_or_create_member(root, "children");
    for i in 0..3 {
        let child = ctx.array_append(children);
        let (id, _) = ctx.find_or_create_member(child, "id");
        ctx.node_mut(id).set_i32(i);
    }

    assert_eq!(ctx.node(root).kind(), Kind::Table);
    assert_eq!(ctx.member_count(root), 3);
    assert_eq!(ctx.array_len(children), 3);

    let second = ctx.array_element(children, 1).unwrap();
    let id = ctx.find_member(second, "id").unwrap();
    assert_eq!(ctx.node(id).get_i32(-1), 1);

    assert_eq!(
        ctx.get_vec3(origin, Vec3::default()),
        Vec3::new(16.0, -32.0, 0.0)
    );
}

#[rstest]
fn test_retyping_replaces_payload() {
    let mut ctx = Context::new();
    let root = ctx.root();

    ctx.find_or_create_member(root, "a");
    assert_eq!(ctx.node(root).kind(), Kind::Table);

    // A scalar write through the typed setter wipes the membership.
    ctx.set_to_null(root);
    ctx.node_mut(root).set_f64(0.5);
    assert_eq!(ctx.node(root).kind(), Kind::Double);
    assert_eq!(ctx.member_count(root), 0);
    assert_eq!(ctx.live_node_count(), 1);
}

#[rstest]
fn test_string_growth_and_defaults() {
    let mut ctx = Context::new();
    let root = ctx.root();

    ctx.node_mut(root).set_string("tiny");
    assert!(ctx.node(root).is_string_inline());

    ctx.node_mut(root)
        .set_string("long enough to leave the inline buffer behind");
    assert!(!ctx.node(root).is_string_inline());
    assert_eq!(
        ctx.node(root).get_string_or("fallback"),
        "long enough to leave the inline buffer behind"
    );

    ctx.set_to_null(root);
    assert_eq!(ctx.node(root).get_string_or("fallback"), "fallback");
}

#[rstest]
fn test_color_and_vector_share_array_representation() {
    let mut ctx = Context::new();
    let root = ctx.root();

    ctx.set_color(root, Color32::new(255, 128, 0, 255));
    assert_eq!(ctx.node(root).subtype(), SubType::Color32);
    assert_eq!(ctx.node(root).kind(), Kind::Array);

    // The same three numbers read back as integers.
    let mut rgb = [0i32; 3];
    assert!(ctx.read_array_i32(root, &mut rgb));
    assert_eq!(rgb, [255, 128, 0]);
}

#[rstest]
fn test_normalized_array_keeps_aggregate_subtype() {
    let mut ctx = Context::new();
    let root = ctx.root();
    ctx.set_vec3(root, Vec3::new(1.0, 2.0, 3.0));

    // Element access forces the full representation.
    let y = ctx.array_element(root, 1).unwrap();
    assert_eq!(ctx.node(y).get_f32(0.0), 2.0);
    assert_eq!(ctx.node(root).subtype(), SubType::Vector);

    // And the aggregate still reads back.
    assert_eq!(
        ctx.get_vec3(root, Vec3::default()),
        Vec3::new(1.0, 2.0, 3.0)
    );
}

#[rstest]
fn test_deep_copy_detaches_subtree() {
    let mut ctx = Context::new();
    let root = ctx.root();
    let (src, _) = ctx.find_or_create_member(root, "template");
    let (hp, _) = ctx.find_or_create_member(src, "health");
    ctx.node_mut(hp).set_i32(100);

    let (dst, _) = ctx.find_or_create_member(root, "instance");
    ctx.copy_node(dst, src);

    let copied_hp = ctx.find_member(dst, "health").unwrap();
    ctx.node_mut(copied_hp).set_i32(25);
    assert_eq!(ctx.node(hp).get_i32(0), 100);
    assert_eq!(ctx.node(copied_hp).get_i32(0), 25);
}

#[rstest]
fn test_metadata_records_per_node() {
    let mut ctx = Context::with_options(ContextOptions::new().with_metadata(true));
    let root = ctx.root();
    let (member, _) = ctx.find_or_create_member(root, "commented");

    {
        let meta = ctx.metadata_mut(member).unwrap();
        meta.line = 42;
        meta.column = 7;
        meta.comments.insert(41, "// above the value".to_string());
    }

    assert_eq!(ctx.metadata(member).unwrap().line, 42);
    assert!(ctx.metadata(root).unwrap().is_empty());

    // Copies carry the record along.
    let target = ctx.alloc_node();
    ctx.copy_node(target, member);
    let copied = ctx.metadata(target).unwrap();
    assert_eq!(copied.line, 42);
    assert_eq!(copied.comments.get(&41).map(String::as_str), Some("// above the value"));

    // Freeing wipes it for the next occupant.
    ctx.free_node(target);
    let fresh = ctx.alloc_node();
    assert_eq!(fresh, target);
    assert!(ctx.metadata(fresh).unwrap().is_empty());
}

#[rstest]
fn test_metadata_disabled_context_returns_none() {
    let mut ctx = Context::new();
    let root = ctx.root();
    assert!(ctx.metadata(root).is_none());
    assert!(ctx.metadata_mut(root).is_none());

    ctx.enable_metadata(true);
    assert!(ctx.metadata(root).is_some());
}

#[rstest]
fn test_interned_names_share_storage() {
    let mut ctx = Context::new();
    let a = ctx.intern("position");
    let b = ctx.intern("position");
    assert_eq!(a, b);

    let root = ctx.root();
    for _ in 0..2 {
        ctx.find_or_create_member(root, "position");
    }
    assert_eq!(ctx.member_count(root), 1);
}
