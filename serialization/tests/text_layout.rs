//! Exact shape of text archives.

mod common;

use std::sync::Arc;

use common::*;
use redlilium_serialization::{
    Archive, DeserializeOptions, Details, Node, OutputOptions, TextFormat, TextInputArchive,
    TextOutputArchive, format, share,
};

fn dump_json(root: &redlilium_serialization::ObjectHandle) -> String {
    let mut ar = TextOutputArchive::new(OutputOptions::default());
    ar.start(root).expect("start");
    let bytes = ar.dump_to(TextFormat::Json).expect("encode");
    String::from_utf8(bytes).expect("utf-8")
}

#[test]
fn lone_root_is_a_single_map() {
    init_logging();
    let json = dump_json(&share(Point { x: 1.0, y: 2.0 }));
    assert_eq!(json, r#"{"__type__":"Point","x":1.0,"y":2.0}"#);
}

#[test]
fn shared_object_gets_one_slot() {
    init_logging();
    let shared = share(Shared { value: 7 });
    let json = dump_json(&share(Holder {
        a: Some(shared.clone()),
        b: Some(shared),
    }));
    assert_eq!(
        json,
        r#"[{"__type__":"Holder","a":{"__id__":1},"b":{"__id__":1}},{"__type__":"Shared","value":7}]"#
    );
}

#[test]
fn slots_follow_first_write_order() {
    init_logging();
    let first = share(Shared { value: 1 });
    let second = share(Shared { value: 2 });
    let json = dump_json(&share(Wrapper {
        group: Some(share(Group {
            members: Some(vec![Some(second.clone()), None, Some(first.clone())]),
        })),
        direct: Some(first),
    }));
    assert_eq!(
        json,
        concat!(
            r#"[{"__type__":"Wrapper","group":{"__type__":"Group","members":[{"__id__":1},null,{"__id__":2}]},"direct":{"__id__":2}},"#,
            r#"{"__type__":"Shared","value":2},"#,
            r#"{"__type__":"Shared","value":1}]"#
        )
    );
}

#[test]
fn back_reference_to_root_is_id_zero() {
    init_logging();
    let root = share(SceneNode::default());
    let child = share(SceneNode {
        parent: Some(root.clone()),
        ..Default::default()
    });
    root.lock()
        .downcast_mut::<SceneNode>()
        .expect("SceneNode")
        .children = Some(vec![Some(child)]);

    let mut ar = TextOutputArchive::new(OutputOptions::default());
    ar.start(&root).expect("start");
    let doc = ar.dump();
    let Node::List(slots) = &doc else {
        panic!("expected a slot list");
    };
    assert_eq!(slots.len(), 2);
    assert_eq!(
        slots[0].get("children"),
        Some(&Node::List(vec![Node::object_ref(1)]))
    );
    assert_eq!(slots[1].get("parent"), Some(&Node::object_ref(0)));

    root.lock().downcast_mut::<SceneNode>().expect("SceneNode").children = None;
}

#[test]
fn external_reference_marker() {
    init_logging();
    let json = dump_json(&share(Material {
        name: "brick".into(),
        texture: Some(share(Texture {
            uuid: "abc123".into(),
            width: 256,
        })),
        tint: Some(share(Vec3 {
            x: 1.0,
            y: 0.5,
            z: 0.0,
        })),
    }));
    assert_eq!(
        json,
        concat!(
            r#"{"__type__":"Material","name":"brick","#,
            r#""texture":{"__uuid__":"abc123","__expectedType__":"Texture"},"#,
            r#""tint":{"__type__":"Vec3","x":1.0,"y":0.5,"z":0.0}}"#
        )
    );
}

#[test]
fn handwritten_document_with_missing_fields() {
    init_logging();
    let doc = format::decode(
        br#"[{"__type__":"Holder","b":{"__id__":1}},{"__type__":"Point","x":4}]"#,
        TextFormat::Json,
    )
    .expect("decode");

    let mut details = Details::new();
    let mut options = DeserializeOptions::new(&find_class);
    let mut ar = TextInputArchive::new(doc, &mut details, &mut options);
    assert!(ar.is_reading());
    assert!(!ar.is_binary());
    let root = ar.start().expect("start").expect("root");

    let (a, b) = with::<Holder, _>(&root, |h| (h.a.clone(), h.b.clone()));
    assert!(a.is_none());
    with::<Point, _>(&b.expect("b"), |p| {
        assert_eq!(p.x, 4.0);
        assert_eq!(p.y, 0.0);
    });
}

#[test]
fn start_into_fills_an_existing_root() {
    init_logging();
    let doc = Node::Map(vec![
        ("__type__".into(), Node::String("Point".into())),
        ("y".into(), Node::F64(9.0)),
    ]);
    let root = share(Point { x: 5.0, y: 0.0 });

    let mut details = Details::new();
    let mut options = DeserializeOptions::new(&find_class);
    TextInputArchive::new(doc, &mut details, &mut options)
        .start_into(&root)
        .expect("start_into");
    with::<Point, _>(&root, |p| assert_eq!((p.x, p.y), (5.0, 9.0)));
}

#[test]
fn start_into_keeps_existing_children() {
    init_logging();
    let doc = format::decode(
        br#"[{"__type__":"Holder","a":{"__id__":1},"b":{"__id__":2}},{"__type__":"Shared","value":7},{"__type__":"Shared","value":8}]"#,
        TextFormat::Json,
    )
    .expect("decode");
    let kept = share(Shared { value: 1 });
    let replaced = share(Point::default());
    let root = share(Holder {
        a: Some(kept.clone()),
        b: Some(replaced.clone()),
    });

    let mut details = Details::new();
    let mut options = DeserializeOptions::new(&find_class);
    TextInputArchive::new(doc, &mut details, &mut options)
        .start_into(&root)
        .expect("start_into");

    let (a, b) = with::<Holder, _>(&root, |h| (h.a.clone(), h.b.clone()));
    let a = a.expect("a");
    assert!(Arc::ptr_eq(&a, &kept));
    with::<Shared, _>(&kept, |s| assert_eq!(s.value, 7));

    // A child of another class is replaced by a fresh instance.
    let b = b.expect("b");
    assert!(!Arc::ptr_eq(&b, &replaced));
    with::<Shared, _>(&b, |s| assert_eq!(s.value, 8));
}

#[test]
fn start_into_keeps_existing_array_elements() {
    init_logging();
    let doc = format::decode(
        br#"[{"__type__":"SceneNode","children":[{"__id__":1},null]},{"__type__":"SceneNode","name":"kept"}]"#,
        TextFormat::Json,
    )
    .expect("decode");
    let child = share(SceneNode::default());
    let root = share(SceneNode {
        children: Some(vec![Some(child.clone()), Some(share(SceneNode::default()))]),
        ..SceneNode::default()
    });

    let mut details = Details::new();
    let mut options = DeserializeOptions::new(&find_class);
    TextInputArchive::new(doc, &mut details, &mut options)
        .start_into(&root)
        .expect("start_into");

    let children = with::<SceneNode, _>(&root, |n| n.children.clone()).expect("children");
    assert_eq!(children.len(), 2);
    assert!(Arc::ptr_eq(children[0].as_ref().expect("first"), &child));
    assert!(children[1].is_none());
    with::<SceneNode, _>(&child, |n| assert_eq!(n.name, "kept"));
}
