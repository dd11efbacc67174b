mod common;

use std::fs;

use serde_json::json;

use git_store::object::{id_for, Attribution, Kind};
use git_store::{Config, Entry, Error, Node, Store, Value};

#[test]
fn put_object_is_idempotent() {
    let (_dir, store) = common::temp_store();

    let id = store.put_object(Kind::Blob, b"a").unwrap();
    assert_eq!(id.to_string(), "2e65efe2a145dda7ee51d1741299f848e5bf752e");

    let path = store.object_path(&id);
    let written = fs::read(&path).unwrap();
    assert_eq!(store.put_object(Kind::Blob, b"a").unwrap(), id);
    assert_eq!(fs::read(&path).unwrap(), written);

    let object = store.get_object(&id).unwrap();
    assert_eq!(object.kind(), Kind::Blob);
    assert_eq!(object.content(), b"a");
}

#[test]
fn missing_object() {
    let (_dir, store) = common::temp_store();
    let id = id_for(Kind::Blob, b"absent");
    match store.get_object(&id).unwrap_err() {
        Error::ObjectNotFound(missing) => assert_eq!(missing, id),
        err => panic!("Unexpected error {:?}", err),
    }
}

#[test]
fn auto_vivifies_intermediate_trees() {
    let (_dir, mut store) = common::temp_store();
    store.set("new/tree/leaf", "v").unwrap();

    assert_eq!(store.get("new/tree/leaf").unwrap().unwrap(), "v");
    assert!(matches!(store.get("new").unwrap(), Some(Entry::Tree(_))));
    assert!(matches!(store.get("new/tree").unwrap(), Some(Entry::Tree(_))));
    assert!(store.get("new/other").unwrap().is_none());
    assert!(store.get("new/tree/leaf/deeper").unwrap().is_none());
}

#[test]
fn writing_through_a_value_fails() {
    let (_dir, mut store) = common::temp_store();
    store.set("a", "v").unwrap();

    match store.set("a/b", "w").unwrap_err() {
        Error::NotATree(path) => assert_eq!(path, "a"),
        err => panic!("Unexpected error {:?}", err),
    }
}

#[test]
fn invalid_paths() {
    let (_dir, mut store) = common::temp_store();
    for path in &["", "/abs", "a//b", "a/../b", ".git/config", "a/"] {
        match store.set(path, "x").unwrap_err() {
            Error::InvalidPath { .. } => (),
            err => panic!("Unexpected error {:?} for {:?}", err, path),
        }
    }
}

#[test]
fn unmodified_tree_write_touches_nothing() {
    let (dir, mut store) = common::temp_store();
    store.set("a/b/c", "1").unwrap();
    store.set("d", "2").unwrap();
    store.commit("first").unwrap();
    let tree = store.head().unwrap().tree();

    // Any attempt to store an object would now fail.
    let objects = dir.path().join(".git/objects");
    fs::rename(&objects, dir.path().join("objects.moved")).unwrap();
    fs::write(&objects, b"sand in the gears").unwrap();

    assert!(!store.is_modified());
    assert_eq!(store.root_mut().write().unwrap(), tree);
}

#[test]
fn delete_only_touches_its_path() {
    let (_dir, mut store) = common::temp_store();
    store.set("x/keep", "1").unwrap();
    store.set("x/drop", "2").unwrap();
    store.set("y/other", "3").unwrap();
    store.commit("first").unwrap();

    let y_before = match store.get("y").unwrap() {
        Some(Entry::Tree(tree)) => tree.id(),
        other => panic!("Unexpected entry {:?}", other),
    };

    match store.delete("x/drop").unwrap() {
        Some(Node::Blob(mut blob)) => assert_eq!(blob.data().unwrap(), b"2"),
        other => panic!("Unexpected node {:?}", other),
    }
    assert!(store.delete("x/drop").unwrap().is_none());
    assert!(store.get("x/drop").unwrap().is_none());
    assert_eq!(store.get("x/keep").unwrap().unwrap(), "1");

    match store.get("y").unwrap() {
        Some(Entry::Tree(tree)) => {
            assert_eq!(tree.id(), y_before);
            assert!(!tree.is_modified());
        }
        other => panic!("Unexpected entry {:?}", other),
    }
    assert!(store.is_modified());
}

#[test]
fn identical_content_is_stored_once() {
    let (_dir, mut store) = common::temp_store();
    store.set("one/value", "same").unwrap();
    store.set("two/value", "same").unwrap();
    store.commit("dedup").unwrap();

    let a = match store.get("one").unwrap() {
        Some(Entry::Tree(tree)) => tree.id(),
        other => panic!("Unexpected entry {:?}", other),
    };
    let b = match store.get("two").unwrap() {
        Some(Entry::Tree(tree)) => tree.id(),
        other => panic!("Unexpected entry {:?}", other),
    };
    assert_eq!(a, b);
}

#[test]
fn commit_as_records_identities() {
    let (_dir, mut store) = common::temp_store();
    let author = Attribution::new("A U Thor", "author@example.com", 1_600_000_000, 60);
    let committer = Attribution::new("C O Mitter", "committer@example.com", 1_600_000_100, -300);

    store.set("k", "v").unwrap();
    let id = store
        .commit_as("hello", author.clone(), committer.clone())
        .unwrap();

    let object = store.get_object(&id).unwrap();
    assert_eq!(object.kind(), Kind::Commit);
    let text = String::from_utf8(object.into_content()).unwrap();
    assert_eq!(
        text,
        format!(
            "tree {}\nauthor A U Thor <author@example.com> 1600000000 +0100\ncommitter C O Mitter <committer@example.com> 1600000100 -0500\n\nhello",
            store.head().unwrap().tree()
        )
    );
}

#[test]
fn codecs_follow_extension() {
    let (dir, mut store) = common::temp_store();
    store.set("doc.yml", json!({"name": "x", "list": [1, 2]})).unwrap();
    store.set("doc.json", json!({"z": 1, "a": 2})).unwrap();
    store.set("doc.txt", "plain").unwrap();
    store.commit("codecs").unwrap();

    let mut reopened = Store::open(dir.path()).unwrap();
    let map = reopened.root_mut().to_map().unwrap();
    assert_eq!(
        map.get("doc.yml").and_then(Value::as_data),
        Some(&json!({"list": [1, 2], "name": "x"}))
    );
    assert_eq!(map.get("doc.txt").and_then(Value::as_str), Some("plain"));

    let blob_id = match reopened.root_mut().node("doc.json").unwrap() {
        Some(node) => node.id().unwrap(),
        None => panic!("doc.json is missing"),
    };
    let raw = reopened.get_object(&blob_id).unwrap().into_content();
    assert_eq!(raw, b"{\n  \"a\": 2,\n  \"z\": 1\n}\n".to_vec());
}

#[test]
fn open_follows_head_branch() {
    let (dir, mut store) = common::temp_store();
    store.set("k", "on master").unwrap();
    store.commit("master").unwrap();

    let mut data = Store::open_with(dir.path(), Config::default().branch("data")).unwrap();
    assert!(data.head().is_none());
    data.set("k", "on data").unwrap();
    data.commit("data").unwrap();

    fs::write(dir.path().join(".git/HEAD"), "ref: refs/heads/data\n").unwrap();
    let mut reopened = Store::open(dir.path()).unwrap();
    assert_eq!(reopened.branch(), "data");
    assert_eq!(reopened.get("k").unwrap().unwrap(), "on data");
}
