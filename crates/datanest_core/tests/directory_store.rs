use datanest_core::store::{AttributeState, AttributedDirectory, Directory};
use serde_json::json;

#[test]
fn children_are_enumerated_in_stable_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = Directory::create(dir.path().join("arrays")).unwrap();
    for id in ["c3", "a1", "b2"] {
        store.sub_dir(id).ensure().unwrap();
    }

    assert_eq!(store.child_count().unwrap(), 3);
    let first = store.child_at(0).unwrap().unwrap();
    assert!(first.ends_with("a1"));
    let reopened = Directory::new(dir.path().join("arrays"));
    assert_eq!(reopened.children().unwrap(), store.children().unwrap());
    assert!(store.child_at(3).unwrap().is_none());
}

#[test]
fn resolve_tries_entry_name_before_attribute_scan() {
    let dir = tempfile::tempdir().unwrap();
    let store = Directory::create(dir.path().join("items")).unwrap();
    let first = AttributedDirectory::new(store.location().join("id-1"));
    first.set("name", "id-2").unwrap();
    let second = AttributedDirectory::new(store.location().join("id-2"));
    second.set("name", "spikes").unwrap();

    let by_id = store.find_by_name_or_attribute("name", "id-2").unwrap().unwrap();
    assert!(by_id.ends_with("id-2"));
    let by_name = store
        .find_by_name_or_attribute("name", "spikes")
        .unwrap()
        .unwrap();
    assert!(by_name.ends_with("id-2"));
    assert!(store
        .find_by_name_or_attribute("name", "missing")
        .unwrap()
        .is_none());
}

#[test]
fn links_are_idempotent_and_dangling_links_are_not_counted() {
    let dir = tempfile::tempdir().unwrap();
    let target = Directory::create(dir.path().join("target")).unwrap();
    let links = Directory::new(dir.path().join("links"));

    assert!(links.create_link(target.location(), "t1").unwrap());
    assert!(!links.create_link(target.location(), "t1").unwrap());
    assert_eq!(links.child_count().unwrap(), 1);
    assert!(links.has_child("t1"));

    target.remove_all().unwrap();
    assert_eq!(links.child_count().unwrap(), 0);
    assert!(!links.has_child("t1"));
    assert!(links.has_entry("t1"));
    assert!(links.remove_child("t1").unwrap());
    assert!(!links.remove_child("t1").unwrap());
}

#[test]
fn unlink_leaves_target_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let target = Directory::create(dir.path().join("target")).unwrap();
    let links = Directory::new(dir.path().join("links"));
    links.create_link(target.location(), "t1").unwrap();

    assert!(links.remove_by_name_or_attribute("name", "t1").unwrap());
    assert!(target.exists());
    assert_eq!(links.child_count().unwrap(), 0);
}

#[test]
fn attribute_states_distinguish_cleared_from_unset() {
    let dir = tempfile::tempdir().unwrap();
    let record = AttributedDirectory::new(dir.path().join("entity"));
    assert!(!record.has_record());
    assert_eq!(record.state("unit").unwrap(), AttributeState::Unset);

    record.set("unit", "mV").unwrap();
    assert_eq!(record.state("unit").unwrap(), AttributeState::Set(json!("mV")));
    assert_eq!(record.get::<String>("unit").unwrap().as_deref(), Some("mV"));

    record.clear("unit").unwrap();
    assert_eq!(record.state("unit").unwrap(), AttributeState::Cleared);
    assert!(record.get::<String>("unit").unwrap().is_none());

    record.remove("unit").unwrap();
    assert_eq!(record.state("unit").unwrap(), AttributeState::Unset);
}
