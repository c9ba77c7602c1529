use datanest_core::{
    Column, DataArray, DataFile, DataFrame, DataType, Entity, EntityWithSources, FileMode,
    MultiTag, RepoError, Tag,
};

fn open_block(dir: &tempfile::TempDir) -> datanest_core::Block {
    let file = DataFile::open(dir.path().join("c"), FileMode::ReadWrite).unwrap();
    file.create_block("b", "session").unwrap()
}

#[test]
fn member_kinds_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let block = open_block(&dir);
    let array = block
        .create_data_array("shared", "trace", DataType::Double, &[4])
        .unwrap();
    let tag = block.create_tag("shared", "event", vec![1.0]).unwrap();
    let group = block.create_group("selection", "analysis").unwrap();

    group.add_member::<DataArray>("shared").unwrap();
    group.add_member::<DataArray>("shared").unwrap();
    assert_eq!(group.member_count::<DataArray>().unwrap(), 1);
    assert_eq!(group.member_count::<Tag>().unwrap(), 0);
    assert!(!group.has_member::<Tag>("shared").unwrap());

    group.add_member::<Tag>(&tag.id().unwrap()).unwrap();
    assert!(group.has_member::<Tag>("shared").unwrap());
    assert_eq!(
        group.get_member::<DataArray>("shared").unwrap().unwrap().id().unwrap(),
        array.id().unwrap()
    );
    assert_eq!(
        group.get_member_at::<Tag>(0).unwrap().id().unwrap(),
        tag.id().unwrap()
    );
    assert!(matches!(
        group.get_member_at::<MultiTag>(0),
        Err(RepoError::OutOfBounds { .. })
    ));
}

#[test]
fn adding_unknown_member_fails_and_removal_keeps_target() {
    let dir = tempfile::tempdir().unwrap();
    let block = open_block(&dir);
    let frame = block
        .create_data_frame(
            "table",
            "events",
            vec![
                Column::new("onset", DataType::Double).with_unit("s"),
                Column::new("label", DataType::String),
            ],
        )
        .unwrap();
    let group = block.create_group("g", "analysis").unwrap();

    assert!(matches!(
        group.add_member::<DataFrame>("missing"),
        Err(RepoError::NotFound { .. })
    ));
    group.add_member::<DataFrame>("table").unwrap();
    assert!(group.remove_member::<DataFrame>("table").unwrap());
    assert!(!group.remove_member::<DataFrame>("table").unwrap());
    assert!(frame.exists());
    assert_eq!(frame.column_count().unwrap(), 2);
}

#[test]
fn set_members_replaces_one_kind_only() {
    let dir = tempfile::tempdir().unwrap();
    let block = open_block(&dir);
    for name in ["a", "b", "c"] {
        block
            .create_data_array(name, "trace", DataType::Double, &[1])
            .unwrap();
    }
    block.create_multi_tag("mt", "events", vec![vec![0.0]]).unwrap();
    let group = block.create_group("g", "analysis").unwrap();
    group.add_member::<DataArray>("a").unwrap();
    group.add_member::<MultiTag>("mt").unwrap();

    group.set_members::<DataArray, _, _>(["b", "c"]).unwrap();
    group.set_members::<DataArray, _, _>(["b", "c"]).unwrap();
    let names: Vec<String> = group
        .members::<DataArray>()
        .unwrap()
        .iter()
        .map(|array| array.name().unwrap())
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"b".to_string()) && names.contains(&"c".to_string()));
    assert_eq!(group.member_count::<MultiTag>().unwrap(), 1);

    block.delete_entity::<DataArray>("b").unwrap();
    assert_eq!(group.member_count::<DataArray>().unwrap(), 1);
    assert!(group.get_member::<DataArray>("b").unwrap().is_none());
}

#[test]
fn data_frame_rejects_bad_columns() {
    let dir = tempfile::tempdir().unwrap();
    let block = open_block(&dir);
    assert!(matches!(
        block.create_data_frame("empty", "t", Vec::new()),
        Err(RepoError::InvalidArgument(_))
    ));
    assert!(matches!(
        block.create_data_frame(
            "dup",
            "t",
            vec![
                Column::new("x", DataType::Int32),
                Column::new("x", DataType::Int64)
            ]
        ),
        Err(RepoError::InvalidArgument(_))
    ));

    let frame = block
        .create_data_frame("ok", "t", vec![Column::new("x", DataType::Int32)])
        .unwrap();
    assert_eq!(frame.column("x").unwrap().unwrap().data_type, DataType::Int32);
    assert!(frame.column("y").unwrap().is_none());
    assert_eq!(frame.row_count().unwrap(), 0);
    frame.set_row_count(12).unwrap();
    assert_eq!(frame.row_count().unwrap(), 12);
}

#[test]
fn sources_nest_and_link_from_entities() {
    let dir = tempfile::tempdir().unwrap();
    let block = open_block(&dir);
    let animal = block.create_source("mouse 7", "subject").unwrap();
    let cell = animal.create_source("cell 3", "neuron").unwrap();
    assert_eq!(animal.source_count().unwrap(), 1);
    assert_eq!(block.entity_count::<datanest_core::Source>().unwrap(), 1);

    let array = block
        .create_data_array("spikes", "events", DataType::Double, &[3])
        .unwrap();
    array.add_source("cell 3").unwrap();
    array.add_source(&animal.id().unwrap()).unwrap();
    assert_eq!(array.source_count().unwrap(), 2);
    assert!(array.has_source(&cell.id().unwrap()).unwrap());
    assert_eq!(
        array.get_source("mouse 7").unwrap().unwrap().id().unwrap(),
        animal.id().unwrap()
    );
    assert!(matches!(
        array.add_source("nobody"),
        Err(RepoError::NotFound { .. })
    ));

    array.set_sources(["mouse 7"]).unwrap();
    assert_eq!(array.source_count().unwrap(), 1);
    assert!(array.remove_source("mouse 7").unwrap());
    assert_eq!(array.sources().unwrap().len(), 0);

    array.add_source("cell 3").unwrap();
    assert!(animal.delete_source("cell 3").unwrap());
    assert_eq!(array.source_count().unwrap(), 0);
    assert!(array.get_source("cell 3").unwrap().is_none());
}

#[test]
fn resolver_checks_kind_scoped_existence() {
    use datanest_core::repo::EntityResolver;
    use datanest_core::{EntityRef, ObjectType};

    let dir = tempfile::tempdir().unwrap();
    let block = open_block(&dir);
    block.create_tag("onset", "event", vec![0.0]).unwrap();
    let parent = block.create_source("rig", "setup").unwrap();
    let nested = parent.create_source("shank", "device").unwrap();

    assert!(block
        .contains_entity(&EntityRef::new(ObjectType::Tag, "onset"))
        .unwrap());
    assert!(!block
        .contains_entity(&EntityRef::new(ObjectType::DataArray, "onset"))
        .unwrap());
    assert_eq!(
        block
            .resolve_id(ObjectType::Source, &"shank".into())
            .unwrap(),
        Some(nested.id().unwrap())
    );
}

#[test]
fn relinking_a_present_source_leaves_updated_at_alone() {
    let dir = tempfile::tempdir().unwrap();
    let block = open_block(&dir);
    block.create_source("mouse 7", "subject").unwrap();
    block.create_source("mouse 8", "subject").unwrap();
    let array = block
        .create_data_array("spikes", "events", DataType::Double, &[3])
        .unwrap();
    array.add_source("mouse 7").unwrap();

    array.force_updated_at(1).unwrap();
    array.add_source("mouse 7").unwrap();
    assert_eq!(array.updated_at().unwrap(), 1);
    assert_eq!(array.source_count().unwrap(), 1);

    array.add_source("mouse 8").unwrap();
    assert!(array.updated_at().unwrap() > 1);
}
