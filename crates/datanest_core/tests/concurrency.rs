use datanest_core::{BaseTag, DataFile, DataType, Entity, FileMode};
use std::thread;

#[test]
fn readers_never_observe_a_half_replaced_reference_set() {
    let dir = tempfile::tempdir().unwrap();
    let file = DataFile::open(dir.path().join("c"), FileMode::ReadWrite).unwrap();
    let block = file.create_block("b", "session").unwrap();
    let ids: Vec<String> = (0..4)
        .map(|index| {
            block
                .create_data_array(&format!("a{index}"), "trace", DataType::Double, &[1])
                .unwrap()
                .id()
                .unwrap()
        })
        .collect();
    let tag = block.create_tag("t", "event", vec![0.0]).unwrap();
    tag.set_references(ids[..2].iter()).unwrap();

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let tag = tag.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    assert_eq!(tag.reference_count().unwrap(), 2);
                    assert_eq!(tag.references().unwrap().len(), 2);
                }
            })
        })
        .collect();

    for round in 0..50 {
        let start = round % 3;
        tag.set_references(ids[start..start + 2].iter()).unwrap();
    }

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(tag.reference_count().unwrap(), 2);
}

#[test]
fn handles_opened_separately_share_the_container_lock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("c");
    let writer_file = DataFile::open(&path, FileMode::ReadWrite).unwrap();
    let block = writer_file.create_block("b", "session").unwrap();
    let ids: Vec<String> = (0..3)
        .map(|index| {
            block
                .create_data_array(&format!("a{index}"), "trace", DataType::Double, &[1])
                .unwrap()
                .id()
                .unwrap()
        })
        .collect();
    let tag = block.create_tag("t", "event", vec![0.0]).unwrap();
    tag.set_references(ids[..2].iter()).unwrap();

    let reader_file = DataFile::open(&path, FileMode::ReadOnly).unwrap();
    let observed = reader_file
        .get_block("b")
        .unwrap()
        .unwrap()
        .get_tag("t")
        .unwrap()
        .unwrap();
    let reader = thread::spawn(move || {
        for _ in 0..300 {
            assert_eq!(observed.reference_count().unwrap(), 2);
        }
    });

    for round in 0..100 {
        let start = round % 2;
        tag.set_references(ids[start..start + 2].iter()).unwrap();
    }
    reader.join().unwrap();
}

#[test]
fn concurrent_writers_are_serialized() {
    let dir = tempfile::tempdir().unwrap();
    let file = DataFile::open(dir.path().join("c"), FileMode::ReadWrite).unwrap();
    let block = file.create_block("b", "session").unwrap();

    let writers: Vec<_> = (0..4)
        .map(|worker| {
            let block = block.clone();
            thread::spawn(move || {
                for index in 0..5 {
                    block
                        .create_data_array(
                            &format!("w{worker}-{index}"),
                            "trace",
                            DataType::Double,
                            &[1],
                        )
                        .unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(
        block.entity_count::<datanest_core::DataArray>().unwrap(),
        20
    );
}
