use datanest_core::service::{
    multi_tag_offset_and_count, multi_tag_offsets_and_counts, position_and_extent_in_data,
    position_in_data, position_to_index, positions_to_indices, retrieve_multi_tag_data,
    retrieve_multi_tag_feature_data, retrieve_tag_data, retrieve_tag_feature_data,
    tag_offset_and_count,
};
use datanest_core::{
    ArrayIo, BaseTag, Block, DataArray, DataFile, DataType, Dimension, Entity, FileMode, LinkType,
    RepoError, RepoResult, SampledDimension, Selection,
};
use std::collections::HashMap;

/// Row-major in-memory element store keyed by array id.
#[derive(Default)]
struct MemoryArrays {
    values: HashMap<String, Vec<f64>>,
}

impl MemoryArrays {
    fn insert(&mut self, array: &DataArray, values: Vec<f64>) {
        self.values.insert(array.id().unwrap(), values);
    }
}

impl ArrayIo for MemoryArrays {
    type Buffer = Vec<f64>;

    fn read_slice(&self, array: &DataArray, selection: &Selection) -> RepoResult<Vec<f64>> {
        let extent = array.data_extent()?;
        let values = &self.values[&array.id()?];
        // One- and two-dimensional slices are enough here.
        let mut out = Vec::new();
        match extent.as_slice() {
            [_] => {
                let start = selection.offset[0] as usize;
                out.extend_from_slice(&values[start..start + selection.count[0] as usize]);
            }
            [_, cols] => {
                for row in selection.offset[0]..selection.offset[0] + selection.count[0] {
                    let start = (row * cols + selection.offset[1]) as usize;
                    out.extend_from_slice(&values[start..start + selection.count[1] as usize]);
                }
            }
            _ => unimplemented!(),
        }
        Ok(out)
    }
}

fn block(dir: &tempfile::TempDir) -> Block {
    let file = DataFile::open(dir.path().join("c"), FileMode::ReadWrite).unwrap();
    file.create_block("b", "session").unwrap()
}

fn sampled_array(block: &Block, name: &str, len: u64, interval: f64) -> DataArray {
    let array = block
        .create_data_array(name, "trace", DataType::Double, &[len])
        .unwrap();
    array
        .append_dimension(SampledDimension::new(interval).unwrap().with_unit("s"))
        .unwrap();
    array
}

#[test]
fn sampled_position_examples() {
    let dim: Dimension = SampledDimension::new(0.1).unwrap().with_unit("s").into();
    assert_eq!(position_to_index(0.0, Some("s"), &dim).unwrap(), 0);
    assert_eq!(position_to_index(0.25, Some("s"), &dim).unwrap(), 2);
    assert!(matches!(
        position_to_index(1.0, Some("V"), &dim),
        Err(RepoError::IncompatibleDimension(_))
    ));
}

#[test]
fn tag_point_and_extent_selection() {
    let dir = tempfile::tempdir().unwrap();
    let block = block(&dir);
    let array = sampled_array(&block, "signal", 10, 1.0);
    let tag = block.create_tag("t", "event", vec![2.0]).unwrap();

    let point = tag_offset_and_count(&tag, &array).unwrap();
    assert_eq!(point.offset, vec![2]);
    assert_eq!(point.count, vec![1]);

    tag.set_extent(vec![3.0]).unwrap();
    let range = tag_offset_and_count(&tag, &array).unwrap();
    assert_eq!(range.offset, vec![2]);
    assert_eq!(range.count, vec![3]);
}

#[test]
fn tag_units_are_converted_per_axis() {
    let dir = tempfile::tempdir().unwrap();
    let block = block(&dir);
    let array = sampled_array(&block, "signal", 100, 0.01);
    let tag = block.create_tag("t", "event", vec![200.0]).unwrap();
    tag.set_extent(vec![100.0]).unwrap();
    tag.set_units(vec!["ms".into()]).unwrap();

    let selection = tag_offset_and_count(&tag, &array).unwrap();
    assert_eq!(selection, Selection::new(vec![20], vec![10]));

    tag.set_units(vec!["V".into()]).unwrap();
    assert!(matches!(
        tag_offset_and_count(&tag, &array),
        Err(RepoError::IncompatibleDimension(_))
    ));
}

#[test]
fn selection_beyond_extent_or_rank_mismatch_fails() {
    let dir = tempfile::tempdir().unwrap();
    let block = block(&dir);
    let array = sampled_array(&block, "signal", 10, 1.0);
    let tag = block.create_tag("t", "event", vec![8.0]).unwrap();
    tag.set_extent(vec![5.0]).unwrap();
    assert!(matches!(
        tag_offset_and_count(&tag, &array),
        Err(RepoError::OutOfBounds { .. })
    ));

    let flat = block.create_tag("2d", "event", vec![1.0, 1.0]).unwrap();
    assert!(matches!(
        tag_offset_and_count(&flat, &array),
        Err(RepoError::IncompatibleDimension(_))
    ));
}

#[test]
fn batch_conversion_is_all_or_nothing() {
    let dim: Dimension = SampledDimension::new(1.0).unwrap().with_unit("s").into();
    let pairs =
        positions_to_indices(&[0.0, 4.0], &[2.0, 6.0], &[], &dim).unwrap();
    assert_eq!(pairs, vec![(0, 2), (4, 6)]);

    assert!(matches!(
        positions_to_indices(&[0.0, -5.0], &[2.0, 6.0], &[], &dim),
        Err(RepoError::OutOfBounds { .. })
    ));
    assert!(matches!(
        positions_to_indices(&[0.0, 1.0], &[2.0, 3.0], &["s".into(), "A".into()], &dim),
        Err(RepoError::IncompatibleDimension(_))
    ));
}

#[test]
fn multi_tag_selections_single_and_batch() {
    let dir = tempfile::tempdir().unwrap();
    let block = block(&dir);
    let array = sampled_array(&block, "signal", 50, 1.0);
    let tag = block
        .create_multi_tag("mt", "events", vec![vec![1.0], vec![10.0], vec![20.0]])
        .unwrap();
    tag.set_extents(vec![vec![2.0], vec![3.0], vec![4.0]]).unwrap();

    let second = multi_tag_offset_and_count(&tag, &array, 1).unwrap();
    assert_eq!(second, Selection::new(vec![10], vec![3]));

    let batch = multi_tag_offsets_and_counts(&tag, &array, &[0, 2]).unwrap();
    assert_eq!(
        batch,
        vec![
            Selection::new(vec![1], vec![2]),
            Selection::new(vec![20], vec![4])
        ]
    );
    assert!(matches!(
        multi_tag_offsets_and_counts(&tag, &array, &[0, 3]),
        Err(RepoError::OutOfBounds { .. })
    ));
}

#[test]
fn retrieve_data_reads_through_array_io() {
    let dir = tempfile::tempdir().unwrap();
    let block = block(&dir);
    let array = sampled_array(&block, "signal", 10, 1.0);
    let mut io = MemoryArrays::default();
    io.insert(&array, (0..10).map(f64::from).collect());

    let tag = block.create_tag("t", "event", vec![3.0]).unwrap();
    tag.set_extent(vec![4.0]).unwrap();
    tag.add_reference("signal").unwrap();

    let view = retrieve_tag_data(&tag, 0).unwrap();
    assert_eq!(view.data_extent(), &[4]);
    assert_eq!(view.read(&io).unwrap(), vec![3.0, 4.0, 5.0, 6.0]);
    assert!(matches!(
        retrieve_tag_data(&tag, 1),
        Err(RepoError::OutOfBounds { .. })
    ));

    let multi = block
        .create_multi_tag("mt", "events", vec![vec![0.0], vec![8.0]])
        .unwrap();
    multi.add_reference("signal").unwrap();
    let views = retrieve_multi_tag_data(&multi, &[0, 1], 0).unwrap();
    let values: Vec<Vec<f64>> = views.iter().map(|view| view.read(&io).unwrap()).collect();
    assert_eq!(values, vec![vec![0.0], vec![8.0]]);
}

#[test]
fn feature_data_follows_link_type() {
    let dir = tempfile::tempdir().unwrap();
    let block = block(&dir);
    let signal = sampled_array(&block, "signal", 10, 1.0);
    let table = block
        .create_data_array("per_event", "table", DataType::Double, &[2, 3])
        .unwrap();
    table
        .append_set_dimension(vec!["first".into(), "second".into()])
        .unwrap();
    table
        .append_set_dimension(vec!["a".into(), "b".into(), "c".into()])
        .unwrap();
    let mut io = MemoryArrays::default();
    io.insert(&signal, (0..10).map(f64::from).collect());
    io.insert(&table, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

    let tag = block.create_tag("t", "event", vec![5.0]).unwrap();
    tag.set_extent(vec![2.0]).unwrap();
    tag.create_feature("signal", LinkType::Tagged).unwrap();
    tag.create_feature("per_event", LinkType::Untagged).unwrap();

    let tagged_index = (0..2)
        .find(|index| {
            tag.get_feature_at(*index).unwrap().link_type().unwrap() == LinkType::Tagged
        })
        .unwrap();
    let tagged = retrieve_tag_feature_data(&tag, tagged_index).unwrap();
    assert_eq!(tagged.read(&io).unwrap(), vec![5.0, 6.0]);
    let untagged = retrieve_tag_feature_data(&tag, 1 - tagged_index).unwrap();
    assert_eq!(untagged.read(&io).unwrap().len(), 6);

    let multi = block
        .create_multi_tag("mt", "events", vec![vec![0.0], vec![4.0]])
        .unwrap();
    multi.create_feature("per_event", LinkType::Indexed).unwrap();
    let row = retrieve_multi_tag_feature_data(&multi, 1, 0).unwrap();
    assert_eq!(row.selection(), &Selection::new(vec![1, 0], vec![1, 3]));
    assert_eq!(row.read(&io).unwrap(), vec![4.0, 5.0, 6.0]);
    assert!(matches!(
        retrieve_multi_tag_feature_data(&multi, 2, 0),
        Err(RepoError::OutOfBounds { .. })
    ));
}

#[test]
fn feature_with_deleted_data_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let block = block(&dir);
    sampled_array(&block, "signal", 10, 1.0);
    let tag = block.create_tag("t", "event", vec![1.0]).unwrap();
    tag.create_feature("signal", LinkType::Untagged).unwrap();
    block.delete_entity::<DataArray>("signal").unwrap();

    assert!(matches!(
        retrieve_tag_feature_data(&tag, 0),
        Err(RepoError::NotFound { .. })
    ));
}

#[test]
fn containment_checks() {
    let dir = tempfile::tempdir().unwrap();
    let block = block(&dir);
    let array = block
        .create_data_array("grid", "image", DataType::UInt8, &[4, 5])
        .unwrap();

    assert!(position_in_data(&array, &[3, 4]).unwrap());
    assert!(!position_in_data(&array, &[4, 0]).unwrap());
    assert!(!position_in_data(&array, &[0]).unwrap());
    assert!(position_and_extent_in_data(&array, &[1, 1], &[3, 4]).unwrap());
    assert!(!position_and_extent_in_data(&array, &[1, 1], &[4, 4]).unwrap());
}
