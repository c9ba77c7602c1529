//! Position to index conversion and tag-based slicing.
//!
//! # Responsibility
//! - Convert positions in physical units into indices along one axis.
//! - Derive offset/count selections from tag positions and extents.
//! - Resolve feature data according to the feature's link type.
//!
//! # Invariants
//! - Sampled and range lookups round to the nearest index; exact midpoints
//!   go to the lower index.
//! - A position without unit is read in the axis' native unit.
//! - Batch calls are all-or-nothing: one failing row fails the whole call.
//! - A missing extent on an axis selects a single element.

use super::data_view::{DataView, Selection};
use crate::model::dimension::{Dimension, RangeDimension, SampledDimension, SetDimension};
use crate::model::entity::ObjectType;
use crate::model::link_type::LinkType;
use crate::model::units;
use crate::repo::{
    BaseTag, DataArray, Entity, Feature, MultiTag, RepoError, RepoResult, Tag,
};

/// Which end of a selection a position describes.
///
/// The end of a selection is exclusive, so on a set axis it may equal the
/// label count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Start,
    End,
}

/// Index of `position` on a set axis. The position must be a whole number.
pub fn set_position_to_index(
    position: f64,
    unit: Option<&str>,
    dimension: &SetDimension,
) -> RepoResult<u64> {
    set_index(position, unit, dimension, Endpoint::Start)
}

/// Index of `position` on a sampled axis, converting `unit` first.
pub fn sampled_position_to_index(
    position: f64,
    unit: Option<&str>,
    dimension: &SampledDimension,
) -> RepoResult<u64> {
    let position = convert_position(position, unit, dimension.unit.as_deref())?;
    let steps = (position - dimension.offset.unwrap_or(0.0)) / dimension.sampling_interval;
    let index = round_half_down(steps);
    if index < 0.0 {
        return Err(RepoError::out_of_bounds(
            format!("position {position} lies before the first sample"),
            0,
        ));
    }
    Ok(index as u64)
}

/// Index of the tick closest to `position` on a range axis.
pub fn range_position_to_index(
    position: f64,
    unit: Option<&str>,
    dimension: &RangeDimension,
) -> RepoResult<u64> {
    let position = convert_position(position, unit, dimension.unit.as_deref())?;
    let ticks = &dimension.ticks;
    let (Some(first), Some(last)) = (ticks.first(), ticks.last()) else {
        return Err(RepoError::IncompatibleDimension(
            "range dimension has no ticks".into(),
        ));
    };
    if position < *first {
        return Err(RepoError::out_of_bounds(
            format!("position {position} precedes the first tick {first}"),
            0,
        ));
    }
    if position > last + dimension.last_step() {
        return Err(RepoError::out_of_bounds(
            format!("position {position} lies beyond the last tick {last}"),
            ticks.len() as u64,
        ));
    }

    let upper = ticks.partition_point(|tick| *tick < position);
    let index = if upper == ticks.len() {
        upper - 1
    } else if upper == 0 || ticks[upper] == position {
        upper
    } else if position - ticks[upper - 1] <= ticks[upper] - position {
        upper - 1
    } else {
        upper
    };
    Ok(index as u64)
}

/// Index of `position` on any axis kind.
pub fn position_to_index(
    position: f64,
    unit: Option<&str>,
    dimension: &Dimension,
) -> RepoResult<u64> {
    index_on(position, unit, dimension, Endpoint::Start)
}

/// Converts parallel start/end positions into `(start, end)` index pairs.
///
/// `units` is either empty (native unit for every row) or holds one unit per
/// row. Any failing row fails the whole batch.
pub fn positions_to_indices(
    start_positions: &[f64],
    end_positions: &[f64],
    units: &[String],
    dimension: &Dimension,
) -> RepoResult<Vec<(u64, u64)>> {
    if start_positions.len() != end_positions.len() {
        return Err(RepoError::InvalidArgument(format!(
            "{} start positions but {} end positions",
            start_positions.len(),
            end_positions.len()
        )));
    }
    if !units.is_empty() && units.len() != start_positions.len() {
        return Err(RepoError::InvalidArgument(format!(
            "{} units given for {} positions",
            units.len(),
            start_positions.len()
        )));
    }

    start_positions
        .iter()
        .zip(end_positions)
        .enumerate()
        .map(|(row, (start, end))| {
            let unit = units.get(row).map(String::as_str);
            let start = index_on(*start, unit, dimension, Endpoint::Start)?;
            let end = index_on(*end, unit, dimension, Endpoint::End)?;
            Ok((start, end))
        })
        .collect()
}

/// Selection of `array` covered by the tag's position and extent.
pub fn tag_offset_and_count(tag: &Tag, array: &DataArray) -> RepoResult<Selection> {
    let _guard = tag.core().ctx().read();
    let position = tag.position()?;
    let extent = tag.extent()?;
    let units = tag.units()?;
    selection_in(array, &position, extent.as_deref(), &units)
}

/// Selection of `array` covered by position `index` of the multi-tag.
pub fn multi_tag_offset_and_count(
    tag: &MultiTag,
    array: &DataArray,
    index: u64,
) -> RepoResult<Selection> {
    let _guard = tag.core().ctx().read();
    let position = tag.position_at(index)?;
    let extent = tag.extent_at(index)?;
    let units = tag.units()?;
    selection_in(array, &position, extent.as_deref(), &units)
}

/// Batch form of [`multi_tag_offset_and_count`], all-or-nothing.
pub fn multi_tag_offsets_and_counts(
    tag: &MultiTag,
    array: &DataArray,
    indices: &[u64],
) -> RepoResult<Vec<Selection>> {
    let _guard = tag.core().ctx().read();
    indices
        .iter()
        .map(|index| multi_tag_offset_and_count(tag, array, *index))
        .collect()
}

/// True when `offset` addresses an element inside the array's extent.
pub fn position_in_data(array: &DataArray, offset: &[u64]) -> RepoResult<bool> {
    let extent = array.data_extent()?;
    Ok(offset.len() == extent.len()
        && offset.iter().zip(&extent).all(|(start, size)| start < size))
}

/// True when the whole `offset`/`count` box lies inside the array's extent.
pub fn position_and_extent_in_data(
    array: &DataArray,
    offset: &[u64],
    count: &[u64],
) -> RepoResult<bool> {
    let extent = array.data_extent()?;
    Ok(offset.len() == extent.len()
        && count.len() == extent.len()
        && offset
            .iter()
            .zip(count)
            .zip(&extent)
            .all(|((start, count), size)| start.checked_add(*count).is_some_and(|end| end <= *size)))
}

/// Data of the tag's `reference_index`-th reference at the tag's position.
pub fn retrieve_tag_data(tag: &Tag, reference_index: u64) -> RepoResult<DataView> {
    let _guard = tag.core().ctx().read();
    let array = tag.get_reference_at(reference_index)?;
    retrieve_tag_data_from(tag, &array)
}

/// Data of `array` at the tag's position.
pub fn retrieve_tag_data_from(tag: &Tag, array: &DataArray) -> RepoResult<DataView> {
    let selection = tag_offset_and_count(tag, array)?;
    Ok(DataView::new(array.clone(), selection))
}

/// One view per requested position of the multi-tag, all-or-nothing.
pub fn retrieve_multi_tag_data(
    tag: &MultiTag,
    position_indices: &[u64],
    reference_index: u64,
) -> RepoResult<Vec<DataView>> {
    let _guard = tag.core().ctx().read();
    let array = tag.get_reference_at(reference_index)?;
    retrieve_multi_tag_data_from(tag, position_indices, &array)
}

pub fn retrieve_multi_tag_data_from(
    tag: &MultiTag,
    position_indices: &[u64],
    array: &DataArray,
) -> RepoResult<Vec<DataView>> {
    Ok(multi_tag_offsets_and_counts(tag, array, position_indices)?
        .into_iter()
        .map(|selection| DataView::new(array.clone(), selection))
        .collect())
}

/// Data of the tag's `feature_index`-th feature.
pub fn retrieve_tag_feature_data(tag: &Tag, feature_index: u64) -> RepoResult<DataView> {
    let _guard = tag.core().ctx().read();
    let feature = tag.get_feature_at(feature_index)?;
    retrieve_tag_feature_data_for(tag, &feature)
}

/// Data of `feature`, sliced according to its link type.
///
/// - `Tagged`: the tag's own position and extent.
/// - `Indexed`: the single tag is position 0 along the first axis.
/// - `Untagged`: the whole array.
pub fn retrieve_tag_feature_data_for(tag: &Tag, feature: &Feature) -> RepoResult<DataView> {
    let _guard = tag.core().ctx().read();
    let data = feature_data(feature)?;
    let selection = match feature.link_type()? {
        LinkType::Tagged => tag_offset_and_count(tag, &data)?,
        LinkType::Indexed => indexed_selection(&data, 0)?,
        LinkType::Untagged => full_selection(&data)?,
    };
    Ok(DataView::new(data, selection))
}

/// Feature data for one position of the multi-tag.
pub fn retrieve_multi_tag_feature_data(
    tag: &MultiTag,
    position_index: u64,
    feature_index: u64,
) -> RepoResult<DataView> {
    let _guard = tag.core().ctx().read();
    let feature = tag.get_feature_at(feature_index)?;
    retrieve_multi_tag_feature_data_for(tag, position_index, &feature)
}

/// Feature data for one position, sliced according to the link type.
///
/// `Indexed` features select row `position_index` along their first axis.
pub fn retrieve_multi_tag_feature_data_for(
    tag: &MultiTag,
    position_index: u64,
    feature: &Feature,
) -> RepoResult<DataView> {
    let _guard = tag.core().ctx().read();
    let position_count = tag.position_count()?;
    if position_index >= position_count {
        return Err(RepoError::out_of_bounds(
            format!("multi-tag has {position_count} positions"),
            position_index,
        ));
    }
    let data = feature_data(feature)?;
    let selection = match feature.link_type()? {
        LinkType::Tagged => multi_tag_offset_and_count(tag, &data, position_index)?,
        LinkType::Indexed => indexed_selection(&data, position_index)?,
        LinkType::Untagged => full_selection(&data)?,
    };
    Ok(DataView::new(data, selection))
}

/// Batch form over several positions, all-or-nothing.
pub fn retrieve_multi_tag_features_data(
    tag: &MultiTag,
    position_indices: &[u64],
    feature_index: u64,
) -> RepoResult<Vec<DataView>> {
    let _guard = tag.core().ctx().read();
    let feature = tag.get_feature_at(feature_index)?;
    position_indices
        .iter()
        .map(|index| retrieve_multi_tag_feature_data_for(tag, *index, &feature))
        .collect()
}

fn feature_data(feature: &Feature) -> RepoResult<DataArray> {
    match feature.data()? {
        Some(data) => Ok(data),
        None => Err(RepoError::NotFound {
            kind: ObjectType::DataArray,
            key: feature.data_id()?,
        }),
    }
}

fn full_selection(array: &DataArray) -> RepoResult<Selection> {
    let extent = array.data_extent()?;
    Ok(Selection::new(vec![0; extent.len()], extent))
}

fn indexed_selection(array: &DataArray, index: u64) -> RepoResult<Selection> {
    let extent = array.data_extent()?;
    let Some(rows) = extent.first() else {
        return Err(RepoError::out_of_bounds("feature data has no extent", index));
    };
    if index >= *rows {
        return Err(RepoError::out_of_bounds(
            format!("feature data has {rows} entries along its first axis"),
            index,
        ));
    }
    let mut offset = vec![0; extent.len()];
    offset[0] = index;
    let mut count = extent;
    count[0] = 1;
    Ok(Selection::new(offset, count))
}

fn selection_in(
    array: &DataArray,
    position: &[f64],
    extent: Option<&[f64]>,
    axis_units: &[String],
) -> RepoResult<Selection> {
    let dimensions = array.dimensions()?;
    if position.len() != dimensions.len() {
        return Err(RepoError::IncompatibleDimension(format!(
            "position has {} components but the array has {} dimensions",
            position.len(),
            dimensions.len()
        )));
    }
    if let Some(extent) = extent {
        if extent.len() != position.len() {
            return Err(RepoError::IncompatibleDimension(format!(
                "extent has {} components but position has {}",
                extent.len(),
                position.len()
            )));
        }
    }
    if !axis_units.is_empty() && axis_units.len() != position.len() {
        return Err(RepoError::IncompatibleDimension(format!(
            "{} units given for {} axes",
            axis_units.len(),
            position.len()
        )));
    }

    let mut offset = Vec::with_capacity(position.len());
    let mut count = Vec::with_capacity(position.len());
    for (axis, dimension) in dimensions.iter().enumerate() {
        let unit = axis_units.get(axis).map(String::as_str);
        let start = index_on(position[axis], unit, dimension, Endpoint::Start)?;
        let size = match extent {
            Some(extent) => {
                let end = index_on(position[axis] + extent[axis], unit, dimension, Endpoint::End)?;
                end.saturating_sub(start).max(1)
            }
            None => 1,
        };
        offset.push(start);
        count.push(size);
    }

    let data_extent = array.data_extent()?;
    if !data_extent.is_empty() && !position_and_extent_in_data(array, &offset, &count)? {
        return Err(RepoError::out_of_bounds(
            format!(
                "selection offset {offset:?} count {count:?} exceeds data extent {data_extent:?}"
            ),
            offset.first().copied().unwrap_or(0),
        ));
    }
    Ok(Selection::new(offset, count))
}

fn index_on(
    position: f64,
    unit: Option<&str>,
    dimension: &Dimension,
    endpoint: Endpoint,
) -> RepoResult<u64> {
    if !position.is_finite() {
        return Err(RepoError::InvalidArgument(format!(
            "position {position} is not finite"
        )));
    }
    match dimension {
        Dimension::Set(dim) => set_index(position, unit, dim, endpoint),
        Dimension::Sampled(dim) => sampled_position_to_index(position, unit, dim),
        Dimension::Range(dim) => range_position_to_index(position, unit, dim),
    }
}

fn set_index(
    position: f64,
    unit: Option<&str>,
    dimension: &SetDimension,
    endpoint: Endpoint,
) -> RepoResult<u64> {
    if !units::is_unitless(unit) {
        return Err(RepoError::IncompatibleDimension(format!(
            "set dimensions carry no unit, got `{}`",
            unit.unwrap_or_default()
        )));
    }
    if position.fract() != 0.0 {
        return Err(RepoError::IncompatibleDimension(format!(
            "set dimension positions are whole indices, got {position}"
        )));
    }
    if position < 0.0 {
        return Err(RepoError::out_of_bounds(
            format!("negative set position {position}"),
            0,
        ));
    }
    let index = position as u64;
    let labels = dimension.labels.len() as u64;
    let beyond = match endpoint {
        Endpoint::Start => index >= labels,
        Endpoint::End => index > labels,
    };
    if labels > 0 && beyond {
        return Err(RepoError::out_of_bounds(
            format!("set dimension has {labels} labels"),
            index,
        ));
    }
    Ok(index)
}

/// Rescales `position` from `unit` into the axis unit.
fn convert_position(position: f64, unit: Option<&str>, axis_unit: Option<&str>) -> RepoResult<f64> {
    if units::is_unitless(unit) {
        return Ok(position);
    }
    let unit = unit.unwrap_or_default();
    if units::is_unitless(axis_unit) {
        return Err(RepoError::IncompatibleDimension(format!(
            "position given in `{unit}` but the dimension has no unit"
        )));
    }
    let axis_unit = axis_unit.unwrap_or_default();
    match units::scaling(unit, axis_unit) {
        Some(factor) => Ok(position * factor),
        None => Err(RepoError::IncompatibleDimension(format!(
            "`{unit}` cannot be converted to `{axis_unit}`"
        ))),
    }
}

/// Nearest integer; exact halves go down, so 2.5 becomes 2.
fn round_half_down(value: f64) -> f64 {
    (value - 0.5).ceil()
}

#[cfg(test)]
mod tests {
    use super::{
        position_to_index, positions_to_indices, range_position_to_index, round_half_down,
        sampled_position_to_index, set_position_to_index,
    };
    use crate::model::dimension::{Dimension, RangeDimension, SampledDimension, SetDimension};
    use crate::repo::RepoError;

    fn seconds(interval: f64) -> SampledDimension {
        SampledDimension::new(interval).unwrap().with_unit("s")
    }

    #[test]
    fn rounding_sends_halves_to_the_lower_index() {
        assert_eq!(round_half_down(2.5), 2.0);
        assert_eq!(round_half_down(2.51), 3.0);
        assert_eq!(round_half_down(2.49), 2.0);
        assert_eq!(round_half_down(0.0), 0.0);
        assert_eq!(round_half_down(-0.4), 0.0);
    }

    #[test]
    fn sampled_examples() {
        let dim = seconds(0.1);
        assert_eq!(sampled_position_to_index(0.0, Some("s"), &dim).unwrap(), 0);
        assert_eq!(sampled_position_to_index(0.25, Some("s"), &dim).unwrap(), 2);
        assert_eq!(sampled_position_to_index(0.3, Some("s"), &dim).unwrap(), 3);
        assert_eq!(sampled_position_to_index(300.0, Some("ms"), &dim).unwrap(), 3);
        assert!(matches!(
            sampled_position_to_index(1.0, Some("V"), &dim),
            Err(RepoError::IncompatibleDimension(_))
        ));
    }

    #[test]
    fn sampled_respects_offset_and_rejects_earlier_positions() {
        let dim = seconds(0.5).with_offset(1.0);
        assert_eq!(sampled_position_to_index(2.0, None, &dim).unwrap(), 2);
        assert!(matches!(
            sampled_position_to_index(0.0, None, &dim),
            Err(RepoError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn unit_on_unitless_axis_is_incompatible() {
        let dim = SampledDimension::new(1.0).unwrap();
        assert!(matches!(
            sampled_position_to_index(1.0, Some("s"), &dim),
            Err(RepoError::IncompatibleDimension(_))
        ));
        assert_eq!(sampled_position_to_index(1.0, Some("none"), &dim).unwrap(), 1);
    }

    #[test]
    fn range_picks_closest_tick_and_breaks_ties_low() {
        let dim = RangeDimension::new(vec![0.0, 1.0, 3.0]).unwrap().with_unit("s");
        assert_eq!(range_position_to_index(0.0, None, &dim).unwrap(), 0);
        assert_eq!(range_position_to_index(0.5, None, &dim).unwrap(), 0);
        assert_eq!(range_position_to_index(0.6, None, &dim).unwrap(), 1);
        assert_eq!(range_position_to_index(2.0, None, &dim).unwrap(), 1);
        assert_eq!(range_position_to_index(2.1, None, &dim).unwrap(), 2);
        assert_eq!(range_position_to_index(4.5, None, &dim).unwrap(), 2);
        assert_eq!(range_position_to_index(1500.0, Some("ms"), &dim).unwrap(), 1);
    }

    #[test]
    fn range_bounds() {
        let dim = RangeDimension::new(vec![1.0, 2.0, 4.0]).unwrap();
        assert!(matches!(
            range_position_to_index(0.5, None, &dim),
            Err(RepoError::OutOfBounds { .. })
        ));
        assert_eq!(range_position_to_index(6.0, None, &dim).unwrap(), 2);
        assert!(matches!(
            range_position_to_index(6.5, None, &dim),
            Err(RepoError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn set_positions_are_indices() {
        let dim = SetDimension::new(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(set_position_to_index(2.0, None, &dim).unwrap(), 2);
        assert!(matches!(
            set_position_to_index(3.0, None, &dim),
            Err(RepoError::OutOfBounds { index: 3, .. })
        ));
        assert!(matches!(
            set_position_to_index(1.5, None, &dim),
            Err(RepoError::IncompatibleDimension(_))
        ));
        assert!(matches!(
            set_position_to_index(1.0, Some("s"), &dim),
            Err(RepoError::IncompatibleDimension(_))
        ));
        let unlabeled = SetDimension::default();
        assert_eq!(set_position_to_index(42.0, None, &unlabeled).unwrap(), 42);
    }

    #[test]
    fn batch_conversion_of_valid_rows() {
        let dim: Dimension = seconds(1.0).into();
        let pairs = positions_to_indices(
            &[0.0, 2000.0],
            &[3.0, 5000.0],
            &["s".into(), "ms".into()],
            &dim,
        )
        .unwrap();
        assert_eq!(pairs, vec![(0, 3), (2, 5)]);

        let native = positions_to_indices(&[1.0], &[2.0], &[], &dim).unwrap();
        assert_eq!(native, vec![(1, 2)]);
    }

    #[test]
    fn batch_conversion_fails_as_a_whole() {
        let dim: Dimension = seconds(1.0).into();
        let err = positions_to_indices(
            &[0.0, 1.0],
            &[1.0, 2.0],
            &["s".into(), "V".into()],
            &dim,
        )
        .unwrap_err();
        assert!(matches!(err, RepoError::IncompatibleDimension(_)));

        assert!(matches!(
            positions_to_indices(&[0.0], &[1.0, 2.0], &[], &dim),
            Err(RepoError::InvalidArgument(_))
        ));
        assert!(matches!(
            positions_to_indices(&[0.0, 1.0], &[1.0, 2.0], &["s".into()], &dim),
            Err(RepoError::InvalidArgument(_))
        ));
    }

    #[test]
    fn set_end_may_equal_label_count_in_batches() {
        let dim: Dimension = SetDimension::new(vec!["a".into(), "b".into()]).into();
        assert_eq!(
            positions_to_indices(&[0.0], &[2.0], &[], &dim).unwrap(),
            vec![(0, 2)]
        );
        assert!(position_to_index(2.0, None, &dim).is_err());
    }
}
