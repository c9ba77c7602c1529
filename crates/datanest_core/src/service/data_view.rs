//! Lazily evaluated slices of a data array.
//!
//! A view only records *where* to read. Element values live outside the
//! container layout and are fetched through an [`ArrayIo`] implementation
//! supplied by the caller.

use crate::repo::{DataArray, Entity, RepoResult};
use serde::{Deserialize, Serialize};

/// Offset and count per axis of an n-dimensional slice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub offset: Vec<u64>,
    pub count: Vec<u64>,
}

impl Selection {
    pub fn new(offset: Vec<u64>, count: Vec<u64>) -> Self {
        Self { offset, count }
    }

    pub fn rank(&self) -> usize {
        self.offset.len()
    }

    /// Number of elements covered by the slice.
    pub fn element_count(&self) -> u64 {
        if self.count.is_empty() {
            return 0;
        }
        self.count.iter().product()
    }
}

/// Reads element values of a data array.
pub trait ArrayIo {
    type Buffer;

    fn read_slice(&self, array: &DataArray, selection: &Selection) -> RepoResult<Self::Buffer>;
}

/// A data array paired with the slice a query selected from it.
#[derive(Debug, Clone)]
pub struct DataView {
    array: DataArray,
    selection: Selection,
}

impl DataView {
    pub fn new(array: DataArray, selection: Selection) -> Self {
        Self { array, selection }
    }

    pub fn array(&self) -> &DataArray {
        &self.array
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Shape of the view, one entry per axis.
    pub fn data_extent(&self) -> &[u64] {
        &self.selection.count
    }

    pub fn array_id(&self) -> RepoResult<String> {
        self.array.id()
    }

    /// Fetches the selected elements.
    pub fn read<I: ArrayIo>(&self, io: &I) -> RepoResult<I::Buffer> {
        io.read_slice(&self.array, &self.selection)
    }
}

#[cfg(test)]
mod tests {
    use super::Selection;

    #[test]
    fn element_count_is_product_of_counts() {
        assert_eq!(Selection::new(vec![2, 0], vec![3, 4]).element_count(), 12);
        assert_eq!(Selection::default().element_count(), 0);
        assert_eq!(Selection::new(vec![1], vec![1]).rank(), 1);
    }
}
