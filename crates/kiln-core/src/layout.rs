use std::slice::Iter;

use crate::RVec;
use serde::{Deserialize, Serialize};

/// Physical ordering of an array's dimensions, listed minor-most first.
///
/// `{1,0}` is the row-major layout of a rank-2 array: dimension 1 varies
/// fastest in memory.
#[derive(Clone, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct Layout(RVec<usize>);

impl Layout {
    pub fn new(minor_to_major: RVec<usize>) -> Self {
        Self(minor_to_major)
    }

    pub fn row_major(rank: usize) -> Self {
        Self((0..rank).rev().collect())
    }

    pub fn minor_to_major(&self) -> &[usize] {
        &self.0
    }

    pub fn iter(&self) -> Iter<'_, usize> {
        self.0.iter()
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn is_row_major(&self) -> bool {
        self.0.iter().rev().copied().eq(0..self.0.len())
    }

    /// Logical dimension that is contiguous in memory.
    pub fn minor_most(&self) -> Option<usize> {
        self.0.first().copied()
    }

    /// True if the layout names every dimension of a rank-`rank` array once.
    pub fn is_valid_for_rank(&self, rank: usize) -> bool {
        if self.0.len() != rank {
            return false;
        }
        let mut seen: RVec<bool> = smallvec::smallvec![false; rank];
        self.0
            .iter()
            .all(|&d| d < rank && !std::mem::replace(&mut seen[d], true))
    }
}

impl std::fmt::Debug for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dims = self.0.iter().map(|d| d.to_string()).collect::<Vec<_>>();
        write!(f, "{{{}}}", dims.join(","))
    }
}

impl core::ops::Deref for Layout {
    type Target = [usize];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<const C: usize> From<[usize; C]> for Layout {
    fn from(minor_to_major: [usize; C]) -> Self {
        Self(minor_to_major.into_iter().collect())
    }
}

impl From<&[usize]> for Layout {
    fn from(minor_to_major: &[usize]) -> Self {
        Self(minor_to_major.into())
    }
}
