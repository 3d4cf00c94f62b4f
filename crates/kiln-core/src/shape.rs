use crate::{rvec, RVec};
use serde::{Deserialize, Serialize};
use smallvec::ToSmallVec;
use std::{
    ops::{RangeFrom, RangeTo},
    slice::Iter,
};

/// Logical dimensions of an array, major-most first. A scalar has rank 0.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Shape(RVec<usize>);

impl Shape {
    pub fn scalar() -> Self {
        Self(rvec![])
    }

    pub fn new(shape: RVec<usize>) -> Self {
        Self(shape)
    }

    pub fn inner(&self) -> &RVec<usize> {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&usize> {
        self.0.get(index)
    }

    pub fn numel(&self) -> usize {
        self.0.iter().product()
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.0.to_vec()
    }

    pub fn iter(&self) -> Iter<'_, usize> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn rank(&self) -> usize {
        self.len()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn is_scalar(&self) -> bool {
        self.0.is_empty()
    }

    /// Dimensions after applying `perm`, where output dim `i` is input dim `perm[i]`.
    pub fn permute(&self, perm: &[usize]) -> Shape {
        Shape(perm.iter().map(|&p| self.0[p]).collect())
    }
}

impl core::ops::Deref for Shape {
    type Target = [usize];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Debug for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dims = self.0.iter().map(|d| d.to_string()).collect::<Vec<_>>();
        write!(f, "[{}]", dims.join(","))
    }
}

impl std::ops::Index<usize> for Shape {
    type Output = usize;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl std::ops::Index<RangeFrom<usize>> for Shape {
    type Output = [usize];

    fn index(&self, index: RangeFrom<usize>) -> &Self::Output {
        &self.0[index]
    }
}

impl std::ops::Index<RangeTo<usize>> for Shape {
    type Output = [usize];

    fn index(&self, index: RangeTo<usize>) -> &Self::Output {
        &self.0[index]
    }
}

impl<const C: usize> From<[usize; C]> for Shape {
    fn from(dims: [usize; C]) -> Self {
        Self(dims.to_smallvec())
    }
}

impl<const C: usize> From<&[usize; C]> for Shape {
    fn from(dims: &[usize; C]) -> Self {
        Self(dims.to_smallvec())
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self(dims.into())
    }
}

impl From<&Shape> for Shape {
    fn from(shape: &Shape) -> Self {
        shape.clone()
    }
}

impl From<()> for Shape {
    fn from(_: ()) -> Self {
        Self(rvec![])
    }
}

impl From<RVec<usize>> for Shape {
    fn from(dims: RVec<usize>) -> Self {
        Self(dims)
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self(dims.into())
    }
}

impl From<Shape> for RVec<usize> {
    fn from(shape: Shape) -> Self {
        shape.0
    }
}

#[cfg(test)]
mod tests {
    use crate::shape;

    #[test]
    fn permute_and_render() {
        let s = shape![8, 12, 100];
        assert_eq!(s.permute(&[2, 0, 1]), shape![100, 8, 12]);
        assert_eq!(s.to_string(), "[8,12,100]");
        assert_eq!(s.numel(), 9600);
        assert!(shape![].is_scalar());
        assert_eq!(shape![].numel(), 1);
    }
}
