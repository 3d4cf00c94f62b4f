use crate::{rvec, DType, InvariantError, Layout, RVec, Shape};
use serde::{Deserialize, Serialize};

/// Element type, logical dimensions and physical layout of one array.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArrayType {
    pub dtype: DType,
    pub shape: Shape,
    pub layout: Layout,
}

impl ArrayType {
    #[track_caller]
    pub fn new(dtype: DType, shape: impl Into<Shape>, layout: impl Into<Layout>) -> Self {
        let shape = shape.into();
        let layout = layout.into();
        if !layout.is_valid_for_rank(shape.rank()) {
            panic!(
                "{}",
                InvariantError::LayoutMismatch {
                    layout: layout.clone(),
                    shape: shape.clone(),
                }
            );
        }
        Self { dtype, shape, layout }
    }

    pub fn row_major(dtype: DType, shape: impl Into<Shape>) -> Self {
        let shape = shape.into();
        let layout = Layout::row_major(shape.rank());
        Self { dtype, shape, layout }
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn numel(&self) -> usize {
        self.shape.numel()
    }

    pub fn size_in_bytes(&self) -> usize {
        (self.numel() * self.dtype.bit_width()).div_ceil(8)
    }

    /// Same dimensions and layout, element type ignored.
    pub fn equal_ignoring_dtype(&self, other: &ArrayType) -> bool {
        self.shape == other.shape && self.layout == other.layout
    }
}

impl std::fmt::Debug for ArrayType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl std::fmt::Display for ArrayType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.dtype, self.shape, self.layout)
    }
}

/// Position of an array leaf inside a value: `{}` for an array value, `{i}`
/// for slot `i` of a tuple.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ShapeIndex(RVec<usize>);

impl ShapeIndex {
    pub fn root() -> Self {
        Self(rvec![])
    }

    pub fn tuple(slot: usize) -> Self {
        Self(rvec![slot])
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

impl std::fmt::Debug for ShapeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.0.iter().map(|d| d.to_string()).collect::<Vec<_>>();
        write!(f, "{{{}}}", slots.join(","))
    }
}

/// Type of a node's result: one array, or a flat tuple of arrays.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Array(ArrayType),
    Tuple(RVec<ArrayType>),
}

impl ValueType {
    pub fn is_tuple(&self) -> bool {
        matches!(self, ValueType::Tuple(_))
    }

    pub fn as_array(&self) -> Option<&ArrayType> {
        match self {
            ValueType::Array(a) => Some(a),
            ValueType::Tuple(_) => None,
        }
    }

    /// The array type of a value the graph guarantees is not a tuple.
    #[track_caller]
    pub fn array(&self) -> &ArrayType {
        match self {
            ValueType::Array(a) => a,
            ValueType::Tuple(_) => panic!("{}", InvariantError::UnexpectedTuple),
        }
    }

    pub fn leaves(&self) -> &[ArrayType] {
        match self {
            ValueType::Array(a) => std::slice::from_ref(a),
            ValueType::Tuple(elements) => elements,
        }
    }

    /// Every array leaf paired with its index.
    pub fn indexed_leaves(&self) -> Vec<(ShapeIndex, &ArrayType)> {
        match self {
            ValueType::Array(a) => vec![(ShapeIndex::root(), a)],
            ValueType::Tuple(elements) => elements
                .iter()
                .enumerate()
                .map(|(i, a)| (ShapeIndex::tuple(i), a))
                .collect(),
        }
    }

    pub fn tuple_element(&self, index: usize) -> Option<&ArrayType> {
        match self {
            ValueType::Tuple(elements) => elements.get(index),
            ValueType::Array(_) => None,
        }
    }
}

impl From<ArrayType> for ValueType {
    fn from(array: ArrayType) -> Self {
        ValueType::Array(array)
    }
}

impl std::fmt::Debug for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueType::Array(a) => write!(f, "{a}"),
            ValueType::Tuple(elements) => {
                let parts = elements.iter().map(|e| e.to_string()).collect::<Vec<_>>();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape;

    #[test]
    fn render() {
        let a = ArrayType::new(DType::F32, shape![8, 12], [0, 1]);
        assert_eq!(a.to_string(), "f32[8,12]{0,1}");
        let t = ValueType::Tuple(rvec![a.clone(), ArrayType::row_major(DType::S32, shape![])]);
        assert_eq!(t.to_string(), "(f32[8,12]{0,1}, s32[]{})");
        assert_eq!(t.leaves().len(), 2);
        assert_eq!(t.indexed_leaves()[1].0, ShapeIndex::tuple(1));
    }

    #[test]
    fn sub_byte_size() {
        let a = ArrayType::row_major(DType::S4, shape![5]);
        assert_eq!(a.size_in_bytes(), 3);
    }

    #[test]
    #[should_panic]
    fn layout_rank_mismatch() {
        ArrayType::new(DType::F32, shape![8, 12], [0]);
    }
}
