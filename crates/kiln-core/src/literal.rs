//! Constant payloads and their dense wire encoding.
use std::borrow::Cow;

use crate::{ArrayType, DType, NativeType, Shape};
use serde::{Deserialize, Serialize};

/// A constant array. Sub-byte element types are stored one element per byte
/// in the low bits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Literal {
    ty: ArrayType,
    data: Vec<u8>,
}

impl Literal {
    #[track_caller]
    pub fn from_slice<T: NativeType>(shape: impl Into<Shape>, data: &[T]) -> Self {
        let ty = ArrayType::row_major(T::DTYPE, shape);
        assert_eq!(ty.numel(), data.len(), "literal element count mismatch");
        Self {
            ty,
            data: bytemuck::cast_slice(data).to_vec(),
        }
    }

    pub fn scalar<T: NativeType>(value: T) -> Self {
        Self::from_slice(Shape::scalar(), &[value])
    }

    /// A 4-bit literal from one value per byte; the high nibble is discarded.
    #[track_caller]
    pub fn from_nibbles(dtype: DType, shape: impl Into<Shape>, values: &[u8]) -> Self {
        assert!(dtype.is_sub_byte(), "{dtype} is not a sub-byte type");
        let ty = ArrayType::row_major(dtype, shape);
        assert_eq!(ty.numel(), values.len(), "literal element count mismatch");
        Self {
            ty,
            data: values.iter().map(|v| v & 0x0F).collect(),
        }
    }

    pub fn ty(&self) -> &ArrayType {
        &self.ty
    }

    pub fn dtype(&self) -> DType {
        self.ty.dtype
    }

    pub fn shape(&self) -> &Shape {
        &self.ty.shape
    }

    pub fn numel(&self) -> usize {
        self.ty.numel()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Dense bytes of a literal, either borrowed from it or packed into a new buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenseData<'a>(Cow<'a, [u8]>);

/// Serialized form of [`DenseData`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenseDataRecord {
    pub data: Vec<u8>,
}

impl<'a> DenseData<'a> {
    pub fn own(data: Vec<u8>) -> DenseData<'static> {
        DenseData(Cow::Owned(data))
    }

    pub fn alias(data: &'a [u8]) -> Self {
        DenseData(Cow::Borrowed(data))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn is_borrowed(&self) -> bool {
        matches!(self.0, Cow::Borrowed(_))
    }

    pub fn into_owned(self) -> Vec<u8> {
        self.0.into_owned()
    }

    pub fn to_record(&self) -> DenseDataRecord {
        DenseDataRecord {
            data: self.0.to_vec(),
        }
    }

    pub fn from_record(record: DenseDataRecord) -> DenseData<'static> {
        DenseData::own(record.data)
    }
}

/// Dense bytes suitable for embedding the literal in emitted code.
///
/// Types of at least one byte are returned as a view of the literal's own
/// storage. 4-bit types are packed two per byte, the earlier element in the
/// low nibble, with a zero high nibble after an odd final element.
pub fn pack_for_wire(literal: &Literal) -> DenseData<'_> {
    if !literal.dtype().is_sub_byte() {
        return DenseData::alias(literal.as_bytes());
    }
    let packed = literal
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let lo = pair[0] & 0x0F;
            let hi = pair.get(1).map_or(0, |v| v & 0x0F);
            lo | (hi << 4)
        })
        .collect();
    DenseData::own(packed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape;
    use test_strategy::proptest;

    #[test]
    fn packs_s4_pairs() {
        let lit = Literal::from_nibbles(DType::S4, shape![6], &[0, 1, 2, 3, 4, 5]);
        let packed = pack_for_wire(&lit);
        assert!(!packed.is_borrowed());
        assert_eq!(packed.as_slice(), &[0x10, 0x32, 0x54]);
    }

    #[test]
    fn packs_u4_odd_count() {
        let lit = Literal::from_nibbles(DType::U4, shape![9], &[0, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(
            pack_for_wire(&lit).as_slice(),
            &[0x10, 0x32, 0x54, 0x76, 0x08]
        );
    }

    #[test]
    fn negative_nibbles_keep_low_bits() {
        // -1 and -8 as 4-bit two's complement.
        let lit = Literal::from_nibbles(DType::S4, shape![2], &[0xFF, 0xF8]);
        assert_eq!(pack_for_wire(&lit).as_slice(), &[0x8F]);
    }

    #[test]
    fn wide_types_alias_storage() {
        let lit = Literal::from_slice(shape![2], &[1.0f32, -2.0]);
        let dense = pack_for_wire(&lit);
        assert!(dense.is_borrowed());
        assert_eq!(dense.as_slice(), lit.as_bytes());
        assert_eq!(dense.as_slice().len(), 8);
    }

    #[test]
    fn half_literal() {
        let lit = Literal::from_slice(shape![3], &[half::f16::ONE; 3]);
        assert_eq!(lit.dtype(), DType::F16);
        assert_eq!(pack_for_wire(&lit).as_slice().len(), 6);
    }

    #[test]
    fn record_round_trip() {
        let dense = DenseData::alias(&[1, 2, 3]);
        let json = serde_json::to_string(&dense.to_record()).unwrap();
        let back = DenseData::from_record(serde_json::from_str(&json).unwrap());
        assert_eq!(back, dense);
        assert!(!back.is_borrowed());
    }

    #[proptest(cases = 64)]
    fn packed_length(#[strategy(proptest::collection::vec(0u8..16, 0..40))] values: Vec<u8>) {
        let lit = Literal::from_nibbles(DType::U4, Shape::from(vec![values.len()]), &values);
        let packed = pack_for_wire(&lit);
        assert_eq!(packed.as_slice().len(), values.len().div_ceil(2));
        for (i, v) in values.iter().enumerate() {
            let byte = packed.as_slice()[i / 2];
            let nibble = if i % 2 == 0 { byte & 0x0F } else { byte >> 4 };
            assert_eq!(nibble, *v);
        }
    }
}
