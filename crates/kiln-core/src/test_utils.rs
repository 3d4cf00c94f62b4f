//! Helpers for building small graphs in tests.
use crate::{ArrayType, BufferSlice, DType, Graph, Layout, NodeId, RegionId, Shape};

pub fn array(dtype: DType, dims: &[usize]) -> ArrayType {
    ArrayType::row_major(dtype, Shape::from(dims))
}

pub fn f32_array(dims: &[usize]) -> ArrayType {
    array(DType::F32, dims)
}

pub fn s32_array(dims: &[usize]) -> ArrayType {
    array(DType::S32, dims)
}

pub fn with_layout(dtype: DType, dims: &[usize], minor_to_major: &[usize]) -> ArrayType {
    ArrayType::new(dtype, Shape::from(dims), Layout::from(minor_to_major))
}

/// Node `name` of region `region`, panicking with a readable message if absent.
#[track_caller]
pub fn node(graph: &Graph, region: &str, name: &str) -> NodeId {
    let region: RegionId = graph
        .region_named(region)
        .unwrap_or_else(|| panic!("no region named {region}"));
    graph
        .find(region, name)
        .unwrap_or_else(|| panic!("no node named {name}"))
}

/// A buffer slice covering all of `allocation`.
pub fn whole_allocation(allocation: usize, size: u64) -> BufferSlice {
    BufferSlice::new(allocation, 0, size)
}
