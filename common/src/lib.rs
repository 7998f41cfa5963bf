#![deny(warnings)]

mod argument;
mod error;
mod type_id;

pub use argument::{dyn_, is_dynamic_rank, is_dynamic_shape, static_count, ArgVal};
pub use error::ErrorPosition;
pub use type_id::TypeId;

/// 动态维度。
pub const UNKNOWN_DIM: i64 = -1;
/// 动态秩，形状为 `[-2]` 时表示秩未知。
pub const UNKNOWN_RANK: i64 = -2;
