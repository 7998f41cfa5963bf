//! 运行时消费的图中间表示。
//!
//! 只包含元数据运行时需要的部分：节点标识、有序输入、抽象值和核信息槽位。

mod abs;
mod graph;
mod node;
mod shape;
mod ty;
mod value;

pub mod attr;
pub mod prim;

pub use abs::{Abstract, AbstractSequence, SeqKind};
pub use graph::{GraphFlags, KernelGraph, KernelWithIndex};
pub use node::{Node, NodeClass, NodeId, NodeKind, Primitive, VirtualOp};
pub use shape::{BaseShape, Shape};
pub use ty::{MonadKind, ObjectType, SeqType, Type};
pub use value::{HostTensor, Value};
