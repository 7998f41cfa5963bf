mod common;
mod handle;

pub mod anf_algo;
pub mod config;
pub mod device;
pub mod ir;
pub mod kernel;

pub use common::*;
pub use config::RuntimeConfig;

#[cfg(any(use_cpu, test))]
pub use handle::common_cpu;

use std::{ffi::c_void, ops::DerefMut};

/// 算力硬件抽象。
///
/// 约定硬件如何存储和运行。
/// 这个特质应该由管理硬件的基本单元的映射类型实现，通常是**硬件上下文**。
pub trait Hardware {
    /// 硬件的存储单元类型。
    type Byte;
    /// 硬件的任务队列类型。
    type Queue<'ctx>;
}

pub type ByteOf<H> = <H as Hardware>::Byte;
pub type QueueOf<'ctx, H> = <H as Hardware>::Queue<'ctx>;

/// 发射核函数时传递的不透明流指针。
pub type StreamPtr = *mut c_void;

pub trait Alloc<M> {
    fn alloc(&self, size: usize) -> M;
    fn free(&self, mem: M);
}

/// 绑定到队列的分配器。
pub trait QueueAlloc: Alloc<Self::DevMem> {
    /// 队列分配器对应的硬件。
    type Hardware: Hardware;
    /// 分配器分配和回收的对象，表示对某块存储区域的所有权。
    type DevMem: DerefMut<Target = [ByteOf<Self::Hardware>]>;
    /// 分配器对应的队列。
    fn queue(&self) -> &QueueOf<Self::Hardware>;
    /// 队列对应的不透明流指针。
    fn stream_ptr(&self) -> StreamPtr;
}
