use crate::{kernel::DeviceSynchronizer, Alloc, Blob, Hardware, QueueAlloc, QueueOf, StreamPtr};
use std::{ffi::c_void, ptr::copy_nonoverlapping, sync::Arc};

#[derive(Clone, Copy, Debug)]
pub struct Cpu;

#[derive(Clone, Copy, Debug)]
pub struct ThisThread;

impl Hardware for Cpu {
    type Byte = u8;
    type Queue<'ctx> = ThisThread;
}

impl Alloc<Blob> for ThisThread {
    #[inline]
    fn alloc(&self, size: usize) -> Blob {
        Blob::new(size)
    }

    #[inline]
    fn free(&self, _mem: Blob) {}
}

impl QueueAlloc for ThisThread {
    type Hardware = Cpu;
    type DevMem = Blob;
    #[inline]
    fn queue(&self) -> &QueueOf<Self::Hardware> {
        self
    }
    #[inline]
    fn stream_ptr(&self) -> StreamPtr {
        std::ptr::null_mut()
    }
}

/// 主机内存充当设备内存时的同步器。
#[derive(Clone, Copy, Debug)]
pub struct HostSynchronizer;

impl DeviceSynchronizer for HostSynchronizer {
    fn sync_device_to_host(
        &self,
        host: &mut [u8],
        device: *const c_void,
        _format: &str,
        _shape: &[i64],
        _stream_id: u32,
    ) -> bool {
        if device.is_null() {
            return false;
        }
        unsafe { copy_nonoverlapping(device.cast::<u8>(), host.as_mut_ptr(), host.len()) };
        true
    }
}

/// 主机内存之间的“异步”拷贝，在当前线程上立即完成。
pub fn memcpy_async() -> crate::kernel::MemcpyAsync {
    Arc::new(|dst: *mut c_void, src: *const c_void, size: usize, _stream: StreamPtr| {
        if size == 0 {
            return true;
        }
        if dst.is_null() || src.is_null() {
            return false;
        }
        unsafe { copy_nonoverlapping(src.cast::<u8>(), dst.cast::<u8>(), size) };
        true
    })
}
