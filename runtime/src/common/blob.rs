use std::{
    alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout},
    fmt,
    ops::{Deref, DerefMut},
    ptr::NonNull,
    slice::{from_raw_parts, from_raw_parts_mut},
};

/// 按 `usize` 对齐的字节块，用作主机侧缓冲和模拟设备存储。
pub struct Blob {
    ptr: NonNull<u8>,
    len: usize,
}

impl Blob {
    pub fn new(size: usize) -> Self {
        if size == 0 {
            return Self {
                ptr: NonNull::dangling(),
                len: 0,
            };
        }
        let layout = layout(size);
        match NonNull::new(unsafe { alloc_zeroed(layout) }) {
            Some(ptr) => Self { ptr, len: size },
            None => handle_alloc_error(layout),
        }
    }

    pub fn from_slice(data: &[u8]) -> Self {
        let mut ans = Self::new(data.len());
        ans.copy_from_slice(data);
        ans
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl Drop for Blob {
    #[inline]
    fn drop(&mut self) {
        let &mut Blob { ptr, len } = self;
        if len > 0 {
            unsafe { dealloc(ptr.as_ptr(), layout(len)) }
        }
    }
}

impl Clone for Blob {
    #[inline]
    fn clone(&self) -> Self {
        Self::from_slice(self)
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Blob({} bytes)", self.len)
    }
}

#[inline(always)]
const fn layout(size: usize) -> Layout {
    unsafe { Layout::from_size_align_unchecked(size, align_of::<usize>()) }
}

impl Deref for Blob {
    type Target = [u8];
    #[inline]
    fn deref(&self) -> &[u8] {
        unsafe { from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for Blob {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        unsafe { from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

unsafe impl Send for Blob {}
unsafe impl Sync for Blob {}

#[test]
fn test_blob() {
    let empty = Blob::new(0);
    assert!(empty.is_empty());

    let mut blob = Blob::new(16);
    assert!(blob.iter().all(|&b| b == 0));
    blob[3] = 7;
    let copy = blob.clone();
    assert_eq!(copy[3], 7);
    assert_eq!(Blob::from_slice(&[1, 2, 3]).len(), 3);
}
