use crate::kernel::KernelTensor;
use ::common::TypeId;
use std::{ffi::c_void, fmt};

/// 设备地址在图地址池中的编号。
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct AddressId(usize);

impl AddressId {
    #[inline]
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for AddressId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// 一块设备存储及其逻辑描述。
///
/// 存储的指针、容量、格式和类型都记录在内部的核张量上。
#[derive(Clone, Debug)]
pub struct DeviceAddress {
    kernel_tensor: KernelTensor,
}

impl DeviceAddress {
    #[inline]
    pub fn new(kernel_tensor: KernelTensor) -> Self {
        Self { kernel_tensor }
    }

    #[inline]
    pub fn ptr(&self) -> *mut c_void {
        self.kernel_tensor.device_ptr()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.kernel_tensor.size()
    }

    #[inline]
    pub fn set_size(&mut self, size: usize) {
        self.kernel_tensor.set_size(size)
    }

    #[inline]
    pub fn format(&self) -> &str {
        self.kernel_tensor.format()
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.kernel_tensor.dtype_id()
    }

    #[inline]
    pub fn device_name(&self) -> &str {
        self.kernel_tensor.device_name()
    }

    #[inline]
    pub fn kernel_tensor(&self) -> &KernelTensor {
        &self.kernel_tensor
    }

    #[inline]
    pub fn kernel_tensor_mut(&mut self) -> &mut KernelTensor {
        &mut self.kernel_tensor
    }
}
