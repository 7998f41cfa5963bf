//! 设备侧元数据：格式、设备形状、核构建信息、核信息和设备地址。

mod address;
mod build_info;
mod kernel_info;

pub mod format;
pub mod trans;

pub use address::{AddressId, DeviceAddress};
pub use build_info::{
    KernelBuildInfo, KernelBuildInfoBuilder, KernelObjectType, KernelType, OpType, Processor,
};
pub use kernel_info::KernelInfo;

/// 设备名。
pub mod target {
    pub const CPU: &str = "CPU";
    pub const GPU: &str = "GPU";
    pub const ASCEND: &str = "Ascend";
}
