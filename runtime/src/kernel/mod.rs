//! 核函数的输入输出描述和核模块约定。

mod kernel_mod;
mod packet;
mod symbol;
mod tensor;

pub use kernel_mod::{input_sizes, output_sizes, KernelAttr, KernelMod, KernelModBase};
pub use packet::{value_to_shape, KernelPacketKernelMod, MemcpyAsync};
pub use symbol::{SymbolEngine, SymbolTable};
pub use tensor::{DeviceInfo, DeviceSynchronizer, KernelTensor, UserData};
