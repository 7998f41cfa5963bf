//! 运行时读写的节点属性名。

/// 原语指定的执行设备。
pub const PRIMITIVE_TARGET: &str = "primitive_target";
/// 无操作节点在运行时跳过地址分配。
pub const SKIP_NOP_OP_ADDR: &str = "skip_nop_op_addr";
/// 选核回退的失败信息。
pub const BACKOFF_FAILURE_INFO: &str = "kernel_backoff_with_failure_info";
/// 选核回退的失败类型。
pub const BACKOFF_FAILURE_TYPE: &str = "kernel_backoff_with_failure_type";
pub const ORIGIN_FORMAT: &str = "origin_format";
/// 归约轴为空时跳过执行。
pub const SKIP_MODE: &str = "skip_mode";
pub const RANDOM_CACHE: &str = "random_cache";
