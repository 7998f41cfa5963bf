//! 进程级运行时配置。
//!
//! 配置在首次使用时确定，此后不再读取环境变量。

use std::{env::var, sync::OnceLock};

/// 关闭选核回退的环境变量。
pub const DISABLE_KERNEL_BACKOFF: &str = "MS_DISABLE_KERNEL_BACKOFF";

#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct RuntimeConfig {
    /// 全局关闭选核回退，类型转换算子不受影响。
    pub disable_kernel_backoff: bool,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self {
            disable_kernel_backoff: var(DISABLE_KERNEL_BACKOFF).is_ok_and(|v| v == "1"),
        }
    }
}

static CONFIG: OnceLock<RuntimeConfig> = OnceLock::new();

/// 安装进程级配置。
///
/// 只有在配置尚未安装也未被读取时成功。
#[inline]
pub fn init(config: RuntimeConfig) -> bool {
    CONFIG.set(config).is_ok()
}

/// 读取进程级配置，首次读取时从环境变量构造。
#[inline]
pub fn get() -> &'static RuntimeConfig {
    CONFIG.get_or_init(RuntimeConfig::from_env)
}

#[test]
fn test_single_init() {
    let first = get().clone();
    assert!(!init(RuntimeConfig {
        disable_kernel_backoff: !first.disable_kernel_backoff,
    }));
    assert_eq!(*get(), first);
}
