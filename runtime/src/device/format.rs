//! 内存格式标签。

pub const DEFAULT: &str = "DefaultFormat";
pub const NCHW: &str = "NCHW";
pub const NHWC: &str = "NHWC";
pub const ND: &str = "ND";
pub const HWCN: &str = "HWCN";
pub const NC1HWC0: &str = "NC1HWC0";
pub const FRACTAL_Z: &str = "FRACTAL_Z";
pub const FRACTAL_NZ: &str = "FRACTAL_NZ";
pub const C1HWNCOC0: &str = "C1HWNCoC0";
pub const NCDHW: &str = "NCDHW";
pub const NDHWC: &str = "NDHWC";
pub const NDC1HWC0: &str = "NDC1HWC0";
pub const FRACTAL_Z_3D: &str = "FRACTAL_Z_3D";
/// 未选定的格式。
pub const INVALID: &str = "InvalidFormat";

/// 与默认格式互相等价的行主序格式。
const DEFAULT_LIKE: [&str; 3] = [DEFAULT, NCHW, ND];

/// 两个格式是否可以视为同一物理布局。
#[inline]
pub fn is_equivalent_format(a: &str, b: &str) -> bool {
    a == b || (DEFAULT_LIKE.contains(&a) && DEFAULT_LIKE.contains(&b))
}

/// 五维格式。
#[inline]
pub fn is_3d_format(format: &str) -> bool {
    matches!(format, NCDHW | NDHWC | NDC1HWC0 | FRACTAL_Z_3D)
}
