//! 逻辑形状到设备形状的变换。
//!
//! 先在逻辑空间补齐维度，再按格式重排为设备布局。

use super::format::*;
use crate::{invalid_format, invalid_shape, CacheSize, Diversity, FatalError};
use ::common::{is_dynamic_rank, TypeId, UNKNOWN_DIM};
use lru::LruCache;
use std::sync::{Mutex, OnceLock};

/// 立方单元的边长。
const CUBE: i64 = 16;

const AXES_4D: &str = "NCHW";
const AXES_5D: &str = "NCDHW";

/// 格式要求的分块大小。
#[inline]
const fn c0(dtype: TypeId) -> i64 {
    match dtype {
        TypeId::Int8 | TypeId::UInt8 => 32,
        _ => CUBE,
    }
}

#[inline]
fn ceil_div(a: i64, b: i64) -> i64 {
    if a < 0 {
        UNKNOWN_DIM
    } else {
        (a + b - 1) / b
    }
}

#[inline]
fn mul(dims: &[i64]) -> i64 {
    if dims.iter().any(|&d| d < 0) {
        UNKNOWN_DIM
    } else {
        dims.iter().product()
    }
}

/// 形状在转换到 `format` 之前是否需要补齐维度。
pub fn is_need_padding(format: &str, shape: &[i64]) -> bool {
    if shape.is_empty() || is_dynamic_rank(shape) {
        return false;
    }
    match format {
        DEFAULT | NCHW | ND | FRACTAL_NZ | NCDHW => false,
        f if is_3d_format(f) => shape.len() < AXES_5D.len(),
        _ => shape.len() < AXES_4D.len(),
    }
}

/// 按格式补齐维度。
///
/// `reshape_type` 以轴字母描述每个已有维度在补齐后形状中的位置，如 `"NC"`。
/// 为空或与形状不匹配时使用默认规则，把已有维度从 C 轴开始依次放置。
pub fn padding_shape(shape: &[i64], format: &str, reshape_type: &str) -> Vec<i64> {
    let axes = if is_3d_format(format) {
        AXES_5D
    } else {
        AXES_4D
    };
    if shape.len() >= axes.len() || is_dynamic_rank(shape) {
        return shape.to_vec();
    }

    let mut ans = vec![1; axes.len()];
    let positions = reshape_type
        .chars()
        .map(|c| axes.find(c))
        .collect::<Option<Vec<_>>>();
    match positions {
        Some(positions) if !reshape_type.is_empty() && positions.len() == shape.len() => {
            for (&pos, &d) in positions.iter().zip(shape) {
                ans[pos] = d
            }
        }
        _ => ans[1..][..shape.len()].copy_from_slice(shape),
    }
    ans
}

type CacheKey = (Vec<i64>, String, TypeId);

fn cache() -> &'static Mutex<LruCache<CacheKey, Vec<i64>>> {
    static CACHE: OnceLock<Mutex<LruCache<CacheKey, Vec<i64>>>> = OnceLock::new();
    CACHE.get_or_init(|| CacheSize::default().new_cache(Diversity::High))
}

/// 将补齐后的逻辑形状变换为设备形状。
pub fn trans_shape_to_device(
    shape: &[i64],
    format: &str,
    dtype: TypeId,
) -> Result<Vec<i64>, FatalError> {
    if is_dynamic_rank(shape) {
        return Ok(shape.to_vec());
    }
    let key = (shape.to_vec(), format.to_string(), dtype);
    if let Some(ans) = cache().lock().unwrap().get(&key) {
        return Ok(ans.clone());
    }
    let ans = trans(shape, format, dtype)?;
    cache().lock().unwrap().put(key, ans.clone());
    Ok(ans)
}

fn trans(shape: &[i64], format: &str, dtype: TypeId) -> Result<Vec<i64>, FatalError> {
    let c0 = c0(dtype);
    match format {
        DEFAULT | NCHW | ND | NCDHW => return Ok(shape.to_vec()),
        FRACTAL_NZ => {
            let (batch, m, n) = match shape {
                [] => return Ok(vec![]),
                [n] => (&[][..], 1, *n),
                [batch @ .., m, n] => (batch, *m, *n),
            };
            let mut ans = batch.to_vec();
            ans.extend([ceil_div(n, c0), ceil_div(m, CUBE), CUBE, c0]);
            return Ok(ans);
        }
        _ => {}
    }

    if is_3d_format(format) {
        let &[n, c, d, h, w] = shape else {
            return Err(invalid_shape(format!(
                "{format} requires a 5-d shape, got {shape:?}"
            )));
        };
        return match format {
            NDHWC => Ok(vec![n, d, h, w, c]),
            NDC1HWC0 => Ok(vec![n, d, ceil_div(c, c0), h, w, c0]),
            FRACTAL_Z_3D => Ok(vec![
                mul(&[d, ceil_div(c, c0), h, w]),
                ceil_div(n, CUBE),
                CUBE,
                c0,
            ]),
            _ => unreachable!(),
        };
    }

    let &[n, c, h, w] = shape else {
        return Err(invalid_shape(format!(
            "{format} requires a 4-d shape, got {shape:?}"
        )));
    };
    match format {
        NHWC => Ok(vec![n, h, w, c]),
        HWCN => Ok(vec![h, w, c, n]),
        NC1HWC0 => Ok(vec![n, ceil_div(c, c0), h, w, c0]),
        FRACTAL_Z => Ok(vec![
            mul(&[ceil_div(c, c0), h, w]),
            ceil_div(n, CUBE),
            CUBE,
            c0,
        ]),
        C1HWNCOC0 => Ok(vec![ceil_div(c, c0), h, w, n, CUBE, c0]),
        _ => Err(invalid_format(format!("unknown device format {format}"))),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_need_padding() {
        assert!(!is_need_padding(ND, &[3]));
        assert!(!is_need_padding(FRACTAL_NZ, &[3, 4]));
        assert!(is_need_padding(NC1HWC0, &[3]));
        assert!(!is_need_padding(NC1HWC0, &[1, 3, 4, 4]));
        assert!(is_need_padding(NDC1HWC0, &[1, 3, 4, 4]));
        assert!(!is_need_padding(NC1HWC0, &[-2]));
        assert!(!is_need_padding(NC1HWC0, &[]));
    }

    #[test]
    fn test_padding() {
        assert_eq!(padding_shape(&[8], NC1HWC0, ""), [1, 8, 1, 1]);
        assert_eq!(padding_shape(&[8, 5], NC1HWC0, ""), [1, 8, 5, 1]);
        assert_eq!(padding_shape(&[8, 5], NC1HWC0, "NC"), [8, 5, 1, 1]);
        assert_eq!(padding_shape(&[8], NC1HWC0, "W"), [1, 1, 1, 8]);
        assert_eq!(padding_shape(&[8], NC1HWC0, "XY"), [1, 8, 1, 1]);
        assert_eq!(padding_shape(&[8], NDC1HWC0, ""), [1, 8, 1, 1, 1]);
        assert_eq!(padding_shape(&[1, 2, 3, 4], NC1HWC0, ""), [1, 2, 3, 4]);
    }

    #[test]
    fn test_trans() {
        let f32 = TypeId::Float32;
        assert_eq!(trans_shape_to_device(&[2, 3], ND, f32).unwrap(), [2, 3]);
        assert_eq!(
            trans_shape_to_device(&[2, 3, 4, 5], NHWC, f32).unwrap(),
            [2, 4, 5, 3]
        );
        assert_eq!(
            trans_shape_to_device(&[2, 17, 4, 5], NC1HWC0, f32).unwrap(),
            [2, 2, 4, 5, 16]
        );
        assert_eq!(
            trans_shape_to_device(&[2, 17, 4, 5], NC1HWC0, TypeId::Int8).unwrap(),
            [2, 1, 4, 5, 32]
        );
        assert_eq!(
            trans_shape_to_device(&[2, -1, 4, 5], NC1HWC0, f32).unwrap(),
            [2, -1, 4, 5, 16]
        );
        assert_eq!(
            trans_shape_to_device(&[32, 16, 3, 3], FRACTAL_Z, f32).unwrap(),
            [9, 2, 16, 16]
        );
        assert_eq!(
            trans_shape_to_device(&[4, 20, 40], FRACTAL_NZ, f32).unwrap(),
            [4, 3, 2, 16, 16]
        );
        assert_eq!(
            trans_shape_to_device(&[1, 17, 2, 4, 4], NDC1HWC0, f32).unwrap(),
            [1, 2, 2, 4, 4, 16]
        );
        assert!(trans_shape_to_device(&[2, 3], NC1HWC0, f32).is_err());
        assert!(trans_shape_to_device(&[2, 3, 4, 5], "unknown", f32).is_err());
    }

    #[test]
    fn test_pad_then_trans() {
        // 先补齐再重排，C 轴落在补齐后的第 1 维
        let padded = padding_shape(&[17], NHWC, "");
        assert_eq!(
            trans_shape_to_device(&padded, NHWC, TypeId::Float16).unwrap(),
            [1, 1, 1, 17]
        );
    }
}
