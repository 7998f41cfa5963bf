use crate::{UNKNOWN_DIM, UNKNOWN_RANK};

/// 可能在编译期未知的值。
pub trait ArgVal: Copy {
    fn default_dyn() -> Self;
    fn is_dynamic(&self) -> bool;
}

impl ArgVal for i64 {
    #[inline]
    fn default_dyn() -> Self {
        UNKNOWN_DIM
    }
    #[inline]
    fn is_dynamic(&self) -> bool {
        *self < 0
    }
}

impl ArgVal for usize {
    #[inline]
    fn default_dyn() -> Self {
        Self::MAX
    }
    #[inline]
    fn is_dynamic(&self) -> bool {
        *self == Self::MAX
    }
}

#[inline(always)]
pub fn dyn_<T: ArgVal>() -> T {
    T::default_dyn()
}

/// 形状中存在未知维度。
#[inline]
pub fn is_dynamic_shape(shape: &[i64]) -> bool {
    shape.iter().any(ArgVal::is_dynamic)
}

/// 形状的秩未知。
#[inline]
pub fn is_dynamic_rank(shape: &[i64]) -> bool {
    shape.iter().any(|&d| d == UNKNOWN_RANK)
}

/// 静态形状的元素数。
///
/// 形状含未知维度或乘积溢出时返回 [None]，空形状视为标量，元素数为 1。
pub fn static_count(shape: &[i64]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| {
        if d.is_dynamic() {
            None
        } else {
            acc.checked_mul(d as usize)
        }
    })
}

#[test]
fn test_static_count() {
    assert_eq!(static_count(&[]), Some(1));
    assert_eq!(static_count(&[2, 3, 4]), Some(24));
    assert_eq!(static_count(&[2, 0, 4]), Some(0));
    assert_eq!(static_count(&[2, -1]), None);
    assert_eq!(static_count(&[i64::MAX, 4]), None);
    assert!(is_dynamic_shape(&[1, -1]));
    assert!(!is_dynamic_shape(&[1, 0]));
    assert!(is_dynamic_rank(&[-2]));
    assert_eq!(dyn_::<i64>(), UNKNOWN_DIM);
}
