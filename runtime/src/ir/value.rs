use super::{Abstract, AbstractSequence, MonadKind, SeqKind, Shape};
use crate::device::AddressId;
use ::common::TypeId;
use std::sync::{Arc, RwLock};

/// 编译期可知的值。
#[derive(Clone, Debug)]
pub enum Value {
    /// 值未知。
    Any,
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Sequence(Vec<Value>),
    Tensor(Arc<HostTensor>),
    Monad(MonadKind),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Any, Self::Any) | (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Sequence(a), Self::Sequence(b)) => a == b,
            (Self::Tensor(a), Self::Tensor(b)) => Arc::ptr_eq(a, b),
            (Self::Monad(a), Self::Monad(b)) => a == b,
            _ => false,
        }
    }
}

impl From<i64> for Value {
    #[inline]
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Value {
    #[inline]
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&[i64]> for Value {
    #[inline]
    fn from(value: &[i64]) -> Self {
        Self::Sequence(value.iter().map(|&v| Self::Int(v)).collect())
    }
}

impl Value {
    #[inline]
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    #[inline]
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::Str(_)
        )
    }

    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_tensor(&self) -> Option<&Arc<HostTensor>> {
        match self {
            Self::Tensor(t) => Some(t),
            _ => None,
        }
    }

    /// 值中包含的所有张量，按深度优先顺序。
    pub fn tensors(&self) -> Vec<&Arc<HostTensor>> {
        match self {
            Self::Tensor(t) => vec![t],
            Self::Sequence(items) => items.iter().flat_map(Self::tensors).collect(),
            _ => vec![],
        }
    }

    /// 为值构造抽象。
    pub fn to_abstract(&self) -> Abstract {
        match self {
            Self::Any => Abstract::Scalar {
                dtype: TypeId::Unknown,
                value: Self::Any,
            },
            Self::None => Abstract::None,
            Self::Bool(_) => Abstract::Scalar {
                dtype: TypeId::Bool,
                value: self.clone(),
            },
            Self::Int(_) => Abstract::Scalar {
                dtype: TypeId::Int64,
                value: self.clone(),
            },
            Self::Float(_) => Abstract::Scalar {
                dtype: TypeId::Float32,
                value: self.clone(),
            },
            Self::Str(_) => Abstract::Scalar {
                dtype: TypeId::String,
                value: self.clone(),
            },
            Self::Sequence(items) => Abstract::Sequence(AbstractSequence {
                kind: SeqKind::Tuple,
                elements: items.iter().map(Self::to_abstract).collect(),
                dynamic_len: false,
                dynamic_element: None,
            }),
            Self::Tensor(t) => Abstract::Tensor {
                dtype: t.dtype(),
                shape: Shape::new(t.shape()),
                value: self.clone(),
            },
            Self::Monad(kind) => Abstract::Monad(*kind),
        }
    }
}

/// 主机侧张量。
#[derive(Debug)]
pub struct HostTensor {
    dtype: TypeId,
    shape: Vec<i64>,
    data: RwLock<Vec<u8>>,
    device_address: Option<AddressId>,
    forward_output: bool,
}

impl HostTensor {
    pub fn new(dtype: TypeId, shape: impl Into<Vec<i64>>, data: Vec<u8>) -> Self {
        Self {
            dtype,
            shape: shape.into(),
            data: RwLock::new(data),
            device_address: None,
            forward_output: false,
        }
    }

    /// 一维 int64 张量。
    pub fn from_i64s(values: &[i64]) -> Self {
        let data = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        Self::new(TypeId::Int64, [values.len() as i64], data)
    }

    /// 一维 int32 张量。
    pub fn from_i32s(values: &[i32]) -> Self {
        let data = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        Self::new(TypeId::Int32, [values.len() as i64], data)
    }

    /// 绑定设备地址。
    #[inline]
    pub fn with_device_address(mut self, address: AddressId) -> Self {
        self.device_address = Some(address);
        self
    }

    /// 标记为前向计算得到的输出。
    #[inline]
    pub fn forward_output(mut self) -> Self {
        self.forward_output = true;
        self
    }

    #[inline]
    pub fn dtype(&self) -> TypeId {
        self.dtype
    }

    #[inline]
    pub fn shape(&self) -> &[i64] {
        &self.shape
    }

    #[inline]
    pub fn device_address(&self) -> Option<AddressId> {
        self.device_address
    }

    #[inline]
    pub fn is_forward_output(&self) -> bool {
        self.forward_output
    }

    /// 主机数据的拷贝。
    pub fn data(&self) -> Vec<u8> {
        self.data.read().unwrap().clone()
    }

    /// 覆写主机数据。
    pub fn write_data(&self, bytes: &[u8]) {
        let mut data = self.data.write().unwrap();
        data.clear();
        data.extend_from_slice(bytes);
    }

    /// 将整数张量读出为 int64 序列，非整数类型返回 [None]。
    pub fn to_i64s(&self) -> Option<Vec<i64>> {
        macro_rules! read {
            ($data:expr; $ty:ty) => {
                $data
                    .chunks_exact(size_of::<$ty>())
                    .map(|b| <$ty>::from_ne_bytes(b.try_into().unwrap()) as i64)
                    .collect()
            };
        }

        let data = self.data.read().unwrap();
        Some(match self.dtype {
            TypeId::Int8 => read!(data; i8),
            TypeId::Int16 => read!(data; i16),
            TypeId::Int32 => read!(data; i32),
            TypeId::Int64 => read!(data; i64),
            TypeId::UInt8 => read!(data; u8),
            TypeId::UInt16 => read!(data; u16),
            TypeId::UInt32 => read!(data; u32),
            TypeId::UInt64 => read!(data; u64),
            _ => return None,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_int_tensor() {
        let t = HostTensor::from_i32s(&[2, -1, 4]);
        assert_eq!(t.shape(), &[3]);
        assert_eq!(t.to_i64s(), Some(vec![2, -1, 4]));

        let f = HostTensor::new(TypeId::Float32, [1], 1f32.to_ne_bytes().to_vec());
        assert_eq!(f.to_i64s(), None);
    }

    #[test]
    fn test_value_abstract() {
        let v = Value::from(&[1i64, 2][..]);
        let abs = v.to_abstract();
        assert_eq!(abs.build_value(), v);
        assert!(Value::Any.to_abstract().build_value().is_any());

        let t = Arc::new(HostTensor::from_i64s(&[3]));
        let tv = Value::Tensor(t.clone());
        assert_eq!(tv, Value::Tensor(t));
        assert_ne!(tv, Value::Tensor(Arc::new(HostTensor::from_i64s(&[3]))));
        assert_eq!(tv.tensors().len(), 1);
    }
}
