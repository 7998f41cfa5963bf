use super::{BaseShape, MonadKind, ObjectType, SeqType, Shape, Type, Value};
use ::common::TypeId;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SeqKind {
    Tuple,
    List,
}

/// 节点的抽象值，即编译期的形状、类型和可选的值。
#[derive(Clone, PartialEq, Debug)]
pub enum Abstract {
    Tensor {
        dtype: TypeId,
        shape: Shape,
        value: Value,
    },
    /// 数字、布尔或字符串标量。
    Scalar {
        dtype: TypeId,
        value: Value,
    },
    Sequence(AbstractSequence),
    None,
    Monad(MonadKind),
    CsrTensor {
        dtype: TypeId,
        shape: Shape,
    },
    CooTensor {
        dtype: TypeId,
        shape: Shape,
    },
}

#[derive(Clone, PartialEq, Debug)]
pub struct AbstractSequence {
    pub kind: SeqKind,
    pub elements: Vec<Abstract>,
    pub dynamic_len: bool,
    pub dynamic_element: Option<Box<Abstract>>,
}

impl Abstract {
    #[inline]
    pub fn tensor(dtype: TypeId, dims: impl Into<Vec<i64>>) -> Self {
        Self::Tensor {
            dtype,
            shape: Shape::new(dims),
            value: Value::Any,
        }
    }

    #[inline]
    pub fn scalar(dtype: TypeId) -> Self {
        Self::Scalar {
            dtype,
            value: Value::Any,
        }
    }

    #[inline]
    pub fn tuple(elements: Vec<Abstract>) -> Self {
        Self::Sequence(AbstractSequence {
            kind: SeqKind::Tuple,
            elements,
            dynamic_len: false,
            dynamic_element: None,
        })
    }

    #[inline]
    pub fn list(elements: Vec<Abstract>) -> Self {
        Self::Sequence(AbstractSequence {
            kind: SeqKind::List,
            elements,
            dynamic_len: false,
            dynamic_element: None,
        })
    }

    #[inline]
    pub fn dynamic_tuple(element: Option<Abstract>) -> Self {
        Self::Sequence(AbstractSequence {
            kind: SeqKind::Tuple,
            elements: vec![],
            dynamic_len: true,
            dynamic_element: element.map(Box::new),
        })
    }

    pub fn build_type(&self) -> Type {
        match self {
            Self::Tensor { dtype, .. } => Type::Tensor(*dtype),
            Self::Scalar {
                dtype: TypeId::String,
                ..
            } => Type::String,
            Self::Scalar { dtype, .. } => Type::Number(*dtype),
            Self::Sequence(seq) => {
                let ty = SeqType {
                    elements: seq.elements.iter().map(Self::build_type).collect(),
                    dynamic_len: seq.dynamic_len,
                    dynamic_element: seq
                        .dynamic_element
                        .as_ref()
                        .map(|e| Box::new(e.build_type())),
                };
                match seq.kind {
                    SeqKind::Tuple => Type::Tuple(ty),
                    SeqKind::List => Type::List(ty),
                }
            }
            Self::None => Type::None,
            Self::Monad(kind) => Type::Monad(*kind),
            Self::CsrTensor { dtype, .. } => Type::CsrTensor(*dtype),
            Self::CooTensor { dtype, .. } => Type::CooTensor(*dtype),
        }
    }

    pub fn build_shape(&self) -> BaseShape {
        match self {
            Self::Tensor { shape, .. } | Self::CsrTensor { shape, .. } | Self::CooTensor { shape, .. } => {
                BaseShape::Shape(shape.clone())
            }
            Self::Sequence(seq) if seq.dynamic_len => BaseShape::DynamicSequence(
                seq.dynamic_element
                    .as_ref()
                    .map(|e| Box::new(e.build_shape())),
            ),
            Self::Sequence(seq) => {
                let shapes = seq.elements.iter().map(Self::build_shape).collect();
                match seq.kind {
                    SeqKind::Tuple => BaseShape::Tuple(shapes),
                    SeqKind::List => BaseShape::List(shapes),
                }
            }
            Self::Scalar { .. } | Self::None | Self::Monad(_) => BaseShape::NoShape,
        }
    }

    pub fn build_value(&self) -> Value {
        match self {
            Self::Tensor { value, .. } | Self::Scalar { value, .. } => value.clone(),
            Self::Sequence(seq) if seq.dynamic_len => Value::Any,
            Self::Sequence(seq) => {
                let values = seq
                    .elements
                    .iter()
                    .map(Self::build_value)
                    .collect::<Vec<_>>();
                if values.iter().any(Value::is_any) {
                    Value::Any
                } else {
                    Value::Sequence(values)
                }
            }
            Self::None => Value::None,
            Self::Monad(kind) => Value::Monad(*kind),
            Self::CsrTensor { .. } | Self::CooTensor { .. } => Value::Any,
        }
    }

    /// 设置张量或标量的值，其他抽象不接受值。
    pub fn set_value(&mut self, v: Value) -> bool {
        match self {
            Self::Tensor { value, .. } | Self::Scalar { value, .. } => {
                *value = v;
                true
            }
            _ => false,
        }
    }

    /// 对应的对象类型。
    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Tensor { .. } => ObjectType::Tensor,
            Self::Sequence(AbstractSequence {
                kind: SeqKind::Tuple,
                ..
            }) => ObjectType::Tuple,
            Self::Sequence(AbstractSequence {
                kind: SeqKind::List,
                ..
            }) => ObjectType::List,
            Self::Scalar { .. } => ObjectType::Number,
            Self::None => ObjectType::MetaTypeNone,
            Self::Monad(_) | Self::CsrTensor { .. } | Self::CooTensor { .. } => {
                ObjectType::Unknown
            }
        }
    }

    #[inline]
    pub fn as_sequence(&self) -> Option<&AbstractSequence> {
        match self {
            Self::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    #[inline]
    pub fn as_sequence_mut(&mut self) -> Option<&mut AbstractSequence> {
        match self {
            Self::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    #[inline]
    pub fn is_dynamic_sequence(&self) -> bool {
        matches!(self, Self::Sequence(seq) if seq.dynamic_len)
    }

    #[inline]
    pub fn is_monad(&self) -> bool {
        matches!(self, Self::Monad(_))
    }

    #[inline]
    pub fn is_sparse(&self) -> bool {
        matches!(self, Self::CsrTensor { .. } | Self::CooTensor { .. })
    }

    #[inline]
    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar { .. })
    }

    /// 标量，或含有标量元素的序列。
    pub fn contains_scalar_out(&self) -> bool {
        match self {
            Self::Scalar { .. } => true,
            // 未声明元素的动态序列按标量处理
            Self::Sequence(seq) if seq.dynamic_len => {
                seq.dynamic_element.as_deref().map_or(true, Self::is_scalar)
            }
            Self::Sequence(seq) => seq.elements.iter().any(Self::contains_scalar_out),
            _ => false,
        }
    }
}
