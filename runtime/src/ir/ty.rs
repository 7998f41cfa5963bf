use ::common::TypeId;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MonadKind {
    U,
    IO,
}

/// 对象层面的类型标识。
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ObjectType {
    Tensor,
    Tuple,
    List,
    Number,
    String,
    MetaTypeNone,
    Monad,
    CsrTensor,
    CooTensor,
    Unknown,
}

#[derive(Clone, PartialEq, Debug)]
pub enum Type {
    Tensor(TypeId),
    Number(TypeId),
    String,
    Tuple(SeqType),
    List(SeqType),
    /// 空类型，即 `TypeNone`。
    None,
    Monad(MonadKind),
    CsrTensor(TypeId),
    CooTensor(TypeId),
    Function,
}

/// 序列类型。
#[derive(Clone, Default, PartialEq, Debug)]
pub struct SeqType {
    pub elements: Vec<Type>,
    /// 长度在运行时才确定。
    pub dynamic_len: bool,
    /// 动态长度序列声明的元素类型。
    pub dynamic_element: Option<Box<Type>>,
}

impl Type {
    #[inline]
    pub fn tuple(elements: Vec<Type>) -> Self {
        Self::Tuple(SeqType {
            elements,
            ..Default::default()
        })
    }

    #[inline]
    pub fn dynamic_tuple(element: Option<Type>) -> Self {
        Self::Tuple(SeqType {
            elements: vec![],
            dynamic_len: true,
            dynamic_element: element.map(Box::new),
        })
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Tensor(_) => ObjectType::Tensor,
            Self::Number(_) => ObjectType::Number,
            Self::String => ObjectType::String,
            Self::Tuple(_) => ObjectType::Tuple,
            Self::List(_) => ObjectType::List,
            Self::None => ObjectType::MetaTypeNone,
            Self::Monad(_) => ObjectType::Monad,
            Self::CsrTensor(_) => ObjectType::CsrTensor,
            Self::CooTensor(_) => ObjectType::CooTensor,
            Self::Function => ObjectType::Unknown,
        }
    }

    #[inline]
    pub fn as_sequence(&self) -> Option<&SeqType> {
        match self {
            Self::Tuple(seq) | Self::List(seq) => Some(seq),
            _ => None,
        }
    }

    /// 张量或标量的元素类型。
    pub fn element(&self) -> Option<TypeId> {
        match self {
            Self::Tensor(dt) | Self::Number(dt) | Self::CsrTensor(dt) | Self::CooTensor(dt) => {
                Some(*dt)
            }
            Self::String => Some(TypeId::String),
            _ => None,
        }
    }

    #[inline]
    pub fn is_monad(&self) -> bool {
        matches!(self, Self::Monad(_))
    }
}
