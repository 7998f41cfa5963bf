use ::common::is_dynamic_shape;

/// 张量形状，可以携带动态维度的上界。
#[derive(Clone, Default, PartialEq, Eq, Hash, Debug)]
pub struct Shape {
    pub dims: Vec<i64>,
    pub max_shape: Vec<i64>,
}

impl Shape {
    #[inline]
    pub fn new(dims: impl Into<Vec<i64>>) -> Self {
        Self {
            dims: dims.into(),
            max_shape: vec![],
        }
    }

    #[inline]
    pub fn with_max(dims: impl Into<Vec<i64>>, max_shape: impl Into<Vec<i64>>) -> Self {
        Self {
            dims: dims.into(),
            max_shape: max_shape.into(),
        }
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        is_dynamic_shape(&self.dims)
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum BaseShape {
    Shape(Shape),
    Tuple(Vec<BaseShape>),
    List(Vec<BaseShape>),
    /// 长度未知的序列，可以声明元素形状。
    DynamicSequence(Option<Box<BaseShape>>),
    NoShape,
}

impl BaseShape {
    #[inline]
    pub fn tensor(dims: impl Into<Vec<i64>>) -> Self {
        Self::Shape(Shape::new(dims))
    }

    /// 平铺的形状向量，只有张量形状有意义。
    #[inline]
    pub fn shape_vector(&self) -> &[i64] {
        match self {
            Self::Shape(shape) => &shape.dims,
            _ => &[],
        }
    }

    #[inline]
    pub fn as_shape(&self) -> Option<&Shape> {
        match self {
            Self::Shape(shape) => Some(shape),
            _ => None,
        }
    }

    #[inline]
    pub fn elements(&self) -> Option<&[BaseShape]> {
        match self {
            Self::Tuple(elements) | Self::List(elements) => Some(elements),
            _ => None,
        }
    }

    #[inline]
    pub fn is_dynamic_sequence(&self) -> bool {
        matches!(self, Self::DynamicSequence(_))
    }

    pub fn is_dynamic(&self) -> bool {
        match self {
            Self::Shape(shape) => shape.is_dynamic(),
            Self::Tuple(elements) | Self::List(elements) => elements.iter().any(Self::is_dynamic),
            Self::DynamicSequence(_) => true,
            Self::NoShape => false,
        }
    }

    /// 替换张量形状的维度，维度数变化时丢弃上界。
    pub fn set_shape_vector(&mut self, dims: &[i64]) {
        match self {
            Self::Shape(shape) => {
                if shape.max_shape.len() != dims.len() {
                    shape.max_shape.clear()
                }
                shape.dims = dims.to_vec()
            }
            _ => *self = Self::tensor(dims),
        }
    }
}
