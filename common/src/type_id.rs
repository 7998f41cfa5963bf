use digit_layout::{types as ty, DigitLayout};
use std::fmt;

/// 张量元素和标量的数据类型。
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum TypeId {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float16,
    BFloat16,
    Float32,
    Float64,
    Complex64,
    Complex128,
    String,
    /// 未选定或无效的类型。
    Unknown,
}

impl TypeId {
    /// 元素的字节宽度。
    pub const fn size(self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 | Self::Float16 | Self::BFloat16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 | Self::Complex64 => 8,
            Self::Complex128 => 16,
            Self::String | Self::Unknown => 0,
        }
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    #[inline]
    pub const fn is_int(self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::UInt8
                | Self::UInt16
                | Self::UInt32
                | Self::UInt64
        )
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(
            self,
            Self::Float16 | Self::BFloat16 | Self::Float32 | Self::Float64
        )
    }

    /// 对应的数字布局，没有对应布局的类型返回 [None]。
    pub fn digit_layout(self) -> Option<DigitLayout> {
        Some(match self {
            Self::Int8 => ty::I8,
            Self::Int16 => ty::I16,
            Self::Int32 => ty::I32,
            Self::Int64 => ty::I64,
            Self::UInt8 => ty::U8,
            Self::UInt16 => ty::U16,
            Self::UInt32 => ty::U32,
            Self::UInt64 => ty::U64,
            Self::Float16 => ty::F16,
            Self::BFloat16 => ty::BF16,
            Self::Float32 => ty::F32,
            Self::Float64 => ty::F64,
            Self::Bool | Self::Complex64 | Self::Complex128 | Self::String | Self::Unknown => {
                return None
            }
        })
    }

    pub fn from_digit_layout(dt: DigitLayout) -> Self {
        const TABLE: [(DigitLayout, TypeId); 12] = [
            (ty::I8, TypeId::Int8),
            (ty::I16, TypeId::Int16),
            (ty::I32, TypeId::Int32),
            (ty::I64, TypeId::Int64),
            (ty::U8, TypeId::UInt8),
            (ty::U16, TypeId::UInt16),
            (ty::U32, TypeId::UInt32),
            (ty::U64, TypeId::UInt64),
            (ty::F16, TypeId::Float16),
            (ty::BF16, TypeId::BFloat16),
            (ty::F32, TypeId::Float32),
            (ty::F64, TypeId::Float64),
        ];
        TABLE
            .iter()
            .find(|(layout, _)| *layout == dt)
            .map_or(Self::Unknown, |(_, id)| *id)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Bool => "Bool",
            Self::Int8 => "Int8",
            Self::Int16 => "Int16",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::UInt8 => "UInt8",
            Self::UInt16 => "UInt16",
            Self::UInt32 => "UInt32",
            Self::UInt64 => "UInt64",
            Self::Float16 => "Float16",
            Self::BFloat16 => "BFloat16",
            Self::Float32 => "Float32",
            Self::Float64 => "Float64",
            Self::Complex64 => "Complex64",
            Self::Complex128 => "Complex128",
            Self::String => "String",
            Self::Unknown => "TypeUnknown",
        };
        f.write_str(name)
    }
}

#[test]
fn test_digit_layout() {
    for id in [TypeId::Int32, TypeId::Float16, TypeId::UInt64, TypeId::Float64] {
        let dt = id.digit_layout().unwrap();
        assert_eq!(dt.nbytes(), id.size());
        assert_eq!(TypeId::from_digit_layout(dt), id);
    }
    assert!(TypeId::Bool.digit_layout().is_none());
    assert_eq!(TypeId::Unknown.size(), 0);
    assert!(!TypeId::Unknown.is_valid());
}
