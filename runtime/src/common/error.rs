use ::common::ErrorPosition;
use std::{error::Error, fmt};

/// 结构性错误的种类。
///
/// 结构性错误表示更早的编译阶段存在缺陷，无法在本地恢复。
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FatalErrorKind {
    /// 缺少必需的协作对象，如核信息、构建信息、核模块或符号引擎。
    NullCollaborator,
    MissingAddress,
    IndexOutOfRange,
    UnsupportedType,
    InvalidShape,
    InvalidFormat,
    InvalidDeviceType,
    /// 节点种类不符合操作要求。
    InvalidNode,
    SyncFailed,
    InferFailed,
}

#[derive(Clone, Debug)]
pub struct FatalError {
    pub kind: FatalErrorKind,
    pub info: String,
    /// 出错节点的调试字符串。
    pub node: Option<String>,
    pub position: Option<ErrorPosition>,
}

impl FatalError {
    #[inline]
    pub fn new(kind: FatalErrorKind, info: String) -> Self {
        Self {
            kind,
            info,
            node: None,
            position: None,
        }
    }

    /// 附加出错节点。
    #[inline]
    pub fn at(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    /// 附加源码位置。
    #[inline]
    pub fn located(mut self, position: ErrorPosition) -> Self {
        self.position = Some(position);
        self
    }
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.info)?;
        if let Some(node) = &self.node {
            write!(f, ", node: {node}")?;
        }
        if let Some(position) = &self.position {
            write!(f, " ({position})")?;
        }
        Ok(())
    }
}

impl Error for FatalError {}

pub const KRET_OK: i32 = 0;
pub const KRET_RESIZE_FAILED: i32 = 1;
pub const KRET_UNKNOWN_SHAPE: i32 = 2;
pub const KRET_UNKNOWN_OUT_SHAPE: i32 = 3;

/// 动态形状重算失败的种类，调用者可以在更多上游节点执行后重试。
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ResizeErrorKind {
    ResizeFailed,
    UnknownShape,
    UnknownOutShape,
}

#[derive(Clone, Debug)]
pub struct ResizeError {
    pub kind: ResizeErrorKind,
    pub info: String,
}

impl ResizeError {
    #[inline]
    pub fn new(kind: ResizeErrorKind, info: String) -> Self {
        Self { kind, info }
    }

    /// 对应的状态码。
    #[inline]
    pub const fn status(&self) -> i32 {
        match self.kind {
            ResizeErrorKind::ResizeFailed => KRET_RESIZE_FAILED,
            ResizeErrorKind::UnknownShape => KRET_UNKNOWN_SHAPE,
            ResizeErrorKind::UnknownOutShape => KRET_UNKNOWN_OUT_SHAPE,
        }
    }
}

impl fmt::Display for ResizeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}({}): {}", self.kind, self.status(), self.info)
    }
}

impl Error for ResizeError {}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LaunchErrorKind {
    ArgsNotSupport,
    ExecutionFailed,
}

#[derive(Clone, Debug)]
pub struct LaunchError {
    pub kind: LaunchErrorKind,
    pub info: String,
}

impl LaunchError {
    #[inline]
    pub fn new(kind: LaunchErrorKind, info: String) -> Self {
        Self { kind, info }
    }
}

impl fmt::Display for LaunchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.info)
    }
}

impl Error for LaunchError {}

pub(super) mod functions {
    use super::{
        FatalError, FatalErrorKind::*, LaunchError, LaunchErrorKind::*, ResizeError,
        ResizeErrorKind::*,
    };

    macro_rules! builder {
        ($ty:ident: $name:ident $kind:expr) => {
            #[inline]
            pub fn $name(info: impl Into<String>) -> $ty {
                $ty::new($kind, info.into())
            }
        };
    }

    builder!(FatalError: null_collaborator   NullCollaborator );
    builder!(FatalError: missing_address     MissingAddress   );
    builder!(FatalError: index_out_of_range  IndexOutOfRange  );
    builder!(FatalError: unsupported_type    UnsupportedType  );
    builder!(FatalError: invalid_shape       InvalidShape     );
    builder!(FatalError: invalid_format      InvalidFormat    );
    builder!(FatalError: invalid_device_type InvalidDeviceType);
    builder!(FatalError: invalid_node        InvalidNode      );
    builder!(FatalError: sync_failed         SyncFailed       );
    builder!(FatalError: infer_failed        InferFailed      );

    builder!(ResizeError: resize_failed      ResizeFailed     );
    builder!(ResizeError: unknown_shape      UnknownShape     );
    builder!(ResizeError: unknown_out_shape  UnknownOutShape  );

    builder!(LaunchError: args_not_support   ArgsNotSupport   );
    builder!(LaunchError: execution_failed   ExecutionFailed  );
}

#[cfg(test)]
mod test {
    use super::functions::*;
    use super::*;
    use ::common::locate_error;

    #[test]
    fn test_fatal_display() {
        let e = missing_address("output 1 is not exist")
            .at("Add-op0")
            .located(locate_error!("address"));
        assert_eq!(e.kind, FatalErrorKind::MissingAddress);
        let text = e.to_string();
        assert!(text.starts_with("MissingAddress: output 1 is not exist, node: Add-op0"));
        assert!(text.contains("error.rs"));
    }

    #[test]
    fn test_resize_status() {
        assert_eq!(resize_failed("").status(), KRET_RESIZE_FAILED);
        assert_eq!(unknown_shape("").status(), KRET_UNKNOWN_SHAPE);
        assert_eq!(unknown_out_shape("").status(), KRET_UNKNOWN_OUT_SHAPE);
        assert_ne!(KRET_OK, KRET_RESIZE_FAILED);
    }
}
