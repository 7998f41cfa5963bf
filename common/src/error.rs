use core::fmt;
use std::error::Error;

/// 带有源码位置的错误信息。
#[derive(Clone)]
pub struct ErrorPosition {
    file: &'static str,
    line: u32,
    message: String,
}

impl Error for ErrorPosition {}

impl ErrorPosition {
    #[inline]
    pub const fn new(file: &'static str, line: u32, message: String) -> Self {
        Self {
            file,
            line,
            message,
        }
    }

    #[inline]
    pub const fn file(&self) -> &'static str {
        self.file
    }

    #[inline]
    pub const fn line(&self) -> u32 {
        self.line
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Debug for ErrorPosition {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for ErrorPosition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let Self {
            file,
            line,
            message,
        } = self;
        write!(f, "{file}:{line}: \"{message}\"")
    }
}

#[macro_export]
macro_rules! locate_error {
    ($msg:expr) => {
        $crate::ErrorPosition::new(file!(), line!(), $msg.to_string())
    };
    () => {
        $crate::locate_error!("Error occurred")
    };
}

#[test]
fn test_locate_error() {
    fn error() -> ErrorPosition {
        locate_error!("missing kernel info")
    }
    let e = error();
    assert!(e.file().ends_with("error.rs"));
    assert_eq!(e.message(), "missing kernel info");
    assert!(e.to_string().contains("\"missing kernel info\""));
}
