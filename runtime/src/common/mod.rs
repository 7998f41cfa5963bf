mod blob;
mod diversity;
mod error;

pub use blob::Blob;
pub use diversity::{CacheSize, Diversity};
pub use error::{
    functions::*, FatalError, FatalErrorKind, LaunchError, LaunchErrorKind, ResizeError,
    ResizeErrorKind, KRET_OK, KRET_RESIZE_FAILED, KRET_UNKNOWN_OUT_SHAPE, KRET_UNKNOWN_SHAPE,
};
