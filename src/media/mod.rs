mod storage;

pub use storage::{MediaError, MediaKind, MediaStorage};
