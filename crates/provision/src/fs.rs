//! File system abstractions

mod filesystem;
pub mod real;

#[cfg(any(test, feature = "with_mocks"))]
pub use filesystem::MockFileSystem;
pub use filesystem::{FileSystem, FileSystemError};
