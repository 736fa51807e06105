//! Core data types and I/O operations.

pub mod loaders;
pub mod transforms;
pub mod writers;

pub use loaders::{HeaderBlock, LoaderError, MotionTable, Recording};
pub use transforms::TransformError;
pub use writers::{base_name, OutputPaths, WriteError};
