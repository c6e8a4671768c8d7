//! Core domain layer for p2.
//!
//! Pure values with no I/O: input data, path metadata, render jobs.
//! Filesystem, templating and encoding concerns sit behind the ports
//! defined in the application layer.
//!
//! ## Hexagonal Architecture Compliance
//!
//! - **No async**: Domain logic is synchronous
//! - **No I/O**: Paths are computed lexically, never resolved on disk
//! - **Immutable values**: All domain objects are Clone + PartialEq

pub mod error;
pub mod input;
pub mod job;
pub mod path_metadata;

pub use error::{DomainError, ErrorCategory};
pub use input::{DataFormat, InputData, is_identifier};
pub use job::{FilenameTransform, LoadedTemplate, OutputTarget, RenderJob};
pub use path_metadata::{PathMetadata, STDOUT_SENTINEL, normalize, relative_path};
