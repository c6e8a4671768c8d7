//! Output sink adapters.

mod attributes;
mod file;
mod memory;
mod stdout;
mod tar;
mod tree;

pub use attributes::{DetachedAttributes, LocalFileAttributes};
pub use file::FileSink;
pub use memory::MemorySink;
pub use stdout::StdoutSink;
pub use tar::{DEFAULT_ENTRY_MODE, TarSink};
pub use tree::TreeSink;
