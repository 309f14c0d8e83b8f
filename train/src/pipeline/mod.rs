//! Sample queues, loader threads and mini-batch assembly.

mod batch;
mod loader;
mod queue;
mod source;

pub use batch::*;
pub use loader::*;
pub use queue::*;
pub use source::*;
