//! Dataset index and per-sample records.

mod dataset;
mod imglab;
mod record;

pub use dataset::*;
pub use record::*;
