//! Misc utilities.

mod checkpoint;
mod overlay;
mod rate_counter;
mod ratio;

pub use checkpoint::*;
pub use overlay::*;
pub use rate_counter::*;
pub use ratio::*;
