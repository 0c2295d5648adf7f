pub mod handle;
pub mod meta;

pub use handle::*;
pub use meta::*;
