pub mod resolved;
pub mod types;
pub mod validator;

pub use resolved::*;
pub use types::*;
pub use validator::*;
