pub mod contract;
pub mod detect;
pub mod types;

pub use detect::*;
pub use types::*;
