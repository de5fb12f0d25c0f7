//! Data model shared by the launcher, the VCS adapters and the CLI.

pub mod error;
pub mod ids;
pub mod model;
pub mod time;
pub mod types;

pub use error::*;
pub use ids::*;
pub use model::*;
pub use time::*;
pub use types::*;
