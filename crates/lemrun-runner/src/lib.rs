pub mod batch;
pub mod config;
pub mod doctor;
pub mod launcher;
pub mod manifest;
pub mod provenance;
pub mod util;

pub use batch::*;
pub use config::*;
pub use doctor::*;
pub use launcher::*;
pub use manifest::*;
pub use provenance::*;
pub use util::*;
