pub mod comm;
pub mod config;
pub mod console;
mod error;
pub mod game_ini;
pub mod installer;
pub mod instance;

pub use error::AdapterError;
pub use instance::{AdapterOptions, Satisfactory};
