pub mod bridge;
pub mod config;
pub mod console;
pub mod error;
pub mod jobs;

pub use error::{Error, Result};
