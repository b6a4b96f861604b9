pub mod config;
pub mod error;
pub mod profile;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
