pub mod config;
pub mod error;
pub mod types;

pub use config::UssdConfig;
pub use error::{Result, UssdError};
pub use types::*;
