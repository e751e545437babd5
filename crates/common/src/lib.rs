//! Common types for the token-session workspace

mod error;
mod secret;
pub mod telemetry;

pub use error::{Error, Result};
pub use secret::Secret;
