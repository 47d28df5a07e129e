//! Shared types for the Antigravity quota workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
