//! Shared types for the RedGifs media proxy workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
