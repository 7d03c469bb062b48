// Renderer error taxonomy
//
// Two kinds of failure, both fatal:
// - Configuration: a required capability is missing (layer, extension, GPU)
// - Runtime: a Vulkan/platform call failed after preconditions were met

use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RendererError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, RendererError>;

/// Attach a description to a failed call, turning it into a `Runtime` error.
pub trait RuntimeContext<T> {
    fn context(self, what: &str) -> Result<T>;
}

impl<T, E: Display> RuntimeContext<T> for std::result::Result<T, E> {
    fn context(self, what: &str) -> Result<T> {
        self.map_err(|e| RendererError::Runtime(format!("{}: {}", what, e)))
    }
}
