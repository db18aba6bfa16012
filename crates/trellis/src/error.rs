//! Errors surfaced by the render loop.

use thiserror::Error;
use trellis_core::MarkupError;

#[derive(Error, Debug)]
pub enum RenderError {
    /// The root component produced a tree that cannot be compiled.
    #[error("markup error: {0}")]
    Markup(#[from] MarkupError),

    #[error("mount point `#{0}` not found in document")]
    MountNotFound(String),

    /// The async runtime driving the loop could not be built.
    #[error("failed to start render runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;
