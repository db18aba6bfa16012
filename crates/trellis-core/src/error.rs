//! Errors produced while compiling a node tree to markup.

use thiserror::Error;

/// A node tree that cannot be turned into markup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    /// An attribute or listener was not placed under any element.
    #[error("attribute `{name}` has no enclosing element")]
    OrphanAttribute {
        /// Attribute name, or `on:<event>` for listeners.
        name: String,
    },

    /// A void element such as `input` was given text or child elements.
    #[error("<{tag}> is a void element and cannot have content")]
    VoidContent { tag: &'static str },
}

pub type Result<T> = std::result::Result<T, MarkupError>;
