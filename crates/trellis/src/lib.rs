//! Trellis - a minimal re-rendering UI runtime.
//!
//! Components are plain functions of a [`Scope`]. Every state change re-runs
//! the root component, compiles the resulting node tree to HTML and replaces
//! the mounted markup wholesale. Hooks keep state between runs.
//!
//! # Quick Start
//!
//! ```ignore
//! use trellis::prelude::*;
//!
//! fn app(cx: &Scope) -> Node {
//!     let (name, set_name) = use_state(cx, String::new);
//!     let typed = name.clone();
//!     stylesheet(cx, "app.css");
//!
//!     div((
//!         class_name("card"),
//!         h1(format!("Hello, {name}!")),
//!         input((
//!             placeholder("Your name"),
//!             on_change(&name).handler(move |_| set_name.set(typed.get())),
//!         )),
//!     ))
//!     .into()
//! }
//!
//! fn main() {
//!     trellis::web::start(app).expect("browser document");
//! }
//! ```
//!
//! # Hooks
//!
//! | Hook | Purpose |
//! |------|---------|
//! | [`use_state`] | Persistent cell with a setter that requests a re-render |
//! | [`use_memo`] | Value recomputed only when a dependency changed |
//! | [`use_callback`] | Callback handle replaced only when a dependency changed |
//! | [`use_effect`] | Side effect run when a dependency changed |
//!
//! Hooks are keyed by call site and call order, so a given hook must be
//! reached in the same order on every pass. Use [`Scope::keyed`] for hooks
//! inside lists whose items can move.

pub mod config;
pub mod error;
pub mod runtime;
pub mod stylesheet;

#[cfg(feature = "web")]
pub mod web;

pub mod prelude {
    //! Common imports for trellis applications.
    pub use crate::runtime::{RenderHandle, Runtime, render, render_with};
    pub use crate::{MountPoint, RuntimeConfig};
    pub use trellis_core::markup::*;
    pub use trellis_core::nodes;
    // Hooks for ergonomic state management
    pub use trellis_core::{
        Callback, DomEvent, MemoryDom, Scope, Setter, State, any_bol, any_flt, any_int, any_str,
        stylesheet, use_callback, use_effect, use_memo, use_state,
    };
}

pub use config::{MountPoint, RuntimeConfig};
pub use error::RenderError;
pub use runtime::{CommitStats, RenderHandle, RenderSignal, Runtime, render, render_with};
pub use stylesheet::Stylesheets;
pub use trellis_core::{Scope, stylesheet, use_callback, use_effect, use_memo, use_state};

pub use trellis_core as core;
