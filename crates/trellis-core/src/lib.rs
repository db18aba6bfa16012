//! Core of the trellis UI runtime: hooks, markup compilation and event
//! bindings.

pub mod bindings;
pub mod change;
pub mod convert;
pub mod dom;
pub mod error;
pub mod key;
pub mod markup;
pub mod memo;
pub mod scope;
pub mod state;

// Re-export hooks for ergonomic state management
pub use scope::{HookMeta, Scope, stylesheet, use_callback, use_effect, use_memo, use_state};

pub use bindings::{ApplyReport, BindingRegistry, BoundValue};
pub use change::{Dependency, detect_changed};
pub use convert::{any_bol, any_flt, any_int, any_str};
pub use dom::{Dom, DomEvent, EventHandler, MemoryDom};
pub use error::MarkupError;
pub use key::{CallSite, HookKey};
pub use markup::{Attribute, Element, Node};
pub use memo::Callback;
pub use state::{CellId, Scheduler, Setter, State};
