//! Attribute and listener builders.

use std::fmt;
use std::fmt::Display;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;

use super::Attribute;
use crate::bindings::BoundValue;
use crate::dom::{DomEvent, EventHandler};
use crate::state::State;

/// Arbitrary named attribute.
pub fn attr(name: &'static str, value: impl Display) -> Attribute {
    Attribute::Named {
        name,
        value: value.to_string(),
    }
}

pub fn class_name(value: impl Display) -> Attribute {
    attr("class", value)
}

pub fn style(value: impl Display) -> Attribute {
    attr("style", value)
}

pub fn href(value: impl Display) -> Attribute {
    attr("href", value)
}

pub fn src(value: impl Display) -> Attribute {
    attr("src", value)
}

pub fn value(value: impl Display) -> Attribute {
    attr("value", value)
}

/// Element id. Listeners on the same element reuse it.
pub fn id(value: impl Display) -> Attribute {
    attr("id", value)
}

pub fn type_(value: impl Display) -> Attribute {
    attr("type", value)
}

pub fn placeholder(value: impl Display) -> Attribute {
    attr("placeholder", value)
}

pub fn title(value: impl Display) -> Attribute {
    attr("title", value)
}

/// Event subscription for the enclosing element.
#[derive(Clone)]
pub struct Listener {
    events: Vec<String>,
    target: Option<Arc<dyn BoundValue>>,
    handlers: Vec<EventHandler>,
}

impl Listener {
    /// Run `f` as well, after the handlers already attached.
    pub fn handler(mut self, f: impl Fn(&DomEvent) + 'static) -> Self {
        self.handlers.push(Rc::new(f));
        self
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    /// Cell kept in sync with the control's text, for two-way bindings.
    pub fn target(&self) -> Option<&Arc<dyn BoundValue>> {
        self.target.as_ref()
    }

    pub fn handlers(&self) -> &[EventHandler] {
        &self.handlers
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("events", &self.events)
            .field("two_way", &self.target.is_some())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Listen for `event`.
pub fn on(event: impl Into<String>, f: impl Fn(&DomEvent) + 'static) -> Listener {
    Listener {
        events: vec![event.into()],
        target: None,
        handlers: vec![Rc::new(f)],
    }
}

pub fn on_click(f: impl Fn(&DomEvent) + 'static) -> Listener {
    on("click", f)
}

/// Two-way binding between a form control and `state`.
///
/// Subscribes to `change` and `keyup`. Each event stores the control's text
/// in the cell without requesting a render; chain [`Listener::handler`] to
/// react to the new value. After every commit the control shows the cell's
/// current value.
pub fn on_change<T>(state: &State<T>) -> Listener
where
    T: FromStr + Display + Default + Send + 'static,
{
    Listener {
        events: vec!["change".to_string(), "keyup".to_string()],
        target: Some(Arc::new(state.clone())),
        handlers: Vec::new(),
    }
}
