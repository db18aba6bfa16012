//! Binding registry.
//!
//! Compiling markup records which element ids need which listeners. After the
//! markup has been written to the document, [`BindingRegistry::apply`] looks
//! every element up again and installs the listeners on the live nodes.

use std::fmt;
use std::fmt::Display;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::dom::{Dom, DomEvent, EventHandler};
use crate::state::State;

/// Default prefix for generated element ids.
pub const DEFAULT_ID_PREFIX: &str = "trellis-";

/// A state cell that mirrors the text of a form control.
pub trait BoundValue: Send + Sync {
    /// Store the control's text without requesting a render.
    fn write_text(&self, text: &str);
    /// Text to show in the control.
    fn read_text(&self) -> String;
}

impl<T> BoundValue for State<T>
where
    T: FromStr + Display + Default + Send + 'static,
{
    fn write_text(&self, text: &str) {
        self.set_silently(text.parse().unwrap_or_default());
    }

    fn read_text(&self) -> String {
        self.with(|value| value.to_string())
    }
}

/// One `(element, event)` subscription recorded during compilation.
pub struct Binding {
    element_id: String,
    event: String,
    target: Option<Arc<dyn BoundValue>>,
    handlers: Vec<EventHandler>,
}

impl Binding {
    pub fn element_id(&self) -> &str {
        &self.element_id
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn is_two_way(&self) -> bool {
        self.target.is_some()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("element_id", &self.element_id)
            .field("event", &self.event)
            .field("two_way", &self.target.is_some())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Outcome of [`BindingRegistry::apply`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub installed: usize,
    /// Bindings whose element id was not found in the document.
    pub missing: usize,
}

/// Bindings of the current commit. Cleared at the start of every pass.
#[derive(Debug)]
pub struct BindingRegistry {
    bindings: Vec<Binding>,
    id_prefix: String,
    next_id: usize,
}

impl BindingRegistry {
    pub fn new(id_prefix: impl Into<String>) -> Self {
        Self {
            bindings: Vec::new(),
            id_prefix: id_prefix.into(),
            next_id: 0,
        }
    }

    pub fn id_prefix(&self) -> &str {
        &self.id_prefix
    }

    /// Generate a fresh element id, unique within this commit.
    pub fn next_element_id(&mut self) -> String {
        let id = format!("{}{}", self.id_prefix, self.next_id);
        self.next_id += 1;
        id
    }

    pub fn register(
        &mut self,
        element_id: impl Into<String>,
        event: impl Into<String>,
        target: Option<Arc<dyn BoundValue>>,
        handlers: Vec<EventHandler>,
    ) {
        self.bindings.push(Binding {
            element_id: element_id.into(),
            event: event.into(),
            target,
            handlers,
        });
    }

    /// Drop every binding and restart id generation.
    pub fn clear(&mut self) {
        self.bindings.clear();
        self.next_id = 0;
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter()
    }

    /// Install every binding on the live document.
    ///
    /// The installed listener writes the event's target value into the bound
    /// cell (if any) before running the handlers in registration order. For
    /// `change` bindings the cell's current text is pushed into the control.
    pub fn apply<D: Dom>(&self, dom: &D) -> ApplyReport {
        let mut report = ApplyReport::default();

        for binding in &self.bindings {
            let Some(element) = dom.get_element_by_id(&binding.element_id) else {
                warn!(
                    element_id = %binding.element_id,
                    event = %binding.event,
                    "binding target not found in document"
                );
                report.missing += 1;
                continue;
            };

            let target = binding.target.clone();
            let handlers = binding.handlers.clone();
            dom.add_event_listener(
                &element,
                &binding.event,
                Rc::new(move |event: &DomEvent| {
                    if let (Some(target), Some(text)) = (&target, event.target_value()) {
                        target.write_text(text);
                    }
                    for handler in &handlers {
                        handler(event);
                    }
                }),
            );

            if binding.event == "change"
                && let Some(target) = &binding.target
            {
                dom.set_value(&element, &target.read_text());
            }
            report.installed += 1;
        }

        debug!(
            installed = report.installed,
            missing = report.missing,
            "bindings applied"
        );
        report
    }
}

impl Default for BindingRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_ID_PREFIX)
    }
}
