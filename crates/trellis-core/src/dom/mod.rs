//! The DOM collaborator contract.
//!
//! The runtime never talks to a browser directly. Everything it needs from
//! the host document goes through [`Dom`]: element creation, markup
//! injection, id lookup and event subscription.

pub mod memory;

use std::fmt;
use std::rc::Rc;

pub use memory::MemoryDom;

/// An event delivered by the collaborator to a listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomEvent {
    name: String,
    target_value: Option<String>,
}

impl DomEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target_value: None,
        }
    }

    pub fn with_target_value(mut self, value: impl Into<String>) -> Self {
        self.target_value = Some(value.into());
        self
    }

    /// Event type, e.g. `click` or `change`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `value` of the element the event fired on, for form controls.
    pub fn target_value(&self) -> Option<&str> {
        self.target_value.as_deref()
    }
}

/// A listener installed on a live element.
pub type EventHandler = Rc<dyn Fn(&DomEvent)>;

/// Wrap a closure as an [`EventHandler`].
pub fn handler(f: impl Fn(&DomEvent) + 'static) -> EventHandler {
    Rc::new(f)
}

/// Capabilities the runtime requires from the host document.
///
/// Implementations are not expected to be thread-safe; the render loop only
/// calls them from its own thread.
pub trait Dom {
    /// Reference to a live element.
    type Handle: Clone + fmt::Debug;

    fn head(&self) -> Self::Handle;
    fn body(&self) -> Self::Handle;

    /// Create a detached element.
    fn create_element(&self, tag: &str) -> Self::Handle;
    fn append_child(&self, parent: &Self::Handle, child: &Self::Handle);

    fn set_inner_html(&self, element: &Self::Handle, html: &str);
    fn inner_html(&self, element: &Self::Handle) -> String;
    fn text_content(&self, element: &Self::Handle) -> String;

    fn set_attribute(&self, element: &Self::Handle, name: &str, value: &str);
    fn get_element_by_id(&self, id: &str) -> Option<Self::Handle>;

    fn add_event_listener(&self, element: &Self::Handle, event: &str, handler: EventHandler);

    /// Set the displayed value of a form control.
    fn set_value(&self, element: &Self::Handle, value: &str);

    /// Release listeners installed by previous commits. Called right before
    /// the mount point is cleared.
    fn clear_listeners(&self) {}

    /// Reduce arbitrary text to inert markup.
    ///
    /// The text is parsed into a detached element and only its text content is
    /// kept, which drops every tag. The result is escaped so it can be embedded
    /// in element content or a quoted attribute. Sanitizing twice yields the
    /// same string.
    fn sanitize(&self, text: &str) -> String {
        let scratch = self.create_element("div");
        self.set_inner_html(&scratch, text);
        escape_text(&self.text_content(&scratch))
    }
}

/// Escape HTML special characters, including both quote styles.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_covers_quotes() {
        assert_eq!(
            escape_text(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn event_carries_target_value() {
        let event = DomEvent::new("change").with_target_value("42");
        assert_eq!(event.name(), "change");
        assert_eq!(event.target_value(), Some("42"));
        assert_eq!(DomEvent::new("click").target_value(), None);
    }
}
