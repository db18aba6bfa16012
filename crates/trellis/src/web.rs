//! Browser document backed by `web-sys`.

use std::cell::RefCell;

use thiserror::Error;
use tracing::{error, warn};
use wasm_bindgen::prelude::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    Document, Element, Event, EventTarget, HtmlInputElement, HtmlSelectElement,
    HtmlTextAreaElement,
};

use trellis_core::{Dom, DomEvent, EventHandler, Node, Scope};

use crate::config::{MountPoint, RuntimeConfig};
use crate::runtime::{RenderHandle, Runtime};

/// Error type produced by the web backend.
#[derive(Error, Debug, Clone)]
pub enum WebError {
    /// The DOM APIs are not accessible (e.g., when executed outside of a browser).
    #[error("DOM is not available")]
    DomUnavailable,
    /// The requested mounting node cannot be located.
    #[error("failed to find DOM element with id `{0}`")]
    RootNotFound(String),
    /// Wrapper around JavaScript exceptions.
    #[error("JavaScript error: {0}")]
    Js(String),
}

impl From<JsValue> for WebError {
    fn from(value: JsValue) -> Self {
        value
            .as_string()
            .map_or_else(|| Self::Js(format!("{value:?}")), Self::Js)
    }
}

struct InstalledListener {
    target: Element,
    event: String,
    closure: Closure<dyn FnMut(Event)>,
}

/// The page's live document.
pub struct WebDom {
    document: Document,
    head: Element,
    body: Element,
    /// Detached element cloned when `create_element` fails.
    placeholder: Element,
    listeners: RefCell<Vec<InstalledListener>>,
}

impl WebDom {
    pub fn new() -> Result<Self, WebError> {
        let window = web_sys::window().ok_or(WebError::DomUnavailable)?;
        let document = window.document().ok_or(WebError::DomUnavailable)?;
        let head = document.head().ok_or(WebError::DomUnavailable)?.into();
        let body = document.body().ok_or(WebError::DomUnavailable)?.into();
        let placeholder = document.create_element("div")?;
        Ok(Self {
            document,
            head,
            body,
            placeholder,
            listeners: RefCell::new(Vec::new()),
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }
}

/// `value` of an input, textarea or select.
fn control_value(target: &EventTarget) -> Option<String> {
    if let Some(input) = target.dyn_ref::<HtmlInputElement>() {
        Some(input.value())
    } else if let Some(area) = target.dyn_ref::<HtmlTextAreaElement>() {
        Some(area.value())
    } else {
        target
            .dyn_ref::<HtmlSelectElement>()
            .map(HtmlSelectElement::value)
    }
}

impl Dom for WebDom {
    type Handle = Element;

    fn head(&self) -> Element {
        self.head.clone()
    }

    fn body(&self) -> Element {
        self.body.clone()
    }

    fn create_element(&self, tag: &str) -> Element {
        match self.document.create_element(tag) {
            Ok(element) => element,
            Err(err) => {
                error!(tag, error = ?err, "create_element failed, using a detached placeholder");
                self.placeholder
                    .clone_node()
                    .ok()
                    .and_then(|node| node.dyn_into::<Element>().ok())
                    .unwrap_or_else(|| self.placeholder.clone())
            }
        }
    }

    fn append_child(&self, parent: &Element, child: &Element) {
        if let Err(err) = parent.append_child(child) {
            warn!(error = ?err, "append_child failed");
        }
    }

    fn set_inner_html(&self, element: &Element, html: &str) {
        element.set_inner_html(html);
    }

    fn inner_html(&self, element: &Element) -> String {
        element.inner_html()
    }

    fn text_content(&self, element: &Element) -> String {
        element.text_content().unwrap_or_default()
    }

    fn set_attribute(&self, element: &Element, name: &str, value: &str) {
        if let Err(err) = element.set_attribute(name, value) {
            warn!(name, error = ?err, "set_attribute failed");
        }
    }

    fn get_element_by_id(&self, id: &str) -> Option<Element> {
        self.document.get_element_by_id(id)
    }

    fn add_event_listener(&self, element: &Element, event: &str, handler: EventHandler) {
        let closure = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            let mut dom_event = DomEvent::new(event.type_());
            if let Some(value) = event.target().as_ref().and_then(control_value) {
                dom_event = dom_event.with_target_value(value);
            }
            handler(&dom_event);
        });

        if let Err(err) =
            element.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
        {
            warn!(event, error = ?err, "add_event_listener failed");
            return;
        }
        self.listeners.borrow_mut().push(InstalledListener {
            target: element.clone(),
            event: event.to_string(),
            closure,
        });
    }

    fn set_value(&self, element: &Element, value: &str) {
        if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
            input.set_value(value);
        } else if let Some(area) = element.dyn_ref::<HtmlTextAreaElement>() {
            area.set_value(value);
        } else if let Some(select) = element.dyn_ref::<HtmlSelectElement>() {
            select.set_value(value);
        }
    }

    fn clear_listeners(&self) {
        for listener in self.listeners.borrow_mut().drain(..) {
            let _ = listener.target.remove_event_listener_with_callback(
                &listener.event,
                listener.closure.as_ref().unchecked_ref(),
            );
        }
    }
}

/// Start the render loop in the browser, mounted on the body.
pub fn start<F, N>(root: F) -> Result<RenderHandle, WebError>
where
    F: Fn(&Scope) -> N + 'static,
    N: Into<Node> + 'static,
{
    start_with(RuntimeConfig::default(), root)
}

/// Start the render loop in the browser with an explicit configuration.
///
/// The loop runs on the page's event loop; the returned handle can request
/// renders or stop it.
pub fn start_with<F, N>(config: RuntimeConfig, root: F) -> Result<RenderHandle, WebError>
where
    F: Fn(&Scope) -> N + 'static,
    N: Into<Node> + 'static,
{
    let dom = WebDom::new()?;
    if let MountPoint::ElementId(id) = &config.mount
        && dom.get_element_by_id(id).is_none()
    {
        return Err(WebError::RootNotFound(id.clone()));
    }

    let mut runtime = Runtime::with_config(dom, config);
    let handle = runtime.handle();
    wasm_bindgen_futures::spawn_local(async move {
        runtime.run(root).await;
    });
    Ok(handle)
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn invalid_tag_yields_detached_element() {
        let dom = WebDom::new().expect("browser document");
        let element = dom.create_element("not a tag");
        assert!(element.parent_node().is_none());

        dom.set_inner_html(&element, "<p id='scratch'>x</p>");
        assert!(dom.get_element_by_id("scratch").is_none());
        assert_eq!(dom.text_content(&element), "x");
    }

    #[wasm_bindgen_test]
    fn sanitize_does_not_touch_the_page() {
        let dom = WebDom::new().expect("browser document");
        let before = dom.inner_html(&dom.body());
        assert_eq!(dom.sanitize("<b>caf&eacute;</b>"), "café");
        assert_eq!(dom.inner_html(&dom.body()), before);
    }
}
