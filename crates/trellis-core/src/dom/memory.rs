//! An in-memory [`Dom`] implementation.
//!
//! `MemoryDom` keeps its nodes in a slab and parses markup with `html5ever`,
//! so `set_inner_html` builds the same tree a browser would. It backs the
//! test-suite and can be used for headless rendering.
//!
//! Nodes replaced by `set_inner_html` are freed and their slots reused.
//! Handles carry a generation, so a handle to a freed node stops matching
//! anything instead of aliasing whatever took its slot.

use std::cell::RefCell;

use html5ever::tendril::TendrilSink;
use html5ever::{LocalName, Namespace, ParseOpts, QualName, parse_fragment};
use markup5ever_rcdom::{Handle as ParsedHandle, NodeData as ParsedNode, RcDom};

use super::{Dom, DomEvent, EventHandler, escape_text};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_TAGS: &[&str] = &["script", "style"];

/// Handle to a node inside a [`MemoryDom`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeRef {
    index: usize,
    generation: u32,
}

enum NodeKind {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        value: String,
        listeners: Vec<(String, EventHandler)>,
    },
    Text(String),
}

struct NodeData {
    kind: NodeKind,
    children: Vec<NodeRef>,
    parent: Option<NodeRef>,
}

struct Slot {
    generation: u32,
    node: Option<NodeData>,
}

#[derive(Default)]
struct Tree {
    slots: Vec<Slot>,
    free: Vec<usize>,
}

impl Tree {
    fn insert(&mut self, kind: NodeKind) -> NodeRef {
        let node = NodeData {
            kind,
            children: Vec::new(),
            parent: None,
        };
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.node = Some(node);
                NodeRef {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeRef {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        }
    }

    fn get(&self, node: NodeRef) -> Option<&NodeData> {
        self.slots
            .get(node.index)
            .filter(|slot| slot.generation == node.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn get_mut(&mut self, node: NodeRef) -> Option<&mut NodeData> {
        self.slots
            .get_mut(node.index)
            .filter(|slot| slot.generation == node.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn kind_mut(&mut self, node: NodeRef) -> Option<&mut NodeKind> {
        self.get_mut(node).map(|data| &mut data.kind)
    }

    fn live_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    fn new_element(&mut self, tag: &str, attributes: Vec<(String, String)>) -> NodeRef {
        let value = attributes
            .iter()
            .find(|(name, _)| name == "value")
            .map(|(_, value)| value.clone())
            .unwrap_or_default();
        self.insert(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attributes,
            value,
            listeners: Vec::new(),
        })
    }

    fn new_text(&mut self, text: String) -> NodeRef {
        self.insert(NodeKind::Text(text))
    }

    fn append(&mut self, parent: NodeRef, child: NodeRef) {
        if parent == child || self.get(parent).is_none() {
            return;
        }
        let Some(old) = self.get_mut(child).map(|data| data.parent.take()) else {
            return;
        };
        if let Some(old) = old.and_then(|old| self.get_mut(old)) {
            old.children.retain(|&c| c != child);
        }
        if let Some(data) = self.get_mut(child) {
            data.parent = Some(parent);
        }
        if let Some(data) = self.get_mut(parent) {
            data.children.push(child);
        }
    }

    /// Free `node` and everything below it.
    fn remove(&mut self, node: NodeRef) {
        let Some(slot) = self
            .slots
            .get_mut(node.index)
            .filter(|slot| slot.generation == node.generation)
        else {
            return;
        };
        let Some(data) = slot.node.take() else {
            return;
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(node.index);
        for child in data.children {
            self.remove(child);
        }
    }

    fn clear_children(&mut self, parent: NodeRef) {
        let children = match self.get_mut(parent) {
            Some(data) => std::mem::take(&mut data.children),
            None => return,
        };
        for child in children {
            self.remove(child);
        }
    }

    fn children(&self, node: NodeRef) -> &[NodeRef] {
        self.get(node)
            .map(|data| data.children.as_slice())
            .unwrap_or_default()
    }

    fn tag(&self, node: NodeRef) -> Option<&str> {
        match &self.get(node)?.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    fn attribute(&self, node: NodeRef, name: &str) -> Option<&str> {
        match &self.get(node)?.kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    fn text_content(&self, node: NodeRef, out: &mut String) {
        let Some(data) = self.get(node) else {
            return;
        };
        match &data.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element { .. } => {
                for &child in &data.children {
                    self.text_content(child, out);
                }
            }
        }
    }

    fn serialize(&self, node: NodeRef, raw_text: bool, out: &mut String) {
        let Some(data) = self.get(node) else {
            return;
        };
        match &data.kind {
            NodeKind::Text(text) if raw_text => out.push_str(text),
            NodeKind::Text(text) => out.push_str(&escape_text(text)),
            NodeKind::Element {
                tag, attributes, ..
            } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_text(value));
                    out.push('"');
                }
                out.push('>');
                if VOID_TAGS.contains(&tag.as_str()) {
                    return;
                }
                self.serialize_children(node, out);
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    fn serialize_children(&self, node: NodeRef, out: &mut String) {
        let raw_text = self
            .tag(node)
            .is_some_and(|tag| RAW_TEXT_TAGS.contains(&tag));
        for &child in self.children(node) {
            self.serialize(child, raw_text, out);
        }
    }

    fn find_by_id(&self, node: NodeRef, id: &str) -> Option<NodeRef> {
        if self.attribute(node, "id") == Some(id) {
            return Some(node);
        }
        self.children(node)
            .iter()
            .find_map(|&child| self.find_by_id(child, id))
    }

    /// Parse `html` as the content of `parent` and append the result.
    fn parse_into(&mut self, parent: NodeRef, html: &str) {
        let context = self.tag(parent).unwrap_or("div").to_string();
        let parsed = parse_fragment(
            RcDom::default(),
            ParseOpts::default(),
            QualName::new(
                None,
                Namespace::from(HTML_NAMESPACE),
                LocalName::from(context.as_str()),
            ),
            Vec::new(),
        )
        .one(html);

        // Fragment parsing hangs the result under a synthetic <html> root.
        let roots = parsed.document.children.borrow().clone();
        for root in &roots {
            self.import_children(parent, root);
        }
    }

    fn import_children(&mut self, parent: NodeRef, from: &ParsedHandle) {
        for child in from.children.borrow().iter() {
            match &child.data {
                ParsedNode::Text { contents } => {
                    let text = self.new_text(contents.borrow().to_string());
                    self.append(parent, text);
                }
                ParsedNode::Element { name, attrs, .. } => {
                    let attributes = attrs
                        .borrow()
                        .iter()
                        .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
                        .collect();
                    let element = self.new_element(&name.local, attributes);
                    self.append(parent, element);
                    self.import_children(element, child);
                }
                // Comments, doctypes and processing instructions carry no content.
                _ => {}
            }
        }
    }
}

/// Headless document used by tests and server-side rendering.
pub struct MemoryDom {
    tree: RefCell<Tree>,
    document: NodeRef,
    head: NodeRef,
    body: NodeRef,
}

impl MemoryDom {
    pub fn new() -> Self {
        let mut tree = Tree::default();
        let document = tree.new_element("html", Vec::new());
        let head = tree.new_element("head", Vec::new());
        let body = tree.new_element("body", Vec::new());
        tree.append(document, head);
        tree.append(document, body);
        Self {
            tree: RefCell::new(tree),
            document,
            head,
            body,
        }
    }

    pub fn tag_name(&self, node: &NodeRef) -> Option<String> {
        self.tree.borrow().tag(*node).map(str::to_string)
    }

    pub fn attribute(&self, node: &NodeRef, name: &str) -> Option<String> {
        self.tree
            .borrow()
            .attribute(*node, name)
            .map(str::to_string)
    }

    /// Current `value` of a form control.
    pub fn value(&self, node: &NodeRef) -> String {
        match self.tree.borrow().get(*node).map(|data| &data.kind) {
            Some(NodeKind::Element { value, .. }) => value.clone(),
            _ => String::new(),
        }
    }

    pub fn children(&self, node: &NodeRef) -> Vec<NodeRef> {
        self.tree.borrow().children(*node).to_vec()
    }

    /// Whether `node` still refers to a node of this document.
    pub fn contains(&self, node: &NodeRef) -> bool {
        self.tree.borrow().get(*node).is_some()
    }

    /// Number of nodes currently allocated, attached or not.
    pub fn node_count(&self) -> usize {
        self.tree.borrow().live_count()
    }

    /// Number of listeners registered for `event` on `node`.
    pub fn listener_count(&self, node: &NodeRef, event: &str) -> usize {
        match self.tree.borrow().get(*node).map(|data| &data.kind) {
            Some(NodeKind::Element { listeners, .. }) => {
                listeners.iter().filter(|(name, _)| name == event).count()
            }
            _ => 0,
        }
    }

    /// Fire `event` on the element with the given id.
    ///
    /// Returns `false` when no such element exists or it has no listener for
    /// the event.
    pub fn dispatch(&self, id: &str, event: &str) -> bool {
        match self.get_element_by_id(id) {
            Some(node) => self.fire(node, event),
            None => false,
        }
    }

    /// Simulate user input: set the control's value, then fire `event`.
    pub fn dispatch_input(&self, id: &str, event: &str, value: &str) -> bool {
        let Some(node) = self.get_element_by_id(id) else {
            return false;
        };
        self.set_value(&node, value);
        self.fire(node, event)
    }

    fn fire(&self, node: NodeRef, event: &str) -> bool {
        // Handlers may replace the document, so nothing stays borrowed while
        // they run.
        let (handlers, value) = {
            let tree = self.tree.borrow();
            match tree.get(node).map(|data| &data.kind) {
                Some(NodeKind::Element {
                    listeners, value, ..
                }) => (
                    listeners
                        .iter()
                        .filter(|(name, _)| name == event)
                        .map(|(_, handler)| handler.clone())
                        .collect::<Vec<_>>(),
                    value.clone(),
                ),
                _ => (Vec::new(), String::new()),
            }
        };

        let dom_event = DomEvent::new(event).with_target_value(value);
        for handler in &handlers {
            handler(&dom_event);
        }
        !handlers.is_empty()
    }
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom for MemoryDom {
    type Handle = NodeRef;

    fn head(&self) -> NodeRef {
        self.head
    }

    fn body(&self) -> NodeRef {
        self.body
    }

    fn create_element(&self, tag: &str) -> NodeRef {
        self.tree.borrow_mut().new_element(tag, Vec::new())
    }

    fn append_child(&self, parent: &NodeRef, child: &NodeRef) {
        self.tree.borrow_mut().append(*parent, *child);
    }

    fn set_inner_html(&self, element: &NodeRef, html: &str) {
        let mut tree = self.tree.borrow_mut();
        if tree.get(*element).is_none() {
            return;
        }
        tree.clear_children(*element);
        tree.parse_into(*element, html);
    }

    fn inner_html(&self, element: &NodeRef) -> String {
        let mut out = String::new();
        self.tree.borrow().serialize_children(*element, &mut out);
        out
    }

    fn text_content(&self, element: &NodeRef) -> String {
        let mut out = String::new();
        self.tree.borrow().text_content(*element, &mut out);
        out
    }

    fn set_attribute(&self, element: &NodeRef, name: &str, value: &str) {
        let mut tree = self.tree.borrow_mut();
        if let Some(NodeKind::Element { attributes, .. }) = tree.kind_mut(*element) {
            match attributes.iter_mut().find(|(n, _)| n == name) {
                Some(existing) => existing.1 = value.to_string(),
                None => attributes.push((name.to_string(), value.to_string())),
            }
        }
    }

    fn get_element_by_id(&self, id: &str) -> Option<NodeRef> {
        self.tree.borrow().find_by_id(self.document, id)
    }

    fn add_event_listener(&self, element: &NodeRef, event: &str, handler: EventHandler) {
        let mut tree = self.tree.borrow_mut();
        if let Some(NodeKind::Element { listeners, .. }) = tree.kind_mut(*element) {
            listeners.push((event.to_string(), handler));
        }
    }

    fn set_value(&self, element: &NodeRef, value: &str) {
        let mut tree = self.tree.borrow_mut();
        if let Some(NodeKind::Element { value: current, .. }) = tree.kind_mut(*element) {
            *current = value.to_string();
        }
    }

    fn clear_listeners(&self) {
        for slot in &mut self.tree.borrow_mut().slots {
            if let Some(NodeData {
                kind: NodeKind::Element { listeners, .. },
                ..
            }) = &mut slot.node
            {
                listeners.clear();
            }
        }
    }

    fn sanitize(&self, text: &str) -> String {
        // Same round trip as the default, on a scratch tree so the live
        // document is not touched.
        let mut scratch = Tree::default();
        let root = scratch.new_element("div", Vec::new());
        scratch.parse_into(root, text);
        let mut content = String::new();
        scratch.text_content(root, &mut content);
        escape_text(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn parses_nested_markup_with_attributes() {
        let dom = MemoryDom::new();
        let body = dom.body();
        dom.set_inner_html(
            &body,
            "<div class='card'><h1>Title</h1><p id='body'>Some &amp; more</p></div>",
        );

        let children = dom.children(&body);
        assert_eq!(children.len(), 1);
        assert_eq!(dom.tag_name(&children[0]).as_deref(), Some("div"));
        assert_eq!(dom.attribute(&children[0], "class").as_deref(), Some("card"));

        let p = dom.get_element_by_id("body").expect("p by id");
        assert_eq!(dom.text_content(&p), "Some & more");
        assert_eq!(dom.text_content(&body), "TitleSome & more");
    }

    #[test]
    fn named_entities_decode_like_a_browser() {
        let dom = MemoryDom::new();
        let body = dom.body();
        dom.set_inner_html(&body, "caf&eacute; &copy; 2024 &hellip;");
        assert_eq!(dom.text_content(&body), "café © 2024 …");

        dom.set_inner_html(&body, "<input id='v' value='&lt;x&gt; &amp; &eacute;'>");
        let input = dom.get_element_by_id("v").expect("input");
        assert_eq!(dom.value(&input), "<x> & é");
    }

    #[test]
    fn inner_html_round_trips_through_serializer() {
        let dom = MemoryDom::new();
        let body = dom.body();
        dom.set_inner_html(&body, "<ul><li>a</li><li>b &lt; c</li></ul><br><input value='x'>");
        assert_eq!(
            dom.inner_html(&body),
            "<ul><li>a</li><li>b &lt; c</li></ul><br><input value=\"x\">"
        );
    }

    #[test]
    fn stray_angle_brackets_are_text() {
        let dom = MemoryDom::new();
        let body = dom.body();
        dom.set_inner_html(&body, "1 < 2 and 3 > 2");
        assert_eq!(dom.text_content(&body), "1 < 2 and 3 > 2");
    }

    #[test]
    fn script_content_is_kept_as_text() {
        let dom = MemoryDom::new();
        let body = dom.body();
        dom.set_inner_html(&body, "<script>if (a < b) alert(1)</script>after");
        assert_eq!(dom.text_content(&body), "if (a < b) alert(1)after");
        assert_eq!(
            dom.inner_html(&body),
            "<script>if (a < b) alert(1)</script>after"
        );
    }

    #[test]
    fn unterminated_tag_is_dropped() {
        let dom = MemoryDom::new();
        let body = dom.body();
        dom.set_inner_html(&body, "ok<b class='x");
        assert_eq!(dom.text_content(&body), "ok");
    }

    #[test]
    fn replacing_inner_html_frees_old_children() {
        let dom = MemoryDom::new();
        let body = dom.body();
        dom.set_inner_html(&body, "<p id='a'>one</p>");
        let old = dom.get_element_by_id("a").expect("p");
        dom.set_inner_html(&body, "");

        assert!(dom.get_element_by_id("a").is_none());
        assert!(dom.children(&body).is_empty());
        assert!(!dom.contains(&old));

        // The freed slot is reused without reviving the stale handle.
        dom.set_inner_html(&body, "<p id='b'>two</p>");
        assert!(!dom.contains(&old));
        assert_eq!(dom.tag_name(&old), None);
        dom.set_attribute(&old, "id", "hijack");
        assert!(dom.get_element_by_id("b").is_some());
    }

    #[test]
    fn repeated_replacement_keeps_node_count_stable() {
        let dom = MemoryDom::new();
        let body = dom.body();
        let markup = "<div><h1>Title</h1><button id='go'>Go</button></div>";

        dom.set_inner_html(&body, markup);
        let after_first = dom.node_count();
        for _ in 0..500 {
            dom.set_inner_html(&body, markup);
        }
        assert_eq!(dom.node_count(), after_first);
        assert_eq!(dom.children(&body).len(), 1);
    }

    #[test]
    fn dispatch_reaches_listeners_with_value() {
        let dom = MemoryDom::new();
        let body = dom.body();
        dom.set_inner_html(&body, "<input id='name'>");
        let input = dom.get_element_by_id("name").expect("input");

        let seen = Rc::new(Cell::new(0));
        let seen_clone = Rc::clone(&seen);
        dom.add_event_listener(
            &input,
            "change",
            Rc::new(move |event: &DomEvent| {
                assert_eq!(event.target_value(), Some("Ada"));
                seen_clone.set(seen_clone.get() + 1);
            }),
        );

        assert!(dom.dispatch_input("name", "change", "Ada"));
        assert_eq!(seen.get(), 1);
        assert_eq!(dom.value(&input), "Ada");
        assert!(!dom.dispatch("name", "click"));
        assert!(!dom.dispatch("missing", "change"));

        dom.clear_listeners();
        assert_eq!(dom.listener_count(&input, "change"), 0);
    }

    #[test]
    fn sanitize_strips_tags_and_is_idempotent() {
        let dom = MemoryDom::new();
        let once = dom.sanitize("<script>TEST</script>");
        assert_eq!(once, "TEST");
        assert!(!once.contains("<script>"));

        for input in [
            "a < b & c",
            "Tom &amp; Jerry",
            "<b>bold</b> 'q' \"dq\"",
            "&lt;i&gt;",
            "caf&eacute; &copy;",
        ] {
            let first = dom.sanitize(input);
            assert_eq!(dom.sanitize(&first), first, "input: {input}");
        }
        assert_eq!(dom.sanitize("Tom &amp; Jerry"), "Tom &amp; Jerry");
        assert_eq!(dom.sanitize("&lt;i&gt;"), "&lt;i&gt;");
        assert_eq!(dom.sanitize("caf&eacute; &copy;"), "café ©");
    }

    #[test]
    fn sanitize_leaves_document_untouched() {
        let dom = MemoryDom::new();
        let before = dom.node_count();
        let _ = dom.sanitize("<div><p>lots</p><p>of</p><p>nodes</p></div>");
        assert_eq!(dom.node_count(), before);
    }

    #[test]
    fn default_sanitize_matches_scratch_sanitize() {
        struct Plain(MemoryDom);
        impl Dom for Plain {
            type Handle = NodeRef;
            fn head(&self) -> NodeRef {
                self.0.head()
            }
            fn body(&self) -> NodeRef {
                self.0.body()
            }
            fn create_element(&self, tag: &str) -> NodeRef {
                self.0.create_element(tag)
            }
            fn append_child(&self, parent: &NodeRef, child: &NodeRef) {
                self.0.append_child(parent, child)
            }
            fn set_inner_html(&self, element: &NodeRef, html: &str) {
                self.0.set_inner_html(element, html)
            }
            fn inner_html(&self, element: &NodeRef) -> String {
                self.0.inner_html(element)
            }
            fn text_content(&self, element: &NodeRef) -> String {
                self.0.text_content(element)
            }
            fn set_attribute(&self, element: &NodeRef, name: &str, value: &str) {
                self.0.set_attribute(element, name, value)
            }
            fn get_element_by_id(&self, id: &str) -> Option<NodeRef> {
                self.0.get_element_by_id(id)
            }
            fn add_event_listener(&self, element: &NodeRef, event: &str, handler: EventHandler) {
                self.0.add_event_listener(element, event, handler)
            }
            fn set_value(&self, element: &NodeRef, value: &str) {
                self.0.set_value(element, value)
            }
        }

        let plain = Plain(MemoryDom::new());
        let input = "<em>x</em> & <b>y";
        assert_eq!(plain.sanitize(input), plain.0.sanitize(input));
    }
}
