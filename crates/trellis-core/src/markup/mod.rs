//! Node tree and the compiler that turns it into HTML.
//!
//! Builders produce a [`Node`] tree. Attributes and listeners are ordinary
//! children of an element; the compiler pulls them out of the child list and
//! writes them into the opening tag, in declaration order. Everything else
//! becomes the element's content.
//!
//! ```ignore
//! let tree = div((h1("Title"), p("Body")));
//! assert_eq!(cx.compile(&tree.into())?, "<div><h1>Title</h1><p>Body</p></div>");
//! ```

mod attributes;
mod elements;
mod layout;

use std::fmt;

pub use attributes::{
    Listener, attr, class_name, href, id, on, on_change, on_click, placeholder, src, style,
    title, type_, value,
};
pub use elements::*;
pub use layout::{flex_layout, grid_layout};

use crate::bindings::BindingRegistry;
use crate::dom::Dom;
use crate::error::{MarkupError, Result};

/// A node in the markup tree.
#[derive(Clone, Debug)]
pub enum Node {
    Element(Element),
    /// Text content. Sanitized when compiled.
    Text(String),
    /// Several nodes without a wrapping element.
    Fragment(Children),
    /// Attribute or listener for the enclosing element.
    Attribute(Attribute),
    Empty,
}

pub type Children = Vec<Node>;

/// Whether an element has a closing tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementKind {
    Normal,
    /// `input`, `img`, `br`: attributes only.
    Void,
}

/// An HTML element under construction.
#[derive(Clone, Debug)]
pub struct Element {
    tag: &'static str,
    kind: ElementKind,
    text: Option<String>,
    children: Children,
}

impl Element {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            kind: ElementKind::Normal,
            text: None,
            children: Vec::new(),
        }
    }

    pub fn void(tag: &'static str) -> Self {
        Self {
            kind: ElementKind::Void,
            ..Self::new(tag)
        }
    }

    /// Leading text, emitted before any child content.
    pub fn with_text(mut self, text: impl fmt::Display) -> Self {
        self.text = Some(text.to_string());
        self
    }

    /// Append children (elements, text, attributes or listeners).
    pub fn child(mut self, child: impl Into<Node>) -> Self {
        match child.into() {
            Node::Empty => {}
            Node::Fragment(nodes) => self.children.extend(nodes),
            node => self.children.push(node),
        }
        self
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }
}

/// Something that lands in an element's opening tag.
#[derive(Clone, Debug)]
pub enum Attribute {
    Named { name: &'static str, value: String },
    Listener(Listener),
}

impl Attribute {
    /// Name used in diagnostics.
    pub fn name(&self) -> String {
        match self {
            Attribute::Named { name, .. } => (*name).to_string(),
            Attribute::Listener(listener) => format!("on:{}", listener.events().join(",")),
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl From<Attribute> for Node {
    fn from(attribute: Attribute) -> Self {
        Node::Attribute(attribute)
    }
}

impl From<Listener> for Node {
    fn from(listener: Listener) -> Self {
        Node::Attribute(Attribute::Listener(listener))
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::Text(text.to_string())
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Node::Text(text)
    }
}

impl From<()> for Node {
    fn from(_: ()) -> Self {
        Node::Empty
    }
}

impl<N: Into<Node>> From<Option<N>> for Node {
    fn from(node: Option<N>) -> Self {
        node.map_or(Node::Empty, Into::into)
    }
}

impl<N: Into<Node>> From<Vec<N>> for Node {
    fn from(nodes: Vec<N>) -> Self {
        Node::Fragment(nodes.into_iter().map(Into::into).collect())
    }
}

impl<N: Into<Node>, const LEN: usize> From<[N; LEN]> for Node {
    fn from(nodes: [N; LEN]) -> Self {
        Node::Fragment(nodes.into_iter().map(Into::into).collect())
    }
}

macro_rules! tuple_into_node {
    ($($name:ident),+) => {
        impl<$($name: Into<Node>),+> From<($($name,)+)> for Node {
            #[allow(non_snake_case)]
            fn from(($($name,)+): ($($name,)+)) -> Self {
                Node::Fragment(vec![$($name.into()),+])
            }
        }
    };
}

tuple_into_node!(A);
tuple_into_node!(A, B);
tuple_into_node!(A, B, C);
tuple_into_node!(A, B, C, D);
tuple_into_node!(A, B, C, D, E);
tuple_into_node!(A, B, C, D, E, F);
tuple_into_node!(A, B, C, D, E, F, G);
tuple_into_node!(A, B, C, D, E, F, G, H);
tuple_into_node!(A, B, C, D, E, F, G, H, I);
tuple_into_node!(A, B, C, D, E, F, G, H, I, J);
tuple_into_node!(A, B, C, D, E, F, G, H, I, J, K);
tuple_into_node!(A, B, C, D, E, F, G, H, I, J, K, L);

/// Build a fragment from heterogeneous children.
///
/// ```ignore
/// div(nodes![class_name("row"), span("a"), when(show, span("b"))])
/// ```
#[macro_export]
macro_rules! nodes {
    () => {
        $crate::markup::Node::Fragment(::std::vec::Vec::new())
    };
    ($($child:expr),+ $(,)?) => {
        $crate::markup::Node::Fragment(::std::vec![$($crate::markup::Node::from($child)),+])
    };
}

/// A text node.
pub fn text(value: impl fmt::Display) -> Node {
    Node::Text(value.to_string())
}

/// `children` when `condition` holds, nothing otherwise.
pub fn when(condition: bool, children: impl Into<Node>) -> Node {
    if condition {
        children.into()
    } else {
        Node::Empty
    }
}

/// One fragment per item, in order.
pub fn for_each<I, N>(items: I, mut builder: impl FnMut(usize, I::Item) -> N) -> Node
where
    I: IntoIterator,
    N: Into<Node>,
{
    Node::Fragment(
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| builder(index, item).into())
            .collect(),
    )
}

// ============================================================================
// Compiler
// ============================================================================

/// Writes a node tree as HTML and records its listeners.
pub struct Compiler<'a, D: Dom> {
    dom: &'a D,
    bindings: &'a mut BindingRegistry,
}

impl<'a, D: Dom> Compiler<'a, D> {
    pub fn new(dom: &'a D, bindings: &'a mut BindingRegistry) -> Self {
        Self { dom, bindings }
    }

    pub fn compile(&mut self, node: &Node) -> Result<String> {
        let mut out = String::new();
        self.write_node(node, &mut out)?;
        Ok(out)
    }

    fn write_node(&mut self, node: &Node, out: &mut String) -> Result<()> {
        match node {
            Node::Element(element) => self.write_element(element, out),
            Node::Text(text) => {
                out.push_str(&self.dom.sanitize(text));
                Ok(())
            }
            Node::Fragment(nodes) => {
                for node in nodes {
                    self.write_node(node, out)?;
                }
                Ok(())
            }
            Node::Attribute(attribute) => Err(MarkupError::OrphanAttribute {
                name: attribute.name(),
            }),
            Node::Empty => Ok(()),
        }
    }

    fn write_element(&mut self, element: &Element, out: &mut String) -> Result<()> {
        let mut attributes = Vec::new();
        let mut content = Vec::new();
        partition(&element.children, &mut attributes, &mut content);

        if element.kind == ElementKind::Void && (element.text.is_some() || !content.is_empty()) {
            return Err(MarkupError::VoidContent { tag: element.tag });
        }

        let has_listeners = attributes
            .iter()
            .any(|attribute| matches!(attribute, Attribute::Listener(_)));
        let explicit_id = attributes.iter().find_map(|attribute| match attribute {
            Attribute::Named { name: "id", value } => Some(value.clone()),
            _ => None,
        });
        let mut generated_id = None;
        let element_id = match (&explicit_id, has_listeners) {
            (Some(id), true) => Some(id.clone()),
            (None, true) => {
                let id = self.bindings.next_element_id();
                generated_id = Some(id.clone());
                Some(id)
            }
            (_, false) => None,
        };

        out.push('<');
        out.push_str(element.tag);
        for attribute in attributes {
            match attribute {
                Attribute::Named { name, value } => {
                    self.write_attribute(name, value, out);
                }
                Attribute::Listener(listener) => {
                    let Some(element_id) = &element_id else {
                        continue;
                    };
                    if let Some(id) = generated_id.take() {
                        self.write_attribute("id", &id, out);
                    }
                    for event in listener.events() {
                        self.bindings.register(
                            element_id.clone(),
                            event.clone(),
                            listener.target().cloned(),
                            listener.handlers().to_vec(),
                        );
                    }
                }
            }
        }
        out.push('>');

        if let Some(text) = &element.text {
            out.push_str(&self.dom.sanitize(text));
        }
        for node in content {
            self.write_node(node, out)?;
        }

        if element.kind == ElementKind::Normal {
            out.push_str("</");
            out.push_str(element.tag);
            out.push('>');
        }
        Ok(())
    }

    fn write_attribute(&self, name: &str, value: &str, out: &mut String) {
        out.push(' ');
        out.push_str(name);
        out.push_str("='");
        out.push_str(&self.dom.sanitize(value));
        out.push('\'');
    }
}

/// Split children into attributes and content, flattening fragments.
fn partition<'n>(
    children: &'n [Node],
    attributes: &mut Vec<&'n Attribute>,
    content: &mut Vec<&'n Node>,
) {
    for child in children {
        match child {
            Node::Attribute(attribute) => attributes.push(attribute),
            Node::Fragment(nodes) => partition(nodes, attributes, content),
            Node::Empty => {}
            node => content.push(node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDom;

    fn compile(node: impl Into<Node>) -> Result<String> {
        let dom = MemoryDom::new();
        let mut bindings = BindingRegistry::new("t-");
        Compiler::new(&dom, &mut bindings).compile(&node.into())
    }

    #[test]
    fn nested_elements_compile_to_html() {
        let html = compile(div((h1("Title"), p("Body")))).expect("compiles");
        assert_eq!(html, "<div><h1>Title</h1><p>Body</p></div>");
    }

    #[test]
    fn empty_element_is_open_and_close_tag() {
        assert_eq!(compile(div(())).expect("compiles"), "<div></div>");
        assert_eq!(compile(br()).expect("compiles"), "<br>");
    }

    #[test]
    fn attributes_are_spliced_in_declaration_order() {
        let html = compile(div(nodes![
            class_name("card"),
            span("x"),
            style("color: red"),
            title("t"),
        ]))
        .expect("compiles");
        assert_eq!(
            html,
            "<div class='card' style='color: red' title='t'><span>x</span></div>"
        );
    }

    #[test]
    fn text_and_children_follow_each_other() {
        let html = compile(p("Hello ").child(span("world")).child(class_name("lead")))
            .expect("compiles");
        assert_eq!(html, "<p class='lead'>Hello <span>world</span></p>");
    }

    #[test]
    fn user_text_is_sanitized() {
        let html = compile(p("<script>alert('x')</script>")).expect("compiles");
        assert_eq!(html, "<p>alert(&#39;x&#39;)</p>");
        assert!(!html.contains("<script>"));

        let html = compile(div(class_name("a' onclick='boom"))).expect("compiles");
        assert_eq!(html, "<div class='a&#39; onclick=&#39;boom'></div>");
    }

    #[test]
    fn numbers_are_stringified() {
        let html = compile(ul((li(span(42)), li(h2(1.5))))).expect("compiles");
        assert_eq!(html, "<ul><li><span>42</span></li><li><h2>1.5</h2></li></ul>");
    }

    #[test]
    fn when_and_for_each() {
        assert_eq!(compile(when(false, p("hidden"))).expect("compiles"), "");
        assert_eq!(compile(when(true, p("shown"))).expect("compiles"), "<p>shown</p>");

        let none: Vec<&str> = Vec::new();
        assert_eq!(compile(for_each(&none, |_, s| li(span(s)))).expect("compiles"), "");

        let html = compile(for_each(["a", "b", "c"], |i, s| span(format!("{i}{s}"))))
            .expect("compiles");
        assert_eq!(html, "<span>0a</span><span>1b</span><span>2c</span>");
    }

    #[test]
    fn attributes_inside_when_belong_to_parent() {
        let html = compile(div(nodes![when(true, class_name("on")), when(false, class_name("off"))]))
            .expect("compiles");
        assert_eq!(html, "<div class='on'></div>");
    }

    #[test]
    fn void_elements_reject_content() {
        let err = compile(input(span("x"))).expect_err("void content");
        assert_eq!(err, MarkupError::VoidContent { tag: "input" });

        let html = compile(input((type_("text"), placeholder("Name")))).expect("compiles");
        assert_eq!(html, "<input type='text' placeholder='Name'>");
    }

    #[test]
    fn top_level_attribute_is_orphan() {
        let err = compile(nodes![p("a"), class_name("x")]).expect_err("orphan");
        assert_eq!(
            err,
            MarkupError::OrphanAttribute {
                name: "class".into()
            }
        );
    }

    #[test]
    fn listeners_get_one_generated_id_per_element() {
        let dom = MemoryDom::new();
        let mut bindings = BindingRegistry::new("t-");
        let tree = div((
            button("A").child((class_name("btn"), on_click(|_| {}), on("mouseover", |_| {}))),
            button("B").child(on_click(|_| {})),
        ));
        let html = Compiler::new(&dom, &mut bindings)
            .compile(&tree.into())
            .expect("compiles");

        assert_eq!(
            html,
            "<div><button class='btn' id='t-0'>A</button><button id='t-1'>B</button></div>"
        );
        let registered: Vec<(&str, &str)> = bindings
            .iter()
            .map(|b| (b.element_id(), b.event()))
            .collect();
        assert_eq!(
            registered,
            vec![("t-0", "click"), ("t-0", "mouseover"), ("t-1", "click")]
        );
    }

    #[test]
    fn explicit_id_is_reused_for_listeners() {
        let dom = MemoryDom::new();
        let mut bindings = BindingRegistry::new("t-");
        let tree = button("Go").child((on_click(|_| {}), id("go")));
        let html = Compiler::new(&dom, &mut bindings)
            .compile(&tree.into())
            .expect("compiles");

        assert_eq!(html, "<button id='go'>Go</button>");
        assert_eq!(bindings.iter().next().map(|b| b.element_id()), Some("go"));
    }

    #[test]
    fn compiled_output_has_no_marker_residue() {
        let html = compile(div(nodes![
            class_name("a"),
            flex_layout("row", "center", "center", 4),
            p("x").child(title("y")),
        ]))
        .expect("compiles");
        assert!(!html.contains("@@"));
        assert_eq!(html.matches('<').count(), 4);
    }
}
