//! Stylesheet injection.

use std::collections::HashSet;

use trellis_core::Dom;

/// Stylesheets already linked into the document head.
#[derive(Debug, Default)]
pub struct Stylesheets {
    linked: HashSet<String>,
}

impl Stylesheets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `<link rel="stylesheet" href=path>` to the head, once per path.
    ///
    /// Returns `false` if the path was already linked.
    pub fn link<D: Dom>(&mut self, dom: &D, path: &str) -> bool {
        if self.linked.contains(path) {
            return false;
        }

        let link = dom.create_element("link");
        dom.set_attribute(&link, "rel", "stylesheet");
        dom.set_attribute(&link, "href", path);
        dom.append_child(&dom.head(), &link);
        self.linked.insert(path.to_string());
        tracing::info!(path, "stylesheet linked");
        true
    }

    pub fn is_linked(&self, path: &str) -> bool {
        self.linked.contains(path)
    }

    pub fn len(&self) -> usize {
        self.linked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.linked.is_empty()
    }
}
