//! Element builders.
//!
//! Containers take their children up front. Text-bearing elements take the
//! text, and further children are added with [`Element::child`].

use std::fmt::Display;

use super::{Element, Node};

macro_rules! container {
    ($($(#[$meta:meta])* $name:ident => $tag:literal),+ $(,)?) => {
        $(
            $(#[$meta])*
            pub fn $name(children: impl Into<Node>) -> Element {
                Element::new($tag).child(children)
            }
        )+
    };
}

macro_rules! text_bearing {
    ($($(#[$meta:meta])* $name:ident => $tag:literal),+ $(,)?) => {
        $(
            $(#[$meta])*
            pub fn $name(text: impl Display) -> Element {
                Element::new($tag).with_text(text)
            }
        )+
    };
}

container! {
    div => "div",
    ul => "ul",
    li => "li",
    table => "table",
    tr => "tr",
    th => "th",
    td => "td",
    form => "form",
    textarea => "textarea",
    select => "select",
}

text_bearing! {
    p => "p",
    span => "span",
    h1 => "h1",
    h2 => "h2",
    h3 => "h3",
    h4 => "h4",
    /// Link; pair with [`href`](super::href).
    a => "a",
    option => "option",
    button => "button",
}

/// `<input>`; accepts attributes and listeners only.
pub fn input(attributes: impl Into<Node>) -> Element {
    Element::void("input").child(attributes)
}

/// `<img>`; accepts attributes only.
pub fn img(attributes: impl Into<Node>) -> Element {
    Element::void("img").child(attributes)
}

pub fn br() -> Element {
    Element::void("br")
}
