//! Style attributes for common layouts.

use std::fmt::Display;

use super::{Attribute, attr};

/// `style` for a flex container.
///
/// `flow` is the `flex-flow` value (`row`, `column wrap`, ...), `gap` any
/// CSS length.
pub fn flex_layout(flow: &str, justify: &str, align: &str, gap: impl Display) -> Attribute {
    attr(
        "style",
        format!(
            "display: flex;flex-flow: {flow};justify-content: {justify};align-items: {align};gap: {gap}"
        ),
    )
}

/// `style` for a grid of equally sized tracks.
pub fn grid_layout(columns: impl Display, rows: impl Display, gap: &str) -> Attribute {
    attr(
        "style",
        format!(
            "display: grid;grid-template-columns: repeat({columns}, 1fr);\
             grid-template-rows: repeat({rows}, 1fr);gap: {gap}"
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style_of(attribute: Attribute) -> String {
        match attribute {
            Attribute::Named { name: "style", value } => value,
            other => panic!("expected a style attribute, got {other:?}"),
        }
    }

    #[test]
    fn flex_layout_style() {
        assert_eq!(
            style_of(flex_layout("row wrap", "center", "stretch", "8px")),
            "display: flex;flex-flow: row wrap;justify-content: center;align-items: stretch;gap: 8px"
        );
    }

    #[test]
    fn grid_layout_style() {
        assert_eq!(
            style_of(grid_layout(3, 2, "1em")),
            "display: grid;grid-template-columns: repeat(3, 1fr);grid-template-rows: repeat(2, 1fr);gap: 1em"
        );
    }
}
