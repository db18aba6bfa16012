//! Lenient conversions for values that round-trip through markup text.
//!
//! Form inputs only ever hand back strings, and markup must always be
//! producible, so none of these fail: anything that does not parse becomes
//! the zero value of the target type.

use std::fmt::Display;

pub fn any_str(value: impl Display) -> String {
    value.to_string()
}

pub fn any_int(value: impl Display) -> i64 {
    value.to_string().parse().unwrap_or_default()
}

pub fn any_flt(value: impl Display) -> f64 {
    value.to_string().parse().unwrap_or_default()
}

/// Accepts `1 t T true TRUE True` and `0 f F false FALSE False`.
pub fn any_bol(value: impl Display) -> bool {
    matches!(
        value.to_string().as_str(),
        "1" | "t" | "T" | "true" | "TRUE" | "True"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_parse_or_fall_back_to_zero() {
        assert_eq!(any_int("42"), 42);
        assert_eq!(any_int(-7), -7);
        assert_eq!(any_int("4x"), 0);
        assert_eq!(any_int(""), 0);

        assert_eq!(any_flt("2.5"), 2.5);
        assert_eq!(any_flt(3), 3.0);
        assert_eq!(any_flt("nope"), 0.0);
    }

    #[test]
    fn booleans_accept_the_usual_spellings() {
        for yes in ["1", "t", "T", "true", "TRUE", "True"] {
            assert!(any_bol(yes), "{yes}");
        }
        assert!(any_bol(true));
        assert!(!any_bol("yes"));
        assert!(!any_bol(false));
        assert!(!any_bol(""));
    }

    #[test]
    fn strings_use_display() {
        assert_eq!(any_str(12), "12");
        assert_eq!(any_str(1.5), "1.5");
        assert_eq!(any_str("x"), "x");
    }
}
