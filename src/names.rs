//! Identifier normalization for generated artifacts.
//!
//! Converts CamelCase type names into the two canonical identifier forms
//! used throughout generation: the lower-snake "property" form for
//! method/field names and the UPPER_SNAKE "tag" form for enumeration
//! discriminants.
//!
//! A word boundary is inserted immediately before an uppercase letter when
//! either (i) that letter begins a run of lowercase letters and is preceded
//! by any other character, or (ii) it immediately follows a lowercase
//! letter or digit. Acronym runs ("HTTPResponse") are never split
//! internally; only the transition into a following lowercase run breaks
//! them. Both transforms are pure and idempotent on their own output.

/// Lower-snake accessor/method form of a CamelCase type name.
///
/// `property_form("StatementBlock")` is `"statement_block"`;
/// `property_form("statement_block")` is `"statement_block"` again.
pub fn property_form(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + name.len() / 2);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let follows_lower_run = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let after_lower_or_digit = chars[i - 1].is_ascii_lowercase() || chars[i - 1].is_ascii_digit();
            if follows_lower_run || after_lower_or_digit {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

/// UPPER_SNAKE discriminant form of a CamelCase type name.
///
/// Always equal to `property_form(name).to_uppercase()`.
pub fn tag_form(name: &str) -> String {
    property_form(name).to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_simple_camel_case() {
        assert_eq!(property_form("StatementBlock"), "statement_block");
        assert_eq!(property_form("BinaryExpression"), "binary_expression");
        assert_eq!(property_form("Program"), "program");
    }

    #[test]
    fn keeps_acronym_runs_together() {
        assert_eq!(property_form("HTTPResponse"), "http_response");
        assert_eq!(property_form("ParseURL"), "parse_url");
        assert_eq!(property_form("BABlock"), "ba_block");
    }

    #[test]
    fn breaks_after_digits() {
        assert_eq!(property_form("Vector3D"), "vector3_d");
        assert_eq!(property_form("A1B2"), "a1_b2");
    }

    #[test]
    fn idempotent_on_normalized_input() {
        for s in ["node_name", "statement_block", "x", "http_response"] {
            assert_eq!(property_form(s), s);
            assert_eq!(property_form(&property_form(s)), property_form(s));
        }
    }

    #[test]
    fn tag_form_is_uppercased_property_form() {
        for s in ["StatementBlock", "HTTPResponse", "Leaf", "A1B2", "already_snake"] {
            assert_eq!(tag_form(s), property_form(s).to_uppercase());
        }
        assert_eq!(tag_form("StatementBlock"), "STATEMENT_BLOCK");
    }
}
