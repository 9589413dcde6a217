//! Intermediate invocation records and attribute classification.

use crate::protect::ProtectStore;
use crate::{RewriteResult, SyntaxError};
use smol_str::SmolStr;
use std::path::Path;

/// The parsed form of one component tag occurrence. Ephemeral: built during
/// the rewrite of a single source, lowered to directive code, then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct IntermediateInvocation {
    /// Registry name of the component (`forms.input`).
    pub component_name: SmolStr,
    /// `<x-name … />` as opposed to `<x-name …>…</x-name>`.
    pub is_self_closing: bool,
    /// Attribute name → classified value, in source order.
    pub attributes: Vec<(SmolStr, AttrValue)>,
}

/// A classified attribute value.
///
/// The three classes are distinct all the way through codegen: a literal is
/// always emitted as a quoted, escaped string; bound and interpolated values
/// are always emitted verbatim as host-language expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// A plain string value.
    Literal(String),
    /// `:name="expr"` — the value is host-language code.
    Bound(String),
    /// `name="{{ expr }}"` — the inner expression, extracted.
    Interpolated(String),
}

/// Binding prefix on attribute names (`:title="expr"`).
pub const BOUND_PREFIX: char = ':';

/// Parse a tag's attribute text into classified name/value pairs.
///
/// `blob` is the raw text between the tag name and the closing `>`, with
/// host tokens already protected. Placeholders inside values are restored
/// here, before codegen quotes anything.
pub fn parse_attributes(
    blob: &str,
    store: &ProtectStore,
    path: &Path,
) -> RewriteResult<Vec<(SmolStr, AttrValue)>> {
    let mut attrs = Vec::new();
    let mut chars = blob.char_indices().peekable();

    loop {
        // Skip whitespace between attributes.
        while matches!(chars.peek(), Some((_, c)) if c.is_whitespace()) {
            chars.next();
        }
        let Some(&(start, first)) = chars.peek() else {
            break;
        };

        if !(first.is_ascii_alphanumeric() || first == '_' || first == BOUND_PREFIX) {
            return Err(SyntaxError::new(
                path,
                format!("unexpected `{first}` in component attribute list"),
            ));
        }

        let mut end = start;
        while matches!(
            chars.peek(),
            Some((_, c)) if c.is_ascii_alphanumeric() || matches!(*c, '_' | '-' | '.' | ':')
        ) {
            let (i, c) = chars.next().unwrap();
            end = i + c.len_utf8();
        }
        let raw_name = &blob[start..end];

        let value = if matches!(chars.peek(), Some((_, '='))) {
            chars.next();
            Some(parse_value(blob, &mut chars, path)?)
        } else {
            None
        };

        attrs.push(classify(raw_name, value, store, path)?);
    }

    Ok(attrs)
}

fn parse_value(
    blob: &str,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    path: &Path,
) -> RewriteResult<String> {
    while matches!(chars.peek(), Some((_, c)) if c.is_whitespace()) {
        chars.next();
    }
    match chars.peek().copied() {
        Some((start, quote @ ('"' | '\''))) => {
            chars.next();
            let value_start = start + 1;
            for (i, c) in chars.by_ref() {
                if c == quote {
                    return Ok(blob[value_start..i].to_string());
                }
            }
            Err(SyntaxError::new(path, "unbalanced quote in attribute value"))
        }
        Some((start, _)) => {
            let mut end = start;
            while matches!(chars.peek(), Some((_, c)) if !c.is_whitespace()) {
                let (i, c) = chars.next().unwrap();
                end = i + c.len_utf8();
            }
            Ok(blob[start..end].to_string())
        }
        None => Err(SyntaxError::new(path, "attribute value missing after `=`")),
    }
}

/// Apply the three-way attribute classification.
fn classify(
    raw_name: &str,
    value: Option<String>,
    store: &ProtectStore,
    path: &Path,
) -> RewriteResult<(SmolStr, AttrValue)> {
    if let Some(name) = raw_name.strip_prefix(BOUND_PREFIX) {
        let Some(value) = value else {
            return Err(SyntaxError::new(
                path,
                format!("bound attribute `:{name}` requires a value"),
            ));
        };
        return Ok((SmolStr::from(name), AttrValue::Bound(store.restore(&value))));
    }

    let name = SmolStr::from(raw_name);
    match value {
        None => {
            // A valueless attribute is truthy, like `<x-alert dismissible />`.
            Ok((name, AttrValue::Bound("true".to_string())))
        }
        Some(value) => {
            if let Some(expr) = store.interpolated_expr(&value) {
                Ok((name, AttrValue::Interpolated(expr.to_string())))
            } else {
                Ok((name, AttrValue::Literal(store.restore(&value))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(blob: &str) -> Vec<(SmolStr, AttrValue)> {
        let (protected, store) = ProtectStore::protect(blob);
        parse_attributes(&protected, &store, Path::new("test.html")).unwrap()
    }

    #[test]
    fn test_literal_attribute() {
        let attrs = parse(r#"type="error""#);
        assert_eq!(
            attrs,
            vec![("type".into(), AttrValue::Literal("error".to_string()))]
        );
    }

    #[test]
    fn test_bound_attribute() {
        let attrs = parse(r#":message="user.message""#);
        assert_eq!(
            attrs,
            vec![(
                "message".into(),
                AttrValue::Bound("user.message".to_string())
            )]
        );
    }

    #[test]
    fn test_interpolated_attribute() {
        let attrs = parse(r#"title="{{ page.title }}""#);
        assert_eq!(
            attrs,
            vec![(
                "title".into(),
                AttrValue::Interpolated("page.title".to_string())
            )]
        );
    }

    #[test]
    fn test_valueless_attribute_is_truthy() {
        let attrs = parse("dismissible");
        assert_eq!(
            attrs,
            vec![("dismissible".into(), AttrValue::Bound("true".to_string()))]
        );
    }

    #[test]
    fn test_mixed_attribute_order_preserved() {
        let attrs = parse(r#"a="1" :b="two" c="{{ three }}" d"#);
        let names: Vec<&str> = attrs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_single_quoted_value() {
        let attrs = parse(r#"label='hi there'"#);
        assert_eq!(
            attrs,
            vec![("label".into(), AttrValue::Literal("hi there".to_string()))]
        );
    }

    #[test]
    fn test_unquoted_value() {
        let attrs = parse("count=3");
        assert_eq!(
            attrs,
            vec![("count".into(), AttrValue::Literal("3".to_string()))]
        );
    }

    #[test]
    fn test_literal_with_embedded_interpolation_stays_literal() {
        let attrs = parse(r#"title="Hello {{ name }}!""#);
        assert_eq!(
            attrs,
            vec![(
                "title".into(),
                AttrValue::Literal("Hello {{ name }}!".to_string())
            )]
        );
    }

    #[test]
    fn test_bound_without_value_rejected() {
        let (protected, store) = ProtectStore::protect(":broken");
        let err = parse_attributes(&protected, &store, Path::new("bad.html")).unwrap_err();
        assert!(err.detail.contains(":broken"));
    }
}
