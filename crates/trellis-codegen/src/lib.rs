//! Invocation codegen: lowers an [`IntermediateInvocation`] into host
//! directive code.
//!
//! The generated code carries the component *name*, not its resource path —
//! resolution through the registry happens at render time, so components
//! registered after compilation still take effect and unresolvable names
//! fail at render time, not compile time.

pub mod writer;

pub use writer::CodeWriter;

use std::path::Path;
use trellis_compiler::{directives, AttrValue, IntermediateInvocation, RewriteResult};

/// Lower one invocation record to directive code.
///
/// Self-closing invocations become a single "invoke, no body" call; paired
/// invocations emit only the begin directive here — the body stays in place
/// and the rewriter emits `@endcomponent` for the closing tag.
pub fn lower(invocation: &IntermediateInvocation) -> String {
    let mut writer = CodeWriter::new();
    writer.push('@');
    writer.push_str(directives::COMPONENT);
    writer.push('(');
    writer.push_quoted(&invocation.component_name);
    writer.push_str(", ");
    lower_attributes(&mut writer, invocation);
    if invocation.is_self_closing {
        writer.push_str(", true");
    }
    writer.push(')');
    writer.finish()
}

/// Emit the attribute map literal.
///
/// Literal values are quoted, escaped strings; bound and interpolated values
/// are spliced verbatim as host-language expressions. The two are never
/// interchangeable: a literal must survive as exactly the text the template
/// author wrote, an expression must reach the host evaluator untouched.
fn lower_attributes(writer: &mut CodeWriter, invocation: &IntermediateInvocation) {
    writer.push('{');
    for (index, (name, value)) in invocation.attributes.iter().enumerate() {
        if index > 0 {
            writer.push_str(", ");
        }
        writer.push_quoted(name);
        writer.push_str(": ");
        match value {
            AttrValue::Literal(text) => writer.push_quoted(text),
            AttrValue::Bound(expr) | AttrValue::Interpolated(expr) => writer.push_str(expr),
        }
    }
    writer.push('}');
}

/// Rewrite a whole template source: tag pipeline plus this crate's lowering.
pub fn compile_source(source: &str, path: &Path) -> RewriteResult<String> {
    trellis_compiler::rewrite(source, path, lower)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use smol_str::SmolStr;

    fn invocation(attrs: Vec<(&str, AttrValue)>, self_closing: bool) -> IntermediateInvocation {
        IntermediateInvocation {
            component_name: SmolStr::from("alert"),
            is_self_closing: self_closing,
            attributes: attrs
                .into_iter()
                .map(|(n, v)| (SmolStr::from(n), v))
                .collect(),
        }
    }

    #[test]
    fn test_literal_attribute_is_quoted() {
        let code = lower(&invocation(
            vec![("type", AttrValue::Literal("error".into()))],
            true,
        ));
        assert_eq!(code, "@component('alert', {'type': 'error'}, true)");
    }

    #[test]
    fn test_bound_attribute_is_never_quoted() {
        let code = lower(&invocation(
            vec![("message", AttrValue::Bound("user.message".into()))],
            true,
        ));
        assert_eq!(code, "@component('alert', {'message': user.message}, true)");
    }

    #[test]
    fn test_interpolated_attribute_is_never_quoted() {
        let code = lower(&invocation(
            vec![("title", AttrValue::Interpolated("page.title".into()))],
            false,
        ));
        assert_eq!(code, "@component('alert', {'title': page.title})");
    }

    #[test]
    fn test_literal_quotes_are_escaped() {
        let code = lower(&invocation(
            vec![("title", AttrValue::Literal("it's here".into()))],
            true,
        ));
        assert_eq!(code, r"@component('alert', {'title': 'it\'s here'}, true)");
    }

    #[test]
    fn test_paired_has_no_self_flag() {
        let code = lower(&invocation(vec![], false));
        assert_eq!(code, "@component('alert', {})");
    }

    #[test]
    fn test_compile_source_end_to_end() {
        let code =
            compile_source(r#"<x-alert type="error" :count="n" />"#, Path::new("p.html")).unwrap();
        assert_eq!(
            code,
            "@component('alert', {'type': 'error', 'count': n}, true)"
        );
    }
}
