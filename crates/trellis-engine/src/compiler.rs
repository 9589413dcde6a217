//! Template text → [`Program`] compilation.

use crate::expr::{parse_expr, Expr, ExprParser};
use crate::program::{DirectiveCall, Op, Program};
use crate::{EngineError, EngineResult};
use smol_str::SmolStr;

/// Compile template text into an op list.
///
/// `known_directive` reports dispatch-table membership: `@names` the table
/// does not know are left in the output as literal text, so templates remain
/// compatible with host text that merely looks directive-shaped. `@@` escapes
/// a literal `@`.
pub fn compile<F>(source: &str, known_directive: F) -> EngineResult<Program>
where
    F: Fn(&str) -> bool,
{
    let mut ops = Vec::new();
    let mut text = String::new();
    let bytes = source.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        let rest = &source[pos..];

        if let Some(inner_rest) = rest.strip_prefix("{!!") {
            let end = inner_rest.find("!!}").ok_or_else(|| {
                EngineError::parse("unterminated `{!!` raw output", pos)
            })?;
            let expr = parse_expr(&inner_rest[..end], pos + 3)?;
            flush_text(&mut ops, &mut text);
            ops.push(Op::RawEcho(expr));
            pos += 3 + end + 3;
            continue;
        }

        if let Some(inner_rest) = rest.strip_prefix("{{") {
            let end = inner_rest.find("}}").ok_or_else(|| {
                EngineError::parse("unterminated `{{` interpolation", pos)
            })?;
            let expr = parse_expr(&inner_rest[..end], pos + 2)?;
            flush_text(&mut ops, &mut text);
            ops.push(Op::Echo(expr));
            pos += 2 + end + 2;
            continue;
        }

        if rest.starts_with("@@") {
            text.push('@');
            pos += 2;
            // Skip the escaped token so `@@name` stays `@name` in the output.
            let tail = &source[pos..];
            let word_len = tail
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(tail.len());
            text.push_str(&tail[..word_len]);
            pos += word_len;
            continue;
        }

        if rest.starts_with('@') {
            let name_len = rest[1..]
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len() - 1);
            let name = &rest[1..1 + name_len];
            if !name.is_empty()
                && !name.starts_with(|c: char| c.is_ascii_digit())
                && known_directive(name)
            {
                let after_name = pos + 1 + name_len;
                let (args, consumed) = parse_directive_args(source, after_name)?;
                flush_text(&mut ops, &mut text);
                ops.push(Op::Directive(DirectiveCall {
                    name: SmolStr::from(name),
                    args,
                }));
                pos = consumed;
                continue;
            }
        }

        let c = rest.chars().next().unwrap();
        text.push(c);
        pos += c.len_utf8();
    }

    flush_text(&mut ops, &mut text);
    Ok(Program::new(ops))
}

fn flush_text(ops: &mut Vec<Op>, text: &mut String) {
    if !text.is_empty() {
        ops.push(Op::Text(std::mem::take(text)));
    }
}

/// Parse an optional `(args)` list starting at `start`. Returns the parsed
/// args and the byte position after the closing paren (or `start` unchanged
/// when no argument list follows).
fn parse_directive_args(source: &str, start: usize) -> EngineResult<(Vec<Expr>, usize)> {
    let rest = &source[start..];
    if !rest.starts_with('(') {
        return Ok((Vec::new(), start));
    }

    // Find the matching close paren, honoring quotes and nesting.
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut inner_end = None;
    for (i, c) in rest.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    inner_end = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }
    let inner_end = inner_end
        .ok_or_else(|| EngineError::parse("unterminated directive argument list", start))?;
    let inner = &rest[1..inner_end];

    let mut args = Vec::new();
    let mut parser = ExprParser::new(inner, start + 1);
    loop {
        parser.skip_whitespace();
        if parser.is_eof() {
            break;
        }
        args.push(parser.parse_expr()?);
        parser.skip_whitespace();
        if !parser.consume(',') {
            parser.skip_whitespace();
            if !parser.is_eof() {
                return Err(EngineError::parse(
                    "expected `,` between directive arguments",
                    parser.offset(),
                ));
            }
            break;
        }
    }

    Ok((args, start + inner_end + 1))
}
