//! The six-step tag rewrite pipeline.

use crate::invocation::{parse_attributes, IntermediateInvocation};
use crate::protect::ProtectStore;
use crate::{directives, RewriteResult, SyntaxError};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use smol_str::SmolStr;
use std::path::Path;

// Attribute text between a tag name and its closing bracket: anything except
// an unquoted `>`, with quoted runs allowed to contain whatever they like.
const ATTR_BLOB: &str = r#"((?:[^>'"]|'[^']*'|"[^"]*")*?)"#;

static SLOT_SELF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"<slot\b{ATTR_BLOB}/>")).unwrap());
static SLOT_OPEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"<slot\b{ATTR_BLOB}>")).unwrap());
static SLOT_CLOSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"</slot\s*>").unwrap());
static TAG_SELF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"<x-([A-Za-z][\w.\-]*)\s*{ATTR_BLOB}/>")).unwrap());
static TAG_OPEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"<x-([A-Za-z][\w.\-]*)\s*{ATTR_BLOB}>")).unwrap());
static TAG_CLOSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"</x-[A-Za-z][\w.\-]*\s*>").unwrap());
static LEFTOVER_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?x-[A-Za-z]").unwrap());
static LEFTOVER_SLOT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?slot\b").unwrap());
static SLOT_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.\-]+$").unwrap());

/// Rewrite component tag syntax into host directive syntax.
///
/// `lower` turns each parsed invocation record into directive code; the
/// codegen crate supplies it. On any syntax error the whole rewrite fails —
/// no partial output is ever returned.
pub fn rewrite<F>(source: &str, path: &Path, lower: F) -> RewriteResult<String>
where
    F: Fn(&IntermediateInvocation) -> String,
{
    // 1. Protect host syntax from the markup passes.
    let (text, store) = ProtectStore::protect(source);

    // 2. Named slots. Self-closing slots first so the paired-open pattern
    //    cannot half-match them; the pair balance is checked before opens and
    //    closes are rewritten independently.
    let text = replace_tags(&text, &SLOT_SELF_RE, |caps| {
        let name = slot_name(&caps[1], &store, path)?;
        Ok(format!(
            "@{}('{name}')@{}",
            directives::SLOT,
            directives::END_SLOT
        ))
    })?;
    let opens = SLOT_OPEN_RE.find_iter(&text).count();
    let closes = SLOT_CLOSE_RE.find_iter(&text).count();
    if opens != closes {
        return Err(SyntaxError::new(
            path,
            format!("unbalanced <slot> tags: {opens} opened, {closes} closed"),
        ));
    }
    let text = replace_tags(&text, &SLOT_OPEN_RE, |caps| {
        let name = slot_name(&caps[1], &store, path)?;
        Ok(format!("@{}('{name}')", directives::SLOT))
    })?;
    let text = SLOT_CLOSE_RE
        .replace_all(&text, format!("@{}", directives::END_SLOT).as_str())
        .into_owned();

    // 3. Self-closing component tags.
    let text = replace_tags(&text, &TAG_SELF_RE, |caps| {
        let invocation = parse_invocation(caps, true, &store, path)?;
        Ok(lower(&invocation))
    })?;

    // 4. Paired component tags: the opening tag becomes a begin-invocation
    //    directive, the body stays in place, the closing tag becomes the end
    //    directive. Pairing is resolved at render time.
    let text = replace_tags(&text, &TAG_OPEN_RE, |caps| {
        let invocation = parse_invocation(caps, false, &store, path)?;
        Ok(lower(&invocation))
    })?;
    let text = TAG_CLOSE_RE
        .replace_all(&text, format!("@{}", directives::END_COMPONENT).as_str())
        .into_owned();

    // Anything tag-shaped that survived the passes is malformed (unbalanced
    // quotes are the usual culprit).
    if LEFTOVER_TAG_RE.is_match(&text) {
        return Err(SyntaxError::new(
            path,
            "malformed component tag (check for unbalanced quotes)",
        ));
    }
    if LEFTOVER_SLOT_RE.is_match(&text) {
        return Err(SyntaxError::new(
            path,
            "malformed <slot> tag (check for unbalanced quotes)",
        ));
    }

    // 6. Restore host syntax, last.
    Ok(store.restore(&text))
}

/// `regex::Regex::replace_all` with a fallible replacement closure.
fn replace_tags<F>(text: &str, re: &Regex, mut replace: F) -> RewriteResult<String>
where
    F: FnMut(&Captures<'_>) -> RewriteResult<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let m = caps.get(0).unwrap();
        out.push_str(&text[last..m.start()]);
        out.push_str(&replace(&caps)?);
        last = m.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// Build the invocation record for one matched component tag.
fn parse_invocation(
    caps: &Captures<'_>,
    is_self_closing: bool,
    store: &ProtectStore,
    path: &Path,
) -> RewriteResult<IntermediateInvocation> {
    let attributes = parse_attributes(&caps[2], store, path)?;
    Ok(IntermediateInvocation {
        component_name: SmolStr::from(&caps[1]),
        is_self_closing,
        attributes,
    })
}

/// Extract and validate the required `name` attribute of a `<slot>` tag.
fn slot_name(blob: &str, store: &ProtectStore, path: &Path) -> RewriteResult<String> {
    use crate::invocation::AttrValue;

    let attrs = parse_attributes(blob, store, path)?;
    let Some((_, value)) = attrs.iter().find(|(name, _)| name == "name") else {
        return Err(SyntaxError::new(path, "<slot> tag requires a name attribute"));
    };
    match value {
        AttrValue::Literal(name) if SLOT_NAME_RE.is_match(name) => Ok(name.clone()),
        AttrValue::Literal(name) => Err(SyntaxError::new(
            path,
            format!("invalid slot name `{name}`"),
        )),
        _ => Err(SyntaxError::new(path, "slot names must be literal strings")),
    }
}
