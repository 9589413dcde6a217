//! Host-syntax protection.
//!
//! Markup-level rewriting must never see host-language tokens: a `{{ … }}`
//! inside an attribute value, or a directive argument containing `<`, would
//! corrupt any regex- or DOM-based tag pass. Before tag rewriting, every
//! host token is swapped for an index-keyed placeholder that contains no
//! quotes, braces, angle brackets, or `@`; after all rewriting, placeholders
//! are swapped back.

use once_cell::sync::Lazy;
use regex::Regex;

static RAW_ECHO_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{!!.*?!!\}").unwrap());
static ECHO_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{\{.*?\}\}").unwrap());
static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"%__trellis_raw_(\d+)__%").unwrap());
static ECHO_INNER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\{(\{|!!)\s*(.*?)\s*(\}|!!)\}$").unwrap());

/// The side table of protected host tokens.
#[derive(Debug, Default)]
pub struct ProtectStore {
    originals: Vec<String>,
}

impl ProtectStore {
    /// Protect all host tokens in `source`, returning the protected text and
    /// the store needed to restore it.
    pub fn protect(source: &str) -> (String, ProtectStore) {
        let mut store = ProtectStore::default();

        let text = RAW_ECHO_RE
            .replace_all(source, |caps: &regex::Captures<'_>| store.stash(&caps[0]))
            .into_owned();
        let text = ECHO_RE
            .replace_all(&text, |caps: &regex::Captures<'_>| store.stash(&caps[0]))
            .into_owned();
        let text = store.protect_directives(&text);

        (text, store)
    }

    fn stash(&mut self, original: &str) -> String {
        let token = format!("%__trellis_raw_{}__%", self.originals.len());
        self.originals.push(original.to_string());
        token
    }

    /// Scan for `@name` / `@name(args)` / `@@name` tokens. Argument lists are
    /// matched with a quote-aware balanced-paren scan, which regexes cannot
    /// express.
    fn protect_directives(&mut self, source: &str) -> String {
        let mut out = String::with_capacity(source.len());
        let mut pos = 0;
        let bytes = source.as_bytes();

        while pos < bytes.len() {
            let rest = &source[pos..];
            if !rest.starts_with('@') {
                let c = rest.chars().next().unwrap();
                out.push(c);
                pos += c.len_utf8();
                continue;
            }

            let body = rest.strip_prefix("@@").unwrap_or(&rest[1..]);
            let prefix_len = rest.len() - body.len();
            let name_len = body
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(body.len());
            if name_len == 0 || body.starts_with(|c: char| c.is_ascii_digit()) {
                out.push('@');
                pos += 1;
                continue;
            }

            let mut token_len = prefix_len + name_len;
            if let Some(args_len) = balanced_args_len(&rest[token_len..]) {
                token_len += args_len;
            }
            out.push_str(&self.stash(&rest[..token_len]));
            pos += token_len;
        }

        out
    }

    /// The original text behind a token, when `text` is exactly one token.
    pub fn original_of(&self, text: &str) -> Option<&str> {
        let caps = TOKEN_RE.captures(text)?;
        if caps.get(0).unwrap().as_str() != text {
            return None;
        }
        let index: usize = caps[1].parse().ok()?;
        self.originals.get(index).map(|s| s.as_str())
    }

    /// When `text` is exactly one protected interpolation (`{{ … }}`) or
    /// raw-output (`{!! … !!}`) token, return the inner expression text.
    pub fn interpolated_expr(&self, text: &str) -> Option<&str> {
        let original = self.original_of(text)?;
        let caps = ECHO_INNER_RE.captures(original)?;
        Some(caps.get(2).unwrap().as_str())
    }

    /// Replace every placeholder in `text` with its original host token.
    pub fn restore(&self, text: &str) -> String {
        TOKEN_RE
            .replace_all(text, |caps: &regex::Captures<'_>| {
                let index: usize = caps[1].parse().unwrap_or(usize::MAX);
                self.originals
                    .get(index)
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

/// Length of a balanced `(…)` group at the start of `rest`, honoring quoted
/// strings. `None` when `rest` does not start with `(` or the group never
/// closes (the text is then left for the tag passes to reject).
fn balanced_args_len(rest: &str) -> Option<usize> {
    if !rest.starts_with('(') {
        return None;
    }
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
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
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}
