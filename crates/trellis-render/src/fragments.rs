//! Fragment extraction from rendered output.
//!
//! Templates mark extractable regions with `@fragment('name')` /
//! `@endfragment`, which render as literal `BEGIN name` / `END name` marker
//! lines. Extraction scans the finished output for those markers; it never
//! re-renders.

use regex::Regex;

/// Extract the requested fragments from rendered output.
///
/// Returns the trimmed bodies of every matching marker pair, concatenated in
/// request order. Returns `None` when no requested fragment matched — the
/// caller falls back to the full output, which is the documented behavior,
/// not a silent failure.
pub fn extract(output: &str, names: &[String]) -> Option<String> {
    let mut pieces: Vec<String> = Vec::new();

    for name in names {
        let escaped = regex::escape(name);
        let pattern = format!(r"(?s)BEGIN[ \t]+{escaped}\b(.*?)END[ \t]+{escaped}\b");
        let Ok(re) = Regex::new(&pattern) else {
            continue;
        };
        for caps in re.captures_iter(output) {
            pieces.push(caps[1].trim().to_string());
        }
    }

    if pieces.is_empty() {
        None
    } else {
        Some(pieces.join("\n"))
    }
}
