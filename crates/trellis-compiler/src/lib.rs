//! Tag rewriter: turns custom `<x-…>` component tags embedded in a host
//! template into the host language's own directive syntax.
//!
//! The rewrite is a strict pipeline (see [`rewriter::rewrite`]):
//!
//! 1. protect every host-language token (`@directive`, `{{ }}`, `{!! !!}`)
//!    behind an opaque placeholder so markup-level regexes can never corrupt
//!    host syntax,
//! 2. rewrite `<slot name="…">` pairs into `@slot`/`@endslot`,
//! 3. rewrite self-closing component tags,
//! 4. rewrite paired component tags,
//! 5. classify each attribute as bound, interpolated, or literal,
//! 6. restore the protected host tokens, last.
//!
//! Lowering an [`IntermediateInvocation`] to directive code is injected as a
//! callback; the codegen crate provides it.

pub mod invocation;
pub mod protect;
pub mod rewriter;

pub use invocation::{AttrValue, IntermediateInvocation};
pub use protect::ProtectStore;
pub use rewriter::rewrite;

use std::path::{Path, PathBuf};

/// Directive vocabulary the rewriter targets. The renderer registers handlers
/// under exactly these names.
pub mod directives {
    pub const COMPONENT: &str = "component";
    pub const END_COMPONENT: &str = "endcomponent";
    pub const SLOT: &str = "slot";
    pub const END_SLOT: &str = "endslot";
    pub const FRAGMENT: &str = "fragment";
    pub const END_FRAGMENT: &str = "endfragment";
}

/// Result type for rewrite operations.
pub type RewriteResult<T> = Result<T, SyntaxError>;

/// A malformed tag in a template source. Fatal to that one compilation; the
/// rewriter emits no output for a source that raises this.
#[derive(Debug, Clone, thiserror::Error)]
#[error("template syntax error in {}: {detail}", path.display())]
pub struct SyntaxError {
    /// The template resource the error was found in.
    pub path: PathBuf,
    pub detail: String,
}

impl SyntaxError {
    pub fn new(path: &Path, detail: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            detail: detail.into(),
        }
    }
}
