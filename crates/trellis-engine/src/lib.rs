//! Directive-based template engine for trellis.
//!
//! This crate is the execution environment the rest of trellis targets:
//! - `@name(args)` directives dispatched through a closed handler table
//! - `{{ expr }}` escaped interpolation and `{!! expr !!}` raw output
//! - compilation of template text into a serializable op-list [`Program`]
//! - execution of a program against a [`Scope`] of `serde_json` values
//!
//! The expression grammar is intentionally small: literals, dotted variable
//! paths, and brace map literals. Anything richer belongs to the layers that
//! generate directive code, not to the engine.

pub mod compiler;
pub mod exec;
pub mod expr;
pub mod program;
pub mod scope;

pub use compiler::compile;
pub use exec::{display_value, escape_html, DirectiveHandler, Engine, ExecContext};
pub use expr::Expr;
pub use program::{DirectiveCall, Op, Program};
pub use scope::{Scope, Value};

use smol_str::SmolStr;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// An error raised while compiling or executing a template program.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed interpolation, directive argument list, or expression.
    #[error("parse error at byte {offset}: {message}")]
    Parse { message: String, offset: usize },

    /// A compiled program referenced a directive the table does not know.
    #[error("unknown directive `@{0}`")]
    UnknownDirective(SmolStr),

    /// A directive handler rejected its invocation.
    #[error("directive `@{name}`: {message}")]
    Directive { name: SmolStr, message: String },

    /// A typed error tunneled out of a directive handler.
    #[error(transparent)]
    Handler(Box<dyn std::error::Error + Send + Sync>),

    /// Output captures opened by directives were not all closed.
    #[error("unbalanced output capture: {0}")]
    UnbalancedCapture(String),
}

impl EngineError {
    /// Shorthand for a handler rejection.
    pub fn directive(name: impl Into<SmolStr>, message: impl Into<String>) -> Self {
        Self::Directive {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>, offset: usize) -> Self {
        Self::Parse {
            message: message.into(),
            offset,
        }
    }
}
