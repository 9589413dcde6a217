//! Compiled program representation.
//!
//! A [`Program`] is a flat op list; paired directives (`@component` /
//! `@endcomponent`) are matched at execution time by their handlers, not by
//! nesting in the op structure. Programs serialize with `serde` so the
//! compile cache can persist them to disk.

use crate::expr::Expr;
use smol_str::SmolStr;

/// A compiled template.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Program {
    pub ops: Vec<Op>,
}

impl Program {
    pub fn new(ops: Vec<Op>) -> Self {
        Self { ops }
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// One executable operation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Op {
    /// Verbatim template text.
    Text(String),
    /// `{{ expr }}` — HTML-escaped output.
    Echo(Expr),
    /// `{!! expr !!}` — raw output.
    RawEcho(Expr),
    /// `@name(args)` — dispatched through the directive table.
    Directive(DirectiveCall),
}

/// A directive invocation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DirectiveCall {
    pub name: SmolStr,
    pub args: Vec<Expr>,
}

impl DirectiveCall {
    /// The nth argument, if present.
    pub fn arg(&self, index: usize) -> Option<&Expr> {
        self.args.get(index)
    }
}
