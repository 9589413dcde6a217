//! Program execution: directive dispatch and output capture.

use crate::program::{DirectiveCall, Op, Program};
use crate::scope::{Scope, Value};
use crate::{EngineError, EngineResult};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::sync::Arc;

/// A directive handler.
///
/// Handlers receive the parsed call, the execution context (scope + output
/// buffers), and the caller's per-render state `S`. Paired directives keep
/// their open/close bookkeeping in `S`.
pub type DirectiveHandler<S> =
    Arc<dyn Fn(&DirectiveCall, &mut ExecContext<'_>, &mut S) -> EngineResult<()> + Send + Sync>;

/// The template engine: a closed directive dispatch table plus the compiler
/// and executor that consult it.
///
/// `S` is per-render state threaded through [`Engine::execute`] into every
/// directive handler; the engine itself holds no mutable render state.
pub struct Engine<S> {
    directives: FxHashMap<SmolStr, DirectiveHandler<S>>,
}

impl<S> Default for Engine<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Engine<S> {
    pub fn new() -> Self {
        Self {
            directives: FxHashMap::default(),
        }
    }

    /// Register a directive handler. The table is meant to be populated once,
    /// at construction time; registering the same name again replaces the
    /// previous handler.
    pub fn define_directive<F>(&mut self, name: impl Into<SmolStr>, handler: F)
    where
        F: Fn(&DirectiveCall, &mut ExecContext<'_>, &mut S) -> EngineResult<()>
            + Send
            + Sync
            + 'static,
    {
        self.directives.insert(name.into(), Arc::new(handler));
    }

    /// Compile template text against this engine's directive table.
    pub fn compile(&self, source: &str) -> EngineResult<Program> {
        crate::compiler::compile(source, |name| self.directives.contains_key(name))
    }

    /// Execute a program against a scope, producing the rendered string.
    pub fn execute(
        &self,
        program: &Program,
        scope: &mut Scope,
        state: &mut S,
    ) -> EngineResult<String> {
        let mut ctx = ExecContext::new(scope);
        for op in &program.ops {
            match op {
                Op::Text(text) => ctx.write(text),
                Op::Echo(expr) => {
                    let value = expr.eval(ctx.scope);
                    let text = display_value(&value);
                    ctx.write(&escape_html(&text));
                }
                Op::RawEcho(expr) => {
                    let value = expr.eval(ctx.scope);
                    ctx.write(&display_value(&value));
                }
                Op::Directive(call) => {
                    let handler = self
                        .directives
                        .get(&call.name)
                        .cloned()
                        .ok_or_else(|| EngineError::UnknownDirective(call.name.clone()))?;
                    handler(call, &mut ctx, state)?;
                }
            }
        }
        ctx.finish()
    }
}

/// Execution context: the live scope and an explicit stack of output buffers.
///
/// Directives that capture their body (`@slot`, `@component`) push a buffer
/// with [`begin_capture`](Self::begin_capture) and take it back with
/// [`end_capture`](Self::end_capture); all writes go to the innermost buffer.
pub struct ExecContext<'a> {
    pub scope: &'a mut Scope,
    buffers: Vec<String>,
}

impl<'a> ExecContext<'a> {
    fn new(scope: &'a mut Scope) -> Self {
        Self {
            scope,
            buffers: vec![String::new()],
        }
    }

    /// Append to the innermost output buffer.
    pub fn write(&mut self, text: &str) {
        // The root buffer always exists.
        self.buffers.last_mut().unwrap().push_str(text);
    }

    /// Start capturing output into a fresh buffer.
    pub fn begin_capture(&mut self) {
        self.buffers.push(String::new());
    }

    /// Finish the innermost capture and return its contents.
    pub fn end_capture(&mut self) -> EngineResult<String> {
        if self.buffers.len() == 1 {
            return Err(EngineError::UnbalancedCapture(
                "end of capture without a matching begin".into(),
            ));
        }
        Ok(self.buffers.pop().unwrap())
    }

    /// Number of open captures (diagnostic; the root buffer is not counted).
    pub fn open_captures(&self) -> usize {
        self.buffers.len() - 1
    }

    fn finish(mut self) -> EngineResult<String> {
        if self.buffers.len() != 1 {
            return Err(EngineError::UnbalancedCapture(format!(
                "{} capture(s) left open at end of template",
                self.buffers.len() - 1
            )));
        }
        Ok(self.buffers.pop().unwrap())
    }
}

/// Render a scope value as output text. `null` prints as nothing, scalars
/// print plainly, arrays and objects print as compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Minimal HTML escaping for `{{ }}` output.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn engine() -> Engine<Vec<String>> {
        let mut engine = Engine::new();
        // Test directive: captures its body uppercased.
        engine.define_directive("upper", |_call, ctx, _state| {
            ctx.begin_capture();
            Ok(())
        });
        engine.define_directive("endupper", |_call, ctx, _state| {
            let body = ctx.end_capture()?;
            ctx.write(&body.to_uppercase());
            Ok(())
        });
        engine.define_directive("log", |call, ctx, state: &mut Vec<String>| {
            let value = call.arg(0).map(|e| e.eval(ctx.scope)).unwrap_or_default();
            state.push(display_value(&value));
            Ok(())
        });
        engine
    }

    #[test]
    fn test_echo_escapes() {
        let engine = engine();
        let program = engine.compile("{{ html }}").unwrap();
        let mut scope = Scope::from_value(json!({"html": "<b>&</b>"}));
        let out = engine.execute(&program, &mut scope, &mut Vec::new()).unwrap();
        assert_eq!(out, "&lt;b&gt;&amp;&lt;/b&gt;");
    }

    #[test]
    fn test_raw_echo_does_not_escape() {
        let engine = engine();
        let program = engine.compile("{!! html !!}").unwrap();
        let mut scope = Scope::from_value(json!({"html": "<b>hi</b>"}));
        let out = engine.execute(&program, &mut scope, &mut Vec::new()).unwrap();
        assert_eq!(out, "<b>hi</b>");
    }

    #[test]
    fn test_null_echo_is_empty() {
        let engine = engine();
        let program = engine.compile("[{{ missing }}]").unwrap();
        let mut scope = Scope::new();
        let out = engine.execute(&program, &mut scope, &mut Vec::new()).unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn test_paired_capture_directives() {
        let engine = engine();
        let program = engine.compile("a @upper bc {{ x }} @endupper d").unwrap();
        let mut scope = Scope::from_value(json!({"x": "yz"}));
        let out = engine.execute(&program, &mut scope, &mut Vec::new()).unwrap();
        assert_eq!(out, "a  BC YZ  d");
    }

    #[test]
    fn test_state_threading() {
        let engine = engine();
        let program = engine.compile("@log('one')@log(count)").unwrap();
        let mut scope = Scope::from_value(json!({"count": 2}));
        let mut state = Vec::new();
        engine.execute(&program, &mut scope, &mut state).unwrap();
        assert_eq!(state, vec!["one".to_string(), "2".to_string()]);
    }

    #[test]
    fn test_unclosed_capture_errors() {
        let engine = engine();
        let program = engine.compile("@upper never closed").unwrap();
        let mut scope = Scope::new();
        let err = engine
            .execute(&program, &mut scope, &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::UnbalancedCapture(_)));
    }
}
