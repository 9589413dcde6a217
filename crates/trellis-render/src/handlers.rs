//! Directive handlers backing component invocation at render time.
//!
//! The handlers are registered once, when the renderer is constructed, and
//! keep all per-render bookkeeping in [`RenderState`] — never in the engine
//! or the renderer itself. Pairing of `@component`/`@endcomponent` and
//! `@slot`/`@endslot` is resolved here, at execution time, through the frame
//! stack.

use crate::bag::AttributeBag;
use crate::renderer::{Inner, RenderError};
use crate::slots::{SlotSet, DEFAULT_SLOT};
use smol_str::SmolStr;
use std::sync::Weak;
use trellis_compiler::directives;
use trellis_engine::{
    DirectiveCall, Engine, EngineError, EngineResult, ExecContext, Expr, Scope, Value,
};

/// Names the compiler introduces for its own bookkeeping. They are stripped
/// from the ambient scope before it is handed to a nested component, so a
/// component can never observe its caller's internals, and a caller never
/// sees a component's.
const SCOPE_DENYLIST: &[&str] = &[DEFAULT_SLOT, "attributes"];

/// Per-render state threaded through the engine into every handler.
pub(crate) struct RenderState {
    /// Nesting depth of the render this state belongs to.
    pub(crate) depth: usize,
    frames: Vec<ComponentFrame>,
    fragments: Vec<SmolStr>,
}

impl RenderState {
    pub(crate) fn new(depth: usize) -> Self {
        Self {
            depth,
            frames: Vec::new(),
            fragments: Vec::new(),
        }
    }
}

/// One open `@component` invocation awaiting its `@endcomponent`.
struct ComponentFrame {
    name: SmolStr,
    attrs: AttributeBag,
    ambient: Scope,
    slots: SlotSet,
    open_slots: Vec<SmolStr>,
}

/// Build the engine with the component directive set registered.
pub(crate) fn build_engine(renderer: Weak<Inner>) -> Engine<RenderState> {
    let mut engine = Engine::new();

    {
        let renderer = renderer.clone();
        engine.define_directive(directives::COMPONENT, move |call, ctx, state| {
            component(&renderer, call, ctx, state)
        });
    }
    engine.define_directive(directives::END_COMPONENT, move |call, ctx, state| {
        end_component(&renderer, call, ctx, state)
    });
    engine.define_directive(directives::SLOT, slot);
    engine.define_directive(directives::END_SLOT, end_slot);
    engine.define_directive(directives::FRAGMENT, fragment);
    engine.define_directive(directives::END_FRAGMENT, end_fragment);

    engine
}

/// `@component('name', {attrs})` opens an invocation and starts capturing the
/// default slot; `@component('name', {attrs}, true)` has no body and renders
/// immediately.
fn component(
    renderer: &Weak<Inner>,
    call: &DirectiveCall,
    ctx: &mut ExecContext<'_>,
    state: &mut RenderState,
) -> EngineResult<()> {
    let name = string_arg(call, 0)?;
    let attrs = AttributeBag::from_value(
        call.arg(1)
            .map(|expr| expr.eval(ctx.scope))
            .unwrap_or(Value::Null),
    );
    let self_closing = matches!(
        call.arg(2).map(|expr| expr.eval(ctx.scope)),
        Some(Value::Bool(true))
    );
    let ambient = capture_ambient(ctx.scope);

    if self_closing {
        render_nested(renderer, &name, attrs, ambient, SlotSet::new(), ctx, state)
    } else {
        state.frames.push(ComponentFrame {
            name,
            attrs,
            ambient,
            slots: SlotSet::new(),
            open_slots: Vec::new(),
        });
        ctx.begin_capture();
        Ok(())
    }
}

fn end_component(
    renderer: &Weak<Inner>,
    call: &DirectiveCall,
    ctx: &mut ExecContext<'_>,
    state: &mut RenderState,
) -> EngineResult<()> {
    let frame = state.frames.pop().ok_or_else(|| {
        EngineError::directive(call.name.clone(), "no open component invocation")
    })?;
    if let Some(unclosed) = frame.open_slots.last() {
        return Err(EngineError::directive(
            call.name.clone(),
            format!("slot `{unclosed}` was never closed"),
        ));
    }

    let ComponentFrame {
        name,
        attrs,
        ambient,
        mut slots,
        ..
    } = frame;
    slots.insert_default(ctx.end_capture()?);
    render_nested(renderer, &name, attrs, ambient, slots, ctx, state)
}

/// `@slot('name')` diverts output into a named slot buffer until `@endslot`.
fn slot(
    call: &DirectiveCall,
    ctx: &mut ExecContext<'_>,
    state: &mut RenderState,
) -> EngineResult<()> {
    let name = string_arg(call, 0)?;
    let frame = state.frames.last_mut().ok_or_else(|| {
        EngineError::directive(call.name.clone(), "slot used outside a component invocation")
    })?;
    frame.open_slots.push(name);
    ctx.begin_capture();
    Ok(())
}

fn end_slot(
    call: &DirectiveCall,
    ctx: &mut ExecContext<'_>,
    state: &mut RenderState,
) -> EngineResult<()> {
    let frame = state.frames.last_mut().ok_or_else(|| {
        EngineError::directive(call.name.clone(), "no open component invocation")
    })?;
    let name = frame
        .open_slots
        .pop()
        .ok_or_else(|| EngineError::directive(call.name.clone(), "no open slot"))?;
    let content = ctx.end_capture()?;
    // Last write wins when a slot name repeats within one invocation.
    frame.slots.insert(name, content);
    Ok(())
}

/// `@fragment('name')` wraps its body in literal extraction markers.
fn fragment(
    call: &DirectiveCall,
    ctx: &mut ExecContext<'_>,
    state: &mut RenderState,
) -> EngineResult<()> {
    let name = string_arg(call, 0)?;
    ctx.write(&format!("BEGIN {name}\n"));
    state.fragments.push(name);
    Ok(())
}

fn end_fragment(
    call: &DirectiveCall,
    ctx: &mut ExecContext<'_>,
    state: &mut RenderState,
) -> EngineResult<()> {
    let name = state
        .fragments
        .pop()
        .ok_or_else(|| EngineError::directive(call.name.clone(), "no open fragment"))?;
    ctx.write(&format!("\nEND {name}"));
    Ok(())
}

/// Render a resolved nested component and write its output, containing
/// failures at this nesting point according to policy.
fn render_nested(
    renderer: &Weak<Inner>,
    name: &str,
    attrs: AttributeBag,
    ambient: Scope,
    slots: SlotSet,
    ctx: &mut ExecContext<'_>,
    state: &mut RenderState,
) -> EngineResult<()> {
    let inner = renderer.upgrade().ok_or_else(|| {
        EngineError::directive(directives::COMPONENT, "renderer no longer alive")
    })?;

    match inner.render_component(name, attrs, ambient, slots, state.depth + 1) {
        Ok(html) => {
            ctx.write(&html);
            Ok(())
        }
        // A missing component never takes the page down: it renders as a
        // visible placeholder at the point of nesting.
        Err(RenderError::ComponentNotFound(missing)) => {
            tracing::warn!(component = %missing, "skipping unknown component");
            ctx.write(&format!(
                "<!-- trellis: component '{missing}' not found -->"
            ));
            Ok(())
        }
        Err(err) if inner.is_lenient() => {
            tracing::error!(component = name, error = %err, "nested render failed");
            ctx.write("<!-- trellis: render error -->");
            Ok(())
        }
        Err(err) => Err(EngineError::Handler(Box::new(err))),
    }
}

/// The enclosing variable scope minus the bookkeeping denylist.
fn capture_ambient(scope: &Scope) -> Scope {
    scope
        .iter()
        .filter(|(name, _)| {
            !name.starts_with("__") && !SCOPE_DENYLIST.contains(&name.as_str())
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn string_arg(call: &DirectiveCall, index: usize) -> EngineResult<SmolStr> {
    match call.arg(index) {
        Some(Expr::Lit(Value::String(name))) => Ok(SmolStr::from(name.as_str())),
        _ => Err(EngineError::directive(
            call.name.clone(),
            format!("argument {index} must be a string literal"),
        )),
    }
}
