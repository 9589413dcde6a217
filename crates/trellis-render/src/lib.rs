//! Renderer façade for trellis.
//!
//! Ties the subsystems together: names resolve through the registry, sources
//! compile through the tag rewriter and invocation codegen, programs are
//! served by the compile cache, and execution recurses back into the
//! renderer for nested components. Slot buffers and attribute bags are
//! per-invocation values; nothing rendered leaks across render calls.

pub mod bag;
pub mod fragments;
mod handlers;
pub mod renderer;
pub mod slots;

pub use bag::AttributeBag;
pub use renderer::{RenderError, RenderMode, Renderer, MAX_DEPTH};
pub use slots::{SlotSet, DEFAULT_SLOT};

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::Path;
    use std::sync::Arc;
    use trellis_cache::{CacheMode, CompileCache};
    use trellis_registry::Registry;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn renderer(files: &[(&str, &str)], mode: RenderMode) -> (tempfile::TempDir, Renderer) {
        let dir = tempfile::tempdir().unwrap();
        for (rel, content) in files {
            write(dir.path(), rel, content);
        }
        let registry = Arc::new(Registry::default());
        registry.add_search_root(dir.path());
        let cache = Arc::new(CompileCache::in_memory(CacheMode::AlwaysCheck));
        let renderer = Renderer::new(registry, cache, mode);
        (dir, renderer)
    }

    #[test]
    fn test_renders_plain_template() {
        let (_dir, renderer) = renderer(
            &[("page.html", "<h1>{{ title }}</h1>")],
            RenderMode::Strict,
        );
        let out = renderer.render("page", json!({"title": "Hello"})).unwrap();
        assert_eq!(out, "<h1>Hello</h1>");
    }

    #[test]
    fn test_renders_self_closing_component() {
        let (_dir, renderer) = renderer(
            &[
                ("page.html", r#"<x-alert type="error" :message="msg" />"#),
                (
                    "alert.html",
                    r#"<div class="alert-{{ type }}">{{ message }}</div>"#,
                ),
            ],
            RenderMode::Strict,
        );
        let out = renderer.render("page", json!({"msg": "Boom"})).unwrap();
        assert_eq!(out, r#"<div class="alert-error">Boom</div>"#);
    }

    #[test]
    fn test_paired_component_with_slots() {
        let (_dir, renderer) = renderer(
            &[
                (
                    "page.html",
                    concat!(
                        r#"<x-card title="Hi"><p>Body</p>"#,
                        r#"<slot name="footer">F1</slot>"#,
                        r#"<slot name="footer">F2</slot></x-card>"#,
                    ),
                ),
                (
                    "card.html",
                    "<h2>{{ title }}</h2>{!! slot !!}<footer>{!! footer !!}</footer>",
                ),
            ],
            RenderMode::Strict,
        );
        let out = renderer.render("page", json!({})).unwrap();
        // Named slots are excluded from the default slot body, and the
        // second `footer` definition wins.
        assert_eq!(out, "<h2>Hi</h2><p>Body</p><footer>F2</footer>");
    }

    #[test]
    fn test_self_closing_and_paired_are_equivalent() {
        let (_dir, renderer) = renderer(
            &[
                ("a.html", r#"<x-chip label="x" />"#),
                ("b.html", r#"<x-chip label="x"></x-chip>"#),
                ("chip.html", "<span>{{ label }}</span>"),
            ],
            RenderMode::Strict,
        );
        let a = renderer.render("a", json!({})).unwrap();
        let b = renderer.render("b", json!({})).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_explicit_attributes_win_over_ambient_scope() {
        let (_dir, renderer) = renderer(
            &[
                ("page.html", r#"<x-badge label="explicit" />"#),
                ("badge.html", "{{ label }}/{{ ambient }}"),
            ],
            RenderMode::Strict,
        );
        let out = renderer
            .render("page", json!({"label": "ambient", "ambient": "seen"}))
            .unwrap();
        assert_eq!(out, "explicit/seen");
    }

    #[test]
    fn test_bookkeeping_never_leaks_into_component() {
        let (_dir, renderer) = renderer(
            &[
                ("page.html", "<x-probe />"),
                ("probe.html", "[{{ slot }}]"),
            ],
            RenderMode::Strict,
        );
        // The caller's own `slot` variable must not be visible inside the
        // component's scope.
        let out = renderer.render("page", json!({"slot": "leaked"})).unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn test_component_sees_attribute_bag() {
        let (_dir, renderer) = renderer(
            &[
                ("page.html", r#"<x-who role="admin" />"#),
                ("who.html", "{{ attributes.role }}"),
            ],
            RenderMode::Strict,
        );
        let out = renderer.render("page", json!({})).unwrap();
        assert_eq!(out, "admin");
    }

    #[test]
    fn test_unknown_nested_component_renders_placeholder() {
        let (_dir, renderer) = renderer(
            &[("page.html", "a<x-missing />b")],
            RenderMode::Strict,
        );
        let out = renderer.render("page", json!({})).unwrap();
        assert_eq!(out, "a<!-- trellis: component 'missing' not found -->b");
    }

    #[test]
    fn test_unknown_top_level_name_raises() {
        let (_dir, renderer) = renderer(&[], RenderMode::Strict);
        let err = renderer.render("nowhere", json!({})).unwrap_err();
        assert!(matches!(err, RenderError::ComponentNotFound(name) if name == "nowhere"));
    }

    #[test]
    fn test_registration_after_compile_takes_effect() {
        let (dir, renderer) = renderer(
            &[("page.html", "<x-late />")],
            RenderMode::Strict,
        );
        let first = renderer.render("page", json!({})).unwrap();
        assert!(first.contains("not found"));

        write(dir.path(), "late.html", "arrived");
        renderer.register_component("late", dir.path().join("late.html"));
        let second = renderer.render("page", json!({})).unwrap();
        assert_eq!(second, "arrived");
    }

    #[test]
    fn test_strict_mode_propagates_nested_failure() {
        let (_dir, renderer) = renderer(
            &[
                ("page.html", "<x-broken />"),
                ("broken.html", "@endslot"),
            ],
            RenderMode::Strict,
        );
        let err = renderer.render("page", json!({})).unwrap_err();
        assert!(matches!(err, RenderError::Execution { .. }));
    }

    #[test]
    fn test_lenient_mode_contains_nested_failure() {
        let (_dir, renderer) = renderer(
            &[
                ("page.html", "a<x-broken />b"),
                ("broken.html", "@endslot"),
            ],
            RenderMode::Lenient,
        );
        let out = renderer.render("page", json!({})).unwrap();
        assert_eq!(out, "a<!-- trellis: render error -->b");
    }

    #[test]
    fn test_lenient_mode_swallows_top_level_failure() {
        let (_dir, renderer) = renderer(
            &[("page.html", "@endcomponent")],
            RenderMode::Lenient,
        );
        let out = renderer.render("page", json!({})).unwrap();
        assert_eq!(out, "<!-- trellis: render error -->");
    }

    #[test]
    fn test_syntax_error_names_the_source() {
        let (dir, renderer) = renderer(
            &[("page.html", r#"<x-card><slot>x</slot></x-card>"#)],
            RenderMode::Strict,
        );
        let err = renderer.render("page", json!({})).unwrap_err();
        let RenderError::Syntax(syntax) = err else {
            panic!("expected syntax error, got {err:?}");
        };
        assert_eq!(syntax.path, dir.path().join("page.html"));
    }

    #[test]
    fn test_component_cycle_is_cut_off() {
        let (_dir, renderer) = renderer(
            &[("loop.html", "<x-loop />")],
            RenderMode::Strict,
        );
        let err = renderer.render("loop", json!({})).unwrap_err();
        assert!(matches!(err, RenderError::DepthExceeded));
    }

    #[test]
    fn test_render_fragment_extracts_marked_region() {
        let (_dir, renderer) = renderer(
            &[(
                "page.html",
                "@fragment('header')<h1>Hi</h1>@endfragment<p>rest</p>",
            )],
            RenderMode::Strict,
        );
        let out = renderer
            .render_fragment("page", json!({}), &["header".to_string()])
            .unwrap();
        assert_eq!(out, "<h1>Hi</h1>");
    }

    #[test]
    fn test_render_fragment_falls_back_to_full_output() {
        let (_dir, renderer) = renderer(
            &[("page.html", "<p>whole page</p>")],
            RenderMode::Strict,
        );
        let out = renderer
            .render_fragment("page", json!({}), &["header".to_string()])
            .unwrap();
        assert_eq!(out, "<p>whole page</p>");
    }

    #[test]
    fn test_nested_components_compose() {
        let (_dir, renderer) = renderer(
            &[
                ("page.html", r#"<x-outer title="T">inner text</x-outer>"#),
                (
                    "outer.html",
                    r#"<section>{{ title }}<x-inner :body="attributes.title" />{!! slot !!}</section>"#,
                ),
                ("inner.html", "<em>{{ body }}</em>"),
            ],
            RenderMode::Strict,
        );
        let out = renderer.render("page", json!({})).unwrap();
        assert_eq!(out, "<section>T<em>T</em>inner text</section>");
    }

    #[test]
    fn test_touched_source_is_recompiled() {
        let (dir, renderer) = renderer(
            &[("page.html", "v1 {{ n }}")],
            RenderMode::Strict,
        );
        assert_eq!(renderer.render("page", json!({"n": 1})).unwrap(), "v1 1");

        write(dir.path(), "page.html", "v2 {{ n }}");
        let file = std::fs::File::options()
            .write(true)
            .open(dir.path().join("page.html"))
            .unwrap();
        file.set_modified(std::time::SystemTime::now() + std::time::Duration::from_secs(5))
            .unwrap();

        assert_eq!(renderer.render("page", json!({"n": 1})).unwrap(), "v2 1");
    }

    #[test]
    fn test_concurrent_first_renders_agree() {
        let (_dir, renderer) = renderer(
            &[
                ("page.html", r#"<x-box :n="n" />"#),
                ("box.html", "[{{ n }}]"),
            ],
            RenderMode::Strict,
        );
        let renderer = Arc::new(renderer);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let renderer = renderer.clone();
                std::thread::spawn(move || renderer.render("page", json!({"n": 7})).unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), "[7]");
        }
    }

    #[test]
    fn test_directive_text_survives_when_unknown() {
        let (_dir, renderer) = renderer(
            &[("page.html", "@media print {{ x }}")],
            RenderMode::Strict,
        );
        let out = renderer.render("page", json!({"x": "y"})).unwrap();
        assert_eq!(out, "@media print y");
    }
}
