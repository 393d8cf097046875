// tests/engine_cascade.rs
#![cfg(unix)]

mod common;

use common::{path, rel, Fixture};
use stylewatch::engine::{ChangeEvent, CompileStatus, HandleOutcome};
use stylewatch_test_utils::init_tracing;

#[test]
fn unchanged_content_compiles_nothing() {
    init_tracing();
    let mut fx = Fixture::new();
    fx.write("main.scss", "body { color: red; }");
    fx.scan(&["main.scss"]);

    let outcome = fx.modify("main.scss");

    assert_eq!(outcome, HandleOutcome::Unchanged { file: rel("main.scss") });
    assert!(fx.compiler.calls().is_empty());
}

#[test]
fn changed_bytes_compile_the_file_exactly_once() {
    init_tracing();
    let mut fx = Fixture::new();
    fx.write("main.scss", "body { color: red; }");
    fx.scan(&["main.scss"]);

    fx.write("main.scss", "body { color: blue; }");
    fx.modify("main.scss");

    assert_eq!(fx.compiler.calls(), vec!["main.scss"]);
}

#[test]
fn change_recompiles_direct_dependents_after_the_file() {
    init_tracing();
    let mut fx = Fixture::new();
    fx.write("_a.scss", "$a: 1;");
    fx.write("b.scss", "@use 'a';");
    fx.compiler.set_imports("b.scss", &["_a.scss"]);
    fx.scan(&["_a.scss", "b.scss"]);

    fx.write("_a.scss", "$a: 2;");
    let outcome = fx.modify("_a.scss");

    assert_eq!(fx.compiler.calls(), vec!["_a.scss", "b.scss"]);
    assert_eq!(outcome.compiled_files(), vec![rel("_a.scss"), rel("b.scss")]);
    assert!(fx
        .observer
        .events()
        .contains(&"dependents:_a.scss:b.scss".to_string()));
}

#[test]
fn cascade_stops_after_one_level() {
    init_tracing();
    let mut fx = Fixture::new();
    fx.write("_a.scss", "$a: 1;");
    fx.write("_b.scss", "@use 'a';");
    fx.write("c.scss", "@use 'b';");
    // The adapter only reports what the compiler reads; C is scripted to
    // read B alone so its import set does not contain A.
    fx.compiler.set_imports("_b.scss", &["_a.scss"]);
    fx.compiler.set_imports("c.scss", &["_b.scss"]);
    fx.scan(&["_a.scss", "_b.scss", "c.scss"]);

    fx.write("_a.scss", "$a: 2;");
    fx.modify("_a.scss");

    assert_eq!(fx.compiler.calls(), vec!["_a.scss", "_b.scss"]);
    assert_eq!(fx.compiler.call_count("c.scss"), 0);
}

#[test]
fn dependent_is_compiled_once_even_with_duplicate_reads() {
    init_tracing();
    let mut fx = Fixture::new();
    fx.write("_a.scss", "$a: 1;");
    fx.write("b.scss", "@use 'a'; @use 'a';");
    fx.compiler.set_imports("b.scss", &["_a.scss", "./_a.scss", "_a.scss"]);
    fx.scan(&["_a.scss", "b.scss"]);

    fx.write("_a.scss", "$a: 2;");
    fx.modify("_a.scss");

    assert_eq!(fx.compiler.call_count("b.scss"), 1);
}

#[test]
fn failed_compile_keeps_the_previous_import_set() {
    init_tracing();
    let mut fx = Fixture::new();
    fx.write("_d.scss", "$d: 1;");
    fx.write("a.scss", "@use 'd';");
    fx.compiler.set_imports("a.scss", &["_d.scss"]);
    fx.scan(&["_d.scss", "a.scss"]);

    // A now fails and, while failing, reads nothing.
    fx.compiler.set_imports("a.scss", &[]);
    fx.compiler.fail_compile("a.scss");
    fx.write("a.scss", "@use 'd'; body {");
    let outcome = fx.modify("a.scss");
    assert!(matches!(
        outcome,
        HandleOutcome::Recompiled {
            status: CompileStatus::Failed { .. },
            ..
        }
    ));
    assert_eq!(
        fx.engine.registry().dependents_of(&rel("_d.scss")),
        vec![rel("a.scss")]
    );

    fx.compiler.clear_calls();
    fx.write("_d.scss", "$d: 2;");
    fx.modify("_d.scss");

    assert_eq!(fx.compiler.calls(), vec!["_d.scss", "a.scss"]);
}

#[test]
fn system_error_is_retried_on_the_next_event() {
    init_tracing();
    let mut fx = Fixture::new();
    fx.write("a.scss", "v1");
    fx.scan(&["a.scss"]);

    fx.compiler.fail_system("a.scss");
    fx.write("a.scss", "v2");
    fx.modify("a.scss");

    fx.compiler.heal("a.scss");
    fx.compiler.clear_calls();
    let outcome = fx.modify("a.scss");

    assert_eq!(fx.compiler.calls(), vec!["a.scss"]);
    assert!(matches!(
        outcome,
        HandleOutcome::Recompiled {
            status: CompileStatus::Compiled { .. },
            ..
        }
    ));
}

#[test]
fn cascade_runs_even_when_the_changed_file_fails() {
    init_tracing();
    let mut fx = Fixture::new();
    fx.write("_a.scss", "$a: 1;");
    fx.write("b.scss", "@use 'a';");
    fx.compiler.set_imports("b.scss", &["_a.scss"]);
    fx.scan(&["_a.scss", "b.scss"]);

    fx.compiler.fail_compile("_a.scss");
    fx.write("_a.scss", "$a: ;");
    fx.modify("_a.scss");

    assert_eq!(fx.compiler.calls(), vec!["_a.scss", "b.scss"]);
}

#[test]
fn partials_are_compiled_but_never_written() {
    init_tracing();
    let mut fx = Fixture::new();
    fx.write("_base.scss", "$x: 1;");
    fx.write("main.scss", "@use 'base';");
    fx.write("pages/_nav.scss", "nav {}");
    fx.compiler.set_imports("main.scss", &["_base.scss"]);
    fx.scan(&["_base.scss", "main.scss", "pages/_nav.scss"]);

    fx.write("_base.scss", "$x: 2;");
    fx.modify("_base.scss");

    let written = fx.output.written_files();
    assert_eq!(written, vec!["main.scss", "main.scss"]);
    assert!(!written.iter().any(|f| f.contains("_base") || f.contains("_nav")));
}

#[test]
fn imports_outside_the_root_are_not_tracked() {
    init_tracing();
    let mut fx = Fixture::new();
    fx.write("main.scss", "@use '../vendor/reset';");
    fx.fs.add_file("/site/vendor/_reset.scss", "");
    fx.compiler
        .set_imports("main.scss", &["../vendor/_reset.scss"]);
    fx.scan(&["main.scss"]);

    let tracked = fx.engine.registry().get(&rel("main.scss")).unwrap();
    assert!(tracked.imports().is_empty());
}

#[test]
fn created_file_is_tracked_and_compiled() {
    init_tracing();
    let mut fx = Fixture::new();
    fx.scan(&[]);

    fx.write("new.scss", "a {}");
    fx.engine
        .handle_change(&ChangeEvent::created(path("new.scss")))
        .unwrap();

    assert_eq!(fx.compiler.calls(), vec!["new.scss"]);
    assert_eq!(fx.observer.count("tracked:new.scss"), 1);
    assert!(fx.log.contains("Successfully compiled file at new.scss"));
}
