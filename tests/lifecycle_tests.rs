//! Initialization and environment reset.

mod common;

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use common::{eval, repl, MapReader};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use reval::config::InitData;
use reval::syntax::{Form, Symbol};
use reval::{ReplError, ReplOptions, Target};

fn counting_init(count: &Arc<AtomicUsize>) -> ReplOptions {
    let count = Arc::clone(count);
    ReplOptions::new().init_fn(move |_| {
        count.fetch_add(1, Ordering::SeqCst);
        async {}
    })
}

#[tokio::test]
async fn init_runs_once() {
    let (repl, _) = repl();
    let count = Arc::new(AtomicUsize::new(0));
    let options = counting_init(&count);
    assert!(repl.init_state().needs_init());

    repl.read_eval(&options, "1").await;
    repl.read_eval(&options, "2").await;
    repl.read_eval(&options, "(doc if)").await;

    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(!repl.init_state().needs_init());
    assert!(!repl.init_state().initializing());
}

#[tokio::test]
async fn force_init_runs_it_again() {
    let (repl, _) = repl();
    let count = Arc::new(AtomicUsize::new(0));
    let options = counting_init(&count);

    repl.read_eval(&options, "1").await;
    repl.force_init();
    assert!(repl.init_state().needs_init());
    repl.read_eval(&options, "1").await;

    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn init_actions_run_in_order_with_request_data() {
    let (repl, _) = repl();
    let seen: Arc<Mutex<Vec<(usize, InitData)>>> = Arc::default();
    let first = Arc::clone(&seen);
    let second = Arc::clone(&seen);
    let options = ReplOptions::new()
        .target(Target::Nodejs)
        .init_fn(move |data| {
            first.lock().push((1, data));
            async {}
        })
        .init_fn(move |data| {
            second.lock().push((2, data));
            async {}
        });

    repl.read_eval(&options, "(+ 1 2)").await;

    let seen = seen.lock();
    let order: Vec<usize> = seen.iter().map(|(n, _)| *n).collect();
    assert_eq!(order, vec![1, 2]);
    let (_, data) = &seen[0];
    assert_eq!(data.form.to_string(), "(+ 1 2)");
    assert_eq!(data.ns, Symbol::new("cljs.user"));
    assert_eq!(data.target, Target::Nodejs);
}

#[tokio::test]
async fn overlapping_requests_do_not_initialize_twice() {
    let (repl, _) = repl();
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let options = ReplOptions::new().init_fn(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        async {
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
        }
    });

    let (a, b) = tokio::join!(
        repl.read_eval(&options, "1"),
        repl.read_eval(&options, "2")
    );

    assert!(a.is_success() && b.is_success());
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(!repl.init_state().needs_init());
}

#[tokio::test]
async fn init_discovers_the_module_index() {
    let (repl, _) = repl();
    let reader = Arc::new(MapReader::new([
        (
            "lib/goog/deps.js",
            "goog.addDependency('string/string.js', ['goog.string'], []);",
        ),
        (
            "src/goog/deps.js",
            "goog.addDependency(\"dom/dom.js\", [\"goog.dom\", \"goog.dom.TagName\"], []);",
        ),
    ]));
    let options = ReplOptions::new()
        .src_paths(["src", "lib"])
        .read_file_fn(reader.clone());

    repl.read_eval(&options, "nil").await;

    let index = repl.module_index();
    assert_eq!(index.len(), 3);
    assert_eq!(
        index.get(&Symbol::new("goog.dom.TagName")).map(String::as_str),
        Some("goog/dom/dom.js")
    );
    assert_eq!(
        index.get(&Symbol::new("goog.string")).map(String::as_str),
        Some("goog/string/string.js")
    );
}

#[tokio::test]
async fn reset_restores_the_default_session() {
    let (repl, _) = repl();
    eval(&repl, "(in-ns 'somewhere.else)").await;
    eval(&repl, "(throw \"boom\")").await;

    repl.reset_env(&[]).await.unwrap();

    assert_eq!(repl.current_ns(), Symbol::new("cljs.user"));
    assert_eq!(repl.last_eval_warning(), None);
    assert_eq!(repl.history().error, None);

    let result = eval(&repl, "(+ 1 1)").await;
    assert_eq!(result.form, Form::List(vec![
        Form::symbol("+"),
        Form::Int(1),
        Form::Int(1),
    ]));
    assert_eq!(repl.current_ns(), Symbol::new("cljs.user"));
}

#[tokio::test]
async fn reset_purges_the_given_namespaces() {
    let (repl, mock) = repl();
    mock.mark_loaded("foo.core");
    mock.mark_loaded("foo.util");

    repl.reset_env(&[Symbol::new("foo.core"), Symbol::new("foo.util")])
        .await
        .unwrap();

    assert_eq!(
        mock.purged(),
        vec![Symbol::new("foo.core"), Symbol::new("foo.util")]
    );
    assert!(mock.loaded().is_empty());
}

#[tokio::test]
async fn reset_refuses_while_namespaces_stay_loaded() {
    let (repl, mock) = repl();
    mock.mark_loaded("foo.core");
    mock.mark_loaded("foo.dependent");
    eval(&repl, "(in-ns 'somewhere.else)").await;

    let err = repl
        .reset_env(&[Symbol::new("foo.core")])
        .await
        .unwrap_err();

    assert!(matches!(err, ReplError::Precondition { .. }));
    assert!(err.message().contains("foo.dependent"));
    assert_eq!(repl.current_ns(), Symbol::new("somewhere.else"));
}
