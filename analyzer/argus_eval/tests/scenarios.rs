//! End-to-end scenarios: overlay-backed modules driven through the
//! scanner and the symbolic evaluator.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use argus_eval::{Evaluator, Object};
use argus_scan::{Overlay, Session};

fn session_with_policy(
    files: &[(&str, &str)],
    policy: impl Fn(&str) -> bool + Send + Sync + 'static,
) -> Arc<Session> {
    let mut overlay = Overlay::new();
    overlay.add("/demo/go.mod", "module example.com/demo\n\ngo 1.22\n");
    for (path, src) in files {
        overlay.add(*path, (*src).to_string());
    }
    Arc::new(
        Session::builder("/demo")
            .overlay(overlay)
            .policy(policy)
            .build()
            .expect("session builds"),
    )
}

fn session(files: &[(&str, &str)]) -> Arc<Session> {
    session_with_policy(files, |path| {
        path == "example.com/demo" || path.starts_with("example.com/demo/")
    })
}

/// Record the qualified name of every observed callee.
fn install_tracer(evaluator: &Evaluator) -> Rc<RefCell<Vec<String>>> {
    let trace: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&trace);
    evaluator.register_default_intrinsic(move |_, args| {
        if let Some(name) = args.first().and_then(callee_name) {
            sink.borrow_mut().push(name);
        }
        Object::Nil
    });
    trace
}

fn callee_name(obj: &Object) -> Option<String> {
    match obj {
        Object::Function(f) => Some(f.qualified_name()),
        Object::Placeholder(p) => p
            .underlying_function
            .as_ref()
            .map(|f| f.qualified_name()),
        _ => None,
    }
}

// ----------------------------------------------------------------------
// Scenario 1: cross-package call trace

#[test]
fn test_cross_package_call_trace() {
    let session = session(&[
        (
            "/demo/main.go",
            "package main\n\nimport \"example.com/demo/svc\"\n\nfunc main() {\n\tsvc.Run()\n}\n",
        ),
        (
            "/demo/svc/svc.go",
            "package svc\n\nimport \"example.com/demo/worker\"\n\nfunc Run() {\n\tworker.DoWork()\n}\n",
        ),
        (
            "/demo/worker/worker.go",
            "package worker\n\nfunc DoWork() {}\n",
        ),
    ]);
    let evaluator = Evaluator::new(session);
    let trace = install_tracer(&evaluator);

    let result = evaluator.apply_named("example.com/demo", "main");
    assert!(!result.is_error(), "evaluation failed: {result:?}");

    assert_eq!(
        *trace.borrow(),
        vec![
            "example.com/demo.main",
            "example.com/demo/svc.Run",
            "example.com/demo/worker.DoWork",
        ]
    );
}

// ----------------------------------------------------------------------
// Scenario 2: interface dispatch with a concrete instance

#[test]
fn test_interface_dispatch_intrinsic_receives_instance_fields() {
    let session = session(&[(
        "/demo/main.go",
        concat!(
            "package main\n\n",
            "type Walker interface {\n\tGreet() string\n}\n\n",
            "type Person struct {\n\tName string\n}\n\n",
            "func (p Person) Greet() string { return p.Name }\n\n",
            "func main() {\n",
            "\tvar i Walker = Person{Name: \"Alice\"}\n",
            "\tif p, ok := i.(Person); ok {\n",
            "\t\tp.Greet()\n",
            "\t}\n",
            "}\n",
        ),
    )]);
    let evaluator = Evaluator::new(session);

    let received: Rc<RefCell<Vec<Object>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&received);
    evaluator.register_intrinsic("(example.com/demo.Person).Greet", move |_, args| {
        sink.borrow_mut().extend(args.iter().cloned());
        Object::string("hi")
    });

    let result = evaluator.apply_named("example.com/demo", "main");
    assert!(!result.is_error(), "evaluation failed: {result:?}");

    let received = received.borrow();
    assert!(!received.is_empty(), "intrinsic was not invoked");
    let receiver = &received[0];
    let name = receiver
        .field("Name")
        .expect("receiver placeholder routes to the Person instance");
    assert_eq!(name.inspect(), "\"Alice\"");
    let info = receiver.type_info().expect("receiver has resolved type");
    assert_eq!(info.name, "Person");
    assert!(!info.unresolved);
}

// ----------------------------------------------------------------------
// Scenario 3: out-of-policy embedded method

#[test]
fn test_out_of_policy_embedded_method_warns_and_continues() {
    let session = session(&[
        (
            "/demo/main.go",
            concat!(
                "package main\n\n",
                "import \"example.com/demo/cli\"\n\n",
                "func main() {\n",
                "\tapp := &cli.Application{}\n",
                "\tapp.Run()\n",
                "\tmarker()\n",
                "}\n\n",
                "func marker() {}\n",
            ),
        ),
        (
            "/demo/cli/cli.go",
            concat!(
                "package cli\n\n",
                "import \"example.com/ext\"\n\n",
                "type Application struct {\n",
                "\t*ext.Application\n",
                "}\n",
            ),
        ),
    ]);
    let evaluator = Evaluator::new(session);
    let trace = install_tracer(&evaluator);

    let result = evaluator.apply_named("example.com/demo", "main");
    assert!(!result.is_error(), "evaluation failed: {result:?}");

    let warnings = evaluator.finalize();
    let embedded_warning = warnings
        .iter()
        .find(|w| w.contains("assuming method exists on unresolved embedded type"))
        .expect("embedded-method warning emitted");
    assert!(
        embedded_warning.contains("method_name=\"Run\""),
        "warning names the method: {embedded_warning}"
    );

    // The walk continued past the placeholder call.
    assert!(
        trace.borrow().contains(&"example.com/demo.marker".to_string()),
        "marker call observed after the unresolved method: {:?}",
        trace.borrow()
    );
}

// ----------------------------------------------------------------------
// Scenario 4: type switch narrowing, in and out of policy

fn type_switch_module() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "/demo/main.go",
            concat!(
                "package main\n\n",
                "import \"example.com/demo/other\"\n\n",
                "func run(i interface{}) {\n",
                "\tswitch v := i.(type) {\n",
                "\tcase other.Person:\n",
                "\t\tinspect(v)\n",
                "\t}\n",
                "}\n\n",
                "func inspect(v interface{}) {}\n",
            ),
        ),
        (
            "/demo/other/other.go",
            "package other\n\ntype Person struct {\n\tName string\n}\n",
        ),
    ]
}

fn run_type_switch(in_policy: bool) -> Object {
    let files = type_switch_module();
    let session = if in_policy {
        session(&files)
    } else {
        session_with_policy(&files, |path| {
            (path == "example.com/demo" || path.starts_with("example.com/demo/"))
                && !path.ends_with("/other")
        })
    };
    let evaluator = Evaluator::new(session);

    let captured: Rc<RefCell<Option<Object>>> = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&captured);
    evaluator.register_intrinsic("example.com/demo.inspect", move |_, args| {
        *sink.borrow_mut() = args.first().cloned();
        Object::Nil
    });

    let result = evaluator.apply_named("example.com/demo", "run");
    assert!(!result.is_error(), "evaluation failed: {result:?}");
    let captured = captured.borrow().clone();
    captured.expect("inspect intrinsic was invoked")
}

#[test]
fn test_type_switch_narrowing_in_policy() {
    let value = run_type_switch(true);
    let info = value.type_info().expect("narrowed value carries type info");
    assert_eq!(info.pkg_path, "example.com/demo/other");
    assert_eq!(info.name, "Person");
    assert!(!info.unresolved);
}

#[test]
fn test_type_switch_narrowing_out_of_policy() {
    let value = run_type_switch(false);
    let info = value.type_info().expect("narrowed value carries type info");
    assert_eq!(info.pkg_path, "example.com/demo/other");
    assert_eq!(info.name, "Person");
    assert!(info.unresolved);
}

// ----------------------------------------------------------------------
// Scenario 5: recursive type resolution terminates

#[test]
fn test_recursive_type_resolution_terminates() {
    let session = session(&[("/demo/rec/rec.go", "package rec\n\ntype T []*T\n")]);
    let pkg = session
        .scan_package_by_import("example.com/demo/rec")
        .unwrap();
    let t = pkg.lookup_type("T").unwrap();
    let underlying = t.underlying.as_ref().unwrap();
    // `[]*T` — the element resolves back to the same TypeInfo record.
    let resolved = session.resolve_type(underlying);
    assert!(Arc::ptr_eq(&resolved, t));
    assert_eq!(underlying.to_string(), "[]*example.com/demo/rec.T");
}

// ----------------------------------------------------------------------
// Possible-types tracking across assignments

#[test]
fn test_interface_variable_tracks_possible_types() {
    let session = session(&[(
        "/demo/main.go",
        concat!(
            "package main\n\n",
            "type Walker interface {\n\tWalk()\n}\n\n",
            "type Person struct{}\n\n",
            "func (p Person) Walk() {}\n\n",
            "type Robot struct{}\n\n",
            "func (r *Robot) Walk() {}\n\n",
            "func observe(w Walker) {}\n\n",
            "func main() {\n",
            "\tvar w Walker = Person{}\n",
            "\tw = &Robot{}\n",
            "\tobserve(w)\n",
            "}\n",
        ),
    )]);
    let evaluator = Evaluator::new(session);

    let captured: Rc<RefCell<Option<Object>>> = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&captured);
    evaluator.register_intrinsic("example.com/demo.observe", move |_, args| {
        *sink.borrow_mut() = args.first().cloned();
        Object::Nil
    });

    let result = evaluator.apply_named("example.com/demo", "main");
    assert!(!result.is_error(), "evaluation failed: {result:?}");

    let captured = captured.borrow().clone().expect("observe invoked");
    let Object::Variable(var) = captured else {
        panic!("expected the interface variable, got {captured:?}");
    };
    let mut possible: Vec<String> = var.possible_types.borrow().iter().cloned().collect();
    possible.sort();
    assert_eq!(
        possible,
        vec!["*example.com/demo.Robot", "example.com/demo.Person"]
    );
}

// ----------------------------------------------------------------------
// Boundary behaviors

#[test]
fn test_spread_on_non_variadic_is_an_error() {
    let session = session(&[(
        "/demo/main.go",
        concat!(
            "package main\n\n",
            "func f(a []int) {}\n\n",
            "func main() {\n",
            "\txs := []int{1, 2}\n",
            "\tf(xs...)\n",
            "}\n",
        ),
    )]);
    let evaluator = Evaluator::new(session);
    let result = evaluator.apply_named("example.com/demo", "main");
    let Object::Error(err) = result else {
        panic!("expected evaluator error, got {result:?}");
    };
    assert!(
        err.message.contains("non-variadic"),
        "unexpected message: {}",
        err.message
    );
}

#[test]
fn test_infinite_recursion_is_cut_off() {
    let session = session(&[(
        "/demo/main.go",
        "package main\n\nfunc spin() {\n\tspin()\n}\n\nfunc main() {\n\tspin()\n}\n",
    )]);
    let evaluator = Evaluator::new(session);
    let result = evaluator.apply_named("example.com/demo", "main");
    assert!(!result.is_error(), "recursion must not error: {result:?}");
    let warnings = evaluator.finalize();
    assert!(
        warnings.iter().any(|w| w.contains("recursion detected")),
        "expected recursion warning, got {warnings:?}"
    );
}

#[test]
fn test_default_intrinsic_observes_out_of_policy_calls() {
    let files = [
        (
            "/demo/main.go",
            concat!(
                "package main\n\n",
                "import \"example.com/vendor/lib\"\n\n",
                "func main() {\n",
                "\tlib.External()\n",
                "}\n",
            ),
        ),
        (
            "/vendorsrc/lib/lib.go",
            "package lib\n\nfunc External() {}\n",
        ),
    ];
    // `example.com/vendor/...` resolves via a replace directive but is
    // out of the scan policy.
    let mut overlay = Overlay::new();
    overlay.add(
        "/demo/go.mod",
        "module example.com/demo\n\nreplace example.com/vendor => /vendorsrc\n",
    );
    for (path, src) in files {
        overlay.add(path, src.to_string());
    }
    let session = Arc::new(
        Session::builder("/demo")
            .overlay(overlay)
            .policy(|path| path.starts_with("example.com/demo"))
            .build()
            .unwrap(),
    );
    let evaluator = Evaluator::new(session);
    let trace = install_tracer(&evaluator);

    let result = evaluator.apply_named("example.com/demo", "main");
    assert!(!result.is_error(), "evaluation failed: {result:?}");
    assert!(
        trace
            .borrow()
            .contains(&"example.com/vendor/lib.External".to_string()),
        "out-of-policy callee still observed: {:?}",
        trace.borrow()
    );
}
