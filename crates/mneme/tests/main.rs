use mneme::{py_repr, run, Ctx, RunOutcome, Value};

/// Running the same compiled source against fresh contexts is repeatable.
#[test]
fn repeat_run() {
    let ast = mneme::compile("1 + 2").unwrap();

    let mut ctx = Ctx::default();
    let RunOutcome::Complete(v) = mneme::run_ast(&ast, &mut ctx).unwrap() else {
        panic!("expected completion");
    };
    assert!(matches!(v, Value::Int(3)));

    let mut ctx = Ctx::default();
    let RunOutcome::Complete(v) = mneme::run_ast(&ast, &mut ctx).unwrap() else {
        panic!("expected completion");
    };
    assert!(matches!(v, Value::Int(3)));
}

#[test]
fn final_expression_is_the_result() {
    let mut ctx = Ctx::default();
    let outcome = run("x = 10\nx * 4 + 2", &mut ctx).unwrap();
    let RunOutcome::Complete(v) = outcome else {
        panic!("expected completion");
    };
    assert!(matches!(v, Value::Int(42)));
}

#[test]
fn string_result() {
    let mut ctx = Ctx::default();
    let v = run("'foo' + 'bar'", &mut ctx).unwrap().value().unwrap();
    assert_eq!(py_repr(&v), "'foobar'");
}

#[test]
fn syntax_errors_surface_with_kind_and_line() {
    let mut ctx = Ctx::default();
    let err = run("x = 1\ndef f(:\n", &mut ctx).unwrap_err();
    assert_eq!(err.kind, "SyntaxError");
    assert!(err.message.starts_with("SyntaxError"));
}
