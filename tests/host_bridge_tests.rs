//! Tests for the host bridge: namespaces, marshaling and calls across the boundary

use std::cell::RefCell;
use std::rc::Rc;

use psil::{
    from_host, make_interpreter, psil, to_host, Error, ErrorKind, HostFunction, HostValue,
    Interpreter, Namespace, Value,
};
use serde_json::json;

#[test]
fn test_host_values_visible_as_globals() {
    let ns = Namespace::new();
    ns.set("width", 6);
    ns.set("height", 7i64);
    ns.set("label", "area");
    ns.set("sizes", vec![1i64, 2, 3]);

    let result = psil("(list label (* width height) (length sizes))", Some(&ns)).unwrap();
    assert_eq!(
        result,
        HostValue::List(vec![
            HostValue::from("area"),
            HostValue::Int(42),
            HostValue::Int(3),
        ])
    );
}

#[test]
fn test_top_level_defines_write_through() {
    let ns = Namespace::new();
    psil("(define total (+ 1 2)) (define names '(\"a\" \"b\"))", Some(&ns)).unwrap();
    assert_eq!(ns.get("total"), Some(HostValue::Int(3)));
    assert_eq!(
        ns.get("names"),
        Some(HostValue::List(vec![HostValue::from("a"), HostValue::from("b")]))
    );
}

#[test]
fn test_host_changes_seen_by_later_evaluation() {
    let mut interp = Interpreter::new();
    interp.eval_str("(define (scaled x) (* x factor))").unwrap();
    interp.namespace().set("factor", 3);
    assert_eq!(interp.eval_str("(scaled 5)").unwrap(), Value::Int(15));
    interp.namespace().set("factor", 10);
    assert_eq!(interp.eval_str("(scaled 5)").unwrap(), Value::Int(50));
}

#[test]
fn test_builtins_not_written_to_namespace() {
    let ns = Namespace::new();
    let _interp = Interpreter::with_namespace(ns.clone());
    assert!(ns.is_empty());
    assert!(!ns.contains("car"));
}

#[test]
fn test_host_function_called_from_psil() {
    let ns = Namespace::new();
    ns.define_fn("sum-all", |args| {
        let mut total = 0;
        for arg in args {
            total += arg
                .as_i64()
                .ok_or_else(|| Error::host("sum-all", "expected integers"))?;
        }
        Ok(HostValue::Int(total))
    });

    assert_eq!(
        psil("(sum-all 1 2 3 4)", Some(&ns)).unwrap(),
        HostValue::Int(10)
    );
    assert_eq!(
        psil("(apply sum-all '(5 6))", Some(&ns)).unwrap(),
        HostValue::Int(11)
    );
    assert_eq!(
        psil("(map sum-all '(1 2) '(10 20))", Some(&ns)).unwrap(),
        HostValue::List(vec![HostValue::Int(11), HostValue::Int(22)])
    );

    let err = psil("(sum-all 1 \"two\")", Some(&ns)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Host);
}

#[test]
fn test_host_function_receives_marshaled_lists() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let ns = Namespace::new();
    let log = Rc::clone(&seen);
    ns.define_fn("record", move |args| {
        log.borrow_mut().extend(args.iter().cloned());
        Ok(HostValue::Null)
    });

    let result = psil("(record '(1 (2 \"x\")) #t 1.5)", Some(&ns)).unwrap();
    assert_eq!(result, HostValue::Null);
    assert_eq!(
        *seen.borrow(),
        vec![
            HostValue::List(vec![
                HostValue::Int(1),
                HostValue::List(vec![HostValue::Int(2), HostValue::from("x")]),
            ]),
            HostValue::Bool(true),
            HostValue::Float(1.5),
        ]
    );
}

#[test]
fn test_psil_procedure_called_from_host() {
    let ns = Namespace::new();
    psil(
        "(define (fact n) (if (< n 2) 1 (* n (fact (- n 1)))))",
        Some(&ns),
    )
    .unwrap();

    let fact = ns.get("fact").unwrap();
    let func = fact.as_function().unwrap();
    assert!(func.is_interpreted());
    assert_eq!(func.name(), "fact");
    assert_eq!(func.call(&[HostValue::Int(10)]).unwrap(), HostValue::Int(3628800));

    let err = func.call(&[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Arity);
}

#[test]
fn test_closure_handed_to_host_keeps_its_environment() {
    let adder = make_interpreter(
        "(define (make-adder n) (lambda (x) (+ x n))) (make-adder 100)",
        None,
    )
    .unwrap();
    let func = adder.as_function().unwrap();
    assert_eq!(func.call(&[HostValue::Int(1)]).unwrap(), HostValue::Int(101));
    assert_eq!(func.call(&[HostValue::Int(-100)]).unwrap(), HostValue::Int(0));
}

#[test]
fn test_host_and_psil_call_each_other() {
    let mut interp = Interpreter::new();
    interp.define_fn("twice", |args| {
        let f = args[0].as_function().ok_or_else(|| Error::host("twice", "expected a function"))?;
        let once = f.call(&args[1..])?;
        f.call(&[once])
    });
    interp.eval_str("(define (inc x) (+ x 1))").unwrap();
    assert_eq!(interp.eval_str("(twice inc 5)").unwrap(), Value::Int(7));
    assert_eq!(interp.eval_str("(twice car '((1 2)))").unwrap(), Value::Int(1));
}

#[test]
fn test_interpreter_call() {
    let mut interp = Interpreter::new();
    interp.eval_str("(define (greet name) (concat \"hi \" name))").unwrap();
    assert_eq!(
        interp.call("greet", &[HostValue::from("bob")]).unwrap(),
        HostValue::from("hi bob")
    );
    assert_eq!(
        interp.call("missing", &[]).unwrap_err().kind(),
        ErrorKind::UnboundSymbol
    );
}

#[test]
fn test_opaque_objects_pass_through() {
    #[derive(Debug, PartialEq)]
    struct Handle(u32);

    let ns = Namespace::new();
    ns.set("h", HostValue::opaque(Handle(7)));
    ns.define_fn("handle-id", |args| {
        let handle = args[0]
            .downcast_ref::<Handle>()
            .ok_or_else(|| Error::host("handle-id", "expected a handle"))?;
        Ok(HostValue::Int(handle.0 as i64))
    });

    assert_eq!(psil("(handle-id h)", Some(&ns)).unwrap(), HostValue::Int(7));
    assert_eq!(
        psil("(list (procedure? h) (eq? h h))", Some(&ns)).unwrap(),
        HostValue::List(vec![HostValue::Bool(false), HostValue::Bool(true)])
    );
    let back = psil("h", Some(&ns)).unwrap();
    assert_eq!(back.downcast_ref::<Handle>(), Some(&Handle(7)));
}

#[test]
fn test_values_without_host_shape_round_trip() {
    let ns = Namespace::new();
    psil("(define sym 'hello) (define dotted '(1 . 2))", Some(&ns)).unwrap();
    let sym = ns.get("sym").unwrap();
    assert!(matches!(sym, HostValue::Psil(_)));
    assert_eq!(from_host(&sym), Value::symbol("hello"));
    assert_eq!(psil("(cdr dotted)", Some(&ns)).unwrap(), HostValue::Int(2));
}

#[test]
fn test_marshal_round_trip() {
    for source in ["42", "-1.25", "\"text\"", "#f", "(1 (2 3) \"x\")"] {
        let value = psil::read_one(source).unwrap();
        assert_eq!(from_host(&to_host(&value)), value, "source: {}", source);
    }
    assert_eq!(from_host(&HostValue::List(vec![])), Value::Nil);
}

#[test]
fn test_host_function_value_is_callable_directly() {
    let negate = HostFunction::new("negate", |args| {
        Ok(HostValue::Int(-args[0].as_i64().unwrap_or(0)))
    });
    let mut interp = Interpreter::new();
    interp.define("negate", negate);
    assert_eq!(interp.eval_str("(negate 4)").unwrap(), Value::Int(-4));
    assert_eq!(
        interp.eval_str("negate").unwrap().to_string(),
        "<host-function negate>"
    );
}

#[test]
fn test_json_interop() {
    let doc = json!({"name": "psil", "tags": ["lisp", 1, 2.5, null, true]});
    let ns = Namespace::new();
    ns.set("doc", HostValue::from_json(&doc));

    let tags = psil("(cadr (car (cdr doc)))", Some(&ns)).unwrap();
    assert_eq!(
        tags.to_json().unwrap(),
        json!(["lisp", 1, 2.5, null, true])
    );

    let func = make_interpreter("car", None).unwrap();
    assert!(func.to_json().is_err());
}

#[test]
fn test_builtins_called_from_host_see_their_interpreter() {
    let form = HostValue::List(vec![
        HostValue::Psil(Value::symbol("+")),
        HostValue::Int(1),
        HostValue::Int(2),
    ]);
    let eval = make_interpreter("eval", None).unwrap();
    assert_eq!(
        eval.as_function().unwrap().call(&[form.clone()]).unwrap(),
        HostValue::Int(3)
    );

    let ns = Namespace::new();
    let expand = psil(
        "(define scale 10) (defmacro inc (x) `(+ ,x 1)) macroexpand",
        Some(&ns),
    )
    .unwrap();
    let call = HostValue::List(vec![HostValue::Psil(Value::symbol("inc")), HostValue::Int(4)]);
    assert_eq!(
        from_host(&expand.as_function().unwrap().call(&[call]).unwrap()).to_string(),
        "(+ 4 1)"
    );

    let eval = psil("eval", Some(&ns)).unwrap();
    let scaled = HostValue::List(vec![
        HostValue::Psil(Value::symbol("*")),
        HostValue::Psil(Value::symbol("scale")),
        HostValue::Int(2),
    ]);
    assert_eq!(
        eval.as_function().unwrap().call(&[scaled]).unwrap(),
        HostValue::Int(20)
    );
}

#[test]
fn test_detached_builtin_runs_with_standard_globals() {
    let interp = Interpreter::new();
    let eval = to_host(&interp.lookup("eval").unwrap());
    let form = psil::read_one("(and 1 (car '(2 3)))").unwrap();
    assert_eq!(
        eval.as_function().unwrap().call(&[to_host(&form)]).unwrap(),
        HostValue::Int(2)
    );
}

#[test]
fn test_global_values_keep_identity_across_lookups() {
    let ns = Namespace::new();
    let result = psil(
        "(define xs (list 1 2 3)) (list (eq? xs xs) (car xs))",
        Some(&ns),
    )
    .unwrap();
    assert_eq!(
        result,
        HostValue::List(vec![HostValue::Bool(true), HostValue::Int(1)])
    );

    ns.set("xs", vec![9i64]);
    assert_eq!(psil("(car xs)", Some(&ns)).unwrap(), HostValue::Int(9));
}

#[test]
fn test_clear_breaks_reference_cycles() {
    let ns = Namespace::new();
    psil("(define (loop-forever) (loop-forever))", Some(&ns)).unwrap();
    assert_eq!(ns.len(), 1);
    ns.clear();
    assert!(ns.is_empty());
}
