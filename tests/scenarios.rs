#![expect(clippy::unwrap_used)] // test code OK

use std::sync::Arc;

use pretty_assertions::assert_eq;
use ripple::builtinops::BufferSink;
use ripple::{
    Environment, Error, Globals, Interpreter, ParseErrorKind, Value, eval, format, parse_all_text,
    parse_one, parse_one_text,
};

fn session() -> Interpreter {
    Interpreter::with_output(Arc::new(BufferSink::new()))
}

/// Evaluate `source` in a fresh session and format the last result
fn run(source: &str) -> Result<String, Error> {
    let value = session().eval_str(source)?;
    format(&value)
}

#[test]
fn test_end_to_end_scenarios() {
    // (source, expected formatted result)
    let cases = vec![
        ("(+ 1 2)", "3"),
        ("(if false 1 2)", "2"),
        ("(let x 5 (+ x x))", "10"),
        ("(define y 10) y", "10"),
        ("(cons 1 (cons 2 null))", "(1 2)"),
        ("((function (x) x) 5)", "5"),
        ("(define sq (function (x) (* x x))) (sq 12)", "144"),
        ("(head (tail (cons 1 (cons 2 null))))", "2"),
        ("(concat \"a\" (concat 1 true))", "\"a1true\""),
        ("(function (a b) (+ a b))", "(function (a b) (+ a b))"),
        ("+", "+"),
        ("(/ 1 0)", "Infinity"),
        ("(- 0 0)", "0"),
    ];

    for (source, expected) in cases {
        assert_eq!(run(source).unwrap(), expected, "source: {source}");
    }
}

#[test]
fn test_parse_all_then_eval() {
    let exprs = parse_all_text("(+ 1 2)").unwrap();
    assert_eq!(exprs.len(), 1);

    let mut globals = Globals::new();
    ripple::builtinops::install_primitives(&mut globals, Arc::new(BufferSink::new()));
    assert_eq!(
        eval(&exprs[0], &Environment::empty(), &mut globals).unwrap(),
        Value::Number(3.0)
    );
}

#[test]
fn test_not_a_function() {
    assert!(matches!(
        session().eval_str("(1 2 3)"),
        Err(Error::NotAFunction(text)) if text == "1"
    ));
}

#[test]
fn test_round_trip_literals() {
    let literals = vec![
        Value::Number(42.0),
        Value::Number(-7.25),
        Value::Number(1e21),
        Value::String("hello".to_owned()),
        Value::String(String::new()),
        Value::Bool(true),
        Value::Bool(false),
        Value::Null,
        Value::Symbol("list->vector?".to_owned()),
        Value::list([
            Value::Number(1.0),
            Value::String("two".to_owned()),
            Value::list([Value::Symbol("three".to_owned())]),
        ]),
    ];

    for value in literals {
        let text = format(&value).unwrap();
        assert_eq!(parse_one_text(&text).unwrap(), value, "text: {text}");
    }
}

#[test]
fn test_literals_evaluate_to_themselves() {
    let mut globals = Globals::new();
    let chains = [
        Environment::empty(),
        Environment::empty().extend(&["x".to_owned()], vec![Value::Number(1.0)]),
    ];
    let literals = [
        Value::Number(3.5),
        Value::String("s".to_owned()),
        Value::Bool(false),
        Value::Null,
    ];

    for env in &chains {
        for literal in &literals {
            assert_eq!(&eval(literal, env, &mut globals).unwrap(), literal);
        }
    }
}

#[test]
fn test_short_circuit_skips_right_operand() {
    assert_eq!(run("(and false (undefined-symbol))").unwrap(), "false");
    assert_eq!(run("(or true (undefined-symbol))").unwrap(), "true");
    assert_eq!(run("(and 1 \"right\")").unwrap(), "\"right\"");
    assert_eq!(run("(or null 0)").unwrap(), "0");
    assert!(matches!(
        run("(and true (undefined-symbol))"),
        Err(Error::UnboundSymbol(_))
    ));
}

#[test]
fn test_lexical_scope() {
    let mut interp = session();
    interp.eval_str("(define get-z (function () z))").unwrap();
    assert!(matches!(
        interp.eval_str("(let z 1 (get-z))"),
        Err(Error::UnboundSymbol(name)) if name == "z"
    ));

    // Globals defined later are still visible
    interp.eval_str("(define z 7)").unwrap();
    assert_eq!(interp.eval_str("(let z 1 (get-z))").unwrap(), Value::Number(7.0));

    // let bindings do not leak
    assert_eq!(interp.eval_str("(let q 1 q)").unwrap(), Value::Number(1.0));
    assert!(interp.eval_str("q").is_err());
}

#[test]
fn test_arity_enforcement() {
    for source in ["(+ 1)", "(+ 1 2 3)", "((function (a b) a) 1)", "(if true 1)", "(let x 1)"] {
        assert!(
            matches!(run(source), Err(Error::ArityError { .. })),
            "source: {source}"
        );
    }
    assert_eq!(
        run("(cons 1)").unwrap_err().to_string(),
        "ArityError: cons takes 2 args, but given 1"
    );
}

#[test]
fn test_recursive_programs() {
    let mut interp = session();
    interp
        .eval_str(
            "(define fib (function (n) (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2))))))
             (define range (function (a b) (if (>= a b) null (cons a (range (+ a 1) b)))))
             (define map (function (f xs) (if (null? xs) null (cons (f (head xs)) (map f (tail xs))))))",
        )
        .unwrap();

    assert_eq!(interp.eval_str("(fib 15)").unwrap(), Value::Number(610.0));
    assert_eq!(
        format(&interp.eval_str("(map (function (x) (* x x)) (range 0 5))").unwrap()).unwrap(),
        "(0 1 4 9 16)"
    );
    // A few thousand frames deep stays within limits
    assert_eq!(
        format(&interp.eval_str("(head (tail (range 0 3000)))").unwrap()).unwrap(),
        "1"
    );
}

#[test]
fn test_batch_continues_after_errors() {
    let mut interp = session();
    let entries = interp
        .eval_all("(define a 1) (head null) (define b (+ a 1)) b")
        .unwrap();

    assert_eq!(entries.len(), 4);
    assert!(entries[1].result.is_err());
    assert_eq!(entries[3].result, Ok(Value::Number(2.0)));
}

#[test]
fn test_parse_errors() {
    let cases = vec![
        ("(+ 1 2", ParseErrorKind::Incomplete),
        ("\"unterminated", ParseErrorKind::Incomplete),
        (")", ParseErrorKind::InvalidSyntax),
        ("1 2", ParseErrorKind::TrailingContent),
    ];
    for (source, kind) in cases {
        match parse_one_text(source) {
            Err(Error::ParseError(e)) => assert_eq!(e.kind, kind, "source: {source}"),
            other => panic!("expected parse error for {source}, got {other:?}"),
        }
    }

    assert!(parse_all_text("(a) )").is_err());
    assert_eq!(parse_one("  foo bar", 0).unwrap(), (Value::Symbol("foo".to_owned()), 5));
}

#[test]
fn test_lenient_numeric_literals() {
    assert_eq!(parse_one_text("1abc").unwrap(), Value::Number(1.0));
    assert_eq!(parse_one_text("-2.5x").unwrap(), Value::Number(-2.5));
    assert_eq!(parse_one_text("-x").unwrap(), Value::Symbol("-x".to_owned()));
}
