//! Canonical source text for values.
//!
//! Output is designed to parse back to an equal value wherever the language
//! allows it. Strings are written without escaping, mirroring the parser,
//! so a string containing `"` does not round-trip.

use std::fmt;

use crate::ast::{Closure, NumberType, Value};
use crate::{Error, ensure_sufficient_stack};

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Heads nest without bound; tails are walked by `write_chain`
        ensure_sufficient_stack(|| match self {
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => f.write_str("null"),
            Value::Symbol(s) => f.write_str(s),
            Value::Pair(_) => write_chain(self, f),
            Value::Primitive(p) => f.write_str(&p.id),
            Value::Closure(c) => write_closure(c, &c.body, f),
            Value::Unspecified => f.write_str("undefined"),
        })
    }
}

fn write_chain(value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut iter = value.iter();
    f.write_str("(")?;
    for (i, item) in iter.by_ref().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{item}")?;
    }
    match iter.tail() {
        Value::Null => {}
        rest => write!(f, " . {rest}")?,
    }
    f.write_str(")")
}

fn write_closure(closure: &Closure, body: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "(function ({}) {body})", closure.params.join(" "))
}

/// Render a number the way the language expects to read it back
pub fn format_number(n: NumberType) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n == NumberType::INFINITY {
        "Infinity".to_owned()
    } else if n == NumberType::NEG_INFINITY {
        "-Infinity".to_owned()
    } else if n == 0.0 {
        // covers -0
        "0".to_owned()
    } else {
        format!("{n}")
    }
}

/// Format any value into canonical source text.
///
/// Fails when the value is, or a pair chain contains, the `Unspecified`
/// sentinel.
pub fn format(value: &Value) -> Result<String, Error> {
    if contains_unspecified(value) {
        return Err(Error::EvalError("Can't print undefined value".to_owned()));
    }
    Ok(value.to_string())
}

fn contains_unspecified(value: &Value) -> bool {
    ensure_sufficient_stack(|| match value {
        Value::Unspecified => true,
        Value::Pair(_) => {
            let mut iter = value.iter();
            iter.by_ref().any(contains_unspecified) || contains_unspecified(iter.tail())
        }
        _ => false,
    })
}

/// Format a closure with its captured lexical bindings re-expressed as
/// nested `let` forms around the body, innermost binding closest to the body.
pub fn format_closure_with_bindings(closure: &Closure) -> Result<String, Error> {
    let body = closure
        .env
        .bindings()
        .into_iter()
        .fold(closure.body.clone(), |body, (name, value)| {
            Value::list([Value::Symbol("let".to_owned()), Value::Symbol(name), value, body])
        });

    if contains_unspecified(&body) {
        return Err(Error::EvalError("Can't print undefined value".to_owned()));
    }

    struct WithBindings<'a>(&'a Closure, &'a Value);

    impl fmt::Display for WithBindings<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write_closure(self.0, self.1, f)
        }
    }

    Ok(WithBindings(closure, &body).to_string())
}
