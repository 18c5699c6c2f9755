//! This module defines the runtime value model of the interpreter. The same
//! [`Value`] tree doubles as the AST: a parenthesized form is a chain of
//! [`Pair`]s terminated by [`Value::Null`], exactly like a runtime list.
//! Ergonomic helper functions such as [`val`], [`sym`], and [`nil`] are
//! provided for convenient construction in tests, along with conversions from
//! common Rust types.

use std::sync::Arc;

use crate::environment::Environment;
use crate::{Error, ensure_sufficient_stack};
use crate::evaluator::intooperation::OperationFn;

/// Type alias for number values in interpreter
pub(crate) type NumberType = f64;

/// A head/tail cell. Chains of pairs ending in `Null` are proper lists.
#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    pub head: Value,
    pub tail: Value,
}

// Cells are released with an explicit worklist so that neither long tails
// nor deeply nested heads recurse once per cell.
impl Drop for Pair {
    fn drop(&mut self) {
        let mut pending: Vec<Value> = Vec::new();
        for value in [
            std::mem::replace(&mut self.head, Value::Null),
            std::mem::replace(&mut self.tail, Value::Null),
        ] {
            if matches!(value, Value::Pair(_)) {
                pending.push(value);
            }
        }

        while let Some(value) = pending.pop() {
            if let Value::Pair(pair) = value
                && let Some(mut cell) = Arc::into_inner(pair)
            {
                pending.push(std::mem::replace(&mut cell.head, Value::Null));
                pending.push(std::mem::replace(&mut cell.tail, Value::Null));
            }
        }
    }
}

/// A built-in function with a fixed arity
pub struct Primitive {
    pub id: String,
    pub arity: usize,
    // Trait object so typed Rust functions can be adapted to the canonical
    // evaluator signature (see `evaluator::intooperation`).
    pub(crate) func: Arc<OperationFn>,
}

impl Primitive {
    pub(crate) fn call(&self, args: Vec<Value>) -> Result<Value, Error> {
        (self.func)(args)
    }
}

/// A user-defined function: parameters and body with the frame chain
/// captured where the `function` form was evaluated
#[derive(Clone)]
pub struct Closure {
    pub params: Vec<String>,
    pub body: Value,
    pub env: Environment,
}

/// Core value type of the interpreter
///
/// To build values in code, use the helper functions:
/// - `val(42)` for values, `sym("name")` for symbols, `nil()` for the empty list
/// - `val([1, 2, 3])` for homogeneous lists
/// - `val(vec![sym("op"), val(42)])` for mixed lists
#[derive(Clone)]
pub enum Value {
    /// IEEE double precision numbers
    Number(NumberType),
    /// String literals (no escape processing)
    String(String),
    /// Boolean values
    Bool(bool),
    /// The empty list and absent value
    Null,
    /// Identifiers, compared by text
    Symbol(String),
    /// Cons cells, used for lists and for every parenthesized form
    Pair(Arc<Pair>),
    /// Built-in functions
    Primitive(Arc<Primitive>),
    /// User-defined functions
    Closure(Arc<Closure>),
    /// "No value" sentinel. Never produced by evaluating Ripple code; it
    /// never equals anything and cannot be formatted.
    Unspecified,
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        ensure_sufficient_stack(|| match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String(\"{s}\")"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Null => write!(f, "Null"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::Pair(pair) => write!(f, "Pair({:?}, {:?})", pair.head, pair.tail),
            Value::Primitive(p) => write!(f, "Primitive({}/{})", p.id, p.arity),
            Value::Closure(c) => {
                write!(f, "Closure(params={:?}, body={:?})", c.params, c.body)
            }
            Value::Unspecified => write!(f, "Unspecified"),
        })
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NumberType> for Value {
    fn from(n: NumberType) -> Self {
        Value::Number(n)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(NumberType::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v.into_iter().map(Into::into))
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::list(arr.into_iter().map(Into::into))
    }
}

impl From<Closure> for Value {
    fn from(closure: Closure) -> Self {
        Value::Closure(Arc::new(closure))
    }
}

// Fallible conversions from `Value` back into primitive Rust types; these
// drive argument extraction for typed primitives.

impl TryFrom<Value> for NumberType {
    type Error = Error;

    fn try_from(value: Value) -> Result<NumberType, Error> {
        match value {
            Value::Number(n) => Ok(n),
            other => Err(Error::TypeError(format!(
                "expected number, got {}",
                other.type_name()
            ))),
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = Error;

    fn try_from(value: Value) -> Result<bool, Error> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(Error::TypeError(format!(
                "expected boolean, got {}",
                other.type_name()
            ))),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = Error;

    fn try_from(value: Value) -> Result<String, Error> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(Error::TypeError(format!(
                "expected string, got {}",
                other.type_name()
            ))),
        }
    }
}

/// Helper function for creating symbols
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper function for creating Values from anything convertible
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for the empty list
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn nil() -> Value {
    Value::Null
}

impl Value {
    pub fn cons(head: Value, tail: Value) -> Value {
        Value::Pair(Arc::new(Pair { head, tail }))
    }

    /// Build a `Null`-terminated chain, reducing right to left
    pub fn list<I>(items: I) -> Value
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(Value::Null, |tail, head| Value::cons(head, tail))
    }

    /// Iterate over the heads of a pair chain. Stops at the first non-pair
    /// tail; use [`ListIter::tail`] to inspect what the chain ended with.
    pub fn iter(&self) -> ListIter<'_> {
        ListIter { current: self }
    }

    /// Collect a proper list into a vector
    pub fn to_vec(&self) -> Result<Vec<Value>, Error> {
        let mut iter = self.iter();
        let items: Vec<Value> = iter.by_ref().cloned().collect();
        match iter.tail() {
            Value::Null => Ok(items),
            _ => Err(Error::TypeError(format!("expected a list, got {self}"))),
        }
    }

    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Bool(false))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Value::Primitive(_) | Value::Closure(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Bool(_) => "boolean",
            Value::Null => "null",
            Value::Symbol(_) => "symbol",
            Value::Pair(_) => "pair",
            Value::Primitive(_) | Value::Closure(_) => "function",
            Value::Unspecified => "undefined",
        }
    }

    /// Equality as seen by the `=` primitive: atoms and symbols compare by
    /// value, pairs and functions by identity
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Pair(a), Value::Pair(b)) => Arc::ptr_eq(a, b),
            (Value::Primitive(a), Value::Primitive(b)) => Arc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Iterator over the elements of a pair chain
pub struct ListIter<'a> {
    current: &'a Value,
}

impl<'a> ListIter<'a> {
    /// What remains of the chain: `Null` for a fully consumed proper list
    pub fn tail(&self) -> &'a Value {
        self.current
    }
}

impl<'a> Iterator for ListIter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        match self.current {
            Value::Pair(pair) => {
                self.current = &pair.tail;
                Some(&pair.head)
            }
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        ensure_sufficient_stack(|| match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Pair(a), Value::Pair(b)) => chains_equal(a, b),
            // Compare primitives by id string, not function pointer
            (Value::Primitive(a), Value::Primitive(b)) => a.id == b.id,
            (Value::Closure(a), Value::Closure(b)) => {
                a.params == b.params && a.body == b.body && a.env == b.env
            }
            (Value::Unspecified, _) | (_, Value::Unspecified) => false,
            _ => false,
        })
    }
}

/// Compare two chains cell by cell, walking tails in a loop
fn chains_equal(mut a: &Arc<Pair>, mut b: &Arc<Pair>) -> bool {
    loop {
        if Arc::ptr_eq(a, b) {
            return true;
        }
        if a.head != b.head {
            return false;
        }
        match (&a.tail, &b.tail) {
            (Value::Pair(next_a), Value::Pair(next_b)) => {
                a = next_a;
                b = next_b;
            }
            (tail_a, tail_b) => return tail_a == tail_b,
        }
    }
}
