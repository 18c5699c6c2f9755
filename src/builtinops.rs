//! Built-in primitive registry.
//!
//! Every primitive has a fixed arity, taken from the Rust signature of its
//! implementation through the typed adapter layer in
//! `evaluator::intooperation`. The evaluator checks the operand count
//! before a primitive runs, so implementations only deal with types.
//!
//! ```text
//! (+ 1 2)            ; 3
//! (cons 1 null)      ; (1)
//! (number? "1")      ; false
//! (concat "n=" 5)    ; "n=5"
//! ```
//!
//! ## Typing
//!
//! - Arithmetic and comparisons accept numbers only and follow IEEE
//!   semantics: `(/ 1 0)` is `Infinity`, never an error
//! - `=` compares atoms and symbols by value, pairs and functions by
//!   identity
//! - `not` uses the language's truthiness (only `null` and `false` are falsy)
//! - `head` and `tail` reject anything but a pair
//!
//! ## Side effects
//!
//! `log` writes to an injected [`OutputSink`]. The `slurp` and `spit`
//! primitives are only present when a [`FileStore`] is installed with
//! [`install_file_primitives`].

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use crate::Error;
use crate::ast::{NumberType, Value};
use crate::environment::Globals;
use crate::evaluator::intooperation::{IntoOperation, OperationFn};
use crate::formatter::format;

/// Destination for `log` output
pub trait OutputSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Writes each line to standard output
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write_line(&self, line: &str) {
        println!("{line}");
    }
}

/// Collects lines in memory, for embedders that render output themselves
#[derive(Debug, Default)]
pub struct BufferSink {
    lines: Mutex<Vec<String>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines written so far
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return everything written so far
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl OutputSink for BufferSink {
    fn write_line(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_owned());
    }
}

/// Named text files visible to `slurp` and `spit`
pub trait FileStore: Send + Sync {
    fn read(&self, name: &str) -> Option<String>;
    fn write(&self, name: &str, contents: String);
    fn names(&self) -> Vec<String>;
}

/// In-memory [`FileStore`]
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    files: Mutex<BTreeMap<String, String>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileStore for MemoryFileStore {
    fn read(&self, name: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn write(&self, name: &str, contents: String) {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_owned(), contents);
    }

    fn names(&self) -> Vec<String> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

/// Definition of a built-in primitive
#[derive(Clone)]
pub struct BuiltinOp {
    /// The name the primitive is bound to in the global table
    pub id: &'static str,
    /// Exact number of operands
    pub arity: usize,
    func: Arc<OperationFn>,
}

impl std::fmt::Debug for BuiltinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BuiltinOp({}/{})", self.id, self.arity)
    }
}

//
// Builtin Function Implementations
//

// Numeric comparisons
macro_rules! numeric_comparison {
    ($name:ident, $op:tt) => {
        fn $name(a: NumberType, b: NumberType) -> bool {
            a $op b
        }
    };
}

numeric_comparison!(builtin_lt, <);
numeric_comparison!(builtin_gt, >);
numeric_comparison!(builtin_le, <=);
numeric_comparison!(builtin_ge, >=);

// Binary arithmetic
macro_rules! numeric_binary {
    ($name:ident, $op:tt) => {
        fn $name(a: NumberType, b: NumberType) -> NumberType {
            a $op b
        }
    };
}

numeric_binary!(builtin_add, +);
numeric_binary!(builtin_sub, -);
numeric_binary!(builtin_mul, *);
numeric_binary!(builtin_div, /);
// Remainder takes the sign of the dividend
numeric_binary!(builtin_mod, %);

fn builtin_negate(n: NumberType) -> NumberType {
    -n
}

fn builtin_sqrt(n: NumberType) -> NumberType {
    n.sqrt()
}

fn builtin_eq(a: Value, b: Value) -> bool {
    a.identical(&b)
}

fn builtin_not(value: Value) -> bool {
    !value.is_truthy()
}

fn builtin_cons(head: Value, tail: Value) -> Value {
    Value::cons(head, tail)
}

fn builtin_head(value: Value) -> Result<Value, Error> {
    match value {
        Value::Pair(pair) => Ok(pair.head.clone()),
        other => Err(Error::TypeError(format!(
            "head requires a pair, got {}",
            other.type_name()
        ))),
    }
}

fn builtin_tail(value: Value) -> Result<Value, Error> {
    match value {
        Value::Pair(pair) => Ok(pair.tail.clone()),
        other => Err(Error::TypeError(format!(
            "tail requires a pair, got {}",
            other.type_name()
        ))),
    }
}

// One predicate per variant
macro_rules! type_predicate {
    ($name:ident, $pattern:pat) => {
        fn $name(value: Value) -> bool {
            matches!(value, $pattern)
        }
    };
}

type_predicate!(builtin_is_number, Value::Number(_));
type_predicate!(builtin_is_string, Value::String(_));
type_predicate!(builtin_is_boolean, Value::Bool(_));
type_predicate!(builtin_is_symbol, Value::Symbol(_));
type_predicate!(builtin_is_pair, Value::Pair(_));
type_predicate!(builtin_is_function, Value::Primitive(_) | Value::Closure(_));
type_predicate!(builtin_is_null, Value::Null);

fn builtin_symbol(name: String) -> Value {
    Value::Symbol(name)
}

fn builtin_arity(value: Value) -> Result<NumberType, Error> {
    let count = match &value {
        Value::Primitive(p) => p.arity,
        Value::Closure(c) => c.params.len(),
        other => {
            return Err(Error::TypeError(format!(
                "arity requires a function, got {}",
                other.type_name()
            )));
        }
    };
    u32::try_from(count)
        .map(NumberType::from)
        .map_err(|_| Error::EvalError(format!("arity {count} out of range")))
}

/// Strings contribute their raw text, everything else its formatted form
fn display_text(value: &Value) -> Result<String, Error> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => format(other),
    }
}

fn builtin_concat(a: Value, b: Value) -> Result<String, Error> {
    Ok(display_text(&a)? + &display_text(&b)?)
}

/// Global registry of all built-in primitives except those needing a
/// session resource (see [`install_primitives`]).
///
/// Built once via a `LazyLock`; the operation closures are shared by every
/// session through `Arc`.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    fn builtin<F, Args, R>(id: &'static str, f: F) -> BuiltinOp
    where
        F: IntoOperation<Args, R>,
    {
        BuiltinOp {
            id,
            arity: <F as IntoOperation<Args, R>>::ARITY,
            func: f.into_operation(),
        }
    }

    type Num = NumberType;

    vec![
        // Arithmetic
        builtin::<_, (Num, Num), Num>("+", builtin_add),
        builtin::<_, (Num, Num), Num>("-", builtin_sub),
        builtin::<_, (Num, Num), Num>("*", builtin_mul),
        builtin::<_, (Num, Num), Num>("/", builtin_div),
        builtin::<_, (Num, Num), Num>("mod", builtin_mod),
        builtin::<_, (Num,), Num>("negate", builtin_negate),
        builtin::<_, (Num,), Num>("sqrt", builtin_sqrt),
        // Comparison
        builtin::<_, (Num, Num), bool>("<", builtin_lt),
        builtin::<_, (Num, Num), bool>(">", builtin_gt),
        builtin::<_, (Num, Num), bool>("<=", builtin_le),
        builtin::<_, (Num, Num), bool>(">=", builtin_ge),
        builtin::<_, (Value, Value), bool>("=", builtin_eq),
        // Logic
        builtin::<_, (Value,), bool>("not", builtin_not),
        // Pairs
        builtin::<_, (Value, Value), Value>("cons", builtin_cons),
        builtin::<_, (Value,), Value>("head", builtin_head),
        builtin::<_, (Value,), Value>("tail", builtin_tail),
        // Type predicates
        builtin::<_, (Value,), bool>("number?", builtin_is_number),
        builtin::<_, (Value,), bool>("string?", builtin_is_string),
        builtin::<_, (Value,), bool>("boolean?", builtin_is_boolean),
        builtin::<_, (Value,), bool>("symbol?", builtin_is_symbol),
        builtin::<_, (Value,), bool>("cons?", builtin_is_pair),
        builtin::<_, (Value,), bool>("pair?", builtin_is_pair),
        builtin::<_, (Value,), bool>("function?", builtin_is_function),
        builtin::<_, (Value,), bool>("null?", builtin_is_null),
        // Symbols, functions and strings
        builtin::<_, (String,), Value>("symbol", builtin_symbol),
        builtin::<_, (Value,), Num>("arity", builtin_arity),
        builtin::<_, (Value, Value), String>("concat", builtin_concat),
    ]
});

/// All registry primitives, in registration order
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    &BUILTIN_OPS
}

/// Look a registry primitive up by name
pub fn find_builtin_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_OPS.iter().find(|op| op.id == id)
}

/// Install every primitive into `globals`, with `log` writing to `sink`
pub fn install_primitives(globals: &mut Globals, sink: Arc<dyn OutputSink>) {
    for op in get_builtin_ops() {
        globals.insert_primitive(op.id, op.arity, Arc::clone(&op.func));
    }

    let log: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| {
        let text = match args.as_slice() {
            [value] => display_text(value)?,
            _ => return Err(Error::arity_error_with_expr(1, args.len(), "log")),
        };
        sink.write_line(&text);
        Ok(Value::Null)
    });
    globals.insert_primitive("log", 1, log);
    tracing::debug!(count = globals.len(), "installed primitives");
}

/// Install `slurp` and `spit` backed by `store`.
///
/// `(slurp name)` returns the file's contents, or `null` for a missing file.
/// `(spit name contents)` stores the text and returns it.
pub fn install_file_primitives(globals: &mut Globals, store: Arc<dyn FileStore>) {
    let reader = Arc::clone(&store);
    let slurp: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| match args.as_slice() {
        [Value::String(name)] => Ok(reader.read(name).map_or(Value::Null, Value::String)),
        [other] => Err(Error::TypeError(format!(
            "slurp requires a string file name, got {}",
            other.type_name()
        ))),
        _ => Err(Error::arity_error_with_expr(1, args.len(), "slurp")),
    });

    let spit: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| match args.as_slice() {
        [Value::String(name), contents] => {
            let text = display_text(contents)?;
            tracing::debug!(file = %name, bytes = text.len(), "spit");
            store.write(name, text.clone());
            Ok(Value::String(text))
        }
        [other, _] => Err(Error::TypeError(format!(
            "spit requires a string file name, got {}",
            other.type_name()
        ))),
        _ => Err(Error::arity_error_with_expr(2, args.len(), "spit")),
    });

    globals.insert_primitive("slurp", 1, slurp);
    globals.insert_primitive("spit", 2, spit);
}
