//! Variable bindings: a persistent chain of immutable frames for lexical
//! scopes, plus the mutable per-session global table.
//!
//! Frames use `im::HashMap` and are shared by `Arc`. Extending an
//! [`Environment`] allocates one new frame that points at the existing chain,
//! so every closure holding the old chain keeps seeing exactly what it
//! captured.

use std::sync::Arc;

use im::HashMap;

use crate::Error;
use crate::ast::{Primitive, Value};
use crate::evaluator::intooperation::{IntoOperation, OperationFn};

/// One immutable name-to-value binding set, created per `let` or call
#[derive(Debug)]
struct Frame {
    bindings: HashMap<String, Value>,
    parent: Option<Arc<Frame>>,
}

/// Lexical environment: frames searched innermost-first
#[derive(Debug, Clone, Default)]
pub struct Environment {
    head: Option<Arc<Frame>>,
}

impl PartialEq for Environment {
    /// Two environments are equal when they are the same chain
    fn eq(&self, other: &Self) -> bool {
        match (&self.head, &other.head) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Environment {
    pub fn empty() -> Self {
        Environment { head: None }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Prepend one frame zipping `names` with `values` positionally.
    ///
    /// Callers validate that the lengths match. With no names the chain is
    /// returned unchanged; frames of zero bindings are never allocated.
    pub fn extend(&self, names: &[String], values: Vec<Value>) -> Environment {
        if names.is_empty() {
            return self.clone();
        }

        let bindings: HashMap<String, Value> = names.iter().cloned().zip(values).collect();

        Environment {
            head: Some(Arc::new(Frame {
                bindings,
                parent: self.head.clone(),
            })),
        }
    }

    /// Look `name` up in the frame chain, then in the global table
    pub fn lookup(&self, name: &str, globals: &Globals) -> Result<Value, Error> {
        self.get_local(name)
            .or_else(|| globals.get(name))
            .cloned()
            .ok_or_else(|| Error::UnboundSymbol(name.to_owned()))
    }

    fn get_local(&self, name: &str) -> Option<&Value> {
        let mut frame = self.head.as_deref();
        while let Some(current) = frame {
            if let Some(value) = current.bindings.get(name) {
                return Some(value);
            }
            frame = current.parent.as_deref();
        }
        None
    }

    /// The visible lexical bindings, innermost first. Shadowed names are
    /// skipped.
    pub fn bindings(&self) -> Vec<(String, Value)> {
        let mut seen = std::collections::HashSet::new();
        let mut result = Vec::new();
        let mut frame = self.head.as_deref();
        while let Some(current) = frame {
            let mut names: Vec<&String> = current.bindings.keys().collect();
            names.sort();
            for name in names {
                if seen.insert(name.clone())
                    && let Some(value) = current.bindings.get(name)
                {
                    result.push((name.clone(), value.clone()));
                }
            }
            frame = current.parent.as_deref();
        }
        result
    }
}

/// The session's global table, mutated by `define` and primitive
/// registration.
///
/// Cloning is O(1) and shares structure, which is how snapshots for undo
/// are taken. Each interpreter session owns its own table.
#[derive(Clone, Default)]
pub struct Globals {
    bindings: HashMap<String, Value>,
}

impl Globals {
    pub fn new() -> Self {
        Globals {
            bindings: HashMap::new(),
        }
    }

    /// Unconditionally bind `name`, returning the stored value
    pub fn define(&mut self, name: impl Into<String>, value: Value) -> Value {
        self.bindings.insert(name.into(), value.clone());
        value
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Register a primitive working directly on its evaluated operands.
    ///
    /// The evaluator enforces `arity` before `func` is called.
    ///
    /// # Example
    /// ```
    /// use ripple::{Globals, Value, Error};
    ///
    /// fn first_of(args: &[Value]) -> Result<Value, Error> {
    ///     Ok(args[0].clone())
    /// }
    ///
    /// let mut globals = Globals::new();
    /// globals.define_primitive("first-of", 2, first_of);
    /// assert!(globals.contains("first-of"));
    /// ```
    pub fn define_primitive(
        &mut self,
        name: &str,
        arity: usize,
        func: fn(&[Value]) -> Result<Value, Error>,
    ) -> Value {
        let wrapped: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| func(&args));
        self.insert_primitive(name, arity, wrapped)
    }

    /// Register a strongly-typed Rust function or closure as a primitive.
    ///
    /// The arity is taken from the function signature and operands are
    /// converted automatically:
    ///
    /// ```
    /// use ripple::Globals;
    ///
    /// fn hypot(a: f64, b: f64) -> f64 {
    ///     a.hypot(b)
    /// }
    ///
    /// let mut globals = Globals::new();
    /// globals.register_primitive::<_, (f64, f64), f64>("hypot", hypot);
    /// ```
    ///
    /// Supported parameter types are `f64`, `bool`, `String`, `&str` and
    /// `Value`; results may be anything `Into<Value>` or a
    /// `Result<R, Error>`. Conversion failures surface as `TypeError`.
    pub fn register_primitive<F, Args, R>(&mut self, name: &str, func: F) -> Value
    where
        F: IntoOperation<Args, R> + 'static,
    {
        let arity = <F as IntoOperation<Args, R>>::ARITY;
        self.insert_primitive(name, arity, func.into_operation())
    }

    pub(crate) fn insert_primitive(
        &mut self,
        name: &str,
        arity: usize,
        func: Arc<OperationFn>,
    ) -> Value {
        tracing::trace!(name, arity, "registering primitive");
        self.define(
            name,
            Value::Primitive(Arc::new(Primitive {
                id: name.to_owned(),
                arity,
                func,
            })),
        )
    }

    /// User-defined bindings (everything except primitives), sorted by name
    pub fn user_defined(&self) -> Vec<(String, Value)> {
        let mut result: Vec<(String, Value)> = self
            .bindings
            .iter()
            .filter(|(_, value)| !matches!(value, Value::Primitive(_)))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    /// A structurally shared copy of the whole table
    pub fn snapshot(&self) -> Globals {
        self.clone()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{sym, val};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_lookup_walks_frames_then_globals() {
        let mut globals = Globals::new();
        globals.define("g", val(1));

        let outer = Environment::empty().extend(&names(&["x", "y"]), vec![val(10), val(20)]);
        let inner = outer.extend(&names(&["x"]), vec![val(99)]);

        assert_eq!(inner.lookup("x", &globals).unwrap(), val(99));
        assert_eq!(inner.lookup("y", &globals).unwrap(), val(20));
        assert_eq!(inner.lookup("g", &globals).unwrap(), val(1));
        assert_eq!(outer.lookup("x", &globals).unwrap(), val(10));
        assert_eq!(
            inner.lookup("missing", &globals),
            Err(Error::UnboundSymbol("missing".to_owned()))
        );
    }

    #[test]
    fn test_extend_with_no_names_reuses_chain() {
        let env = Environment::empty().extend(&names(&["a"]), vec![val(1)]);
        let same = env.extend(&[], vec![]);
        assert_eq!(env, same);
        assert!(Environment::empty().extend(&[], vec![]).is_empty());
    }

    #[test]
    fn test_extension_leaves_existing_chains_untouched() {
        let globals = Globals::new();
        let base = Environment::empty().extend(&names(&["a"]), vec![val(1)]);
        let captured = base.clone();
        let _sibling = base.extend(&names(&["b"]), vec![val(2)]);

        assert!(captured.lookup("b", &globals).is_err());
        assert_eq!(captured, base);
    }

    #[test]
    fn test_locals_shadow_globals() {
        let mut globals = Globals::new();
        globals.define("x", val("global"));
        let env = Environment::empty().extend(&names(&["x"]), vec![val("local")]);
        assert_eq!(env.lookup("x", &globals).unwrap(), val("local"));
    }

    #[test]
    fn test_bindings_innermost_first_without_shadowed() {
        let env = Environment::empty()
            .extend(&names(&["a", "b"]), vec![val(1), val(2)])
            .extend(&names(&["a"]), vec![val(3)]);
        assert_eq!(
            env.bindings(),
            vec![("a".to_owned(), val(3)), ("b".to_owned(), val(2))]
        );
    }

    #[test]
    fn test_define_overwrites_and_returns_value() {
        let mut globals = Globals::new();
        assert_eq!(globals.define("y", val(10)), val(10));
        assert_eq!(globals.define("y", sym("z")), sym("z"));
        assert_eq!(globals.get("y"), Some(&sym("z")));
        assert_eq!(globals.len(), 1);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut globals = Globals::new();
        globals.define("a", val(1));
        let snapshot = globals.snapshot();
        globals.define("a", val(2));
        globals.define("b", val(3));

        assert_eq!(snapshot.get("a"), Some(&val(1)));
        assert!(!snapshot.contains("b"));
        assert_eq!(globals.get("a"), Some(&val(2)));
    }

    #[test]
    fn test_user_defined_excludes_primitives() {
        fn ignore(_args: &[Value]) -> Result<Value, Error> {
            Ok(Value::Null)
        }

        let mut globals = Globals::new();
        globals.define_primitive("prim", 0, ignore);
        globals.define("zeta", val(1));
        globals.define("alpha", val(2));

        let user: Vec<String> = globals.user_defined().into_iter().map(|(n, _)| n).collect();
        assert_eq!(user, vec!["alpha".to_owned(), "zeta".to_owned()]);
        assert_eq!(globals.len(), 3);
    }
}
