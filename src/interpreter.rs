//! Session facade for embedders.
//!
//! An [`Interpreter`] owns one global table, pre-populated with the
//! primitive library. Sessions share nothing, so several can run side by
//! side.

use std::sync::Arc;

use crate::Error;
use crate::ast::Value;
use crate::builtinops::{
    FileStore, OutputSink, StdoutSink, install_file_primitives, install_primitives,
};
use crate::environment::{Environment, Globals};
use crate::evaluator::{self, intooperation::IntoOperation};
use crate::parser::parse_all_text;

/// Outcome of one top-level expression in a batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    /// Canonical text of the parsed expression
    pub source: String,
    pub result: Result<Value, Error>,
}

pub struct Interpreter {
    globals: Globals,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// A session whose `log` output goes to standard output
    pub fn new() -> Self {
        Self::with_output(Arc::new(StdoutSink))
    }

    /// A session whose `log` output goes to `sink`
    pub fn with_output(sink: Arc<dyn OutputSink>) -> Self {
        let mut globals = Globals::new();
        install_primitives(&mut globals, sink);
        Interpreter { globals }
    }

    /// Expose `store` to programs through `slurp` and `spit`
    #[must_use]
    pub fn with_file_store(mut self, store: Arc<dyn FileStore>) -> Self {
        install_file_primitives(&mut self.globals, store);
        self
    }

    /// Evaluate one expression at top level
    pub fn eval(&mut self, expr: &Value) -> Result<Value, Error> {
        evaluator::eval(expr, &Environment::empty(), &mut self.globals)
    }

    /// Parse and evaluate every expression in `text`, returning the last
    /// result. Stops at the first error; an empty text yields `null`.
    pub fn eval_str(&mut self, text: &str) -> Result<Value, Error> {
        let mut last = Value::Null;
        for expr in parse_all_text(text)? {
            last = self.eval(&expr)?;
        }
        Ok(last)
    }

    /// Evaluate a batch, one entry per top-level expression.
    ///
    /// A failing expression does not stop the batch; later expressions
    /// still run and see the definitions made before the failure. Only a
    /// parse error, which leaves no expressions to run, fails the call.
    pub fn eval_all(&mut self, text: &str) -> Result<Vec<BatchEntry>, Error> {
        let exprs = parse_all_text(text)?;
        tracing::debug!(count = exprs.len(), "evaluating batch");

        Ok(exprs
            .into_iter()
            .map(|expr| {
                let result = self.eval(&expr);
                if let Err(err) = &result {
                    tracing::debug!(%err, "expression failed");
                }
                BatchEntry {
                    source: expr.to_string(),
                    result,
                }
            })
            .collect())
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    /// A structurally shared copy of the global table, for [`restore`](Self::restore)
    pub fn snapshot(&self) -> Globals {
        self.globals.snapshot()
    }

    /// Replace the global table wholesale
    pub fn restore(&mut self, globals: Globals) {
        self.globals = globals;
    }

    /// See [`Globals::define_primitive`]
    pub fn define_primitive(
        &mut self,
        name: &str,
        arity: usize,
        func: fn(&[Value]) -> Result<Value, Error>,
    ) -> Value {
        self.globals.define_primitive(name, arity, func)
    }

    /// See [`Globals::register_primitive`]
    pub fn register_primitive<F, Args, R>(&mut self, name: &str, func: F) -> Value
    where
        F: IntoOperation<Args, R> + 'static,
    {
        self.globals.register_primitive(name, func)
    }
}
