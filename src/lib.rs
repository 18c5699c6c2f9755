//! Ripple - a small interpreter for a parenthesized expression language
//!
//! This crate parses Ripple source text into a tree of [`ast::Value`]s, evaluates
//! it against a persistent lexical environment plus a per-session global table,
//! and formats any value back into canonical source text.
//!
//! ## Language
//!
//! ```text
//! (+ 1 2)                          ; primitive application
//! (if false 1 2)                   ; only the taken branch is evaluated
//! (let x 5 (+ x x))                ; one local binding, visible in the body only
//! (define square (function (x) (* x x)))
//! (square 4)                       ; closures are lexically scoped
//! (cons 1 (cons 2 null))           ; pairs; formats back as (1 2)
//! ```
//!
//! Falsy values are exactly `null` and `false`; everything else, including `0`
//! and `""`, is truthy.
//!
//! ## Modules
//!
//! - `ast`: the runtime value model (the AST is built from the same values)
//! - `parser`: source text to values
//! - `formatter`: values back to canonical source text
//! - `environment`: persistent frame chains and the mutable global table
//! - `evaluator`: special forms and function application
//! - `builtinops`: the primitive library installed into every session
//! - `interpreter`: a session facade bundling the above for embedders

use std::fmt;

/// Maximum nesting of lists accepted by the parser
pub const MAX_PARSE_DEPTH: usize = 512;

/// Maximum evaluation depth (nested `eval` calls)
///
/// Each Ripple function call costs two or three nested evaluations, so this
/// allows recursion a few thousand calls deep. The native stack is grown on
/// demand, which makes this limit the effective ceiling.
pub const MAX_EVAL_DEPTH: usize = 20_000;

/// Run `f`, first growing the native stack if less than the red zone is left.
///
/// Called at every level of parser and evaluator recursion.
#[inline]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    /// Minimum stack space to keep available (100KB red zone).
    const RED_ZONE: usize = 100 * 1024;

    /// Stack space to allocate when growing (1MB).
    const STACK_PER_RECURSION: usize = 1024 * 1024;

    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErrorKind {
    /// Unexpected token (a stray closing paren)
    InvalidSyntax,
    /// Input ended before the expression was complete (unclosed list or string, empty input)
    Incomplete,
    /// List nesting exceeded [`MAX_PARSE_DEPTH`]
    TooDeeplyNested,
    /// Extra input found after a complete expression where exactly one was expected
    TrailingContent,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Byte offset into the input where the problem was detected
    pub position: usize,
    /// Context snippet from the input showing where the error occurred (max 60 chars)
    pub context: Option<String>,
}

impl ParseError {
    /// Create a ParseError with context extracted from input at a given offset
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        const MAX_CONTEXT: usize = 60;

        let context_start = floor_char_boundary(input, error_offset.saturating_sub(20));
        let context_str: String = input[context_start..].chars().take(MAX_CONTEXT).collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.len() < input.len() {
            display_context.push_str("[...]");
        }
        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        ParseError {
            kind,
            message: message.into(),
            position: error_offset,
            context: (!display_context.is_empty()).then_some(display_context),
        }
    }
}

fn floor_char_boundary(input: &str, mut index: usize) -> usize {
    while index > 0 && !input.is_char_boundary(index) {
        index -= 1;
    }
    index
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at position {}", self.message, self.position)?;
        if let Some(context) = &self.context {
            write!(f, "\nContext: {context}")?;
        }
        Ok(())
    }
}

/// Error types for the interpreter
///
/// Every error aborts the evaluation of the current top-level expression.
/// Callers that evaluate a batch should catch errors per expression (see
/// [`interpreter::Interpreter::eval_all`]).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("ParseError: {0}")]
    ParseError(ParseError),
    #[error("Unbound symbol: {0}")]
    UnboundSymbol(String),
    #[error("Type error: {0}")]
    TypeError(String),
    #[error("{}", arity_message(.expected, .got, .expression))]
    ArityError {
        expected: usize,
        got: usize,
        expression: Option<String>,
    },
    #[error("Not a function: {0}")]
    NotAFunction(String),
    #[error("EvaluationError: {0}")]
    EvalError(String),
}

fn arity_message(expected: &usize, got: &usize, expression: &Option<String>) -> String {
    match expression {
        Some(expr) => format!("ArityError: {expr} takes {expected} args, but given {got}"),
        None => format!("ArityError: function takes {expected} args, but given {got}"),
    }
}

impl Error {
    /// Create an ArityError without expression context
    pub fn arity_error(expected: usize, got: usize) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: None,
        }
    }

    /// Create an ArityError naming the form or function being checked
    pub fn arity_error_with_expr(expected: usize, got: usize, expression: impl Into<String>) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: Some(expression.into()),
        }
    }
}

impl From<ParseError> for Error {
    fn from(error: ParseError) -> Self {
        Error::ParseError(error)
    }
}

pub mod ast;
pub mod builtinops;
pub mod environment;
pub mod evaluator;
pub mod formatter;
pub mod interpreter;
pub mod parser;

pub use ast::Value;
pub use environment::{Environment, Globals};
pub use evaluator::eval;
pub use formatter::format;
pub use interpreter::{BatchEntry, Interpreter};
pub use parser::{parse_all_text, parse_one, parse_one_text};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let cases = vec![
            (Error::UnboundSymbol("foo".into()), "Unbound symbol: foo"),
            (Error::TypeError("expected number".into()), "Type error: expected number"),
            (
                Error::arity_error_with_expr(3, 2, "if"),
                "ArityError: if takes 3 args, but given 2",
            ),
            (Error::arity_error(1, 0), "ArityError: function takes 1 args, but given 0"),
            (Error::NotAFunction("1".into()), "Not a function: 1"),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_parse_error_context() {
        let input = "(define x (+ 1 2)";
        let error = ParseError::with_context(
            ParseErrorKind::Incomplete,
            "Unexpected end of input",
            input,
            input.len(),
        );
        assert_eq!(error.position, input.len());
        assert_eq!(error.context.as_deref(), Some(input));

        let long_input = format!("{}(oops", " ".repeat(40));
        let error = ParseError::with_context(ParseErrorKind::InvalidSyntax, "bad", &long_input, 45);
        let context = error.context.clone().unwrap_or_default();
        assert!(context.starts_with("[...]"), "got {context}");

        let rendered = Error::from(error).to_string();
        assert!(rendered.starts_with("ParseError: bad at position 45"));
    }
}
