use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_till, take_while, take_while1},
    character::complete::{char, digit0, digit1, one_of},
    combinator::{cut, map_res, opt, recognize},
    error::ErrorKind,
    multi::many0,
    sequence::{pair, preceded},
};

use crate::ast::{NumberType, Value};
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind, ensure_sufficient_stack};

/// Skip any run of Unicode whitespace
fn whitespace(input: &str) -> IResult<&str, &str> {
    take_while(char::is_whitespace).parse(input)
}

fn is_literal_char(c: char) -> bool {
    !c.is_whitespace() && c != '(' && c != ')'
}

/// Longest decimal-float prefix of a numeric token: `-?digits(.digits?)?([eE][+-]?digits)?`
fn number_prefix(input: &str) -> IResult<&str, NumberType> {
    map_res(
        recognize((
            opt(char('-')),
            digit1,
            opt(pair(char('.'), digit0)),
            opt((one_of("eE"), opt(one_of("+-")), digit1)),
        )),
        str::parse::<NumberType>,
    )
    .parse(input)
}

/// A token is numeric when it starts with a digit, or with `-` and a digit
fn looks_numeric(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('-') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}

/// Classify a bare token. Anything after a valid numeric prefix is
/// ignored, so `1abc` reads as `1`.
fn classify_literal(token: &str) -> Value {
    if looks_numeric(token)
        && let Ok((_, number)) = number_prefix(token)
    {
        return Value::Number(number);
    }

    match token {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => Value::Symbol(token.to_owned()),
    }
}

/// Parse a literal token: the longest run of non-whitespace, non-paren characters
fn parse_literal(input: &str) -> IResult<&str, Value> {
    let (input, token) = take_while1(is_literal_char).parse(input)?;
    Ok((input, classify_literal(token)))
}

/// Parse a string literal. Characters up to the next `"` are taken verbatim;
/// there are no escape sequences.
fn parse_string(input: &str) -> IResult<&str, Value> {
    let (input, _) = char('"').parse(input)?;
    let (input, content) = take_till(|c: char| c == '"').parse(input)?;
    let (input, _) = cut(char('"')).parse(input)?;
    Ok((input, Value::String(content.to_owned())))
}

/// Parse a parenthesized list into a `Null`-terminated pair chain
fn parse_list(input: &str, depth: usize) -> IResult<&str, Value> {
    let (input, _) = char('(').parse(input)?;
    if depth >= MAX_PARSE_DEPTH {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        )));
    }

    let (input, items) = many0(|input| parse_expr(input, depth + 1)).parse(input)?;
    let (input, _) = preceded(whitespace, cut(char(')'))).parse(input)?;

    Ok((input, Value::list(items)))
}

/// Parse one expression after optional leading whitespace
fn parse_expr(input: &str, depth: usize) -> IResult<&str, Value> {
    ensure_sufficient_stack(|| {
        preceded(
            whitespace,
            alt((
                |input| parse_list(input, depth),
                parse_string,
                parse_literal,
            )),
        )
        .parse(input)
    })
}

/// Convert a nom error on a suffix of `text` into a positioned ParseError
fn to_parse_error(text: &str, error: nom::Err<nom::error::Error<&str>>) -> ParseError {
    let (remaining, code) = match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => (e.input, Some(e.code)),
        nom::Err::Incomplete(_) => ("", None),
    };
    let position = text.len().saturating_sub(remaining.len());
    let rest = remaining.trim_start();

    let (kind, message) = if code == Some(ErrorKind::TooLarge) {
        (
            ParseErrorKind::TooDeeplyNested,
            format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
        )
    } else if rest.is_empty() {
        (ParseErrorKind::Incomplete, "Unexpected end of input".to_owned())
    } else if rest.starts_with(')') {
        (ParseErrorKind::InvalidSyntax, "Unexpected ')'".to_owned())
    } else {
        let near: String = rest.chars().take(10).collect();
        (ParseErrorKind::InvalidSyntax, format!("Invalid syntax near '{near}'"))
    };

    let position = position + (remaining.len() - rest.len());
    ParseError::with_context(kind, message, text, position)
}

/// Parse one expression starting at byte offset `position`.
///
/// Returns the value and the offset just past it. Leading whitespace is
/// skipped; trailing input is left alone.
pub fn parse_one(text: &str, position: usize) -> Result<(Value, usize), Error> {
    let Some(input) = text.get(position..) else {
        return Err(ParseError::with_context(
            ParseErrorKind::InvalidSyntax,
            format!("Invalid start position {position}"),
            text,
            text.len(),
        )
        .into());
    };

    match parse_expr(input, 0) {
        Ok((remaining, value)) => Ok((value, text.len() - remaining.len())),
        Err(e) => Err(to_parse_error(text, e).into()),
    }
}

/// Parse text that must hold exactly one expression (surrounding
/// whitespace allowed)
pub fn parse_one_text(text: &str) -> Result<Value, Error> {
    let (value, end) = parse_one(text, 0)?;
    let rest = &text[end..];
    let trimmed = rest.trim_start();
    if !trimmed.is_empty() {
        let offset = end + (rest.len() - trimmed.len());
        return Err(ParseError::with_context(
            ParseErrorKind::TrailingContent,
            "Unexpected trailing content",
            text,
            offset,
        )
        .into());
    }
    Ok(value)
}

/// Parse every top-level expression in `text`, in order
pub fn parse_all_text(text: &str) -> Result<Vec<Value>, Error> {
    let mut values = Vec::new();
    let mut position = 0;
    loop {
        let rest = &text[position..];
        let trimmed = rest.trim_start();
        if trimmed.is_empty() {
            break;
        }
        position += rest.len() - trimmed.len();

        let (value, end) = parse_one(text, position)?;
        values.push(value);
        position = end;
    }
    tracing::trace!(count = values.len(), "parsed top-level expressions");
    Ok(values)
}
