use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{all_consuming, map, opt, recognize},
    error::{Error, ErrorKind},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, tuple},
};
use tracing::instrument;

use super::ast::{BinaryOp, ScriptExpr};
use super::{ScriptError, ScriptResult};
use crate::value::Value;

/// Deepest expression tree accepted by [`parse_script`].
pub const MAX_NESTING: usize = 64;

/// Parses a complete script expression.
#[instrument(level = "trace")]
pub fn parse_script(input: &str) -> ScriptResult<ScriptExpr> {
    let depth = nesting(input);
    if depth > MAX_NESTING {
        return Err(ScriptError::Parse(format!(
            "expression nested too deeply ({} levels, limit {})",
            depth, MAX_NESTING
        )));
    }
    all_consuming(ws(expression))(input)
        .map(|(_, expr)| expr)
        .map_err(|e| ScriptError::Parse(format!("{}: {}", input.trim(), e)))
}

fn expression(input: &str) -> IResult<&str, ScriptExpr> {
    elvis(input)
}

fn elvis(input: &str) -> IResult<&str, ScriptExpr> {
    let (input, first) = logical_or(input)?;
    let (input, rest) = many0(preceded(ws(tag("?:")), logical_or))(input)?;
    Ok((
        input,
        rest.into_iter()
            .fold(first, |left, right| ScriptExpr::Elvis(Box::new(left), Box::new(right))),
    ))
}

fn logical_or(input: &str) -> IResult<&str, ScriptExpr> {
    let (input, first) = logical_and(input)?;
    let (input, rest) = many0(preceded(ws(tag("||")), logical_and))(input)?;
    Ok((input, fold_binary(first, BinaryOp::Or, rest)))
}

fn logical_and(input: &str) -> IResult<&str, ScriptExpr> {
    let (input, first) = equality(input)?;
    let (input, rest) = many0(preceded(ws(tag("&&")), equality))(input)?;
    Ok((input, fold_binary(first, BinaryOp::And, rest)))
}

fn equality(input: &str) -> IResult<&str, ScriptExpr> {
    let (input, first) = additive(input)?;
    let (input, rest) = many0(pair(
        ws(alt((
            map(tag("=="), |_| BinaryOp::Eq),
            map(tag("!="), |_| BinaryOp::Ne),
        ))),
        additive,
    ))(input)?;
    Ok((
        input,
        rest.into_iter()
            .fold(first, |left, (op, right)| binary(op, left, right)),
    ))
}

fn additive(input: &str) -> IResult<&str, ScriptExpr> {
    let (input, first) = unary(input)?;
    let (input, rest) = many0(preceded(ws(char('+')), unary))(input)?;
    Ok((input, fold_binary(first, BinaryOp::Add, rest)))
}

fn unary(input: &str) -> IResult<&str, ScriptExpr> {
    alt((
        map(preceded(ws(char('!')), unary), |expr| {
            ScriptExpr::Not(Box::new(expr))
        }),
        postfix,
    ))(input)
}

fn postfix(input: &str) -> IResult<&str, ScriptExpr> {
    let (mut input, mut expr) = ws(primary)(input)?;
    loop {
        if let Ok((rest, (safe, name))) = member(input) {
            match arguments(rest) {
                Ok((rest, args)) => {
                    expr = ScriptExpr::Call {
                        target: Some(Box::new(expr)),
                        method: name,
                        args,
                        safe,
                    };
                    input = rest;
                }
                Err(_) => {
                    expr = ScriptExpr::Property {
                        target: Box::new(expr),
                        name,
                        safe,
                    };
                    input = rest;
                }
            }
            continue;
        }
        if let Ok((rest, index)) = delimited(ws(char('[')), expression, ws(char(']')))(input) {
            expr = ScriptExpr::Index {
                target: Box::new(expr),
                index: Box::new(index),
            };
            input = rest;
            continue;
        }
        return Ok((input, expr));
    }
}

fn member(input: &str) -> IResult<&str, (bool, String)> {
    map(
        pair(
            ws(alt((map(tag("?."), |_| true), map(char('.'), |_| false)))),
            identifier,
        ),
        |(safe, name)| (safe, name.to_string()),
    )(input)
}

fn arguments(input: &str) -> IResult<&str, Vec<ScriptExpr>> {
    delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), expression),
        ws(char(')')),
    )(input)
}

fn primary(input: &str) -> IResult<&str, ScriptExpr> {
    alt((
        number,
        map(string_literal, |s| ScriptExpr::Literal(Value::String(s))),
        map(
            delimited(
                ws(char('[')),
                separated_list0(ws(char(',')), expression),
                ws(char(']')),
            ),
            ScriptExpr::List,
        ),
        delimited(ws(char('(')), expression, ws(char(')'))),
        name_or_call,
    ))(input)
}

fn name_or_call(input: &str) -> IResult<&str, ScriptExpr> {
    let (input, name) = identifier(input)?;
    let expr = match name {
        "true" => ScriptExpr::Literal(Value::Boolean(true)),
        "false" => ScriptExpr::Literal(Value::Boolean(false)),
        "null" => ScriptExpr::Literal(Value::Null),
        _ => {
            if let Ok((rest, args)) = arguments(input) {
                return Ok((
                    rest,
                    ScriptExpr::Call {
                        target: None,
                        method: name.to_string(),
                        args,
                        safe: false,
                    },
                ));
            }
            ScriptExpr::Name(name.to_string())
        }
    };
    Ok((input, expr))
}

fn number(input: &str) -> IResult<&str, ScriptExpr> {
    let parsed: IResult<&str, &str> = recognize(tuple((
        opt(char('-')),
        digit1,
        opt(pair(char('.'), digit1)),
    )))(input);
    let (rest, text) = parsed?;
    let value = if text.contains('.') {
        text.parse::<f64>().ok().map(Value::Float)
    } else {
        text.parse::<i64>().ok().map(Value::Integer)
    };
    match value {
        Some(value) => Ok((rest, ScriptExpr::Literal(value))),
        None => Err(nom::Err::Error(Error::new(input, ErrorKind::Digit))),
    }
}

fn string_literal(input: &str) -> IResult<&str, String> {
    alt((triple_double, triple_single, double_quoted, single_quoted))(input)
}

fn triple_double(input: &str) -> IResult<&str, String> {
    map(
        delimited(tag("\"\"\""), take_until("\"\"\""), tag("\"\"\"")),
        str::to_string,
    )(input)
}

fn triple_single(input: &str) -> IResult<&str, String> {
    map(
        delimited(tag("'''"), take_until("'''"), tag("'''")),
        str::to_string,
    )(input)
}

fn double_quoted(input: &str) -> IResult<&str, String> {
    quoted(input, '"')
}

fn single_quoted(input: &str) -> IResult<&str, String> {
    quoted(input, '\'')
}

/// Quoted string with backslash escapes.
fn quoted(input: &str, quote: char) -> IResult<&str, String> {
    let opened: IResult<&str, char> = char(quote)(input);
    let (mut rest, _) = opened?;
    let mut out = String::new();
    loop {
        let mut chars = rest.char_indices();
        match chars.next() {
            None => return Err(nom::Err::Error(Error::new(rest, ErrorKind::Char))),
            Some((_, c)) if c == quote => return Ok((&rest[c.len_utf8()..], out)),
            Some((_, '\\')) => match chars.next() {
                Some((i, escaped)) => {
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                    rest = &rest[i + escaped.len_utf8()..];
                }
                None => return Err(nom::Err::Error(Error::new(rest, ErrorKind::Escaped))),
            },
            Some((_, c)) => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }
}

fn identifier(input: &str) -> IResult<&str, &str> {
    let id_chars = |c: char| c.is_alphanumeric() || c == '_' || c == '$';
    let start_chars = |c: char| c.is_alphabetic() || c == '_' || c == '$';

    take_while1(start_chars)(input).and_then(|(rest, first)| {
        let (rest, others) = take_while(id_chars)(rest)?;
        Ok((rest, &input[..first.len() + others.len()]))
    })
}

fn fold_binary(first: ScriptExpr, op: BinaryOp, rest: Vec<ScriptExpr>) -> ScriptExpr {
    rest.into_iter()
        .fold(first, |left, right| binary(op, left, right))
}

fn binary(op: BinaryOp, left: ScriptExpr, right: ScriptExpr) -> ScriptExpr {
    ScriptExpr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Upper bound of the tree depth `input` parses into: open brackets plus the
/// operators chained at each enclosing level. String literals are skipped.
fn nesting(input: &str) -> usize {
    let bytes = input.as_bytes();
    let mut levels: Vec<usize> = vec![0];
    let mut weight = 0;
    let mut deepest = 0;
    let mut i = 0;
    while i < bytes.len() {
        let rest = &bytes[i..];
        let next = rest.get(1).copied();
        let mut step = 1;
        match rest[0] {
            b'"' | b'\'' if rest.len() >= 3 && rest[1] == rest[0] && rest[2] == rest[0] => {
                let delim = &rest[..3];
                match rest[3..].windows(3).position(|w| w == delim) {
                    Some(end) => step = end + 6,
                    None => break,
                }
            }
            quote @ (b'"' | b'\'') => {
                let mut j = 1;
                while j < rest.len() && rest[j] != quote {
                    if rest[j] == b'\\' {
                        j += 1;
                    }
                    j += 1;
                }
                step = j + 1;
            }
            b'(' | b'[' => {
                levels.push(0);
                weight += 1;
            }
            b')' | b']' => {
                if levels.len() > 1 {
                    let ops = levels.pop().unwrap_or_default();
                    weight -= ops + 1;
                }
            }
            b',' => {
                if let Some(ops) = levels.last_mut() {
                    weight -= *ops;
                    *ops = 0;
                }
            }
            c => {
                let op = match (c, next) {
                    (b'=', Some(b'=')) | (b'!', Some(b'=')) | (b'&', Some(b'&')) => 2,
                    (b'|', Some(b'|')) | (b'?', Some(b':')) | (b'?', Some(b'.')) => 2,
                    (b'+' | b'.' | b'!', _) => 1,
                    _ => 0,
                };
                if op > 0 {
                    step = op;
                    if let Some(ops) = levels.last_mut() {
                        *ops += 1;
                    }
                    weight += 1;
                }
            }
        }
        deepest = deepest.max(weight);
        i += step;
    }
    deepest
}

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}
