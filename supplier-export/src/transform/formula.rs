//! Formula language for computed columns.
//!
//! A formula is parsed once when the config is loaded and evaluated per row.
//! Evaluation is pure: the only inputs are the cells of the current row.
//!
//! ```text
//! total    = price * qty
//! label    = concat(style_code, 'Size', size)
//! ship_by  = po_date_plus(to_date(created_at), 14)
//! location = [Shipping City] & ', ' & [Shipping Country]
//! ```
//!
//! | Construct | Meaning |
//! |-----------|---------|
//! | `12`, `2.5` | number literal |
//! | `'x'`, `"x"` | string literal |
//! | `name`, `[Any Header]` | column reference |
//! | `+ - * /` | numeric arithmetic |
//! | `&` | string concatenation |
//! | `f(a, b)` | function call: `concat`, `to_date`, `po_date_plus`, `upper`, `lower`, `trim`, `round`, `coalesce` |

use std::fmt;

use chrono::Duration;
use nom::{
    branch::alt,
    bytes::complete::take_while,
    character::complete::{char, digit0, digit1, multispace0, one_of, satisfy},
    combinator::{cut, map, opt, recognize},
    error::{ErrorKind, ParseError},
    multi::{many0, separated_list0},
    sequence::{pair, preceded, terminated},
    IResult,
};

use crate::models::{format_number, Cell};

// =============================================================================
// Errors
// =============================================================================

/// Parse or evaluation failure, with the byte offset when known.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaError {
    pub message: String,
    pub position: Option<usize>,
}

impl FormulaError {
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), position: None }
    }

    fn at(position: usize, message: impl Into<String>) -> Self {
        Self { message: message.into(), position: Some(position) }
    }
}

impl fmt::Display for FormulaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(pos) => write!(f, "{} (at offset {})", self.message, pos),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for FormulaError {}

// =============================================================================
// Syntax tree
// =============================================================================

/// Binary operators, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Concat,
    Add,
    Sub,
    Mul,
    Div,
}

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    /// Space-join the non-blank arguments, collapsing inner whitespace.
    Concat,
    /// Any date-like value as `YYYY-MM-DD`, empty when unparseable.
    ToDate,
    /// Date plus a number of days (default 0).
    PoDatePlus,
    Upper,
    Lower,
    Trim,
    /// Round to a number of decimals (default 0).
    Round,
    /// First non-empty argument.
    Coalesce,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        match name {
            "concat" => Some(Function::Concat),
            "to_date" => Some(Function::ToDate),
            "po_date_plus" => Some(Function::PoDatePlus),
            "upper" => Some(Function::Upper),
            "lower" => Some(Function::Lower),
            "trim" => Some(Function::Trim),
            "round" => Some(Function::Round),
            "coalesce" => Some(Function::Coalesce),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Function::Concat => "concat",
            Function::ToDate => "to_date",
            Function::PoDatePlus => "po_date_plus",
            Function::Upper => "upper",
            Function::Lower => "lower",
            Function::Trim => "trim",
            Function::Round => "round",
            Function::Coalesce => "coalesce",
        }
    }

    /// Accepted argument counts (min, max).
    fn arity(self) -> (usize, usize) {
        match self {
            Function::Concat | Function::Coalesce => (1, usize::MAX),
            Function::ToDate | Function::Upper | Function::Lower | Function::Trim => (1, 1),
            Function::PoDatePlus | Function::Round => (1, 2),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Text(String),
    Column(String),
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        func: Function,
        args: Vec<Expr>,
    },
}

impl Expr {
    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Column(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::Neg(inner) => inner.collect_columns(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_columns(out);
                rhs.collect_columns(out);
            }
            Expr::Call { args, .. } => args.iter().for_each(|a| a.collect_columns(out)),
            Expr::Number(_) | Expr::Text(_) => {}
        }
    }

    fn map_columns<F: FnMut(&str) -> String>(&mut self, f: &mut F) {
        match self {
            Expr::Column(name) => *name = f(name),
            Expr::Neg(inner) => inner.map_columns(f),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.map_columns(f);
                rhs.map_columns(f);
            }
            Expr::Call { args, .. } => args.iter_mut().for_each(|a| a.map_columns(f)),
            Expr::Number(_) | Expr::Text(_) => {}
        }
    }
}

// =============================================================================
// Parser
// =============================================================================

/// Maximum nesting of parentheses, calls and unary minus.
const MAX_DEPTH: usize = 64;

/// Largest `round()` precision that stays within f64.
const MAX_ROUND_DIGITS: f64 = 15.0;

type PResult<'a, O> = IResult<&'a str, O, SyntaxError<'a>>;

/// nom error carrying the remaining input and, for committed failures, a message.
#[derive(Debug)]
struct SyntaxError<'a> {
    input: &'a str,
    message: Option<String>,
}

impl<'a> ParseError<&'a str> for SyntaxError<'a> {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        Self { input, message: None }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

impl SyntaxError<'_> {
    fn into_formula_error(self, source: &str) -> FormulaError {
        let position = source.len() - self.input.len();
        let message = self.message.unwrap_or_else(|| match self.input.chars().next() {
            Some(c) => format!("unexpected '{}'", c),
            None => "unexpected end of formula".to_string(),
        });
        FormulaError::at(position, message)
    }
}

fn fail(input: &str, message: impl Into<String>) -> nom::Err<SyntaxError<'_>> {
    nom::Err::Failure(SyntaxError { input, message: Some(message.into()) })
}

/// `inner` preceded by optional whitespace.
fn token<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> PResult<'a, O>
where
    F: FnMut(&'a str) -> PResult<'a, O>,
{
    preceded(multispace0, inner)
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }
}

// concat := additive ('&' additive)*
fn concat_expr<'a>(input: &'a str, depth: usize) -> PResult<'a, Expr> {
    let (input, first) = additive(input, depth)?;
    let (input, rest) = many0(preceded(
        token(char('&')),
        cut(move |i: &'a str| additive(i, depth)),
    ))(input)?;
    Ok((input, rest.into_iter().fold(first, |lhs, rhs| binary(BinOp::Concat, lhs, rhs))))
}

// additive := term (('+' | '-') term)*
fn additive<'a>(input: &'a str, depth: usize) -> PResult<'a, Expr> {
    let (input, first) = term(input, depth)?;
    let (input, rest) = many0(pair(
        token(one_of("+-")),
        cut(move |i: &'a str| term(i, depth)),
    ))(input)?;
    let expr = rest.into_iter().fold(first, |lhs, (op, rhs)| {
        let op = if op == '+' { BinOp::Add } else { BinOp::Sub };
        binary(op, lhs, rhs)
    });
    Ok((input, expr))
}

// term := unary (('*' | '/') unary)*
fn term<'a>(input: &'a str, depth: usize) -> PResult<'a, Expr> {
    let (input, first) = unary(input, depth)?;
    let (input, rest) = many0(pair(
        token(one_of("*/")),
        cut(move |i: &'a str| unary(i, depth)),
    ))(input)?;
    let expr = rest.into_iter().fold(first, |lhs, (op, rhs)| {
        let op = if op == '*' { BinOp::Mul } else { BinOp::Div };
        binary(op, lhs, rhs)
    });
    Ok((input, expr))
}

fn unary<'a>(input: &'a str, depth: usize) -> PResult<'a, Expr> {
    if depth > MAX_DEPTH {
        return Err(fail(input, "formula is nested too deeply"));
    }
    alt((
        map(
            preceded(token(char('-')), move |i: &'a str| unary(i, depth + 1)),
            |inner| Expr::Neg(Box::new(inner)),
        ),
        move |i: &'a str| primary(i, depth),
    ))(input)
}

fn primary<'a>(input: &'a str, depth: usize) -> PResult<'a, Expr> {
    token(alt((
        number_literal,
        string_literal,
        bracketed_column,
        move |i: &'a str| parenthesized(i, depth),
        move |i: &'a str| column_or_call(i, depth),
    )))(input)
}

fn number_literal(input: &str) -> PResult<'_, Expr> {
    let digits: PResult<'_, &str> = alt((
        recognize(pair(digit1, opt(pair(char('.'), digit0)))),
        recognize(pair(char('.'), digit1)),
    ))(input);
    let (rest, text) = digits?;
    let value = text
        .parse::<f64>()
        .map_err(|_| fail(input, format!("invalid number '{}'", text)))?;
    Ok((rest, Expr::Number(value)))
}

fn string_literal(input: &str) -> PResult<'_, Expr> {
    let opening: PResult<'_, char> = one_of("'\"")(input);
    let (rest, quote) = opening?;
    let body: PResult<'_, &str> = take_while(move |c: char| c != quote)(rest);
    let (rest, value) = body?;
    let closing: PResult<'_, char> = char(quote)(rest);
    let (rest, _) = closing.map_err(|_| fail(input, "unterminated string literal"))?;
    Ok((rest, Expr::Text(value.to_string())))
}

// `[Any Header]`
fn bracketed_column(input: &str) -> PResult<'_, Expr> {
    let opening: PResult<'_, char> = char('[')(input);
    let (rest, _) = opening?;
    let body: PResult<'_, &str> = take_while(|c: char| c != ']')(rest);
    let (rest, name) = body?;
    let closing: PResult<'_, char> = char(']')(rest);
    let (rest, _) = closing.map_err(|_| fail(input, "unterminated column reference"))?;
    if name.trim().is_empty() {
        return Err(fail(input, "empty column reference"));
    }
    Ok((rest, Expr::Column(name.to_string())))
}

fn parenthesized<'a>(input: &'a str, depth: usize) -> PResult<'a, Expr> {
    preceded(
        char('('),
        cut(terminated(
            move |i: &'a str| concat_expr(i, depth + 1),
            token(char(')')),
        )),
    )(input)
}

fn identifier(input: &str) -> PResult<'_, &str> {
    recognize(pair(
        satisfy(|c| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))(input)
}

// name | name '(' (concat (',' concat)*)? ')'
fn column_or_call<'a>(input: &'a str, depth: usize) -> PResult<'a, Expr> {
    let (rest, name) = identifier(input)?;
    let (rest, args) = opt(preceded(
        token(char('(')),
        cut(terminated(
            separated_list0(token(char(',')), move |i: &'a str| concat_expr(i, depth + 1)),
            token(char(')')),
        )),
    ))(rest)?;
    match args {
        None => Ok((rest, Expr::Column(name.to_string()))),
        Some(args) => call_expr(name, args)
            .map(|expr| (rest, expr))
            .map_err(|message| fail(input, message)),
    }
}

fn call_expr(name: &str, args: Vec<Expr>) -> Result<Expr, String> {
    let func = Function::lookup(name).ok_or_else(|| format!("unknown function '{}'", name))?;
    let (min, max) = func.arity();
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{}", min)
        } else if max == usize::MAX {
            format!("at least {}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(format!(
            "{}() takes {} argument(s), got {}",
            func.name(),
            expected,
            args.len()
        ));
    }
    Ok(Expr::Call { func, args })
}

// =============================================================================
// Formula
// =============================================================================

/// A parsed computed-column formula.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    /// Parse a formula.
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        if source.trim().is_empty() {
            return Err(FormulaError::new("formula is empty"));
        }
        let parsed = concat_expr(source, 0).and_then(|(rest, expr)| {
            let trailing: PResult<'_, &str> = multispace0(rest);
            trailing.map(|(rest, _)| (rest, expr))
        });
        match parsed {
            Ok(("", expr)) => Ok(Self { source: source.to_string(), expr }),
            Ok((rest, _)) => {
                let next: String = rest.chars().take(1).collect();
                Err(FormulaError::at(
                    source.len() - rest.len(),
                    format!("unexpected '{}' after expression", next),
                ))
            }
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(e.into_formula_error(source)),
            Err(nom::Err::Incomplete(_)) => Err(FormulaError::new("incomplete formula")),
        }
    }

    /// The formula text as written in the config.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Column names referenced by the formula, in order of first use.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.expr.collect_columns(&mut out);
        out
    }

    /// Rewrite every column reference.
    pub fn map_columns<F: FnMut(&str) -> String>(&mut self, mut f: F) {
        self.expr.map_columns(&mut f);
    }

    /// Evaluate against one row. `lookup` resolves column names to cells.
    pub fn evaluate<'a, L>(&self, lookup: &L) -> Result<Cell, FormulaError>
    where
        L: Fn(&str) -> Option<&'a Cell>,
    {
        eval(&self.expr, lookup)
    }
}

// =============================================================================
// Evaluation
// =============================================================================

fn eval<'a, L>(expr: &Expr, lookup: &L) -> Result<Cell, FormulaError>
where
    L: Fn(&str) -> Option<&'a Cell>,
{
    match expr {
        Expr::Number(n) => Ok(Cell::Number(*n)),
        Expr::Text(s) => Ok(Cell::text(s.clone())),
        Expr::Column(name) => lookup(name)
            .cloned()
            .ok_or_else(|| FormulaError::new(format!("unknown column '{}'", name))),
        Expr::Neg(inner) => {
            let value = number(&eval(inner, lookup)?)?;
            Ok(Cell::Number(-value))
        }
        Expr::Binary { op: BinOp::Concat, lhs, rhs } => {
            let joined = format!("{}{}", eval(lhs, lookup)?, eval(rhs, lookup)?);
            Ok(Cell::text(joined))
        }
        Expr::Binary { op, lhs, rhs } => {
            let a = number(&eval(lhs, lookup)?)?;
            let b = number(&eval(rhs, lookup)?)?;
            let result = match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div if b == 0.0 => return Err(FormulaError::new("division by zero")),
                BinOp::Div => a / b,
                BinOp::Concat => unreachable!("handled above"),
            };
            Ok(Cell::Number(result))
        }
        Expr::Call { func, args } => {
            let values = args
                .iter()
                .map(|a| eval(a, lookup))
                .collect::<Result<Vec<_>, _>>()?;
            call(*func, values)
        }
    }
}

fn number(cell: &Cell) -> Result<f64, FormulaError> {
    cell.as_number().ok_or_else(|| {
        if cell.is_empty() {
            FormulaError::new("empty value used in arithmetic")
        } else {
            FormulaError::new(format!("'{}' is not a number", cell))
        }
    })
}

fn call(func: Function, mut args: Vec<Cell>) -> Result<Cell, FormulaError> {
    match func {
        Function::Concat => {
            let parts: Vec<String> = args
                .iter()
                .filter(|c| !c.is_empty())
                .map(|c| c.to_string())
                .collect();
            let joined = parts.join(" ");
            Ok(Cell::text(joined.split_whitespace().collect::<Vec<_>>().join(" ")))
        }
        Function::ToDate => Ok(args[0].as_date().map(Cell::Date).unwrap_or(Cell::Empty)),
        Function::PoDatePlus => {
            let date = &args[0];
            if date.is_empty() {
                return Ok(Cell::Empty);
            }
            let date = date
                .as_date()
                .ok_or_else(|| FormulaError::new(format!("'{}' is not a date", date)))?;
            let days = match args.get(1) {
                Some(d) => number(d)?,
                None => 0.0,
            };
            if days.fract() != 0.0 {
                return Err(FormulaError::new(format!(
                    "day offset must be a whole number, got {}",
                    format_number(days)
                )));
            }
            date.checked_add_signed(Duration::days(days as i64))
                .map(Cell::Date)
                .ok_or_else(|| FormulaError::new("date out of range"))
        }
        Function::Upper => Ok(Cell::text(args[0].to_string().to_uppercase())),
        Function::Lower => Ok(Cell::text(args[0].to_string().to_lowercase())),
        Function::Trim => Ok(Cell::text(args[0].to_string().trim().to_string())),
        Function::Round => {
            let value = number(&args[0])?;
            let digits = match args.get(1) {
                Some(d) => number(d)?,
                None => 0.0,
            };
            if digits.fract() != 0.0 || !(0.0..=MAX_ROUND_DIGITS).contains(&digits) {
                return Err(FormulaError::new(format!(
                    "round() digits must be a whole number from 0 to {}, got {}",
                    MAX_ROUND_DIGITS,
                    format_number(digits)
                )));
            }
            let factor = 10f64.powi(digits as i32);
            Ok(Cell::Number((value * factor).round() / factor))
        }
        Function::Coalesce => Ok(args
            .drain(..)
            .find(|c| !c.is_empty())
            .unwrap_or(Cell::Empty)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn row(pairs: &[(&str, Cell)]) -> HashMap<String, Cell> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn eval_with(src: &str, row: &HashMap<String, Cell>) -> Result<Cell, FormulaError> {
        let formula = Formula::parse(src)?;
        formula.evaluate(&|name: &str| row.get(name))
    }

    #[test]
    fn test_multiplication_of_text_columns() {
        let r = row(&[("price", Cell::text("10")), ("qty", Cell::text("3"))]);
        let value = eval_with("price * qty", &r).unwrap();
        assert_eq!(value, Cell::Number(30.0));
        assert_eq!(value.to_string(), "30");
    }

    #[test]
    fn test_precedence_and_parentheses() {
        let r = row(&[]);
        assert_eq!(eval_with("2 + 3 * 4", &r).unwrap(), Cell::Number(14.0));
        assert_eq!(eval_with("(2 + 3) * 4", &r).unwrap(), Cell::Number(20.0));
        assert_eq!(eval_with("-2 * 3", &r).unwrap(), Cell::Number(-6.0));
    }

    #[test]
    fn test_string_concatenation() {
        let r = row(&[("city", Cell::text("Lyon")), ("country", Cell::text("FR"))]);
        let value = eval_with("city & ', ' & country", &r).unwrap();
        assert_eq!(value.to_string(), "Lyon, FR");
    }

    #[test]
    fn test_bracketed_column_reference() {
        let r = row(&[("Lineitem SKU", Cell::text("A1"))]);
        assert_eq!(eval_with("[Lineitem SKU] & '-X'", &r).unwrap().to_string(), "A1-X");
        let formula = Formula::parse("[Lineitem SKU] & sku").unwrap();
        assert_eq!(formula.columns(), vec!["Lineitem SKU", "sku"]);
    }

    #[test]
    fn test_concat_skips_blanks_and_collapses_whitespace() {
        let r = row(&[
            ("style", Cell::text("Blue")),
            ("note", Cell::Empty),
            ("size", Cell::text(" M  ")),
        ]);
        let value = eval_with("concat(style, note, 'Size', size)", &r).unwrap();
        assert_eq!(value.to_string(), "Blue Size M");
    }

    #[test]
    fn test_date_functions() {
        let r = row(&[("created_at", Cell::text("2024-03-15 10:22:31 +0100"))]);
        assert_eq!(
            eval_with("to_date(created_at)", &r).unwrap(),
            Cell::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
        );
        assert_eq!(
            eval_with("po_date_plus(to_date(created_at), 20)", &r).unwrap().to_string(),
            "2024-04-04"
        );
        let empty = row(&[("created_at", Cell::Empty)]);
        assert_eq!(eval_with("po_date_plus(created_at, 3)", &empty).unwrap(), Cell::Empty);
        assert_eq!(eval_with("to_date('garbage')", &empty).unwrap(), Cell::Empty);
    }

    #[test]
    fn test_round_and_coalesce() {
        let r = row(&[("a", Cell::Empty), ("b", Cell::text("x"))]);
        assert_eq!(eval_with("round(10 / 3, 2)", &r).unwrap(), Cell::Number(3.33));
        assert_eq!(eval_with("coalesce(a, b)", &r).unwrap().to_string(), "x");
    }

    #[test]
    fn test_non_numeric_operand_is_an_error() {
        let r = row(&[("price", Cell::text("abc")), ("qty", Cell::Empty)]);
        let err = eval_with("price * 2", &r).unwrap_err();
        assert!(err.message.contains("'abc' is not a number"));
        let err = eval_with("qty + 1", &r).unwrap_err();
        assert!(err.message.contains("empty"));
    }

    #[test]
    fn test_division_by_zero() {
        let err = eval_with("1 / 0", &row(&[])).unwrap_err();
        assert_eq!(err.message, "division by zero");
    }

    #[test]
    fn test_parse_errors() {
        assert!(Formula::parse("").is_err());
        assert!(Formula::parse("price *").is_err());
        assert!(Formula::parse("(price").is_err());
        assert!(Formula::parse("price qty").is_err());
        assert!(Formula::parse("'open").is_err());
        assert!(Formula::parse("price % 2").is_err());

        let err = Formula::parse("eval(price)").unwrap_err();
        assert!(err.message.contains("unknown function 'eval'"));

        let err = Formula::parse("upper(a, b)").unwrap_err();
        assert!(err.message.contains("upper() takes 1 argument(s), got 2"));
    }

    #[test]
    fn test_parse_error_positions() {
        let err = Formula::parse("price * )").unwrap_err();
        assert_eq!(err.message, "unexpected ')'");
        assert_eq!(err.position, Some(8));

        let err = Formula::parse("price *").unwrap_err();
        assert_eq!(err.message, "unexpected end of formula");
        assert_eq!(err.position, Some(7));

        let err = Formula::parse("qty + [Unit").unwrap_err();
        assert_eq!(err.message, "unterminated column reference");
        assert_eq!(err.position, Some(6));

        let err = Formula::parse("price qty").unwrap_err();
        assert!(err.message.contains("after expression"));
        assert_eq!(err.position, Some(6));
    }

    #[test]
    fn test_whitespace_and_unicode_names() {
        let r = row(&[("prix_unité", Cell::text("4")), ("qty", Cell::text("2"))]);
        assert_eq!(eval_with("  prix_unité*qty  ", &r).unwrap(), Cell::Number(8.0));
        assert_eq!(eval_with("round( .5 , 0 )", &r).unwrap(), Cell::Number(1.0));
        assert_eq!(eval_with("2 - -3", &r).unwrap(), Cell::Number(5.0));
    }

    #[test]
    fn test_nesting_depth_is_bounded() {
        let deep = format!("{}1{}", "(".repeat(500), ")".repeat(500));
        let err = Formula::parse(&deep).unwrap_err();
        assert_eq!(err.message, "formula is nested too deeply");

        let minus = format!("{}1", "-".repeat(500));
        assert!(Formula::parse(&minus).is_err());

        let shallow = format!("{}1{}", "(".repeat(20), ")".repeat(20));
        assert_eq!(eval_with(&shallow, &row(&[])).unwrap(), Cell::Number(1.0));
    }

    #[test]
    fn test_round_digits_are_bounded() {
        let r = row(&[]);
        assert_eq!(eval_with("round(1.26, 1)", &r).unwrap(), Cell::Number(1.3));
        let err = eval_with("round(1, 400)", &r).unwrap_err();
        assert!(err.message.contains("round() digits"));
        assert!(eval_with("round(1, -1)", &r).is_err());
        assert!(eval_with("round(1, 1.5)", &r).is_err());
    }

    #[test]
    fn test_map_columns_rewrites_references() {
        let mut formula = Formula::parse("Price * [Qty Ordered]").unwrap();
        formula.map_columns(|name| name.to_lowercase().replace(' ', "_"));
        assert_eq!(formula.columns(), vec!["price", "qty_ordered"]);
    }
}
