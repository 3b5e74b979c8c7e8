//! Value-filter evaluator used by the snapshot backend.
//!
//! Grammar (SOMA query-condition style):
//!
//! ```text
//! expr       := and_expr (("or" | "|") and_expr)*
//! and_expr   := not_expr (("and" | "&") not_expr)*
//! not_expr   := "not" not_expr | "(" expr ")" | comparison
//! comparison := column op literal | literal op column
//!             | column ["not"] "in" "[" literal ("," literal)* "]"
//!             | column
//! op         := "==" | "!=" | "<" | "<=" | ">" | ">="
//! literal    := 'str' | "str" | int | float | True | False
//! ```
//!
//! A bare column is shorthand for `column == True`. Chains of `and` / `or`
//! parse into one flat node, and `not` / parentheses may nest at most
//! [`MAX_NESTING`] levels deep.

use std::cmp::Ordering;
use std::error::Error;
use std::fmt;

use census_store::models::CellValue;

/// Deepest `not` / parenthesis nesting a filter may use.
pub const MAX_NESTING: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterError {
    message: String,
}

impl FilterError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for FilterError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    /// Operator with operands swapped: `5 < x` is `x > 5`.
    const fn flip(self) -> Self {
        match self {
            Self::Eq => Self::Eq,
            Self::Ne => Self::Ne,
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
        }
    }

    const fn matches(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering.is_eq(),
            Self::Ne => ordering.is_ne(),
            Self::Lt => ordering.is_lt(),
            Self::Le => ordering.is_le(),
            Self::Gt => ordering.is_gt(),
            Self::Ge => ordering.is_ge(),
        }
    }

    const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// A column resolved against a frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundColumn {
    pub index: usize,
    pub name: String,
}

/// Parsed filter; `C` is a column name before binding and a
/// [`BoundColumn`] after.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition<C> {
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
    Compare {
        column: C,
        op: CmpOp,
        value: CellValue,
    },
    Member {
        column: C,
        values: Vec<CellValue>,
        negated: bool,
    },
}

impl Condition<String> {
    /// Parses a filter expression.
    ///
    /// # Errors
    /// Returns `FilterError` describing the first syntax problem.
    pub fn parse(expression: &str) -> Result<Self, FilterError> {
        let tokens = tokenize(expression)?;
        if tokens.is_empty() {
            return Err(FilterError::new("empty expression"));
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let condition = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(FilterError::new(format!("unexpected {token}")));
        }
        Ok(condition)
    }

    /// Resolves column names against a frame header.
    ///
    /// # Errors
    /// Returns `FilterError` for a column the frame does not have.
    pub fn bind(self, columns: &[String]) -> Result<Condition<BoundColumn>, FilterError> {
        let resolve = |name: String| -> Result<BoundColumn, FilterError> {
            columns
                .iter()
                .position(|column| *column == name)
                .map(|index| BoundColumn { index, name: name.clone() })
                .ok_or_else(|| FilterError::new(format!("unknown column '{name}'")))
        };
        Ok(match self {
            Self::And(terms) => Condition::And(bind_all(terms, columns)?),
            Self::Or(terms) => Condition::Or(bind_all(terms, columns)?),
            Self::Not(inner) => Condition::Not(Box::new(inner.bind(columns)?)),
            Self::Compare { column, op, value } => Condition::Compare {
                column: resolve(column)?,
                op,
                value,
            },
            Self::Member {
                column,
                values,
                negated,
            } => Condition::Member {
                column: resolve(column)?,
                values,
                negated,
            },
        })
    }
}

impl Condition<BoundColumn> {
    /// Evaluates the condition against one row.
    ///
    /// Nulls never compare equal: they fail every comparison except `!=` and
    /// `not in`.
    ///
    /// # Errors
    /// Returns `FilterError` when a literal's type does not match the cell.
    pub fn eval(&self, row: &[CellValue]) -> Result<bool, FilterError> {
        match self {
            Self::And(terms) => {
                for term in terms {
                    if !term.eval(row)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or(terms) => {
                for term in terms {
                    if term.eval(row)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Not(inner) => Ok(!inner.eval(row)?),
            Self::Compare { column, op, value } => {
                let cell = row.get(column.index).unwrap_or(&CellValue::Null);
                if cell.is_null() {
                    return Ok(*op == CmpOp::Ne);
                }
                match compare(cell, value) {
                    Some(ordering) => Ok(op.matches(ordering)),
                    None if is_nan(cell) || is_nan(value) => Ok(*op == CmpOp::Ne),
                    None => Err(mismatch(column, cell, value, op.symbol())),
                }
            }
            Self::Member {
                column,
                values,
                negated,
            } => {
                let cell = row.get(column.index).unwrap_or(&CellValue::Null);
                if cell.is_null() {
                    return Ok(*negated);
                }
                let mut found = false;
                for value in values {
                    match compare(cell, value) {
                        Some(ordering) if ordering.is_eq() => {
                            found = true;
                            break;
                        }
                        Some(_) => {}
                        None if is_nan(cell) || is_nan(value) => {}
                        None => return Err(mismatch(column, cell, value, "in")),
                    }
                }
                Ok(found != *negated)
            }
        }
    }
}

fn bind_all(
    terms: Vec<Condition<String>>,
    columns: &[String],
) -> Result<Vec<Condition<BoundColumn>>, FilterError> {
    terms.into_iter().map(|term| term.bind(columns)).collect()
}

const fn is_nan(value: &CellValue) -> bool {
    matches!(value, CellValue::Float(inner) if inner.is_nan())
}

#[allow(clippy::cast_precision_loss)]
fn compare(cell: &CellValue, literal: &CellValue) -> Option<Ordering> {
    match (cell, literal) {
        (CellValue::Str(left), CellValue::Str(right)) => Some(left.cmp(right)),
        (CellValue::Int(left), CellValue::Int(right)) => Some(left.cmp(right)),
        (CellValue::Bool(left), CellValue::Bool(right)) => Some(left.cmp(right)),
        (CellValue::Float(left), CellValue::Float(right)) => left.partial_cmp(right),
        (CellValue::Int(left), CellValue::Float(right)) => (*left as f64).partial_cmp(right),
        (CellValue::Float(left), CellValue::Int(right)) => left.partial_cmp(&(*right as f64)),
        _ => None,
    }
}

fn mismatch(column: &BoundColumn, cell: &CellValue, literal: &CellValue, op: &str) -> FilterError {
    FilterError::new(format!(
        "cannot apply '{op}' to column '{}' of type {} and a {} literal",
        column.name,
        cell.type_name(),
        literal.type_name()
    ))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Literal(CellValue),
    Op(CmpOp),
    And,
    Or,
    Not,
    In,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(name) => write!(f, "identifier '{name}'"),
            Self::Literal(value) => write!(f, "literal {}", value.to_json()),
            Self::Op(op) => write!(f, "'{}'", op.symbol()),
            Self::And => f.write_str("'and'"),
            Self::Or => f.write_str("'or'"),
            Self::Not => f.write_str("'not'"),
            Self::In => f.write_str("'in'"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
            Self::LBracket => f.write_str("'['"),
            Self::RBracket => f.write_str("']'"),
            Self::Comma => f.write_str("','"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, FilterError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while let Some(&ch) = chars.get(pos) {
        match ch {
            c if c.is_whitespace() => pos += 1,
            '(' | ')' | '[' | ']' | ',' | '&' | '|' => {
                tokens.push(match ch {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    ',' => Token::Comma,
                    '&' => Token::And,
                    _ => Token::Or,
                });
                pos += 1;
            }
            '=' | '!' | '<' | '>' => {
                let next = chars.get(pos + 1).copied();
                let (op, width) = match (ch, next) {
                    ('=', Some('=')) => (CmpOp::Eq, 2),
                    ('!', Some('=')) => (CmpOp::Ne, 2),
                    ('<', Some('=')) => (CmpOp::Le, 2),
                    ('>', Some('=')) => (CmpOp::Ge, 2),
                    ('<', _) => (CmpOp::Lt, 1),
                    ('>', _) => (CmpOp::Gt, 1),
                    _ => {
                        return Err(FilterError::new(format!(
                            "unexpected character '{ch}' at position {pos}"
                        )));
                    }
                };
                tokens.push(Token::Op(op));
                pos += width;
            }
            '\'' | '"' => {
                let (value, next) = read_string(&chars, pos)?;
                tokens.push(Token::Literal(CellValue::Str(value)));
                pos = next;
            }
            c if c.is_ascii_digit()
                || (matches!(c, '-' | '.')
                    && chars.get(pos + 1).is_some_and(char::is_ascii_digit)) =>
            {
                let (value, next) = read_number(&chars, pos)?;
                tokens.push(Token::Literal(value));
                pos = next;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = pos;
                while chars
                    .get(pos)
                    .is_some_and(|c| c.is_alphanumeric() || *c == '_')
                {
                    pos += 1;
                }
                let word: String = chars[start..pos].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    "True" | "true" => Token::Literal(CellValue::Bool(true)),
                    "False" | "false" => Token::Literal(CellValue::Bool(false)),
                    _ => Token::Ident(word),
                });
            }
            other => {
                return Err(FilterError::new(format!(
                    "unexpected character '{other}' at position {pos}"
                )));
            }
        }
    }

    Ok(tokens)
}

fn read_string(chars: &[char], start: usize) -> Result<(String, usize), FilterError> {
    let quote = chars[start];
    let mut value = String::new();
    let mut pos = start + 1;
    while let Some(&ch) = chars.get(pos) {
        match ch {
            '\\' => {
                let escaped = chars
                    .get(pos + 1)
                    .ok_or_else(|| FilterError::new("unterminated escape in string literal"))?;
                value.push(*escaped);
                pos += 2;
            }
            c if c == quote => return Ok((value, pos + 1)),
            c => {
                value.push(c);
                pos += 1;
            }
        }
    }
    Err(FilterError::new(format!(
        "unterminated string literal starting at position {start}"
    )))
}

fn read_number(chars: &[char], start: usize) -> Result<(CellValue, usize), FilterError> {
    let mut pos = start;
    if chars.get(pos) == Some(&'-') {
        pos += 1;
    }
    while chars
        .get(pos)
        .is_some_and(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E'))
        || (matches!(chars.get(pos), Some('-' | '+'))
            && matches!(chars.get(pos.wrapping_sub(1)), Some('e' | 'E')))
    {
        pos += 1;
    }
    let text: String = chars[start..pos].iter().collect();
    let value = if text.contains(['.', 'e', 'E']) {
        text.parse::<f64>().map(CellValue::Float).ok()
    } else {
        text.parse::<i64>().map(CellValue::Int).ok()
    };
    value
        .map(|value| (value, pos))
        .ok_or_else(|| FilterError::new(format!("invalid number '{text}'")))
}

enum Operand {
    Column(String),
    Literal(CellValue),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), FilterError> {
        if self.eat(expected) {
            return Ok(());
        }
        Err(match self.peek() {
            Some(found) => FilterError::new(format!("expected {expected}, found {found}")),
            None => FilterError::new(format!("expected {expected}, found end of expression")),
        })
    }

    fn parse_or(&mut self) -> Result<Condition<String>, FilterError> {
        let mut terms = vec![self.parse_and()?];
        while self.eat(&Token::Or) {
            terms.push(self.parse_and()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Condition::Or(terms)
        })
    }

    fn parse_and(&mut self) -> Result<Condition<String>, FilterError> {
        let mut terms = vec![self.parse_not()?];
        while self.eat(&Token::And) {
            terms.push(self.parse_not()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Condition::And(terms)
        })
    }

    fn parse_not(&mut self) -> Result<Condition<String>, FilterError> {
        if self.eat(&Token::Not) {
            self.descend()?;
            let inner = self.parse_not()?;
            self.depth -= 1;
            return Ok(Condition::Not(Box::new(inner)));
        }
        if self.eat(&Token::LParen) {
            self.descend()?;
            let inner = self.parse_or()?;
            self.expect(&Token::RParen)?;
            self.depth -= 1;
            return Ok(inner);
        }
        self.parse_comparison()
    }

    fn descend(&mut self) -> Result<(), FilterError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(FilterError::new(format!(
                "expression nests too deeply (more than {MAX_NESTING} levels)"
            )));
        }
        Ok(())
    }

    fn parse_operand(&mut self) -> Result<Operand, FilterError> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(Operand::Column(name)),
            Some(Token::Literal(value)) => Ok(Operand::Literal(value)),
            Some(other) => Err(FilterError::new(format!(
                "expected a column or literal, found {other}"
            ))),
            None => Err(FilterError::new(
                "expected a column or literal, found end of expression",
            )),
        }
    }

    fn parse_comparison(&mut self) -> Result<Condition<String>, FilterError> {
        let left = self.parse_operand()?;

        let negated_member = self.peek() == Some(&Token::Not)
            && self.tokens.get(self.pos + 1) == Some(&Token::In);
        if negated_member || self.peek() == Some(&Token::In) {
            let Operand::Column(column) = left else {
                return Err(FilterError::new("'in' requires a column on the left"));
            };
            if negated_member {
                self.pos += 1;
            }
            self.expect(&Token::In)?;
            let values = self.parse_list()?;
            return Ok(Condition::Member {
                column,
                values,
                negated: negated_member,
            });
        }

        let Some(Token::Op(op)) = self.peek().cloned() else {
            return match left {
                Operand::Column(column) => Ok(Condition::Compare {
                    column,
                    op: CmpOp::Eq,
                    value: CellValue::Bool(true),
                }),
                Operand::Literal(value) => Err(FilterError::new(format!(
                    "expected a comparison after literal {}",
                    value.to_json()
                ))),
            };
        };
        self.pos += 1;
        let right = self.parse_operand()?;

        match (left, right) {
            (Operand::Column(column), Operand::Literal(value)) => {
                Ok(Condition::Compare { column, op, value })
            }
            (Operand::Literal(value), Operand::Column(column)) => Ok(Condition::Compare {
                column,
                op: op.flip(),
                value,
            }),
            (Operand::Column(left), Operand::Column(right)) => Err(FilterError::new(format!(
                "comparing two columns ('{left}', '{right}') is not supported"
            ))),
            (Operand::Literal(_), Operand::Literal(_)) => Err(FilterError::new(
                "a comparison must reference a column",
            )),
        }
    }

    fn parse_list(&mut self) -> Result<Vec<CellValue>, FilterError> {
        self.expect(&Token::LBracket)?;
        let mut values = Vec::new();
        loop {
            if self.eat(&Token::RBracket) {
                return Ok(values);
            }
            match self.next() {
                Some(Token::Literal(value)) => values.push(value),
                Some(other) => {
                    return Err(FilterError::new(format!(
                        "expected a literal in list, found {other}"
                    )));
                }
                None => return Err(FilterError::new("unterminated list")),
            }
            if !self.eat(&Token::Comma) {
                self.expect(&Token::RBracket)?;
                return Ok(values);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<String> {
        ["cell_type", "tissue", "n_genes", "is_primary_data", "score"]
            .iter()
            .map(|name| (*name).to_string())
            .collect()
    }

    fn row(cell_type: &str, tissue: &str, n_genes: i64, primary: bool) -> Vec<CellValue> {
        vec![
            CellValue::from(cell_type),
            CellValue::from(tissue),
            CellValue::Int(n_genes),
            CellValue::Bool(primary),
            CellValue::Float(0.5),
        ]
    }

    fn eval(expression: &str, row: &[CellValue]) -> Result<bool, FilterError> {
        Condition::parse(expression)?.bind(&columns())?.eval(row)
    }

    #[test]
    fn equality_and_conjunction() {
        let t_cell = row("T cell", "lung", 900, true);
        assert_eq!(eval("cell_type == 'T cell'", &t_cell), Ok(true));
        assert_eq!(eval("cell_type == \"B cell\"", &t_cell), Ok(false));
        assert_eq!(eval("cell_type == 'T cell' and tissue == 'lung'", &t_cell), Ok(true));
        assert_eq!(eval("cell_type == 'T cell' & tissue == 'blood'", &t_cell), Ok(false));
        assert_eq!(eval("tissue == 'blood' or tissue == 'lung'", &t_cell), Ok(true));
    }

    #[test]
    fn membership_and_negation() {
        let b_cell = row("B cell", "blood", 300, false);
        assert_eq!(eval("cell_type in ['T cell', 'B cell']", &b_cell), Ok(true));
        assert_eq!(eval("cell_type not in ['T cell', 'B cell']", &b_cell), Ok(false));
        assert_eq!(eval("not (tissue == 'blood')", &b_cell), Ok(false));
        assert_eq!(eval("is_primary_data == False", &b_cell), Ok(true));
        assert_eq!(eval("is_primary_data", &b_cell), Ok(false));
    }

    #[test]
    fn numeric_comparisons_mix_int_and_float() {
        let cell = row("T cell", "lung", 900, true);
        assert_eq!(eval("n_genes > 500", &cell), Ok(true));
        assert_eq!(eval("500 < n_genes", &cell), Ok(true));
        assert_eq!(eval("n_genes <= 899.5", &cell), Ok(false));
        assert_eq!(eval("score >= 0.5 and score < 1", &cell), Ok(true));
        assert_eq!(eval("n_genes > -1e3", &cell), Ok(true));
    }

    #[test]
    fn precedence_binds_and_tighter_than_or() {
        let cell = row("T cell", "lung", 900, true);
        assert_eq!(
            eval("tissue == 'blood' and n_genes > 0 or cell_type == 'T cell'", &cell),
            Ok(true)
        );
        assert_eq!(
            eval("tissue == 'blood' and (n_genes > 0 or cell_type == 'T cell')", &cell),
            Ok(false)
        );
    }

    #[test]
    fn nulls_only_match_inequality() {
        let mut cell = row("T cell", "lung", 900, true);
        cell[1] = CellValue::Null;
        assert_eq!(eval("tissue == 'lung'", &cell), Ok(false));
        assert_eq!(eval("tissue != 'lung'", &cell), Ok(true));
        assert_eq!(eval("tissue not in ['lung']", &cell), Ok(true));
    }

    #[test]
    fn syntax_errors_are_reported() {
        for expression in [
            "",
            "cell_type = 'T cell'",
            "cell_type == 'T cell",
            "cell_type ==",
            "(cell_type == 'T cell'",
            "cell_type in 'T cell'",
            "'a' == 'b'",
            "cell_type == tissue",
            "cell_type == 'T cell' tissue",
        ] {
            assert!(Condition::parse(expression).is_err(), "{expression} should fail");
        }
    }

    #[test]
    fn long_chains_parse_flat() {
        let chain = ["cell_type == 'B cell'"; 5_000].join(" or ") + " or tissue == 'lung'";
        let cell = row("T cell", "lung", 900, true);
        assert_eq!(eval(&chain, &cell), Ok(true));

        let Ok(Condition::Or(terms)) = Condition::parse(&chain) else {
            panic!("expected a flat disjunction");
        };
        assert_eq!(terms.len(), 5_001);
    }

    #[test]
    fn nesting_is_bounded() {
        let cell = row("T cell", "lung", 900, true);
        let nested = format!(
            "{}cell_type == 'T cell'{}",
            "(".repeat(MAX_NESTING),
            ")".repeat(MAX_NESTING)
        );
        assert_eq!(eval(&nested, &cell), Ok(true));

        let parens = format!(
            "{}cell_type == 'T cell'{}",
            "(".repeat(10_000),
            ")".repeat(10_000)
        );
        let err = Condition::parse(&parens).expect_err("too deep");
        assert!(err.to_string().contains("nests too deeply"));

        let negations = format!("{}is_primary_data", "not ".repeat(10_000));
        let err = Condition::parse(&negations).expect_err("too deep");
        assert!(err.to_string().contains("nests too deeply"));
    }

    #[test]
    fn unknown_columns_fail_to_bind() {
        let err = Condition::parse("donor_age > 40")
            .expect("parses")
            .bind(&columns())
            .expect_err("unknown column");
        assert!(err.to_string().contains("donor_age"));
    }

    #[test]
    fn type_mismatches_fail_evaluation() {
        let cell = row("T cell", "lung", 900, true);
        assert!(eval("cell_type > 5", &cell).is_err());
        assert!(eval("n_genes == 'many'", &cell).is_err());
    }
}
