//! The service query language.
//!
//! Queries are small boolean expressions evaluated against a service's
//! namespace (its registration properties laid over its attributes):
//!
//! ```text
//! price <= 100 and currency == 'EUR'
//! name in ['fred', 'wilma'] || not deprecated
//! (size > 1.5) && tags != []
//! ```
//!
//! Supported: integer, float, string, `True`/`False`/`None` and list
//! literals; names (dotted names reach into objects); `== != < <= > >=`
//! (chainable); `in` and `not in`; `and`/`or`/`not` and `&&`/`||`/`!`;
//! unary minus and parentheses. Truthiness: `None`, `False`, zero, empty
//! strings, lists and objects are false.

use std::cmp::Ordering;

use serde_json::Value;
use thiserror::Error;

/// Errors parsing or evaluating a query
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Syntax error at {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("Name '{0}' is not defined")]
    UnknownName(String),

    #[error("Type error: {0}")]
    Type(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Minus,
    Op(CmpOp),
    And,
    Or,
    Not,
    In,
    True,
    False,
    None,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Name(String),
    List(Vec<Expr>),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Compare(Box<Expr>, Vec<(CmpOp, Expr)>),
}

/// Deepest nesting of `not`, `-`, `(` and `[` a query may use.
const MAX_DEPTH: usize = 256;

fn syntax(position: usize, message: impl Into<String>) -> QueryError {
    QueryError::Syntax {
        position,
        message: message.into(),
    }
}

// ─── Lexer ───────────────────────────────────────────────────────────

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, QueryError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (start, c) = chars[i];
        let next = chars.get(i + 1).map(|(_, c)| *c);

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() {
            let mut end = i;
            let mut is_float = false;
            while end < chars.len() && chars[end].1.is_ascii_digit() {
                end += 1;
            }
            if end < chars.len() && chars[end].1 == '.' {
                is_float = true;
                end += 1;
                while end < chars.len() && chars[end].1.is_ascii_digit() {
                    end += 1;
                }
            }
            if end < chars.len() && matches!(chars[end].1, 'e' | 'E') {
                let mut exponent = end + 1;
                if exponent < chars.len() && matches!(chars[exponent].1, '+' | '-') {
                    exponent += 1;
                }
                if exponent < chars.len() && chars[exponent].1.is_ascii_digit() {
                    is_float = true;
                    end = exponent;
                    while end < chars.len() && chars[end].1.is_ascii_digit() {
                        end += 1;
                    }
                }
            }
            let text: String = chars[i..end].iter().map(|(_, c)| c).collect();
            let token = if is_float {
                Token::Float(
                    text.parse()
                        .map_err(|_| syntax(start, format!("invalid number '{text}'")))?,
                )
            } else {
                match text.parse::<i64>() {
                    Ok(value) => Token::Int(value),
                    Err(_) => Token::Float(
                        text.parse()
                            .map_err(|_| syntax(start, format!("invalid number '{text}'")))?,
                    ),
                }
            };
            tokens.push((token, start));
            i = end;
            continue;
        }

        if c == '\'' || c == '"' {
            let quote = c;
            let mut value = String::new();
            let mut j = i + 1;
            let mut closed = false;
            while j < chars.len() {
                let ch = chars[j].1;
                if ch == quote {
                    closed = true;
                    break;
                }
                if ch == '\\' {
                    let escaped = chars
                        .get(j + 1)
                        .map(|(_, c)| *c)
                        .ok_or_else(|| syntax(chars[j].0, "dangling escape"))?;
                    value.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                    j += 2;
                    continue;
                }
                value.push(ch);
                j += 1;
            }
            if !closed {
                return Err(syntax(start, "unterminated string"));
            }
            tokens.push((Token::Str(value), start));
            i = j + 1;
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let mut end = i + 1;
            while end < chars.len()
                && (chars[end].1.is_alphanumeric() || matches!(chars[end].1, '_' | '.'))
            {
                end += 1;
            }
            let word: String = chars[i..end].iter().map(|(_, c)| c).collect();
            let token = match word.as_str() {
                "and" => Token::And,
                "or" => Token::Or,
                "not" => Token::Not,
                "in" => Token::In,
                "True" => Token::True,
                "False" => Token::False,
                "None" => Token::None,
                _ => Token::Ident(word),
            };
            tokens.push((token, start));
            i = end;
            continue;
        }

        let (token, width) = match (c, next) {
            ('=', Some('=')) => (Token::Op(CmpOp::Eq), 2),
            ('!', Some('=')) => (Token::Op(CmpOp::Ne), 2),
            ('<', Some('=')) => (Token::Op(CmpOp::Le), 2),
            ('>', Some('=')) => (Token::Op(CmpOp::Ge), 2),
            ('&', Some('&')) => (Token::And, 2),
            ('|', Some('|')) => (Token::Or, 2),
            ('<', _) => (Token::Op(CmpOp::Lt), 1),
            ('>', _) => (Token::Op(CmpOp::Gt), 1),
            ('!', _) => (Token::Not, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            (',', _) => (Token::Comma, 1),
            ('-', _) => (Token::Minus, 1),
            _ => return Err(syntax(start, format!("unexpected character '{c}'"))),
        };
        tokens.push((token, start));
        i += width;
    }

    Ok(tokens)
}

// ─── Parser ──────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn peek_second(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1).map(|(token, _)| token)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, position)| *position)
            .unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(token, _)| token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), QueryError> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(syntax(self.position(), format!("expected {what}")))
        }
    }

    /// Run `parse` one nesting level deeper.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, QueryError>,
    ) -> Result<T, QueryError> {
        if self.depth >= MAX_DEPTH {
            return Err(syntax(self.position(), "query nested too deeply"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_or(&mut self) -> Result<Expr, QueryError> {
        let mut operands = vec![self.parse_and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            operands.push(self.parse_and()?);
        }
        Ok(if operands.len() == 1 {
            operands.remove(0)
        } else {
            Expr::Or(operands)
        })
    }

    fn parse_and(&mut self) -> Result<Expr, QueryError> {
        let mut operands = vec![self.parse_not()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            operands.push(self.parse_not()?);
        }
        Ok(if operands.len() == 1 {
            operands.remove(0)
        } else {
            Expr::And(operands)
        })
    }

    fn parse_not(&mut self) -> Result<Expr, QueryError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            let operand = self.nested(Self::parse_not)?;
            return Ok(Expr::Not(Box::new(operand)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, QueryError> {
        let first = self.parse_unary()?;
        let mut rest = Vec::new();
        loop {
            let op = match (self.peek(), self.peek_second()) {
                (Some(Token::Op(op)), _) => {
                    let op = *op;
                    self.pos += 1;
                    op
                }
                (Some(Token::In), _) => {
                    self.pos += 1;
                    CmpOp::In
                }
                (Some(Token::Not), Some(Token::In)) => {
                    self.pos += 2;
                    CmpOp::NotIn
                }
                _ => break,
            };
            rest.push((op, self.parse_unary()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), rest))
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, QueryError> {
        if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            let operand = self.nested(Self::parse_unary)?;
            return Ok(Expr::Neg(Box::new(operand)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, QueryError> {
        let position = self.position();
        match self.advance() {
            Some(Token::Int(value)) => Ok(Expr::Literal(Value::from(value))),
            Some(Token::Float(value)) => Ok(Expr::Literal(Value::from(value))),
            Some(Token::Str(value)) => Ok(Expr::Literal(Value::String(value))),
            Some(Token::True) => Ok(Expr::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(Value::Bool(false))),
            Some(Token::None) => Ok(Expr::Literal(Value::Null)),
            Some(Token::Ident(name)) => Ok(Expr::Name(name)),
            Some(Token::LParen) => self.nested(|parser| {
                let inner = parser.parse_or()?;
                parser.expect(Token::RParen, "')'")?;
                Ok(inner)
            }),
            Some(Token::LBracket) => self.nested(|parser| {
                let mut items = Vec::new();
                while parser.peek() != Some(&Token::RBracket) {
                    items.push(parser.parse_or()?);
                    if parser.peek() == Some(&Token::Comma) {
                        parser.pos += 1;
                    } else {
                        break;
                    }
                }
                parser.expect(Token::RBracket, "']'")?;
                Ok(Expr::List(items))
            }),
            Some(other) => Err(syntax(position, format!("unexpected {other:?}"))),
            None => Err(syntax(position, "unexpected end of query")),
        }
    }
}

// ─── Values ──────────────────────────────────────────────────────────

/// Truthiness of a value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "None",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Value::Number(x), Value::Number(y)) = (a, b)
        && let (Some(x), Some(y)) = (x.as_i64(), y.as_i64())
    {
        return x == y;
    }
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => match (a, b) {
            (Value::Array(x), Value::Array(y)) => {
                x.len() == y.len() && x.iter().zip(y).all(|(x, y)| values_equal(x, y))
            }
            _ => a == b,
        },
    }
}

/// Ordering between two values, if they are comparable.
///
/// Numbers (and booleans) compare numerically, strings lexicographically,
/// lists element by element. Anything else is incomparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Value::Number(x), Value::Number(y)) = (a, b)
        && let (Some(x), Some(y)) = (x.as_i64(), y.as_i64())
    {
        return Some(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Array(x), Value::Array(y)) => {
            for (x, y) in x.iter().zip(y) {
                match compare_values(x, y)? {
                    Ordering::Equal => continue,
                    unequal => return Some(unequal),
                }
            }
            Some(x.len().cmp(&y.len()))
        }
        _ => None,
    }
}

fn contains(container: &Value, item: &Value) -> Result<bool, QueryError> {
    match (container, item) {
        (Value::Array(items), _) => Ok(items.iter().any(|candidate| values_equal(candidate, item))),
        (Value::String(haystack), Value::String(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::Object(map), Value::String(key)) => Ok(map.contains_key(key)),
        _ => Err(QueryError::Type(format!(
            "'in' needs a list, str or object on the right, not {} in {}",
            kind(item),
            kind(container)
        ))),
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool, QueryError> {
    match op {
        CmpOp::Eq => Ok(values_equal(left, right)),
        CmpOp::Ne => Ok(!values_equal(left, right)),
        CmpOp::In => contains(right, left),
        CmpOp::NotIn => contains(right, left).map(|found| !found),
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            let ordering = compare_values(left, right).ok_or_else(|| {
                QueryError::Type(format!("cannot order {} and {}", kind(left), kind(right)))
            })?;
            Ok(match op {
                CmpOp::Lt => ordering.is_lt(),
                CmpOp::Le => ordering.is_le(),
                CmpOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
    }
}

// ─── Evaluation ──────────────────────────────────────────────────────

fn resolve(name: &str, lookup: &dyn Fn(&str) -> Option<Value>) -> Result<Value, QueryError> {
    if let Some(value) = lookup(name) {
        return Ok(value);
    }
    let mut segments = name.split('.');
    let head = segments.next().unwrap_or(name);
    if head == name {
        return Err(QueryError::UnknownName(name.to_string()));
    }
    let mut value = lookup(head).ok_or_else(|| QueryError::UnknownName(name.to_string()))?;
    for segment in segments {
        value = match value {
            Value::Object(mut map) => map
                .remove(segment)
                .ok_or_else(|| QueryError::UnknownName(name.to_string()))?,
            _ => return Err(QueryError::UnknownName(name.to_string())),
        };
    }
    Ok(value)
}

fn eval(expr: &Expr, lookup: &dyn Fn(&str) -> Option<Value>) -> Result<Value, QueryError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Name(name) => resolve(name, lookup),
        Expr::List(items) => items
            .iter()
            .map(|item| eval(item, lookup))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Neg(inner) => match eval(inner, lookup)? {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::from(-i)),
                None => Ok(Value::from(-n.as_f64().unwrap_or(0.0))),
            },
            other => Err(QueryError::Type(format!("cannot negate {}", kind(&other)))),
        },
        Expr::Not(inner) => Ok(Value::Bool(!is_truthy(&eval(inner, lookup)?))),
        Expr::And(operands) => {
            let mut value = Value::Bool(true);
            for operand in operands {
                value = eval(operand, lookup)?;
                if !is_truthy(&value) {
                    break;
                }
            }
            Ok(value)
        }
        Expr::Or(operands) => {
            let mut value = Value::Bool(false);
            for operand in operands {
                value = eval(operand, lookup)?;
                if is_truthy(&value) {
                    break;
                }
            }
            Ok(value)
        }
        Expr::Compare(first, rest) => {
            let mut left = eval(first, lookup)?;
            for (op, operand) in rest {
                let right = eval(operand, lookup)?;
                if !compare(*op, &left, &right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
    }
}

/// A parsed query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    source: String,
    expr: Expr,
}

impl Query {
    pub fn parse(source: &str) -> Result<Self, QueryError> {
        let mut parser = Parser {
            tokens: tokenize(source)?,
            pos: 0,
            end: source.len(),
            depth: 0,
        };
        let expr = parser.parse_or()?;
        if parser.peek().is_some() {
            return Err(syntax(parser.position(), "unexpected trailing input"));
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against a namespace given as a lookup function.
    pub fn evaluate<F>(&self, lookup: F) -> Result<Value, QueryError>
    where
        F: Fn(&str) -> Option<Value>,
    {
        eval(&self.expr, &lookup)
    }

    /// Evaluate and apply truthiness.
    pub fn matches<F>(&self, lookup: F) -> Result<bool, QueryError>
    where
        F: Fn(&str) -> Option<Value>,
    {
        self.evaluate(lookup).map(|value| is_truthy(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn namespace(value: Value) -> impl Fn(&str) -> Option<Value> {
        move |name: &str| value.get(name).cloned()
    }

    fn check(query: &str, ns: Value) -> bool {
        Query::parse(query).unwrap().matches(namespace(ns)).unwrap()
    }

    #[test]
    fn test_comparisons() {
        let ns = json!({"price": 100, "name": "fred", "ratio": 0.5});
        assert!(check("price == 100", ns.clone()));
        assert!(check("price <= 100", ns.clone()));
        assert!(!check("price < 100", ns.clone()));
        assert!(check("price != 99", ns.clone()));
        assert!(check("name == 'fred'", ns.clone()));
        assert!(check("name > \"alice\"", ns.clone()));
        assert!(check("ratio < 1", ns.clone()));
        assert!(check("ratio == 0.5", ns));
    }

    #[test]
    fn test_chained_comparison() {
        assert!(check("0 < price < 200", json!({"price": 100})));
        assert!(!check("0 < price < 50", json!({"price": 100})));
    }

    #[test]
    fn test_boolean_operators_and_precedence() {
        let ns = json!({"a": 1, "b": 0});
        assert!(check("a and not b", ns.clone()));
        assert!(check("a && !b", ns.clone()));
        assert!(check("b or a", ns.clone()));
        assert!(check("b || a", ns.clone()));
        assert!(!check("b and a", ns.clone()));
        // `and` binds tighter than `or`
        assert!(check("a or b and b", ns.clone()));
        assert!(!check("(a or b) and b", ns));
    }

    #[test]
    fn test_membership() {
        let ns = json!({"name": "wilma", "tags": ["fast", "cheap"], "meta": {"x": 1}});
        assert!(check("name in ['fred', 'wilma']", ns.clone()));
        assert!(check("'fast' in tags", ns.clone()));
        assert!(check("'good' not in tags", ns.clone()));
        assert!(check("'il' in name", ns.clone()));
        assert!(check("'x' in meta", ns));
    }

    #[test]
    fn test_truthiness_of_bare_values() {
        let ns = json!({"empty": "", "zero": 0, "list": [], "none": null, "yes": true});
        assert!(!check("empty", ns.clone()));
        assert!(!check("zero", ns.clone()));
        assert!(!check("list", ns.clone()));
        assert!(!check("none", ns.clone()));
        assert!(check("yes", ns.clone()));
        assert!(check("none == None", ns.clone()));
        assert!(check("[1, 2]", ns));
    }

    #[test]
    fn test_literals() {
        let q = Query::parse("-1.5e1").unwrap();
        assert_eq!(q.evaluate(|_: &str| None).unwrap(), json!(-15.0));
        let q = Query::parse("[1, 'two', True, None,]").unwrap();
        assert_eq!(q.evaluate(|_: &str| None).unwrap(), json!([1, "two", true, null]));
        assert_eq!(q.source(), "[1, 'two', True, None,]");
    }

    #[test]
    fn test_dotted_names_reach_into_objects() {
        assert!(check("vendor.name == 'acme'", json!({"vendor": {"name": "acme"}})));
    }

    #[test]
    fn test_unknown_name_is_an_error() {
        let q = Query::parse("missing > 1").unwrap();
        assert_eq!(
            q.matches(|_: &str| None),
            Err(QueryError::UnknownName("missing".into()))
        );
    }

    #[test]
    fn test_incomparable_types_are_an_error() {
        let q = Query::parse("name < 3").unwrap();
        assert!(matches!(
            q.matches(namespace(json!({"name": "fred"}))),
            Err(QueryError::Type(_))
        ));
    }

    #[test]
    fn test_short_circuit_skips_bad_operand() {
        assert!(!check("False and missing", json!({})));
        assert!(check("True or missing", json!({})));
    }

    #[test]
    fn test_syntax_errors() {
        for bad in ["price <", "(a", "a b", "'open", "a = 1", "[1, 2"] {
            assert!(
                matches!(Query::parse(bad), Err(QueryError::Syntax { .. })),
                "{bad} should not parse"
            );
        }
    }

    #[test]
    fn test_compare_values_orders_mixed_numbers() {
        assert_eq!(compare_values(&json!(1), &json!(1.5)), Some(Ordering::Less));
        assert_eq!(compare_values(&json!("b"), &json!("a")), Some(Ordering::Greater));
        assert_eq!(compare_values(&json!([1, 2]), &json!([1, 3])), Some(Ordering::Less));
        assert_eq!(compare_values(&json!("a"), &json!(1)), None);
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}x", "not ".repeat(10_000));
        assert!(matches!(
            Query::parse(&deep),
            Err(QueryError::Syntax { ref message, .. }) if message == "query nested too deeply"
        ));
        for deep in [
            format!("{}1{}", "(".repeat(1_000), ")".repeat(1_000)),
            format!("{}1{}", "[".repeat(1_000), "]".repeat(1_000)),
            format!("{}1", "-".repeat(1_000)),
        ] {
            assert!(matches!(Query::parse(&deep), Err(QueryError::Syntax { .. })));
        }

        let shallow = format!("{}True", "not ".repeat(MAX_DEPTH));
        assert!(check(&shallow, json!({})));
    }

    #[test]
    fn test_long_boolean_chains_stay_flat() {
        let chain = vec!["x"; 10_000];
        assert!(check(&chain.join(" and "), json!({"x": 1})));
        assert!(!check(&chain.join(" or "), json!({"x": 0})));
        let q = Query::parse("0 or '' or 3 or 4").unwrap();
        assert_eq!(q.evaluate(|_: &str| None).unwrap(), json!(3));
        let q = Query::parse("1 and 0 and missing").unwrap();
        assert_eq!(q.evaluate(|_: &str| None).unwrap(), json!(0));
    }
}
