//! Search string parsing
//!
//! Whitespace joins terms with AND; `or` and `and` are keywords, `-` negates
//! the term or group that follows it, and parentheses group. Double quotes
//! keep spaces inside a term, either around the whole term or around the
//! value after its `key:` prefix.

use crate::errors::{SchedError, SchedResult};
use crate::models::{CardId, NoteId};

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Matches every card; what an empty search parses to
    All,
    And(Vec<Node>),
    Or(Vec<Node>),
    Not(Box<Node>),
    Term(SearchTerm),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    New,
    Learn,
    Review,
    Due,
    Suspended,
    Buried,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    Interval,
    Due,
    Reps,
    Lapses,
    Ease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Equal,
    NotEqual,
}

impl Comparison {
    pub fn holds(self, left: f64, right: f64) -> bool {
        match self {
            Comparison::Less => left < right,
            Comparison::LessOrEqual => left <= right,
            Comparison::Greater => left > right,
            Comparison::GreaterOrEqual => left >= right,
            Comparison::Equal => left == right,
            Comparison::NotEqual => left != right,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchTerm {
    /// Case-insensitive substring of any field; `*` matches anything
    Text(String),
    Deck(String),
    Tag(String),
    State(StateKind),
    /// Zero-based template ordinal
    Template(u32),
    NoteIds(Vec<NoteId>),
    CardIds(Vec<CardId>),
    Prop { prop: Property, op: Comparison, value: f64 },
    /// Notes whose field at `field` (zero-based) equals `value`
    Dupe { field: usize, value: String },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Negate,
    Word { text: String, quoted: bool },
}

fn invalid(msg: impl Into<String>) -> SchedError {
    SchedError::InvalidSearch(msg.into())
}

fn tokenize(input: &str) -> SchedResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '-' => {
                chars.next();
                match chars.peek() {
                    Some(next) if !next.is_whitespace() && *next != ')' => tokens.push(Token::Negate),
                    _ => tokens.push(Token::Word { text: "-".to_string(), quoted: false }),
                }
            }
            _ => {
                let mut text = String::new();
                let mut quoted = false;
                let mut in_quotes = false;
                while let Some(&c) = chars.peek() {
                    if c == '"' {
                        in_quotes = !in_quotes;
                        quoted = true;
                        chars.next();
                        continue;
                    }
                    if !in_quotes && (c.is_whitespace() || c == '(' || c == ')') {
                        break;
                    }
                    text.push(c);
                    chars.next();
                }
                if in_quotes {
                    return Err(invalid(format!("unterminated quote in '{}'", input)));
                }
                tokens.push(Token::Word { text, quoted });
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word { text, quoted: false }) if text.eq_ignore_ascii_case(keyword))
    }

    fn parse_or(&mut self) -> SchedResult<Node> {
        let mut branches = vec![self.parse_and()?];
        while self.at_keyword("or") {
            self.pos += 1;
            branches.push(self.parse_and()?);
        }
        Ok(if branches.len() == 1 { branches.remove(0) } else { Node::Or(branches) })
    }

    fn parse_and(&mut self) -> SchedResult<Node> {
        let mut parts = Vec::new();
        loop {
            if self.at_keyword("or") || matches!(self.peek(), None | Some(Token::Close)) {
                break;
            }
            if self.at_keyword("and") {
                self.pos += 1;
                continue;
            }
            parts.push(self.parse_unary()?);
        }
        match parts.len() {
            0 => Err(invalid("expected a search term")),
            1 => Ok(parts.remove(0)),
            _ => Ok(Node::And(parts)),
        }
    }

    fn parse_unary(&mut self) -> SchedResult<Node> {
        match self.next() {
            Some(Token::Negate) => Ok(Node::Not(Box::new(self.parse_unary()?))),
            Some(Token::Open) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err(invalid("missing closing parenthesis")),
                }
            }
            Some(Token::Word { text, .. }) => Ok(Node::Term(parse_term(&text)?)),
            Some(Token::Close) => Err(invalid("unexpected closing parenthesis")),
            None => Err(invalid("search ends after '-'")),
        }
    }
}

/// Parses a search string
///
/// ### Errors
///
/// Returns `InvalidSearch` for unbalanced parentheses or quotes, dangling
/// operators, and malformed `key:value` terms
pub fn parse(input: &str) -> SchedResult<Node> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Ok(Node::All);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let node = parser.parse_or()?;
    if parser.pos < parser.tokens.len() {
        return Err(invalid("unexpected closing parenthesis"));
    }
    Ok(node)
}

fn parse_ids(value: &str) -> SchedResult<Vec<i64>> {
    value
        .split(',')
        .map(|part| part.trim().parse::<i64>().map_err(|_| invalid(format!("invalid id '{}'", part))))
        .collect()
}

fn parse_term(text: &str) -> SchedResult<SearchTerm> {
    let Some((key, value)) = text.split_once(':') else {
        return Ok(SearchTerm::Text(text.to_string()));
    };
    match key.to_ascii_lowercase().as_str() {
        "deck" => Ok(SearchTerm::Deck(value.to_string())),
        "tag" => Ok(SearchTerm::Tag(value.to_string())),
        "is" => {
            let state = match value.to_ascii_lowercase().as_str() {
                "new" => StateKind::New,
                "learn" => StateKind::Learn,
                "review" => StateKind::Review,
                "due" => StateKind::Due,
                "suspended" => StateKind::Suspended,
                "buried" => StateKind::Buried,
                other => return Err(invalid(format!("unknown state 'is:{}'", other))),
            };
            Ok(SearchTerm::State(state))
        }
        "card" => match value.parse::<u32>() {
            Ok(n) if n >= 1 => Ok(SearchTerm::Template(n - 1)),
            _ => Err(invalid(format!("invalid template number '{}'", value))),
        },
        "nid" => Ok(SearchTerm::NoteIds(parse_ids(value)?)),
        "cid" => Ok(SearchTerm::CardIds(parse_ids(value)?)),
        "prop" => parse_prop(value),
        "dupe" => {
            let (field, value) = value
                .split_once(',')
                .ok_or_else(|| invalid(format!("dupe needs FIELD,VALUE: '{}'", value)))?;
            let field = field
                .trim()
                .parse::<usize>()
                .map_err(|_| invalid(format!("invalid field index '{}'", field)))?;
            Ok(SearchTerm::Dupe { field, value: value.to_string() })
        }
        _ => Ok(SearchTerm::Text(text.to_string())),
    }
}

fn parse_prop(value: &str) -> SchedResult<SearchTerm> {
    let start = value
        .find(|c| matches!(c, '<' | '>' | '=' | '!'))
        .ok_or_else(|| invalid(format!("prop needs a comparison: '{}'", value)))?;
    let (name, rest) = value.split_at(start);
    let (op, number) = [
        ("<=", Comparison::LessOrEqual),
        (">=", Comparison::GreaterOrEqual),
        ("!=", Comparison::NotEqual),
        ("<", Comparison::Less),
        (">", Comparison::Greater),
        ("=", Comparison::Equal),
    ]
    .iter()
    .find_map(|(symbol, op)| rest.strip_prefix(symbol).map(|number| (*op, number)))
    .ok_or_else(|| invalid(format!("invalid comparison in '{}'", value)))?;
    let prop = match name.to_ascii_lowercase().as_str() {
        "ivl" => Property::Interval,
        "due" => Property::Due,
        "reps" => Property::Reps,
        "lapses" => Property::Lapses,
        "ease" => Property::Ease,
        other => return Err(invalid(format!("unknown property '{}'", other))),
    };
    let value = number
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(format!("invalid number '{}'", number)))?;
    Ok(SearchTerm::Prop { prop, op, value })
}
