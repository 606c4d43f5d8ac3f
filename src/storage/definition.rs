//! Parser for the `CREATE TABLE` statements returned by `SHOW CREATE TABLE`.
//!
//! Grammar, keywords case-insensitive:
//!
//! ```text
//! create  := CREATE TABLE [IF NOT EXISTS] name '(' columns ')' ENGINE '=' ident [args] [clauses]
//! name    := ident ['.' ident]
//! args    := '(' arg {',' arg} ')'
//! clauses := (ORDER | PARTITION | PRIMARY | SAMPLE | TTL | SETTINGS | COMMENT) ...
//! ```
//!
//! Column definitions and clause bodies are skipped, not interpreted.

use std::ops::Range;
use thiserror::Error;

/// Keywords that open the trailing clauses of the modern engine syntax
const CLAUSE_KEYWORDS: [&str; 7] = [
    "ORDER",
    "PARTITION",
    "PRIMARY",
    "SAMPLE",
    "TTL",
    "SETTINGS",
    "COMMENT",
];

const MERGE_TREE: &str = "MergeTree";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("unexpected end of statement, expected {0}")]
    UnexpectedEnd(&'static str),

    #[error("expected {expected} at byte {offset}, found '{found}'")]
    Unexpected {
        expected: &'static str,
        found: String,
        offset: usize,
    },

    #[error("unterminated quote starting at byte {0}")]
    UnterminatedQuote(usize),

    #[error("engine {engine} has {count} positional parameters, expected 3 or 4")]
    EngineParams { engine: String, count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    /// Bare word; keywords, names and numbers alike
    Word(String),
    /// Backquoted or double-quoted identifier
    Quoted(String),
    Str,
    Punct(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    kind: TokenKind,
    span: Range<usize>,
}

fn tokenize(input: &str) -> Result<Vec<Token>, DefinitionError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '`' || c == '"' || c == '\'' {
            chars.next();
            let mut value = String::new();
            let mut end = None;
            while let Some((i, ch)) = chars.next() {
                match ch {
                    '\\' => {
                        if let Some((_, escaped)) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    ch if ch == c => {
                        end = Some(i + ch.len_utf8());
                        break;
                    }
                    ch => value.push(ch),
                }
            }
            let end = end.ok_or(DefinitionError::UnterminatedQuote(start))?;
            let kind = if c == '\'' {
                TokenKind::Str
            } else {
                TokenKind::Quoted(value)
            };
            tokens.push(Token {
                kind,
                span: start..end,
            });
            continue;
        }

        if c.is_alphanumeric() || c == '_' {
            let mut end = start;
            while let Some(&(i, ch)) = chars.peek() {
                if !(ch.is_alphanumeric() || ch == '_') {
                    break;
                }
                end = i + ch.len_utf8();
                chars.next();
            }
            tokens.push(Token {
                kind: TokenKind::Word(input[start..end].to_string()),
                span: start..end,
            });
            continue;
        }

        chars.next();
        tokens.push(Token {
            kind: TokenKind::Punct(c),
            span: start..start + c.len_utf8(),
        });
    }

    Ok(tokens)
}

/// Positional parameters of an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineParams {
    /// `Engine(date, [sampling,] keys, granularity)` without trailing clauses
    Legacy {
        date: String,
        sampling: Option<String>,
        keys: String,
        granularity: String,
    },
    /// Arguments as written, for the clause syntax (`Engine[(args)] ORDER BY ...`)
    /// and for engines outside the merge-tree family
    Generic { args: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Engine {
    pub name: String,
    pub params: EngineParams,
}

impl Engine {
    pub fn is_merge_tree_family(&self) -> bool {
        self.name.ends_with(MERGE_TREE)
    }

    /// Engines that collapse rows on merge, as opposed to the plain one
    pub fn deduplicates(&self) -> bool {
        self.is_merge_tree_family() && self.name != MERGE_TREE
    }
}

/// A parsed `CREATE TABLE` statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub database: Option<String>,
    pub table: String,
    pub engine: Engine,
    statement: String,
    name_span: Range<usize>,
}

impl TableDefinition {
    pub fn parse(statement: &str) -> Result<Self, DefinitionError> {
        let tokens = tokenize(statement)?;
        Parser {
            source: statement,
            tokens: &tokens,
            pos: 0,
        }
        .definition()
    }

    /// The same statement creating `qualified_name` instead
    pub fn renamed(&self, qualified_name: &str) -> String {
        let mut statement = self.statement.clone();
        statement.replace_range(self.name_span.clone(), qualified_name);
        statement
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }
}

struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self, expected: &'static str) -> Result<&'a Token, DefinitionError> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or(DefinitionError::UnexpectedEnd(expected))?;
        self.pos += 1;
        Ok(token)
    }

    fn unexpected(&self, expected: &'static str, token: &Token) -> DefinitionError {
        DefinitionError::Unexpected {
            expected,
            found: self.source[token.span.clone()].to_string(),
            offset: token.span.start,
        }
    }

    fn is_keyword(token: &Token, keyword: &str) -> bool {
        matches!(&token.kind, TokenKind::Word(w) if w.eq_ignore_ascii_case(keyword))
    }

    fn keyword(&mut self, keyword: &'static str) -> Result<(), DefinitionError> {
        let token = self.next(keyword)?;
        if Self::is_keyword(token, keyword) {
            Ok(())
        } else {
            Err(self.unexpected(keyword, token))
        }
    }

    fn punct(&mut self, expected: char, what: &'static str) -> Result<(), DefinitionError> {
        let token = self.next(what)?;
        if token.kind == TokenKind::Punct(expected) {
            Ok(())
        } else {
            Err(self.unexpected(what, token))
        }
    }

    fn ident(&mut self, what: &'static str) -> Result<(String, Range<usize>), DefinitionError> {
        let token = self.next(what)?;
        match &token.kind {
            TokenKind::Word(w) | TokenKind::Quoted(w) => Ok((w.clone(), token.span.clone())),
            _ => Err(self.unexpected(what, token)),
        }
    }

    fn peek_punct(&self, c: char) -> bool {
        self.peek().is_some_and(|t| t.kind == TokenKind::Punct(c))
    }

    /// Consume a parenthesized group, returning the source text of each
    /// top-level comma separated item. The opening paren must be next.
    fn group(&mut self, what: &'static str) -> Result<Vec<String>, DefinitionError> {
        self.punct('(', what)?;
        let mut depth = 1usize;
        let mut items = Vec::new();
        let mut item_start: Option<usize> = None;
        let mut item_end = 0usize;

        loop {
            let token = self.next("')'")?;
            match token.kind {
                TokenKind::Punct('(') => depth += 1,
                TokenKind::Punct(')') => {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(start) = item_start {
                            items.push(self.source[start..item_end].trim().to_string());
                        }
                        return Ok(items);
                    }
                }
                TokenKind::Punct(',') if depth == 1 => {
                    let start = item_start.take().ok_or_else(|| self.unexpected(what, token))?;
                    items.push(self.source[start..item_end].trim().to_string());
                    continue;
                }
                _ => {}
            }
            item_start.get_or_insert(token.span.start);
            item_end = token.span.end;
        }
    }

    fn definition(&mut self) -> Result<TableDefinition, DefinitionError> {
        self.keyword("CREATE")?;
        self.keyword("TABLE")?;
        if self.peek().is_some_and(|t| Self::is_keyword(t, "IF")) {
            self.keyword("IF")?;
            self.keyword("NOT")?;
            self.keyword("EXISTS")?;
        }

        let (first, first_span) = self.ident("table name")?;
        let (database, table, name_span) = if self.peek_punct('.') {
            self.pos += 1;
            let (table, table_span) = self.ident("table name")?;
            (Some(first), table, first_span.start..table_span.end)
        } else {
            (None, first, first_span)
        };

        self.group("column list")?;
        self.keyword("ENGINE")?;
        self.punct('=', "'='")?;
        let (engine_name, _) = self.ident("engine name")?;
        let args = if self.peek_punct('(') {
            self.group("engine parameters")?
        } else {
            Vec::new()
        };

        let params = match self.peek() {
            Some(token) if CLAUSE_KEYWORDS.iter().any(|k| Self::is_keyword(token, k)) => {
                EngineParams::Generic { args }
            }
            Some(token) => return Err(self.unexpected("engine clause", token)),
            None if engine_name.ends_with(MERGE_TREE) => legacy_params(&engine_name, args)?,
            None => EngineParams::Generic { args },
        };

        Ok(TableDefinition {
            database,
            table,
            engine: Engine {
                name: engine_name,
                params,
            },
            statement: self.source.to_string(),
            name_span,
        })
    }
}

fn legacy_params(engine: &str, args: Vec<String>) -> Result<EngineParams, DefinitionError> {
    let count = args.len();
    let mut args = args.into_iter();
    let mut take = || args.next().unwrap_or_default();
    match count {
        3 => Ok(EngineParams::Legacy {
            date: take(),
            sampling: None,
            keys: take(),
            granularity: take(),
        }),
        4 => Ok(EngineParams::Legacy {
            date: take(),
            sampling: Some(take()),
            keys: take(),
            granularity: take(),
        }),
        _ => Err(DefinitionError::EngineParams {
            engine: engine.to_string(),
            count,
        }),
    }
}
