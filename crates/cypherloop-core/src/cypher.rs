//! Lossless lexical scan of Cypher text.
//!
//! Concatenating the `text` of every token reproduces the input exactly, so rewrite
//! passes can splice new text in without disturbing whitespace or comments.

use std::iter::Peekable;
use std::ops::Range;
use std::str::CharIndices;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Whitespace,
    LineComment,
    BlockComment,
    Ident,
    /// Backtick-quoted identifier.
    QuotedIdent,
    StringLit { terminated: bool },
    Number,
    Parameter,
    Punct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub start: usize,
}

impl<'a> Token<'a> {
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    pub fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Whitespace | TokenKind::LineComment | TokenKind::BlockComment
        )
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Ident && self.text.eq_ignore_ascii_case(keyword)
    }

    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct && self.text.chars().eq(std::iter::once(c))
    }

    pub fn is_string(&self) -> bool {
        matches!(self.kind, TokenKind::StringLit { .. })
    }

    pub fn is_identifier(&self) -> bool {
        matches!(self.kind, TokenKind::Ident | TokenKind::QuotedIdent)
    }

    /// Identifier text without backticks.
    pub fn name(&self) -> &'a str {
        match self.kind {
            TokenKind::QuotedIdent => self.text.trim_matches('`'),
            _ => self.text,
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn consume_while(chars: &mut Peekable<CharIndices<'_>>, predicate: impl Fn(char) -> bool) {
    while let Some(&(_, c)) = chars.peek() {
        if !predicate(c) {
            break;
        }
        chars.next();
    }
}

fn offset(chars: &mut Peekable<CharIndices<'_>>, input: &str) -> usize {
    chars.peek().map(|&(i, _)| i).unwrap_or(input.len())
}

pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        let rest = &input[start..];
        let kind = if c.is_whitespace() {
            consume_while(&mut chars, char::is_whitespace);
            TokenKind::Whitespace
        } else if rest.starts_with("//") {
            consume_while(&mut chars, |c| c != '\n');
            TokenKind::LineComment
        } else if rest.starts_with("/*") {
            let end = rest[2..]
                .find("*/")
                .map(|i| start + 2 + i + 2)
                .unwrap_or(input.len());
            while offset(&mut chars, input) < end {
                chars.next();
            }
            TokenKind::BlockComment
        } else if c == '\'' || c == '"' {
            chars.next();
            let mut terminated = false;
            while let Some((_, ch)) = chars.next() {
                if ch == '\\' {
                    chars.next();
                } else if ch == c {
                    terminated = true;
                    break;
                }
            }
            TokenKind::StringLit { terminated }
        } else if c == '`' {
            chars.next();
            for (_, ch) in chars.by_ref() {
                if ch == '`' {
                    break;
                }
            }
            TokenKind::QuotedIdent
        } else if c.is_ascii_digit() {
            consume_while(&mut chars, |c| c.is_ascii_digit());
            let here = offset(&mut chars, input);
            let mut tail = input[here..].chars();
            if tail.next() == Some('.') && tail.next().is_some_and(|d| d.is_ascii_digit()) {
                chars.next();
                consume_while(&mut chars, |c| c.is_ascii_digit());
            }
            consume_while(&mut chars, |c| c.is_ascii_alphanumeric() || c == '_');
            TokenKind::Number
        } else if c == '$' && rest[1..].chars().next().is_some_and(is_ident_char) {
            chars.next();
            consume_while(&mut chars, is_ident_char);
            TokenKind::Parameter
        } else if is_ident_start(c) {
            consume_while(&mut chars, is_ident_char);
            TokenKind::Ident
        } else {
            chars.next();
            TokenKind::Punct
        };

        let end = offset(&mut chars, input);
        tokens.push(Token {
            kind,
            text: &input[start..end],
            start,
        });
    }

    tokens
}

pub fn next_significant(tokens: &[Token<'_>], index: usize) -> Option<usize> {
    (index + 1..tokens.len()).find(|&i| !tokens[i].is_trivia())
}

pub fn prev_significant(tokens: &[Token<'_>], index: usize) -> Option<usize> {
    (0..index).rev().find(|&i| !tokens[i].is_trivia())
}

/// Nesting change contributed by a bracket token.
pub fn depth_delta(token: &Token<'_>) -> i32 {
    if token.kind != TokenKind::Punct {
        return 0;
    }
    match token.text {
        "(" | "[" | "{" => 1,
        ")" | "]" | "}" => -1,
        _ => 0,
    }
}

/// Token span of the projection that follows the last top-level RETURN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnClause {
    /// Index of the RETURN keyword itself.
    pub keyword: usize,
    /// Projection items, excluding any ORDER BY / SKIP / LIMIT suffix.
    pub items: Range<usize>,
}

pub fn final_return_clause(tokens: &[Token<'_>]) -> Option<ReturnClause> {
    let mut depth = 0;
    let mut keyword = None;
    for (i, token) in tokens.iter().enumerate() {
        depth = (depth + depth_delta(token)).max(0);
        if depth == 0 && token.is_keyword("RETURN") {
            keyword = Some(i);
        }
    }
    let keyword = keyword?;

    let mut depth = 0;
    let mut end = tokens.len();
    for i in keyword + 1..tokens.len() {
        let token = &tokens[i];
        depth = (depth + depth_delta(token)).max(0);
        if depth != 0 {
            continue;
        }
        let ends_projection = token.is_punct(';')
            || token.is_keyword("SKIP")
            || token.is_keyword("LIMIT")
            || token.is_keyword("OFFSET")
            || (token.is_keyword("ORDER")
                && next_significant(tokens, i).is_some_and(|n| tokens[n].is_keyword("BY")));
        if ends_projection {
            end = i;
            break;
        }
    }

    Some(ReturnClause {
        keyword,
        items: keyword + 1..end,
    })
}

/// Column names the database reports for the final RETURN clause: the alias when one
/// is given, otherwise the expression text. Empty when the projection is `*`.
pub fn return_columns(query: &str) -> Vec<String> {
    let tokens = tokenize(query);
    let Some(clause) = final_return_clause(&tokens) else {
        return Vec::new();
    };

    let mut items = Vec::new();
    let mut depth = 0;
    let mut item_start = clause.items.start;
    for i in clause.items.clone() {
        depth += depth_delta(&tokens[i]);
        if depth == 0 && tokens[i].is_punct(',') {
            items.push(item_start..i);
            item_start = i + 1;
        }
    }
    items.push(item_start..clause.items.end);

    let mut columns = Vec::new();
    for (n, mut range) in items.into_iter().enumerate() {
        if n == 0 {
            if let Some(first) = (range.start..range.end).find(|&i| !tokens[i].is_trivia()) {
                if tokens[first].is_keyword("DISTINCT") {
                    range.start = first + 1;
                }
            }
        }

        let mut depth = 0;
        let mut alias = None;
        for i in range.clone() {
            depth += depth_delta(&tokens[i]);
            if depth == 0 && tokens[i].is_keyword("AS") {
                alias = next_significant(&tokens, i)
                    .filter(|&a| a < range.end && tokens[a].is_identifier())
                    .map(|a| tokens[a].name().to_string());
            }
        }

        let column = match alias {
            Some(alias) => alias,
            None => tokens[range]
                .iter()
                .filter(|t| !matches!(t.kind, TokenKind::LineComment | TokenKind::BlockComment))
                .map(|t| t.text)
                .collect::<String>()
                .trim()
                .to_string(),
        };
        if column == "*" {
            return Vec::new();
        }
        if !column.is_empty() {
            columns.push(column);
        }
    }
    columns
}

const WRITE_CLAUSES: &[&str] = &[
    "CREATE", "MERGE", "DELETE", "DETACH", "SET", "REMOVE", "DROP", "FOREACH",
];

/// First clause keyword that would mutate the graph, if any.
pub fn write_clause(query: &str) -> Option<String> {
    let tokens = tokenize(query);
    for (i, token) in tokens.iter().enumerate() {
        if token.kind != TokenKind::Ident {
            continue;
        }
        let after_accessor = prev_significant(&tokens, i)
            .is_some_and(|p| tokens[p].is_punct('.') || tokens[p].is_punct(':'));
        let map_key = next_significant(&tokens, i).is_some_and(|n| tokens[n].is_punct(':'));
        if after_accessor || map_key {
            continue;
        }
        if let Some(clause) = WRITE_CLAUSES.iter().find(|kw| token.is_keyword(kw)) {
            return Some(clause.to_string());
        }
        if token.is_keyword("LOAD")
            && next_significant(&tokens, i).is_some_and(|n| tokens[n].is_keyword("CSV"))
        {
            return Some("LOAD CSV".to_string());
        }
    }
    None
}

/// True when a LIMIT clause with an argument applies to the outer query. The
/// argument is usually a number or parameter but any expression counts. A LIMIT
/// inside a closed `{ ... }` subquery belongs to that subquery and is ignored.
pub fn has_limit(tokens: &[Token<'_>]) -> bool {
    let enclosed = braced(tokens);
    tokens.iter().enumerate().any(|(i, token)| {
        let is_clause = token.is_keyword("LIMIT")
            && !enclosed[i]
            && !prev_significant(tokens, i)
                .is_some_and(|p| tokens[p].is_punct('.') || tokens[p].is_punct(':'));
        is_clause
            && next_significant(tokens, i).is_some_and(|n| {
                let arg = &tokens[n];
                ![';', ')', '}', ',', ':', '.'].iter().any(|&c| arg.is_punct(c))
            })
    })
}

/// Marks tokens that sit between a matched `{` and `}` pair.
fn braced(tokens: &[Token<'_>]) -> Vec<bool> {
    let mut enclosed = vec![false; tokens.len()];
    let mut open = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        if token.is_punct('{') {
            open.push(i);
        } else if token.is_punct('}') {
            if let Some(start) = open.pop() {
                enclosed[start + 1..i].iter_mut().for_each(|slot| *slot = true);
            }
        }
    }
    enclosed
}

/// Folds a query onto one line: comments dropped, whitespace runs outside string
/// literals collapsed to a single space.
pub fn single_line(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    for token in tokenize(query) {
        if token.is_trivia() {
            if !out.is_empty() && !out.ends_with(' ') {
                out.push(' ');
            }
        } else {
            out.push_str(token.text);
        }
    }
    out.trim_end().to_string()
}
