//! # Lexer
//!
//! Scans UTF-8 source text one code point at a time with one-char lookahead,
//! emitting a flat token stream with line/column for every token. Mirrors
//! the teacher's comment-stripping approach in `parser/mod.rs` (track string
//! state so delimiters inside strings are never mistaken for syntax) but
//! produces a real token stream with positions instead of pre-processed
//! source lines, since the parser needs precise locations for its errors.

use crate::error::VagueError;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(String),
    Identifier(String),
    Number(String),
    Str(String),
    Operator(String),
    Newline,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}

const BUILTIN_KEYWORDS: &[&str] = &[
    "schema", "dataset", "assume", "if", "in", "of", "any", "where", "with", "per", "from",
    "import", "let", "unique", "private", "when", "then", "refine", "context", "distribution",
    "validate", "violating", "match", "and", "or", "not", "true", "false", "null", "int",
    "decimal", "date",
];

/// Keyword extensions registered by plugins. Built-ins always win a clash,
/// matching spec §4.2's "built-in keywords always take precedence".
#[derive(Debug, Default, Clone)]
pub struct KeywordTable {
    extra: HashSet<String>,
}

impl KeywordTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` (rejected) if `word` shadows a built-in keyword.
    pub fn register(&mut self, word: &str) -> bool {
        if BUILTIN_KEYWORDS.contains(&word) {
            return false;
        }
        self.extra.insert(word.to_string());
        true
    }

    fn is_keyword(&self, word: &str) -> bool {
        BUILTIN_KEYWORDS.contains(&word) || self.extra.contains(word)
    }
}

pub struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    keywords: &'a KeywordTable,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &str, keywords: &'a KeywordTable) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            keywords,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, VagueError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let done = tok.is_eof();
            tokens.push(tok);
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn err(&self, line: usize, column: usize, message: impl Into<String>) -> VagueError {
        VagueError::LexError {
            line,
            column,
            message: message.into(),
        }
    }

    fn next_token(&mut self) -> Result<Token, VagueError> {
        self.skip_insignificant_whitespace_and_comments();

        let line = self.line;
        let column = self.column;

        let Some(c) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                line,
                column,
            });
        };

        if c == '\n' {
            self.advance();
            return Ok(Token {
                kind: TokenKind::Newline,
                lexeme: "\n".to_string(),
                line,
                column,
            });
        }

        if c.is_alphabetic() || c == '_' {
            return Ok(self.scan_identifier_or_keyword(line, column));
        }

        if c.is_ascii_digit() {
            return Ok(self.scan_number(line, column));
        }

        if c == '"' {
            return self.scan_string(line, column);
        }

        self.scan_operator(line, column)
    }

    fn skip_insignificant_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c == ' ' || c == '\t' || c == '\r' => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_identifier_or_keyword(&mut self, line: usize, column: usize) -> Token {
        let mut lexeme = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                lexeme.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let kind = if self.keywords.is_keyword(&lexeme) {
            TokenKind::Keyword(lexeme.clone())
        } else {
            TokenKind::Identifier(lexeme.clone())
        };
        Token {
            kind,
            lexeme,
            line,
            column,
        }
    }

    fn scan_number(&mut self, line: usize, column: usize) -> Token {
        let mut raw = String::new();
        let mut lexeme = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                raw.push(c);
                lexeme.push(c);
                self.advance();
            } else if c == '_' {
                // Thousands separators are stripped from the numeric value
                // but kept in the raw lexeme for error messages.
                lexeme.push(c);
                self.advance();
            } else {
                break;
            }
        }
        // Fractional part, but don't consume `..` (range operator).
        if self.peek() == Some('.') && self.peek_at(1) != Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            raw.push('.');
            lexeme.push('.');
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    raw.push(c);
                    lexeme.push(c);
                    self.advance();
                } else if c == '_' {
                    lexeme.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }
        Token {
            kind: TokenKind::Number(raw),
            lexeme,
            line,
            column,
        }
    }

    fn scan_string(&mut self, line: usize, column: usize) -> Result<Token, VagueError> {
        self.advance(); // opening quote
        let mut value = String::new();
        let mut lexeme = String::from("\"");
        loop {
            match self.peek() {
                None => {
                    return Err(self.err(line, column, "unterminated string"));
                }
                Some('"') => {
                    self.advance();
                    lexeme.push('"');
                    break;
                }
                Some('\\') => {
                    self.advance();
                    lexeme.push('\\');
                    match self.advance() {
                        Some('n') => {
                            value.push('\n');
                            lexeme.push('n');
                        }
                        Some('t') => {
                            value.push('\t');
                            lexeme.push('t');
                        }
                        Some('\\') => {
                            value.push('\\');
                            lexeme.push('\\');
                        }
                        Some('"') => {
                            value.push('"');
                            lexeme.push('"');
                        }
                        Some(other) => {
                            // Unknown escapes pass through unchanged.
                            value.push('\\');
                            value.push(other);
                            lexeme.push(other);
                        }
                        None => return Err(self.err(line, column, "unterminated string")),
                    }
                }
                Some(c) => {
                    value.push(c);
                    lexeme.push(c);
                    self.advance();
                }
            }
        }
        Ok(Token {
            kind: TokenKind::Str(value),
            lexeme,
            line,
            column,
        })
    }

    fn scan_operator(&mut self, line: usize, column: usize) -> Result<Token, VagueError> {
        const TWO_CHAR: &[&str] = &["..", "=>", "==", "+=", "<=", ">="];
        const ONE_CHAR: &str = "|~:=+-*/.^%<>?,(){}[]";

        if let (Some(a), Some(b)) = (self.peek(), self.peek_at(1)) {
            let candidate: String = [a, b].iter().collect();
            if TWO_CHAR.contains(&candidate.as_str()) {
                self.advance();
                self.advance();
                return Ok(Token {
                    kind: TokenKind::Operator(candidate.clone()),
                    lexeme: candidate,
                    line,
                    column,
                });
            }
        }

        let c = self.peek().expect("checked by caller");
        if ONE_CHAR.contains(c) {
            self.advance();
            let lexeme = c.to_string();
            return Ok(Token {
                kind: TokenKind::Operator(lexeme.clone()),
                lexeme,
                line,
                column,
            });
        }

        self.advance();
        Err(self.err(line, column, format!("unexpected character '{c}' at line {line}, column {column}")))
    }
}

pub fn tokenize(source: &str, keywords: &KeywordTable) -> Result<Vec<Token>, VagueError> {
    Lexer::new(source, keywords).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let table = KeywordTable::new();
        tokenize(src, &table)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_schema_header() {
        let kinds = kinds("schema P {\n");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Keyword("schema".into()),
                TokenKind::Identifier("P".into()),
                TokenKind::Operator("{".into()),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn strips_thousands_separators_in_raw_number() {
        let table = KeywordTable::new();
        let tokens = tokenize("1_000", &table).unwrap();
        match &tokens[0].kind {
            TokenKind::Number(raw) => assert_eq!(raw, "1000"),
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn longest_match_operator() {
        let kinds = kinds("a <= b");
        assert!(kinds.contains(&TokenKind::Operator("<=".into())));
    }

    #[test]
    fn rejects_at_sign() {
        let table = KeywordTable::new();
        let err = tokenize("@foo", &table).unwrap_err();
        assert!(matches!(err, VagueError::LexError { .. }));
    }

    #[test]
    fn unterminated_string_is_fatal() {
        let table = KeywordTable::new();
        let err = tokenize("\"abc", &table).unwrap_err();
        assert!(matches!(err, VagueError::LexError { .. }));
    }
}
