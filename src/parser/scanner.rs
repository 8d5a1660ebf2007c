//! Finite-state scanner turning raw template text into a flat token sequence
//!
//! Delimiters can change mid-stream (`{{=<% %>=}}`), which rules out a
//! static lexer: the scanner walks the bytes once with one byte of
//! lookahead and never backtracks.

use crate::error::SyntaxError;
use crate::parser::ast::{Delimiters, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Outside any tag, buffering literal text
    Text,
    /// Just matched an opening delimiter; the next byte decides the tag kind
    TagType,
    /// Inside a tag, looking for the closing delimiter
    Tag,
}

/// Scan template source into tokens.
///
/// `delimiters` overrides the initial `{{ }}` pair. Pragma tokens are
/// hoisted to the front of the result.
pub fn scan(text: &str, delimiters: Option<&Delimiters>) -> Result<Vec<Token>, SyntaxError> {
    let delimiters = delimiters.cloned().unwrap_or_default();
    if !delimiters.is_valid() {
        return Err(SyntaxError::new(
            format!("invalid delimiters `{}`", delimiters),
            0,
            0..0,
        ));
    }
    Scanner::new(text, delimiters).run()
}

struct Scanner<'s> {
    text: &'s str,
    state: State,
    kind: TokenKind,
    sigil: Option<u8>,
    delimiters: Delimiters,
    tokens: Vec<Token>,
    pragmas: Vec<Token>,
    line: usize,
    text_start: usize,
    tag_start: usize,
    name_start: usize,
}

impl<'s> Scanner<'s> {
    fn new(text: &'s str, delimiters: Delimiters) -> Self {
        Self {
            text,
            state: State::Text,
            kind: TokenKind::Text,
            sigil: None,
            delimiters,
            tokens: Vec::new(),
            pragmas: Vec::new(),
            line: 0,
            text_start: 0,
            tag_start: 0,
            name_start: 0,
        }
    }

    fn run(mut self) -> Result<Vec<Token>, SyntaxError> {
        let bytes = self.text.as_bytes();
        let mut i = 0;

        while i < bytes.len() {
            match self.state {
                State::Text => {
                    if self.matches_at(i, &self.delimiters.open) {
                        self.flush_text(i);
                        self.tag_start = i;
                        self.state = State::TagType;
                    } else {
                        if bytes[i] == b'\n' {
                            self.flush_text(i + 1);
                            self.line += 1;
                        }
                        i += 1;
                    }
                }
                State::TagType => {
                    let after = i + self.delimiters.open.len();
                    let sigil = bytes.get(after).copied();
                    match sigil.and_then(TokenKind::from_sigil) {
                        Some(TokenKind::DelimiterChange) => {
                            i = self.change_delimiters(after + 1)?;
                            self.enter_text(i);
                        }
                        Some(TokenKind::Pragma) => {
                            i = self.add_pragma(after + 1)?;
                            self.enter_text(i);
                        }
                        Some(kind) => {
                            self.kind = kind;
                            self.sigil = sigil;
                            i = after + 1;
                            self.name_start = i;
                            self.state = State::Tag;
                        }
                        None => {
                            self.kind = TokenKind::Escaped;
                            self.sigil = None;
                            i = after;
                            self.name_start = i;
                            self.state = State::Tag;
                        }
                    }
                }
                State::Tag => {
                    if self.matches_at(i, &self.delimiters.close) {
                        i = self.close_tag(i);
                        self.enter_text(i);
                    } else {
                        i += 1;
                    }
                }
            }
        }

        if self.state != State::Text {
            return Err(SyntaxError::new(
                "unclosed tag",
                self.line,
                self.tag_start..self.text.len(),
            ));
        }
        self.flush_text(self.text.len());

        let mut tokens = self.pragmas;
        tokens.append(&mut self.tokens);
        Ok(tokens)
    }

    /// Emit the tag ending at the closing delimiter found at `close_at`.
    /// Returns the index just past the tag.
    fn close_tag(&mut self, close_at: usize) -> usize {
        let mut end = close_at + self.delimiters.close.len();
        let mut name = self.text[self.name_start..close_at].trim().to_string();

        // `{{{name}}}`: the third brace is either the next byte (default
        // delimiters) or was captured into the name (custom delimiters)
        if self.sigil == Some(b'{') {
            if self.delimiters.close == "}}" {
                if self.text.as_bytes().get(end) == Some(&b'}') {
                    end += 1;
                }
            } else if let Some(stripped) = name.strip_suffix('}') {
                name = stripped.trim_end().to_string();
            }
        }

        let line = self.line;
        self.advance_lines(end);
        self.tokens.push(Token {
            kind: self.kind,
            value: name,
            line,
            end_line: self.line,
            span: self.tag_start..end,
            delimiters: self.delimiters.clone(),
        });
        end
    }

    /// Handle `{{=NO NC=}}` whose body starts at `start`
    fn change_delimiters(&mut self, start: usize) -> Result<usize, SyntaxError> {
        let marker = format!("={}", self.delimiters.close);
        let close_at = self.text[start..]
            .find(&marker)
            .map(|offset| start + offset)
            .ok_or_else(|| {
                SyntaxError::new(
                    "unclosed delimiter change tag",
                    self.line,
                    self.tag_start..self.text.len(),
                )
            })?;
        let end = close_at + marker.len();

        let text = self.text;
        let pair = text[start..close_at].trim();
        let delimiters = Delimiters::parse(pair).ok_or_else(|| {
            SyntaxError::new(
                format!("invalid delimiter change `{}`", pair),
                self.line,
                self.tag_start..end,
            )
        })?;

        let line = self.line;
        self.advance_lines(end);
        self.tokens.push(Token {
            kind: TokenKind::DelimiterChange,
            value: pair.to_string(),
            line,
            end_line: self.line,
            span: self.tag_start..end,
            delimiters: self.delimiters.clone(),
        });
        self.delimiters = delimiters;
        Ok(end)
    }

    /// Handle `{{%PRAGMA}}` whose body starts at `start`
    fn add_pragma(&mut self, start: usize) -> Result<usize, SyntaxError> {
        let close_at = self.text[start..]
            .find(&self.delimiters.close)
            .map(|offset| start + offset)
            .ok_or_else(|| {
                SyntaxError::new(
                    "unclosed pragma tag",
                    self.line,
                    self.tag_start..self.text.len(),
                )
            })?;
        let end = close_at + self.delimiters.close.len();

        let line = self.line;
        self.advance_lines(end);
        self.pragmas.push(Token {
            kind: TokenKind::Pragma,
            value: self.text[start..close_at].trim().to_string(),
            line,
            end_line: self.line,
            span: self.tag_start..end,
            delimiters: self.delimiters.clone(),
        });
        Ok(end)
    }

    fn enter_text(&mut self, at: usize) {
        self.state = State::Text;
        self.text_start = at;
    }

    fn flush_text(&mut self, end: usize) {
        if end > self.text_start {
            self.tokens.push(Token {
                kind: TokenKind::Text,
                value: self.text[self.text_start..end].to_string(),
                line: self.line,
                end_line: self.line,
                span: self.text_start..end,
                delimiters: self.delimiters.clone(),
            });
        }
        self.text_start = end;
    }

    /// Account for newlines inside a tag spanning `tag_start..end`
    fn advance_lines(&mut self, end: usize) {
        self.line += self.text[self.tag_start..end].matches('\n').count();
    }

    fn matches_at(&self, index: usize, delimiter: &str) -> bool {
        self.text.as_bytes()[index..].starts_with(delimiter.as_bytes())
    }
}
