//! Token and parse tree types for the template language

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use crate::error::Span;

/// Pragma enabling `name|filter|filter` chains in variable tags
pub const PRAGMA_FILTERS: &str = "FILTERS";

/// Opening/closing tag delimiter pair in effect for a token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Delimiters {
    pub open: String,
    pub close: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            open: "{{".to_string(),
            close: "}}".to_string(),
        }
    }
}

impl Delimiters {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }

    /// Parse a `"OPEN CLOSE"` pair, as written inside a `{{= =}}` tag
    pub fn parse(pair: &str) -> Option<Self> {
        let mut parts = pair.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(open), Some(close), None) => Some(Self::new(open, close)),
            _ => None,
        }
    }

    /// Neither delimiter may be empty or contain whitespace
    pub fn is_valid(&self) -> bool {
        let usable = |d: &str| !d.is_empty() && !d.contains(char::is_whitespace);
        usable(&self.open) && usable(&self.close)
    }

    pub fn is_default(&self) -> bool {
        self.open == "{{" && self.close == "}}"
    }

    /// The `{{= OPEN CLOSE =}}` tag that switches default delimiters to this pair
    pub fn change_tag(&self) -> String {
        format!("{{{{= {} {} =}}}}", self.open, self.close)
    }
}

impl fmt::Display for Delimiters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.open, self.close)
    }
}

/// Token kinds, one per tag sigil plus raw text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// `{{#name}}`
    Section,
    /// `{{^name}}`
    Inverted,
    /// `{{/name}}`
    EndSection,
    /// `{{!...}}`
    Comment,
    /// `{{>name}}` or `{{<name}}`
    Partial,
    /// `{{=<% %>=}}`
    DelimiterChange,
    /// `{{name}}`
    Escaped,
    /// `{{{name}}}` or `{{&name}}`
    Unescaped,
    /// `{{%PRAGMA}}`
    Pragma,
    /// Literal text between tags
    Text,
}

impl TokenKind {
    /// Map the character following an opening delimiter to a tag kind
    pub fn from_sigil(sigil: u8) -> Option<Self> {
        match sigil {
            b'#' => Some(Self::Section),
            b'^' => Some(Self::Inverted),
            b'/' => Some(Self::EndSection),
            b'!' => Some(Self::Comment),
            b'>' | b'<' => Some(Self::Partial),
            b'=' => Some(Self::DelimiterChange),
            b'{' | b'&' => Some(Self::Unescaped),
            b'%' => Some(Self::Pragma),
            _ => None,
        }
    }
}

/// A scanned token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Tag name for tags, literal content for text
    pub value: String,
    /// 0-based line where the token begins
    pub line: usize,
    /// 0-based line where the token ends; differs from `line` for multi-line tags
    pub end_line: usize,
    /// Byte range of the whole tag (delimiters included) or text
    pub span: Span,
    pub delimiters: Delimiters,
}

impl Token {
    /// True for text tokens made only of whitespace (newlines included)
    pub fn is_whitespace(&self) -> bool {
        self.kind == TokenKind::Text && self.value.trim().is_empty()
    }
}

/// Root of a parsed template
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub nodes: Vec<Node>,
    pub pragmas: BTreeSet<String>,
}

impl Document {
    pub fn has_pragma(&self, name: &str) -> bool {
        self.pragmas.contains(name)
    }
}

/// Parse tree node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text {
        value: String,
        line: usize,
    },
    Variable {
        name: String,
        escaped: bool,
        line: usize,
        span: Span,
    },
    Section(Section),
    Partial {
        name: String,
        /// Whitespace removed from a standalone partial line, re-applied at render time
        indent: String,
        line: usize,
    },
    Comment {
        line: usize,
    },
    Pragma {
        name: String,
        line: usize,
    },
}

/// A `{{#name}}` or `{{^name}}` block
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub name: String,
    pub inverted: bool,
    /// Byte offset just past the opening tag
    pub start: usize,
    /// Byte offset of the matching closing tag
    pub end: usize,
    pub line: usize,
    pub span: Span,
    pub delimiters: Delimiters,
    pub children: Vec<Node>,
}

impl Section {
    /// Raw, unexpanded body text
    pub fn body<'s>(&self, source: &'s str) -> &'s str {
        &source[self.start..self.end]
    }
}

/// Variable reference inside a tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Path {
    /// `.`, the innermost frame
    Implicit,
    /// `name`
    Name(String),
    /// `a.b.c`
    Dotted(Vec<String>),
}

impl Path {
    pub fn from_segments(mut segments: Vec<String>) -> Self {
        if segments.len() == 1 {
            Path::Name(segments.remove(0))
        } else {
            Path::Dotted(segments)
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Path::Implicit => write!(f, "."),
            Path::Name(name) => write!(f, "{}", name),
            Path::Dotted(segments) => write!(f, "{}", segments.join(".")),
        }
    }
}

/// Variable tag contents: a path threaded through zero or more filters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expr {
    pub path: Path,
    pub filters: Vec<Path>,
}

impl Expr {
    pub fn new(path: Path) -> Self {
        Self {
            path,
            filters: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delimiters_parse() {
        assert_eq!(Delimiters::parse("<% %>"), Some(Delimiters::new("<%", "%>")));
        assert_eq!(Delimiters::parse("  | |  "), Some(Delimiters::new("|", "|")));
        assert_eq!(Delimiters::parse("<%"), None);
        assert_eq!(Delimiters::parse("a b c"), None);
    }

    #[test]
    fn test_delimiters_validity() {
        assert!(Delimiters::default().is_valid());
        assert!(Delimiters::new("<%", "%>").is_valid());
        assert!(!Delimiters::new("", "").is_valid());
        assert!(!Delimiters::new("{{", "").is_valid());
        assert!(!Delimiters::new("< %", "%>").is_valid());
    }

    #[test]
    fn test_change_tag() {
        assert_eq!(Delimiters::new("<%", "%>").change_tag(), "{{= <% %> =}}");
        assert!(Delimiters::default().is_default());
    }

    #[test]
    fn test_sigils() {
        assert_eq!(TokenKind::from_sigil(b'#'), Some(TokenKind::Section));
        assert_eq!(TokenKind::from_sigil(b'<'), Some(TokenKind::Partial));
        assert_eq!(TokenKind::from_sigil(b'&'), Some(TokenKind::Unescaped));
        assert_eq!(TokenKind::from_sigil(b'x'), None);
    }

    #[test]
    fn test_path_display() {
        assert_eq!(Path::Implicit.to_string(), ".");
        assert_eq!(Path::from_segments(vec!["a".into()]), Path::Name("a".into()));
        assert_eq!(
            Path::from_segments(vec!["a".into(), "b".into()]).to_string(),
            "a.b"
        );
    }
}
