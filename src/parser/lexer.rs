//! Lexer for the inside of a variable or section tag using logos
//!
//! The outer template can switch delimiters at any point, so it is scanned by
//! hand (see `scanner`). What sits between the delimiters is a fixed little
//! language of dotted names and filter pipes, which logos handles well.

use logos::Logos;

pub use crate::error::Span;

#[derive(Logos, Debug, Clone, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token {
    #[token(".")]
    Dot,

    #[token("|")]
    Pipe,

    /// Any run of characters that is not a separator or whitespace
    #[regex(r"[^.|\s]+", |lex| lex.slice().to_string())]
    Segment(String),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Dot => write!(f, "."),
            Token::Pipe => write!(f, "|"),
            Token::Segment(s) => write!(f, "{}", s),
        }
    }
}

/// Lex a tag name into tokens with their spans
pub fn lex(input: &str) -> impl Iterator<Item = (Token, Span)> + '_ {
    Token::lexer(input)
        .spanned()
        .filter_map(|(tok, span)| tok.ok().map(|t| (t, span)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        lex(input).map(|(t, _)| t).collect()
    }

    #[test]
    fn test_single_name() {
        assert_eq!(tokens("name"), vec![Token::Segment("name".to_string())]);
    }

    #[test]
    fn test_dotted_name() {
        assert_eq!(
            tokens("a.b.c"),
            vec![
                Token::Segment("a".to_string()),
                Token::Dot,
                Token::Segment("b".to_string()),
                Token::Dot,
                Token::Segment("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_lone_dot() {
        assert_eq!(tokens("."), vec![Token::Dot]);
    }

    #[test]
    fn test_filters_with_spaces() {
        assert_eq!(
            tokens("name | upper|trim"),
            vec![
                Token::Segment("name".to_string()),
                Token::Pipe,
                Token::Segment("upper".to_string()),
                Token::Pipe,
                Token::Segment("trim".to_string()),
            ]
        );
    }

    #[test]
    fn test_segment_spans() {
        let spans: Vec<_> = lex("ab.cd").map(|(_, s)| s).collect();
        assert_eq!(spans, vec![0..2, 2..3, 3..5]);
    }

    #[test]
    fn test_punctuation_inside_segment() {
        assert_eq!(
            tokens("first-name"),
            vec![Token::Segment("first-name".to_string())]
        );
    }
}
