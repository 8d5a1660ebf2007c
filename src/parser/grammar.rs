//! Tag name grammar using chumsky
//!
//! Two dialects share one token set. Plain names treat `|` as an ordinary
//! character; with the FILTERS pragma a name is `path ('|' path)*`. Names the
//! grammar rejects still render: [`tag_expr`] falls back to a literal split.

use chumsky::error::{RichPattern, RichReason};
use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::parser::ast::{Expr, Path};
use crate::parser::lexer::{lex, Token};

/// Parse a variable or section tag name.
///
/// With `filters` set, `a.b | upper` yields a path plus filter chain;
/// otherwise the whole name is a single path. On failure returns a
/// human-readable message describing the first problem found.
pub fn parse_expr(name: &str, filters: bool) -> Result<Expr, String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("empty tag name".to_string());
    }

    let len = name.len();
    let token_iter = lex(name).map(|(tok, span)| (tok, span.into()));
    let token_stream =
        Stream::from_iter(token_iter).map((len..len).into(), |(t, s): (_, _)| (t, s));

    let result = if filters {
        filter_expr().parse(token_stream).into_result()
    } else {
        plain_expr().parse(token_stream).into_result()
    };

    result.map_err(|errs| match errs.into_iter().next() {
        Some(err) => describe(&err),
        None => "invalid tag name".to_string(),
    })
}

/// Parse a tag name that may not carry filters, such as a section name
pub fn parse_path(name: &str) -> Result<Path, String> {
    parse_expr(name, false).map(|expr| expr.path)
}

/// Interpret a tag name for rendering.
///
/// Well-formed names go through [`parse_expr`]. Anything else is taken
/// literally: split on `|` (with filters) and `.`, so `{{first name}}` looks
/// up the key `first name` and `{{}}` looks up the empty key.
pub fn tag_expr(name: &str, filters: bool) -> Expr {
    if let Ok(expr) = parse_expr(name, filters) {
        return expr;
    }

    let name = name.trim();
    if !filters {
        return Expr::new(literal_path(name));
    }
    let mut parts = name.split('|').map(|part| literal_path(part.trim()));
    let path = parts.next().unwrap_or_else(|| literal_path(""));
    Expr {
        path,
        filters: parts.collect(),
    }
}

/// Interpret a section name for rendering; see [`tag_expr`]
pub fn tag_path(name: &str) -> Path {
    tag_expr(name, false).path
}

fn literal_path(name: &str) -> Path {
    if name == "." {
        Path::Implicit
    } else if name.contains('.') {
        Path::Dotted(name.split('.').map(str::to_string).collect())
    } else {
        Path::Name(name.to_string())
    }
}

/// `.` or `segment ('.' segment)*`, rejecting whitespace between the parts
fn path<'a, I, S>(segment: S) -> impl Parser<'a, I, Path, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
    S: Parser<'a, I, String, extra::Err<Rich<'a, Token>>> + Clone,
{
    let dotted = segment
        .separated_by(just(Token::Dot))
        .at_least(1)
        .collect::<Vec<_>>()
        .try_map(|segments: Vec<String>, span: SimpleSpan| {
            let written = segments.iter().map(String::len).sum::<usize>() + segments.len() - 1;
            if written != span.end - span.start {
                return Err(Rich::custom(span, "whitespace inside tag name"));
            }
            Ok(Path::from_segments(segments))
        });

    choice((just(Token::Dot).to(Path::Implicit), dotted))
}

fn plain_expr<'a, I>() -> impl Parser<'a, I, Expr, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    // Pipes are ordinary name characters here
    let segment = choice((
        select! { Token::Segment(s) => s },
        just(Token::Pipe).to("|".to_string()),
    ))
    .repeated()
    .at_least(1)
    .collect::<Vec<String>>()
    .map(|parts| parts.concat());

    path(segment).then_ignore(end()).map(Expr::new)
}

fn filter_expr<'a, I>() -> impl Parser<'a, I, Expr, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let segment = select! { Token::Segment(s) => s };
    let path = path(segment);

    path.clone()
        .then(
            just(Token::Pipe)
                .ignore_then(path)
                .repeated()
                .collect::<Vec<_>>(),
        )
        .then_ignore(end())
        .map(|(path, filters)| Expr { path, filters })
}

fn describe(err: &Rich<'_, Token>) -> String {
    let message = match err.reason() {
        RichReason::ExpectedFound { found, .. } => match found {
            Some(tok) => format!("unexpected {}", format_token(tok)),
            None => "unexpected end of tag name".to_string(),
        },
        RichReason::Custom(msg) => msg.to_string(),
    };

    let expected: Vec<String> = err
        .expected()
        .filter_map(|e| match e {
            RichPattern::Token(tok) => Some(format_token(tok)),
            RichPattern::Label(label) => Some(label.to_string()),
            RichPattern::EndOfInput => Some("end of tag".to_string()),
            _ => None,
        })
        .collect();

    if expected.is_empty() {
        message
    } else {
        format!("{} (expected {})", message, expected.join(", "))
    }
}

fn format_token(tok: &Token) -> String {
    match tok {
        Token::Segment(s) => format!("name '{}'", s),
        Token::Dot => "'.'".to_string(),
        Token::Pipe => "'|'".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn name(s: &str) -> Path {
        Path::Name(s.to_string())
    }

    #[test]
    fn test_parse_simple_name() {
        assert_eq!(parse_expr("name", false), Ok(Expr::new(name("name"))));
    }

    #[test]
    fn test_parse_implicit_iterator() {
        assert_eq!(parse_path("."), Ok(Path::Implicit));
        assert_eq!(parse_path(" . "), Ok(Path::Implicit));
    }

    #[test]
    fn test_parse_dotted_name() {
        assert_eq!(
            parse_path("a.b.c"),
            Ok(Path::Dotted(vec!["a".into(), "b".into(), "c".into()]))
        );
    }

    #[test]
    fn test_plain_mode_keeps_pipes_in_name() {
        assert_eq!(parse_path("a|b"), Ok(name("a|b")));
        assert_eq!(
            parse_path("x.a|b"),
            Ok(Path::Dotted(vec!["x".into(), "a|b".into()]))
        );
    }

    #[test]
    fn test_filter_chain() {
        let expr = parse_expr("date | longdate|upper", true).unwrap();
        assert_eq!(expr.path, name("date"));
        assert_eq!(expr.filters, vec![name("longdate"), name("upper")]);
    }

    #[test]
    fn test_filter_with_dotted_names() {
        let expr = parse_expr("a.b|fmt.short", true).unwrap();
        assert_eq!(expr.path, Path::Dotted(vec!["a".into(), "b".into()]));
        assert_eq!(expr.filters, vec![Path::Dotted(vec!["fmt".into(), "short".into()])]);
    }

    #[test]
    fn test_empty_name_is_error() {
        assert_eq!(parse_expr("  ", false), Err("empty tag name".to_string()));
    }

    #[test]
    fn test_empty_segment_is_error() {
        assert!(parse_path("a..b").is_err());
        assert!(parse_path("a.").is_err());
        assert!(parse_path(".a").is_err());
    }

    #[test]
    fn test_interior_whitespace_is_error() {
        assert!(parse_path("first name").is_err());
        let err = parse_path("a . b").unwrap_err();
        assert!(err.contains("whitespace"));
    }

    #[test]
    fn test_dangling_pipe_is_error() {
        assert!(parse_expr("name |", true).is_err());
        assert!(parse_expr("| upper", true).is_err());
    }

    #[test]
    fn test_tag_expr_matches_grammar_for_well_formed_names() {
        for (name, filters) in [("a.b", false), (".", false), ("a|b", false), ("x | up", true)] {
            assert_eq!(tag_expr(name, filters), parse_expr(name, filters).unwrap());
        }
    }

    #[test]
    fn test_tag_expr_takes_malformed_names_literally() {
        assert_eq!(tag_expr("first name", false).path, name("first name"));
        assert_eq!(tag_expr("", false).path, name(""));
        assert_eq!(tag_expr("a | b", false).path, name("a | b"));
        assert_eq!(
            tag_expr("a..b", false).path,
            Path::Dotted(vec!["a".into(), "".into(), "b".into()])
        );
        assert_eq!(tag_path(".a"), Path::Dotted(vec!["".into(), "a".into()]));
        assert_eq!(tag_path("a b"), name("a b"));
    }

    #[test]
    fn test_tag_expr_splits_malformed_filter_chains() {
        let expr = tag_expr("name |", true);
        assert_eq!(expr.path, name("name"));
        assert_eq!(expr.filters, vec![name("")]);

        let expr = tag_expr("first name | upper", true);
        assert_eq!(expr.path, name("first name"));
        assert_eq!(expr.filters, vec![name("upper")]);
    }
}
