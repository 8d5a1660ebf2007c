//! Parse tree construction from the scanned token stream

use std::collections::VecDeque;

use crate::error::SyntaxError;
use crate::parser::ast::{Document, Node, Section, Token, TokenKind};

/// Build a parse tree from scanned tokens.
///
/// Pragmas are collected from the whole stream before the tree is built, so
/// a pragma applies to the entire template wherever it was declared.
pub fn parse(tokens: Vec<Token>) -> Result<Document, SyntaxError> {
    let pragmas = tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Pragma)
        .map(|t| t.value.clone())
        .collect();

    let mut tokens: VecDeque<Token> = tokens.into();
    let mut builder = TreeBuilder::default();
    let (nodes, _) = builder.build(&mut tokens, None)?;

    Ok(Document { nodes, pragmas })
}

/// Tracks how many tokens have been seen on the current line, which is all
/// standalone detection needs
#[derive(Debug, Default)]
struct TreeBuilder {
    line: Option<usize>,
    line_tokens: usize,
}

impl TreeBuilder {
    /// Build nodes until the stream ends or `parent`'s closing tag appears.
    /// Returns the closing token when one was consumed.
    fn build(
        &mut self,
        tokens: &mut VecDeque<Token>,
        parent: Option<&Token>,
    ) -> Result<(Vec<Node>, Option<Token>), SyntaxError> {
        let mut nodes = Vec::new();

        while let Some(token) = tokens.pop_front() {
            self.track_line(&token);

            match token.kind {
                TokenKind::DelimiterChange => {
                    self.clear_standalone(&mut nodes, tokens, &token);
                }
                TokenKind::Section | TokenKind::Inverted => {
                    self.clear_standalone(&mut nodes, tokens, &token);
                    let (children, close) = self.build(tokens, Some(&token))?;
                    let end = close.map(|c| c.span.start).unwrap_or(token.span.end);
                    nodes.push(Node::Section(Section {
                        inverted: token.kind == TokenKind::Inverted,
                        start: token.span.end,
                        end,
                        line: token.line,
                        span: token.span,
                        delimiters: token.delimiters,
                        name: token.value,
                        children,
                    }));
                }
                TokenKind::EndSection => {
                    let Some(open) = parent else {
                        return Err(SyntaxError::new(
                            format!("unexpected closing tag `/{}`", token.value),
                            token.line,
                            token.span,
                        )
                        .with_tag(token.value));
                    };
                    if token.value != open.value {
                        return Err(SyntaxError::new(
                            format!(
                                "nesting error: section `{}` closed by `/{}`",
                                open.value, token.value
                            ),
                            token.line,
                            token.span,
                        )
                        .with_tag(token.value));
                    }

                    self.clear_standalone(&mut nodes, tokens, &token);
                    return Ok((nodes, Some(token)));
                }
                TokenKind::Partial => {
                    let indent = self
                        .clear_standalone(&mut nodes, tokens, &token)
                        .unwrap_or_default();
                    nodes.push(Node::Partial {
                        name: token.value,
                        indent,
                        line: token.line,
                    });
                }
                TokenKind::Pragma => {
                    self.clear_standalone(&mut nodes, tokens, &token);
                    nodes.push(Node::Pragma {
                        name: token.value,
                        line: token.line,
                    });
                }
                TokenKind::Comment => {
                    self.clear_standalone(&mut nodes, tokens, &token);
                    nodes.push(Node::Comment { line: token.line });
                }
                TokenKind::Escaped | TokenKind::Unescaped => {
                    nodes.push(Node::Variable {
                        escaped: token.kind == TokenKind::Escaped,
                        name: token.value,
                        line: token.line,
                        span: token.span,
                    });
                }
                TokenKind::Text => {
                    nodes.push(Node::Text {
                        value: token.value,
                        line: token.line,
                    });
                }
            }
        }

        if let Some(open) = parent {
            return Err(SyntaxError::new(
                format!("missing closing tag for section `{}`", open.value),
                open.line,
                open.span.clone(),
            )
            .with_tag(open.value.clone()));
        }

        Ok((nodes, None))
    }

    fn track_line(&mut self, token: &Token) {
        if self.line == Some(token.line) {
            self.line_tokens += 1;
        } else {
            self.line_tokens = 0;
        }
        // Tokens after a multi-line tag share the line the tag ends on
        self.line = Some(token.end_line);
    }

    /// Elide the whitespace around `current` if it is alone on its line.
    ///
    /// Drops one trailing whitespace token and returns the leading
    /// whitespace (used as partial indentation), if any.
    fn clear_standalone(
        &self,
        nodes: &mut Vec<Node>,
        tokens: &mut VecDeque<Token>,
        current: &Token,
    ) -> Option<String> {
        if self.line_tokens > 1 {
            return None;
        }

        let mut has_prefix = false;
        if self.line_tokens == 1 {
            if let Some(prev) = nodes.last() {
                if !is_whitespace(prev) {
                    return None;
                }
                has_prefix = true;
            }
        }

        if let Some(next) = tokens.front() {
            if next.line != current.end_line || !next.is_whitespace() {
                return None;
            }
            // Unless it ends the template, trailing whitespace must end the line
            if tokens.len() != 1 && !next.value.ends_with('\n') {
                return None;
            }
            tokens.pop_front();
        }

        if has_prefix {
            if let Some(Node::Text { value, .. }) = nodes.pop() {
                return Some(value);
            }
        }
        None
    }
}

fn is_whitespace(node: &Node) -> bool {
    matches!(node, Node::Text { value, .. } if value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::scanner::scan;
    use pretty_assertions::assert_eq;

    fn parse_str(source: &str) -> Result<Document, SyntaxError> {
        parse(scan(source, None)?)
    }

    fn texts(nodes: &[Node]) -> Vec<String> {
        nodes
            .iter()
            .filter_map(|n| match n {
                Node::Text { value, .. } => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_nested_sections() {
        let doc = parse_str("{{#a}}{{#b}}x{{/b}}{{/a}}").unwrap();
        let Node::Section(a) = &doc.nodes[0] else {
            panic!("expected section");
        };
        assert_eq!(a.name, "a");
        let Node::Section(b) = &a.children[0] else {
            panic!("expected nested section");
        };
        assert_eq!(b.name, "b");
        assert_eq!(texts(&b.children), vec!["x"]);
    }

    #[test]
    fn test_section_offsets_cover_raw_body() {
        let source = "{{#list}}<{{name}}>{{/list}}";
        let doc = parse_str(source).unwrap();
        let Node::Section(section) = &doc.nodes[0] else {
            panic!("expected section");
        };
        assert_eq!(section.body(source), "<{{name}}>");
    }

    #[test]
    fn test_standalone_section_lines_are_removed() {
        let doc = parse_str("{{#x}}\nY\n{{/x}}\n").unwrap();
        let Node::Section(section) = &doc.nodes[0] else {
            panic!("expected section");
        };
        assert_eq!(doc.nodes.len(), 1);
        assert_eq!(texts(&section.children), vec!["Y\n"]);
    }

    #[test]
    fn test_indented_standalone_tag_drops_indent() {
        let doc = parse_str("a\n  {{! note }}  \nb").unwrap();
        assert_eq!(texts(&doc.nodes), vec!["a\n", "b"]);
    }

    #[test]
    fn test_inline_tag_is_not_standalone() {
        let doc = parse_str("a {{! note }}\nb").unwrap();
        assert_eq!(texts(&doc.nodes), vec!["a ", "\n", "b"]);
    }

    #[test]
    fn test_standalone_at_end_of_document() {
        let doc = parse_str("a\n{{! note }}  ").unwrap();
        assert_eq!(texts(&doc.nodes), vec!["a\n"]);
    }

    #[test]
    fn test_partial_keeps_indent() {
        let doc = parse_str("  {{> item}}\n").unwrap();
        assert_eq!(
            doc.nodes,
            vec![Node::Partial {
                name: "item".to_string(),
                indent: "  ".to_string(),
                line: 0,
            }]
        );
    }

    #[test]
    fn test_multiline_comment_is_standalone() {
        let doc = parse_str("a\n{{! one\ntwo }}\nb").unwrap();
        assert_eq!(texts(&doc.nodes), vec!["a\n", "b"]);
    }

    #[test]
    fn test_pragmas_collected() {
        let doc = parse_str("x\n{{%FILTERS}}\n").unwrap();
        assert!(doc.has_pragma("FILTERS"));
    }

    #[test]
    fn test_missing_closing_tag_names_section() {
        let err = parse_str("{{#x}}").unwrap_err();
        assert!(err.message.contains("`x`"));
        assert_eq!(err.tag.as_deref(), Some("x"));
        assert_eq!(err.line, 0);
    }

    #[test]
    fn test_nesting_error() {
        let err = parse_str("{{#a}}\n{{/b}}").unwrap_err();
        assert!(err.message.contains("nesting error"));
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_unexpected_closing_tag() {
        let err = parse_str("text{{/a}}").unwrap_err();
        assert!(err.message.contains("unexpected closing tag"));
    }
}
