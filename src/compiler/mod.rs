//! Compilation of parse trees into renderable programs
//!
//! The walk is a single pass. Section bodies become shared routines keyed by
//! their raw source and delimiters, so a template that repeats the same
//! section many times carries one copy of its body.

pub mod escape;
mod program;

use std::collections::HashMap;

pub use escape::{canonical_charset, escape_html, Doctype, EntityFlags, EscapeFn, Escaper, QuoteStyle};
pub use program::{CompiledTemplate, Op, SectionRoutine, VERSION};

use crate::error::SyntaxError;
use crate::parser::{self, Delimiters, Document, Node, Section, PRAGMA_FILTERS};

/// Inputs that shape a compiled template, fingerprint included
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    /// Fingerprint the artifact is keyed by
    pub template_id: String,
    /// Escaper label (`default`, `none`, `custom`)
    pub escape: String,
    pub charset: String,
    pub strict_callables: bool,
    pub entity_flags: EntityFlags,
    /// Delimiters in effect at the start of the source
    pub delimiters: Option<Delimiters>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            template_id: String::new(),
            escape: Escaper::Html.label().to_string(),
            charset: "UTF-8".to_string(),
            strict_callables: false,
            entity_flags: EntityFlags::default(),
            delimiters: None,
        }
    }
}

/// Scan, parse and compile `source`
pub fn compile_source(source: &str, options: &CompileOptions) -> Result<CompiledTemplate, SyntaxError> {
    let document = parser::parse_template(source, options.delimiters.as_ref())?;
    Ok(compile(source, &document, options))
}

/// Compile a parsed document. `source` must be the text `document` was
/// parsed from; section bodies are sliced out of it.
pub fn compile(source: &str, document: &Document, options: &CompileOptions) -> CompiledTemplate {
    let mut compiler = Compiler {
        source,
        filters: document.has_pragma(PRAGMA_FILTERS),
        sections: Vec::new(),
        index: HashMap::new(),
    };
    let main = compiler.walk(&document.nodes);

    CompiledTemplate {
        fingerprint: options.template_id.clone(),
        version: VERSION.to_string(),
        escape: options.escape.clone(),
        charset: options.charset.clone(),
        strict_callables: options.strict_callables,
        entity_flags: options.entity_flags,
        main,
        sections: compiler.sections,
    }
}

struct Compiler<'s> {
    source: &'s str,
    filters: bool,
    sections: Vec<SectionRoutine>,
    index: HashMap<(&'s str, Option<Delimiters>), usize>,
}

impl<'s> Compiler<'s> {
    fn walk(&mut self, nodes: &[Node]) -> Vec<Op> {
        let mut ops = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                Node::Text { value, .. } => ops.push(Op::Text {
                    text: value.clone(),
                }),
                Node::Variable { name, escaped, .. } => ops.push(Op::Variable {
                    expr: parser::tag_expr(name, self.filters),
                    escape: *escaped,
                }),
                Node::Section(section) if section.inverted => {
                    let name = parser::tag_path(&section.name);
                    let body = self.walk(&section.children);
                    ops.push(Op::Inverted { name, body });
                }
                Node::Section(section) => {
                    let name = parser::tag_path(&section.name);
                    let routine = self.section_routine(section);
                    ops.push(Op::Section { name, routine });
                }
                Node::Partial { name, indent, .. } => ops.push(Op::Partial {
                    name: name.clone(),
                    indent: indent.clone(),
                }),
                Node::Comment { .. } | Node::Pragma { .. } => {}
            }
        }
        ops
    }

    /// Index of the routine for `section`'s body, compiling it on first sight
    fn section_routine(&mut self, section: &Section) -> usize {
        let body: &'s str = section.body(self.source);
        let delimiters = (!section.delimiters.is_default()).then(|| section.delimiters.clone());
        let key = (body, delimiters);

        if let Some(&routine) = self.index.get(&key) {
            return routine;
        }

        let ops = self.walk(&section.children);
        let routine = self.sections.len();
        self.sections.push(SectionRoutine {
            source: body.to_string(),
            delimiters: key.1.clone(),
            body: ops,
        });
        self.index.insert(key, routine);
        routine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Expr, Path};
    use pretty_assertions::assert_eq;

    fn compile_str(source: &str) -> CompiledTemplate {
        compile_source(source, &CompileOptions::default()).expect("should compile")
    }

    #[test]
    fn test_text_and_variables() {
        let compiled = compile_str("Hi {{name}}{{{raw}}}");
        assert_eq!(
            compiled.main,
            vec![
                Op::Text { text: "Hi ".into() },
                Op::Variable {
                    expr: Expr::new(Path::Name("name".into())),
                    escape: true,
                },
                Op::Variable {
                    expr: Expr::new(Path::Name("raw".into())),
                    escape: false,
                },
            ]
        );
    }

    #[test]
    fn test_text_is_split_per_line() {
        let compiled = compile_str("a\nb\n{{c}}");
        assert_eq!(
            compiled.main[..2],
            [Op::Text { text: "a\n".into() }, Op::Text { text: "b\n".into() }]
        );
    }

    #[test]
    fn test_duplicate_sections_share_a_routine() {
        let compiled = compile_str("{{#a}}x{{/a}}{{#b}}x{{/b}}{{#c}}y{{/c}}");
        assert_eq!(compiled.sections.len(), 2);
        let routines: Vec<usize> = compiled
            .main
            .iter()
            .filter_map(|op| match op {
                Op::Section { routine, .. } => Some(*routine),
                _ => None,
            })
            .collect();
        assert_eq!(routines, vec![0, 0, 1]);
    }

    #[test]
    fn test_same_body_with_other_delimiters_is_distinct() {
        let compiled = compile_str("{{#a}}x{{/a}}{{=<% %>=}}<%#a%>x<%/a%>");
        assert_eq!(compiled.sections.len(), 2);
        assert_eq!(compiled.sections[0].delimiters, None);
        assert_eq!(compiled.sections[1].delimiters, Some(Delimiters::new("<%", "%>")));
    }

    #[test]
    fn test_section_routine_keeps_raw_source() {
        let compiled = compile_str("{{#list}}<{{name}}>{{/list}}");
        assert_eq!(compiled.sections[0].source, "<{{name}}>");
    }

    #[test]
    fn test_inverted_body_is_inline() {
        let compiled = compile_str("{{^empty}}none{{/empty}}");
        assert!(compiled.sections.is_empty());
        assert!(matches!(&compiled.main[0], Op::Inverted { body, .. } if body.len() == 1));
    }

    #[test]
    fn test_filters_only_with_pragma() {
        let plain = compile_str("{{a|b}}");
        let filtered = compile_str("{{%FILTERS}}{{a|b}}");
        assert!(matches!(
            &plain.main[0],
            Op::Variable { expr, .. } if expr.path == Path::Name("a|b".into())
        ));
        assert!(matches!(
            &filtered.main[0],
            Op::Variable { expr, .. } if expr.filters == vec![Path::Name("b".into())]
        ));
    }

    #[test]
    fn test_malformed_tag_names_compile_literally() {
        let compiled = compile_str("line\n{{a..b}}{{#a b}}{{/a b}}");
        assert!(matches!(
            &compiled.main[1],
            Op::Variable { expr, .. }
                if expr.path == Path::Dotted(vec!["a".into(), "".into(), "b".into()])
        ));
        assert!(matches!(
            &compiled.main[2],
            Op::Section { name, .. } if *name == Path::Name("a b".into())
        ));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let source = "{{#a}}{{b}}{{/a}}{{>p}}";
        assert_eq!(compile_str(source), compile_str(source));
    }
}
