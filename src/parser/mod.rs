//! Template parsing: scanning, tree building and tag name grammar

pub mod ast;
mod grammar;
pub mod lexer;
pub mod scanner;
mod tree;

pub use ast::*;
pub use grammar::{parse_expr, parse_path, tag_expr, tag_path};
pub use scanner::scan;
pub use tree::parse;

use crate::error::SyntaxError;

/// Scan and parse template source in one step
pub fn parse_template(source: &str, delimiters: Option<&Delimiters>) -> Result<Document, SyntaxError> {
    parse(scan(source, delimiters)?)
}
