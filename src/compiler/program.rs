//! Compiled template representation

use serde::{Deserialize, Serialize};

use crate::compiler::escape::EntityFlags;
use crate::parser::ast::{Delimiters, Expr, Path};

/// Crate version baked into every artifact; persisted artifacts from another
/// version are recompiled
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// One render instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Literal text, at most one line
    Text { text: String },
    /// `{{name}}` / `{{{name}}}`
    Variable { expr: Expr, escape: bool },
    /// `{{#name}}`, body in `CompiledTemplate::sections[routine]`
    Section { name: Path, routine: usize },
    /// `{{^name}}`, body inline
    Inverted { name: Path, body: Vec<Op> },
    /// `{{>name}}`, loaded at render time
    Partial { name: String, indent: String },
}

/// Shared body of every section with the same raw source and delimiters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRoutine {
    /// Raw, unexpanded body handed to lambdas
    pub source: String,
    /// Delimiters in effect at the section, when not the defaults
    pub delimiters: Option<Delimiters>,
    pub body: Vec<Op>,
}

/// A renderable artifact, keyed by the fingerprint of everything that went
/// into compiling it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledTemplate {
    pub fingerprint: String,
    pub version: String,
    pub escape: String,
    pub charset: String,
    pub strict_callables: bool,
    pub entity_flags: EntityFlags,
    pub main: Vec<Op>,
    pub sections: Vec<SectionRoutine>,
}

impl CompiledTemplate {
    /// Whether this artifact can stand in for a fresh compile under `fingerprint`
    pub fn is_current(&self, fingerprint: &str) -> bool {
        self.fingerprint == fingerprint && self.version == VERSION
    }
}
