//! Error types for scanning, parsing, compiling and rendering

use std::path::PathBuf;

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// Result alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A malformed template: unmatched sections, unclosed tags or bad delimiters.
///
/// Always fatal. `line` is 0-based, like token lines.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} on line {}", .line + 1)]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
    pub span: Span,
    /// Name of the offending tag, when there is one
    pub tag: Option<String>,
    /// Partial the error was found in; `None` for the template being rendered
    pub template: Option<String>,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, line: usize, span: Span) -> Self {
        Self {
            message: message.into(),
            line,
            span,
            tag: None,
            template: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn in_template(mut self, name: impl Into<String>) -> Self {
        self.template = Some(name.into());
        self
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let mut buf = Vec::new();
        let label = match &self.tag {
            Some(tag) => format!("{} (tag `{}`)", self.message, tag),
            None => self.message.clone(),
        };

        // Spans past the end of the source (end-of-input errors) are clamped
        let end = self.span.end.min(source.len());
        let start = self.span.start.min(end);

        let written = Report::build(ReportKind::Error, filename, start)
            .with_message(&self.message)
            .with_label(
                Label::new((filename, start..end))
                    .with_message(label)
                    .with_color(Color::Red),
            )
            .finish()
            .write((filename, Source::from(source)), &mut buf);

        match written {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => format!("{}: {}", filename, self),
        }
    }
}

/// Errors that can occur anywhere in the load → compile → render pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed template source
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    /// A loader could not find the named template
    #[error("unknown template: {name}")]
    UnknownTemplate { name: String },

    /// Helper lookup on a name that was never registered
    #[error("unknown helper: {name}")]
    UnknownHelper { name: String },

    /// A filter in a `name|filter` chain is missing or not callable
    #[error("unknown filter: {name}")]
    UnknownFilter { name: String },

    /// Configuration rejected when building an engine
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Cache directory or cache file could not be written
    #[error("{message}")]
    Runtime {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Reading a template or data file failed for a reason other than absence
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Engine configuration TOML did not parse
    #[error("failed to parse engine config: {0}")]
    Config(#[from] toml::de::Error),

    /// Serialized data or cache artifact did not (de)serialize
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn unknown_template(name: impl Into<String>) -> Self {
        Self::UnknownTemplate { name: name.into() }
    }

    pub fn unknown_helper(name: impl Into<String>) -> Self {
        Self::UnknownHelper { name: name.into() }
    }

    pub fn unknown_filter(name: impl Into<String>) -> Self {
        Self::UnknownFilter { name: name.into() }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn runtime(message: impl Into<String>, source: Option<std::io::Error>) -> Self {
        Self::Runtime {
            message: message.into(),
            source,
        }
    }

    /// The syntax error, if this is one
    pub fn as_syntax(&self) -> Option<&SyntaxError> {
        match self {
            Self::Syntax(e) => Some(e),
            _ => None,
        }
    }
}
