//! stache - a logic-less double-brace template compiler and renderer
//!
//! Templates are scanned, parsed and compiled once, then rendered any number
//! of times against a stack of data frames.
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//!
//! let out = stache::render("Hello {{name}}!", json!({"name": "<World>"})).unwrap();
//! assert_eq!(out, "Hello &lt;World&gt;!");
//! ```

pub mod compiler;
pub mod context;
pub mod engine;
pub mod error;
pub mod parser;

pub use compiler::{CompiledTemplate, Doctype, EntityFlags, Escaper, QuoteStyle};
pub use context::{Context, Lambda, Object, Value};
pub use engine::{
    ArrayLoader, CascadingLoader, DiskCache, Engine, EngineConfig, FilesystemLoader,
    HelperCollection, InlineLoader, LambdaHelper, Loader, MutableLoader, StringLoader, Template,
};
pub use error::{Error, Result, SyntaxError};

/// Render template source against `data` with a default engine
///
/// # Example
///
/// ```rust
/// use serde_json::json;
///
/// let out = stache::render(
///     "{{#items}}<{{.}}>{{/items}}",
///     json!({"items": ["a", "b"]}),
/// ).unwrap();
/// assert_eq!(out, "&lt;a&gt;&lt;b&gt;");
/// ```
pub fn render(source: &str, data: impl Into<Value>) -> Result<String> {
    Engine::new().render(source, data)
}

/// Render with an engine built from `config`
pub fn render_with_config(source: &str, data: impl Into<Value>, config: &EngineConfig) -> Result<String> {
    Engine::from_config(config)?.render(source, data)
}
