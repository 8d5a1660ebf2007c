//! Handle for rendering a compiled template repeatedly

use std::sync::Arc;

use crate::compiler::CompiledTemplate;
use crate::context::{Context, Value};
use crate::engine::Engine;
use crate::error::Result;

/// A compiled template bound to the engine that compiled it
#[derive(Clone)]
pub struct Template<'e> {
    engine: &'e Engine,
    compiled: Arc<CompiledTemplate>,
}

impl<'e> Template<'e> {
    pub(crate) fn new(engine: &'e Engine, compiled: Arc<CompiledTemplate>) -> Self {
        Self { engine, compiled }
    }

    /// Render with `data` as the innermost frame, under the engine's helpers
    pub fn render(&self, data: impl Into<Value>) -> Result<String> {
        let mut ctx = self.prepare_context(data.into());
        let mut out = String::new();
        self.render_into(&mut ctx, "", &mut out)?;
        Ok(out)
    }

    /// Render against an existing context
    pub fn render_into(&self, ctx: &mut Context, indent: &str, out: &mut String) -> Result<()> {
        self.compiled.render_into(self.engine, ctx, indent, out)
    }

    pub fn fingerprint(&self) -> &str {
        &self.compiled.fingerprint
    }

    pub fn compiled(&self) -> &Arc<CompiledTemplate> {
        &self.compiled
    }

    fn prepare_context(&self, data: Value) -> Context {
        let mut ctx = Context::new();
        let helpers = self.engine.helpers();
        if !helpers.is_empty() {
            ctx.push(helpers.to_frame());
        }
        if !matches!(data, Value::Null) {
            ctx.push(data);
        }
        ctx
    }
}

impl std::fmt::Debug for Template<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Template")
            .field("fingerprint", &self.compiled.fingerprint)
            .finish()
    }
}
