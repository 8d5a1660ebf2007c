//! Execution of compiled templates against a context

use crate::compiler::{CompiledTemplate, Op, SectionRoutine};
use crate::context::{Context, Lambda, Value};
use crate::engine::{Engine, LambdaHelper};
use crate::error::{Error, Result};
use crate::parser::Path;

impl CompiledTemplate {
    /// Render into `out`. `indent` is prefixed to every line this template
    /// starts in `out`, and is non-empty only inside an indented partial.
    pub fn render_into(
        &self,
        engine: &Engine,
        ctx: &mut Context,
        indent: &str,
        out: &mut String,
    ) -> Result<()> {
        self.run(&self.main, engine, ctx, indent, out)
    }

    fn run(
        &self,
        ops: &[Op],
        engine: &Engine,
        ctx: &mut Context,
        indent: &str,
        out: &mut String,
    ) -> Result<()> {
        for op in ops {
            match op {
                Op::Text { text } => {
                    write_indent(out, indent);
                    out.push_str(text);
                }
                Op::Variable { expr, escape } => {
                    let value = ctx.resolve(&expr.path);
                    let value = self.resolve_value(value, engine, ctx, indent)?;
                    let value = self.apply_filters(value, &expr.filters, engine, ctx)?;
                    write_indent(out, indent);
                    let text = value.to_display();
                    if *escape {
                        out.push_str(&engine.escape(&text, &self.entity_flags));
                    } else {
                        out.push_str(&text);
                    }
                }
                Op::Section { name, routine } => {
                    let routine = self.sections.get(*routine).ok_or_else(|| {
                        Error::runtime(
                            format!("compiled template has no routine for section `{}`", name),
                            None,
                        )
                    })?;
                    self.section(name, routine, engine, ctx, indent, out)?;
                }
                Op::Inverted { name, body } => {
                    if ctx.resolve(name).is_falsy() {
                        self.run(body, engine, ctx, indent, out)?;
                    }
                }
                Op::Partial {
                    name,
                    indent: partial_indent,
                } => {
                    if let Some(partial) = engine.load_partial(name)? {
                        let indent = format!("{}{}", indent, partial_indent);
                        partial.render_into(ctx, &indent, out)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn section(
        &self,
        name: &Path,
        routine: &SectionRoutine,
        engine: &Engine,
        ctx: &mut Context,
        indent: &str,
        out: &mut String,
    ) -> Result<()> {
        let value = ctx.resolve(name);

        if let Some(lambda) = self.callable(&value) {
            let helper = LambdaHelper::new(engine, ctx, routine.delimiters.clone());
            let text = lambda.call_section(&routine.source, &helper)?;
            out.push_str(&text);
            return Ok(());
        }
        if value.is_falsy() {
            return Ok(());
        }

        for frame in value.frames() {
            ctx.push(frame);
            let result = self.run(&routine.body, engine, ctx, indent, out);
            ctx.pop();
            result?;
        }
        Ok(())
    }

    /// Call an interpolation lambda and render its result as a template.
    /// Lines after the first carry `indent`; the first line is indented by
    /// the variable op itself.
    fn resolve_value(
        &self,
        value: Value,
        engine: &Engine,
        ctx: &mut Context,
        indent: &str,
    ) -> Result<Value> {
        let Some(lambda) = self.callable(&value) else {
            return Ok(value);
        };

        let result = {
            let helper = LambdaHelper::new(engine, ctx, None);
            lambda.call_empty(&helper)?
        };
        let template = engine.load_lambda(&result.to_display(), None)?;
        let mut rendered = String::new();
        template.render_into(ctx, indent, &mut rendered)?;

        let rendered = match rendered.strip_prefix(indent) {
            Some(rest) => rest.to_string(),
            None => rendered,
        };
        Ok(Value::String(rendered))
    }

    fn apply_filters(
        &self,
        mut value: Value,
        filters: &[Path],
        engine: &Engine,
        ctx: &mut Context,
    ) -> Result<Value> {
        for path in filters {
            let filter = ctx.resolve(path);
            let lambda = self
                .callable(&filter)
                .ok_or_else(|| Error::unknown_filter(path.to_string()))?;
            let helper = LambdaHelper::new(engine, ctx, None);
            value = lambda.call(&value, &helper)?;
        }
        Ok(value)
    }

    fn callable<'v>(&self, value: &'v Value) -> Option<&'v Lambda> {
        value
            .as_lambda()
            .filter(|lambda| lambda.is_callable(self.strict_callables))
    }
}

/// Write `indent` if `out` is at the start of a line
fn write_indent(out: &mut String, indent: &str) {
    if !indent.is_empty() && (out.is_empty() || out.ends_with('\n')) {
        out.push_str(indent);
    }
}
