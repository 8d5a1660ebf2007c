//! Variable resolution over a stack of scope frames

mod value;

pub use value::{Lambda, NullaryFn, Object, SectionFn, UnaryFn, Value};

use crate::parser::ast::Path;

/// Stack of scope frames, innermost last.
///
/// A fresh context is built for every render call; sections push one frame
/// per iteration and pop it when the body is done.
#[derive(Debug, Clone, Default)]
pub struct Context {
    stack: Vec<Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with `frame` as its only frame
    pub fn with_frame(frame: Value) -> Self {
        Self { stack: vec![frame] }
    }

    pub fn push(&mut self, frame: Value) {
        self.stack.push(frame);
    }

    pub fn pop(&mut self) -> Option<Value> {
        self.stack.pop()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// The innermost frame, or the empty sentinel for an empty stack
    pub fn last(&self) -> Value {
        self.stack.last().cloned().unwrap_or_else(Value::empty)
    }

    /// Find `id` in the innermost frame that defines it.
    ///
    /// Scalars and lambdas on the stack are skipped. Missing everywhere
    /// resolves to the empty sentinel.
    pub fn find(&self, id: &str) -> Value {
        find_in(self.stack.iter().rev(), id)
    }

    /// Resolve a dotted name: the first segment searches the whole stack,
    /// every later one only the previous result.
    pub fn find_dot(&self, id: &str) -> Value {
        let mut segments = id.split('.');
        let first = segments.next().unwrap_or_default();
        self.find_segments(first, segments)
    }

    /// Resolve a parsed tag path
    pub fn resolve(&self, path: &Path) -> Value {
        match path {
            Path::Implicit => self.last(),
            Path::Name(name) => self.find(name),
            Path::Dotted(segments) => match segments.split_first() {
                Some((first, rest)) => self.find_segments(first, rest.iter().map(String::as_str)),
                None => Value::empty(),
            },
        }
    }

    fn find_segments<'a>(&self, first: &str, rest: impl Iterator<Item = &'a str>) -> Value {
        let mut value = self.find(first);
        for segment in rest {
            if value.is_empty_sentinel() {
                return value;
            }
            value = find_in(std::iter::once(&value), segment);
        }
        value
    }
}

fn find_in<'a>(frames: impl Iterator<Item = &'a Value>, id: &str) -> Value {
    frames
        .filter_map(|frame| frame.lookup(id))
        .next()
        .unwrap_or_else(Value::empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(frames: Vec<serde_json::Value>) -> Context {
        let mut ctx = Context::new();
        for frame in frames {
            ctx.push(frame.into());
        }
        ctx
    }

    #[test]
    fn test_find_prefers_innermost_frame() {
        let ctx = ctx(vec![json!({"a": "outer", "b": "B"}), json!({"a": "inner"})]);
        assert_eq!(ctx.find("a").to_display(), "inner");
        assert_eq!(ctx.find("b").to_display(), "B");
    }

    #[test]
    fn test_missing_is_empty_sentinel() {
        let ctx = ctx(vec![json!({"a": 1})]);
        assert!(ctx.find("nope").is_empty_sentinel());
        assert!(Context::new().last().is_empty_sentinel());
    }

    #[test]
    fn test_scalar_frames_are_skipped() {
        let ctx = ctx(vec![json!({"a": "map"}), json!("scalar"), json!(3)]);
        assert_eq!(ctx.find("a").to_display(), "map");
        assert_eq!(ctx.last().to_display(), "3");
    }

    #[test]
    fn test_find_dot_does_not_fall_back_to_outer_frames() {
        let ctx = ctx(vec![json!({"c": "outer"}), json!({"a": {"b": {}}})]);
        assert!(ctx.find_dot("a.b.c").is_empty_sentinel());
        assert_eq!(ctx.find("c").to_display(), "outer");
    }

    #[test]
    fn test_find_dot_short_circuits_on_missing_segment() {
        let ctx = ctx(vec![json!({"a": {"b": "x"}})]);
        assert_eq!(ctx.find_dot("a.b").to_display(), "x");
        assert!(ctx.find_dot("a.z.b").is_empty_sentinel());
        assert!(ctx.find_dot("z.b").is_empty_sentinel());
    }

    #[test]
    fn test_resolve_paths() {
        let ctx = ctx(vec![json!({"items": ["x", "y"]})]);
        let path = Path::Dotted(vec!["items".into(), "1".into()]);
        assert_eq!(ctx.resolve(&path).to_display(), "y");
        assert!(matches!(ctx.resolve(&Path::Implicit), Value::Map(_)));
        assert!(matches!(ctx.resolve(&Path::Name("items".into())), Value::List(_)));
    }

    #[test]
    fn test_push_pop_balance() {
        let mut ctx = Context::with_frame(json!({"a": 1}).into());
        ctx.push(Value::from("frame"));
        assert_eq!(ctx.depth(), 2);
        assert_eq!(ctx.pop().map(|v| v.to_display()), Some("frame".into()));
        assert_eq!(ctx.depth(), 1);
    }
}
