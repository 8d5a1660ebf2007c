//! Closed value type for render data
//!
//! Every piece of data a template can see is a [`Value`]. Resolution order is
//! fixed per variant: maps answer by key, lists by numeric index, objects by
//! zero-argument method first and property second. Lambdas are opaque.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::engine::LambdaHelper;
use crate::error::Result;

/// Host-defined object exposed to templates.
///
/// All methods default to "nothing here", so an implementation only
/// overrides what it actually exposes.
pub trait Object: fmt::Debug + Send + Sync {
    /// Zero-argument method named `name`; consulted before properties
    fn method(&self, _name: &str) -> Option<Value> {
        None
    }

    fn property(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Items to iterate over when the object is used as a section value.
    /// `None` means the object is a single frame.
    fn items(&self) -> Option<Vec<Value>> {
        None
    }

    /// Text used when the object itself is interpolated
    fn display(&self) -> String {
        String::new()
    }
}

pub type NullaryFn = dyn Fn() -> Value + Send + Sync;
pub type UnaryFn = dyn Fn(&Value) -> Value + Send + Sync;
pub type SectionFn = dyn Fn(&str, &LambdaHelper<'_>) -> Result<String> + Send + Sync;

#[derive(Clone)]
enum LambdaKind {
    Nullary(Arc<NullaryFn>),
    Unary(Arc<UnaryFn>),
    Section(Arc<SectionFn>),
}

/// Callable template value.
///
/// Used as a section it receives the raw section body; used in a variable
/// tag it is called with nothing and its result rendered as a template; used
/// as a filter it receives the value being filtered.
#[derive(Clone)]
pub struct Lambda {
    kind: LambdaKind,
    object_like: bool,
}

impl Lambda {
    /// Zero-argument callable
    pub fn nullary(f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        Self {
            kind: LambdaKind::Nullary(Arc::new(f)),
            object_like: false,
        }
    }

    /// One-argument callable, the usual shape for filters
    pub fn unary(f: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        Self {
            kind: LambdaKind::Unary(Arc::new(f)),
            object_like: false,
        }
    }

    /// Higher-order section: receives the raw body and a render helper
    pub fn section(
        f: impl Fn(&str, &LambdaHelper<'_>) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind: LambdaKind::Section(Arc::new(f)),
            object_like: false,
        }
    }

    /// Mark the callable as an invokable object rather than a bare function.
    /// Only object-like lambdas are called when strict callables are on.
    pub fn object_like(mut self) -> Self {
        self.object_like = true;
        self
    }

    pub fn is_object_like(&self) -> bool {
        self.object_like
    }

    /// Whether this lambda is invoked under the given callable policy
    pub fn is_callable(&self, strict: bool) -> bool {
        !strict || self.object_like
    }

    /// Invoke with a single input. Section lambdas see the input's text.
    pub fn call(&self, input: &Value, helper: &LambdaHelper<'_>) -> Result<Value> {
        match &self.kind {
            LambdaKind::Nullary(f) => Ok(f()),
            LambdaKind::Unary(f) => Ok(f(input)),
            LambdaKind::Section(f) => f(&input.to_display(), helper).map(Value::String),
        }
    }

    /// Invoke for a variable tag, where there is no input
    pub fn call_empty(&self, helper: &LambdaHelper<'_>) -> Result<Value> {
        match &self.kind {
            LambdaKind::Unary(f) => Ok(f(&Value::Null)),
            _ => self.call(&Value::String(String::new()), helper),
        }
    }

    /// Invoke as a higher-order section over the raw `body`
    pub fn call_section(&self, body: &str, helper: &LambdaHelper<'_>) -> Result<String> {
        match &self.kind {
            LambdaKind::Section(f) => f(body, helper),
            _ => self
                .call(&Value::String(body.to_string()), helper)
                .map(|v| v.to_display()),
        }
    }
}

impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            LambdaKind::Nullary(_) => "nullary",
            LambdaKind::Unary(_) => "unary",
            LambdaKind::Section(_) => "section",
        };
        f.debug_struct("Lambda")
            .field("kind", &kind)
            .field("object_like", &self.object_like)
            .finish()
    }
}

/// A value visible to templates
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Object(Arc<dyn Object>),
    Lambda(Lambda),
}

impl Value {
    /// The value lookups return when nothing matched
    pub fn empty() -> Self {
        Value::String(String::new())
    }

    /// Build a value from anything serde can serialize
    pub fn from_serialize<T: Serialize + ?Sized>(data: &T) -> Result<Self> {
        Ok(serde_json::to_value(data)?.into())
    }

    /// True for the empty-string lookup sentinel
    pub fn is_empty_sentinel(&self) -> bool {
        matches!(self, Value::String(s) if s.is_empty())
    }

    /// Falsy values: null, false, zero, empty string, empty list.
    /// Maps and objects are never falsy, even when empty.
    pub fn is_falsy(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::String(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Map(_) | Value::Object(_) | Value::Lambda(_) => false,
        }
    }

    pub fn as_lambda(&self) -> Option<&Lambda> {
        match self {
            Value::Lambda(lambda) => Some(lambda),
            _ => None,
        }
    }

    /// Look `name` up inside this value alone
    pub fn lookup(&self, name: &str) -> Option<Value> {
        match self {
            Value::Map(map) => map.get(name).cloned(),
            Value::List(items) => name
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index).cloned()),
            Value::Object(object) => object.method(name).or_else(|| object.property(name)),
            _ => None,
        }
    }

    /// Frames a section iterates over: one per list item, or the value itself
    pub fn frames(&self) -> Vec<Value> {
        match self {
            Value::List(items) => items.clone(),
            Value::Object(object) => object.items().unwrap_or_else(|| vec![self.clone()]),
            _ => vec![self.clone()],
        }
    }

    /// Text produced when the value is interpolated
    pub fn to_display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(true) => "1".to_string(),
            Value::Bool(false) => String::new(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::List(_) | Value::Map(_) | Value::Lambda(_) => String::new(),
            Value::Object(object) => object.display(),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<toml::Value> for Value {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::Int(i),
            toml::Value::Float(f) => Value::Float(f),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(d) => Value::String(d.to_string()),
            toml::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            toml::Value::Table(table) => Value::Map(
                table
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Lambda> for Value {
    fn from(lambda: Lambda) -> Self {
        Value::Lambda(lambda)
    }
}

impl From<Arc<dyn Object>> for Value {
    fn from(object: Arc<dyn Object>) -> Self {
        Value::Object(object)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Value {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Person;

    impl Object for Person {
        fn method(&self, name: &str) -> Option<Value> {
            (name == "name").then(|| Value::from("method"))
        }

        fn property(&self, name: &str) -> Option<Value> {
            match name {
                "name" => Some(Value::from("property")),
                "age" => Some(Value::from(42)),
                _ => None,
            }
        }
    }

    #[test]
    fn test_falsy_values() {
        assert!(Value::Null.is_falsy());
        assert!(Value::from(false).is_falsy());
        assert!(Value::from(0).is_falsy());
        assert!(Value::from("").is_falsy());
        assert!(Value::List(vec![]).is_falsy());
        assert!(!Value::from("0").is_falsy());
        assert!(!Value::Map(BTreeMap::new()).is_falsy());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from(true).to_display(), "1");
        assert_eq!(Value::from(false).to_display(), "");
        assert_eq!(Value::from(1.5).to_display(), "1.5");
        assert_eq!(Value::from(7).to_display(), "7");
        assert_eq!(Value::from(vec![1, 2]).to_display(), "");
    }

    #[test]
    fn test_object_method_before_property() {
        let person: Arc<dyn Object> = Arc::new(Person);
        let value = Value::from(person);
        assert_eq!(value.lookup("name").map(|v| v.to_display()), Some("method".into()));
        assert_eq!(value.lookup("age").map(|v| v.to_display()), Some("42".into()));
        assert!(value.lookup("missing").is_none());
    }

    #[test]
    fn test_list_numeric_lookup() {
        let list = Value::from(vec!["a", "b"]);
        assert_eq!(list.lookup("1").map(|v| v.to_display()), Some("b".into()));
        assert!(list.lookup("2").is_none());
        assert!(list.lookup("x").is_none());
    }

    #[test]
    fn test_from_json() {
        let value = Value::from(json!({"a": [1, 2.5, null], "b": {"c": "d"}}));
        let Value::Map(map) = value else {
            panic!("expected map");
        };
        assert!(matches!(map["a"], Value::List(ref items) if items.len() == 3));
        assert_eq!(map["b"].lookup("c").map(|v| v.to_display()), Some("d".into()));
    }

    #[test]
    fn test_from_serialize() {
        #[derive(Serialize)]
        struct Page {
            title: &'static str,
        }
        let value = Value::from_serialize(&Page { title: "Home" }).unwrap();
        assert_eq!(value.lookup("title").map(|v| v.to_display()), Some("Home".into()));
    }

    #[test]
    fn test_frames() {
        assert_eq!(Value::from(vec![1, 2, 3]).frames().len(), 3);
        assert_eq!(Value::from([("a", 1)]).frames().len(), 1);
    }

    #[test]
    fn test_strict_callable_policy() {
        let plain = Lambda::nullary(|| Value::Null);
        assert!(plain.is_callable(false));
        assert!(!plain.is_callable(true));
        assert!(plain.object_like().is_callable(true));
    }
}
