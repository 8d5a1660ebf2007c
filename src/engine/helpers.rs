//! Helper values shared by every render, and the lambda render helper

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::context::{Context, Value};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::parser::Delimiters;

/// Named values visible as the outermost frame of every render
#[derive(Debug, Clone, Default)]
pub struct HelperCollection {
    helpers: BTreeMap<String, Value>,
}

impl HelperCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a helper
    pub fn add(&mut self, name: impl Into<String>, helper: impl Into<Value>) {
        self.helpers.insert(name.into(), helper.into());
    }

    pub fn get(&self, name: &str) -> Result<&Value> {
        self.helpers
            .get(name)
            .ok_or_else(|| Error::unknown_helper(name))
    }

    pub fn has(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Result<Value> {
        self.helpers
            .remove(name)
            .ok_or_else(|| Error::unknown_helper(name))
    }

    pub fn clear(&mut self) {
        self.helpers.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    /// The helpers as a single context frame
    pub fn to_frame(&self) -> Value {
        Value::Map(self.helpers.clone())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for HelperCollection {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut helpers = Self::new();
        for (name, helper) in iter {
            helpers.add(name, helper);
        }
        helpers
    }
}

/// Handed to section lambdas so they can expand template text against the
/// context the section is rendering in
pub struct LambdaHelper<'a> {
    engine: &'a Engine,
    context: RefCell<&'a mut Context>,
    delimiters: Option<Delimiters>,
}

impl<'a> LambdaHelper<'a> {
    pub(crate) fn new(
        engine: &'a Engine,
        context: &'a mut Context,
        delimiters: Option<Delimiters>,
    ) -> Self {
        Self {
            engine,
            context: RefCell::new(context),
            delimiters,
        }
    }

    /// Render `text` as a template with the current context, using the
    /// delimiters in effect where the section was written
    pub fn render(&self, text: &str) -> Result<String> {
        let template = self.engine.load_lambda(text, self.delimiters.as_ref())?;
        let mut context = self.context.try_borrow_mut().map_err(|_| {
            Error::runtime("lambda helper re-entered while already rendering", None)
        })?;
        let mut out = String::new();
        template.render_into(&mut **context, "", &mut out)?;
        Ok(out)
    }

    /// The innermost context frame
    pub fn current(&self) -> Value {
        self.context
            .try_borrow()
            .map(|context| context.last())
            .unwrap_or_else(|_| Value::empty())
    }
}
