//! Template engine: loaders, helpers, escaping and the compiled-template cache
//!
//! Every template the engine sees, including partials and lambda output, goes
//! through [`Engine::load_source`]: fingerprint the source, reuse a compiled
//! artifact if one exists (in memory, then on disk), otherwise compile it.

pub mod cache;
mod config;
mod helpers;
pub mod loader;
mod render;
mod template;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

pub use cache::{fingerprint, DiskCache};
pub use config::EngineConfig;
pub use helpers::{HelperCollection, LambdaHelper};
pub use loader::{
    ArrayLoader, CascadingLoader, FilesystemLoader, InlineLoader, Loader, MutableLoader,
    StringLoader,
};
pub use template::Template;

use crate::compiler::{self, canonical_charset, CompileOptions, CompiledTemplate, EntityFlags, Escaper};
use crate::context::Value;
use crate::error::{Error, Result};
use crate::parser::Delimiters;

/// Loads, compiles, caches and renders templates.
///
/// `Engine` is `Send + Sync`; compiled templates are shared between threads
/// through an insert-if-absent cache.
pub struct Engine {
    loader: Box<dyn Loader>,
    partials_loader: Option<Box<dyn Loader>>,
    helpers: HelperCollection,
    escaper: Escaper,
    entity_flags: EntityFlags,
    charset: String,
    strict_callables: bool,
    delimiters: Option<Delimiters>,
    disk_cache: Option<DiskCache>,
    compiled: RwLock<HashMap<String, Arc<CompiledTemplate>>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            loader: Box::new(StringLoader),
            partials_loader: None,
            helpers: HelperCollection::new(),
            escaper: Escaper::Html,
            entity_flags: EntityFlags::default(),
            charset: "UTF-8".to_string(),
            strict_callables: false,
            delimiters: None,
            disk_cache: None,
            compiled: RwLock::new(HashMap::new()),
        }
    }
}

impl Engine {
    /// Engine whose template names are the template source
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an engine from configuration, validating it
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let mut engine = Self::new()
            .with_escaper(Escaper::from_name(&config.escape)?)
            .with_charset(&config.charset)?
            .with_entity_flags(config.entity_flags)
            .with_strict_callables(config.strict_callables);

        if let Some(pair) = &config.delimiters {
            let delimiters = Delimiters::parse(pair).ok_or_else(|| {
                Error::invalid_argument(format!("malformed delimiters `{}`", pair))
            })?;
            engine = engine.with_delimiters(delimiters)?;
        }

        if let Some(dir) = &config.templates_dir {
            engine = engine.with_loader(FilesystemLoader::new(dir)?.with_extension(&config.extension));
        }

        let inline = (!config.partials.is_empty()).then(|| ArrayLoader::new(config.partials.clone()));
        match (&config.partials_dir, inline) {
            (Some(dir), Some(inline)) => {
                let files = FilesystemLoader::new(dir)?.with_extension(&config.extension);
                engine = engine.with_partials_loader(
                    CascadingLoader::default().with_loader(inline).with_loader(files),
                );
            }
            (Some(dir), None) => {
                engine = engine
                    .with_partials_loader(FilesystemLoader::new(dir)?.with_extension(&config.extension));
            }
            (None, Some(inline)) => engine = engine.with_partials_loader(inline),
            (None, None) => {}
        }

        if let Some(dir) = &config.cache_dir {
            engine = engine.with_cache(
                DiskCache::new(dir)
                    .with_prefix(config.cache_prefix.clone())
                    .with_file_mode(config.cache_file_mode),
            );
        }

        Ok(engine)
    }

    pub fn with_loader(mut self, loader: impl Loader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn with_partials_loader(mut self, loader: impl Loader + 'static) -> Self {
        self.partials_loader = Some(Box::new(loader));
        self
    }

    pub fn with_helpers(mut self, helpers: HelperCollection) -> Self {
        self.helpers = helpers;
        self
    }

    pub fn with_helper(mut self, name: impl Into<String>, helper: impl Into<Value>) -> Self {
        self.helpers.add(name, helper);
        self
    }

    pub fn with_escaper(mut self, escaper: Escaper) -> Self {
        self.escaper = escaper;
        self
    }

    /// Fails with an invalid-argument error for unsupported charsets
    pub fn with_charset(mut self, charset: &str) -> Result<Self> {
        self.charset = canonical_charset(charset)?;
        Ok(self)
    }

    pub fn with_entity_flags(mut self, flags: EntityFlags) -> Self {
        self.entity_flags = flags;
        self
    }

    pub fn with_strict_callables(mut self, strict: bool) -> Self {
        self.strict_callables = strict;
        self
    }

    /// Delimiters templates start out with, instead of `{{ }}`.
    /// Fails with an invalid-argument error for empty delimiters or ones
    /// containing whitespace.
    pub fn with_delimiters(mut self, delimiters: Delimiters) -> Result<Self> {
        if !delimiters.is_valid() {
            return Err(Error::invalid_argument(format!(
                "invalid delimiters `{}`",
                delimiters
            )));
        }
        self.delimiters = Some(delimiters);
        Ok(self)
    }

    /// Persist compiled templates in `cache`
    pub fn with_cache(mut self, cache: DiskCache) -> Self {
        self.disk_cache = Some(cache);
        self
    }

    pub fn set_loader(&mut self, loader: impl Loader + 'static) {
        self.loader = Box::new(loader);
    }

    pub fn set_partials_loader(&mut self, loader: impl Loader + 'static) {
        self.partials_loader = Some(Box::new(loader));
    }

    /// Replace every partial. Installs an [`ArrayLoader`] if there is no
    /// partials loader yet; fails if the current one is immutable.
    pub fn set_partials(&mut self, partials: HashMap<String, String>) -> Result<()> {
        let loader = self
            .partials_loader
            .get_or_insert_with(|| Box::new(ArrayLoader::default()));
        let mutable = loader.as_mutable().ok_or_else(|| {
            Error::runtime("unable to set partials on an immutable loader", None)
        })?;
        mutable.set_templates(partials);
        Ok(())
    }

    pub fn helpers(&self) -> &HelperCollection {
        &self.helpers
    }

    pub fn helpers_mut(&mut self) -> &mut HelperCollection {
        &mut self.helpers
    }

    pub fn add_helper(&mut self, name: impl Into<String>, helper: impl Into<Value>) {
        self.helpers.add(name, helper);
    }

    pub fn strict_callables(&self) -> bool {
        self.strict_callables
    }

    pub fn charset(&self) -> &str {
        &self.charset
    }

    /// Escape `text` as `{{name}}` output is escaped
    pub fn escape(&self, text: &str, flags: &EntityFlags) -> String {
        self.escaper.escape(text, flags)
    }

    /// Load, compile and render in one step
    pub fn render(&self, template: &str, data: impl Into<Value>) -> Result<String> {
        self.load_template(template)?.render(data)
    }

    /// Load and compile the template the primary loader knows as `name`
    pub fn load_template(&self, name: &str) -> Result<Template<'_>> {
        let source = self.loader.load(name)?;
        self.load_source(&source, self.delimiters.as_ref())
    }

    /// Load a partial; a missing partial is logged and yields `None`
    pub fn load_partial(&self, name: &str) -> Result<Option<Template<'_>>> {
        let source = match &self.partials_loader {
            Some(loader) => loader.load(name),
            None if !self.loader.is_pass_through() => self.loader.load(name),
            None => Err(Error::unknown_template(name)),
        };

        match source {
            Ok(source) => self
                .load_source(&source, self.delimiters.as_ref())
                .map(Some)
                .map_err(|e| match e {
                    Error::Syntax(e) if e.template.is_none() => Error::Syntax(e.in_template(name)),
                    e => e,
                }),
            Err(Error::UnknownTemplate { .. }) => {
                warn!("Partial not found: \"{}\"", name);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Compile lambda output, starting with `delimiters` when given
    pub fn load_lambda(&self, source: &str, delimiters: Option<&Delimiters>) -> Result<Template<'_>> {
        self.load_source(source, delimiters.or(self.delimiters.as_ref()))
    }

    /// Fetch the compiled template for `source`, compiling on a cache miss
    pub fn load_source(&self, source: &str, delimiters: Option<&Delimiters>) -> Result<Template<'_>> {
        let mut options = self.compile_options(delimiters);
        let id = fingerprint(source, &options);

        if let Some(compiled) = self.cached(&id) {
            debug!("Cache hit for template {}", id);
            return Ok(Template::new(self, compiled));
        }
        debug!("Cache miss for template {}", id);

        let compiled = match self.disk_cache.as_ref().and_then(|cache| cache.load(&id)) {
            Some(compiled) => compiled,
            None => {
                info!("Compiling template {}", id);
                options.template_id = id.clone();
                let compiled = compiler::compile_source(source, &options)?;
                if let Some(cache) = &self.disk_cache {
                    cache.store(&compiled)?;
                }
                compiled
            }
        };

        Ok(Template::new(self, self.insert(id, compiled)))
    }

    fn compile_options(&self, delimiters: Option<&Delimiters>) -> CompileOptions {
        CompileOptions {
            template_id: String::new(),
            escape: self.escaper.label().to_string(),
            charset: self.charset.clone(),
            strict_callables: self.strict_callables,
            entity_flags: self.entity_flags,
            delimiters: delimiters.filter(|d| !d.is_default()).cloned(),
        }
    }

    fn cached(&self, id: &str) -> Option<Arc<CompiledTemplate>> {
        self.compiled
            .read()
            .ok()
            .and_then(|compiled| compiled.get(id).cloned())
    }

    /// Insert unless another render got there first; either way return the
    /// entry the cache holds
    fn insert(&self, id: String, compiled: CompiledTemplate) -> Arc<CompiledTemplate> {
        match self.compiled.write() {
            Ok(mut cache) => cache.entry(id).or_insert_with(|| Arc::new(compiled)).clone(),
            Err(_) => Arc::new(compiled),
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("escaper", &self.escaper)
            .field("charset", &self.charset)
            .field("strict_callables", &self.strict_callables)
            .field("delimiters", &self.delimiters)
            .field("helpers", &self.helpers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_engine_is_send_sync() {
        assert_send_sync::<Engine>();
    }

    #[test]
    fn test_compiles_once_per_fingerprint() {
        let engine = Engine::new();
        let a = engine.load_template("Hi {{name}}").unwrap();
        let b = engine.load_template("Hi {{name}}").unwrap();
        assert!(Arc::ptr_eq(a.compiled(), b.compiled()));
        assert_eq!(engine.compiled.read().unwrap().len(), 1);
    }

    #[test]
    fn test_options_change_fingerprint() {
        let plain = Engine::new().load_template("{{x}}").unwrap().fingerprint().to_string();
        let strict = Engine::new()
            .with_strict_callables(true)
            .load_template("{{x}}")
            .unwrap()
            .fingerprint()
            .to_string();
        assert_ne!(plain, strict);
    }

    #[test]
    fn test_from_config_rejects_bad_values() {
        let bad_escape = EngineConfig::new().with_escape("shout");
        assert!(matches!(
            Engine::from_config(&bad_escape),
            Err(Error::InvalidArgument { .. })
        ));

        let bad_charset = EngineConfig::new().with_charset("klingon");
        assert!(matches!(
            Engine::from_config(&bad_charset),
            Err(Error::InvalidArgument { .. })
        ));

        let bad_delimiters = EngineConfig::new().with_delimiters("<%");
        assert!(matches!(
            Engine::from_config(&bad_delimiters),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_with_delimiters_rejects_empty_delimiters() {
        assert!(matches!(
            Engine::new().with_delimiters(Delimiters::new("", "")),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            Engine::new().with_delimiters(Delimiters::new("<%", "")),
            Err(Error::InvalidArgument { .. })
        ));

        let engine = Engine::new().with_delimiters(Delimiters::new("<%", "%>")).unwrap();
        assert_eq!(engine.render("<%x%>", [("x", "X")]).unwrap(), "X");
    }

    #[test]
    fn test_set_partials_requires_mutable_loader() {
        let mut engine = Engine::new();
        engine
            .set_partials(HashMap::from([("p".to_string(), "P".to_string())]))
            .unwrap();
        assert_eq!(engine.render("{{>p}}", Value::Null).unwrap(), "P");

        let mut immutable = Engine::new().with_partials_loader(InlineLoader::new("@@ p\nP"));
        assert!(matches!(
            immutable.set_partials(HashMap::new()),
            Err(Error::Runtime { .. })
        ));
    }
}
