//! Engine configuration, loadable from TOML

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::compiler::EntityFlags;
use crate::engine::cache::{DEFAULT_CACHE_FILE_MODE, DEFAULT_CACHE_PREFIX};
use crate::engine::loader::DEFAULT_EXTENSION;
use crate::error::{Error, Result};

/// Configuration options for building an [`Engine`](crate::Engine)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory templates are loaded from; without one, template names
    /// are the template source
    pub templates_dir: Option<PathBuf>,

    /// Directory partials are loaded from
    pub partials_dir: Option<PathBuf>,

    /// File extension for directory loaders
    pub extension: String,

    /// Inline partials, name → source
    pub partials: HashMap<String, String>,

    /// Directory for persisted compiled templates
    pub cache_dir: Option<PathBuf>,

    pub cache_prefix: String,

    /// Unix permissions for cache files
    pub cache_file_mode: u32,

    /// `html`, `none` or `raw`
    pub escape: String,

    pub charset: String,

    pub entity_flags: EntityFlags,

    /// Only call object-like lambdas
    pub strict_callables: bool,

    /// Initial delimiters as `"OPEN CLOSE"`
    pub delimiters: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            templates_dir: None,
            partials_dir: None,
            extension: DEFAULT_EXTENSION.to_string(),
            partials: HashMap::new(),
            cache_dir: None,
            cache_prefix: DEFAULT_CACHE_PREFIX.to_string(),
            cache_file_mode: DEFAULT_CACHE_FILE_MODE,
            escape: "html".to_string(),
            charset: "UTF-8".to_string(),
            entity_flags: EntityFlags::default(),
            strict_callables: false,
            delimiters: None,
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn with_templates_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.templates_dir = Some(dir.into());
        self
    }

    pub fn with_partials_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.partials_dir = Some(dir.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Add an inline partial
    pub fn with_partial(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.partials.insert(name.into(), source.into());
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = prefix.into();
        self
    }

    pub fn with_cache_file_mode(mut self, mode: u32) -> Self {
        self.cache_file_mode = mode;
        self
    }

    pub fn with_escape(mut self, escape: impl Into<String>) -> Self {
        self.escape = escape.into();
        self
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    pub fn with_entity_flags(mut self, flags: EntityFlags) -> Self {
        self.entity_flags = flags;
        self
    }

    pub fn with_strict_callables(mut self, strict: bool) -> Self {
        self.strict_callables = strict;
        self
    }

    pub fn with_delimiters(mut self, delimiters: impl Into<String>) -> Self {
        self.delimiters = Some(delimiters.into());
        self
    }
}
