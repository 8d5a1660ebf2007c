//! Template fingerprints and the on-disk artifact cache

use std::io::Write;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info};

use crate::compiler::{CompileOptions, CompiledTemplate, VERSION};
use crate::error::{Error, Result};

/// Default prefix for cache file names
pub const DEFAULT_CACHE_PREFIX: &str = "__Stache_";

/// Default permissions for cache files
pub const DEFAULT_CACHE_FILE_MODE: u32 = 0o644;

/// Content address of a compiled template.
///
/// Covers everything that changes compiled output: crate version, escaper,
/// entity flags, charset, callable policy, initial delimiters and the
/// source itself. URL-safe base64, so usable as a file name.
pub fn fingerprint(source: &str, options: &CompileOptions) -> String {
    let delimiters = options
        .delimiters
        .as_ref()
        .map(|d| d.to_string())
        .unwrap_or_default();
    let key = format!(
        "version:{},escape:{},entity_flags:{},charset:{},strict_callables:{},delimiters:{},source:{}",
        VERSION,
        options.escape,
        options.entity_flags.bits(),
        options.charset,
        options.strict_callables,
        delimiters,
        source
    );

    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Directory of JSON-serialized compiled templates
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
    prefix: String,
    file_mode: u32,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: DEFAULT_CACHE_PREFIX.to_string(),
            file_mode: DEFAULT_CACHE_FILE_MODE,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_file_mode(mut self, mode: u32) -> Self {
        self.file_mode = mode;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("{}{}.json", self.prefix, fingerprint))
    }

    /// A usable cached artifact for `fingerprint`.
    ///
    /// Missing, unreadable and stale files all count as misses; the caller
    /// recompiles and overwrites them.
    pub fn load(&self, fingerprint: &str) -> Option<CompiledTemplate> {
        let path = self.path_for(fingerprint);
        let text = std::fs::read_to_string(&path).ok()?;

        match serde_json::from_str::<CompiledTemplate>(&text) {
            Ok(template) if template.is_current(fingerprint) => {
                debug!("Loaded compiled template from {}", path.display());
                Some(template)
            }
            Ok(_) => {
                debug!("Discarding stale cache file {}", path.display());
                None
            }
            Err(e) => {
                debug!("Discarding unreadable cache file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Write `template` atomically: a temp file in the cache directory is
    /// renamed over the final name
    pub fn store(&self, template: &CompiledTemplate) -> Result<PathBuf> {
        self.ensure_dir()?;

        let path = self.path_for(&template.fingerprint);
        let write_failed =
            |source| Error::runtime(format!("failed to write cache file {}", path.display()), Some(source));

        let json = serde_json::to_string(template)?;
        let mut temp = tempfile::NamedTempFile::new_in(&self.dir).map_err(write_failed)?;
        temp.write_all(json.as_bytes()).map_err(write_failed)?;

        if let Err(e) = temp.persist(&path) {
            error!(
                "Failed to rename temporary file {} to {}",
                e.file.path().display(),
                path.display()
            );
            return Err(write_failed(e.error));
        }
        self.set_permissions(&path).map_err(write_failed)?;

        debug!("Wrote compiled template to {}", path.display());
        Ok(path)
    }

    fn ensure_dir(&self) -> Result<()> {
        if self.dir.is_dir() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            Error::runtime(
                format!("failed to create cache directory {}", self.dir.display()),
                Some(e),
            )
        })?;
        info!("Created cache directory {}", self.dir.display());
        Ok(())
    }

    #[cfg(unix)]
    fn set_permissions(&self, path: &Path) -> std::io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(self.file_mode))
    }

    #[cfg(not(unix))]
    fn set_permissions(&self, _path: &Path) -> std::io::Result<()> {
        Ok(())
    }
}
