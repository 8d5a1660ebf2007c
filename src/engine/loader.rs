//! Template source loaders

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{Error, Result};

/// Default file extension for filesystem templates
pub const DEFAULT_EXTENSION: &str = ".mustache";

/// Maps a template name to its source
pub trait Loader: Send + Sync {
    /// Load the source for `name`, failing with [`Error::UnknownTemplate`]
    /// when there is none
    fn load(&self, name: &str) -> Result<String>;

    /// True when `load` returns the name itself. Such a loader cannot stand
    /// in for a partials loader.
    fn is_pass_through(&self) -> bool {
        false
    }

    /// Mutable view, for loaders that accept templates after construction
    fn as_mutable(&mut self) -> Option<&mut dyn MutableLoader> {
        None
    }
}

/// A loader whose template set can be replaced or extended
pub trait MutableLoader {
    /// Replace every template
    fn set_templates(&mut self, templates: HashMap<String, String>);

    fn set_template(&mut self, name: &str, template: &str);
}

/// Treats the name as the template source
#[derive(Debug, Clone, Copy, Default)]
pub struct StringLoader;

impl Loader for StringLoader {
    fn load(&self, name: &str) -> Result<String> {
        Ok(name.to_string())
    }

    fn is_pass_through(&self) -> bool {
        true
    }
}

/// In-memory name → source map
#[derive(Debug, Clone, Default)]
pub struct ArrayLoader {
    templates: HashMap<String, String>,
}

impl ArrayLoader {
    pub fn new<K, V>(templates: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            templates: templates
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Loader for ArrayLoader {
    fn load(&self, name: &str) -> Result<String> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| Error::unknown_template(name))
    }

    fn as_mutable(&mut self) -> Option<&mut dyn MutableLoader> {
        Some(self)
    }
}

impl MutableLoader for ArrayLoader {
    fn set_templates(&mut self, templates: HashMap<String, String>) {
        self.templates = templates;
    }

    fn set_template(&mut self, name: &str, template: &str) {
        self.templates.insert(name.to_string(), template.to_string());
    }
}

/// Loads `<base_dir>/<name><extension>` and remembers what it read
#[derive(Debug)]
pub struct FilesystemLoader {
    base_dir: PathBuf,
    extension: String,
    loaded: RwLock<HashMap<String, String>>,
}

impl FilesystemLoader {
    /// Fails with a runtime error when `base_dir` is not a directory
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        if !base_dir.is_dir() {
            return Err(Error::runtime(
                format!("filesystem loader requires a directory: {}", base_dir.display()),
                None,
            ));
        }
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            extension: DEFAULT_EXTENSION.to_string(),
            loaded: RwLock::new(HashMap::new()),
        })
    }

    /// Set the template file extension; empty means none
    pub fn with_extension(mut self, extension: &str) -> Self {
        let extension = extension.trim_start_matches('.');
        self.extension = if extension.is_empty() {
            String::new()
        } else {
            format!(".{}", extension)
        };
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn file_name(&self, name: &str) -> PathBuf {
        if self.extension.is_empty() || name.ends_with(&self.extension) {
            self.base_dir.join(name)
        } else {
            self.base_dir.join(format!("{}{}", name, self.extension))
        }
    }
}

impl Loader for FilesystemLoader {
    fn load(&self, name: &str) -> Result<String> {
        if let Ok(loaded) = self.loaded.read() {
            if let Some(source) = loaded.get(name) {
                return Ok(source.clone());
            }
        }

        let path = self.file_name(name);
        if !path.is_file() {
            return Err(Error::unknown_template(name));
        }
        let source = std::fs::read_to_string(&path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;

        if let Ok(mut loaded) = self.loaded.write() {
            loaded.insert(name.to_string(), source.clone());
        }
        Ok(source)
    }
}

/// Tries each loader in turn; the first that knows the name wins
#[derive(Default)]
pub struct CascadingLoader {
    loaders: Vec<Box<dyn Loader>>,
}

impl CascadingLoader {
    pub fn new(loaders: Vec<Box<dyn Loader>>) -> Self {
        Self { loaders }
    }

    pub fn add_loader(&mut self, loader: impl Loader + 'static) {
        self.loaders.push(Box::new(loader));
    }

    pub fn with_loader(mut self, loader: impl Loader + 'static) -> Self {
        self.add_loader(loader);
        self
    }
}

impl Loader for CascadingLoader {
    fn load(&self, name: &str) -> Result<String> {
        for loader in &self.loaders {
            match loader.load(name) {
                Err(Error::UnknownTemplate { .. }) => continue,
                result => return result,
            }
        }
        Err(Error::unknown_template(name))
    }
}

/// Templates embedded in one text blob, each introduced by an `@@ name` line:
///
/// ```text
/// @@ header
/// <h1>{{title}}</h1>
/// @@ footer
/// <footer>{{year}}</footer>
/// ```
#[derive(Debug, Clone, Default)]
pub struct InlineLoader {
    templates: HashMap<String, String>,
}

impl InlineLoader {
    pub fn new(text: &str) -> Self {
        let mut templates = HashMap::new();
        let mut current: Option<(&str, Vec<&str>)> = None;

        for line in text.split_inclusive('\n') {
            if let Some(name) = chunk_name(line) {
                if let Some((name, body)) = current.take() {
                    templates.insert(name.to_string(), body.concat().trim().to_string());
                }
                current = Some((name, Vec::new()));
            } else if let Some((_, body)) = current.as_mut() {
                body.push(line);
            }
        }
        if let Some((name, body)) = current {
            templates.insert(name.to_string(), body.concat().trim().to_string());
        }

        Self { templates }
    }

    /// Read the blob from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(&text))
    }
}

/// `@@ name` marker lines; names are word characters and dots
fn chunk_name(line: &str) -> Option<&str> {
    let name = line.strip_prefix("@@ ")?.trim_end_matches(['\n', '\r']);
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.');
    valid.then_some(name)
}

impl Loader for InlineLoader {
    fn load(&self, name: &str) -> Result<String> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| Error::unknown_template(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_unknown(result: Result<String>) -> bool {
        matches!(result, Err(Error::UnknownTemplate { .. }))
    }

    #[test]
    fn test_string_loader_passes_through() {
        assert_eq!(StringLoader.load("{{x}}").unwrap(), "{{x}}");
        assert!(StringLoader.is_pass_through());
    }

    #[test]
    fn test_array_loader() {
        let mut loader = ArrayLoader::new([("a", "A")]);
        assert_eq!(loader.load("a").unwrap(), "A");
        assert!(is_unknown(loader.load("b")));

        let mutable = loader.as_mutable().expect("array loader is mutable");
        mutable.set_template("b", "B");
        assert_eq!(loader.load("b").unwrap(), "B");
    }

    #[test]
    fn test_set_templates_replaces_everything() {
        let mut loader = ArrayLoader::new([("a", "A")]);
        loader.set_templates(HashMap::from([("z".to_string(), "Z".to_string())]));
        assert!(is_unknown(loader.load("a")));
        assert_eq!(loader.load("z").unwrap(), "Z");
    }

    #[test]
    fn test_filesystem_loader() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page.mustache"), "Hello {{name}}").unwrap();
        std::fs::write(dir.path().join("raw.txt"), "raw").unwrap();

        let loader = FilesystemLoader::new(dir.path()).unwrap();
        assert_eq!(loader.load("page").unwrap(), "Hello {{name}}");
        assert_eq!(loader.load("page.mustache").unwrap(), "Hello {{name}}");
        assert!(is_unknown(loader.load("missing")));

        let txt = FilesystemLoader::new(dir.path()).unwrap().with_extension("txt");
        assert_eq!(txt.load("raw").unwrap(), "raw");
    }

    #[test]
    fn test_filesystem_loader_memoizes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("page.mustache");
        std::fs::write(&file, "first").unwrap();

        let loader = FilesystemLoader::new(dir.path()).unwrap();
        assert_eq!(loader.load("page").unwrap(), "first");
        std::fs::write(&file, "second").unwrap();
        assert_eq!(loader.load("page").unwrap(), "first");
    }

    #[test]
    fn test_filesystem_loader_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = FilesystemLoader::new(dir.path().join("nope"));
        assert!(matches!(result, Err(Error::Runtime { .. })));
    }

    #[test]
    fn test_cascading_loader_first_hit_wins() {
        let loader = CascadingLoader::default()
            .with_loader(ArrayLoader::new([("a", "first")]))
            .with_loader(ArrayLoader::new([("a", "second"), ("b", "B")]));
        assert_eq!(loader.load("a").unwrap(), "first");
        assert_eq!(loader.load("b").unwrap(), "B");
        assert!(is_unknown(loader.load("c")));
    }

    #[test]
    fn test_inline_loader() {
        let text = "preamble\n@@ header\n<h1>{{title}}</h1>\n\n@@ foot.er\nbye\n";
        let loader = InlineLoader::new(text);
        assert_eq!(loader.load("header").unwrap(), "<h1>{{title}}</h1>");
        assert_eq!(loader.load("foot.er").unwrap(), "bye");
        assert!(is_unknown(loader.load("preamble")));
    }
}
