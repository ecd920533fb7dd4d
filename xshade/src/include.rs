//! Include loader trait for custom #include resolution

use crate::{Blob, Error, Result};
use std::collections::HashMap;
use std::path::PathBuf;

/// Trait for custom include file resolution
///
/// Implement this trait to provide custom handling for #include directives
/// in your HLSL shaders. Closures taking the file name work as well.
///
/// # Example
/// ```
/// use xshade::{Blob, Error, IncludeLoader};
///
/// let loader = |name: &str| -> xshade::Result<Blob> {
///     match name {
///         "common.hlsli" => Ok(Blob::from("#define ONE 1\n")),
///         _ => Err(Error::IncludeNotFound(name.to_string())),
///     }
/// };
/// assert!(loader.load("common.hlsli").is_ok());
/// ```
pub trait IncludeLoader {
    /// Returns the contents of `name`, as written in the `#include` directive
    /// with any leading `./` removed.
    fn load(&self, name: &str) -> Result<Blob>;
}

impl<F> IncludeLoader for F
where
    F: Fn(&str) -> Result<Blob>,
{
    fn load(&self, name: &str) -> Result<Blob> {
        self(name)
    }
}

/// Adapts a loader to the byte callback the native include handler expects.
pub(crate) fn callback(loader: &dyn IncludeLoader) -> impl Fn(&str) -> Option<Vec<u8>> + '_ {
    move |name: &str| match loader.load(name) {
        Ok(blob) => Some(blob.into_vec()),
        Err(e) => {
            tracing::debug!(name, error = %e, "include loader failed");
            None
        }
    }
}

/// File system include loader, the default when a source has none.
///
/// # Example
/// ```no_run
/// use xshade::FileSystemInclude;
///
/// let include = FileSystemInclude::new()
///     .with_path("shaders/include")
///     .with_path("/usr/local/share/hlsl");
/// ```
#[derive(Debug, Clone, Default)]
pub struct FileSystemInclude {
    search_paths: Vec<PathBuf>,
}

impl FileSystemInclude {
    /// Creates a new file system include loader with no search paths.
    pub fn new() -> Self {
        FileSystemInclude {
            search_paths: Vec::new(),
        }
    }

    /// Adds a search path (builder pattern).
    pub fn with_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.search_paths.push(path.into());
        self
    }

    /// Adds a search path.
    pub fn add_path<P: Into<PathBuf>>(&mut self, path: P) {
        self.search_paths.push(path.into());
    }

    /// Returns the search paths.
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

impl IncludeLoader for FileSystemInclude {
    fn load(&self, name: &str) -> Result<Blob> {
        for search_path in &self.search_paths {
            let path = search_path.join(name);
            if path.is_file() {
                return std::fs::read(&path).map(Blob::from).map_err(Into::into);
            }
        }

        // Relative to the working directory
        std::fs::read(name)
            .map(Blob::from)
            .map_err(|_| Error::IncludeNotFound(name.to_string()))
    }
}

/// In-memory include loader for tests or embedded includes.
///
/// # Example
/// ```
/// use xshade::{IncludeLoader, MemoryInclude};
///
/// let loader = MemoryInclude::new().with_file("common.hlsl", "float4 white = 1;");
/// assert!(loader.load("common.hlsl").is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryInclude {
    files: HashMap<String, Blob>,
}

impl MemoryInclude {
    /// Creates a new empty memory include loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file to the loader.
    pub fn add(&mut self, name: &str, contents: impl Into<Blob>) {
        self.files.insert(name.to_string(), contents.into());
    }

    /// Adds a file (builder pattern).
    pub fn with_file(mut self, name: &str, contents: impl Into<Blob>) -> Self {
        self.add(name, contents);
        self
    }
}

impl IncludeLoader for MemoryInclude {
    fn load(&self, name: &str) -> Result<Blob> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| Error::IncludeNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_include() {
        let loader = MemoryInclude::new().with_file("test.hlsl", "float x = 1.0;");

        let result = loader.load("test.hlsl");
        assert_eq!(result.unwrap().as_bytes(), b"float x = 1.0;");

        let missing = loader.load("missing.hlsl");
        assert!(matches!(missing, Err(Error::IncludeNotFound(name)) if name == "missing.hlsl"));
    }

    #[test]
    fn test_file_system_include() {
        let dir = std::env::temp_dir().join(format!("xshade_include_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("lighting.hlsli"), "float3 ambient;").unwrap();

        let loader = FileSystemInclude::new().with_path(&dir);
        assert_eq!(loader.load("lighting.hlsli").unwrap().as_str().unwrap(), "float3 ambient;");

        let err = loader.load("absent.hlsli").unwrap_err();
        assert_eq!(err.to_string(), "COULDN'T load included file absent.hlsli.");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_search_paths_keep_order() {
        let first = std::env::temp_dir().join(format!("xshade_first_{}", std::process::id()));
        let second = std::env::temp_dir().join(format!("xshade_second_{}", std::process::id()));
        std::fs::create_dir_all(&first).unwrap();
        std::fs::create_dir_all(&second).unwrap();
        std::fs::write(first.join("shared.hlsli"), "first").unwrap();
        std::fs::write(second.join("shared.hlsli"), "second").unwrap();
        std::fs::write(second.join("only.hlsli"), "only").unwrap();

        let mut loader = FileSystemInclude::new().with_path(&first);
        loader.add_path(&second);
        assert_eq!(loader.search_paths(), [first.clone(), second.clone()]);
        assert_eq!(loader.load("shared.hlsli").unwrap().as_bytes(), b"first");
        assert_eq!(loader.load("only.hlsli").unwrap().as_bytes(), b"only");

        std::fs::remove_dir_all(&first).unwrap();
        std::fs::remove_dir_all(&second).unwrap();
    }

    #[test]
    fn test_callback_adapter() {
        let loader = MemoryInclude::new().with_file("a.hlsl", "A");
        let cb = callback(&loader);
        assert_eq!(cb("a.hlsl"), Some(b"A".to_vec()));
        assert_eq!(cb("b.hlsl"), None);
    }
}
