//! Shader Sources
//!
//! Where shader text comes from. The registry and the preprocessor only talk
//! to [`ShaderSource`]; three implementations cover the usual setups:
//!
//! | Source | Use case |
//! |--------|----------|
//! | [`DirectorySource`] | Editable shader directory next to the executable |
//! | [`EmbeddedSource`] | Shaders compiled into the binary with `rust-embed` |
//! | [`MemorySource`] | Tools and tests |
//!
//! Paths are `/`-separated and relative to the shader root. Only top-level
//! files are reported by [`ShaderSource::list`]; nested paths are reachable
//! through `#include`.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use rust_embed::RustEmbed;

use crate::errors::ShaderError;

/// File-read collaborator of the shader pipeline.
pub trait ShaderSource {
    /// Reads the whole file at `path`.
    fn read(&self, path: &str) -> Result<Vec<u8>, ShaderError>;

    /// Names of the top-level files, sorted.
    fn list(&self) -> Vec<String>;
}

impl<S: ShaderSource + ?Sized> ShaderSource for &S {
    fn read(&self, path: &str) -> Result<Vec<u8>, ShaderError> {
        (**self).read(path)
    }

    fn list(&self) -> Vec<String> {
        (**self).list()
    }
}

// ─── DirectorySource ─────────────────────────────────────────────────────────

/// Reads shaders from a directory on disk.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

/// System-wide shader directory searched after the executable's own.
#[cfg(target_os = "linux")]
pub const SYSTEM_SHADER_DIR: &str = "/usr/share/glvariant/shaders";

impl DirectorySource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Opens `root`, failing when it is not a readable directory.
    pub fn open(root: impl Into<PathBuf>) -> crate::Result<Self> {
        let root = root.into();
        std::fs::read_dir(&root)?;
        Ok(Self { root })
    }

    /// Finds the first existing shader directory among the default candidates:
    /// `<exe dir>/shaders`, then the system directory on Linux.
    #[must_use]
    pub fn locate() -> Option<Self> {
        let mut candidates = Vec::new();
        if let Ok(exe) = std::env::current_exe()
            && let Some(dir) = exe.parent()
        {
            candidates.push(dir.join("shaders"));
        }
        #[cfg(target_os = "linux")]
        candidates.push(PathBuf::from(SYSTEM_SHADER_DIR));

        Self::locate_in(candidates)
    }

    /// First directory of `candidates` that exists.
    pub fn locate_in<I, P>(candidates: I) -> Option<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        candidates
            .into_iter()
            .map(Into::into)
            .find(|dir: &PathBuf| dir.is_dir())
            .map(Self::new)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ShaderSource for DirectorySource {
    fn read(&self, path: &str) -> Result<Vec<u8>, ShaderError> {
        let full = self.root.join(path);
        std::fs::read(&full).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                ShaderError::NotFound(path.to_string())
            } else {
                ShaderError::Io { path: full, source }
            }
        })
    }

    fn list(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            log::warn!("Shader directory {} is not readable", self.root.display());
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }
}

// ─── EmbeddedSource ──────────────────────────────────────────────────────────

/// Serves shaders compiled into the binary by a `#[derive(RustEmbed)]` type.
#[derive(Debug)]
pub struct EmbeddedSource<E: RustEmbed> {
    _assets: PhantomData<E>,
}

impl<E: RustEmbed> EmbeddedSource<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            _assets: PhantomData,
        }
    }
}

impl<E: RustEmbed> Default for EmbeddedSource<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: RustEmbed> ShaderSource for EmbeddedSource<E> {
    fn read(&self, path: &str) -> Result<Vec<u8>, ShaderError> {
        E::get(path)
            .map(|file| file.data.into_owned())
            .ok_or_else(|| ShaderError::NotFound(path.to_string()))
    }

    fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = E::iter()
            .filter(|name| !name.contains('/'))
            .map(std::borrow::Cow::into_owned)
            .collect();
        names.sort();
        names
    }
}

/// Shader set shipped with the crate.
#[derive(RustEmbed)]
#[folder = "shaders"]
pub struct BuiltinShaders;

// ─── MemorySource ────────────────────────────────────────────────────────────

/// In-memory file map.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), contents.into());
    }

    pub fn remove(&mut self, path: &str) -> Option<Vec<u8>> {
        self.files.remove(path)
    }
}

impl ShaderSource for MemorySource {
    fn read(&self, path: &str) -> Result<Vec<u8>, ShaderError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| ShaderError::NotFound(path.to_string()))
    }

    fn list(&self) -> Vec<String> {
        self.files.keys().filter(|k| !k.contains('/')).cloned().collect()
    }
}
