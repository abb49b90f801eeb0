//! Source provider abstraction and text decoding.
//!
//! The [`SourceProvider`] trait abstracts file I/O so the deck loader can
//! follow `#INCLUDE` chains without `std::fs`, which keeps tests and
//! embedders free of the filesystem.

use crate::error::ParseFailure;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// File access used by [`crate::deck`].
pub trait SourceProvider {
    /// Raw bytes of the file at `path`.
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, std::io::Error>;

    /// Resolve an include path against the directory of the including file.
    fn resolve_include(&self, base: &Path, include: &str) -> Result<PathBuf, std::io::Error>;

    /// Canonical form of `path`, used as the identity of a file for cycle
    /// detection.
    fn canonicalize(&self, path: &Path) -> Result<PathBuf, std::io::Error>;
}

/// Default filesystem-backed provider.
pub struct FileSystemProvider;

impl SourceProvider for FileSystemProvider {
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, std::io::Error> {
        std::fs::read(path)
    }

    fn resolve_include(&self, base: &Path, include: &str) -> Result<PathBuf, std::io::Error> {
        Ok(base.join(include))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf, std::io::Error> {
        path.canonicalize()
    }
}

/// In-memory provider mapping paths to file contents.
///
/// Paths are normalized lexically (`.` and `..` resolved) on insert, on
/// lookup and on canonicalization.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    files: HashMap<PathBuf, Vec<u8>>,
}

impl InMemoryProvider {
    pub fn new(files: HashMap<PathBuf, String>) -> Self {
        let files = files
            .into_iter()
            .map(|(p, s)| (normalize_path(&p), s.into_bytes()))
            .collect();
        Self { files }
    }

    /// Add or replace one file.
    pub fn insert(&mut self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) {
        self.files.insert(normalize_path(path.as_ref()), contents.into());
    }
}

impl SourceProvider for InMemoryProvider {
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, std::io::Error> {
        let normalized = normalize_path(path);
        self.files.get(&normalized).cloned().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("file not found in memory: {}", normalized.display()),
            )
        })
    }

    fn resolve_include(&self, base: &Path, include: &str) -> Result<PathBuf, std::io::Error> {
        Ok(normalize_path(&base.join(include)))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf, std::io::Error> {
        let normalized = normalize_path(path);
        if self.files.contains_key(&normalized) {
            Ok(normalized)
        } else {
            Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("path not found in memory provider: {}", normalized.display()),
            ))
        }
    }
}

/// Resolve `.` and `..` components without touching the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !components.is_empty() {
                    components.pop();
                }
            }
            other => components.push(other),
        }
    }
    components.iter().collect()
}

/// Decode deck bytes as text.
///
/// Invalid UTF-8 sequences are replaced rather than rejected, since decks
/// routinely carry Latin-1 comments. A leading byte-order mark is dropped.
/// A NUL byte marks the input as binary.
pub fn decode_source(bytes: &[u8], filename: &str) -> Result<String, ParseFailure> {
    if let Some(offset) = bytes.iter().position(|&b| b == 0) {
        return Err(ParseFailure::NotText {
            file: filename.to_owned(),
            reason: format!("NUL byte at offset {}", offset),
        });
    }
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    Ok(String::from_utf8_lossy(bytes).into_owned())
}
