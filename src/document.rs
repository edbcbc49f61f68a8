//! Host documents the session reads from and writes back to.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ChatblockError, Result};

/// Whole-text access to the document holding a block.
///
/// Every mutation is a read-modify-write of the full text; the last writer wins.
pub trait Document {
    fn read(&self) -> Result<String>;
    fn modify(&mut self, text: &str) -> Result<()>;
    fn describe(&self) -> String;
}

/// A markdown file on disk.
#[derive(Debug, Clone)]
pub struct FileDocument {
    path: PathBuf,
}

impl FileDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Document for FileDocument {
    fn read(&self) -> Result<String> {
        fs::read_to_string(&self.path).map_err(|source| ChatblockError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn modify(&mut self, text: &str) -> Result<()> {
        fs::write(&self.path, text).map_err(|source| ChatblockError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory text, for dry runs and tests. An unavailable document fails every
/// call, which is how collaborator outages are exercised.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocument {
    text: Option<String>,
    writes: usize,
}

impl MemoryDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            writes: 0,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            text: None,
            writes: 0,
        }
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Number of successful `modify` calls.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl Document for MemoryDocument {
    fn read(&self) -> Result<String> {
        self.text.clone().ok_or(ChatblockError::DocumentUnavailable)
    }

    fn modify(&mut self, text: &str) -> Result<()> {
        let slot = self.text.as_mut().ok_or(ChatblockError::DocumentUnavailable)?;
        *slot = text.to_string();
        self.writes += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_document_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.md");
        fs::write(&path, "```smart-claude\n```\n").unwrap();

        let mut doc = FileDocument::new(&path);
        assert_eq!(doc.read().unwrap(), "```smart-claude\n```\n");
        doc.modify("changed").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "changed");
        assert!(doc.describe().ends_with("note.md"));
    }

    #[test]
    fn test_file_document_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let doc = FileDocument::new(dir.path().join("missing.md"));
        let err = doc.read().unwrap_err();
        assert!(matches!(err, ChatblockError::Io { .. }));
        assert!(err.to_string().contains("missing.md"));
    }

    #[test]
    fn test_memory_document() {
        let mut doc = MemoryDocument::new("a");
        doc.modify("b").unwrap();
        assert_eq!(doc.read().unwrap(), "b");
        assert_eq!(doc.writes(), 1);

        let mut gone = MemoryDocument::unavailable();
        assert!(gone.read().is_err());
        assert!(gone.modify("x").is_err());
        assert_eq!(gone.writes(), 0);
    }
}
