//! Rule document storage.
//!
//! One document per file, named after the rule id. `*.toml` and `*.json`
//! files are read; documents are always written as TOML.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{EcaError, Result};
use crate::model::RuleDocument;

/// Directory-backed storage for rule documents
#[derive(Debug, Clone)]
pub struct RuleStore {
    path: PathBuf,
}

impl RuleStore {
    /// Open the store configured by `config`, creating the directory if needed
    pub fn open(config: &EngineConfig) -> Result<Self> {
        Self::with_path(config.rules_dir()?)
    }

    /// Open a store rooted at `path`, creating the directory if needed
    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    /// Load every document, ordered by file name
    pub fn load_all(&self) -> Result<Vec<RuleDocument>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.path)? {
            let path = entry?.path();
            if path.is_file() && document_format(&path).is_some() {
                files.push(path);
            }
        }
        files.sort();

        let mut documents = Vec::with_capacity(files.len());
        for file in files {
            debug!(path = %file.display(), "loading rule document");
            documents.push(read_document(&file)?);
        }
        Ok(documents)
    }

    /// Load the document of one rule
    pub fn load(&self, id: &str) -> Result<RuleDocument> {
        let file = self
            .file_of(id)
            .ok_or_else(|| EcaError::NotFound(id.to_string()))?;
        read_document(&file)
    }

    /// Write a document as `<id>.toml`, replacing any earlier file of that rule
    pub fn save(&self, document: &RuleDocument) -> Result<PathBuf> {
        let json = self.path.join(format!("{}.json", document.id));
        if json.exists() {
            std::fs::remove_file(&json)?;
        }
        let path = self.path.join(format!("{}.toml", document.id));
        std::fs::write(&path, document.to_toml_string()?)?;
        Ok(path)
    }

    /// Delete the document of one rule
    pub fn remove(&self, id: &str) -> Result<()> {
        let file = self
            .file_of(id)
            .ok_or_else(|| EcaError::NotFound(id.to_string()))?;
        std::fs::remove_file(file)?;
        Ok(())
    }

    /// Get the store directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_of(&self, id: &str) -> Option<PathBuf> {
        ["toml", "json"]
            .iter()
            .map(|ext| self.path.join(format!("{id}.{ext}")))
            .find(|path| path.is_file())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Toml,
    Json,
}

fn document_format(path: &Path) -> Option<Format> {
    match path.extension()?.to_str()? {
        "toml" => Some(Format::Toml),
        "json" => Some(Format::Json),
        _ => None,
    }
}

/// Read one document file, TOML or JSON by extension.
pub fn read_document(path: &Path) -> Result<RuleDocument> {
    let content = std::fs::read_to_string(path)?;
    match document_format(path) {
        Some(Format::Json) => RuleDocument::from_json_str(&content),
        _ => RuleDocument::from_toml_str(&content),
    }
}
