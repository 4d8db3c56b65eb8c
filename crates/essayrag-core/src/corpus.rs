//! Corpus loading: prepared `.txt` essays shaped `<title>\n---\n<body>`.
//!
//! Files that cannot be read or lack the delimiter are logged and skipped;
//! only an unusable corpus directory is an error.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::Document;

pub const TITLE_DELIMITER: &str = "\n---";

/// Pure link derivation: `<base_url>/<id>.html`.
pub fn source_link(base_url: &str, id: &str) -> String {
    format!("{}/{}.html", base_url.trim_end_matches('/'), id)
}

/// Splits prepared text into `(title, body)`. `None` when the delimiter is
/// missing or the title is blank.
pub fn split_title(text: &str) -> Option<(&str, &str)> {
    let pos = text.find(TITLE_DELIMITER)?;
    let title = text[..pos].trim();
    if title.is_empty() {
        return None;
    }
    let rest = &text[pos + TITLE_DELIMITER.len()..];
    let body = rest.trim_start_matches('-').trim();
    Some((title, body))
}

#[derive(Debug, Clone, Default)]
pub struct Corpus {
    documents: Vec<Document>,
}

impl Corpus {
    pub fn from_documents(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn get(&self, position: usize) -> Option<&Document> {
        self.documents.get(position)
    }

    pub fn find(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

pub struct CorpusLoader {
    source_base_url: String,
}

impl CorpusLoader {
    pub fn new(source_base_url: impl Into<String>) -> Self {
        Self { source_base_url: source_base_url.into() }
    }

    /// Loads every top-level `.txt` file of `dir`, sorted by file name.
    pub fn load_dir(&self, dir: &Path) -> Result<Corpus> {
        if !dir.is_dir() {
            return Err(Error::Configuration(format!("corpus directory {} does not exist", dir.display())));
        }
        let files = self.list_txt_files(dir);
        let mut documents = Vec::with_capacity(files.len());
        for path in &files {
            let text = match read_lossy(path) {
                Ok(text) => text,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable corpus file");
                    continue;
                }
            };
            let Some(id) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else { continue };
            match self.parse_document(&id, &text) {
                Some(doc) => documents.push(doc),
                None => warn!(path = %path.display(), "skipping file without `title\\n---\\nbody` shape"),
            }
        }
        info!(dir = %dir.display(), files = files.len(), documents = documents.len(), "loaded corpus");
        Ok(Corpus::from_documents(documents))
    }

    pub fn parse_document(&self, id: &str, text: &str) -> Option<Document> {
        let (title, body) = split_title(text)?;
        Some(Document {
            id: id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            source_link: source_link(&self.source_base_url, id),
        })
    }

    fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("txt"))
            .collect();
        txt_files.sort();
        debug!(count = txt_files.len(), "listed corpus files");
        txt_files
    }
}

fn read_lossy(path: &Path) -> std::io::Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(path)?).to_string()),
    }
}
