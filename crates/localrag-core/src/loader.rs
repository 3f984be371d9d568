//! Directory document source.
//!
//! Walks a directory tree and yields one `Document` per file whose extension
//! is in the allow-list, in sorted path order. Files are read lazily as the
//! iterator is pulled. PDFs go through text extraction (`pdf` feature);
//! everything else is read as UTF-8, lossily if needed.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{Document, SourceMeta};

pub struct DirectoryLoader {
    root: PathBuf,
    files: std::vec::IntoIter<PathBuf>,
}

impl DirectoryLoader {
    pub fn new(root: &Path, extensions: &[String]) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::Source(format!("not a directory: {}", root.display())));
        }
        let files = list_files(root, extensions);
        debug!(root = %root.display(), files = files.len(), "listed documents");
        Ok(Self { root: root.to_path_buf(), files: files.into_iter() })
    }

    /// Number of files not yet read.
    pub fn remaining(&self) -> usize { self.files.len() }

    fn load(&self, path: &Path) -> Result<Document> {
        let kind = path.extension().and_then(|s| s.to_str()).unwrap_or_default().to_ascii_lowercase();
        let text = if kind == "pdf" {
            read_pdf(path)?
        } else {
            read_file_content(path).map_err(|e| Error::Source(format!("{}: {}", path.display(), e)))?
        };
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        Ok(Document::new(
            doc_id_for(relative),
            text,
            SourceMeta { path: path.to_string_lossy().to_string(), kind },
        ))
    }
}

impl Iterator for DirectoryLoader {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.files.next()?;
        Some(self.load(&path))
    }
}

/// Relative path including the extension, `/`-separated on every platform.
/// `notes.txt` and `notes.md` are distinct documents.
fn doc_id_for(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_file_content(path: &Path) -> std::io::Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
            Ok(String::from_utf8_lossy(&fs::read(path)?).to_string())
        }
        Err(e) => Err(e),
    }
}

#[cfg(feature = "pdf")]
fn read_pdf(path: &Path) -> Result<String> {
    // pdf-extract panics on some malformed font tables
    let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text(path))
        .map_err(|_| Error::Source(format!("{}: PDF text extraction aborted", path.display())))?;
    let text = extracted.map_err(|e| Error::Source(format!("{}: {}", path.display(), e)))?;
    debug!(path = %path.display(), chars = text.chars().count(), "extracted PDF text");
    Ok(text)
}

#[cfg(not(feature = "pdf"))]
fn read_pdf(path: &Path) -> Result<String> {
    Err(Error::Source(format!(
        "{}: PDF documents need localrag-core built with the `pdf` feature",
        path.display()
    )))
}

fn list_files(root: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
        })
        .collect();
    files.sort();
    files
}
