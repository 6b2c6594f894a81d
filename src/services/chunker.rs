//! Document chunking for the supported source formats.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::SourceError;
use crate::models::{Chunk, IndexingConfig, SourceRef};
use crate::utils::{has_meaningful_content, is_markdown_file, read_file_content};

/// A producer of ordered chunks from some document corpus.
///
/// Implementations must yield deterministic chunk identities for the same
/// input so a resumed build can match chunks against the progress ledger.
pub trait ChunkSource {
    fn chunks(&self) -> Result<Vec<Chunk>, SourceError>;
}

/// Splits Markdown into one chunk per level-2 section.
///
/// The header line stays with its body so the section context survives into
/// the embedding. Text before the first `## ` header becomes the first chunk.
#[derive(Debug, Clone, Default)]
pub struct MarkdownChunker;

impl MarkdownChunker {
    pub fn chunk(&self, path: &str, filename: &str, content: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut index = 0u32;

        for (i, section) in content.split("\n## ").enumerate() {
            let text = if i > 0 {
                format!("## {}", section.trim())
            } else {
                section.trim().to_string()
            };

            if !has_meaningful_content(&text) {
                continue;
            }

            let mut source = SourceRef::new(path, filename);
            if let Some(heading) = section_heading(&text) {
                source = source.with_section(heading);
            }

            chunks.push(Chunk::new(text, source, index));
            index += 1;
        }

        chunks
    }
}

/// First heading line of a section, without the marker.
fn section_heading(text: &str) -> Option<String> {
    let first_line = text.lines().next()?;
    let heading = first_line.strip_prefix("## ")?.trim();
    if heading.is_empty() {
        None
    } else {
        Some(heading.to_string())
    }
}

/// Walks a directory (or single file) and chunks every Markdown document.
pub struct DirectorySource {
    root: PathBuf,
    exclude_patterns: Vec<String>,
    max_file_size: u64,
    chunker: MarkdownChunker,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>, config: &IndexingConfig, extra_excludes: &[String]) -> Self {
        let mut exclude_patterns = config.exclude_patterns.clone();
        exclude_patterns.extend(extra_excludes.iter().cloned());
        Self {
            root: root.into(),
            exclude_patterns,
            max_file_size: config.max_file_size,
            chunker: MarkdownChunker,
        }
    }

    fn collect_files(&self) -> Result<Vec<PathBuf>, SourceError> {
        let mut files = Vec::new();

        if self.root.is_file() {
            files.push(self.root.clone());
            return Ok(files);
        }

        for entry in WalkDir::new(&self.root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| SourceError::WalkError(e.to_string()))?;
            let entry_path = entry.path();

            if !entry_path.is_file() || !is_markdown_file(entry_path) {
                continue;
            }

            if self.is_excluded(entry_path) {
                continue;
            }

            files.push(entry_path.to_path_buf());
        }

        Ok(files)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        self.exclude_patterns.iter().any(|pattern| {
            glob::Pattern::new(pattern)
                .map(|p| p.matches(&path_str))
                .unwrap_or(false)
        })
    }
}

impl ChunkSource for DirectorySource {
    fn chunks(&self) -> Result<Vec<Chunk>, SourceError> {
        let files = self.collect_files()?;
        let mut chunks = Vec::new();

        for file_path in &files {
            let content = match read_file_content(file_path, self.max_file_size) {
                Ok(content) => content,
                Err(e) => {
                    debug!(path = %file_path.display(), error = %e, "skipping unreadable file");
                    continue;
                }
            };

            let filename = file_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let path = file_path.to_string_lossy().to_string();

            chunks.extend(self.chunker.chunk(&path, &filename, &content));
        }

        if chunks.is_empty() {
            return Err(SourceError::NoDocuments);
        }

        Ok(chunks)
    }
}
