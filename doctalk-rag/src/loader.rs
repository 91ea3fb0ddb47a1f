//! Document loaders: resolve a file path to extracted text sections.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use crate::document::LoadedSection;
use crate::error::{RagError, Result};

/// File extensions [`FileLoader`] can read, lowercase and without the dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md", "docx"];

/// Source of document text for the ingestion pipeline.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load the document at `path` as one or more text sections.
    ///
    /// # Errors
    ///
    /// - [`RagError::NotFoundError`] if `path` does not exist
    /// - [`RagError::UnsupportedFormatError`] if the file type is not recognised
    /// - [`RagError::LoadError`] if the file cannot be read or parsed
    async fn load(&self, path: &Path) -> Result<Vec<LoadedSection>>;
}

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Pdf,
    PlainText,
    Markdown,
    Docx,
}

impl FileFormat {
    /// Detect the format from the path's extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::PlainText),
            "md" => Some(Self::Markdown),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }
}

/// Loads `.pdf`, `.txt`, `.md` and `.docx` files from the local filesystem.
///
/// Every section carries a `source` metadata entry with the path. PDFs yield
/// one section per non-blank page with an extra 0-based `page` entry; other
/// formats yield a single section. Parsing runs on the blocking thread pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader;

impl FileLoader {
    pub fn new() -> Self {
        Self
    }
}

fn load_error(path: &Path, message: impl std::fmt::Display) -> RagError {
    RagError::LoadError { path: path.to_path_buf(), message: message.to_string() }
}

/// Text of every page, in page order.
fn extract_pdf(path: &Path) -> Result<Vec<String>> {
    let bytes = std::fs::read(path).map_err(|e| load_error(path, e))?;
    pdf_extract::extract_text_from_mem_by_pages(&bytes).map_err(|e| load_error(path, e))
}

/// One section per non-blank page, tagged with its 0-based `page` number.
fn page_sections(pages: Vec<String>, source: &str) -> Vec<LoadedSection> {
    pages
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(page, text)| {
            let mut section = LoadedSection::new(text, source);
            section.metadata.insert("page".to_string(), Value::from(page));
            section
        })
        .collect()
}

/// Non-blank paragraph texts joined with newlines.
fn extract_docx(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| load_error(path, e))?;
    let docx = docx_rs::read_docx(&bytes).map_err(|e| load_error(path, e))?;

    let mut paragraphs = Vec::new();
    for child in docx.document.children {
        if let docx_rs::DocumentChild::Paragraph(paragraph) = child {
            let mut text = String::new();
            for child in paragraph.children {
                if let docx_rs::ParagraphChild::Run(run) = child {
                    for child in run.children {
                        if let docx_rs::RunChild::Text(t) = child {
                            text.push_str(&t.text);
                        }
                    }
                }
            }
            if !text.trim().is_empty() {
                paragraphs.push(text);
            }
        }
    }
    Ok(paragraphs.join("\n"))
}

#[async_trait]
impl DocumentLoader for FileLoader {
    async fn load(&self, path: &Path) -> Result<Vec<LoadedSection>> {
        match tokio::fs::try_exists(path).await {
            Ok(true) => {}
            Ok(false) => return Err(RagError::NotFoundError { path: path.to_path_buf() }),
            Err(e) => return Err(load_error(path, e)),
        }

        let format = FileFormat::from_path(path).ok_or_else(|| RagError::UnsupportedFormatError {
            path: path.to_path_buf(),
            extension: path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default(),
        })?;
        let source = path.display().to_string();

        let text = match format {
            FileFormat::PlainText | FileFormat::Markdown => {
                tokio::fs::read_to_string(path).await.map_err(|e| load_error(path, e))?
            }
            FileFormat::Docx => {
                let owned = path.to_path_buf();
                tokio::task::spawn_blocking(move || extract_docx(&owned))
                    .await
                    .map_err(|e| load_error(path, e))??
            }
            FileFormat::Pdf => {
                let owned = path.to_path_buf();
                let pages = tokio::task::spawn_blocking(move || extract_pdf(&owned))
                    .await
                    .map_err(|e| load_error(path, e))??;
                let page_count = pages.len();
                let sections = page_sections(pages, &source);
                debug!(path = %source, page_count, section_count = sections.len(), "loaded pdf");
                return Ok(sections);
            }
        };

        debug!(path = %source, ?format, text_len = text.len(), "loaded document");

        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![LoadedSection::new(text, source)])
    }
}

/// Expand files and directories into a sorted, de-duplicated list of
/// supported files. Directories are walked recursively.
///
/// # Errors
///
/// Returns [`RagError::NotFoundError`] if `path` does not exist, and
/// [`RagError::UnsupportedFormatError`] if `path` is a file of an
/// unsupported type.
pub fn collect_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        return Err(RagError::NotFoundError { path: path.to_path_buf() });
    }

    if path.is_file() {
        if FileFormat::from_path(path).is_none() {
            return Err(RagError::UnsupportedFormatError {
                path: path.to_path_buf(),
                extension: path
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
                    .unwrap_or_default(),
            });
        }
        return Ok(vec![path.to_path_buf()]);
    }

    let files: BTreeSet<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| FileFormat::from_path(entry.path()).is_some())
        .map(|entry| entry.into_path())
        .collect();

    Ok(files.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn detects_formats_case_insensitively() {
        assert_eq!(FileFormat::from_path(Path::new("a/B.PDF")), Some(FileFormat::Pdf));
        assert_eq!(FileFormat::from_path(Path::new("notes.md")), Some(FileFormat::Markdown));
        assert_eq!(FileFormat::from_path(Path::new("report.Docx")), Some(FileFormat::Docx));
        assert_eq!(FileFormat::from_path(Path::new("sheet.xlsx")), None);
        assert_eq!(FileFormat::from_path(Path::new("README")), None);
    }

    #[tokio::test]
    async fn loads_plain_text_with_source() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("notes.txt");
        fs::write(&path, "hello world").unwrap();

        let sections = FileLoader.load(&path).await.unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].text, "hello world");
        assert_eq!(
            sections[0].metadata.get("source").and_then(|v| v.as_str()),
            Some(path.display().to_string().as_str())
        );
    }

    #[tokio::test]
    async fn blank_file_yields_no_sections() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("empty.md");
        fs::write(&path, "  \n").unwrap();
        assert!(FileLoader.load(&path).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_and_unsupported_files_are_distinguished() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("missing.txt");
        assert!(matches!(
            FileLoader.load(&missing).await,
            Err(RagError::NotFoundError { .. })
        ));

        let sheet = temp.path().join("data.csv");
        fs::write(&sheet, "a,b").unwrap();
        match FileLoader.load(&sheet).await {
            Err(RagError::UnsupportedFormatError { extension, .. }) => assert_eq!(extension, ".csv"),
            other => panic!("expected UnsupportedFormatError, got {other:?}"),
        }
    }

    #[test]
    fn pdf_pages_become_numbered_sections() {
        let pages = vec!["Intro".to_string(), " \n".to_string(), "Details".to_string()];
        let sections = page_sections(pages, "/docs/report.pdf");

        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].text, "Intro");
        assert_eq!(sections[0].metadata.get("page"), Some(&Value::from(0)));
        assert_eq!(sections[1].text, "Details");
        assert_eq!(sections[1].metadata.get("page"), Some(&Value::from(2)));
        assert!(
            sections
                .iter()
                .all(|s| s.metadata.get("source") == Some(&Value::from("/docs/report.pdf")))
        );
    }

    #[tokio::test]
    async fn corrupt_pdf_is_a_load_error() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("broken.pdf");
        fs::write(&path, "not a pdf").unwrap();
        assert!(matches!(FileLoader.load(&path).await, Err(RagError::LoadError { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unreadable_parent_is_a_load_error() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let locked = temp.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("notes.txt"), "hidden").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users bypass directory permissions entirely.
        let privileged = fs::metadata(locked.join("notes.txt")).is_ok();
        let result = FileLoader.load(&locked.join("notes.txt")).await;
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        if !privileged {
            assert!(matches!(result, Err(RagError::LoadError { .. })), "got {result:?}");
        }
    }

    #[tokio::test]
    async fn corrupt_docx_is_a_load_error() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("broken.docx");
        fs::write(&path, "not a zip archive").unwrap();
        assert!(matches!(FileLoader.load(&path).await, Err(RagError::LoadError { .. })));
    }

    #[test]
    fn collects_supported_files_recursively() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("nested")).unwrap();
        fs::write(root.join("b.txt"), "b").unwrap();
        fs::write(root.join("nested/a.md"), "a").unwrap();
        fs::write(root.join("nested/c.pdf"), "c").unwrap();
        fs::write(root.join("skip.csv"), "x").unwrap();

        let files = collect_files(root).unwrap();
        assert_eq!(files.len(), 3);
        assert!(files.windows(2).all(|w| w[0] < w[1]));
        assert!(files.iter().all(|p| FileFormat::from_path(p).is_some()));

        assert!(matches!(
            collect_files(&root.join("skip.csv")),
            Err(RagError::UnsupportedFormatError { .. })
        ));
        assert!(matches!(
            collect_files(&root.join("nope")),
            Err(RagError::NotFoundError { .. })
        ));
    }
}
