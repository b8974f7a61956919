//! Turns uploaded files into documents: Markdown and plain text as is, PDF
//! through text extraction.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use rag_pipeline::Document;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Extraction of a single PDF may not take longer than this.
const PDF_EXTRACT_LIMIT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Text,
    Pdf,
}

impl Format {
    fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "md" | "markdown" | "txt" => Some(Format::Text),
            "pdf" => Some(Format::Pdf),
            _ => None,
        }
    }
}

/// Reads `path` into a [`Document`] keyed by its file name.
pub async fn read_document(path: &Path) -> Result<Document> {
    let Some(format) = Format::of(path) else {
        bail!(
            "unsupported file type: {} (expected .md, .txt or .pdf)",
            path.display()
        );
    };
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("file name is not valid UTF-8: {}", path.display()))?;

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let text = match format {
        Format::Text => String::from_utf8(bytes)
            .with_context(|| format!("{} is not valid UTF-8 text", path.display()))?,
        Format::Pdf => pdf_text(name, bytes).await?,
    };

    debug!(file = name, chars = text.chars().count(), "upload read");
    Ok(Document::from_upload(name, text))
}

/// Extracts the text layer of a PDF on the blocking pool.
async fn pdf_text(name: &str, bytes: Vec<u8>) -> Result<String> {
    let task = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes));
    let text = timeout(PDF_EXTRACT_LIMIT, task)
        .await
        .with_context(|| format!("{name}: PDF extraction took longer than {PDF_EXTRACT_LIMIT:?}"))?
        .with_context(|| format!("{name}: PDF extraction task failed"))?
        .map_err(|e| anyhow!("{name}: could not extract PDF text: {e}"))?;

    if text.trim().is_empty() {
        warn!(file = name, "PDF has no text layer");
        bail!("{name}: PDF contains no extractable text (scanned pages need OCR first)");
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch(name: &str, contents: &[u8]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("docqa-upload-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(Format::of(Path::new("notes.MD")), Some(Format::Text));
        assert_eq!(Format::of(Path::new("a/b/readme.txt")), Some(Format::Text));
        assert_eq!(Format::of(Path::new("paper.pdf")), Some(Format::Pdf));
        assert_eq!(Format::of(Path::new("sheet.xlsx")), None);
        assert_eq!(Format::of(Path::new("Makefile")), None);
    }

    #[tokio::test]
    async fn markdown_becomes_document_named_after_file() {
        let path = scratch("guide.md", b"# Title\n\nBody text.");
        let doc = read_document(&path).await.unwrap();
        assert_eq!(doc.id, "guide.md");
        assert_eq!(doc.source_text, "# Title\n\nBody text.");
    }

    #[tokio::test]
    async fn unknown_extension_is_rejected() {
        let path = scratch("data.csv", b"a,b");
        let err = read_document(&path).await.unwrap_err();
        assert!(err.to_string().contains("unsupported file type"));
    }

    #[tokio::test]
    async fn broken_pdf_names_the_file() {
        let path = scratch("broken.pdf", b"definitely not a pdf");
        let err = read_document(&path).await.unwrap_err();
        assert!(format!("{err:#}").contains("broken.pdf"));
    }
}
