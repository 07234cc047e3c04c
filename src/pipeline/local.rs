//! Local text documents (operating protocols and the like) appended to an existing index.

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::document::{PROTOCOL, SourceDocument};
use crate::lang::detect_language;

pub const MAX_LOCAL_CHARS: usize = 10_000;
/// Shorter bodies are usually empty exports or scanned PDFs without a text layer.
pub const MIN_LOCAL_CHARS: usize = 50;

const EXTENSIONS: &[&str] = &["txt", "md", "pdf"];

/// Errors that stop a local document scan.
#[derive(Debug, thiserror::Error)]
pub enum LocalError {
    #[error("directory not found: {0}")]
    MissingDir(PathBuf),
}

#[derive(Debug, Default)]
pub struct LocalScan {
    pub documents: Vec<SourceDocument>,
    pub skipped: Vec<(PathBuf, String)>,
}

/// Collects every readable `.txt` / `.md` / `.pdf` file under `dir`, sorted by path.
pub fn scan_directory(dir: &Path, max_chars: usize) -> Result<LocalScan, LocalError> {
    if !dir.is_dir() {
        return Err(LocalError::MissingDir(dir.to_path_buf()));
    }

    let mut scan = LocalScan::default();
    let walker = WalkDir::new(dir).sort_by_file_name().into_iter();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "unreadable directory entry");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || !has_text_extension(path) {
            continue;
        }
        match read_document(path, max_chars) {
            Ok(doc) => {
                info!(file = %path.display(), language = %doc.language, "prepared local document");
                scan.documents.push(doc);
            }
            Err(reason) => {
                debug!(file = %path.display(), %reason, "local document skipped");
                scan.skipped.push((path.to_path_buf(), reason));
            }
        }
    }
    Ok(scan)
}

fn has_text_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

fn read_text(path: &Path) -> Result<String, String> {
    if !is_pdf(path) {
        return fs::read_to_string(path).map_err(|e| e.to_string());
    }
    let bytes = fs::read(path).map_err(|e| e.to_string())?;
    // pdf-extract panics on some malformed files.
    panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(&bytes)))
        .map_err(|_| "PDF parser panicked".to_string())?
        .map_err(|e| format!("PDF extraction failed: {e}"))
}

fn read_document(path: &Path, max_chars: usize) -> Result<SourceDocument, String> {
    let text = read_text(path)?;
    let text = text.trim();
    if text.chars().count() < MIN_LOCAL_CHARS {
        return Err(format!("fewer than {MIN_LOCAL_CHARS} characters of text"));
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let sample: String = text.chars().take(1000).collect();
    let url = fs::canonicalize(path)
        .ok()
        .and_then(|abs| url::Url::from_file_path(abs).ok())
        .map_or_else(|| format!("file://{}", path.display()), |u| u.to_string());

    SourceDocument::new(
        file_name.clone(),
        url,
        detect_language(&sample),
        PROTOCOL,
        text,
        max_chars,
    )
    .map(|d| d.with_original_title(file_name))
    .ok_or_else(|| "empty after trimming".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn collects_text_files_with_language() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "a-safety.txt",
            "Laboratory safety protocol: wear gloves and goggles at all times in the lab.",
        );
        write(
            tmp.path(),
            "b-hebrew.md",
            "נוהל בטיחות במעבדה: יש ללבוש כפפות ומשקפי מגן בכל זמן השהייה במעבדה הזאת.",
        );
        write(tmp.path(), "c-notes.docx", "binary");

        let scan = scan_directory(tmp.path(), MAX_LOCAL_CHARS).unwrap();

        assert_eq!(scan.documents.len(), 2);
        let first = &scan.documents[0];
        assert_eq!(first.title, "a-safety.txt");
        assert_eq!(first.original_title.as_deref(), Some("a-safety.txt"));
        assert_eq!(first.category, PROTOCOL);
        assert_eq!(first.language, "en");
        assert!(first.url.starts_with("file://"));
        assert_eq!(scan.documents[1].language, "he");
    }

    /// Single-page PDF with one line of Helvetica text, or no content at all for `None`.
    fn pdf_bytes(text: Option<&str>) -> Vec<u8> {
        let stream = text
            .map(|t| format!("BT /F1 12 Tf 72 720 Td ({t}) Tj ET"))
            .unwrap_or_default();
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
             /Resources << /Font << /F1 5 0 R >> >> >>"
                .to_string(),
            format!("<< /Length {} >>\nstream\n{stream}\nendstream", stream.len()),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_string(),
        ];

        let mut out = String::from("%PDF-1.4\n");
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.push_str(&format!("{} 0 obj\n{body}\nendobj\n", i + 1));
        }
        let xref = out.len();
        out.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
        for offset in offsets {
            out.push_str(&format!("{offset:010} 00000 n \n"));
        }
        out.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
            objects.len() + 1
        ));
        out.into_bytes()
    }

    #[test]
    fn pdf_text_layer_is_extracted() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("manual.pdf"),
            pdf_bytes(Some("Laboratory safety protocol: wear gloves and goggles at all times.")),
        )
        .unwrap();

        let scan = scan_directory(tmp.path(), MAX_LOCAL_CHARS).unwrap();

        assert_eq!(scan.documents.len(), 1, "skipped: {:?}", scan.skipped);
        let doc = &scan.documents[0];
        assert_eq!(doc.title, "manual.pdf");
        assert_eq!(doc.language, "en");
        assert_eq!(doc.category, PROTOCOL);
        assert!(doc.content.contains("Laboratory"));
    }

    #[test]
    fn pdf_without_text_layer_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("scan.pdf"), pdf_bytes(None)).unwrap();
        fs::write(tmp.path().join("broken.pdf"), b"not a pdf at all").unwrap();

        let scan = scan_directory(tmp.path(), MAX_LOCAL_CHARS).unwrap();
        assert!(scan.documents.is_empty());
        assert_eq!(scan.skipped.len(), 2);
    }

    #[test]
    fn short_files_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "stub.txt", "too short");

        let scan = scan_directory(tmp.path(), MAX_LOCAL_CHARS).unwrap();
        assert!(scan.documents.is_empty());
        assert_eq!(scan.skipped.len(), 1);
    }

    #[test]
    fn content_is_capped() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "long.txt", &"procedure step ".repeat(2000));

        let scan = scan_directory(tmp.path(), MAX_LOCAL_CHARS).unwrap();
        assert!(scan.documents[0].content.chars().count() <= MAX_LOCAL_CHARS);
    }

    #[test]
    fn nested_directories_are_walked() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("sub");
        fs::create_dir(&nested).unwrap();
        write(&nested, "deep.txt", &"nested protocol text ".repeat(5));

        let scan = scan_directory(tmp.path(), MAX_LOCAL_CHARS).unwrap();
        assert_eq!(scan.documents.len(), 1);
        assert_eq!(scan.documents[0].title, "deep.txt");
    }

    #[test]
    fn missing_directory_is_error() {
        let result = scan_directory(Path::new("/definitely/not/here"), MAX_LOCAL_CHARS);
        assert!(matches!(result, Err(LocalError::MissingDir(_))));
    }
}
