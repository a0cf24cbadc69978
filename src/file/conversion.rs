//! PDF conversion of stored documents.
//!
//! The format registry decides whether a document is already a PDF, can be
//! converted, or is unsupported. Actual conversion is delegated to a
//! `DocumentConverter`; the default runs a headless office suite.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

use crate::{FolioError, Result};

/// Media type of PDF documents.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

struct FormatEntry {
    extension: &'static str,
    media_types: &'static [&'static str],
}

const CONVERTIBLE: &[FormatEntry] = &[
    FormatEntry {
        extension: "doc",
        media_types: &["application/msword"],
    },
    FormatEntry {
        extension: "docx",
        media_types: &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"],
    },
    FormatEntry {
        extension: "odt",
        media_types: &["application/vnd.oasis.opendocument.text"],
    },
    FormatEntry {
        extension: "rtf",
        media_types: &["application/rtf", "text/rtf"],
    },
    FormatEntry {
        extension: "txt",
        media_types: &["text/plain"],
    },
    FormatEntry {
        extension: "html",
        media_types: &["text/html"],
    },
    FormatEntry {
        extension: "xls",
        media_types: &["application/vnd.ms-excel"],
    },
    FormatEntry {
        extension: "xlsx",
        media_types: &["application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"],
    },
    FormatEntry {
        extension: "ods",
        media_types: &["application/vnd.oasis.opendocument.spreadsheet"],
    },
    FormatEntry {
        extension: "csv",
        media_types: &["text/csv"],
    },
    FormatEntry {
        extension: "ppt",
        media_types: &["application/vnd.ms-powerpoint"],
    },
    FormatEntry {
        extension: "pptx",
        media_types: &["application/vnd.openxmlformats-officedocument.presentationml.presentation"],
    },
    FormatEntry {
        extension: "odp",
        media_types: &["application/vnd.oasis.opendocument.presentation"],
    },
];

/// Where a document stands with respect to PDF conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Already a PDF; returned unchanged.
    Pdf,
    /// Convertible; carries the canonical file extension.
    Convertible(&'static str),
}

impl SourceFormat {
    /// Look up a document by media type, falling back to its file extension.
    ///
    /// Returns `None` for unsupported formats.
    pub fn detect(media_type: &str, file_name: &str) -> Option<Self> {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if essence == PDF_MEDIA_TYPE {
            return Some(SourceFormat::Pdf);
        }
        if let Some(entry) = CONVERTIBLE
            .iter()
            .find(|e| e.media_types.contains(&essence.as_str()))
        {
            return Some(SourceFormat::Convertible(entry.extension));
        }

        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)?;

        match extension.as_str() {
            "pdf" => Some(SourceFormat::Pdf),
            "htm" => Some(SourceFormat::Convertible("html")),
            ext => CONVERTIBLE
                .iter()
                .find(|e| e.extension == ext)
                .map(|e| SourceFormat::Convertible(e.extension)),
        }
    }
}

/// File name for the converted document: `.pdf` appended unless present.
pub fn pdf_file_name(name: &str) -> String {
    if name.to_ascii_lowercase().ends_with(".pdf") {
        name.to_string()
    } else {
        format!("{name}.pdf")
    }
}

/// Result of converting a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedDocument {
    /// Suggested file name for the PDF.
    pub file_name: String,
    /// PDF bytes.
    pub bytes: Vec<u8>,
}

/// Converts document payloads to PDF.
pub trait DocumentConverter: Send + Sync {
    /// Convert `bytes`, whose canonical extension is `extension`, to PDF.
    fn convert_to_pdf(&self, bytes: &[u8], extension: &str) -> Result<Vec<u8>>;
}

/// Converter backed by a headless office suite (`soffice`).
#[derive(Debug, Clone)]
pub struct OfficeConverter {
    binary: PathBuf,
    scratch_root: PathBuf,
}

impl OfficeConverter {
    /// Create a converter that runs `binary`.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            scratch_root: std::env::temp_dir(),
        }
    }

    /// Use `dir` for per-conversion scratch directories.
    pub fn with_scratch_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_root = dir.into();
        self
    }

    /// The office binary this converter runs.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn run(&self, workdir: &Path, bytes: &[u8], extension: &str) -> Result<Vec<u8>> {
        let input = workdir.join(format!("input.{extension}"));
        fs::write(&input, bytes)
            .map_err(|e| FolioError::ConversionFailed(format!("cannot stage input: {e}")))?;

        let output = Command::new(&self.binary)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(workdir)
            .arg(&input)
            .output()
            .map_err(|e| {
                FolioError::ConversionFailed(format!("cannot run {}: {e}", self.binary.display()))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FolioError::ConversionFailed(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                stderr.trim()
            )));
        }

        fs::read(workdir.join("input.pdf"))
            .map_err(|e| FolioError::ConversionFailed(format!("no PDF produced: {e}")))
    }
}

impl Default for OfficeConverter {
    fn default() -> Self {
        Self::new("soffice")
    }
}

impl DocumentConverter for OfficeConverter {
    fn convert_to_pdf(&self, bytes: &[u8], extension: &str) -> Result<Vec<u8>> {
        let workdir = tempfile::Builder::new()
            .prefix("folio-convert-")
            .tempdir_in(&self.scratch_root)
            .map_err(|e| FolioError::ConversionFailed(format!("cannot create scratch dir: {e}")))?;

        debug!(workdir = ?workdir.path(), extension, "converting document to PDF");
        let result = self.run(workdir.path(), bytes, extension);

        let path = workdir.path().to_path_buf();
        if let Err(e) = workdir.close() {
            warn!(workdir = ?path, "failed to remove conversion scratch dir: {e}");
        }
        result
    }
}
