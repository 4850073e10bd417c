use std::path::Path;

use lopdf::{Document as LoDocument, Object as LoObject};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdfInspectError {
    #[error("PDF_PARSE_FAILED: {0}")]
    ParseFailed(String),
    #[error("PDF_IO_ERROR: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfInspectReport {
    pub pdf_version: String,
    pub page_count: usize,
    pub encrypted: bool,
    pub file_size_bytes: usize,
    /// Image XObjects, soft masks included.
    pub image_count: usize,
    pub title: Option<String>,
}

/// Parses PDF bytes and reports their basic structure.
pub fn inspect_pdf_bytes(bytes: &[u8]) -> Result<PdfInspectReport, PdfInspectError> {
    let pdf =
        LoDocument::load_mem(bytes).map_err(|err| PdfInspectError::ParseFailed(err.to_string()))?;

    let image_count = pdf
        .objects
        .values()
        .filter(|object| match object {
            LoObject::Stream(stream) => matches!(
                stream.dict.get(b"Subtype"),
                Ok(LoObject::Name(name)) if name.as_slice() == b"Image"
            ),
            _ => false,
        })
        .count();

    let title = pdf
        .trailer
        .get(b"Info")
        .and_then(LoObject::as_reference)
        .and_then(|id| pdf.get_dictionary(id))
        .and_then(|info| info.get(b"Title"))
        .and_then(LoObject::as_str)
        .ok()
        .map(|raw| String::from_utf8_lossy(raw).into_owned());

    Ok(PdfInspectReport {
        pdf_version: pdf.version.clone(),
        page_count: pdf.get_pages().len(),
        encrypted: pdf.is_encrypted(),
        file_size_bytes: bytes.len(),
        image_count,
        title,
    })
}

pub fn inspect_pdf_path(path: &Path) -> Result<PdfInspectReport, PdfInspectError> {
    let data = std::fs::read(path)?;
    inspect_pdf_bytes(&data)
}
