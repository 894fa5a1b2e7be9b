//! PDF extraction path

use lopdf::Document;
use tracing::debug;

/// Extracts page text from a PDF in page order
///
/// Pages are joined with a newline. Malformed documents and image-only
/// scans yield an empty string; no OCR is attempted.
pub fn extract_pdf_text(bytes: &[u8]) -> String {
    let document = match Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            debug!("Unreadable PDF: {}", e);
            return String::new();
        }
    };

    let mut pages = Vec::new();
    for page_number in document.get_pages().keys() {
        match document.extract_text(&[*page_number]) {
            Ok(text) => pages.push(text.trim_end().to_string()),
            Err(e) => debug!("No text on PDF page {}: {}", page_number, e),
        }
    }

    pages.join("\n")
}

/// Reads the document info title, if the PDF carries one
pub fn pdf_title(bytes: &[u8]) -> Option<String> {
    let document = Document::load_mem(bytes).ok()?;
    let info = document.trailer.get(b"Info").ok()?;
    let info = document.dereference(info).ok()?.1.as_dict().ok()?;
    let raw = info.get(b"Title").ok()?.as_str().ok()?;
    let title = String::from_utf8_lossy(raw).trim().to_string();
    (!title.is_empty()).then_some(title)
}
