//! Resolves what kind of bytes a fetch returned

use url::Url;

/// Coarse content family used to pick an extraction path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFamily {
    Html,
    Pdf,
    Image,
    Text,
    Other,
}

/// Declared types that carry no real information
const GENERIC_TYPES: &[&str] = &[
    "application/octet-stream",
    "binary/octet-stream",
    "application/download",
    "application/force-download",
    "application/x-download",
];

/// Resolves the MIME type of a response body
///
/// The transport-declared type wins unless it is missing or generic, in
/// which case the leading bytes are sniffed, then the URL extension is
/// consulted. Parameters such as `charset` are stripped.
pub fn resolve_mime(declared: Option<&str>, body: &[u8], url: Option<&Url>) -> String {
    if let Some(declared) = declared {
        let essence = essence(declared);
        if !essence.is_empty() && !GENERIC_TYPES.contains(&essence.as_str()) {
            return essence;
        }
    }

    if let Some(sniffed) = sniff(body) {
        return sniffed.to_string();
    }

    if let Some(ext) = url.and_then(crate::url::path_extension) {
        if let Some(mime) = mime_for_extension(&ext) {
            return mime.to_string();
        }
    }

    "application/octet-stream".to_string()
}

/// Maps a resolved MIME type to its extraction family
pub fn family(mime: &str) -> ContentFamily {
    match mime {
        "text/html" | "application/xhtml+xml" => ContentFamily::Html,
        "application/pdf" => ContentFamily::Pdf,
        m if m.starts_with("image/") => ContentFamily::Image,
        m if m.starts_with("text/") => ContentFamily::Text,
        _ => ContentFamily::Other,
    }
}

/// Guesses a MIME type from a lowercase file extension
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext {
        "html" | "htm" => "text/html",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "xml" => "application/xml",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => return None,
    };
    Some(mime)
}

fn essence(declared: &str) -> String {
    declared
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

fn sniff(body: &[u8]) -> Option<&'static str> {
    if body.starts_with(b"%PDF-") {
        return Some("application/pdf");
    }
    if body.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    if body.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if body.starts_with(b"GIF87a") || body.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if body.len() >= 12 && &body[0..4] == b"RIFF" && &body[8..12] == b"WEBP" {
        return Some("image/webp");
    }

    let head = &body[..body.len().min(512)];
    let head = String::from_utf8_lossy(head).trim_start().to_ascii_lowercase();
    if head.starts_with("<!doctype html") || head.starts_with("<html") {
        return Some("text/html");
    }

    None
}
