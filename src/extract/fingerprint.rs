//! Content-identity hashing

use super::ContentFamily;
use sha2::{Digest, Sha256};

/// Collapses whitespace runs to a single space and trims the ends
///
/// Case is preserved: a change in capitalisation is a change in content.
pub fn canonicalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Computes the fingerprint of extracted text
///
/// The hash is taken over the canonical text. Binary families (PDF,
/// images, other) with empty canonical text hash the raw bytes instead, so
/// a changed scan or image still produces a new version. HTML and plain
/// text always hash the canonical text, even when it is empty.
///
/// # Examples
///
/// ```
/// use listed_harvest::extract::{fingerprint, ContentFamily};
///
/// let a = fingerprint("Annual  report\n 2024", b"<p>a</p>", ContentFamily::Html);
/// let b = fingerprint(" Annual report 2024 ", b"<p>b</p>", ContentFamily::Html);
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 64);
/// ```
pub fn fingerprint(text: &str, raw: &[u8], family: ContentFamily) -> String {
    let canonical = canonicalize(text);
    let binary = matches!(
        family,
        ContentFamily::Pdf | ContentFamily::Image | ContentFamily::Other
    );
    if canonical.is_empty() && binary {
        return checksum(raw);
    }
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// SHA-256 hex digest of raw bytes
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
