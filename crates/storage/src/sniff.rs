//! Content sniffing.
//!
//! The media type of an upload is inferred from its leading bytes rather
//! than trusted from the uploader. Only the first [`SNIFF_LEN`] bytes are
//! ever inspected.

/// Number of leading bytes considered when sniffing.
pub const SNIFF_LEN: usize = 512;

pub const OCTET_STREAM: &str = "application/octet-stream";
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub const TEXT_HTML: &str = "text/html; charset=utf-8";

const PDF_MAGIC: &[u8] = b"%PDF-";
const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const GIF87_MAGIC: &[u8] = b"GIF87a";
const GIF89_MAGIC: &[u8] = b"GIF89a";
const BMP_MAGIC: &[u8] = b"BM";
const ICO_MAGIC: &[u8] = &[0x00, 0x00, 0x01, 0x00];
const ID3_MAGIC: &[u8] = b"ID3";
const OGG_MAGIC: &[u8] = b"OggS\x00";
const EBML_MAGIC: &[u8] = &[0x1A, 0x45, 0xDF, 0xA3];
const MPEG_PS_MAGIC: &[u8] = &[0x00, 0x00, 0x01, 0xBA];
const MPEG_VIDEO_MAGIC: &[u8] = &[0x00, 0x00, 0x01, 0xB3];
const ZIP_MAGIC: &[u8] = &[0x50, 0x4B, 0x03, 0x04];
const GZIP_MAGIC: &[u8] = &[0x1F, 0x8B, 0x08];
const HTML_PREFIXES: [&[u8]; 5] = [b"<!doctype html", b"<html", b"<head", b"<body", b"<!--"];

/// Detect the MIME type of `bytes`.
///
/// Always returns a valid MIME type, falling back to
/// [`OCTET_STREAM`] when nothing matches.
#[must_use]
pub fn content_type(bytes: &[u8]) -> &'static str {
    let bytes = &bytes[..bytes.len().min(SNIFF_LEN)];
    if let Some(riff) = riff_type(bytes) {
        return riff;
    }
    if let Some(mp4) = mp4_type(bytes) {
        return mp4;
    }
    let table: [(&[u8], &'static str); 14] = [
        (PDF_MAGIC, "application/pdf"),
        (PNG_MAGIC, "image/png"),
        (JPEG_MAGIC, "image/jpeg"),
        (GIF87_MAGIC, "image/gif"),
        (GIF89_MAGIC, "image/gif"),
        (ICO_MAGIC, "image/x-icon"),
        (ID3_MAGIC, "audio/mpeg"),
        (OGG_MAGIC, "application/ogg"),
        (EBML_MAGIC, "video/webm"),
        (MPEG_PS_MAGIC, "video/mpeg"),
        (MPEG_VIDEO_MAGIC, "video/mpeg"),
        (ZIP_MAGIC, "application/zip"),
        (GZIP_MAGIC, "application/x-gzip"),
        (BMP_MAGIC, "image/bmp"),
    ];
    if let Some((_, mime)) = table.iter().find(|(magic, _)| bytes.starts_with(magic)) {
        return mime;
    }
    if is_html(bytes) {
        return TEXT_HTML;
    }
    if !bytes.iter().any(|b| is_binary_byte(*b)) {
        return TEXT_PLAIN;
    }
    OCTET_STREAM
}

/// Whether a sniffed MIME type denotes a video container.
#[must_use]
pub fn is_video(content_type: &str) -> bool {
    content_type.starts_with("video/")
}

fn riff_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 12 || !bytes.starts_with(b"RIFF") {
        return None;
    }
    match &bytes[8..12] {
        b"AVI " => Some("video/avi"),
        b"WAVE" => Some("audio/wave"),
        b"WEBP" => Some("image/webp"),
        _ => None,
    }
}

/// ISO base media files start with a `ftyp` box whose declared size must be
/// plausible for the buffer.
fn mp4_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 12 || &bytes[4..8] != b"ftyp" {
        return None;
    }
    let box_size = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    if box_size < 12 || box_size % 4 != 0 {
        return None;
    }
    match &bytes[8..12] {
        b"qt  " => Some("video/quicktime"),
        b"M4A " => Some("audio/mp4"),
        _ => Some("video/mp4"),
    }
}

fn is_html(bytes: &[u8]) -> bool {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    let rest = &bytes[start..];
    HTML_PREFIXES
        .iter()
        .any(|prefix| rest.len() >= prefix.len() && rest[..prefix.len()].eq_ignore_ascii_case(prefix))
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}
