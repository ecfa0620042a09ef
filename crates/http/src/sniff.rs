//! Content-type sniffing for responses whose handler did not set `Content-Type`.
//!
//! [`detect_content_type`] looks at no more than the first 512 bytes of a body and walks a
//! signature table in the order of the WHATWG MIME sniffing algorithm: markup, documents,
//! byte order marks, images, audio and video, fonts, archives and finally plain text.
//! Anything unrecognised that contains binary bytes is `application/octet-stream`.

use mime::Mime;

/// Number of leading body bytes considered.
pub const SNIFF_LEN: usize = 512;

enum Sig {
    /// Bytes that must match exactly at the start.
    Exact(&'static [u8], &'static str),
    /// `data[i] & mask[i] == pattern[i]`, optionally after leading whitespace.
    Masked { mask: &'static [u8], pattern: &'static [u8], skip_ws: bool, content_type: &'static str },
    /// A case-insensitive HTML tag, after leading whitespace, followed by a space or `>`.
    Html(&'static [u8]),
    Mp4,
    Text,
}

const HTML_UTF_8: &str = "text/html; charset=utf-8";

static SNIFF_SIGNATURES: &[Sig] = &[
    Sig::Html(b"<!DOCTYPE HTML"),
    Sig::Html(b"<HTML"),
    Sig::Html(b"<HEAD"),
    Sig::Html(b"<SCRIPT"),
    Sig::Html(b"<IFRAME"),
    Sig::Html(b"<H1"),
    Sig::Html(b"<DIV"),
    Sig::Html(b"<FONT"),
    Sig::Html(b"<TABLE"),
    Sig::Html(b"<A"),
    Sig::Html(b"<STYLE"),
    Sig::Html(b"<TITLE"),
    Sig::Html(b"<B"),
    Sig::Html(b"<BODY"),
    Sig::Html(b"<BR"),
    Sig::Html(b"<P"),
    Sig::Html(b"<!--"),
    Sig::Masked { mask: b"\xFF\xFF\xFF\xFF\xFF", pattern: b"<?xml", skip_ws: true, content_type: "text/xml; charset=utf-8" },
    Sig::Exact(b"%PDF-", "application/pdf"),
    Sig::Exact(b"%!PS-Adobe-", "application/postscript"),
    // byte order marks
    Sig::Masked { mask: b"\xFF\xFF\x00\x00", pattern: b"\xFE\xFF\x00\x00", skip_ws: false, content_type: "text/plain; charset=utf-16be" },
    Sig::Masked { mask: b"\xFF\xFF\x00\x00", pattern: b"\xFF\xFE\x00\x00", skip_ws: false, content_type: "text/plain; charset=utf-16le" },
    Sig::Masked { mask: b"\xFF\xFF\xFF\x00", pattern: b"\xEF\xBB\xBF\x00", skip_ws: false, content_type: "text/plain; charset=utf-8" },
    // images
    Sig::Exact(b"\x00\x00\x01\x00", "image/x-icon"),
    Sig::Exact(b"\x00\x00\x02\x00", "image/x-icon"),
    Sig::Exact(b"BM", "image/bmp"),
    Sig::Exact(b"GIF87a", "image/gif"),
    Sig::Exact(b"GIF89a", "image/gif"),
    Sig::Masked {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF\xFF\xFF",
        pattern: b"RIFF\x00\x00\x00\x00WEBPVP",
        skip_ws: false,
        content_type: "image/webp",
    },
    Sig::Exact(b"\x89PNG\x0D\x0A\x1A\x0A", "image/png"),
    Sig::Exact(b"\xFF\xD8\xFF", "image/jpeg"),
    // audio and video
    Sig::Masked {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        pattern: b"FORM\x00\x00\x00\x00AIFF",
        skip_ws: false,
        content_type: "audio/aiff",
    },
    Sig::Masked { mask: b"\xFF\xFF\xFF", pattern: b"ID3", skip_ws: false, content_type: "audio/mpeg" },
    Sig::Masked { mask: b"\xFF\xFF\xFF\xFF\xFF", pattern: b"OggS\x00", skip_ws: false, content_type: "application/ogg" },
    Sig::Masked {
        mask: b"\xFF\xFF\xFF\xFF\xFF\xFF\xFF\xFF",
        pattern: b"MThd\x00\x00\x00\x06",
        skip_ws: false,
        content_type: "audio/midi",
    },
    Sig::Masked {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        pattern: b"RIFF\x00\x00\x00\x00AVI ",
        skip_ws: false,
        content_type: "video/avi",
    },
    Sig::Masked {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        pattern: b"RIFF\x00\x00\x00\x00WAVE",
        skip_ws: false,
        content_type: "audio/wave",
    },
    Sig::Mp4,
    Sig::Exact(b"\x1A\x45\xDF\xA3", "video/webm"),
    // fonts
    Sig::Exact(b"\x00\x01\x00\x00", "font/ttf"),
    Sig::Exact(b"OTTO", "font/otf"),
    Sig::Exact(b"ttcf", "font/collection"),
    Sig::Exact(b"wOFF", "font/woff"),
    Sig::Exact(b"wOF2", "font/woff2"),
    // archives
    Sig::Exact(b"\x1F\x8B\x08", "application/x-gzip"),
    Sig::Exact(b"PK\x03\x04", "application/zip"),
    Sig::Exact(b"Rar!\x1A\x07\x00", "application/x-rar-compressed"),
    Sig::Exact(b"Rar!\x1A\x07\x01\x00", "application/x-rar-compressed"),
    Sig::Exact(b"\x00\x61\x73\x6D", "application/wasm"),
    Sig::Text,
];

/// Guesses the media type of a body from its first bytes.
///
/// Always returns a valid type, `application/octet-stream` when nothing else matches.
pub fn detect_content_type(data: &[u8]) -> Mime {
    let data = &data[..data.len().min(SNIFF_LEN)];
    let first_non_ws = data.iter().position(|b| !is_ws(*b)).unwrap_or(data.len());

    SNIFF_SIGNATURES
        .iter()
        .find_map(|sig| sig.matches(data, first_non_ws))
        .and_then(|content_type| content_type.parse().ok())
        .unwrap_or(mime::APPLICATION_OCTET_STREAM)
}

impl Sig {
    fn matches(&self, data: &[u8], first_non_ws: usize) -> Option<&'static str> {
        match self {
            Sig::Exact(sig, content_type) => data.starts_with(sig).then_some(*content_type),

            Sig::Masked { mask, pattern, skip_ws, content_type } => {
                let data = if *skip_ws { &data[first_non_ws..] } else { data };
                if data.len() < pattern.len() {
                    return None;
                }
                data.iter().zip(mask.iter()).zip(pattern.iter()).all(|((d, m), p)| d & m == *p).then_some(*content_type)
            }

            Sig::Html(sig) => {
                let data = &data[first_non_ws..];
                if data.len() < sig.len() + 1 {
                    return None;
                }
                let same = sig.iter().zip(data).all(|(s, d)| {
                    // letters in the signature are upper case and match either case
                    if s.is_ascii_uppercase() { d & 0xDF == *s } else { d == s }
                });
                (same && is_tag_terminator(data[sig.len()])).then_some(HTML_UTF_8)
            }

            Sig::Mp4 => is_mp4(data).then_some("video/mp4"),

            Sig::Text => {
                let binary = data[first_non_ws..].iter().any(|b| is_binary(*b));
                (!binary).then_some("text/plain; charset=utf-8")
            }
        }
    }
}

fn is_mp4(data: &[u8]) -> bool {
    if data.len() < 12 {
        return false;
    }

    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if data.len() < box_size || box_size % 4 != 0 || &data[4..8] != b"ftyp" {
        return false;
    }

    // brands follow in steps of four, offset 12 holds the minor version
    (8..box_size).step_by(4).filter(|st| *st != 12).any(|st| data.get(st..st + 3) == Some(b"mp4".as_slice()))
}

fn is_ws(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

fn is_tag_terminator(b: u8) -> bool {
    b == b' ' || b == b'>'
}

fn is_binary(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sniff(data: &[u8]) -> String {
        detect_content_type(data).to_string()
    }

    #[test]
    fn plain_text() {
        assert_eq!(sniff(b"hi"), "text/plain; charset=utf-8");
        assert_eq!(sniff(b""), "text/plain; charset=utf-8");
    }

    #[test]
    fn html_with_leading_whitespace() {
        assert_eq!(sniff(b"  \n<html><body>hello</body></html>"), "text/html; charset=utf-8");
        assert_eq!(sniff(b"<!doctype html>"), "text/html; charset=utf-8");
        assert_eq!(sniff(b"<p>"), "text/html; charset=utf-8");
        // a tag must be terminated
        assert_eq!(sniff(b"<pre"), "text/plain; charset=utf-8");
    }

    #[test]
    fn xml_and_documents() {
        assert_eq!(sniff(b"<?xml version=\"1.0\"?>"), "text/xml; charset=utf-8");
        assert_eq!(sniff(b"%PDF-1.7"), "application/pdf");
    }

    #[test]
    fn images() {
        assert_eq!(sniff(b"\x89PNG\x0D\x0A\x1A\x0Arest"), "image/png");
        assert_eq!(sniff(b"GIF89a...."), "image/gif");
        assert_eq!(sniff(b"\xFF\xD8\xFF\xE0"), "image/jpeg");
        assert_eq!(sniff(b"RIFF\x10\x00\x00\x00WEBPVP8 "), "image/webp");
    }

    #[test]
    fn mp4() {
        let data = b"\x00\x00\x00\x18ftypmp42\x00\x00\x00\x00mp42isom";
        assert_eq!(sniff(data), "video/mp4");
    }

    #[test]
    fn binary_fallback() {
        assert_eq!(sniff(b"\x00\x01\x02\x03binary"), "application/octet-stream");
        assert_eq!(sniff(b"\x1F\x8B\x08\x00"), "application/x-gzip");
    }

    #[test]
    fn only_the_first_bytes_count() {
        let mut data = vec![b'a'; SNIFF_LEN];
        data.push(0x00);
        assert_eq!(sniff(&data), "text/plain; charset=utf-8");
    }
}
