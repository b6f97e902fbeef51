//! Request parsing module
//!
//! Turns the raw bytes of one HTTP/1.x request into a [`ParsedRequest`].
//! Only the request line and the `Range` header matter; other headers are skipped.

use super::range::{self, RangeSpec};
use std::borrow::Cow;

/// Structured form of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    /// Request method token as sent (e.g. `GET`)
    pub method: String,
    /// Request target without query string
    pub path: String,
    /// Lowercase text after the last `.` in `path`, empty if none
    pub extension: String,
    /// Requested byte range
    pub range: RangeSpec,
}

impl ParsedRequest {
    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }
}

/// Request parse failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// First line has no request target
    MalformedRequestLine,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedRequestLine => write!(f, "malformed request line"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse raw request bytes
///
/// # Examples
/// ```ignore
/// let req = parse(b"GET /video.mp4 HTTP/1.1\r\nRange: bytes=0-\r\n\r\n")?;
/// assert_eq!(req.extension, "mp4");
/// assert_eq!(req.range, RangeSpec::OpenEnded { start: 0 });
/// ```
pub fn parse(raw: &[u8]) -> Result<ParsedRequest, ParseError> {
    let text = String::from_utf8_lossy(raw);
    let mut lines = split_lines(&text);

    let request_line = lines.next().ok_or(ParseError::MalformedRequestLine)?;
    let mut tokens = request_line.split_whitespace();
    let method = tokens.next().ok_or(ParseError::MalformedRequestLine)?;
    let target = tokens.next().ok_or(ParseError::MalformedRequestLine)?;

    let path = strip_query(target);
    let range = range::parse_range_header(find_header(lines, "range"));

    Ok(ParsedRequest {
        method: method.to_string(),
        path: path.to_string(),
        extension: extension_of(path).into_owned(),
        range,
    })
}

/// Lines of the header section, stopping at the blank line
fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .take_while(|line| !line.is_empty())
}

/// Value of the first header named `name` (case-insensitive)
fn find_header<'a>(lines: impl Iterator<Item = &'a str>, name: &str) -> Option<&'a str> {
    lines
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case(name))
        .map(|(_, value)| value.trim())
}

fn strip_query(target: &str) -> &str {
    target.split_once('?').map_or(target, |(path, _)| path)
}

/// File extension used for media type and forced-range decisions
///
/// Text after the last `.` anywhere in the path, so `/v1.2/readme` yields
/// `2/readme`, which maps to no known media type.
pub fn extension_of(path: &str) -> Cow<'_, str> {
    match path.rsplit_once('.') {
        Some((_, ext)) if ext.bytes().any(|b| b.is_ascii_uppercase()) => {
            Cow::Owned(ext.to_ascii_lowercase())
        }
        Some((_, ext)) => Cow::Borrowed(ext),
        None => Cow::Borrowed(""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_get() {
        let req = parse(b"GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/index.html");
        assert_eq!(req.extension, "html");
        assert_eq!(req.range, RangeSpec::None);
        assert!(req.is_get());
    }

    #[test]
    fn test_parse_bounded_range() {
        let raw = b"GET /index.html HTTP/1.1\r\nHost: x\r\nRange: bytes=50-149\r\n\r\n";
        let req = parse(raw).unwrap();
        assert_eq!(
            req.range,
            RangeSpec::Bounded {
                start: 50,
                end: 149
            }
        );
    }

    #[test]
    fn test_parse_open_range_case_insensitive_header() {
        let raw = b"GET /a.bin HTTP/1.1\r\nrange:bytes=10-\r\n\r\n";
        let req = parse(raw).unwrap();
        assert_eq!(req.range, RangeSpec::OpenEnded { start: 10 });
    }

    #[test]
    fn test_malformed_range_is_not_an_error() {
        let raw = b"GET /a.bin HTTP/1.1\r\nRange: lines=1-2\r\n\r\n";
        let req = parse(raw).unwrap();
        assert_eq!(req.range, RangeSpec::None);
    }

    #[test]
    fn test_range_after_blank_line_is_ignored() {
        let raw = b"GET /a.bin HTTP/1.1\r\n\r\nRange: bytes=0-1\r\n";
        let req = parse(raw).unwrap();
        assert_eq!(req.range, RangeSpec::None);
    }

    #[test]
    fn test_bare_lf_line_endings() {
        let req = parse(b"GET /clip.MP4 HTTP/1.0\nRange: bytes=0-0\n\n").unwrap();
        assert_eq!(req.extension, "mp4");
        assert_eq!(req.range, RangeSpec::Bounded { start: 0, end: 0 });
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension_of("/video.mp4"), "mp4");
        assert_eq!(extension_of("/archive.tar.GZ"), "gz");
        assert_eq!(extension_of("/README"), "");
        assert_eq!(extension_of("/"), "");
        assert_eq!(extension_of("/v1.2/readme"), "2/readme");
        assert_eq!(
            crate::http::mime::content_type(&extension_of("/v1.2/readme")),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_query_is_stripped() {
        let req = parse(b"GET /movie.mp4?t=10 HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.path, "/movie.mp4");
        assert_eq!(req.extension, "mp4");
    }

    #[test]
    fn test_malformed_request_line() {
        assert_eq!(parse(b""), Err(ParseError::MalformedRequestLine));
        assert_eq!(parse(b"\r\n\r\n"), Err(ParseError::MalformedRequestLine));
        assert_eq!(parse(b"GET\r\n\r\n"), Err(ParseError::MalformedRequestLine));
    }

    #[test]
    fn test_other_methods_parse() {
        let req = parse(b"POST /upload HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.method, "POST");
        assert!(!req.is_get());
    }

    #[test]
    fn test_invalid_utf8_does_not_panic() {
        let req = parse(b"GET /\xff\xfe.txt HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.extension, "txt");
    }
}
