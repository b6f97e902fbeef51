//! HTTP response head module
//!
//! Builds the byte-exact status line and header block for every status this
//! server emits. Bodies are streamed separately by the writer.

use chrono::{DateTime, Utc};

/// Status codes this server can answer with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    PartialContent,
    BadRequest,
    NotFound,
    MethodNotAllowed,
    RangeNotSatisfiable,
    InternalServerError,
}

impl Status {
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::PartialContent => 206,
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::RangeNotSatisfiable => 416,
            Self::InternalServerError => 500,
        }
    }

    pub const fn reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::PartialContent => "Partial Content",
            Self::BadRequest => "Bad Request",
            Self::NotFound => "Not Found",
            Self::MethodNotAllowed => "Method Not Allowed",
            Self::RangeNotSatisfiable => "Range Not Satisfiable",
            Self::InternalServerError => "Internal Server Error",
        }
    }
}

/// Header block under construction
#[derive(Debug)]
pub struct ResponseHead {
    buf: String,
}

impl ResponseHead {
    pub fn new(status: Status) -> Self {
        Self {
            buf: format!("HTTP/1.1 {} {}\r\n", status.code(), status.reason()),
        }
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: impl std::fmt::Display) -> Self {
        use std::fmt::Write;
        // Writing into a String cannot fail
        let _ = write!(self.buf, "{name}: {value}\r\n");
        self
    }

    /// Terminate the block with the blank line
    pub fn finish(mut self) -> Vec<u8> {
        self.buf.push_str("\r\n");
        self.buf.into_bytes()
    }
}

/// Format a timestamp as an HTTP date (IMF-fixdate)
pub fn http_date(time: &DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Head of a 200 response
pub fn build_200_head(
    server_name: &str,
    content_length: u64,
    content_type: &str,
    last_modified: &DateTime<Utc>,
) -> Vec<u8> {
    ResponseHead::new(Status::Ok)
        .header("Server", server_name)
        .header("Content-Length", content_length)
        .header("Content-Type", content_type)
        .header("Last-Modified", http_date(last_modified))
        .header("Accept-Ranges", "bytes")
        .header("Connection", "close")
        .finish()
}

/// Head of a 206 response for the inclusive span `start..=end`
pub fn build_206_head(
    server_name: &str,
    start: u64,
    end: u64,
    total_size: u64,
    content_type: &str,
    last_modified: &DateTime<Utc>,
) -> Vec<u8> {
    ResponseHead::new(Status::PartialContent)
        .header("Server", server_name)
        .header("Content-Range", format!("bytes {start}-{end}/{total_size}"))
        .header("Content-Length", end - start + 1)
        .header("Content-Type", content_type)
        .header("Last-Modified", http_date(last_modified))
        .header("Accept-Ranges", "bytes")
        .header("Connection", "close")
        .finish()
}

/// Head of a 404 response (no body follows)
pub fn build_404_head(server_name: &str) -> Vec<u8> {
    ResponseHead::new(Status::NotFound)
        .header("Server", server_name)
        .header("Content-Length", 0)
        .header("Connection", "close")
        .finish()
}

/// Head of a 416 response
pub fn build_416_head(server_name: &str, total_size: u64) -> Vec<u8> {
    ResponseHead::new(Status::RangeNotSatisfiable)
        .header("Server", server_name)
        .header("Content-Range", format!("bytes */{total_size}"))
        .header("Content-Length", 0)
        .header("Connection", "close")
        .finish()
}

/// Head of a 400 response
pub fn build_400_head(server_name: &str) -> Vec<u8> {
    ResponseHead::new(Status::BadRequest)
        .header("Server", server_name)
        .header("Connection", "close")
        .finish()
}

/// Head of a 405 response
pub fn build_405_head(server_name: &str) -> Vec<u8> {
    ResponseHead::new(Status::MethodNotAllowed)
        .header("Server", server_name)
        .header("Allow", "GET")
        .header("Connection", "close")
        .finish()
}

/// Bare 500 status line and blank line
pub fn build_500_head() -> Vec<u8> {
    ResponseHead::new(Status::InternalServerError).finish()
}
