//! Response writer module
//!
//! Decides between full, partial and not-found responses and streams the
//! header block plus the matching slice of the file to the connection.

use super::static_files::{FileMetadata, ResolvedFile};
use crate::http::{mime, response, RangeSpec, Status};
use std::io::{self, SeekFrom};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

/// How a found file is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseDecision {
    /// 200 with the whole file
    Full { length: u64 },
    /// 206 with bytes `start..=end` of a `total`-byte file
    Partial { start: u64, end: u64, total: u64 },
    /// 416, the range starts past the end of the file
    NotSatisfiable { total: u64 },
}

impl ResponseDecision {
    pub const fn status(&self) -> Status {
        match self {
            Self::Full { .. } => Status::Ok,
            Self::Partial { .. } => Status::PartialContent,
            Self::NotSatisfiable { .. } => Status::RangeNotSatisfiable,
        }
    }

    /// Bytes the body carries
    pub const fn content_length(&self) -> u64 {
        match self {
            Self::Full { length } => *length,
            Self::Partial { start, end, .. } => *end - *start + 1,
            Self::NotSatisfiable { .. } => 0,
        }
    }
}

/// Pick the response for a found file
///
/// `range_forced` marks extensions that are always answered with 206; with
/// no client range such a request covers the whole file.
pub const fn decide(range: RangeSpec, range_forced: bool, size: u64) -> ResponseDecision {
    if !range.is_requested() && (!range_forced || size == 0) {
        return ResponseDecision::Full { length: size };
    }

    let start = range.start();
    let end = range.end_position(size);
    if start >= size || start > end {
        return ResponseDecision::NotSatisfiable { total: size };
    }

    // Clamp to the last byte of the file as it is now
    let end = if end >= size { size - 1 } else { end };
    ResponseDecision::Partial {
        start,
        end,
        total: size,
    }
}

/// What was sent, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseSummary {
    pub status: Status,
    pub body_bytes: u64,
}

/// Per-request inputs besides the file itself
#[derive(Debug, Clone, Copy)]
pub struct ResponseParams<'a> {
    pub server_name: &'a str,
    pub extension: &'a str,
    pub range: RangeSpec,
    pub range_forced: bool,
}

/// Write the response for a resolved file (or its absence) to `conn`
///
/// The file handle is consumed and closed when this returns.
pub async fn respond<W>(
    conn: &mut W,
    file: Option<ResolvedFile>,
    params: ResponseParams<'_>,
) -> io::Result<ResponseSummary>
where
    W: AsyncWrite + Unpin,
{
    let Some(ResolvedFile { mut file, metadata }) = file else {
        conn.write_all(&response::build_404_head(params.server_name))
            .await?;
        conn.flush().await?;
        return Ok(ResponseSummary {
            status: Status::NotFound,
            body_bytes: 0,
        });
    };

    let decision = decide(params.range, params.range_forced, metadata.size_bytes);
    conn.write_all(&build_head(decision, &params, &metadata))
        .await?;

    let body_bytes = match decision {
        ResponseDecision::Full { length } => stream_body(&mut file, conn, 0, length).await?,
        ResponseDecision::Partial { start, .. } => {
            stream_body(&mut file, conn, start, decision.content_length()).await?
        }
        ResponseDecision::NotSatisfiable { .. } => 0,
    };
    conn.flush().await?;

    Ok(ResponseSummary {
        status: decision.status(),
        body_bytes,
    })
}

fn build_head(
    decision: ResponseDecision,
    params: &ResponseParams<'_>,
    meta: &FileMetadata,
) -> Vec<u8> {
    let content_type = mime::content_type(params.extension);
    match decision {
        ResponseDecision::Full { length } => response::build_200_head(
            params.server_name,
            length,
            content_type,
            &meta.last_modified,
        ),
        ResponseDecision::Partial { start, end, total } => response::build_206_head(
            params.server_name,
            start,
            end,
            total,
            content_type,
            &meta.last_modified,
        ),
        ResponseDecision::NotSatisfiable { total } => {
            response::build_416_head(params.server_name, total)
        }
    }
}

/// Copy exactly `len` bytes starting at `offset` from `file` into `conn`
async fn stream_body<R, W>(file: &mut R, conn: &mut W, offset: u64, len: u64) -> io::Result<u64>
where
    R: tokio::io::AsyncRead + tokio::io::AsyncSeek + Unpin,
    W: AsyncWrite + Unpin,
{
    if len == 0 {
        return Ok(0);
    }
    if offset > 0 {
        file.seek(SeekFrom::Start(offset)).await?;
    }

    let copied = tokio::io::copy(&mut file.take(len), conn).await?;
    if copied < len {
        // File shrank after stat; the declared Content-Length can't be met
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("file ended after {copied} of {len} bytes"),
        ));
    }
    Ok(copied)
}
