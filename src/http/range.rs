//! HTTP Range header parsing module
//!
//! Recognizes the single-range `bytes=` forms this server answers with 206.
//! Parsing never looks at the file: clamping against the real size happens
//! when the response is decided.

/// Byte range requested by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangeSpec {
    /// No usable Range header
    #[default]
    None,
    /// `bytes=<start>-`, serve from `start` to end of file
    OpenEnded { start: u64 },
    /// `bytes=<start>-<end>`, both offsets inclusive
    Bounded { start: u64, end: u64 },
}

impl RangeSpec {
    /// Whether the client asked for a range at all
    #[inline]
    pub const fn is_requested(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Start offset, 0 when no range was requested
    #[inline]
    pub const fn start(&self) -> u64 {
        match self {
            Self::None => 0,
            Self::OpenEnded { start } | Self::Bounded { start, .. } => *start,
        }
    }

    /// Inclusive end offset given the current file size
    #[inline]
    pub const fn end_position(&self, file_size: u64) -> u64 {
        match self {
            Self::Bounded { end, .. } => *end,
            Self::None | Self::OpenEnded { .. } => file_size.saturating_sub(1),
        }
    }
}

impl std::fmt::Display for RangeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "-"),
            Self::OpenEnded { start } => write!(f, "bytes={start}-"),
            Self::Bounded { start, end } => write!(f, "bytes={start}-{end}"),
        }
    }
}

/// Parse the value of a Range header
///
/// Supported formats:
/// - `bytes=start-end` - Specific range
/// - `bytes=start-` - From start to end of file
///
/// Anything else (suffix ranges, other units, multiple ranges, garbage)
/// yields [`RangeSpec::None`]; a bad Range header is never an error.
pub fn parse_range_header(range_header: Option<&str>) -> RangeSpec {
    let Some(header) = range_header else {
        return RangeSpec::None;
    };

    let Some(spec) = header.trim().strip_prefix("bytes=") else {
        return RangeSpec::None; // Not bytes unit, ignore
    };

    // Only single ranges
    if spec.contains(',') {
        return RangeSpec::None;
    }

    let Some((start_str, end_str)) = spec.split_once('-') else {
        return RangeSpec::None;
    };

    let Some(start) = parse_offset(start_str.trim()) else {
        return RangeSpec::None;
    };

    let end_str = end_str.trim();
    if end_str.is_empty() {
        return RangeSpec::OpenEnded { start };
    }

    match parse_offset(end_str) {
        Some(end) => RangeSpec::Bounded { start, end },
        None => RangeSpec::None,
    }
}

/// Digits only: `u64::from_str` would also take a leading `+`
fn parse_offset(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_range() {
        assert_eq!(parse_range_header(None), RangeSpec::None);
    }

    #[test]
    fn test_bounded_range() {
        let range = parse_range_header(Some("bytes=0-9"));
        assert_eq!(range, RangeSpec::Bounded { start: 0, end: 9 });
        assert_eq!(range.start(), 0);
        assert_eq!(range.end_position(100), 9);
    }

    #[test]
    fn test_open_range() {
        let range = parse_range_header(Some("bytes=50-"));
        assert_eq!(range, RangeSpec::OpenEnded { start: 50 });
        assert_eq!(range.end_position(100), 99);
    }

    #[test]
    fn test_range_ignores_file_size() {
        // Offsets past any plausible file are still parsed as written
        assert_eq!(
            parse_range_header(Some("bytes=5000-9000")),
            RangeSpec::Bounded {
                start: 5000,
                end: 9000
            }
        );
    }

    #[test]
    fn test_unrecognized_shapes_are_none() {
        for value in [
            "bytes=-20",
            "bytes=a-b",
            "bytes=0-9,20-29",
            "items=0-9",
            "bytes=",
            "bytes=10",
            "bytes=+1-2",
            "bytes=1-x",
            "bytes=99999999999999999999999-",
        ] {
            assert_eq!(parse_range_header(Some(value)), RangeSpec::None, "{value}");
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(RangeSpec::None.to_string(), "-");
        assert_eq!(RangeSpec::OpenEnded { start: 3 }.to_string(), "bytes=3-");
        assert_eq!(
            RangeSpec::Bounded { start: 1, end: 2 }.to_string(),
            "bytes=1-2"
        );
    }
}
