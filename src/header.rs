//! Gemini response header parsing
//!
//! A header is `<code><SP or TAB><meta>\n`. Older servers separate the
//! fields with a tab, so a tab that comes before the first space wins.

use std::fmt;
use std::str::FromStr;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result, MAX_HEADER_LEN};

/// Meta assumed for a success response that names no MIME type.
pub const DEFAULT_MIME: &str = "text/gemini; charset=utf-8";

/// A parsed response header: status code and meta field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub code: u16,
    pub meta: String,
}

impl Header {
    /// Parse one header line, with or without its terminator.
    pub fn parse(line: &str) -> Result<Self> {
        let (code, meta) = split_field(line.trim());
        let code: u16 = code
            .parse()
            .map_err(|_| Error::StatusCode(code.to_string()))?;

        let meta = match meta {
            Some(m) if !m.is_empty() => m.to_string(),
            _ if code == 20 => DEFAULT_MIME.to_string(),
            _ => String::new(),
        };

        Ok(Self { code, meta })
    }

    /// Whether the status is in the 2x success class.
    pub fn is_success(&self) -> bool {
        (20..30).contains(&self.code)
    }
}

impl FromStr for Header {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.meta)
    }
}

/// Read and parse a header from the start of a response stream.
///
/// Bytes are consumed one at a time so nothing past the terminator is
/// taken from the body.
pub async fn read_header<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Header> {
    let mut line = Vec::with_capacity(64);
    loop {
        let byte = reader.read_u8().await.map_err(Error::HeaderRead)?;
        if byte == b'\n' {
            break;
        }
        if line.len() == MAX_HEADER_LEN {
            return Err(Error::HeaderTooLong);
        }
        line.push(byte);
    }

    let line = std::str::from_utf8(&line).map_err(|_| Error::HeaderEncoding)?;
    Header::parse(line)
}

/// Split `s` at its field separator.
///
/// The separator is a single space unless a tab occurs before the first
/// space, or there is no space at all.
pub fn split_field(s: &str) -> (&str, Option<&str>) {
    let sep = match (s.find('\t'), s.find(' ')) {
        (Some(tab), Some(space)) if tab < space => '\t',
        (Some(_), None) => '\t',
        _ => ' ',
    };
    match s.split_once(sep) {
        Some((head, rest)) => (head, Some(rest)),
        None => (s, None),
    }
}
