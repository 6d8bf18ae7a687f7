//! WARC record reader for importing captured HTML responses.
//!
//! Records are framed by a `WARC/<version>` line, named fields up to a blank
//! line, and a block of exactly `Content-Length` bytes. Gzip-compressed files
//! (one member per record or one for the whole file) are detected from their
//! magic bytes.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use chrono::NaiveDateTime;
use flate2::bufread::MultiGzDecoder;

use crate::constants::{HTTP_STATUS_HEADER, WARC_DATE_FORMAT};
use crate::types::{Headers, header_value};
use crate::{OffTopicError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// One WARC record: its named fields (keys lower-cased) and its block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarcRecord {
    pub fields: Headers,
    pub block: Vec<u8>,
}

/// An HTML response captured in a WARC file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarcCapture {
    pub target_uri: String,
    pub datetime: NaiveDateTime,
    /// HTTP response headers, lower-cased, plus `http-status`.
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl WarcRecord {
    #[must_use]
    pub fn record_type(&self) -> Option<&str> {
        header_value(&self.fields, "warc-type")
    }

    #[must_use]
    pub fn target_uri(&self) -> Option<&str> {
        header_value(&self.fields, "warc-target-uri")
    }

    /// The HTML response this record carries, if any.
    ///
    /// Non-response records, DNS lookups and non-HTML responses yield
    /// `Ok(None)`.
    pub fn html_capture(&self) -> Result<Option<WarcCapture>> {
        if self.record_type() != Some("response") {
            return Ok(None);
        }
        let Some(target_uri) = self.target_uri() else {
            return Ok(None);
        };
        if target_uri.starts_with("dns:") {
            return Ok(None);
        }

        let (status, mut headers, body) = parse_http_response(&self.block).ok_or_else(|| {
            OffTopicError::InvalidWarc {
                location: target_uri.to_string(),
                reason: "response block is not an HTTP message".into(),
            }
        })?;
        let is_html = header_value(&headers, "content-type").is_some_and(|kind| kind.contains("text/html"));
        if !is_html {
            return Ok(None);
        }

        let raw_date = header_value(&self.fields, "warc-date").ok_or_else(|| OffTopicError::InvalidWarc {
            location: target_uri.to_string(),
            reason: "record has no WARC-Date".into(),
        })?;
        let datetime = NaiveDateTime::parse_from_str(raw_date.trim(), WARC_DATE_FORMAT).map_err(|err| {
            OffTopicError::InvalidWarc {
                location: target_uri.to_string(),
                reason: format!("bad WARC-Date {raw_date:?}: {err}"),
            }
        })?;

        headers.insert(HTTP_STATUS_HEADER.to_string(), status.to_string());
        Ok(Some(WarcCapture {
            target_uri: target_uri.to_string(),
            datetime,
            headers,
            body: body.to_vec(),
        }))
    }
}

fn parse_http_response(block: &[u8]) -> Option<(u16, Headers, &[u8])> {
    let (head, body) = match block.windows(4).position(|window| window == b"\r\n\r\n") {
        Some(end) => (&block[..end], &block[end + 4..]),
        None => {
            let end = block.windows(2).position(|window| window == b"\n\n")?;
            (&block[..end], &block[end + 2..])
        }
    };
    let head = String::from_utf8_lossy(head);
    let mut lines = head.lines();
    let status_line = lines.next()?;
    if !status_line.starts_with("HTTP/") {
        return None;
    }
    let status = status_line.split_whitespace().nth(1)?.parse().ok()?;

    let mut headers = Headers::new();
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        headers
            .entry(name.trim().to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value.trim());
            })
            .or_insert_with(|| value.trim().to_string());
    }
    Some((status, headers, body))
}

/// Streams [`WarcRecord`]s out of a reader.
pub struct WarcReader<R> {
    reader: R,
    offset: u64,
    records: usize,
}

impl WarcReader<Box<dyn BufRead>> {
    /// Opens a `.warc` or `.warc.gz` file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = BufReader::new(fs_err::File::open(path)?);
        let compressed = file.fill_buf()?.starts_with(&GZIP_MAGIC);
        tracing::debug!(path = %path.display(), compressed, "opening WARC file");
        let reader: Box<dyn BufRead> = if compressed {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(file)
        };
        Ok(Self::new(reader))
    }
}

impl<R: BufRead> WarcReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            offset: 0,
            records: 0,
        }
    }

    /// Records read so far.
    #[must_use]
    pub fn records(&self) -> usize {
        self.records
    }

    fn invalid(&self, reason: impl Into<String>) -> OffTopicError {
        OffTopicError::InvalidWarc {
            location: format!("record at byte {}", self.offset),
            reason: reason.into(),
        }
    }

    fn read_line(&mut self, line: &mut Vec<u8>) -> Result<usize> {
        line.clear();
        let read = self.reader.read_until(b'\n', line)?;
        self.offset += read as u64;
        Ok(read)
    }

    /// Reads the next record, or `None` at a clean end of input.
    pub fn next_record(&mut self) -> Result<Option<WarcRecord>> {
        let mut line = Vec::new();
        loop {
            if self.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            if !line.trim_ascii().is_empty() {
                break;
            }
        }
        if !line.starts_with(b"WARC/") {
            return Err(self.invalid("expected a WARC version line"));
        }

        let mut fields = Headers::new();
        loop {
            if self.read_line(&mut line)? == 0 {
                return Err(self.invalid("input ended inside record fields"));
            }
            let text = String::from_utf8_lossy(&line);
            let text = text.trim();
            if text.is_empty() {
                break;
            }
            if let Some((name, value)) = text.split_once(':') {
                fields.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }

        let length: usize = header_value(&fields, "content-length")
            .and_then(|value| value.parse().ok())
            .ok_or_else(|| self.invalid("record has no valid Content-Length"))?;
        let mut block = vec![0; length];
        match self.reader.read_exact(&mut block) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(self.invalid(format!("block truncated before {length} bytes")));
            }
            Err(err) => return Err(err.into()),
        }
        self.offset += length as u64;
        self.records += 1;
        Ok(Some(WarcRecord { fields, block }))
    }
}

impl<R: BufRead> Iterator for WarcReader<R> {
    type Item = Result<WarcRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;

    fn record(kind: &str, uri: &str, date: &str, block: &str) -> String {
        format!(
            "WARC/1.0\r\nWARC-Type: {kind}\r\nWARC-Target-URI: {uri}\r\nWARC-Date: {date}\r\n\
             Content-Length: {}\r\n\r\n{block}\r\n\r\n",
            block.len()
        )
    }

    fn html(body: &str) -> String {
        format!("HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nSet-Cookie: a=1\r\nSet-Cookie: b=2\r\n\r\n{body}")
    }

    #[test]
    fn reads_html_responses_and_skips_the_rest() {
        let warc = [
            record("warcinfo", "", "2015-06-01T10:00:00Z", "software: crawler"),
            record("response", "dns:a.example", "2015-06-01T10:00:00Z", "1.2.3.4"),
            record("response", "http://a.example/", "2015-06-01T10:00:01Z", &html("<p>river</p>")),
            record(
                "response",
                "http://a.example/logo.png",
                "2015-06-01T10:00:02Z",
                "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\n\r\nPNG",
            ),
        ]
        .concat();

        let mut reader = WarcReader::new(Cursor::new(warc.into_bytes()));
        let captures: Vec<WarcCapture> = reader
            .by_ref()
            .filter_map(|record| record.unwrap().html_capture().unwrap())
            .collect();
        assert_eq!(reader.records(), 4);
        assert_eq!(captures.len(), 1);

        let capture = &captures[0];
        assert_eq!(capture.target_uri, "http://a.example/");
        assert_eq!(capture.body, b"<p>river</p>");
        assert_eq!(capture.headers["http-status"], "200");
        assert_eq!(capture.headers["set-cookie"], "a=1, b=2");
        assert_eq!(capture.datetime.format("%Y%m%d%H%M%S").to_string(), "20150601100001");
    }

    #[test]
    fn truncated_block_is_reported() {
        let warc = "WARC/1.0\r\nWARC-Type: response\r\nContent-Length: 50\r\n\r\nshort";
        let mut reader = WarcReader::new(Cursor::new(warc.as_bytes()));
        assert!(matches!(
            reader.next_record(),
            Err(OffTopicError::InvalidWarc { reason, .. }) if reason.contains("truncated")
        ));
    }

    #[test]
    fn opens_gzipped_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.warc.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(record("response", "http://a.example/", "2015-06-01T10:00:01Z", &html("hi")).as_bytes())
            .unwrap();
        fs_err::write(&path, encoder.finish().unwrap()).unwrap();

        let records: Vec<WarcRecord> = WarcReader::open(&path).unwrap().map(Result::unwrap).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target_uri(), Some("http://a.example/"));
    }
}
