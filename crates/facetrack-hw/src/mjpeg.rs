//! HTTP multipart (`multipart/x-mixed-replace`) JPEG streams.
//!
//! Each part is handed out as encoded JPEG bytes; nothing is decoded here.

use chrono::Utc;
use facetrack_core::{CameraConfig, CaptureError, Frame, FrameSource, PixelLayout};
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::time::Duration;
use thiserror::Error;

/// Largest part accepted before the stream is considered malformed.
pub const MAX_PART_BYTES: usize = 16 * 1024 * 1024;
const MAX_HEADER_LINE: usize = 8 * 1024;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Bound on the request and on every body read, so a silent server cannot
/// hold a worker past its stop signal.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

#[derive(Debug, Error)]
pub enum MjpegError {
    #[error("stream closed")]
    Closed,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed part: {0}")]
    Malformed(String),
    #[error("part of {0} bytes exceeds limit")]
    TooLarge(usize),
}

/// Splits a multipart body into parts.
///
/// Lines starting with `--` delimit parts. A part's body length comes from
/// its `Content-Length` header; without one, the body runs to the JPEG
/// end-of-image marker.
pub struct PartReader<R> {
    inner: R,
}

impl<R: BufRead> PartReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read the next JPEG part.
    pub fn next_part(&mut self) -> Result<Vec<u8>, MjpegError> {
        // Skip preamble / the CRLF left after the previous body.
        loop {
            let line = self.read_line()?;
            if line.len() > 4 && line.starts_with(b"--") && line.ends_with(b"--") {
                return Err(MjpegError::Closed);
            }
            if line.starts_with(b"--") {
                break;
            }
        }

        let mut content_length = None;
        loop {
            let line = self.read_line()?;
            if line.is_empty() {
                break;
            }
            if let Some(len) = parse_content_length(&line)? {
                content_length = Some(len);
            }
        }

        let body = match content_length {
            Some(len) if len > MAX_PART_BYTES => return Err(MjpegError::TooLarge(len)),
            Some(len) => {
                let mut body = vec![0u8; len];
                self.inner.read_exact(&mut body).map_err(|e| match e.kind() {
                    ErrorKind::UnexpectedEof => MjpegError::Closed,
                    _ => MjpegError::Io(e),
                })?;
                body
            }
            None => self.read_until_eoi()?,
        };

        if !body.starts_with(&JPEG_SOI) {
            return Err(MjpegError::Malformed("missing JPEG start marker".into()));
        }
        Ok(body)
    }

    /// One line without its trailing CRLF, at most `MAX_HEADER_LINE` bytes.
    fn read_line(&mut self) -> Result<Vec<u8>, MjpegError> {
        let mut line = Vec::new();
        let limit = MAX_HEADER_LINE as u64 + 2;
        if (&mut self.inner).take(limit).read_until(b'\n', &mut line)? == 0 {
            return Err(MjpegError::Closed);
        }
        if line.len() as u64 == limit && !line.ends_with(b"\n") {
            return Err(MjpegError::Malformed("line too long".into()));
        }
        while matches!(line.last(), Some(b'\n' | b'\r')) {
            line.pop();
        }
        Ok(line)
    }

    fn read_until_eoi(&mut self) -> Result<Vec<u8>, MjpegError> {
        let mut body = Vec::new();
        loop {
            let remaining = (MAX_PART_BYTES + 1 - body.len()) as u64;
            if (&mut self.inner).take(remaining).read_until(JPEG_EOI[1], &mut body)? == 0 {
                return Err(MjpegError::Closed);
            }
            if body.len() > MAX_PART_BYTES {
                return Err(MjpegError::TooLarge(body.len()));
            }
            if body.ends_with(&JPEG_EOI) {
                return Ok(body);
            }
        }
    }
}

fn parse_content_length(line: &[u8]) -> Result<Option<usize>, MjpegError> {
    let Ok(line) = std::str::from_utf8(line) else {
        return Ok(None);
    };
    let Some((name, value)) = line.split_once(':') else {
        return Ok(None);
    };
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return Ok(None);
    }
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| MjpegError::Malformed(format!("bad Content-Length: {}", value.trim())))
}

fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock)
        || err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
            .is_some_and(reqwest::Error::is_timeout)
}

/// JPEG frames pulled from an HTTP multipart endpoint.
pub struct MjpegStream {
    url: String,
    reader: Option<PartReader<BufReader<reqwest::blocking::Response>>>,
    width: u32,
    height: u32,
    sequence: u32,
}

impl MjpegStream {
    /// Connect and check that the endpoint serves a multipart stream.
    pub fn connect(url: &str) -> Result<Self, CaptureError> {
        Self::connect_with_timeout(url, REQUEST_TIMEOUT)
    }

    /// As [`connect`](Self::connect), bounding the request and each later
    /// body read by `timeout`.
    pub fn connect_with_timeout(url: &str, timeout: Duration) -> Result<Self, CaptureError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| CaptureError::OpenFailed(format!("http client: {e}")))?;

        let response = client
            .get(url)
            .send()
            .map_err(|e| CaptureError::OpenFailed(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(CaptureError::OpenFailed(format!(
                "{url}: HTTP {}",
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("multipart/") {
            return Err(CaptureError::Unsupported(format!(
                "{url}: content type {content_type:?} is not a multipart stream"
            )));
        }

        tracing::info!(url, content_type = %content_type, "connected to stream");

        Ok(Self {
            url: url.to_string(),
            reader: Some(PartReader::new(BufReader::new(response))),
            width: 0,
            height: 0,
            sequence: 0,
        })
    }
}

impl FrameSource for MjpegStream {
    /// The server decides resolution and rate; the descriptor's size is
    /// only stamped on frames.
    fn configure(&mut self, camera: &CameraConfig) -> Result<(), CaptureError> {
        self.width = camera.resolution.width;
        self.height = camera.resolution.height;
        Ok(())
    }

    fn read(&mut self) -> Result<Frame, CaptureError> {
        let Some(reader) = self.reader.as_mut() else {
            return Err(CaptureError::Disconnected(format!("{}: released", self.url)));
        };
        // A timed-out read may leave a part half consumed; the next call
        // skips ahead to the following boundary.
        let data = reader.next_part().map_err(|e| match e {
            MjpegError::Io(ref io) if is_timeout(io) => {
                CaptureError::NoFrame(format!("{}: {e}", self.url))
            }
            MjpegError::Closed | MjpegError::Io(_) => {
                CaptureError::Disconnected(format!("{}: {e}", self.url))
            }
            MjpegError::Malformed(_) | MjpegError::TooLarge(_) => {
                CaptureError::NoFrame(format!("{}: {e}", self.url))
            }
        })?;

        self.sequence = self.sequence.wrapping_add(1);
        Ok(Frame {
            data,
            width: self.width,
            height: self.height,
            layout: PixelLayout::Jpeg,
            sequence: self.sequence,
            captured_at: Utc::now(),
        })
    }

    fn release(&mut self) {
        if self.reader.take().is_some() {
            tracing::debug!(url = %self.url, "closed stream");
        }
    }
}
