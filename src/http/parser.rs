//! HTTP response parsing
//!
//! The parser is fed bytes as they arrive and decides body framing from the
//! response head: no body, `Content-Length`, chunked, or read-until-close.

use super::chunked::{find_crlf, ChunkedDecoder};
use super::{Error, Headers, HttpResponse, Result, Status, Version};

/// Parse HTTP response status line
///
/// Format: VERSION STATUS REASON\r\n
/// Example: HTTP/1.1 200 OK\r\n
///
/// The reason phrase is kept as received; a missing one is empty.
pub fn parse_status_line(line: &str) -> Result<(Version, Status)> {
    let parts: Vec<&str> = line.trim_end().splitn(3, ' ').collect();

    if parts.len() < 2 {
        return Err(Error::Parse(format!(
            "Invalid status line: expected at least 2 parts, got {}",
            parts.len()
        )));
    }

    let version = Version::from_str(parts[0])?;
    let code = parts[1]
        .parse::<u16>()
        .map_err(|_| Error::InvalidStatus(format!("Invalid status code: {}", parts[1])))?;
    let status = Status::new(code, parts.get(2).map_or("", |r| r.trim()))?;

    Ok((version, status))
}

/// Decode a head line as ISO-8859-1
///
/// Every byte maps to one char, so header values that are not UTF-8 still
/// round-trip exactly.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParserState {
    StatusLine,
    Headers,
    Body,
    Complete,
}

#[derive(Debug)]
enum BodyFraming {
    Empty,
    Length(usize),
    Chunked(ChunkedDecoder),
    UntilClose,
}

/// HTTP response parser
pub struct ResponseParser {
    state: ParserState,
    buffer: Vec<u8>,
    version: Option<Version>,
    status: Option<Status>,
    headers: Headers,
    framing: BodyFraming,
    body: Vec<u8>,
    head_request: bool,
}

impl ResponseParser {
    /// Create a new response parser
    pub fn new() -> Self {
        ResponseParser {
            state: ParserState::StatusLine,
            buffer: Vec::new(),
            version: None,
            status: None,
            headers: Headers::new(),
            framing: BodyFraming::Empty,
            body: Vec::new(),
            head_request: false,
        }
    }

    /// Create a parser for the response to a HEAD request (never has a body)
    pub fn for_head_request() -> Self {
        ResponseParser {
            head_request: true,
            ..Self::new()
        }
    }

    /// Feed data to the parser
    ///
    /// Returns Ok(Some(response)) when a complete response is parsed,
    /// Ok(None) if more data is needed, or Err on parse error.
    pub fn parse(&mut self, data: &[u8]) -> Result<Option<HttpResponse>> {
        self.buffer.extend_from_slice(data);

        loop {
            match self.state {
                ParserState::StatusLine => {
                    if !self.parse_status_line()? {
                        return Ok(None);
                    }
                }
                ParserState::Headers => {
                    if !self.parse_headers()? {
                        return Ok(None);
                    }
                }
                ParserState::Body => {
                    if !self.parse_body()? {
                        return Ok(None);
                    }
                }
                ParserState::Complete => return Ok(Some(self.take_response())),
            }
        }
    }

    /// Signal that the peer closed the connection
    ///
    /// Completes a read-until-close body; anything else left unfinished is
    /// an error.
    pub fn finish(&mut self) -> Result<HttpResponse> {
        let until_close = matches!(self.framing, BodyFraming::UntilClose);

        match self.state {
            ParserState::Body if until_close => {
                self.body.append(&mut self.buffer);
                Ok(self.take_response())
            }
            ParserState::StatusLine if self.buffer.is_empty() => Err(Error::ConnectionClosed),
            _ => Err(Error::Incomplete),
        }
    }

    fn parse_status_line(&mut self) -> Result<bool> {
        let Some(crlf_pos) = find_crlf(&self.buffer) else {
            return Ok(false);
        };
        let line = latin1(&self.buffer[..crlf_pos]);
        self.buffer.drain(..crlf_pos + 2);

        let (version, status) = parse_status_line(&line)?;
        self.version = Some(version);
        self.status = Some(status);
        self.state = ParserState::Headers;
        Ok(true)
    }

    fn parse_headers(&mut self) -> Result<bool> {
        loop {
            let Some(crlf_pos) = find_crlf(&self.buffer) else {
                return Ok(false);
            };

            if crlf_pos == 0 {
                // Empty line marks end of headers
                self.buffer.drain(..2);
                self.end_of_head()?;
                return Ok(true);
            }

            let line = latin1(&self.buffer[..crlf_pos]);
            self.buffer.drain(..crlf_pos + 2);

            let (name, value) = Headers::parse_header_line(&line)?;
            self.headers.insert(name, value);
        }
    }

    fn end_of_head(&mut self) -> Result<()> {
        let status = self
            .status
            .as_ref()
            .ok_or_else(|| Error::Parse("Headers before status line".to_string()))?;

        // Interim 100 Continue: drop it and wait for the real response
        if status.code() == 100 {
            self.status = None;
            self.headers.clear();
            self.state = ParserState::StatusLine;
            return Ok(());
        }

        self.framing = if self.head_request || status.forbids_body() {
            BodyFraming::Empty
        } else if self
            .headers
            .get("Transfer-Encoding")
            .is_some_and(|te| te.to_ascii_lowercase().contains("chunked"))
        {
            BodyFraming::Chunked(ChunkedDecoder::new())
        } else if let Some(cl_str) = self.headers.get("Content-Length") {
            let length = cl_str
                .trim()
                .parse::<usize>()
                .map_err(|_| Error::Parse(format!("Invalid Content-Length: {}", cl_str)))?;
            BodyFraming::Length(length)
        } else {
            BodyFraming::UntilClose
        };

        self.state = ParserState::Body;
        Ok(())
    }

    fn parse_body(&mut self) -> Result<bool> {
        let complete = match &mut self.framing {
            BodyFraming::Empty => true,
            BodyFraming::Length(length) => {
                if self.buffer.len() >= *length {
                    self.body = self.buffer.drain(..*length).collect();
                    true
                } else {
                    false
                }
            }
            BodyFraming::Chunked(decoder) => {
                let (consumed, complete) = decoder.decode(&self.buffer, &mut self.body)?;
                self.buffer.drain(..consumed);
                complete
            }
            BodyFraming::UntilClose => false,
        };

        if complete {
            self.state = ParserState::Complete;
        }
        Ok(complete)
    }

    fn take_response(&mut self) -> HttpResponse {
        let mut builder = HttpResponse::builder()
            .version(self.version.unwrap_or_default())
            .headers(std::mem::take(&mut self.headers))
            .body(std::mem::take(&mut self.body));
        if let Some(status) = self.status.take() {
            builder = builder.status(status);
        }
        self.state = ParserState::Complete;
        builder.build()
    }

    /// Reset the parser for reuse
    pub fn reset(&mut self) {
        let head_request = self.head_request;
        *self = Self::new();
        self.head_request = head_request;
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}
