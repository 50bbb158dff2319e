//! Chunked transfer decoding
//!
//! Responses sent with `Transfer-Encoding: chunked` are decoded here so the
//! captured body holds only the payload. Trailer fields are skipped.

use super::{Error, Result};

/// Chunked decoder
///
/// Incremental: feed it whatever bytes have arrived, it reports how many it
/// consumed and appends decoded payload to the output.
#[derive(Debug)]
pub struct ChunkedDecoder {
    state: DecoderState,
    chunk_size: usize,
    chunk_read: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DecoderState {
    ChunkSize,
    ChunkData,
    ChunkEnd,
    Trailer,
    Complete,
}

impl ChunkedDecoder {
    /// Create a new chunked decoder
    pub fn new() -> Self {
        ChunkedDecoder {
            state: DecoderState::ChunkSize,
            chunk_size: 0,
            chunk_read: 0,
        }
    }

    /// Decode as much of `input` as possible into `output`
    ///
    /// Returns (bytes_consumed, is_complete)
    pub fn decode(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<(usize, bool)> {
        let mut pos = 0;

        while pos < input.len() {
            match self.state {
                DecoderState::ChunkSize => {
                    let Some(crlf_pos) = find_crlf(&input[pos..]) else {
                        break;
                    };
                    let line = String::from_utf8_lossy(&input[pos..pos + crlf_pos]);

                    // Extensions after ';' are ignored
                    let size_str = line.split(';').next().unwrap_or("").trim();
                    self.chunk_size = usize::from_str_radix(size_str, 16)
                        .map_err(|_| Error::InvalidChunkSize(size_str.to_string()))?;

                    pos += crlf_pos + 2;
                    self.chunk_read = 0;
                    self.state = if self.chunk_size == 0 {
                        DecoderState::Trailer
                    } else {
                        DecoderState::ChunkData
                    };
                }

                DecoderState::ChunkData => {
                    let remaining = self.chunk_size - self.chunk_read;
                    let take = remaining.min(input.len() - pos);

                    output.extend_from_slice(&input[pos..pos + take]);
                    pos += take;
                    self.chunk_read += take;

                    if self.chunk_read < self.chunk_size {
                        break;
                    }
                    self.state = DecoderState::ChunkEnd;
                }

                DecoderState::ChunkEnd => {
                    if input.len() - pos < 2 {
                        break;
                    }
                    if &input[pos..pos + 2] != b"\r\n" {
                        return Err(Error::Protocol("Expected CRLF after chunk".to_string()));
                    }
                    pos += 2;
                    self.state = DecoderState::ChunkSize;
                }

                DecoderState::Trailer => {
                    let Some(crlf_pos) = find_crlf(&input[pos..]) else {
                        break;
                    };
                    pos += crlf_pos + 2;
                    if crlf_pos == 0 {
                        self.state = DecoderState::Complete;
                    }
                }

                DecoderState::Complete => break,
            }
        }

        Ok((pos, self.is_complete()))
    }

    /// Check if decoding is complete
    pub fn is_complete(&self) -> bool {
        self.state == DecoderState::Complete
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Find CRLF in buffer
pub(crate) fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Decode complete chunked body from bytes
pub fn decode_chunked_body(input: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ChunkedDecoder::new();
    let mut output = Vec::new();

    let (_, complete) = decoder.decode(input, &mut output)?;
    if !complete {
        return Err(Error::Incomplete);
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_single_chunk() {
        let input = b"5\r\nHello\r\n0\r\n\r\n";
        let output = decode_chunked_body(input).unwrap();
        assert_eq!(output, b"Hello");
    }

    #[test]
    fn test_decode_multiple_chunks() {
        let input = b"5\r\nHello\r\n5\r\nWorld\r\n0\r\n\r\n";
        let output = decode_chunked_body(input).unwrap();
        assert_eq!(output, b"HelloWorld");
    }

    #[test]
    fn test_decode_with_extension() {
        let input = b"5;extension=value\r\nHello\r\n0\r\n\r\n";
        let output = decode_chunked_body(input).unwrap();
        assert_eq!(output, b"Hello");
    }

    #[test]
    fn test_decode_skips_trailers() {
        let input = b"3\r\nabc\r\n0\r\nX-Checksum: 42\r\n\r\n";
        let output = decode_chunked_body(input).unwrap();
        assert_eq!(output, b"abc");
    }

    #[test]
    fn test_decode_incomplete() {
        assert!(matches!(
            decode_chunked_body(b"5\r\nHel"),
            Err(Error::Incomplete)
        ));
        assert!(matches!(
            decode_chunked_body(b"zz\r\n"),
            Err(Error::InvalidChunkSize(_))
        ));
    }

    #[test]
    fn test_decoder_incremental() {
        let input = b"5\r\nHello\r\nA\r\n0123456789\r\n0\r\n\r\n";
        let mut decoder = ChunkedDecoder::new();
        let mut output = Vec::new();
        let mut pending = Vec::new();

        for piece in input.chunks(3) {
            pending.extend_from_slice(piece);
            let (consumed, _) = decoder.decode(&pending, &mut output).unwrap();
            pending.drain(..consumed);
        }

        assert_eq!(output, b"Hello0123456789");
        assert!(decoder.is_complete());
        assert!(pending.is_empty());
    }
}
