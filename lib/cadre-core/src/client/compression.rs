//! Response body decompression, buffered and streaming.
//!
//! Buffered decode is strict: a corrupt or truncated payload always fails.
//! Streaming decode is chunkwise via the flate2 write-decoders and finishes
//! leniently for truncated binary streams (whatever decoded is kept), but
//! strictly when newline normalization was requested, since text-mode
//! rewriting cannot proceed on corrupt data.

use std::io::{Read, Write};

use flate2::write::{GzDecoder, ZlibDecoder};

use super::error::DecompressError;
use super::newline::ResponseNormalizer;

/// Recognized `Content-Encoding` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ContentEncoding {
    /// `Content-Encoding: gzip`
    #[display("gzip")]
    Gzip,
    /// `Content-Encoding: deflate` (zlib-wrapped per RFC 9110)
    #[display("deflate")]
    Deflate,
}

impl ContentEncoding {
    /// Parses a `Content-Encoding` header value, ignoring unrecognized codings.
    pub fn from_header(value: &str) -> Option<Self> {
        match value.trim() {
            "gzip" => Some(Self::Gzip),
            "deflate" => Some(Self::Deflate),
            _ => None,
        }
    }
}

/// Decodes a fully buffered response body.
///
/// # Errors
///
/// Fails with [`DecompressError::Buffer`] on corrupt or truncated input.
pub fn decompress_buffer(
    data: &[u8],
    encoding: ContentEncoding,
) -> Result<Vec<u8>, DecompressError> {
    let mut out = Vec::new();
    let result = match encoding {
        ContentEncoding::Gzip => flate2::read::GzDecoder::new(data).read_to_end(&mut out),
        ContentEncoding::Deflate => flate2::read::ZlibDecoder::new(data).read_to_end(&mut out),
    };
    match result {
        Ok(_) => Ok(out),
        Err(err) => Err(DecompressError::Buffer {
            message: err.to_string(),
        }),
    }
}

enum Decoder {
    Gzip(GzDecoder<Vec<u8>>),
    Deflate(ZlibDecoder<Vec<u8>>),
}

/// Chunkwise decoder for a streamed response body.
///
/// Feed each incoming chunk to [`StreamDecoder::chunk`] and call
/// [`StreamDecoder::finish`] at end of response to drain the tail.
pub struct StreamDecoder {
    decoder: Decoder,
    normalizer: Option<ResponseNormalizer>,
    normalize_requested: bool,
}

impl std::fmt::Debug for StreamDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDecoder")
            .field("normalize_requested", &self.normalize_requested)
            .finish_non_exhaustive()
    }
}

impl StreamDecoder {
    /// Creates a decoder for the given encoding.
    ///
    /// With `normalize_newlines`, decoded text is rewritten to the native
    /// line ending (a no-op on platforms whose line ending is `\n`) and the
    /// truncation leniency at [`StreamDecoder::finish`] is disabled.
    pub fn new(encoding: ContentEncoding, normalize_newlines: bool) -> Self {
        let decoder = match encoding {
            ContentEncoding::Gzip => Decoder::Gzip(GzDecoder::new(Vec::new())),
            ContentEncoding::Deflate => Decoder::Deflate(ZlibDecoder::new(Vec::new())),
        };
        let normalizer = (normalize_newlines && cfg!(windows)).then(ResponseNormalizer::default);
        Self {
            decoder,
            normalizer,
            normalize_requested: normalize_newlines,
        }
    }

    fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        match &mut self.decoder {
            Decoder::Gzip(decoder) => decoder.write_all(data),
            Decoder::Deflate(decoder) => decoder.write_all(data),
        }
    }

    fn drain(&mut self) -> Vec<u8> {
        let decoded = match &mut self.decoder {
            Decoder::Gzip(decoder) => std::mem::take(decoder.get_mut()),
            Decoder::Deflate(decoder) => std::mem::take(decoder.get_mut()),
        };
        match &mut self.normalizer {
            Some(normalizer) => normalizer.process(&decoded),
            None => decoded,
        }
    }

    /// Decodes one compressed chunk, returning the bytes decoded so far.
    ///
    /// # Errors
    ///
    /// Fails with [`DecompressError::Stream`] when the chunk is corrupt.
    pub fn chunk(&mut self, data: &[u8]) -> Result<Vec<u8>, DecompressError> {
        self.write(data).map_err(|err| DecompressError::Stream {
            message: err.to_string(),
        })?;
        Ok(self.drain())
    }

    /// Finalizes the decoder and drains any remaining decoded bytes.
    ///
    /// # Errors
    ///
    /// A truncated stream fails with [`DecompressError::Stream`] when newline
    /// normalization was requested; in binary mode the decodable prefix is
    /// returned instead.
    pub fn finish(mut self) -> Result<Vec<u8>, DecompressError> {
        let result = match &mut self.decoder {
            Decoder::Gzip(decoder) => decoder.try_finish(),
            Decoder::Deflate(decoder) => decoder.try_finish(),
        };
        if let Err(err) = result {
            if self.normalize_requested {
                return Err(DecompressError::Stream {
                    message: err.to_string(),
                });
            }
            // truncated binary stream: keep whatever decoded
        }
        Ok(self.drain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};
    use flate2::Compression;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use rstest::rstest;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_from_header_recognizes_known_codings() {
        check!(ContentEncoding::from_header("gzip") == Some(ContentEncoding::Gzip));
        check!(ContentEncoding::from_header(" deflate ") == Some(ContentEncoding::Deflate));
        check!(ContentEncoding::from_header("br").is_none());
        check!(ContentEncoding::from_header("identity").is_none());
    }

    #[test]
    fn test_decompress_buffer_round_trips() {
        let plain = b"hello compressed world";
        let out = decompress_buffer(&gzip(plain), ContentEncoding::Gzip).unwrap();
        check!(out == plain);

        let out = decompress_buffer(&zlib(plain), ContentEncoding::Deflate).unwrap();
        check!(out == plain);
    }

    #[test]
    fn test_decompress_buffer_rejects_truncated_input() {
        let compressed = gzip(b"some longer payload to make truncation meaningful");
        let truncated = &compressed[..compressed.len() - 10];

        let_assert!(Err(DecompressError::Buffer { .. }) =
            decompress_buffer(truncated, ContentEncoding::Gzip));
    }

    #[test]
    fn test_decompress_buffer_rejects_garbage() {
        let_assert!(Err(DecompressError::Buffer { .. }) =
            decompress_buffer(b"definitely not gzip", ContentEncoding::Gzip));
    }

    #[rstest]
    #[case(1)]
    #[case(7)]
    #[case(64)]
    fn test_stream_decoder_handles_arbitrary_chunking(#[case] size: usize) {
        let plain = b"streamed payload with several lines\nand more data\n".repeat(20);
        let compressed = gzip(&plain);

        let mut decoder = StreamDecoder::new(ContentEncoding::Gzip, false);
        let mut out = Vec::new();
        for chunk in compressed.chunks(size) {
            out.extend(decoder.chunk(chunk).unwrap());
        }
        out.extend(decoder.finish().unwrap());
        check!(out == plain);
    }

    #[test]
    fn test_stream_decoder_truncated_binary_is_lenient() {
        let plain = b"binary-ish payload that is long enough to partially decode".repeat(50);
        let compressed = gzip(&plain);
        let truncated = &compressed[..compressed.len() - 10];

        let mut decoder = StreamDecoder::new(ContentEncoding::Gzip, false);
        let mut out = Vec::new();
        for chunk in truncated.chunks(128) {
            out.extend(decoder.chunk(chunk).unwrap());
        }
        out.extend(decoder.finish().unwrap());
        check!(plain.starts_with(&out));
    }

    #[test]
    fn test_stream_decoder_truncated_text_mode_fails() {
        let plain = b"text payload\nwith lines\n".repeat(50);
        let compressed = gzip(&plain);
        let truncated = &compressed[..compressed.len() - 10];

        let mut decoder = StreamDecoder::new(ContentEncoding::Gzip, true);
        for chunk in truncated.chunks(128) {
            decoder.chunk(chunk).unwrap();
        }
        let_assert!(Err(DecompressError::Stream { .. }) = decoder.finish());
    }
}
