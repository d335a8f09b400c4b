//! Line-ending normalization across async chunk boundaries.
//!
//! Request data flowing to the server may arrive in arbitrary chunk splits; a
//! `\r\n` pair can straddle two chunks. [`RequestNormalizer`] collapses CRLF
//! to `\n` with a one-byte CR holdback so the output is identical regardless
//! of where the stream was split. [`ResponseNormalizer`] performs the inverse
//! for platforms whose native line ending is CRLF, tracking the previous
//! chunk's final byte so an existing `\r` is never doubled.

/// Collapses `\r\n` to `\n` in request chunks.
///
/// A chunk ending in a lone `\r` holds that byte back until the next chunk
/// (or end of stream) decides whether it starts a CRLF pair. The holdback is
/// exactly one byte and must be flushed via [`RequestNormalizer::finish`]
/// when the stream ends.
#[derive(Debug, Default)]
pub struct RequestNormalizer {
    pending_cr: bool,
}

impl RequestNormalizer {
    /// Normalizes one chunk, resolving any carry-over CR from the previous one.
    pub fn process(&mut self, chunk: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(chunk.len() + 1);
        let mut index = 0;

        if self.pending_cr {
            if let Some(&first) = chunk.first() {
                if first == b'\n' {
                    out.push(b'\n');
                    index = 1;
                } else {
                    out.push(b'\r');
                }
                self.pending_cr = false;
            }
            // empty chunk: keep holding
        }

        while index < chunk.len() {
            let byte = chunk[index];
            if byte == b'\r' {
                if index + 1 == chunk.len() {
                    self.pending_cr = true;
                    index += 1;
                } else if chunk[index + 1] == b'\n' {
                    out.push(b'\n');
                    index += 2;
                } else {
                    // lone \r not followed by \n is preserved
                    out.push(b'\r');
                    index += 1;
                }
            } else {
                out.push(byte);
                index += 1;
            }
        }
        out
    }

    /// Flushes the held-back CR, if any, at end of stream.
    pub fn finish(&mut self) -> Option<u8> {
        if std::mem::take(&mut self.pending_cr) {
            Some(b'\r')
        } else {
            None
        }
    }
}

/// Converts `\n` to `\r\n` in response chunks without doubling an existing CR.
///
/// The final byte of each chunk is remembered so a `\n` at the start of the
/// next chunk is not expanded when the previous chunk already ended in `\r`.
#[derive(Debug, Default)]
pub struct ResponseNormalizer {
    last_byte: u8,
}

impl ResponseNormalizer {
    /// Expands bare `\n` bytes to `\r\n` in one chunk.
    pub fn process(&mut self, chunk: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(chunk.len() + chunk.len() / 8);
        let mut prev = self.last_byte;
        for &byte in chunk {
            if byte == b'\n' && prev != b'\r' {
                out.push(b'\r');
            }
            out.push(byte);
            prev = byte;
        }
        self.last_byte = prev;
        out
    }
}
