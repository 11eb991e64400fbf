//! Line framing: one JSON document per `\n`-terminated line.

use std::io::{BufRead, Read, Write};

use super::error::TransportError;

pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

pub struct FrameReader<R> {
    reader: R,
    max_frame_bytes: usize,
    buf: Vec<u8>,
}

impl<R: BufRead> FrameReader<R> {
    pub fn new(reader: R, max_frame_bytes: usize) -> Self {
        Self {
            reader,
            max_frame_bytes,
            buf: Vec::new(),
        }
    }

    /// Returns `Ok(None)` at a clean end of stream. Blank lines are skipped.
    ///
    /// [`TransportError::InvalidUtf8`] is recoverable: the offending line has
    /// been consumed and the next call continues with the following frame.
    /// Any other error leaves the stream in an unknown position.
    pub fn read_next(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            self.buf.clear();
            let limit = self.max_frame_bytes as u64 + 1;
            let read = (&mut self.reader)
                .take(limit)
                .read_until(b'\n', &mut self.buf)?;

            if read == 0 {
                return Ok(None);
            }

            if self.buf.last() == Some(&b'\n') {
                self.buf.pop();
            } else if read as u64 >= limit {
                return Err(TransportError::FrameTooLarge {
                    max_frame_bytes: self.max_frame_bytes,
                    got_bytes: read,
                });
            }

            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }

            if self.buf.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            return String::from_utf8(std::mem::take(&mut self.buf))
                .map(Some)
                .map_err(|_| TransportError::InvalidUtf8);
        }
    }
}

pub fn write_frame<W: Write>(
    writer: &mut W,
    payload: &str,
) -> Result<(), TransportError> {
    if payload.contains('\n') {
        return Err(TransportError::EmbeddedNewline);
    }

    writer.write_all(payload.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
