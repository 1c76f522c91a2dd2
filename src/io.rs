//! Character streams the parser reads from and the serializer writes to.
//!
//! A [`Stream`] is opened in exactly one [`Mode`] for its whole life. Calling a
//! write operation on a read stream (or the other way round) fails with
//! [`Error::InvalidOperation`] instead of touching the underlying resource.
//!
//! Two backings are provided:
//! - [`StrStream`] reads an in-memory string, ending at its end or at the first NUL byte.
//! - [`HandleReader`] / [`HandleWriter`] go through a buffered [`Read`] / [`Write`] handle.
//!
//! Anything else (a GUI text widget, a socket, a test double) can implement [`Stream`]
//! directly and be handed to [`Ini::parse`](crate::Ini::parse) or
//! [`Ini::store`](crate::Ini::store).

use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};

use crate::error::{Error, Result};

/// Direction a stream was opened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
}

/// Sequential byte-at-a-time I/O.
pub trait Stream {
    fn mode(&self) -> Mode;

    /// Reads the next byte, or `None` once the end of input has been reached.
    fn getc(&mut self) -> Result<Option<u8>> {
        Err(wrong_mode(self.mode(), "read from"))
    }

    fn putc(&mut self, _ch: u8) -> Result<()> {
        Err(wrong_mode(self.mode(), "write to"))
    }

    /// Whether the end of input has been observed. Always `true` for write streams.
    fn eof(&self) -> bool {
        true
    }

    /// The byte most recently produced by [`getc`](Stream::getc).
    fn peek(&self) -> Option<u8> {
        None
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

fn wrong_mode(mode: Mode, action: &str) -> Error {
    Error::InvalidOperation(format!("cannot {action} a stream opened in {mode:?} mode"))
}

/// Extension methods for reading and writing whole lines through a [`Stream`].
pub trait LineExt: Stream {
    /// Reads up to the next `\n` (not included in the result) or the end of input.
    ///
    /// Returns `Ok(None)` once the input is exhausted and nothing was read. Each line is
    /// decoded as UTF-8; invalid sequences are replaced and a warning is logged.
    fn read_line(&mut self) -> Result<Option<String>> {
        if self.mode() != Mode::Read {
            return Err(wrong_mode(self.mode(), "read a line from"));
        }

        let mut buf = Vec::new();
        let mut terminated = false;

        while let Some(ch) = self.getc()? {
            if ch == b'\n' {
                terminated = true;
                break;
            }
            buf.push(ch);
        }

        if buf.is_empty() && !terminated {
            return Ok(None);
        }

        Ok(Some(match String::from_utf8(buf) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Line is not valid UTF-8, replacing invalid bytes: {}", e);
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        }))
    }

    /// Writes `line` followed by a single `\n`.
    fn write_line(&mut self, line: &str) -> Result<()> {
        if self.mode() != Mode::Write {
            return Err(wrong_mode(self.mode(), "write a line to"));
        }

        for &ch in line.as_bytes() {
            self.putc(ch)?;
        }
        self.putc(b'\n')
    }
}

impl<S: Stream + ?Sized> LineExt for S {}

/// Read stream over an in-memory string.
#[derive(Debug, Clone)]
pub struct StrStream<'a> {
    data: &'a [u8],
    position: usize,
    peek: Option<u8>,
}

impl<'a> StrStream<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            data: text.as_bytes(),
            position: 0,
            peek: None,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl Stream for StrStream<'_> {
    fn mode(&self) -> Mode {
        Mode::Read
    }

    fn getc(&mut self) -> Result<Option<u8>> {
        self.peek = if self.eof() {
            None
        } else {
            self.position += 1;
            Some(self.data[self.position - 1])
        };
        Ok(self.peek)
    }

    fn eof(&self) -> bool {
        self.data.get(self.position).is_none_or(|&ch| ch == 0)
    }

    fn peek(&self) -> Option<u8> {
        self.peek
    }
}

/// Read stream over any [`Read`] handle, buffered.
pub struct HandleReader<R: Read> {
    inner: BufReader<R>,
    peek: Option<u8>,
    eof: bool,
}

impl<R: Read> HandleReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader),
            peek: None,
            eof: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R: Read> Stream for HandleReader<R> {
    fn mode(&self) -> Mode {
        Mode::Read
    }

    fn getc(&mut self) -> Result<Option<u8>> {
        if self.eof {
            self.peek = None;
            return Ok(None);
        }

        let mut byte = [0u8; 1];
        self.peek = loop {
            match self.inner.read(&mut byte) {
                Ok(0) => {
                    self.eof = true;
                    break None;
                }
                Ok(_) => break Some(byte[0]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        };

        Ok(self.peek)
    }

    fn eof(&self) -> bool {
        self.eof
    }

    fn peek(&self) -> Option<u8> {
        self.peek
    }
}

/// Write stream over any [`Write`] handle, buffered.
///
/// Buffered bytes are flushed by [`Stream::flush`]; [`into_inner`](HandleWriter::into_inner)
/// flushes as well and reports any error doing so.
pub struct HandleWriter<W: Write> {
    inner: BufWriter<W>,
}

impl<W: Write> HandleWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: BufWriter::new(writer),
        }
    }

    pub fn into_inner(self) -> Result<W> {
        self.inner.into_inner().map_err(|e| Error::Io(e.into_error()))
    }
}

impl<W: Write> Stream for HandleWriter<W> {
    fn mode(&self) -> Mode {
        Mode::Write
    }

    fn putc(&mut self, ch: u8) -> Result<()> {
        self.inner.write_all(&[ch])?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_all_lines(stream: &mut impl Stream) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = stream.read_line().unwrap() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_str_stream_getc_and_peek() {
        let mut stream = StrStream::new("ab");
        assert_eq!(stream.peek(), None);
        assert!(!stream.eof());

        assert_eq!(stream.getc().unwrap(), Some(b'a'));
        assert_eq!(stream.peek(), Some(b'a'));
        assert_eq!(stream.getc().unwrap(), Some(b'b'));
        assert!(stream.eof());

        assert_eq!(stream.getc().unwrap(), None);
        assert_eq!(stream.peek(), None);
        assert_eq!(stream.position(), 2);
    }

    #[test]
    fn test_str_stream_stops_at_nul() {
        let mut stream = StrStream::new("key = 1\0ignored");
        assert_eq!(read_all_lines(&mut stream), vec!["key = 1"]);
    }

    #[test]
    fn test_read_line() {
        let mut stream = StrStream::new("first\n\nthird\r\nlast");
        assert_eq!(
            read_all_lines(&mut stream),
            vec!["first", "", "third\r", "last"]
        );
    }

    #[test]
    fn test_read_line_trailing_newline() {
        let mut stream = StrStream::new("only\n");
        assert_eq!(stream.read_line().unwrap().as_deref(), Some("only"));
        assert_eq!(stream.read_line().unwrap(), None);
        assert_eq!(stream.read_line().unwrap(), None);
    }

    #[test]
    fn test_read_line_empty_input() {
        let mut stream = StrStream::new("");
        assert_eq!(stream.read_line().unwrap(), None);
    }

    #[test]
    fn test_handle_reader() {
        let mut stream = HandleReader::new(Cursor::new(b"[db]\nport = 5432".to_vec()));
        assert!(!stream.eof());
        assert_eq!(read_all_lines(&mut stream), vec!["[db]", "port = 5432"]);
        assert!(stream.eof());
    }

    #[test]
    fn test_read_line_long_line() {
        let text = "x".repeat(100_000);
        let mut stream = HandleReader::new(text.as_bytes());
        assert_eq!(stream.read_line().unwrap().map(|l| l.len()), Some(100_000));
    }

    #[test]
    fn test_read_line_invalid_utf8() {
        let mut stream = HandleReader::new(&b"caf\xe9\n"[..]);
        assert_eq!(stream.read_line().unwrap().as_deref(), Some("caf\u{fffd}"));
    }

    #[test]
    fn test_handle_writer() -> color_eyre::Result<()> {
        let mut stream = HandleWriter::new(Vec::new());
        stream.write_line("[owner]")?;
        stream.write_line("name = Alice")?;
        stream.putc(b'\n')?;

        let written = stream.into_inner()?;
        assert_eq!(written, b"[owner]\nname = Alice\n\n");
        Ok(())
    }

    #[test]
    fn test_wrong_mode_is_rejected() {
        let mut reader = StrStream::new("text");
        assert!(matches!(reader.putc(b'x'), Err(Error::InvalidOperation(_))));
        assert!(matches!(
            reader.write_line("x"),
            Err(Error::InvalidOperation(_))
        ));
        // the failed write did not consume anything
        assert_eq!(reader.getc().unwrap(), Some(b't'));

        let mut writer = HandleWriter::new(Vec::new());
        assert!(matches!(writer.getc(), Err(Error::InvalidOperation(_))));
        assert!(matches!(writer.read_line(), Err(Error::InvalidOperation(_))));
        assert!(writer.into_inner().unwrap().is_empty());
    }
}
