//! Control connection wrapper.
//!
//! Command lines and transfer frames share one byte stream, so all reads go
//! through the same `BufReader`; bytes buffered after a command line are the
//! start of the frame that follows it.

use std::io::{self, BufRead, BufReader, Read, Write};

use crate::protocol::MAX_LINE_LEN;

pub struct Conn<S: Read + Write> {
    reader: BufReader<S>,
}

impl<S: Read + Write> Conn<S> {
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::new(stream),
        }
    }

    /// Read one line. `Ok(None)` means the peer closed the connection.
    /// Lines over `MAX_LINE_LEN` are an `InvalidData` error.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = Vec::new();
        let n = (&mut self.reader)
            .take(MAX_LINE_LEN as u64 + 1)
            .read_until(b'\n', &mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        if !buf.ends_with(b"\n") && buf.len() > MAX_LINE_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line exceeds {} bytes", MAX_LINE_LEN),
            ));
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    pub fn send(&mut self, text: &str) -> io::Result<()> {
        let w = self.reader.get_mut();
        w.write_all(text.as_bytes())?;
        w.flush()
    }

    /// Buffered read side, for frame headers and payloads.
    pub fn reader(&mut self) -> &mut BufReader<S> {
        &mut self.reader
    }

    /// Unbuffered write side, for frame headers and payloads.
    pub fn writer(&mut self) -> &mut S {
        self.reader.get_mut()
    }

    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}
