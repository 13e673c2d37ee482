//! Transfer frame logic shared by the server engine and the client.
//!
//! A frame is an 8-byte little-endian signed length followed by exactly that
//! many payload bytes. It travels on the control connection, between reply
//! lines.

use std::io::{self, Read, Write};

use crate::protocol::{COPY_BUF_SIZE, FRAME_HEADER_LEN};

/// Build the frame header for a payload of `len` bytes.
pub fn build_frame_header(len: u64) -> io::Result<[u8; FRAME_HEADER_LEN]> {
    let len = i64::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "payload too large for frame"))?;
    Ok(len.to_le_bytes())
}

/// Parse a frame header. The value is signed; callers reject negatives.
pub fn parse_frame_header(header: &[u8; FRAME_HEADER_LEN]) -> i64 {
    i64::from_le_bytes(*header)
}

pub fn read_frame_len<R: Read>(r: &mut R) -> io::Result<i64> {
    let mut hdr = [0u8; FRAME_HEADER_LEN];
    r.read_exact(&mut hdr)?;
    Ok(parse_frame_header(&hdr))
}

pub fn write_frame_len<W: Write>(w: &mut W, len: u64) -> io::Result<()> {
    w.write_all(&build_frame_header(len)?)
}

/// Copy exactly `len` bytes from `src` to `dst`.
///
/// Running out of input before `len` bytes is an `UnexpectedEof` error; bytes
/// already written to `dst` stay there.
pub fn copy_exact<R: Read + ?Sized, W: Write + ?Sized>(
    src: &mut R,
    dst: &mut W,
    len: u64,
) -> io::Result<u64> {
    let mut buf = vec![0u8; COPY_BUF_SIZE.min(len.max(1) as usize)];
    let mut remaining = len;
    while remaining > 0 {
        let to_read = remaining.min(buf.len() as u64) as usize;
        let n = match src.read(&mut buf[..to_read]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("short transfer: {} of {} bytes", len - remaining, len),
                ))
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        dst.write_all(&buf[..n])?;
        remaining -= n as u64;
    }
    dst.flush()?;
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_frame_header_layout() {
        let hdr = build_frame_header(13).unwrap();
        assert_eq!(hdr, [13, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(parse_frame_header(&hdr), 13);
        assert_eq!(parse_frame_header(&[0xff; 8]), -1);
        assert!(build_frame_header(u64::MAX).is_err());
    }

    #[test]
    fn test_read_frame_len_short_header() {
        let mut r = Cursor::new(vec![1u8, 2, 3]);
        let err = read_frame_len(&mut r).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_copy_exact_stops_at_len() {
        let mut src = Cursor::new(b"Hello, world!trailing".to_vec());
        let mut dst = Vec::new();
        assert_eq!(copy_exact(&mut src, &mut dst, 13).unwrap(), 13);
        assert_eq!(dst, b"Hello, world!");
        // the rest of the stream is untouched
        assert_eq!(src.position(), 13);
    }

    #[test]
    fn test_copy_exact_short_input_keeps_partial() {
        let mut src = Cursor::new(vec![7u8; 10]);
        let mut dst = Vec::new();
        let err = copy_exact(&mut src, &mut dst, 32).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(dst.len(), 10);
    }

    #[test]
    fn test_copy_exact_zero_len() {
        let mut src = Cursor::new(vec![1u8; 4]);
        let mut dst = Vec::new();
        assert_eq!(copy_exact(&mut src, &mut dst, 0).unwrap(), 0);
        assert!(dst.is_empty());
    }
}
