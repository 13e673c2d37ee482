//! Blocking client for the burrow control protocol.

use anyhow::{anyhow, bail, Context, Result};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use crate::conn::Conn;
use crate::protocol::{codes, timeouts, FRAME_HEADER_LEN};
use crate::protocol_core::{copy_exact, parse_frame_header, write_frame_len};

pub struct Client {
    conn: Conn<TcpStream>,
}

impl Client {
    pub fn connect(addr: &str) -> Result<Self> {
        let sock = addr
            .to_socket_addrs()
            .with_context(|| format!("resolve {}", addr))?
            .next()
            .ok_or_else(|| anyhow!("no address for {}", addr))?;
        let stream =
            TcpStream::connect_timeout(&sock, Duration::from_millis(timeouts::CONNECT_MS))
                .with_context(|| format!("connect {}", addr))?;
        let _ = stream.set_nodelay(true);
        Ok(Self::from_stream(stream))
    }

    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            conn: Conn::new(stream),
        }
    }

    fn expect_line(&mut self) -> Result<String> {
        match self.conn.read_line()? {
            Some(line) => Ok(line.trim_end_matches(['\r', '\n']).to_string()),
            None => bail!("server closed the connection"),
        }
    }

    fn send_line(&mut self, line: &str) -> Result<()> {
        self.conn.send(&format!("{}\n", line))?;
        Ok(())
    }

    /// Answer both prompts. Fails with the server's reply on rejection.
    pub fn login(&mut self, username: &str, password: &str) -> Result<String> {
        self.expect_line()?;
        self.send_line(username)?;
        self.expect_line()?;
        self.send_line(password)?;
        let reply = self.expect_line()?;
        if !reply.starts_with(codes::LOGGED_IN) {
            bail!("{}", reply);
        }
        Ok(reply)
    }

    /// Send a single-reply command (CD, PWD, RM, MKDIR, DRM, QUIT, ...).
    pub fn command(&mut self, line: &str) -> Result<String> {
        self.send_line(line)?;
        self.expect_line()
    }

    pub fn pwd(&mut self) -> Result<String> {
        self.command("PWD")
    }

    /// Listing lines, without the terminating status line.
    pub fn list(&mut self) -> Result<Vec<String>> {
        self.send_line("LS")?;
        let mut entries = Vec::new();
        loop {
            let line = self.expect_line()?;
            if line.starts_with(codes::LISTING_DONE) {
                return Ok(entries);
            }
            if line.starts_with(codes::FAILURE) {
                bail!("{}", line);
            }
            entries.push(line);
        }
    }

    /// Upload `len` bytes from `src` as `remote`.
    pub fn put_from<R: Read + ?Sized>(&mut self, remote: &str, src: &mut R, len: u64) -> Result<String> {
        self.send_line(&format!("PUT {}", remote))?;
        let ack = self.expect_line()?;
        if !ack.starts_with(codes::FILE_CREATED) {
            bail!("{}", ack);
        }
        write_frame_len(self.conn.writer(), len)?;
        copy_exact(src, self.conn.writer(), len).context("send file body")?;
        let reply = self.expect_line()?;
        if !reply.starts_with(codes::TRANSFER_DONE) {
            bail!("{}", reply);
        }
        Ok(reply)
    }

    pub fn put(&mut self, remote: &str, data: &[u8]) -> Result<String> {
        let mut src = data;
        self.put_from(remote, &mut src, data.len() as u64)
    }

    pub fn put_file(&mut self, local: &Path, remote: &str) -> Result<u64> {
        let mut file = File::open(local).with_context(|| format!("open {}", local.display()))?;
        let len = file.metadata()?.len();
        self.put_from(remote, &mut file, len)?;
        Ok(len)
    }

    /// Download `remote` into `dst`, returning the byte count.
    ///
    /// The reply is either a status line or a frame. Status lines are
    /// longer than a frame header, so the first 8 bytes tell them apart.
    pub fn get_to<W: Write + ?Sized>(&mut self, remote: &str, dst: &mut W) -> Result<u64> {
        if remote.trim().is_empty() {
            bail!("GET needs a file name");
        }
        self.send_line(&format!("GET {}", remote))?;
        let mut hdr = [0u8; FRAME_HEADER_LEN];
        self.conn.reader().read_exact(&mut hdr)?;
        if looks_like_reply(&hdr) {
            let rest = self.expect_line()?;
            bail!("{}{}", String::from_utf8_lossy(&hdr), rest);
        }
        let len = parse_frame_header(&hdr);
        if len < 0 {
            bail!("server sent negative length {}", len);
        }
        copy_exact(self.conn.reader(), dst, len as u64).context("receive file body")?;
        Ok(len as u64)
    }

    pub fn get(&mut self, remote: &str) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.get_to(remote, &mut out)?;
        Ok(out)
    }

    pub fn get_file(&mut self, remote: &str, local: &Path) -> Result<u64> {
        let file = File::create(local).with_context(|| format!("create {}", local.display()))?;
        let mut w = BufWriter::new(file);
        let n = self.get_to(remote, &mut w)?;
        w.flush()?;
        Ok(n)
    }

    pub fn quit(mut self) -> Result<String> {
        self.command("QUIT")
    }
}

// "NNN " where a frame header would be. Only lengths of 540 MB and up can
// start with these bytes.
fn looks_like_reply(hdr: &[u8; FRAME_HEADER_LEN]) -> bool {
    hdr[..3].iter().all(u8::is_ascii_digit) && hdr[3] == b' '
}
