//! Line-out, NUL-in framing used by the `-q0` engine mode.
//!
//! ```text
//! request:  <command>\n
//! response: <text>\0
//! ```
//!
//! Response text may itself contain newlines. Only the trailing run of `\n`
//! and `\0` bytes is stripped before the text is returned.

use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};

/// Byte that terminates every engine response.
pub const RESPONSE_TERMINATOR: u8 = 0;

/// Reads and writes framed messages over a pair of byte streams.
pub struct FrameTransport {
    reader: BufReader<Box<dyn Read + Send>>,
    writer: BufWriter<Box<dyn Write + Send>>,
}

impl FrameTransport {
    /// Creates a transport reading responses from `reader` and writing
    /// commands to `writer`.
    #[must_use]
    pub fn new(reader: impl Read + Send + 'static, writer: impl Write + Send + 'static) -> Self {
        Self {
            reader: BufReader::new(Box::new(reader)),
            writer: BufWriter::new(Box::new(writer)),
        }
    }

    /// Writes one command line and flushes it.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the engine stream is closed.
    pub fn send(&mut self, command: &str) -> io::Result<()> {
        self.writer.write_all(command.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    /// Reads until the next NUL byte and returns the trimmed response.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedEof` if the stream ends before a terminator arrives.
    pub fn receive(&mut self) -> io::Result<String> {
        let mut frame = Vec::new();
        self.reader.read_until(RESPONSE_TERMINATOR, &mut frame)?;
        if frame.last() != Some(&RESPONSE_TERMINATOR) {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "engine closed the stream before terminating the response",
            ));
        }
        Ok(trim_response(&String::from_utf8_lossy(&frame)).to_owned())
    }

    /// Sends a command and waits for its response.
    ///
    /// # Errors
    ///
    /// Propagates failures from [`Self::send`] and [`Self::receive`].
    pub fn round_trip(&mut self, command: &str) -> io::Result<String> {
        self.send(command)?;
        self.receive()
    }
}

impl std::fmt::Debug for FrameTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameTransport")
            .field("buffered", &self.reader.buffer().len())
            .finish_non_exhaustive()
    }
}

/// Strips the trailing run of `\n` and `\0` characters, leaving interior
/// content untouched.
#[must_use]
pub fn trim_response(raw: &str) -> &str {
    raw.trim_end_matches(['\n', '\0'])
}
