//! Line oriented input sources
//!
//! Every collaborator stream (instrument sentences, location sensor fixes, AIS
//! reports) is a sequence of text lines read from a TCP connection, a file or
//! standard input.
//!
//! Serial line noise is common on instrument networks, so lines are read as
//! bytes and bad UTF-8 is replaced rather than failing the stream. Whatever is
//! left of such a line is rejected by the decoder like any other bad input.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

use crate::ServerError;

/// Boxed line reader for any source
pub type LineReader = Box<dyn AsyncBufRead + Unpin + Send>;

/// Where a stream of lines comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// `tcp://host:port`
    Tcp(String),
    /// `-`
    Stdin,
    /// Any other value is a file path
    File(PathBuf),
}

impl FromStr for Source {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "-" {
            return Ok(Source::Stdin);
        }
        if let Some(address) = s.strip_prefix("tcp://") {
            match address.rsplit_once(':') {
                Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                    return Ok(Source::Tcp(address.to_string()));
                }
                _ => return Err(ServerError::InvalidSource(s.to_string())),
            }
        }
        if s.is_empty() || s.contains("://") {
            return Err(ServerError::InvalidSource(s.to_string()));
        }
        Ok(Source::File(PathBuf::from(s)))
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Tcp(address) => write!(f, "tcp://{}", address),
            Source::Stdin => write!(f, "stdin"),
            Source::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl Source {
    /// Connect to or open the source, yielding its lines
    pub async fn open_lines(&self) -> Result<TextLines, ServerError> {
        Ok(TextLines::new(self.open().await?))
    }

    /// Connect to or open the source
    pub async fn open(&self) -> Result<LineReader, ServerError> {
        Ok(match self {
            Source::Tcp(address) => {
                let stream = TcpStream::connect(address).await?;
                Box::new(BufReader::new(stream))
            }
            Source::Stdin => Box::new(BufReader::new(tokio::io::stdin())),
            Source::File(path) => {
                let file = tokio::fs::File::open(path).await?;
                Box::new(BufReader::new(file))
            }
        })
    }
}

/// Lines of a stream as text, with invalid UTF-8 replaced by U+FFFD
pub struct TextLines {
    reader: LineReader,
    buf: Vec<u8>,
}

impl TextLines {
    pub fn new(reader: LineReader) -> Self {
        TextLines {
            reader,
            buf: Vec::with_capacity(256),
        }
    }

    /// Next line without its line ending, `None` at the end of the stream.
    ///
    /// Cancel safe: bytes of a partially read line stay buffered for the next
    /// call.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        let n = self.reader.read_until(b'\n', &mut self.buf).await?;
        if n == 0 && self.buf.is_empty() {
            return Ok(None);
        }
        let mut end = self.buf.len();
        while end > 0 && matches!(self.buf[end - 1], b'\n' | b'\r') {
            end -= 1;
        }
        let line = String::from_utf8_lossy(&self.buf[..end]).into_owned();
        self.buf.clear();
        Ok(Some(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_source() {
        assert_eq!(
            "tcp://192.168.1.10:10110".parse::<Source>().unwrap(),
            Source::Tcp("192.168.1.10:10110".to_string())
        );
        assert_eq!("-".parse::<Source>().unwrap(), Source::Stdin);
        assert_eq!(
            "/var/log/nmea.txt".parse::<Source>().unwrap(),
            Source::File(PathBuf::from("/var/log/nmea.txt"))
        );
    }

    #[test]
    fn test_parse_invalid_source() {
        for s in ["tcp://host", "tcp://:10110", "tcp://host:port", "udp://host:1", ""] {
            assert!(
                matches!(s.parse::<Source>(), Err(ServerError::InvalidSource(_))),
                "{} should be rejected",
                s
            );
        }
    }

    #[tokio::test]
    async fn test_open_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "$GPHDT,274.07,T*03").unwrap();
        writeln!(file, "second").unwrap();

        let source = Source::File(file.path().to_path_buf());
        let mut lines = source.open_lines().await.unwrap();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "$GPHDT,274.07,T*03");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "second");
        assert!(lines.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_utf8_does_not_end_stream() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"first\r\n$GPRMC,\xff\xfe noise\r\nthird").unwrap();

        let mut lines = Source::File(file.path().to_path_buf())
            .open_lines()
            .await
            .unwrap();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "first");
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "$GPRMC,\u{fffd}\u{fffd} noise"
        );
        // Last line without a line ending
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "third");
        assert!(lines.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let source = Source::File(PathBuf::from("/nonexistent/seawatch/input.txt"));
        assert!(matches!(source.open().await, Err(ServerError::Io(_))));
    }
}
