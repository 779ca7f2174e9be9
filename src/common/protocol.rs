//! Line-oriented wire protocol
//!
//! Every connection carries exactly one request line and one response. The
//! response has no trailing newline; the sender closes the connection to mark
//! its end. The same framing is used for client → coordinator and
//! coordinator → volume traffic.
//!
//! ```text
//! client → coordinator:  READ <file> | APPEND <file> <content> | shutdown | .
//! coordinator → volume:  ALLOC | READ <id> | WRITE <id> <bytes> | STAT
//! ```

use crate::common::{Error, Result};
use bytes::Bytes;
use std::net::SocketAddr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

pub const SHUTDOWN_ACK: &str = "NameNode is shutting down.";
pub const INVALID_COMMAND: &str = "ERROR: Invalid Command";
pub const COMPLETE: &str = "COMPLETE";
pub const ALLOC_FULL: &str = "-1";
pub const END_OF_SESSION: &str = ".";

const ERROR_PREFIX: &str = "ERROR: ";

/// Request sent by a client to the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    Read { filename: String },
    Append { filename: String, content: Bytes },
    Shutdown,
    EndSession,
}

impl ClientRequest {
    pub fn parse(line: &[u8]) -> Result<Self> {
        let line = strip_newline(line);
        if line.trim_ascii() == END_OF_SESSION.as_bytes() {
            return Ok(ClientRequest::EndSession);
        }
        if line.trim_ascii().eq_ignore_ascii_case(b"shutdown") {
            return Ok(ClientRequest::Shutdown);
        }

        let (verb, rest) = split_word(line);
        let verb = verb.trim_ascii_end();
        if verb.eq_ignore_ascii_case(b"read") {
            let filename = rest.map(|r| r.trim_ascii_end()).unwrap_or_default();
            if filename.is_empty() || filename.contains(&b' ') {
                return Err(invalid("READ takes exactly one filename", line));
            }
            return Ok(ClientRequest::Read {
                filename: utf8(filename, line)?,
            });
        }
        if verb.eq_ignore_ascii_case(b"append") {
            let (filename, content) = split_word(rest.unwrap_or_default());
            let content = content.unwrap_or_default();
            if filename.is_empty() || content.is_empty() {
                return Err(invalid("APPEND needs a filename and content", line));
            }
            return Ok(ClientRequest::Append {
                filename: utf8(filename, line)?,
                content: Bytes::copy_from_slice(content),
            });
        }

        Err(invalid("unknown verb", line))
    }

    /// Newline-terminated request line
    pub fn encode(&self) -> Vec<u8> {
        let mut out = match self {
            ClientRequest::Read { filename } => format!("READ {}", filename).into_bytes(),
            ClientRequest::Append { filename, content } => {
                let mut out = format!("APPEND {} ", filename).into_bytes();
                out.extend_from_slice(content);
                out
            }
            ClientRequest::Shutdown => b"shutdown".to_vec(),
            ClientRequest::EndSession => END_OF_SESSION.as_bytes().to_vec(),
        };
        out.push(b'\n');
        out
    }
}

/// Request sent by the coordinator to a volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeRequest {
    Alloc,
    Read { block_id: u32 },
    Write { block_id: u32, data: Bytes },
    Stat,
}

impl VolumeRequest {
    pub fn parse(line: &[u8]) -> Result<Self> {
        let line = strip_newline(line);
        let (verb, rest) = split_word(line.trim_ascii_start());
        let verb = verb.trim_ascii_end();

        if verb.eq_ignore_ascii_case(b"alloc") {
            Ok(VolumeRequest::Alloc)
        } else if verb.eq_ignore_ascii_case(b"stat") {
            Ok(VolumeRequest::Stat)
        } else if verb.eq_ignore_ascii_case(b"read") {
            let block_id = parse_block_id(rest.unwrap_or_default().trim_ascii(), line)?;
            Ok(VolumeRequest::Read { block_id })
        } else if verb.eq_ignore_ascii_case(b"write") {
            let (id, data) = split_word(rest.unwrap_or_default());
            let data = data.ok_or_else(|| invalid("WRITE needs a block id and data", line))?;
            Ok(VolumeRequest::Write {
                block_id: parse_block_id(id, line)?,
                data: Bytes::copy_from_slice(data),
            })
        } else {
            Err(invalid("unknown verb", line))
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = match self {
            VolumeRequest::Alloc => b"ALLOC".to_vec(),
            VolumeRequest::Stat => b"STAT".to_vec(),
            VolumeRequest::Read { block_id } => format!("READ {}", block_id).into_bytes(),
            VolumeRequest::Write { block_id, data } => {
                let mut out = format!("WRITE {} ", block_id).into_bytes();
                out.extend_from_slice(data);
                out
            }
        };
        out.push(b'\n');
        out
    }
}

/// Decode an `ALLOC` response: `Some(id)`, or `None` when the volume is full
pub fn parse_alloc_response(peer: &str, body: &[u8]) -> Result<Option<u32>> {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text == ALLOC_FULL {
        return Ok(None);
    }
    text.parse::<u32>()
        .map(Some)
        .map_err(|_| Error::UnexpectedResponse {
            peer: peer.to_string(),
            response: text.to_string(),
        })
}

/// `ERROR: <reason>` body for a failed operation
pub fn error_response(err: &Error) -> Vec<u8> {
    match err {
        Error::InvalidCommand(_) => INVALID_COMMAND.as_bytes().to_vec(),
        other => format!("{}{}", ERROR_PREFIX, other).into_bytes(),
    }
}

pub fn is_error_response(body: &[u8]) -> bool {
    body.starts_with(ERROR_PREFIX.as_bytes())
}

/// Read one request line. `None` if the peer closed without sending anything.
pub async fn read_request_line<R>(reader: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    if reader.read_until(b'\n', &mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

/// Write the whole response and close our side of the connection.
pub async fn write_response<W>(writer: &mut W, body: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(body).await?;
    writer.flush().await?;
    writer.shutdown().await?;
    Ok(())
}

/// Open a connection, send one request line and read the response to EOF.
pub async fn exchange(addr: SocketAddr, request: &[u8]) -> Result<Bytes> {
    exchange_inner(addr, request)
        .await
        .map_err(|e| Error::ConnectionFailed(format!("{}: {}", addr, e)))
}

async fn exchange_inner(addr: SocketAddr, request: &[u8]) -> std::io::Result<Bytes> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(request).await?;
    stream.shutdown().await?;

    let mut body = Vec::new();
    stream.read_to_end(&mut body).await?;
    Ok(Bytes::from(body))
}

/// Accept errors caused by a single peer. The listener itself is still usable.
pub fn is_transient(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::Interrupted
    )
}

/// Drop the framing `\n` only. Payloads keep every other byte, `\r` included.
fn strip_newline(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\n").unwrap_or(line)
}

/// Split at the first space
fn split_word(bytes: &[u8]) -> (&[u8], Option<&[u8]>) {
    match bytes.iter().position(|b| *b == b' ') {
        Some(idx) => (&bytes[..idx], Some(&bytes[idx + 1..])),
        None => (bytes, None),
    }
}

fn parse_block_id(raw: &[u8], line: &[u8]) -> Result<u32> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| invalid("block id is not a non-negative integer", line))
}

fn utf8(raw: &[u8], line: &[u8]) -> Result<String> {
    String::from_utf8(raw.to_vec()).map_err(|_| invalid("filename is not UTF-8", line))
}

fn invalid(reason: &str, line: &[u8]) -> Error {
    Error::InvalidCommand(format!("{} ({:?})", reason, String::from_utf8_lossy(line)))
}
