//! Line-framed message channels
//!
//! A connection handler only sees a `FrameSource` and a `FrameSink`: one
//! frame is one line of UTF-8 text. The TCP transport splits a socket into
//! the two halves; the in-memory transport backs them with channels so
//! sessions can be driven without a network.

use crate::error::{RaceError, Result};
use crate::protocol::{decode, encode, Message};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

/// Inbound half of a channel
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame, or `None` once the peer has closed the channel
    ///
    /// A line that is too long or not UTF-8 comes back as
    /// `RaceError::MalformedFrame`; the source is still usable after it.
    async fn next_frame(&mut self) -> Result<Option<String>>;
}

/// Outbound half of a channel
#[async_trait]
pub trait FrameSink: Send {
    async fn send_frame(&mut self, frame: &str) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

/// Both halves of one participant's channel
pub struct Transport {
    pub source: Box<dyn FrameSource>,
    pub sink: Box<dyn FrameSink>,
    /// Printable peer address for logs
    pub peer: String,
}

impl Transport {
    pub fn new(source: Box<dyn FrameSource>, sink: Box<dyn FrameSink>, peer: String) -> Self {
        Self { source, sink, peer }
    }

    /// Newline-delimited frames of at most `max_frame_bytes` over a TCP socket
    pub fn tcp(stream: TcpStream, max_frame_bytes: usize) -> Result<Self> {
        stream.set_nodelay(true)?;
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let (reader, writer) = stream.into_split();

        Ok(Self::new(
            Box::new(TcpFrameSource {
                reader: BufReader::new(reader),
                max_frame_bytes,
            }),
            Box::new(TcpFrameSink { writer }),
            peer,
        ))
    }

    /// A transport connected to an in-process client
    pub fn memory() -> (Self, MemoryClient) {
        Self::memory_with_label("memory")
    }

    pub fn memory_with_label(label: &str) -> (Self, MemoryClient) {
        let (to_server, from_client) = mpsc::unbounded_channel();
        let (to_client, from_server) = mpsc::unbounded_channel();

        let transport = Self::new(
            Box::new(MemoryFrameSource {
                frames: UnboundedReceiverStream::new(from_client),
            }),
            Box::new(MemoryFrameSink {
                tx: Some(to_client),
            }),
            label.to_string(),
        );
        let client = MemoryClient {
            tx: Some(to_server),
            rx: from_server,
        };
        (transport, client)
    }
}

struct TcpFrameSource {
    reader: BufReader<OwnedReadHalf>,
    max_frame_bytes: usize,
}

#[async_trait]
impl FrameSource for TcpFrameSource {
    async fn next_frame(&mut self) -> Result<Option<String>> {
        read_frame(&mut self.reader, self.max_frame_bytes).await
    }
}

/// Read one newline-terminated line of at most `limit` bytes
///
/// Bytes past the limit are skipped up to the next newline, so an oversized
/// line costs no more than `limit` bytes of memory and the following frame
/// is read normally. I/O errors are returned as they are.
async fn read_frame<R>(reader: &mut R, limit: usize) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin + Send,
{
    let mut line = Vec::new();
    let mut oversized = false;

    loop {
        let (used, terminated) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                // EOF; an unterminated last line still counts
                if line.is_empty() && !oversized {
                    return Ok(None);
                }
                break;
            }

            let (chunk, terminated) = match available.iter().position(|b| *b == b'\n') {
                Some(end) => (&available[..end], true),
                None => (available, false),
            };
            if !oversized {
                if line.len() + chunk.len() > limit {
                    oversized = true;
                    line = Vec::new();
                } else {
                    line.extend_from_slice(chunk);
                }
            }
            (chunk.len() + usize::from(terminated), terminated)
        };
        reader.consume(used);
        if terminated {
            break;
        }
    }

    if oversized {
        return Err(RaceError::MalformedFrame {
            reason: format!("Frame exceeds {} bytes", limit),
        }
        .into());
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }

    String::from_utf8(line).map(Some).map_err(|_| {
        RaceError::MalformedFrame {
            reason: "Frame is not valid UTF-8".to_string(),
        }
        .into()
    })
}

struct TcpFrameSink {
    writer: OwnedWriteHalf,
}

#[async_trait]
impl FrameSink for TcpFrameSink {
    async fn send_frame(&mut self, frame: &str) -> Result<()> {
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

struct MemoryFrameSource {
    frames: UnboundedReceiverStream<String>,
}

#[async_trait]
impl FrameSource for MemoryFrameSource {
    async fn next_frame(&mut self) -> Result<Option<String>> {
        Ok(self.frames.next().await)
    }
}

struct MemoryFrameSink {
    tx: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl FrameSink for MemoryFrameSink {
    async fn send_frame(&mut self, frame: &str) -> Result<()> {
        let tx = self.tx.as_ref().ok_or_else(|| RaceError::InternalError {
            message: "channel already closed".to_string(),
        })?;
        tx.send(frame.to_string())
            .map_err(|_| RaceError::InternalError {
                message: "client went away".to_string(),
            })?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.tx = None;
        Ok(())
    }
}

/// The client end of an in-memory transport
pub struct MemoryClient {
    tx: Option<mpsc::UnboundedSender<String>>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl MemoryClient {
    pub fn send(&self, message: &Message) -> Result<()> {
        self.send_raw(&encode(message)?)
    }

    /// Send a frame exactly as given
    pub fn send_raw(&self, frame: &str) -> Result<()> {
        let tx = self.tx.as_ref().ok_or_else(|| RaceError::InternalError {
            message: "client already closed".to_string(),
        })?;
        tx.send(frame.to_string())
            .map_err(|_| RaceError::InternalError {
                message: "server went away".to_string(),
            })?;
        Ok(())
    }

    /// Next decoded message, or `None` once the server closed the channel
    pub async fn recv(&mut self) -> Option<Message> {
        loop {
            let frame = self.rx.recv().await?;
            match decode(&frame) {
                Ok(message) => return Some(message),
                Err(_) => continue,
            }
        }
    }

    /// Next message that satisfies `pred`, skipping the rest
    pub async fn recv_until<F>(&mut self, mut pred: F) -> Option<Message>
    where
        F: FnMut(&Message) -> bool,
    {
        loop {
            let message = self.recv().await?;
            if pred(&message) {
                return Some(message);
            }
        }
    }

    /// Hang up, as if the socket was closed
    pub fn close(&mut self) {
        self.tx = None;
    }
}
