//! Control-channel transport
//!
//! The lifecycle only needs "send one JSON object" and "receive the next
//! line, or `None` once the peer is gone". Two implementations:
//!
//! - [`LineSink`] / [`LineSource`]: newline-delimited JSON over any tokio
//!   byte stream; [`connect`] wires them to the controller's TCP server
//! - [`ChannelSink`] / [`ChannelSource`]: in-process `mpsc` channels

use crate::error::{TransportError, TransportResult};
use async_trait::async_trait;
use shared::Outbound;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{info, trace};

#[async_trait]
pub trait MessageSink: Send {
    async fn send(&mut self, message: &Outbound) -> TransportResult<()>;
}

#[async_trait]
pub trait MessageSource: Send {
    /// Next raw line; `None` when the channel is closed
    async fn recv(&mut self) -> TransportResult<Option<String>>;
}

pub struct LineSink<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> LineSink<W> {
    pub fn new(writer: W) -> Self {
        LineSink { writer }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> MessageSink for LineSink<W> {
    async fn send(&mut self, message: &Outbound) -> TransportResult<()> {
        let mut line = message.encode()?;
        trace!("[CONTROL] > {line}");
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

pub struct LineSource<R> {
    lines: Lines<BufReader<R>>,
}

impl<R: AsyncRead + Unpin + Send> LineSource<R> {
    pub fn new(reader: R) -> Self {
        LineSource {
            lines: BufReader::new(reader).lines(),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> MessageSource for LineSource<R> {
    async fn recv(&mut self) -> TransportResult<Option<String>> {
        let line = self.lines.next_line().await?;
        if let Some(line) = &line {
            trace!("[CONTROL] < {line}");
        }
        Ok(line)
    }
}

/// Connect to the controller's TCP server
pub async fn connect(
    addr: &str,
) -> TransportResult<(LineSource<OwnedReadHalf>, LineSink<OwnedWriteHalf>)> {
    let stream = TcpStream::connect(addr).await?;
    info!("[CONTROL] Connected to {addr}");
    let (read, write) = stream.into_split();
    Ok((LineSource::new(read), LineSink::new(write)))
}

pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        ChannelSink { tx }
    }
}

#[async_trait]
impl MessageSink for ChannelSink {
    async fn send(&mut self, message: &Outbound) -> TransportResult<()> {
        self.tx
            .send(message.clone())
            .map_err(|_| TransportError::Closed)
    }
}

pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<String>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::UnboundedReceiver<String>) -> Self {
        ChannelSource { rx }
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn recv(&mut self) -> TransportResult<Option<String>> {
        Ok(self.rx.recv().await)
    }
}
