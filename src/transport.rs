//! Duplex framed streams and the seams used to obtain them.
//!
//! A call always runs over one [`RpcStream`]. The stream is split into a
//! [`FrameWriter`] and a [`FrameReader`] so the two directions can be driven
//! from different tasks without a lock between them.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt, TryStreamExt};
use std::{net::SocketAddr, pin::Pin};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream},
    sync::Mutex,
};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, warn};

use crate::codec::{Frame, FrameCodec};
use crate::{RpcConfig, RpcError};

type BoxFrameSink = Pin<Box<dyn Sink<Frame, Error = RpcError> + Send>>;
type BoxFrameStream = Pin<Box<dyn Stream<Item = Result<Frame, RpcError>> + Send>>;

pub struct RpcStream {
    writer: FrameWriter,
    reader: FrameReader,
}

impl RpcStream {
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + 'static,
        W: AsyncWrite + Send + 'static,
    {
        let frames_in = FramedRead::new(reader, FrameCodec)
            .map_err(|err| RpcError::ReadError(err.to_string()));
        let frames_out = FramedWrite::new(writer, FrameCodec)
            .sink_map_err(|err| RpcError::WriteError(err.to_string()));

        Self {
            writer: FrameWriter {
                inner: Box::pin(frames_out),
            },
            reader: FrameReader {
                inner: Box::pin(frames_in),
            },
        }
    }

    /// Wraps a single duplex I/O object such as `tokio::io::DuplexStream`.
    pub fn from_io<T>(io: T) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(io);
        Self::new(reader, writer)
    }

    pub fn from_tcp(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self::new(reader, writer)
    }

    pub fn split(self) -> (FrameWriter, FrameReader) {
        (self.writer, self.reader)
    }
}

pub struct FrameWriter {
    inner: BoxFrameSink,
}

impl FrameWriter {
    pub async fn send(&mut self, frame: Frame) -> Result<(), RpcError> {
        self.inner.send(frame).await
    }

    pub async fn send_data(&mut self, payload: impl Into<Bytes>) -> Result<(), RpcError> {
        self.send(Frame::data(payload)).await
    }

    /// Writes the end-of-stream marker.
    pub async fn finish(&mut self) -> Result<(), RpcError> {
        self.send(Frame::End).await
    }
}

pub struct FrameReader {
    inner: BoxFrameStream,
}

impl FrameReader {
    /// Returns `Ok(None)` when the peer closed the byte stream.
    pub async fn receive(&mut self) -> Result<Option<Frame>, RpcError> {
        self.inner.next().await.transpose()
    }
}

/// Client-side source of call streams.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open_stream(&self) -> Result<RpcStream, RpcError>;
}

/// Dials one TCP connection per call.
///
/// The first connection is dialed by [`TcpConnector::connect`] so that an
/// unreachable endpoint fails immediately; that connection then serves the
/// first call.
pub struct TcpConnector {
    address: String,
    nodelay: bool,
    primed: Mutex<Option<TcpStream>>,
}

impl TcpConnector {
    pub async fn connect(config: &RpcConfig) -> Result<Self, RpcError> {
        let address = config.address();
        let stream = dial(&address, config.nodelay).await?;
        Ok(Self {
            address,
            nodelay: config.nodelay,
            primed: Mutex::new(Some(stream)),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

async fn dial(address: &str, nodelay: bool) -> Result<TcpStream, RpcError> {
    let stream = TcpStream::connect(address)
        .await
        .map_err(|e| RpcError::ConnectionError(format!("failed to connect to {address}: {e}")))?;
    stream
        .set_nodelay(nodelay)
        .map_err(|e| RpcError::ConnectionError(e.to_string()))?;
    debug!(%address, "dialed call stream");
    Ok(stream)
}

#[async_trait]
impl Connector for TcpConnector {
    async fn open_stream(&self) -> Result<RpcStream, RpcError> {
        let primed = self.primed.lock().await.take();
        let stream = match primed {
            Some(stream) => stream,
            None => dial(&self.address, self.nodelay).await?,
        };
        Ok(RpcStream::from_tcp(stream))
    }
}

/// Server-side source of call streams.
#[async_trait]
pub trait Acceptor: Send {
    /// `Ok(None)` means no further sessions will arrive.
    async fn accept(&mut self) -> Result<Option<RpcStream>, RpcError>;
}

pub struct TcpAcceptor {
    listener: TcpListener,
    nodelay: bool,
}

impl TcpAcceptor {
    pub async fn bind(config: &RpcConfig) -> Result<Self, RpcError> {
        let address = config.address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| RpcError::ConnectionError(format!("failed to bind {address}: {e}")))?;
        Ok(Self {
            listener,
            nodelay: config.nodelay,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RpcError> {
        self.listener.local_addr().map_err(|_err| {
            RpcError::ConfigError("Could not retrieve local_addr() from listener".to_string())
        })
    }
}

#[async_trait]
impl Acceptor for TcpAcceptor {
    async fn accept(&mut self) -> Result<Option<RpcStream>, RpcError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(|e| RpcError::ConnectionError(e.to_string()))?;
        if let Err(err) = stream.set_nodelay(self.nodelay) {
            warn!(%peer, error = %err, "failed to configure accepted socket");
        }
        debug!(%peer, "accepted session");
        Ok(Some(RpcStream::from_tcp(stream)))
    }
}
