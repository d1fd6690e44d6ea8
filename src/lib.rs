use bytes::Bytes;
use futures::{stream, Future, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    net::SocketAddr,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub mod codec;
pub mod greeter;
pub mod streaming;
pub mod transport;

use codec::Frame;
use streaming::{MessageStream, RequestSender};
use transport::{Acceptor, Connector, FrameReader, FrameWriter, RpcStream, TcpAcceptor, TcpConnector};

pub mod runtime {
    //! Tokio runtime construction for the binary.
    use std::{env, io, thread};
    use tokio::runtime::{Builder, Runtime};

    /// Environment variable overriding the number of server worker threads.
    pub const SERVER_THREADS_ENV: &str = "GREETER_SERVER_THREADS";

    /// A client never needs more than its sender and receiver running at once.
    pub const CLIENT_WORKER_THREADS: usize = 2;

    /// Builds a multi-threaded runtime sized for the chosen role.
    pub fn build(server: bool) -> io::Result<Runtime> {
        let workers = if server {
            server_worker_threads()
        } else {
            CLIENT_WORKER_THREADS
        };
        Builder::new_multi_thread()
            .worker_threads(workers)
            .thread_name(if server { "greeter-server" } else { "greeter-client" })
            .enable_all()
            .build()
    }

    /// Worker threads for the server: [`SERVER_THREADS_ENV`] when it holds a
    /// positive integer, otherwise the available parallelism.
    pub fn server_worker_threads() -> usize {
        env::var(SERVER_THREADS_ENV)
            .ok()
            .and_then(|raw| positive_count(&raw))
            .unwrap_or_else(|| thread::available_parallelism().map_or(1, |n| n.get()))
    }

    fn positive_count(raw: &str) -> Option<usize> {
        raw.trim().parse::<usize>().ok().filter(|count| *count > 0)
    }

}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Transport write error: {0}")]
    WriteError(String),

    #[error("Transport read error: {0}")]
    ReadError(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] bincode::Error),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Header frame opening every call.
///
/// Unary calls carry the encoded request in `params`; streaming calls leave it
/// empty and send their requests as the frames that follow.
#[derive(Debug, Serialize, Deserialize)]
pub struct RpcRequest {
    id: u64,
    method: String,
    params: Vec<u8>,
}

impl RpcRequest {
    pub fn new(id: u64, method: String, params: Vec<u8>) -> Self {
        Self { id, method, params }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn params(&self) -> &[u8] {
        &self.params
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse {
    id: u64,
    result: Option<Vec<u8>>,
    error: Option<String>,
}

impl RpcResponse {
    pub fn new(id: u64, result: Option<Vec<u8>>, error: Option<String>) -> Self {
        Self { id, result, error }
    }

    pub fn from_result(id: u64, result: Result<Vec<u8>, RpcError>) -> Self {
        match result {
            Ok(data) => Self::new(id, Some(data), None),
            Err(e) => Self::new(id, None, Some(e.to_string())),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn result(&self) -> Option<&Vec<u8>> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&String> {
        self.error.as_ref()
    }

    pub fn into_result(self) -> Result<Vec<u8>, RpcError> {
        match (self.result, self.error) {
            (_, Some(err_msg)) => Err(RpcError::StreamError(err_msg)),
            (Some(data), None) => Ok(data),
            (None, None) => Err(RpcError::StreamError("Invalid response".into())),
        }
    }
}

/// Endpoint settings shared by the server bootstrap and the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcConfig {
    pub host: String,

    pub port: u16,

    pub nodelay: bool,
}

impl RpcConfig {
    pub const DEFAULT_HOST: &'static str = "localhost";
    pub const DEFAULT_PORT: u16 = 8080;

    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            nodelay: true,
        }
    }

    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// `host:port`, bracketing bare IPv6 literals.
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_HOST, Self::DEFAULT_PORT)
    }
}

type AsyncHandlerFn = Arc<
    dyn Fn(Vec<u8>) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, RpcError>> + Send>>
        + Send
        + Sync,
>;

type AsyncStreamingHandlerFn = Arc<
    dyn Fn(MessageStream) -> Pin<Box<dyn Future<Output = MessageStream> + Send>> + Send + Sync,
>;

#[derive(Clone)]
pub struct RpcServer {
    pub handlers: Arc<RwLock<HashMap<String, AsyncHandlerFn>>>,

    pub streaming_handlers: Arc<RwLock<HashMap<String, AsyncStreamingHandlerFn>>>,

    pub socket_addr: Option<SocketAddr>,

    pub config: RpcConfig,
}

impl RpcServer {
    pub fn new(config: RpcConfig) -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            streaming_handlers: Arc::new(RwLock::new(HashMap::new())),
            socket_addr: None,
            config,
        }
    }

    pub async fn register<F, Fut>(&self, method: &str, handler: F)
    where
        F: Fn(Vec<u8>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<u8>, RpcError>> + Send + 'static,
    {
        let mut handlers = self.handlers.write().await;
        handlers.insert(
            method.to_string(),
            Arc::new(move |params: Vec<u8>| {
                Box::pin(handler(params)) as Pin<Box<dyn Future<Output = _> + Send>>
            }),
        );
    }

    pub async fn register_typed<Req, Resp, F, Fut>(&self, method: &str, handler: F)
    where
        Req: serde::de::DeserializeOwned + Send + 'static,
        Resp: serde::Serialize + Send + 'static,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, RpcError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        self.register(method, move |params: Vec<u8>| {
            let handler = handler.clone();
            async move {
                let request: Req = bincode::deserialize(&params)?;
                let response = handler(request).await?;
                Ok(bincode::serialize(&response)?)
            }
        })
        .await;
    }

    pub async fn register_streaming<F, Fut, S>(&self, method: &str, handler: F)
    where
        F: Fn(MessageStream) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = S> + Send + 'static,
        S: Stream<Item = Result<Vec<u8>, RpcError>> + Send + 'static,
    {
        let mut handlers = self.streaming_handlers.write().await;
        handlers.insert(
            method.to_string(),
            Arc::new(move |request_stream: MessageStream| {
                let handler = handler.clone();
                Box::pin(async move {
                    let response_stream = handler(request_stream).await;
                    Box::pin(response_stream) as MessageStream
                }) as Pin<Box<dyn Future<Output = MessageStream> + Send>>
            }),
        );
    }

    /// Binds the configured address and records the resolved local address.
    pub async fn bind(&mut self) -> Result<TcpAcceptor, RpcError> {
        let acceptor = TcpAcceptor::bind(&self.config).await?;
        let local_addr = acceptor.local_addr()?;
        self.socket_addr = Some(local_addr);
        info!("RPC server listening on {local_addr}");
        Ok(acceptor)
    }

    pub async fn start<A>(&self, acceptor: A) -> Result<(), RpcError>
    where
        A: Acceptor,
    {
        self.start_with_shutdown(acceptor, futures::future::pending())
            .await
    }

    /// Accepts sessions until the acceptor is exhausted or `shutdown` resolves.
    /// Sessions already running are left to finish on their own.
    pub async fn start_with_shutdown<A, F>(&self, mut acceptor: A, shutdown: F) -> Result<(), RpcError>
    where
        A: Acceptor,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested, no longer accepting sessions");
                    return Ok(());
                }
                accepted = acceptor.accept() => {
                    match accepted {
                        Ok(Some(stream)) => {
                            let handlers = self.handlers.clone();
                            let streaming_handlers = self.streaming_handlers.clone();
                            tokio::spawn(Self::handle_stream(handlers, streaming_handlers, stream));
                        }
                        Ok(None) => return Ok(()),
                        Err(err) => warn!(error = %err, "failed to accept session"),
                    }
                }
            }
        }
    }

    /// Runs one session to completion on the current task.
    pub async fn serve_stream(&self, stream: RpcStream) {
        Self::handle_stream(
            self.handlers.clone(),
            self.streaming_handlers.clone(),
            stream,
        )
        .await
    }

    async fn handle_stream(
        handlers: Arc<RwLock<HashMap<String, AsyncHandlerFn>>>,
        streaming_handlers: Arc<RwLock<HashMap<String, AsyncStreamingHandlerFn>>>,
        stream: RpcStream,
    ) {
        let (mut writer, mut reader) = stream.split();

        let header = match reader.receive().await {
            Ok(Some(Frame::Data(bytes))) => {
                debug!("📦 Received {} byte call header", bytes.len());
                bytes
            }
            Ok(Some(Frame::End)) | Ok(None) => {
                debug!("🔚 Stream closed before a call header");
                return;
            }
            Err(e) => {
                debug!("❌ Stream error: {:?}", e);
                return;
            }
        };

        let request = match bincode::deserialize::<RpcRequest>(&header) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "dropping session with malformed call header");
                return;
            }
        };
        debug!("📨 Received RPC request: {}", request.method());

        let unary = handlers.read().await.get(request.method()).cloned();
        if let Some(handler) = unary {
            let result = handler(request.params().to_vec()).await;
            let response = RpcResponse::from_result(request.id(), result);
            if let Err(e) = Self::send_response(&mut writer, &response).await {
                warn!(method = request.method(), error = %e, "failed to deliver unary response");
            }
            return;
        }

        let streaming = streaming_handlers.read().await.get(request.method()).cloned();
        match streaming {
            Some(handler) => {
                let request_stream = Self::create_request_stream(reader);
                let response_stream = handler(request_stream).await;
                if let Err(e) =
                    Self::send_response_stream(&mut writer, request.id(), response_stream).await
                {
                    warn!(method = request.method(), error = %e, "aborted response stream");
                }
            }
            None => {
                let response = RpcResponse::from_result(
                    request.id(),
                    Err(RpcError::UnknownMethod(request.method().to_string())),
                );
                let delivered = match Self::send_response(&mut writer, &response).await {
                    Ok(()) => writer.finish().await,
                    Err(e) => Err(e),
                };
                if let Err(e) = delivered {
                    debug!(error = %e, "failed to report unknown method");
                }
            }
        }
    }

    /// Exposes the frames following the call header as a request stream.
    ///
    /// The stream ends at the end-of-stream marker or when the peer closes.
    /// A read failure is yielded once and also ends the stream.
    fn create_request_stream(mut reader: FrameReader) -> MessageStream {
        Box::pin(async_stream::stream! {
            loop {
                match reader.receive().await {
                    Ok(Some(Frame::Data(bytes))) => yield Ok(bytes.to_vec()),
                    Ok(Some(Frame::End)) => {
                        debug!("🔚 End-of-stream marker");
                        break;
                    }
                    Ok(None) => {
                        debug!("🔚 Stream closed");
                        break;
                    }
                    Err(e) => {
                        debug!("❌ Stream error: {:?}", e);
                        yield Err(e);
                        break;
                    }
                }
            }
        })
    }

    /// Writes each response as it is produced, then the end-of-stream marker.
    ///
    /// A failed write stops pulling from `response_stream` and is returned.
    /// A handler error is reported to the peer and ends the stream.
    async fn send_response_stream(
        writer: &mut FrameWriter,
        id: u64,
        mut response_stream: MessageStream,
    ) -> Result<(), RpcError> {
        while let Some(response_result) = response_stream.next().await {
            match response_result {
                Ok(response_data) => {
                    let response = RpcResponse::new(id, Some(response_data), None);
                    Self::send_response(writer, &response).await?;
                }
                Err(e) => {
                    debug!(error = %e, "handler failed mid-stream");
                    let response = RpcResponse::from_result(id, Err(e));
                    Self::send_response(writer, &response).await?;
                    break;
                }
            }
        }

        writer.finish().await
    }

    async fn send_response(writer: &mut FrameWriter, response: &RpcResponse) -> Result<(), RpcError> {
        let response_data = bincode::serialize(response)?;
        writer.send_data(Bytes::from(response_data)).await
    }
}

pub struct RpcClient {
    connector: Arc<dyn Connector>,
    pub next_id: Arc<AtomicU64>,
}

impl RpcClient {
    /// Dials the configured endpoint; an unreachable endpoint is an error here
    /// rather than on the first call.
    pub async fn connect(config: RpcConfig) -> Result<Self, RpcError> {
        let connector = TcpConnector::connect(&config).await?;
        info!(address = connector.address(), "connected");
        Ok(Self::with_connector(Arc::new(connector)))
    }

    pub fn with_connector(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub async fn call(&self, method: &str, params: Vec<u8>) -> Result<Vec<u8>, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let req = RpcRequest::new(id, method.to_string(), params);
        let req_data = bincode::serialize(&req)?;

        let (mut writer, mut reader) = self.connector.open_stream().await?.split();
        writer.send_data(req_data).await?;

        loop {
            match reader.receive().await? {
                Some(Frame::Data(bytes)) => {
                    let response = bincode::deserialize::<RpcResponse>(&bytes)?;
                    if response.id() == id {
                        return response.into_result();
                    }
                    debug!(expected = id, got = response.id(), "skipping response for another call");
                }
                Some(Frame::End) | None => {
                    return Err(RpcError::ConnectionError(
                        "Stream closed unexpectedly".into(),
                    ));
                }
            }
        }
    }

    /// Opens a streaming call and hands back its two halves.
    ///
    /// The sender and the response stream are independent and may be driven
    /// from different tasks.
    pub async fn open_call(&self, method: &str) -> Result<(RequestSender, MessageStream), RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let header = bincode::serialize(&RpcRequest::new(id, method.to_string(), Vec::new()))?;

        let (mut writer, reader) = self.connector.open_stream().await?.split();
        writer.send_data(header).await?;

        Ok((RequestSender::new(writer), Self::create_response_stream(reader, id)))
    }

    fn create_response_stream(mut reader: FrameReader, id: u64) -> MessageStream {
        Box::pin(async_stream::stream! {
            loop {
                match reader.receive().await {
                    Ok(Some(Frame::Data(bytes))) => {
                        match bincode::deserialize::<RpcResponse>(&bytes) {
                            Ok(response) if response.id() == id => yield response.into_result(),
                            Ok(response) => {
                                debug!(expected = id, got = response.id(), "skipping response for another call");
                            }
                            Err(e) => {
                                yield Err(RpcError::from(e));
                                break;
                            }
                        }
                    }
                    Ok(Some(Frame::End)) => break,
                    Ok(None) => {
                        yield Err(RpcError::StreamError("Stream closed before end-of-stream".into()));
                        break;
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        })
    }

    /// Sends every item of `request_stream` from a spawned task, then signals
    /// end-of-stream, while responses are read through the returned stream.
    pub async fn call_streaming<S>(&self, method: &str, request_stream: S) -> Result<MessageStream, RpcError>
    where
        S: Stream<Item = Vec<u8>> + Send + 'static,
    {
        let (mut sender, responses) = self.open_call(method).await?;

        tokio::spawn(async move {
            let mut request_stream = Box::pin(request_stream);
            while let Some(request_data) = request_stream.next().await {
                if let Err(e) = sender.send(request_data).await {
                    debug!(error = %e, "request stream aborted");
                    return;
                }
            }
            if let Err(e) = sender.close_send().await {
                debug!(error = %e, "failed to signal end-of-stream");
            }
        });

        Ok(responses)
    }

    pub async fn call_server_streaming(&self, method: &str, request: Vec<u8>) -> Result<MessageStream, RpcError> {
        self.call_streaming(method, stream::iter(vec![request])).await
    }
}




#[cfg(test)]
mod session_tests {
    use super::*;
    use crate::test_support::LoopbackConnector;
    use async_trait::async_trait;
    use std::io;
    use std::sync::atomic::AtomicUsize;
    use std::task::{Context, Poll};
    use tokio::io::AsyncWrite;
    use tokio::sync::mpsc;

    struct ChannelAcceptor {
        incoming: mpsc::Receiver<RpcStream>,
    }

    #[async_trait]
    impl Acceptor for ChannelAcceptor {
        async fn accept(&mut self) -> Result<Option<RpcStream>, RpcError> {
            Ok(self.incoming.recv().await)
        }
    }

    struct BrokenPipe;

    impl AsyncWrite for BrokenPipe {
        fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, _: &[u8]) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone")))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    async fn echo_server() -> RpcServer {
        let server = RpcServer::new(RpcConfig::new("127.0.0.1", 0));
        server
            .register("echo", |params| async move { Ok(params) })
            .await;
        server
            .register("fail", |_params| async move {
                Err(RpcError::InternalError("handler refused".into()))
            })
            .await;
        server
            .register_streaming("upper", |mut requests| async move {
                async_stream::stream! {
                    while let Some(Ok(next)) = requests.next().await {
                        yield Ok::<_, RpcError>(next.iter().map(|b| b.to_ascii_uppercase()).collect::<Vec<u8>>());
                    }
                }
            })
            .await;
        server
    }

    fn loopback_client(server: RpcServer) -> RpcClient {
        RpcClient::with_connector(Arc::new(LoopbackConnector::new(server)))
    }

    #[tokio::test]
    async fn unary_call_round_trips_through_a_session() {
        let client = loopback_client(echo_server().await);

        let reply = client.call("echo", b"hello".to_vec()).await.unwrap();
        assert_eq!(reply, b"hello".to_vec());
    }

    #[tokio::test]
    async fn unary_handler_error_reaches_the_caller() {
        let client = loopback_client(echo_server().await);

        let err = client.call("fail", b"x".to_vec()).await.unwrap_err();
        assert!(matches!(err, RpcError::StreamError(msg) if msg.contains("handler refused")));
    }

    #[tokio::test]
    async fn unknown_method_is_reported_for_unary_and_streaming_calls() {
        let client = loopback_client(echo_server().await);

        let err = client.call("missing", b"x".to_vec()).await.unwrap_err();
        assert!(matches!(err, RpcError::StreamError(msg) if msg == "Unknown method: missing"));

        let mut responses = client
            .call_streaming("missing", stream::iter(Vec::<Vec<u8>>::new()))
            .await
            .unwrap();
        assert!(matches!(responses.next().await, Some(Err(RpcError::StreamError(_)))));
        assert!(responses.next().await.is_none());
    }

    #[tokio::test]
    async fn streaming_call_answers_each_request_in_order() {
        let client = loopback_client(echo_server().await);

        let responses = client
            .call_streaming("upper", stream::iter(vec![b"abc".to_vec(), b"xyz".to_vec()]))
            .await
            .unwrap();
        let collected: Vec<Vec<u8>> = responses.map(|item| item.unwrap()).collect().await;

        assert_eq!(collected, vec![b"ABC".to_vec(), b"XYZ".to_vec()]);
    }

    #[tokio::test]
    async fn session_without_header_closes_quietly() {
        let server = echo_server().await;
        let (client_io, server_io) = tokio::io::duplex(1024);
        drop(client_io);

        server.serve_stream(RpcStream::from_io(server_io)).await;
    }

    #[tokio::test]
    async fn oversized_header_prefix_drops_the_session() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let server = echo_server().await;
        let (mut raw, server_io) = tokio::io::duplex(1024);
        raw.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();

        server.serve_stream(RpcStream::from_io(server_io)).await;

        let mut reply = Vec::new();
        raw.read_to_end(&mut reply).await.unwrap();
        assert!(reply.is_empty());
    }

    #[tokio::test]
    async fn request_stream_yields_read_error_once_then_ends() {
        use tokio::io::AsyncWriteExt;

        let (mut raw, server_io) = tokio::io::duplex(1024);
        let (_writer, reader) = RpcStream::from_io(server_io).split();
        raw.write_all(&[2, 0, 0, 0, b'o', b'k', 5, 0, 0]).await.unwrap();
        drop(raw);

        let mut requests = RpcServer::create_request_stream(reader);
        assert_eq!(requests.next().await.unwrap().unwrap(), b"ok".to_vec());
        assert!(matches!(requests.next().await, Some(Err(RpcError::ReadError(_)))));
        assert!(requests.next().await.is_none());
    }

    #[tokio::test]
    async fn write_failure_stops_pulling_responses() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let responses: MessageStream = Box::pin(async_stream::stream! {
            for i in 0..10u8 {
                counter.fetch_add(1, Ordering::SeqCst);
                yield Ok::<_, RpcError>(vec![i + 1]);
            }
        });

        let (_unused, reader_side) = tokio::io::duplex(64);
        let (mut writer, _reader) = RpcStream::new(reader_side, BrokenPipe).split();

        let result = RpcServer::send_response_stream(&mut writer, 1, responses).await;

        assert!(matches!(result, Err(RpcError::WriteError(_))));
        assert_eq!(pulled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn start_serves_sessions_until_acceptor_is_exhausted() {
        let server = echo_server().await;
        let (tx, rx) = mpsc::channel(4);

        let (client_io, server_io) = tokio::io::duplex(1024);
        tx.send(RpcStream::from_io(server_io)).await.unwrap();
        drop(tx);

        server.start(ChannelAcceptor { incoming: rx }).await.unwrap();

        let (mut writer, mut reader) = RpcStream::from_io(client_io).split();
        let header = bincode::serialize(&RpcRequest::new(9, "echo".into(), b"hi".to_vec())).unwrap();
        writer.send_data(header).await.unwrap();

        let bytes = match reader.receive().await.unwrap() {
            Some(Frame::Data(bytes)) => bytes,
            other => panic!("expected a response frame, got {other:?}"),
        };
        let response: RpcResponse = bincode::deserialize(&bytes).unwrap();
        assert_eq!(response.id(), 9);
        assert_eq!(response.into_result().unwrap(), b"hi".to_vec());
    }

    #[tokio::test]
    async fn shutdown_signal_stops_accepting() {
        let server = echo_server().await;
        let (_tx, rx) = mpsc::channel::<RpcStream>(1);

        server
            .start_with_shutdown(ChannelAcceptor { incoming: rx }, futures::future::ready(()))
            .await
            .unwrap();
    }
}
