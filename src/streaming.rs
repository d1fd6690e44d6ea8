use futures::{future, stream, Stream, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::transport::FrameWriter;
use crate::RpcError;

/// Encoded messages flowing through a streaming call, in either direction.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, RpcError>> + Send>>;

/// Lazily produced typed responses returned by streaming handlers.
pub type ResponseStream<T> = Pin<Box<dyn Stream<Item = Result<T, RpcError>> + Send>>;

/// Typed receiving half of a streaming call.
pub struct Streaming<T> {
    inner: MessageStream,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Streaming<T>
where
    T: DeserializeOwned,
{
    pub fn new(inner: MessageStream) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Receives the next message.
    ///
    /// `Ok(None)` is the peer's end-of-stream; transport and decode failures
    /// come back as `Err` and leave it to the caller whether to keep going.
    pub async fn message(&mut self) -> Result<Option<T>, RpcError> {
        match self.inner.next().await {
            Some(Ok(bytes)) => Ok(Some(bincode::deserialize(&bytes)?)),
            Some(Err(err)) => Err(err),
            None => Ok(None),
        }
    }
}

impl<T> Stream for Streaming<T>
where
    T: DeserializeOwned,
{
    type Item = Result<T, RpcError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(bytes))) => {
                Poll::Ready(Some(bincode::deserialize(&bytes).map_err(RpcError::from)))
            }
            Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(err))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Untyped sending half of a client call.
pub struct RequestSender {
    writer: FrameWriter,
    closed: bool,
}

impl RequestSender {
    pub(crate) fn new(writer: FrameWriter) -> Self {
        Self {
            writer,
            closed: false,
        }
    }

    pub async fn send(&mut self, payload: Vec<u8>) -> Result<(), RpcError> {
        if self.closed {
            return Err(RpcError::StreamError(
                "send after end-of-stream".to_string(),
            ));
        }
        self.writer.send_data(payload).await
    }

    /// Signals end-of-stream. Calling it again is a no-op.
    pub async fn close_send(&mut self) -> Result<(), RpcError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.writer.finish().await
    }
}

/// Typed sending half of a client call.
pub struct StreamSender<T> {
    inner: RequestSender,
    _marker: PhantomData<fn(T)>,
}

impl<T> StreamSender<T>
where
    T: Serialize,
{
    pub fn new(inner: RequestSender) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    pub async fn send(&mut self, message: &T) -> Result<(), RpcError> {
        let payload = bincode::serialize(message)?;
        self.inner.send(payload).await
    }

    pub async fn close(mut self) -> Result<(), RpcError> {
        self.inner.close_send().await
    }
}

/// Serializes each item of a typed response stream, preserving errors.
pub fn encode_stream<T>(responses: ResponseStream<T>) -> MessageStream
where
    T: Serialize + 'static,
{
    Box::pin(responses.map(|item| item.and_then(|message| Ok(bincode::serialize(&message)?))))
}

/// A stream carrying exactly one item.
pub fn single<T>(item: Result<T, RpcError>) -> MessageStream
where
    T: Serialize,
{
    let encoded = item.and_then(|message| Ok(bincode::serialize(&message)?));
    Box::pin(stream::once(future::ready(encoded)))
}
