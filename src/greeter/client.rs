use futures::{Stream, StreamExt};

use super::{
    GreetRequest, GreetResponse, BIDI_HELLO, LOTS_OF_GREETINGS, LOTS_OF_REPLIES, MONO_HELLO,
};
use crate::streaming::{StreamSender, Streaming};
use crate::{RpcClient, RpcConfig, RpcError};

/// Typed client for the `Greeter` service.
pub struct GreeterClient {
    inner: RpcClient,
}

impl GreeterClient {
    /// Connects to the service at the configured endpoint.
    pub async fn connect(config: RpcConfig) -> Result<Self, RpcError> {
        let inner = RpcClient::connect(config).await?;
        Ok(Self { inner })
    }

    pub fn new(inner: RpcClient) -> Self {
        Self { inner }
    }

    pub async fn mono_hello(&self, request: GreetRequest) -> Result<GreetResponse, RpcError> {
        let params = bincode::serialize(&request)?;
        let response_data = self.inner.call(MONO_HELLO, params).await?;
        Ok(bincode::deserialize::<GreetResponse>(&response_data)?)
    }

    pub async fn lots_of_replies(
        &self,
        request: GreetRequest,
    ) -> Result<Streaming<GreetResponse>, RpcError> {
        let params = bincode::serialize(&request)?;
        let responses = self.inner.call_server_streaming(LOTS_OF_REPLIES, params).await?;
        Ok(Streaming::new(responses))
    }

    /// Sends every request, signals end-of-stream, then waits for the single reply.
    pub async fn lots_of_greetings<S>(&self, requests: S) -> Result<GreetResponse, RpcError>
    where
        S: Stream<Item = GreetRequest>,
    {
        let (sender, responses) = self.inner.open_call(LOTS_OF_GREETINGS).await?;
        let mut sender = StreamSender::<GreetRequest>::new(sender);

        let mut requests = Box::pin(requests);
        while let Some(request) = requests.next().await {
            sender.send(&request).await?;
        }
        sender.close().await?;

        Streaming::<GreetResponse>::new(responses)
            .message()
            .await?
            .ok_or_else(|| RpcError::StreamError("No response received".to_string()))
    }

    /// Opens a bidirectional call. The two halves can be moved to separate tasks.
    pub async fn bidi_hello(
        &self,
    ) -> Result<(StreamSender<GreetRequest>, Streaming<GreetResponse>), RpcError> {
        let (sender, responses) = self.inner.open_call(BIDI_HELLO).await?;
        Ok((StreamSender::new(sender), Streaming::new(responses)))
    }
}
