use async_trait::async_trait;
use futures::Future;
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    GreetRequest, GreetResponse, BIDI_HELLO, LOTS_OF_GREETINGS, LOTS_OF_REPLIES, MONO_HELLO,
};
use crate::streaming::{encode_stream, single, MessageStream, ResponseStream, Streaming};
use crate::transport::TcpAcceptor;
use crate::{RpcConfig, RpcError, RpcServer};

/// Number of responses produced by `lots_of_replies`.
pub const REPLY_COUNT: usize = 10;

/// Session handler for the `Greeter` service.
#[async_trait]
pub trait Greeter: Send + Sync + 'static {
    async fn mono_hello(&self, request: GreetRequest) -> Result<GreetResponse, RpcError>;

    async fn lots_of_replies(
        &self,
        request: GreetRequest,
    ) -> Result<ResponseStream<GreetResponse>, RpcError>;

    async fn lots_of_greetings(
        &self,
        requests: Streaming<GreetRequest>,
    ) -> Result<GreetResponse, RpcError>;

    async fn bidi_hello(
        &self,
        requests: Streaming<GreetRequest>,
    ) -> Result<ResponseStream<GreetResponse>, RpcError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HelloGreeter;

#[async_trait]
impl Greeter for HelloGreeter {
    async fn mono_hello(&self, request: GreetRequest) -> Result<GreetResponse, RpcError> {
        Ok(GreetResponse {
            message: format!("Hello, {}", request.name),
        })
    }

    async fn lots_of_replies(
        &self,
        request: GreetRequest,
    ) -> Result<ResponseStream<GreetResponse>, RpcError> {
        let name = request.name;
        Ok(Box::pin(async_stream::stream! {
            for i in 0..REPLY_COUNT {
                yield Ok::<_, RpcError>(GreetResponse {
                    message: format!("Hello, {} from iteration {}", name, i),
                });
            }
        }))
    }

    async fn lots_of_greetings(
        &self,
        mut requests: Streaming<GreetRequest>,
    ) -> Result<GreetResponse, RpcError> {
        let mut names = Vec::new();
        loop {
            match requests.message().await {
                Ok(Some(request)) => names.push(request.name),
                Ok(None) => break,
                // A broken stream ends the greeting just like a clean close.
                Err(e) => {
                    debug!(error = %e, received = names.len(), "stopped receiving greetings");
                    break;
                }
            }
        }

        let mut message = String::from("Hello");
        for name in &names {
            message.push(',');
            message.push_str(name);
        }
        Ok(GreetResponse { message })
    }

    async fn bidi_hello(
        &self,
        mut requests: Streaming<GreetRequest>,
    ) -> Result<ResponseStream<GreetResponse>, RpcError> {
        // Lazy: the next request is only read once the previous response was taken.
        Ok(Box::pin(async_stream::stream! {
            loop {
                match requests.message().await {
                    Ok(Some(request)) => {
                        yield Ok::<_, RpcError>(GreetResponse {
                            message: format!("Hello,{}", request.name),
                        });
                    }
                    Ok(None) => break,
                    Err(e) => {
                        debug!(error = %e, "bidirectional stream ended on receive failure");
                        break;
                    }
                }
            }
        }))
    }
}

/// Registers a [`Greeter`] under the service's method names and serves it.
pub struct GreeterServer<H: Greeter> {
    handler: Arc<H>,
    rpc_server: RpcServer,
}

impl<H: Greeter> GreeterServer<H> {
    pub fn new(handler: H, config: RpcConfig) -> Self {
        Self {
            handler: Arc::new(handler),
            rpc_server: RpcServer::new(config),
        }
    }

    pub fn rpc_server(&self) -> &RpcServer {
        &self.rpc_server
    }

    /// Registers all service methods with the RPC server.
    pub async fn register_all(&self) {
        {
            let handler = self.handler.clone();
            self.rpc_server
                .register_typed(MONO_HELLO, move |request: GreetRequest| {
                    let handler = handler.clone();
                    async move { handler.mono_hello(request).await }
                })
                .await;
        }
        {
            let handler = self.handler.clone();
            self.rpc_server
                .register_streaming(LOTS_OF_REPLIES, move |requests| {
                    let handler = handler.clone();
                    async move {
                        let mut requests = Streaming::<GreetRequest>::new(requests);
                        let replies = match requests.message().await {
                            Ok(Some(request)) => handler.lots_of_replies(request).await,
                            Ok(None) => Err(RpcError::StreamError(
                                "call closed before its request arrived".to_string(),
                            )),
                            Err(e) => Err(e),
                        };
                        into_message_stream(replies)
                    }
                })
                .await;
        }
        {
            let handler = self.handler.clone();
            self.rpc_server
                .register_streaming(LOTS_OF_GREETINGS, move |requests| {
                    let handler = handler.clone();
                    async move {
                        let greeting = handler.lots_of_greetings(Streaming::new(requests)).await;
                        single(greeting)
                    }
                })
                .await;
        }
        {
            let handler = self.handler.clone();
            self.rpc_server
                .register_streaming(BIDI_HELLO, move |requests| {
                    let handler = handler.clone();
                    async move { into_message_stream(handler.bidi_hello(Streaming::new(requests)).await) }
                })
                .await;
        }
    }

    /// Registers the service and binds the listener without accepting yet.
    pub async fn bind(&mut self) -> Result<TcpAcceptor, RpcError> {
        self.register_all().await;
        self.rpc_server.bind().await
    }

    /// Address the listener resolved to, once bound.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.rpc_server.socket_addr
    }

    pub async fn serve_with_shutdown<F>(mut self, shutdown: F) -> Result<(), RpcError>
    where
        F: Future<Output = ()>,
    {
        let acceptor = self.bind().await?;
        info!("Greeter server listening on: {:?}", self.rpc_server.socket_addr);
        self.rpc_server.start_with_shutdown(acceptor, shutdown).await
    }
}

fn into_message_stream(result: Result<ResponseStream<GreetResponse>, RpcError>) -> MessageStream {
    match result {
        Ok(responses) => encode_stream(responses),
        Err(e) => single::<GreetResponse>(Err(e)),
    }
}
