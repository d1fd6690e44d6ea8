//! The `Greeter` service: one request and one response shape used by all
//! four call patterns.

use serde::{Deserialize, Serialize};

pub mod client;
pub mod driver;
pub mod server;

pub use client::GreeterClient;
pub use server::{Greeter, GreeterServer, HelloGreeter};

pub const SERVICE_NAME: &str = "Greeter";

/// Unary: one request, one response.
pub const MONO_HELLO: &str = "Greeter.MonoHello";
/// Server-streaming: one request, ten responses.
pub const LOTS_OF_REPLIES: &str = "Greeter.LotsOfReplies";
/// Client-streaming: many requests, one response.
pub const LOTS_OF_GREETINGS: &str = "Greeter.LotsOfGreetings";
/// Bidirectional: one response per request.
pub const BIDI_HELLO: &str = "Greeter.BidiHello";

/// Request for greeting operations.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GreetRequest {
    pub name: String,
}

impl GreetRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Response from greeting operations. Only handlers build these.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GreetResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_are_scoped_to_the_service() {
        for method in [MONO_HELLO, LOTS_OF_REPLIES, LOTS_OF_GREETINGS, BIDI_HELLO] {
            assert!(method.starts_with(SERVICE_NAME));
        }
    }

    #[test]
    fn long_non_ascii_names_survive_encoding() {
        let name = "Zoë 🦀 ".repeat(10_000);
        let bytes = bincode::serialize(&GreetRequest::new(name.clone())).unwrap();
        let decoded: GreetRequest = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded.name, name);
    }
}
