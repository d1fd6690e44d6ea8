//! Console drivers for each call pattern.
//!
//! Output goes to any `AsyncWrite` so the binary can hand in stdout and tests
//! can hand in a buffer. The printed format is informational only.

use futures::stream;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use super::{GreetRequest, GreetResponse, GreeterClient};
use crate::RpcError;

/// Requests sent by the streaming drivers.
pub const BATCH_SIZE: usize = 10;

/// Requests named `"1"` through `"10"`.
pub fn numbered_requests() -> impl Iterator<Item = GreetRequest> {
    (1..=BATCH_SIZE).map(|i| GreetRequest::new(i.to_string()))
}

async fn print_line<W>(out: &mut W, line: &str) -> Result<(), RpcError>
where
    W: AsyncWrite + Unpin,
{
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    Ok(())
}

/// One unary call per input line until end-of-input.
///
/// A failed call is logged and the loop moves on to the next line. Returns the
/// number of replies received.
pub async fn run_unary<R, W>(client: &GreeterClient, input: R, out: &mut W) -> Result<usize, RpcError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut replies = 0;

    while let Some(name) = lines.next_line().await? {
        print_line(out, &format!("Sending: {name}")).await?;
        match client.mono_hello(GreetRequest::new(name)).await {
            Ok(reply) => {
                replies += 1;
                print_line(out, &format!("Reply: {}", reply.message)).await?;
            }
            Err(e) => warn!(error = %e, "greeting failed"),
        }
    }

    out.flush().await?;
    Ok(replies)
}

/// One server-streaming call per input line, printing every reply.
///
/// Returns the total number of replies received across all lines.
pub async fn run_server_stream<R, W>(
    client: &GreeterClient,
    input: R,
    out: &mut W,
) -> Result<usize, RpcError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut total = 0;

    while let Some(name) = lines.next_line().await? {
        print_line(out, &format!("Sending: {name}")).await?;
        let mut replies = match client.lots_of_replies(GreetRequest::new(name)).await {
            Ok(replies) => replies,
            Err(e) => {
                warn!(error = %e, "failed to open reply stream");
                continue;
            }
        };

        loop {
            match replies.message().await {
                Ok(Some(reply)) => {
                    total += 1;
                    print_line(out, &format!("Reply: {}", reply.message)).await?;
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "reply stream failed");
                    break;
                }
            }
        }
    }

    out.flush().await?;
    Ok(total)
}

/// Sends `"1"` through `"10"`, closes the request side and prints the single reply.
pub async fn run_client_stream<W>(client: &GreeterClient, out: &mut W) -> Result<GreetResponse, RpcError>
where
    W: AsyncWrite + Unpin,
{
    let reply = client
        .lots_of_greetings(stream::iter(numbered_requests()))
        .await?;
    print_line(out, &format!("Reply: {}", reply.message)).await?;
    out.flush().await?;
    Ok(reply)
}

/// Runs the sender and the receiver of one bidirectional call concurrently and
/// returns once both have finished.
///
/// The sender is spawned with its half of the call; the receiver performs
/// [`BATCH_SIZE`] receives on the current task, printing each reply.
pub async fn run_bidi<W>(client: &GreeterClient, out: &mut W) -> Result<Vec<GreetResponse>, RpcError>
where
    W: AsyncWrite + Unpin,
{
    let (mut sender, mut responses) = client.bidi_hello().await?;

    let send_task = tokio::spawn(async move {
        for request in numbered_requests() {
            debug!(name = %request.name, "sending");
            sender.send(&request).await?;
        }
        sender.close().await
    });

    let receive_all = async {
        let mut received = Vec::with_capacity(BATCH_SIZE);
        for _ in 0..BATCH_SIZE {
            match responses.message().await? {
                Some(reply) => {
                    print_line(out, &format!("Reply: {}", reply.message)).await?;
                    received.push(reply);
                }
                None => {
                    warn!(received = received.len(), "reply stream ended early");
                    break;
                }
            }
        }
        Ok::<_, RpcError>(received)
    };

    let (sent, received) = tokio::join!(send_task, receive_all);
    sent.map_err(|e| RpcError::InternalError(format!("sender task failed: {e}")))??;
    let received = received?;

    out.flush().await?;
    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::greeter_client;

    #[test]
    fn numbered_requests_count_from_one_to_ten() {
        let names: Vec<String> = numbered_requests().map(|r| r.name).collect();
        assert_eq!(names.len(), BATCH_SIZE);
        assert_eq!(names.first().map(String::as_str), Some("1"));
        assert_eq!(names.last().map(String::as_str), Some("10"));
    }

    #[tokio::test]
    async fn unary_driver_greets_each_line() {
        let client = greeter_client().await;
        let mut out = Vec::new();

        let replies = run_unary(&client, &b"Ada\n\nGrace\n"[..], &mut out).await.unwrap();

        assert_eq!(replies, 3);
        let printed = String::from_utf8(out).unwrap();
        assert_eq!(
            printed,
            "Sending: Ada\nReply: Hello, Ada\nSending: \nReply: Hello, \nSending: Grace\nReply: Hello, Grace\n"
        );
    }

    #[tokio::test]
    async fn unary_driver_stops_at_end_of_input() {
        let client = greeter_client().await;
        let mut out = Vec::new();

        let replies = run_unary(&client, &b""[..], &mut out).await.unwrap();

        assert_eq!(replies, 0);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn server_stream_driver_prints_all_replies() {
        let client = greeter_client().await;
        let mut out = Vec::new();

        let total = run_server_stream(&client, &b"Lin\n"[..], &mut out).await.unwrap();

        assert_eq!(total, 10);
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("Reply: Hello, Lin from iteration 0\n"));
        assert!(printed.contains("Reply: Hello, Lin from iteration 9\n"));
    }

    #[tokio::test]
    async fn client_stream_driver_gets_joined_greeting() {
        let client = greeter_client().await;
        let mut out = Vec::new();

        let reply = run_client_stream(&client, &mut out).await.unwrap();

        assert_eq!(reply.message, "Hello,1,2,3,4,5,6,7,8,9,10");
        assert_eq!(String::from_utf8(out).unwrap(), "Reply: Hello,1,2,3,4,5,6,7,8,9,10\n");
    }

    #[tokio::test]
    async fn bidi_driver_receives_replies_in_send_order() {
        let client = greeter_client().await;
        let mut out = Vec::new();

        let received = run_bidi(&client, &mut out).await.unwrap();

        let messages: Vec<String> = received.into_iter().map(|r| r.message).collect();
        let expected: Vec<String> = (1..=BATCH_SIZE).map(|k| format!("Hello,{k}")).collect();
        assert_eq!(messages, expected);
    }
}
