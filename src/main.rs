use anyhow::Result;
use clap::Parser;
use greeter_rpc::greeter::{driver, GreeterClient, GreeterServer, HelloGreeter};
use greeter_rpc::{runtime, RpcConfig};
use std::str::FromStr;
use tokio::io::BufReader;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "greeter-rpc")]
#[command(about = "Greeter service over unary, server-, client- and bidirectional-streaming calls")]
struct Args {
    /// server, client, client_stream, client_greetings or client_replies
    mode: String,

    /// Host to bind (server) or dial (clients)
    #[arg(long, env = "GREETER_HOST", default_value = RpcConfig::DEFAULT_HOST)]
    host: String,

    /// Port to bind (server) or dial (clients)
    #[arg(long, env = "GREETER_PORT", default_value_t = RpcConfig::DEFAULT_PORT)]
    port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Server,
    /// Interactive unary greetings.
    Client,
    /// Bidirectional demo.
    ClientStream,
    ClientGreetings,
    ClientReplies,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "server" => Ok(Mode::Server),
            "client" => Ok(Mode::Client),
            "client_stream" => Ok(Mode::ClientStream),
            "client_greetings" => Ok(Mode::ClientGreetings),
            "client_replies" => Ok(Mode::ClientReplies),
            other => Err(format!("Unsupported operating mode: {other}")),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mode = match args.mode.parse::<Mode>() {
        Ok(mode) => mode,
        Err(message) => {
            println!("{message}");
            return Ok(());
        }
    };
    let config = RpcConfig::new(args.host, args.port);

    let runtime = runtime::build(mode == Mode::Server)?;
    runtime.block_on(run(mode, config))
}

async fn run(mode: Mode, config: RpcConfig) -> Result<()> {
    let mut stdout = tokio::io::stdout();

    match mode {
        Mode::Server => {
            println!("Server mode...");
            let server = GreeterServer::new(HelloGreeter, config);
            server
                .serve_with_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await?;
        }
        Mode::Client => {
            println!("Client mode... Please enter your name:");
            let client = GreeterClient::connect(config).await?;
            let stdin = BufReader::new(tokio::io::stdin());
            let replies = driver::run_unary(&client, stdin, &mut stdout).await?;
            info!(replies, "input exhausted");
        }
        Mode::ClientStream => {
            println!("Streaming client mode...");
            let client = GreeterClient::connect(config).await?;
            let received = driver::run_bidi(&client, &mut stdout).await?;
            info!(received = received.len(), "bidirectional call finished");
        }
        Mode::ClientGreetings => {
            println!("Client-streaming mode...");
            let client = GreeterClient::connect(config).await?;
            driver::run_client_stream(&client, &mut stdout).await?;
        }
        Mode::ClientReplies => {
            println!("Server-streaming mode... Please enter your name:");
            let client = GreeterClient::connect(config).await?;
            let stdin = BufReader::new(tokio::io::stdin());
            let replies = driver::run_server_stream(&client, stdin, &mut stdout).await?;
            info!(replies, "input exhausted");
        }
    }

    Ok(())
}
