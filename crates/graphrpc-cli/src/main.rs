//! # GraphRPC CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Serve the demo domain from memory
//! graphrpc serve -b 127.0.0.1:8080 --api-key secret
//!
//! # Check that a server answers
//! graphrpc ping http://127.0.0.1:8080
//!
//! # Client flags go before the subcommand
//! graphrpc --retries 0 --api-key secret count http://127.0.0.1:8080 notes Note
//!
//! # Print one object as JSON
//! graphrpc retrieve http://127.0.0.1:8080 notes 0b6a6c0e-8f1c-4a8e-9f5e-3f1d2c4b5a69
//! ```
//!
//! The API key falls back to the `GRAPHRPC_API_KEY` environment variable.

use anyhow::{bail, Result};
use argh::FromArgs;
use graphrpc_cli::{demo, resolve_api_key, ClientOptions};
use graphrpc_common::auth::AuthConfig;
use graphrpc_common::protocol::Filter;
use graphrpc_server::{HttpServer, MemoryDirectory, MemoryStore, RpcRouter, Store};
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

#[derive(FromArgs)]
/// GraphRPC - object graph RPC over HTTP
struct Cli {
    /// transport retries after the first attempt (default 3)
    #[argh(option, default = "3")]
    retries: u32,

    /// backoff step in milliseconds; retry n waits n steps (default 1000)
    #[argh(option, long = "backoff-ms", default = "1000")]
    backoff_ms: u64,

    /// request timeout in milliseconds (default 30000)
    #[argh(option, long = "timeout-ms", default = "30000")]
    timeout_ms: u64,

    /// answer reads with empty results while the server is unreachable
    #[argh(switch, long = "fault-tolerant")]
    fault_tolerant: bool,

    /// proxy used for every request
    #[argh(option)]
    proxy: Option<String>,

    /// API key sent in the X-API-Key header
    #[argh(option, long = "api-key")]
    api_key: Option<String>,

    #[argh(subcommand)]
    command: Commands,
}

impl Cli {
    fn client_options(&self) -> ClientOptions {
        ClientOptions {
            retries: self.retries,
            backoff_ms: self.backoff_ms,
            timeout_ms: self.timeout_ms,
            fault_tolerant: self.fault_tolerant,
            proxy: self.proxy.clone(),
            api_key: resolve_api_key(self.api_key.clone()),
        }
    }
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Serve(ServeArgs),
    Ping(PingArgs),
    Action(ActionArgs),
    Count(CountArgs),
    Retrieve(RetrieveArgs),
}

/// Arguments for serving the demo domain.
///
/// The server keeps every object in memory; nothing survives a restart.
#[derive(FromArgs)]
#[argh(subcommand, name = "serve")]
/// serve the demo domain from an in-memory store
struct ServeArgs {
    /// address to bind the HTTP server to
    #[argh(option, short = 'b', default = "\"127.0.0.1:8080\".into()")]
    bind: String,

    /// require this API key on every request
    #[argh(option, long = "api-key")]
    api_key: Option<String>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "ping")]
/// check whether a server answers
struct PingArgs {
    /// server URL, including the http:// or https:// prefix
    #[argh(positional)]
    url: String,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "action")]
/// run a registered action on a server
struct ActionArgs {
    /// server URL, including the http:// or https:// prefix
    #[argh(positional)]
    url: String,

    /// action name
    #[argh(positional)]
    name: String,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "count")]
/// count the objects of a container
struct CountArgs {
    /// server URL, including the http:// or https:// prefix
    #[argh(positional)]
    url: String,

    /// container name
    #[argh(positional)]
    container: String,

    /// type tag of the container's objects
    #[argh(positional)]
    type_tag: String,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "retrieve")]
/// print one object as JSON
struct RetrieveArgs {
    /// server URL, including the http:// or https:// prefix
    #[argh(positional)]
    url: String,

    /// container name
    #[argh(positional)]
    container: String,

    /// object id
    #[argh(positional)]
    id: Uuid,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Set default log level to INFO, but allow RUST_LOG env var to override
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let options = cli.client_options();
    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Ping(args) => {
            let client = options.connect(&args.url)?;
            if !client.ping().await {
                bail!("{} is offline", args.url);
            }
            println!("online");
            Ok(())
        }
        Commands::Action(args) => {
            let client = options.connect(&args.url)?;
            client.call_action(&args.name).await?;
            Ok(())
        }
        Commands::Count(args) => {
            let client = options.connect(&args.url)?;
            let count = client
                .count(&args.container, &args.type_tag, &Filter::All)
                .await?;
            println!("{}", count);
            Ok(())
        }
        Commands::Retrieve(args) => {
            let client = options.connect(&args.url)?;
            let found = client.retrieve(&args.container, args.id).await?;
            let object = found.and_then(|target| client.object(target.id));
            println!("{}", serde_json::to_string(&object)?);
            Ok(())
        }
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let addr: SocketAddr = args
        .bind
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address {}: {}", args.bind, e))?;

    let registry = Arc::new(demo::registry());
    let store = Arc::new(MemoryStore::new(registry.clone()));
    let compacted = store.clone();
    let router = RpcRouter::new(store, registry, demo::operations())
        .with_users(Arc::new(MemoryDirectory::new()))
        .with_action("compact", move || compacted.cleanup());

    let auth = AuthConfig::from_optional(resolve_api_key(args.api_key));
    if auth.requires_auth() {
        tracing::info!("API key authentication enabled");
    }

    tracing::info!("Starting GraphRPC server on {}", addr);
    HttpServer::new(router).with_auth(auth).run(addr).await?;
    Ok(())
}
