//! Verticore command line: run the bus behind the TCP transport, or talk to
//! a running one.
//!
//! Usage:
//!   verticore serve --config config/base.json --config config/local.json
//!   verticore send verticore.debug.echo '{"hello": "world"}'
//!   verticore addresses

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use verticore::address::debug;
use verticore::components::{self, AddressInfo};
use verticore::transport::{TransportClient, TransportServer};
use verticore::{Config, CorrelationId, EventBus, ReplyOutcome};

#[derive(Parser, Debug)]
#[command(name = "verticore")]
#[command(about = "Typed request/reply message bus")]
#[command(version)]
struct Args {
    /// Configuration layers, merged in order
    #[arg(short, long, global = true)]
    config: Vec<PathBuf>,

    /// Transport address (defaults to transport.listen_addr)
    #[arg(long, global = true, env = "VERTICORE_CONNECT")]
    connect: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the bus with the built-in components behind the TCP transport
    Serve,

    /// Send one request and print the reply
    Send {
        address: String,

        /// JSON body
        #[arg(default_value = "{}")]
        body: String,

        /// Correlation id for the request (generated if absent)
        #[arg(long)]
        correlation_id: Option<String>,

        /// Caller-side deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// List the addresses bound on a running bus
    Addresses,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = Config::load(args.config.as_slice())?;
    verticore::observability::init_tracing_with(&config.observability);

    let target = args
        .connect
        .clone()
        .unwrap_or_else(|| config.transport.listen_addr.clone());

    match args.command {
        Command::Serve => serve(config).await?,
        Command::Send {
            address,
            body,
            correlation_id,
            timeout_ms,
        } => {
            let body = serde_json::from_str(&body)?;
            let correlation_id = correlation_id
                .map(CorrelationId::from_string)
                .transpose()?
                .unwrap_or_else(CorrelationId::generate);
            let mut client = TransportClient::connect(target.as_str()).await?;
            if let Some(ms) = timeout_ms {
                client = client.with_timeout(Duration::from_millis(ms));
            }
            tracing::info!(correlation_id = %correlation_id, "Sending to {}", address);
            match client
                .request_value(&address, body, Some(&correlation_id))
                .await?
            {
                ReplyOutcome::Success(reply) => {
                    println!("{}", serde_json::to_string_pretty(&reply)?)
                }
                ReplyOutcome::Failure(failure) => {
                    eprintln!("{failure}");
                    std::process::exit(1);
                }
            }
        }
        Command::Addresses => {
            let mut client = TransportClient::connect(target.as_str()).await?;
            let infos: Vec<AddressInfo> = client.request(debug::ADDRESSES, &()).await?;
            for info in infos {
                println!(
                    "{}\t{}\t{} -> {}{}",
                    info.address,
                    info.component,
                    info.argument,
                    info.result,
                    if info.suspending { "" } else { "\t(inline)" }
                );
            }
        }
    }

    Ok(())
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let builder = components::install(EventBus::builder(&config), &config)?;
    let bus = builder.build()?;
    tracing::info!("Bound {} addresses", bus.addresses().len());

    let server = TransportServer::new(bus.clone(), config.transport.clone());
    let cancel = server.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal");
            cancel.cancel();
        }
    });

    server.serve().await?;
    bus.shutdown();
    Ok(())
}
