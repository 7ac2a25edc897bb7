use clap::Parser;
use log::{error, info};
use server::config::Args;
use server::flood::TcpPeerSender;
use server::places::GooglePlaces;
use server::resolver::UPSTREAM_TIMEOUT;
use server::Server;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Parses arguments, sets up logging, then serves until the listener fails
/// or Ctrl+C arrives.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    args.init_logging()?;

    let topology = Arc::new(args.load_topology()?);
    let addr = args.listen_addr(&topology)?;

    if args.api_key.is_empty() {
        info!("No place search API key set; WHATSAT lookups will likely be refused upstream");
    }
    let places = GooglePlaces::new(&args.places_endpoint, &args.api_key, UPSTREAM_TIMEOUT)?;

    let server = Arc::new(Server::new(
        &args.name,
        Arc::clone(&topology),
        TcpPeerSender::default(),
        places,
    )?);
    let neighbors: Vec<_> = topology.neighbors(server.name()).collect();
    info!("Server {} talks to {:?}", server.name(), neighbors);

    let listener = TcpListener::bind(addr).await?;

    tokio::select! {
        result = Arc::clone(&server).run(listener) => {
            if let Err(e) = result {
                error!("Server {} stopped: {}", server.name(), e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
