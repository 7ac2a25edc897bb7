use clap::{Parser, Subcommand};
use client::network::send_line;
use client::{current_timestamp, iamat_line, whatsat_line};
use log::info;
use shared::Topology;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Name of the server to talk to
    server: String,

    /// JSON topology file to look the server up in (defaults to the built-in herd)
    #[arg(short, long)]
    topology: Option<PathBuf>,

    /// Seconds to wait for the reply
    #[arg(short = 'w', long, default_value = "65")]
    wait: u64,

    #[command(subcommand)]
    command: Request,
}

#[derive(Subcommand, Debug)]
enum Request {
    /// Report a position
    Iamat {
        client_id: String,
        /// Compact coordinate, e.g. +34.068930-118.445127
        #[arg(allow_hyphen_values = true)]
        coordinate: String,
        /// Send time in seconds (defaults to now)
        #[arg(long)]
        timestamp: Option<String>,
    },
    /// Ask for places near a client
    Whatsat {
        client_id: String,
        radius_km: u32,
        limit: u32,
    },
    /// Send a line verbatim
    Raw {
        #[arg(allow_hyphen_values = true, num_args = 1..)]
        words: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    let topology = match &args.topology {
        Some(path) => Topology::from_json(&std::fs::read_to_string(path)?)?,
        None => Topology::herd(),
    };
    let addr = topology
        .address(&args.server)
        .ok_or_else(|| format!("Invalid server name: {}", args.server))?;

    let line = match args.command {
        Request::Iamat {
            client_id,
            coordinate,
            timestamp,
        } => {
            let timestamp = timestamp.unwrap_or_else(current_timestamp);
            iamat_line(&client_id, &coordinate, &timestamp)
        }
        Request::Whatsat {
            client_id,
            radius_km,
            limit,
        } => whatsat_line(&client_id, radius_km, limit),
        Request::Raw { words } => words.join(" "),
    };

    info!("Connecting to {} at {}", args.server, addr);
    let reply = send_line(addr, &line, Duration::from_secs(args.wait)).await?;
    print!("{}", reply);

    Ok(())
}
