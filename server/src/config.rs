//! Command-line configuration and logging setup for a herd server.

use crate::error::{Error, Result};
use crate::places::GOOGLE_NEARBY_SEARCH;
use clap::Parser;
use shared::Topology;
use std::fs::File;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Name of this server; must appear in the topology
    pub name: String,

    /// Bind to this IP instead of the one in the topology
    #[arg(short = 'H', long)]
    pub host: Option<IpAddr>,

    /// JSON topology file replacing the built-in five-server herd
    #[arg(short, long)]
    pub topology: Option<PathBuf>,

    /// Place search API key
    #[arg(long, env = "PLACES_API_KEY", default_value = "", hide_env_values = true)]
    pub api_key: String,

    /// Place search endpoint
    #[arg(long, default_value = GOOGLE_NEARBY_SEARCH)]
    pub places_endpoint: String,

    /// Write the log to this file (truncated on start) instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// Loads the topology file if one was given, otherwise the default herd.
    pub fn load_topology(&self) -> Result<Topology> {
        match &self.topology {
            Some(path) => {
                let document =
                    std::fs::read_to_string(path).map_err(|source| Error::TopologyFile {
                        path: path.clone(),
                        source,
                    })?;
                Ok(Topology::from_json(&document)?)
            }
            None => Ok(Topology::herd()),
        }
    }

    /// Address this server listens on.
    pub fn listen_addr(&self, topology: &Topology) -> Result<SocketAddr> {
        let mut addr = topology
            .address(&self.name)
            .ok_or_else(|| Error::UnknownServer(self.name.clone()))?;
        if let Some(host) = self.host {
            addr.set_ip(host);
        }
        Ok(addr)
    }

    /// Installs `env_logger`, defaulting to `info` when `RUST_LOG` is unset.
    pub fn init_logging(&self) -> Result<()> {
        let mut builder =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
        if let Some(path) = &self.log_file {
            let file = File::create(path)?;
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        builder.init();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["server", "Hands"]).unwrap();
        assert_eq!(args.name, "Hands");
        assert_eq!(args.places_endpoint, GOOGLE_NEARBY_SEARCH);
        assert!(args.topology.is_none());

        let topology = args.load_topology().unwrap();
        assert_eq!(
            args.listen_addr(&topology).unwrap(),
            "127.0.0.1:12001".parse().unwrap()
        );
    }

    #[test]
    fn test_host_override() {
        let args = Args::try_parse_from(["server", "Welsh", "--host", "0.0.0.0"]).unwrap();
        let topology = args.load_topology().unwrap();
        assert_eq!(
            args.listen_addr(&topology).unwrap(),
            "0.0.0.0:12003".parse().unwrap()
        );
    }

    #[test]
    fn test_unknown_name() {
        let args = Args::try_parse_from(["server", "Jaquez"]).unwrap();
        let topology = args.load_topology().unwrap();
        assert!(matches!(
            args.listen_addr(&topology),
            Err(Error::UnknownServer(_))
        ));
    }

    #[test]
    fn test_missing_name_is_rejected() {
        assert!(Args::try_parse_from(["server"]).is_err());
    }

    #[test]
    fn test_topology_file() {
        let path = std::env::temp_dir().join(format!("herd-topology-{}.json", std::process::id()));
        let mut file = File::create(&path).unwrap();
        write!(
            file,
            r#"{{ "servers": {{ "A": "127.0.0.1:9100", "B": "127.0.0.1:9101" }}, "links": [["A", "B"]] }}"#
        )
        .unwrap();

        let args =
            Args::try_parse_from(["server", "B", "--topology", path.to_str().unwrap()]).unwrap();
        let topology = args.load_topology().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(topology.neighbors("B").collect::<Vec<_>>(), vec!["A"]);
        assert_eq!(
            args.listen_addr(&topology).unwrap(),
            "127.0.0.1:9101".parse().unwrap()
        );
    }

    #[test]
    fn test_missing_topology_file() {
        let args =
            Args::try_parse_from(["server", "A", "--topology", "/nonexistent/topology.json"])
                .unwrap();
        assert!(matches!(
            args.load_topology(),
            Err(Error::TopologyFile { .. })
        ));
    }
}
