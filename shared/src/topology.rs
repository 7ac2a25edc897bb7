//! Static server topology: who exists, where they listen, and who talks to whom.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use thiserror::Error;

/// The five-server herd a deployment runs when no topology file is given.
pub const DEFAULT_SERVERS: [(&str, u16); 5] = [
    ("Goloman", 12000),
    ("Hands", 12001),
    ("Holiday", 12002),
    ("Welsh", 12003),
    ("Wilkes", 12004),
];

/// Undirected links of the default herd.
pub const DEFAULT_LINKS: [(&str, &str); 6] = [
    ("Goloman", "Hands"),
    ("Goloman", "Holiday"),
    ("Goloman", "Wilkes"),
    ("Hands", "Wilkes"),
    ("Holiday", "Welsh"),
    ("Holiday", "Wilkes"),
];

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("link {0}-{1} names an unknown server")]
    UnknownLinkEnd(String, String),
    #[error("server {0} is linked to itself")]
    SelfLink(String),
    #[error("topology has no servers")]
    Empty,
    #[error("invalid topology document: {0}")]
    Document(#[from] serde_json::Error),
}

/// On-disk form of a topology.
///
/// ```json
/// { "servers": { "A": "127.0.0.1:12000", "B": "127.0.0.1:12001" },
///   "links": [["A", "B"]] }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct TopologyConfig {
    pub servers: BTreeMap<String, SocketAddr>,
    #[serde(default)]
    pub links: Vec<(String, String)>,
}

/// Read-only after construction; safe to share between tasks without locking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    addresses: BTreeMap<String, SocketAddr>,
    adjacency: BTreeMap<String, BTreeSet<String>>,
}

impl Topology {
    /// Builds a topology, making every link symmetric.
    pub fn from_config(config: TopologyConfig) -> Result<Self, TopologyError> {
        if config.servers.is_empty() {
            return Err(TopologyError::Empty);
        }

        let mut adjacency: BTreeMap<String, BTreeSet<String>> = config
            .servers
            .keys()
            .map(|name| (name.clone(), BTreeSet::new()))
            .collect();

        for (a, b) in config.links {
            if a == b {
                return Err(TopologyError::SelfLink(a));
            }
            if !adjacency.contains_key(&a) || !adjacency.contains_key(&b) {
                return Err(TopologyError::UnknownLinkEnd(a, b));
            }
            if let Some(peers) = adjacency.get_mut(&a) {
                peers.insert(b.clone());
            }
            if let Some(peers) = adjacency.get_mut(&b) {
                peers.insert(a);
            }
        }

        Ok(Self {
            addresses: config.servers,
            adjacency,
        })
    }

    pub fn from_json(document: &str) -> Result<Self, TopologyError> {
        let config: TopologyConfig = serde_json::from_str(document)?;
        Self::from_config(config)
    }

    /// The default herd on localhost.
    pub fn herd() -> Self {
        let localhost = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let mut addresses = BTreeMap::new();
        let mut adjacency: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for (name, port) in DEFAULT_SERVERS {
            addresses.insert(name.to_string(), SocketAddr::new(localhost, port));
            adjacency.insert(name.to_string(), BTreeSet::new());
        }
        for (a, b) in DEFAULT_LINKS {
            adjacency.entry(a.to_string()).or_default().insert(b.to_string());
            adjacency.entry(b.to_string()).or_default().insert(a.to_string());
        }

        Self {
            addresses,
            adjacency,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.addresses.contains_key(name)
    }

    pub fn address(&self, name: &str) -> Option<SocketAddr> {
        self.addresses.get(name).copied()
    }

    /// Neighbors of `name` in name order; empty for unknown servers.
    pub fn neighbors<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.adjacency
            .get(name)
            .into_iter()
            .flat_map(|peers| peers.iter().map(String::as_str))
    }

    pub fn servers(&self) -> impl Iterator<Item = &str> {
        self.addresses.keys().map(String::as_str)
    }
}
