//! # Herd Server Library
//!
//! One member of a small, fixed herd of name servers that remember where
//! mobile clients last said they were.
//!
//! ## Replication
//!
//! A client reports its position to whichever server it likes with
//! `IAMAT`. That server stamps the report with its own name and the clock
//! skew it observed, stores it, answers the client, and then floods an `AT`
//! message to its topology neighbors in the background. Neighbors apply the
//! record if it is newer than what they hold and flood it onward, skipping
//! the record's origin and the neighbor it came from. Conflicts between
//! reports resolve by last-writer-wins on the client-supplied timestamp.
//!
//! Delivery is best effort. A neighbor that is down simply misses the update
//! until a newer report for the same client reaches it.
//!
//! ## Queries
//!
//! `WHATSAT` looks up a client's stored position and asks an external place
//! search service for points of interest around it, bounded by a timeout.
//!
//! ## Module Organization
//!
//! - `directory`: last-writer-wins record store
//! - `flood`: neighbor propagation and the outbound TCP sender
//! - `resolver` / `places`: `WHATSAT` and the place search client
//! - `network`: connection handling and the accept loop
//! - `config`: command-line arguments, topology loading, logging
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::flood::TcpPeerSender;
//! use server::places::{GooglePlaces, GOOGLE_NEARBY_SEARCH};
//! use server::resolver::UPSTREAM_TIMEOUT;
//! use server::Server;
//! use shared::Topology;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let topology = Arc::new(Topology::herd());
//!     let places = GooglePlaces::new(GOOGLE_NEARBY_SEARCH, "api-key", UPSTREAM_TIMEOUT)?;
//!     let server = Server::new("Hands", Arc::clone(&topology), TcpPeerSender::default(), places)?;
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:12001").await?;
//!     Arc::new(server).run(listener).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod directory;
pub mod error;
pub mod flood;
pub mod network;
pub mod places;
pub mod resolver;
pub mod utils;

pub use directory::Directory;
pub use error::{Error, Result};
pub use network::Server;
