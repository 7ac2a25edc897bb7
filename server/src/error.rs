//! Errors that stop a server from starting or serving.

use shared::TopologyError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("server {0:?} is not part of the topology")]
    UnknownServer(String),

    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("failed to read topology file {}: {source}", .path.display())]
    TopologyFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to build place search client: {0}")]
    PlaceSearch(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
