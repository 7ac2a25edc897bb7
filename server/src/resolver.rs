//! Answers `WHATSAT`: nearby places around a client's last known position.

use crate::directory::Directory;
use crate::places::{PlaceSearch, PlaceSearchError};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Serializer, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// How long an upstream lookup may take before the query is abandoned.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no location known for client {0:?}")]
    UnknownClient(String),
    #[error(transparent)]
    Upstream(#[from] PlaceSearchError),
    #[error("place search timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed place search response: {0}")]
    Malformed(&'static str),
    #[error("failed to render places: {0}")]
    Render(#[from] serde_json::Error),
}

pub struct QueryResolver<P> {
    directory: Arc<Directory>,
    places: P,
    timeout: Duration,
}

impl<P: PlaceSearch> QueryResolver<P> {
    pub fn new(directory: Arc<Directory>, places: P) -> Self {
        Self::with_timeout(directory, places, UPSTREAM_TIMEOUT)
    }

    pub fn with_timeout(directory: Arc<Directory>, places: P, timeout: Duration) -> Self {
        Self {
            directory,
            places,
            timeout,
        }
    }

    /// Builds the full `WHATSAT` answer: the stored `AT` line, then the
    /// upstream payload with its `results` cut to `limit`, then a newline.
    pub async fn resolve(
        &self,
        client_id: &str,
        radius_km: u32,
        limit: usize,
    ) -> Result<String, ResolveError> {
        let record = self
            .directory
            .lookup(client_id)
            .ok_or_else(|| ResolveError::UnknownClient(client_id.to_string()))?;

        let radius_meters = u64::from(radius_km) * 1000;
        let lookup = self.places.nearby(
            record.coordinate.latitude(),
            record.coordinate.longitude(),
            radius_meters,
        );
        let mut payload = tokio::time::timeout(self.timeout, lookup)
            .await
            .map_err(|_| ResolveError::Timeout(self.timeout))??;

        truncate_results(&mut payload, limit)?;
        Ok(format!("{}\n{}\n", record, render(&payload)?))
    }
}

fn truncate_results(payload: &mut Value, limit: usize) -> Result<(), ResolveError> {
    let results = payload
        .get_mut("results")
        .and_then(Value::as_array_mut)
        .ok_or(ResolveError::Malformed("missing results array"))?;
    results.truncate(limit);
    Ok(())
}

/// Pretty-prints with a three-space indent.
fn render(payload: &Value) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"   "));
    payload.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
