//! # Herd Test Client
//!
//! Command-line harness for poking a herd server by hand: builds one
//! `IAMAT`, `WHATSAT` or raw line, sends it to a named server and returns
//! whatever comes back before the server closes the connection.
//!
//! Not part of the served system; servers never depend on it.

pub mod network;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current wall-clock time in seconds, formatted the way clients report it.
pub fn current_timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0));
    format!("{}.{:09}", now.as_secs(), now.subsec_nanos())
}

pub fn iamat_line(client_id: &str, coordinate: &str, timestamp: &str) -> String {
    format!("IAMAT {} {} {}", client_id, coordinate, timestamp)
}

pub fn whatsat_line(client_id: &str, radius_km: u32, limit: u32) -> String {
    format!("WHATSAT {} {} {}", client_id, radius_km, limit)
}
