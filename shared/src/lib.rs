//! # Herd Protocol
//!
//! Text protocol spoken between location clients and the servers of a herd,
//! and between the servers themselves.
//!
//! Every connection carries exactly one whitespace-delimited command:
//!
//! - `IAMAT <client> <coordinate> <sent-at>`: a client reports its position.
//! - `WHATSAT <client> <radius-km> <limit>`: a client asks for places near
//!   another client's last known position.
//! - `AT <origin> <skew> <client> <coordinate> <reported-at> <sender>`: one
//!   server relays a record to a neighbor. Never answered.
//!
//! [`Command::parse`] validates a raw message completely before any state is
//! touched and hands back a closed enum the server matches on exhaustively.

pub mod record;
pub mod topology;

pub use record::{ClientRecord, ClockSkew, Coordinate, Timestamp};
pub use topology::{Topology, TopologyConfig, TopologyError};

use thiserror::Error;

pub const MIN_RADIUS_KM: u32 = 1;
pub const MAX_RADIUS_KM: u32 = 50;
pub const MAX_RESULTS: usize = 20;

/// Why a message was rejected. Only ever logged; clients just get `?`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty message")]
    Empty,
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error("{command} takes {expected} fields, got {found}")]
    FieldCount {
        command: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("malformed coordinate {0:?}")]
    Coordinate(String),
    #[error("malformed timestamp {0:?}")]
    Timestamp(String),
    #[error("malformed clock skew {0:?}")]
    ClockSkew(String),
    #[error("{field} must be an unsigned integer, got {value:?}")]
    Integer { field: &'static str, value: String },
    #[error("{field} {value} outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
    #[error("unknown server {0:?}")]
    UnknownServer(String),
}

/// One parsed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    IAmAt {
        client_id: String,
        coordinate: Coordinate,
        sent_at: Timestamp,
    },
    WhatsAt {
        client_id: String,
        radius_km: u32,
        limit: usize,
    },
    At {
        record: ClientRecord,
        sender: String,
    },
    /// `from_peer` is set when the message claimed to be an `AT`; those are
    /// dropped silently instead of answered.
    Invalid { from_peer: bool, reason: ParseError },
}

impl Command {
    /// Parses one raw message. Server names in `AT` must appear in `topology`.
    pub fn parse(raw: &str, topology: &Topology) -> Command {
        let fields: Vec<&str> = raw.split_whitespace().collect();
        let from_peer = fields.first() == Some(&"AT");

        let parsed = match fields.first() {
            None => Err(ParseError::Empty),
            Some(&"IAMAT") => parse_iamat(&fields),
            Some(&"WHATSAT") => parse_whatsat(&fields),
            Some(&"AT") => parse_at(&fields, topology),
            Some(other) => Err(ParseError::UnknownCommand(other.to_string())),
        };

        parsed.unwrap_or_else(|reason| Command::Invalid { from_peer, reason })
    }
}

/// The answer to any rejected client command: `?` followed by the raw text as received.
pub fn rejection(raw: &str) -> String {
    format!("? {}", raw)
}

fn expect_fields(
    fields: &[&str],
    command: &'static str,
    expected: usize,
) -> Result<(), ParseError> {
    if fields.len() == expected {
        Ok(())
    } else {
        Err(ParseError::FieldCount {
            command,
            expected,
            found: fields.len(),
        })
    }
}

fn parse_bounded(field: &'static str, value: &str, min: u64, max: u64) -> Result<u64, ParseError> {
    let integer = || ParseError::Integer {
        field,
        value: value.to_string(),
    };
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(integer());
    }
    let parsed: u64 = value.parse().map_err(|_| integer())?;
    if parsed < min || parsed > max {
        return Err(ParseError::OutOfRange {
            field,
            value: parsed,
            min,
            max,
        });
    }
    Ok(parsed)
}

fn parse_iamat(fields: &[&str]) -> Result<Command, ParseError> {
    expect_fields(fields, "IAMAT", 4)?;
    Ok(Command::IAmAt {
        client_id: fields[1].to_string(),
        coordinate: Coordinate::parse(fields[2])?,
        sent_at: Timestamp::parse(fields[3])?,
    })
}

fn parse_whatsat(fields: &[&str]) -> Result<Command, ParseError> {
    expect_fields(fields, "WHATSAT", 4)?;
    let radius_km = parse_bounded(
        "radius",
        fields[2],
        u64::from(MIN_RADIUS_KM),
        u64::from(MAX_RADIUS_KM),
    )?;
    let limit = parse_bounded("limit", fields[3], 0, MAX_RESULTS as u64)?;
    Ok(Command::WhatsAt {
        client_id: fields[1].to_string(),
        radius_km: radius_km as u32,
        limit: limit as usize,
    })
}

fn parse_at(fields: &[&str], topology: &Topology) -> Result<Command, ParseError> {
    expect_fields(fields, "AT", 7)?;
    let known = |name: &str| {
        if topology.contains(name) {
            Ok(name.to_string())
        } else {
            Err(ParseError::UnknownServer(name.to_string()))
        }
    };
    let record = ClientRecord {
        origin_server: known(fields[1])?,
        clock_skew: ClockSkew::parse(fields[2])?,
        client_id: fields[3].to_string(),
        coordinate: Coordinate::parse(fields[4])?,
        report_timestamp: Timestamp::parse(fields[5])?,
    };
    Ok(Command::At {
        record,
        sender: known(fields[6])?,
    })
}
