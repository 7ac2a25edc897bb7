//! Field types carried by location reports and the per-client record built from them.
//!
//! Every field keeps the exact text it arrived with so that a record relayed
//! through the herd is re-emitted byte for byte, while comparisons are done
//! on the decimal value.

use crate::ParseError;
use std::cmp::Ordering;
use std::fmt;

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Matches `digits` or `digits.digits`.
fn is_unsigned_decimal(s: &str) -> bool {
    match s.split_once('.') {
        Some((int, frac)) => is_digits(int) && is_digits(frac),
        None => is_digits(s),
    }
}

/// Matches an unsigned decimal preceded by a mandatory `+` or `-`.
fn is_signed_decimal(s: &str) -> bool {
    match s.strip_prefix(['+', '-']) {
        Some(rest) => is_unsigned_decimal(rest),
        None => false,
    }
}

/// Client-supplied send time in seconds, used as the record version.
///
/// Ordering is exact decimal ordering on the text, so `100` and `100.0`
/// compare equal and no precision is lost on long fractional parts.
#[derive(Debug, Clone)]
pub struct Timestamp {
    text: String,
    secs: f64,
}

impl Timestamp {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        if !is_unsigned_decimal(s) {
            return Err(ParseError::Timestamp(s.to_string()));
        }
        let secs: f64 = s
            .parse()
            .map_err(|_| ParseError::Timestamp(s.to_string()))?;
        if !secs.is_finite() {
            return Err(ParseError::Timestamp(s.to_string()));
        }
        Ok(Self {
            text: s.to_string(),
            secs,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.secs
    }

    /// Splits into integer digits without leading zeros and fraction digits
    /// without trailing zeros.
    fn normalized(&self) -> (&str, &str) {
        let (int, frac) = self.text.split_once('.').unwrap_or((self.text.as_str(), ""));
        (int.trim_start_matches('0'), frac.trim_end_matches('0'))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        let (int_a, frac_a) = self.normalized();
        let (int_b, frac_b) = other.normalized();
        int_a
            .len()
            .cmp(&int_b.len())
            .then_with(|| int_a.cmp(int_b))
            .then_with(|| frac_a.cmp(frac_b))
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Timestamp {}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Receipt time minus send time as observed by the origin server.
///
/// Always rendered with an explicit sign. Relays never recompute it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockSkew(String);

impl ClockSkew {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        if is_signed_decimal(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(ParseError::ClockSkew(s.to_string()))
        }
    }

    /// Computes the skew between a local receipt time and the client's send time.
    pub fn between(received_at: f64, sent_at: &Timestamp) -> Self {
        let diff = received_at - sent_at.as_secs_f64();
        // A NaN or infinite receipt time would render as text the grammar rejects.
        let diff = if diff.is_finite() { diff } else { 0.0 };
        Self(format!("{:+}", diff))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClockSkew {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Latitude and longitude in the compact ISO 6709 form, e.g. `+34.068930-118.445127`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coordinate {
    text: String,
    split: usize,
}

impl Coordinate {
    /// The first number may omit its sign; the second must carry one since
    /// that sign is the only boundary between the two.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let invalid = || ParseError::Coordinate(s.to_string());
        let split = s
            .char_indices()
            .skip(1)
            .find(|&(_, c)| c == '+' || c == '-')
            .map(|(i, _)| i)
            .ok_or_else(invalid)?;
        let (latitude, longitude) = s.split_at(split);
        let latitude_digits = latitude.strip_prefix(['+', '-']).unwrap_or(latitude);
        if !is_unsigned_decimal(latitude_digits) || !is_signed_decimal(longitude) {
            return Err(invalid());
        }
        Ok(Self {
            text: s.to_string(),
            split,
        })
    }

    pub fn latitude(&self) -> &str {
        &self.text[..self.split]
    }

    pub fn longitude(&self) -> &str {
        &self.text[self.split..]
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Last known position of one client as stored by a server.
///
/// `Display` renders the `AT` line a server answers `IAMAT` with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    pub client_id: String,
    pub origin_server: String,
    pub clock_skew: ClockSkew,
    pub coordinate: Coordinate,
    pub report_timestamp: Timestamp,
}

impl ClientRecord {
    /// True when this record should replace `current` under last-writer-wins.
    pub fn supersedes(&self, current: &ClientRecord) -> bool {
        self.report_timestamp > current.report_timestamp
    }

    /// The inter-server `AT` line announcing this record, sent by `sender`.
    pub fn relay_line(&self, sender: &str) -> String {
        format!("{} {}", self, sender)
    }
}

impl fmt::Display for ClientRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AT {} {} {} {} {}",
            self.origin_server,
            self.clock_skew,
            self.client_id,
            self.coordinate,
            self.report_timestamp
        )
    }
}
