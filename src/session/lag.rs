//! Lag probe payloads: `LAGCHECK <nanos>`.

use std::time::Duration;

pub const PROBE_MARKER: &str = "LAGCHECK";

pub fn probe_payload(nanos: u128) -> String {
    format!("{PROBE_MARKER} {nanos}")
}

/// Timestamp embedded in a probe echo, if `payload` is one.
pub fn parse_probe(payload: &str) -> Option<u128> {
    payload
        .strip_prefix(PROBE_MARKER)?
        .trim()
        .parse()
        .ok()
}

/// `now - sent`, clamped at zero.
pub fn elapsed(sent: u128, now: u128) -> Duration {
    let nanos = now.saturating_sub(sent);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trip() {
        assert_eq!(probe_payload(42), "LAGCHECK 42");
        assert_eq!(parse_probe("LAGCHECK 42"), Some(42));
        assert_eq!(parse_probe("LAGCHECK42"), Some(42));
        assert_eq!(parse_probe("LAGCHECK"), None);
        assert_eq!(parse_probe("irc.example.org"), None);
    }

    #[test]
    fn clock_skew_clamps_to_zero() {
        assert_eq!(elapsed(10, 5), Duration::ZERO);
        assert_eq!(elapsed(5, 1_000_005), Duration::from_millis(1));
    }
}
