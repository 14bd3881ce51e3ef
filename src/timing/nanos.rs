//! Serde support for durations stored in timing files
//!
//! Durations are written as integer nanoseconds. Reading also accepts
//! ISO-8601 durations such as `PT1M30.5S`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
    serializer.serialize_u64(nanos)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Nanos(u64),
        Fractional(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Nanos(nanos) => Ok(Duration::from_nanos(nanos)),
        Raw::Fractional(nanos) if nanos.is_finite() && nanos >= 0.0 => {
            Ok(Duration::from_nanos(nanos.round() as u64))
        }
        Raw::Fractional(nanos) => Err(D::Error::custom(format!("invalid duration: {nanos}"))),
        Raw::Text(text) => parse_iso8601(&text).map_err(D::Error::custom),
    }
}

/// Parse an ISO-8601 duration (`PnWnDTnHnMnS`, fractional values allowed)
pub fn parse_iso8601(text: &str) -> Result<Duration, String> {
    let invalid = || format!("invalid ISO-8601 duration: {text:?}");

    let body = text.trim().strip_prefix('P').ok_or_else(invalid)?;
    let mut seconds = 0.0_f64;
    let mut number = String::new();
    let mut in_time = false;
    let mut components = 0;

    for c in body.chars() {
        match c {
            'T' if !in_time && number.is_empty() => in_time = true,
            '0'..='9' | '.' => number.push(c),
            ',' => number.push('.'),
            unit => {
                let value: f64 = number.parse().map_err(|_| invalid())?;
                let scale = match (in_time, unit) {
                    (false, 'W') => 604_800.0,
                    (false, 'D') => 86_400.0,
                    (true, 'H') => 3_600.0,
                    (true, 'M') => 60.0,
                    (true, 'S') => 1.0,
                    _ => return Err(invalid()),
                };
                seconds += value * scale;
                number.clear();
                components += 1;
            }
        }
    }

    if !number.is_empty() || components == 0 {
        return Err(invalid());
    }
    Duration::try_from_secs_f64(seconds).map_err(|_| invalid())
}
