/*
 * Copyright 2026 Molock Team
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Parsing of the `delay` query parameter.
//!
//! Accepted forms are a signed duration literal made of one or more
//! `<number><unit>` terms (`10ms`, `1h30m`, `1.5s`, `-100ms`) with units
//! `ns`, `us` (`µs`, `μs`), `ms`, `s`, `m`, `h`, or a bare signed integer
//! taken as milliseconds.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

const NANOSECOND: u64 = 1;
const MICROSECOND: u64 = 1_000 * NANOSECOND;
const MILLISECOND: u64 = 1_000 * MICROSECOND;
const SECOND: u64 = 1_000 * MILLISECOND;
const MINUTE: u64 = 60 * SECOND;
const HOUR: u64 = 60 * MINUTE;

// Magnitude of i64::MIN; the largest value a negative literal may reach.
const MAX_MAGNITUDE: u64 = 1 << 63;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DelayError {
    #[error("invalid duration {0:?}")]
    InvalidDuration(String),
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },
}

/// A signed request delay with nanosecond precision. Zero and negative
/// values are already elapsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Delay {
    nanos: i64,
}

impl Delay {
    pub const ZERO: Delay = Delay { nanos: 0 };

    pub fn from_nanos(nanos: i64) -> Self {
        Self { nanos }
    }

    pub fn as_nanos(&self) -> i64 {
        self.nanos
    }

    pub fn is_positive(&self) -> bool {
        self.nanos > 0
    }

    /// The wall-clock wait this delay asks for, `None` when already elapsed.
    pub fn to_wait(&self) -> Option<Duration> {
        if self.is_positive() {
            Some(Duration::from_nanos(self.nanos as u64))
        } else {
            None
        }
    }
}

impl fmt::Display for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nanos < 0 {
            write!(f, "-{:?}", Duration::from_nanos(self.nanos.unsigned_abs()))
        } else {
            write!(f, "{:?}", Duration::from_nanos(self.nanos as u64))
        }
    }
}

/// Resolve the raw `delay` parameter. Absent or empty means no delay.
///
/// A duration literal is tried first; when that fails and the input is a
/// plain integer it is read as milliseconds. Otherwise the duration error
/// is returned.
pub fn parse_delay(raw: Option<&str>) -> Result<Delay, DelayError> {
    let raw = match raw {
        None | Some("") => return Ok(Delay::ZERO),
        Some(raw) => raw,
    };

    match parse_duration(raw) {
        Ok(delay) => Ok(delay),
        Err(err) => match raw.parse::<i64>() {
            Ok(ms) => ms
                .checked_mul(MILLISECOND as i64)
                .map(Delay::from_nanos)
                .ok_or(err),
            Err(_) => Err(err),
        },
    }
}

/// Parse a duration literal such as `300ms`, `-1.5h` or `2h45m`.
pub fn parse_duration(input: &str) -> Result<Delay, DelayError> {
    let invalid = || DelayError::InvalidDuration(input.to_string());

    let mut s = input.as_bytes();
    let mut negative = false;
    if let Some((&sign, rest)) = s.split_first() {
        if sign == b'-' || sign == b'+' {
            negative = sign == b'-';
            s = rest;
        }
    }

    // Special case: a lone zero needs no unit.
    if s == b"0" {
        return Ok(Delay::ZERO);
    }
    if s.is_empty() {
        return Err(invalid());
    }

    let mut total: u64 = 0;
    while !s.is_empty() {
        if !(s[0] == b'.' || s[0].is_ascii_digit()) {
            return Err(invalid());
        }

        let before = s.len();
        let (mut value, rest) = leading_int(s).ok_or_else(invalid)?;
        s = rest;
        let has_integer = before != s.len();

        let mut fraction: u64 = 0;
        let mut scale: f64 = 1.0;
        let mut has_fraction = false;
        if let Some((&b'.', rest)) = s.split_first() {
            s = rest;
            let before = s.len();
            let (f, sc, rest) = leading_fraction(s);
            fraction = f;
            scale = sc;
            s = rest;
            has_fraction = before != s.len();
        }
        if !has_integer && !has_fraction {
            // No digits at all, e.g. ".s"
            return Err(invalid());
        }

        let unit_len = s
            .iter()
            .position(|&c| c == b'.' || c.is_ascii_digit())
            .unwrap_or(s.len());
        if unit_len == 0 {
            return Err(DelayError::MissingUnit(input.to_string()));
        }
        let unit_name = String::from_utf8_lossy(&s[..unit_len]).into_owned();
        s = &s[unit_len..];

        let unit = unit_nanos(&unit_name).ok_or_else(|| DelayError::UnknownUnit {
            unit: unit_name.clone(),
            input: input.to_string(),
        })?;

        if value > MAX_MAGNITUDE / unit {
            return Err(invalid());
        }
        value *= unit;
        if fraction > 0 {
            value += (fraction as f64 * (unit as f64 / scale)) as u64;
            if value > MAX_MAGNITUDE {
                return Err(invalid());
            }
        }

        total = total.checked_add(value).ok_or_else(invalid)?;
        if total > MAX_MAGNITUDE {
            return Err(invalid());
        }
    }

    if negative {
        // total <= 2^63 here, so the wrapping negation lands on i64::MIN at worst.
        return Ok(Delay::from_nanos((total as i64).wrapping_neg()));
    }
    if total > i64::MAX as u64 {
        return Err(invalid());
    }
    Ok(Delay::from_nanos(total as i64))
}

fn unit_nanos(unit: &str) -> Option<u64> {
    match unit {
        "ns" => Some(NANOSECOND),
        "us" | "µs" | "μs" => Some(MICROSECOND),
        "ms" => Some(MILLISECOND),
        "s" => Some(SECOND),
        "m" => Some(MINUTE),
        "h" => Some(HOUR),
        _ => None,
    }
}

/// Consume leading decimal digits. `None` on overflow past 2^63.
fn leading_int(s: &[u8]) -> Option<(u64, &[u8])> {
    let mut value: u64 = 0;
    let mut i = 0;
    while i < s.len() && s[i].is_ascii_digit() {
        if value > (MAX_MAGNITUDE - 1) / 10 {
            return None;
        }
        value = value * 10 + u64::from(s[i] - b'0');
        if value > MAX_MAGNITUDE {
            return None;
        }
        i += 1;
    }
    Some((value, &s[i..]))
}

/// Consume leading fraction digits, returning the digits read as an
/// integer and the power of ten they are scaled by. Digits beyond what
/// fits are consumed but dropped.
fn leading_fraction(s: &[u8]) -> (u64, f64, &[u8]) {
    let mut value: u64 = 0;
    let mut scale: f64 = 1.0;
    let mut overflow = false;
    let mut i = 0;
    while i < s.len() && s[i].is_ascii_digit() {
        if !overflow {
            if value > (i64::MAX as u64) / 10 {
                overflow = true;
            } else {
                let next = value * 10 + u64::from(s[i] - b'0');
                if next > i64::MAX as u64 {
                    overflow = true;
                } else {
                    value = next;
                    scale *= 10.0;
                }
            }
        }
        i += 1;
    }
    (value, scale, &s[i..])
}
