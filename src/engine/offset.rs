//! Deadline offset tokens.
//!
//! Grammar: one or more ASCII digits followed by exactly one lowercase unit,
//! `s`, `m`, `h` or `d`. No sign, no whitespace, no bare integers.

use chrono::TimeDelta;

use crate::error::{Result, TaskError};

/// Parse an offset token such as `"30s"`, `"5m"`, `"2h"` or `"1d"`.
pub fn parse_offset(token: &str) -> Result<TimeDelta> {
    let invalid = || TaskError::InvalidOffsetFormat(token.to_owned());

    let unit = token.chars().last().ok_or_else(invalid)?;
    let digits = &token[..token.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let n: i64 = digits.parse().map_err(|_| invalid())?;

    let delta = match unit {
        's' => TimeDelta::try_seconds(n),
        'm' => TimeDelta::try_minutes(n),
        'h' => TimeDelta::try_hours(n),
        'd' => TimeDelta::try_days(n),
        _ => None,
    };
    delta.ok_or_else(invalid)
}
