//! Parsing of human-readable duration strings.

use std::time::Duration;

use crate::error::{RatelimitError, Result};

/// Parse a duration string.
///
/// Supports single values like `"10s"`, `"1m"`, `"30m"`, `"250ms"`, `"2h"`,
/// `"1d"` and compound values like `"1h30m"`. The bare string `"0"` parses
/// to a zero duration, which callers use to disable the watchdog timeout.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();

    if input.is_empty() {
        return Err(RatelimitError::InvalidDuration(
            "duration cannot be empty".to_string(),
        ));
    }

    // "0" without a unit disables timeouts
    if input == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total_ms: u64 = 0;
    let mut chars = input.chars().peekable();

    while chars.peek().is_some() {
        let mut number = String::new();
        while let Some(c) = chars.peek() {
            if c.is_ascii_digit() {
                number.push(*c);
                chars.next();
            } else {
                break;
            }
        }

        let mut unit = String::new();
        while let Some(c) = chars.peek() {
            if c.is_ascii_alphabetic() {
                unit.push(*c);
                chars.next();
            } else {
                break;
            }
        }

        if number.is_empty() {
            return Err(RatelimitError::InvalidDuration(format!(
                "missing value before unit in '{}'",
                input
            )));
        }

        let value: u64 = number.parse().map_err(|_| {
            RatelimitError::InvalidDuration(format!("invalid number '{}' in '{}'", number, input))
        })?;

        let multiplier_ms = match unit.as_str() {
            "ms" => 1,
            "s" => 1_000,
            "m" => 60_000,
            "h" => 3_600_000,
            "d" => 86_400_000,
            "" => {
                return Err(RatelimitError::InvalidDuration(format!(
                    "missing unit after '{}' in '{}'",
                    number, input
                )))
            }
            other => {
                return Err(RatelimitError::InvalidDuration(format!(
                    "unknown unit '{}' in '{}'",
                    other, input
                )))
            }
        };

        total_ms = total_ms.saturating_add(value.saturating_mul(multiplier_ms));
    }

    Ok(Duration::from_millis(total_ms))
}
