//! Byte-count values with human-friendly parsing and formatting.
//!
//! Units are binary multiples: `1KB == 1024` bytes. Parsing accepts an
//! optional fractional part, optional whitespace, and a case-insensitive unit
//! (`B`, `K`, `KB`, `KiB`, ... up to `E`), so `"10KB"`, `"10 kb"` and
//! `"1.5MiB"` are all valid.

use std::fmt;
use std::str::FromStr;

use crate::Error;

const UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];

/// A number of bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub const KB: u64 = 1 << 10;
    pub const MB: u64 = 1 << 20;
    pub const GB: u64 = 1 << 30;

    /// Size in bytes.
    pub fn bytes(self) -> u64 {
        self.0
    }

    /// Format with one decimal in the largest unit that keeps the value
    /// at or above 1, e.g. `"12.5 KB"`.
    pub fn human_readable(self) -> String {
        let mut value = self.0 as f64;
        let mut unit = 0;
        while value >= 1024.0 && unit < UNITS.len() - 1 {
            value /= 1024.0;
            unit += 1;
        }
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Canonical form: the largest unit that divides the value exactly, e.g.
/// `"10KB"`, `"1536B"` for values that are not whole kilobytes.
impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return f.write_str("0B");
        }
        let mut value = self.0;
        let mut unit = 0;
        while value % 1024 == 0 && unit < UNITS.len() - 1 {
            value /= 1024;
            unit += 1;
        }
        write!(f, "{value}{}", UNITS[unit])
    }
}

fn unit_multiplier(unit: &str) -> Option<u64> {
    let exp = match unit.to_ascii_lowercase().as_str() {
        "" | "b" => 0,
        "k" | "kb" | "kib" => 1,
        "m" | "mb" | "mib" => 2,
        "g" | "gb" | "gib" => 3,
        "t" | "tb" | "tib" => 4,
        "p" | "pb" | "pib" => 5,
        "e" | "eb" | "eib" => 6,
        _ => return None,
    };
    Some(1u64 << (10 * exp))
}

impl FromStr for ByteSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::Config(format!("{s:?} is not a valid file size"));

        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split);
        if number.is_empty() {
            return Err(invalid());
        }

        let multiplier = unit_multiplier(unit.trim()).ok_or_else(invalid)?;

        let bytes = match number.split_once('.') {
            None => number
                .parse::<u64>()
                .ok()
                .and_then(|n| n.checked_mul(multiplier)),
            Some((whole, frac)) => {
                let value: f64 = format!("{}.{}", if whole.is_empty() { "0" } else { whole }, frac)
                    .parse()
                    .map_err(|_| invalid())?;
                let bytes = value * multiplier as f64;
                (bytes.is_finite() && bytes < u64::MAX as f64).then_some(bytes as u64)
            }
        };

        bytes.map(ByteSize).ok_or_else(invalid)
    }
}
