//! Unit constants and SI-suffixed quantity parsing

use anyhow::{anyhow, Result};

pub const TICKS_PER_SECOND: f64 = 60.0;
pub const SECONDS_PER_MINUTE: f64 = 60.0;

/// Water enters boilers at this temperature
pub const WATER_DEFAULT_TEMPERATURE: f64 = 15.0;
/// Joules to heat one unit of water/steam by one degree
pub const WATER_HEAT_CAPACITY_J: f64 = 200.0;

const MULTIPLIERS: [(char, f64); 3] = [('k', 1_000.0), ('M', 1_000_000.0), ('G', 1_000_000_000.0)];

/// Parse a prototype quantity such as `"150kW"`, `"4MJ"` or `"1.8MW"`.
///
/// A trailing unit letter (`W` or `J`) is stripped, then an optional
/// `k`/`M`/`G` multiplier. Bare numbers are accepted as-is.
pub fn parse_quantity(value: &str) -> Result<f64> {
    let mut value = value.trim();
    if let Some(stripped) = value.strip_suffix(['W', 'J']) {
        value = stripped;
    }
    let mut multiplier = 1.0;
    for (suffix, suffix_multiplier) in MULTIPLIERS {
        if let Some(stripped) = value
            .strip_suffix(suffix)
            .or_else(|| value.strip_suffix(suffix.to_ascii_uppercase()))
        {
            value = stripped;
            multiplier = suffix_multiplier;
            break;
        }
    }
    let number: f64 = value
        .parse()
        .map_err(|e| anyhow!("invalid quantity {value:?}: {e}"))?;
    Ok(number * multiplier)
}

/// Human-readable form with a `k`/`M`/`G` suffix, one decimal
pub fn format_quantity(value: f64, unit: &str) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let value = value.abs();
    for (suffix, multiplier) in MULTIPLIERS.into_iter().rev() {
        if value >= multiplier {
            return format!("{sign}{:.1}{suffix}{unit}", value / multiplier);
        }
    }
    format!("{sign}{value:.1}{unit}")
}

pub fn per_minute_to_per_second(value: f64) -> f64 {
    value / SECONDS_PER_MINUTE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_power_and_energy() {
        assert_eq!(parse_quantity("150kW").unwrap(), 150_000.0);
        assert_eq!(parse_quantity("4MJ").unwrap(), 4_000_000.0);
        assert_eq!(parse_quantity("1.8MW").unwrap(), 1_800_000.0);
        assert_eq!(parse_quantity("2GJ").unwrap(), 2_000_000_000.0);
        assert_eq!(parse_quantity("0.5").unwrap(), 0.5);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_quantity("fast").is_err());
        assert!(parse_quantity("").is_err());
    }

    #[test]
    fn formats_with_suffix() {
        assert_eq!(format_quantity(900_000.0, "W"), "900.0kW");
        assert_eq!(format_quantity(4_000_000.0, "J"), "4.0MJ");
        assert_eq!(format_quantity(12.0, "W"), "12.0W");
    }
}
