// Environment lookup helpers
// Typed reads of environment variables with fallbacks

use anyhow::{bail, Context, Result};
use std::str::FromStr;
use std::time::Duration;

/// Reads a variable from the process environment.
/// Used as the default `lookup` for [`crate::config::Config::from_env`].
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Returns the variable's value, or `fallback` when it is unset.
pub fn get_string<F>(lookup: &F, key: &str, fallback: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| fallback.to_string())
}

/// Parses the variable with `FromStr`.
/// An unset variable yields `fallback`; a malformed one is an error naming the key.
pub fn get_parsed<F, T>(lookup: &F, key: &str, fallback: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} must be a valid number, got '{}'", key, raw)),
        None => Ok(fallback),
    }
}

/// Parses the variable as a duration such as `15m`, `1h30m` or `250ms`.
pub fn get_duration<F>(lookup: &F, key: &str, fallback: &str) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = get_string(lookup, key, fallback);
    parse_duration(&raw).with_context(|| format!("{} must be a valid duration, got '{}'", key, raw))
}

/// Parses a duration string made of `<number><unit>` segments.
///
/// Units are `ns`, `us` (or `µs`/`μs`), `ms`, `s`, `m` and `h`. Numbers may carry a
/// fractional part (`1.5h`). A bare `0` is accepted, any other unitless value is not.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();
    if input.is_empty() {
        bail!("empty duration");
    }
    if input == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total_nanos: f64 = 0.0;
    let mut rest = input;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            bail!("expected a number in duration '{}'", input);
        }
        let value: f64 = rest[..number_len]
            .parse()
            .with_context(|| format!("invalid number in duration '{}'", input))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1_000.0,
            "ms" => 1_000_000.0,
            "s" => 1_000_000_000.0,
            "m" => 60.0 * 1_000_000_000.0,
            "h" => 3_600.0 * 1_000_000_000.0,
            "" => bail!("missing unit in duration '{}'", input),
            other => bail!("unknown unit '{}' in duration '{}'", other, input),
        };
        rest = &rest[unit_len..];

        total_nanos += value * scale;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        bail!("duration '{}' is out of range", input);
    }

    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_get_string_uses_fallback_when_unset() {
        let lookup = lookup_from(&[("ADDR", ":9000")]);
        assert_eq!(get_string(&lookup, "ADDR", ":8080"), ":9000");
        assert_eq!(get_string(&lookup, "MISSING", ":8080"), ":8080");
    }

    #[test]
    fn test_get_parsed() {
        let lookup = lookup_from(&[("DB_MAX_OPEN_CONNS", " 12 "), ("BAD", "twelve")]);
        assert_eq!(get_parsed::<_, usize>(&lookup, "DB_MAX_OPEN_CONNS", 30).unwrap(), 12);
        assert_eq!(get_parsed::<_, usize>(&lookup, "MISSING", 30).unwrap(), 30);

        let err = get_parsed::<_, usize>(&lookup, "BAD", 30).unwrap_err();
        assert!(err.to_string().contains("BAD"));
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("15m").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("3us").unwrap(), Duration::from_micros(3));
        assert_eq!(parse_duration("3µs").unwrap(), Duration::from_micros(3));
        // Greek small letter mu, distinct from the micro sign above
        assert_eq!(parse_duration("3\u{3bc}s").unwrap(), Duration::from_micros(3));
        assert_eq!(parse_duration("40ns").unwrap(), Duration::from_nanos(40));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
    }

    #[test]
    fn test_parse_duration_compound_and_fractional() {
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_rejects_malformed() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("15").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("5d").is_err());
        assert!(parse_duration("-5s").is_err());
        assert!(parse_duration("1..5s").is_err());
    }

    #[test]
    fn test_get_duration_names_key_on_error() {
        let lookup = lookup_from(&[("DB_MAX_IDLE_TIME", "soon")]);
        let err = get_duration(&lookup, "DB_MAX_IDLE_TIME", "15m").unwrap_err();
        assert!(err.to_string().contains("DB_MAX_IDLE_TIME"));

        let fallback = get_duration(&lookup, "SERVER_READ_TIMEOUT", "10s").unwrap();
        assert_eq!(fallback, Duration::from_secs(10));
    }
}
