//! Parsing helpers shared by the environment loader.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tracing::warn;

use crate::error::{ConfigError, ConfigResult};

/// Parse a listen address; `:port` binds every interface.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value is neither `:port` nor `ip:port`.
pub fn parse_bind_addr(field: &'static str, raw: &str) -> ConfigResult<SocketAddr> {
    let value = raw.trim();
    if let Some(port) = value.strip_prefix(':') {
        let port = port
            .parse::<u16>()
            .map_err(|_| ConfigError::invalid(field, "invalid_port", raw))?;
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }
    if let Some(port) = value.strip_prefix("localhost:") {
        let port = port
            .parse::<u16>()
            .map_err(|_| ConfigError::invalid(field, "invalid_port", raw))?;
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port));
    }
    value
        .parse::<SocketAddr>()
        .map_err(|_| ConfigError::invalid(field, "invalid_socket_addr", raw))
}

/// Parse a strictly positive integer, falling back to `default` when the value
/// is missing, non-numeric or not positive.
#[must_use]
pub fn positive_or_default(field: &'static str, raw: Option<&str>, default: u64) -> u64 {
    let Some(value) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return default;
    };
    match value.parse::<i64>() {
        Ok(parsed) if parsed > 0 => u64::try_from(parsed).unwrap_or(default),
        _ => {
            warn!(field, value, default, "ignoring invalid numeric setting");
            default
        }
    }
}

/// Interpret an environment flag (`1`, `true`, `yes`, `on`).
#[must_use]
pub fn env_flag_value(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

/// Interpret an optional flag, keeping `default` when the variable is unset or blank.
#[must_use]
pub fn flag_or_default(value: Option<&str>, default: bool) -> bool {
    match value.map(str::trim) {
        None | Some("") => default,
        Some(v) => env_flag_value(Some(v)),
    }
}

/// Ensure a URL uses an HTTP scheme.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for any other scheme.
pub fn require_http_url(field: &'static str, raw: &str) -> ConfigResult<String> {
    let value = raw.trim();
    let lower = value.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(value.to_string())
    } else {
        Err(ConfigError::invalid(field, "unsupported_scheme", raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_addr_accepts_port_only_form() -> anyhow::Result<()> {
        let addr = parse_bind_addr("SERVER_ADDR", ":8080")?;
        assert_eq!(addr.port(), 8080);
        assert!(addr.ip().is_unspecified());

        let addr = parse_bind_addr("SERVER_ADDR", "127.0.0.1:9000")?;
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 9000);
        Ok(())
    }

    #[test]
    fn bind_addr_rejects_garbage() {
        let err = parse_bind_addr("SERVER_ADDR", "nowhere").err();
        assert!(matches!(
            err,
            Some(ConfigError::InvalidField {
                field: "SERVER_ADDR",
                reason: "invalid_socket_addr",
                ..
            })
        ));
        assert!(parse_bind_addr("SERVER_ADDR", ":http").is_err());
    }

    #[test]
    fn positive_values_fall_back_on_invalid_input() {
        assert_eq!(positive_or_default("N", Some("12"), 20), 12);
        assert_eq!(positive_or_default("N", Some("0"), 20), 20);
        assert_eq!(positive_or_default("N", Some("-3"), 20), 20);
        assert_eq!(positive_or_default("N", Some("abc"), 20), 20);
        assert_eq!(positive_or_default("N", None, 20), 20);
    }

    #[test]
    fn flags_handle_truthy_and_defaults() {
        assert!(env_flag_value(Some("TrUe")));
        assert!(env_flag_value(Some(" on ")));
        assert!(!env_flag_value(Some("no")));
        assert!(!env_flag_value(None));
        assert!(flag_or_default(None, true));
        assert!(flag_or_default(Some(""), true));
        assert!(!flag_or_default(Some("0"), true));
    }

    #[test]
    fn http_urls_are_required() {
        assert!(require_http_url("TRANSMISSION_URL", "http://host:9091/transmission/rpc").is_ok());
        assert!(require_http_url("TRANSMISSION_URL", "ftp://host").is_err());
    }
}
