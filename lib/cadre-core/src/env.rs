//! Prefix-scoped environment variable settings.

use std::time::Duration;

use tracing::warn;

/// Settings read from `<PREFIX>_*` environment variables.
///
/// Malformed numeric values are logged and ignored, never fatal.
#[derive(Debug, Clone, Default)]
pub struct EnvSettings {
    /// `<PREFIX>_SOCKET_CONNECT_TIMEOUT` in milliseconds.
    pub socket_connect_timeout: Option<Duration>,
    /// `<PREFIX>_REQUEST_COMPLETION_TIMEOUT` in milliseconds.
    pub request_completion_timeout: Option<Duration>,
    /// `<PREFIX>_APP_MASK_OUTPUT`; masking stays on unless explicitly "FALSE".
    pub mask_output: bool,
}

impl EnvSettings {
    /// Reads the settings for the given application prefix.
    pub fn read(prefix: &str) -> Self {
        let socket_connect_timeout = std::env::var(format!("{prefix}_SOCKET_CONNECT_TIMEOUT"))
            .ok()
            .and_then(|value| parse_millis("SOCKET_CONNECT_TIMEOUT", &value));
        let request_completion_timeout =
            std::env::var(format!("{prefix}_REQUEST_COMPLETION_TIMEOUT"))
                .ok()
                .and_then(|value| parse_millis("REQUEST_COMPLETION_TIMEOUT", &value));
        let mask_output = mask_flag(
            std::env::var(format!("{prefix}_APP_MASK_OUTPUT"))
                .ok()
                .as_deref(),
        );

        Self {
            socket_connect_timeout,
            request_completion_timeout,
            mask_output,
        }
    }
}

fn parse_millis(name: &str, value: &str) -> Option<Duration> {
    match value.trim().parse::<u64>() {
        Ok(millis) => Some(Duration::from_millis(millis)),
        Err(_) => {
            warn!(%name, %value, "ignoring non-numeric timeout environment variable");
            None
        }
    }
}

fn mask_flag(value: Option<&str>) -> bool {
    value.is_none_or(|value| !value.eq_ignore_ascii_case("FALSE"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;

    #[test]
    fn test_parse_millis_parses_numeric_values() {
        check!(parse_millis("T", "1500") == Some(Duration::from_millis(1500)));
        check!(parse_millis("T", " 60000 ") == Some(Duration::from_millis(60000)));
    }

    #[test]
    fn test_parse_millis_ignores_garbage() {
        check!(parse_millis("T", "not-a-number").is_none());
        check!(parse_millis("T", "").is_none());
        check!(parse_millis("T", "-5").is_none());
    }

    #[test]
    fn test_mask_flag_defaults_on() {
        check!(mask_flag(None));
        check!(mask_flag(Some("TRUE")));
        check!(mask_flag(Some("anything")));
        check!(!mask_flag(Some("FALSE")));
        check!(!mask_flag(Some("false")));
    }

    #[test]
    fn test_read_with_unset_prefix_yields_defaults() {
        let settings = EnvSettings::read("CADRE_SURELY_UNSET");
        check!(settings.socket_connect_timeout.is_none());
        check!(settings.request_completion_timeout.is_none());
        check!(settings.mask_output);
    }
}
