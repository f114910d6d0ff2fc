//! Relay configuration parsed from environment variables.

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}: {value:?} ({reason})")]
    Invalid { key: &'static str, value: String, reason: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    /// Capacity of each connection's outbound frame channel. Frames for a
    /// connection whose channel is full are dropped.
    pub outbound_buffer: usize,
    pub log_format: LogFormat,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            log_format: LogFormat::Text,
        }
    }
}

impl RelayConfig {
    /// Build typed relay config from environment variables.
    ///
    /// Optional:
    /// - `HOST`: default `0.0.0.0`
    /// - `PORT`: default 3000
    /// - `OUTBOUND_BUFFER`: default 256, must be positive
    /// - `LOG_FORMAT`: `text` (default) or `json`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set but unparsable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. `from_env` delegates here.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a value is set but unparsable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { key: "PORT", value: raw, reason: "expected a port number" })?,
            None => DEFAULT_PORT,
        };

        let outbound_buffer = match lookup("OUTBOUND_BUFFER") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "OUTBOUND_BUFFER",
                        value: raw,
                        reason: "expected a positive integer",
                    });
                }
            },
            None => DEFAULT_OUTBOUND_BUFFER,
        };

        let log_format = parse_log_format(lookup("LOG_FORMAT"))?;

        Ok(Self { host, port, outbound_buffer, log_format })
    }

    /// `host:port` for the TCP listener.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_log_format(raw: Option<String>) -> Result<LogFormat, ConfigError> {
    let Some(raw) = raw else {
        return Ok(LogFormat::Text);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        _ => Err(ConfigError::Invalid { key: "LOG_FORMAT", value: raw, reason: "expected 'text' or 'json'" }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
