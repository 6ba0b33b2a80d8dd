//! Desk Configuration Settings
//!
//! Configuration types for the desk, loaded from environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default Kite Connect REST root.
pub const DEFAULT_API_URL: &str = "https://api.kite.trade";

/// Default Kite Ticker WebSocket root.
pub const DEFAULT_TICKER_URL: &str = "wss://ws.kite.trade";

/// Exchanges whose instrument dumps are loaded at startup.
pub const DEFAULT_PREFETCH_EXCHANGES: [&str; 5] = ["NSE", "NFO", "BSE", "BFO", "MCX"];

/// Kite API credentials.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    access_token: String,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(api_key: String, access_token: String) -> Self {
        Self {
            api_key,
            access_token,
        }
    }

    /// Get the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Get the access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Value of the `Authorization` header.
    #[must_use]
    pub fn authorization(&self) -> String {
        format!("token {}:{}", self.api_key, self.access_token)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// Ticker connection settings.
#[derive(Debug, Clone)]
pub struct TickerSettings {
    /// WebSocket root URL.
    pub url: String,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
    /// Silence after which the connection is considered dead.
    pub read_timeout: Duration,
}

impl Default for TickerSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_TICKER_URL.to_string(),
            reconnect_delay_initial: Duration::from_secs(2),
            reconnect_delay_max: Duration::from_secs(60),
            reconnect_delay_multiplier: 2.0,
            max_reconnect_attempts: 50,
            read_timeout: Duration::from_secs(10),
        }
    }
}

/// Sync loop timing.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Interval between general syncs.
    pub general_interval: Duration,
    /// Minimum interval between INPUT price refreshes.
    pub input_refresh_interval: Duration,
    /// Sleep between loop iterations.
    pub loop_tick: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            general_interval: Duration::from_secs(2),
            input_refresh_interval: Duration::from_millis(1000),
            loop_tick: Duration::from_millis(10),
        }
    }
}

/// Complete desk configuration.
#[derive(Debug, Clone)]
pub struct DeskSettings {
    /// API credentials.
    pub credentials: Credentials,
    /// REST root URL.
    pub api_url: String,
    /// Local HTTP port for refresh requests and the sheet bridge.
    pub http_port: u16,
    /// Exchanges loaded into the instrument directory.
    pub prefetch_exchanges: Vec<String>,
    /// Ticker connection settings.
    pub ticker: TickerSettings,
    /// Sync loop timing.
    pub sync: SyncSettings,
}

impl DeskSettings {
    /// Create configuration from environment variables.
    ///
    /// Reads the access token from `KITE_ACCESS_TOKEN_FILE`.
    ///
    /// # Errors
    ///
    /// Returns an error if `KITE_API_KEY` is missing or empty, or the token
    /// file cannot be read.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("KITE_API_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("KITE_API_KEY".to_string()))?;
        if api_key.trim().is_empty() {
            return Err(ConfigError::EmptyValue("KITE_API_KEY".to_string()));
        }

        let token_file = lookup("KITE_ACCESS_TOKEN_FILE")
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| PathBuf::from("access_token.txt"), PathBuf::from);
        let access_token = read_access_token(&token_file)?;

        let ticker_defaults = TickerSettings::default();
        let ticker = TickerSettings {
            url: lookup("KITE_TICKER_URL").unwrap_or(ticker_defaults.url),
            reconnect_delay_initial: parse_millis(
                &lookup,
                "DESK_RECONNECT_DELAY_INITIAL_MS",
                ticker_defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_secs(
                &lookup,
                "DESK_RECONNECT_DELAY_MAX_SECS",
                ticker_defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: ticker_defaults.reconnect_delay_multiplier,
            max_reconnect_attempts: parse_or(
                &lookup,
                "DESK_MAX_RECONNECT_ATTEMPTS",
                ticker_defaults.max_reconnect_attempts,
            ),
            read_timeout: ticker_defaults.read_timeout,
        };

        let sync_defaults = SyncSettings::default();
        let sync = SyncSettings {
            general_interval: parse_secs(
                &lookup,
                "DESK_GENERAL_INTERVAL_SECS",
                sync_defaults.general_interval,
            ),
            input_refresh_interval: parse_millis(
                &lookup,
                "DESK_INPUT_REFRESH_MS",
                sync_defaults.input_refresh_interval,
            ),
            loop_tick: parse_millis(&lookup, "DESK_LOOP_TICK_MS", sync_defaults.loop_tick),
        };

        let prefetch_exchanges = lookup("DESK_PREFETCH_EXCHANGES")
            .map(|v| parse_exchange_list(&v))
            .filter(|list| !list.is_empty())
            .unwrap_or_else(|| {
                DEFAULT_PREFETCH_EXCHANGES
                    .iter()
                    .map(ToString::to_string)
                    .collect()
            });

        Ok(Self {
            credentials: Credentials::new(api_key.trim().to_string(), access_token),
            api_url: lookup("KITE_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            http_port: parse_or(&lookup, "DESK_HTTP_PORT", 5000),
            prefetch_exchanges,
            ticker,
            sync,
        })
    }

    /// Ticker URL carrying the credentials as query parameters.
    #[must_use]
    pub fn ticker_url(&self) -> String {
        format!(
            "{}?api_key={}&access_token={}",
            self.ticker.url.trim_end_matches('/'),
            self.credentials.api_key(),
            self.credentials.access_token()
        )
    }
}

/// Read and trim the access token file.
///
/// # Errors
///
/// Returns `ConfigError::TokenFile` when the file cannot be read, and
/// `ConfigError::EmptyValue` when it holds only whitespace.
pub fn read_access_token(path: &Path) -> Result<String, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::TokenFile {
        path: path.to_path_buf(),
        source,
    })?;
    let token = raw.trim();
    if token.is_empty() {
        return Err(ConfigError::EmptyValue(path.display().to_string()));
    }
    Ok(token.to_string())
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable or file has empty value.
    #[error("{0} cannot be empty")]
    EmptyValue(String),
    /// The access token file could not be read.
    #[error("cannot read access token file {}: {source}", path.display())]
    TokenFile {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

fn parse_exchange_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|part| part.trim().to_uppercase())
        .filter(|part| !part.is_empty())
        .collect()
}

fn parse_or<L, T>(lookup: &L, key: &str, default: T) -> T
where
    L: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_secs<L>(lookup: &L, key: &str, default: Duration) -> Duration
where
    L: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_millis<L>(lookup: &L, key: &str, default: Duration) -> Duration
where
    L: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn token_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn lookup_from(vars: HashMap<&'static str, String>) -> impl Fn(&str) -> Option<String> {
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_required_vars_set() {
        let file = token_file("abc123\n");
        let vars = HashMap::from([
            ("KITE_API_KEY", "key".to_string()),
            (
                "KITE_ACCESS_TOKEN_FILE",
                file.path().display().to_string(),
            ),
        ]);

        let settings = DeskSettings::from_lookup(lookup_from(vars)).unwrap();

        assert_eq!(settings.credentials.access_token(), "abc123");
        assert_eq!(settings.api_url, DEFAULT_API_URL);
        assert_eq!(settings.http_port, 5000);
        assert_eq!(settings.prefetch_exchanges, ["NSE", "NFO", "BSE", "BFO", "MCX"]);
        assert_eq!(settings.ticker.max_reconnect_attempts, 50);
        assert_eq!(settings.ticker.reconnect_delay_max, Duration::from_secs(60));
        assert_eq!(settings.sync.general_interval, Duration::from_secs(2));
        assert_eq!(settings.sync.loop_tick, Duration::from_millis(10));
    }

    #[test]
    fn overrides_are_parsed() {
        let file = token_file("tok");
        let vars = HashMap::from([
            ("KITE_API_KEY", "key".to_string()),
            (
                "KITE_ACCESS_TOKEN_FILE",
                file.path().display().to_string(),
            ),
            ("DESK_HTTP_PORT", "5050".to_string()),
            ("DESK_PREFETCH_EXCHANGES", " nse, mcx ,".to_string()),
            ("DESK_MAX_RECONNECT_ATTEMPTS", "0".to_string()),
            ("DESK_INPUT_REFRESH_MS", "250".to_string()),
        ]);

        let settings = DeskSettings::from_lookup(lookup_from(vars)).unwrap();

        assert_eq!(settings.http_port, 5050);
        assert_eq!(settings.prefetch_exchanges, ["NSE", "MCX"]);
        assert_eq!(settings.ticker.max_reconnect_attempts, 0);
        assert_eq!(settings.sync.input_refresh_interval, Duration::from_millis(250));
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = DeskSettings::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "KITE_API_KEY"));
    }

    #[test]
    fn missing_token_file_is_an_error() {
        let vars = HashMap::from([
            ("KITE_API_KEY", "key".to_string()),
            ("KITE_ACCESS_TOKEN_FILE", "/nonexistent/token.txt".to_string()),
        ]);
        let err = DeskSettings::from_lookup(lookup_from(vars)).unwrap_err();
        assert!(matches!(err, ConfigError::TokenFile { .. }));
    }

    #[test]
    fn blank_token_file_is_an_error() {
        let file = token_file("  \n");
        assert!(matches!(
            read_access_token(file.path()),
            Err(ConfigError::EmptyValue(_))
        ));
    }

    #[test]
    fn ticker_url_carries_credentials() {
        let file = token_file("tok");
        let vars = HashMap::from([
            ("KITE_API_KEY", "key".to_string()),
            (
                "KITE_ACCESS_TOKEN_FILE",
                file.path().display().to_string(),
            ),
        ]);
        let settings = DeskSettings::from_lookup(lookup_from(vars)).unwrap();
        assert_eq!(
            settings.ticker_url(),
            "wss://ws.kite.trade?api_key=key&access_token=tok"
        );
        assert_eq!(settings.credentials.authorization(), "token key:tok");
    }

    #[test]
    fn credentials_redacted_debug() {
        let creds = Credentials::new("key123".to_string(), "secret456".to_string());
        let debug = format!("{creds:?}");
        assert!(!debug.contains("key123"));
        assert!(!debug.contains("secret456"));
        assert!(debug.contains("[REDACTED]"));
    }
}
