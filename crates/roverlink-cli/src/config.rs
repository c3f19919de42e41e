//! Rover configuration – reads/writes `~/.roverlink/config.toml`.

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use roverlink_runtime::RoverSettings;
use roverlink_types::RoverError;
use serde::{Deserialize, Serialize};

/// Persisted configuration stored in `~/.roverlink/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// TCP port of the line-protocol RPC listener.
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// TCP port of the HTTP mirror.
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Address both listeners bind to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// IMU sampling period.
    #[serde(default = "default_sample_period_ms")]
    pub sample_period_ms: u64,

    /// Period of the streaming ticker.
    #[serde(default = "default_stream_poll_ms")]
    pub stream_poll_ms: u64,

    /// Stream rate used when `StreamImuData` names none.
    #[serde(default = "default_stream_rate_hz")]
    pub default_stream_rate_hz: u32,

    /// Whether the HTTP mirror is started.
    #[serde(default = "default_http_mirror")]
    pub http_mirror: bool,
}

fn default_rpc_port() -> u16 {
    50051
}
fn default_http_port() -> u16 {
    8080
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_sample_period_ms() -> u64 {
    20
}
fn default_stream_poll_ms() -> u64 {
    5
}
fn default_stream_rate_hz() -> u32 {
    10
}
fn default_http_mirror() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_port: default_rpc_port(),
            http_port: default_http_port(),
            bind_address: default_bind_address(),
            sample_period_ms: default_sample_period_ms(),
            stream_poll_ms: default_stream_poll_ms(),
            default_stream_rate_hz: default_stream_rate_hz(),
            http_mirror: default_http_mirror(),
        }
    }
}

impl Config {
    /// Convert into runtime settings.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::Config`] when `bind_address` is not an IP
    /// address or a period is zero.
    pub fn to_settings(&self) -> Result<RoverSettings, RoverError> {
        let bind_address: IpAddr = self.bind_address.parse().map_err(|e| {
            RoverError::Config(format!("bind_address '{}' is not an IP address: {e}", self.bind_address))
        })?;
        if self.sample_period_ms == 0 {
            return Err(RoverError::Config("sample_period_ms must be at least 1".to_string()));
        }
        if self.stream_poll_ms == 0 {
            return Err(RoverError::Config("stream_poll_ms must be at least 1".to_string()));
        }
        Ok(RoverSettings {
            bind_address,
            rpc_port: self.rpc_port,
            http_port: self.http_port,
            http_mirror: self.http_mirror,
            sample_period: Duration::from_millis(self.sample_period_ms),
            stream_poll: Duration::from_millis(self.stream_poll_ms),
            default_stream_rate_hz: self.default_stream_rate_hz,
        })
    }
}

/// Return the path to `~/.roverlink/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".roverlink").join("config.toml")
}

/// Load the config from disk and apply environment overrides.  Returns
/// `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, RoverError> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

/// Load the config from a specific path, as written.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, RoverError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| RoverError::Config(format!("failed to read {}: {e}", path.display())))?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| RoverError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `ROVERLINK_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ROVERLINK_RPC_PORT` | `rpc_port` |
/// | `ROVERLINK_HTTP_PORT` | `http_port` |
/// | `ROVERLINK_BIND_ADDRESS` | `bind_address` |
/// | `ROVERLINK_SAMPLE_PERIOD_MS` | `sample_period_ms` |
/// | `ROVERLINK_STREAM_POLL_MS` | `stream_poll_ms` |
/// | `ROVERLINK_HTTP_MIRROR` | `http_mirror` (`true`/`false`/`1`/`0`) |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ROVERLINK_RPC_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.rpc_port = port;
    }
    if let Ok(v) = std::env::var("ROVERLINK_HTTP_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.http_port = port;
    }
    if let Ok(v) = std::env::var("ROVERLINK_BIND_ADDRESS") {
        cfg.bind_address = v;
    }
    if let Ok(v) = std::env::var("ROVERLINK_SAMPLE_PERIOD_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.sample_period_ms = ms;
    }
    if let Ok(v) = std::env::var("ROVERLINK_STREAM_POLL_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.stream_poll_ms = ms;
    }
    if let Ok(v) = std::env::var("ROVERLINK_HTTP_MIRROR")
        && let Some(on) = parse_flag(&v)
    {
        cfg.http_mirror = on;
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Save the config to disk, creating `~/.roverlink/` if necessary.
pub fn save(cfg: &Config) -> Result<(), RoverError> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path with owner-only permissions on Unix.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), RoverError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| RoverError::Config(format!("failed to create config directory: {e}")))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|e| {
                RoverError::Config(format!("failed to set config directory permissions: {e}"))
            })?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| RoverError::Config(format!("failed to serialize config: {e}")))?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| RoverError::Config(format!("failed to write {}: {e}", path.display())))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| RoverError::Config(format!("failed to write {}: {e}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = std::fs::metadata(path.parent().unwrap()).unwrap().permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        save_to(&Config::default(), &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.rpc_port, 50051);
        assert_eq!(loaded.http_port, 8080);
        assert_eq!(loaded.sample_period_ms, 20);
        assert!(loaded.http_mirror);
    }

    #[test]
    fn partial_file_takes_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "rpc_port = 6000\nhttp_mirror = false\n").unwrap();

        let loaded = load_from(&path).unwrap().unwrap();
        assert_eq!(loaded.rpc_port, 6000);
        assert!(!loaded.http_mirror);
        assert_eq!(loaded.stream_poll_ms, 5);
        assert_eq!(loaded.bind_address, "0.0.0.0");
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "rpc_port = \"lots\"").unwrap();
        assert!(matches!(load_from(&path), Err(RoverError::Config(_))));
    }

    #[test]
    fn config_path_points_to_roverlink_dir() {
        let p = config_path_for_home("/home/testuser");
        assert_eq!(p, PathBuf::from("/home/testuser/.roverlink/config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn settings_conversion() {
        let settings = Config::default().to_settings().unwrap();
        assert_eq!(settings, RoverSettings::default());

        let bad = Config {
            bind_address: "rover.local".to_string(),
            ..Config::default()
        };
        assert!(matches!(bad.to_settings(), Err(RoverError::Config(_))));

        let zero = Config {
            sample_period_ms: 0,
            ..Config::default()
        };
        assert!(zero.to_settings().is_err());
    }

    #[test]
    fn flag_parsing() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" 0 "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    // Env-var tests touch process-global state; each uses its own variable.

    #[test]
    fn apply_env_overrides_changes_rpc_port() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("ROVERLINK_RPC_PORT", "6001") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.rpc_port, 6001);
        unsafe { std::env::remove_var("ROVERLINK_RPC_PORT") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_http_port() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("ROVERLINK_HTTP_PORT", "not-a-port") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.http_port, 8080);
        unsafe { std::env::remove_var("ROVERLINK_HTTP_PORT") };
    }

    #[test]
    fn apply_env_overrides_disables_mirror() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("ROVERLINK_HTTP_MIRROR", "off") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert!(!cfg.http_mirror);
        unsafe { std::env::remove_var("ROVERLINK_HTTP_MIRROR") };
    }

    #[test]
    fn apply_env_overrides_changes_sample_period() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("ROVERLINK_SAMPLE_PERIOD_MS", "50") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.sample_period_ms, 50);
        unsafe { std::env::remove_var("ROVERLINK_SAMPLE_PERIOD_MS") };
    }
}
