//! Reads/writes `~/.geoanchor/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use geoanchor_runtime::LogFormat;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Persisted user configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Map to load and fetch the alignment record for.
    #[serde(default = "default_map_id")]
    pub map_id: u32,

    /// Credential for the alignment service. Wiped from memory on drop.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,

    /// Localization attempts per run.
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Delay between attempt starts.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default)]
    pub log_format: LogFormat,

    #[serde(default)]
    pub sim: SimConfig,
}

/// Knobs for the simulated device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Where the map origin sits on Earth.
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    /// Camera yaw at the first attempt, counter-clockwise from north.
    pub yaw_deg: f32,
    /// How far the camera turns between attempts.
    pub spin_deg: f32,
    /// Repeating hit/miss script; empty means every attempt localizes.
    pub success_pattern: Vec<bool>,
    /// Simulated engine latency.
    pub latency_ms: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            latitude: 60.1699,
            longitude: 24.9384,
            altitude: 15.0,
            yaw_deg: 0.0,
            spin_deg: 15.0,
            success_pattern: vec![true, true, false],
            latency_ms: 120,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("map_id", &self.map_id)
            .field(
                "token",
                if self.token.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .field("attempts", &self.attempts)
            .field("interval_ms", &self.interval_ms)
            .field("log_format", &self.log_format)
            .field("sim", &self.sim)
            .finish()
    }
}

impl Drop for Config {
    fn drop(&mut self) {
        self.token.zeroize();
    }
}

fn default_map_id() -> u32 {
    92528
}
fn default_attempts() -> u32 {
    10
}
fn default_interval_ms() -> u64 {
    500
}

impl Default for Config {
    fn default() -> Self {
        Self {
            map_id: default_map_id(),
            token: String::new(),
            attempts: default_attempts(),
            interval_ms: default_interval_ms(),
            log_format: LogFormat::default(),
            sim: SimConfig::default(),
        }
    }
}

/// Return the path to `~/.geoanchor/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".geoanchor").join("config.toml")
}

/// Load the config from disk and apply environment overrides. Returns `None`
/// if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `GEOANCHOR_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `GEOANCHOR_MAP_ID` | `map_id` |
/// | `GEOANCHOR_TOKEN` | `token` |
/// | `GEOANCHOR_ATTEMPTS` | `attempts` |
/// | `GEOANCHOR_INTERVAL_MS` | `interval_ms` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("GEOANCHOR_MAP_ID")
        && let Ok(id) = v.parse::<u32>()
    {
        cfg.map_id = id;
    }
    if let Ok(v) = std::env::var("GEOANCHOR_TOKEN") {
        cfg.token.zeroize();
        cfg.token = v;
    }
    if let Ok(v) = std::env::var("GEOANCHOR_ATTEMPTS")
        && let Ok(n) = v.parse::<u32>()
    {
        cfg.attempts = n;
    }
    if let Ok(v) = std::env::var("GEOANCHOR_INTERVAL_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.interval_ms = ms;
    }
}

/// Save the config to disk, creating `~/.geoanchor/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let mut raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    // The token is in the file; keep it owner-only.
    #[cfg(unix)]
    let written = {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
    };
    #[cfg(not(unix))]
    let written = fs::write(path, &raw);
    raw.zeroize();
    written.map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
