//! Shared configuration for Vesta panel tools.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `vesta_core::PanelConfig`. The CLI layers its
//! `GlobalOpts` overrides on top of this.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use vesta_core::{PanelConfig, PollSettings};

const KEYRING_SERVICE: &str = "vesta-sync";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' not found in config")]
    UnknownProfile { profile: String },

    #[error("no password configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named panel profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Pick a profile: the named one, else `default_profile`, else
    /// "default".
    pub fn profile<'a>(&'a self, name: Option<&'a str>) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|profile| (name, profile))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Per-request timeout in seconds. Unset means derived from the
    /// tick deadline and retry policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: None,
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

/// A named panel profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Panel host name or IP, optionally with `:port`.
    pub host: String,

    #[serde(default)]
    pub use_https: bool,

    pub username: Option<String>,

    /// Password (plaintext; prefer keyring).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    /// Reject self-signed certificates. Panels ship with them, so off
    /// by default.
    pub verify_tls: Option<bool>,

    /// Per-request timeout in seconds.
    pub timeout: Option<u64>,

    /// Poll tuning, as humantime durations ("5s", "1m").
    #[serde(default)]
    pub polling: Polling,

    /// Panel area addressed by arm commands.
    pub area: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Polling {
    pub interval: Option<String>,
    pub degraded_interval: Option<String>,
    pub tick_deadline: Option<String>,
    pub offline_after: Option<u32>,
    pub retry_attempts: Option<u32>,
    pub event_capacity: Option<usize>,
    pub event_fetch_count: Option<u32>,
    pub convergence_ticks: Option<u32>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "vesta", "vesta-sync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("vesta-sync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load config from `path` layered under `VESTA_*` environment
/// variables. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("VESTA_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load the config from the canonical path.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{profile_name}/password"),
    )?)
}

/// Resolve the panel password without CLI flags.
///
/// Order: the profile's `password_env`, `VESTA_PASSWORD`, the system
/// keyring, plaintext in the profile.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    if let Some(env_name) = &profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    if let Ok(val) = std::env::var("VESTA_PASSWORD") {
        return Ok(SecretString::from(val));
    }

    if let Ok(entry) = keyring_entry(profile_name) {
        if let Ok(pw) = entry.get_password() {
            return Ok(SecretString::from(pw));
        }
    }

    if let Some(pw) = &profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a password in the system keyring.
pub fn store_password(profile_name: &str, password: &SecretString) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(password.expose_secret())?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

fn parse_duration(field: &str, value: Option<&str>, default: Duration) -> Result<Duration, ConfigError> {
    let Some(text) = value else {
        return Ok(default);
    };
    let duration = humantime::parse_duration(text).map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("'{text}': {e}"),
    })?;
    if duration.is_zero() {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(duration)
}

/// Build the poll tuning from a profile, filling gaps with defaults.
pub fn poll_settings(profile: &Profile) -> Result<PollSettings, ConfigError> {
    let defaults = PollSettings::default();
    let polling = &profile.polling;

    let mut retry = defaults.retry.clone();
    if let Some(attempts) = polling.retry_attempts {
        if attempts == 0 {
            return Err(ConfigError::Validation {
                field: "polling.retry_attempts".into(),
                reason: "must be at least 1".into(),
            });
        }
        retry.max_attempts = attempts;
    }

    let settings = PollSettings {
        poll_interval: parse_duration(
            "polling.interval",
            polling.interval.as_deref(),
            defaults.poll_interval,
        )?,
        degraded_interval: parse_duration(
            "polling.degraded_interval",
            polling.degraded_interval.as_deref(),
            defaults.degraded_interval,
        )?,
        tick_deadline: parse_duration(
            "polling.tick_deadline",
            polling.tick_deadline.as_deref(),
            defaults.tick_deadline,
        )?,
        offline_after: polling.offline_after.unwrap_or(defaults.offline_after),
        retry,
        event_capacity: polling.event_capacity.unwrap_or(defaults.event_capacity),
        event_fetch_count: polling
            .event_fetch_count
            .unwrap_or(defaults.event_fetch_count),
        convergence_ticks: polling
            .convergence_ticks
            .unwrap_or(defaults.convergence_ticks),
        area: profile.area.unwrap_or(defaults.area),
    };

    if settings.tick_deadline >= settings.poll_interval {
        return Err(ConfigError::Validation {
            field: "polling.tick_deadline".into(),
            reason: format!(
                "{} must be shorter than the poll interval ({})",
                humantime::format_duration(settings.tick_deadline),
                humantime::format_duration(settings.poll_interval)
            ),
        });
    }
    Ok(settings)
}

/// Build a `PanelConfig` from a profile with no CLI overrides.
pub fn profile_to_panel_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<PanelConfig, ConfigError> {
    if profile.host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: "must not be empty".into(),
        });
    }

    let username = profile
        .username
        .clone()
        .or_else(|| std::env::var("VESTA_USERNAME").ok())
        .unwrap_or_else(|| "admin".into());
    let password = resolve_password(profile, profile_name)?;
    let poll = poll_settings(profile)?;
    let timeout = request_timeout(profile.timeout.or(defaults.timeout), &poll)?;

    Ok(PanelConfig {
        host: profile.host.trim().to_owned(),
        use_https: profile.use_https,
        username,
        password,
        timeout,
        accept_invalid_certs: !profile.verify_tls.unwrap_or(false),
        poll,
    })
}

/// Per-request timeout: the configured seconds, or the largest value that
/// still fits every retry attempt inside the tick deadline.
fn request_timeout(configured: Option<u64>, poll: &PollSettings) -> Result<Duration, ConfigError> {
    let budget = poll.request_timeout_budget();
    let Some(secs) = configured else {
        if budget.is_zero() {
            return Err(ConfigError::Validation {
                field: "polling.retry_attempts".into(),
                reason: format!(
                    "retry backoff leaves no time for requests within the {} tick deadline",
                    humantime::format_duration(poll.tick_deadline)
                ),
            });
        }
        return Ok(budget);
    };

    let timeout = Duration::from_secs(secs);
    if timeout.is_zero() || timeout >= poll.tick_deadline {
        return Err(ConfigError::Validation {
            field: "timeout".into(),
            reason: format!(
                "{secs}s must be greater than zero and shorter than polling.tick_deadline ({})",
                humantime::format_duration(poll.tick_deadline)
            ),
        });
    }
    if timeout > budget {
        warn!(
            timeout_secs = secs,
            tick_deadline = %humantime::format_duration(poll.tick_deadline),
            "request timeout leaves no room for every retry within one tick"
        );
    }
    Ok(timeout)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
default_profile = "home"

[defaults]
output = "json"

[profiles.home]
host = "192.168.1.50"
username = "installer"
password = "hunter2"

[profiles.home.polling]
interval = "10s"
degraded_interval = "1m"
retry_attempts = 5

[profiles.cabin]
host = "cabin.lan:8080"
use_https = true
verify_tls = true
area = 2
"#;

    fn write_sample() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        (dir, path)
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.default_profile.as_deref(), Some("default"));
        assert!(config.profiles.is_empty());
        assert_eq!(config.defaults.output, "table");
    }

    #[test]
    fn loads_profiles_from_toml() {
        let (_dir, path) = write_sample();
        let config = load_config_from(&path).unwrap();

        assert_eq!(config.defaults.output, "json");
        assert_eq!(config.defaults.timeout, None);
        let (name, home) = config.profile(None).unwrap();
        assert_eq!(name, "home");
        assert_eq!(home.host, "192.168.1.50");
        assert_eq!(home.polling.retry_attempts, Some(5));

        let (_, cabin) = config.profile(Some("cabin")).unwrap();
        assert!(cabin.use_https);
        assert_eq!(cabin.area, Some(2));
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let (_dir, path) = write_sample();
        let config = load_config_from(&path).unwrap();
        assert!(matches!(
            config.profile(Some("garage")),
            Err(ConfigError::UnknownProfile { profile }) if profile == "garage"
        ));
    }

    #[test]
    fn save_then_load_preserves_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.profiles.insert(
            "default".into(),
            Profile {
                host: "10.0.0.2".into(),
                password_env: Some("PANEL_PW".into()),
                ..Profile::default()
            },
        );

        save_config_to(&config, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), config);
    }

    #[test]
    fn profile_translates_to_panel_config() {
        let (_dir, path) = write_sample();
        let config = load_config_from(&path).unwrap();
        let (name, home) = config.profile(None).unwrap();

        let panel = profile_to_panel_config(home, name, &config.defaults).unwrap();
        assert_eq!(panel.host, "192.168.1.50");
        assert_eq!(panel.username, "installer");
        assert!(panel.accept_invalid_certs);
        assert_eq!(panel.timeout, panel.poll.request_timeout_budget());
        assert!(panel.timeout * 5 < panel.poll.tick_deadline);
        assert_eq!(panel.poll.poll_interval, Duration::from_secs(10));
        assert_eq!(panel.poll.degraded_interval, Duration::from_secs(60));
        assert_eq!(panel.poll.retry.max_attempts, 5);
        assert_eq!(panel.poll.area, 1);
    }

    #[test]
    fn plaintext_password_is_the_last_resort() {
        let profile = Profile {
            host: "panel".into(),
            password: Some("from-file".into()),
            ..Profile::default()
        };
        // Only meaningful when neither env nor keyring supply one.
        if std::env::var("VESTA_PASSWORD").is_err() {
            let secret = resolve_password(&profile, "vesta-test-no-such-profile").unwrap();
            assert_eq!(secret.expose_secret(), "from-file");
        }
    }

    #[test]
    fn invalid_durations_are_rejected() {
        let mut profile = Profile {
            host: "panel".into(),
            ..Profile::default()
        };
        profile.polling.interval = Some("soon".into());
        assert!(matches!(
            poll_settings(&profile),
            Err(ConfigError::Validation { field, .. }) if field == "polling.interval"
        ));

        profile.polling.interval = Some("3s".into());
        assert!(matches!(
            poll_settings(&profile),
            Err(ConfigError::Validation { field, .. }) if field == "polling.tick_deadline"
        ));

        profile.polling.interval = Some("0s".into());
        assert!(poll_settings(&profile).is_err());
    }

    #[test]
    fn timeout_must_fit_inside_the_tick_deadline() {
        let mut profile = Profile {
            host: "panel".into(),
            password: Some("x".into()),
            timeout: Some(4),
            ..Profile::default()
        };
        assert!(matches!(
            profile_to_panel_config(&profile, "vesta-test-no-such-profile", &Defaults::default()),
            Err(ConfigError::Validation { field, .. }) if field == "timeout"
        ));

        profile.timeout = Some(1);
        let panel =
            profile_to_panel_config(&profile, "vesta-test-no-such-profile", &Defaults::default())
                .unwrap();
        assert_eq!(panel.timeout, Duration::from_secs(1));

        profile.timeout = None;
        profile.polling.tick_deadline = Some("8s".into());
        profile.polling.interval = Some("10s".into());
        let panel =
            profile_to_panel_config(&profile, "vesta-test-no-such-profile", &Defaults::default())
                .unwrap();
        assert_eq!(panel.timeout, Duration::from_millis(2416) + Duration::from_nanos(666_666));
    }

    #[test]
    fn retries_that_overrun_the_deadline_are_rejected() {
        let mut profile = Profile {
            host: "panel".into(),
            password: Some("x".into()),
            ..Profile::default()
        };
        profile.polling.retry_attempts = Some(8);
        assert!(matches!(
            profile_to_panel_config(&profile, "vesta-test-no-such-profile", &Defaults::default()),
            Err(ConfigError::Validation { field, .. }) if field == "polling.retry_attempts"
        ));
    }

    #[test]
    fn empty_host_is_rejected() {
        let profile = Profile {
            password: Some("x".into()),
            ..Profile::default()
        };
        assert!(matches!(
            profile_to_panel_config(&profile, "default", &Defaults::default()),
            Err(ConfigError::Validation { field, .. }) if field == "host"
        ));
    }
}
