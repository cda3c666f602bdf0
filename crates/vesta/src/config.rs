//! Bridges `vesta-config` profiles and the global CLI flags.
//!
//! Precedence: flag > env > profile > built-in default.

use std::path::PathBuf;

use tracing::debug;

use vesta_config::{Config, Profile};
use vesta_core::PanelConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Config file selected by `--config` / `VESTA_CONFIG`, else the
/// platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(vesta_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(vesta_config::load_config_from(&config_file(global))?)
}

pub fn save(global: &GlobalOpts, cfg: &Config) -> Result<(), CliError> {
    Ok(vesta_config::save_config_to(cfg, &config_file(global))?)
}

/// Profile name: `--profile`, else the config's default, else "default".
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

pub fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Lay the global flags over a profile.
fn apply_overrides(mut profile: Profile, global: &GlobalOpts) -> Profile {
    if let Some(host) = &global.host {
        profile.host.clone_from(host);
    }
    if let Some(username) = &global.username {
        profile.username = Some(username.clone());
    }
    if global.https {
        profile.use_https = true;
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
    profile
}

/// Build a `PanelConfig` from the config file, profile, and CLI overrides.
///
/// Returns the profile name alongside for error messages.
pub fn panel_config(global: &GlobalOpts) -> Result<(String, PanelConfig), CliError> {
    let cfg = load(global)?;
    let name = active_profile_name(global, &cfg);

    let profile = match cfg.profiles.get(&name) {
        Some(profile) => apply_overrides(profile.clone(), global),
        // No profile: flags and env alone must name the panel.
        None if global.host.is_some() => apply_overrides(Profile::default(), global),
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                available: available_profiles(&cfg),
                name,
            });
        }
        None => {
            return Err(CliError::NoConfig {
                path: config_file(global).display().to_string(),
            });
        }
    };

    debug!(profile = %name, host = %profile.host, "resolved panel profile");
    let panel = vesta_config::profile_to_panel_config(&profile, &name, &cfg.defaults)?;
    Ok((name, panel))
}
