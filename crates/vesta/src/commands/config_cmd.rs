//! Config subcommand handlers.

use std::collections::BTreeMap;

use dialoguer::{Confirm, Input, Select};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use vesta_config::{Config, Defaults, Profile};
use vesta_core::Coordinator;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_secret(prompt: &str) -> Result<SecretString, CliError> {
    rpassword::prompt_password(prompt)
        .map(SecretString::from)
        .map_err(prompt_err)
}

/// `config show` view. Plaintext passwords never reach the serializer;
/// a profile that has one shows a mask instead.
#[derive(Serialize)]
struct ShownConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    default_profile: Option<String>,
    defaults: Defaults,
    profiles: BTreeMap<String, ShownProfile>,
}

#[derive(Serialize)]
struct ShownProfile {
    #[serde(flatten)]
    profile: Profile,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'static str>,
}

impl From<&Config> for ShownConfig {
    fn from(cfg: &Config) -> Self {
        let profiles = cfg
            .profiles
            .iter()
            .map(|(name, profile)| {
                let shown = ShownProfile {
                    password: profile.password.as_ref().map(|_| PASSWORD_MASK),
                    profile: Profile {
                        host: profile.host.clone(),
                        use_https: profile.use_https,
                        username: profile.username.clone(),
                        password: None,
                        password_env: profile.password_env.clone(),
                        verify_tls: profile.verify_tls,
                        timeout: profile.timeout,
                        polling: profile.polling.clone(),
                        area: profile.area,
                    },
                };
                (name.clone(), shown)
            })
            .collect();
        Self {
            default_profile: cfg.default_profile.clone(),
            defaults: cfg.defaults.clone(),
            profiles,
        }
    }
}

const PASSWORD_MASK: &str = "********";

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(global),

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = ShownConfig::from(&config::load(global)?);
            let out = output::render_single(
                global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_else(|e| format!("<unrenderable: {e}>")),
                |_| config::config_file(global).display().to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load(global)?;
            let default = config::active_profile_name(global, &cfg);
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: vesta config init");
            } else {
                for name in cfg.profiles.keys() {
                    let marker = if *name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        // ── Use <name> ─────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load(global)?;
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name,
                });
            }
            cfg.default_profile = Some(name.clone());
            config::save(global, &cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        // ── SetPassword ─────────────────────────────────────────────
        ConfigCommand::SetPassword { profile } => {
            let cfg = config::load(global)?;
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name: profile_name,
                });
            }

            let secret = prompt_secret("Panel password: ")?;
            if secret.expose_secret().is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "value cannot be empty".into(),
                });
            }
            vesta_config::store_password(&profile_name, &secret)?;
            eprintln!("✓ Password stored in system keyring for profile '{profile_name}'");
            Ok(())
        }

        // ── Test ────────────────────────────────────────────────────
        ConfigCommand::Test => {
            let (profile, panel) = config::panel_config(global)?;
            let host = panel.host.clone();
            let coordinator = Coordinator::from_config(&panel)?;
            let snapshot = coordinator.probe().await?;
            let color = output::should_color(global.color);
            eprintln!(
                "✓ Profile '{profile}' reached {host}; panel is {}",
                output::arm_mode(&snapshot.arm_mode, color)
            );
            Ok(())
        }
    }
}

// ── Init: interactive wizard ────────────────────────────────────────

fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_file(global);
    eprintln!("Vesta panel CLI: configuration wizard");
    eprintln!("   Config path: {}\n", path.display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let host: String = Input::new()
        .with_prompt("Panel host or IP")
        .default("192.168.1.1".into())
        .interact_text()
        .map_err(prompt_err)?;

    let use_https = Confirm::new()
        .with_prompt("Use HTTPS?")
        .default(false)
        .interact()
        .map_err(prompt_err)?;

    let username: String = Input::new()
        .with_prompt("Username")
        .default("admin".into())
        .interact_text()
        .map_err(prompt_err)?;

    let password = prompt_secret("Password: ")?;
    if password.expose_secret().is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "password cannot be empty".into(),
        });
    }

    let store_choices = &[
        "Store password in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let store_selection = Select::new()
        .with_prompt("Where to store the password?")
        .items(store_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    let password_field = password_field(&profile_name, &password, store_selection == 0)?;

    let mut cfg = config::load(global)?;
    cfg.profiles.insert(
        profile_name.clone(),
        Profile {
            host,
            use_https,
            username: Some(username),
            password: password_field,
            ..Profile::default()
        },
    );
    cfg.default_profile = Some(profile_name.clone());
    config::save(global, &cfg)?;

    eprintln!("\n✓ Configuration written to {}", path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Test it: vesta config test");
    Ok(())
}

/// Store the password in the keyring, or hand it back for the config file.
fn password_field(
    profile_name: &str,
    password: &SecretString,
    in_keyring: bool,
) -> Result<Option<String>, CliError> {
    if in_keyring {
        vesta_config::store_password(profile_name, password)?;
        eprintln!("   ✓ Password stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(password.expose_secret().to_owned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn show_never_prints_plaintext_passwords() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "home".into(),
            Profile {
                host: "panel.lan".into(),
                password: Some("hunter2".into()),
                ..Profile::default()
            },
        );
        cfg.profiles.insert(
            "cabin".into(),
            Profile {
                host: "cabin.lan".into(),
                password_env: Some("CABIN_PW".into()),
                ..Profile::default()
            },
        );
        let shown = ShownConfig::from(&cfg);
        assert_eq!(shown.profiles["home"].profile.password, None);

        let text = toml::to_string_pretty(&shown).unwrap();
        assert!(text.contains(r#"password = "********""#), "{text}");
        assert!(!text.contains("hunter2"), "{text}");

        let json = serde_json::to_value(&shown).unwrap();
        assert_eq!(json["profiles"]["home"]["password"], "********");
        assert_eq!(json["profiles"]["home"]["host"], "panel.lan");
        assert!(json["profiles"]["cabin"].get("password").is_none());
    }

    #[test]
    fn plaintext_choice_writes_the_prompted_password() {
        let secret = SecretString::from("1234".to_owned());
        assert_eq!(
            password_field("home", &secret, false).unwrap().as_deref(),
            Some("1234")
        );
        assert!(!format!("{secret:?}").contains("1234"));
    }
}
