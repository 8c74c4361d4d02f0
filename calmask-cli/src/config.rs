use anyhow::{Context, Result};
use calmask_core::AvailabilitySchedule;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration at ~/.config/calmask/config.toml
#[derive(Debug, Deserialize)]
pub struct Config {
    /// URL of the personal calendar feed (.ics)
    pub feed_url: String,

    /// Timezone the availability schedule is expressed in
    pub timezone: Tz,

    /// How many days forward from now to sync
    #[serde(default = "default_sync_days")]
    pub sync_days: i64,

    /// Subject for busy blocks created in the work calendar
    #[serde(default = "default_subject")]
    pub subject: String,

    /// Rounding precision (minutes) for fingerprint identities of
    /// events without a usable UID
    #[serde(default = "default_rounding_minutes")]
    pub fingerprint_rounding_minutes: i64,

    /// Microsoft identity settings
    pub auth: AuthConfig,

    /// Weekly availability windows; days without entries sync nothing
    #[serde(default)]
    pub availability: AvailabilitySchedule,
}

#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    pub client_id: String,

    /// Azure AD tenant, "common" for personal + work accounts
    #[serde(default = "default_tenant")]
    pub tenant: String,
}

fn default_sync_days() -> i64 {
    30
}

fn default_subject() -> String {
    "Personal Commitment".to_string()
}

fn default_rounding_minutes() -> i64 {
    5
}

fn default_tenant() -> String {
    "common".to_string()
}

/// Cached tokens for the Microsoft identity platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Get the config directory path (~/.config/calmask)
pub fn config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Could not determine config directory")?
        .join("calmask");
    Ok(config_dir)
}

/// Get the config file path (~/.config/calmask/config.toml)
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Get the tokens file path (~/.config/calmask/tokens.json)
pub fn tokens_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("tokens.json"))
}

/// Get the state store path (~/.config/calmask/state.json)
pub fn state_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("state.json"))
}

/// Load config from ~/.config/calmask/config.toml
pub fn load_config() -> Result<Config> {
    let path = config_path()?;

    if !path.exists() {
        anyhow::bail!(
            "Config file not found at {}\n\n\
            Create it with your feed URL and app registration:\n\n\
            feed_url = \"https://example.com/personal.ics\"\n\
            timezone = \"Europe/Helsinki\"\n\n\
            [auth]\n\
            client_id = \"your-azure-app-client-id\"\n\n\
            [availability]\n\
            monday = [{{ start = \"09:00\", end = \"17:00\" }}]",
            path.display()
        );
    }

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;

    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

    Ok(config)
}

/// Load cached tokens, None if the user never signed in
pub fn load_tokens() -> Result<Option<Tokens>> {
    let path = tokens_path()?;

    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read tokens file at {}", path.display()))?;

    let tokens: Tokens = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse tokens file at {}", path.display()))?;

    Ok(Some(tokens))
}

/// Save tokens to ~/.config/calmask/tokens.json
pub fn save_tokens(tokens: &Tokens) -> Result<()> {
    let path = tokens_path()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory at {}", parent.display()))?;
    }

    let contents = serde_json::to_string_pretty(tokens).context("Failed to serialize tokens")?;

    std::fs::write(&path, contents)
        .with_context(|| format!("Failed to write tokens file at {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            feed_url = "https://example.com/personal.ics"
            timezone = "Europe/Helsinki"
            sync_days = 14
            subject = "Blocked"

            [auth]
            client_id = "abc-123"
            tenant = "consumers"

            [availability]
            monday = [
                { start = "09:00", end = "17:00" },
                { start = "21:00", end = "23:00" },
            ]
            tuesday = [{ start = "09:00", end = "12:00" }]
            "#,
        )
        .unwrap();

        assert_eq!(config.sync_days, 14);
        assert_eq!(config.subject, "Blocked");
        assert_eq!(config.timezone, chrono_tz::Europe::Helsinki);
        assert_eq!(config.auth.tenant, "consumers");
        assert_eq!(config.availability.monday.len(), 2);
        assert!(config.availability.saturday.is_empty());
    }

    #[test]
    fn test_defaults_apply() {
        let config: Config = toml::from_str(
            r#"
            feed_url = "https://example.com/personal.ics"
            timezone = "UTC"

            [auth]
            client_id = "abc-123"
            "#,
        )
        .unwrap();

        assert_eq!(config.sync_days, 30);
        assert_eq!(config.subject, "Personal Commitment");
        assert_eq!(config.fingerprint_rounding_minutes, 5);
        assert_eq!(config.auth.tenant, "common");
    }
}
