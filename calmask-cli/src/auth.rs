//! Microsoft identity platform authentication.
//!
//! Uses the OAuth2 device-code flow so the tool can run on headless
//! machines: `calmask auth` prints a code, the user signs in once in a
//! browser, and every later run refreshes silently from the cached
//! refresh token.

use anyhow::{Context, Result};
use calmask_core::CalMaskError;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::time::Duration as StdDuration;

use crate::config::{self, AuthConfig, Tokens};

pub const SCOPES: &str = "offline_access https://graph.microsoft.com/Calendars.ReadWrite";

fn authority(tenant: &str) -> String {
    format!("https://login.microsoftonline.com/{tenant}/oauth2/v2.0")
}

#[derive(Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    /// Polling interval in seconds
    interval: u64,
    expires_in: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    expires_in: i64,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TokenResult {
    Granted(Box<TokenResponse>),
    Denied(TokenErrorResponse),
}

/// Run the interactive device-code flow and cache the tokens.
pub async fn device_code_login(auth: &AuthConfig) -> Result<()> {
    let http = reqwest::Client::new();

    let device: DeviceCodeResponse = http
        .post(format!("{}/devicecode", authority(&auth.tenant)))
        .form(&[("client_id", auth.client_id.as_str()), ("scope", SCOPES)])
        .send()
        .await
        .context("Failed to reach the Microsoft identity service")?
        .error_for_status()
        .context("Device authorization request was rejected")?
        .json()
        .await
        .context("Unexpected device authorization response")?;

    println!(
        "To sign in, visit {} and enter the code: {}",
        device.verification_uri, device.user_code
    );
    let _ = open::that(&device.verification_uri);

    let deadline = Utc::now() + Duration::seconds(device.expires_in);
    let mut interval = device.interval.max(1);

    loop {
        if Utc::now() >= deadline {
            anyhow::bail!("Sign-in timed out. Run `calmask auth` to try again.");
        }
        tokio::time::sleep(StdDuration::from_secs(interval)).await;

        let result: TokenResult = http
            .post(format!("{}/token", authority(&auth.tenant)))
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
                ("client_id", auth.client_id.as_str()),
                ("device_code", device.device_code.as_str()),
            ])
            .send()
            .await
            .context("Failed to reach the Microsoft identity service")?
            .json()
            .await
            .context("Unexpected token response")?;

        match result {
            TokenResult::Granted(token) => {
                config::save_tokens(&to_cached_tokens(*token, None))?;
                return Ok(());
            }
            TokenResult::Denied(denied) => match denied.error.as_str() {
                "authorization_pending" => continue,
                "slow_down" => {
                    interval += 5;
                    continue;
                }
                _ => anyhow::bail!(
                    "Sign-in failed: {}",
                    denied.error_description.unwrap_or(denied.error)
                ),
            },
        }
    }
}

/// Get a valid access token, refreshing silently if the cached one has
/// expired.
pub async fn get_access_token(auth: &AuthConfig) -> Result<String> {
    let Some(tokens) = config::load_tokens()? else {
        return Err(CalMaskError::AuthRequired.into());
    };

    if !tokens_need_refresh(&tokens) {
        return Ok(tokens.access_token);
    }

    let refreshed = refresh_tokens(auth, &tokens).await?;
    config::save_tokens(&refreshed)?;
    Ok(refreshed.access_token)
}

/// A token within a minute of expiry counts as expired.
fn tokens_need_refresh(tokens: &Tokens) -> bool {
    match tokens.expires_at {
        Some(expires_at) => expires_at <= Utc::now() + Duration::seconds(60),
        None => true,
    }
}

async fn refresh_tokens(auth: &AuthConfig, tokens: &Tokens) -> Result<Tokens> {
    let http = reqwest::Client::new();

    let result: TokenResult = http
        .post(format!("{}/token", authority(&auth.tenant)))
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", auth.client_id.as_str()),
            ("refresh_token", tokens.refresh_token.as_str()),
            ("scope", SCOPES),
        ])
        .send()
        .await
        .context("Failed to reach the Microsoft identity service")?
        .json()
        .await
        .context("Unexpected token response")?;

    match result {
        TokenResult::Granted(token) => Ok(to_cached_tokens(
            *token,
            Some(tokens.refresh_token.clone()),
        )),
        TokenResult::Denied(denied) => Err(CalMaskError::AuthExpired(
            denied.error_description.unwrap_or(denied.error),
        )
        .into()),
    }
}

fn to_cached_tokens(token: TokenResponse, previous_refresh: Option<String>) -> Tokens {
    let expires_at = if token.expires_in > 0 {
        Some(Utc::now() + Duration::seconds(token.expires_in))
    } else {
        None
    };

    // The identity service does not always return a new refresh token
    let refresh_token = if token.refresh_token.is_empty() {
        previous_refresh.unwrap_or_default()
    } else {
        token.refresh_token
    };

    Tokens {
        access_token: token.access_token,
        refresh_token,
        expires_at,
    }
}
