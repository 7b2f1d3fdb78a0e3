use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use serde::Deserialize;

use super::accounts::ExternalProfile;
use super::{LoginError, Result};
use crate::config::ProviderConfig;

/// Token endpoint response. Only the access token is used to fetch the profile.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// Authorization-code client for one third-party provider.
pub struct OAuth2Client {
    name: String,
    config: ProviderConfig,
    http_client: reqwest::Client,
}

impl OAuth2Client {
    pub fn new(name: &str, config: ProviderConfig, http_client: reqwest::Client) -> Self {
        Self {
            name: name.to_string(),
            config,
            http_client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// URL of the provider's authorization dialog.
    pub fn authorization_url(&self, state: &str) -> String {
        let separator = if self.config.authorization_url.contains('?') { '&' } else { '?' };
        let mut url = format!(
            "{}{}response_type=code&client_id={}&redirect_uri={}",
            self.config.authorization_url,
            separator,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.callback_url),
        );
        if !self.config.scope.is_empty() {
            url.push_str(&format!("&scope={}", urlencoding::encode(&self.config.scope)));
        }
        url.push_str(&format!("&state={}", urlencoding::encode(state)));
        url
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.config.callback_url),
            ("client_id", &self.config.client_id),
            ("client_secret", &self.config.client_secret),
        ];

        let resp = self
            .http_client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| LoginError::OAuth(format!("Token exchange request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(LoginError::OAuth(format!(
                "Token exchange failed ({}): {}",
                status, body
            )));
        }

        resp.json::<TokenResponse>()
            .await
            .map_err(|e| LoginError::OAuth(format!("Token exchange parse error: {}", e)))
    }

    /// Fetch the user's profile with an access token.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<ExternalProfile> {
        let resp = self
            .http_client
            .get(&self.config.profile_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| LoginError::OAuth(format!("Profile request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(LoginError::OAuth(format!(
                "Profile request returned {}",
                resp.status()
            )));
        }

        resp.json::<ExternalProfile>()
            .await
            .map_err(|e| LoginError::OAuth(format!("Profile parse error: {}", e)))
    }
}

/// Encode the post-login redirect into a state parameter.
pub fn encode_state(redirect_url: &str) -> String {
    let mut nonce = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce);
    let nonce_b64 = URL_SAFE_NO_PAD.encode(nonce);

    // Format: nonce:base64(redirect_url)
    let redirect_b64 = URL_SAFE_NO_PAD.encode(redirect_url.as_bytes());
    format!("{}:{}", nonce_b64, redirect_b64)
}

/// Nonce part of a state parameter.
///
/// The login route stores it in a cookie and the callback only accepts a
/// state that carries the same nonce.
pub fn state_nonce(state: &str) -> Option<&str> {
    state
        .split_once(':')
        .map(|(nonce, _)| nonce)
        .filter(|nonce| !nonce.is_empty())
}

/// Decode the redirect from a state parameter.
///
/// Only local paths are accepted; anything else yields `fallback`.
pub fn decode_state(state: &str, fallback: &str) -> String {
    state
        .split_once(':')
        .and_then(|(_nonce, redirect_b64)| URL_SAFE_NO_PAD.decode(redirect_b64).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .filter(|url| url.starts_with('/') && !url.starts_with("//"))
        .unwrap_or_else(|| fallback.to_string())
}
