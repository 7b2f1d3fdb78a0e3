use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::accounts::Account;
use super::{LoginError, Result};
use crate::config::SessionConfig;

/// The state cookie is only sent to the third-party login routes.
const STATE_COOKIE_PATH: &str = "/api/auth/thirdparty";
const STATE_MAX_AGE_SECONDS: u64 = 600;

/// Data stored in the server-side session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
    /// Provider used to log in, `None` for local logins.
    pub provider: Option<String>,
    /// Unix timestamp when the session expires.
    pub expires_at: i64,
}

/// Server-side sessions keyed by a random id.
///
/// The cookie holds only the AES-256-GCM encrypted session id.
pub struct SessionManager {
    cipher: Aes256Gcm,
    store: Arc<RwLock<HashMap<String, SessionData>>>,
    cookie_name: String,
    cookie_domain: String,
    max_age_seconds: u64,
    secure: bool,
}

impl SessionManager {
    pub fn new(config: &SessionConfig) -> Self {
        // Derive a 256-bit key from the secret using SHA-256
        let key_bytes = Sha256::digest(config.secret.as_bytes());
        let cipher = Aes256Gcm::new(&key_bytes);

        Self {
            cipher,
            store: Arc::new(RwLock::new(HashMap::new())),
            cookie_name: config.cookie_name.clone(),
            cookie_domain: config.cookie_domain.clone(),
            max_age_seconds: config.max_age_seconds,
            secure: config.secure,
        }
    }

    /// Session data for a freshly authenticated account.
    pub fn session_for(&self, account: &Account, provider: Option<&str>) -> SessionData {
        SessionData {
            user_id: account.id,
            email: account.email.clone(),
            username: account.username.clone(),
            provider: provider.map(str::to_string),
            expires_at: chrono::Utc::now().timestamp() + self.max_age_seconds as i64,
        }
    }

    /// Extract and decrypt the session ID from request cookies.
    pub fn extract_session_id(&self, headers: &HeaderMap) -> Option<String> {
        let encoded = cookie_value(headers, &self.cookie_name)?;

        let payload = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        if payload.len() < 12 {
            return None;
        }

        let (nonce_bytes, ciphertext) = payload.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self.cipher.decrypt(nonce, ciphertext).ok()?;
        String::from_utf8(plaintext).ok()
    }

    /// Look up a live session by session ID.
    pub async fn get_session(&self, session_id: &str) -> Option<SessionData> {
        let now = chrono::Utc::now().timestamp();
        self.store
            .read()
            .await
            .get(session_id)
            .filter(|s| s.expires_at > now)
            .cloned()
    }

    /// Resolve the session carried by the request cookies.
    pub async fn current_session(&self, headers: &HeaderMap) -> Option<(String, SessionData)> {
        let id = self.extract_session_id(headers)?;
        let session = self.get_session(&id).await?;
        Some((id, session))
    }

    /// Store the data under a new session and return a Set-Cookie header value.
    pub async fn create_session(&self, data: SessionData) -> Result<String> {
        let session_id = Uuid::new_v4().to_string();
        tracing::debug!("Created session {} for user {}", session_id, data.user_id);
        self.store.write().await.insert(session_id.clone(), data);
        self.encrypt_cookie(&session_id)
    }

    pub async fn destroy_session(&self, session_id: &str) {
        self.store.write().await.remove(session_id);
    }

    /// Return a Set-Cookie header value that clears the session cookie.
    pub fn clear_cookie(&self) -> String {
        let cookie = format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", self.cookie_name);
        self.with_attributes(cookie)
    }

    /// Set-Cookie header value carrying the OAuth2 state nonce to the callback.
    pub fn state_cookie(&self, nonce: &str) -> String {
        let cookie = format!(
            "{}={}; HttpOnly; SameSite=Lax; Path={}; Max-Age={}",
            self.state_cookie_name(),
            nonce,
            STATE_COOKIE_PATH,
            STATE_MAX_AGE_SECONDS
        );
        self.with_attributes(cookie)
    }

    /// Nonce stored by [`Self::state_cookie`], if the browser sent it back.
    pub fn extract_state_nonce(&self, headers: &HeaderMap) -> Option<String> {
        cookie_value(headers, &self.state_cookie_name())
            .filter(|nonce| !nonce.is_empty())
            .map(str::to_string)
    }

    pub fn clear_state_cookie(&self) -> String {
        let cookie = format!(
            "{}=; HttpOnly; SameSite=Lax; Path={}; Max-Age=0",
            self.state_cookie_name(),
            STATE_COOKIE_PATH
        );
        self.with_attributes(cookie)
    }

    fn state_cookie_name(&self) -> String {
        format!("{}_oauth_state", self.cookie_name)
    }

    /// Start a background task to periodically clean up expired sessions.
    pub fn start_cleanup_task(&self, interval_secs: u64) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(tokio::time::Duration::from_secs(interval_secs)).await;
                let now = chrono::Utc::now().timestamp();
                let mut sessions = store.write().await;
                let before = sessions.len();
                sessions.retain(|_, s| s.expires_at > now);
                let removed = before - sessions.len();
                if removed > 0 {
                    tracing::debug!("Session cleanup: removed {} expired sessions", removed);
                }
            }
        });
    }

    fn encrypt_cookie(&self, session_id: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, session_id.as_bytes())
            .map_err(|e| LoginError::Session(format!("encrypt error: {}", e)))?;

        let mut payload = Vec::with_capacity(12 + ciphertext.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&ciphertext);
        let encoded = URL_SAFE_NO_PAD.encode(&payload);

        let cookie = format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
            self.cookie_name, encoded, self.max_age_seconds
        );
        Ok(self.with_attributes(cookie))
    }

    fn with_attributes(&self, mut cookie: String) -> String {
        if self.secure {
            cookie.push_str("; Secure");
        }
        if !self.cookie_domain.is_empty() {
            cookie.push_str(&format!("; Domain={}", self.cookie_domain));
        }
        cookie
    }
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}
