use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{LoginError, Result};

/// A local user account, optionally linked to external identities.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub identities: Vec<Identity>,
    pub created_at: DateTime<Utc>,
}

/// An external profile linked to an account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    pub provider: String,
    pub external_id: String,
    pub username: Option<String>,
    pub linked_at: DateTime<Utc>,
}

/// Profile returned by a third-party provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalProfile {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, alias = "displayName")]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub emails: Vec<ProfileEmail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileEmail {
    pub value: String,
}

impl ExternalProfile {
    pub fn primary_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .or_else(|| self.emails.first().map(|e| e.value.as_str()))
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

#[derive(Debug, Default)]
pub struct AccountStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a local account. Emails are unique, compared case-insensitively.
    pub async fn signup(
        &self,
        name: &str,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Account> {
        let password_hash = hash_password(password)?;

        let mut accounts = self.accounts.write().await;
        if accounts.values().any(|a| same_email(&a.email, email)) {
            return Err(LoginError::DuplicateEmail(email.to_string()));
        }

        let account = Account {
            id: Uuid::new_v4(),
            name: name.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: Some(password_hash),
            identities: Vec::new(),
            created_at: Utc::now(),
        };
        accounts.insert(account.id, account.clone());
        tracing::info!("Signed up user {} ({})", account.id, account.email);
        Ok(account)
    }

    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<Account> {
        let account = self
            .find_by_email(email)
            .await
            .ok_or(LoginError::InvalidCredentials)?;

        // Accounts created through a provider have no local password
        let hash = account
            .password_hash
            .as_deref()
            .ok_or(LoginError::InvalidCredentials)?;

        if verify_password(password, hash)? {
            Ok(account)
        } else {
            Err(LoginError::InvalidCredentials)
        }
    }

    /// Find the account for an external profile, linking or creating one as needed.
    ///
    /// An already linked identity wins. Otherwise the profile is linked to the
    /// account with the same email, or a new account is created for it.
    pub async fn link_or_create(
        &self,
        provider: &str,
        profile: &ExternalProfile,
    ) -> Result<Account> {
        let mut accounts = self.accounts.write().await;

        if let Some(account) = accounts.values().find(|a| {
            a.identities
                .iter()
                .any(|i| i.provider == provider && i.external_id == profile.id)
        }) {
            tracing::debug!("Profile {}:{} already linked to {}", provider, profile.id, account.id);
            return Ok(account.clone());
        }

        let identity = Identity {
            provider: provider.to_string(),
            external_id: profile.id.clone(),
            username: profile.username.clone(),
            linked_at: Utc::now(),
        };

        let email = profile.primary_email();
        if let Some(email) = email {
            if let Some(account) = accounts.values_mut().find(|a| same_email(&a.email, email)) {
                tracing::info!("Linked {}:{} to user {}", provider, profile.id, account.id);
                account.identities.push(identity);
                return Ok(account.clone());
            }
        }

        let username = profile
            .username
            .clone()
            .unwrap_or_else(|| format!("{}-{}", provider, profile.id));
        let account = Account {
            id: Uuid::new_v4(),
            name: profile.name.clone().unwrap_or_else(|| username.clone()),
            username,
            email: email.unwrap_or_default().to_string(),
            password_hash: None,
            identities: vec![identity],
            created_at: Utc::now(),
        };
        accounts.insert(account.id, account.clone());
        tracing::info!("Created user {} from {} profile {}", account.id, provider, profile.id);
        Ok(account)
    }

    pub async fn get(&self, id: Uuid) -> Option<Account> {
        self.accounts.read().await.get(&id).cloned()
    }

    pub async fn find_by_email(&self, email: &str) -> Option<Account> {
        self.accounts
            .read()
            .await
            .values()
            .find(|a| same_email(&a.email, email))
            .cloned()
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }
}

fn same_email(a: &str, b: &str) -> bool {
    !a.is_empty() && a.eq_ignore_ascii_case(b)
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| LoginError::PasswordHash(e.to_string()))
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| LoginError::PasswordHash(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(LoginError::PasswordHash(e.to_string())),
    }
}
