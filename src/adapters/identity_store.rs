//! In-memory identity store seeded from configuration.
//!
//! Seeded accounts and API keys are immutable after construction. Sessions
//! and keys issued at runtime live in `scc` maps so concurrent requests never
//! contend on a single lock.
use std::{collections::HashMap as StdHashMap, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eyre::{Result, WrapErr};
use scc::HashMap;

use crate::{
    config::models::{AccountConfig, ServerConfig},
    core::identity::{ApiPrincipal, SessionUser},
    ports::identity_store::{
        ApiKeyStore, CredentialVerifier, IdentityStoreError, IdentityStoreResult, SessionStore,
    },
};

#[derive(Debug, Clone)]
struct Session {
    account_id: String,
    expires_at: DateTime<Utc>,
}

/// Development identity store backed by configuration.
pub struct MemoryIdentityStore {
    accounts: StdHashMap<String, AccountConfig>,
    seeded_keys: StdHashMap<String, ApiPrincipal>,
    issued_keys: HashMap<String, ApiPrincipal>,
    sessions: HashMap<String, Session>,
    session_ttl: chrono::Duration,
}

impl MemoryIdentityStore {
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let ttl: Duration = humantime::parse_duration(&config.auth.session_ttl)
            .wrap_err_with(|| format!("Invalid auth.session_ttl '{}'", config.auth.session_ttl))?;
        let session_ttl =
            chrono::Duration::from_std(ttl).wrap_err("auth.session_ttl is out of range")?;

        let accounts = config
            .accounts
            .iter()
            .map(|account| (account.id.clone(), account.clone()))
            .collect();
        let seeded_keys = config
            .api_keys
            .iter()
            .map(|key| {
                (
                    key.key.clone(),
                    ApiPrincipal {
                        key_id: key.key_id.clone(),
                        owner_id: key.owner_id.clone(),
                        revoked: key.revoked,
                    },
                )
            })
            .collect();

        Ok(Self {
            accounts,
            seeded_keys,
            issued_keys: HashMap::new(),
            sessions: HashMap::new(),
            session_ttl,
        })
    }

    /// Drop every session whose expiry is at or before `now`.
    async fn purge_expired(&self, now: DateTime<Utc>) {
        let mut purged = 0usize;
        self.sessions
            .retain_async(|_, session| {
                let live = session.expires_at > now;
                if !live {
                    purged += 1;
                }
                live
            })
            .await;
        if purged > 0 {
            tracing::debug!(purged, "Purged expired sessions");
        }
    }

    fn account_by_email(&self, email: &str) -> Option<&AccountConfig> {
        self.accounts
            .values()
            .find(|account| account.email.eq_ignore_ascii_case(email))
    }
}

#[async_trait]
impl SessionStore for MemoryIdentityStore {
    async fn lookup_session(&self, token: &str) -> IdentityStoreResult<Option<SessionUser>> {
        let Some(session) = self.sessions.read_async(token, |_, s| s.clone()).await else {
            return Ok(None);
        };

        if session.expires_at <= Utc::now() {
            let _ = self.sessions.remove_async(token).await;
            tracing::debug!(account = %session.account_id, "Session expired");
            return Ok(None);
        }

        // The account may have been removed since the session was opened.
        Ok(self
            .accounts
            .get(&session.account_id)
            .map(AccountConfig::user))
    }

    async fn create_session(&self, user: &SessionUser) -> IdentityStoreResult<String> {
        if !self.accounts.contains_key(&user.id) {
            return Err(IdentityStoreError::UnknownAccount(user.id.clone()));
        }

        let now = Utc::now();
        self.purge_expired(now).await;

        let token = uuid::Uuid::new_v4().simple().to_string();
        let session = Session {
            account_id: user.id.clone(),
            expires_at: now + self.session_ttl,
        };
        self.sessions
            .insert_async(token.clone(), session)
            .await
            .map_err(|_| IdentityStoreError::Unavailable("session token collision".to_string()))?;
        Ok(token)
    }

    async fn revoke_session(&self, token: &str) -> IdentityStoreResult<bool> {
        Ok(self.sessions.remove_async(token).await.is_some())
    }
}

#[async_trait]
impl ApiKeyStore for MemoryIdentityStore {
    async fn lookup_key(&self, key: &str) -> IdentityStoreResult<Option<ApiPrincipal>> {
        if let Some(principal) = self.seeded_keys.get(key) {
            return Ok(Some(principal.clone()));
        }
        Ok(self.issued_keys.read_async(key, |_, p| p.clone()).await)
    }

    async fn issue_key(
        &self,
        owner: &SessionUser,
    ) -> IdentityStoreResult<(String, ApiPrincipal)> {
        if !self.accounts.contains_key(&owner.id) {
            return Err(IdentityStoreError::UnknownAccount(owner.id.clone()));
        }

        let secret = format!("nado_{}", uuid::Uuid::new_v4().simple());
        let principal = ApiPrincipal {
            key_id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner.id.clone(),
            revoked: false,
        };
        self.issued_keys
            .insert_async(secret.clone(), principal.clone())
            .await
            .map_err(|_| IdentityStoreError::Unavailable("API key collision".to_string()))?;

        tracing::info!(key_id = %principal.key_id, owner = %owner.id, "Issued API key");
        Ok((secret, principal))
    }
}

#[async_trait]
impl CredentialVerifier for MemoryIdentityStore {
    async fn verify_password(
        &self,
        email: &str,
        password: &str,
    ) -> IdentityStoreResult<Option<SessionUser>> {
        Ok(self
            .account_by_email(email)
            .filter(|account| account.password == password)
            .map(AccountConfig::user))
    }
}
