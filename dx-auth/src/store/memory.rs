//! In-memory credential store
//!
//! Reference backend used by the server binary and the test suite. Each map
//! sits behind its own `RwLock`; every check-and-set happens inside a single
//! write-lock critical section.

use super::{
    AuthorizationCodeRecord, ClientRecord, CodeRedemption, CredentialStore, PurgeStats,
    RefreshRotation, StoreError, TokenKind, TokenRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct InMemoryCredentialStore {
    clients: Arc<RwLock<HashMap<String, ClientRecord>>>,
    codes: Arc<RwLock<HashMap<String, AuthorizationCodeRecord>>>,
    tokens: Arc<RwLock<HashMap<String, TokenRecord>>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Deactivate one token, returning whether it was active
fn deactivate(tokens: &mut HashMap<String, TokenRecord>, digest: &str) -> bool {
    match tokens.get_mut(digest) {
        Some(token) if token.is_active => {
            token.is_active = false;
            true
        }
        _ => false,
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn insert_client(&self, client: ClientRecord) -> Result<(), StoreError> {
        let mut clients = self.clients.write().await;
        match clients.entry(client.client_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::ClientExists(client.client_id)),
            Entry::Vacant(slot) => {
                slot.insert(client);
                Ok(())
            }
        }
    }

    async fn get_client(&self, client_id: &str) -> Result<ClientRecord, StoreError> {
        let clients = self.clients.read().await;
        clients
            .get(client_id)
            .cloned()
            .ok_or_else(|| StoreError::ClientNotFound(client_id.to_string()))
    }

    async fn set_client_active(&self, client_id: &str, active: bool) -> Result<(), StoreError> {
        let mut clients = self.clients.write().await;
        let client = clients
            .get_mut(client_id)
            .ok_or_else(|| StoreError::ClientNotFound(client_id.to_string()))?;
        client.is_active = active;
        client.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_code(&self, code: AuthorizationCodeRecord) -> Result<(), StoreError> {
        let mut codes = self.codes.write().await;
        codes.insert(code.code_digest.clone(), code);
        Ok(())
    }

    async fn consume_code(
        &self,
        code_digest: &str,
        redemption: CodeRedemption<'_>,
    ) -> Result<AuthorizationCodeRecord, StoreError> {
        let mut codes = self.codes.write().await;
        let code = codes.get_mut(code_digest).ok_or(StoreError::CodeNotFound)?;

        if code.used {
            return Err(StoreError::CodeAlreadyUsed);
        }
        if code.expires_at <= redemption.now {
            return Err(StoreError::CodeExpired);
        }
        if code.client_id != redemption.client_id {
            return Err(StoreError::CodeClientMismatch);
        }
        if code.redirect_uri != redemption.redirect_uri {
            return Err(StoreError::CodeRedirectMismatch);
        }

        code.used = true;
        Ok(code.clone())
    }

    async fn insert_tokens(
        &self,
        access: TokenRecord,
        refresh: Option<TokenRecord>,
    ) -> Result<(), StoreError> {
        let mut tokens = self.tokens.write().await;
        tokens.insert(access.token_digest.clone(), access);
        if let Some(refresh) = refresh {
            tokens.insert(refresh.token_digest.clone(), refresh);
        }
        Ok(())
    }

    async fn get_token(&self, token_digest: &str) -> Result<TokenRecord, StoreError> {
        let tokens = self.tokens.read().await;
        tokens
            .get(token_digest)
            .cloned()
            .ok_or(StoreError::TokenNotFound)
    }

    async fn rotate_refresh_token(
        &self,
        refresh_digest: &str,
        rotation: RefreshRotation<'_>,
        access: TokenRecord,
        refresh: TokenRecord,
    ) -> Result<TokenRecord, StoreError> {
        let mut tokens = self.tokens.write().await;
        let current = tokens
            .get(refresh_digest)
            .ok_or(StoreError::TokenNotFound)?;

        if current.kind != TokenKind::Refresh {
            return Err(StoreError::TokenKindMismatch);
        }
        if !current.is_active {
            return Err(StoreError::TokenInactive);
        }
        if current.is_expired_at(rotation.now) {
            return Err(StoreError::TokenExpired);
        }
        if current.client_id != rotation.client_id {
            return Err(StoreError::TokenClientMismatch);
        }

        let related = current.related_digest.clone();
        deactivate(&mut tokens, refresh_digest);
        if let Some(related) = related {
            deactivate(&mut tokens, &related);
        }

        let retired = tokens
            .get(refresh_digest)
            .cloned()
            .ok_or(StoreError::TokenNotFound)?;

        tokens.insert(access.token_digest.clone(), access);
        tokens.insert(refresh.token_digest.clone(), refresh);

        Ok(retired)
    }

    async fn deactivate_token(&self, token_digest: &str) -> Result<usize, StoreError> {
        let mut tokens = self.tokens.write().await;
        let related = tokens
            .get(token_digest)
            .ok_or(StoreError::TokenNotFound)?
            .related_digest
            .clone();

        let mut count = usize::from(deactivate(&mut tokens, token_digest));
        if let Some(related) = related {
            count += usize::from(deactivate(&mut tokens, &related));
        }
        Ok(count)
    }

    async fn deactivate_user_tokens(&self, user_id: &str) -> Result<usize, StoreError> {
        let mut tokens = self.tokens.write().await;
        let mut count = 0;
        for token in tokens.values_mut() {
            if token.user_id == user_id && token.is_active {
                token.is_active = false;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn deactivate_client_tokens(&self, client_id: &str) -> Result<usize, StoreError> {
        let mut tokens = self.tokens.write().await;
        let mut count = 0;
        for token in tokens.values_mut() {
            if token.client_id == client_id && token.is_active {
                token.is_active = false;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<PurgeStats, StoreError> {
        let mut stats = PurgeStats::default();

        {
            let mut codes = self.codes.write().await;
            let before = codes.len();
            codes.retain(|_, code| code.expires_at > now);
            stats.codes = before - codes.len();
        }

        {
            let mut tokens = self.tokens.write().await;
            let before = tokens.len();
            tokens.retain(|_, token| !token.is_expired_at(now));
            stats.tokens = before - tokens.len();
        }

        Ok(stats)
    }
}
