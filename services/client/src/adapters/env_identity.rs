//! services/client/src/adapters/env_identity.rs
//!
//! An identity provider backed by a pre-issued ID token from the environment.
//! It implements the `IdentityProvider` port from the `core` crate, so the
//! terminal client can talk to a backend that verifies bearer tokens without
//! embedding an interactive sign-in flow.

use async_trait::async_trait;
use doc_chat_core::domain::{BearerToken, Identity};
use doc_chat_core::ports::{IdentityProvider, IdentityStream, PortError, PortResult};
use futures::StreamExt;
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use crate::config::IdentityConfig;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

pub struct EnvIdentityProvider {
    token: Option<String>,
    identity: Identity,
    current: watch::Sender<Option<Identity>>,
}

impl EnvIdentityProvider {
    /// Creates a signed-out provider. Without a configured `user_id` the user gets a
    /// random uid that stays stable for the life of the process.
    pub fn new(config: IdentityConfig) -> Self {
        let identity = Identity {
            uid: config
                .user_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            display_name: config.display_name,
            email: config.email,
            avatar_url: config.avatar_url,
        };
        let (current, _) = watch::channel(None);
        Self {
            token: config.id_token,
            identity,
            current,
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}

//=========================================================================================
// `IdentityProvider` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityProvider for EnvIdentityProvider {
    async fn sign_in(&self) -> PortResult<Identity> {
        if self.token.is_none() {
            return Err(PortError::Auth(
                "No ID token configured (set DOC_CHAT_ID_TOKEN)".to_string(),
            ));
        }
        info!(user = %self.identity.label(), "Signed in with configured token");
        self.current.send_replace(Some(self.identity.clone()));
        Ok(self.identity.clone())
    }

    async fn sign_out(&self) -> PortResult<()> {
        self.current.send_replace(None);
        Ok(())
    }

    async fn get_token(&self, identity: &Identity) -> PortResult<BearerToken> {
        match &self.token {
            Some(token) if identity.uid == self.identity.uid => Ok(BearerToken::new(token.clone())),
            Some(_) => Err(PortError::Auth(format!("Unknown user '{}'", identity.uid))),
            None => Err(PortError::Auth("No ID token configured".to_string())),
        }
    }

    /// Emits the current identity first, then every change.
    fn watch(&self) -> IdentityStream {
        let mut receiver = self.current.subscribe();
        let initial = receiver.borrow_and_update().clone();
        let changes = futures::stream::unfold(receiver, |mut receiver| async move {
            receiver.changed().await.ok()?;
            let next = receiver.borrow_and_update().clone();
            Some((next, receiver))
        });
        futures::stream::once(async move { initial })
            .chain(changes)
            .boxed()
    }
}
