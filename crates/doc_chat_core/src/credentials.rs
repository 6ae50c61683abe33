//! crates/doc_chat_core/src/credentials.rs
//!
//! Tracks who is signed in and the bearer token that goes with them.
//! The token is always fetched fresh for the identity that was just observed;
//! it is never carried over from a previous identity.

use tracing::{error, info, warn};

use crate::domain::{Credentials, Identity, Phase, StatusMessage};
use crate::gateway::{with_timeout, Rejection};
use crate::ports::{PortError, PortResult};
use crate::session::Session;

impl Session {
    /// Mints a token for `identity`, bounded by the request timeout.
    async fn fetch_credentials(&self, identity: Identity) -> PortResult<Credentials> {
        let timeout = self.inner.config.request_timeout;
        let token = with_timeout(timeout, self.inner.identity.get_token(&identity)).await?;
        if token.is_empty() {
            return Err(PortError::Auth(
                "Identity provider returned an empty token".to_string(),
            ));
        }
        Ok(Credentials { identity, token })
    }

    /// Handles one notification from the identity subscription.
    pub(crate) async fn apply_identity(&self, change: Option<Identity>) {
        let Some(identity) = change else {
            self.update(|state, events| {
                if state.phase() != Phase::Anonymous {
                    info!("Identity provider reports no signed-in user");
                }
                state.sign_out(events);
            })
            .await;
            return;
        };

        let generation = self.inner.state.lock().await.generation();
        let uid = identity.uid.clone();
        let fetched = self.fetch_credentials(identity).await;

        self.update(|state, events| {
            // A logout raced the token fetch; the next notification decides.
            if state.generation() != generation {
                return;
            }
            match fetched {
                Ok(credentials) => state.install_credentials(credentials, events),
                Err(e) => {
                    warn!(uid = %uid, "Failed to refresh token: {}", e);
                    state.sign_out(events);
                    state.set_status(
                        StatusMessage::error(format!("Could not refresh credentials: {}", e)),
                        events,
                    );
                }
            }
        })
        .await;
    }

    /// Interactive sign-in. Only allowed while anonymous.
    ///
    /// A provider failure is reported as a status line and leaves the session
    /// anonymous; it is not retried.
    pub async fn login(&self) -> Result<(), Rejection> {
        let generation = {
            let state = self.inner.state.lock().await;
            if state.phase() != Phase::Anonymous {
                drop(state);
                return self.reject(Rejection::AlreadyAuthenticated).await;
            }
            state.generation()
        };

        let timeout = self.inner.config.request_timeout;
        let signed_in = match with_timeout(timeout, self.inner.identity.sign_in()).await {
            Ok(identity) => self.fetch_credentials(identity).await,
            Err(e) => Err(e),
        };

        self.update(|state, events| match signed_in {
            Ok(credentials) => {
                if state.generation() == generation && state.phase() == Phase::Anonymous {
                    info!(user = %credentials.identity.label(), "Signed in");
                    state.install_credentials(credentials, events);
                }
            }
            Err(e) => {
                error!("Login failed: {}", e);
                state.set_status(StatusMessage::error(format!("Login failed: {}", e)), events);
            }
        })
        .await;
        Ok(())
    }

    /// Signs out with the provider, then clears identity, token, document and
    /// transcript together. If the provider fails nothing local is cleared.
    pub async fn logout(&self) -> Result<(), Rejection> {
        if self.phase().await == Phase::Anonymous {
            return self.reject(Rejection::NotAuthenticated).await;
        }

        let timeout = self.inner.config.request_timeout;
        match with_timeout(timeout, self.inner.identity.sign_out()).await {
            Ok(()) => {
                self.update(|state, events| state.sign_out(events)).await;
                info!("Signed out");
            }
            Err(e) => {
                error!("Logout failed: {}", e);
                self.update(|state, events| {
                    state.set_status(StatusMessage::error(format!("Logout failed: {}", e)), events)
                })
                .await;
            }
        }
        Ok(())
    }
}
