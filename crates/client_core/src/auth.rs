use std::sync::Arc;

use anyhow::{Context, Result};
use shared::domain::{AuthTokens, UserProfile};
use storage::{SessionStore, REFRESH_KEY, TOKEN_KEY, USER_KEY};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// The signed-in session as held in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthSession {
    pub token: Option<String>,
    pub refresh: Option<String>,
    pub user: Option<UserProfile>,
}

impl AuthSession {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// Session state mirrored into a [`SessionStore`] under the `token`,
/// `refresh` and `user` keys.
#[derive(Clone)]
pub struct AuthState {
    session: Arc<RwLock<AuthSession>>,
    store: Arc<dyn SessionStore>,
}

impl AuthState {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            session: Arc::new(RwLock::new(AuthSession::default())),
            store,
        }
    }

    pub async fn session(&self) -> AuthSession {
        self.session.read().await.clone()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.session.read().await.token.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.read().await.is_authenticated()
    }

    /// Installs a fresh login and persists all three keys. If any write
    /// fails the stored session is cleared, so storage never pairs a new
    /// token with an older user.
    pub async fn set_auth(&self, user: UserProfile, tokens: AuthTokens) -> Result<()> {
        let user_json = serde_json::to_string(&user).context("failed to encode user profile")?;
        if let Err(err) = self.persist(&user_json, &tokens).await {
            for key in [TOKEN_KEY, REFRESH_KEY, USER_KEY] {
                if let Err(cleanup) = self.store.remove(key).await {
                    warn!(key, "failed to clear partial session: {cleanup:#}");
                }
            }
            return Err(err);
        }

        let mut session = self.session.write().await;
        info!(email = %user.email, "session established");
        *session = AuthSession {
            token: Some(tokens.access),
            refresh: Some(tokens.refresh),
            user: Some(user),
        };
        Ok(())
    }

    /// The token goes last: without it a stored session does not count as
    /// signed in.
    async fn persist(&self, user_json: &str, tokens: &AuthTokens) -> Result<()> {
        self.store.set(USER_KEY, user_json).await?;
        self.store.set(REFRESH_KEY, &tokens.refresh).await?;
        self.store.set(TOKEN_KEY, &tokens.access).await?;
        Ok(())
    }

    /// Clears memory first so the session is gone even if storage fails.
    pub async fn logout(&self) -> Result<()> {
        *self.session.write().await = AuthSession::default();
        for key in [TOKEN_KEY, REFRESH_KEY, USER_KEY] {
            self.store.remove(key).await?;
        }
        info!("session cleared");
        Ok(())
    }

    /// Restores whatever keys are present. A stored user that no longer
    /// parses is dropped rather than failing startup.
    pub async fn load_from_storage(&self) -> Result<AuthSession> {
        let token = self.store.get(TOKEN_KEY).await?;
        let refresh = self.store.get(REFRESH_KEY).await?;
        let user = match self.store.get(USER_KEY).await? {
            Some(raw) => match serde_json::from_str::<UserProfile>(&raw) {
                Ok(user) => Some(user),
                Err(err) => {
                    warn!("ignoring unreadable stored user: {err}");
                    None
                }
            },
            None => None,
        };

        let restored = AuthSession {
            token,
            refresh,
            user,
        };
        *self.session.write().await = restored.clone();
        Ok(restored)
    }
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
