use async_trait::async_trait;
use storage::MemoryStore;

use super::*;

/// Session storage whose writes to one key always fail.
struct FailingKey {
    inner: MemoryStore,
    broken: &'static str,
}

#[async_trait]
impl SessionStore for FailingKey {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if key == self.broken {
            anyhow::bail!("disk full while writing '{key}'");
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key).await
    }
}

fn admin() -> UserProfile {
    serde_json::from_str(r#"{"id": 1, "email": "admin@school.edu", "user_type": "admin"}"#)
        .expect("profile")
}

fn tokens() -> AuthTokens {
    AuthTokens {
        access: "acc-1".into(),
        refresh: "ref-1".into(),
    }
}

#[tokio::test]
async fn set_auth_persists_all_three_keys() {
    let store = Arc::new(MemoryStore::new());
    let auth = AuthState::new(store.clone());

    auth.set_auth(admin(), tokens()).await.expect("set auth");

    assert!(auth.is_authenticated().await);
    assert_eq!(auth.access_token().await.as_deref(), Some("acc-1"));
    assert_eq!(store.get(TOKEN_KEY).await.expect("get").as_deref(), Some("acc-1"));
    assert_eq!(store.get(REFRESH_KEY).await.expect("get").as_deref(), Some("ref-1"));
    let stored_user: UserProfile =
        serde_json::from_str(&store.get(USER_KEY).await.expect("get").expect("user")).expect("json");
    assert!(stored_user.is_admin());
}

#[tokio::test]
async fn logout_clears_memory_and_storage() {
    let store = Arc::new(MemoryStore::new());
    let auth = AuthState::new(store.clone());
    auth.set_auth(admin(), tokens()).await.expect("set auth");

    auth.logout().await.expect("logout");

    assert_eq!(auth.session().await, AuthSession::default());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn load_restores_a_previous_session() {
    let first = Arc::new(MemoryStore::new());
    AuthState::new(first.clone())
        .set_auth(admin(), tokens())
        .await
        .expect("set auth");

    let reloaded = AuthState::new(first);
    assert!(!reloaded.is_authenticated().await);
    let session = reloaded.load_from_storage().await.expect("load");
    assert_eq!(session.token.as_deref(), Some("acc-1"));
    assert_eq!(session.user.map(|u| u.email), Some("admin@school.edu".to_string()));
    assert!(reloaded.is_authenticated().await);
}

#[tokio::test]
async fn unreadable_stored_user_is_ignored() {
    let store = Arc::new(MemoryStore::with_entries([
        (TOKEN_KEY, "acc"),
        (USER_KEY, "{not json"),
    ]));
    let auth = AuthState::new(store);
    let session = auth.load_from_storage().await.expect("load");
    assert_eq!(session.token.as_deref(), Some("acc"));
    assert_eq!(session.refresh, None);
    assert_eq!(session.user, None);
}

#[tokio::test]
async fn failed_write_leaves_no_mixed_session_behind() {
    let store = Arc::new(FailingKey {
        inner: MemoryStore::with_entries([
            (TOKEN_KEY, "old-token"),
            (REFRESH_KEY, "old-refresh"),
            (USER_KEY, r#"{"email": "previous@school.edu"}"#),
        ]),
        broken: TOKEN_KEY,
    });
    let auth = AuthState::new(store.clone());

    let err = auth.set_auth(admin(), tokens()).await.expect_err("token write fails");
    assert!(err.to_string().contains("disk full"));
    assert!(!auth.is_authenticated().await);
    assert!(store.inner.is_empty().await);

    let session = AuthState::new(store).load_from_storage().await.expect("load");
    assert_eq!(session, AuthSession::default());
}
