//! Authentication state shared by the remote-backed ledgers.
//!
//! Signing in and out is done elsewhere; this module only tracks who is
//! signed in and tells interested ledgers when that changes.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use loom_co_core::UserId;

/// A signed-in customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: String,
}

/// Current user, observable through a watch channel.
#[derive(Debug, Clone)]
pub struct AuthState {
    sender: Arc<watch::Sender<Option<AuthUser>>>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthState {
    /// Signed-out state.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// State with `user` already signed in.
    #[must_use]
    pub fn signed_in(user: AuthUser) -> Self {
        let state = Self::new();
        state.sender.send_replace(Some(user));
        state
    }

    #[must_use]
    pub fn current(&self) -> Option<AuthUser> {
        self.sender.borrow().clone()
    }

    #[must_use]
    pub fn current_user_id(&self) -> Option<UserId> {
        self.sender.borrow().as_ref().map(|u| u.id.clone())
    }

    pub fn sign_in(&self, user: AuthUser) {
        info!(user_id = %user.id, "Signed in");
        self.sender.send_replace(Some(user));
    }

    pub fn sign_out(&self) {
        if let Some(previous) = self.sender.send_replace(None) {
            info!(user_id = %previous.id, "Signed out");
        }
    }

    /// Receiver notified on every sign-in and sign-out.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<AuthUser>> {
        self.sender.subscribe()
    }
}

/// A ledger whose contents depend on who is signed in.
#[async_trait]
pub trait AuthAware: Send + Sync {
    /// Called with the new user (`None` after sign-out).
    async fn on_auth_change(&self, user: Option<AuthUser>);
}

/// Forward every auth change to `ledger` until the auth state is dropped.
pub fn follow_auth<T>(ledger: Arc<T>, auth: &AuthState) -> JoinHandle<()>
where
    T: AuthAware + ?Sized + 'static,
{
    follow_auth_changes(ledger, auth.subscribe())
}

/// Forward changes not yet seen by `receiver` to `ledger`.
///
/// A change made before this call but after the receiver last saw a value
/// is forwarded straight away.
pub fn follow_auth_changes<T>(
    ledger: Arc<T>,
    mut receiver: watch::Receiver<Option<AuthUser>>,
) -> JoinHandle<()>
where
    T: AuthAware + ?Sized + 'static,
{
    tokio::spawn(async move {
        while receiver.changed().await.is_ok() {
            let user = receiver.borrow_and_update().clone();
            debug!(signed_in = user.is_some(), "Auth change");
            ledger.on_auth_change(user).await;
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    fn ada() -> AuthUser {
        AuthUser {
            id: UserId::from("user-ada"),
            email: "ada@example.com".to_string(),
        }
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Option<UserId>>>,
    }

    #[async_trait]
    impl AuthAware for Recorder {
        async fn on_auth_change(&self, user: Option<AuthUser>) {
            self.seen.lock().await.push(user.map(|u| u.id));
        }
    }

    #[test]
    fn test_sign_in_and_out() {
        let auth = AuthState::new();
        assert!(auth.current().is_none());
        auth.sign_in(ada());
        assert_eq!(auth.current_user_id(), Some(UserId::from("user-ada")));
        auth.sign_out();
        assert!(auth.current().is_none());
    }

    #[tokio::test]
    async fn test_follow_auth_forwards_changes() {
        let auth = AuthState::new();
        let recorder = Arc::new(Recorder::default());
        let handle = follow_auth(recorder.clone(), &auth);

        auth.sign_in(ada());
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while recorder.seen.lock().await.is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        auth.sign_out();
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while recorder.seen.lock().await.len() < 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let seen = recorder.seen.lock().await.clone();
        assert_eq!(seen, vec![Some(UserId::from("user-ada")), None]);
        handle.abort();
    }

    #[tokio::test]
    async fn test_change_before_follow_is_forwarded() {
        let auth = AuthState::signed_in(ada());
        let mut receiver = auth.subscribe();
        assert!(receiver.borrow_and_update().is_some());

        auth.sign_out();
        let recorder = Arc::new(Recorder::default());
        let handle = follow_auth_changes(recorder.clone(), receiver);
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while recorder.seen.lock().await.is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert_eq!(recorder.seen.lock().await.clone(), vec![None]);
        handle.abort();
    }
}
