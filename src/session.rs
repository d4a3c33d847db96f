use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::api::TokenSource;
use crate::storage::LocalStorage;

const USER_KEY: &str = "user";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub access_token: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Signed-in user, mirrored in memory and persisted in local storage when available.
pub struct Session {
    storage: Option<LocalStorage>,
    user: RwLock<Option<User>>,
}

impl Session {
    pub fn load(storage: Option<LocalStorage>) -> Self {
        let user = storage.as_ref().and_then(|s| match s.get(USER_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<User>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!("Discarding unreadable stored session: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Could not read stored session: {}", e);
                None
            }
        });

        Session {
            storage,
            user: RwLock::new(user),
        }
    }

    pub fn user(&self) -> Option<User> {
        self.user.read().ok().and_then(|u| u.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.user().is_some()
    }

    pub fn sign_in(&self, user: User) -> anyhow::Result<()> {
        if let Some(storage) = &self.storage {
            storage.set(USER_KEY, &serde_json::to_string(&user)?)?;
        }
        if let Ok(mut slot) = self.user.write() {
            *slot = Some(user);
        }
        Ok(())
    }

    pub fn sign_out(&self) -> anyhow::Result<()> {
        if let Ok(mut slot) = self.user.write() {
            *slot = None;
        }
        if let Some(storage) = &self.storage {
            storage.remove(USER_KEY)?;
        }
        Ok(())
    }
}

impl TokenSource for Session {
    fn access_token(&self) -> Option<String> {
        self.user()
            .map(|u| u.access_token)
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(token: &str) -> User {
        User {
            access_token: token.to_string(),
            name: Some("Analyst".to_string()),
        }
    }

    #[test]
    fn test_sign_in_persists_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::open(dir.path().join("s.sqlite")).unwrap();

        let session = Session::load(Some(storage.clone()));
        assert!(!session.is_signed_in());
        session.sign_in(user("tok-1")).unwrap();
        assert_eq!(session.access_token().as_deref(), Some("tok-1"));

        let reloaded = Session::load(Some(storage));
        assert_eq!(reloaded.user(), Some(user("tok-1")));
    }

    #[test]
    fn test_sign_out_clears_storage() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::open(dir.path().join("s.sqlite")).unwrap();

        let session = Session::load(Some(storage.clone()));
        session.sign_in(user("tok-2")).unwrap();
        session.sign_out().unwrap();

        assert!(session.access_token().is_none());
        assert!(Session::load(Some(storage)).user().is_none());
    }

    #[test]
    fn test_memory_only_session() {
        let session = Session::load(None);
        session.sign_in(user("")).unwrap();
        assert!(session.is_signed_in());
        assert!(session.access_token().is_none());
    }

    #[test]
    fn test_corrupt_stored_user_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::open(dir.path().join("s.sqlite")).unwrap();
        storage.set(USER_KEY, "{not json").unwrap();

        assert!(Session::load(Some(storage)).user().is_none());
    }
}
