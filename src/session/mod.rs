use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;
use uuid::Uuid;

use crate::database::models::SessionUser;

/// Per-visitor state: the signed-in identity plus read-once flash values
/// (validation errors and old form input surviving one redirect).
#[derive(Debug, Default, Clone)]
pub struct Session {
    pub user: Option<SessionUser>,
    flash: HashMap<String, Value>,
}

/// In-memory session store keyed by the session cookie. The store is the
/// only cross-request mutable state besides the connection pool; access is
/// serialized through the lock.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh session and return its id.
    pub fn create(&self) -> String {
        let id = Uuid::new_v4().to_string();
        self.sessions
            .write()
            .expect("session store lock")
            .insert(id.clone(), Session::default());
        id
    }

    pub fn exists(&self, id: &str) -> bool {
        self.sessions
            .read()
            .expect("session store lock")
            .contains_key(id)
    }

    pub fn current_user(&self, id: &str) -> Option<SessionUser> {
        self.sessions
            .read()
            .expect("session store lock")
            .get(id)
            .and_then(|session| session.user.clone())
    }

    pub fn sign_in(&self, id: &str, user: SessionUser) {
        if let Some(session) = self
            .sessions
            .write()
            .expect("session store lock")
            .get_mut(id)
        {
            session.user = Some(user);
        }
    }

    /// Terminate the session entirely; the next request starts a new one.
    pub fn destroy(&self, id: &str) {
        self.sessions
            .write()
            .expect("session store lock")
            .remove(id);
    }

    pub fn set_flash(&self, id: &str, key: &str, value: Value) {
        if let Some(session) = self
            .sessions
            .write()
            .expect("session store lock")
            .get_mut(id)
        {
            session.flash.insert(key.to_string(), value);
        }
    }

    /// Read-once: the value is removed as it is read.
    pub fn take_flash(&self, id: &str, key: &str) -> Option<Value> {
        self.sessions
            .write()
            .expect("session store lock")
            .get_mut(id)
            .and_then(|session| session.flash.remove(key))
    }
}
