use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use haggle_core::errors::DomainError;
use haggle_core::{NegotiationSession, SessionId};

type SessionHandle = Arc<tokio::sync::Mutex<NegotiationSession>>;

/// Session-keyed store. Each negotiation gets its own async mutex so turns
/// against one session serialize while distinct sessions progress fully in
/// parallel; the map itself is only locked for lookups and inserts.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<SessionId, SessionHandle>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        self.inner.lock().expect("session map lock poisoned").get(id).cloned()
    }

    /// Returns the existing handle for `id`, or creates a fresh session with
    /// `create`. Reusing the handle keeps a concurrent turn on the same id
    /// serialized even across re-initialization.
    pub fn get_or_insert_with(
        &self,
        id: &SessionId,
        create: impl FnOnce(SessionId) -> Result<NegotiationSession, DomainError>,
    ) -> Result<SessionHandle, DomainError> {
        let mut sessions = self.inner.lock().expect("session map lock poisoned");
        if let Some(handle) = sessions.get(id) {
            return Ok(handle.clone());
        }

        let session = create(id.clone())?;
        let handle = Arc::new(tokio::sync::Mutex::new(session));
        sessions.insert(id.clone(), handle.clone());
        Ok(handle)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("session map lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
