//! Session Registry
//!
//! Maps host-issued session ids to the role that owns them. Each role holds
//! at most one id and an id belongs to at most one role. Events whose id is
//! not bound are stale and get dropped by the caller.

use std::collections::HashMap;
use tracing::debug;

use super::{SessionId, SessionRole};
use crate::clipboard::error::{ClipboardError, Result};

#[derive(Debug, Default)]
pub struct SessionRegistry {
    by_id: HashMap<SessionId, SessionRole>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `id` to `role`.
    ///
    /// Rejects [`SessionId::NONE`], ids held by another role and roles that
    /// already hold a different id. Rebinding the same pair is a no-op.
    pub fn bind(&mut self, id: SessionId, role: SessionRole) -> Result<()> {
        if id.is_none() {
            return Err(ClipboardError::InvalidSessionId(id));
        }

        match self.by_id.get(&id) {
            Some(existing) if *existing == role => return Ok(()),
            Some(existing) => {
                return Err(ClipboardError::SessionInUse {
                    id,
                    role: *existing,
                });
            }
            None => {}
        }

        if let Some(current) = self.current(role) {
            return Err(ClipboardError::SessionMismatch {
                expected: current,
                actual: id,
            });
        }

        debug!("Bound session {} to {:?}", id, role);
        self.by_id.insert(id, role);
        Ok(())
    }

    pub fn lookup(&self, id: SessionId) -> Option<SessionRole> {
        self.by_id.get(&id).copied()
    }

    /// Id currently bound to `role`
    pub fn current(&self, role: SessionRole) -> Option<SessionId> {
        self.by_id
            .iter()
            .find(|(_, r)| **r == role)
            .map(|(id, _)| *id)
    }

    pub fn release(&mut self, id: SessionId) -> Option<SessionRole> {
        let role = self.by_id.remove(&id);
        if let Some(role) = role {
            debug!("Released session {} from {:?}", id, role);
        }
        role
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
