//! Session Manager: process-wide registry of sessions by name and by id.
//!
//! Grounded on the teacher's `HubState` agent registry (`hub/state.rs`),
//! generalized from a single `HashMap<String, Agent>` to a dual-indexed
//! (name, id) registry behind one lock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::DaemonError;
use crate::ids::SessionId;
use crate::session::{Session, SessionHints};

/// Summary row returned by `list()` — enough to render a session picker
/// without touching per-session locks.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: SessionId,
    pub name: String,
    pub pty_count: usize,
}

struct Registry {
    by_name: HashMap<String, Arc<Session>>,
    by_id: HashMap<SessionId, Arc<Session>>,
}

/// Process-wide session registry.
pub struct SessionManager {
    registry: RwLock<Registry>,
    scrollback_max_lines: usize,
    subscriber_channel_depth: usize,
}

impl SessionManager {
    #[must_use]
    pub fn new(scrollback_max_lines: usize, subscriber_channel_depth: usize) -> Self {
        Self {
            registry: RwLock::new(Registry { by_name: HashMap::new(), by_id: HashMap::new() }),
            scrollback_max_lines,
            subscriber_channel_depth,
        }
    }

    /// Create a new session. Fails with `SessionExists` if `name` is taken.
    pub fn create(
        &self,
        name: String,
        hints: SessionHints,
        width: u16,
        height: u16,
    ) -> Result<Arc<Session>, DaemonError> {
        let mut reg = self.registry.write().expect("registry lock poisoned");
        if reg.by_name.contains_key(&name) {
            return Err(DaemonError::SessionExists);
        }
        let session = Arc::new(Session::new(
            name.clone(),
            hints,
            width,
            height,
            self.scrollback_max_lines,
            self.subscriber_channel_depth,
        ));
        reg.by_name.insert(name, Arc::clone(&session));
        reg.by_id.insert(session.id(), Arc::clone(&session));
        Ok(session)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Session>> {
        self.registry.read().expect("registry lock poisoned").by_name.get(name).cloned()
    }

    #[must_use]
    pub fn get_by_id(&self, id: SessionId) -> Option<Arc<Session>> {
        self.registry.read().expect("registry lock poisoned").by_id.get(&id).cloned()
    }

    #[must_use]
    pub fn list(&self) -> Vec<SessionSummary> {
        self.registry
            .read()
            .expect("registry lock poisoned")
            .by_name
            .values()
            .map(|s| SessionSummary { id: s.id(), name: s.name().to_string(), pty_count: s.list_pty_ids().len() })
            .collect()
    }

    /// Delete a session by name, closing all of its PTYs.
    pub fn delete(&self, name: &str) -> Result<(), DaemonError> {
        let mut reg = self.registry.write().expect("registry lock poisoned");
        let session = reg.by_name.remove(name).ok_or(DaemonError::SessionNotFound)?;
        reg.by_id.remove(&session.id());
        drop(reg);
        session.close_all_ptys();
        Ok(())
    }

    /// Return the named session, creating it if absent.
    pub fn get_or_create(
        &self,
        name: &str,
        hints: SessionHints,
        width: u16,
        height: u16,
    ) -> Arc<Session> {
        if let Some(existing) = self.get(name) {
            return existing;
        }
        match self.create(name.to_string(), hints.clone(), width, height) {
            Ok(session) => session,
            // Lost a create race against another connection; the winner's
            // session is equally valid to attach to.
            Err(DaemonError::SessionExists) => self.get(name).expect("session exists"),
            Err(other) => unreachable!("unexpected error creating session: {other}"),
        }
    }

    /// Returns `session-<N>` for the smallest `N >= 0` not already in use.
    #[must_use]
    pub fn generate_name(&self) -> String {
        let reg = self.registry.read().expect("registry lock poisoned");
        let mut n = 0usize;
        loop {
            let candidate = format!("session-{n}");
            if !reg.by_name.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Attach to any existing session, or create a freshly named one —
    /// resolves `Attach {name: ""}` to whatever session is already running.
    pub fn default_session(&self, hints: SessionHints, width: u16, height: u16) -> Arc<Session> {
        {
            let reg = self.registry.read().expect("registry lock poisoned");
            if let Some(session) = reg.by_name.values().next() {
                return Arc::clone(session);
            }
        }
        let name = self.generate_name();
        self.get_or_create(&name, hints, width, height)
    }

    /// Close every session (daemon shutdown).
    pub fn shutdown(&self) {
        let mut reg = self.registry.write().expect("registry lock poisoned");
        for session in reg.by_name.values() {
            session.close_all_ptys();
        }
        reg.by_name.clear();
        reg.by_id.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SessionManager {
        SessionManager::new(100, 16)
    }

    #[test]
    fn test_create_then_get_by_name_and_id() {
        let mgr = manager();
        let session = mgr.create("alpha".to_string(), SessionHints::default(), 80, 24).unwrap();
        assert!(mgr.get("alpha").is_some());
        assert!(mgr.get_by_id(session.id()).is_some());
    }

    #[test]
    fn test_create_duplicate_name_fails() {
        let mgr = manager();
        mgr.create("alpha".to_string(), SessionHints::default(), 80, 24).unwrap();
        let err = mgr.create("alpha".to_string(), SessionHints::default(), 80, 24).unwrap_err();
        assert_eq!(err, DaemonError::SessionExists);
    }

    #[test]
    fn test_generate_name_fills_smallest_free_index() {
        let mgr = manager();
        assert_eq!(mgr.generate_name(), "session-0");
        mgr.create("session-0".to_string(), SessionHints::default(), 80, 24).unwrap();
        assert_eq!(mgr.generate_name(), "session-1");
        mgr.create("session-1".to_string(), SessionHints::default(), 80, 24).unwrap();
        mgr.delete("session-0").unwrap();
        assert_eq!(mgr.generate_name(), "session-0");
    }

    #[test]
    fn test_delete_unknown_session_errors() {
        let mgr = manager();
        assert_eq!(mgr.delete("nope").unwrap_err(), DaemonError::SessionNotFound);
    }

    #[test]
    fn test_default_session_creates_once_then_reuses() {
        let mgr = manager();
        let a = mgr.default_session(SessionHints::default(), 80, 24);
        let b = mgr.default_session(SessionHints::default(), 80, 24);
        assert_eq!(a.id(), b.id());
        assert_eq!(mgr.list().len(), 1);
    }

    #[test]
    fn test_get_or_create_returns_existing() {
        let mgr = manager();
        let a = mgr.get_or_create("alpha", SessionHints::default(), 80, 24);
        let b = mgr.get_or_create("alpha", SessionHints::default(), 80, 24);
        assert_eq!(a.id(), b.id());
    }
}
