//! Session: a named, long-lived container of PTY Channels plus the layout
//! state shared by every client attached to it.
//!
//! Grounded on the teacher's `HubState` (`hub/state.rs`) for the
//! registry-of-handles shape, generalized from agent-specific metadata to
//! the spec's PTY/window model, and on `hub::agent_handle`'s "newest client
//! owns the size" behavior, which this module explicitly replaces with
//! elementwise-minimum negotiation (see `DESIGN.md`).

pub mod manager;
pub mod state;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex as StdMutex;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::error::DaemonError;
use crate::ids::{ClientId, PtyId, SessionId};
use crate::pty::PtyChannel;
use state::SessionState;

/// Shell/terminal hints captured from whichever client first created the
/// session.
#[derive(Debug, Clone)]
pub struct SessionHints {
    pub shell: String,
    pub term: String,
    pub colorterm: String,
}

impl Default for SessionHints {
    fn default() -> Self {
        Self {
            shell: crate::config::default_shell(),
            term: "xterm-256color".to_string(),
            colorterm: "truecolor".to_string(),
        }
    }
}

pub struct Session {
    id: SessionId,
    name: String,
    created_at: DateTime<Utc>,
    last_active: StdMutex<DateTime<Utc>>,
    hints: SessionHints,
    ptys: StdMutex<HashMap<PtyId, PtyChannel>>,
    state: StdMutex<SessionState>,
    client_sizes: StdMutex<HashMap<ClientId, (u16, u16)>>,
    effective_size: StdMutex<(u16, u16)>,
    scrollback_max_lines: usize,
    subscriber_channel_depth: usize,
}

impl Session {
    #[must_use]
    pub fn new(
        name: String,
        hints: SessionHints,
        width: u16,
        height: u16,
        scrollback_max_lines: usize,
        subscriber_channel_depth: usize,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::generate(),
            name,
            created_at: now,
            last_active: StdMutex::new(now),
            hints,
            ptys: StdMutex::new(HashMap::new()),
            state: StdMutex::new(SessionState::default()),
            client_sizes: StdMutex::new(HashMap::new()),
            effective_size: StdMutex::new((width.max(1), height.max(1))),
            scrollback_max_lines,
            subscriber_channel_depth,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn last_active(&self) -> DateTime<Utc> {
        *self.last_active.lock().expect("last_active lock poisoned")
    }

    pub fn touch(&self) {
        *self.last_active.lock().expect("last_active lock poisoned") = Utc::now();
    }

    #[must_use]
    pub fn effective_size(&self) -> (u16, u16) {
        *self.effective_size.lock().expect("effective_size lock poisoned")
    }

    /// Create a PTY at the session's current effective size.
    pub fn create_pty(&self, cwd: Option<PathBuf>) -> Result<PtyId> {
        let (width, height) = self.effective_size();
        let cwd = cwd.unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from("/")));
        let channel = PtyChannel::open(
            &self.hints.shell,
            cwd,
            self.base_env(),
            width,
            height,
            self.scrollback_max_lines,
            self.subscriber_channel_depth,
        )?;
        let id = channel.id().clone();
        self.ptys.lock().expect("ptys lock poisoned").insert(id.clone(), channel);
        self.touch();
        Ok(id)
    }

    fn base_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("TERM".to_string(), self.hints.term.clone());
        env.insert("COLORTERM".to_string(), self.hints.colorterm.clone());
        env
    }

    pub fn close_pty(&self, pty_id: &PtyId) -> Result<(), DaemonError> {
        let removed = self.ptys.lock().expect("ptys lock poisoned").remove(pty_id);
        match removed {
            Some(channel) => {
                channel.close();
                let owned = self.list_pty_ids();
                self.state.lock().expect("state lock poisoned").retain_owned_ptys(&owned);
                self.touch();
                Ok(())
            }
            None => Err(DaemonError::PtyNotFound),
        }
    }

    #[must_use]
    pub fn list_pty_ids(&self) -> Vec<PtyId> {
        self.ptys.lock().expect("ptys lock poisoned").keys().cloned().collect()
    }

    #[must_use]
    pub fn get_pty(&self, pty_id: &PtyId) -> Option<PtyChannel> {
        self.ptys.lock().expect("ptys lock poisoned").get(pty_id).cloned()
    }

    #[must_use]
    pub fn get_state(&self) -> SessionState {
        self.state.lock().expect("state lock poisoned").clone()
    }

    /// Replace the session's layout state wholesale, dropping references to
    /// PTYs the session no longer owns.
    pub fn update_state(&self, mut new_state: SessionState) -> SessionState {
        let owned = self.list_pty_ids();
        new_state.retain_owned_ptys(&owned);
        *self.state.lock().expect("state lock poisoned") = new_state.clone();
        self.touch();
        new_state
    }

    /// Record (or refresh) a client's advertised viewport size and
    /// recompute the session's effective size as the elementwise minimum
    /// across all currently attached clients. Returns the new effective
    /// size and resizes every owned PTY to it.
    pub fn set_client_size(&self, client_id: ClientId, width: u16, height: u16) -> (u16, u16) {
        self.client_sizes
            .lock()
            .expect("client_sizes lock poisoned")
            .insert(client_id, (width.max(1), height.max(1)));
        self.recompute_effective_size()
    }

    /// Drop a client's advertised size (on detach or disconnect) and
    /// recompute the effective size.
    pub fn remove_client_size(&self, client_id: &ClientId) -> (u16, u16) {
        self.client_sizes.lock().expect("client_sizes lock poisoned").remove(client_id);
        self.recompute_effective_size()
    }

    fn recompute_effective_size(&self) -> (u16, u16) {
        let sizes = self.client_sizes.lock().expect("client_sizes lock poisoned");
        let new_size = sizes.values().copied().reduce(|(aw, ah), (bw, bh)| (aw.min(bw), ah.min(bh)));
        drop(sizes);

        let Some((width, height)) = new_size else {
            return self.effective_size();
        };

        let mut effective = self.effective_size.lock().expect("effective_size lock poisoned");
        if *effective != (width, height) {
            *effective = (width, height);
            drop(effective);
            for channel in self.ptys.lock().expect("ptys lock poisoned").values() {
                channel.resize(width, height);
            }
        }
        (width, height)
    }

    /// Close every owned PTY (session destruction).
    pub fn close_all_ptys(&self) {
        for channel in self.ptys.lock().expect("ptys lock poisoned").drain() {
            channel.1.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new("test".to_string(), SessionHints::default(), 80, 24, 100, 16)
    }

    #[test]
    fn test_new_session_has_unique_id_and_name() {
        let s1 = session();
        let s2 = session();
        assert_ne!(s1.id(), s2.id());
        assert_eq!(s1.name(), "test");
    }

    #[test]
    fn test_effective_size_defaults_to_constructor_size() {
        let s = session();
        assert_eq!(s.effective_size(), (80, 24));
    }

    #[test]
    fn test_set_client_size_computes_elementwise_minimum() {
        let s = session();
        let a = ClientId::generate();
        let b = ClientId::generate();
        s.set_client_size(a, 100, 40);
        let effective = s.set_client_size(b, 60, 50);
        assert_eq!(effective, (60, 40));
    }

    #[test]
    fn test_remove_client_size_recomputes_from_remaining() {
        let s = session();
        let a = ClientId::generate();
        let b = ClientId::generate();
        s.set_client_size(a.clone(), 100, 40);
        s.set_client_size(b, 60, 50);
        let effective = s.remove_client_size(&a);
        assert_eq!(effective, (60, 50));
    }

    #[test]
    fn test_close_pty_on_unknown_id_errors() {
        let s = session();
        let err = s.close_pty(&PtyId::generate()).unwrap_err();
        assert_eq!(err.code(), "PTYNotFound");
    }

    #[test]
    fn test_update_state_drops_references_to_unowned_ptys() {
        let s = session();
        let stale = PtyId::generate();
        let mut new_state = SessionState::default();
        new_state.windows.push(state::Window {
            window_id: "w1".to_string(),
            pty_id: stale,
            title: None,
            x: 0,
            y: 0,
            width: 80,
            height: 24,
            z_order: 0,
            workspace: 1,
            minimized: false,
            snapped: false,
        });
        let cleaned = s.update_state(new_state);
        assert!(cleaned.windows.is_empty());
    }
}
