//! Session layout/workspace state.
//!
//! These types are the whole-state snapshot exchanged via `GetState`/
//! `UpdateState`. They carry no PTY bytes, only layout metadata, so they are
//! cheap to clone and serialize under either wire codec.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::PtyId;

/// One window in a session's layout: a rectangle on a workspace pointing at
/// a PTY.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub window_id: String,
    pub pty_id: PtyId,
    pub title: Option<String>,
    pub x: i32,
    pub y: i32,
    pub width: u16,
    pub height: u16,
    pub z_order: i32,
    pub workspace: u8,
    pub minimized: bool,
    pub snapped: bool,
}

/// Per-session workspace bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceState {
    pub current_workspace: u8,
    /// Workspace number -> focused window id.
    pub focused_window: HashMap<u8, String>,
    /// Workspace number -> true if the user has broken out of the tiling
    /// default for that workspace.
    pub custom_layout: HashMap<u8, bool>,
    pub master_split_ratio: f32,
}

impl Default for WorkspaceState {
    fn default() -> Self {
        Self {
            current_workspace: 1,
            focused_window: HashMap::new(),
            custom_layout: HashMap::new(),
            master_split_ratio: 0.5,
        }
    }
}

/// Whole-session layout snapshot, exchanged verbatim via `GetState`/
/// `UpdateState`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub windows: Vec<Window>,
    pub workspace: WorkspaceState,
}

impl SessionState {
    /// Drop any window whose `pty_id` is not in `owned_ptys` — the session's
    /// invariant that layout state only references PTYs it still owns.
    pub fn retain_owned_ptys(&mut self, owned_ptys: &[PtyId]) {
        self.windows.retain(|w| owned_ptys.contains(&w.pty_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(id: &str, pty: PtyId) -> Window {
        Window {
            window_id: id.to_string(),
            pty_id: pty,
            title: None,
            x: 0,
            y: 0,
            width: 80,
            height: 24,
            z_order: 0,
            workspace: 1,
            minimized: false,
            snapped: false,
        }
    }

    #[test]
    fn test_retain_owned_ptys_drops_stale_windows() {
        let kept = PtyId::generate();
        let stale = PtyId::generate();
        let mut state = SessionState {
            windows: vec![window("w1", kept.clone()), window("w2", stale)],
            workspace: WorkspaceState::default(),
        };
        state.retain_owned_ptys(&[kept.clone()]);
        assert_eq!(state.windows.len(), 1);
        assert_eq!(state.windows[0].pty_id, kept);
    }

    #[test]
    fn test_default_workspace_state_is_workspace_one() {
        let ws = WorkspaceState::default();
        assert_eq!(ws.current_workspace, 1);
        assert!((ws.master_split_ratio - 0.5).abs() < f32::EPSILON);
    }
}
