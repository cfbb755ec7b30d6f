//! PTY spawning helpers, grounded on the teacher's `agent::spawn` module.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use portable_pty::{native_pty_system, CommandBuilder, PtyPair, PtySize};

use crate::ids::PtyId;

/// Open a new PTY pair with the given cell dimensions.
pub fn open_pty(rows: u16, cols: u16) -> Result<PtyPair> {
    let pty_system = native_pty_system();
    let size = PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    };
    pty_system.openpty(size).context("failed to open PTY")
}

/// Build the shell command for a new PTY, with environment augmented with
/// `TERM`, `COLORTERM`, and a stable per-window identifier on top of the
/// inherited user environment.
pub fn build_shell_command(
    shell: &str,
    cwd: &Path,
    extra_env: &HashMap<String, String>,
    pty_id: &PtyId,
) -> CommandBuilder {
    let mut cmd = CommandBuilder::new(shell);
    cmd.cwd(cwd);
    cmd.env("TERM", "xterm-256color");
    cmd.env("COLORTERM", "truecolor");
    cmd.env("TUIOS", "1");
    cmd.env("TUIOS_VERSION", env!("CARGO_PKG_VERSION"));
    cmd.env("TUIOS_PTY_ID", pty_id.as_str());
    for (key, value) in extra_env {
        cmd.env(key, value);
    }
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_open_pty_succeeds_in_test_environment() {
        let result = open_pty(24, 80);
        assert!(result.is_ok(), "PTY open should succeed: {result:?}");
    }

    #[test]
    fn test_build_shell_command_sets_identifier_env() {
        let env = HashMap::new();
        let cwd = PathBuf::from("/tmp");
        let id = PtyId::generate();
        let _cmd = build_shell_command("/bin/sh", &cwd, &env, &id);
        // CommandBuilder does not expose introspection; constructing
        // without panicking is the contract under test.
    }
}
