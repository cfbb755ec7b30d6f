//! Daemon configuration.
//!
//! Resolved once at startup from CLI flags, then `TUIOS_*` environment
//! variables, then built-in defaults — in that priority order. There is no
//! persisted config file: unlike the product this crate's ambient stack is
//! patterned on, daemon configuration has no user-editable settings beyond
//! process flags and environment.

use std::path::PathBuf;

/// Default scrollback depth per PTY; `max_lines = 0` is treated as this
/// default rather than an unbounded buffer.
pub const DEFAULT_SCROLLBACK_MAX_LINES: usize = 10_000;

/// Default bounded depth of a subscriber's output channel.
pub const DEFAULT_SUBSCRIBER_CHANNEL_DEPTH: usize = 64;

/// Maximum accepted wire frame payload length.
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Interval of the daemon's periodic cleanup task.
pub const CLEANUP_INTERVAL_SECS: u64 = 30;

/// Read-deadline used for socket liveness polling.
pub const READ_DEADLINE_MS: u64 = 100;

/// Write-deadline before a stalled client is disconnected.
pub const WRITE_DEADLINE_SECS: u64 = 5;

/// Timeout for request/response RPCs such as `CreatePTY`/`GetTerminalState`.
pub const RPC_TIMEOUT_SECS: u64 = 30;

/// Resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket (or platform equivalent).
    pub socket_path: PathBuf,
    /// Path to the pid file written at startup.
    pub pid_file: PathBuf,
    /// Keep the process attached to its controlling terminal and log to
    /// stderr instead of daemonizing. The daemonizing fork itself is left to
    /// the out-of-scope CLI frontend; this flag only controls logging.
    pub foreground: bool,
    /// Minimum log level.
    pub log_level: log::LevelFilter,
    /// Shell spawned for new PTYs when the client does not request one.
    pub default_shell: String,
    /// Scrollback ring capacity in lines, per PTY.
    pub scrollback_max_lines: usize,
    /// Bounded depth of each subscriber's output channel.
    pub subscriber_channel_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            pid_file: default_pid_file(),
            foreground: false,
            log_level: log::LevelFilter::Info,
            default_shell: default_shell(),
            scrollback_max_lines: DEFAULT_SCROLLBACK_MAX_LINES,
            subscriber_channel_depth: DEFAULT_SUBSCRIBER_CHANNEL_DEPTH,
        }
    }
}

impl Config {
    /// Resolve configuration from CLI overrides layered over environment
    /// variables layered over defaults.
    #[must_use]
    pub fn resolve(
        socket_path_flag: Option<PathBuf>,
        foreground_flag: bool,
        log_level_flag: Option<log::LevelFilter>,
    ) -> Self {
        let mut cfg = Self::default();

        if let Some(path) = socket_path_flag.or_else(env_socket_path) {
            cfg.socket_path = path;
        }
        cfg.pid_file = cfg
            .socket_path
            .parent()
            .map(|dir| dir.join("daemon.pid"))
            .unwrap_or_else(default_pid_file);

        cfg.foreground = foreground_flag;

        if let Some(level) = log_level_flag.or_else(env_log_level) {
            cfg.log_level = level;
        }

        if let Ok(shell) = std::env::var("TUIOS_DEFAULT_SHELL") {
            cfg.default_shell = shell;
        }

        cfg
    }
}

fn env_socket_path() -> Option<PathBuf> {
    std::env::var_os("TUIOS_SOCKET_PATH").map(PathBuf::from)
}

fn env_log_level() -> Option<log::LevelFilter> {
    std::env::var("TUIOS_LOG")
        .ok()
        .and_then(|s| s.parse().ok())
}

/// Resolve the per-user runtime directory used for the socket and pid file.
///
/// Mirrors the teacher's `hub::daemon::socket_path` reasoning: prefer
/// `$XDG_RUNTIME_DIR` (short, tmpfs-backed, already per-user), and fall back
/// to `/tmp/tuios-{uid}` because a `$HOME`-rooted path risks exceeding the
/// ~104-byte `sockaddr_un.sun_path` limit on some platforms.
fn runtime_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("XDG_RUNTIME_DIR") {
        return PathBuf::from(dir).join("tuios");
    }
    #[cfg(unix)]
    {
        // SAFETY: getuid takes no arguments and cannot fail.
        let uid = unsafe { libc::getuid() };
        return PathBuf::from(format!("/tmp/tuios-{uid}"));
    }
    #[cfg(not(unix))]
    {
        std::env::temp_dir().join("tuios")
    }
}

fn default_socket_path() -> PathBuf {
    runtime_dir().join("daemon.sock")
}

fn default_pid_file() -> PathBuf {
    runtime_dir().join("daemon.pid")
}

/// Fall back to the user's login shell, or `/bin/bash` if `$SHELL` is unset.
#[must_use]
pub fn default_shell() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_sane_limits() {
        let cfg = Config::default();
        assert_eq!(cfg.scrollback_max_lines, DEFAULT_SCROLLBACK_MAX_LINES);
        assert_eq!(cfg.subscriber_channel_depth, DEFAULT_SUBSCRIBER_CHANNEL_DEPTH);
        assert!(cfg.socket_path.ends_with("daemon.sock"));
    }

    #[test]
    fn test_resolve_honors_explicit_socket_path_override() {
        let cfg = Config::resolve(Some(PathBuf::from("/tmp/custom.sock")), true, None);
        assert_eq!(cfg.socket_path, PathBuf::from("/tmp/custom.sock"));
        assert_eq!(cfg.pid_file, PathBuf::from("/tmp/daemon.pid"));
        assert!(cfg.foreground);
    }

    #[test]
    fn test_resolve_defaults_log_level_info() {
        let cfg = Config::resolve(None, false, None);
        assert_eq!(cfg.log_level, log::LevelFilter::Info);
    }
}
