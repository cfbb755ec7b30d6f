//! `tuios-daemon` binary entry point.
//!
//! This is the daemon's own minimal CLI surface — foreground mode, socket
//! path override, log level — distinct from the out-of-scope client CLI
//! that talks to it over the wire protocol (`SPEC_FULL.md` §1).

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use mimalloc::MiMalloc;
use tuios_daemon::{Config, Daemon};

/// Global allocator: better multi-threaded performance than the system
/// allocator under the daemon's many concurrent per-connection/per-PTY
/// tasks.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Debug)]
#[command(name = "tuios-daemon", version, about = "Session/PTY daemon for tuios")]
struct Cli {
    /// Stay attached to the controlling terminal and log to stderr instead
    /// of running detached.
    #[arg(long)]
    foreground: bool,

    /// Override the Unix domain socket path (default: `$XDG_RUNTIME_DIR/tuios/daemon.sock`).
    #[arg(long, value_name = "PATH")]
    socket_path: Option<PathBuf>,

    /// Minimum log level (error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<log::LevelFilter>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::resolve(cli.socket_path, cli.foreground, cli.log_level);

    env_logger::Builder::new()
        .filter_level(config.log_level)
        .format_timestamp_millis()
        .init();

    log::info!(
        "[daemon] starting, socket={}, pid_file={}",
        config.socket_path.display(),
        config.pid_file.display()
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let daemon = Daemon::new(config);
        daemon.run().await
    })
}
