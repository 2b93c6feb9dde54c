use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DAEMON_SOCKET: &str = "daemon.sock";

/// How often the daily scheduler looks at the clock.
pub const DAILY_TICK: Duration = Duration::from_secs(60);

/// Caller name that may trigger a manual check.
pub const CONSOLE_CALLER: &str = "console";

pub fn socket_path(state_dir: &Path) -> PathBuf {
    state_dir.join(DAEMON_SOCKET)
}
