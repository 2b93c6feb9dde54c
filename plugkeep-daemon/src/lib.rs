//! plugkeep daemon: scheduler + single pass processor + control socket.

mod error;
pub mod paths;
pub mod protocol;
mod runtime;

pub use error::DaemonError;
pub use protocol::{
    is_running, request_check, request_status, request_stop, send_request, CheckReply,
    DaemonRequest, DaemonResponse,
};
pub use runtime::{init_tracing, run, start_blocking, DaemonState};
