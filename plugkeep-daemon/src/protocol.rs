use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use plugkeep_engine::PassSummary;

use crate::error::{io_err, DaemonError};
use crate::paths::{socket_path, CONSOLE_CALLER};

/// JSON newline-delimited request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonRequest {
    pub cmd: String,
    /// Who is asking. Absent means the console.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller: Option<String>,
}

impl DaemonRequest {
    pub fn new(cmd: &str) -> Self {
        Self {
            cmd: cmd.to_string(),
            caller: None,
        }
    }

    pub fn is_console(&self) -> bool {
        self.caller.as_deref().unwrap_or(CONSOLE_CALLER) == CONSOLE_CALLER
    }
}

/// JSON newline-delimited response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Payload of a successful `check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReply {
    /// Progress lines, in the order the pass produced them.
    pub replies: Vec<String>,
    pub summary: PassSummary,
}

const STATUS_ATTEMPTS: u32 = 5;
const STATUS_RETRY_DELAY: Duration = Duration::from_millis(100);

fn connect(socket: &Path) -> Result<UnixStream, DaemonError> {
    if !socket.exists() {
        return Err(DaemonError::DaemonNotRunning {
            socket: socket.to_path_buf(),
        });
    }
    UnixStream::connect(socket).map_err(|err| match err.kind() {
        ErrorKind::NotFound | ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset => {
            DaemonError::DaemonNotRunning {
                socket: socket.to_path_buf(),
            }
        }
        _ => io_err(socket, err),
    })
}

/// One request line out, one response line back.
pub fn send_request(state_dir: &Path, request: &DaemonRequest) -> Result<DaemonResponse, DaemonError> {
    let socket = socket_path(state_dir);
    let mut stream = connect(&socket)?;

    let mut line = serde_json::to_vec(request)?;
    line.push(b'\n');
    stream
        .write_all(&line)
        .and_then(|()| stream.flush())
        .map_err(|e| io_err(&socket, e))?;

    let mut reply = String::new();
    let read = BufReader::new(stream)
        .read_line(&mut reply)
        .map_err(|e| io_err(&socket, e))?;
    if read == 0 {
        return Err(DaemonError::Protocol(format!(
            "daemon at {} hung up without a response",
            socket.display()
        )));
    }
    Ok(serde_json::from_str(reply.trim_end())?)
}

/// `true` when something answers on the daemon socket.
pub fn is_running(state_dir: &Path) -> bool {
    UnixStream::connect(socket_path(state_dir)).is_ok()
}

/// Status, retried briefly so a daemon that is still binding its socket
/// is not reported as stopped.
pub fn request_status(state_dir: &Path) -> Result<Value, DaemonError> {
    let request = DaemonRequest::new("status");
    let mut attempt = 1;
    loop {
        match send_request(state_dir, &request) {
            Err(DaemonError::DaemonNotRunning { .. }) if attempt < STATUS_ATTEMPTS => {
                attempt += 1;
                sleep(STATUS_RETRY_DELAY);
            }
            result => return response_into_data(result?),
        }
    }
}

pub fn request_stop(state_dir: &Path) -> Result<(), DaemonError> {
    let response = send_request(state_dir, &DaemonRequest::new("stop"))?;
    response_into_data(response).map(|_| ())
}

/// Queue a manual pass and wait for it to finish.
pub fn request_check(state_dir: &Path, caller: &str) -> Result<CheckReply, DaemonError> {
    let request = DaemonRequest {
        cmd: "check".to_string(),
        caller: Some(caller.to_string()),
    };
    let data = response_into_data(send_request(state_dir, &request)?)?;
    Ok(serde_json::from_value(data)?)
}

fn response_into_data(response: DaemonResponse) -> Result<Value, DaemonError> {
    match response {
        DaemonResponse { ok: true, data, .. } => Ok(data.unwrap_or(Value::Null)),
        DaemonResponse { error, .. } => Err(DaemonError::Protocol(
            error.unwrap_or_else(|| "daemon reported an error without a message".to_string()),
        )),
    }
}
