use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio_util::sync::CancellationToken;

use plugkeep_core::{config, Paths, Schedule};
use plugkeep_engine::{PassSummary, Reconciler, ReplyBuffer, ReplySink};

use crate::error::{io_err, DaemonError};
use crate::paths::{socket_path, DAILY_TICK};
use crate::protocol::{CheckReply, DaemonRequest, DaemonResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobSource {
    Scheduled,
    Manual,
}

impl JobSource {
    fn label(self) -> &'static str {
        match self {
            JobSource::Scheduled => "scheduled",
            JobSource::Manual => "manual",
        }
    }
}

struct PassJob {
    source: JobSource,
    respond_to: Option<oneshot::Sender<Result<CheckReply, String>>>,
}

/// What `status` reports.
#[derive(Debug, Default)]
pub struct DaemonState {
    pub last_pass: Option<PassSummary>,
    pub last_error: Option<String>,
}

type SharedState = Arc<RwLock<DaemonState>>;

/// Set while a scheduled pass is queued or running.
type ScheduledPending = Arc<AtomicBool>;

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(paths: &Paths) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(paths.clone()))
}

/// Run the daemon runtime.
pub async fn run(paths: Paths) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&paths)?;
    config::ensure_default_at(&paths.config_dir)?;

    let reconciler = Arc::new(Reconciler::for_state_dir(&paths.state_dir));
    let state: SharedState = Arc::new(RwLock::new(DaemonState::default()));
    let started_at = Utc::now();
    let cancel = CancellationToken::new();

    let scheduled_pending: ScheduledPending = Arc::new(AtomicBool::new(false));
    let (job_tx, job_rx) = mpsc::channel::<PassJob>(16);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let scheduler_handle = {
        let shutdown = shutdown_tx.clone();
        let paths = paths.clone();
        let job_tx = job_tx.clone();
        let pending = scheduled_pending.clone();
        tokio::spawn(async move {
            let result = scheduler_task(paths, job_tx, pending, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let paths = paths.clone();
        let state = state.clone();
        let cancel = cancel.clone();
        let pending = scheduled_pending.clone();
        tokio::spawn(async move {
            let jobs = JobQueue {
                rx: job_rx,
                scheduled_pending: pending,
            };
            let result =
                pass_processor_task(paths, reconciler, state, jobs, cancel, shutdown.subscribe())
                    .await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let paths = paths.clone();
        let state = state.clone();
        let job_tx = job_tx.clone();
        tokio::spawn(async move {
            let ctx = SocketContext {
                paths,
                state,
                job_tx,
                shutdown_tx: shutdown.clone(),
                started_at,
            };
            let result = socket_server_task(ctx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    // Shutdown → cancellation, so a running pass stops between components.
    let cancel_bridge_handle = {
        let mut shutdown_rx = shutdown_tx.subscribe();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let _ = shutdown_rx.recv().await;
            cancel.cancel();
            Ok(())
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    tracing::info!(
        plugins_dir = %paths.plugins_dir.display(),
        socket = %socket_path(&paths.state_dir).display(),
        "daemon started",
    );

    let (scheduler_result, processor_result, socket_result, bridge_result, signal_result) = tokio::join!(
        scheduler_handle,
        processor_handle,
        socket_handle,
        cancel_bridge_handle,
        signal_handle
    );

    handle_join("scheduler", scheduler_result)?;
    handle_join("pass_processor", processor_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("cancel_bridge", bridge_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("daemon stopped");
    Ok(())
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Daily mode: due once per UTC day, at or after `target`.
fn daily_due(now: DateTime<Utc>, target: NaiveTime, last_run: Option<NaiveDate>) -> bool {
    now.time() >= target && last_run != Some(now.date_naive())
}

async fn scheduler_task(
    paths: Paths,
    job_tx: mpsc::Sender<PassJob>,
    pending: ScheduledPending,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut last_daily_run: Option<NaiveDate> = None;
    loop {
        // Re-read every tick so schedule edits apply without a restart.
        let schedule = match config::load_at(&paths.config_dir) {
            Ok(cfg) => cfg.schedule(),
            Err(err) => {
                tracing::warn!(error = %err, "cannot load config; using default interval");
                plugkeep_core::AutoUpdateConfig::default().schedule()
            }
        };

        let wait = match schedule {
            Schedule::Interval(interval) => {
                enqueue_scheduled(&job_tx, &pending);
                interval
            }
            Schedule::DailyAt(target) => {
                let now = Utc::now();
                if daily_due(now, target, last_daily_run) {
                    enqueue_scheduled(&job_tx, &pending);
                    last_daily_run = Some(now.date_naive());
                }
                DAILY_TICK
            }
        };

        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = tokio::time::sleep(wait) => {}
        }
    }
    Ok(())
}

/// Queue a scheduled pass unless one is already queued or running.
fn enqueue_scheduled(job_tx: &mpsc::Sender<PassJob>, pending: &AtomicBool) -> bool {
    if pending
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        tracing::debug!("previous scheduled pass not finished; skipping this tick");
        return false;
    }
    let job = PassJob {
        source: JobSource::Scheduled,
        respond_to: None,
    };
    if let Err(err) = job_tx.try_send(job) {
        pending.store(false, Ordering::Release);
        tracing::debug!(error = %err, "pass queue busy; skipping scheduled pass");
        return false;
    }
    true
}

// ---------------------------------------------------------------------------
// Pass processor: the only place passes run
// ---------------------------------------------------------------------------

/// Receiving end of the pass queue.
struct JobQueue {
    rx: mpsc::Receiver<PassJob>,
    scheduled_pending: ScheduledPending,
}

async fn pass_processor_task(
    paths: Paths,
    reconciler: Arc<Reconciler>,
    state: SharedState,
    mut jobs: JobQueue,
    cancel: CancellationToken,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = jobs.rx.recv() => {
                let Some(job) = maybe_job else { break };
                let outcome = run_job(&paths, &reconciler, job.source, &cancel).await;
                if job.source == JobSource::Scheduled {
                    jobs.scheduled_pending.store(false, Ordering::Release);
                }

                {
                    let mut state = state.write().await;
                    match &outcome {
                        Ok(reply) => {
                            state.last_pass = Some(reply.summary.clone());
                            state.last_error = None;
                        }
                        Err(err) => state.last_error = Some(err.clone()),
                    }
                }

                if let Some(respond_to) = job.respond_to {
                    let _ = respond_to.send(outcome);
                }
            }
        }
    }
    Ok(())
}

async fn run_job(
    paths: &Paths,
    reconciler: &Reconciler,
    source: JobSource,
    cancel: &CancellationToken,
) -> Result<CheckReply, String> {
    tracing::info!(source = source.label(), "starting pass");
    let cfg = config::load_at(&paths.config_dir).map_err(|err| {
        tracing::error!(error = %err, "cannot load config; pass aborted");
        err.to_string()
    })?;

    let replies = ReplyBuffer::default();
    let reply: Option<&dyn ReplySink> = match source {
        JobSource::Manual => Some(&replies),
        JobSource::Scheduled => None,
    };

    let summary = reconciler
        .run_pass(&cfg, &paths.plugins_dir, reply, cancel)
        .await
        .map_err(|err| err.to_string())?;

    Ok(CheckReply {
        replies: replies.lines(),
        summary,
    })
}

// ---------------------------------------------------------------------------
// Socket server
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct SocketContext {
    paths: Paths,
    state: SharedState,
    job_tx: mpsc::Sender<PassJob>,
    shutdown_tx: broadcast::Sender<()>,
    started_at: DateTime<Utc>,
}

async fn socket_server_task(
    ctx: SocketContext,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&ctx.paths.state_dir);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, ctx).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(stream: UnixStream, ctx: SocketContext) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let response = dispatch(&request, &ctx).await;
        write_response(&mut writer, &response).await?;
        if request.cmd == "stop" {
            break;
        }
    }

    Ok(())
}

async fn dispatch(request: &DaemonRequest, ctx: &SocketContext) -> DaemonResponse {
    match request.cmd.as_str() {
        "status" => DaemonResponse::ok(build_status_payload(ctx).await),
        "check" => {
            if !request.is_console() {
                tracing::warn!(caller = ?request.caller, "refusing manual check from non-console caller");
                return DaemonResponse::error("check can only be run from the console");
            }
            match enqueue_manual(&ctx.job_tx).await {
                Ok(reply) => match serde_json::to_value(&reply) {
                    Ok(value) => DaemonResponse::ok(value),
                    Err(err) => DaemonResponse::error(err.to_string()),
                },
                Err(err) => DaemonResponse::error(err.to_string()),
            }
        }
        "stop" => {
            let _ = ctx.shutdown_tx.send(());
            DaemonResponse::ok(json!({ "stopping": true }))
        }
        other => DaemonResponse::error(format!("unknown command '{other}'")),
    }
}

async fn build_status_payload(ctx: &SocketContext) -> Value {
    let (last_pass, last_error) = {
        let state = ctx.state.read().await;
        (state.last_pass.clone(), state.last_error.clone())
    };

    json!({
        "running": true,
        "pid": std::process::id(),
        "started_at": ctx.started_at.to_rfc3339(),
        "last_pass": last_pass,
        "last_error": last_error,
        "socket": socket_path(&ctx.paths.state_dir).display().to_string(),
        "plugins_dir": ctx.paths.plugins_dir.display().to_string(),
    })
}

async fn enqueue_manual(job_tx: &mpsc::Sender<PassJob>) -> Result<CheckReply, DaemonError> {
    let (tx, rx) = oneshot::channel();
    job_tx
        .send(PassJob {
            source: JobSource::Manual,
            respond_to: Some(tx),
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("pass queue"))?;

    let outcome = rx
        .await
        .map_err(|_| DaemonError::ChannelClosed("pass response"))?;
    outcome.map_err(DaemonError::Protocol)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(paths: &Paths) -> Result<(), DaemonError> {
    for dir in [&paths.state_dir, &paths.config_dir] {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
    }
    Ok(())
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

/// `RUST_LOG` filter (default `info`); `PLUGKEEP_LOG_FORMAT=json` for JSON lines.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("PLUGKEEP_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let _ = if json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
    } else {
        fmt().with_env_filter(filter).with_target(false).try_init()
    };
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn paths(tmp: &TempDir) -> Paths {
        Paths {
            plugins_dir: tmp.path().join("plugins"),
            config_dir: tmp.path().join("config"),
            state_dir: tmp.path().join("state"),
        }
    }

    fn context(tmp: &TempDir) -> (SocketContext, mpsc::Receiver<PassJob>, broadcast::Receiver<()>) {
        let (job_tx, job_rx) = mpsc::channel(4);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(4);
        let ctx = SocketContext {
            paths: paths(tmp),
            state: Arc::new(RwLock::new(DaemonState::default())),
            job_tx,
            shutdown_tx,
            started_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
        };
        (ctx, job_rx, shutdown_rx)
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 10, h, m, 0).unwrap()
    }

    #[test]
    fn daily_schedule_fires_once_per_day_after_target() {
        let target = NaiveTime::from_hms_opt(4, 0, 0).unwrap();
        assert!(!daily_due(at(3, 59), target, None));
        assert!(daily_due(at(4, 0), target, None));
        assert!(daily_due(at(23, 0), target, None), "late start still runs today");

        let today = at(4, 0).date_naive();
        assert!(!daily_due(at(4, 1), target, Some(today)));
        let yesterday = today.pred_opt().unwrap();
        assert!(daily_due(at(4, 1), target, Some(yesterday)));
    }

    #[tokio::test]
    async fn check_from_non_console_caller_is_refused() {
        let tmp = TempDir::new().unwrap();
        let (ctx, mut job_rx, _shutdown_rx) = context(&tmp);
        let request = DaemonRequest {
            cmd: "check".into(),
            caller: Some("chat".into()),
        };

        let response = dispatch(&request, &ctx).await;
        assert!(!response.ok);
        assert!(response.error.unwrap().contains("console"));
        assert!(job_rx.try_recv().is_err(), "no pass may be queued");
    }

    #[tokio::test]
    async fn status_reports_last_pass_and_error() {
        let tmp = TempDir::new().unwrap();
        let (ctx, _job_rx, _shutdown_rx) = context(&tmp);
        ctx.state.write().await.last_error = Some("config broke".into());

        let response = dispatch(&DaemonRequest::new("status"), &ctx).await;
        let data = response.data.unwrap();
        assert_eq!(data["running"], json!(true));
        assert_eq!(data["started_at"], json!("2026-01-02T03:04:05+00:00"));
        assert_eq!(data["last_pass"], Value::Null);
        assert_eq!(data["last_error"], json!("config broke"));
    }

    #[tokio::test]
    async fn stop_broadcasts_shutdown() {
        let tmp = TempDir::new().unwrap();
        let (ctx, _job_rx, mut shutdown_rx) = context(&tmp);
        let response = dispatch(&DaemonRequest::new("stop"), &ctx).await;
        assert!(response.ok);
        shutdown_rx.recv().await.expect("shutdown signal");
    }

    #[tokio::test]
    async fn unknown_command_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let (ctx, _job_rx, _shutdown_rx) = context(&tmp);
        let response = dispatch(&DaemonRequest::new("sync"), &ctx).await;
        assert_eq!(response.error.as_deref(), Some("unknown command 'sync'"));
    }

    #[tokio::test]
    async fn manual_job_collects_replies() {
        let tmp = TempDir::new().unwrap();
        let paths = paths(&tmp);
        fs::create_dir_all(&paths.plugins_dir).unwrap();
        let reconciler = Reconciler::for_state_dir(&paths.state_dir);

        let reply = run_job(&paths, &reconciler, JobSource::Manual, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            reply.replies,
            vec!["Checking for plugin updates...", "Manual check finished."]
        );
        assert!(reply.summary.components.is_empty());
        assert!(paths.config_dir.join("config.yaml").exists());
    }

    #[tokio::test]
    async fn job_without_plugins_dir_fails() {
        let tmp = TempDir::new().unwrap();
        let paths = paths(&tmp);
        let reconciler = Reconciler::for_state_dir(&paths.state_dir);

        let err = run_job(&paths, &reconciler, JobSource::Scheduled, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.contains("plugins directory not found"), "{err}");
    }

    #[tokio::test]
    async fn processor_answers_manual_jobs_and_records_state() {
        let tmp = TempDir::new().unwrap();
        let paths = paths(&tmp);
        fs::create_dir_all(&paths.plugins_dir).unwrap();
        let state: SharedState = Arc::new(RwLock::new(DaemonState::default()));
        let (job_tx, job_rx) = mpsc::channel(4);
        let (shutdown_tx, _) = broadcast::channel::<()>(4);

        let jobs = JobQueue {
            rx: job_rx,
            scheduled_pending: Arc::new(AtomicBool::new(false)),
        };
        let processor = tokio::spawn(pass_processor_task(
            paths.clone(),
            Arc::new(Reconciler::for_state_dir(&paths.state_dir)),
            state.clone(),
            jobs,
            CancellationToken::new(),
            shutdown_tx.subscribe(),
        ));

        let reply = enqueue_manual(&job_tx).await.expect("manual pass");
        assert_eq!(reply.replies.len(), 2);
        assert!(state.read().await.last_pass.is_some());

        shutdown_tx.send(()).unwrap();
        processor.await.unwrap().unwrap();
    }

    #[test]
    fn scheduled_pass_is_not_queued_twice() {
        let (job_tx, mut job_rx) = mpsc::channel(16);
        let pending = AtomicBool::new(false);

        assert!(enqueue_scheduled(&job_tx, &pending));
        for _ in 0..5 {
            assert!(!enqueue_scheduled(&job_tx, &pending));
        }
        assert!(job_rx.try_recv().is_ok());
        assert!(job_rx.try_recv().is_err(), "only one scheduled pass is queued");

        // The processor clears the flag once the pass is done.
        pending.store(false, Ordering::Release);
        assert!(enqueue_scheduled(&job_tx, &pending));
        assert!(job_rx.try_recv().is_ok());
    }

    #[test]
    fn full_queue_does_not_leave_scheduled_flag_stuck() {
        let (job_tx, _job_rx) = mpsc::channel(1);
        let filler = PassJob {
            source: JobSource::Manual,
            respond_to: None,
        };
        assert!(job_tx.try_send(filler).is_ok());
        let pending = AtomicBool::new(false);

        assert!(!enqueue_scheduled(&job_tx, &pending));
        assert!(!pending.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn processor_clears_scheduled_flag_after_pass() {
        let tmp = TempDir::new().unwrap();
        let paths = paths(&tmp);
        fs::create_dir_all(&paths.plugins_dir).unwrap();
        let state: SharedState = Arc::new(RwLock::new(DaemonState::default()));
        let pending: ScheduledPending = Arc::new(AtomicBool::new(false));
        let (job_tx, job_rx) = mpsc::channel(4);
        let (shutdown_tx, _) = broadcast::channel::<()>(4);

        assert!(enqueue_scheduled(&job_tx, &pending));
        let jobs = JobQueue {
            rx: job_rx,
            scheduled_pending: pending.clone(),
        };
        let processor = tokio::spawn(pass_processor_task(
            paths.clone(),
            Arc::new(Reconciler::for_state_dir(&paths.state_dir)),
            state.clone(),
            jobs,
            CancellationToken::new(),
            shutdown_tx.subscribe(),
        ));

        // A manual job queued behind it completes only after the scheduled pass.
        enqueue_manual(&job_tx).await.expect("manual pass");
        assert!(!pending.load(Ordering::Acquire));
        assert!(enqueue_scheduled(&job_tx, &pending));

        shutdown_tx.send(()).unwrap();
        processor.await.unwrap().unwrap();
    }
}
