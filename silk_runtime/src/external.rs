//! External handler bridge ("Mode A").
//!
//! Commands with no in-process route are forwarded to a long-lived child
//! process speaking newline-delimited JSON on its standard streams: one
//! request line on stdin, one `{"ok":...,"result"|"error":...}` line on
//! stdout. A dedicated worker owns the child and processes requests
//! strictly FIFO; the child is started lazily on first use. A malformed or
//! oversized reply line is answered with a protocol error for that request
//! only; a broken child (spawn failure, closed or unreadable stdout)
//! latches the bridge into a disabled state; there is no restart policy.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ModeAConfig;
use crate::envelope::{serialize_invoke, InvokeRequest};
use crate::error::ErrorCode;
use crate::reply::ReplyPump;
use crate::router::Router;

/// Maximum accepted length of one response line from the child.
pub const MAX_RESPONSE_LINE: usize = 2 * 1024 * 1024;

const UNAVAILABLE_MESSAGE: &str = "External handler bridge is unavailable";

struct BridgeQueue {
    jobs: VecDeque<InvokeRequest>,
    shutting_down: bool,
}

struct BridgeShared {
    queue: Mutex<BridgeQueue>,
    available: Condvar,
    disabled: AtomicBool,
    child: Mutex<Option<Child>>,
    argv: Vec<String>,
    router: Arc<Router>,
    pump: Arc<ReplyPump>,
}

pub struct ExternalBridge {
    shared: Arc<BridgeShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ExternalBridge {
    /// Start the worker for an enabled configuration. Returns `None` when
    /// the bridge is disabled or misconfigured, in which case unknown
    /// commands fall back to `Command not found`.
    pub fn start(config: &ModeAConfig, router: Arc<Router>, pump: Arc<ReplyPump>) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        if config.argv.is_empty() {
            warn!("mode_a is enabled but argv is empty; bridge not started");
            return None;
        }

        let shared = Arc::new(BridgeShared {
            queue: Mutex::new(BridgeQueue {
                jobs: VecDeque::new(),
                shutting_down: false,
            }),
            available: Condvar::new(),
            disabled: AtomicBool::new(false),
            child: Mutex::new(None),
            argv: config.argv.clone(),
            router,
            pump,
        });

        let worker_shared = Arc::clone(&shared);
        let worker = match thread::Builder::new()
            .name("silk-mode-a".to_string())
            .spawn(move || worker_loop(worker_shared))
        {
            Ok(handle) => handle,
            Err(err) => {
                warn!(error = %err, "failed to start external bridge worker");
                return None;
            }
        };

        Some(Self {
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Hand a request to the worker queue. The request is owned by the
    /// worker from here on; nothing is shared with the UI-thread parse.
    pub fn submit(&self, request: InvokeRequest) {
        {
            let mut queue = lock(&self.shared.queue);
            if queue.shutting_down {
                return;
            }
            queue.jobs.push_back(request);
        }
        self.shared.available.notify_one();
    }

    pub fn is_disabled(&self) -> bool {
        self.shared.disabled.load(Ordering::SeqCst)
    }

    /// Signal the worker, kill the current child, and join. Killing the
    /// child unblocks a worker stuck on a read from a hung handler.
    pub fn shutdown(&self) {
        {
            let mut queue = lock(&self.shared.queue);
            if queue.shutting_down {
                return;
            }
            queue.shutting_down = true;
        }
        self.shared.available.notify_all();
        kill_child(&self.shared);

        let handle = lock(&self.worker).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("external bridge worker panicked during shutdown");
            }
        }
    }
}

impl Drop for ExternalBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct ChildIo {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

enum BridgeFault {
    /// The child is gone (spawn failure, closed stream, I/O error).
    Unavailable(String),
    /// The child answered, but not with one well-formed JSON line.
    Protocol(String),
}

#[derive(Debug, Deserialize)]
struct HostReply {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

fn worker_loop(shared: Arc<BridgeShared>) {
    let mut io: Option<ChildIo> = None;

    while let Some(request) = next_job(&shared) {
        let callback = request.callback;
        let cmd = request.cmd.clone();

        if shared.disabled.load(Ordering::SeqCst) {
            finish(
                &shared,
                &cmd,
                Router::build_error_script(callback, ErrorCode::BridgeUnavailable, UNAVAILABLE_MESSAGE),
                false,
            );
            continue;
        }

        if io.is_none() {
            match spawn_child(&shared) {
                Ok(new_io) => io = Some(new_io),
                Err(message) => {
                    shared.disabled.store(true, Ordering::SeqCst);
                    warn!(error = %message, "external bridge disabled");
                    finish(
                        &shared,
                        &cmd,
                        Router::build_error_script(callback, ErrorCode::BridgeUnavailable, &message),
                        false,
                    );
                    continue;
                }
            }
        }
        let Some(child_io) = io.as_mut() else {
            continue;
        };

        match exchange(child_io, &request) {
            Ok(reply) => {
                let success = reply.ok;
                let script = if reply.ok {
                    Router::build_success_script(callback, reply.result.unwrap_or(Value::Null))
                } else {
                    Router::build_error_script(
                        callback,
                        ErrorCode::InternalError,
                        &error_message(reply.error),
                    )
                };
                finish(&shared, &cmd, script, success);
            }
            Err(BridgeFault::Protocol(message)) => {
                debug!(cmd = %cmd, error = %message, "external handler protocol fault");
                finish(
                    &shared,
                    &cmd,
                    Router::build_error_script(callback, ErrorCode::BridgeProtocol, &message),
                    false,
                );
            }
            Err(BridgeFault::Unavailable(message)) => {
                shared.disabled.store(true, Ordering::SeqCst);
                warn!(error = %message, "external bridge disabled");
                io = None;
                kill_child(&shared);
                finish(
                    &shared,
                    &cmd,
                    Router::build_error_script(callback, ErrorCode::BridgeUnavailable, &message),
                    false,
                );
            }
        }
    }

    kill_child(&shared);
}

fn next_job(shared: &BridgeShared) -> Option<InvokeRequest> {
    let mut queue = lock(&shared.queue);
    loop {
        if queue.shutting_down {
            return None;
        }
        if let Some(job) = queue.jobs.pop_front() {
            return Some(job);
        }
        queue = match shared.available.wait(queue) {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
    }
}

fn spawn_child(shared: &BridgeShared) -> Result<ChildIo, String> {
    let (program, args) = shared
        .argv
        .split_first()
        .ok_or_else(|| "external handler argv is empty".to_string())?;

    info!(program = %program, "starting external handler process");
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|err| format!("failed to start external handler: {err}"))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| "external handler stdin unavailable".to_string())?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| "external handler stdout unavailable".to_string())?;

    *lock(&shared.child) = Some(child);

    Ok(ChildIo {
        stdin,
        stdout: BufReader::new(stdout),
    })
}

/// One line out, one line in.
fn exchange(io: &mut ChildIo, request: &InvokeRequest) -> Result<HostReply, BridgeFault> {
    let mut line = serialize_invoke(request);
    line.push('\n');
    io.stdin
        .write_all(line.as_bytes())
        .and_then(|_| io.stdin.flush())
        .map_err(|err| BridgeFault::Unavailable(format!("external handler stdin closed: {err}")))?;

    let mut reply_line = String::new();
    let read = (&mut io.stdout)
        .take(MAX_RESPONSE_LINE as u64 + 1)
        .read_line(&mut reply_line)
        .map_err(|err| {
            BridgeFault::Unavailable(format!("external handler stdout unreadable: {err}"))
        })?;

    if read == 0 {
        return Err(BridgeFault::Unavailable(
            "external handler stdout closed".to_string(),
        ));
    }
    if !reply_line.ends_with('\n') {
        if reply_line.len() > MAX_RESPONSE_LINE {
            drain_line_tail(&mut io.stdout)?;
            return Err(BridgeFault::Protocol(format!(
                "external handler response exceeds {MAX_RESPONSE_LINE} bytes"
            )));
        }
        return Err(BridgeFault::Unavailable(
            "external handler stdout closed mid-line".to_string(),
        ));
    }

    serde_json::from_str(reply_line.trim_end())
        .map_err(|err| BridgeFault::Protocol(format!("malformed external handler response: {err}")))
}

/// Discard the unread remainder of an oversized line, up to and including
/// its terminating newline. Without this, the next request would read the
/// stale tail as its own reply and the stream would stay desynchronized.
fn drain_line_tail<R: BufRead>(stdout: &mut R) -> Result<(), BridgeFault> {
    loop {
        let buffer = stdout.fill_buf().map_err(|err| {
            BridgeFault::Unavailable(format!("external handler stdout unreadable: {err}"))
        })?;
        if buffer.is_empty() {
            return Err(BridgeFault::Unavailable(
                "external handler stdout closed mid-line".to_string(),
            ));
        }
        match buffer.iter().position(|&byte| byte == b'\n') {
            Some(index) => {
                stdout.consume(index + 1);
                return Ok(());
            }
            None => {
                let consumed = buffer.len();
                stdout.consume(consumed);
            }
        }
    }
}

fn error_message(error: Option<Value>) -> String {
    match error {
        Some(Value::String(message)) => message,
        Some(Value::Object(map)) => match map.get("message").and_then(Value::as_str) {
            Some(message) => message.to_string(),
            None => Value::Object(map).to_string(),
        },
        Some(other) => other.to_string(),
        None => "external handler reported failure".to_string(),
    }
}

fn finish(shared: &BridgeShared, cmd: &str, script: String, success: bool) {
    shared.pump.enqueue(script);
    shared.router.notify_after(cmd, success);
}

fn kill_child(shared: &BridgeShared) {
    if let Some(mut child) = lock(&shared.child).take() {
        let _ = child.kill();
        let _ = child.wait();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
