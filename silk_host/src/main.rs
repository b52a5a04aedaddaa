//! Headless stdio host: reads invoke envelopes line by line on stdin and
//! writes the reply scripts the webview would have evaluated to stdout.
//! Stands in for the native window/webview layer during development.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use silk_runtime::{HostWebview, NoopModule, RuntimeBuilder, RuntimeConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Default)]
struct StdioHost {
    scheduled: Mutex<VecDeque<Box<dyn FnOnce() + Send>>>,
}

impl HostWebview for StdioHost {
    fn post_script(&self, script: &str) {
        let stdout = io::stdout();
        let mut writer = stdout.lock();
        if writeln!(writer, "{script}").and_then(|_| writer.flush()).is_err() {
            warn!("failed to write reply script to stdout");
        }
    }

    fn schedule_on_ui(&self, callback: Box<dyn FnOnce() + Send>) {
        lock(&self.scheduled).push_back(callback);
    }
}

impl StdioHost {
    /// Run everything scheduled so far. The main loop calls this between
    /// stdin reads, standing in for the UI event loop.
    fn run_scheduled(&self) {
        loop {
            let Some(callback) = lock(&self.scheduled).pop_front() else {
                return;
            };
            callback();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("silk_host fatal error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let config = load_config()?;
    let host = Arc::new(StdioHost::default());
    let runtime = RuntimeBuilder::new(config)
        .with_user_module::<NoopModule>()
        .build(Arc::clone(&host) as Arc<dyn HostWebview>);

    info!("silk host ready; reading invoke envelopes from stdin");

    let (line_tx, line_rx) = mpsc::channel::<String>();
    let reader_handle = thread::spawn(move || -> io::Result<()> {
        for line in io::stdin().lock().lines() {
            if line_tx.send(line?).is_err() {
                break;
            }
        }
        Ok(())
    });

    loop {
        match line_rx.recv_timeout(Duration::from_millis(25)) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    runtime.handle_webview_message(&line);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        host.run_scheduled();
    }

    // Give in-flight bridge replies a moment to land before teardown.
    for _ in 0..8 {
        thread::sleep(Duration::from_millis(25));
        host.run_scheduled();
    }
    runtime.shutdown();
    host.run_scheduled();

    if reader_handle.is_finished() {
        match reader_handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "stdin reader returned error"),
            Err(err) => warn!(?err, "stdin reader join failed"),
        }
    } else {
        // Avoid hanging process exit on a blocked stdin read during teardown.
        info!("stdin reader still active during shutdown; skipping join");
    }

    Ok(())
}

fn load_config() -> Result<RuntimeConfig> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SILK_CONFIG").ok());

    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("read config file {path}"))?;
            serde_json::from_str(&raw).with_context(|| format!("parse config file {path}"))
        }
        None => Ok(RuntimeConfig::default()),
    }
}
