use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::warn;

use crate::HostWebview;

pub const REPLY_QUEUE_CAP: usize = 1024;

struct PumpState {
    queue: VecDeque<String>,
    flush_scheduled: bool,
}

/// FIFO of already-serialized reply scripts, flushed on the UI thread.
///
/// `enqueue` may run on any thread; it schedules at most one pending
/// UI-thread wake-up. `flush` runs on the UI thread only and never posts a
/// script while holding the lock, so a `post_script` that causes another
/// `enqueue` simply extends the next flush cycle.
pub struct ReplyPump {
    host: Arc<dyn HostWebview>,
    inner: Mutex<PumpState>,
    weak_self: Weak<ReplyPump>,
    dropped: AtomicU64,
}

impl ReplyPump {
    pub fn new(host: Arc<dyn HostWebview>) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            host,
            inner: Mutex::new(PumpState {
                queue: VecDeque::new(),
                flush_scheduled: false,
            }),
            weak_self: weak_self.clone(),
            dropped: AtomicU64::new(0),
        })
    }

    pub fn enqueue(&self, script: String) {
        let schedule = {
            let mut state = self.lock_state();

            if state.queue.len() >= REPLY_QUEUE_CAP {
                drop(state);
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 || dropped.is_power_of_two() {
                    warn!(
                        cap = REPLY_QUEUE_CAP,
                        dropped, "reply queue full; dropped reply script"
                    );
                }
                return;
            }

            state.queue.push_back(script);
            if state.flush_scheduled {
                false
            } else {
                state.flush_scheduled = true;
                true
            }
        };

        if schedule {
            if let Some(pump) = self.weak_self.upgrade() {
                self.host
                    .schedule_on_ui(Box::new(move || pump.flush()));
            }
        }
    }

    /// Drain and evaluate every queued script in enqueue order. UI thread
    /// only.
    pub fn flush(&self) {
        let drained: Vec<String> = {
            let mut state = self.lock_state();
            state.flush_scheduled = false;
            state.queue.drain(..).collect()
        };

        for script in drained {
            self.host.post_script(&script);
        }
    }

    pub fn pending(&self) -> usize {
        self.lock_state().queue.len()
    }

    fn lock_state(&self) -> MutexGuard<'_, PumpState> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
