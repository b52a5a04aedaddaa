use std::sync::Mutex;
use std::time::{Duration, Instant};

use silk_runtime::HostWebview;

/// Recording host double. Scheduled callbacks run immediately on the
/// calling thread, which stands in for the host's UI-thread scheduling.
#[derive(Default)]
pub struct FakeHost {
    scripts: Mutex<Vec<String>>,
}

impl HostWebview for FakeHost {
    fn post_script(&self, script: &str) {
        self.scripts.lock().expect("lock scripts").push(script.to_string());
    }

    fn schedule_on_ui(&self, callback: Box<dyn FnOnce() + Send>) {
        callback();
    }
}

impl FakeHost {
    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().expect("lock scripts").clone()
    }

    pub fn wait_for_scripts(&self, count: usize, timeout: Duration) -> Vec<String> {
        let deadline = Instant::now() + timeout;
        loop {
            let scripts = self.scripts();
            if scripts.len() >= count {
                return scripts;
            }
            if Instant::now() >= deadline {
                panic!(
                    "timed out waiting for {count} reply scripts; have {}",
                    scripts.len()
                );
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}

/// Unwrap the JSON payload out of a `__dispatch` reply script.
pub fn script_payload(script: &str) -> serde_json::Value {
    let inner = script
        .strip_prefix("window.__silk && window.__silk.__dispatch(")
        .expect("script prefix")
        .strip_suffix(");")
        .expect("script suffix");
    serde_json::from_str(inner).expect("script payload is JSON")
}
