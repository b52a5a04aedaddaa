//! The single `Runtime` value constructed at startup. Owns the router,
//! policy, reply pump, and optional external bridge; callbacks reach it
//! through a context pointer, never through module globals.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::builtin::register_builtin;
use crate::config::RuntimeConfig;
use crate::envelope::parse_invoke;
use crate::error::{CommandError, ErrorCode};
use crate::external::ExternalBridge;
use crate::permissions::PermissionPolicy;
use crate::reply::ReplyPump;
use crate::router::{RequestContext, Router};
use crate::user_module::{HostRegistrar, UserModule};
use crate::HostWebview;

/// Collects routes and hooks before the first dispatch. Building consumes
/// the registry, so registration after startup is unrepresentable.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    policy: Arc<PermissionPolicy>,
    router: Router,
}

impl RuntimeBuilder {
    pub fn new(config: RuntimeConfig) -> Self {
        let policy = Arc::new(config.permissions.to_policy());
        let mut router = Router::new(Arc::clone(&policy));
        register_builtin(&mut router);
        Self {
            config,
            policy,
            router,
        }
    }

    pub fn route<F>(mut self, cmd: &str, permission_key: Option<&str>, handler: F) -> Self
    where
        F: Fn(&RequestContext, Value) -> Result<Value, CommandError> + Send + Sync + 'static,
    {
        self.router.register(cmd, permission_key, handler);
        self
    }

    pub fn with_user_module<M: UserModule>(mut self) -> Self {
        M::register(&mut HostRegistrar::new(&mut self.router));
        self
    }

    pub fn on_before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.router.on_before(hook);
        self
    }

    pub fn on_after<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, bool) + Send + Sync + 'static,
    {
        self.router.on_after(hook);
        self
    }

    pub fn build(self, host: Arc<dyn HostWebview>) -> Runtime {
        let router = Arc::new(self.router);
        let pump = ReplyPump::new(host);
        let bridge =
            ExternalBridge::start(&self.config.mode_a, Arc::clone(&router), Arc::clone(&pump));
        Runtime {
            router,
            policy: self.policy,
            pump,
            bridge,
        }
    }
}

pub struct Runtime {
    router: Arc<Router>,
    policy: Arc<PermissionPolicy>,
    pump: Arc<ReplyPump>,
    bridge: Option<ExternalBridge>,
}

impl Runtime {
    /// The single entry point the native layer calls when the webview
    /// posts a message. Runs on the UI thread.
    ///
    /// Registered commands dispatch synchronously here; everything else is
    /// handed to the external bridge when one is running and the policy
    /// permits the command. Envelopes that fail to decode carry no
    /// trustworthy callback and are dropped with a diagnostic.
    pub fn handle_webview_message(&self, raw: &str) {
        let request = match parse_invoke(raw) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "dropping malformed webview envelope");
                return;
            }
        };

        if self.router.has(&request.cmd) {
            let script = self.router.dispatch(&request);
            self.pump.enqueue(script);
            return;
        }

        self.router.notify_before(&request.cmd);
        match &self.bridge {
            Some(bridge) => {
                if self.policy.allows(&request.cmd) {
                    bridge.submit(request);
                } else {
                    self.pump.enqueue(Router::build_error_script(
                        request.callback,
                        ErrorCode::PermissionDenied,
                        "Command denied by permissions",
                    ));
                    self.router.notify_after(&request.cmd, false);
                }
            }
            None => {
                self.pump.enqueue(Router::build_error_script(
                    request.callback,
                    ErrorCode::MethodNotFound,
                    "Command not found",
                ));
                self.router.notify_after(&request.cmd, false);
            }
        }
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn policy(&self) -> &Arc<PermissionPolicy> {
        &self.policy
    }

    pub fn reply_pump(&self) -> &Arc<ReplyPump> {
        &self.pump
    }

    /// Stop the external bridge worker and its child, if any.
    pub fn shutdown(&self) {
        if let Some(bridge) = &self.bridge {
            bridge.shutdown();
        }
    }
}
