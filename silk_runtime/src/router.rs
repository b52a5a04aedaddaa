use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::envelope::{InvokeRequest, Response};
use crate::error::{CommandError, ErrorCode};
use crate::permissions::{permission_id, PermissionPolicy};

/// Context handed to every handler invocation. Carries the policy so
/// path-scoped plugins can run their own `allows_path` checks.
pub struct RequestContext {
    pub callback: i64,
    pub cmd: String,
    pub policy: Arc<PermissionPolicy>,
}

pub type Handler =
    Arc<dyn Fn(&RequestContext, Value) -> Result<Value, CommandError> + Send + Sync>;

struct Route {
    handler: Handler,
    permission_key: Option<String>,
}

type BeforeHook = Arc<dyn Fn(&str) + Send + Sync>;
type AfterHook = Arc<dyn Fn(&str, bool) + Send + Sync>;

/// The command registry. Registration happens at startup through `&mut`
/// access; once the runtime wraps the router in an `Arc`, the map is only
/// ever read.
pub struct Router {
    routes: HashMap<String, Route>,
    policy: Arc<PermissionPolicy>,
    before: Option<BeforeHook>,
    after: Option<AfterHook>,
}

impl Router {
    pub fn new(policy: Arc<PermissionPolicy>) -> Self {
        Self {
            routes: HashMap::new(),
            policy,
            before: None,
            after: None,
        }
    }

    /// Insert a route; last registration wins on a duplicate identifier.
    pub fn register<F>(&mut self, cmd: &str, permission_key: Option<&str>, handler: F)
    where
        F: Fn(&RequestContext, Value) -> Result<Value, CommandError> + Send + Sync + 'static,
    {
        self.routes.insert(
            cmd.to_string(),
            Route {
                handler: Arc::new(handler),
                permission_key: permission_key.map(str::to_string),
            },
        );
    }

    pub fn has(&self, cmd: &str) -> bool {
        self.routes.contains_key(cmd)
    }

    pub fn policy(&self) -> &Arc<PermissionPolicy> {
        &self.policy
    }

    /// Hook run before every dispatch, local or remote. Must not block.
    pub fn on_before<F>(&mut self, hook: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(hook));
    }

    /// Hook run after every dispatch with the outcome. Must not block.
    pub fn on_after<F>(&mut self, hook: F)
    where
        F: Fn(&str, bool) + Send + Sync + 'static,
    {
        self.after = Some(Arc::new(hook));
    }

    pub(crate) fn notify_before(&self, cmd: &str) {
        if let Some(hook) = &self.before {
            hook(cmd);
        }
    }

    pub(crate) fn notify_after(&self, cmd: &str, success: bool) {
        if let Some(hook) = &self.after {
            hook(cmd, success);
        }
    }

    /// Dispatch an invoke to its registered handler and produce the reply
    /// script. Handler failures become error responses; they never escape
    /// the dispatching thread.
    pub fn dispatch(&self, request: &InvokeRequest) -> String {
        self.notify_before(&request.cmd);
        let response = self.dispatch_inner(request);
        self.notify_after(&request.cmd, response.ok);
        response.to_script()
    }

    fn dispatch_inner(&self, request: &InvokeRequest) -> Response {
        let route = match self.routes.get(&request.cmd) {
            Some(route) => route,
            None => {
                return Response::failure(
                    request.callback,
                    ErrorCode::MethodNotFound,
                    "Command not found",
                )
            }
        };

        if let Some(key) = &route.permission_key {
            if !self.policy.allows(&permission_id(key, &request.cmd)) {
                return Response::failure(
                    request.callback,
                    ErrorCode::PermissionDenied,
                    "Command denied by permissions",
                );
            }
        }

        let ctx = RequestContext {
            callback: request.callback,
            cmd: request.cmd.clone(),
            policy: Arc::clone(&self.policy),
        };

        match (route.handler)(&ctx, request.args.clone()) {
            Ok(value) => Response::success(request.callback, value),
            Err(err) => Response::failure(request.callback, err.code, err.message),
        }
    }

    /// Build a success reply without going through `dispatch`. Used by the
    /// external handler bridge.
    pub fn build_success_script(callback: i64, value: Value) -> String {
        Response::success(callback, value).to_script()
    }

    /// Build an error reply without going through `dispatch`.
    pub fn build_error_script(callback: i64, code: ErrorCode, message: &str) -> String {
        Response::failure(callback, code, message).to_script()
    }
}
