//! IPC core for the Silk webview runtime.
//!
//! Mediates a typed request/response channel between a native webview and a
//! backend of registered command handlers. The native window and webview are
//! external collaborators reached through [`HostWebview`]; the envelope
//! codec, permission engine, router, reply pump, and the external handler
//! bridge live here.

pub mod bridge_script;
mod builtin;
pub mod config;
pub mod envelope;
pub mod error;
pub mod external;
pub mod permissions;
pub mod reply;
pub mod router;
pub mod runtime;
pub mod user_module;

pub use crate::bridge_script::{BRIDGE_SCRIPT, MAX_PENDING_INVOKES};
pub use crate::config::{
    FsPermissionsConfig, ModeAConfig, PermissionsConfig, RuntimeConfig, ShellPermissionsConfig,
};
pub use crate::envelope::{EnvelopeError, InvokeRequest, Response};
pub use crate::error::{CommandError, ErrorCode};
pub use crate::external::{ExternalBridge, MAX_RESPONSE_LINE};
pub use crate::permissions::{NamespaceGrant, PathAccess, PermissionPolicy};
pub use crate::reply::{ReplyPump, REPLY_QUEUE_CAP};
pub use crate::router::{RequestContext, Router};
pub use crate::runtime::{Runtime, RuntimeBuilder};
pub use crate::user_module::{HostRegistrar, NoopModule, UserModule};
pub use serde_json;
pub use serde_json::Value;

/// Capabilities the native layer provides to the runtime.
///
/// `post_script` is guaranteed by the host to evaluate the script on the UI
/// thread. `schedule_on_ui` arranges exactly one UI-thread invocation of the
/// callback; the host must never run it inside the webview's message
/// callback stack.
pub trait HostWebview: Send + Sync {
    fn post_script(&self, script: &str);
    fn schedule_on_ui(&self, callback: Box<dyn FnOnce() + Send>);
}
