//! In-process user module registration ("Mode B"). Conformance is a trait
//! bound checked at compile time; the registrar exposes nothing but
//! `register`.

use serde_json::Value;

use crate::error::CommandError;
use crate::router::{RequestContext, Router};

/// The narrow surface a user module sees. Forwards into the router.
pub struct HostRegistrar<'a> {
    router: &'a mut Router,
}

impl<'a> HostRegistrar<'a> {
    pub(crate) fn new(router: &'a mut Router) -> Self {
        Self { router }
    }

    pub fn register<F>(&mut self, cmd: &str, handler: F)
    where
        F: Fn(&RequestContext, Value) -> Result<Value, CommandError> + Send + Sync + 'static,
    {
        self.router.register(cmd, None, handler);
    }
}

/// An externally supplied module. Implementations register their commands
/// at startup and add no runtime behavior beyond what the router already
/// guarantees.
pub trait UserModule {
    fn register(host: &mut HostRegistrar<'_>);
}

/// The default stub: registers nothing.
pub struct NoopModule;

impl UserModule for NoopModule {
    fn register(_host: &mut HostRegistrar<'_>) {}
}

/// Adapt a free `fn(&mut HostRegistrar)` into a [`UserModule`]. The
/// expansion fails to compile when the function does not match the
/// registration signature.
#[macro_export]
macro_rules! user_module {
    ($name:ident, $register:path) => {
        pub struct $name;

        impl $crate::UserModule for $name {
            fn register(host: &mut $crate::HostRegistrar<'_>) {
                $register(host)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::PermissionPolicy;
    use serde_json::json;
    use std::sync::Arc;

    fn register_greeter(host: &mut HostRegistrar<'_>) {
        host.register("demo:greet", |_ctx, _args| Ok(json!("hello")));
    }

    user_module!(GreeterModule, register_greeter);

    #[test]
    fn macro_adapted_module_registers_through_the_router() {
        let mut router = Router::new(Arc::new(PermissionPolicy::baseline()));
        GreeterModule::register(&mut HostRegistrar::new(&mut router));
        assert!(router.has("demo:greet"));
    }

    #[test]
    fn noop_module_registers_nothing() {
        let mut router = Router::new(Arc::new(PermissionPolicy::baseline()));
        NoopModule::register(&mut HostRegistrar::new(&mut router));
        assert!(!router.has("demo:greet"));
    }
}
