use serde_json::json;

use crate::router::Router;

pub(crate) fn register_builtin(router: &mut Router) {
    router.register("silk:ping", None, |_ctx, _args| Ok(json!("pong")));

    router.register("silk:appInfo", None, |_ctx, _args| {
        Ok(json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }))
    });
}
