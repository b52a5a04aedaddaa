mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{script_payload, FakeHost};
use serde_json::json;
use silk_runtime::{CommandError, HostWebview, PathAccess, Runtime, RuntimeBuilder, RuntimeConfig};

fn runtime_with_defaults(host: Arc<FakeHost>) -> Runtime {
    RuntimeBuilder::new(RuntimeConfig::default()).build(host)
}

#[test]
fn ping_produces_the_exact_interface_script() {
    let host = Arc::new(FakeHost::default());
    let runtime = runtime_with_defaults(Arc::clone(&host));

    runtime.handle_webview_message(r#"{"kind":"invoke","callback":1,"cmd":"silk:ping","args":null}"#);

    assert_eq!(
        host.scripts(),
        vec![
            r#"window.__silk && window.__silk.__dispatch({"kind":"response","callback":1,"ok":true,"result":"pong"});"#
                .to_string()
        ]
    );
}

#[test]
fn app_info_reports_name_and_version() {
    let host = Arc::new(FakeHost::default());
    let runtime = runtime_with_defaults(Arc::clone(&host));

    runtime.handle_webview_message(r#"{"kind":"invoke","callback":2,"cmd":"silk:appInfo"}"#);

    let payload = script_payload(&host.scripts()[0]);
    assert_eq!(payload["ok"], json!(true));
    assert_eq!(payload["callback"], json!(2));
    assert_eq!(payload["result"]["name"], json!("silk_runtime"));
    assert!(payload["result"]["version"].is_string());
}

#[test]
fn unknown_command_without_bridge_is_not_found() {
    let host = Arc::new(FakeHost::default());
    let runtime = runtime_with_defaults(Arc::clone(&host));

    runtime.handle_webview_message(r#"{"kind":"invoke","callback":7,"cmd":"nope","args":{}}"#);

    let payload = script_payload(&host.scripts()[0]);
    assert_eq!(payload["ok"], json!(false));
    assert_eq!(payload["callback"], json!(7));
    assert_eq!(payload["error"]["code"], json!("METHOD_NOT_FOUND"));
    assert_eq!(payload["error"]["message"], json!("Command not found"));
}

#[test]
fn denied_command_never_reaches_its_handler() {
    let config: RuntimeConfig = serde_json::from_value(json!({
        "permissions": {"deny_commands": ["fs:readText"]}
    }))
    .expect("config");

    let host = Arc::new(FakeHost::default());
    let runtime = RuntimeBuilder::new(config)
        .route("silk:fs/readText", Some("fs"), |_ctx, _args| {
            panic!("handler must not run for a denied command");
        })
        .build(Arc::clone(&host) as Arc<dyn HostWebview>);

    runtime.handle_webview_message(
        r#"{"kind":"invoke","callback":3,"cmd":"silk:fs/readText","args":{"path":"/tmp/x"}}"#,
    );

    let payload = script_payload(&host.scripts()[0]);
    assert_eq!(payload["ok"], json!(false));
    assert_eq!(payload["error"]["code"], json!("PERMISSION_DENIED"));
    assert_eq!(payload["error"]["message"], json!("Command denied by permissions"));
}

#[test]
fn path_outside_the_read_roots_is_rejected_by_the_handler() {
    let config: RuntimeConfig = serde_json::from_value(json!({
        "permissions": {"fs": {"read_roots": ["/srv/app"]}}
    }))
    .expect("config");

    let host = Arc::new(FakeHost::default());
    let runtime = RuntimeBuilder::new(config)
        .route("fs/readText", Some("fs"), |ctx, args| {
            let path = args
                .get("path")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| CommandError::internal("MissingPath"))?;
            if !ctx.policy.allows_path(std::path::Path::new(path), PathAccess::Read) {
                return Err(CommandError::permission_denied(format!(
                    "Path is outside the permitted read scope: {path}"
                )));
            }
            Ok(json!("contents"))
        })
        .build(Arc::clone(&host) as Arc<dyn HostWebview>);

    runtime.handle_webview_message(
        r#"{"kind":"invoke","callback":4,"cmd":"fs/readText","args":{"path":"/etc/passwd"}}"#,
    );

    let payload = script_payload(&host.scripts()[0]);
    assert_eq!(payload["ok"], json!(false));
    assert_eq!(
        payload["error"]["message"],
        json!("Path is outside the permitted read scope: /etc/passwd")
    );

    runtime.handle_webview_message(
        r#"{"kind":"invoke","callback":5,"cmd":"fs/readText","args":{"path":"/srv/app/notes.txt"}}"#,
    );
    let payload = script_payload(&host.scripts()[1]);
    assert_eq!(payload["ok"], json!(true));
    assert_eq!(payload["result"], json!("contents"));
}

#[test]
fn handler_failure_surfaces_its_error_name() {
    let host = Arc::new(FakeHost::default());
    let runtime = RuntimeBuilder::new(RuntimeConfig::default())
        .route("demo:setText", None, |_ctx, args| {
            if args.get("text").is_none() {
                return Err(CommandError::internal("MissingText"));
            }
            Ok(serde_json::Value::Null)
        })
        .build(Arc::clone(&host) as Arc<dyn HostWebview>);

    runtime.handle_webview_message(r#"{"kind":"invoke","callback":5,"cmd":"demo:setText","args":{}}"#);

    let payload = script_payload(&host.scripts()[0]);
    assert_eq!(payload["ok"], json!(false));
    assert_eq!(payload["error"]["code"], json!("INTERNAL_ERROR"));
    assert!(payload["error"]["message"]
        .as_str()
        .expect("message")
        .contains("MissingText"));
}

#[test]
fn malformed_envelopes_enqueue_nothing() {
    let host = Arc::new(FakeHost::default());
    let runtime = runtime_with_defaults(Arc::clone(&host));

    runtime.handle_webview_message("not json at all");
    runtime.handle_webview_message("[1,2,3]");
    runtime.handle_webview_message(r#"{"kind":"invoke","cmd":"silk:ping"}"#);
    runtime.handle_webview_message(r#"{"kind":"event","callback":1,"cmd":"silk:ping"}"#);

    assert!(host.scripts().is_empty());
    assert_eq!(runtime.reply_pump().pending(), 0);
}

#[test]
fn every_parsed_request_gets_exactly_one_response() {
    let host = Arc::new(FakeHost::default());
    let runtime = runtime_with_defaults(Arc::clone(&host));

    for callback in [0_i64, 1, 9007199254740992] {
        runtime.handle_webview_message(&format!(
            r#"{{"kind":"invoke","callback":{callback},"cmd":"silk:ping"}}"#
        ));
    }

    let scripts = host.wait_for_scripts(3, Duration::from_secs(1));
    assert_eq!(scripts.len(), 3);
    let callbacks: Vec<i64> = scripts
        .iter()
        .map(|script| script_payload(script)["callback"].as_i64().expect("callback"))
        .collect();
    assert_eq!(callbacks, vec![0, 1, 9007199254740992]);
}

#[test]
fn hooks_observe_local_and_missing_commands() {
    use std::sync::Mutex;

    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let before_seen = Arc::clone(&seen);
    let after_seen = Arc::clone(&seen);

    let host = Arc::new(FakeHost::default());
    let runtime = RuntimeBuilder::new(RuntimeConfig::default())
        .on_before(move |cmd| before_seen.lock().expect("lock").push(format!("before {cmd}")))
        .on_after(move |cmd, ok| after_seen.lock().expect("lock").push(format!("after {cmd} {ok}")))
        .build(Arc::clone(&host) as Arc<dyn HostWebview>);

    runtime.handle_webview_message(r#"{"kind":"invoke","callback":1,"cmd":"silk:ping"}"#);
    runtime.handle_webview_message(r#"{"kind":"invoke","callback":2,"cmd":"missing"}"#);

    let log = seen.lock().expect("lock").clone();
    assert_eq!(
        log,
        vec![
            "before silk:ping".to_string(),
            "after silk:ping true".to_string(),
            "before missing".to_string(),
            "after missing false".to_string(),
        ]
    );
}
