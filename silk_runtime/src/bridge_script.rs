/// Upper bound on concurrently pending invokes in the webview client.
/// Further calls reject immediately instead of growing the pending map.
pub const MAX_PENDING_INVOKES: usize = 1000;

/// The webview-side client, injected at document start. Idempotent: a
/// second evaluation observes `window.__silk` and returns without touching
/// anything. Transport probe order is part of the external interface.
pub const BRIDGE_SCRIPT: &str = r#"(function () {
  "use strict";
  if (window.__silk) { return; }

  var MAX_PENDING = 1000;
  var nextCallback = 1;
  var pendingCount = 0;
  var pending = Object.create(null);
  var listeners = Object.create(null);

  function findTransport() {
    if (window.webkit && window.webkit.messageHandlers) {
      var handlers = window.webkit.messageHandlers;
      if (handlers.silk) {
        return function (message) { handlers.silk.postMessage(message); };
      }
      if (handlers.silk_ipc) {
        return function (message) { handlers.silk_ipc.postMessage(message); };
      }
    }
    if (window.chrome && window.chrome.webview && window.chrome.webview.postMessage) {
      return function (message) { window.chrome.webview.postMessage(message); };
    }
    if (typeof window.__silkPostMessage === "function") {
      return function (message) { window.__silkPostMessage(message); };
    }
    return null;
  }

  function invoke(cmd, args) {
    return new Promise(function (resolve, reject) {
      if (pendingCount >= MAX_PENDING) {
        reject(new Error("Silk pending invoke limit reached"));
        return;
      }
      var post = findTransport();
      if (!post) {
        reject(new Error("Silk transport unavailable"));
        return;
      }
      var callback = nextCallback++;
      pending[callback] = { resolve: resolve, reject: reject };
      pendingCount++;
      post(JSON.stringify({
        kind: "invoke",
        callback: callback,
        cmd: cmd,
        args: args === undefined ? null : args
      }));
    });
  }

  function listen(event, handler) {
    var subscribers = listeners[event] || (listeners[event] = []);
    subscribers.push(handler);
    return function () {
      var index = subscribers.indexOf(handler);
      if (index !== -1) { subscribers.splice(index, 1); }
    };
  }

  function __dispatch(message) {
    if (!message) { return; }
    if (message.kind === "response") {
      var entry = pending[message.callback];
      if (!entry) { return; }
      delete pending[message.callback];
      pendingCount--;
      if (message.ok) {
        entry.resolve(message.result);
        return;
      }
      var detail = message.error;
      var text = detail && detail.message !== undefined ? detail.message : detail;
      var error = new Error(text);
      if (detail && detail.code !== undefined) { error.code = detail.code; }
      entry.reject(error);
      return;
    }
    if (message.kind === "event") {
      var subscribers = listeners[message.event];
      if (!subscribers) { return; }
      subscribers.slice().forEach(function (handler) { handler(message.payload); });
    }
  }

  window.__silk = { invoke: invoke, listen: listen, __dispatch: __dispatch };
})();
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_guards_against_double_injection() {
        assert!(BRIDGE_SCRIPT.contains("if (window.__silk) { return; }"));
        assert_eq!(BRIDGE_SCRIPT.matches("window.__silk =").count(), 1);
    }

    #[test]
    fn transports_are_probed_in_interface_order() {
        let silk = BRIDGE_SCRIPT.find("handlers.silk.postMessage").expect("webkit silk");
        let silk_ipc = BRIDGE_SCRIPT
            .find("handlers.silk_ipc.postMessage")
            .expect("webkit silk_ipc");
        let chromium = BRIDGE_SCRIPT
            .find("window.chrome.webview.postMessage(message)")
            .expect("chromium transport");
        let custom = BRIDGE_SCRIPT
            .find("window.__silkPostMessage(message)")
            .expect("custom transport");
        assert!(silk < silk_ipc);
        assert!(silk_ipc < chromium);
        assert!(chromium < custom);
    }

    #[test]
    fn missing_transport_rejects_with_recognizable_error() {
        assert!(BRIDGE_SCRIPT.contains("Silk transport unavailable"));
    }

    #[test]
    fn pending_cap_is_embedded_in_the_script() {
        assert!(BRIDGE_SCRIPT.contains(&format!("var MAX_PENDING = {MAX_PENDING_INVOKES};")));
        assert!(BRIDGE_SCRIPT.contains("Silk pending invoke limit reached"));
    }

    #[test]
    fn dispatch_accepts_both_error_shapes() {
        assert!(BRIDGE_SCRIPT.contains("detail.message !== undefined ? detail.message : detail"));
        assert!(BRIDGE_SCRIPT.contains("error.code = detail.code"));
    }
}
