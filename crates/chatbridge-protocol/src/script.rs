//! Scripts evaluated inside the embedded page.
//!
//! Everything here runs in the page's own isolated context. It cannot see
//! host state and reports back only by posting serialized envelopes through
//! `window.ReactNativeWebView.postMessage`. Values coming from the host are
//! always embedded as JSON literals.

use chatbridge_core::Endpoints;

use crate::request::streamed_header_template;
use crate::types::StreamCommand;

/// Text of the provider's overload notice.
pub const FULL_CAPACITY_NOTICE: &str = "ChatGPT is at capacity right now";

const BOOTSTRAP_TEMPLATE: &str = r#"
(() => {
  const post = (type, payload) =>
    window.ReactNativeWebView.postMessage(JSON.stringify({ type, payload }));

  const { fetch: originalFetch } = window;
  window.fetch = async (...args) => {
    const [resource, config] = args;
    post('REQUEST_INTERCEPTED_CONFIG', config);
    return originalFetch(resource, config);
  };

  window.removeThemeSwitcher = () => {
    const svgIcon = document.querySelector('button > svg');
    if (!svgIcon) {
      return;
    }
    const themeSwitchButton = svgIcon.closest('button');
    if (themeSwitchButton) {
      themeSwitchButton.style.display = 'none';
    }
  };

  async function* streamAsyncIterable(stream) {
    const reader = stream.getReader();
    try {
      while (true) {
        const { done, value } = await reader.read();
        if (done) {
          return;
        }
        yield value;
      }
    } finally {
      reader.releaseLock();
    }
  }

  window.sendGptMessage = async ({
    accessToken,
    message,
    messageId,
    newMessageId,
    conversationId,
    timeout,
  }) => {
    const headers = Object.assign({}, __BASE_HEADERS__, { authorization: accessToken });
    const body = {
      action: 'next',
      messages: [
        {
          id: newMessageId,
          role: 'user',
          content: { content_type: 'text', parts: [message] },
        },
      ],
      model: __MODEL__,
      parent_message_id: messageId,
    };
    if (conversationId) {
      body.conversation_id = conversationId;
    }

    const controller = new AbortController();
    const timeoutId = setTimeout(() => {
      post('STREAM_ERROR', { status: 408, statusText: 'Request timed out' });
      controller.abort();
    }, timeout);

    try {
      const res = await originalFetch(__PROMPT_ENDPOINT__, {
        method: 'POST',
        body: JSON.stringify(body),
        headers,
        mode: 'cors',
        credentials: 'include',
        signal: controller.signal,
      });
      clearTimeout(timeoutId);

      if (res.status >= 400 && res.status < 600) {
        post('STREAM_ERROR', { status: res.status, statusText: res.statusText });
        return true;
      }

      const decoder = new TextDecoder();
      for await (const chunk of streamAsyncIterable(res.body)) {
        post('RAW_ACCUMULATED_RESPONSE', decoder.decode(chunk, { stream: true }));
      }
    } catch (e) {
      clearTimeout(timeoutId);
    }
    return true;
  };
})();

true;
"#;

const CAPACITY_PROBE_TEMPLATE: &str = r#"
(() => {
  const xpath = "//div[contains(text(), " + __NOTICE__ + ")]";
  const element = document.evaluate(
    xpath, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null
  ).singleNodeValue;
  if (element) {
    window.removeThemeSwitcher();
    __ON_FOUND__
  }
})();

true;
"#;

fn js_literal(value: &impl serde::Serialize) -> String {
    // serde_json output is valid JS except for U+2028/U+2029 in older engines.
    serde_json::to_string(value)
        .unwrap_or_else(|_| "null".into())
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

/// Script installed once before page content loads: fetch interception,
/// the in-page prompt sender, and the theme switcher remover.
pub fn bootstrap_script(endpoints: &Endpoints, model: &str) -> String {
    BOOTSTRAP_TEMPLATE
        .replace(
            "__BASE_HEADERS__",
            &js_literal(&streamed_header_template(endpoints)),
        )
        .replace("__MODEL__", &js_literal(&model))
        .replace("__PROMPT_ENDPOINT__", &js_literal(&endpoints.prompt_endpoint))
}

/// Ask the page to perform one streamed prompt request.
pub fn send_message_script(command: &StreamCommand) -> String {
    format!("window.sendGptMessage({});\n\ntrue;\n", js_literal(command))
}

/// Probe for the capacity notice and report it with `CHAT_GPT_FULL_CAPACITY`.
pub fn check_full_capacity_script() -> String {
    capacity_probe(
        "window.ReactNativeWebView.postMessage(JSON.stringify({ type: 'CHAT_GPT_FULL_CAPACITY' }));",
    )
}

/// Probe for the capacity notice and only hide the theme switcher.
pub fn remove_theme_switcher_script() -> String {
    capacity_probe("")
}

fn capacity_probe(on_found: &str) -> String {
    // XPath string literal, quoted for XPath and then embedded as JS.
    let xpath_literal = format!("'{}'", FULL_CAPACITY_NOTICE);
    CAPACITY_PROBE_TEMPLATE
        .replace("__NOTICE__", &js_literal(&xpath_literal))
        .replace("__ON_FOUND__", on_found)
}

/// Replace the current document without adding a history entry.
pub fn navigate_script(url: &str) -> String {
    format!(
        "(() => {{\n  window.location.replace({});\n}})();\n\ntrue;\n",
        js_literal(&url)
    )
}
