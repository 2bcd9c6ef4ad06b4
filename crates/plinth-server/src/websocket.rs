//! WebSocket-based live reload.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Path of the live-reload WebSocket endpoint.
pub const RELOAD_SOCKET_PATH: &str = "/__livereload";

/// Path the client script is served from.
pub const RELOAD_SCRIPT_PATH: &str = "/__livereload.js";

/// Messages sent to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    /// Connection established
    Connected,

    /// Full page reload
    Reload,

    /// Re-fetch one stylesheet without reloading the page
    Css {
        /// URL path of the stylesheet (e.g. "/css/all.min.css")
        path: String,
    },
}

/// Hub for broadcasting reload messages to every connected browser.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    sender: broadcast::Sender<ReloadMessage>,
}

impl ReloadHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected clients.
    pub fn send(&self, msg: ReloadMessage) {
        // No receivers is fine
        let _ = self.sender.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.sender.subscribe()
    }

    /// Number of connected clients.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Client-side live-reload script.
///
/// Connects back to whatever host served the page, so it works on any port.
pub fn reload_client_script() -> String {
    format!(
        r#"
(function() {{
  'use strict';

  var protocol = location.protocol === 'https:' ? 'wss:' : 'ws:';
  var ws = new WebSocket(protocol + '//' + location.host + '{socket}');

  function refreshCss(path) {{
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    var found = false;
    links.forEach(function(link) {{
      var url = new URL(link.href, location.href);
      if (url.pathname === path) {{
        url.searchParams.set('livereload', Date.now());
        link.href = url.toString();
        found = true;
      }}
    }});
    if (!found) {{
      location.reload();
    }}
  }}

  ws.onmessage = function(event) {{
    var msg = JSON.parse(event.data);

    switch (msg.type) {{
      case 'reload':
        location.reload();
        break;

      case 'css':
        refreshCss(msg.path);
        break;

      case 'connected':
        console.log('[livereload] connected');
        break;
    }}
  }};

  ws.onclose = function() {{
    console.log('[livereload] disconnected, retrying');
    setTimeout(function() {{
      location.reload();
    }}, 1000);
  }};
}})();
"#,
        socket = RELOAD_SOCKET_PATH
    )
}
