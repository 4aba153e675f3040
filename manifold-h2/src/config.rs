//! Stream manager configuration.

use serde::{Deserialize, Serialize};

/// Options for [`crate::Http2StreamManager::new`].
///
/// The endpoint and socket-level fields describe the connections the
/// underlying pool establishes; the manager itself validates them and hands
/// them through. When `tls` is false the pool is expected to speak HTTP/2
/// with prior knowledge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamManagerOptions {
    /// Endpoint host name or address.
    pub host: String,

    /// Endpoint port.
    pub port: u16,

    /// Whether connections negotiate TLS. False implies h2 prior knowledge.
    pub tls: bool,

    /// Propagate read back-pressure from stream consumers to the socket.
    pub enable_read_back_pressure: bool,

    /// Upper bound on pool connections.
    pub max_connections: usize,

    /// SETTINGS_INITIAL_WINDOW_SIZE sent on new connections; 0 keeps the
    /// protocol default.
    pub initial_window_size: u32,

    /// Working estimate of SETTINGS_MAX_CONCURRENT_STREAMS on a fresh
    /// connection, used to size new-connection requests and to cap how many
    /// acquisitions bind to one connection.
    pub assumed_max_concurrent_streams: usize,
}

impl Default for StreamManagerOptions {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 0,
            tls: true,
            enable_read_back_pressure: false,
            max_connections: 2,
            initial_window_size: 0,
            // The protocol imposes no limit until SETTINGS says otherwise.
            assumed_max_concurrent_streams: u32::MAX as usize,
        }
    }
}

impl StreamManagerOptions {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.host.is_empty() {
            return Err("host must not be empty".into());
        }
        if self.max_connections == 0 {
            return Err("max_connections must be at least 1".into());
        }
        if self.assumed_max_concurrent_streams == 0 {
            return Err("assumed_max_concurrent_streams must be at least 1".into());
        }
        Ok(())
    }
}
