use std::time::Duration;

/// Client-side tunables. No TLS or extension config lives here — both are
/// out of scope (see DESIGN.md).
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Caps a single frame's payload; enforced by the connection layer on
    /// top of the codec's own `MAX_PAYLOAD_LEN` ceiling.
    pub max_frame_size: usize,
    /// Caps the total size of a reassembled fragmented message.
    pub max_message_size: usize,
    /// How long the client waits for the server's handshake response.
    pub handshake_timeout: Duration,
    /// How long the read loop waits for payload bytes once a frame header
    /// has started arriving, guarding against a peer that opens a frame
    /// and then goes silent.
    pub read_timeout: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        WebSocketConfig {
            max_frame_size: 16 << 20,
            max_message_size: 64 << 20,
            handshake_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(5),
        }
    }
}
