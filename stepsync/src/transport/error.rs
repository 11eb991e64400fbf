use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("transport is not connected")]
    NotConnected,
    #[error("outbound queue is full; peer is not keeping up")]
    OutboundFull,
    #[error("frame too large: max {max_frame_bytes} got {got_bytes}")]
    FrameTooLarge {
        max_frame_bytes: usize,
        got_bytes: usize,
    },
    #[error("frame is not valid utf-8")]
    InvalidUtf8,
    #[error("payload must not contain a line break")]
    EmbeddedNewline,
}
