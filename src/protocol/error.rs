use std::fmt;

#[derive(Debug)]
pub enum ProtocolError {
    ConnectionClosed,
    FrameMismatch { sent: String, echoed: String },
    TruncatedTransfer { expected: u64, received: u64 },
    MalformedSize(String),
    TokenTooLong(usize),
    InvalidToken,
    PhotoTooLarge(u64),
    Timeout,
    Io(std::io::Error),
}

impl ProtocolError {
    /// Failures after which the stream is desynchronized or gone and the
    /// session cannot continue. Everything else aborts only the current
    /// request/response cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::ConnectionClosed
                | ProtocolError::TruncatedTransfer { .. }
                | ProtocolError::Timeout
                | ProtocolError::Io(_)
        )
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::ConnectionClosed =>
                write!(f, "connection closed by peer"),
            ProtocolError::FrameMismatch { sent, echoed } =>
                write!(f, "echo mismatch: sent '{}', peer echoed '{}'", sent, echoed),
            ProtocolError::TruncatedTransfer { expected, received } =>
                write!(f, "truncated transfer: expected {} bytes, received {}", expected, received),
            ProtocolError::MalformedSize(token) =>
                write!(f, "malformed size token '{}'", token),
            ProtocolError::TokenTooLong(limit) =>
                write!(f, "token exceeds {} bytes", limit),
            ProtocolError::InvalidToken =>
                write!(f, "token is not valid UTF-8"),
            ProtocolError::PhotoTooLarge(size) =>
                write!(f, "declared photo size too large: {} bytes", size),
            ProtocolError::Timeout =>
                write!(f, "peer did not respond within the deadline"),
            ProtocolError::Io(e) =>
                write!(f, "stream I/O failed: {}", e),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ProtocolError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionAborted => ProtocolError::ConnectionClosed,
            _ => ProtocolError::Io(e),
        }
    }
}
