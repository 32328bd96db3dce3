use std::io;

#[derive(thiserror::Error, Debug)]
pub enum WireError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("truncated frame: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("malformed payload for message id {id} ({length} bytes)")]
    Malformed { id: u8, length: usize },

    #[error("frame of {0} bytes exceeds maximum allowed size")]
    FrameTooLarge(usize),

    #[error("invalid handshake: {0}")]
    InvalidHandshake(&'static str),
}

impl WireError {
    /// Transport went away underneath the reader.
    pub fn is_reset(&self) -> bool {
        matches!(
            self,
            WireError::Io(e) if matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            )
        )
    }
}
