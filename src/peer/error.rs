use std::io;

use crate::message::WireError;

/// Errors that end a single peer connection.
#[derive(thiserror::Error, Debug)]
pub enum PeerError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("handshake with invalid info hash")]
    InfoHashMismatch,

    #[error("connection not established")]
    NotConnected,
}

impl PeerError {
    /// Peer spoke the protocol wrong, as opposed to the network failing us.
    pub fn is_protocol(&self) -> bool {
        match self {
            PeerError::InfoHashMismatch => true,
            PeerError::Wire(e) => !matches!(e, WireError::Io(_)),
            _ => false,
        }
    }

    pub fn is_transport(&self) -> bool {
        match self {
            PeerError::Io(_) | PeerError::Timeout(_) => true,
            PeerError::Wire(e) => matches!(e, WireError::Io(_)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(PeerError::InfoHashMismatch.is_protocol());
        assert!(PeerError::from(WireError::InvalidHandshake("short")).is_protocol());
        assert!(PeerError::from(io::Error::from(io::ErrorKind::ConnectionRefused)).is_transport());
        assert!(PeerError::Timeout("connect").is_transport());
        assert!(PeerError::from(WireError::from(io::Error::from(io::ErrorKind::ConnectionReset)))
            .is_transport());
        assert!(!PeerError::NotConnected.is_protocol());
        assert!(!PeerError::NotConnected.is_transport());
    }
}
