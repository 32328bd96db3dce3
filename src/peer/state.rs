/// Choke/interest flags for both ends of a connection, plus whether we have a request
/// in flight.
#[derive(Debug, Clone)]
pub struct PeerState {
    choked: bool,
    interested: bool,
    pending_request: bool,
    remote_choked: bool,
    remote_interested: bool,
}

impl Default for PeerState {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerState {
    pub fn new() -> Self {
        Self {
            choked: true,
            interested: false,
            pending_request: false,
            remote_choked: true,
            remote_interested: false,
        }
    }

    pub fn choke(&mut self) {
        self.choked = true;
    }

    pub fn unchoke(&mut self) {
        self.choked = false;
    }

    pub fn is_choked(&self) -> bool {
        self.choked
    }

    pub fn set_interested(&mut self, interested: bool) {
        self.interested = interested;
    }

    pub fn is_interested(&self) -> bool {
        self.interested
    }

    pub fn set_pending_request(&mut self, pending: bool) {
        self.pending_request = pending;
    }

    pub fn has_pending_request(&self) -> bool {
        self.pending_request
    }

    pub fn set_remote_interested(&mut self, interested: bool) {
        self.remote_interested = interested;
    }

    pub fn is_remote_interested(&self) -> bool {
        self.remote_interested
    }

    pub fn is_remote_choked(&self) -> bool {
        self.remote_choked
    }

    /// Unchoked, interested and nothing outstanding: one request at a time.
    pub fn can_request(&self) -> bool {
        !self.choked && self.interested && !self.pending_request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = PeerState::new();
        assert!(state.is_choked());
        assert!(!state.is_interested());
        assert!(state.is_remote_choked());
        assert!(!state.is_remote_interested());
        assert!(!state.can_request());
    }

    #[test]
    fn test_can_request_needs_unchoke_and_interest() {
        let mut state = PeerState::new();
        state.set_interested(true);
        assert!(!state.can_request());

        state.unchoke();
        assert!(state.can_request());

        state.set_pending_request(true);
        assert!(!state.can_request());

        state.set_pending_request(false);
        state.choke();
        assert!(!state.can_request());
    }
}
