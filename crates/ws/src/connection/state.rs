/// Which end of the session this side is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Masks every frame it sends
    Client,
    /// Never masks, and rejects unmasked frames
    Server,
}

/// Session state; it only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum State {
    Connecting,
    Open,
    /// This side sent a close frame and waits for the peer's
    Closing,
    Closed,
}

impl State {
    /// Moves to `next` unless that would go backwards.
    pub(crate) fn advance(&mut self, next: State) -> bool {
        if next < *self {
            return false;
        }
        *self = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_moves_backwards() {
        let mut state = State::Connecting;
        assert!(state.advance(State::Open));
        assert!(state.advance(State::Closing));
        assert!(!state.advance(State::Open));
        assert_eq!(state, State::Closing);
        assert!(state.advance(State::Closed));
        assert!(!state.advance(State::Connecting));
    }

    #[test]
    fn handshake_failure_skips_to_closed() {
        let mut state = State::Connecting;
        assert!(state.advance(State::Closed));
        assert_eq!(state, State::Closed);
    }
}
