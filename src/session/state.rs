//! Session lifecycle.

use std::fmt;

/// Lifecycle state of a remote session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Transport is being established.
    #[default]
    Connecting,
    /// Transport is up; commands and output flow.
    Open,
    /// Transport released. Terminal.
    Closed,
}

impl SessionState {
    /// Valid transitions:
    /// - Connecting -> Open
    /// - Connecting -> Closed
    /// - Open -> Closed
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (*self, target),
            (Connecting, Open) | (Connecting, Closed) | (Open, Closed)
        )
    }

    /// Move to `target` if allowed. Returns whether the state changed.
    pub fn advance(&mut self, target: SessionState) -> bool {
        if self.can_transition_to(target) {
            *self = target;
            true
        } else {
            false
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, SessionState::Closed)
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Closed by the operator or the owning controller.
    Local,
    /// The device ended the session.
    RemoteEof,
    /// The transport failed mid-session.
    TransportError(String),
    /// Force-closed because its device was removed from the inventory.
    DeviceRemoved,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Local => f.write_str("closed locally"),
            CloseReason::RemoteEof => f.write_str("closed by device"),
            CloseReason::TransportError(msg) => write!(f, "transport error: {msg}"),
            CloseReason::DeviceRemoved => f.write_str("device removed from inventory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let mut state = SessionState::Connecting;
        assert!(state.advance(SessionState::Open));
        assert!(state.advance(SessionState::Closed));
        assert!(state.is_closed());
    }

    #[test]
    fn test_connect_failure_goes_straight_to_closed() {
        let mut state = SessionState::default();
        assert!(state.advance(SessionState::Closed));
    }

    #[test]
    fn test_closed_is_terminal() {
        let mut state = SessionState::Closed;
        assert!(!state.advance(SessionState::Open));
        assert!(!state.advance(SessionState::Closed));
        assert_eq!(state, SessionState::Closed);
    }

    #[test]
    fn test_close_reason_display() {
        assert_eq!(
            CloseReason::TransportError("reset".into()).to_string(),
            "transport error: reset"
        );
    }
}
