//! Link session state shared by both roles.
//!
//! The connection flag is written from transport callbacks and read by the
//! owning state machine, so it lives behind an `Arc<AtomicBool>`. Everything
//! else is only touched by the owner.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::ble::advertising::AdvertisedDevice;

/// Change in link status observed between two polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEdge {
    /// The link came up since the last poll.
    Attached,
    /// The link went down since the last poll.
    Detached,
}

/// Connection state between a central and its single peripheral.
#[derive(Debug, Default)]
pub struct Session {
    /// Current link status, written by transport callbacks.
    connected: Arc<AtomicBool>,
    /// Link status seen at the previous poll.
    previously_connected: bool,
    /// Remote endpoint found by scanning (central only).
    remote: Option<AdvertisedDevice>,
}

impl Session {
    /// Create a disconnected session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the connection flag for use inside callbacks.
    pub fn connected_flag(&self) -> Arc<AtomicBool> {
        self.connected.clone()
    }

    /// Check if the link is currently up.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Set the link status.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Compare the flag with the previous poll and report a change, if any.
    pub fn poll_edge(&mut self) -> Option<LinkEdge> {
        let connected = self.is_connected();
        let edge = match (self.previously_connected, connected) {
            (false, true) => Some(LinkEdge::Attached),
            (true, false) => Some(LinkEdge::Detached),
            _ => None,
        };
        self.previously_connected = connected;
        edge
    }

    /// The discovered remote endpoint.
    pub fn remote(&self) -> Option<&AdvertisedDevice> {
        self.remote.as_ref()
    }

    /// Record the discovered remote endpoint.
    pub fn set_remote(&mut self, remote: AdvertisedDevice) {
        self.remote = Some(remote);
    }

    /// Return to the disconnected state and forget the remote endpoint.
    ///
    /// The flag handle stays the same, so callbacks registered earlier keep
    /// writing to this session.
    pub fn reset(&mut self) {
        self.set_connected(false);
        self.previously_connected = false;
        self.remote = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges() {
        let mut session = Session::new();
        assert_eq!(session.poll_edge(), None);

        let flag = session.connected_flag();
        flag.store(true, Ordering::SeqCst);
        assert_eq!(session.poll_edge(), Some(LinkEdge::Attached));
        assert_eq!(session.poll_edge(), None);

        flag.store(false, Ordering::SeqCst);
        assert_eq!(session.poll_edge(), Some(LinkEdge::Detached));
        assert_eq!(session.poll_edge(), None);
    }

    #[test]
    fn test_reset_keeps_flag_handle() {
        let mut session = Session::new();
        let flag = session.connected_flag();
        session.set_remote(AdvertisedDevice::new("AA:BB"));
        session.set_connected(true);

        session.reset();
        assert!(!session.is_connected());
        assert!(session.remote().is_none());

        flag.store(true, Ordering::SeqCst);
        assert!(session.is_connected());
    }
}
