//! Engine entry point.
//!
//! A [`BleSdk`] owns the registry of live sessions keyed by peer address.
//! [`BleSdk::connect`] builds a [`DeviceSession`] around a platform
//! transport and registers it; a second connect to the same address is
//! rejected until the first session tears down. The registry holds weak
//! references, so dropping every session handle releases the slot as well.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use log::{debug, info};

use crate::core::error::SessionError;
use crate::gatt::GattTransport;
use crate::session::{DeviceSession, SessionCallbacks, SessionConfig, SessionShared};

/// Live sessions keyed by peer address.
pub(crate) struct SessionRegistry {
    sessions: Mutex<HashMap<String, Weak<SessionShared>>>,
}

impl SessionRegistry {
    fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn get(&self, address: &str) -> Option<Arc<SessionShared>> {
        self.sessions
            .lock()
            .unwrap()
            .get(address)
            .and_then(Weak::upgrade)
    }

    /// Release the slot for `address`. Called from session teardown.
    pub(crate) fn remove(&self, address: &str) {
        if self.sessions.lock().unwrap().remove(address).is_some() {
            debug!("[{address}] unregistered");
        }
    }
}

/// Entry point: connects transports to sessions and tracks what is live.
pub struct BleSdk {
    registry: Arc<SessionRegistry>,
}

impl BleSdk {
    /// Create an engine instance with an empty session registry.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new()),
        }
    }

    /// Connect to `address` over `transport` with default parameters.
    ///
    /// Must be called from within a tokio runtime; the session captures the
    /// runtime handle for its timer tasks. The returned session is inert
    /// until the transport starts feeding [`crate::gatt::GattEvent`]s into
    /// it.
    pub fn connect(
        &self,
        address: &str,
        transport: Arc<dyn GattTransport>,
        callbacks: SessionCallbacks,
    ) -> Result<DeviceSession, SessionError> {
        self.connect_with_config(address, transport, SessionConfig::default(), callbacks)
    }

    /// [`BleSdk::connect`] with explicit session parameters.
    pub fn connect_with_config(
        &self,
        address: &str,
        transport: Arc<dyn GattTransport>,
        config: SessionConfig,
        callbacks: SessionCallbacks,
    ) -> Result<DeviceSession, SessionError> {
        let mut sessions = self.registry.sessions.lock().unwrap();
        sessions.retain(|_, weak| weak.strong_count() > 0);
        if sessions.get(address).and_then(Weak::upgrade).is_some() {
            return Err(SessionError::AlreadyConnected(address.to_owned()));
        }
        let session = DeviceSession::create(
            address.to_owned(),
            transport,
            config,
            callbacks,
            Arc::clone(&self.registry),
        )?;
        sessions.insert(address.to_owned(), Arc::downgrade(session.shared()));
        info!("[{address}] session registered");
        Ok(session)
    }

    /// Look up the live session for `address`, if any.
    pub fn session(&self, address: &str) -> Option<DeviceSession> {
        self.registry.get(address).map(DeviceSession::from_shared)
    }

    /// Abort an in-progress or established session for `address`.
    ///
    /// Tears the session down exactly like [`DeviceSession::disconnect`].
    /// Returns `false` when no live session exists for the address.
    pub fn stop_connect(&self, address: &str) -> bool {
        match self.registry.get(address) {
            Some(shared) => {
                shared.teardown();
                true
            }
            None => false,
        }
    }

    /// Addresses with a live session.
    pub fn connected_addresses(&self) -> Vec<String> {
        let sessions = self.registry.sessions.lock().unwrap();
        sessions
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .map(|(addr, _)| addr.clone())
            .collect()
    }
}

impl Default for BleSdk {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{bring_up, MockTransport};

    #[tokio::test]
    async fn test_duplicate_connect_rejected() {
        let sdk = BleSdk::new();
        let transport = MockTransport::new();
        let session = sdk
            .connect("F0:01", transport.clone(), SessionCallbacks::new())
            .unwrap();

        let err = sdk
            .connect("F0:01", MockTransport::new(), SessionCallbacks::new())
            .unwrap_err();
        assert!(matches!(err, SessionError::AlreadyConnected(addr) if addr == "F0:01"));

        // A different address is fine.
        let other = sdk
            .connect("F0:02", MockTransport::new(), SessionCallbacks::new())
            .unwrap();
        assert_eq!(
            {
                let mut addrs = sdk.connected_addresses();
                addrs.sort();
                addrs
            },
            vec!["F0:01".to_owned(), "F0:02".to_owned()]
        );
        drop((session, other));
    }

    #[tokio::test]
    async fn test_disconnect_frees_the_address() {
        let sdk = BleSdk::new();
        let transport = MockTransport::new();
        let session = sdk
            .connect("F0:01", transport.clone(), SessionCallbacks::new())
            .unwrap();
        session.disconnect();
        assert_eq!(transport.disconnects.load(std::sync::atomic::Ordering::SeqCst), 1);

        assert!(sdk.session("F0:01").is_none());
        assert!(sdk
            .connect("F0:01", MockTransport::new(), SessionCallbacks::new())
            .is_ok());
    }

    #[tokio::test]
    async fn test_dropping_every_handle_frees_the_address() {
        let sdk = BleSdk::new();
        let session = sdk
            .connect("F0:01", MockTransport::new(), SessionCallbacks::new())
            .unwrap();
        drop(session);
        assert!(sdk.session("F0:01").is_none());
        assert!(sdk.connected_addresses().is_empty());
        assert!(sdk
            .connect("F0:01", MockTransport::new(), SessionCallbacks::new())
            .is_ok());
    }

    #[tokio::test]
    async fn test_stop_connect_tears_down() {
        let sdk = BleSdk::new();
        let transport = MockTransport::new();
        let session = sdk
            .connect("F0:01", transport.clone(), SessionCallbacks::new())
            .unwrap();
        bring_up(&session);
        assert!(session.is_connected());

        assert!(sdk.stop_connect("F0:01"));
        assert_eq!(transport.disconnects.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(sdk.session("F0:01").is_none());
        assert!(!sdk.stop_connect("F0:01"));
    }

    #[tokio::test]
    async fn test_session_lookup_returns_same_session() {
        let sdk = BleSdk::new();
        let transport = MockTransport::new();
        let session = sdk
            .connect("F0:01", transport.clone(), SessionCallbacks::new())
            .unwrap();
        bring_up(&session);

        let looked_up = sdk.session("F0:01").unwrap();
        assert!(looked_up.is_connected());
        assert_eq!(looked_up.address(), session.address());
    }
}
