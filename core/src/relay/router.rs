//! Onion Router — one relay's service object
//!
//! Owns the relay's RSA key pair and its observability fields. A delivery
//! peels exactly one layer and forwards the remainder:
//!
//!   receive → decrypt one layer → forward

use crate::address::{Address, AddressError, PortLayout};
use crate::crypto::{codec, CodecError, CryptoError, RsaKeyPair};
use crate::privacy::onion::{peel_layer, OnionError};
use crate::registry::{Node, RegistryError};
use crate::transport::{Directory, Transport, TransportError};
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Failed to peel layer: {0}")]
    Peel(#[from] OnionError),
    #[error("Forwarding failed: {0}")]
    UnreachablePeer(#[source] TransportError),
    #[error("Registration failed: {0}")]
    Registration(#[from] RegistryError),
    #[error("Key error: {0}")]
    Key(#[from] CodecError),
    #[error("Key generation failed: {0}")]
    KeyGeneration(#[from] CryptoError),
    #[error("Address error: {0}")]
    Address(#[from] AddressError),
}

/// Last-message bookkeeping. Observability only; never read by the protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterState {
    pub last_received_encrypted_message: Option<String>,
    pub last_received_decrypted_message: Option<String>,
    pub last_message_destination: Option<Address>,
}

pub struct OnionRouter {
    node_id: u32,
    address: Address,
    keys: RsaKeyPair,
    public_key_text: String,
    /// One exclusive section per router; never held across an await
    state: Mutex<RouterState>,
}

impl OnionRouter {
    /// Create a router with a freshly generated key pair
    pub fn new(node_id: u32, layout: &PortLayout) -> Result<Self, RelayError> {
        Self::with_keys(node_id, layout, RsaKeyPair::generate()?)
    }

    pub fn with_keys(node_id: u32, layout: &PortLayout, keys: RsaKeyPair) -> Result<Self, RelayError> {
        let address = layout.router(node_id)?;
        let public_key_text = codec::export_public_key(&keys.public_key)?;
        Ok(Self {
            node_id,
            address,
            keys,
            public_key_text,
            state: Mutex::new(RouterState::default()),
        })
    }

    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Registry record for this router
    pub fn node(&self) -> Node {
        Node::new(self.node_id, self.public_key_text.clone())
    }

    pub fn public_key_text(&self) -> &str {
        &self.public_key_text
    }

    /// PKCS#8 export of the private key (debug endpoint)
    pub fn private_key_text(&self) -> Result<String, RelayError> {
        Ok(codec::export_private_key(&self.keys.private_key)?)
    }

    /// Publish this router's public key
    pub async fn register(&self, directory: &dyn Directory) -> Result<Node, RelayError> {
        let node = directory.register_node(self.node()).await?;
        tracing::info!("Onion router {} registered at {}", self.node_id, self.address);
        Ok(node)
    }

    /// Handle one incoming envelope.
    ///
    /// Peel failures leave the state untouched. Once a layer is peeled the
    /// state is committed before forwarding; a forwarding failure does not
    /// roll it back. Returns the address the remainder was sent to.
    pub async fn receive(&self, envelope: String, transport: &dyn Transport) -> Result<Address, RelayError> {
        let peeled = match peel_layer(&envelope, &self.keys.private_key) {
            Ok(peeled) => peeled,
            Err(e) => {
                tracing::warn!("Router {} dropped message: {}", self.node_id, e);
                return Err(e.into());
            }
        };

        let next_hop = peeled.next_hop;
        {
            let mut state = self.state.lock();
            state.last_received_encrypted_message = Some(envelope);
            state.last_received_decrypted_message = Some(peeled.remainder.clone());
            state.last_message_destination = Some(next_hop);
        }

        tracing::debug!("Router {} forwarding to {}", self.node_id, next_hop);
        transport
            .deliver(next_hop, peeled.remainder)
            .await
            .map_err(RelayError::UnreachablePeer)?;

        Ok(next_hop)
    }

    pub fn state(&self) -> RouterState {
        self.state.lock().clone()
    }

    pub fn last_received_encrypted_message(&self) -> Option<String> {
        self.state.lock().last_received_encrypted_message.clone()
    }

    pub fn last_received_decrypted_message(&self) -> Option<String> {
        self.state.lock().last_received_decrypted_message.clone()
    }

    pub fn last_message_destination(&self) -> Option<Address> {
        self.state.lock().last_message_destination
    }
}

impl std::fmt::Debug for OnionRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnionRouter")
            .field("node_id", &self.node_id)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
