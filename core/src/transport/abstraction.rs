//! Transport abstraction layer
//!
//! The onion core never touches sockets. Relays and senders talk to the
//! network through these two seams; the CLI provides an HTTP implementation
//! and `LocalNetwork` provides an in-process one.

use crate::address::Address;
use crate::registry::{Node, NodeRegistry, RegistryError};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Nothing is listening at the address, or the connection broke
    #[error("Unreachable peer: {0}")]
    UnreachablePeer(Address),

    /// The peer answered with something we could not interpret
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Moves an envelope (or final plaintext) to the next hop.
///
/// `Ok(())` means the peer accepted the message. What happens further
/// downstream is not reported back.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, to: Address, message: String) -> Result<(), TransportError>;
}

/// Where senders discover relays and relays publish their keys
#[async_trait]
pub trait Directory: Send + Sync {
    async fn register_node(&self, node: Node) -> Result<Node, RegistryError>;

    async fn list_nodes(&self) -> Result<Vec<Node>, RegistryError>;
}

#[async_trait]
impl Directory for NodeRegistry {
    async fn register_node(&self, node: Node) -> Result<Node, RegistryError> {
        self.register(node.node_id, node.pub_key)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, RegistryError> {
        Ok(NodeRegistry::list_nodes(self))
    }
}
