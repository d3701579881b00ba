//! Node Registry — process-wide directory of relays and their public keys
//!
//! Append-only: a node id is registered once and never updated or removed.

use crate::crypto::codec;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A registered relay
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "nodeId")]
    pub node_id: u32,
    /// base64 SubjectPublicKeyInfo, exactly as published by the relay
    #[serde(rename = "pubKey")]
    pub pub_key: String,
}

impl Node {
    pub fn new(node_id: u32, pub_key: impl Into<String>) -> Self {
        Self {
            node_id,
            pub_key: pub_key.into(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Node already registered: {0}")]
    DuplicateRegistration(u32),
    #[error("Invalid public key for node {node_id}: {reason}")]
    InvalidPublicKey { node_id: u32, reason: String },
    #[error("Registry unavailable: {0}")]
    Unavailable(String),
}

/// In-memory node directory.
///
/// The duplicate check and the insert happen under one write lock, so two
/// concurrent registrations of the same id cannot both succeed.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: RwLock<Vec<Node>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a relay. Re-registration of a known id is rejected, never merged.
    pub fn register(&self, node_id: u32, pub_key: impl Into<String>) -> Result<Node, RegistryError> {
        let pub_key = pub_key.into();

        // A known id is rejected whatever key it comes with
        let mut nodes = self.nodes.write();
        if nodes.iter().any(|n| n.node_id == node_id) {
            tracing::warn!("Rejected duplicate registration for node {}", node_id);
            return Err(RegistryError::DuplicateRegistration(node_id));
        }

        codec::import_public_key(&pub_key).map_err(|e| RegistryError::InvalidPublicKey {
            node_id,
            reason: e.to_string(),
        })?;

        let node = Node::new(node_id, pub_key);
        nodes.push(node.clone());
        tracing::info!("Registered node {} ({} total)", node_id, nodes.len());

        Ok(node)
    }

    /// Snapshot of every registered node, in registration order
    pub fn list_nodes(&self) -> Vec<Node> {
        self.nodes.read().clone()
    }

    pub fn get(&self, node_id: u32) -> Option<Node> {
        self.nodes.read().iter().find(|n| n.node_id == node_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}
