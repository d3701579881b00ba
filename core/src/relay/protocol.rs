//! Wire protocol — JSON bodies and routes shared by every service
//!
//! Field names follow the established camelCase wire format so existing
//! registry/router/user processes interoperate.

use crate::registry::Node;
use serde::{Deserialize, Serialize};

pub const ROUTE_STATUS: &str = "/status";
pub const ROUTE_MESSAGE: &str = "/message";

pub const ROUTE_REGISTER_NODE: &str = "/registerNode";
pub const ROUTE_GET_NODE_REGISTRY: &str = "/getNodeRegistry";

pub const ROUTE_LAST_ENCRYPTED: &str = "/getLastReceivedEncryptedMessage";
pub const ROUTE_LAST_DECRYPTED: &str = "/getLastReceivedDecryptedMessage";
pub const ROUTE_LAST_DESTINATION: &str = "/getLastMessageDestination";
pub const ROUTE_PRIVATE_KEY: &str = "/getPrivateKey";

pub const ROUTE_SEND_MESSAGE: &str = "/sendMessage";
pub const ROUTE_LAST_SENT: &str = "/getLastSentMessage";
pub const ROUTE_LAST_RECEIVED: &str = "/getLastReceivedMessage";
pub const ROUTE_LAST_CIRCUIT: &str = "/getLastCircuit";

/// Body of `/status`
pub const STATUS_LIVE: &str = "live";
/// Body of a successful `/message` or `/sendMessage`
pub const DELIVERY_SUCCESS: &str = "success";
/// `ErrorBody::error` for a re-registered node id
pub const ERROR_NODE_ALREADY_REGISTERED: &str = "Node already registered";
/// `RegisterNodeResponse::message` on success
pub const NODE_REGISTERED: &str = "Node registered successfully";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterNodeBody {
    #[serde(rename = "nodeId")]
    pub node_id: u32,
    #[serde(rename = "pubKey")]
    pub pub_key: String,
}

impl From<Node> for RegisterNodeBody {
    fn from(node: Node) -> Self {
        Self {
            node_id: node.node_id,
            pub_key: node.pub_key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterNodeResponse {
    pub message: String,
    pub node: Node,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetNodeRegistryBody {
    pub nodes: Vec<Node>,
}

/// Envelope or plaintext moving between hops
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageBody {
    pub message: String,
    #[serde(rename = "destinationUserId")]
    pub destination_user_id: u32,
}

/// Wrapper used by every debug getter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultBody<T> {
    pub result: T,
}

impl<T> ResultBody<T> {
    pub fn new(result: T) -> Self {
        Self { result }
    }
}
