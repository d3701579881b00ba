// HTTP client for the overlay
//
// Registry, routers and users all speak JSON over HTTP/1.1 on `host:port`,
// where the port is the hop's numeric address. `HttpTransport` is the
// process-to-process implementation of the core `Transport` and `Directory`
// seams, plus a few helpers the CLI uses to poke running services.

use anyhow::{Context, Result};
use async_trait::async_trait;
use hyper::body::Bytes;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Method, Request, StatusCode, Uri};
use onionmesh_core::relay::protocol::{
    ErrorBody, GetNodeRegistryBody, MessageBody, RegisterNodeBody, RegisterNodeResponse, ResultBody,
    SendMessageBody, ERROR_NODE_ALREADY_REGISTERED, ROUTE_GET_NODE_REGISTRY, ROUTE_MESSAGE,
    ROUTE_REGISTER_NODE, ROUTE_SEND_MESSAGE, ROUTE_STATUS,
};
use onionmesh_core::{Address, Directory, Node, PortLayout, RegistryError, Transport, TransportError};
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client<HttpConnector>,
    host: String,
    registry: Address,
}

fn protocol_error(e: impl std::fmt::Display) -> TransportError {
    TransportError::Protocol(e.to_string())
}

fn registry_unavailable(e: impl std::fmt::Display) -> RegistryError {
    RegistryError::Unavailable(e.to_string())
}

impl HttpTransport {
    pub fn new(host: impl Into<String>, layout: &PortLayout) -> Self {
        Self {
            client: Client::new(),
            host: host.into(),
            registry: layout.registry(),
        }
    }

    pub fn registry_address(&self) -> Address {
        self.registry
    }

    fn uri(&self, to: Address, route: &str) -> Result<Uri, TransportError> {
        let port = to.port().ok_or(TransportError::UnreachablePeer(to))?;
        format!("http://{}:{}{}", self.host, port, route)
            .parse()
            .map_err(protocol_error)
    }

    async fn execute(&self, to: Address, req: Request<Body>) -> Result<(StatusCode, Bytes), TransportError> {
        let resp = self.client.request(req).await.map_err(|e| {
            tracing::debug!("Request to {} failed: {}", to, e);
            TransportError::UnreachablePeer(to)
        })?;

        let status = resp.status();
        let body = hyper::body::to_bytes(resp.into_body())
            .await
            .map_err(|_| TransportError::UnreachablePeer(to))?;
        Ok((status, body))
    }

    async fn post_json<T: Serialize>(
        &self,
        to: Address,
        route: &str,
        body: &T,
    ) -> Result<(StatusCode, Bytes), TransportError> {
        let json = serde_json::to_vec(body).map_err(protocol_error)?;
        let req = Request::builder()
            .method(Method::POST)
            .uri(self.uri(to, route)?)
            .header("content-type", "application/json")
            .body(Body::from(json))
            .map_err(protocol_error)?;
        self.execute(to, req).await
    }

    async fn get(&self, to: Address, route: &str) -> Result<(StatusCode, Bytes), TransportError> {
        let req = Request::builder()
            .method(Method::GET)
            .uri(self.uri(to, route)?)
            .body(Body::empty())
            .map_err(protocol_error)?;
        self.execute(to, req).await
    }

    // Client functions for CLI commands

    /// `GET /status` of any service
    pub async fn status(&self, at: Address) -> Result<String> {
        let (status, body) = self.get(at, ROUTE_STATUS).await?;
        if !status.is_success() {
            anyhow::bail!("{} answered {}", at, status);
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Read one of the `{ "result": ... }` debug getters
    pub async fn result<T: DeserializeOwned>(&self, at: Address, route: &str) -> Result<T> {
        let (status, body) = self.get(at, route).await?;

        // Check HTTP status before attempting to parse
        if !status.is_success() {
            anyhow::bail!(
                "Request {} to {} failed with status {}: {}",
                route,
                at,
                status,
                String::from_utf8_lossy(&body)
            );
        }

        let response: ResultBody<T> = serde_json::from_slice(&body)
            .with_context(|| format!("Failed to parse {} response", route))?;
        Ok(response.result)
    }

    /// Ask the user at `from` to send `message` to user `destination_user_id`
    pub async fn send_message(&self, from: Address, message: &str, destination_user_id: u32) -> Result<()> {
        let body = SendMessageBody {
            message: message.to_string(),
            destination_user_id,
        };
        let (status, body) = self.post_json(from, ROUTE_SEND_MESSAGE, &body).await?;

        if status.is_success() {
            Ok(())
        } else {
            anyhow::bail!("Failed to send message: {}", String::from_utf8_lossy(&body))
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn deliver(&self, to: Address, message: String) -> Result<(), TransportError> {
        let (status, body) = self.post_json(to, ROUTE_MESSAGE, &MessageBody { message }).await?;

        // The peer took the message; how it fared downstream is not our concern
        if !status.is_success() {
            tracing::warn!(
                "{} answered {} to a delivery: {}",
                to,
                status,
                String::from_utf8_lossy(&body)
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Directory for HttpTransport {
    async fn register_node(&self, node: Node) -> Result<Node, RegistryError> {
        let node_id = node.node_id;
        let (status, body) = self
            .post_json(self.registry, ROUTE_REGISTER_NODE, &RegisterNodeBody::from(node))
            .await
            .map_err(registry_unavailable)?;

        if status.is_success() {
            let response: RegisterNodeResponse =
                serde_json::from_slice(&body).map_err(registry_unavailable)?;
            return Ok(response.node);
        }

        let error = serde_json::from_slice::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());

        match status {
            StatusCode::BAD_REQUEST if error == ERROR_NODE_ALREADY_REGISTERED => {
                Err(RegistryError::DuplicateRegistration(node_id))
            }
            StatusCode::BAD_REQUEST => Err(RegistryError::InvalidPublicKey {
                node_id,
                reason: error,
            }),
            _ => Err(RegistryError::Unavailable(format!("{}: {}", status, error))),
        }
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, RegistryError> {
        let (status, body) = self
            .get(self.registry, ROUTE_GET_NODE_REGISTRY)
            .await
            .map_err(registry_unavailable)?;

        if !status.is_success() {
            return Err(RegistryError::Unavailable(format!("registry answered {}", status)));
        }

        let response: GetNodeRegistryBody = serde_json::from_slice(&body).map_err(registry_unavailable)?;
        Ok(response.nodes)
    }
}
