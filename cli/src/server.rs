// HTTP services: registry, onion router, user
//
// Each service binds `host:<its address>` and answers the JSON routes in
// `onionmesh_core::relay::protocol`. Binding happens eagerly so callers can
// register with (or send through) a service before its future is polled.

use crate::api::HttpTransport;
use crate::config::Config;
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use onionmesh_core::relay::protocol::{
    ErrorBody, GetNodeRegistryBody, MessageBody, RegisterNodeBody, RegisterNodeResponse, ResultBody,
    SendMessageBody, DELIVERY_SUCCESS, ERROR_NODE_ALREADY_REGISTERED, NODE_REGISTERED,
    ROUTE_GET_NODE_REGISTRY, ROUTE_LAST_CIRCUIT, ROUTE_LAST_DECRYPTED, ROUTE_LAST_DESTINATION,
    ROUTE_LAST_ENCRYPTED, ROUTE_LAST_RECEIVED, ROUTE_LAST_SENT, ROUTE_MESSAGE, ROUTE_PRIVATE_KEY,
    ROUTE_REGISTER_NODE, ROUTE_SEND_MESSAGE, ROUTE_STATUS, STATUS_LIVE,
};
use onionmesh_core::{Address, NodeRegistry, OnionRouter, RegistryError, User};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::convert::Infallible;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

/// A bound server that runs until dropped or failed
pub type ServerFuture = BoxFuture<'static, Result<()>>;

pub enum Service {
    Registry(Arc<NodeRegistry>),
    Router {
        router: Arc<OnionRouter>,
        transport: Arc<HttpTransport>,
    },
    User {
        user: Arc<User>,
        transport: Arc<HttpTransport>,
    },
}

pub fn socket_addr(host: &str, address: Address) -> Result<SocketAddr> {
    let port = address
        .port()
        .with_context(|| format!("Address {} is not a valid port", address))?;
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("Failed to resolve {}", host))?
        .next()
        .with_context(|| format!("No socket address for {}:{}", host, port))
}

/// Bind `addr` now; the returned future serves requests
pub fn bind(addr: SocketAddr, service: Service) -> Result<ServerFuture> {
    let service = Arc::new(service);

    let make_svc = make_service_fn(move |_conn| {
        let service = service.clone();
        async move { Ok::<_, Infallible>(service_fn(move |req| handle_request(req, service.clone()))) }
    });

    let server = Server::try_bind(&addr)
        .with_context(|| format!("Failed to bind {}", addr))?
        .serve(make_svc);

    tracing::info!("Listening on {}", addr);

    Ok(async move { server.await.context("HTTP server error") }.boxed())
}

pub fn start_registry(config: &Config) -> Result<(Arc<NodeRegistry>, ServerFuture)> {
    let registry = Arc::new(NodeRegistry::new());
    let addr = socket_addr(&config.host, config.layout().registry())?;
    let server = bind(addr, Service::Registry(registry.clone()))?;
    tracing::info!("Node registry running on {}", addr);
    Ok((registry, server))
}

/// Generate keys, bind, then publish the public key to the registry.
///
/// A failed registration is logged; the router keeps serving.
pub async fn start_router(
    node_id: u32,
    config: &Config,
    transport: Arc<HttpTransport>,
) -> Result<(Arc<OnionRouter>, ServerFuture)> {
    let layout = config.layout();
    let router = tokio::task::spawn_blocking(move || OnionRouter::new(node_id, &layout))
        .await
        .context("Key generation task failed")??;
    let router = Arc::new(router);

    let addr = socket_addr(&config.host, router.address())?;
    let server = bind(
        addr,
        Service::Router {
            router: router.clone(),
            transport: transport.clone(),
        },
    )?;
    tracing::info!("Onion router {} running on {}", node_id, addr);

    if let Err(e) = router.register(transport.as_ref()).await {
        tracing::error!("Router {} failed to register: {}", node_id, e);
    }

    Ok((router, server))
}

pub fn start_user(user_id: u32, config: &Config, transport: Arc<HttpTransport>) -> Result<(Arc<User>, ServerFuture)> {
    let user = Arc::new(User::new(user_id, config.layout())?.with_circuit_length(config.circuit_length));

    let addr = socket_addr(&config.host, user.address())?;
    let server = bind(
        addr,
        Service::User {
            user: user.clone(),
            transport,
        },
    )?;
    tracing::info!("User {} running on {}", user_id, addr);

    Ok((user, server))
}

async fn handle_request(req: Request<Body>, service: Arc<Service>) -> Result<Response<Body>, Infallible> {
    let response = match service.as_ref() {
        Service::Registry(registry) => handle_registry(req, registry).await,
        Service::Router { router, transport } => handle_router(req, router, transport).await,
        Service::User { user, transport } => handle_user(req, user, transport).await,
    };

    Ok(response.unwrap_or_else(|e| {
        tracing::warn!("Request failed: {:#}", e);
        text_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e))
    }))
}

async fn handle_registry(req: Request<Body>, registry: &NodeRegistry) -> Result<Response<Body>> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, ROUTE_STATUS) => Ok(text_response(StatusCode::OK, STATUS_LIVE)),
        (&Method::POST, ROUTE_REGISTER_NODE) => {
            let body: RegisterNodeBody = match read_json(req).await {
                Ok(body) => body,
                Err(e) => return bad_request(format!("{:#}", e)),
            };

            match registry.register(body.node_id, body.pub_key) {
                Ok(node) => json_response(
                    StatusCode::OK,
                    &RegisterNodeResponse {
                        message: NODE_REGISTERED.to_string(),
                        node,
                    },
                ),
                Err(RegistryError::DuplicateRegistration(_)) => bad_request(ERROR_NODE_ALREADY_REGISTERED),
                Err(e) => bad_request(e.to_string()),
            }
        }
        (&Method::GET, ROUTE_GET_NODE_REGISTRY) => json_response(
            StatusCode::OK,
            &GetNodeRegistryBody {
                nodes: registry.list_nodes(),
            },
        ),
        _ => Ok(not_found()),
    }
}

async fn handle_router(
    req: Request<Body>,
    router: &OnionRouter,
    transport: &HttpTransport,
) -> Result<Response<Body>> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, ROUTE_STATUS) => Ok(text_response(StatusCode::OK, STATUS_LIVE)),
        (&Method::POST, ROUTE_MESSAGE) => {
            let body: MessageBody = read_json(req).await?;
            match router.receive(body.message, transport).await {
                Ok(_) => Ok(text_response(StatusCode::OK, DELIVERY_SUCCESS)),
                Err(e) => Ok(text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
            }
        }
        (&Method::GET, ROUTE_LAST_ENCRYPTED) => {
            json_response(StatusCode::OK, &ResultBody::new(router.last_received_encrypted_message()))
        }
        (&Method::GET, ROUTE_LAST_DECRYPTED) => {
            json_response(StatusCode::OK, &ResultBody::new(router.last_received_decrypted_message()))
        }
        (&Method::GET, ROUTE_LAST_DESTINATION) => {
            json_response(StatusCode::OK, &ResultBody::new(router.last_message_destination()))
        }
        (&Method::GET, ROUTE_PRIVATE_KEY) => {
            json_response(StatusCode::OK, &ResultBody::new(router.private_key_text()?))
        }
        _ => Ok(not_found()),
    }
}

async fn handle_user(req: Request<Body>, user: &User, transport: &HttpTransport) -> Result<Response<Body>> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, ROUTE_STATUS) => Ok(text_response(StatusCode::OK, STATUS_LIVE)),
        (&Method::POST, ROUTE_MESSAGE) => {
            let body: MessageBody = read_json(req).await?;
            user.receive(body.message);
            Ok(text_response(StatusCode::OK, DELIVERY_SUCCESS))
        }
        (&Method::POST, ROUTE_SEND_MESSAGE) => {
            let body: SendMessageBody = read_json(req).await?;
            match user
                .send_to_user(&body.message, body.destination_user_id, transport, transport)
                .await
            {
                Ok(_) => Ok(text_response(StatusCode::OK, DELIVERY_SUCCESS)),
                Err(e) => Ok(text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
            }
        }
        (&Method::GET, ROUTE_LAST_SENT) => {
            json_response(StatusCode::OK, &ResultBody::new(user.last_sent_message()))
        }
        (&Method::GET, ROUTE_LAST_RECEIVED) => {
            json_response(StatusCode::OK, &ResultBody::new(user.last_received_message()))
        }
        (&Method::GET, ROUTE_LAST_CIRCUIT) => json_response(StatusCode::OK, &ResultBody::new(user.last_circuit())),
        _ => Ok(not_found()),
    }
}

async fn read_json<T: DeserializeOwned>(req: Request<Body>) -> Result<T> {
    let body_bytes = hyper::body::to_bytes(req.into_body()).await?;
    serde_json::from_slice(&body_bytes).context("Malformed JSON body")
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Result<Response<Body>> {
    Ok(Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(body)?))?)
}

fn bad_request(error: impl Into<String>) -> Result<Response<Body>> {
    json_response(StatusCode::BAD_REQUEST, &ErrorBody { error: error.into() })
}

fn text_response(status: StatusCode, text: impl Into<String>) -> Response<Body> {
    let mut response = Response::new(Body::from(text.into()));
    *response.status_mut() = status;
    response
}

fn not_found() -> Response<Body> {
    text_response(StatusCode::NOT_FOUND, "Not found")
}
