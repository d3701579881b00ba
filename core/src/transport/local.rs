//! In-process network
//!
//! Routes deliveries straight to router and user objects living in the same
//! process. Behaves like the HTTP transport from the caller's point of view:
//! a hop that fails to process a message is logged, not reported upstream.

use super::abstraction::{Transport, TransportError};
use crate::address::Address;
use crate::relay::{OnionRouter, User};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum Endpoint {
    Router(Arc<OnionRouter>),
    User(Arc<User>),
}

#[derive(Debug, Default)]
pub struct LocalNetwork {
    endpoints: RwLock<HashMap<Address, Endpoint>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach_router(&self, router: Arc<OnionRouter>) {
        self.endpoints
            .write()
            .insert(router.address(), Endpoint::Router(router));
    }

    pub fn attach_user(&self, user: Arc<User>) {
        self.endpoints.write().insert(user.address(), Endpoint::User(user));
    }

    /// Take an endpoint offline; later deliveries to it are unreachable
    pub fn detach(&self, address: Address) -> Option<Endpoint> {
        self.endpoints.write().remove(&address)
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.read().len()
    }
}

#[async_trait]
impl Transport for LocalNetwork {
    async fn deliver(&self, to: Address, message: String) -> Result<(), TransportError> {
        let endpoint = self
            .endpoints
            .read()
            .get(&to)
            .cloned()
            .ok_or(TransportError::UnreachablePeer(to))?;

        match endpoint {
            Endpoint::Router(router) => {
                if let Err(e) = router.receive(message, self).await {
                    tracing::warn!("Router {} failed to relay: {}", router.node_id(), e);
                }
            }
            Endpoint::User(user) => user.receive(message),
        }

        Ok(())
    }
}
