//! User — sends onion-wrapped messages and receives final plaintext

use crate::address::{Address, AddressError, PortLayout};
use crate::privacy::circuit::{build_circuit, Circuit, CIRCUIT_LENGTH};
use crate::privacy::onion::{build_envelope, OnionError};
use crate::registry::RegistryError;
use crate::transport::{Directory, Transport, TransportError};
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("No relays registered")]
    EmptyCircuit,
    #[error("Directory error: {0}")]
    Directory(#[from] RegistryError),
    #[error("Onion construction failed: {0}")]
    Onion(#[from] OnionError),
    #[error("Delivery to entry relay failed: {0}")]
    Transport(#[from] TransportError),
    #[error("Address error: {0}")]
    Address(#[from] AddressError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserState {
    pub last_sent_message: Option<String>,
    pub last_received_message: Option<String>,
    /// Node ids of the last circuit, entry first
    pub last_circuit: Vec<u32>,
}

#[derive(Debug)]
pub struct User {
    user_id: u32,
    address: Address,
    layout: PortLayout,
    circuit_length: usize,
    state: Mutex<UserState>,
}

impl User {
    pub fn new(user_id: u32, layout: PortLayout) -> Result<Self, UserError> {
        Ok(Self {
            user_id,
            address: layout.user(user_id)?,
            layout,
            circuit_length: CIRCUIT_LENGTH,
            state: Mutex::new(UserState::default()),
        })
    }

    pub fn with_circuit_length(mut self, circuit_length: usize) -> Self {
        self.circuit_length = circuit_length;
        self
    }

    pub fn user_id(&self) -> u32 {
        self.user_id
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Final hop of an onion: store the plaintext
    pub fn receive(&self, message: String) {
        tracing::info!("User {} received a message ({} bytes)", self.user_id, message.len());
        self.state.lock().last_received_message = Some(message);
    }

    /// Send to another user by id
    pub async fn send_to_user(
        &self,
        message: &str,
        destination_user_id: u32,
        directory: &dyn Directory,
        transport: &dyn Transport,
    ) -> Result<Circuit, UserError> {
        let destination = self.layout.user(destination_user_id)?;
        self.send(message, destination, directory, transport).await
    }

    /// Build a fresh circuit and envelope, then hand it to the entry relay.
    ///
    /// Only failures reaching the entry relay are reported. Anything that
    /// goes wrong further along the circuit is invisible to the sender.
    pub async fn send(
        &self,
        message: &str,
        destination: Address,
        directory: &dyn Directory,
        transport: &dyn Transport,
    ) -> Result<Circuit, UserError> {
        let nodes = directory.list_nodes().await?;
        let circuit = build_circuit(&nodes, self.circuit_length);
        let entry = circuit.entry().ok_or(UserError::EmptyCircuit)?;
        let entry_address = self.layout.router(entry.node_id)?;

        let envelope = build_envelope(message, destination, &circuit, &self.layout)?;

        {
            let mut state = self.state.lock();
            state.last_sent_message = Some(message.to_string());
            state.last_circuit = circuit.node_ids();
        }

        tracing::info!(
            "User {} sending via circuit {:?} to {}",
            self.user_id,
            circuit.node_ids(),
            destination
        );
        transport.deliver(entry_address, envelope).await?;

        Ok(circuit)
    }

    pub fn state(&self) -> UserState {
        self.state.lock().clone()
    }

    pub fn last_sent_message(&self) -> Option<String> {
        self.state.lock().last_sent_message.clone()
    }

    pub fn last_received_message(&self) -> Option<String> {
        self.state.lock().last_received_message.clone()
    }

    pub fn last_circuit(&self) -> Vec<u32> {
        self.state.lock().last_circuit.clone()
    }
}
