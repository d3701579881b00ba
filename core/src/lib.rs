// onionmesh core — onion routing over a registry of RSA-keyed relays
//
// A sender wraps a message in one encryption layer per relay. Each relay
// learns only the next hop; only the exit relay sees the plaintext.

pub mod address;
pub mod crypto;
pub mod privacy;
pub mod registry;
pub mod relay;
pub mod transport;

pub use address::{Address, AddressError, PortLayout, ADDRESS_WIDTH};
pub use crypto::{CodecError, CryptoError, RsaKeyPair, SymmetricKey};
pub use privacy::{
    build_circuit, build_envelope, peel_layer, Circuit, OnionError, PeeledLayer, CIRCUIT_LENGTH,
    KEY_SEGMENT_LEN,
};
pub use registry::{Node, NodeRegistry, RegistryError};
pub use relay::{OnionRouter, RelayError, User, UserError};
pub use transport::{Directory, LocalNetwork, Transport, TransportError};
