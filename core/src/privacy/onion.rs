// Onion-Layered Relay — envelope construction and per-hop peeling
//
// Layer layout (all text, so it travels in a JSON string):
//
//   [ base64(RSA-OAEP(symKey)) : KEY_SEGMENT_LEN chars ]
//   [ base64(IV || AES-256-CBC(symKey, nextHop || inner)) ]
//
// nextHop is an ADDRESS_WIDTH-digit header. `inner` is the next layer,
// or the plaintext message for the exit relay.

use crate::address::{Address, PortLayout, ADDRESS_WIDTH};
use crate::crypto::{
    asymmetric_decrypt, asymmetric_encrypt, codec, symmetric_decrypt, symmetric_encrypt,
    SymmetricKey, RSA_KEY_BITS,
};
use crate::privacy::circuit::Circuit;
use crate::registry::Node;
use rsa::RsaPrivateKey;
use thiserror::Error;
use zeroize::Zeroizing;

/// Length of the base64 RSA-wrapped key at the front of every layer.
/// 2048-bit OAEP ciphertext is 256 bytes, which base64 renders as 344 chars.
pub const KEY_SEGMENT_LEN: usize = (RSA_KEY_BITS / 8).div_ceil(3) * 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OnionError {
    #[error("Invalid onion envelope")]
    InvalidEnvelope,
    #[error("Key unwrap failed (layer not encrypted for this relay)")]
    KeyUnwrapFailure,
    #[error("Payload decryption failed")]
    PayloadDecryptFailure,
    #[error("Invalid hop address")]
    InvalidHopAddress,
    #[error("Invalid public key for node {0}")]
    InvalidPublicKey(u32),
    #[error("Node {node_id} uses an unsupported key size ({segment_len}-char wrapped key)")]
    UnsupportedKeySize { node_id: u32, segment_len: usize },
    #[error("Circuit has no relays")]
    EmptyCircuit,
    #[error("Encryption failed")]
    EncryptionFailed,
}

/// Result of removing one layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeeledLayer {
    /// Where the remainder goes next
    pub next_hop: Address,
    /// Next envelope, or the plaintext if this relay is the exit
    pub remainder: String,
}

/// Construct an onion envelope for `circuit`.
///
/// Built inside out: the exit relay's layer wraps `final_address || message`,
/// and every earlier relay's layer wraps the address of the relay after it
/// followed by that relay's layer. The returned string goes to the entry relay.
pub fn build_envelope(
    message: &str,
    final_address: Address,
    circuit: &Circuit,
    layout: &PortLayout,
) -> Result<String, OnionError> {
    if circuit.is_empty() {
        return Err(OnionError::EmptyCircuit);
    }

    let mut next_hop = final_address;
    let mut inner = message.to_string();

    for node in circuit.hops().iter().rev() {
        inner = seal_layer(next_hop, &inner, node)?;
        next_hop = layout
            .router(node.node_id)
            .map_err(|_| OnionError::InvalidHopAddress)?;
    }

    Ok(inner)
}

fn seal_layer(next_hop: Address, inner: &str, node: &Node) -> Result<String, OnionError> {
    let public_key =
        codec::import_public_key(&node.pub_key).map_err(|_| OnionError::InvalidPublicKey(node.node_id))?;

    let key = SymmetricKey::generate();
    let payload = format!("{}{}", next_hop, inner);
    let encrypted_payload = codec::encode(&symmetric_encrypt(&key, payload.as_bytes()));

    let wrapped_key =
        asymmetric_encrypt(key.as_bytes(), &public_key).map_err(|_| OnionError::EncryptionFailed)?;
    let encrypted_key = codec::encode(&wrapped_key);

    // Peeling splits at a fixed offset, so every relay must share the modulus size
    if encrypted_key.len() != KEY_SEGMENT_LEN {
        return Err(OnionError::UnsupportedKeySize {
            node_id: node.node_id,
            segment_len: encrypted_key.len(),
        });
    }

    let mut layer = encrypted_key;
    layer.push_str(&encrypted_payload);
    Ok(layer)
}

/// Peel one layer of onion encryption.
///
/// Called by a relay with its own private key. The remainder is returned
/// untouched; the relay never re-encrypts or inspects it.
pub fn peel_layer(envelope: &str, private_key: &RsaPrivateKey) -> Result<PeeledLayer, OnionError> {
    let encrypted_key = envelope
        .get(..KEY_SEGMENT_LEN)
        .ok_or(OnionError::InvalidEnvelope)?;
    let encrypted_payload = envelope
        .get(KEY_SEGMENT_LEN..)
        .ok_or(OnionError::InvalidEnvelope)?;

    let wrapped_key = codec::decode(encrypted_key).map_err(|_| OnionError::KeyUnwrapFailure)?;
    let key_bytes = Zeroizing::new(
        asymmetric_decrypt(&wrapped_key, private_key).map_err(|_| OnionError::KeyUnwrapFailure)?,
    );
    let key = SymmetricKey::try_from(key_bytes.as_slice()).map_err(|_| OnionError::KeyUnwrapFailure)?;

    let sealed = codec::decode(encrypted_payload).map_err(|_| OnionError::PayloadDecryptFailure)?;
    let payload = symmetric_decrypt(&key, &sealed).map_err(|_| OnionError::PayloadDecryptFailure)?;
    let payload = String::from_utf8(payload).map_err(|_| OnionError::PayloadDecryptFailure)?;

    let header = payload
        .get(..ADDRESS_WIDTH)
        .ok_or(OnionError::InvalidHopAddress)?;
    let next_hop = Address::parse_header(header).map_err(|_| OnionError::InvalidHopAddress)?;

    Ok(PeeledLayer {
        next_hop,
        remainder: payload[ADDRESS_WIDTH..].to_string(),
    })
}
