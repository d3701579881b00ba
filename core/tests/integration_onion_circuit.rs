//! Onion envelope integration tests
//!
//! Builds envelopes exactly as a sender would and peels them hop by hop
//! with each relay's private key.
//!
//! Run with: cargo test --test integration_onion_circuit

use async_trait::async_trait;
use onionmesh_core::crypto::codec;
use onionmesh_core::privacy::{build_circuit, build_envelope, peel_layer, Circuit};
use onionmesh_core::transport::{Transport, TransportError};
use onionmesh_core::{
    Address, NodeRegistry, OnionError, PortLayout, RegistryError, RsaKeyPair, User, KEY_SEGMENT_LEN,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn relay_keys() -> &'static [RsaKeyPair] {
    static KEYS: OnceLock<Vec<RsaKeyPair>> = OnceLock::new();
    KEYS.get_or_init(|| (0..3).map(|_| RsaKeyPair::generate().unwrap()).collect())
}

/// Registry with nodes {1: A, 2: B, 3: C}
fn scenario_registry() -> NodeRegistry {
    let registry = NodeRegistry::new();
    for (i, keys) in relay_keys().iter().enumerate() {
        let pub_key = codec::export_public_key(&keys.public_key).unwrap();
        registry.register(i as u32 + 1, pub_key).unwrap();
    }
    registry
}

fn private_keys_by_id() -> HashMap<u32, &'static RsaKeyPair> {
    relay_keys()
        .iter()
        .enumerate()
        .map(|(i, keys)| (i as u32 + 1, keys))
        .collect()
}

#[derive(Default)]
struct CapturingTransport {
    sent: Mutex<Vec<(Address, String)>>,
}

#[async_trait]
impl Transport for CapturingTransport {
    async fn deliver(&self, to: Address, message: String) -> Result<(), TransportError> {
        self.sent.lock().push((to, message));
        Ok(())
    }
}

#[test]
fn test_envelope_peel_order() {
    let layout = PortLayout::default();
    let registry = scenario_registry();
    let circuit = Circuit::new(registry.list_nodes());
    let destination = Address::new(5001);

    let envelope = build_envelope("M", destination, &circuit, &layout).unwrap();
    let keys = private_keys_by_id();

    let a = peel_layer(&envelope, &keys[&1].private_key).unwrap();
    assert_eq!(a.next_hop, layout.router(2).unwrap());

    let b = peel_layer(&a.remainder, &keys[&2].private_key).unwrap();
    assert_eq!(b.next_hop, layout.router(3).unwrap());

    let c = peel_layer(&b.remainder, &keys[&3].private_key).unwrap();
    assert_eq!(c.next_hop, destination);
    assert_eq!(c.remainder, "M");

    println!("✓ Peeling A → B → C recovers next hops and plaintext");
}

#[test]
fn test_out_of_order_peel_fails() {
    let layout = PortLayout::default();
    let registry = scenario_registry();
    let circuit = Circuit::new(registry.list_nodes());
    let envelope = build_envelope("M", Address::new(5001), &circuit, &layout).unwrap();
    let keys = private_keys_by_id();

    // Exit relay first: it cannot open the entry layer
    assert_eq!(
        peel_layer(&envelope, &keys[&3].private_key).unwrap_err(),
        OnionError::KeyUnwrapFailure
    );

    // Skipping the middle relay fails the same way
    let a = peel_layer(&envelope, &keys[&1].private_key).unwrap();
    assert_eq!(
        peel_layer(&a.remainder, &keys[&3].private_key).unwrap_err(),
        OnionError::KeyUnwrapFailure
    );
}

#[tokio::test]
async fn test_send_scenario_random_circuit() -> anyhow::Result<()> {
    let layout = PortLayout::default();
    let registry = scenario_registry();
    let transport = CapturingTransport::default();
    let sender = User::new(0, layout)?;
    let keys = private_keys_by_id();

    for _ in 0..5 {
        let circuit = sender
            .send("hello", Address::parse_header("0000005001")?, &registry, &transport)
            .await?;
        assert_eq!(circuit.len(), 3);

        let (to, envelope) = transport.sent.lock().pop().expect("envelope delivered");
        let entry = circuit.entry().unwrap().node_id;
        assert_eq!(to, layout.router(entry)?);

        // Walk the randomly chosen permutation in circuit order
        let mut current = envelope;
        let mut forward_target = to;
        for (index, node) in circuit.hops().iter().enumerate() {
            assert_eq!(forward_target, layout.router(node.node_id)?);
            assert_eq!(current[..KEY_SEGMENT_LEN].len(), 344);

            let peeled = peel_layer(&current, &keys[&node.node_id].private_key)?;
            if index + 1 < circuit.len() {
                assert!(!peeled.remainder.contains("hello"));
            }
            forward_target = peeled.next_hop;
            current = peeled.remainder;
        }

        assert_eq!(current, "hello");
        assert_eq!(forward_target.to_string(), "0000005001");
    }

    Ok(())
}

#[test]
fn test_duplicate_registration_keeps_count() {
    let registry = scenario_registry();
    let pub_key = codec::export_public_key(&relay_keys()[0].public_key).unwrap();

    assert_eq!(
        registry.register(2, pub_key).unwrap_err(),
        RegistryError::DuplicateRegistration(2)
    );
    assert_eq!(registry.len(), 3);
}

#[test]
fn test_circuit_never_repeats_relays() {
    let registry = scenario_registry();
    let nodes = registry.list_nodes();

    for length in 0..6 {
        for _ in 0..50 {
            let mut ids = build_circuit(&nodes, length).node_ids();
            let before = ids.len();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), before);
            assert_eq!(before, length.min(nodes.len()));
        }
    }
}
