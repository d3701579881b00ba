// Circuit Building — Selecting relay paths
//
// Picks an ordered, duplicate-free path of relays by sampling without
// replacement from the registry snapshot.

use crate::registry::Node;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of relays in a full circuit
pub const CIRCUIT_LENGTH: usize = 3;

/// Ordered relay path, entry first, exit last
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Circuit {
    hops: Vec<Node>,
}

impl Circuit {
    pub fn new(hops: Vec<Node>) -> Self {
        Self { hops }
    }

    pub fn hops(&self) -> &[Node] {
        &self.hops
    }

    /// First relay; the sender delivers the envelope here
    pub fn entry(&self) -> Option<&Node> {
        self.hops.first()
    }

    /// Last relay; it sees the plaintext and the final address
    pub fn exit(&self) -> Option<&Node> {
        self.hops.last()
    }

    pub fn node_ids(&self) -> Vec<u32> {
        self.hops.iter().map(|n| n.node_id).collect()
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// Shorter than requested because too few relays were available
    pub fn is_degraded(&self, requested: usize) -> bool {
        self.hops.len() < requested
    }
}

/// Build a circuit of up to `length` distinct relays using the thread RNG
pub fn build_circuit(available: &[Node], length: usize) -> Circuit {
    build_circuit_with_rng(available, length, &mut rand::thread_rng())
}

/// Build a circuit of up to `length` distinct relays.
///
/// Each step picks a uniformly random index from the remaining pool and
/// removes it, so the loop runs at most `length` times and can never pick
/// the same registry entry twice. With fewer than `length` candidates the
/// circuit is shorter; that is degraded operation, not an error.
pub fn build_circuit_with_rng<R: Rng + ?Sized>(available: &[Node], length: usize, rng: &mut R) -> Circuit {
    let mut pool: Vec<usize> = (0..available.len()).collect();
    let mut hops: Vec<Node> = Vec::with_capacity(length.min(available.len()));

    while hops.len() < length && !pool.is_empty() {
        let pick = pool.swap_remove(rng.gen_range(0..pool.len()));
        let candidate = &available[pick];

        // The registry never holds two entries for one id, but a snapshot
        // from an untrusted directory might
        if hops.iter().any(|n| n.node_id == candidate.node_id) {
            continue;
        }
        hops.push(candidate.clone());
    }

    let circuit = Circuit::new(hops);
    if circuit.is_degraded(length) {
        tracing::warn!(
            "Degraded circuit: {} of {} requested relays ({} available)",
            circuit.len(),
            length,
            available.len()
        );
    }
    circuit
}
