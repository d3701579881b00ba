// Onion routing — circuit selection and layered envelopes

pub mod circuit;
pub mod onion;

pub use circuit::{build_circuit, build_circuit_with_rng, Circuit, CIRCUIT_LENGTH};
pub use onion::{build_envelope, peel_layer, OnionError, PeeledLayer, KEY_SEGMENT_LEN};
