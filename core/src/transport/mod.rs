// Transport module — delivery and directory seams

pub mod abstraction;
pub mod local;

pub use abstraction::{Directory, Transport, TransportError};
pub use local::{Endpoint, LocalNetwork};
