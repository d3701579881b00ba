//! Onion relay services
//!
//! Routers peel one layer per delivery; users build circuits and receive
//! the final plaintext. Both are plain service objects; the transport
//! that carries bytes between them is injected.

pub mod protocol;
pub mod router;
pub mod user;

pub use protocol::{
    ErrorBody, GetNodeRegistryBody, MessageBody, RegisterNodeBody, RegisterNodeResponse,
    ResultBody, SendMessageBody,
};
pub use router::{OnionRouter, RelayError, RouterState};
pub use user::{User, UserError, UserState};
