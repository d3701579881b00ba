// Hop addressing — fixed-width numeric endpoint identifiers
//
// Every hop and destination travels inside an onion layer as exactly
// ADDRESS_WIDTH ASCII digits, so peeling is a fixed-offset slice.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Width of the address header carried at the front of every decrypted layer
pub const ADDRESS_WIDTH: usize = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid address header {0:?} (expected 10 ASCII digits)")]
    InvalidHeader(String),
    #[error("Address out of range: {base} + {offset}")]
    OutOfRange { base: u32, offset: u32 },
}

/// Numeric network endpoint identifier (a port on the local host in the
/// HTTP deployment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(u32);

impl Address {
    pub const fn new(value: u32) -> Self {
        Address(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Parse a header produced by `Display`.
    ///
    /// Only exactly `ADDRESS_WIDTH` ASCII digits are accepted; signs,
    /// whitespace and shorter/longer strings are rejected.
    pub fn parse_header(header: &str) -> Result<Self, AddressError> {
        if header.len() != ADDRESS_WIDTH || !header.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AddressError::InvalidHeader(header.to_string()));
        }
        header
            .parse::<u32>()
            .map(Address)
            .map_err(|_| AddressError::InvalidHeader(header.to_string()))
    }

    /// Port number, if the address fits in one
    pub fn port(&self) -> Option<u16> {
        u16::try_from(self.0).ok()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.0, width = ADDRESS_WIDTH)
    }
}

impl From<u16> for Address {
    fn from(port: u16) -> Self {
        Address(u32::from(port))
    }
}

/// Port assignment for the three service kinds.
///
/// Router `n` listens on `router_base_port + n`, user `n` on
/// `user_base_port + n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortLayout {
    pub registry_port: u16,
    pub router_base_port: u16,
    pub user_base_port: u16,
}

impl Default for PortLayout {
    fn default() -> Self {
        Self {
            registry_port: 8080,
            router_base_port: 4000,
            user_base_port: 5000,
        }
    }
}

impl PortLayout {
    pub fn registry(&self) -> Address {
        Address::from(self.registry_port)
    }

    pub fn router(&self, node_id: u32) -> Result<Address, AddressError> {
        offset(self.router_base_port, node_id)
    }

    pub fn user(&self, user_id: u32) -> Result<Address, AddressError> {
        offset(self.user_base_port, user_id)
    }
}

fn offset(base: u16, id: u32) -> Result<Address, AddressError> {
    u32::from(base)
        .checked_add(id)
        .map(Address)
        .ok_or(AddressError::OutOfRange {
            base: u32::from(base),
            offset: id,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_display_is_zero_padded() {
        assert_eq!(Address::new(5001).to_string(), "0000005001");
        assert_eq!(Address::new(0).to_string(), "0000000000");
        assert_eq!(Address::new(u32::MAX).to_string(), "4294967295");
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(Address::parse_header("0000004002").unwrap(), Address::new(4002));
        assert!(Address::parse_header("4002").is_err());
        assert!(Address::parse_header("+000004002").is_err());
        assert!(Address::parse_header("00000 4002").is_err());
        assert!(Address::parse_header("9999999999").is_err());
    }

    #[test]
    fn test_port_layout_defaults() {
        let layout = PortLayout::default();
        assert_eq!(layout.user(1).unwrap().to_string(), "0000005001");
        assert_eq!(layout.router(2).unwrap().to_string(), "0000004002");
        assert_eq!(layout.registry().port(), Some(8080));
    }

    #[test]
    fn test_port_layout_overflow() {
        let layout = PortLayout::default();
        assert!(matches!(
            layout.router(u32::MAX),
            Err(AddressError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_serializes_as_number() {
        let json = serde_json::to_string(&Address::new(4001)).unwrap();
        assert_eq!(json, "4001");
    }

    proptest! {
        #[test]
        fn prop_header_is_fixed_width(value in any::<u32>()) {
            let header = Address::new(value).to_string();
            prop_assert_eq!(header.len(), ADDRESS_WIDTH);
            prop_assert_eq!(Address::parse_header(&header).unwrap(), Address::new(value));
        }
    }
}
