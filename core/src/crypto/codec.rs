// Key codec — base64 text encoding for key material on the wire
//
// public:    base64(SubjectPublicKeyInfo DER)
// private:   base64(PKCS#8 DER)
// symmetric: base64(raw 32 bytes)

use super::hybrid::{SymmetricKey, SYMMETRIC_KEY_LEN};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Malformed key encoding: {0}")]
    MalformedKeyEncoding(String),
    #[error("Invalid key length (expected {expected}, got {actual})")]
    InvalidKeyLength { expected: usize, actual: usize },
}

pub fn encode(raw: &[u8]) -> String {
    STANDARD.encode(raw)
}

pub fn decode(text: &str) -> Result<Vec<u8>, CodecError> {
    STANDARD
        .decode(text)
        .map_err(|e| CodecError::MalformedKeyEncoding(e.to_string()))
}

pub fn export_public_key(key: &RsaPublicKey) -> Result<String, CodecError> {
    let der = key
        .to_public_key_der()
        .map_err(|e| CodecError::MalformedKeyEncoding(e.to_string()))?;
    Ok(encode(der.as_bytes()))
}

pub fn import_public_key(text: &str) -> Result<RsaPublicKey, CodecError> {
    let der = decode(text)?;
    RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| CodecError::MalformedKeyEncoding(e.to_string()))
}

pub fn export_private_key(key: &RsaPrivateKey) -> Result<String, CodecError> {
    let der = key
        .to_pkcs8_der()
        .map_err(|e| CodecError::MalformedKeyEncoding(e.to_string()))?;
    Ok(encode(der.as_bytes()))
}

pub fn import_private_key(text: &str) -> Result<RsaPrivateKey, CodecError> {
    let der = decode(text)?;
    RsaPrivateKey::from_pkcs8_der(&der).map_err(|e| CodecError::MalformedKeyEncoding(e.to_string()))
}

pub fn export_symmetric_key(key: &SymmetricKey) -> String {
    encode(key.as_bytes())
}

pub fn import_symmetric_key(text: &str) -> Result<SymmetricKey, CodecError> {
    let raw = decode(text)?;
    SymmetricKey::try_from(raw.as_slice()).map_err(|_| CodecError::InvalidKeyLength {
        expected: SYMMETRIC_KEY_LEN,
        actual: raw.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hybrid::test_support::key_pairs;

    #[test]
    fn test_encode_decode_inverse() {
        let raw: Vec<u8> = (0u8..=255).collect();
        let text = encode(&raw);
        assert!(text.is_ascii());
        assert_eq!(decode(&text).unwrap(), raw);
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(
            decode("not base64!!"),
            Err(CodecError::MalformedKeyEncoding(_))
        ));
    }

    #[test]
    fn test_public_key_roundtrip() {
        let keys = &key_pairs()[0];
        let text = export_public_key(&keys.public_key).unwrap();
        let restored = import_public_key(&text).unwrap();
        assert_eq!(restored, keys.public_key);
    }

    #[test]
    fn test_private_key_roundtrip() {
        let keys = &key_pairs()[1];
        let text = export_private_key(&keys.private_key).unwrap();
        let restored = import_private_key(&text).unwrap();
        assert_eq!(RsaPublicKey::from(&restored), keys.public_key);
    }

    #[test]
    fn test_public_key_rejects_garbage_der() {
        let text = encode(b"definitely not a SubjectPublicKeyInfo");
        assert!(matches!(
            import_public_key(&text),
            Err(CodecError::MalformedKeyEncoding(_))
        ));
    }

    #[test]
    fn test_private_key_text_is_not_a_public_key() {
        let keys = &key_pairs()[0];
        let private_text = export_private_key(&keys.private_key).unwrap();
        assert!(import_public_key(&private_text).is_err());
    }

    #[test]
    fn test_symmetric_key_roundtrip() {
        let key = SymmetricKey::generate();
        let text = export_symmetric_key(&key);
        assert_eq!(text.len(), 44);

        let restored = import_symmetric_key(&text).unwrap();
        assert_eq!(restored.as_bytes(), key.as_bytes());
    }

    #[test]
    fn test_symmetric_key_wrong_length() {
        let text = encode(&[1u8; 16]);
        assert_eq!(
            import_symmetric_key(&text).unwrap_err(),
            CodecError::InvalidKeyLength {
                expected: 32,
                actual: 16
            }
        );
    }
}
