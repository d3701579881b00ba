// Cryptography module — key transport encoding and the hybrid RSA/AES cipher

pub mod codec;
pub mod hybrid;

pub use codec::CodecError;
pub use hybrid::{
    asymmetric_decrypt, asymmetric_encrypt, symmetric_decrypt, symmetric_encrypt, CryptoError,
    RsaKeyPair, SymmetricKey, IV_LEN, RSA_KEY_BITS, SYMMETRIC_KEY_LEN,
};
