// Hybrid cipher: RSA-OAEP (SHA-256) wraps per-layer AES-256-CBC keys
//
// Flow for one layer:
// 1. SymmetricKey::generate() → fresh 256-bit key
// 2. symmetric_encrypt(key, body) → IV || AES-256-CBC(body), PKCS#7 padded
// 3. asymmetric_encrypt(key bytes, relay_public) → 256-byte OAEP ciphertext
//
// The relay reverses with its private key. RSA only ever sees the 32-byte
// key; bodies of any length go through AES.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// RSA modulus size. Changing it changes the wrapped-key segment length.
pub const RSA_KEY_BITS: usize = 2048;

/// Size of the AES-256 key (bytes)
pub const SYMMETRIC_KEY_LEN: usize = 32;

/// Size of the CBC initialization vector (bytes)
pub const IV_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),
    #[error("Encryption failed: {0}")]
    EncryptionFailure(String),
    #[error("Decryption failed")]
    DecryptionFailure,
}

/// 2048-bit RSA key pair used by a relay.
///
/// The public half is published to the registry; the private half never
/// leaves the relay except through the debug export.
#[derive(Clone)]
pub struct RsaKeyPair {
    pub public_key: RsaPublicKey,
    pub private_key: RsaPrivateKey,
}

impl RsaKeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Result<Self, CryptoError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let public_key = RsaPublicKey::from(&private_key);
        Ok(Self {
            public_key,
            private_key,
        })
    }
}

impl std::fmt::Debug for RsaKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaKeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// Encrypt a short payload (a symmetric key) for the holder of `public_key`
pub fn asymmetric_encrypt(plaintext: &[u8], public_key: &RsaPublicKey) -> Result<Vec<u8>, CryptoError> {
    public_key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext)
        .map_err(|e| CryptoError::EncryptionFailure(e.to_string()))
}

pub fn asymmetric_decrypt(ciphertext: &[u8], private_key: &RsaPrivateKey) -> Result<Vec<u8>, CryptoError> {
    private_key
        .decrypt(Oaep::new::<Sha256>(), ciphertext)
        .map_err(|_| CryptoError::DecryptionFailure)
}

/// AES-256 session key. Generated per (message, relay) pair, wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; SYMMETRIC_KEY_LEN]);

impl SymmetricKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; SYMMETRIC_KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        SymmetricKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_LEN] {
        &self.0
    }
}

impl TryFrom<&[u8]> for SymmetricKey {
    type Error = std::array::TryFromSliceError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; SYMMETRIC_KEY_LEN]>::try_from(bytes).map(SymmetricKey)
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// Encrypt with a fresh random IV; output is `IV || ciphertext`
pub fn symmetric_encrypt(key: &SymmetricKey, plaintext: &[u8]) -> Vec<u8> {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new(key.as_bytes().into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut output = Vec::with_capacity(IV_LEN + ciphertext.len());
    output.extend_from_slice(&iv);
    output.extend_from_slice(&ciphertext);
    output
}

/// Decrypt `IV || ciphertext` produced by [`symmetric_encrypt`]
pub fn symmetric_decrypt(key: &SymmetricKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data.len() < IV_LEN {
        return Err(CryptoError::DecryptionFailure);
    }
    let (iv, ciphertext) = data.split_at(IV_LEN);

    Aes256CbcDec::new_from_slices(key.as_bytes(), iv)
        .map_err(|_| CryptoError::DecryptionFailure)?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::DecryptionFailure)
}
