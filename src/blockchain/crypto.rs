use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::fmt;
use std::str::FromStr;

pub use ed25519_dalek::Signature;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),
}

/// Represents an account identifier (ed25519 public key, base58 when printed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Account(pub [u8; 32]);

impl Account {
    /// Creates an account from a public key
    pub fn from_public_key(public_key: &VerifyingKey) -> Self {
        Account(public_key.to_bytes())
    }

    /// Converts the account back to its public key
    pub fn to_public_key(&self) -> Result<VerifyingKey, CryptoError> {
        VerifyingKey::from_bytes(&self.0).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl FromStr for Account {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidPublicKey("Invalid public key length".to_string())
        })?;

        Ok(Account(bytes))
    }
}

/// Digest identifying a block's contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct BlockHash(pub [u8; 32]);

impl BlockHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Signs the hash with the given keys
    pub fn sign(&self, keys: &KeyPair) -> Signature {
        keys.sign(&self.0)
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}

impl FromStr for BlockHash {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| CryptoError::DecodingError(e.to_string()))?;
        Ok(BlockHash(bytes))
    }
}

/// An ed25519 keypair together with the account it controls
#[derive(Debug, Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    account: Account,
}

impl KeyPair {
    /// Creates a new random keypair
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        let signing_key = SigningKey::generate(&mut csprng);
        Self::from_signing_key(signing_key)
    }

    /// Creates a keypair from existing secret key bytes
    ///
    /// # Arguments
    ///
    /// * `secret_key_bytes` - The 32 byte ed25519 seed
    pub fn from_secret_key(secret_key_bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes_array: [u8; 32] = secret_key_bytes.try_into().map_err(|_| {
            CryptoError::InvalidPrivateKey("Invalid private key length".to_string())
        })?;

        Ok(Self::from_signing_key(SigningKey::from_bytes(&bytes_array)))
    }

    /// Creates a keypair from a hex encoded secret key
    pub fn from_hex(private_key: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(private_key).map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        Self::from_secret_key(&bytes)
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = VerifyingKey::from(&signing_key);
        let account = Account::from_public_key(&verifying_key);

        KeyPair {
            signing_key,
            verifying_key,
            account,
        }
    }

    pub fn account(&self) -> Account {
        self.account
    }

    pub fn public_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Signs a message with the private key
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// Exports the secret key as hex
    pub fn export_secret_key(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }
}

/// Verifies a signature over a block hash against the owning account
///
/// Returns `Ok(false)` for a well-formed key whose signature does not match.
pub fn verify_signature(hash: &BlockHash, signature: &Signature, account: &Account) -> Result<bool, CryptoError> {
    let public_key = account.to_public_key()?;
    Ok(public_key.verify(hash.as_bytes(), signature).is_ok())
}
