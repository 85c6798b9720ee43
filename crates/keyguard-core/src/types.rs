//! Identifier and enumeration types shared across Keyguard

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable 64-bit identifier derived from a key blob.
///
/// Used only as a lookup key for per-key usage tracking. Two identical blobs
/// always produce the same id; distinct blobs collide with low probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KmId(pub u64);

impl KmId {
    /// Create a key id from its raw value
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw identifier value
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Build a key id from the leading eight bytes of a digest (big-endian).
    pub fn from_digest_prefix(digest: &[u8; 32]) -> Self {
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        Self(u64::from_be_bytes(prefix))
    }
}

impl fmt::Display for KmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0.to_be_bytes()))
    }
}

impl From<u64> for KmId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Handle of an in-flight operation; also the challenge bound into
/// per-operation authentication tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationHandle(pub u64);

impl OperationHandle {
    /// Handle used when no operation exists yet (begin).
    pub const NONE: OperationHandle = OperationHandle(0);

    /// Whether this handle identifies a real operation
    pub fn is_set(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Cryptographic operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyPurpose {
    /// Encrypt with the key
    Encrypt,
    /// Decrypt with the key
    Decrypt,
    /// Sign with the key
    Sign,
    /// Verify with the key
    Verify,
    /// Wrap another key for import
    WrapKey,
    /// Key agreement
    AgreeKey,
    /// Sign attestation certificates
    AttestKey,
}

impl KeyPurpose {
    /// Purposes that create new protected data (ciphertext, signatures).
    pub fn is_origination(self) -> bool {
        matches!(self, KeyPurpose::Encrypt | KeyPurpose::Sign)
    }

    /// Purposes that consume previously protected data.
    pub fn is_usage(self) -> bool {
        matches!(self, KeyPurpose::Decrypt | KeyPurpose::Verify)
    }
}

/// Key algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// RSA key pair
    Rsa,
    /// Elliptic-curve key pair
    Ec,
    /// AES symmetric key
    Aes,
    /// Triple-DES symmetric key
    TripleDes,
    /// HMAC key
    Hmac,
}

impl Algorithm {
    /// Whether the key has a public half that needs no protection.
    pub fn is_public_key(self) -> bool {
        matches!(self, Algorithm::Rsa | Algorithm::Ec)
    }
}

/// Trust tier of an enforcement instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecurityLevel {
    /// Plain software, no isolation
    Software,
    /// Trusted execution environment
    TrustedEnvironment,
    /// Discrete secure element
    StrongBox,
}

impl SecurityLevel {
    /// Numeric encoding used in MAC framing.
    pub fn as_u32(self) -> u32 {
        match self {
            SecurityLevel::Software => 0,
            SecurityLevel::TrustedEnvironment => 1,
            SecurityLevel::StrongBox => 2,
        }
    }
}

/// Bitmask of authenticator kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HardwareAuthenticatorType(pub u32);

impl HardwareAuthenticatorType {
    /// No authenticator
    pub const NONE: Self = Self(0);
    /// Password, PIN or pattern
    pub const PASSWORD: Self = Self(1 << 0);
    /// Fingerprint sensor
    pub const FINGERPRINT: Self = Self(1 << 1);
    /// Any authenticator
    pub const ANY: Self = Self(u32::MAX);

    /// Raw bitmask
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Bits present in both masks
    pub fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Whether the masks share at least one bit
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether every bit of `other` is set here
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for HardwareAuthenticatorType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
