//! HMAC-SHA256 over framed inputs
//!
//! Callers pass the MAC input as a list of chunks that are fed to the MAC in
//! order. Chunk boundaries are not encoded, so every caller must use a
//! fixed-format framing (see [`crate::framing`]).

use hmac::{Hmac, Mac};
use keyguard_core::{KeyguardError, Result};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

/// Length of an HMAC-SHA256 tag and of negotiated keys
pub const MAC_LEN: usize = 32;

/// 256-bit HMAC key, wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct HmacKey([u8; MAC_LEN]);

impl HmacKey {
    /// Wrap raw key bytes
    pub fn new(bytes: [u8; MAC_LEN]) -> Self {
        Self(bytes)
    }

    /// Create a key from a slice that must be exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; MAC_LEN] = bytes.try_into().map_err(|_| {
            KeyguardError::invalid(format!(
                "HMAC key must be {MAC_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(raw))
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; MAC_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HmacKey(<redacted>)")
    }
}

/// HMAC-SHA256 of the concatenated chunks under a raw key of any length.
pub fn hmac_sha256_raw(key: &[u8], chunks: &[&[u8]]) -> Result<[u8; MAC_LEN]> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| KeyguardError::crypto(format!("HMAC key rejected: {e}")))?;
    for chunk in chunks {
        mac.update(chunk);
    }
    let tag = mac.finalize().into_bytes();
    let mut out = [0u8; MAC_LEN];
    out.copy_from_slice(&tag);
    Ok(out)
}

/// HMAC-SHA256 of the concatenated chunks under a negotiated key.
pub fn hmac_sha256(key: &HmacKey, chunks: &[&[u8]]) -> [u8; MAC_LEN] {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    for chunk in chunks {
        mac.update(chunk);
    }
    let tag = mac.finalize().into_bytes();
    let mut out = [0u8; MAC_LEN];
    out.copy_from_slice(&tag);
    out
}

/// Recompute the MAC and compare in constant time.
pub fn verify_hmac_sha256(key: &HmacKey, chunks: &[&[u8]], expected: &[u8]) -> bool {
    constant_time_eq(&hmac_sha256(key, chunks), expected)
}

/// Constant-time byte comparison; slices of different length never match.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
