//! Shared-key derivation for the HMAC agreement protocol
//!
//! Every participant feeds the same framed context (all participants' seeds
//! and nonces, in the agreed order) and the same pre-shared key into
//! HKDF-SHA256, so all of them arrive at the same 32-byte key.

use crate::hmac::{hmac_sha256, HmacKey, MAC_LEN};
use hkdf::Hkdf;
use keyguard_core::{KeyguardError, Result};
use sha2::Sha256;

/// HKDF info label for the negotiated MAC key
pub const SHARED_MAC_LABEL: &[u8] = b"KeyguardSharedMac";

/// Message MACed to produce the sharing check value
pub const SHARING_CHECK_MESSAGE: &[u8] = b"Keyguard HMAC Verification";

/// Maximum seed length a participant may publish
pub const MAX_SEED_LEN: usize = 32;

/// One participant's contribution to the agreement context.
#[derive(Debug, Clone, Copy)]
pub struct ParticipantShare<'a> {
    pub seed: &'a [u8],
    pub nonce: &'a [u8; 32],
}

/// Frame participants as `len(seed) u32 BE || seed || nonce`, in order.
pub fn agreement_context(shares: &[ParticipantShare<'_>]) -> Result<Vec<u8>> {
    let mut context = Vec::with_capacity(shares.len() * (4 + MAX_SEED_LEN + 32));
    for share in shares {
        if share.seed.len() > MAX_SEED_LEN {
            return Err(KeyguardError::invalid(format!(
                "sharing seed of {} bytes exceeds {MAX_SEED_LEN}",
                share.seed.len()
            )));
        }
        // bounded by MAX_SEED_LEN above
        let seed_len = share.seed.len() as u32;
        context.extend_from_slice(&seed_len.to_be_bytes());
        context.extend_from_slice(share.seed);
        context.extend_from_slice(share.nonce);
    }
    Ok(context)
}

/// Derive the negotiated HMAC key from the pre-shared key and framed context.
pub fn derive_shared_key(preshared_key: &[u8], context: &[u8]) -> Result<HmacKey> {
    if context.is_empty() {
        return Err(KeyguardError::invalid("agreement context is empty"));
    }
    let hkdf = Hkdf::<Sha256>::new(Some(context), preshared_key);
    let mut okm = [0u8; MAC_LEN];
    hkdf.expand(SHARED_MAC_LABEL, &mut okm)
        .map_err(|e| KeyguardError::crypto(format!("HKDF expansion failed: {e:?}")))?;
    Ok(HmacKey::new(okm))
}

/// Check value every participant must compute identically.
pub fn sharing_check(key: &HmacKey) -> [u8; MAC_LEN] {
    hmac_sha256(key, &[SHARING_CHECK_MESSAGE])
}
