//! Key identifier derivation

use crate::hmac::hmac_sha256_raw;
use keyguard_core::{KmId, Result};

/// Fixed domain-separation key; key ids are not secret, only stable.
const KEY_ID_DOMAIN: &[u8] = b"keyguard.key-id.v1";

/// Derive the tracking id of a key blob: the first eight bytes of
/// HMAC-SHA256(domain, blob).
pub fn derive_key_id(key_blob: &[u8]) -> Result<KmId> {
    let digest = hmac_sha256_raw(KEY_ID_DOMAIN, &[key_blob])?;
    Ok(KmId::from_digest_prefix(&digest))
}
