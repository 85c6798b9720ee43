//! Enforcement context: the per-security-level capabilities the engine relies on
//!
//! Every enforcement instance runs inside some trust boundary that decides how
//! clocks are read, how token signatures are checked and how key ids are
//! derived. Those decisions live behind [`EnforcementContext`]. Optional
//! capabilities (HMAC sharing, a secure clock) are probed through provided
//! methods whose defaults report the capability as absent, so the engine can
//! answer `Unimplemented` instead of assuming support.

use keyguard_core::{HardwareAuthToken, KmId, KmResult, SecurityLevel};
use keyguard_crypto::HmacKey;

/// Capabilities an enforcement instance needs from its environment.
pub trait EnforcementContext: Send + Sync {
    /// Trust tier this instance represents
    fn security_level(&self) -> SecurityLevel;

    /// Monotonic boot-relative time in milliseconds
    fn current_time_ms(&self) -> u64;

    /// Whether the wall-clock activation date (ms since epoch) has been reached
    fn activation_date_valid(&self, activation_date_ms: u64) -> bool;

    /// Whether the wall-clock expiration date (ms since epoch) has passed
    fn expiration_date_passed(&self, expiration_date_ms: u64) -> bool;

    /// Verify an auth token's MAC.
    ///
    /// `negotiated_key` is the key agreed through HMAC sharing, `None` while no
    /// agreement has completed. Contexts with their own signing key may ignore it.
    fn validate_token_signature(
        &self,
        token: &HardwareAuthToken,
        negotiated_key: Option<&HmacKey>,
    ) -> bool;

    /// Stable tracking id for a key blob
    fn create_key_id(&self, key_blob: &[u8]) -> KmResult<KmId>;

    /// Whether `timeout_secs` have elapsed since the token was minted.
    fn auth_token_timed_out(&self, token: &HardwareAuthToken, timeout_secs: u32) -> bool {
        let expires_at = token
            .timestamp_ms
            .saturating_add(u64::from(timeout_secs).saturating_mul(1000));
        self.current_time_ms() > expires_at
    }

    /// HMAC sharing capability, if this security level participates
    fn hmac_sharing(&self) -> Option<&dyn HmacSharingSupport> {
        None
    }

    /// Whether this instance may issue timestamp tokens for peers
    fn supports_secure_clock(&self) -> bool {
        false
    }
}

/// Inputs to the HMAC agreement protocol.
pub trait HmacSharingSupport: Send + Sync {
    /// Seed published with this instance's parameters (at most 32 bytes)
    fn sharing_seed(&self) -> &[u8];

    /// Key material shared by every participant before agreement
    fn preshared_key(&self) -> &[u8];

    /// Fresh 32-byte nonce
    fn random_nonce(&self) -> [u8; 32];
}
