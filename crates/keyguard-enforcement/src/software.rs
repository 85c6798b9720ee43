//! Software-tier enforcement context
//!
//! Complete [`EnforcementContext`] for instances running without dedicated
//! secure hardware. Clocks and randomness are injected so the same context
//! serves production (OS clocks and entropy) and tests (simulated clock,
//! seeded randomness).

use crate::context::{EnforcementContext, HmacSharingSupport};
use keyguard_core::{
    HardwareAuthToken, KmId, KmResult, MonotonicClock, SecurityLevel, SystemClock, TimeSource,
};
use keyguard_crypto::{derive_key_id, verify_auth_token, HmacKey, OsRandomSource, RandomSource};
use std::sync::Arc;

/// Enforcement context backed by injected clocks and randomness.
#[derive(Clone)]
pub struct SoftwareContext {
    monotonic: Arc<dyn TimeSource>,
    wall_clock: Arc<dyn TimeSource>,
    random: Arc<dyn RandomSource>,
    sharing_seed: Vec<u8>,
    preshared_key: HmacKey,
    secure_clock: bool,
}

impl SoftwareContext {
    /// Build a context from its time and randomness sources.
    ///
    /// The sharing seed starts empty and the pre-shared key is all zeros, which
    /// is what software-tier participants use for agreement.
    pub fn new(
        monotonic: impl TimeSource + 'static,
        wall_clock: impl TimeSource + 'static,
        random: impl RandomSource + 'static,
    ) -> Self {
        Self {
            monotonic: Arc::new(monotonic),
            wall_clock: Arc::new(wall_clock),
            random: Arc::new(random),
            sharing_seed: Vec::new(),
            preshared_key: HmacKey::new([0u8; 32]),
            secure_clock: true,
        }
    }

    /// Context using the OS monotonic clock, wall clock and entropy
    pub fn production() -> Self {
        Self::new(MonotonicClock::new(), SystemClock, OsRandomSource)
    }

    /// Seed contributed to HMAC agreement
    pub fn with_sharing_seed(mut self, seed: impl Into<Vec<u8>>) -> Self {
        self.sharing_seed = seed.into();
        self
    }

    /// Pre-shared key used as HKDF input keying material
    pub fn with_preshared_key(mut self, key: HmacKey) -> Self {
        self.preshared_key = key;
        self
    }

    /// Whether timestamp tokens may be issued from this context's monotonic clock
    pub fn with_secure_clock(mut self, enabled: bool) -> Self {
        self.secure_clock = enabled;
        self
    }
}

impl std::fmt::Debug for SoftwareContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareContext")
            .field("simulated_time", &self.monotonic.is_simulated())
            .field("sharing_seed_len", &self.sharing_seed.len())
            .field("secure_clock", &self.secure_clock)
            .finish_non_exhaustive()
    }
}

impl EnforcementContext for SoftwareContext {
    fn security_level(&self) -> SecurityLevel {
        SecurityLevel::Software
    }

    fn current_time_ms(&self) -> u64 {
        self.monotonic.now_ms()
    }

    fn activation_date_valid(&self, activation_date_ms: u64) -> bool {
        self.wall_clock.now_ms() >= activation_date_ms
    }

    fn expiration_date_passed(&self, expiration_date_ms: u64) -> bool {
        self.wall_clock.now_ms() > expiration_date_ms
    }

    fn validate_token_signature(
        &self,
        token: &HardwareAuthToken,
        negotiated_key: Option<&HmacKey>,
    ) -> bool {
        match negotiated_key {
            Some(key) => verify_auth_token(key, token),
            None => {
                tracing::debug!("no negotiated key; auth token signature cannot be checked");
                false
            }
        }
    }

    fn create_key_id(&self, key_blob: &[u8]) -> KmResult<KmId> {
        Ok(derive_key_id(key_blob)?)
    }

    fn hmac_sharing(&self) -> Option<&dyn HmacSharingSupport> {
        Some(self)
    }

    fn supports_secure_clock(&self) -> bool {
        self.secure_clock
    }
}

impl HmacSharingSupport for SoftwareContext {
    fn sharing_seed(&self) -> &[u8] {
        &self.sharing_seed
    }

    fn preshared_key(&self) -> &[u8] {
        self.preshared_key.as_bytes()
    }

    fn random_nonce(&self) -> [u8; 32] {
        self.random.random_32()
    }
}
