//! Engine fixtures
//!
//! Engines here use a [`SoftwareContext`] over simulated clocks and seeded
//! randomness, so every run negotiates the same keys and sees the same time.

use crate::builders::KeyAuthorizations;
use keyguard_core::{
    AuthorizationSet, EnforcementConfig, KeyPurpose, KmId, KmResult, OperationHandle,
    SimulatedClock,
};
use keyguard_crypto::SeededRandomSource;
use keyguard_enforcement::{KeyguardEnforcement, SharingCheck, SoftwareContext};

pub type TestEngine = KeyguardEnforcement<SoftwareContext>;

/// An engine together with handles on its clocks.
pub struct EngineFixture {
    /// Monotonic clock read by the engine
    pub clock: SimulatedClock,
    /// Wall clock used for activation and expiration dates
    pub wall_clock: SimulatedClock,
    pub engine: TestEngine,
}

impl EngineFixture {
    /// Fixture with default configuration, monotonic time 0 and a recent wall clock
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, EnforcementConfig::default())
    }

    /// Fixture with custom engine limits
    pub fn with_config(seed: u64, config: EnforcementConfig) -> Self {
        Self::with_clocks(seed, config, SimulatedClock::new(0), SimulatedClock::from_recent())
    }

    /// Fixture reading the given clocks; clones share time with the caller.
    pub fn with_clocks(
        seed: u64,
        config: EnforcementConfig,
        clock: SimulatedClock,
        wall_clock: SimulatedClock,
    ) -> Self {
        let context =
            SoftwareContext::new(clock.clone(), wall_clock.clone(), SeededRandomSource::new(seed));
        Self {
            clock,
            wall_clock,
            engine: KeyguardEnforcement::new(context, config),
        }
    }

    /// Begin an operation against `key`
    pub fn begin(
        &self,
        purpose: KeyPurpose,
        key_id: KmId,
        key: &KeyAuthorizations,
        params: &AuthorizationSet,
    ) -> KmResult<()> {
        self.engine
            .authorize_begin(purpose, key_id, key.proxy(), params)
    }

    pub fn update(
        &self,
        key: &KeyAuthorizations,
        params: &AuthorizationSet,
        handle: OperationHandle,
    ) -> KmResult<()> {
        self.engine.authorize_update(key.proxy(), params, handle)
    }

    pub fn finish(
        &self,
        key: &KeyAuthorizations,
        params: &AuthorizationSet,
        handle: OperationHandle,
    ) -> KmResult<()> {
        self.engine.authorize_finish(key.proxy(), params, handle)
    }
}

/// Run the full agreement across `engines`, returning every participant's check.
pub fn agree_all(engines: &[&TestEngine]) -> KmResult<Vec<SharingCheck>> {
    let params = engines
        .iter()
        .map(|engine| engine.get_hmac_sharing_parameters())
        .collect::<KmResult<Vec<_>>>()?;
    engines
        .iter()
        .map(|engine| engine.compute_shared_hmac(&params))
        .collect()
}

/// Two engines sharing one monotonic clock that have completed agreement.
pub fn agreed_pair(seed: u64) -> (EngineFixture, EngineFixture) {
    let clock = SimulatedClock::new(0);
    let wall_clock = SimulatedClock::from_recent();
    let a = EngineFixture::with_clocks(
        seed,
        EnforcementConfig::default(),
        clock.clone(),
        wall_clock.clone(),
    );
    let b = EngineFixture::with_clocks(
        seed.wrapping_add(1),
        EnforcementConfig::default(),
        clock,
        wall_clock,
    );
    let checks = agree_all(&[&a.engine, &b.engine]).expect("agreement between fixtures");
    assert_eq!(checks[0], checks[1], "fixture engines disagree on the shared key");
    (a, b)
}
