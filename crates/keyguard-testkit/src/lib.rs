//! Keyguard Testing Infrastructure
//!
//! Shared fixtures for enforcement tests: key authorization builders, engines
//! wired to simulated clocks and seeded randomness, HMAC agreement helpers and
//! auth token minting.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//!
//! # Usage
//!
//! ```rust,ignore
//! use keyguard_testkit::*;
//!
//! #[test]
//! fn my_test() {
//!     let fixture = EngineFixture::new(42);
//!     let key = KeyAuthBuilder::new().purpose(KeyPurpose::Sign).no_auth_required().build();
//!     assert!(fixture.begin(KeyPurpose::Sign, KmId(1), &key, &AuthorizationSet::new()).is_ok());
//! }
//! ```

pub mod builders;
pub mod fixtures;
pub mod tokens;

pub use builders::{KeyAuthBuilder, KeyAuthorizations};
pub use fixtures::{agree_all, agreed_pair, EngineFixture, TestEngine};
pub use tokens::{mint_auth_token, params_with_token, TokenTemplate};

pub use keyguard_core::{
    AuthProxy, AuthorizationSet, EnforcementConfig, ErrorCode, HardwareAuthenticatorType,
    KeyParam, KeyPurpose, KmId, OperationHandle, SimulatedClock,
};

/// Install a test-friendly tracing subscriber honoring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
