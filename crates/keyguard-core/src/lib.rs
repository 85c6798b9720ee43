//! Keyguard Core: shared vocabulary for key authorization enforcement
//!
//! This crate defines the types every other Keyguard crate speaks:
//!
//! - **Errors**: [`ErrorCode`] decision outcomes and the [`KeyguardError`]
//!   infrastructure error
//! - **Authorization sets**: [`Tag`], [`KeyParam`], [`AuthorizationSet`] and the
//!   two-halved [`AuthProxy`] view
//! - **Tokens**: authentication, timestamp and verification tokens
//! - **Configuration**: [`EnforcementConfig`] and the [`KeyguardConfig`] loader
//! - **Time**: injectable [`TimeSource`]s, including a simulated clock

pub mod authorization;
pub mod config;
pub mod errors;
pub mod time;
pub mod tokens;
pub mod types;

pub use authorization::{AuthProxy, AuthorizationSet, KeyParam, Tag};
pub use config::{EnforcementConfig, KeyguardConfig};
pub use errors::{ErrorCode, KeyguardError, KmResult, Result};
pub use time::{MonotonicClock, SimulatedClock, SystemClock, TimeSource};
pub use tokens::{HardwareAuthToken, TimestampToken, VerificationToken, VerifyAuthorizationRequest};
pub use types::{
    Algorithm, HardwareAuthenticatorType, KeyPurpose, KmId, OperationHandle, SecurityLevel,
};
