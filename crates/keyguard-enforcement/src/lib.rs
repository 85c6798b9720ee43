//! Keyguard Enforcement: authorization decisions for hardware-backed keys
//!
//! Given a key's authorizations and an operation's parameters, decide whether
//! the operation may proceed and keep the per-boot state that time and count
//! limits depend on.
//!
//! - [`KeyguardEnforcement`]: the engine and its decision entry points
//! - [`EnforcementContext`]: per-security-level capabilities (clocks, token
//!   signatures, key ids, optional HMAC sharing)
//! - [`SoftwareContext`]: software-tier context with injectable clocks
//! - [`TokenValidator`]: authentication token checks
//! - [`BoundedUsageTracker`]: fixed-capacity per-key usage state
//! - [`HmacAgreement`]: multi-party shared MAC key agreement
//!
//! ## Example
//!
//! ```rust,ignore
//! use keyguard_core::{AuthProxy, AuthorizationSet, EnforcementConfig, KeyParam, KeyPurpose};
//! use keyguard_enforcement::{KeyguardEnforcement, SoftwareContext};
//!
//! let engine =
//!     KeyguardEnforcement::new(SoftwareContext::production(), EnforcementConfig::default());
//! let key = AuthorizationSet::new()
//!     .with(KeyParam::Purpose(KeyPurpose::Sign))
//!     .with(KeyParam::NoAuthRequired)
//!     .with(KeyParam::MaxUsesPerBoot(2));
//! let key_id = engine.create_key_id(b"key blob")?;
//! let params = AuthorizationSet::new();
//! engine.authorize_begin(KeyPurpose::Sign, key_id, AuthProxy::hardware_only(&key), &params)?;
//! ```

pub mod auth_token;
pub mod context;
pub mod engine;
pub mod hmac_sharing;
pub mod software;
pub mod tracker;

pub use auth_token::{AuthRequirements, AuthenticatedToken, TokenBinding, TokenValidator};
pub use context::{EnforcementContext, HmacSharingSupport};
pub use engine::{KeyguardEnforcement, LockState};
pub use hmac_sharing::{AgreementPhase, HmacAgreement, HmacSharingParameters, SharingCheck};
pub use software::SoftwareContext;
pub use tracker::{AccessCountTracker, AccessTimeTracker, BoundedUsageTracker};
