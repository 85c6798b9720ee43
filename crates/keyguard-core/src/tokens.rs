//! Authentication and cross-instance tokens
//!
//! All tokens carry a MAC computed with the HMAC key negotiated by the
//! agreement protocol. The byte framing that the MAC covers lives in
//! `keyguard-crypto`; this module only defines the records.

use crate::authorization::AuthorizationSet;
use crate::types::{HardwareAuthenticatorType, OperationHandle, SecurityLevel};
use serde::{Deserialize, Serialize};

/// Signed assertion that a user authenticated at a given time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HardwareAuthToken {
    /// Operation handle this token is bound to, or 0 for timeout-based tokens
    pub challenge: u64,
    /// Secure user id
    pub user_id: u64,
    /// Secure id of the authenticator that minted the token
    pub authenticator_id: u64,
    /// Authenticator kinds that were satisfied
    pub authenticator_type: HardwareAuthenticatorType,
    /// Monotonic time of authentication, in milliseconds
    pub timestamp_ms: u64,
    /// HMAC-SHA256 over the framed fields
    pub mac: Vec<u8>,
}

impl HardwareAuthToken {
    /// Whether the token is bound to the given operation
    pub fn is_bound_to(&self, handle: OperationHandle) -> bool {
        self.challenge == handle.0
    }
}

/// Signed assertion of the issuer's current secure time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimestampToken {
    /// Challenge supplied by the requester
    pub challenge: u64,
    /// Issuer's monotonic time in milliseconds
    pub timestamp_ms: u64,
    /// Trust tier of the issuer
    pub security_level: SecurityLevel,
    /// HMAC-SHA256 over the framed fields
    pub mac: Vec<u8>,
}

/// Request to confirm authorization state on behalf of another instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyAuthorizationRequest {
    /// Operation handle of the requesting instance
    pub challenge: u64,
    /// Parameters the requester wants confirmed
    pub parameters_to_verify: AuthorizationSet,
    /// Optional authentication token to validate
    pub auth_token: Option<HardwareAuthToken>,
    /// Optional timestamp token from a secure clock
    pub timestamp_token: Option<TimestampToken>,
}

/// Portable authorization assertion issued by `VerifyAuthorization`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationToken {
    /// Challenge echoed from the request
    pub challenge: u64,
    /// Issuer's monotonic time in milliseconds
    pub timestamp_ms: u64,
    /// Trust tier of the issuer
    pub security_level: SecurityLevel,
    /// Parameters the issuer confirmed
    pub parameters_verified: AuthorizationSet,
    /// HMAC-SHA256 over the framed fields
    pub mac: Vec<u8>,
}
