//! Error types for Keyguard
//!
//! Two layers live here:
//!
//! - [`ErrorCode`]: the decision outcome returned by every enforcement entry
//!   point. Callers branch on the variant (re-authenticate vs. reject), so each
//!   denial reason has its own variant.
//! - [`KeyguardError`]: infrastructure failures (configuration, key derivation,
//!   malformed key material). These never reach a caller of a decision entry
//!   point directly; they are folded into [`ErrorCode::UnknownError`].

use serde::{Deserialize, Serialize};

/// Outcome of an authorization or protocol call that did not succeed.
///
/// `Ok(())` in a [`KmResult`] is the OK status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error,
)]
pub enum ErrorCode {
    /// The purpose is not one this enforcement engine handles at all.
    #[error("unsupported purpose")]
    UnsupportedPurpose,
    /// The key does not list the requested purpose.
    #[error("incompatible purpose")]
    IncompatiblePurpose,
    /// The activation date has not been reached.
    #[error("key not yet valid")]
    KeyNotYetValid,
    /// An origination or usage expiration date has passed.
    #[error("key expired")]
    KeyExpired,
    /// A second operation arrived before the minimum interval elapsed.
    #[error("key rate limit exceeded")]
    KeyRateLimitExceeded,
    /// The per-boot usage budget is spent.
    #[error("key max ops exceeded")]
    KeyMaxOpsExceeded,
    /// Early-boot-only key used after early boot ended.
    #[error("early boot ended")]
    EarlyBootEnded,
    /// Unlocked-device-required key used while the device is locked.
    #[error("device locked")]
    DeviceLocked,
    /// Key needs user authentication but no token was presented.
    #[error("auth token missing")]
    AuthTokenMissing,
    /// Token is older than the key's authentication timeout.
    #[error("auth token expired")]
    AuthTokenExpired,
    /// Neither the token's user id nor its authenticator id is authorized.
    #[error("auth token secure id mismatch")]
    AuthTokenSecureIdMismatch,
    /// Token MAC did not verify.
    #[error("auth token signature invalid")]
    AuthTokenInvalidSignature,
    /// Token challenge does not match the operation handle.
    #[error("auth token challenge does not match operation handle")]
    AuthTokenChallengeMismatch,
    /// Token authenticator type does not overlap the key's allowed types.
    #[error("auth token authenticator type mismatch")]
    AuthTokenTypeMismatch,
    /// Authentication requirements are incomplete (e.g. secure id without auth type).
    #[error("key user not authenticated")]
    KeyUserNotAuthenticated,
    /// The key authorizations are internally inconsistent or unusable.
    #[error("invalid key blob")]
    InvalidKeyBlob,
    /// A caller-provided nonce was supplied for a key that does not allow it.
    #[error("caller nonce prohibited")]
    CallerNonceProhibited,
    /// Malformed request parameters.
    #[error("invalid argument")]
    InvalidArgument,
    /// A MAC over protocol data did not verify.
    #[error("verification failed")]
    VerificationFailed,
    /// A presented timestamp is inconsistent with the local secure clock.
    #[error("invalid timestamp")]
    InvalidTimestamp,
    /// Required shared state (the negotiated HMAC key) is not available yet.
    #[error("hardware not yet available")]
    HardwareNotYetAvailable,
    /// This security level does not implement the requested capability.
    #[error("unimplemented")]
    Unimplemented,
    /// Internal failure in a collaborator.
    #[error("unknown error")]
    UnknownError,
}

impl ErrorCode {
    /// Stable numeric code for this outcome.
    ///
    /// The fine-grained authentication variants share the "user not
    /// authenticated" code so that peers which only understand the numeric
    /// space see the value they expect.
    pub fn wire_code(self) -> i32 {
        match self {
            ErrorCode::UnsupportedPurpose => -2,
            ErrorCode::IncompatiblePurpose => -3,
            ErrorCode::KeyNotYetValid => -24,
            ErrorCode::KeyExpired => -25,
            ErrorCode::AuthTokenMissing
            | ErrorCode::AuthTokenExpired
            | ErrorCode::AuthTokenSecureIdMismatch
            | ErrorCode::AuthTokenInvalidSignature
            | ErrorCode::AuthTokenChallengeMismatch
            | ErrorCode::AuthTokenTypeMismatch
            | ErrorCode::KeyUserNotAuthenticated => -26,
            ErrorCode::VerificationFailed => -30,
            ErrorCode::InvalidKeyBlob => -33,
            ErrorCode::InvalidArgument => -38,
            ErrorCode::KeyRateLimitExceeded => -54,
            ErrorCode::CallerNonceProhibited => -55,
            ErrorCode::KeyMaxOpsExceeded => -56,
            ErrorCode::InvalidTimestamp => -65,
            ErrorCode::HardwareNotYetAvailable => -69,
            ErrorCode::DeviceLocked => -72,
            ErrorCode::EarlyBootEnded => -73,
            ErrorCode::Unimplemented => -100,
            ErrorCode::UnknownError => -1000,
        }
    }

    /// Whether presenting a fresh authentication token could change the outcome.
    pub fn is_authentication_failure(self) -> bool {
        matches!(
            self,
            ErrorCode::AuthTokenMissing
                | ErrorCode::AuthTokenExpired
                | ErrorCode::AuthTokenSecureIdMismatch
                | ErrorCode::AuthTokenInvalidSignature
                | ErrorCode::AuthTokenChallengeMismatch
                | ErrorCode::AuthTokenTypeMismatch
                | ErrorCode::KeyUserNotAuthenticated
                | ErrorCode::DeviceLocked
        )
    }
}

/// Result type for decision and protocol entry points.
pub type KmResult<T> = std::result::Result<T, ErrorCode>;

/// Unified infrastructure error type
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum KeyguardError {
    /// Invalid input or configuration
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// Configuration could not be loaded
    #[error("Config error: {message}")]
    Config {
        /// Error message describing the configuration failure
        message: String,
    },

    /// Cryptographic operation failed
    #[error("Crypto error: {message}")]
    Crypto {
        /// Error message describing the cryptographic failure
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl KeyguardError {
    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a crypto error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Standard Result type for infrastructure operations
pub type Result<T> = std::result::Result<T, KeyguardError>;

impl From<std::io::Error> for KeyguardError {
    fn from(err: std::io::Error) -> Self {
        Self::config(err.to_string())
    }
}

impl From<KeyguardError> for ErrorCode {
    fn from(err: KeyguardError) -> Self {
        match err {
            KeyguardError::Invalid { .. } => ErrorCode::InvalidArgument,
            KeyguardError::Config { .. }
            | KeyguardError::Crypto { .. }
            | KeyguardError::Internal { .. } => {
                tracing::error!(error = %err, "infrastructure failure during enforcement");
                ErrorCode::UnknownError
            }
        }
    }
}
