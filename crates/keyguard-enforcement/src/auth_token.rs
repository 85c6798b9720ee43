//! Authentication token validation
//!
//! [`AuthRequirements`] captures what a key demands of its user: the secure ids
//! allowed to authorize it, the authenticator kinds they may use and, for
//! timeout-based keys, how long an authentication stays fresh.
//! [`TokenValidator`] decides whether a presented [`HardwareAuthToken`]
//! satisfies those requirements for a given phase of an operation.

use crate::context::EnforcementContext;
use keyguard_core::{
    AuthProxy, AuthorizationSet, ErrorCode, HardwareAuthToken, HardwareAuthenticatorType,
    KeyParam, KmResult, OperationHandle,
};
use keyguard_crypto::HmacKey;

/// User-authentication requirements extracted from a key's authorizations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthRequirements {
    /// Secure ids that may authorize the key
    pub secure_ids: Vec<u64>,
    /// Authenticator kinds accepted, if declared
    pub auth_type: Option<HardwareAuthenticatorType>,
    /// Seconds an authentication stays valid, for timeout-based keys
    pub timeout_secs: Option<u32>,
    /// Key is explicitly usable without authentication
    pub no_auth_required: bool,
}

impl AuthRequirements {
    /// Extract requirements, rejecting contradictory authorizations.
    ///
    /// Repeated USER_AUTH_TYPE or AUTH_TIMEOUT tags, or secure ids on a key that
    /// also claims NO_AUTH_REQUIRED, make the key blob invalid.
    pub fn from_auth_set(auths: AuthProxy<'_>) -> KmResult<Self> {
        let mut reqs = Self::default();
        for param in auths.iter() {
            match param {
                KeyParam::UserSecureId(sid) => reqs.secure_ids.push(*sid),
                KeyParam::UserAuthType(kind) => {
                    if reqs.auth_type.replace(*kind).is_some() {
                        return Err(ErrorCode::InvalidKeyBlob);
                    }
                }
                KeyParam::AuthTimeout(secs) => {
                    if reqs.timeout_secs.replace(*secs).is_some() {
                        return Err(ErrorCode::InvalidKeyBlob);
                    }
                }
                KeyParam::NoAuthRequired => reqs.no_auth_required = true,
                _ => {}
            }
        }

        if reqs.no_auth_required && !reqs.secure_ids.is_empty() {
            return Err(ErrorCode::InvalidKeyBlob);
        }
        Ok(reqs)
    }

    /// Whether any user authentication is demanded
    pub fn requires_auth(&self) -> bool {
        !self.no_auth_required && !self.secure_ids.is_empty()
    }

    /// Whether authentication is checked once at begin rather than per operation
    pub fn is_timeout_based(&self) -> bool {
        self.timeout_secs.is_some()
    }
}

/// Phase a token is being checked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenBinding {
    /// Operation begin: freshness is judged against the key's timeout
    Begin,
    /// Update or finish: the token must carry the operation's handle
    Operation(OperationHandle),
}

/// Outcome of a successful token check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedToken {
    /// Authenticator kinds present in both the token and the key's allowed set
    pub matched_type: HardwareAuthenticatorType,
    /// Monotonic time the user authenticated
    pub timestamp_ms: u64,
}

/// Checks tokens on behalf of one enforcement context.
pub struct TokenValidator<'a, C: ?Sized> {
    context: &'a C,
    negotiated_key: Option<&'a HmacKey>,
}

impl<'a, C: EnforcementContext + ?Sized> TokenValidator<'a, C> {
    /// Validator checking signatures under `negotiated_key`
    pub fn new(context: &'a C, negotiated_key: Option<&'a HmacKey>) -> Self {
        Self {
            context,
            negotiated_key,
        }
    }

    /// Whether the token's MAC verifies under this context
    pub fn signature_valid(&self, token: &HardwareAuthToken) -> bool {
        self.context
            .validate_token_signature(token, self.negotiated_key)
    }

    /// Validate the token presented in `params` against `reqs`.
    pub fn check(
        &self,
        params: &AuthorizationSet,
        reqs: &AuthRequirements,
        binding: TokenBinding,
    ) -> KmResult<AuthenticatedToken> {
        let Some(required_type) = reqs.auth_type else {
            return Err(ErrorCode::KeyUserNotAuthenticated);
        };

        let token = params.auth_token().ok_or(ErrorCode::AuthTokenMissing)?;

        if !self.signature_valid(token) {
            return Err(ErrorCode::AuthTokenInvalidSignature);
        }

        if let TokenBinding::Operation(handle) = binding {
            if !token.is_bound_to(handle) {
                tracing::debug!(
                    operation = %handle,
                    challenge = token.challenge,
                    "auth token bound to a different operation"
                );
                return Err(ErrorCode::AuthTokenChallengeMismatch);
            }
        }

        let sid_matches = reqs
            .secure_ids
            .iter()
            .any(|sid| token.user_id == *sid || token.authenticator_id == *sid);
        if !sid_matches {
            return Err(ErrorCode::AuthTokenSecureIdMismatch);
        }

        let matched_type = token.authenticator_type.intersection(required_type);
        if matched_type == HardwareAuthenticatorType::NONE {
            tracing::debug!(
                token_type = token.authenticator_type.bits(),
                key_type = required_type.bits(),
                "auth token authenticator type not accepted by key"
            );
            return Err(ErrorCode::AuthTokenTypeMismatch);
        }

        if let (TokenBinding::Begin, Some(timeout_secs)) = (binding, reqs.timeout_secs) {
            if self.context.auth_token_timed_out(token, timeout_secs) {
                return Err(ErrorCode::AuthTokenExpired);
            }
        }

        Ok(AuthenticatedToken {
            matched_type,
            timestamp_ms: token.timestamp_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyguard_core::{KmId, SecurityLevel};

    /// Context that trusts tokens whose MAC is non-empty
    struct StubContext {
        now_ms: u64,
    }

    impl EnforcementContext for StubContext {
        fn security_level(&self) -> SecurityLevel {
            SecurityLevel::Software
        }

        fn current_time_ms(&self) -> u64 {
            self.now_ms
        }

        fn activation_date_valid(&self, _: u64) -> bool {
            true
        }

        fn expiration_date_passed(&self, _: u64) -> bool {
            false
        }

        fn validate_token_signature(&self, token: &HardwareAuthToken, _: Option<&HmacKey>) -> bool {
            !token.mac.is_empty()
        }

        fn create_key_id(&self, _: &[u8]) -> KmResult<KmId> {
            Ok(KmId(0))
        }
    }

    fn key_auths(timeout: Option<u32>) -> AuthorizationSet {
        let mut set = AuthorizationSet::new()
            .with(KeyParam::UserSecureId(100))
            .with(KeyParam::UserAuthType(HardwareAuthenticatorType::PASSWORD));
        if let Some(secs) = timeout {
            set.push(KeyParam::AuthTimeout(secs));
        }
        set
    }

    fn token(challenge: u64, user_id: u64, timestamp_ms: u64) -> HardwareAuthToken {
        HardwareAuthToken {
            challenge,
            user_id,
            authenticator_id: 0,
            authenticator_type: HardwareAuthenticatorType::PASSWORD,
            timestamp_ms,
            mac: vec![1; 32],
        }
    }

    fn params_with(token: HardwareAuthToken) -> AuthorizationSet {
        AuthorizationSet::new().with(KeyParam::AuthToken(token))
    }

    fn reqs(timeout: Option<u32>) -> AuthRequirements {
        let auths = key_auths(timeout);
        AuthRequirements::from_auth_set(AuthProxy::hardware_only(&auths)).unwrap()
    }

    #[test]
    fn test_requirements_extraction() {
        let r = reqs(Some(30));
        assert_eq!(r.secure_ids, vec![100]);
        assert_eq!(r.auth_type, Some(HardwareAuthenticatorType::PASSWORD));
        assert!(r.requires_auth());
        assert!(r.is_timeout_based());
    }

    #[test]
    fn test_contradictory_requirements_rejected() {
        let auths = key_auths(None).with(KeyParam::NoAuthRequired);
        assert_eq!(
            AuthRequirements::from_auth_set(AuthProxy::hardware_only(&auths)),
            Err(ErrorCode::InvalidKeyBlob)
        );

        let auths = key_auths(Some(1)).with(KeyParam::AuthTimeout(2));
        assert_eq!(
            AuthRequirements::from_auth_set(AuthProxy::hardware_only(&auths)),
            Err(ErrorCode::InvalidKeyBlob)
        );
    }

    #[test]
    fn test_duplicate_across_halves_rejected() {
        let hw = AuthorizationSet::new()
            .with(KeyParam::UserAuthType(HardwareAuthenticatorType::PASSWORD));
        let sw = AuthorizationSet::new()
            .with(KeyParam::UserAuthType(HardwareAuthenticatorType::FINGERPRINT));
        assert_eq!(
            AuthRequirements::from_auth_set(AuthProxy::new(&hw, &sw)),
            Err(ErrorCode::InvalidKeyBlob)
        );
    }

    #[test]
    fn test_begin_accepts_fresh_token() {
        let ctx = StubContext { now_ms: 20_000 };
        let validator = TokenValidator::new(&ctx, None);
        let result = validator
            .check(&params_with(token(0, 100, 15_000)), &reqs(Some(10)), TokenBinding::Begin)
            .unwrap();
        assert_eq!(result.matched_type, HardwareAuthenticatorType::PASSWORD);
        assert_eq!(result.timestamp_ms, 15_000);
    }

    #[test]
    fn test_failure_order() {
        let ctx = StubContext { now_ms: 100_000 };
        let validator = TokenValidator::new(&ctx, None);
        let r = reqs(Some(10));

        assert_eq!(
            validator.check(&AuthorizationSet::new(), &r, TokenBinding::Begin),
            Err(ErrorCode::AuthTokenMissing)
        );

        let mut unsigned = token(0, 100, 99_000);
        unsigned.mac.clear();
        assert_eq!(
            validator.check(&params_with(unsigned), &r, TokenBinding::Begin),
            Err(ErrorCode::AuthTokenInvalidSignature)
        );

        assert_eq!(
            validator.check(&params_with(token(0, 7, 99_000)), &r, TokenBinding::Begin),
            Err(ErrorCode::AuthTokenSecureIdMismatch)
        );

        let mut fingerprint = token(0, 100, 99_000);
        fingerprint.authenticator_type = HardwareAuthenticatorType::FINGERPRINT;
        assert_eq!(
            validator.check(&params_with(fingerprint), &r, TokenBinding::Begin),
            Err(ErrorCode::AuthTokenTypeMismatch)
        );

        assert_eq!(
            validator.check(&params_with(token(0, 100, 1_000)), &r, TokenBinding::Begin),
            Err(ErrorCode::AuthTokenExpired)
        );
    }

    #[test]
    fn test_authenticator_id_matches_secure_id() {
        let ctx = StubContext { now_ms: 0 };
        let validator = TokenValidator::new(&ctx, None);
        let mut t = token(5, 1, 0);
        t.authenticator_id = 100;
        assert!(validator
            .check(&params_with(t), &reqs(None), TokenBinding::Operation(OperationHandle(5)))
            .is_ok());
    }

    #[test]
    fn test_operation_binding() {
        let ctx = StubContext { now_ms: 0 };
        let validator = TokenValidator::new(&ctx, None);
        let r = reqs(None);
        assert!(validator
            .check(
                &params_with(token(42, 100, 0)),
                &r,
                TokenBinding::Operation(OperationHandle(42))
            )
            .is_ok());
        assert_eq!(
            validator.check(
                &params_with(token(41, 100, 0)),
                &r,
                TokenBinding::Operation(OperationHandle(42))
            ),
            Err(ErrorCode::AuthTokenChallengeMismatch)
        );
    }

    #[test]
    fn test_secure_id_without_type() {
        let ctx = StubContext { now_ms: 0 };
        let validator = TokenValidator::new(&ctx, None);
        let auths = AuthorizationSet::new().with(KeyParam::UserSecureId(100));
        let r = AuthRequirements::from_auth_set(AuthProxy::hardware_only(&auths)).unwrap();
        assert_eq!(
            validator.check(&params_with(token(0, 100, 0)), &r, TokenBinding::Begin),
            Err(ErrorCode::KeyUserNotAuthenticated)
        );
    }
}
