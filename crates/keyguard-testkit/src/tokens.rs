//! Auth token minting
//!
//! Tokens are signed through the engine's `compute_hmac`, the same path an
//! authenticator sharing the negotiated key would use.

use crate::fixtures::TestEngine;
use keyguard_core::{AuthorizationSet, HardwareAuthToken, HardwareAuthenticatorType, KeyParam};
use keyguard_crypto::auth_token_mac_input;

/// Fields of a token to mint.
#[derive(Debug, Clone, Copy)]
pub struct TokenTemplate {
    pub challenge: u64,
    pub user_id: u64,
    pub authenticator_id: u64,
    pub authenticator_type: HardwareAuthenticatorType,
    pub timestamp_ms: u64,
}

impl TokenTemplate {
    /// Password authentication of `user_id` at `timestamp_ms`, not bound to an operation
    pub fn password(user_id: u64, timestamp_ms: u64) -> Self {
        Self {
            challenge: 0,
            user_id,
            authenticator_id: 0,
            authenticator_type: HardwareAuthenticatorType::PASSWORD,
            timestamp_ms,
        }
    }

    pub fn fingerprint(user_id: u64, timestamp_ms: u64) -> Self {
        Self {
            authenticator_type: HardwareAuthenticatorType::FINGERPRINT,
            ..Self::password(user_id, timestamp_ms)
        }
    }

    pub fn bound_to(mut self, challenge: u64) -> Self {
        self.challenge = challenge;
        self
    }
}

/// Mint a token MACed with `engine`'s negotiated key. Panics before agreement.
pub fn mint_auth_token(engine: &TestEngine, template: TokenTemplate) -> HardwareAuthToken {
    let mut token = HardwareAuthToken {
        challenge: template.challenge,
        user_id: template.user_id,
        authenticator_id: template.authenticator_id,
        authenticator_type: template.authenticator_type,
        timestamp_ms: template.timestamp_ms,
        mac: Vec::new(),
    };
    let mac = engine
        .compute_hmac(&auth_token_mac_input(&token))
        .expect("engine has a negotiated key");
    token.mac = mac.to_vec();
    token
}

/// Operation parameters carrying only `token`
pub fn params_with_token(token: HardwareAuthToken) -> AuthorizationSet {
    AuthorizationSet::new().with(KeyParam::AuthToken(token))
}
