//! Fixed-format MAC inputs for tokens
//!
//! Every MACed structure has its own layout with fixed-width big-endian
//! integers, and the two layouts that share a key start with different
//! prefixes, so a MAC over one structure can never validate as another.

use crate::hmac::{hmac_sha256, verify_hmac_sha256, HmacKey, MAC_LEN};
use keyguard_core::{
    AuthorizationSet, HardwareAuthToken, SecurityLevel, TimestampToken, VerificationToken,
};

/// Version byte leading every auth token MAC input
pub const AUTH_TOKEN_VERSION: u8 = 0;

/// Prefix of timestamp and verification token MAC inputs
pub const AUTH_VERIFICATION_LABEL: &[u8] = b"Auth Verification\0";

/// `version || challenge || user_id || authenticator_id || authenticator_type || timestamp`
pub fn auth_token_mac_input(token: &HardwareAuthToken) -> Vec<u8> {
    let mut input = Vec::with_capacity(1 + 8 + 8 + 8 + 4 + 8);
    input.push(AUTH_TOKEN_VERSION);
    input.extend_from_slice(&token.challenge.to_be_bytes());
    input.extend_from_slice(&token.user_id.to_be_bytes());
    input.extend_from_slice(&token.authenticator_id.to_be_bytes());
    input.extend_from_slice(&token.authenticator_type.bits().to_be_bytes());
    input.extend_from_slice(&token.timestamp_ms.to_be_bytes());
    input
}

/// `label || challenge || timestamp || security_level`
pub fn timestamp_token_mac_input(
    challenge: u64,
    timestamp_ms: u64,
    security_level: SecurityLevel,
) -> Vec<u8> {
    let mut input = Vec::with_capacity(AUTH_VERIFICATION_LABEL.len() + 8 + 8 + 4);
    input.extend_from_slice(AUTH_VERIFICATION_LABEL);
    input.extend_from_slice(&challenge.to_be_bytes());
    input.extend_from_slice(&timestamp_ms.to_be_bytes());
    input.extend_from_slice(&security_level.as_u32().to_be_bytes());
    input
}

/// Timestamp framing followed by `count u32 || tag id u32 ...` of the verified parameters.
pub fn verification_token_mac_input(
    challenge: u64,
    timestamp_ms: u64,
    security_level: SecurityLevel,
    parameters_verified: &AuthorizationSet,
) -> Vec<u8> {
    let mut input = timestamp_token_mac_input(challenge, timestamp_ms, security_level);
    let count = u32::try_from(parameters_verified.len()).unwrap_or(u32::MAX);
    input.extend_from_slice(&count.to_be_bytes());
    for tag in parameters_verified.tags() {
        input.extend_from_slice(&tag.id().to_be_bytes());
    }
    input
}

/// MAC an auth token's fields
pub fn sign_auth_token(key: &HmacKey, token: &HardwareAuthToken) -> [u8; MAC_LEN] {
    hmac_sha256(key, &[&auth_token_mac_input(token)])
}

/// Check an auth token's MAC
pub fn verify_auth_token(key: &HmacKey, token: &HardwareAuthToken) -> bool {
    verify_hmac_sha256(key, &[&auth_token_mac_input(token)], &token.mac)
}

/// Check a timestamp token's MAC
pub fn verify_timestamp_token(key: &HmacKey, token: &TimestampToken) -> bool {
    let input =
        timestamp_token_mac_input(token.challenge, token.timestamp_ms, token.security_level);
    verify_hmac_sha256(key, &[&input], &token.mac)
}

/// Check a verification token's MAC
pub fn verify_verification_token(key: &HmacKey, token: &VerificationToken) -> bool {
    let input = verification_token_mac_input(
        token.challenge,
        token.timestamp_ms,
        token.security_level,
        &token.parameters_verified,
    );
    verify_hmac_sha256(key, &[&input], &token.mac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyguard_core::{HardwareAuthenticatorType, KeyParam, KeyPurpose};

    fn token() -> HardwareAuthToken {
        HardwareAuthToken {
            challenge: 0x1122_3344_5566_7788,
            user_id: 42,
            authenticator_id: 7,
            authenticator_type: HardwareAuthenticatorType::PASSWORD,
            timestamp_ms: 1000,
            mac: Vec::new(),
        }
    }

    #[test]
    fn test_auth_token_layout() {
        let input = auth_token_mac_input(&token());
        assert_eq!(input.len(), 37);
        assert_eq!(input[0], AUTH_TOKEN_VERSION);
        assert_eq!(&input[1..9], &0x1122_3344_5566_7788u64.to_be_bytes());
        assert_eq!(&input[25..29], &1u32.to_be_bytes());
        assert_eq!(&input[29..], &1000u64.to_be_bytes());
    }

    #[test]
    fn test_auth_token_sign_and_verify() {
        let key = HmacKey::new([5u8; 32]);
        let mut t = token();
        t.mac = sign_auth_token(&key, &t).to_vec();
        assert!(verify_auth_token(&key, &t));

        t.user_id += 1;
        assert!(!verify_auth_token(&key, &t));
    }

    #[test]
    fn test_verification_framing_extends_timestamp_framing() {
        let params = AuthorizationSet::new().with(KeyParam::Purpose(KeyPurpose::Sign));
        let ts = timestamp_token_mac_input(9, 10, SecurityLevel::TrustedEnvironment);
        let vt = verification_token_mac_input(9, 10, SecurityLevel::TrustedEnvironment, &params);
        assert!(vt.starts_with(&ts));
        assert_eq!(vt.len(), ts.len() + 8);
    }

    #[test]
    fn test_verification_token_covers_parameters() {
        let key = HmacKey::new([7u8; 32]);
        let params = AuthorizationSet::new().with(KeyParam::Purpose(KeyPurpose::Sign));
        let input = verification_token_mac_input(3, 4, SecurityLevel::StrongBox, &params);
        let mut token = VerificationToken {
            challenge: 3,
            timestamp_ms: 4,
            security_level: SecurityLevel::StrongBox,
            parameters_verified: params,
            mac: hmac_sha256(&key, &[&input]).to_vec(),
        };
        assert!(verify_verification_token(&key, &token));

        token.parameters_verified = AuthorizationSet::new();
        assert!(!verify_verification_token(&key, &token));
    }

    #[test]
    fn test_security_level_is_bound() {
        let key = HmacKey::new([6u8; 32]);
        let input = timestamp_token_mac_input(1, 2, SecurityLevel::Software);
        let mut token = TimestampToken {
            challenge: 1,
            timestamp_ms: 2,
            security_level: SecurityLevel::Software,
            mac: hmac_sha256(&key, &[&input]).to_vec(),
        };
        assert!(verify_timestamp_token(&key, &token));

        token.security_level = SecurityLevel::StrongBox;
        assert!(!verify_timestamp_token(&key, &token));
    }
}
