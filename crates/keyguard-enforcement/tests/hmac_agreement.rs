//! Integration Tests: HMAC agreement and cross-instance tokens

use keyguard_core::{
    EnforcementConfig, ErrorCode, HardwareAuthenticatorType, SecurityLevel, SimulatedClock,
    VerifyAuthorizationRequest,
};
use keyguard_crypto::SeededRandomSource;
use keyguard_enforcement::{
    EnforcementContext, HmacSharingParameters, KeyguardEnforcement, SoftwareContext,
};
use keyguard_testkit::{
    agree_all, agreed_pair, init_tracing, mint_auth_token, EngineFixture, TokenTemplate,
};

#[test]
fn two_participants_reach_same_check() {
    init_tracing();
    let a = EngineFixture::new(1);
    let b = EngineFixture::new(2);

    let params_a = a.engine.get_hmac_sharing_parameters().unwrap();
    let params_b = b.engine.get_hmac_sharing_parameters().unwrap();
    assert_ne!(params_a.nonce, params_b.nonce);

    let all = vec![params_a, params_b];
    let check_a = a.engine.compute_shared_hmac(&all).unwrap();
    let check_b = b.engine.compute_shared_hmac(&all).unwrap();
    assert_eq!(check_a, check_b);

    assert_eq!(a.engine.compute_hmac(b"payload"), b.engine.compute_hmac(b"payload"));
}

#[test]
fn altered_parameters_produce_mismatch() {
    let a = EngineFixture::new(3);
    let b = EngineFixture::new(4);
    let params_a = a.engine.get_hmac_sharing_parameters().unwrap();
    let params_b = b.engine.get_hmac_sharing_parameters().unwrap();

    let mut altered_a = params_a.clone();
    altered_a.nonce[0] ^= 0x01;

    let check_a = a.engine.compute_shared_hmac(&[params_a, params_b.clone()]).unwrap();
    let check_b = b.engine.compute_shared_hmac(&[altered_a, params_b]).unwrap();
    assert_ne!(check_a, check_b);
}

#[test]
fn parameters_are_stable_across_rounds() {
    let a = EngineFixture::new(5);
    let b = EngineFixture::new(6);
    let first = a.engine.get_hmac_sharing_parameters().unwrap();

    let checks = agree_all(&[&a.engine, &b.engine]).unwrap();
    assert_eq!(checks[0], checks[1]);
    assert_eq!(a.engine.get_hmac_sharing_parameters().unwrap(), first);

    // Re-running with the same inputs reproduces the same key
    let again = agree_all(&[&a.engine, &b.engine]).unwrap();
    assert_eq!(again, checks);
}

#[test]
fn participant_order_matters() {
    let a = EngineFixture::new(7);
    let b = EngineFixture::new(8);
    let pa = a.engine.get_hmac_sharing_parameters().unwrap();
    let pb = b.engine.get_hmac_sharing_parameters().unwrap();

    let check_a = a.engine.compute_shared_hmac(&[pa.clone(), pb.clone()]).unwrap();
    let check_b = b.engine.compute_shared_hmac(&[pb, pa]).unwrap();
    assert_ne!(check_a, check_b);
}

#[test]
fn malformed_agreement_input() {
    let a = EngineFixture::new(9);
    let stranger = HmacSharingParameters {
        seed: Vec::new(),
        nonce: [0xab; 32],
    };

    assert_eq!(
        a.engine.compute_shared_hmac(&[stranger.clone()]),
        Err(ErrorCode::InvalidArgument)
    );
    let own = a.engine.get_hmac_sharing_parameters().unwrap();
    assert_eq!(a.engine.compute_shared_hmac(&[]), Err(ErrorCode::InvalidArgument));
    assert_eq!(
        a.engine.compute_shared_hmac(&[stranger.clone()]),
        Err(ErrorCode::InvalidArgument)
    );
    let oversized = HmacSharingParameters {
        seed: vec![1; 33],
        ..stranger
    };
    assert_eq!(
        a.engine.compute_shared_hmac(&[own, oversized]),
        Err(ErrorCode::InvalidArgument)
    );
    assert_eq!(a.engine.compute_hmac(b"x"), Err(ErrorCode::HardwareNotYetAvailable));
}

#[test]
fn timestamp_token_round_trip() {
    init_tracing();
    let (a, b) = agreed_pair(10);
    a.clock.set_ms(5_000);

    let token = a.engine.generate_timestamp_token(0xc0ffee).unwrap();
    assert_eq!(token.challenge, 0xc0ffee);
    assert_eq!(token.timestamp_ms, 5_000);
    assert_eq!(token.security_level, SecurityLevel::Software);

    let request = VerifyAuthorizationRequest {
        challenge: 0xc0ffee,
        timestamp_token: Some(token),
        ..Default::default()
    };
    let verification = b.engine.verify_authorization(&request).unwrap();
    assert_eq!(verification.challenge, 0xc0ffee);
    assert_eq!(verification.timestamp_ms, 5_000);
    assert!(verification.parameters_verified.is_empty());
    assert_eq!(verification.mac.len(), 32);
}

#[test]
fn verification_token_is_signed_with_shared_key() {
    let (a, b) = agreed_pair(11);
    let token = b
        .engine
        .verify_authorization(&VerifyAuthorizationRequest {
            challenge: 3,
            ..Default::default()
        })
        .unwrap();

    // Any participant can recompute the MAC
    let mac = a
        .engine
        .compute_hmac(&keyguard_crypto::verification_token_mac_input(
            token.challenge,
            token.timestamp_ms,
            token.security_level,
            &token.parameters_verified,
        ))
        .unwrap();
    assert_eq!(mac.to_vec(), token.mac);
}

#[test]
fn verify_authorization_rejects_bad_timestamp_tokens() {
    let (a, b) = agreed_pair(12);
    a.clock.set_ms(1_000);
    let token = a.engine.generate_timestamp_token(1).unwrap();

    let wrong_challenge = VerifyAuthorizationRequest {
        challenge: 2,
        timestamp_token: Some(token.clone()),
        ..Default::default()
    };
    assert_eq!(
        b.engine.verify_authorization(&wrong_challenge),
        Err(ErrorCode::VerificationFailed)
    );

    let mut forged = token.clone();
    forged.timestamp_ms += 1;
    let forged_request = VerifyAuthorizationRequest {
        challenge: 1,
        timestamp_token: Some(forged),
        ..Default::default()
    };
    assert_eq!(
        b.engine.verify_authorization(&forged_request),
        Err(ErrorCode::VerificationFailed)
    );
}

#[test]
fn timestamp_from_the_future_is_rejected() {
    let clock_a = SimulatedClock::new(60_000);
    let clock_b = SimulatedClock::new(10_000);
    let wall = SimulatedClock::from_recent();
    let a = EngineFixture::with_clocks(13, EnforcementConfig::default(), clock_a, wall.clone());
    let b = EngineFixture::with_clocks(14, EnforcementConfig::default(), clock_b, wall);
    agree_all(&[&a.engine, &b.engine]).unwrap();

    let token = a.engine.generate_timestamp_token(1).unwrap();
    let request = VerifyAuthorizationRequest {
        challenge: 1,
        timestamp_token: Some(token),
        ..Default::default()
    };
    assert_eq!(
        b.engine.verify_authorization(&request),
        Err(ErrorCode::InvalidTimestamp)
    );

    // Within the configured skew it is accepted
    b.clock.set_ms(59_000);
    assert!(b.engine.verify_authorization(&request).is_ok());
}

#[test]
fn verify_authorization_checks_auth_token_signature() {
    let (a, b) = agreed_pair(15);
    let good = mint_auth_token(&a.engine, TokenTemplate::password(1, 0));
    let request = VerifyAuthorizationRequest {
        challenge: 4,
        auth_token: Some(good.clone()),
        ..Default::default()
    };
    assert!(b.engine.verify_authorization(&request).is_ok());

    let mut bad = good;
    bad.authenticator_type = HardwareAuthenticatorType::FINGERPRINT;
    let request = VerifyAuthorizationRequest {
        challenge: 4,
        auth_token: Some(bad),
        ..Default::default()
    };
    assert_eq!(
        b.engine.verify_authorization(&request),
        Err(ErrorCode::AuthTokenInvalidSignature)
    );
}

/// Context without HMAC sharing, optionally with a secure clock
struct UnsharedContext {
    inner: SoftwareContext,
    secure_clock: bool,
}

impl UnsharedContext {
    fn engine(secure_clock: bool) -> KeyguardEnforcement<Self> {
        let clock = SimulatedClock::new(0);
        let inner = SoftwareContext::new(clock.clone(), clock, SeededRandomSource::new(1));
        KeyguardEnforcement::new(Self { inner, secure_clock }, EnforcementConfig::default())
    }
}

impl EnforcementContext for UnsharedContext {
    fn security_level(&self) -> SecurityLevel {
        SecurityLevel::TrustedEnvironment
    }

    fn current_time_ms(&self) -> u64 {
        self.inner.current_time_ms()
    }

    fn activation_date_valid(&self, date: u64) -> bool {
        self.inner.activation_date_valid(date)
    }

    fn expiration_date_passed(&self, date: u64) -> bool {
        self.inner.expiration_date_passed(date)
    }

    fn validate_token_signature(
        &self,
        token: &keyguard_core::HardwareAuthToken,
        key: Option<&keyguard_crypto::HmacKey>,
    ) -> bool {
        self.inner.validate_token_signature(token, key)
    }

    fn create_key_id(&self, blob: &[u8]) -> keyguard_core::KmResult<keyguard_core::KmId> {
        self.inner.create_key_id(blob)
    }

    fn supports_secure_clock(&self) -> bool {
        self.secure_clock
    }
}

#[test]
fn missing_capabilities_are_unimplemented() {
    let engine = UnsharedContext::engine(false);

    assert_eq!(engine.get_hmac_sharing_parameters(), Err(ErrorCode::Unimplemented));
    assert_eq!(engine.compute_shared_hmac(&[]), Err(ErrorCode::Unimplemented));
    assert_eq!(engine.compute_hmac(b"x"), Err(ErrorCode::Unimplemented));
    assert_eq!(engine.generate_timestamp_token(1), Err(ErrorCode::Unimplemented));
    assert_eq!(
        engine.verify_authorization(&VerifyAuthorizationRequest::default()),
        Err(ErrorCode::Unimplemented)
    );
    assert_eq!(engine.security_level(), SecurityLevel::TrustedEnvironment);
}

#[test]
fn secure_clock_without_sharing_is_unimplemented() {
    let engine = UnsharedContext::engine(true);
    assert_eq!(engine.generate_timestamp_token(1), Err(ErrorCode::Unimplemented));
}
