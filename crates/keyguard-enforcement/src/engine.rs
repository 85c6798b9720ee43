//! Enforcement engine
//!
//! [`KeyguardEnforcement`] answers "may this operation proceed" for a key's
//! authorizations and an operation's parameters. It owns the per-key usage
//! trackers, the process-wide early-boot and device-lock state, and the HMAC
//! agreement state used to authenticate tokens.
//!
//! Decisions are returned as [`KmResult`]; `Ok(())` means authorized and every
//! `Err` names the first check that failed. No decision panics on caller input.
//!
//! ## Locking
//!
//! `state` (trackers, boot and lock flags) is a mutex held for the whole of a
//! begin check so that lookup and commit on the trackers are atomic. `hmac` is
//! a read-mostly lock written only by the agreement handshake. When both are
//! needed, `state` is taken first.

use crate::auth_token::{AuthRequirements, TokenBinding, TokenValidator};
use crate::context::EnforcementContext;
use crate::hmac_sharing::{HmacAgreement, HmacSharingParameters, SharingCheck};
use crate::tracker::{AccessCountTracker, AccessTimeTracker};
use keyguard_core::{
    AuthProxy, AuthorizationSet, EnforcementConfig, ErrorCode, HardwareAuthenticatorType,
    KeyParam, KeyPurpose, KmId, KmResult, OperationHandle, SecurityLevel, Tag, TimestampToken,
    VerificationToken, VerifyAuthorizationRequest,
};
use keyguard_crypto::{
    hmac_sha256, timestamp_token_mac_input, verification_token_mac_input, verify_timestamp_token,
    HmacKey, MAC_LEN,
};
use parking_lot::{Mutex, RwLock};

/// Device lock state, with the monotonic time the lock was engaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockState {
    #[default]
    Unlocked,
    /// Locked; any authenticator may unlock
    LockedSince(u64),
    /// Locked; only a password authentication unlocks
    PasswordLockedSince(u64),
}

/// Mutable state shared by every decision on one engine.
#[derive(Debug)]
struct EnforcementState {
    access_time: AccessTimeTracker,
    access_count: AccessCountTracker,
    in_early_boot: bool,
    lock: LockState,
}

impl EnforcementState {
    fn new(config: &EnforcementConfig) -> Self {
        Self {
            access_time: AccessTimeTracker::new(config.max_access_time_map_size),
            access_count: AccessCountTracker::new(config.max_access_count_map_size),
            in_early_boot: true,
            lock: LockState::Unlocked,
        }
    }
}

/// Rate and count limits that apply to one begin.
#[derive(Debug, Default, Clone, Copy)]
struct UsageLimits {
    min_interval_secs: Option<u32>,
    max_uses: Option<u32>,
}

impl UsageLimits {
    /// Strictest value of each limit: the longest interval and the smallest budget.
    fn from_auth_set(auths: AuthProxy<'_>) -> Self {
        auths.iter().fold(Self::default(), |mut limits, param| {
            match param {
                KeyParam::MinSecondsBetweenOps(secs) => {
                    limits.min_interval_secs = limits.min_interval_secs.max(Some(*secs));
                }
                KeyParam::MaxUsesPerBoot(uses) => {
                    limits.max_uses = Some(limits.max_uses.map_or(*uses, |m| m.min(*uses)));
                }
                _ => {}
            }
            limits
        })
    }
}

/// Authorization enforcement for one security level.
pub struct KeyguardEnforcement<C> {
    context: C,
    config: EnforcementConfig,
    state: Mutex<EnforcementState>,
    hmac: RwLock<HmacAgreement>,
}

impl<C: EnforcementContext> KeyguardEnforcement<C> {
    /// Engine in early boot with the device unlocked and no shared key
    pub fn new(context: C, config: EnforcementConfig) -> Self {
        let state = EnforcementState::new(&config);
        tracing::debug!(
            security_level = ?context.security_level(),
            time_map = state.access_time.capacity(),
            count_map = state.access_count.capacity(),
            "enforcement engine created"
        );
        Self {
            context,
            config,
            state: Mutex::new(state),
            hmac: RwLock::new(HmacAgreement::new()),
        }
    }

    /// Capabilities this engine was built with
    pub fn context(&self) -> &C {
        &self.context
    }

    /// Limits and tag trust settings in effect
    pub fn config(&self) -> &EnforcementConfig {
        &self.config
    }

    /// Security level reported by the context
    pub fn security_level(&self) -> SecurityLevel {
        self.context.security_level()
    }

    // ---------------------------------------------------------------------
    // Decision entry points
    // ---------------------------------------------------------------------

    /// Authorize any phase of an operation.
    ///
    /// Encrypt and Verify with an RSA or EC key use only public material and
    /// are always permitted. Everything else is routed to begin or to the
    /// shared update/finish check.
    pub fn authorize_operation(
        &self,
        purpose: KeyPurpose,
        key_id: KmId,
        auth_set: AuthProxy<'_>,
        operation_params: &AuthorizationSet,
        op_handle: OperationHandle,
        is_begin_operation: bool,
    ) -> KmResult<()> {
        let public_only = matches!(purpose, KeyPurpose::Encrypt | KeyPurpose::Verify)
            && auth_set
                .scoped(self.config.enforce_software_enforced_tags)
                .algorithm()
                .is_some_and(|alg| alg.is_public_key());
        if public_only {
            return Ok(());
        }

        if is_begin_operation {
            self.authorize_begin(purpose, key_id, auth_set, operation_params)
        } else {
            self.authorize_update_or_finish(auth_set, operation_params, op_handle)
        }
    }

    /// Admission check run once when an operation starts.
    pub fn authorize_begin(
        &self,
        purpose: KeyPurpose,
        key_id: KmId,
        auth_set: AuthProxy<'_>,
        operation_params: &AuthorizationSet,
    ) -> KmResult<()> {
        let auths = auth_set.scoped(self.config.enforce_software_enforced_tags);
        let result = {
            let mut state = self.state.lock();
            self.begin_locked(&mut state, purpose, key_id, auths, operation_params)
        };

        match result {
            Ok(()) => tracing::trace!(key_id = %key_id, ?purpose, "begin authorized"),
            Err(reason) => {
                tracing::warn!(key_id = %key_id, ?purpose, %reason, "begin denied")
            }
        }
        result
    }

    /// Check an update call of a begun operation
    pub fn authorize_update(
        &self,
        auth_set: AuthProxy<'_>,
        operation_params: &AuthorizationSet,
        op_handle: OperationHandle,
    ) -> KmResult<()> {
        self.authorize_update_or_finish(auth_set, operation_params, op_handle)
    }

    /// Check the finish call of a begun operation
    pub fn authorize_finish(
        &self,
        auth_set: AuthProxy<'_>,
        operation_params: &AuthorizationSet,
        op_handle: OperationHandle,
    ) -> KmResult<()> {
        self.authorize_update_or_finish(auth_set, operation_params, op_handle)
    }

    /// Per-operation authentication for update and finish.
    ///
    /// Keys authenticated by timeout were checked at begin; only keys that
    /// need a token bound to this operation are checked here.
    fn authorize_update_or_finish(
        &self,
        auth_set: AuthProxy<'_>,
        operation_params: &AuthorizationSet,
        op_handle: OperationHandle,
    ) -> KmResult<()> {
        let auths = auth_set.scoped(self.config.enforce_software_enforced_tags);
        let result = AuthRequirements::from_auth_set(auths).and_then(|reqs| {
            if !reqs.requires_auth() || reqs.is_timeout_based() {
                return Ok(());
            }
            let hmac = self.hmac.read();
            TokenValidator::new(&self.context, hmac.shared_key())
                .check(operation_params, &reqs, TokenBinding::Operation(op_handle))
                .map(|_| ())
        });

        if let Err(reason) = result {
            tracing::warn!(operation = %op_handle, %reason, "update/finish denied");
        }
        result
    }

    fn begin_locked(
        &self,
        state: &mut EnforcementState,
        purpose: KeyPurpose,
        key_id: KmId,
        auths: AuthProxy<'_>,
        params: &AuthorizationSet,
    ) -> KmResult<()> {
        check_purpose(purpose, auths)?;
        let reqs = check_key_blob(auths)?;
        self.check_validity_window(purpose, auths)?;

        let limits = UsageLimits::from_auth_set(auths);
        let now_ms = self.context.current_time_ms();
        if let Some(min_interval) = limits.min_interval_secs {
            if !state
                .access_time
                .min_interval_elapsed(key_id, now_ms, min_interval)
            {
                return Err(ErrorCode::KeyRateLimitExceeded);
            }
        }
        if let Some(max_uses) = limits.max_uses {
            if !state.access_count.below_limit(key_id, max_uses) {
                return Err(ErrorCode::KeyMaxOpsExceeded);
            }
        }

        if auths.contains(Tag::EarlyBootOnly) && !state.in_early_boot {
            return Err(ErrorCode::EarlyBootEnded);
        }

        {
            let hmac = self.hmac.read();
            let validator = TokenValidator::new(&self.context, hmac.shared_key());

            if auths.contains(Tag::UnlockedDeviceRequired) {
                check_device_unlocked(&validator, state.lock, params)?;
            }

            if reqs.requires_auth() && reqs.is_timeout_based() {
                validator.check(params, &reqs, TokenBinding::Begin)?;
            }
        }

        if purpose.is_origination()
            && params.contains(Tag::Nonce)
            && !auths.contains(Tag::CallerNonce)
        {
            return Err(ErrorCode::CallerNonceProhibited);
        }

        if limits.min_interval_secs.is_some() {
            state.access_time.record_access(key_id, now_ms);
        }
        if limits.max_uses.is_some() {
            state.access_count.increment(key_id);
        }
        Ok(())
    }

    /// Activation first, then the expiration date that matches the purpose.
    fn check_validity_window(&self, purpose: KeyPurpose, auths: AuthProxy<'_>) -> KmResult<()> {
        for param in auths.iter() {
            if let KeyParam::ActiveDatetime(date) = param {
                if !self.context.activation_date_valid(*date) {
                    return Err(ErrorCode::KeyNotYetValid);
                }
            }
        }

        for param in auths.iter() {
            let expired = match param {
                KeyParam::OriginationExpireDatetime(date) if purpose.is_origination() => {
                    self.context.expiration_date_passed(*date)
                }
                KeyParam::UsageExpireDatetime(date) if purpose.is_usage() => {
                    self.context.expiration_date_passed(*date)
                }
                _ => false,
            };
            if expired {
                return Err(ErrorCode::KeyExpired);
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Boot and lock signals
    // ---------------------------------------------------------------------

    /// End early boot. Irreversible for the life of this engine.
    pub fn early_boot_ended(&self) {
        let mut state = self.state.lock();
        if state.in_early_boot {
            state.in_early_boot = false;
            tracing::info!("early boot ended");
        }
    }

    /// Record that the device locked now. Each call moves the lock time forward.
    pub fn device_locked(&self, password_only: bool) {
        let now = self.context.current_time_ms();
        let mut state = self.state.lock();
        state.lock = if password_only {
            LockState::PasswordLockedSince(now)
        } else {
            LockState::LockedSince(now)
        };
        tracing::info!(password_only, locked_at_ms = now, "device locked");
    }

    /// Whether early boot is still in progress
    pub fn in_early_boot(&self) -> bool {
        self.state.lock().in_early_boot
    }

    /// Most recent device lock signal
    pub fn lock_state(&self) -> LockState {
        self.state.lock().lock
    }

    // ---------------------------------------------------------------------
    // Cross-instance protocol
    // ---------------------------------------------------------------------

    /// This instance's HMAC agreement parameters. Stable across calls.
    pub fn get_hmac_sharing_parameters(&self) -> KmResult<HmacSharingParameters> {
        let support = self.context.hmac_sharing().ok_or(ErrorCode::Unimplemented)?;
        self.hmac.write().sharing_parameters(support)
    }

    /// Derive the shared HMAC key from every participant's parameters.
    pub fn compute_shared_hmac(
        &self,
        all_params: &[HmacSharingParameters],
    ) -> KmResult<SharingCheck> {
        let support = self.context.hmac_sharing().ok_or(ErrorCode::Unimplemented)?;
        self.hmac.write().compute_shared(support, all_params)
    }

    /// Confirm tokens presented by a peer and issue a signed verification token.
    ///
    /// A presented auth token must carry a valid MAC. A presented timestamp
    /// token must echo the request challenge, carry a valid MAC and not claim
    /// a time more than `max_timestamp_skew_ms` ahead of the local clock.
    pub fn verify_authorization(
        &self,
        request: &VerifyAuthorizationRequest,
    ) -> KmResult<VerificationToken> {
        self.context.hmac_sharing().ok_or(ErrorCode::Unimplemented)?;
        let hmac = self.hmac.read();
        let key = hmac.shared_key().ok_or(ErrorCode::HardwareNotYetAvailable)?;
        let now = self.context.current_time_ms();

        if let Some(token) = &request.auth_token {
            if !self.context.validate_token_signature(token, Some(key)) {
                tracing::warn!(
                    challenge = request.challenge,
                    "verify authorization: bad auth token"
                );
                return Err(ErrorCode::AuthTokenInvalidSignature);
            }
        }

        if let Some(timestamp) = &request.timestamp_token {
            self.check_timestamp_token(key, timestamp, request.challenge, now)?;
        }

        let parameters_verified = AuthorizationSet::new();
        let security_level = self.context.security_level();
        let input = verification_token_mac_input(
            request.challenge,
            now,
            security_level,
            &parameters_verified,
        );
        Ok(VerificationToken {
            challenge: request.challenge,
            timestamp_ms: now,
            security_level,
            parameters_verified,
            mac: hmac_sha256(key, &[&input]).to_vec(),
        })
    }

    fn check_timestamp_token(
        &self,
        key: &HmacKey,
        token: &TimestampToken,
        challenge: u64,
        now_ms: u64,
    ) -> KmResult<()> {
        if token.challenge != challenge || !verify_timestamp_token(key, token) {
            tracing::warn!(challenge, "verify authorization: bad timestamp token");
            return Err(ErrorCode::VerificationFailed);
        }
        if token.timestamp_ms > now_ms.saturating_add(self.config.max_timestamp_skew_ms) {
            tracing::warn!(
                token_ms = token.timestamp_ms,
                local_ms = now_ms,
                "timestamp token ahead of local clock"
            );
            return Err(ErrorCode::InvalidTimestamp);
        }
        Ok(())
    }

    /// Signed assertion of this instance's current monotonic time.
    pub fn generate_timestamp_token(&self, challenge: u64) -> KmResult<TimestampToken> {
        if !self.context.supports_secure_clock() {
            return Err(ErrorCode::Unimplemented);
        }
        self.context.hmac_sharing().ok_or(ErrorCode::Unimplemented)?;
        let hmac = self.hmac.read();
        let key = hmac.shared_key().ok_or(ErrorCode::HardwareNotYetAvailable)?;
        let timestamp_ms = self.context.current_time_ms();
        let security_level = self.context.security_level();
        let input = timestamp_token_mac_input(challenge, timestamp_ms, security_level);
        Ok(TimestampToken {
            challenge,
            timestamp_ms,
            security_level,
            mac: hmac_sha256(key, &[&input]).to_vec(),
        })
    }

    /// HMAC-SHA256 of `data` under the negotiated key.
    ///
    /// Callers frame `data` with a fixed layout of their own.
    pub fn compute_hmac(&self, data: &[u8]) -> KmResult<[u8; MAC_LEN]> {
        self.context.hmac_sharing().ok_or(ErrorCode::Unimplemented)?;
        let hmac = self.hmac.read();
        let key = hmac.shared_key().ok_or(ErrorCode::HardwareNotYetAvailable)?;
        Ok(hmac_sha256(key, &[data]))
    }

    /// Stable identifier for a key blob, used to index the usage trackers
    pub fn create_key_id(&self, key_blob: &[u8]) -> KmResult<KmId> {
        self.context.create_key_id(key_blob)
    }
}

fn check_purpose(purpose: KeyPurpose, auths: AuthProxy<'_>) -> KmResult<()> {
    if purpose == KeyPurpose::AttestKey {
        return Err(ErrorCode::UnsupportedPurpose);
    }
    if !auths.allows_purpose(purpose) {
        return Err(ErrorCode::IncompatiblePurpose);
    }
    Ok(())
}

/// Structural checks on the key's own authorizations.
fn check_key_blob(auths: AuthProxy<'_>) -> KmResult<AuthRequirements> {
    if auths.contains(Tag::BootloaderOnly) {
        return Err(ErrorCode::InvalidKeyBlob);
    }
    if let Some(param) = auths.iter().find(|p| p.tag().is_operation_only()) {
        tracing::warn!(tag = ?param.tag(), "operation-only tag stored in key authorizations");
        return Err(ErrorCode::InvalidKeyBlob);
    }
    AuthRequirements::from_auth_set(auths)
}

/// A locked device admits the key only with a valid token minted after the
/// lock; a password-only lock additionally needs a password authentication.
fn check_device_unlocked<C: EnforcementContext + ?Sized>(
    validator: &TokenValidator<'_, C>,
    lock: LockState,
    params: &AuthorizationSet,
) -> KmResult<()> {
    let (locked_at, needs_password) = match lock {
        LockState::Unlocked => return Ok(()),
        LockState::LockedSince(t) => (t, false),
        LockState::PasswordLockedSince(t) => (t, true),
    };

    let unlocked_by_token = params.auth_token().is_some_and(|token| {
        token.timestamp_ms > locked_at
            && (!needs_password
                || token
                    .authenticator_type
                    .intersects(HardwareAuthenticatorType::PASSWORD))
            && validator.signature_valid(token)
    });
    if unlocked_by_token {
        Ok(())
    } else {
        Err(ErrorCode::DeviceLocked)
    }
}
