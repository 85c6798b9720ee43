//! Builders for key authorization sets

use keyguard_core::{
    Algorithm, AuthProxy, AuthorizationSet, HardwareAuthenticatorType, KeyParam, KeyPurpose,
};

/// A key's two authorization halves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyAuthorizations {
    pub hw_enforced: AuthorizationSet,
    pub sw_enforced: AuthorizationSet,
}

impl KeyAuthorizations {
    pub fn proxy(&self) -> AuthProxy<'_> {
        AuthProxy::new(&self.hw_enforced, &self.sw_enforced)
    }
}

/// Fluent builder; parameters land in the hardware-enforced half unless
/// added through [`KeyAuthBuilder::software`].
#[derive(Debug, Clone, Default)]
pub struct KeyAuthBuilder {
    auths: KeyAuthorizations,
}

impl KeyAuthBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, param: KeyParam) -> Self {
        self.auths.hw_enforced.push(param);
        self
    }

    pub fn software(mut self, param: KeyParam) -> Self {
        self.auths.sw_enforced.push(param);
        self
    }

    pub fn purpose(self, purpose: KeyPurpose) -> Self {
        self.param(KeyParam::Purpose(purpose))
    }

    pub fn algorithm(self, algorithm: Algorithm) -> Self {
        self.param(KeyParam::Algorithm(algorithm))
    }

    pub fn no_auth_required(self) -> Self {
        self.param(KeyParam::NoAuthRequired)
    }

    pub fn max_uses_per_boot(self, uses: u32) -> Self {
        self.param(KeyParam::MaxUsesPerBoot(uses))
    }

    pub fn min_seconds_between_ops(self, secs: u32) -> Self {
        self.param(KeyParam::MinSecondsBetweenOps(secs))
    }

    /// Require authentication by `secure_id` with one of `kinds`
    pub fn user_auth(self, secure_id: u64, kinds: HardwareAuthenticatorType) -> Self {
        self.param(KeyParam::UserSecureId(secure_id))
            .param(KeyParam::UserAuthType(kinds))
    }

    pub fn auth_timeout(self, secs: u32) -> Self {
        self.param(KeyParam::AuthTimeout(secs))
    }

    pub fn early_boot_only(self) -> Self {
        self.param(KeyParam::EarlyBootOnly)
    }

    pub fn unlocked_device_required(self) -> Self {
        self.param(KeyParam::UnlockedDeviceRequired)
    }

    pub fn caller_nonce(self) -> Self {
        self.param(KeyParam::CallerNonce)
    }

    pub fn build(self) -> KeyAuthorizations {
        self.auths
    }
}
