//! HMAC agreement protocol
//!
//! Cooperating enforcement instances derive a common MAC key in three phases:
//!
//! 1. each instance publishes its [`HmacSharingParameters`] (seed and nonce);
//! 2. the caller gathers every participant's parameters;
//! 3. each instance derives the shared key from the full list and returns a
//!    [`SharingCheck`]. Matching checks across instances mean the agreement
//!    succeeded; a mismatch is reported to the caller, who restarts from
//!    phase 2 if it wants to retry.
//!
//! The local nonce is drawn once per instance. Handing out a different nonce
//! later would silently break any agreement already in flight.

use crate::context::HmacSharingSupport;
use keyguard_core::{ErrorCode, KmResult};
use keyguard_crypto::kdf::MAX_SEED_LEN;
use keyguard_crypto::{
    agreement_context, derive_shared_key, sharing_check, HmacKey, ParticipantShare,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One participant's published contribution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HmacSharingParameters {
    pub seed: Vec<u8>,
    pub nonce: [u8; 32],
}

/// Value every participant computes identically when agreement succeeds.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SharingCheck(pub [u8; 32]);

impl fmt::Debug for SharingCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharingCheck({})", hex::encode(self.0))
    }
}

/// Where this instance stands in the protocol.
#[derive(Debug, Default)]
pub enum AgreementPhase {
    #[default]
    Idle,
    ParametersIssued,
    Agreed { key: HmacKey, check: SharingCheck },
}

/// Local state of the agreement protocol.
#[derive(Debug, Default)]
pub struct HmacAgreement {
    local: Option<HmacSharingParameters>,
    phase: AgreementPhase,
}

impl HmacAgreement {
    /// Agreement with no parameters issued yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase 1: this instance's parameters, generated on first call.
    pub fn sharing_parameters(
        &mut self,
        support: &dyn HmacSharingSupport,
    ) -> KmResult<HmacSharingParameters> {
        if let Some(params) = &self.local {
            return Ok(params.clone());
        }

        let seed = support.sharing_seed();
        if seed.len() > MAX_SEED_LEN {
            tracing::error!(seed_len = seed.len(), "configured sharing seed is too long");
            return Err(ErrorCode::InvalidArgument);
        }

        let params = HmacSharingParameters {
            seed: seed.to_vec(),
            nonce: support.random_nonce(),
        };
        self.local = Some(params.clone());
        if matches!(self.phase, AgreementPhase::Idle) {
            self.phase = AgreementPhase::ParametersIssued;
        }
        tracing::debug!("issued hmac sharing parameters");
        Ok(params)
    }

    /// Phase 3: derive the shared key from every participant's parameters.
    ///
    /// The local parameters must appear in `all`. Participants must pass the
    /// list in the same order to arrive at the same key.
    pub fn compute_shared(
        &mut self,
        support: &dyn HmacSharingSupport,
        all: &[HmacSharingParameters],
    ) -> KmResult<SharingCheck> {
        let Some(local) = &self.local else {
            tracing::warn!("compute_shared_hmac called before parameters were issued");
            return Err(ErrorCode::InvalidArgument);
        };
        if all.is_empty() {
            return Err(ErrorCode::InvalidArgument);
        }
        if !all.contains(local) {
            tracing::warn!(participants = all.len(), "local sharing parameters missing from input");
            return Err(ErrorCode::InvalidArgument);
        }
        if all.iter().any(|p| p.seed.len() > MAX_SEED_LEN) {
            return Err(ErrorCode::InvalidArgument);
        }

        let shares: Vec<ParticipantShare<'_>> = all
            .iter()
            .map(|p| ParticipantShare {
                seed: &p.seed,
                nonce: &p.nonce,
            })
            .collect();
        let context = agreement_context(&shares).map_err(|_| ErrorCode::InvalidArgument)?;
        let key = derive_shared_key(support.preshared_key(), &context)?;
        let check = SharingCheck(sharing_check(&key));

        tracing::info!(
            participants = all.len(),
            check = %hex::encode(&check.0[..4]),
            "hmac agreement complete"
        );
        self.phase = AgreementPhase::Agreed { key, check };
        Ok(check)
    }

    /// Negotiated key, once agreement has completed
    pub fn shared_key(&self) -> Option<&HmacKey> {
        match &self.phase {
            AgreementPhase::Agreed { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Current protocol phase
    pub fn phase(&self) -> &AgreementPhase {
        &self.phase
    }

    /// Whether a shared key has been derived
    pub fn is_agreed(&self) -> bool {
        matches!(self.phase, AgreementPhase::Agreed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct CountingSupport {
        seed: Vec<u8>,
        next: Mutex<u8>,
    }

    impl CountingSupport {
        fn new(seed: &[u8], first_nonce_byte: u8) -> Self {
            Self {
                seed: seed.to_vec(),
                next: Mutex::new(first_nonce_byte),
            }
        }
    }

    impl HmacSharingSupport for CountingSupport {
        fn sharing_seed(&self) -> &[u8] {
            &self.seed
        }

        fn preshared_key(&self) -> &[u8] {
            &[0u8; 32]
        }

        fn random_nonce(&self) -> [u8; 32] {
            let mut next = self.next.lock();
            *next = next.wrapping_add(1);
            [*next; 32]
        }
    }

    #[test]
    fn test_parameters_are_stable() {
        let support = CountingSupport::new(b"", 0);
        let mut agreement = HmacAgreement::new();
        assert!(matches!(agreement.phase(), AgreementPhase::Idle));

        let first = agreement.sharing_parameters(&support).unwrap();
        let second = agreement.sharing_parameters(&support).unwrap();
        assert_eq!(first, second);
        assert!(matches!(agreement.phase(), AgreementPhase::ParametersIssued));
    }

    #[test]
    fn test_two_participants_agree() {
        let support_a = CountingSupport::new(b"", 0);
        let support_b = CountingSupport::new(b"", 100);
        let mut a = HmacAgreement::new();
        let mut b = HmacAgreement::new();

        let all = vec![
            a.sharing_parameters(&support_a).unwrap(),
            b.sharing_parameters(&support_b).unwrap(),
        ];
        let check_a = a.compute_shared(&support_a, &all).unwrap();
        let check_b = b.compute_shared(&support_b, &all).unwrap();
        assert_eq!(check_a, check_b);
        assert_eq!(a.shared_key(), b.shared_key());
        assert!(a.is_agreed());
    }

    #[test]
    fn test_malformed_input_rejected() {
        let support = CountingSupport::new(b"", 0);
        let mut agreement = HmacAgreement::new();
        let foreign = HmacSharingParameters {
            seed: Vec::new(),
            nonce: [9; 32],
        };

        assert_eq!(
            agreement.compute_shared(&support, &[foreign.clone()]),
            Err(ErrorCode::InvalidArgument)
        );

        let local = agreement.sharing_parameters(&support).unwrap();
        assert_eq!(
            agreement.compute_shared(&support, &[]),
            Err(ErrorCode::InvalidArgument)
        );
        assert_eq!(
            agreement.compute_shared(&support, &[foreign]),
            Err(ErrorCode::InvalidArgument)
        );

        let oversized = HmacSharingParameters {
            seed: vec![0; MAX_SEED_LEN + 1],
            nonce: [3; 32],
        };
        assert_eq!(
            agreement.compute_shared(&support, &[local, oversized]),
            Err(ErrorCode::InvalidArgument)
        );
        assert!(agreement.shared_key().is_none());
    }

    #[test]
    fn test_oversized_local_seed_rejected() {
        let support = CountingSupport::new(&[1u8; 33], 0);
        let mut agreement = HmacAgreement::new();
        assert_eq!(
            agreement.sharing_parameters(&support),
            Err(ErrorCode::InvalidArgument)
        );
    }
}
