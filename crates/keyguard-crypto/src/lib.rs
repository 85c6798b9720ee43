//! Keyguard Crypto: primitives behind the enforcement engine
//!
//! - **HMAC**: HMAC-SHA256 with constant-time verification and a zeroizing key
//! - **Key derivation**: HKDF-SHA256 for the multi-party shared MAC key
//! - **Key ids**: stable 64-bit identifiers for key blobs
//! - **Framing**: fixed-format MAC inputs for every token type
//! - **Randomness**: OS and seeded sources

pub mod framing;
pub mod hmac;
pub mod kdf;
pub mod key_id;
pub mod random;

pub use framing::{
    auth_token_mac_input, sign_auth_token, timestamp_token_mac_input, verification_token_mac_input,
    verify_auth_token, verify_timestamp_token, verify_verification_token,
};
pub use hmac::{constant_time_eq, hmac_sha256, verify_hmac_sha256, HmacKey, MAC_LEN};
pub use kdf::{agreement_context, derive_shared_key, sharing_check, ParticipantShare};
pub use key_id::derive_key_id;
pub use random::{OsRandomSource, RandomSource, SeededRandomSource};
