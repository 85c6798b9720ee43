//! Randomness sources
//!
//! Production code draws from the OS; tests and simulations use a seeded
//! ChaCha20 stream so that nonces, and therefore negotiated keys, are
//! reproducible.

use parking_lot::Mutex;
use rand_chacha::ChaCha20Rng;
use rand_core::{RngCore, SeedableRng};
use std::sync::Arc;

/// Abstract randomness source
pub trait RandomSource: Send + Sync {
    /// Fill a byte buffer with random data
    fn fill_bytes(&self, dest: &mut [u8]);

    /// Generate 32 random bytes
    fn random_32(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        self.fill_bytes(&mut out);
        out
    }
}

impl<T: RandomSource + ?Sized> RandomSource for Arc<T> {
    fn fill_bytes(&self, dest: &mut [u8]) {
        (**self).fill_bytes(dest);
    }
}

/// Real randomness source using OS entropy (production use)
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandomSource;

impl RandomSource for OsRandomSource {
    fn fill_bytes(&self, dest: &mut [u8]) {
        rand::rngs::OsRng.fill_bytes(dest);
    }
}

/// Seeded deterministic RNG (for testing and reproducible simulations)
#[derive(Debug, Clone)]
pub struct SeededRandomSource {
    rng: Arc<Mutex<ChaCha20Rng>>,
}

impl SeededRandomSource {
    /// Create a new seeded RNG with the given seed
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
        }
    }
}

impl RandomSource for SeededRandomSource {
    fn fill_bytes(&self, dest: &mut [u8]) {
        self.rng.lock().fill_bytes(dest);
    }
}
