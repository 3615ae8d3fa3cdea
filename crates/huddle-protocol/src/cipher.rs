//! Keyed byte obfuscation with an additive checksum.
//!
//! # This is not encryption
//!
//! [`Cipher`] XORs bytes against a key derived from a shared secret. It
//! exists so that signaling JSON does not travel as readable plaintext,
//! nothing more:
//!
//! - **No confidentiality.** Anyone who knows or guesses the secret can
//!   read every frame, and XOR with a repeating 32-byte key falls to
//!   known-plaintext analysis (JSON payloads start with `{"`) without
//!   knowing the secret at all.
//! - **No authenticity.** The [`checksum`] is an 8-bit wrapping sum. It
//!   catches accidental corruption some of the time and never catches
//!   deliberate tampering.
//!
//! Should real protection ever be required, replace `transform`/`checksum`
//! with an AEAD `seal`/`open` pair at the same call sites; the framing
//! contract does not change.

use sha2::{Digest, Sha256};

/// Length of the derived key in bytes (one SHA-256 digest).
pub const KEY_LEN: usize = 32;

/// A reversible XOR transform keyed by a hashed secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Cipher {
    key: [u8; KEY_LEN],
}

impl Cipher {
    /// Builds a cipher whose key is derived from `secret`.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: Self::derive(secret),
        }
    }

    /// Derives a fixed-length key by hashing an arbitrary-length secret.
    ///
    /// Deterministic: the same secret always yields the same key, which is
    /// how two ends that share a secret agree on a key without exchanging it.
    pub fn derive(secret: impl AsRef<[u8]>) -> [u8; KEY_LEN] {
        let digest = Sha256::digest(secret.as_ref());
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&digest);
        key
    }

    /// Returns the derived key.
    pub fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    /// XORs `bytes` with the key, cycling the key over longer inputs.
    ///
    /// Self-inverse: `transform(transform(x)) == x`.
    pub fn transform(&self, bytes: &[u8]) -> Vec<u8> {
        let mut out = bytes.to_vec();
        self.transform_in_place(&mut out);
        out
    }

    /// In-place variant of [`transform`](Self::transform).
    pub fn transform_in_place(&self, bytes: &mut [u8]) {
        for (byte, k) in bytes.iter_mut().zip(self.key.iter().cycle()) {
            *byte ^= k;
        }
    }
}

// The key is the only secret in the process; keep it out of logs.
impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher").finish_non_exhaustive()
    }
}

/// 8-bit wrapping sum of `bytes`. A corruption hint, not a MAC.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}
