//! Password hashing.
//!
//! PBKDF2-HMAC-SHA256 with a random per-password salt. The encoded form
//! carries its own iteration count so the work factor can be raised
//! without invalidating stored hashes:
//! `pbkdf2-sha256$<iterations>$<salt>$<hash>` (base64url, unpadded).

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use pbkdf2::pbkdf2_hmac;
use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore};
use sha2::Sha256;
use subtle::ConstantTimeEq;

const SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const OUTPUT_LEN: usize = 32;
const TEMPORARY_PASSWORD_LEN: usize = 12;

/// Default iteration count for new hashes.
pub const DEFAULT_ITERATIONS: u32 = 600_000;

/// Hashes and verifies passwords.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl PasswordHasher {
    /// Creates a hasher; zero iterations is raised to one.
    #[must_use]
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    /// Hashes `password` with a fresh salt.
    #[must_use]
    pub fn hash(&self, password: &str) -> String {
        let mut salt = [0u8; SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        let derived = derive(password, &salt, self.iterations);
        format!(
            "{SCHEME}${}${}${}",
            self.iterations,
            URL_SAFE_NO_PAD.encode(salt),
            URL_SAFE_NO_PAD.encode(derived)
        )
    }

    /// Checks `password` against an encoded hash in constant time.
    ///
    /// Unparseable hashes never verify.
    #[must_use]
    pub fn verify(&self, password: &str, encoded: &str) -> bool {
        let mut parts = encoded.split('$');
        let (Some(SCHEME), Some(iterations), Some(salt), Some(expected), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return false;
        };
        let Ok(iterations) = iterations.parse::<u32>() else {
            return false;
        };
        let (Ok(salt), Ok(expected)) = (
            URL_SAFE_NO_PAD.decode(salt),
            URL_SAFE_NO_PAD.decode(expected),
        ) else {
            return false;
        };
        if iterations == 0 || expected.len() != OUTPUT_LEN {
            return false;
        }

        let derived = derive(password, &salt, iterations);
        derived[..].ct_eq(&expected[..]).into()
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; OUTPUT_LEN] {
    let mut out = [0u8; OUTPUT_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

/// Generates a random alphanumeric password for freshly provisioned identities.
#[must_use]
pub fn generate_temporary_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TEMPORARY_PASSWORD_LEN)
        .map(char::from)
        .collect()
}
