use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[cfg(not(test))]
pub const PBKDF2_ITERATIONS: u32 = 600_000;
#[cfg(test)]
pub const PBKDF2_ITERATIONS: u32 = 1_000;

pub const HASH_LENGTH: usize = 32;
pub const SALT_LENGTH: usize = 16;

/// Derived password verifier. Zeroed on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
struct DerivedKey {
    bytes: [u8; HASH_LENGTH],
}

impl DerivedKey {
    fn derive(password: &str, salt: &[u8]) -> Self {
        let mut bytes = [0u8; HASH_LENGTH];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut bytes);
        Self { bytes }
    }
}

/// Hash a new password with a fresh salt. Returns `(hash, salt)`.
pub fn hash_password(password: &str) -> (Vec<u8>, Vec<u8>) {
    let salt = generate_salt();
    let key = DerivedKey::derive(password, &salt);
    (key.bytes.to_vec(), salt.to_vec())
}

/// Constant-time check of a password against a stored verifier.
pub fn verify_password(password: &str, salt: &[u8], expected: &[u8]) -> bool {
    let key = DerivedKey::derive(password, salt);
    key.bytes.ct_eq(expected).into()
}

/// Pays for one derivation against a fixed salt, for callers that have no
/// stored verifier. Never matches.
pub fn verify_without_credential(password: &str) -> bool {
    const NO_SALT: [u8; SALT_LENGTH] = [0u8; SALT_LENGTH];
    let _key = DerivedKey::derive(password, &NO_SALT);
    false
}

pub fn generate_salt() -> [u8; SALT_LENGTH] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}
