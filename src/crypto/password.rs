use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

#[cfg(not(test))]
pub const PBKDF2_ITERATIONS: u32 = 600_000;
// Unit tests register and sign in dozens of accounts.
#[cfg(test)]
pub const PBKDF2_ITERATIONS: u32 = 1_000;

pub const HASH_LENGTH: usize = 32;
pub const SALT_LENGTH: usize = 32;
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Derived password hash — zeroed on drop
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct PasswordHash {
    bytes: [u8; HASH_LENGTH],
}

impl PasswordHash {
    /// Derive from password + salt using PBKDF2-SHA256
    pub fn derive(password: &str, salt: &[u8]) -> Self {
        let mut bytes = [0u8; HASH_LENGTH];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut bytes);
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.bytes
    }

    /// Constant-time comparison against a stored hash.
    pub fn matches(&self, stored: &[u8]) -> bool {
        stored.len() == HASH_LENGTH && bool::from(self.bytes.ct_eq(stored))
    }
}

/// Generate a cryptographically random salt
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Hash a new password with a fresh salt. Returns `(hash, salt)`.
pub fn hash_password(password: &str) -> (PasswordHash, [u8; SALT_LENGTH]) {
    let salt = generate_salt();
    (PasswordHash::derive(password, &salt), salt)
}

pub fn verify_password(password: &str, salt: &[u8], stored: &[u8]) -> bool {
    PasswordHash::derive(password, salt).matches(stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic() {
        let salt = [42u8; SALT_LENGTH];
        let a = PasswordHash::derive("password", &salt);
        let b = PasswordHash::derive("password", &salt);
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn different_salts_produce_different_hashes() {
        let a = PasswordHash::derive("password", &[1u8; SALT_LENGTH]);
        let b = PasswordHash::derive("password", &[2u8; SALT_LENGTH]);
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn verify_accepts_right_password_only() {
        let (hash, salt) = hash_password("secret1");
        let stored = hash.as_bytes().to_vec();
        assert!(verify_password("secret1", &salt, &stored));
        assert!(!verify_password("secret2", &salt, &stored));
    }

    #[test]
    fn truncated_stored_hash_never_matches() {
        let (hash, salt) = hash_password("secret1");
        let stored = &hash.as_bytes()[..16];
        assert!(!verify_password("secret1", &salt, stored));
    }

    #[test]
    fn generate_salt_is_random() {
        assert_ne!(generate_salt(), generate_salt());
    }
}
