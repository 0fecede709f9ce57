/// Password hashing with Argon2id
///
/// Hashes are stored in PHC string format, so the parameters travel with the hash
/// and verification does not need to know them. Parameters follow the OWASP
/// minimum for Argon2id (19 MiB, 2 passes, 1 lane).
///
/// # Example
///
/// ```
/// use campushub_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Library#Card42")?;
/// assert!(verify_password("Library#Card42", &hash)?);
/// assert!(!verify_password("library#card42", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};

/// Memory cost in KiB
const MEMORY_COST_KIB: u32 = 19 * 1024;

/// Number of passes
const TIME_COST: u32 = 2;

/// Degree of parallelism
const PARALLELISM: u32 = 1;

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Failed to verify password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Stored hash could not be parsed
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = ParamsBuilder::new()
        .m_cost(MEMORY_COST_KIB)
        .t_cost(TIME_COST)
        .p_cost(PARALLELISM)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    Ok(Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Verifies a password against a stored PHC hash
///
/// Returns `Ok(false)` for a wrong password and `Err` only when the stored hash is
/// unusable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

/// Checks the account password policy
///
/// At least 8 characters with an uppercase letter, a lowercase letter, a digit
/// and a symbol. The error string is shown to the user as-is.
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }

    if !password.chars().any(|c| c.is_uppercase()) {
        return Err("Password must contain at least one uppercase letter".to_string());
    }

    if !password.chars().any(|c| c.is_lowercase()) {
        return Err("Password must contain at least one lowercase letter".to_string());
    }

    if !password.chars().any(|c| c.is_numeric()) {
        return Err("Password must contain at least one digit".to_string());
    }

    if !password.chars().any(|c| !c.is_alphanumeric()) {
        return Err("Password must contain at least one special character".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_format() {
        let hash = hash_password("Desk!Lamp9").expect("Hash should succeed");

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("v=19"));
        assert!(hash.contains("m=19456"));
        assert!(hash.contains("t=2"));
        assert!(hash.contains("p=1"));
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let hash1 = hash_password("same_password").unwrap();
        let hash2 = hash_password("same_password").unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("correct_password").unwrap();

        assert!(verify_password("correct_password", &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(verify_password("password", "not-a-phc-string").is_err());
        assert!(verify_password("password", "").is_err());

        // Well-formed PHC string without salt or hash: nothing can match it.
        assert!(!verify_password("password", "$argon2id$invalid").unwrap());
    }

    #[test]
    fn test_unicode_password_roundtrip() {
        let hash = hash_password("Bibliothèque-密码-1").unwrap();
        assert!(verify_password("Bibliothèque-密码-1", &hash).unwrap());
    }

    #[test]
    fn test_validate_password_strength() {
        assert!(validate_password_strength("MyP@ssw0rd!").is_ok());
        assert!(validate_password_strength("Campus#2025").is_ok());

        let cases = [
            ("Sh0rt!", "at least 8 characters"),
            ("lowercase1!", "uppercase letter"),
            ("UPPERCASE1!", "lowercase letter"),
            ("NoDigits!", "digit"),
            ("NoSpecial123", "special character"),
        ];

        for (password, expected) in cases {
            let err = validate_password_strength(password).unwrap_err();
            assert!(err.contains(expected), "{password}: {err}");
        }
    }
}
