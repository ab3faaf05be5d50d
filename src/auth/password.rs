use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Minimum number of characters in a password.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .context("Failed to hash password")?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against its hash.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash).context("Failed to parse password hash")?;

    let argon2 = Argon2::default();

    Ok(argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Check a new password against the strength rules.
///
/// Returns every rule the password breaks, empty when it is acceptable.
#[must_use]
pub fn password_problems(password: &str) -> Vec<String> {
    let mut problems = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push(format!(
            "This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."
        ));
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.".to_string());
    }

    problems
}

/// Validate a password and its confirmation as entered in a registration form.
pub fn validate_new_password(password: &str, confirmation: &str) -> Result<(), Vec<String>> {
    if password != confirmation {
        return Err(vec!["The two password fields didn't match.".to_string()]);
    }
    let problems = password_problems(password);
    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hashing() {
        let password = "test_password_123!";
        let hash = hash_password(password).unwrap();

        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_password_problems() {
        assert!(password_problems("abcdefgh").is_empty());
        assert!(password_problems("MyP@ssw0rd").is_empty());

        assert_eq!(password_problems("short1").len(), 1);
        assert_eq!(password_problems("12345678").len(), 1);
        // Short and numeric
        assert_eq!(password_problems("1234").len(), 2);
    }

    #[test]
    fn test_validate_new_password() {
        assert!(validate_new_password("correct horse", "correct horse").is_ok());
        assert!(validate_new_password("correct horse", "battery staple").is_err());
        assert!(validate_new_password("123456789", "123456789").is_err());
    }
}
