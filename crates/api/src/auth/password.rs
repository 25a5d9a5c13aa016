//! Password hashing with Argon2

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;
pub const MAX_USERNAME_LENGTH: usize = 64;

/// Hash a password using Argon2id
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hashing(e.to_string()))
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Validate signup credentials
pub fn validate_credentials(username: &str, password: &str) -> Result<(), CredentialsError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(CredentialsError::EmptyUsername);
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(CredentialsError::UsernameTooLong);
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(CredentialsError::PasswordTooShort);
    }
    if password.chars().count() > MAX_PASSWORD_LENGTH {
        return Err(CredentialsError::PasswordTooLong);
    }

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Invalid password hash: {0}")]
    InvalidHash(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("Username must not be empty")]
    EmptyUsername,
    #[error("Username must be at most 64 characters")]
    UsernameTooLong,
    #[error("Password must be at least 8 characters")]
    PasswordTooShort,
    #[error("Password must be at most 128 characters")]
    PasswordTooLong,
}
