//! Authentication module for clipsync

pub mod jwt;
pub mod middleware;
pub mod otp;
pub mod password;

pub use jwt::{Claims, JwtError, JwtManager};
pub use middleware::{require_auth, AuthState, AuthUser};
pub use otp::{generate_otp, OTP_TTL};
pub use password::{hash_password, validate_credentials, verify_password, CredentialsError, PasswordError};
