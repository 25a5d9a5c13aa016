//! One-time codes for password recovery

use argon2::password_hash::rand_core::{OsRng, RngCore};
use time::Duration;

/// How long a recovery code stays valid
pub const OTP_TTL: Duration = Duration::minutes(15);

const OTP_DIGITS: u32 = 6;

/// Generate a zero-padded six digit code
pub fn generate_otp() -> String {
    let code = OsRng.next_u32() % 10u32.pow(OTP_DIGITS);
    format!("{:0width$}", code, width = OTP_DIGITS as usize)
}
