//! Identity validation rules
//!
//! Pure checks applied before a user is registered:
//! - username: lowercase ASCII letters and digits only
//! - password: at least 6 characters from an allowed alphabet, with at least
//!   one digit, one uppercase and one lowercase letter
//! - national ID (IIN): 12 digits, century code in the 7th position and a
//!   mod-11 check digit in the 12th

use thiserror::Error;

/// Minimum password length in characters
pub const MIN_PASSWORD_LEN: usize = 6;

/// Number of digits in a national ID
pub const NATIONAL_ID_LEN: usize = 12;

/// Special characters accepted in passwords
pub const PASSWORD_SPECIAL_CHARS: &str = "~!@#$%^&*_-+=`|\\(){}[]:;\"'<>,.?/";

/// Identity validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("username must contain only lowercase letters and digits")]
    InvalidUsername,

    #[error("password must be at least {MIN_PASSWORD_LEN} characters in length")]
    PasswordTooShort,

    #[error("password contains characters outside the allowed set")]
    InvalidPasswordChars,

    #[error("password must contain at least 1 digit, 1 uppercase and 1 lowercase letter")]
    WeakPassword,

    #[error("national ID must be exactly {NATIONAL_ID_LEN} digits")]
    InvalidNationalIdFormat,

    #[error("national ID has an invalid century code")]
    InvalidNationalIdCentury,

    #[error("national ID check digit is incorrect")]
    InvalidNationalIdChecksum,
}

/// Validate a registration triple
///
/// Rules are applied in order (username, password, national ID) and the first
/// failure is returned.
///
/// # Example
///
/// ```
/// use txauth_core::validate::{validate_identity, ValidationError};
///
/// assert!(validate_identity("jack", "QWEqwe123!!@#", "940217450216").is_ok());
/// assert_eq!(
///     validate_identity("Jack", "QWEqwe123!!@#", "940217450216"),
///     Err(ValidationError::InvalidUsername)
/// );
/// ```
pub fn validate_identity(
    username: &str,
    password: &str,
    national_id: &str,
) -> Result<(), ValidationError> {
    validate_username(username)?;
    validate_password(password)?;
    validate_national_id(national_id)?;
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::InvalidUsername);
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    {
        return Err(ValidationError::InvalidUsername);
    }

    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort);
    }

    let (mut digits, mut lower, mut upper) = (0usize, 0usize, 0usize);

    for c in password.chars() {
        if c.is_ascii_digit() {
            digits += 1;
        } else if c.is_ascii_lowercase() {
            lower += 1;
        } else if c.is_ascii_uppercase() {
            upper += 1;
        } else if !PASSWORD_SPECIAL_CHARS.contains(c) {
            return Err(ValidationError::InvalidPasswordChars);
        }
    }

    if digits == 0 || lower == 0 || upper == 0 {
        return Err(ValidationError::WeakPassword);
    }

    Ok(())
}

pub fn validate_national_id(national_id: &str) -> Result<(), ValidationError> {
    if national_id.len() != NATIONAL_ID_LEN || !national_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidNationalIdFormat);
    }

    let digits: Vec<u32> = national_id.bytes().map(|b| u32::from(b - b'0')).collect();

    if !(3..=6).contains(&digits[6]) {
        return Err(ValidationError::InvalidNationalIdCentury);
    }

    let mut checksum = national_id_checksum(&digits, 1);
    if checksum == 10 {
        checksum = national_id_checksum(&digits, 3);
    }

    if checksum != digits[11] {
        return Err(ValidationError::InvalidNationalIdChecksum);
    }

    Ok(())
}

/// Weighted mod-11 sum over the first ten digits, weights `start..start+10`
pub fn national_id_checksum(digits: &[u32], start: u32) -> u32 {
    digits
        .iter()
        .take(10)
        .enumerate()
        .map(|(i, d)| (start + i as u32) * d)
        .sum::<u32>()
        % 11
}
